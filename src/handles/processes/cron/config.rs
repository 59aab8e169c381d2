use anyhow::Result;
use std::path::PathBuf;

use crate::backends::process::{get_runner, ProcessRunner};
use crate::core::Args;

pub const DEFAULT_CRONTAB_PATH: &str = "/usr/bin/crontab";

pub const ENV_CRONTAB: &str = "CRONSYNC_CRONTAB";
pub const ENV_WORK_DIR: &str = "CRONSYNC_WORK_DIR";
pub const ENV_RUNNER: &str = "CRONSYNC_RUNNER";

/// Where the crontab binary lives, where it runs, and what runs it.
///
/// Resolved from built-in defaults, then the environment, then per-stage
/// arguments, each layer overriding the previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrontabConfig {
    pub crontab_path: PathBuf,
    pub work_dir: PathBuf,
    pub runner: String,
}

impl Default for CrontabConfig {
    fn default() -> Self {
        Self {
            crontab_path: which::which("crontab")
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CRONTAB_PATH)),
            work_dir: std::env::temp_dir(),
            runner: "system".to_string(),
        }
    }
}

impl CrontabConfig {
    pub fn from_env() -> Self {
        Self::default().with_lookup(|key| std::env::var(key).ok())
    }

    fn with_lookup(mut self, get: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = non_empty(ENV_CRONTAB) {
            self.crontab_path = PathBuf::from(path);
        }
        if let Some(dir) = non_empty(ENV_WORK_DIR) {
            self.work_dir = PathBuf::from(dir);
        }
        if let Some(runner) = non_empty(ENV_RUNNER) {
            self.runner = runner;
        }
        self
    }

    /// Apply `crontab_path`, `work_dir` and `runner` stage arguments.
    pub fn with_args(self, args: &Args) -> Self {
        self.with_lookup(|key| {
            let arg = match key {
                ENV_CRONTAB => "crontab_path",
                ENV_WORK_DIR => "work_dir",
                ENV_RUNNER => "runner",
                _ => return None,
            };
            args.get(arg).cloned()
        })
    }

    pub fn build_runner(&self) -> Result<Box<dyn ProcessRunner>> {
        get_runner(&self.runner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_runner_is_system() {
        let config = CrontabConfig::default();
        assert_eq!(config.runner, "system");
        assert!(config.crontab_path.ends_with("crontab"));
    }

    #[test]
    fn test_env_layer_overrides_defaults() {
        let env: HashMap<&str, &str> = [
            (ENV_CRONTAB, "/opt/cron/bin/crontab"),
            (ENV_WORK_DIR, "/var/tmp"),
            (ENV_RUNNER, ""),
        ]
        .into_iter()
        .collect();

        let config = CrontabConfig::default().with_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.crontab_path, PathBuf::from("/opt/cron/bin/crontab"));
        assert_eq!(config.work_dir, PathBuf::from("/var/tmp"));
        assert_eq!(config.runner, "system");
    }

    #[test]
    fn test_args_layer_overrides_env() {
        let mut args = Args::new();
        args.insert("crontab_path".to_string(), "/usr/local/bin/crontab".to_string());
        args.insert("runner".to_string(), "stub".to_string());

        let config = CrontabConfig::default().with_args(&args);
        assert_eq!(config.crontab_path, PathBuf::from("/usr/local/bin/crontab"));
        assert_eq!(config.runner, "stub");
        assert_eq!(config.build_runner().unwrap().id(), "stub");
    }

    #[test]
    fn test_unknown_runner() {
        let config = CrontabConfig {
            runner: "rsh".to_string(),
            ..CrontabConfig::default()
        };
        assert!(config.build_runner().is_err());
    }
}
