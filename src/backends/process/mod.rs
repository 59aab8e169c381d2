use anyhow::{Result, anyhow};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub mod stub;
pub mod system;

pub use stub::StubRunner;
pub use system::SystemRunner;

/// A single external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub path: PathBuf,
    pub args: Vec<String>,
    pub work_dir: PathBuf,
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn new(path: impl Into<PathBuf>, args: &[&str], work_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            work_dir: work_dir.into(),
            env: BTreeMap::new(),
        }
    }

    /// The command line as a single string, for logs and error reports.
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.path.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Result of running a command. Launch failures are reported here too, with
/// `exit_code` left empty and the launch error in `exit_message`.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub command: String,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub exit_message: String,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutcome {
    pub fn into_result(self) -> std::result::Result<RunOutcome, CommandError> {
        if self.success {
            Ok(self)
        } else {
            Err(CommandError::from(self))
        }
    }
}

/// A failed command with everything captured while it ran.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub struct CommandError {
    pub full_command: String,
    pub exit_message: String,
    pub stdout: String,
    pub stderr: String,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error with command \"{}\".", self.full_command)?;
        if !self.exit_message.is_empty() {
            write!(f, " Error message was \"{}\".", self.exit_message)?;
        }
        if !self.stdout.is_empty() {
            write!(f, " StdOut was \"{}\".", self.stdout)?;
        }
        if !self.stderr.is_empty() {
            write!(f, " StdErr was \"{}\".", self.stderr)?;
        }
        Ok(())
    }
}

impl From<RunOutcome> for CommandError {
    fn from(outcome: RunOutcome) -> Self {
        Self {
            full_command: outcome.command,
            exit_message: outcome.exit_message,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
        }
    }
}

/// Executes external commands on behalf of the crontab manager.
pub trait ProcessRunner: Send + Sync {
    fn id(&self) -> &str;
    fn run(&self, spec: &CommandSpec) -> RunOutcome;
}

/// Get runner instance by ID
pub fn get_runner(runner_id: &str) -> Result<Box<dyn ProcessRunner>> {
    match runner_id.to_lowercase().as_str() {
        "system" => Ok(Box::new(SystemRunner::new())),
        "stub" => Ok(Box::new(StubRunner::new())),
        _ => Err(anyhow!("Unsupported runner: {}", runner_id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_runner() {
        assert_eq!(get_runner("system").unwrap().id(), "system");
        assert_eq!(get_runner("STUB").unwrap().id(), "stub");
        assert!(get_runner("ssh").is_err());
    }

    #[test]
    fn test_command_line() {
        let spec = CommandSpec::new("/usr/bin/crontab", &["-u", "alice", "-l"], "/tmp");
        assert_eq!(spec.command_line(), "/usr/bin/crontab -u alice -l");
    }

    #[test]
    fn test_command_error_message_skips_empty_parts() {
        let err = CommandError {
            full_command: "/usr/bin/crontab -u alice -l".to_string(),
            exit_message: "exit status: 1".to_string(),
            stdout: String::new(),
            stderr: "boom".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Error with command \"/usr/bin/crontab -u alice -l\". Error message was \"exit status: 1\". StdErr was \"boom\"."
        );
    }

    #[test]
    fn test_into_result() {
        let ok = RunOutcome {
            success: true,
            stdout: "x".to_string(),
            ..Default::default()
        };
        assert_eq!(ok.into_result().unwrap().stdout, "x");

        let failed = RunOutcome {
            command: "false".to_string(),
            exit_code: Some(1),
            ..Default::default()
        };
        assert_eq!(failed.into_result().unwrap_err().full_command, "false");
    }
}
