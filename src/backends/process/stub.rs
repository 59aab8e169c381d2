use super::*;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory stand-in for the `crontab` binary. Understands the three
/// invocations the manager issues (`-u USER -l`, `-u USER -r` and
/// `-u USER FILE`) and keeps one table per user.
#[derive(Debug, Default)]
pub struct StubRunner {
    id: String,
    tables: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<CommandSpec>>,
    installed_files: Mutex<Vec<PathBuf>>,
    dump_failure: Mutex<Option<String>>,
    install_failure: Mutex<Option<String>>,
}

impl StubRunner {
    pub fn new() -> Self {
        Self {
            id: "stub".to_string(),
            ..Default::default()
        }
    }

    pub fn with_table(self, user: &str, content: &str) -> Self {
        self.set_table(user, content);
        self
    }

    pub fn set_table(&self, user: &str, content: &str) {
        lock(&self.tables).insert(user.to_string(), content.to_string());
    }

    pub fn table(&self, user: &str) -> Option<String> {
        lock(&self.tables).get(user).cloned()
    }

    /// Make every subsequent `-l` fail with the given stderr.
    pub fn fail_dump(&self, stderr: &str) {
        *lock(&self.dump_failure) = Some(stderr.to_string());
    }

    /// Make every subsequent install fail with the given stderr.
    pub fn fail_install(&self, stderr: &str) {
        *lock(&self.install_failure) = Some(stderr.to_string());
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        lock(&self.calls).clone()
    }

    /// Paths handed to install invocations, in call order.
    pub fn installed_files(&self) -> Vec<PathBuf> {
        lock(&self.installed_files).clone()
    }

    fn outcome(command: String, result: std::result::Result<String, String>) -> RunOutcome {
        match result {
            Ok(stdout) => RunOutcome {
                command,
                success: true,
                exit_code: Some(0),
                stdout,
                ..Default::default()
            },
            Err(stderr) => RunOutcome {
                command,
                success: false,
                exit_code: Some(1),
                exit_message: "exit status: 1".to_string(),
                stderr,
                ..Default::default()
            },
        }
    }

    fn dispatch(&self, args: &[String]) -> std::result::Result<String, String> {
        let (user, action) = match args {
            [flag, user, action] if flag == "-u" => (user.as_str(), action.as_str()),
            _ => return Err(format!("usage error: {}", args.join(" "))),
        };

        match action {
            "-l" => {
                if let Some(stderr) = lock(&self.dump_failure).clone() {
                    return Err(stderr);
                }
                lock(&self.tables)
                    .get(user)
                    .cloned()
                    .ok_or_else(|| format!("no crontab for {}\n", user))
            }
            "-r" => lock(&self.tables)
                .remove(user)
                .map(|_| String::new())
                .ok_or_else(|| format!("no crontab for {}\n", user)),
            file => {
                lock(&self.installed_files).push(PathBuf::from(file));
                if let Some(stderr) = lock(&self.install_failure).clone() {
                    return Err(stderr);
                }
                let content = std::fs::read_to_string(file)
                    .map_err(|e| format!("{}: {}", file, e))?;
                lock(&self.tables).insert(user.to_string(), content);
                Ok(String::new())
            }
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ProcessRunner for StubRunner {
    fn id(&self) -> &str {
        &self.id
    }

    fn run(&self, spec: &CommandSpec) -> RunOutcome {
        lock(&self.calls).push(spec.clone());
        let result = self.dispatch(&spec.args);
        Self::outcome(spec.command_line(), result)
    }
}
