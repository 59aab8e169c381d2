use super::*;
use std::process::{Command, Stdio};
use std::time::Instant;

/// Runs commands on the local host through `std::process`.
#[derive(Debug, Default)]
pub struct SystemRunner {
    id: String,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self {
            id: "system".to_string(),
        }
    }
}

impl ProcessRunner for SystemRunner {
    fn id(&self) -> &str {
        &self.id
    }

    fn run(&self, spec: &CommandSpec) -> RunOutcome {
        let command_line = spec.command_line();
        let started = Instant::now();

        let mut command = Command::new(&spec.path);
        command
            .args(&spec.args)
            .current_dir(&spec.work_dir)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = match command.output() {
            Ok(output) => output,
            Err(e) => {
                log::warn!("failed to launch '{}': {}", command_line, e);
                return RunOutcome {
                    command: command_line,
                    success: false,
                    exit_code: None,
                    exit_message: e.to_string(),
                    stdout: String::new(),
                    stderr: String::new(),
                };
            }
        };

        let success = output.status.success();
        log::debug!(
            "ran '{}' status={} duration_ms={}",
            command_line,
            output.status,
            started.elapsed().as_millis()
        );

        RunOutcome {
            command: command_line,
            success,
            exit_code: output.status.code(),
            exit_message: if success {
                String::new()
            } else {
                output.status.to_string()
            },
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}
