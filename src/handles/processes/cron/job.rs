use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;

use super::schedule::Schedule;

/// One crontab entry: the environment assignments written above it, its
/// schedule and the command.
///
/// The environment is kept sorted by name so that both the rendered block and
/// the identity hash are independent of the order variables were declared in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cronjob {
    pub schedule: Schedule,
    pub command: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Cronjob {
    pub fn new(schedule: Schedule, command: impl Into<String>) -> Self {
        Self {
            schedule,
            command: command.into(),
            env: BTreeMap::new(),
        }
    }

    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    /// `<minute> <hour> <month_day> <month> <week_day> <command>`
    pub fn job_line(&self) -> String {
        format!("{} {}", self.schedule, self.command)
    }

    /// The text this job occupies in a crontab, newline-terminated.
    pub fn block(&self) -> String {
        let mut block = String::new();
        if !self.env.is_empty() {
            for (name, value) in &self.env {
                block.push_str(name);
                block.push('=');
                block.push_str(value);
                block.push('\n');
            }
            block.push('\n');
        }
        block.push_str(&self.job_line());
        block.push('\n');
        block
    }

    /// Content identity: hex SHA-1 of the sorted `NAME=value` pairs followed
    /// by the job line. Formatting of the source text plays no part.
    pub fn hash(&self) -> String {
        let mut hasher = Sha1::new();
        for (name, value) in &self.env {
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
        }
        hasher.update(self.job_line().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
