use serde_json::{json, Value};
use thiserror::Error;

use crate::backends::process::CommandError;
use crate::handles::security::userh::UserError;

#[derive(Debug, Error)]
pub enum CronError {
    #[error(transparent)]
    Process(#[from] CommandError),

    #[error("failed to {action} temporary crontab: {source}")]
    TempFile {
        action: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    User(#[from] UserError),

    #[error("{0} must be provided")]
    MissingArgument(String),

    #[error("Invalid choice for {field}. Valid choices are {choices}")]
    InvalidChoice { field: String, choices: String },

    #[error("invalid {field} '{value}': {reason}")]
    InvalidArgument {
        field: String,
        value: String,
        reason: String,
    },
}

impl CronError {
    pub fn temp_file(action: &'static str, source: std::io::Error) -> Self {
        CronError::TempFile { action, source }
    }

    pub fn code(&self) -> &'static str {
        match self {
            CronError::Process(_) => "cron.process_failed",
            CronError::TempFile { .. } => "cron.temp_file_failed",
            CronError::User(e) => e.code(),
            CronError::MissingArgument(_) => "cron.missing_argument",
            CronError::InvalidChoice { .. } => "cron.invalid_choice",
            CronError::InvalidArgument { .. } => "cron.invalid_argument",
        }
    }

    pub fn to_json(&self) -> Value {
        let mut error = json!({
            "code": self.code(),
            "message": self.to_string(),
        });
        if let CronError::Process(e) = self {
            error["command"] = json!(e.full_command);
            error["stdout"] = json!(e.stdout);
            error["stderr"] = json!(e.stderr);
        }
        json!({ "ok": false, "error": error })
    }
}
