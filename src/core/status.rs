use serde::{Deserialize, Serialize};

/// Outcome of a single stage, mapped onto the process exit code by the CLI.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Status {
    pub ok: bool,
    pub code: Option<i32>,
    pub reason: Option<String>,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            ok: true,
            code: Some(0),
            reason: None,
        }
    }

    pub fn err(code: i32, reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            code: Some(code),
            reason: Some(reason.into()),
        }
    }

    pub fn exit_code(&self) -> i32 {
        if self.ok {
            0
        } else {
            self.code.unwrap_or(1)
        }
    }
}
