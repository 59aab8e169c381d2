use serde::{Deserialize, Serialize};
use std::fmt;

/// Named presets, in the order they are listed to users.
pub const PRESETS: [(&str, [&str; 5]); 5] = [
    //            minute, hour, month_day, month, week_day
    ("yearly", ["0", "0", "1", "1", "*"]),
    ("monthly", ["0", "0", "1", "*", "*"]),
    ("weekly", ["0", "0", "*", "*", "0"]),
    ("daily", ["0", "0", "*", "*", "*"]),
    ("hourly", ["0", "*", "*", "*", "*"]),
];

/// Field names of a schedule, in crontab column order.
pub const FIELD_NAMES: [&str; 5] = ["minute", "hour", "month_day", "month", "week_day"];

/// The five time columns of a crontab line. Values are opaque patterns and
/// are compared as text, never evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schedule {
    pub minute: String,
    pub hour: String,
    pub month_day: String,
    pub month: String,
    pub week_day: String,
}

impl Schedule {
    pub fn new(
        minute: impl Into<String>,
        hour: impl Into<String>,
        month_day: impl Into<String>,
        month: impl Into<String>,
        week_day: impl Into<String>,
    ) -> Self {
        Self {
            minute: minute.into(),
            hour: hour.into(),
            month_day: month_day.into(),
            month: month.into(),
            week_day: week_day.into(),
        }
    }

    /// Build a schedule from exactly five fields.
    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> Option<Self> {
        match fields {
            [minute, hour, month_day, month, week_day] => Some(Self::new(
                minute.as_ref(),
                hour.as_ref(),
                month_day.as_ref(),
                month.as_ref(),
                week_day.as_ref(),
            )),
            _ => None,
        }
    }

    pub fn fields(&self) -> [&str; 5] {
        [
            self.minute.as_str(),
            self.hour.as_str(),
            self.month_day.as_str(),
            self.month.as_str(),
            self.week_day.as_str(),
        ]
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fields().join(" "))
    }
}

/// Expand a preset name such as `daily` into its schedule.
pub fn expand(alias: &str) -> Option<Schedule> {
    PRESETS
        .iter()
        .find(|(name, _)| *name == alias)
        .and_then(|(_, fields)| Schedule::from_fields(fields))
}

pub fn is_alias(name: &str) -> bool {
    PRESETS.iter().any(|(preset, _)| *preset == name)
}

pub fn alias_names() -> Vec<&'static str> {
    PRESETS.iter().map(|(name, _)| *name).collect()
}
