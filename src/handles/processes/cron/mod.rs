pub mod config;
pub mod crontab;
pub mod error;
pub mod job;
pub mod parser;
pub mod schedule;

pub use config::CrontabConfig;
pub use crontab::{remove_duplicates, render, Crontab};
pub use error::CronError;
pub use job::Cronjob;
pub use parser::{classify, parse, CrontabLine};
pub use schedule::Schedule;
