pub mod backends;
pub mod core;
pub mod handles;

// Re-export commonly used items
pub use core::{dispatch_stage, Handle, Registry, Status};
pub use handles::processes::cron::{Cronjob, Crontab, CronError, Schedule};
