use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backends::process::{CommandSpec, ProcessRunner};
use crate::handles::security::userh::SystemUser;

use super::error::CronError;
use super::job::Cronjob;
use super::parser;

/// Reads and rewrites the crontab of a single user through the `crontab`
/// binary. The table is always replaced as a whole: jobs are rendered into a
/// temporary file which is then installed in one invocation.
///
/// There is no locking. Two writers racing on the same user lose the earlier
/// write.
pub struct Crontab {
    path: PathBuf,
    work_dir: PathBuf,
    user: SystemUser,
    runner: Arc<dyn ProcessRunner>,
}

impl Crontab {
    pub fn new(
        user: SystemUser,
        path: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            path: path.into(),
            work_dir: work_dir.into(),
            user,
            runner,
        }
    }

    pub fn user(&self) -> &SystemUser {
        &self.user
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn command(&self, action: &str) -> CommandSpec {
        CommandSpec::new(&self.path, &["-u", self.user.name.as_str(), action], &self.work_dir)
    }

    fn is_missing_table(&self, stderr: &str) -> bool {
        stderr.trim() == format!("no crontab for {}", self.user.name)
    }

    /// Current jobs, deduplicated. A user without a crontab has no jobs.
    pub fn read(&self) -> Result<Vec<Cronjob>, CronError> {
        let outcome = match self.runner.run(&self.command("-l")).into_result() {
            Ok(outcome) => outcome,
            Err(e) if self.is_missing_table(&e.stderr) => {
                log::debug!("no crontab for user '{}' yet", self.user.name);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let parsed = parser::parse(&outcome.stdout);
        log::debug!("read {} job(s) for user '{}'", parsed.len(), self.user.name);
        Ok(remove_duplicates(parsed))
    }

    /// Ensure `job` is in the table. Returns `true` when the table did not
    /// already hold a job with the same identity. The table is rewritten
    /// either way.
    pub fn add(&self, job: Cronjob) -> Result<bool, CronError> {
        let mut cronjobs = self.read()?;
        let before = cronjobs.len();

        cronjobs.push(job);
        let cronjobs = remove_duplicates(cronjobs);
        let added = cronjobs.len() > before;

        log::info!(
            "{} job for user '{}' ({} total)",
            if added { "adding" } else { "keeping existing" },
            self.user.name,
            cronjobs.len()
        );
        self.save(&cronjobs)?;
        Ok(added)
    }

    /// Drop every job sharing `job`'s identity. Returns `true` when something
    /// was removed. The table is rewritten even when nothing matched.
    pub fn remove(&self, job: &Cronjob) -> Result<bool, CronError> {
        let id = job.hash();
        let cronjobs = self.read()?;
        let before = cronjobs.len();

        let kept: Vec<Cronjob> = cronjobs.into_iter().filter(|c| c.hash() != id).collect();
        let removed = kept.len() < before;

        log::info!(
            "{} job {} for user '{}' ({} left)",
            if removed { "removing" } else { "no match for" },
            id,
            self.user.name,
            kept.len()
        );
        self.save(&kept)?;
        Ok(removed)
    }

    /// Replace the whole table with `cronjobs`. The staging file is deleted
    /// before returning, whether or not the install succeeded.
    pub fn save(&self, cronjobs: &[Cronjob]) -> Result<(), CronError> {
        let content = render(cronjobs);

        let mut staged = tempfile::Builder::new()
            .prefix("cron")
            .tempfile_in(&self.work_dir)
            .map_err(|e| CronError::temp_file("create", e))?;

        let written = staged
            .write_all(content.as_bytes())
            .and_then(|_| staged.flush());
        if let Err(e) = written {
            // dropping the handle removes the file
            return Err(CronError::temp_file("write", e));
        }

        let file_name = staged.path().to_string_lossy().to_string();
        let installed = self.runner.run(&self.command(&file_name)).into_result();

        let cleanup = staged.close();
        if let Err(e) = installed {
            if let Err(io_err) = cleanup {
                log::warn!("could not remove staged crontab {}: {}", file_name, io_err);
            }
            return Err(e.into());
        }
        cleanup.map_err(|e| CronError::temp_file("remove", e))?;

        log::debug!(
            "installed {} job(s) for user '{}'",
            cronjobs.len(),
            self.user.name
        );
        Ok(())
    }

    /// Remove the user's crontab altogether. A missing table is not an error.
    pub fn clear(&self) -> Result<(), CronError> {
        match self.runner.run(&self.command("-r")).into_result() {
            Err(e) if !self.is_missing_table(&e.stderr) => Err(e.into()),
            _ => {
                log::info!("cleared crontab for user '{}'", self.user.name);
                Ok(())
            }
        }
    }
}

/// Keep the first job of each identity, preserving input order.
pub fn remove_duplicates(cronjobs: Vec<Cronjob>) -> Vec<Cronjob> {
    let mut seen = HashSet::with_capacity(cronjobs.len());
    let total = cronjobs.len();

    let uniques: Vec<Cronjob> = cronjobs
        .into_iter()
        .filter(|c| seen.insert(c.hash()))
        .collect();

    if uniques.len() < total {
        log::debug!("dropped {} duplicate job(s)", total - uniques.len());
    }
    uniques
}

/// The exact crontab text `save` installs: blocks separated by a blank line.
pub fn render(cronjobs: &[Cronjob]) -> String {
    cronjobs
        .iter()
        .map(Cronjob::block)
        .collect::<Vec<_>>()
        .join("\n")
}
