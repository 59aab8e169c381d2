use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;

use crate::backends::process::ProcessRunner;
use crate::core::{
    registry::{Args, Handle, IoStreams},
    status::Status,
};
use crate::handles::security::userh::{resolve_owner, SystemUserLookup, UserLookup};

use super::cron::schedule::{self, FIELD_NAMES};
use super::cron::{CronError, Cronjob, Crontab, CrontabConfig, Schedule};

// ===========================================================================
// Declarations
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ensure {
    Present,
    Absent,
}

impl Ensure {
    fn parse(value: &str) -> Result<Self, CronError> {
        match value {
            "present" => Ok(Ensure::Present),
            "absent" => Ok(Ensure::Absent),
            _ => Err(CronError::InvalidChoice {
                field: "ensure".to_string(),
                choices: "present, absent".to_string(),
            }),
        }
    }
}

/// A job as declared by the caller, plus whether it should exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronDeclaration {
    pub job: Cronjob,
    pub ensure: Ensure,
}

impl CronDeclaration {
    /// Build a declaration from stage arguments:
    ///
    /// - `command` (required)
    /// - `schedule=<preset>` or all of `minute`, `hour`, `month_day`,
    ///   `month`, `week_day`
    /// - `env="K1=v1,K2=v2"` and/or `env_K=v`
    /// - `ensure=present|absent`, defaulting to `default_ensure`
    pub fn from_args(args: &Args, default_ensure: Ensure) -> Result<Self, CronError> {
        let command = parse_command(args)?;
        let env = parse_env_from_args(args)?;
        let schedule = parse_schedule(args)?;
        let ensure = match args.get("ensure") {
            Some(v) => Ensure::parse(v.trim())?,
            None => default_ensure,
        };

        Ok(Self {
            job: Cronjob {
                schedule,
                command,
                env,
            },
            ensure,
        })
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> CronError {
    CronError::InvalidArgument {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_command(args: &Args) -> Result<String, CronError> {
    let command = args
        .get("command")
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| CronError::MissingArgument("command".to_string()))?;

    if command.contains('\n') {
        return Err(invalid("command", command, "must fit on a single line"));
    }
    Ok(command.to_string())
}

fn parse_schedule(args: &Args) -> Result<Schedule, CronError> {
    if let Some(preset) = args.get("schedule") {
        let preset = preset.trim().trim_start_matches('@');
        return schedule::expand(preset).ok_or_else(|| CronError::InvalidChoice {
            field: "schedule".to_string(),
            choices: schedule::alias_names().join(", "),
        });
    }

    let mut fields = Vec::with_capacity(FIELD_NAMES.len());
    for name in FIELD_NAMES {
        let value = args
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| CronError::MissingArgument(name.to_string()))?;
        if value.contains(char::is_whitespace) {
            return Err(invalid(name, value, "must not contain whitespace"));
        }
        // the minute opens the rendered line, so it decides how the line reads back
        if fields.is_empty() && !value.starts_with(|c: char| c == '*' || c.is_ascii_digit()) {
            return Err(invalid(name, value, "must start with '*' or a digit"));
        }
        fields.push(value);
    }

    Schedule::from_fields(&fields[..])
        .ok_or_else(|| CronError::MissingArgument("schedule".to_string()))
}

// Supports both formats:
// - env="KEY1=value1,KEY2=value2"
// - env_KEY=value
fn parse_env_from_args(args: &Args) -> Result<BTreeMap<String, String>, CronError> {
    let mut pairs: Vec<(String, String)> = Vec::new();

    if let Some(env_param) = args.get("env") {
        for pair in env_param.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| invalid("env", pair, "expected NAME=value"))?;
            pairs.push((key.trim().to_string(), value.trim().to_string()));
        }
    }

    for (param_key, param_value) in args {
        if let Some(env_key) = param_key.strip_prefix("env_") {
            pairs.push((env_key.to_string(), param_value.clone()));
        }
    }

    let mut env = BTreeMap::new();
    for (name, value) in pairs {
        // anything else would read back as a comment or a job line
        let starts_upper = name.chars().next().map_or(false, char::is_uppercase);
        if !starts_upper || name.contains(|c: char| c == '=' || c.is_whitespace()) {
            return Err(invalid("env", &name, "names must start with an upper-case letter"));
        }
        if value.contains('\n') {
            return Err(invalid("env", &name, "values must fit on a single line"));
        }
        // surrounding blanks are lost when the table is read back
        if value.trim() != value {
            return Err(invalid("env", &name, "values must not start or end with whitespace"));
        }
        env.insert(name, value);
    }
    Ok(env)
}

// ===========================================================================
// Responses
// ===========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronJobView {
    pub id: String,
    pub schedule: String,
    pub schedule_fields: Schedule,
    pub command: String,
    pub env: BTreeMap<String, String>,
}

impl From<&Cronjob> for CronJobView {
    fn from(job: &Cronjob) -> Self {
        Self {
            id: job.hash(),
            schedule: job.schedule.to_string(),
            schedule_fields: job.schedule.clone(),
            command: job.command.clone(),
            env: job.env.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronListResponse {
    pub ok: bool,
    pub timestamp_unix_ms: i64,
    pub user: String,
    pub uid: u32,
    pub crontab: String,
    pub total: usize,
    pub jobs: Vec<CronJobView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronApplyResponse {
    pub ok: bool,
    pub timestamp_unix_ms: i64,
    pub user: String,
    pub ensure: Ensure,
    pub changed: bool,
    pub job: CronJobView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronRenderResponse {
    pub ok: bool,
    pub job: CronJobView,
    pub block: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutputFormat {
    Json,
    Text,
}

impl OutputFormat {
    fn from_args(args: &Args) -> Self {
        match args.get("format").map(String::as_str) {
            Some("text") => OutputFormat::Text,
            _ => OutputFormat::Json,
        }
    }
}

// ===========================================================================
// CronHandle
// ===========================================================================

pub struct CronHandle {
    owner: Option<String>,
    lookup: Box<dyn UserLookup>,
    config: CrontabConfig,
    runner: Option<Arc<dyn ProcessRunner>>,
}

impl CronHandle {
    pub fn new(
        owner: Option<String>,
        lookup: Box<dyn UserLookup>,
        config: CrontabConfig,
        runner: Option<Arc<dyn ProcessRunner>>,
    ) -> Self {
        Self {
            owner,
            lookup,
            config,
            runner,
        }
    }

    /// `cron://alice` manages alice's table; `cron://` the invoking user's.
    pub fn from_url(url: &Url) -> Result<Self> {
        let owner = url
            .host_str()
            .filter(|h| !h.is_empty())
            .map(|h| h.to_string());
        Ok(Self::new(
            owner,
            Box::new(SystemUserLookup::new()),
            CrontabConfig::from_env(),
            None,
        ))
    }

    fn open(&self, args: &Args) -> Result<Crontab> {
        let user = match args.get("owner") {
            Some(owner) => resolve_owner(self.lookup.as_ref(), Some(owner)),
            None => resolve_owner(self.lookup.as_ref(), self.owner.as_deref()),
        }
        .map_err(CronError::from)?;

        let config = self.config.clone().with_args(args);
        let runner = match &self.runner {
            Some(runner) => runner.clone(),
            None => Arc::from(config.build_runner()?),
        };

        Ok(Crontab::new(user, config.crontab_path, config.work_dir, runner))
    }

    fn list_verb(&self, args: &Args) -> Result<String> {
        let crontab = self.open(args)?;
        let cronjobs = crontab.read()?;

        let response = CronListResponse {
            ok: true,
            timestamp_unix_ms: chrono::Utc::now().timestamp_millis(),
            user: crontab.user().name.clone(),
            uid: crontab.user().uid,
            crontab: crontab.path().display().to_string(),
            total: cronjobs.len(),
            jobs: cronjobs.iter().map(CronJobView::from).collect(),
        };

        match OutputFormat::from_args(args) {
            OutputFormat::Text => Ok(self.format_list_as_text(&response)),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&response)?),
        }
    }

    fn format_list_as_text(&self, response: &CronListResponse) -> String {
        let mut output = String::new();

        output.push_str("Cron Jobs\n");
        output.push_str("=========\n\n");
        output.push_str(&format!("User       : {} (uid {})\n", response.user, response.uid));
        output.push_str(&format!("Crontab    : {}\n", response.crontab));
        output.push_str(&format!("Returned   : {}\n\n", response.total));

        for job in &response.jobs {
            output.push_str(&format!("[{}]\n", job.id));
            output.push_str(&format!("  Schedule : {}\n", job.schedule));
            output.push_str(&format!("  Command  : {}\n", job.command));
            for (name, value) in &job.env {
                output.push_str(&format!("  Env      : {}={}\n", name, value));
            }
            output.push('\n');
        }

        if response.jobs.is_empty() {
            output.push_str("(no jobs)\n");
        }

        output
    }

    fn apply_verb(&self, args: &Args, forced: Option<Ensure>) -> Result<String> {
        let mut declaration = CronDeclaration::from_args(args, Ensure::Present)?;
        if let Some(ensure) = forced {
            declaration.ensure = ensure;
        }

        let crontab = self.open(args)?;
        let changed = match declaration.ensure {
            Ensure::Present => {
                log::info!(
                    "Adding cronjob {} for user {}",
                    declaration.job.command,
                    crontab.user().name
                );
                crontab.add(declaration.job.clone())?
            }
            Ensure::Absent => {
                log::info!(
                    "Removing cronjob {} for user {}",
                    declaration.job.command,
                    crontab.user().name
                );
                crontab.remove(&declaration.job)?
            }
        };

        let response = CronApplyResponse {
            ok: true,
            timestamp_unix_ms: chrono::Utc::now().timestamp_millis(),
            user: crontab.user().name.clone(),
            ensure: declaration.ensure,
            changed,
            job: CronJobView::from(&declaration.job),
        };

        match OutputFormat::from_args(args) {
            OutputFormat::Text => Ok(format!(
                "{} {} for {} ({})",
                match declaration.ensure {
                    Ensure::Present => "present:",
                    Ensure::Absent => "absent:",
                },
                declaration.job.job_line(),
                response.user,
                if changed { "changed" } else { "unchanged" }
            )),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&response)?),
        }
    }

    fn render_verb(&self, args: &Args) -> Result<String> {
        let declaration = CronDeclaration::from_args(args, Ensure::Present)?;
        let block = declaration.job.block();

        match OutputFormat::from_args(args) {
            OutputFormat::Text => Ok(block.trim_end().to_string()),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&CronRenderResponse {
                ok: true,
                job: CronJobView::from(&declaration.job),
                block,
            })?),
        }
    }

    fn clear_verb(&self, args: &Args) -> Result<String> {
        let crontab = self.open(args)?;
        crontab.clear()?;
        Ok(serde_json::to_string_pretty(&serde_json::json!({
            "ok": true,
            "user": crontab.user().name,
            "cleared": true,
        }))?)
    }
}

impl Handle for CronHandle {
    fn verbs(&self) -> &'static [&'static str] {
        &["list", "add", "rm", "apply", "clear", "render"]
    }

    fn call(&self, method: &str, args: &Args, io: &mut IoStreams) -> Result<Status> {
        let result = match method {
            "list" => self.list_verb(args),
            "add" => self.apply_verb(args, Some(Ensure::Present)),
            "rm" => self.apply_verb(args, Some(Ensure::Absent)),
            "apply" => self.apply_verb(args, None),
            "clear" => self.clear_verb(args),
            "render" => self.render_verb(args),
            _ => return Err(anyhow::anyhow!("Unknown method: {}", method)),
        };

        match result {
            Ok(output) => {
                writeln!(io.stdout, "{}", output)?;
                Ok(Status::ok())
            }
            Err(e) => match e.downcast_ref::<CronError>() {
                Some(cron_err) => {
                    writeln!(io.stderr, "{}", serde_json::to_string_pretty(&cron_err.to_json())?)?;
                    Ok(Status::err(1, cron_err.to_string()))
                }
                None => Err(e),
            },
        }
    }
}

// ===========================================================================
// Registration function
// ===========================================================================

pub fn register(registry: &mut crate::core::Registry) {
    registry.register_scheme("cron", |url| Ok(Box::new(CronHandle::from_url(url)?)));
}
