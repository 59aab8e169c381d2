use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::Write;

use cronsync::core::{dispatch_stage, Registry};
use cronsync::handles;

/// Keep user crontabs in line with declared jobs
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// List registered URL schemes and exit
    #[arg(long)]
    list_schemas: bool,

    /// Pretty-print JSON outputs when possible
    #[arg(long)]
    json_pretty: bool,

    /// Log debug output to stderr (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,

    /// A single command stage like: cron://alice.list or cron://.add(schedule=daily,command=/bin/true)
    #[arg(value_name = "STAGE")]
    stage: Option<String>,

    /// Additional arguments passed to the command as key=value pairs
    #[arg(value_name = "ARGS")]
    args: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let mut reg = Registry::default();
    handles::register_all(&mut reg);

    if cli.list_schemas {
        for s in reg.list_schemes() {
            println!("{}", s);
        }
        return Ok(());
    }

    let stage = cli
        .stage
        .ok_or_else(|| anyhow!("No stage provided. Try --list-schemas"))?;

    // Capture output so we can optionally pretty-print JSON
    let mut buf: Vec<u8> = Vec::new();
    let status = dispatch_stage(
        &reg,
        &stage,
        &cli.args,
        &mut std::io::stdin(),
        &mut buf,
        &mut std::io::stderr(),
    )?;

    let mut stdout = std::io::stdout();
    match serde_json::from_slice::<serde_json::Value>(&buf) {
        Ok(val) if cli.json_pretty => writeln!(stdout, "{}", serde_json::to_string_pretty(&val)?)?,
        Ok(val) => writeln!(stdout, "{}", serde_json::to_string(&val)?)?,
        // not JSON; print raw
        Err(_) => stdout.write_all(&buf)?,
    }

    if !status.ok {
        log::debug!("stage failed: {:?}", status.reason);
        std::process::exit(status.exit_code());
    }
    Ok(())
}
