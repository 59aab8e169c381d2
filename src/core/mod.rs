pub mod parse;
pub mod registry;
pub mod status;

pub use registry::{Args, Handle, IoStreams, Registry};
pub use status::Status;

use anyhow::Result;
use std::io::{Read, Write};

/// Resolve a stage against the registry and run its verb. Extra CLI
/// arguments of the form `key=value` override those given inside the stage.
pub fn dispatch_stage(
    reg: &Registry,
    stage_str: &str,
    cli_args: &[String],
    stdin: &mut dyn Read,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<Status> {
    let mut parsed = parse::parse_stage(stage_str)?;

    for arg in cli_args {
        if let Some((key, value)) = arg.split_once('=') {
            parsed.args.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    let mut io = IoStreams {
        stdin,
        stdout,
        stderr,
    };
    let h = reg.resolve(&parsed.target)?;
    log::debug!("dispatching verb='{}' target='{}'", parsed.verb, parsed.target);
    h.call(&parsed.verb, &parsed.args, &mut io)
}
