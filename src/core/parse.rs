use anyhow::{Result, anyhow};
use regex::Regex;

use super::registry::Args;

#[derive(Debug)]
pub struct ParsedStage {
    pub target: String,
    pub verb: String,
    pub args: Args,
}

/// Split a stage such as `cron://alice.add(schedule=daily, command="/bin/true")`
/// into its target URL, verb and arguments.
pub fn parse_stage(s: &str) -> Result<ParsedStage> {
    let s = s.trim();

    // Argument values may contain parentheses of their own, so the list
    // opens at the first '(' and closes at the last ')'.
    let (main_part, args_str) = match (s.find('('), s.rfind(')')) {
        (Some(open), Some(close)) if close > open => (&s[..open], Some(&s[open + 1..close])),
        _ => (s, None),
    };
    let main_part = main_part.trim();

    let last_dot = main_part
        .rfind('.')
        .ok_or_else(|| anyhow!("Cannot parse stage: {}", s))?;
    let target = &main_part[..last_dot];
    let verb = &main_part[last_dot + 1..];

    let verb_regex = Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_-]*$")?;
    let url_regex = Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://")?;
    if !verb_regex.is_match(verb) || !url_regex.is_match(target) {
        return Err(anyhow!("Cannot parse stage: {}", s));
    }

    let mut args = Args::new();
    if let Some(args_content) = args_str {
        for kv in parse_arguments(args_content) {
            if let Some((k, v)) = kv.split_once('=') {
                args.insert(k.trim().to_string(), unquote(v.trim()).to_string());
            }
        }
    }

    Ok(ParsedStage {
        target: target.to_string(),
        verb: verb.to_string(),
        args,
    })
}

fn unquote(v: &str) -> &str {
    if v.len() >= 2 && v.starts_with('"') && v.ends_with('"') {
        &v[1..v.len() - 1]
    } else {
        v
    }
}

/// Parse argument string, handling quoted values that may contain commas
fn parse_arguments(args_str: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current_arg = String::new();
    let mut in_quotes = false;

    for ch in args_str.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current_arg.push(ch);
            }
            ',' if !in_quotes => {
                if !current_arg.trim().is_empty() {
                    result.push(current_arg.trim().to_string());
                }
                current_arg.clear();
            }
            _ => current_arg.push(ch),
        }
    }

    if !current_arg.trim().is_empty() {
        result.push(current_arg.trim().to_string());
    }

    result
}
