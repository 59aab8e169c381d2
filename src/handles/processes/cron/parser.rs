use std::collections::BTreeMap;

use super::job::Cronjob;
use super::schedule::{self, Schedule};

/// What a single crontab line turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrontabLine {
    Blank,
    Comment,
    EnvVar { name: String, value: String },
    Job { schedule: Schedule, command: String },
    Unrecognized,
}

/// Classify one raw line. Leading and trailing whitespace is ignored.
pub fn classify(raw: &str) -> CrontabLine {
    let line = raw.trim();
    let first = match line.chars().next() {
        Some(c) => c,
        None => return CrontabLine::Blank,
    };

    if first == '#' {
        return CrontabLine::Comment;
    }

    if first.is_uppercase() {
        return match line.split_once('=') {
            Some((name, value)) => CrontabLine::EnvVar {
                name: name.trim_end().to_string(),
                value: value.trim_start().to_string(),
            },
            None => CrontabLine::Unrecognized,
        };
    }

    let parsed = if first == '@' {
        split_alias_line(&line[1..])
    } else if first == '*' || first.is_ascii_digit() {
        split_schedule_line(line)
    } else {
        None
    };

    match parsed {
        Some((schedule, command)) => CrontabLine::Job { schedule, command },
        None => CrontabLine::Unrecognized,
    }
}

/// `daily /path/to/cmd args` after the leading '@'.
fn split_alias_line(rest: &str) -> Option<(Schedule, String)> {
    let (alias, command) = rest.split_once(char::is_whitespace)?;
    let schedule = schedule::expand(alias)?;
    let command = command.trim();
    if command.is_empty() {
        return None;
    }
    Some((schedule, command.to_string()))
}

/// Five whitespace separated fields, then the command. The command keeps its
/// own inner spacing so it renders back byte for byte.
fn split_schedule_line(line: &str) -> Option<(Schedule, String)> {
    let mut fields = Vec::with_capacity(5);
    let mut rest = line;

    for _ in 0..5 {
        rest = rest.trim_start();
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        if end == 0 {
            return None;
        }
        fields.push(&rest[..end]);
        rest = &rest[end..];
    }

    let command = rest.trim();
    if command.is_empty() {
        return None;
    }

    Some((Schedule::from_fields(&fields[..])?, command.to_string()))
}

/// Parse a whole crontab dump. Environment assignments attach to the next
/// job line; assignments not followed by any job are dropped, as are lines
/// that cannot be classified. Never fails.
pub fn parse(text: &str) -> Vec<Cronjob> {
    let mut cronjobs = Vec::new();
    let mut env = BTreeMap::new();

    for line in text.lines() {
        match classify(line) {
            CrontabLine::Blank | CrontabLine::Comment => {}
            CrontabLine::EnvVar { name, value } => {
                env.insert(name, value);
            }
            CrontabLine::Job { schedule, command } => {
                cronjobs.push(Cronjob {
                    schedule,
                    command,
                    env: std::mem::take(&mut env),
                });
            }
            CrontabLine::Unrecognized => {
                log::debug!("skipping unrecognized crontab line: {}", line.trim());
            }
        }
    }

    if !env.is_empty() {
        log::debug!("dropping {} trailing environment assignment(s)", env.len());
    }

    cronjobs
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPLETE: &str = "\
# DO NOT EDIT THIS FILE - edit the master and reinstall.
# m h  dom mon dow   command

15 14 1 * * /bin/false >> /dev/null 2>&1

MAILTO=\"\"
@daily /bin/false

SHELL=/bin/zsh
MAILTO=foo@example.com
15 14 1 * * $HOME/bin/false

   # indented comment
SHELL=/bin/csh
MAILTO=bar@example.com
PATH=/path/to/foo/bin

* * * * 0 /bin/false >> /dev/null 2>&1

FOO=/bin/csh
BAR=bar@example.com
BAZ=/path/to/foo/bin
* * * 0 * /bin/true >> /dev/null 2>&1
";

    fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_complete_fixture() {
        let obtained = parse(COMPLETE);

        let expected = vec![
            Cronjob {
                schedule: Schedule::new("15", "14", "1", "*", "*"),
                command: "/bin/false >> /dev/null 2>&1".to_string(),
                env: env(&[]),
            },
            Cronjob {
                schedule: schedule::expand("daily").unwrap(),
                command: "/bin/false".to_string(),
                env: env(&[("MAILTO", "\"\"")]),
            },
            Cronjob {
                schedule: Schedule::new("15", "14", "1", "*", "*"),
                command: "$HOME/bin/false".to_string(),
                env: env(&[("SHELL", "/bin/zsh"), ("MAILTO", "foo@example.com")]),
            },
            Cronjob {
                schedule: Schedule::new("*", "*", "*", "*", "0"),
                command: "/bin/false >> /dev/null 2>&1".to_string(),
                env: env(&[
                    ("SHELL", "/bin/csh"),
                    ("MAILTO", "bar@example.com"),
                    ("PATH", "/path/to/foo/bin"),
                ]),
            },
            Cronjob {
                schedule: Schedule::new("*", "*", "*", "0", "*"),
                command: "/bin/true >> /dev/null 2>&1".to_string(),
                env: env(&[
                    ("FOO", "/bin/csh"),
                    ("BAR", "bar@example.com"),
                    ("BAZ", "/path/to/foo/bin"),
                ]),
            },
        ];

        assert_eq!(obtained.len(), expected.len());
        assert_eq!(obtained, expected);
    }

    #[test]
    fn test_parse_mixed_alias_and_fields() {
        let obtained = parse("15 14 1 * * /bin/false\n\nMAILTO=\"\"\n@daily /bin/false\n");
        assert_eq!(
            obtained,
            vec![
                Cronjob::new(Schedule::new("15", "14", "1", "*", "*"), "/bin/false"),
                Cronjob::new(Schedule::new("0", "0", "*", "*", "*"), "/bin/false")
                    .with_env("MAILTO", "\"\""),
            ]
        );
    }

    #[test]
    fn test_parse_drops_orphan_env() {
        let obtained = parse("MAILTO=a\n@hourly /bin/true\nPATH=/bin\n");
        assert_eq!(obtained.len(), 1);
        assert_eq!(obtained[0].env, env(&[("MAILTO", "a")]));
    }

    #[test]
    fn test_parse_env_resets_between_jobs() {
        let obtained = parse("MAILTO=a\n@hourly /bin/true\n@daily /bin/false\n");
        assert_eq!(obtained.len(), 2);
        assert!(obtained[1].env.is_empty());
    }

    #[test]
    fn test_parse_skips_unrecognized() {
        let obtained = parse("@reboot /bin/true\nlowercase=1\n1 2 3 /bin/short\nWORD\n@daily /bin/true\n");
        assert_eq!(obtained.len(), 1);
        assert_eq!(obtained[0].schedule, schedule::expand("daily").unwrap());
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse("").is_empty());
        assert!(parse("\n\n# only comments\n").is_empty());
    }

    #[test]
    fn test_classify_comment() {
        assert_eq!(classify("     # xxxxxx"), CrontabLine::Comment);
    }

    #[test]
    fn test_classify_blank() {
        assert_eq!(classify("\t\t"), CrontabLine::Blank);
        assert_eq!(classify(""), CrontabLine::Blank);
    }

    #[test]
    fn test_classify_env_var() {
        for line in ["Foo=bar", "FOO=bar"] {
            assert!(matches!(classify(line), CrontabLine::EnvVar { .. }));
        }
        assert_eq!(
            classify("PATH=/usr/bin:/bin=x"),
            CrontabLine::EnvVar {
                name: "PATH".to_string(),
                value: "/usr/bin:/bin=x".to_string()
            }
        );
        assert_eq!(classify("foo=bar"), CrontabLine::Unrecognized);
        assert_eq!(classify("FOO"), CrontabLine::Unrecognized);
    }

    #[test]
    fn test_classify_job_lines() {
        for line in ["@daily aaaaa", "15 14 1 * * yyyy", "* * * * 0 xxxx"] {
            assert!(matches!(classify(line), CrontabLine::Job { .. }), "{}", line);
        }
    }

    #[test]
    fn test_classify_splits_schedule_and_command() {
        let cmd = "/bin/false >> /dev/null 2>&1";

        assert_eq!(
            classify(&format!("15 14 1 * * {}", cmd)),
            CrontabLine::Job {
                schedule: Schedule::new("15", "14", "1", "*", "*"),
                command: cmd.to_string(),
            }
        );

        assert_eq!(
            classify(&format!("@daily {}", cmd)),
            CrontabLine::Job {
                schedule: schedule::expand("daily").unwrap(),
                command: cmd.to_string(),
            }
        );
    }

    #[test]
    fn test_classify_tabs_between_fields() {
        assert_eq!(
            classify("0\t0  *\t* *\t/bin/true"),
            CrontabLine::Job {
                schedule: Schedule::new("0", "0", "*", "*", "*"),
                command: "/bin/true".to_string(),
            }
        );
    }

    #[test]
    fn test_classify_incomplete_job_lines() {
        assert_eq!(classify("0 0 * * *"), CrontabLine::Unrecognized);
        assert_eq!(classify("@daily"), CrontabLine::Unrecognized);
        assert_eq!(classify("@weekly   "), CrontabLine::Unrecognized);
        assert_eq!(classify("@annually /bin/true"), CrontabLine::Unrecognized);
    }

    #[test]
    fn test_reparse_block_keeps_identity() {
        let job = Cronjob::new(Schedule::new("*/5", "1-3", "*", "*", "1,2"), "/bin/echo  two  spaces")
            .with_env("SHELL", "/bin/sh")
            .with_env("MAILTO", "ops@example.com");

        let reparsed = parse(&job.block());
        assert_eq!(reparsed.len(), 1);
        assert_eq!(reparsed[0].hash(), job.hash());
        assert_eq!(reparsed[0], job);
    }
}
