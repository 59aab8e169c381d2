use anyhow::{Result, bail};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;

use super::status::Status;

pub type Args = HashMap<String, String>;

pub struct IoStreams<'a> {
    #[allow(dead_code)]
    pub stdin: &'a mut dyn Read,
    pub stdout: &'a mut dyn Write,
    pub stderr: &'a mut dyn Write,
}

/// A resource addressed by URL that answers a fixed set of verbs.
pub trait Handle: Send + Sync {
    fn verbs(&self) -> &'static [&'static str];
    fn call(&self, verb: &str, args: &Args, io: &mut IoStreams) -> Result<Status>;
}

type Constructor = Arc<dyn Fn(&url::Url) -> Result<Box<dyn Handle>> + Send + Sync>;

#[derive(Default)]
pub struct Registry {
    schemes: HashMap<String, Constructor>,
}

impl Registry {
    pub fn list_schemes(&self) -> Vec<String> {
        let mut v: Vec<String> = self.schemes.keys().cloned().collect();
        v.sort();
        v
    }

    pub fn register_scheme<F>(&mut self, scheme: &str, ctor: F)
    where
        F: Fn(&url::Url) -> Result<Box<dyn Handle>> + 'static + Send + Sync,
    {
        self.schemes.insert(scheme.to_string(), Arc::new(ctor));
    }

    pub fn resolve(&self, target: &str) -> Result<Box<dyn Handle>> {
        let u = url::Url::parse(target)?;
        match self.schemes.get(u.scheme()) {
            Some(ctor) => ctor(&u),
            None => bail!("Unknown scheme: {}", u.scheme()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoHandle {
        host: String,
    }

    impl Handle for EchoHandle {
        fn verbs(&self) -> &'static [&'static str] {
            &["echo"]
        }

        fn call(&self, verb: &str, _args: &Args, io: &mut IoStreams) -> Result<Status> {
            writeln!(io.stdout, "{} {}", verb, self.host)?;
            Ok(Status::ok())
        }
    }

    #[test]
    fn test_resolve_registered_scheme() {
        let mut reg = Registry::default();
        reg.register_scheme("echo", |u| {
            Ok(Box::new(EchoHandle {
                host: u.host_str().unwrap_or_default().to_string(),
            }))
        });

        assert_eq!(reg.list_schemes(), vec!["echo".to_string()]);

        let handle = reg.resolve("echo://alice").unwrap();
        let mut stdin = std::io::empty();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let mut io = IoStreams {
            stdin: &mut stdin,
            stdout: &mut out,
            stderr: &mut err,
        };
        handle.call("echo", &Args::new(), &mut io).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "echo alice\n");
    }

    #[test]
    fn test_resolve_unknown_scheme() {
        let reg = Registry::default();
        let err = reg.resolve("nope://alice").err().unwrap();
        assert!(err.to_string().contains("Unknown scheme: nope"));
    }
}
