use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::ffi::{CStr, CString};
use thiserror::Error;
use url::Url;

use crate::core::{
    registry::{Args, Handle, IoStreams},
    status::Status,
};

/// User lookup error types
#[derive(Debug, Error)]
pub enum UserError {
    #[error("username is required")]
    UsernameRequired,

    #[error("invalid username: {0}")]
    UsernameInvalid(String),

    #[error("user '{0}' not found")]
    UserNotFound(String),

    #[error("uid {0} has no passwd entry")]
    UidNotFound(u32),
}

impl UserError {
    pub fn code(&self) -> &'static str {
        match self {
            UserError::UsernameRequired => "user.username_required",
            UserError::UsernameInvalid(_) => "user.username_invalid",
            UserError::UserNotFound(_) => "user.not_found",
            UserError::UidNotFound(_) => "user.uid_not_found",
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        })
    }
}

/// A resolved account from the passwd database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemUser {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub home: Option<String>,
}

impl SystemUser {
    pub fn new(name: impl Into<String>, uid: u32, gid: u32) -> Self {
        Self {
            name: name.into(),
            uid,
            gid,
            home: None,
        }
    }
}

/// Source of user records, split out so handles can be tested without
/// depending on the accounts of the machine running the tests.
pub trait UserLookup: Send + Sync {
    fn lookup(&self, username: &str) -> Result<SystemUser, UserError>;
    fn current(&self) -> Result<SystemUser, UserError>;
}

#[derive(Debug, Default)]
pub struct SystemUserLookup;

impl SystemUserLookup {
    pub fn new() -> Self {
        Self
    }
}

/// # Safety
/// `pwd` must be a non-null pointer returned by getpwnam/getpwuid and not yet
/// invalidated by another call into the passwd database.
unsafe fn user_from_passwd(pwd: *const libc::passwd) -> SystemUser {
    let pwd = &*pwd;
    let name = CStr::from_ptr(pwd.pw_name).to_string_lossy().to_string();
    let home = if pwd.pw_dir.is_null() {
        None
    } else {
        Some(CStr::from_ptr(pwd.pw_dir).to_string_lossy().to_string())
    };

    SystemUser {
        name,
        uid: pwd.pw_uid,
        gid: pwd.pw_gid,
        home,
    }
}

impl UserLookup for SystemUserLookup {
    fn lookup(&self, username: &str) -> Result<SystemUser, UserError> {
        if username.is_empty() {
            return Err(UserError::UsernameRequired);
        }
        let c_username =
            CString::new(username).map_err(|_| UserError::UsernameInvalid(username.to_string()))?;

        unsafe {
            let pwd_ptr = libc::getpwnam(c_username.as_ptr());
            if pwd_ptr.is_null() {
                Err(UserError::UserNotFound(username.to_string()))
            } else {
                Ok(user_from_passwd(pwd_ptr))
            }
        }
    }

    fn current(&self) -> Result<SystemUser, UserError> {
        unsafe {
            let uid = libc::getuid();
            let pwd_ptr = libc::getpwuid(uid);
            if pwd_ptr.is_null() {
                Err(UserError::UidNotFound(uid))
            } else {
                Ok(user_from_passwd(pwd_ptr))
            }
        }
    }
}

/// Resolve the owner named by a URL host, falling back to the invoking user
/// when the host is empty.
pub fn resolve_owner(lookup: &dyn UserLookup, name: Option<&str>) -> Result<SystemUser, UserError> {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(n) => lookup.lookup(n),
        None => lookup.current(),
    }
}

pub fn register(reg: &mut crate::core::Registry) {
    reg.register_scheme("user", |u| Ok(Box::new(UserHandle::from_url(u)?)));
}

pub struct UserHandle {
    username: Option<String>,
    lookup: Box<dyn UserLookup>,
}

impl UserHandle {
    pub fn from_url(u: &Url) -> Result<Self> {
        Ok(Self {
            username: u.host_str().map(|h| h.to_string()),
            lookup: Box::new(SystemUserLookup::new()),
        })
    }

    fn info_verb(&self, io: &mut IoStreams) -> Result<Status> {
        match resolve_owner(self.lookup.as_ref(), self.username.as_deref()) {
            Ok(user) => {
                let response = json!({
                    "ok": true,
                    "user": user,
                });
                writeln!(io.stdout, "{}", serde_json::to_string_pretty(&response)?)?;
                Ok(Status::ok())
            }
            Err(e) => {
                writeln!(io.stderr, "{}", serde_json::to_string_pretty(&e.to_json())?)?;
                Ok(Status::err(1, e.to_string()))
            }
        }
    }
}

impl Handle for UserHandle {
    fn verbs(&self) -> &'static [&'static str] {
        &["info"]
    }

    fn call(&self, verb: &str, _args: &Args, io: &mut IoStreams) -> Result<Status> {
        match verb {
            "info" => self.info_verb(io),
            _ => Err(anyhow::anyhow!("Unknown method: {}", verb)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Fixed passwd table for handle tests.
    pub(crate) struct MockLookup {
        users: HashMap<String, SystemUser>,
        current: String,
    }

    impl MockLookup {
        pub(crate) fn new(current: &str) -> Self {
            let mut users = HashMap::new();
            users.insert("root".to_string(), SystemUser::new("root", 0, 0));
            users.insert("alice".to_string(), SystemUser::new("alice", 1001, 1001));
            Self {
                users,
                current: current.to_string(),
            }
        }
    }

    impl UserLookup for MockLookup {
        fn lookup(&self, username: &str) -> Result<SystemUser, UserError> {
            self.users
                .get(username)
                .cloned()
                .ok_or_else(|| UserError::UserNotFound(username.to_string()))
        }

        fn current(&self) -> Result<SystemUser, UserError> {
            self.lookup(&self.current)
        }
    }

    #[test]
    fn test_system_lookup_root() {
        let user = SystemUserLookup::new().lookup("root").unwrap();
        assert_eq!(user.name, "root");
        assert_eq!(user.uid, 0);
    }

    #[test]
    fn test_system_lookup_unknown_user() {
        let err = SystemUserLookup::new()
            .lookup("no-such-user-cronsync")
            .unwrap_err();
        assert!(matches!(err, UserError::UserNotFound(_)));
        assert_eq!(err.code(), "user.not_found");
    }

    #[test]
    fn test_system_lookup_rejects_nul() {
        let err = SystemUserLookup::new().lookup("ro\0ot").unwrap_err();
        assert!(matches!(err, UserError::UsernameInvalid(_)));
    }

    #[test]
    fn test_resolve_owner_falls_back_to_current() {
        let lookup = MockLookup::new("alice");
        assert_eq!(resolve_owner(&lookup, None).unwrap().name, "alice");
        assert_eq!(resolve_owner(&lookup, Some("  ")).unwrap().name, "alice");
        assert_eq!(resolve_owner(&lookup, Some("root")).unwrap().uid, 0);
        assert!(resolve_owner(&lookup, Some("bob")).is_err());
    }

    #[test]
    fn test_info_verb_reports_missing_user() {
        let handle = UserHandle {
            username: Some("bob".to_string()),
            lookup: Box::new(MockLookup::new("alice")),
        };
        let mut stdin = std::io::empty();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let mut io = IoStreams {
            stdin: &mut stdin,
            stdout: &mut out,
            stderr: &mut err,
        };

        let status = handle.call("info", &Args::new(), &mut io).unwrap();
        assert!(!status.ok);
        assert!(String::from_utf8(err).unwrap().contains("user.not_found"));
    }
}
