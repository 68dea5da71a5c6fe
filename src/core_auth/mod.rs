use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use bcrypt::{hash, verify, DEFAULT_COST};
use log::{debug, warn};

/// Predicate invoked once per PASS command. Returning `true` marks the
/// session authenticated from there on.
pub type AuthenticatorFn = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Who the control connection claims to be.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    username: String,
    authenticated: bool,
}

impl Identity {
    pub fn new(username: impl Into<String>, authenticated: bool) -> Self {
        Self {
            username: username.into(),
            authenticated,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.username = username.into();
    }

    pub fn authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn set_authenticated(&mut self, authenticated: bool) {
        self.authenticated = authenticated;
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.authenticated {
            write!(f, "{{{}}}", self.username)
        } else {
            write!(f, "{{**NOTAUTH** {}}}", self.username)
        }
    }
}

/// One `username:bcrypt-hash` line of the passwd file.
#[derive(Debug, Clone)]
pub struct PasswdEntry {
    username: String,
    hashed_password: String,
}

impl PasswdEntry {
    pub fn from_line(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split(':').collect();
        if parts.len() != 2 {
            return None;
        }
        Some(PasswdEntry {
            username: parts[0].to_string(),
            hashed_password: parts[1].to_string(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn hashed_password(&self) -> &str {
        &self.hashed_password
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    hash(password, DEFAULT_COST).context("Failed to hash password")
}

pub fn verify_password(password: &str, hashed_password: &str) -> bool {
    verify(password, hashed_password).unwrap_or(false)
}

pub fn load_passwd_file(path: &str) -> Result<HashMap<String, PasswdEntry>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read passwd file: {}", path))?;

    let mut passwd_map = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match PasswdEntry::from_line(line) {
            Some(entry) => {
                passwd_map.insert(entry.username().to_string(), entry);
            }
            None => warn!("skipping malformed passwd line in {}", path),
        }
    }
    Ok(passwd_map)
}

/// Builds the injected authenticator from a passwd file.
pub fn passwd_authenticator(path: &str) -> Result<AuthenticatorFn> {
    let entries = load_passwd_file(path)?;
    Ok(Arc::new(move |username, password| {
        debug!("authentication requested for {}", username);
        entries
            .get(username)
            .map(|entry| verify_password(password, entry.hashed_password()))
            .unwrap_or(false)
    }))
}

/// Accepts any credentials. Only for setups without a passwd file.
pub fn allow_all_authenticator() -> AuthenticatorFn {
    Arc::new(|username, _password| {
        debug!("authentication requested for {}", username);
        true
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_display_masks_unauthenticated() {
        let mut id = Identity::new("alice", false);
        assert_eq!(id.to_string(), "{**NOTAUTH** alice}");

        id.set_authenticated(true);
        assert_eq!(id.to_string(), "{alice}");
    }

    #[test]
    fn passwd_entry_rejects_malformed_lines() {
        assert!(PasswdEntry::from_line("no-colon-here").is_none());
        assert!(PasswdEntry::from_line("too:many:colons").is_none());

        let entry = PasswdEntry::from_line("bob:$2b$12$abcdef").unwrap();
        assert_eq!(entry.username(), "bob");
        assert_eq!(entry.hashed_password(), "$2b$12$abcdef");
    }

    #[test]
    fn verify_roundtrip() {
        let hashed = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hashed));
        assert!(!verify_password("hunter3", &hashed));
    }

    #[test]
    fn verify_rejects_garbage_hash() {
        assert!(!verify_password("hunter2", "not-a-bcrypt-hash"));
    }
}
