//! API-key authentication: maps a presented key to the caller it stands for.

use crate::domain::authz::{Caller, Permission};
use anyhow::{anyhow, bail};
use std::collections::HashMap;
use std::fmt;

/// Configured keys. Unknown or missing keys resolve to [`Caller::Anonymous`].
#[derive(Clone, Default)]
pub struct ApiKeys {
    keys: HashMap<String, Caller>,
}

// keys stay out of logs
impl fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut users: Vec<&str> = self.keys.values().filter_map(Caller::username).collect();
        users.sort_unstable();
        f.debug_struct("ApiKeys").field("users", &users).finish()
    }
}

impl ApiKeys {
    /// Parses `key=user:perm,perm;key2=user2:` (an empty permission list is
    /// an authenticated caller without grants).
    pub fn parse(spec: &str) -> anyhow::Result<Self> {
        let mut keys = HashMap::new();
        for entry in spec.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (key, rest) = entry
                .split_once('=')
                .ok_or_else(|| anyhow!("entry {:?} is missing '='", entry))?;
            let (user, perms) = rest
                .split_once(':')
                .ok_or_else(|| anyhow!("entry for {:?} is missing ':'", key.trim()))?;
            let (key, user) = (key.trim(), user.trim());
            if key.is_empty() || user.is_empty() {
                bail!("entry {:?} needs both a key and a username", entry);
            }
            let permissions = perms
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| p.parse::<Permission>().map_err(|e| anyhow!(e)))
                .collect::<anyhow::Result<Vec<_>>>()?;
            if keys
                .insert(key.to_string(), Caller::user(user, permissions))
                .is_some()
            {
                bail!("key for {:?} is configured twice", user);
            }
        }
        Ok(Self { keys })
    }

    pub fn insert(&mut self, key: impl Into<String>, caller: Caller) {
        self.keys.insert(key.into(), caller);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn resolve(&self, key: Option<&str>) -> Caller {
        key.and_then(|k| self.keys.get(k))
            .cloned()
            .unwrap_or_default()
    }
}
