//! Authorization gate: which caller may perform which catalog action.
//!
//! The policy maps every [`Action`] to a [`Requirement`] and is checked once
//! at the entry point of every catalog operation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Fine-grained permission grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    AddBook,
    ChangeBook,
    DeleteBook,
    ViewBook,
    AddAuthor,
}

impl Permission {
    pub const ALL: [Permission; 5] = [
        Self::AddBook,
        Self::ChangeBook,
        Self::DeleteBook,
        Self::ViewBook,
        Self::AddAuthor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddBook => "add_book",
            Self::ChangeBook => "change_book",
            Self::DeleteBook => "delete_book",
            Self::ViewBook => "view_book",
            Self::AddAuthor => "add_author",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown permission '{}'", s))
    }
}

/// Operations a caller can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Create,
    ReadList,
    ReadDetail,
    Update,
    Delete,
    ViewStats,
    ReadAuthors,
    CreateAuthor,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::ReadList => "read-list",
            Self::ReadDetail => "read-detail",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::ViewStats => "view-stats",
            Self::ReadAuthors => "read-authors",
            Self::CreateAuthor => "create-author",
        };
        f.write_str(name)
    }
}

/// What an action demands of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Anyone,
    Authenticated,
    Grant(Permission),
}

/// Policy table: the requirement each action places on the caller.
pub const fn requirement_for(action: Action) -> Requirement {
    match action {
        Action::ReadList | Action::ViewStats | Action::ReadAuthors => Requirement::Anyone,
        Action::ReadDetail => Requirement::Authenticated,
        Action::Create => Requirement::Grant(Permission::AddBook),
        Action::Update => Requirement::Grant(Permission::ChangeBook),
        Action::Delete => Requirement::Grant(Permission::DeleteBook),
        Action::CreateAuthor => Requirement::Grant(Permission::AddAuthor),
    }
}

/// The identity a request runs as.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Caller {
    #[default]
    Anonymous,
    User {
        username: String,
        permissions: BTreeSet<Permission>,
    },
}

impl Caller {
    pub fn user(username: impl Into<String>, permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self::User {
            username: username.into(),
            permissions: permissions.into_iter().collect(),
        }
    }

    /// Authenticated caller without any fine-grained grant.
    pub fn authenticated(username: impl Into<String>) -> Self {
        Self::User {
            username: username.into(),
            permissions: BTreeSet::new(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::User { .. })
    }

    pub fn has(&self, permission: Permission) -> bool {
        match self {
            Self::Anonymous => false,
            Self::User { permissions, .. } => permissions.contains(&permission),
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::User { username, .. } => Some(username),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    /// No identity was presented.
    #[error("authentication required for {action}")]
    Unauthenticated { action: Action },
    /// Identity known but lacking the grant.
    #[error("forbidden: {action} requires {permission}")]
    Forbidden {
        action: Action,
        permission: Permission,
    },
}

/// Anonymous callers pass only open actions; every other action first needs
/// an identity, then its grant.
pub fn authorize(caller: &Caller, action: Action) -> Result<(), AuthorizationError> {
    let requirement = requirement_for(action);
    if requirement == Requirement::Anyone {
        return Ok(());
    }
    if !caller.is_authenticated() {
        return Err(AuthorizationError::Unauthenticated { action });
    }
    match requirement {
        Requirement::Anyone | Requirement::Authenticated => Ok(()),
        Requirement::Grant(permission) if caller.has(permission) => Ok(()),
        Requirement::Grant(permission) => Err(AuthorizationError::Forbidden { action, permission }),
    }
}

pub fn is_allowed(caller: &Caller, action: Action) -> bool {
    authorize(caller, action).is_ok()
}
