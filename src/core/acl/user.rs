// src/core/acl/user.rs

//! Identity & Access data model (spec component A): principals, role bindings
//! and permissions, per the `namespace:group:dataId` resource-pattern model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A principal: a username with a salted password hash. Verified with argon2,
/// the same crate the teacher already depends on for its own ACL users.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Principal {
    pub username: String,
    pub password_hash: String,
}

/// The action a permission grants. `ReadWrite` is granted whenever a rule
/// requests `Read` or `Write`, matching the spec's `rw ⊇ r, w, rw` rule.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Write,
    ReadWrite,
}

impl Action {
    /// True if a grant of `self` satisfies a request for `required`.
    pub fn grants(self, required: Action) -> bool {
        match (self, required) {
            (Action::ReadWrite, _) => true,
            (granted, required) => granted == required,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Read => "r",
            Action::Write => "w",
            Action::ReadWrite => "rw",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "r" => Some(Action::Read),
            "w" => Some(Action::Write),
            "rw" => Some(Action::ReadWrite),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A permission triple: a role may act on resources matching `pattern`
/// (three colon-separated globs: `namespace:group:dataId`) with `action`.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Permission {
    pub role: String,
    pub resource_pattern: String,
    pub action: Action,
}

/// A (role, username) binding — many-to-many between principals and roles.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Hash)]
pub struct RoleBinding {
    pub role: String,
    pub username: String,
}
