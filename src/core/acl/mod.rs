// src/core/acl/mod.rs

//! Identity & Access (spec component A).

pub mod enforcer;
pub mod token;
pub mod user;

pub use enforcer::{IamStore, SharedIamStore, resource_matches};
pub use user::{Action, Permission, Principal, RoleBinding};
