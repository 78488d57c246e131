// src/core/acl/enforcer.rs

//! Implements the Identity & Access component (spec §4.A): credential
//! verification, bearer-token issuance/verification, and
//! `authorize(principal, resource, action)`.
//!
//! Structurally this mirrors the teacher's `AclEnforcer`: a process-wide,
//! `RwLock`-guarded component built once at startup and consulted on every
//! mutation, with the parsed-rule lookup replaced by a glob-pattern scan
//! against `(role, resource_pattern, action)` triples.

use super::token::TokenIssuer;
use super::user::{Action, Permission, Principal, RoleBinding};
use crate::config::AuthConfig;
use crate::core::errors::NacosError;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng};
use argon2::Argon2;
use dashmap::DashMap;
use std::sync::Arc;
use wildmatch::WildMatch;

/// The account that always authorizes, seeded at first start (spec §4.A).
pub const ROOT_ROLE: &str = "ROLE_ADMIN";

/// Process-scoped IAM state: principals, role bindings and permissions.
/// Initialized at startup (from the configured root account; persistent
/// backing for users/roles/permissions is the external KV named in the
/// spec's Non-goals) and consulted by both transport surfaces.
#[derive(Debug)]
pub struct IamStore {
    enabled: bool,
    root_username: String,
    principals: DashMap<String, Principal>,
    /// username -> set of roles.
    role_bindings: DashMap<String, Vec<String>>,
    /// role -> permissions granted to it.
    permissions: DashMap<String, Vec<Permission>>,
    token_issuer: TokenIssuer,
}

impl IamStore {
    /// Seeds the store with the configured root account, following the real
    /// Nacos server's first-boot behavior (and the batata reimplementation's
    /// `GLOBAL_ADMIN` concept): the root account is bound to `ROLE_ADMIN`,
    /// which `authorize` always grants regardless of any permission table.
    pub fn new(config: &AuthConfig) -> Result<Self, NacosError> {
        let store = Self {
            enabled: config.enabled,
            root_username: config.root_username.clone(),
            principals: DashMap::new(),
            role_bindings: DashMap::new(),
            permissions: DashMap::new(),
            token_issuer: TokenIssuer::new(&config.token_secret, config.token_ttl_seconds),
        };
        store.create_user(&config.root_username, &config.root_password)?;
        store
            .role_bindings
            .insert(config.root_username.clone(), vec![ROOT_ROLE.to_string()]);
        Ok(store)
    }

    pub fn auth_enabled(&self) -> bool {
        self.enabled
    }

    // --- Principal CRUD ---

    pub fn create_user(&self, username: &str, password: &str) -> Result<(), NacosError> {
        if self.principals.contains_key(username) {
            return Err(NacosError::AlreadyExists(format!(
                "user '{username}' already exists"
            )));
        }
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| NacosError::Internal(format!("password hashing failed: {e}")))?
            .to_string();
        self.principals.insert(
            username.to_string(),
            Principal {
                username: username.to_string(),
                password_hash: hash,
            },
        );
        Ok(())
    }

    pub fn delete_user(&self, username: &str) -> Result<(), NacosError> {
        self.principals
            .remove(username)
            .ok_or_else(|| NacosError::NotFound(format!("user '{username}' not found")))?;
        // Cascades to the user's role bindings but not to the roles themselves (spec §4.A).
        self.role_bindings.remove(username);
        Ok(())
    }

    pub fn list_users(&self) -> Vec<String> {
        self.principals.iter().map(|e| e.key().clone()).collect()
    }

    pub fn get_user(&self, username: &str) -> Option<Principal> {
        self.principals.get(username).map(|e| e.value().clone())
    }

    // --- Role bindings ---

    pub fn bind_role(&self, username: &str, role: &str) -> Result<(), NacosError> {
        if !self.principals.contains_key(username) {
            return Err(NacosError::NotFound(format!("user '{username}' not found")));
        }
        let mut roles = self.role_bindings.entry(username.to_string()).or_default();
        if !roles.contains(&role.to_string()) {
            roles.push(role.to_string());
        }
        Ok(())
    }

    pub fn unbind_role(&self, username: &str, role: &str) {
        if let Some(mut roles) = self.role_bindings.get_mut(username) {
            roles.retain(|r| r != role);
        }
    }

    /// Deleting a role cascades to its permissions (spec §4.A) and to every
    /// binding referencing it.
    pub fn delete_role(&self, role: &str) {
        self.permissions.remove(role);
        for mut entry in self.role_bindings.iter_mut() {
            entry.value_mut().retain(|r| r != role);
        }
    }

    pub fn roles_for(&self, username: &str) -> Vec<String> {
        self.role_bindings
            .get(username)
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn list_role_bindings(&self) -> Vec<RoleBinding> {
        self.role_bindings
            .iter()
            .flat_map(|e| {
                let username = e.key().clone();
                e.value()
                    .iter()
                    .map(move |role| RoleBinding {
                        role: role.clone(),
                        username: username.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    // --- Permissions ---

    pub fn grant(&self, role: &str, resource_pattern: &str, action: Action) {
        let mut perms = self.permissions.entry(role.to_string()).or_default();
        if !perms
            .iter()
            .any(|p| p.resource_pattern == resource_pattern && p.action == action)
        {
            perms.push(Permission {
                role: role.to_string(),
                resource_pattern: resource_pattern.to_string(),
                action,
            });
        }
    }

    pub fn revoke(&self, role: &str, resource_pattern: &str) {
        if let Some(mut perms) = self.permissions.get_mut(role) {
            perms.retain(|p| p.resource_pattern != resource_pattern);
        }
    }

    pub fn list_permissions(&self, role: &str) -> Vec<Permission> {
        self.permissions
            .get(role)
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// `authorize(principal, resource, action)` per spec §4.A: the principal
    /// is granted iff some bound role carries a permission whose pattern
    /// matches `resource` and whose action grants the requested one. The
    /// root account always authorizes.
    pub fn authorize(&self, username: &str, resource: &str, action: Action) -> bool {
        if username == self.root_username {
            return true;
        }
        if !self.enabled {
            return true;
        }
        for role in self.roles_for(username) {
            if role == ROOT_ROLE {
                return true;
            }
            if let Some(perms) = self.permissions.get(&role) {
                for perm in perms.iter() {
                    if perm.action.grants(action) && resource_matches(&perm.resource_pattern, resource) {
                        return true;
                    }
                }
            }
        }
        false
    }

    // --- Login / token verification ---

    pub fn login(&self, username: &str, password: &str) -> Result<String, NacosError> {
        let principal = self
            .principals
            .get(username)
            .ok_or(NacosError::Unauthenticated)?;
        let parsed_hash = PasswordHash::new(&principal.password_hash)
            .map_err(|e| NacosError::Internal(format!("corrupt password hash: {e}")))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| NacosError::Unauthenticated)?;
        Ok(self.token_issuer.issue(username))
    }

    /// `verify(token) -> principal`, with the constant-time compare delegated
    /// to the HMAC verification inside `TokenIssuer`.
    pub fn verify(&self, token: &str) -> Result<String, NacosError> {
        self.token_issuer.verify(token)
    }
}

/// Matches a three-part `namespace:group:dataId` resource against a
/// permission pattern of the same shape, segment by segment, using
/// `wildmatch` (already part of the teacher's dependency stack) so each
/// segment's `*` only ever stands for that segment.
pub fn resource_matches(pattern: &str, resource: &str) -> bool {
    let pattern_parts: Vec<&str> = pattern.splitn(3, ':').collect();
    let resource_parts: Vec<&str> = resource.splitn(3, ':').collect();
    if pattern_parts.len() != 3 || resource_parts.len() != 3 {
        return false;
    }
    pattern_parts
        .iter()
        .zip(resource_parts.iter())
        .all(|(p, r)| WildMatch::new(p).matches(r))
}

pub type SharedIamStore = Arc<IamStore>;
