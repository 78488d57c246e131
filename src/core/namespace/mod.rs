// src/core/namespace/mod.rs

//! Namespace management (spec §3 "Namespace"): a thin metadata layer over
//! the registry/config store's `namespace` field. Grounded on the same
//! `DashMap`-of-records shape as `core::acl::enforcer::IamStore`, since a
//! namespace record is just as small and admin-mutated.

use crate::core::constants::DEFAULT_NAMESPACE_ID;
use crate::core::errors::NacosError;
use crate::core::registry::Registry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Namespace {
    pub namespace_id: String,
    pub namespace_name: String,
    pub namespace_desc: String,
}

/// Process-scoped namespace metadata. `public` always exists and cannot be
/// deleted, mirroring the real server's reserved default namespace.
pub struct NamespaceStore {
    namespaces: DashMap<String, Namespace>,
}

impl NamespaceStore {
    pub fn new() -> Self {
        let store = Self { namespaces: DashMap::new() };
        store.namespaces.insert(
            DEFAULT_NAMESPACE_ID.to_string(),
            Namespace {
                namespace_id: DEFAULT_NAMESPACE_ID.to_string(),
                namespace_name: "public".to_string(),
                namespace_desc: String::new(),
            },
        );
        store
    }

    pub fn create(&self, namespace_id: String, name: String, desc: String) -> Result<(), NacosError> {
        if self.namespaces.contains_key(&namespace_id) {
            return Err(NacosError::AlreadyExists(format!("namespace '{namespace_id}' already exists")));
        }
        self.namespaces.insert(namespace_id.clone(), Namespace {
            namespace_id,
            namespace_name: name,
            namespace_desc: desc,
        });
        Ok(())
    }

    pub fn update(&self, namespace_id: &str, name: String, desc: String) -> Result<(), NacosError> {
        let mut entry = self
            .namespaces
            .get_mut(namespace_id)
            .ok_or_else(|| NacosError::NotFound(format!("namespace '{namespace_id}' not found")))?;
        entry.namespace_name = name;
        entry.namespace_desc = desc;
        Ok(())
    }

    /// Deletion is rejected while the namespace still holds services or
    /// configs (spec §3). `has_configs` is resolved by the caller
    /// (`http::namespace`), since `ConfigStore::export_entries` is async
    /// and this store's own methods are all synchronous.
    pub fn delete(&self, namespace_id: &str, registry: &Registry, has_configs: bool) -> Result<(), NacosError> {
        if namespace_id == DEFAULT_NAMESPACE_ID {
            return Err(NacosError::InvalidArgument("the public namespace cannot be deleted".into()));
        }
        if !self.namespaces.contains_key(namespace_id) {
            return Err(NacosError::NotFound(format!("namespace '{namespace_id}' not found")));
        }
        if registry.has_services_in_namespace(namespace_id) || has_configs {
            return Err(NacosError::Conflict("namespace still contains services or configs".into()));
        }
        self.namespaces.remove(namespace_id);
        Ok(())
    }

    pub fn get(&self, namespace_id: &str) -> Option<Namespace> {
        self.namespaces.get(namespace_id).map(|e| e.clone())
    }

    pub fn list(&self) -> Vec<Namespace> {
        let mut out: Vec<Namespace> = self.namespaces.iter().map(|e| e.value().clone()).collect();
        out.sort_by(|a, b| a.namespace_id.cmp(&b.namespace_id));
        out
    }
}

impl Default for NamespaceStore {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedNamespaceStore = Arc<NamespaceStore>;
