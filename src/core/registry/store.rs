// src/core/registry/store.rs

//! The Service Registry (spec §4.C): holds services, clusters and instances,
//! and resolves queries with cluster/health filters.
//!
//! Concurrency follows spec §5: "Registry uses per-service fine-grained
//! mutual exclusion... readers never block writers on a different service."
//! Grounded on the teacher's habit of putting one `Arc<Mutex<_>>` per
//! concurrently-mutated unit behind a `DashMap` (see `ServerState::clients`
//! and `PubSubManager::channels`): each service gets its own lock, so two
//! services never contend.

use super::model::{Cluster, HealthCheckPolicy, Instance, InstanceKey, Service, ServiceInfo, ServiceKey};
use crate::core::errors::NacosError;
use crate::core::metrics;
use crate::core::subscription::SubscriptionBus;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

pub struct Registry {
    services: DashMap<ServiceKey, Arc<Mutex<ServiceSlot>>>,
    subscription_bus: Arc<SubscriptionBus>,
    empty_gc_grace: Duration,
}

struct ServiceSlot {
    service: Service,
    empty_since: Option<Instant>,
}

impl Registry {
    pub fn new(subscription_bus: Arc<SubscriptionBus>, empty_gc_grace: Duration) -> Self {
        Self {
            services: DashMap::new(),
            subscription_bus,
            empty_gc_grace,
        }
    }

    fn slot_for(&self, key: &ServiceKey) -> Arc<Mutex<ServiceSlot>> {
        self.services
            .entry(key.clone())
            .or_insert_with(|| {
                metrics::REGISTERED_SERVICES.inc();
                Arc::new(Mutex::new(ServiceSlot {
                    service: Service::default(),
                    empty_since: None,
                }))
            })
            .clone()
    }

    /// `register` (spec §4.C). Ephemeral instances require `session_id`.
    /// Re-registering the identical (ip, port, cluster) with identical
    /// fields is a structural no-op: no event is emitted (invariant 1).
    pub async fn register(
        &self,
        key: &ServiceKey,
        mut instance: Instance,
        session_id: Option<u64>,
    ) -> Result<(), NacosError> {
        if instance.weight < 0.0 {
            return Err(NacosError::InvalidArgument("weight must be >= 0".into()));
        }
        if instance.ephemeral {
            let session_id = session_id.ok_or_else(|| {
                NacosError::InvalidArgument("ephemeral instance requires a session".into())
            })?;
            instance.owner_session_id = Some(session_id);
        } else {
            instance.owner_session_id = None;
        }

        let slot = self.slot_for(key);
        let mut guard = slot.lock().await;
        let cluster = guard
            .service
            .clusters
            .entry(instance.cluster.clone())
            .or_insert_with(|| Cluster {
                name: instance.cluster.clone(),
                health_check: HealthCheckPolicy::None,
                instances: Default::default(),
            });

        let ikey = instance.key();
        let is_noop = cluster
            .instances
            .get(&ikey)
            .is_some_and(|existing| existing.same_state(&instance));

        if is_noop {
            return Ok(());
        }
        if instance.instance_id.is_none() {
            instance.instance_id = Some(format!(
                "{}#{}#{}#{}",
                instance.ip, instance.port, instance.cluster, key
            ));
        }
        cluster.instances.insert(ikey, instance);
        guard.service.revision += 1;
        guard.empty_since = None;
        metrics::REGISTERED_INSTANCES.inc();
        metrics::REGISTRY_MUTATIONS_TOTAL.with_label_values(&["register"]).inc();

        let snapshot = SubscriptionBus::snapshot(key, &guard.service);
        drop(guard);
        self.subscription_bus.publish(key, snapshot).await;
        Ok(())
    }

    pub async fn batch_register(
        &self,
        key: &ServiceKey,
        instances: Vec<Instance>,
        session_id: Option<u64>,
    ) -> Result<(), NacosError> {
        for instance in instances {
            self.register(key, instance, session_id).await?;
        }
        Ok(())
    }

    /// `deregister`: a non-existent instance is a no-op success (spec §4.C).
    pub async fn deregister(&self, key: &ServiceKey, ikey: &InstanceKey) -> Result<(), NacosError> {
        let Some(slot) = self.services.get(key).map(|e| e.clone()) else {
            return Ok(());
        };
        let mut guard = slot.lock().await;
        let removed = guard
            .service
            .clusters
            .get_mut(&ikey.cluster)
            .and_then(|c| c.instances.remove(ikey))
            .is_some();

        if !removed {
            return Ok(());
        }
        guard.service.revision += 1;
        metrics::REGISTERED_INSTANCES.dec();
        metrics::REGISTRY_MUTATIONS_TOTAL.with_label_values(&["deregister"]).inc();

        if guard.service.is_empty() {
            guard.empty_since = Some(Instant::now());
        }
        let snapshot = SubscriptionBus::snapshot(key, &guard.service);
        drop(guard);
        self.subscription_bus.publish(key, snapshot).await;
        Ok(())
    }

    /// Called by the Session Manager's cleanup path: deregisters every
    /// ephemeral instance owned by `session_id` within this service.
    pub async fn deregister_owned_by_session(&self, key: &ServiceKey, session_id: u64) {
        let Some(slot) = self.services.get(key).map(|e| e.clone()) else {
            return;
        };
        let mut guard = slot.lock().await;
        let mut removed_any = false;
        for cluster in guard.service.clusters.values_mut() {
            let before = cluster.instances.len();
            cluster
                .instances
                .retain(|_, i| i.owner_session_id != Some(session_id));
            let removed = before - cluster.instances.len();
            if removed > 0 {
                metrics::REGISTERED_INSTANCES.sub(removed as f64);
                removed_any = true;
            }
        }
        if !removed_any {
            return;
        }
        guard.service.revision += 1;
        if guard.service.is_empty() {
            guard.empty_since = Some(Instant::now());
        }
        let snapshot = SubscriptionBus::snapshot(key, &guard.service);
        drop(guard);
        self.subscription_bus.publish(key, snapshot).await;
    }

    /// `updateInstance`: same semantics as register for an existing instance.
    pub async fn update_instance(
        &self,
        key: &ServiceKey,
        instance: Instance,
    ) -> Result<(), NacosError> {
        self.register(key, instance, None).await
    }

    /// Admin override of health for a non-ephemeral instance (spec §4.C).
    pub async fn update_health(
        &self,
        key: &ServiceKey,
        ikey: &InstanceKey,
        healthy: bool,
    ) -> Result<(), NacosError> {
        let slot = self
            .services
            .get(key)
            .map(|e| e.clone())
            .ok_or_else(|| NacosError::NotFound(format!("service '{key}' not found")))?;
        let mut guard = slot.lock().await;
        let instance = guard
            .service
            .clusters
            .get_mut(&ikey.cluster)
            .and_then(|c| c.instances.get_mut(ikey))
            .ok_or_else(|| NacosError::NotFound("instance not found".into()))?;
        if instance.ephemeral {
            return Err(NacosError::InvalidArgument(
                "health of ephemeral instances is driven by the owning session, not admin override".into(),
            ));
        }
        if instance.healthy == healthy {
            return Ok(());
        }
        instance.healthy = healthy;
        guard.service.revision += 1;
        metrics::REGISTRY_MUTATIONS_TOTAL.with_label_values(&["update_health"]).inc();
        let snapshot = SubscriptionBus::snapshot(key, &guard.service);
        drop(guard);
        self.subscription_bus.publish(key, snapshot).await;
        Ok(())
    }

    /// `query(svcKey, clusters?, healthyOnly)` (spec §4.C). An empty/omitted
    /// `clusters` filter means "all clusters".
    pub async fn query(
        &self,
        key: &ServiceKey,
        clusters: &[String],
        healthy_only: bool,
    ) -> ServiceInfo {
        match self.services.get(key) {
            Some(slot) => {
                let guard = slot.lock().await;
                Self::snapshot_locked(&guard.service, key, clusters, healthy_only)
            }
            None => ServiceInfo {
                namespace: key.namespace.clone(),
                group: key.group.clone(),
                name: key.name.clone(),
                clusters: clusters.to_vec(),
                hosts: vec![],
                cache_millis: 3000,
                checksum: String::new(),
                last_ref_time: now_millis(),
            },
        }
    }

    fn snapshot_locked(
        service: &Service,
        key: &ServiceKey,
        clusters: &[String],
        healthy_only: bool,
    ) -> ServiceInfo {
        let hosts: Vec<Instance> = service
            .clusters
            .values()
            .filter(|c| clusters.is_empty() || clusters.contains(&c.name))
            .flat_map(|c| c.instances.values().cloned())
            .filter(|i| !healthy_only || i.healthy)
            .collect();
        ServiceInfo {
            namespace: key.namespace.clone(),
            group: key.group.clone(),
            name: key.name.clone(),
            clusters: clusters.to_vec(),
            hosts,
            cache_millis: 3000,
            checksum: format!("{}:{}", key, service.revision),
            last_ref_time: now_millis(),
        }
    }

    /// `listServices(namespace, group, page, pageSize)`: ordered by name,
    /// 1-based paging. `prefix` is the supplemented fuzzy-listing filter.
    pub fn list_services(
        &self,
        namespace: &str,
        group: &str,
        prefix: Option<&str>,
        page: usize,
        page_size: usize,
    ) -> (Vec<String>, usize) {
        let mut names: Vec<String> = self
            .services
            .iter()
            .filter(|e| e.key().namespace == namespace && e.key().group == group)
            .map(|e| e.key().name.clone())
            .filter(|name| prefix.is_none_or(|p| name.starts_with(p)))
            .collect();
        names.sort();
        let total = names.len();
        let page = page.max(1);
        let start = (page - 1).saturating_mul(page_size).min(total);
        let end = start.saturating_add(page_size).min(total);
        (names[start..end].to_vec(), total)
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    /// Whether any service is registered under `namespace`, in any group —
    /// used by namespace deletion's "still in use" check (spec §3).
    pub fn has_services_in_namespace(&self, namespace: &str) -> bool {
        self.services.iter().any(|e| e.key().namespace == namespace)
    }

    pub async fn instance_count_total(&self) -> usize {
        let mut total = 0;
        for entry in self.services.iter() {
            total += entry.value().lock().await.service.instance_count();
        }
        total
    }

    /// Background sweep: removes services that have been empty (no
    /// instances, no subscribers) for longer than the configured grace
    /// period, per spec §4.C's tombstone rule.
    pub async fn sweep_tombstones(&self) {
        let candidates: Vec<ServiceKey> = self.services.iter().map(|e| e.key().clone()).collect();
        for key in candidates {
            let Some(slot) = self.services.get(&key).map(|e| e.clone()) else {
                continue;
            };
            let should_remove = {
                let guard = slot.lock().await;
                guard.service.is_empty()
                    && self.subscription_bus.subscriber_count(&key) == 0
                    && guard
                        .empty_since
                        .is_some_and(|since| since.elapsed() >= self.empty_gc_grace)
            };
            if should_remove {
                self.services.remove(&key);
                metrics::REGISTERED_SERVICES.dec();
            }
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
