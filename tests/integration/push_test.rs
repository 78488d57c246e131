// tests/integration/push_test.rs

//! Exercises the Subscription Bus and Config Notify Bus push/fan-out paths
//! end to end against a live `Registry`/`ConfigStore`, covering the
//! literal scenarios and testable properties the earlier test pass missed.

use super::test_helpers::TestContext;
use nacosd::core::configstore::ConfigKey;
use nacosd::core::notify::Fingerprint;
use nacosd::core::registry::{Instance, ServiceKey};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::timeout;

fn instance(ip: &str, port: u16, cluster: &str) -> Instance {
    Instance {
        ip: ip.to_string(),
        port,
        cluster: cluster.to_string(),
        weight: 1.0,
        healthy: true,
        enabled: true,
        ephemeral: true,
        metadata: HashMap::new(),
        instance_id: None,
        owner_session_id: None,
    }
}

async fn next(rx: &mut tokio::sync::watch::Receiver<nacosd::core::registry::ServiceInfo>) -> nacosd::core::registry::ServiceInfo {
    timeout(Duration::from_secs(1), rx.changed()).await.expect("expected a push").unwrap();
    rx.borrow_and_update().clone()
}

/// Literal scenario S1 (spec.md:199): a subscriber sees the registered
/// instance, then sees it vanish once the owning session closes.
#[tokio::test]
async fn subscriber_sees_instance_appear_and_vanish_with_owning_session() {
    let ctx = TestContext::new().await;
    let key = ServiceKey::new("public", "DEFAULT_GROUP", "svc-A");

    let s = ctx.state.sessions.open(None, Some("10.0.0.1".to_string()));
    ctx.state.registry.register(&key, instance("10.0.0.1", 8080, "DEFAULT"), Some(s)).await.unwrap();
    ctx.state.sessions.track_instance(
        s,
        key.clone(),
        nacosd::core::registry::InstanceKey { ip: "10.0.0.1".into(), port: 8080, cluster: "DEFAULT".into() },
    );

    let t = ctx.state.sessions.open(None, Some("10.0.0.9".to_string()));
    let initial = ctx.state.registry.query(&key, &[], false).await;
    let mut rx = ctx.state.subscription_bus.subscribe(&key, t, vec![], initial);
    assert_eq!(rx.borrow().hosts.len(), 1, "subscriber must see the already-registered instance immediately");

    ctx.state.sessions.close(s).await;

    let pushed = next(&mut rx).await;
    assert_eq!(pushed.hosts.len(), 0, "subscriber must be pushed an empty snapshot once the owning session closes");
}

/// Literal scenario S5 (spec.md:207) / testable property #5 (spec.md:192):
/// a cluster-filtered subscriber only ever sees instances in its filter,
/// and a mutation outside the filter produces no push.
#[tokio::test]
async fn cluster_filtered_subscriber_only_sees_its_clusters() {
    let ctx = TestContext::new().await;
    let key = ServiceKey::new("public", "DEFAULT_GROUP", "svc-B");

    ctx.state.registry.register(&key, instance("10.0.0.1", 1, "A"), None).await.unwrap();
    ctx.state.registry.register(&key, instance("10.0.0.2", 2, "B"), None).await.unwrap();
    ctx.state.registry.register(&key, instance("10.0.0.3", 3, "C"), None).await.unwrap();

    let t = ctx.state.sessions.open(None, Some("10.0.0.9".to_string()));
    let initial = ctx.state.registry.query(&key, &["A".to_string()], false).await;
    let mut rx = ctx.state.subscription_bus.subscribe(&key, t, vec!["A".to_string()], initial);
    assert_eq!(rx.borrow().hosts.len(), 1);
    assert!(rx.borrow().hosts.iter().all(|h| h.cluster == "A"));

    ctx.state.registry.register(&key, instance("10.0.0.4", 4, "A"), None).await.unwrap();
    let pushed = next(&mut rx).await;
    assert_eq!(pushed.hosts.len(), 2);
    assert!(pushed.hosts.iter().all(|h| h.cluster == "A"));

    ctx.state.registry.register(&key, instance("10.0.0.5", 5, "B"), None).await.unwrap();
    let result = timeout(Duration::from_millis(200), rx.changed()).await;
    assert!(result.is_err(), "a mutation outside the filter must not produce a push");
}

/// Literal scenario S2 (spec.md:201): a listener registered at a stale md5
/// is pushed a `ConfigChangeNotify` once the key is published.
#[tokio::test]
async fn config_listener_is_pushed_on_publish() {
    let ctx = TestContext::new().await;
    let key = ConfigKey::new("public", "DEFAULT_GROUP", "cfg1");
    let session = ctx.state.sessions.open(None, Some("10.0.0.1".to_string()));

    ctx.state.notify_bus.listen(
        session,
        None,
        vec![Fingerprint { key: key.clone(), md5: String::new() }],
        |_| None,
    );
    let mut rx = ctx.state.notify_bus.receiver_for(&key, session).expect("listener must be registered");

    ctx.state.config_store.publish(&key, "k=v".to_string(), None).await.unwrap();

    timeout(Duration::from_secs(1), rx.changed()).await.expect("expected a notify push").unwrap();
    let notify = rx.borrow_and_update().clone();
    assert_eq!(notify.content.as_deref(), Some("k=v"));
}

/// Literal scenario S3 (spec.md:203) / testable property #6 (spec.md:193):
/// a listener on the gray IP is pushed the gray content; a listener on a
/// different IP, whose resolved content hasn't changed, is not pushed.
#[tokio::test]
async fn gray_publish_only_pushes_listeners_on_the_allowlisted_ip() {
    let ctx = TestContext::new().await;
    let key = ConfigKey::new("public", "DEFAULT_GROUP", "cfg2");
    ctx.state.config_store.publish(&key, "base".to_string(), None).await.unwrap();
    let (_, base_md5, _) = ctx.state.config_store.get(&key, None).await.unwrap();

    let gray_session = ctx.state.sessions.open(None, Some("10.0.0.5".to_string()));
    let other_session = ctx.state.sessions.open(None, Some("10.0.0.6".to_string()));

    ctx.state.notify_bus.listen(
        gray_session,
        Some("10.0.0.5"),
        vec![Fingerprint { key: key.clone(), md5: base_md5.clone() }],
        |_| Some(base_md5.clone()),
    );
    ctx.state.notify_bus.listen(
        other_session,
        Some("10.0.0.6"),
        vec![Fingerprint { key: key.clone(), md5: base_md5.clone() }],
        |_| Some(base_md5.clone()),
    );
    let mut gray_rx = ctx.state.notify_bus.receiver_for(&key, gray_session).unwrap();
    let mut other_rx = ctx.state.notify_bus.receiver_for(&key, other_session).unwrap();

    ctx.state
        .config_store
        .publish_beta(&key, "gray".to_string(), vec!["10.0.0.5".to_string()])
        .await
        .unwrap();

    timeout(Duration::from_secs(1), gray_rx.changed()).await.expect("gray-ip listener must be pushed").unwrap();
    assert_eq!(gray_rx.borrow_and_update().content.as_deref(), Some("gray"));

    let result = timeout(Duration::from_millis(200), other_rx.changed()).await;
    assert!(result.is_err(), "a listener outside the allowlist must not be pushed when its resolved content is unchanged");
}
