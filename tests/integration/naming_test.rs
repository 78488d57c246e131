// tests/integration/naming_test.rs

//! Exercises the Service Registry and the Session Manager's ownership of
//! ephemeral instances end to end.

use super::test_helpers::TestContext;
use nacosd::core::registry::{Instance, InstanceKey, ServiceKey};
use std::collections::HashMap;

fn instance(ip: &str, port: u16, ephemeral: bool) -> Instance {
    Instance {
        ip: ip.to_string(),
        port,
        cluster: "DEFAULT".to_string(),
        weight: 1.0,
        healthy: true,
        enabled: true,
        ephemeral,
        metadata: HashMap::new(),
        instance_id: None,
        owner_session_id: None,
    }
}

#[tokio::test]
async fn register_and_query_roundtrip() {
    let ctx = TestContext::new().await;
    let key = ServiceKey::new("public", "DEFAULT_GROUP", "order-service");

    ctx.state
        .registry
        .register(&key, instance("10.0.0.1", 8080, false), None)
        .await
        .unwrap();

    let info = ctx.state.registry.query(&key, &[], false).await;
    assert_eq!(info.hosts.len(), 1);
    assert_eq!(info.hosts[0].ip, "10.0.0.1");
}

#[tokio::test]
async fn reregistering_identical_instance_is_a_no_op() {
    let ctx = TestContext::new().await;
    let key = ServiceKey::new("public", "DEFAULT_GROUP", "order-service");
    let inst = instance("10.0.0.1", 8080, false);

    ctx.state.registry.register(&key, inst.clone(), None).await.unwrap();
    let revision_1 = ctx.state.registry.query(&key, &[], false).await.checksum;
    ctx.state.registry.register(&key, inst, None).await.unwrap();
    let revision_2 = ctx.state.registry.query(&key, &[], false).await.checksum;

    assert_eq!(revision_1, revision_2, "identical re-register must not bump the revision");
}

#[tokio::test]
async fn ephemeral_instance_requires_a_session() {
    let ctx = TestContext::new().await;
    let key = ServiceKey::new("public", "DEFAULT_GROUP", "cache-service");
    let err = ctx
        .state
        .registry
        .register(&key, instance("10.0.0.2", 9090, true), None)
        .await
        .unwrap_err();
    assert!(matches!(err, nacosd::core::errors::NacosError::InvalidArgument(_)));
}

#[tokio::test]
async fn session_close_deregisters_owned_ephemeral_instances() {
    let ctx = TestContext::new().await;
    let key = ServiceKey::new("public", "DEFAULT_GROUP", "cache-service");
    let session_id = ctx.state.sessions.open(None, Some("127.0.0.1".to_string()));

    ctx.state
        .registry
        .register(&key, instance("10.0.0.2", 9090, true), Some(session_id))
        .await
        .unwrap();
    ctx.state
        .sessions
        .track_instance(session_id, key.clone(), InstanceKey { ip: "10.0.0.2".into(), port: 9090, cluster: "DEFAULT".into() });

    assert_eq!(ctx.state.registry.query(&key, &[], false).await.hosts.len(), 1);

    ctx.state.sessions.close(session_id).await;

    assert_eq!(ctx.state.registry.query(&key, &[], false).await.hosts.len(), 0);
    assert!(!ctx.state.sessions.is_open(session_id));
}

#[tokio::test]
async fn deregistering_unknown_instance_is_a_no_op() {
    let ctx = TestContext::new().await;
    let key = ServiceKey::new("public", "DEFAULT_GROUP", "ghost-service");
    let ikey = InstanceKey { ip: "1.2.3.4".into(), port: 1, cluster: "DEFAULT".into() };
    ctx.state.registry.deregister(&key, &ikey).await.unwrap();
}

#[tokio::test]
async fn list_services_paginates_and_sorts() {
    let ctx = TestContext::new().await;
    for name in ["svc-c", "svc-a", "svc-b"] {
        let key = ServiceKey::new("public", "DEFAULT_GROUP", name);
        ctx.state.registry.register(&key, instance("10.0.0.1", 8080, false), None).await.unwrap();
    }

    let (names, total) = ctx.state.registry.list_services("public", "DEFAULT_GROUP", None, 1, 2);
    assert_eq!(total, 3);
    assert_eq!(names, vec!["svc-a".to_string(), "svc-b".to_string()]);
}
