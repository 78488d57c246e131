// tests/integration/config_test.rs

//! Exercises the Config Store: plain publish/get, gray (beta) resolution,
//! aggregate merge, and history.

use super::test_helpers::TestContext;
use nacosd::core::configstore::{ConfigKey, ImportPolicy};

fn key() -> ConfigKey {
    ConfigKey::new("public", "DEFAULT_GROUP", "app.properties")
}

#[tokio::test]
async fn publish_then_get_roundtrips_content_and_md5() {
    let ctx = TestContext::new().await;
    ctx.state.config_store.publish(&key(), "timeout=30".to_string(), None).await.unwrap();

    let (content, md5, content_type) = ctx.state.config_store.get(&key(), None).await.unwrap();
    assert_eq!(content, "timeout=30");
    assert_eq!(content_type, "text");
    assert_eq!(md5.len(), 32);
}

#[tokio::test]
async fn get_on_missing_key_is_not_found() {
    let ctx = TestContext::new().await;
    let err = ctx.state.config_store.get(&key(), None).await.unwrap_err();
    assert!(matches!(err, nacosd::core::errors::NacosError::NotFound(_)));
}

#[tokio::test]
async fn gray_entry_is_only_visible_to_its_ip_allowlist() {
    let ctx = TestContext::new().await;
    ctx.state.config_store.publish(&key(), "base".to_string(), None).await.unwrap();
    ctx.state
        .config_store
        .publish_beta(&key(), "beta".to_string(), vec!["10.0.0.5".to_string()])
        .await
        .unwrap();

    let (content, _, _) = ctx.state.config_store.get(&key(), Some("10.0.0.5")).await.unwrap();
    assert_eq!(content, "beta");

    let (content, _, _) = ctx.state.config_store.get(&key(), Some("10.0.0.9")).await.unwrap();
    assert_eq!(content, "base");

    let (content, _, _) = ctx.state.config_store.get(&key(), None).await.unwrap();
    assert_eq!(content, "base");
}

/// Literal scenario S6 (spec.md:209): datums are concatenated with no
/// separator, in stable `datumId` order, regardless of publish order.
#[tokio::test]
async fn aggregate_merges_by_datum_id_order_with_no_separator() {
    let ctx = TestContext::new().await;
    // Published out of id order: d2 first, then d1.
    ctx.state.config_store.publish_aggregate(&key(), "d2".to_string(), "b\n".to_string()).await.unwrap();
    ctx.state.config_store.publish_aggregate(&key(), "d1".to_string(), "a\n".to_string()).await.unwrap();

    let (content, _, _) = ctx.state.config_store.get(&key(), None).await.unwrap();
    assert_eq!(content, "a\nb\n");

    ctx.state.config_store.publish_aggregate(&key(), "d1".to_string(), "A\n".to_string()).await.unwrap();
    let (content, _, _) = ctx.state.config_store.get(&key(), None).await.unwrap();
    assert_eq!(content, "A\nb\n");

    ctx.state.config_store.remove_aggregate(&key(), "d2").await.unwrap();
    let (content, _, _) = ctx.state.config_store.get(&key(), None).await.unwrap();
    assert_eq!(content, "A\n");
}

#[tokio::test]
async fn history_is_recorded_newest_first_and_survives_delete() {
    let ctx = TestContext::new().await;
    ctx.state.config_store.publish(&key(), "v1".to_string(), None).await.unwrap();
    ctx.state.config_store.publish(&key(), "v2".to_string(), None).await.unwrap();
    ctx.state.config_store.remove(&key()).await.unwrap();

    let (records, total) = ctx.state.config_store.list_history(&key(), 1, 10).await;
    assert_eq!(total, 3);
    assert_eq!(records[0].content, "v2");
    assert!(ctx.state.config_store.get(&key(), None).await.is_err());
}

#[tokio::test]
async fn import_respects_skip_policy_for_existing_keys() {
    let ctx = TestContext::new().await;
    ctx.state.config_store.publish(&key(), "existing".to_string(), None).await.unwrap();

    let report = ctx
        .state
        .config_store
        .import_entries(vec![(key(), "overwritten?".to_string(), None)], ImportPolicy::Skip)
        .await;

    assert_eq!(report.skipped, vec![key()]);
    let (content, _, _) = ctx.state.config_store.get(&key(), None).await.unwrap();
    assert_eq!(content, "existing");
}
