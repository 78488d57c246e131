// tests/integration/acl_test.rs

//! Exercises Identity & Access: root bypass, role-based authorization,
//! and token issuance/verification.

use nacosd::config::AuthConfig;
use nacosd::core::acl::{Action, IamStore};

fn config() -> AuthConfig {
    AuthConfig {
        enabled: true,
        token_secret: "a-sufficiently-long-test-secret".to_string(),
        token_ttl_seconds: 3600,
        root_username: "nacos".to_string(),
        root_password: "nacos".to_string(),
    }
}

#[test]
fn root_account_always_authorizes() {
    let store = IamStore::new(&config()).unwrap();
    assert!(store.authorize("nacos", "public:DEFAULT_GROUP:secret-config", Action::Write));
}

#[test]
fn unbound_user_is_denied() {
    let store = IamStore::new(&config()).unwrap();
    store.create_user("alice", "hunter2").unwrap();
    assert!(!store.authorize("alice", "public:DEFAULT_GROUP:app.properties", Action::Read));
}

#[test]
fn granted_permission_matches_by_glob_pattern() {
    let store = IamStore::new(&config()).unwrap();
    store.create_user("alice", "hunter2").unwrap();
    store.bind_role("alice", "ROLE_READER").unwrap();
    store.grant("ROLE_READER", "public:*:*", Action::Read);

    assert!(store.authorize("alice", "public:DEFAULT_GROUP:app.properties", Action::Read));
    assert!(!store.authorize("alice", "public:DEFAULT_GROUP:app.properties", Action::Write));
    assert!(!store.authorize("alice", "dev:DEFAULT_GROUP:app.properties", Action::Read));
}

#[test]
fn revoking_a_permission_removes_access() {
    let store = IamStore::new(&config()).unwrap();
    store.create_user("alice", "hunter2").unwrap();
    store.bind_role("alice", "ROLE_READER").unwrap();
    store.grant("ROLE_READER", "public:*:*", Action::Read);
    store.revoke("ROLE_READER", "public:*:*");

    assert!(!store.authorize("alice", "public:DEFAULT_GROUP:app.properties", Action::Read));
}

#[test]
fn deleting_a_role_cascades_to_bindings_and_permissions() {
    let store = IamStore::new(&config()).unwrap();
    store.create_user("alice", "hunter2").unwrap();
    store.bind_role("alice", "ROLE_READER").unwrap();
    store.grant("ROLE_READER", "public:*:*", Action::Read);

    store.delete_role("ROLE_READER");

    assert!(store.roles_for("alice").is_empty());
    assert!(store.list_permissions("ROLE_READER").is_empty());
}

#[test]
fn login_then_verify_recovers_the_username() {
    let store = IamStore::new(&config()).unwrap();
    let token = store.login("nacos", "nacos").unwrap();
    assert_eq!(store.verify(&token).unwrap(), "nacos");
}

#[test]
fn login_with_wrong_password_is_unauthenticated() {
    let store = IamStore::new(&config()).unwrap();
    let err = store.login("nacos", "wrong-password").unwrap_err();
    assert!(matches!(err, nacosd::core::errors::NacosError::Unauthenticated));
}

#[test]
fn verify_rejects_a_tampered_token() {
    let store = IamStore::new(&config()).unwrap();
    let mut token = store.login("nacos", "nacos").unwrap();
    token.push('x');
    assert!(store.verify(&token).is_err());
}
