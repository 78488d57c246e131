// tests/integration_test.rs

//! Integration tests for nacosd.
//!
//! These exercise the core components (registry, config store, session
//! manager, IAM) together through a fully initialized `ServerState`,
//! without going through either transport.

mod integration {
    pub mod acl_test;
    pub mod config_test;
    pub mod naming_test;
    pub mod push_test;
    pub mod test_helpers;
}
