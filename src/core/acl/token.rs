// src/core/acl/token.rs

//! A minimal bearer-token issuer/verifier. Real token cryptography is an
//! external collaborator per spec.md's Non-goals ("token issuance
//! cryptography"); this HMAC-SHA256 implementation exists so the crate is
//! runnable standalone, grounded on the teacher's existing `hmac`/`sha2`
//! dependencies (otherwise used for replication auth in the teacher).

use crate::core::errors::NacosError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug)]
pub struct TokenIssuer {
    secret: Vec<u8>,
    ttl_seconds: u64,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_seconds: u64) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            ttl_seconds,
        }
    }

    /// Issues an opaque bearer token: `base64(username.expiry).base64(hmac)`.
    pub fn issue(&self, username: &str) -> String {
        let expiry = now_secs() + self.ttl_seconds;
        let payload = format!("{username}.{expiry}");
        let sig = self.sign(&payload);
        format!("{}.{}", hex::encode(payload.as_bytes()), hex::encode(sig))
    }

    /// Verifies the signature and expiry, returning the username on success.
    pub fn verify(&self, token: &str) -> Result<String, NacosError> {
        let (payload_hex, sig_hex) = token.split_once('.').ok_or(NacosError::Unauthenticated)?;
        let payload_bytes = hex::decode(payload_hex).map_err(|_| NacosError::Unauthenticated)?;
        let payload = String::from_utf8(payload_bytes).map_err(|_| NacosError::Unauthenticated)?;
        let expected_sig = hex::decode(sig_hex).map_err(|_| NacosError::Unauthenticated)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| NacosError::Internal("invalid token secret".into()))?;
        mac.update(payload.as_bytes());
        // `verify_slice` is a constant-time compare, satisfying the spec's
        // requirement that credential comparisons not leak timing.
        mac.verify_slice(&expected_sig)
            .map_err(|_| NacosError::Unauthenticated)?;

        let (username, expiry_str) = payload.rsplit_once('.').ok_or(NacosError::Unauthenticated)?;
        let expiry: u64 = expiry_str.parse().map_err(|_| NacosError::Unauthenticated)?;
        if now_secs() > expiry {
            return Err(NacosError::Unauthenticated);
        }
        Ok(username.to_string())
    }

    fn sign(&self, payload: &str) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("hmac accepts any key length");
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
