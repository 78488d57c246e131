// src/core/errors.rs

//! Defines the primary error type for the entire application.

use axum::http::StatusCode;
use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing every failure taxonomy entry the
/// server surfaces over either transport. Using `thiserror` gives clean
/// `Display` impls and automatic `From` conversions for the ambient stack.
#[derive(Error, Debug)]
pub enum NacosError {
    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

// `std::io::Error` is not `Clone`; wrap it in an `Arc` for cheap shared cloning,
// the same trick the teacher uses for its own `Io` variant.
impl Clone for NacosError {
    fn clone(&self) -> Self {
        match self {
            Self::Io(e) => Self::Io(Arc::clone(e)),
            Self::InvalidArgument(s) => Self::InvalidArgument(s.clone()),
            Self::NotFound(s) => Self::NotFound(s.clone()),
            Self::AlreadyExists(s) => Self::AlreadyExists(s.clone()),
            Self::Unauthenticated => Self::Unauthenticated,
            Self::Forbidden(s) => Self::Forbidden(s.clone()),
            Self::Conflict(s) => Self::Conflict(s.clone()),
            Self::ResourceExhausted(s) => Self::ResourceExhausted(s.clone()),
            Self::DeadlineExceeded => Self::DeadlineExceeded,
            Self::Unavailable(s) => Self::Unavailable(s.clone()),
            Self::Internal(s) => Self::Internal(s.clone()),
        }
    }
}

impl PartialEq for NacosError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Io(a), Self::Io(b)) => a.to_string() == b.to_string(),
            (Self::InvalidArgument(a), Self::InvalidArgument(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::AlreadyExists(a), Self::AlreadyExists(b)) => a == b,
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::ResourceExhausted(a), Self::ResourceExhausted(b)) => a == b,
            (Self::Unavailable(a), Self::Unavailable(b)) => a == b,
            (Self::Internal(a), Self::Internal(b)) => a == b,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

impl From<std::io::Error> for NacosError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for NacosError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidArgument(format!("malformed JSON: {e}"))
    }
}

/// The wire-level numeric code used in the HTTP `{code, message, data}` envelope
/// (§6) and as the RPC response's `error_code` field. These values follow the
/// Nacos convention of 200 for success and 4xx/5xx-shaped codes for failure,
/// grounded in the batata reimplementation's `error` module.
impl NacosError {
    pub fn envelope_code(&self) -> i32 {
        match self {
            Self::InvalidArgument(_) => 400,
            Self::Unauthenticated => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::AlreadyExists(_) | Self::Conflict(_) => 409,
            Self::ResourceExhausted(_) => 429,
            Self::DeadlineExceeded => 408,
            Self::Unavailable(_) => 503,
            Self::Io(_) | Self::Internal(_) => 500,
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyExists(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ResourceExhausted(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::DeadlineExceeded => StatusCode::REQUEST_TIMEOUT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Io(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
