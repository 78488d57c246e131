// src/core/protocol/envelope.rs

//! The HTTP response envelope (spec §6): `{"code": int, "message": string,
//! "data": T}`, `code=0` on success. Grounded on the batata reimplementation's
//! `Result<T>::http_success`/`http_response` helpers, adapted to axum's
//! `IntoResponse`.

use crate::core::errors::NacosError;
use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self { code: 0, message: "success".to_string(), data: Some(data) }
    }

    pub fn ok_empty() -> Envelope<()> {
        Envelope { code: 0, message: "success".to_string(), data: None }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Maps a handler's `Result<T, NacosError>` into the envelope + HTTP status
/// convention spec §6 describes: "HTTP 2xx status on handled requests; HTTP
/// 4xx for bad input... 5xx internal." `NotFound` on a read is represented
/// as a success envelope with null `data`, per the teacher's own habit of
/// reserving non-2xx for actual request-handling failures, not "no rows".
pub fn respond<T: Serialize>(result: Result<T, NacosError>, not_found_is_success: bool) -> Response {
    match result {
        Ok(data) => Envelope::ok(data).into_response(),
        Err(NacosError::NotFound(msg)) if not_found_is_success => {
            (axum::http::StatusCode::OK, Json(Envelope::<()> { code: 0, message: msg, data: None })).into_response()
        }
        Err(e) => {
            let status = e.http_status();
            let body = Envelope::<()> { code: e.envelope_code(), message: e.to_string(), data: None };
            (status, Json(body)).into_response()
        }
    }
}
