// src/core/protocol/mod.rs

//! Wire-level types and framing for both transport surfaces (spec §6).

pub mod codec;
pub mod envelope;
pub mod message;

pub use codec::{JsonFrameCodec, RpcCodec};
pub use envelope::{Envelope, respond};
pub use message::{FingerprintDto, InstanceDto, PushFrame, RequestFrame, ResponseFrame, RpcRequest, RpcResponse, ServerPush};
