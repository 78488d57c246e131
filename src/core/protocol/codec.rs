// src/core/protocol/codec.rs

//! Frames the RPC stream (spec §6: "Frames are length-prefixed..."). This
//! server uses length-prefixed JSON rather than protobuf: the teacher
//! already depends on `tokio_util`'s codec machinery and `serde_json`, and
//! reusing those keeps the wire format inspectable without vendoring a
//! protobuf toolchain. `LengthDelimitedCodec` supplies the framing; this
//! wrapper only adds the JSON (de)serialization on top, the same layering
//! the teacher uses for `RespFrameCodec` over raw bytes.

use crate::core::errors::NacosError;
use bytes::{Bytes, BytesMut};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

/// Maximum single-frame size. Generous enough for a batch config export
/// response but bounded so a malformed length prefix can't exhaust memory.
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

pub struct JsonFrameCodec<T> {
    inner: LengthDelimitedCodec,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for JsonFrameCodec<T> {
    fn default() -> Self {
        Self {
            inner: LengthDelimitedCodec::builder().max_frame_length(MAX_FRAME_LEN).new_codec(),
            _marker: PhantomData,
        }
    }
}

impl<T> Decoder for JsonFrameCodec<T>
where
    T: DeserializeOwned,
{
    type Item = T;
    type Error = NacosError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(frame) = self
            .inner
            .decode(src)
            .map_err(|e| NacosError::InvalidArgument(format!("frame decode error: {e}")))?
        else {
            return Ok(None);
        };
        let item = serde_json::from_slice(&frame)?;
        Ok(Some(item))
    }
}

impl<T> Encoder<T> for JsonFrameCodec<T>
where
    T: Serialize,
{
    type Error = NacosError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = serde_json::to_vec(&item)?;
        self.inner
            .encode(Bytes::from(payload), dst)
            .map_err(|e| NacosError::InvalidArgument(format!("frame encode error: {e}")))
    }
}

/// The bidirectional session's framing: decodes inbound `RequestFrame`s and
/// encodes either a matching `ResponseFrame` or an unprompted `PushFrame`
/// onto the same connection. `JsonFrameCodec<T>` can't serve here directly
/// since its `Encoder` impl is locked to a single `T` at the type level;
/// this wraps the same `LengthDelimitedCodec` with two `Encoder` impls
/// instead of one generic impl.
#[derive(Default)]
pub struct RpcCodec {
    inner: JsonFrameCodec<()>,
}

impl Decoder for RpcCodec {
    type Item = super::message::RequestFrame;
    type Error = NacosError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(frame) = self.inner.inner.decode(src).map_err(|e| NacosError::InvalidArgument(format!("frame decode error: {e}")))? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&frame)?))
    }
}

impl Encoder<super::message::ResponseFrame> for RpcCodec {
    type Error = NacosError;

    fn encode(&mut self, item: super::message::ResponseFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = serde_json::to_vec(&item)?;
        self.inner
            .inner
            .encode(Bytes::from(payload), dst)
            .map_err(|e| NacosError::InvalidArgument(format!("frame encode error: {e}")))
    }
}

impl Encoder<super::message::PushFrame> for RpcCodec {
    type Error = NacosError;

    fn encode(&mut self, item: super::message::PushFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = serde_json::to_vec(&item)?;
        self.inner
            .inner
            .encode(Bytes::from(payload), dst)
            .map_err(|e| NacosError::InvalidArgument(format!("frame encode error: {e}")))
    }
}
