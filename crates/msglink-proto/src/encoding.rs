//! Pluggable payload encodings
//!
//! The framing layer only needs a way to turn a message into bytes and back.
//! [`Encoding`] is that capability; the codec is generic over it so callers
//! pick the payload representation without touching the framing logic.
//!
//! - [`Json`] - structured text via `serde_json`
//! - [`MsgPack`] - MessagePack via `rmp-serde` (feature `rmp-serde`)
//! - [`Bincode`] - compact binary via `bincode` (feature `bincode`)
//! - [`Raw`] - payload bytes passed through untouched

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use crate::ProtocolError;

/// Serialization capability for messages of type `M`
pub trait Encoding<M>: Send + Sync + 'static {
    /// Serialize a message into payload bytes
    fn serialize(&self, message: &M) -> Result<Vec<u8>, ProtocolError>;

    /// Deserialize payload bytes into a message
    fn deserialize(&self, bytes: &[u8]) -> Result<M, ProtocolError>;
}

/// JSON payloads
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl<M> Encoding<M> for Json
where
    M: Serialize + DeserializeOwned,
{
    fn serialize(&self, message: &M) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(message)
            .map_err(|e| ProtocolError::Serialization(format!("JSON encode error: {}", e)))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<M, ProtocolError> {
        serde_json::from_slice(bytes)
            .map_err(|e| ProtocolError::Deserialization(format!("JSON decode error: {}", e)))
    }
}

/// MessagePack payloads with named fields
#[cfg(feature = "rmp-serde")]
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPack;

#[cfg(feature = "rmp-serde")]
impl<M> Encoding<M> for MsgPack
where
    M: Serialize + DeserializeOwned,
{
    fn serialize(&self, message: &M) -> Result<Vec<u8>, ProtocolError> {
        rmp_serde::to_vec_named(message)
            .map_err(|e| ProtocolError::Serialization(format!("MessagePack encode error: {}", e)))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<M, ProtocolError> {
        rmp_serde::from_slice(bytes)
            .map_err(|e| ProtocolError::Deserialization(format!("MessagePack decode error: {}", e)))
    }
}

/// Bincode payloads
#[cfg(feature = "bincode")]
#[derive(Debug, Clone, Copy, Default)]
pub struct Bincode;

#[cfg(feature = "bincode")]
impl<M> Encoding<M> for Bincode
where
    M: Serialize + DeserializeOwned,
{
    fn serialize(&self, message: &M) -> Result<Vec<u8>, ProtocolError> {
        bincode::serialize(message)
            .map_err(|e| ProtocolError::Serialization(format!("bincode encode error: {}", e)))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<M, ProtocolError> {
        bincode::deserialize(bytes)
            .map_err(|e| ProtocolError::Deserialization(format!("bincode decode error: {}", e)))
    }
}

/// Raw bytes, no transformation
#[derive(Debug, Clone, Copy, Default)]
pub struct Raw;

impl Encoding<Bytes> for Raw {
    fn serialize(&self, message: &Bytes) -> Result<Vec<u8>, ProtocolError> {
        Ok(message.to_vec())
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Bytes, ProtocolError> {
        Ok(Bytes::copy_from_slice(bytes))
    }
}
