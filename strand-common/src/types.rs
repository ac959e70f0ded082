//! Typed payload values exchanged over the bus
//!
//! `TypedValue` is the opaque value type handed to action handlers and event
//! subscribers. Internally it wraps a `serde_json::Value` behind an `Arc`, so
//! clones are cheap and payloads stay immutable once constructed. Wire
//! encoding goes through `serialize`/`deserialize` with a
//! `SerializationContext`, which routes through the keystore capability when
//! envelope encryption is requested.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keystore::Keystore;

/// Result type for value operations
pub type ValueResult<T> = Result<T, ValueError>;

/// Errors raised by value conversion and wire encoding
#[derive(Error, Debug)]
pub enum ValueError {
    /// Conversion to or from a concrete type failed
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Wire encoding failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Wire decoding failed
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Envelope encryption or decryption failed
    #[error("Envelope error: {0}")]
    Envelope(String),
}

/// Wire frame for a serialized value
///
/// The frame records whether the payload bytes are plaintext JSON or a
/// keystore envelope, so the receiving side knows whether decryption is
/// required before parsing.
#[derive(Serialize, Deserialize)]
enum WireValue {
    Plain(Vec<u8>),
    Envelope(Vec<u8>),
}

/// Opaque payload value passed between services
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    value: Arc<serde_json::Value>,
}

impl TypedValue {
    /// The null value, used where an operation carries no payload
    pub fn null() -> Self {
        Self {
            value: Arc::new(serde_json::Value::Null),
        }
    }

    /// Build a value from any serializable type
    pub fn from_typed<T: Serialize>(value: T) -> ValueResult<Self> {
        let json = serde_json::to_value(value)
            .map_err(|e| ValueError::Conversion(format!("Not representable as a value: {e}")))?;
        Ok(Self {
            value: Arc::new(json),
        })
    }

    /// Extract the value as a concrete type
    pub fn as_type<T: DeserializeOwned>(&self) -> ValueResult<T> {
        serde_json::from_value(self.value.as_ref().clone())
            .map_err(|e| ValueError::Conversion(format!("Type mismatch: {e}")))
    }

    /// Borrow the underlying JSON representation
    pub fn as_json(&self) -> &serde_json::Value {
        &self.value
    }

    /// True when the value carries no payload
    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// Encode for the wire, enveloping through the keystore when the context
    /// requests encryption
    pub fn serialize(&self, ctx: &SerializationContext) -> ValueResult<Vec<u8>> {
        let json_bytes = serde_json::to_vec(self.value.as_ref())
            .map_err(|e| ValueError::Serialization(e.to_string()))?;

        let frame = match ctx.encryption_keystore() {
            Some(keystore) => {
                let envelope = keystore
                    .encrypt_with_envelope(
                        &json_bytes,
                        ctx.network_public_key.as_deref(),
                        &ctx.profile_public_keys,
                    )
                    .map_err(|e| ValueError::Envelope(e.to_string()))?;
                WireValue::Envelope(envelope)
            }
            None => WireValue::Plain(json_bytes),
        };

        bincode::serialize(&frame).map_err(|e| ValueError::Serialization(e.to_string()))
    }

    /// Decode from the wire, decrypting enveloped frames through the keystore
    pub fn deserialize(bytes: &[u8], ctx: &SerializationContext) -> ValueResult<Self> {
        let frame: WireValue =
            bincode::deserialize(bytes).map_err(|e| ValueError::Deserialization(e.to_string()))?;

        let json_bytes = match frame {
            WireValue::Plain(bytes) => bytes,
            WireValue::Envelope(envelope) => {
                let keystore = ctx.keystore.as_ref().ok_or_else(|| {
                    ValueError::Envelope("Enveloped payload but no keystore configured".to_string())
                })?;
                keystore
                    .decrypt_envelope(&envelope)
                    .map_err(|e| ValueError::Envelope(e.to_string()))?
            }
        };

        let json: serde_json::Value = serde_json::from_slice(&json_bytes)
            .map_err(|e| ValueError::Deserialization(e.to_string()))?;
        Ok(Self {
            value: Arc::new(json),
        })
    }
}

impl Default for TypedValue {
    fn default() -> Self {
        Self::null()
    }
}

impl From<serde_json::Value> for TypedValue {
    fn from(value: serde_json::Value) -> Self {
        Self {
            value: Arc::new(value),
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Context threaded through value serialization
///
/// Carries the keystore handle and recipient keys. A context without a
/// keystore (or without recipient keys) encodes plaintext frames.
#[derive(Clone, Default)]
pub struct SerializationContext {
    /// Keystore capability, shared with the owning node
    pub keystore: Option<Arc<dyn Keystore>>,
    /// Network public key for envelope encryption
    pub network_public_key: Option<Vec<u8>>,
    /// Profile public keys for envelope encryption
    pub profile_public_keys: Vec<Vec<u8>>,
}

impl SerializationContext {
    /// Context that encodes plaintext frames only
    pub fn plaintext() -> Self {
        Self::default()
    }

    /// Attach a keystore handle
    pub fn with_keystore(mut self, keystore: Arc<dyn Keystore>) -> Self {
        self.keystore = Some(keystore);
        self
    }

    /// Set the network recipient key
    pub fn with_network_public_key(mut self, key: Vec<u8>) -> Self {
        self.network_public_key = Some(key);
        self
    }

    /// Add a profile recipient key
    pub fn with_profile_public_key(mut self, key: Vec<u8>) -> Self {
        self.profile_public_keys.push(key);
        self
    }

    /// The keystore to envelope with, when encryption applies
    ///
    /// Encryption applies only when a keystore is present and at least one
    /// recipient key is configured.
    fn encryption_keystore(&self) -> Option<&Arc<dyn Keystore>> {
        if self.network_public_key.is_none() && self.profile_public_keys.is_empty() {
            return None;
        }
        self.keystore.as_ref()
    }
}

impl fmt::Debug for SerializationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializationContext")
            .field("keystore", &self.keystore.as_ref().map(|_| "<Keystore>"))
            .field("network_public_key", &self.network_public_key.is_some())
            .field("profile_public_keys", &self.profile_public_keys.len())
            .finish()
    }
}
