//! Keystore capability contract
//!
//! The bus never interprets key material or envelope bytes; it passes blobs
//! through this trait. Concrete keystores live outside this workspace (OS
//! keychain integration, mobile enclaves); `NoopKeystore` is a pass-through
//! double for tests and plaintext deployments.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

/// Errors surfaced by keystore capability calls
#[derive(Error, Debug)]
pub enum KeystoreError {
    /// Encryption or decryption failed
    #[error("Envelope operation failed: {0}")]
    Envelope(String),

    /// Key material could not be derived or resolved
    #[error("Key error: {0}")]
    Key(String),

    /// Persistence operation failed
    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// Capability record describing what a keystore can do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeystoreCaps {
    /// Can encrypt and decrypt envelopes
    pub envelope: bool,
    /// Can derive symmetric keys by name
    pub symmetric_keys: bool,
    /// Persists state across restarts
    pub persistence: bool,
}

/// Capability interface for envelope encryption and key management
///
/// Handles are shared immutably; thread safety is the keystore's
/// responsibility.
pub trait Keystore: Send + Sync {
    /// Envelope-encrypt `data` for the given network and profile recipients
    fn encrypt_with_envelope(
        &self,
        data: &[u8],
        network_public_key: Option<&[u8]>,
        profile_public_keys: &[Vec<u8>],
    ) -> Result<Vec<u8>, KeystoreError>;

    /// Decrypt an envelope produced by `encrypt_with_envelope`
    fn decrypt_envelope(&self, eed_cbor: &[u8]) -> Result<Vec<u8>, KeystoreError>;

    /// Derive or fetch the named symmetric key
    fn ensure_symmetric_key(&self, key_name: &str) -> Result<Vec<u8>, KeystoreError>;

    /// Opaque state counter for change detection
    fn get_keystore_state(&self) -> i32;

    /// What this keystore supports
    fn get_keystore_caps(&self) -> KeystoreCaps;

    /// Install a label-to-key mapping (CBOR blob, opaque to the bus)
    fn set_label_mapping(&self, mapping_cbor: &[u8]) -> Result<(), KeystoreError>;

    /// Install local node info (CBOR blob, opaque to the bus)
    fn set_local_node_info(&self, node_info_cbor: &[u8]) -> Result<(), KeystoreError>;

    /// Point persistence at a directory
    fn set_persistence_dir(&self, path: PathBuf) -> Result<(), KeystoreError>;

    /// Toggle automatic persistence of state changes
    fn enable_auto_persist(&self, enabled: bool);

    /// Remove all persisted state
    fn wipe_persistence(&self) -> Result<(), KeystoreError>;

    /// Force pending state to durable storage
    fn flush_state(&self) -> Result<(), KeystoreError>;
}

/// Pass-through keystore for tests and plaintext deployments
///
/// Envelopes are the plaintext bytes; symmetric keys are derived
/// deterministically from the key name. Nothing is persisted.
#[derive(Debug, Default)]
pub struct NoopKeystore {
    auto_persist: AtomicBool,
}

impl Keystore for NoopKeystore {
    fn encrypt_with_envelope(
        &self,
        data: &[u8],
        _network_public_key: Option<&[u8]>,
        _profile_public_keys: &[Vec<u8>],
    ) -> Result<Vec<u8>, KeystoreError> {
        Ok(data.to_vec())
    }

    fn decrypt_envelope(&self, eed_cbor: &[u8]) -> Result<Vec<u8>, KeystoreError> {
        Ok(eed_cbor.to_vec())
    }

    fn ensure_symmetric_key(&self, key_name: &str) -> Result<Vec<u8>, KeystoreError> {
        // Stable, obviously-not-secret bytes so tests can assert determinism.
        Ok(key_name.as_bytes().iter().cycle().take(32).copied().collect())
    }

    fn get_keystore_state(&self) -> i32 {
        0
    }

    fn get_keystore_caps(&self) -> KeystoreCaps {
        KeystoreCaps {
            envelope: true,
            symmetric_keys: true,
            persistence: false,
        }
    }

    fn set_label_mapping(&self, _mapping_cbor: &[u8]) -> Result<(), KeystoreError> {
        Ok(())
    }

    fn set_local_node_info(&self, _node_info_cbor: &[u8]) -> Result<(), KeystoreError> {
        Ok(())
    }

    fn set_persistence_dir(&self, _path: PathBuf) -> Result<(), KeystoreError> {
        Ok(())
    }

    fn enable_auto_persist(&self, enabled: bool) {
        self.auto_persist.store(enabled, Ordering::Relaxed);
    }

    fn wipe_persistence(&self) -> Result<(), KeystoreError> {
        Ok(())
    }

    fn flush_state(&self) -> Result<(), KeystoreError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_envelope_round_trip() {
        let keystore = NoopKeystore::default();
        let envelope = keystore
            .encrypt_with_envelope(b"payload", None, &[vec![1]])
            .unwrap();
        assert_eq!(keystore.decrypt_envelope(&envelope).unwrap(), b"payload");
    }

    #[test]
    fn test_symmetric_key_is_deterministic() {
        let keystore = NoopKeystore::default();
        let a = keystore.ensure_symmetric_key("events").unwrap();
        let b = keystore.ensure_symmetric_key("events").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }
}
