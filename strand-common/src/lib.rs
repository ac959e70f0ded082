//! Shared building blocks for the Strand node runtime
//!
//! This crate provides:
//! - `TypedValue`: the opaque payload value passed between services
//! - `SerializationContext`: keystore-aware encode/decode context
//! - `Keystore`: the capability contract for envelope encryption
//! - `ScopedLogger`: structured logging scoped to a component and path

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod keystore;
pub mod logging;
pub mod types;

pub use keystore::{Keystore, KeystoreCaps, KeystoreError};
pub use logging::{Component, ScopedLogger};
pub use types::{SerializationContext, TypedValue, ValueError};
