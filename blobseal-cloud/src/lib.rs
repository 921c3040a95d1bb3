//! Key Vault key provisioning and client-side encrypted blob transfer.
//!
//! Provides:
//! - Client-credentials authentication with per-scope token caching
//! - A Key Vault REST client for key creation and remote wrap/unwrap
//! - Key resolution from blob metadata back to a vault key
//! - Blob transports for Azure Blob Storage, S3 and process memory
//! - An encrypted blob client that never hands plaintext to the transport
//! - Bounded retries for transient transport failures
//! - The end-to-end provision/upload/download workflow

pub mod azure_transport;
pub mod blob_transport;
pub mod config;
pub mod credential;
pub mod credential_manager;
pub mod encrypted_blob;
pub mod error;
pub mod http;
pub mod key_registry;
pub mod key_vault;
pub mod retry;
pub mod s3_transport;
pub mod types;
pub mod workflow;

pub use config::CloudConfig;
pub use error::{CloudError, CloudResult};
pub use types::*;
