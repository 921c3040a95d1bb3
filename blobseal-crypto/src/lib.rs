//! Client-side envelope encryption for blob payloads.
//!
//! Provides per-object encryption using:
//! - AES-256-GCM or ChaCha20-Poly1305 for authenticated payload encryption
//! - RSA key wrapping (RSA-OAEP, RSA-OAEP-256, RSA1_5) for the content key
//! - Secure key handling with zeroization
//!
//! # Architecture
//!
//! The encryption uses a two-tier key system:
//!
//! 1. **Key Encryption Key (KEK)**: A long-lived asymmetric key, usually held
//!    by a remote key-management service. It only ever wraps and unwraps
//!    content keys; payload bytes never reach it.
//!
//! 2. **Content Encryption Key (CEK)**: A random key generated for every
//!    upload. The payload is sealed with the CEK and the wrapped CEK is
//!    stored in the object's [`EncryptionMetadata`].
//!
//! This architecture allows:
//! - Rotating the KEK by rewrapping metadata instead of re-encrypting payloads
//! - Decrypting with only a key identifier, via a [`KeyResolver`]
//! - Containing the damage of a leaked CEK to a single object

mod cipher;
pub mod envelope;
mod error;
mod kek;
mod key;
pub mod local;
mod metadata;

pub use cipher::{
    ContentCipher, DEFAULT_REGION_LENGTH, NONCE_SIZE, TAG_SIZE, ciphertext_length,
    decrypt_regions, encrypt_regions,
};
pub use envelope::{EnvelopeEncryptor, EnvelopeOptions, decrypt, encrypt};
pub use error::{CryptoError, CryptoResult};
pub use kek::{KeyEncryptionKey, KeyResolver, KeyWrapAlgorithm};
pub use key::{CONTENT_KEY_SIZE, ContentKey};
pub use local::LocalRsaKey;
pub use metadata::{
    ENCRYPTION_DATA_KEY, EncryptedRegionInfo, EncryptionAgent, EncryptionMetadata, PROTOCOL_V2,
    WrappedContentKey,
};
