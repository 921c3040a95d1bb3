//! Per-object encryption metadata.
//!
//! Stored next to the ciphertext (as blob user metadata under
//! [`ENCRYPTION_DATA_KEY`]) and required before any decryption can start.

use crate::cipher::{ContentCipher, NONCE_SIZE};
use crate::error::{CryptoError, CryptoResult};
use crate::kek::KeyWrapAlgorithm;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata entry name under which the serialized [`EncryptionMetadata`] is stored.
pub const ENCRYPTION_DATA_KEY: &str = "encryptiondata";

/// Envelope protocol version written by this crate.
pub const PROTOCOL_V2: &str = "2.0";

/// Everything needed to decrypt one object, except the KEK itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EncryptionMetadata {
    pub wrapped_content_key: WrappedContentKey,
    pub encryption_agent: EncryptionAgent,
    /// Base nonce for the region sequence.
    #[serde(with = "base64_bytes")]
    pub content_nonce: Vec<u8>,
    pub encrypted_region_info: EncryptedRegionInfo,
    pub plaintext_length: u64,
    #[serde(default)]
    pub key_wrapping_metadata: BTreeMap<String, String>,
}

/// The content key as wrapped by the KEK.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WrappedContentKey {
    pub key_id: String,
    #[serde(with = "base64_bytes")]
    pub encrypted_key: Vec<u8>,
    pub algorithm: KeyWrapAlgorithm,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EncryptionAgent {
    pub protocol: String,
    pub encryption_algorithm: ContentCipher,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EncryptedRegionInfo {
    /// Plaintext bytes per region.
    pub data_length: u64,
    pub nonce_length: u32,
}

impl EncryptionMetadata {
    /// Checks the structural invariants that must hold before a KEK is even
    /// looked up.
    pub fn validate(&self) -> CryptoResult<()> {
        if self.encryption_agent.protocol != PROTOCOL_V2 {
            return Err(CryptoError::InvalidMetadata(format!(
                "unsupported envelope protocol {}",
                self.encryption_agent.protocol
            )));
        }
        if self.encrypted_region_info.nonce_length as usize != NONCE_SIZE
            || self.content_nonce.len() != NONCE_SIZE
        {
            return Err(CryptoError::InvalidMetadata(format!(
                "nonce must be {NONCE_SIZE} bytes"
            )));
        }
        if self.encrypted_region_info.data_length == 0
            || usize::try_from(self.encrypted_region_info.data_length).is_err()
        {
            return Err(CryptoError::InvalidMetadata(
                "region length out of range".to_string(),
            ));
        }
        if self.wrapped_content_key.key_id.is_empty() {
            return Err(CryptoError::InvalidMetadata("empty key id".to_string()));
        }
        Ok(())
    }

    pub fn to_json(&self) -> CryptoResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> CryptoResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| CryptoError::InvalidMetadata(format!("unreadable encryption data: {e}")))
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EncryptionMetadata {
        EncryptionMetadata {
            wrapped_content_key: WrappedContentKey {
                key_id: "https://vault.example/keys/k/1".to_string(),
                encrypted_key: vec![1, 2, 3],
                algorithm: KeyWrapAlgorithm::RsaOaep,
            },
            encryption_agent: EncryptionAgent {
                protocol: PROTOCOL_V2.to_string(),
                encryption_algorithm: ContentCipher::Aes256Gcm,
            },
            content_nonce: vec![0u8; NONCE_SIZE],
            encrypted_region_info: EncryptedRegionInfo {
                data_length: 4096,
                nonce_length: NONCE_SIZE as u32,
            },
            plaintext_length: 20,
            key_wrapping_metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn json_uses_pascal_case_and_base64() {
        let json = sample().to_json().unwrap();
        assert!(json.contains("\"WrappedContentKey\""));
        assert!(json.contains("\"EncryptedKey\":\"AQID\""));
        assert!(json.contains("\"Algorithm\":\"RSA-OAEP\""));
        assert!(json.contains("\"EncryptionAlgorithm\":\"AES_GCM_256\""));
    }

    #[test]
    fn unknown_protocol_rejected() {
        let mut md = sample();
        md.encryption_agent.protocol = "1.0".to_string();
        assert!(matches!(md.validate(), Err(CryptoError::InvalidMetadata(_))));
    }

    #[test]
    fn short_nonce_rejected() {
        let mut md = sample();
        md.content_nonce.truncate(8);
        assert!(matches!(md.validate(), Err(CryptoError::InvalidMetadata(_))));
    }

    #[test]
    fn zero_region_length_rejected() {
        let mut md = sample();
        md.encrypted_region_info.data_length = 0;
        assert!(matches!(md.validate(), Err(CryptoError::InvalidMetadata(_))));
    }

    #[test]
    fn garbage_json_is_invalid_metadata() {
        let err = EncryptionMetadata::from_json("{not json").unwrap_err();
        assert!(matches!(err, CryptoError::InvalidMetadata(_)));
    }
}
