//! Region-framed authenticated encryption of payload bytes.
//!
//! The payload is split into fixed-size regions, each sealed independently
//! under the content key. Region `i` uses the base nonce with `i` XORed into
//! its last eight bytes, and authenticates `i` plus a final-region flag as
//! associated data, so regions cannot be reordered, dropped or appended.
//!
//! Layout: `region_0 || region_1 || ... || region_n`, where every region is
//! `ciphertext || tag` and only the last region may be shorter than the
//! configured region length. Empty payloads still produce one (empty) region.

use crate::error::{CryptoError, CryptoResult};
use crate::key::ContentKey;
use aes_gcm::Aes256Gcm;
use aes_gcm::aead::{Aead, KeyInit, Nonce, Payload};
use chacha20poly1305::ChaCha20Poly1305;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Nonce size shared by both supported ciphers (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size shared by both supported ciphers.
pub const TAG_SIZE: usize = 16;

/// Default plaintext bytes per region (4 MiB).
pub const DEFAULT_REGION_LENGTH: usize = 4 * 1024 * 1024;

/// Authenticated cipher used for payload bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentCipher {
    #[default]
    #[serde(rename = "AES_GCM_256")]
    Aes256Gcm,
    #[serde(rename = "CHACHA20_POLY1305")]
    ChaCha20Poly1305,
}

impl ContentCipher {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aes256Gcm => "AES_GCM_256",
            Self::ChaCha20Poly1305 => "CHACHA20_POLY1305",
        }
    }

    fn seal(
        self,
        key: &ContentKey,
        nonce: &[u8; NONCE_SIZE],
        aad: &[u8],
        msg: &[u8],
    ) -> Result<Vec<u8>, aes_gcm::aead::Error> {
        match self {
            Self::Aes256Gcm => seal_with::<Aes256Gcm>(key, nonce, aad, msg),
            Self::ChaCha20Poly1305 => seal_with::<ChaCha20Poly1305>(key, nonce, aad, msg),
        }
    }

    fn open(
        self,
        key: &ContentKey,
        nonce: &[u8; NONCE_SIZE],
        aad: &[u8],
        msg: &[u8],
    ) -> Result<Vec<u8>, aes_gcm::aead::Error> {
        match self {
            Self::Aes256Gcm => open_with::<Aes256Gcm>(key, nonce, aad, msg),
            Self::ChaCha20Poly1305 => open_with::<ChaCha20Poly1305>(key, nonce, aad, msg),
        }
    }
}

impl fmt::Display for ContentCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentCipher {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "AES_GCM_256" | "AES_256_GCM" | "AES256GCM" => Ok(Self::Aes256Gcm),
            "CHACHA20_POLY1305" | "CHACHA20POLY1305" => Ok(Self::ChaCha20Poly1305),
            _ => Err(CryptoError::UnsupportedAlgorithm(format!(
                "unknown content cipher: {s}"
            ))),
        }
    }
}

fn seal_with<C: Aead + KeyInit>(
    key: &ContentKey,
    nonce: &[u8; NONCE_SIZE],
    aad: &[u8],
    msg: &[u8],
) -> Result<Vec<u8>, aes_gcm::aead::Error> {
    let cipher = C::new_from_slice(key.as_bytes()).map_err(|_| aes_gcm::aead::Error)?;
    cipher.encrypt(Nonce::<C>::from_slice(nonce), Payload { msg, aad })
}

fn open_with<C: Aead + KeyInit>(
    key: &ContentKey,
    nonce: &[u8; NONCE_SIZE],
    aad: &[u8],
    msg: &[u8],
) -> Result<Vec<u8>, aes_gcm::aead::Error> {
    let cipher = C::new_from_slice(key.as_bytes()).map_err(|_| aes_gcm::aead::Error)?;
    cipher.decrypt(Nonce::<C>::from_slice(nonce), Payload { msg, aad })
}

fn region_nonce(base: &[u8; NONCE_SIZE], index: u64) -> [u8; NONCE_SIZE] {
    let mut nonce = *base;
    for (byte, counter) in nonce[NONCE_SIZE - 8..].iter_mut().zip(index.to_be_bytes()) {
        *byte ^= counter;
    }
    nonce
}

fn region_aad(index: u64, last: bool) -> [u8; 9] {
    let mut aad = [0u8; 9];
    aad[..8].copy_from_slice(&index.to_be_bytes());
    aad[8] = u8::from(last);
    aad
}

fn region_count(plaintext_length: u64, region_length: u64) -> u64 {
    plaintext_length.div_ceil(region_length).max(1)
}

/// Total ciphertext size for a payload of `plaintext_length` bytes.
pub fn ciphertext_length(plaintext_length: u64, region_length: u64) -> u64 {
    region_count(plaintext_length, region_length)
        .saturating_mul(TAG_SIZE as u64)
        .saturating_add(plaintext_length)
}

/// Seals `plaintext` region by region.
pub fn encrypt_regions(
    cipher: ContentCipher,
    key: &ContentKey,
    base_nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
    region_length: usize,
) -> CryptoResult<Vec<u8>> {
    if region_length == 0 {
        return Err(CryptoError::Encryption(
            "region length must be non-zero".to_string(),
        ));
    }

    let total = plaintext.len() as u64;
    let regions = region_count(total, region_length as u64);
    let mut out = Vec::with_capacity(ciphertext_length(total, region_length as u64) as usize);

    for index in 0..regions {
        let start = (index as usize) * region_length;
        let end = (start + region_length).min(plaintext.len());
        let last = index + 1 == regions;

        let sealed = cipher
            .seal(
                key,
                &region_nonce(base_nonce, index),
                &region_aad(index, last),
                &plaintext[start..end],
            )
            .map_err(|e| {
                CryptoError::Encryption(format!("{cipher} seal of region {index} failed: {e}"))
            })?;
        out.extend_from_slice(&sealed);
    }

    Ok(out)
}

/// Opens a region-framed ciphertext.
///
/// The ciphertext length must match exactly what `plaintext_length` and
/// `region_length` imply. Plaintext is only returned once every region has
/// passed tag verification.
pub fn decrypt_regions(
    cipher: ContentCipher,
    key: &ContentKey,
    base_nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
    region_length: usize,
    plaintext_length: u64,
) -> CryptoResult<Vec<u8>> {
    if region_length == 0 {
        return Err(CryptoError::InvalidMetadata(
            "region length must be non-zero".to_string(),
        ));
    }

    let expected = ciphertext_length(plaintext_length, region_length as u64);
    if ciphertext.len() as u64 != expected {
        return Err(CryptoError::AuthenticationFailure(format!(
            "ciphertext is {} bytes but metadata describes {expected}",
            ciphertext.len()
        )));
    }

    let regions = region_count(plaintext_length, region_length as u64);
    let mut plaintext = Vec::with_capacity(plaintext_length as usize);
    let mut offset = 0usize;

    for index in 0..regions {
        let remaining = plaintext_length as usize - plaintext.len();
        let sealed_len = remaining.min(region_length) + TAG_SIZE;
        let sealed = &ciphertext[offset..offset + sealed_len];
        let last = index + 1 == regions;

        let opened = cipher
            .open(
                key,
                &region_nonce(base_nonce, index),
                &region_aad(index, last),
                sealed,
            )
            .map_err(|_| {
                CryptoError::AuthenticationFailure(format!(
                    "region {index} failed tag verification (wrong key or tampered data)"
                ))
            })?;

        plaintext.extend_from_slice(&opened);
        offset += sealed_len;
    }

    Ok(plaintext)
}
