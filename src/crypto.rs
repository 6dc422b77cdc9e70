//! Pluggable cryptographic backend.
//!
//! The pipeline never calls a cipher directly; it goes through a
//! [`CryptoProvider`] handed to the fragmenter or restorer. Every operation is
//! `async` so a backend built on a suspending platform API fits the same
//! contract as the synchronous [`NativeCrypto`]. Implementations must be
//! byte-identical for identical inputs.

use crate::error::{PixshardError, Result};
use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Manifest `algorithm` value for secured runs
pub const ALGORITHM: &str = "aes-256-cbc";

/// Cipher block size in bytes; ciphertext lengths are multiples of it
pub const CIPHER_BLOCK: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

#[allow(async_fn_in_trait)]
pub trait CryptoProvider {
    /// Encrypt with PKCS#7 padding; output length rounds up to [`CIPHER_BLOCK`]
    async fn encrypt_buffer(&self, buf: &[u8], key: &[u8; 32], iv: &[u8; 16]) -> Result<Vec<u8>>;

    /// Decrypt and strip PKCS#7 padding; bad padding is [`PixshardError::DecryptionFailed`]
    async fn decrypt_buffer(&self, buf: &[u8], key: &[u8; 32], iv: &[u8; 16]) -> Result<Vec<u8>>;

    /// 32-byte cipher key derived from the user's secret
    async fn key_to_32(&self, secret: &str) -> [u8; 32];

    /// Fresh random UUID in canonical hyphenated form
    async fn generate_uuid(&self) -> String;

    /// The 16 raw bytes of a UUID, used as the IV
    async fn uuid_to_iv(&self, uuid: &str) -> Result<[u8; 16]>;
}

/// Trimmed secret, or `None` when nothing is left (no encryption)
pub fn normalize_secret(secret: Option<&str>) -> Option<String> {
    secret
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// SHA-256 of the secret's UTF-8 bytes
pub fn derive_key(secret: &str) -> [u8; 32] {
    Sha256::digest(secret.as_bytes()).into()
}

/// Hyphen-stripped UUID must be exactly 32 hex characters
pub fn parse_uuid_bytes(uuid: &str) -> Result<[u8; 16]> {
    let compact: String = uuid.chars().filter(|&c| c != '-').collect();
    if compact.len() != 32 {
        return Err(PixshardError::InvalidUuidFormat(uuid.to_string()));
    }
    let mut out = [0u8; 16];
    hex::decode_to_slice(&compact, &mut out)
        .map_err(|_| PixshardError::InvalidUuidFormat(uuid.to_string()))?;
    Ok(out)
}

/// In-process AES-256-CBC backend
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCrypto;

impl CryptoProvider for NativeCrypto {
    async fn encrypt_buffer(&self, buf: &[u8], key: &[u8; 32], iv: &[u8; 16]) -> Result<Vec<u8>> {
        let cipher = Aes256CbcEnc::new(&(*key).into(), &(*iv).into());
        Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(buf))
    }

    async fn decrypt_buffer(&self, buf: &[u8], key: &[u8; 32], iv: &[u8; 16]) -> Result<Vec<u8>> {
        if buf.is_empty() || buf.len() % CIPHER_BLOCK != 0 {
            return Err(PixshardError::DecryptionFailed(format!(
                "ciphertext length {} is not a positive multiple of {}",
                buf.len(),
                CIPHER_BLOCK
            )));
        }
        let cipher = Aes256CbcDec::new(&(*key).into(), &(*iv).into());
        cipher
            .decrypt_padded_vec_mut::<Pkcs7>(buf)
            .map_err(|_| PixshardError::DecryptionFailed("invalid padding (wrong key?)".into()))
    }

    async fn key_to_32(&self, secret: &str) -> [u8; 32] {
        derive_key(secret)
    }

    async fn generate_uuid(&self) -> String {
        Uuid::new_v4().hyphenated().to_string()
    }

    async fn uuid_to_iv(&self, uuid: &str) -> Result<[u8; 16]> {
        parse_uuid_bytes(uuid)
    }
}
