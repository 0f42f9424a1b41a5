//! AES-256 symmetric keys, with plain CTR encryption and Encrypt-then-MAC.
//!
//! Ciphertext layout is `IV (16 bytes) || AES-CTR(data)`. The authenticated form appends an
//! HMAC-SHA256 tag computed over `IV || ciphertext`, which is checked in constant time before
//! anything is decrypted.

use std::fmt;

use constant_time_eq::constant_time_eq;
use rand::RngCore;
use tracing::warn;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::cipher::CtrTransformer;
use super::hash::{self, HashType};
use super::key_info::{Algorithm, KeyInfo, Prf};
use crate::error::{Error, Result};

pub const IV_SIZE: usize = 16;
pub const KEY_SIZE: usize = 32;
const MAC_SIZE: usize = 32;

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    info: KeyInfo,
}

impl SymmetricKey {
    /// A new random AES-256 key.
    pub fn random() -> SymmetricKey {
        let mut key = vec![0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut key);
        SymmetricKey {
            key,
            info: KeyInfo::aes256(),
        }
    }

    /// Wrap existing key bytes.
    pub fn from_bytes(key: &[u8], info: KeyInfo) -> Result<SymmetricKey> {
        if key.len() != info.key_length() {
            return Err(Error::KeyFormat(format!(
                "Key is {} bytes, but its info says {}",
                key.len(),
                info.key_length()
            )));
        }
        Ok(SymmetricKey {
            key: key.to_vec(),
            info,
        })
    }

    /// Derive a key from a password using PBKDF2-HMAC-SHA256. Without a salt, the default salt is
    /// used.
    pub fn from_password(password: &str, rounds: u32, salt: Option<&[u8]>) -> Result<SymmetricKey> {
        let info = KeyInfo::password(
            Algorithm::Aes256,
            Prf::HmacSha256,
            rounds,
            salt.map(|s| s.to_vec()),
            KEY_SIZE,
        )?;
        Self::from_info(password, info)
    }

    /// Derive a key from a password, following an existing key description.
    pub fn from_info(password: &str, info: KeyInfo) -> Result<SymmetricKey> {
        let key = info.derive_password(password)?;
        Ok(SymmetricKey { key, info })
    }

    pub fn info(&self) -> &KeyInfo {
        &self.info
    }

    pub fn size(&self) -> usize {
        self.key.len()
    }

    pub fn bit_strength(&self) -> usize {
        self.size() * 8
    }

    /// Raw key bytes.
    pub fn pack(&self) -> &[u8] {
        &self.key
    }

    /// Encrypt with a fresh random IV. Not authenticated.
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut iv = [0u8; IV_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut iv);
        let mut out = Vec::with_capacity(IV_SIZE + data.len());
        out.extend_from_slice(&iv);
        out.extend(CtrTransformer::new(&self.key, &iv)?.transform(data));
        Ok(out)
    }

    /// Decrypt the output of [`encrypt`](Self::encrypt).
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < IV_SIZE {
            return Err(Error::LengthTooShort {
                step: "symmetric ciphertext IV",
                actual: data.len(),
                expected: IV_SIZE,
            });
        }
        let (iv, ct) = data.split_at(IV_SIZE);
        Ok(CtrTransformer::new(&self.key, iv)?.transform(ct))
    }

    /// Encrypt, then append an HMAC-SHA256 tag over the IV and ciphertext.
    pub fn eta_encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = self.encrypt(data)?;
        let mac = hash::hmac(HashType::Sha256, &self.key, &out)?;
        out.extend_from_slice(&mac);
        Ok(out)
    }

    /// Check the tag, then decrypt. Fails with [`Error::HmacMismatch`] if the data was altered or
    /// the key is wrong.
    pub fn eta_decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < IV_SIZE + MAC_SIZE {
            return Err(Error::LengthTooShort {
                step: "authenticated ciphertext",
                actual: data.len(),
                expected: IV_SIZE + MAC_SIZE,
            });
        }
        let (body, tag) = data.split_at(data.len() - MAC_SIZE);
        let mac = hash::hmac(HashType::Sha256, &self.key, body)?;
        if !constant_time_eq(&mac, tag) {
            warn!("HMAC mismatch on authenticated ciphertext");
            return Err(Error::HmacMismatch);
        }
        self.decrypt(body)
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq(&self.key, &other.key)
    }
}

impl Eq for SymmetricKey {}
