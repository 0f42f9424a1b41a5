//! Description of a key: what algorithm it's for, and, for password-derived keys, how it was
//! derived.
//!
//! The packed form is a BOSS stream (not a list) of:
//! `algorithm, tag, prf, key_length, [0, rounds], salt`, where the bracketed pair is only present
//! when the key is derived from a password. The leading 0 is the PBKDF type, and only PBKDF2 is
//! defined.

use std::fmt;

use base64::Engine;

use super::hash::{self, HashType};
use crate::error::{Error, Result};
use crate::protocol::{Reader, Writer};
use crate::value::Value;

/// Salt used for password-derived keys that don't carry one.
pub const DEFAULT_KEY_SALT: &[u8] = b"attesta";

const PBKDF_TYPE_PBKDF2: u64 = 0;

/// Key algorithm identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Unknown,
    RsaPublic,
    RsaPrivate,
    Aes256,
}

impl Algorithm {
    pub fn into_u64(self) -> u64 {
        match self {
            Algorithm::Unknown => 0,
            Algorithm::RsaPublic => 1,
            Algorithm::RsaPrivate => 2,
            Algorithm::Aes256 => 3,
        }
    }

    pub fn from_u64(v: u64) -> Option<Algorithm> {
        match v {
            0 => Some(Algorithm::Unknown),
            1 => Some(Algorithm::RsaPublic),
            2 => Some(Algorithm::RsaPrivate),
            3 => Some(Algorithm::Aes256),
            _ => None,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Algorithm::Unknown => f.write_str("UNKNOWN"),
            Algorithm::RsaPublic => f.write_str("RSAPublic"),
            Algorithm::RsaPrivate => f.write_str("RSAPrivate"),
            Algorithm::Aes256 => f.write_str("AES256"),
        }
    }
}

/// Pseudo-random function used for password derivation. `None` means the key isn't derived from
/// a password at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Prf {
    None,
    HmacSha1,
    HmacSha256,
    HmacSha512,
}

impl Prf {
    pub fn into_u64(self) -> u64 {
        match self {
            Prf::None => 0,
            Prf::HmacSha1 => 1,
            Prf::HmacSha256 => 2,
            Prf::HmacSha512 => 3,
        }
    }

    pub fn from_u64(v: u64) -> Option<Prf> {
        match v {
            0 => Some(Prf::None),
            1 => Some(Prf::HmacSha1),
            2 => Some(Prf::HmacSha256),
            3 => Some(Prf::HmacSha512),
            _ => None,
        }
    }

    pub fn hash_type(self) -> Option<HashType> {
        match self {
            Prf::None => None,
            Prf::HmacSha1 => Some(HashType::Sha1),
            Prf::HmacSha256 => Some(HashType::Sha256),
            Prf::HmacSha512 => Some(HashType::Sha512),
        }
    }
}

impl fmt::Display for Prf {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Prf::None => f.write_str("None"),
            Prf::HmacSha1 => f.write_str("HMAC_SHA1"),
            Prf::HmacSha256 => f.write_str("HMAC_SHA256"),
            Prf::HmacSha512 => f.write_str("HMAC_SHA512"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyInfo {
    algorithm: Algorithm,
    tag: Option<Vec<u8>>,
    prf: Prf,
    key_length: usize,
    rounds: u32,
    salt: Option<Vec<u8>>,
}

impl KeyInfo {
    /// Describe a plain key. AES-256 keys always have a key length of 32, and no key may be longer
    /// than [`hash::MAX_DERIVED_KEY_LEN`].
    pub fn new(algorithm: Algorithm, key_length: usize) -> Result<KeyInfo> {
        let key_length = if algorithm == Algorithm::Aes256 && key_length == 0 {
            32
        } else {
            key_length
        };
        if key_length == 0 {
            return Err(Error::KeyFormat("KeyInfo: no key length".to_string()));
        }
        if algorithm == Algorithm::Aes256 && key_length != 32 {
            return Err(Error::BadEncode(format!(
                "KeyInfo: AES-256 key length must be 32, not {}",
                key_length
            )));
        }
        if key_length > hash::MAX_DERIVED_KEY_LEN {
            return Err(Error::BadEncode(format!(
                "KeyInfo: key length {} is too large",
                key_length
            )));
        }
        Ok(KeyInfo {
            algorithm,
            tag: None,
            prf: Prf::None,
            key_length,
            rounds: 0,
            salt: None,
        })
    }

    /// Describe a plain AES-256 key.
    pub fn aes256() -> KeyInfo {
        KeyInfo {
            algorithm: Algorithm::Aes256,
            tag: None,
            prf: Prf::None,
            key_length: 32,
            rounds: 0,
            salt: None,
        }
    }

    /// Describe a key derived from a password. Without a salt, the default salt is used.
    pub fn password(
        algorithm: Algorithm,
        prf: Prf,
        rounds: u32,
        salt: Option<Vec<u8>>,
        key_length: usize,
    ) -> Result<KeyInfo> {
        if prf == Prf::None {
            return Err(Error::KeyFormat(
                "KeyInfo: password keys need a PRF".to_string(),
            ));
        }
        if rounds > hash::MAX_PBKDF2_ROUNDS {
            return Err(Error::BadEncode(format!(
                "KeyInfo: round count {} exceeds the maximum of {}",
                rounds,
                hash::MAX_PBKDF2_ROUNDS
            )));
        }
        let mut info = KeyInfo::new(algorithm, key_length)?;
        info.prf = prf;
        info.rounds = rounds;
        info.salt = Some(salt.unwrap_or_else(|| DEFAULT_KEY_SALT.to_vec()));
        Ok(info)
    }

    pub fn with_tag(mut self, tag: Option<Vec<u8>>) -> Self {
        self.tag = tag;
        self
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn tag(&self) -> Option<&[u8]> {
        self.tag.as_deref()
    }

    pub fn set_tag(&mut self, tag: Option<Vec<u8>>) {
        self.tag = tag;
    }

    pub fn prf(&self) -> Prf {
        self.prf
    }

    pub fn key_length(&self) -> usize {
        self.key_length
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn salt(&self) -> Option<&[u8]> {
        self.salt.as_deref()
    }

    pub fn is_password(&self) -> bool {
        self.prf != Prf::None
    }

    /// Encode as a BOSS stream.
    pub fn pack(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new();
        writer.write(&Value::from(self.algorithm.into_u64()))?;
        writer.write(&Value::from(self.tag.clone()))?;
        writer.write(&Value::from(self.prf.into_u64()))?;
        writer.write(&Value::from(self.key_length))?;
        if self.is_password() {
            writer.write(&Value::from(PBKDF_TYPE_PBKDF2))?;
            writer.write(&Value::from(self.rounds))?;
        }
        writer.write(&Value::from(self.salt.clone()))?;
        Ok(writer.into_bytes())
    }

    /// Decode from a BOSS stream.
    pub fn unpack(data: &[u8]) -> Result<KeyInfo> {
        let mut reader = Reader::new(data);
        let mut next = |field: &'static str| -> Result<Value> {
            reader.read()?.ok_or(Error::LengthTooShort {
                step: field,
                actual: 0,
                expected: 1,
            })
        };

        let algorithm = next("KeyInfo algorithm")?
            .as_u64()
            .and_then(Algorithm::from_u64)
            .ok_or_else(|| Error::KeyFormat("KeyInfo: unknown algorithm".to_string()))?;
        let tag = opt_bytes(next("KeyInfo tag")?, "tag")?;
        let prf = next("KeyInfo prf")?
            .as_u64()
            .and_then(Prf::from_u64)
            .ok_or_else(|| Error::KeyFormat("KeyInfo: unknown PRF".to_string()))?;
        let key_length = next("KeyInfo key length")?
            .as_u64()
            .and_then(|l| usize::try_from(l).ok())
            .ok_or_else(|| Error::KeyFormat("KeyInfo: bad key length".to_string()))?;

        let mut rounds = 0;
        if prf != Prf::None {
            let pbkdf_type = next("KeyInfo PBKDF type")?.as_u64();
            if pbkdf_type != Some(PBKDF_TYPE_PBKDF2) {
                return Err(Error::KeyFormat("KeyInfo: unknown PBKDF type".to_string()));
            }
            rounds = next("KeyInfo rounds")?
                .as_u64()
                .and_then(|r| u32::try_from(r).ok())
                .ok_or_else(|| Error::KeyFormat("KeyInfo: bad round count".to_string()))?;
        }
        let salt = opt_bytes(next("KeyInfo salt")?, "salt")?;

        let info = if prf == Prf::None {
            let mut info = KeyInfo::new(algorithm, key_length)?;
            info.salt = salt;
            info
        } else {
            KeyInfo::password(algorithm, prf, rounds, salt, key_length)?
        };
        Ok(info.with_tag(tag))
    }

    /// Whether a key described by `other` could stand in for one described by `self`. A private
    /// key matches a public one, but not the other way around.
    pub fn match_type(&self, other: &KeyInfo) -> bool {
        if self.key_length != other.key_length {
            return false;
        }
        if self.algorithm == other.algorithm && self.algorithm != Algorithm::RsaPublic {
            return true;
        }
        self.algorithm == Algorithm::RsaPrivate && other.algorithm == Algorithm::RsaPublic
    }

    /// Both tags are present and equal.
    pub fn match_tag(&self, other: &KeyInfo) -> bool {
        match (&self.tag, &other.tag) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Run PBKDF2 over the password to get the key bytes.
    pub fn derive_password(&self, password: &str) -> Result<Vec<u8>> {
        let hash_type = self
            .prf
            .hash_type()
            .ok_or_else(|| Error::KeyFormat("KeyInfo: not a password key".to_string()))?;
        let salt = self.salt.as_deref().unwrap_or(DEFAULT_KEY_SALT);
        hash::pbkdf2(
            hash_type,
            password.as_bytes(),
            salt,
            self.rounds,
            self.key_length,
        )
    }
}

fn opt_bytes(v: Value, field: &str) -> Result<Option<Vec<u8>>> {
    match v {
        Value::Null => Ok(None),
        Value::Bin(b) => Ok(Some(b)),
        _ => Err(Error::KeyFormat(format!(
            "KeyInfo: {} should be binary or null",
            field
        ))),
    }
}

impl fmt::Display for KeyInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let tag = match &self.tag {
            Some(t) => base64::engine::general_purpose::STANDARD.encode(t),
            None => "null".to_string(),
        };
        if self.is_password() {
            write!(
                f,
                "PBKDF2({},{}), {}, tag={} kLength={}",
                self.prf, self.rounds, self.algorithm, tag, self.key_length
            )
        } else {
            write!(f, "{}, tag={} kLength={}", self.algorithm, tag, self.key_length)
        }
    }
}
