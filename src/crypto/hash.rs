//! Digest, HMAC, PBKDF2, and CRC32 over a closed set of hash algorithms.

use std::fmt;

use digest::{core_api::BlockSizeUser, Digest, DynDigest};
use hmac::{Mac, SimpleHmac};
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};
use sha3::{Sha3_256, Sha3_384, Sha3_512};

use crate::error::{Error, Result};

/// Highest PBKDF2 iteration count accepted when deriving a key.
pub const MAX_PBKDF2_ROUNDS: u32 = 10_000_000;
/// Longest key PBKDF2 will derive, in bytes. Matches the byte length of the largest RSA modulus.
pub const MAX_DERIVED_KEY_LEN: usize = 1024;

/// A hash algorithm usable for signatures, key derivation, and MACs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HashType {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
    Sha3_256,
    Sha3_384,
    Sha3_512,
}

impl HashType {
    /// Length of the digest, in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            HashType::Sha1 => 20,
            HashType::Sha256 | HashType::Sha3_256 => 32,
            HashType::Sha384 | HashType::Sha3_384 => 48,
            HashType::Sha512 | HashType::Sha3_512 => 64,
        }
    }

    /// A fresh hasher of this type, behind a trait object.
    pub fn boxed(&self) -> Box<dyn DynDigest + Send + Sync> {
        match self {
            HashType::Sha1 => Box::new(Sha1::new()),
            HashType::Sha256 => Box::new(Sha256::new()),
            HashType::Sha384 => Box::new(Sha384::new()),
            HashType::Sha512 => Box::new(Sha512::new()),
            HashType::Sha3_256 => Box::new(Sha3_256::new()),
            HashType::Sha3_384 => Box::new(Sha3_384::new()),
            HashType::Sha3_512 => Box::new(Sha3_512::new()),
        }
    }

    /// Hash some data in one go.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        let mut state = HashState::new(*self);
        state.update(data);
        state.finalize()
    }
}

impl fmt::Display for HashType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            HashType::Sha1 => "SHA-1",
            HashType::Sha256 => "SHA-256",
            HashType::Sha384 => "SHA-384",
            HashType::Sha512 => "SHA-512",
            HashType::Sha3_256 => "SHA3-256",
            HashType::Sha3_384 => "SHA3-384",
            HashType::Sha3_512 => "SHA3-512",
        };
        f.write_str(name)
    }
}

/// An in-progress hash, fed incrementally.
pub struct HashState {
    hash_type: HashType,
    state: Box<dyn DynDigest + Send + Sync>,
}

impl HashState {
    pub fn new(hash_type: HashType) -> HashState {
        HashState {
            hash_type,
            state: hash_type.boxed(),
        }
    }

    pub fn hash_type(&self) -> HashType {
        self.hash_type
    }

    pub fn update(&mut self, data: &[u8]) {
        self.state.update(data);
    }

    /// Digest of everything fed so far, without consuming the state.
    pub fn get_hash(&self) -> Vec<u8> {
        self.state.box_clone().finalize().into_vec()
    }

    pub fn finalize(self) -> Vec<u8> {
        self.state.finalize().into_vec()
    }
}

impl fmt::Debug for HashState {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "HashState {{ hash_type: {} }}", self.hash_type)
    }
}

fn simple_hmac<D>(key: &[u8], data: &[u8]) -> Result<Vec<u8>>
where
    D: Digest + BlockSizeUser,
{
    let mut mac = <SimpleHmac<D> as Mac>::new_from_slice(key)
        .map_err(|_| Error::KeyFormat("HMAC key of invalid length".to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// HMAC of some data.
pub fn hmac(hash_type: HashType, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    match hash_type {
        HashType::Sha1 => simple_hmac::<Sha1>(key, data),
        HashType::Sha256 => simple_hmac::<Sha256>(key, data),
        HashType::Sha384 => simple_hmac::<Sha384>(key, data),
        HashType::Sha512 => simple_hmac::<Sha512>(key, data),
        HashType::Sha3_256 => simple_hmac::<Sha3_256>(key, data),
        HashType::Sha3_384 => simple_hmac::<Sha3_384>(key, data),
        HashType::Sha3_512 => simple_hmac::<Sha3_512>(key, data),
    }
}

/// PBKDF2 with HMAC as the pseudo-random function. Only the SHA-1 and SHA-2 families are
/// supported.
pub fn pbkdf2(
    hash_type: HashType,
    password: &[u8],
    salt: &[u8],
    rounds: u32,
    key_len: usize,
) -> Result<Vec<u8>> {
    if rounds == 0 {
        return Err(Error::KeyFormat("PBKDF2 needs at least one round".to_string()));
    }
    if rounds > MAX_PBKDF2_ROUNDS {
        return Err(Error::BadEncode(format!(
            "PBKDF2 round count {} exceeds the maximum of {}",
            rounds, MAX_PBKDF2_ROUNDS
        )));
    }
    if key_len > MAX_DERIVED_KEY_LEN {
        return Err(Error::BadEncode(format!(
            "PBKDF2 key length {} exceeds the maximum of {}",
            key_len, MAX_DERIVED_KEY_LEN
        )));
    }
    let mut out = vec![0u8; key_len];
    match hash_type {
        HashType::Sha1 => ::pbkdf2::pbkdf2_hmac::<Sha1>(password, salt, rounds, &mut out),
        HashType::Sha256 => ::pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, rounds, &mut out),
        HashType::Sha384 => ::pbkdf2::pbkdf2_hmac::<Sha384>(password, salt, rounds, &mut out),
        HashType::Sha512 => ::pbkdf2::pbkdf2_hmac::<Sha512>(password, salt, rounds, &mut out),
        other => {
            return Err(Error::KeyFormat(format!(
                "PBKDF2 is not available with {}",
                other
            )))
        }
    }
    Ok(out)
}

/// CRC32 (IEEE) of the data, as big-endian bytes.
pub fn crc32(data: &[u8]) -> [u8; 4] {
    crc32fast::hash(data).to_be_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digests() {
        assert_eq!(
            hex::encode(HashType::Sha1.digest(b"abc")),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            hex::encode(HashType::Sha256.digest(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            hex::encode(HashType::Sha3_256.digest(b"abc")),
            "3a985da74fe225b2045c172d6bd390bd855f086e3e9d525b46bfe24511431532"
        );
        for ht in [
            HashType::Sha1,
            HashType::Sha256,
            HashType::Sha384,
            HashType::Sha512,
            HashType::Sha3_256,
            HashType::Sha3_384,
            HashType::Sha3_512,
        ] {
            assert_eq!(ht.digest(b"").len(), ht.output_len());
        }
    }

    #[test]
    fn incremental() {
        let mut state = HashState::new(HashType::Sha512);
        state.update(b"one");
        let partial = state.get_hash();
        assert_eq!(partial, HashType::Sha512.digest(b"one"));
        state.update(b"two");
        assert_eq!(state.finalize(), HashType::Sha512.digest(b"onetwo"));
    }

    #[test]
    fn hmac_rfc4231() {
        let key = [0x0bu8; 20];
        let mac = hmac(HashType::Sha256, &key, b"Hi There").unwrap();
        assert_eq!(
            hex::encode(mac),
            "b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da726e9376c2e32cff7"
        );
    }

    #[test]
    fn pbkdf2_vectors() {
        let dk = pbkdf2(HashType::Sha1, b"password", b"salt", 1, 20).unwrap();
        assert_eq!(hex::encode(dk), "0c60c80f961f0e71f3a9b524af6012062fe037a6");
        let dk = pbkdf2(HashType::Sha256, b"password", b"salt", 1, 32).unwrap();
        assert_eq!(
            hex::encode(dk),
            "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b"
        );
        let dk = pbkdf2(HashType::Sha256, b"password", b"salt", 2, 32).unwrap();
        assert_eq!(
            hex::encode(dk),
            "ae4d0c95af6b46d32d0adff928f06dd02a303f8ef3c251dfd6e2d85a95474c43"
        );
        let dk = pbkdf2(HashType::Sha256, b"password", b"salt", 4096, 32).unwrap();
        assert_eq!(
            hex::encode(dk),
            "c5e478d59288c841aa530db6845c4c8d962893a001ce4e11a4963873aa98134a"
        );
        let salt = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, "KFuMDXmo")
            .unwrap();
        let expected = base64::Engine::decode(
            &base64::engine::general_purpose::STANDARD,
            "yPsu5qmQto99vDqAMWnldNuagfVl5OhPr6g=",
        )
        .unwrap();
        let dk = pbkdf2(HashType::Sha512, b"test", &salt, 5000, 26).unwrap();
        assert_eq!(dk, expected);
    }

    #[test]
    fn pbkdf2_rejects_sha3() {
        assert!(pbkdf2(HashType::Sha3_256, b"pw", b"salt", 1, 32).is_err());
        assert!(pbkdf2(HashType::Sha256, b"pw", b"salt", 0, 32).is_err());
    }

    #[test]
    fn pbkdf2_limits() {
        assert!(matches!(
            pbkdf2(HashType::Sha256, b"pw", b"salt", u32::MAX, 32),
            Err(Error::BadEncode(_))
        ));
        assert!(matches!(
            pbkdf2(HashType::Sha256, b"pw", b"salt", 1, 1 << 62),
            Err(Error::BadEncode(_))
        ));
        assert!(pbkdf2(HashType::Sha256, b"pw", b"salt", 1, MAX_DERIVED_KEY_LEN).is_ok());
    }

    #[test]
    fn crc32_check_value() {
        assert_eq!(crc32(b"123456789"), [0xcb, 0xf4, 0x39, 0x26]);
    }
}
