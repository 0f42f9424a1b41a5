//! RSA private keys: packing, password protection, signing, decryption, and generation.
//!
//! A plain private key packs as `dump([0, e, p, q])`. The rest of the key is derived from those
//! three on load. Password-protected keys pack as `dump([3, key_info, blob])`, where `key_info` is
//! a packed [`KeyInfo`] describing the PBKDF2 derivation and `blob` is the plain packed key under
//! [`SymmetricKey::eta_encrypt`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};
use std::thread;

use futures_core::FusedFuture;
use num_bigint::BigUint;
use num_traits::One;
use rand::RngCore;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::RsaPrivateKey;
use tracing::{debug, warn};

use super::key_info::{Algorithm, KeyInfo, Prf};
use super::public_key::{
    from_rsa_uint, key_bytes, left_pad, to_rsa_uint, OaepOptions, PublicKey, MAX_MODULUS_BITS,
};
use super::pss::{self, PssOptions};
use super::symmetric_key::{SymmetricKey, KEY_SIZE};
use crate::error::{Error, Result};
use crate::protocol;
use crate::value::Value;

/// Type tag of a plain packed private key.
pub const TYPE_PRIVATE: u64 = 0;
/// Type tag of the first password envelope. Recognized, never accepted.
pub const TYPE_PRIVATE_PASSWORD_V1: u64 = 2;
/// Type tag of the current password envelope.
pub const TYPE_PRIVATE_PASSWORD_V2: u64 = 3;

pub const DEFAULT_PBKDF2_ROUNDS: u32 = 160_000;
pub const DEFAULT_SALT_LEN: usize = 12;

/// How a private key is protected when packed with a password.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PasswordOptions {
    pub rounds: u32,
    pub salt_len: usize,
}

impl Default for PasswordOptions {
    fn default() -> Self {
        Self {
            rounds: DEFAULT_PBKDF2_ROUNDS,
            salt_len: DEFAULT_SALT_LEN,
        }
    }
}

/// The full set of RSA key parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct Exponents {
    pub n: BigUint,
    pub e: BigUint,
    pub d: BigUint,
    pub p: BigUint,
    pub q: BigUint,
    pub dp: BigUint,
    pub dq: BigUint,
    pub qinv: BigUint,
}

fn modulus_too_large(bits: u64) -> Error {
    Error::KeyFormat(format!(
        "modulus of {} bits exceeds the maximum of {}",
        bits, MAX_MODULUS_BITS
    ))
}

impl fmt::Debug for Exponents {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Exponents")
            .field("n", &self.n)
            .field("e", &self.e)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct PrivateKey {
    key: RsaPrivateKey,
}

impl PrivateKey {
    /// Build a key from its public exponent and two primes.
    pub fn from_exponents(e: &BigUint, p: &BigUint, q: &BigUint) -> Result<PrivateKey> {
        let one = BigUint::one();
        if *p <= one || *q <= one {
            return Err(Error::KeyFormat("primes must be greater than 1".to_string()));
        }
        // bits(p*q) is at least bits(p) + bits(q) - 1
        let max_bits = MAX_MODULUS_BITS as u64;
        if p.bits() + q.bits() > max_bits + 1 {
            return Err(modulus_too_large(p.bits() + q.bits() - 1));
        }
        let n = p * q;
        if n.bits() > max_bits {
            return Err(modulus_too_large(n.bits()));
        }
        let phi = (p - &one) * (q - &one);
        let d = e
            .modinv(&phi)
            .ok_or_else(|| Error::KeyFormat("public exponent isn't invertible".to_string()))?;
        let key = RsaPrivateKey::from_components(
            to_rsa_uint(&n),
            to_rsa_uint(e),
            to_rsa_uint(&d),
            vec![to_rsa_uint(p), to_rsa_uint(q)],
        )?;
        key.validate()?;
        Ok(PrivateKey { key })
    }

    /// Generate a new key of the given size, with public exponent 65537. Blocks until done.
    pub fn generate(bits: usize) -> Result<PrivateKey> {
        let mut rng = rand::rngs::OsRng;
        let key = RsaPrivateKey::new(&mut rng, bits)?;
        debug!(bits, "generated private key");
        Ok(PrivateKey { key })
    }

    /// Generate a new key on a worker thread.
    pub fn generate_async(bits: usize) -> KeyGeneration {
        KeyGeneration::start(bits)
    }

    pub fn exponents(&self) -> Exponents {
        let one = BigUint::one();
        let n = from_rsa_uint(self.key.n());
        let e = from_rsa_uint(self.key.e());
        let d = from_rsa_uint(self.key.d());
        let primes = self.key.primes();
        let p = primes.first().map(from_rsa_uint).unwrap_or_default();
        let q = primes.get(1).map(from_rsa_uint).unwrap_or_default();
        let dp = if p > one { &d % (&p - &one) } else { BigUint::default() };
        let dq = if q > one { &d % (&q - &one) } else { BigUint::default() };
        let qinv = q.modinv(&p).unwrap_or_default();
        Exponents {
            n,
            e,
            d,
            p,
            q,
            dp,
            dq,
            qinv,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_rsa(self.key.to_public_key())
    }

    pub fn bit_strength(&self) -> usize {
        self.key.n().bits()
    }

    /// Size of the modulus in bytes.
    pub fn size(&self) -> usize {
        self.key.size()
    }

    pub fn fingerprint(&self) -> Vec<u8> {
        self.public_key().fingerprint()
    }

    pub fn pack(&self) -> Result<Vec<u8>> {
        let primes = self.key.primes();
        if primes.len() != 2 {
            return Err(Error::KeyFormat(format!(
                "only two-prime keys can be packed, this one has {}",
                primes.len()
            )));
        }
        protocol::dump(&Value::from(vec![
            Value::from(TYPE_PRIVATE),
            Value::from(self.key.e().to_bytes_be()),
            Value::from(primes[0].to_bytes_be()),
            Value::from(primes[1].to_bytes_be()),
        ]))
    }

    /// Pack the key encrypted under a password.
    pub fn pack_with_password(&self, password: &str, opts: &PasswordOptions) -> Result<Vec<u8>> {
        let mut salt = vec![0u8; opts.salt_len];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        let info = KeyInfo::password(
            Algorithm::Aes256,
            Prf::HmacSha256,
            opts.rounds,
            Some(salt),
            KEY_SIZE,
        )?;
        let key = SymmetricKey::from_info(password, info)?;
        let blob = key.eta_encrypt(&self.pack()?)?;
        protocol::dump(&Value::from(vec![
            Value::from(TYPE_PRIVATE_PASSWORD_V2),
            Value::from(key.info().pack()?),
            Value::from(blob),
        ]))
    }

    /// Unpack a plain packed key. Password-protected keys need
    /// [`unpack_with_password`](Self::unpack_with_password).
    pub fn unpack(data: &[u8]) -> Result<PrivateKey> {
        let parts = Self::load_parts(data)?;
        match parts.first().and_then(Value::as_u64) {
            Some(TYPE_PRIVATE) => Self::from_parts(&parts),
            Some(TYPE_PRIVATE_PASSWORD_V2) => Err(Error::KeyFormat(
                "key is password protected, a password is required".to_string(),
            )),
            Some(TYPE_PRIVATE_PASSWORD_V1) => Err(Error::UnsupportedVersion(
                "password-protected key v1".to_string(),
            )),
            _ => Err(Error::KeyFormat("not a packed private key".to_string())),
        }
    }

    /// Unpack a password-protected key. Plain keys are accepted as well, and the password is
    /// ignored for them.
    pub fn unpack_with_password(data: &[u8], password: &str) -> Result<PrivateKey> {
        let parts = Self::load_parts(data)?;
        match parts.first().and_then(Value::as_u64) {
            Some(TYPE_PRIVATE) => Self::from_parts(&parts),
            Some(TYPE_PRIVATE_PASSWORD_V2) => {
                if parts.len() < 3 {
                    return Err(Error::KeyFormat("password envelope is incomplete".to_string()));
                }
                let info = parts[1]
                    .as_slice()
                    .ok_or_else(|| Error::KeyFormat("key info should be a byte string".to_string()))?;
                let blob = parts[2]
                    .as_slice()
                    .ok_or_else(|| Error::KeyFormat("encrypted key should be a byte string".to_string()))?;
                let info = KeyInfo::unpack(info)?;
                if info.algorithm() != Algorithm::Aes256 || !info.is_password() {
                    return Err(Error::KeyFormat(format!(
                        "password envelope can't use key info {}",
                        info
                    )));
                }
                let key = SymmetricKey::from_info(password, info)?;
                let plain = key.eta_decrypt(blob).map_err(|e| {
                    warn!("couldn't open password-protected key");
                    e
                })?;
                let inner = Self::unpack(&plain)?;
                debug!(bits = inner.bit_strength(), "opened password-protected key");
                Ok(inner)
            }
            Some(TYPE_PRIVATE_PASSWORD_V1) => Err(Error::UnsupportedVersion(
                "password-protected key v1".to_string(),
            )),
            _ => Err(Error::KeyFormat("not a packed private key".to_string())),
        }
    }

    fn load_parts(data: &[u8]) -> Result<Vec<Value>> {
        let parts = protocol::load(data)?;
        parts
            .as_list()
            .map(|l| l.to_vec())
            .ok_or_else(|| Error::KeyFormat("packed key should be a list".to_string()))
    }

    fn from_parts(parts: &[Value]) -> Result<PrivateKey> {
        if parts.len() < 4 {
            return Err(Error::KeyFormat("private key needs e, p, and q".to_string()));
        }
        let e = key_bytes(&parts[1], "public exponent")?;
        let p = key_bytes(&parts[2], "prime p")?;
        let q = key_bytes(&parts[3], "prime q")?;
        let key = Self::from_exponents(&e, &p, &q)?;
        debug!(bits = key.bit_strength(), "unpacked private key");
        Ok(key)
    }

    /// Sign a message with PSS. The signature is as long as the modulus.
    pub fn sign(&self, message: &[u8], opts: &PssOptions) -> Result<Vec<u8>> {
        let m_hash = opts.hash.digest(message);
        let em = pss::encode(&m_hash, self.bit_strength(), opts)?;
        let m = rsa::BigUint::from_bytes_be(&em);
        let mut rng = rand::rngs::OsRng;
        let s = rsa::hazmat::rsa_decrypt_and_check(&self.key, Some(&mut rng), &m)?;
        left_pad(s.to_bytes_be(), self.size())
            .ok_or_else(|| Error::BadEncode("signature longer than the modulus".to_string()))
    }

    /// Decrypt OAEP ciphertext.
    pub fn decrypt(&self, data: &[u8], opts: &OaepOptions) -> Result<Vec<u8>> {
        Ok(self.key.decrypt(opts.padding(), data)?)
    }

    pub fn short_address(&self) -> Vec<u8> {
        self.public_key().short_address()
    }

    pub fn long_address(&self) -> Vec<u8> {
        self.public_key().long_address()
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public", &self.public_key())
            .finish_non_exhaustive()
    }
}

struct GenerationState {
    result: Option<Result<PrivateKey>>,
    waker: Option<Waker>,
    cancelled: bool,
    finished: bool,
}

fn lock(state: &Mutex<GenerationState>) -> MutexGuard<'_, GenerationState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// A pending key generation, running on its own thread.
///
/// Resolves to the new key. Dropping it, or calling [`cancel`](Self::cancel), abandons the
/// result; the worker thread still runs to completion but its key is discarded.
#[must_use = "futures do nothing unless polled"]
pub struct KeyGeneration {
    state: Arc<Mutex<GenerationState>>,
    bits: usize,
}

impl KeyGeneration {
    fn start(bits: usize) -> KeyGeneration {
        let state = Arc::new(Mutex::new(GenerationState {
            result: None,
            waker: None,
            cancelled: false,
            finished: false,
        }));
        let worker = Arc::clone(&state);
        thread::spawn(move || {
            if lock(&worker).cancelled {
                return;
            }
            let key = PrivateKey::generate(bits);
            let mut state = lock(&worker);
            if state.cancelled {
                debug!(bits, "discarding key from cancelled generation");
                return;
            }
            state.result = Some(key);
            if let Some(waker) = state.waker.take() {
                waker.wake();
            }
        });
        KeyGeneration { state, bits }
    }

    /// Requested key size, in bits.
    pub fn bits(&self) -> usize {
        self.bits
    }

    /// Abandon the generation.
    pub fn cancel(self) {
        drop(self)
    }
}

impl Future for KeyGeneration {
    type Output = Result<PrivateKey>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = lock(&self.state);
        if state.finished {
            return Poll::Pending;
        }
        match state.result.take() {
            Some(result) => {
                state.finished = true;
                Poll::Ready(result)
            }
            None => {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl FusedFuture for KeyGeneration {
    fn is_terminated(&self) -> bool {
        lock(&self.state).finished
    }
}

impl Drop for KeyGeneration {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        state.cancelled = true;
        state.result = None;
        state.waker = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::HashType;
    use crate::crypto::public_key::tests::*;
    use crate::crypto::public_key::{encode_address, is_valid_address};
    use crate::crypto::pss::SaltLength;

    const ADDRESS_PRIVATE_KEY: &str = "26001c010001c40001f05da97d084313655c43e7caf582fd2dcb76eff3309ec49cc70ef7a2c82547e01b3c5a6d51ca48ae44bc05d1a089c2019865a44c49bbcd48c54ae59f21dba28f65fee44d1aa1389cfa9eca8a2e218f94c735b5bb1e3313afafcfd62657fb86bdd7bf3cbda7943509a9ce2c92534584424b0f8fe5fbadd944c378aa967d206128a6a1e259b597c286d67778ee3c548df8ea39aff4ec993a1858e2fc51d12698b674280664ddc0714b81613b97f1da4b9be8a2617be4faa720a5a183f2910862040b26e0292cc3368442210f1b6171bb0ccdd1e042d253afd8eabb79f6edfcf27dce28a09b7d81ffc161a64dcf42190aedac1cf50ec86bb390fd15ab33b4d4f44fc40001d9bd6a350d985789f574ed8c410e7cf1d79db784a494b33d98c440794797fa8ba76d5feb7c32897a221f87dc26414076d279333eed9e0d7c6c8fea801ec07f3ad69921a3f2e1ec6a0910fea6af48703fd98b92e6b6eaba23b3a619ab071ba4f80a89790e50619a921bf5f93193f54b059c78af097209ce050bd0eada0c6775a003315d8d4d3cccd0ee2740ad1a404ccd37d92992a2a717bcdbd46785813ab0f701be34753af658565c8f10550e91f13c1e1a1e167dcd7d37cd87189beb8baee375366346553b7951b35e1e2c80446bbeb2398163932dd288bdd44ba7f15a9fb05372e0340162ce3fa6ef324fd06b677990c9faf1e8dd7342a73ab2640695bf09";

    fn pss_key() -> PrivateKey {
        PrivateKey::from_exponents(&BigUint::from(65537u32), &big(PSS_P), &big(PSS_Q)).unwrap()
    }

    #[test]
    fn pss_vector_signature() {
        let key = pss_key();
        assert_eq!(key.exponents().n, big(PSS_N));
        let opts = PssOptions::new(HashType::Sha1, HashType::Sha1)
            .with_salt(SaltLength::Fixed(hex::decode(PSS_SALT).unwrap()));
        let msg = hex::decode(PSS_MESSAGE).unwrap();
        let sig = key.sign(&msg, &opts).unwrap();
        assert_eq!(hex::encode(&sig), PSS_SIGNATURE);
    }

    #[test]
    fn sign_and_verify() {
        let key = pss_key();
        let public = key.public_key();
        for opts in [
            PssOptions::default(),
            PssOptions::new(HashType::Sha512, HashType::Sha1),
            PssOptions::new(HashType::Sha3_384, HashType::Sha1),
            PssOptions::new(HashType::Sha256, HashType::Sha256).with_salt(SaltLength::Length(0)),
        ] {
            let sig = key.sign(b"hello", &opts).unwrap();
            assert_eq!(sig.len(), 128);
            assert!(public.verify(b"hello", &sig, &opts).unwrap());
            assert!(!public.verify(b"hellp", &sig, &opts).unwrap());
        }
    }

    #[test]
    fn exponents_are_consistent() {
        let key = pss_key();
        let ex = key.exponents();
        let one = BigUint::one();
        assert_eq!(ex.n, &ex.p * &ex.q);
        assert_eq!((&ex.d * &ex.e) % ((&ex.p - &one) * (&ex.q - &one)), one);
        assert_eq!(ex.dp, &ex.d % (&ex.p - &one));
        assert_eq!(ex.dq, &ex.d % (&ex.q - &one));
        assert_eq!((&ex.qinv * &ex.q) % &ex.p, one);
    }

    #[test]
    fn pack_roundtrip() {
        let key = pss_key();
        let packed = key.pack().unwrap();
        let parts = protocol::load(&packed).unwrap();
        assert_eq!(parts[0].as_u64(), Some(TYPE_PRIVATE));
        assert_eq!(parts[1].as_slice(), Some(&[1u8, 0, 1][..]));
        let back = PrivateKey::unpack(&packed).unwrap();
        assert_eq!(back.exponents(), key.exponents());
        assert_eq!(back.public_key(), key.public_key());
    }

    #[test]
    fn password_roundtrip() {
        let key = pss_key();
        let opts = PasswordOptions {
            rounds: 1000,
            ..PasswordOptions::default()
        };
        let packed = key.pack_with_password("correct horse", &opts).unwrap();
        let parts = protocol::load(&packed).unwrap();
        assert_eq!(parts[0].as_u64(), Some(TYPE_PRIVATE_PASSWORD_V2));
        let info = KeyInfo::unpack(parts[1].as_slice().unwrap()).unwrap();
        assert_eq!(info.rounds(), 1000);
        assert_eq!(info.salt().map(|s| s.len()), Some(DEFAULT_SALT_LEN));

        let back = PrivateKey::unpack_with_password(&packed, "correct horse").unwrap();
        assert_eq!(back.exponents(), key.exponents());
        assert!(matches!(
            PrivateKey::unpack_with_password(&packed, "wrong"),
            Err(Error::HmacMismatch)
        ));
        assert!(matches!(PrivateKey::unpack(&packed), Err(Error::KeyFormat(_))));
        // Plain keys pass through the password path unchanged
        let plain = PrivateKey::unpack_with_password(&key.pack().unwrap(), "any").unwrap();
        assert_eq!(plain.exponents(), key.exponents());
    }

    #[test]
    fn rejects_v1_and_unknown() {
        let v1 = protocol::dump(&Value::from(vec![
            Value::from(TYPE_PRIVATE_PASSWORD_V1),
            Value::from(vec![0u8; 8]),
            Value::from(vec![0u8; 8]),
        ]))
        .unwrap();
        assert!(matches!(PrivateKey::unpack(&v1), Err(Error::UnsupportedVersion(_))));
        assert!(matches!(
            PrivateKey::unpack_with_password(&v1, "pw"),
            Err(Error::UnsupportedVersion(_))
        ));
        let public = pss_key().public_key().pack().unwrap();
        assert!(matches!(PrivateKey::unpack(&public), Err(Error::KeyFormat(_))));
    }

    #[test]
    fn rejects_oversized_modulus() {
        let e = BigUint::from(65537u32);
        let big_prime = (BigUint::one() << 4200u32) + BigUint::one();
        assert!(matches!(
            PrivateKey::from_exponents(&e, &big_prime, &big_prime),
            Err(Error::KeyFormat(_))
        ));
        let packed = protocol::dump(&Value::from(vec![
            Value::from(TYPE_PRIVATE),
            Value::from(vec![1u8, 0, 1]),
            Value::from(big_prime.to_bytes_be()),
            Value::from(big_prime.to_bytes_be()),
        ]))
        .unwrap();
        assert!(matches!(PrivateKey::unpack(&packed), Err(Error::KeyFormat(_))));
    }

    #[test]
    fn password_envelope_limits() {
        for (key_length, rounds) in [(1u64 << 62, 1000u64), (32, u32::MAX as u64)] {
            let mut info = protocol::Writer::new();
            for v in [
                Value::from(3),
                Value::Null,
                Value::from(2),
                Value::from(key_length),
                Value::from(0),
                Value::from(rounds),
                Value::Null,
            ] {
                info.write(&v).unwrap();
            }
            let envelope = protocol::dump(&Value::from(vec![
                Value::from(TYPE_PRIVATE_PASSWORD_V2),
                Value::from(info.into_bytes()),
                Value::from(vec![0u8; 64]),
            ]))
            .unwrap();
            assert!(matches!(
                PrivateKey::unpack_with_password(&envelope, "password"),
                Err(Error::BadEncode(_))
            ));
        }
    }

    #[test]
    fn known_short_address() {
        let packed = hex::decode(ADDRESS_PRIVATE_KEY).unwrap();
        let key = PrivateKey::unpack(&packed).unwrap();
        assert_eq!(key.bit_strength(), 4096);
        assert_eq!(
            encode_address(&key.short_address()),
            "26RzRJDLqze3P5Z1AzpnucF75RLi1oa6jqBaDh8MJ3XmTaUoF8R"
        );
        assert!(is_valid_address(&key.long_address()));
    }

    #[test]
    fn oaep_roundtrip() {
        let key = pss_key();
        let public = key.public_key();
        let opts = OaepOptions::default();
        let ct = public.encrypt(b"attack at dawn", &opts).unwrap();
        assert_eq!(key.decrypt(&ct, &opts).unwrap(), b"attack at dawn");
        let sha256 = OaepOptions {
            hash: HashType::Sha256,
            mgf1_hash: HashType::Sha1,
        };
        let ct = public.encrypt(b"attack at dawn", &sha256).unwrap();
        assert_eq!(key.decrypt(&ct, &sha256).unwrap(), b"attack at dawn");
        assert!(key.decrypt(&ct, &opts).is_err());
    }

    #[test]
    fn bad_exponents() {
        let e = BigUint::from(65537u32);
        assert!(PrivateKey::from_exponents(&e, &BigUint::one(), &big(PSS_Q)).is_err());
        // e shares a factor with (p-1)(q-1)
        assert!(PrivateKey::from_exponents(&BigUint::from(2u32), &big(PSS_P), &big(PSS_Q)).is_err());
    }

    #[test]
    fn async_generation() {
        let generation = PrivateKey::generate_async(1024);
        assert_eq!(generation.bits(), 1024);
        let key = futures_executor::block_on(generation).unwrap();
        assert_eq!(key.bit_strength(), 1024);
        let sig = key.sign(b"data", &PssOptions::default()).unwrap();
        assert!(key.public_key().verify(b"data", &sig, &PssOptions::default()).unwrap());
    }

    #[test]
    fn cancelled_generation() {
        let generation = PrivateKey::generate_async(1024);
        let state = Arc::clone(&generation.state);
        generation.cancel();
        assert!(lock(&state).cancelled);
        assert!(lock(&state).result.is_none());
    }
}
