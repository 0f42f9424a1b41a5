//! Extended signatures: a PSS signature over a small record that names the signing key, holds the
//! SHA-512 digest of the signed data, and records when the signature was made.
//!
//! The envelope is `dump({exts, sign})`, where `exts` is the packed inner record
//! `{key, sha512, created_at, pub_key}` and `sign` is the PSS signature over `exts` (SHA-512,
//! MGF1 with SHA-1, maximal salt). Carrying the packed public key lets a verifier recover the key
//! from the signature alone.

use constant_time_eq::constant_time_eq;
use tracing::debug;

use super::hash::HashType;
use super::private_key::PrivateKey;
use super::pss::PssOptions;
use super::public_key::PublicKey;
use crate::error::{Error, Result};
use crate::protocol;
use crate::timestamp::Timestamp;
use crate::value::{Dict, Value};

/// What a successful verification tells about a signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedSignature {
    /// Fingerprint of the signing key.
    pub key: Vec<u8>,
    /// When the signer claims to have signed.
    pub created_at: Timestamp,
}

fn options() -> PssOptions {
    PssOptions::new(HashType::Sha512, HashType::Sha1)
}

/// Identifier of the key in extended signatures. Same as [`PublicKey::fingerprint`].
pub fn key_id(key: &PublicKey) -> Vec<u8> {
    key.fingerprint()
}

/// Sign data.
pub fn sign(key: &PrivateKey, data: &[u8]) -> Result<Vec<u8>> {
    let public = key.public_key();
    let created_at = Timestamp::now()
        .ok_or_else(|| Error::BadEncode("system clock is before the Unix epoch".to_string()))?;
    let mut record = Dict::with_capacity(4);
    record.insert("key", public.fingerprint());
    record.insert("sha512", HashType::Sha512.digest(data));
    record.insert("created_at", created_at);
    record.insert("pub_key", public.pack()?);
    let exts = protocol::dump(&Value::from(record))?;

    let sign = key.sign(&exts, &options())?;
    let mut envelope = Dict::with_capacity(2);
    envelope.insert("exts", exts);
    envelope.insert("sign", sign);
    protocol::dump(&Value::from(envelope))
}

struct Envelope {
    exts: Vec<u8>,
    sign: Vec<u8>,
    record: Value,
}

fn open(signature: &[u8]) -> Result<Envelope> {
    let outer = protocol::load(signature)?;
    let field = |name: &str| {
        outer[name]
            .as_slice()
            .map(|s| s.to_vec())
            .ok_or_else(|| Error::BadEncode(format!("extended signature lacks '{}'", name)))
    };
    let exts = field("exts")?;
    let sign = field("sign")?;
    let record = protocol::load(&exts)?;
    if record.as_dict().is_none() {
        return Err(Error::BadEncode(
            "extended signature record should be a dictionary".to_string(),
        ));
    }
    Ok(Envelope { exts, sign, record })
}

/// Check an extended signature against a key and the data it should cover.
///
/// A malformed envelope is an error. A well-formed signature that doesn't match the key or the
/// data gives `Ok(None)`.
pub fn verify(key: &PublicKey, signature: &[u8], data: &[u8]) -> Result<Option<VerifiedSignature>> {
    let env = open(signature)?;
    if !key.verify(&env.exts, &env.sign, &options())? {
        debug!("extended signature doesn't match the key");
        return Ok(None);
    }
    let sha512 = env.record["sha512"]
        .as_slice()
        .ok_or_else(|| Error::BadEncode("extended signature lacks 'sha512'".to_string()))?;
    if !constant_time_eq(sha512, &HashType::Sha512.digest(data)) {
        debug!("extended signature is for different data");
        return Ok(None);
    }
    let signer = env.record["key"]
        .as_slice()
        .ok_or_else(|| Error::BadEncode("extended signature lacks 'key'".to_string()))?;
    let created_at = env.record["created_at"]
        .as_timestamp()
        .ok_or_else(|| Error::BadEncode("extended signature lacks 'created_at'".to_string()))?;
    Ok(Some(VerifiedSignature {
        key: signer.to_vec(),
        created_at,
    }))
}

/// Fingerprint of the key that claims to have made the signature. Not verified.
pub fn extract_key_id(signature: &[u8]) -> Result<Vec<u8>> {
    let env = open(signature)?;
    env.record["key"]
        .as_slice()
        .map(|s| s.to_vec())
        .ok_or_else(|| Error::BadEncode("extended signature lacks 'key'".to_string()))
}

/// Public key carried in the signature. Not verified; pass it to [`verify`] to check it.
pub fn extract_public_key(signature: &[u8]) -> Result<PublicKey> {
    let env = open(signature)?;
    let packed = env.record["pub_key"]
        .as_slice()
        .ok_or_else(|| Error::BadEncode("extended signature lacks 'pub_key'".to_string()))?;
    PublicKey::unpack(packed)
}
