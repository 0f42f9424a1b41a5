//! Signed records: a payload and optional nonce, signed by a key that travels with them.
//!
//! Packed layout is `dump([type, key, signature, dump([nonce, payload])])`. Only type 0, where
//! `key` is the signer's packed public key, is defined. The signature covers the inner packed
//! bytes exactly as they appear, using PSS with SHA3-384 and MGF1 with SHA-1.

use tracing::{debug, warn};

use super::hash::HashType;
use super::private_key::PrivateKey;
use super::pss::PssOptions;
use super::public_key::PublicKey;
use crate::error::{Error, Result};
use crate::protocol;
use crate::value::Value;

/// The record carries the signer's full public key.
pub const RECORD_WITH_KEY: i64 = 0;
/// The record carries only the signer's address. Reserved.
pub const RECORD_WITH_ADDRESS: i64 = 1;

/// PSS settings used for signed records.
pub fn default_pss_options() -> PssOptions {
    PssOptions::new(HashType::Sha3_384, HashType::Sha1)
}

/// A record whose signature has been checked.
#[derive(Clone, Debug, PartialEq)]
pub struct SignedRecord {
    pub record_type: i64,
    /// Key that signed the record.
    pub key: PublicKey,
    /// Any value the signer bound the record to. A null nonce reads as `None`.
    pub nonce: Option<Value>,
    pub payload: Value,
}

impl SignedRecord {
    /// Sign a payload, optionally binding it to a nonce provided by the other side.
    pub fn pack_with_key(key: &PrivateKey, payload: &Value, nonce: Option<&Value>) -> Result<Vec<u8>> {
        let nonce = nonce.cloned().unwrap_or(Value::Null);
        let data = protocol::dump(&Value::from(vec![nonce, payload.clone()]))?;
        let signature = key.sign(&data, &default_pss_options())?;
        protocol::dump(&Value::from(vec![
            Value::from(RECORD_WITH_KEY),
            Value::from(key.public_key().pack()?),
            Value::from(signature),
            Value::from(data),
        ]))
    }

    /// Unpack a record and check its signature. The payload is only decoded once the signature
    /// checks out.
    pub fn unpack(packed: &[u8]) -> Result<SignedRecord> {
        let outer = protocol::load(packed)?;
        let outer = outer
            .as_list()
            .ok_or_else(|| Error::BadEncode("signed record should be a list".to_string()))?;
        let record_type = outer
            .first()
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::BadEncode("signed record lacks a type".to_string()))?;
        if record_type != RECORD_WITH_KEY {
            return Err(Error::UnsupportedRecordType(record_type));
        }
        let field = |idx: usize, name: &str| {
            outer
                .get(idx)
                .and_then(Value::as_slice)
                .ok_or_else(|| Error::BadEncode(format!("signed record lacks {}", name)))
        };
        let key = PublicKey::unpack(field(1, "a key")?)?;
        let signature = field(2, "a signature")?;
        let data = field(3, "signed data")?;

        if !key.verify(data, signature, &default_pss_options())? {
            warn!("signed record failed to verify");
            return Err(Error::BadSignature);
        }

        let inner = protocol::load(data)?;
        let inner = inner
            .as_list()
            .filter(|l| l.len() == 2)
            .ok_or_else(|| Error::BadEncode("signed data should be [nonce, payload]".to_string()))?;
        let nonce = match &inner[0] {
            Value::Null => None,
            other => Some(other.clone()),
        };
        debug!(fingerprint = %hex::encode(key.fingerprint()), "verified signed record");
        Ok(SignedRecord {
            record_type,
            key,
            nonce,
            payload: inner[1].clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::public_key::tests::b64;
    use crate::value::Dict;

    const KEY: &str = "JgAcAQABvIDcbubUZ1YvxjDCT33chA1BFY1iQvHJkB01xVeFJMmMR1h5wRFFlcTPyLRRxgtkxfX55PHHvNSaHoKRElRqIt/dmEW7p/Cwl1tTpQpOl1KU1eFYPY8MEMteGs4n6iKRqyRArk3N3X3Z/TzOb7Dcfhcy6MU+AtwNWFRHoJQShAAQTbyAzHz7GFoI3w4S1WvLbAkky+dkVSvER/rXL4aMUshiWixGCgOI+qucWkkse2Y3rdqaf23QKbh6XioYmviFlRsxNi7cQtSV4L0TlliXG03QCWZCOC4Jei2pqFiqCA3bEucajhrwZRFJO/DqNOjxT1i/T6hOzsIAnu2q8lk/HEfVDEE=";

    fn key() -> PrivateKey {
        PrivateKey::unpack(&b64(KEY)).unwrap()
    }

    fn payload() -> Value {
        let mut dict = Dict::new();
        dict.insert("ab", "cd");
        Value::from(dict)
    }

    #[test]
    fn pack_without_nonce() {
        let record = SignedRecord::pack_with_key(&key(), &payload(), None).unwrap();
        let outer = protocol::load(&record).unwrap();
        assert_eq!(outer[0].as_i64(), Some(0));
        let data = protocol::load(outer[3].as_slice().unwrap()).unwrap();
        assert_eq!(data[0], Value::Null);
        assert_eq!(data[1]["ab"].as_str(), Some("cd"));
    }

    #[test]
    fn pack_with_nonce() {
        let nonce = b64("abcd");
        let record =
            SignedRecord::pack_with_key(&key(), &payload(), Some(&Value::from(nonce.clone()))).unwrap();
        let outer = protocol::load(&record).unwrap();
        assert_eq!(outer[0].as_i64(), Some(0));
        let data = protocol::load(outer[3].as_slice().unwrap()).unwrap();
        assert_eq!(data[0].as_slice(), Some(nonce.as_slice()));
        assert_eq!(data[1]["ab"].as_str(), Some("cd"));
    }

    #[test]
    fn unpack_roundtrip() {
        let key = key();
        let nonce = Value::from(b64("abcd"));
        let packed = SignedRecord::pack_with_key(&key, &payload(), Some(&nonce)).unwrap();
        let record = SignedRecord::unpack(&packed).unwrap();
        assert_eq!(record.record_type, RECORD_WITH_KEY);
        assert_eq!(record.nonce, Some(nonce));
        assert_eq!(record.payload["ab"].as_str(), Some("cd"));
        assert_eq!(record.key, key.public_key());
    }

    #[test]
    fn non_binary_nonce() {
        let key = key();
        let nonce = Value::from(vec![Value::from("session"), Value::from(42)]);
        let packed = SignedRecord::pack_with_key(&key, &payload(), Some(&nonce)).unwrap();
        let record = SignedRecord::unpack(&packed).unwrap();
        assert_eq!(record.nonce, Some(nonce));

        let packed = SignedRecord::pack_with_key(&key, &payload(), Some(&Value::Null)).unwrap();
        assert_eq!(SignedRecord::unpack(&packed).unwrap().nonce, None);
    }

    #[test]
    fn tampered_data() {
        let packed = SignedRecord::pack_with_key(&key(), &payload(), None).unwrap();
        let outer = protocol::load(&packed).unwrap();
        let mut other = Dict::new();
        other.insert("ab", "ce");
        let forged_data = protocol::dump(&Value::from(vec![Value::Null, Value::from(other)])).unwrap();
        let forged = protocol::dump(&Value::from(vec![
            outer[0].clone(),
            outer[1].clone(),
            outer[2].clone(),
            Value::from(forged_data),
        ]))
        .unwrap();
        assert!(matches!(SignedRecord::unpack(&forged), Err(Error::BadSignature)));
    }

    #[test]
    fn unsupported_type() {
        let packed = SignedRecord::pack_with_key(&key(), &payload(), None).unwrap();
        let outer = protocol::load(&packed).unwrap();
        let mut parts = outer.as_list().unwrap().to_vec();
        parts[0] = Value::from(RECORD_WITH_ADDRESS);
        let packed = protocol::dump(&Value::from(parts)).unwrap();
        assert!(matches!(
            SignedRecord::unpack(&packed),
            Err(Error::UnsupportedRecordType(1))
        ));
    }
}
