//! Signature helpers for packed capsules.
//!
//! A capsule is a BOSS dictionary holding the signed content as a byte string under `data`, and
//! a list of [extended signatures](crate::crypto::extended_signature) over those bytes under
//! `signatures`. Other entries are carried through untouched.

use crate::crypto::{extended_signature, PrivateKey, PublicKey};
use crate::error::{Error, Result};
use crate::protocol;
use crate::value::{Dict, Value};

fn load_capsule(packed: &[u8]) -> Result<Dict> {
    match protocol::load(packed)? {
        Value::Dict(dict) => Ok((*dict).clone()),
        other => Err(Error::BadEncode(format!(
            "capsule should be a dictionary, not {}",
            other.shape_name()
        ))),
    }
}

fn signature_list(capsule: &Dict) -> Result<Vec<Vec<u8>>> {
    let list = match capsule.get("signatures") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::List(list)) => list,
        Some(other) => {
            return Err(Error::BadEncode(format!(
                "capsule signatures should be a list, not {}",
                other.shape_name()
            )))
        }
    };
    list.iter()
        .map(|sig| {
            sig.as_slice()
                .map(|s| s.to_vec())
                .ok_or_else(|| Error::BadEncode("capsule signature should be binary".to_string()))
        })
        .collect()
}

/// Add an extended signature over the capsule's `data` and repack it.
pub fn sign(packed: &[u8], key: &PrivateKey) -> Result<Vec<u8>> {
    let mut capsule = load_capsule(packed)?;
    let data = capsule
        .get("data")
        .and_then(Value::as_slice)
        .ok_or_else(|| Error::BadEncode("capsule lacks binary 'data'".to_string()))?;
    let signature = extended_signature::sign(key, data)?;
    let mut signatures: Vec<Value> = signature_list(&capsule)?.into_iter().map(Value::from).collect();
    signatures.push(Value::from(signature));
    capsule.insert("signatures", signatures);
    protocol::dump(&Value::from(capsule))
}

/// All extended signatures attached to a capsule, unverified.
pub fn signatures(packed: &[u8]) -> Result<Vec<Vec<u8>>> {
    signature_list(&load_capsule(packed)?)
}

/// Public keys carried by the capsule's signatures, in signing order. These are unverified.
pub fn signature_keys(packed: &[u8]) -> Result<Vec<PublicKey>> {
    signatures(packed)?
        .iter()
        .map(|sig| extended_signature::extract_public_key(sig))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::public_key::tests::{big, PSS_P, PSS_Q};
    use num_bigint::BigUint;

    fn capsule() -> Vec<u8> {
        let mut dict = Dict::new();
        dict.insert("version", 3);
        dict.insert("data", b"contract body".to_vec());
        dict.insert("signatures", Vec::<Value>::new());
        protocol::dump(&Value::from(dict)).unwrap()
    }

    #[test]
    fn sign_twice() {
        let first = PrivateKey::from_exponents(&BigUint::from(65537u32), &big(PSS_P), &big(PSS_Q))
            .unwrap();
        let second = PrivateKey::generate(1024).unwrap();

        let packed = sign(&capsule(), &first).unwrap();
        let packed = sign(&packed, &second).unwrap();

        let sigs = signatures(&packed).unwrap();
        assert_eq!(sigs.len(), 2);
        let keys = signature_keys(&packed).unwrap();
        assert_eq!(keys, vec![first.public_key(), second.public_key()]);
        for (sig, key) in sigs.iter().zip(&keys) {
            assert!(extended_signature::verify(key, sig, b"contract body")
                .unwrap()
                .is_some());
        }

        // Other entries survive, in order
        let value = protocol::load(&packed).unwrap();
        let keys: Vec<&str> = value
            .as_dict()
            .unwrap()
            .keys()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(keys, ["version", "data", "signatures"]);
        assert_eq!(value["version"].as_u64(), Some(3));
    }

    #[test]
    fn missing_pieces() {
        let mut dict = Dict::new();
        dict.insert("data", b"x".to_vec());
        let bare = protocol::dump(&Value::from(dict)).unwrap();
        assert!(signatures(&bare).unwrap().is_empty());
        let key = PrivateKey::from_exponents(&BigUint::from(65537u32), &big(PSS_P), &big(PSS_Q))
            .unwrap();
        assert_eq!(signatures(&sign(&bare, &key).unwrap()).unwrap().len(), 1);

        let no_data = protocol::dump(&Value::from(Dict::new())).unwrap();
        assert!(sign(&no_data, &key).is_err());
        let not_dict = protocol::dump(&Value::from(vec![Value::Null])).unwrap();
        assert!(signatures(&not_dict).is_err());
    }
}
