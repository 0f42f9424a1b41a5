//! EMSA-PSS encoding and verification (RFC 8017, section 9.1), with the message digest and the
//! MGF1 digest chosen independently.
//!
//! The RSA primitive itself lives with the keys. These functions only build and check the encoded
//! message.

use rand::RngCore;

use super::hash::{HashState, HashType};
use crate::error::{Error, Result};

/// How the salt is chosen when signing, or what salt length is expected when verifying.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum SaltLength {
    /// As long as the encoded message allows: `emLen - hLen - 2`. When verifying, the length is
    /// instead recovered from the encoded message.
    #[default]
    Max,
    /// A random salt of exactly this many bytes.
    Length(usize),
    /// A caller-provided salt. Only useful for reproducing known signatures.
    Fixed(Vec<u8>),
}

/// Options for signing or verifying with PSS.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PssOptions {
    pub hash: HashType,
    pub mgf1_hash: HashType,
    pub salt: SaltLength,
}

impl Default for PssOptions {
    fn default() -> Self {
        Self {
            hash: HashType::Sha1,
            mgf1_hash: HashType::Sha1,
            salt: SaltLength::Max,
        }
    }
}

impl PssOptions {
    pub fn new(hash: HashType, mgf1_hash: HashType) -> Self {
        Self {
            hash,
            mgf1_hash,
            salt: SaltLength::Max,
        }
    }

    pub fn with_salt(mut self, salt: SaltLength) -> Self {
        self.salt = salt;
        self
    }
}

/// Largest salt for a modulus of `mod_bits` bits and a digest of `h_len` bytes.
pub fn max_salt_len(mod_bits: usize, h_len: usize) -> usize {
    ((mod_bits - 1 + 7) / 8).saturating_sub(h_len + 2)
}

/// MGF1 mask of `len` bytes from `seed`.
pub fn mgf1(hash: HashType, seed: &[u8], len: usize) -> Vec<u8> {
    let mut mask = Vec::with_capacity(len + hash.output_len());
    let mut counter: u32 = 0;
    while mask.len() < len {
        let mut state = HashState::new(hash);
        state.update(seed);
        state.update(&counter.to_be_bytes());
        mask.extend_from_slice(&state.finalize());
        counter += 1;
    }
    mask.truncate(len);
    mask
}

fn m_prime_hash(hash: HashType, m_hash: &[u8], salt: &[u8]) -> Vec<u8> {
    let mut state = HashState::new(hash);
    state.update(&[0u8; 8]);
    state.update(m_hash);
    state.update(salt);
    state.finalize()
}

/// Encode a message digest into an encoded message of `(mod_bits - 1)` bits.
pub fn encode(m_hash: &[u8], mod_bits: usize, opts: &PssOptions) -> Result<Vec<u8>> {
    let em_bits = mod_bits - 1;
    let em_len = (em_bits + 7) / 8;
    let h_len = opts.hash.output_len();
    let salt = match &opts.salt {
        SaltLength::Max => random_salt(max_salt_len(mod_bits, h_len)),
        SaltLength::Length(n) => random_salt(*n),
        SaltLength::Fixed(s) => s.clone(),
    };
    if m_hash.len() != h_len {
        return Err(Error::BadEncode(format!(
            "PSS message digest should be {} bytes, got {}",
            h_len,
            m_hash.len()
        )));
    }
    if em_len < h_len + salt.len() + 2 {
        return Err(Error::BadEncode(
            "PSS encoding error: key too short for digest and salt".to_string(),
        ));
    }

    let h = m_prime_hash(opts.hash, m_hash, &salt);

    // DB = PS || 0x01 || salt
    let db_len = em_len - h_len - 1;
    let mut db = vec![0u8; db_len];
    let ps_len = db_len - salt.len() - 1;
    db[ps_len] = 0x01;
    db[ps_len + 1..].copy_from_slice(&salt);

    let mask = mgf1(opts.mgf1_hash, &h, db_len);
    for (d, m) in db.iter_mut().zip(mask) {
        *d ^= m;
    }
    db[0] &= 0xffu8 >> (8 * em_len - em_bits);

    let mut em = db;
    em.extend_from_slice(&h);
    em.push(0xbc);
    Ok(em)
}

/// Check an encoded message against a message digest. Returns `false` on any mismatch.
pub fn verify(m_hash: &[u8], em: &[u8], mod_bits: usize, opts: &PssOptions) -> bool {
    let em_bits = mod_bits - 1;
    let em_len = (em_bits + 7) / 8;
    let h_len = opts.hash.output_len();
    if m_hash.len() != h_len || em.len() != em_len || em_len < h_len + 2 {
        return false;
    }
    if em[em_len - 1] != 0xbc {
        return false;
    }
    let db_len = em_len - h_len - 1;
    let (masked_db, rest) = em.split_at(db_len);
    let h = &rest[..h_len];
    let top_mask = 0xffu8 >> (8 * em_len - em_bits);
    if masked_db[0] & !top_mask != 0 {
        return false;
    }

    let mask = mgf1(opts.mgf1_hash, h, db_len);
    let mut db: Vec<u8> = masked_db.iter().zip(mask).map(|(d, m)| d ^ m).collect();
    db[0] &= top_mask;

    // Find the 0x01 separator; everything before it must be zero.
    let sep = match db.iter().position(|b| *b != 0) {
        Some(i) if db[i] == 0x01 => i,
        _ => return false,
    };
    let salt = &db[sep + 1..];
    let expected_len = match &opts.salt {
        SaltLength::Max => None,
        SaltLength::Length(n) => Some(*n),
        SaltLength::Fixed(s) => Some(s.len()),
    };
    if let Some(n) = expected_len {
        if salt.len() != n {
            return false;
        }
    }
    if let SaltLength::Fixed(s) = &opts.salt {
        if s.as_slice() != salt {
            return false;
        }
    }

    m_prime_hash(opts.hash, m_hash, salt) == h
}

fn random_salt(len: usize) -> Vec<u8> {
    let mut salt = vec![0u8; len];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mgf1_known() {
        // First 20 bytes of MGF1-SHA1("foo") are SHA1("foo" || 00000000)
        let mask = mgf1(HashType::Sha1, b"foo", 50);
        assert_eq!(mask.len(), 50);
        let mut state = HashState::new(HashType::Sha1);
        state.update(b"foo");
        state.update(&[0, 0, 0, 0]);
        assert_eq!(&mask[..20], state.finalize().as_slice());
    }

    #[test]
    fn encode_verify_salt_policies() {
        let m_hash = HashType::Sha256.digest(b"message");
        let base = PssOptions::new(HashType::Sha256, HashType::Sha1);
        for salt in [
            SaltLength::Max,
            SaltLength::Length(0),
            SaltLength::Length(20),
            SaltLength::Fixed(vec![9u8; 11]),
        ] {
            let opts = base.clone().with_salt(salt);
            let em = encode(&m_hash, 2048, &opts).unwrap();
            assert_eq!(em.len(), 256);
            assert!(verify(&m_hash, &em, 2048, &opts));
            // auto-detection
            assert!(verify(&m_hash, &em, 2048, &base));
        }
    }

    #[test]
    fn odd_modulus_bits() {
        let m_hash = HashType::Sha1.digest(b"m");
        let opts = PssOptions::default();
        let em = encode(&m_hash, 1025, &opts).unwrap();
        assert_eq!(em.len(), 128);
        assert!(verify(&m_hash, &em, 1025, &opts));
        let em = encode(&m_hash, 1024, &opts).unwrap();
        assert_eq!(em.len(), 128);
        assert_eq!(em[0] & 0x80, 0);
        assert!(verify(&m_hash, &em, 1024, &opts));
    }

    #[test]
    fn tamper_and_mismatch() {
        let m_hash = HashType::Sha256.digest(b"message");
        let opts = PssOptions::new(HashType::Sha256, HashType::Sha1);
        let em = encode(&m_hash, 2048, &opts).unwrap();
        let other = HashType::Sha256.digest(b"other");
        assert!(!verify(&other, &em, 2048, &opts));
        let mut bad = em.clone();
        bad[10] ^= 1;
        assert!(!verify(&m_hash, &bad, 2048, &opts));
        let wrong_len = opts.clone().with_salt(SaltLength::Length(5));
        assert!(!verify(&m_hash, &em, 2048, &wrong_len));
        let wrong_mgf = PssOptions::new(HashType::Sha256, HashType::Sha256);
        assert!(!verify(&m_hash, &em, 2048, &wrong_mgf));
    }

    #[test]
    fn salt_too_long() {
        let m_hash = HashType::Sha512.digest(b"m");
        let opts = PssOptions::new(HashType::Sha512, HashType::Sha1)
            .with_salt(SaltLength::Length(100));
        assert!(encode(&m_hash, 1024, &opts).is_err());
    }
}
