//! RSA public keys.
//!
//! Packed form is `dump([1, e, n])`, with `e` and `n` as minimal big-endian byte strings rather
//! than BOSS integers.

use std::fmt;

use base64::Engine;
use num_bigint::BigUint;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPublicKey};
use tracing::debug;

use super::hash::{self, HashType, HashState};
use super::pss::{self, PssOptions};
use crate::error::{Error, Result};
use crate::value::Value;
use crate::protocol;

/// Type tag of a packed public key.
pub const TYPE_PUBLIC: u64 = 1;

/// Marker byte leading every fingerprint.
pub const FINGERPRINT_SHA256: u8 = 7;

/// Largest modulus accepted, in bits.
pub const MAX_MODULUS_BITS: usize = 8192;

const SHORT_ADDRESS_LEN: usize = 1 + 32 + 4;
const LONG_ADDRESS_LEN: usize = 1 + 48 + 4;

/// Options for OAEP encryption and decryption.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OaepOptions {
    pub hash: HashType,
    pub mgf1_hash: HashType,
}

impl Default for OaepOptions {
    fn default() -> Self {
        Self {
            hash: HashType::Sha1,
            mgf1_hash: HashType::Sha1,
        }
    }
}

impl OaepOptions {
    pub(crate) fn padding(&self) -> Oaep {
        Oaep {
            digest: self.hash.boxed(),
            mgf_digest: self.mgf1_hash.boxed(),
            label: None,
        }
    }
}

pub(crate) fn to_rsa_uint(v: &BigUint) -> rsa::BigUint {
    rsa::BigUint::from_bytes_be(&v.to_bytes_be())
}

pub(crate) fn from_rsa_uint(v: &rsa::BigUint) -> BigUint {
    BigUint::from_bytes_be(&v.to_bytes_be())
}

/// Left-pad big-endian bytes with zeros to `len`. Fails if they don't fit.
pub(crate) fn left_pad(bytes: Vec<u8>, len: usize) -> Option<Vec<u8>> {
    if bytes.len() > len {
        return None;
    }
    let mut out = vec![0u8; len - bytes.len()];
    out.extend_from_slice(&bytes);
    Some(out)
}

pub(crate) fn key_bytes(v: &Value, what: &str) -> Result<BigUint> {
    v.as_slice()
        .map(BigUint::from_bytes_be)
        .ok_or_else(|| Error::KeyFormat(format!("{} should be a byte string", what)))
}

#[derive(Clone)]
pub struct PublicKey {
    key: RsaPublicKey,
}

impl PublicKey {
    pub(crate) fn from_rsa(key: RsaPublicKey) -> PublicKey {
        PublicKey { key }
    }

    pub(crate) fn as_rsa(&self) -> &RsaPublicKey {
        &self.key
    }

    /// Build a key from its modulus and public exponent.
    pub fn from_exponents(n: &BigUint, e: &BigUint) -> Result<PublicKey> {
        let key = RsaPublicKey::new_with_max_size(to_rsa_uint(n), to_rsa_uint(e), MAX_MODULUS_BITS)?;
        Ok(PublicKey { key })
    }

    pub fn n(&self) -> BigUint {
        from_rsa_uint(self.key.n())
    }

    pub fn e(&self) -> BigUint {
        from_rsa_uint(self.key.e())
    }

    /// Size of the modulus in bits.
    pub fn bit_strength(&self) -> usize {
        self.key.n().bits()
    }

    /// Size of the modulus in bytes.
    pub fn size(&self) -> usize {
        self.key.size()
    }

    pub fn pack(&self) -> Result<Vec<u8>> {
        protocol::dump(&Value::from(vec![
            Value::from(TYPE_PUBLIC),
            Value::from(self.key.e().to_bytes_be()),
            Value::from(self.key.n().to_bytes_be()),
        ]))
    }

    pub fn unpack(data: &[u8]) -> Result<PublicKey> {
        let parts = protocol::load(data)?;
        let parts = parts
            .as_list()
            .ok_or_else(|| Error::KeyFormat("packed key should be a list".to_string()))?;
        if parts.first().and_then(Value::as_u64) != Some(TYPE_PUBLIC) || parts.len() < 3 {
            return Err(Error::KeyFormat("not a packed public key".to_string()));
        }
        let e = key_bytes(&parts[1], "public exponent")?;
        let n = key_bytes(&parts[2], "modulus")?;
        let key = Self::from_exponents(&n, &e)?;
        debug!(bits = key.bit_strength(), "unpacked public key");
        Ok(key)
    }

    /// Compact key identifier: a marker byte, then SHA-256 over `e || n`.
    pub fn fingerprint(&self) -> Vec<u8> {
        let mut state = HashState::new(HashType::Sha256);
        state.update(&self.key.e().to_bytes_be());
        state.update(&self.key.n().to_bytes_be());
        let mut fp = Vec::with_capacity(33);
        fp.push(FINGERPRINT_SHA256);
        fp.extend(state.finalize());
        fp
    }

    /// Self-checksummed key address. The first byte holds the key size class in its high nibble
    /// and the application's type mark in its low nibble.
    pub fn address(&self, long: bool, type_mark: u8) -> Vec<u8> {
        let key_mask: u8 = match self.bit_strength() {
            1024 | 2048 => 1,
            4096 => 2,
            8192 => 3,
            _ => 0,
        };
        let hash_type = if long {
            HashType::Sha3_384
        } else {
            HashType::Sha3_256
        };
        let mut state = HashState::new(hash_type);
        state.update(&self.key.e().to_bytes_be());
        state.update(&self.key.n().to_bytes_be());

        let mut addr = Vec::with_capacity(LONG_ADDRESS_LEN);
        addr.push((key_mask << 4) | (type_mark & 0x0f));
        addr.extend(state.finalize());
        let crc = hash::crc32(&addr);
        addr.extend_from_slice(&crc);
        addr
    }

    pub fn short_address(&self) -> Vec<u8> {
        self.address(false, 0)
    }

    pub fn long_address(&self) -> Vec<u8> {
        self.address(true, 0)
    }

    /// Verify a PSS signature over a message.
    ///
    /// Returns `Ok(false)` for any signature that doesn't check out, including ones of the wrong
    /// length or numerically out of range.
    pub fn verify(&self, message: &[u8], signature: &[u8], opts: &PssOptions) -> Result<bool> {
        if signature.len() != self.size() {
            return Ok(false);
        }
        let s = rsa::BigUint::from_bytes_be(signature);
        if &s >= self.key.n() {
            return Ok(false);
        }
        let m = rsa::hazmat::rsa_encrypt(&self.key, &s)?;
        let mod_bits = self.bit_strength();
        let em_len = (mod_bits - 1 + 7) / 8;
        let em = match left_pad(m.to_bytes_be(), em_len) {
            Some(em) => em,
            None => return Ok(false),
        };
        let m_hash = opts.hash.digest(message);
        Ok(pss::verify(&m_hash, &em, mod_bits, opts))
    }

    /// Encrypt with OAEP.
    pub fn encrypt(&self, data: &[u8], opts: &OaepOptions) -> Result<Vec<u8>> {
        let mut rng = rand::rngs::OsRng;
        Ok(self.key.encrypt(&mut rng, opts.padding(), data)?)
    }

    /// Longest message that [`encrypt`](Self::encrypt) accepts with these options.
    pub fn encryption_max_length(&self, opts: &OaepOptions) -> usize {
        self.size().saturating_sub(2 * opts.hash.output_len() + 2)
    }
}

/// Check that an address has a valid length, size class, and checksum.
pub fn is_valid_address(addr: &[u8]) -> bool {
    if addr.len() != SHORT_ADDRESS_LEN && addr.len() != LONG_ADDRESS_LEN {
        return false;
    }
    if !(1..=3).contains(&(addr[0] >> 4)) {
        return false;
    }
    let (body, crc) = addr.split_at(addr.len() - 4);
    hash::crc32(body) == crc
}

/// Same as [`is_valid_address`], for the base58 text form.
pub fn is_valid_address_str(addr: &str) -> bool {
    match bs58::decode(addr).into_vec() {
        Ok(bytes) => is_valid_address(&bytes),
        Err(_) => false,
    }
}

/// Base58 text form of an address.
pub fn encode_address(addr: &[u8]) -> String {
    bs58::encode(addr).into_string()
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.key.n() == other.key.n() && self.key.e() == other.key.e()
    }
}

impl Eq for PublicKey {}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("bits", &self.bit_strength())
            .field("fingerprint", &hex::encode(self.fingerprint()))
            .finish()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let fp = base64::engine::general_purpose::STANDARD.encode(self.fingerprint());
        write!(f, "RSA-{} {}", self.bit_strength(), fp)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::crypto::pss::SaltLength;

    pub(crate) fn b64(s: &str) -> Vec<u8> {
        base64::engine::general_purpose::STANDARD.decode(s).unwrap()
    }

    pub(crate) fn big(s: &str) -> BigUint {
        BigUint::parse_bytes(s.as_bytes(), 16).unwrap()
    }

    const ADDRESS_KEY: &str = "HggcAQABxAEBAKPW/V0ov09rGWAMoBSWuRHzf2yzA29WgLRzJvZutClo9xfo8KaOryl1NxtvOBJ9xsdH0fMXyV/1LBWa9U5v7vBO49m7oneIQt0GIJ35mWcZPp9WjZVzMogy9xvRoDSTMrfWuApJRWnD0Z5bYDxI9kObKA17Vrv8gr0YD7kK9r2J9tJDcV7pPthHWzLDgLVQHX/l86zK+MGDFypX8OWo5murr7ESTzqA42VHprwdwhJ2zrwqdFMbVozwC4OpWkCEEgQNZUDYYx1fAUR4RnoCB/51RkoRmKkLjjJpV+ZIXg+SqU9hUJPtJ08JnaHcz66lbA3utcolnck4NT1MtVeZKAs=";

    const REAL_KEY: &str = "1E081C010001C40002CC713D89B5A59CAE11CE9805201E23220DD6717652297340A8E4D852D197634DF1252C29A84FB2FC76EAA84D16B26700B796B41791FB6F3F3B532F0C7B551D20370E2603FC1CC17633423F9244FA779F598581FF4E5A437292EF9C958495901F3B2B5A202134D5B90E91FE8CCF97A0A53A031043D91FF4578A08FDC24497924E375994B1558E5FDB36959A26D467D54BA099668CD4D9FAEB495198BAEA2BBD7B4497BA93ABFFE0492F51A6E7DE70DF615DD35E35901BC01D80C7CF62B7C789B5A0501C12527CDDA852975BBCE7F9DA21A7F6CAEC6240DCF7B853139F422950B08CBCB32F984F8BF62A3BF8A59795DDAEB2E8CC5C8D72703470F3987A20994F70A1D540A9C9FF8C0D054BDE0432C52E539C3290B35A53BF0FB33623235AF1712FC0F68526537550DFFD795A5A4540447C3ABACE2F910BC31A556CC56CD8BDD77B2E63443C17B7A3291E9A42F40FB8D37A6CAEA245865C8717BF1705885CEAF40B4C80DCD160C4A2E22998E4779789F3818BCBE883D344738E89BE186E050D02ABD87C58643743B8B1383C4A584B3101FFC2F222A78CEDD4B268715304823FB0BB85AEEE9F7E82B104D93F73000666A3B00F77E426336AD51DE1E90CA559723F7123BDC919D13263012706A531EC4E737FE43C411D7E31FF19C254D0CC3A0E0A18F1081F68DC177056C152F7F74F0679332B1FDB538B1C7D7783C8334449BE87C7";

    const REAL_SIGNATURE: &str = "661B63FFB0A511E0F12522D5E1503B1FF914BF545FF4E7BC453072B748B8866CE7C0ECA27844F8BA7EC47CE6491B794E81FBC3523C696007813E8BA3725D4A9B95538C35621D4331E23B54091F3F8C68A55D965472DC7853CC9F6E94A94BADA3028E7E084513BD494D3ECC782F852B345C2FBBEF8C3CAA05C8C1FF34A6B390EBB76BD9CADEA5005CF2A0533AA37DC254D0FA0CD86A43D275BA23404396ECABA8C08B2CB3ED4FE12E2C056C6E5CEDF63EA82AB063902CAA9C4B00164C8F888870D6AFB0DEE44FD706FFA8DA03F374F36C9C3940F73ED36B6EF7B01022F4D11F358843627DA5F4C0EC353D9B561BAE9EE63E71044EA9D719E498EAEC43F0E340943F1DB0E3131B27DBD267501822E797D43E044D4DFC6865AAB80EEADF1310443F75D6A1404E1181E4CFF26A34CE2A8E962A33C5F06BA9EFC93CB600934ED65CA2E7B15F0C066FC39B118082EDD56B3D957DA9AD614A6025794998751344FC8C6B3F02E3942642F979915BC6F4914C665881F982B75CD0EE68B50F64EE28B3B91189932EC5E1076BE34A5152386DA126AC7CA235E34EDBF19C33903675E26005F26F147E0685CC5C89DE5C2FB3D2D7B5B27016DF11BE567D696B2046D1FF6060B361C5C28EB4897C04D357F4FECB193239F79AAA4CEDD747C4E42078BF7DD122AEE2B14F8AFADE9C09A5EC4D34DAECFD17FC4D6984B14351F62FEBEB4E7CC6B4A9";

    const REAL_DATA: &str = "1F33736861353132BC40BFF822E7C37CF8D0465A02A169BCE1176BCCCDCBC3F64C31BE3EE46273E8747A8B83FED8AD338881F5FEC8DEE60E3F03DC09F79A4CE1C297EF316B2B0076847253637265617465645F6174796A1C704D851B6B6579BC21076E17915372DDF4895190732EC9C9A387FE66A1B06CDC47801AF5F7C1483E0CB2";

    // RSASSA-PSS example key and signature with a fixed salt, SHA-1 for both digests
    pub(crate) const PSS_N: &str = "a2ba40ee07e3b2bd2f02ce227f36a195024486e49c19cb41bbbdfbba98b22b0e577c2eeaffa20d883a76e65e394c69d4b3c05a1e8fadda27edb2a42bc000fe888b9b32c22d15add0cd76b3e7936e19955b220dd17d4ea904b1ec102b2e4de7751222aa99151024c7cb41cc5ea21d00eeb41f7c800834d2c6e06bce3bce7ea9a5";
    pub(crate) const PSS_P: &str = "d17f655bf27c8b16d35462c905cc04a26f37e2a67fa9c0ce0dced472394a0df743fe7f929e378efdb368eddff453cf007af6d948e0ade757371f8a711e278f6b";
    pub(crate) const PSS_Q: &str = "c6d92b6fee7414d1358ce1546fb62987530b90bd15e0f14963a5e2635adb69347ec0c01b2ab1763fd8ac1a592fb22757463a982425bb97a3a437c5bf86d03f2f";
    pub(crate) const PSS_SALT: &str = "e3b5d5d002c1bce50c2b65ef88a188d83bce7e61";
    pub(crate) const PSS_MESSAGE: &str = "859eef2fd78aca00308bdc471193bf55bf9d78db8f8a672b484634f3c9c26e6478ae10260fe0dd8c082e53a5293af2173cd50c6d5d354febf78b26021c25c02712e78cd4694c9f469777e451e7f8e9e04cd3739c6bbfedae487fb55644e9ca74ff77a53cb729802f6ed4a5ffa8ba159890fc";
    pub(crate) const PSS_SIGNATURE: &str = "8daa627d3de7595d63056c7ec659e54406f10610128baae821c8b2a0f3936d54dc3bdce46689f6b7951bb18e840542769718d5715d210d85efbb596192032c42be4c29972c856275eb6d5a45f05f51876fc6743deddd28caec9bb30ea99e02c3488269604fe497f74ccd7c7fca1671897123cbd30def5d54a2b5536ad90a747e";

    fn pss_public() -> PublicKey {
        PublicKey::from_exponents(&big(PSS_N), &BigUint::from(65537u32)).unwrap()
    }

    #[test]
    fn pss_vector_verifies() {
        let key = pss_public();
        let msg = hex::decode(PSS_MESSAGE).unwrap();
        let sig = hex::decode(PSS_SIGNATURE).unwrap();
        let salt = hex::decode(PSS_SALT).unwrap();
        let opts = PssOptions::new(HashType::Sha1, HashType::Sha1);
        assert!(key.verify(&msg, &sig, &opts).unwrap());
        assert!(key
            .verify(&msg, &sig, &opts.clone().with_salt(SaltLength::Fixed(salt)))
            .unwrap());
        assert!(key
            .verify(&msg, &sig, &opts.clone().with_salt(SaltLength::Length(20)))
            .unwrap());
        assert!(!key
            .verify(&msg, &sig, &opts.clone().with_salt(SaltLength::Length(21)))
            .unwrap());
        assert!(!key.verify(b"other", &sig, &opts).unwrap());
        assert!(!key.verify(&msg, &sig[1..], &opts).unwrap());
    }

    #[test]
    fn verify_real_message() {
        let key = PublicKey::unpack(&hex::decode(REAL_KEY).unwrap()).unwrap();
        assert_eq!(key.bit_strength(), 4096);
        let sig = hex::decode(REAL_SIGNATURE).unwrap();
        let data = hex::decode(REAL_DATA).unwrap();
        let opts = PssOptions::new(HashType::Sha512, HashType::Sha1);
        assert!(key.verify(&data, &sig, &opts).unwrap());
        let mut bad = data.clone();
        bad[3] ^= 0x40;
        assert!(!key.verify(&bad, &sig, &opts).unwrap());
    }

    #[test]
    fn known_address() {
        let key = PublicKey::unpack(&b64(ADDRESS_KEY)).unwrap();
        assert_eq!(
            encode_address(&key.short_address()),
            "ZFPU5QyNJPA3LsyLwJU4UiFMfxZ7BUoxbF5SMdRMdNGhXUWnar"
        );
    }

    #[test]
    fn address_validation() {
        let key = PublicKey::unpack(&b64(ADDRESS_KEY)).unwrap();
        let short = key.short_address();
        let long = key.long_address();
        assert_eq!(short.len(), 37);
        assert_eq!(long.len(), 53);
        assert_eq!(short[0], 0x10);
        assert!(is_valid_address(&short));
        assert!(is_valid_address(&long));
        assert!(is_valid_address_str(&encode_address(&long)));
        assert!(!is_valid_address_str(&(encode_address(&short) + "a")));
        assert!(!is_valid_address_str("0OIl"));
        let mut bad = short.clone();
        bad[5] ^= 1;
        assert!(!is_valid_address(&bad));
        let marked = key.address(false, 5);
        assert_eq!(marked[0], 0x15);
        assert!(is_valid_address(&marked));
    }

    #[test]
    fn pack_roundtrip() {
        let key = PublicKey::unpack(&b64(ADDRESS_KEY)).unwrap();
        let packed = key.pack().unwrap();
        // The fixture carries a leading zero byte on the modulus; packing is minimal
        assert_eq!(packed.len() + 1, b64(ADDRESS_KEY).len());
        assert_eq!(PublicKey::unpack(&packed).unwrap(), key);
        assert_eq!(key.fingerprint().len(), 33);
        assert_eq!(key.fingerprint()[0], 7);
    }

    #[test]
    fn fingerprint_and_address_layout() {
        use sha2::Digest;

        let key = PublicKey::unpack(&b64(ADDRESS_KEY)).unwrap();
        let parts = protocol::load(&b64(ADDRESS_KEY)).unwrap();
        let parts = parts.as_list().unwrap();
        let minimal = |v: &Value| {
            let bytes = v.as_slice().unwrap();
            bytes[bytes.iter().take_while(|b| **b == 0).count()..].to_vec()
        };
        let e = minimal(&parts[1]);
        let n = minimal(&parts[2]);
        let en = [e, n].concat();

        let mut fingerprint = vec![0x07];
        fingerprint.extend_from_slice(&sha2::Sha256::digest(&en));
        assert_eq!(key.fingerprint(), fingerprint);

        let mut short = vec![0x10];
        short.extend_from_slice(&sha3::Sha3_256::digest(&en));
        let crc = crc32fast::hash(&short).to_be_bytes();
        short.extend_from_slice(&crc);
        assert_eq!(key.short_address(), short);

        let mut long = vec![0x13];
        long.extend_from_slice(&sha3::Sha3_384::digest(&en));
        let crc = crc32fast::hash(&long).to_be_bytes();
        long.extend_from_slice(&crc);
        assert_eq!(key.address(true, 3), long);
    }

    #[test]
    fn unpack_rejects_wrong_tag() {
        let wrong = protocol::dump(&Value::from(vec![
            Value::from(0),
            Value::from(vec![1u8, 0, 1]),
            Value::from(vec![0xffu8; 128]),
        ]))
        .unwrap();
        assert!(matches!(PublicKey::unpack(&wrong), Err(Error::KeyFormat(_))));
        let not_list = protocol::dump(&Value::from(1)).unwrap();
        assert!(matches!(PublicKey::unpack(&not_list), Err(Error::KeyFormat(_))));
    }

    #[test]
    fn oaep_limits() {
        let key = pss_public();
        let opts = OaepOptions::default();
        assert_eq!(key.encryption_max_length(&opts), 128 - 42);
        let ct = key.encrypt(&[1u8; 86], &opts).unwrap();
        assert_eq!(ct.len(), 128);
        assert!(key.encrypt(&[1u8; 87], &opts).is_err());
    }
}
