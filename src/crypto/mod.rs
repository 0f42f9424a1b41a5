//! RSA public-key layer built on BOSS: key packing, password-protected keys, PSS signatures,
//! OAEP encryption, extended signatures, and signed records.
//!
//! Raw RSA, digests, and the AES block cipher come from the RustCrypto crates. The encodings
//! around them (PSS, the CTR counter layout, key and envelope layouts) are implemented here so
//! they stay byte-compatible with existing BOSS key material.

pub mod cipher;
pub mod extended_signature;
pub mod hash;
pub mod key_info;
pub mod private_key;
pub mod pss;
pub mod public_key;
pub mod signed_record;
pub mod symmetric_key;

pub use self::extended_signature::VerifiedSignature;
pub use self::hash::HashType;
pub use self::key_info::{Algorithm, KeyInfo, Prf};
pub use self::private_key::{Exponents, KeyGeneration, PasswordOptions, PrivateKey};
pub use self::pss::{PssOptions, SaltLength};
pub use self::public_key::{
    encode_address, is_valid_address, is_valid_address_str, OaepOptions, PublicKey,
};
pub use self::signed_record::SignedRecord;
pub use self::symmetric_key::SymmetricKey;
