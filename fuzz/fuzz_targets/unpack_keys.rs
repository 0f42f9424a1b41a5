#![no_main]
use libfuzzer_sys::fuzz_target;
use boss_pki::crypto::{extended_signature, signed_record::SignedRecord, KeyInfo, PrivateKey, PublicKey};

fuzz_target!(|data: &[u8]| {
    let _ = PublicKey::unpack(data);
    let _ = PrivateKey::unpack(data);
    let _ = PrivateKey::unpack_with_password(data, "password");
    let _ = KeyInfo::unpack(data);
    let _ = SignedRecord::unpack(data);
    let _ = extended_signature::extract_public_key(data);
});
