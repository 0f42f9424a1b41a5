#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Anything that decodes must encode again, and decode to the same values
    if let Ok(values) = boss_pki::load_all(data) {
        if let Ok(bytes) = boss_pki::dump_all(&values) {
            let again = boss_pki::load_all(&bytes).expect("re-encoded data must decode");
            assert_eq!(values.len(), again.len());
        }
    }
});
