#![no_main]

use grantline_core::propagation::UpdateSignal;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(signal) = UpdateSignal::decode(data) {
        let encoded = signal.encode().expect("decoded signal re-encodes");
        let again = UpdateSignal::decode(&encoded).expect("encoded signal decodes");
        assert_eq!(again.id, signal.id);
    }
});
