#![no_main]
use std::str::FromStr;

use antctl_core::PatternInput;
use antctl_core::bits::encode;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let Ok(input) = PatternInput::from_str(data) else {
        return;
    };
    if let Ok(v) = input.decode() {
        assert_eq!(encode(v).len(), 48);
    }
});
