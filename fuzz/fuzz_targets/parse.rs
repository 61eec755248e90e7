#![no_main]
use libfuzzer_sys::fuzz_target;

use calcex::Node;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(node) = s.parse::<Node>() {
            let unparsed = format!("{}", node);
            let _ = unparsed.parse::<Node>();
        }
    }
});
