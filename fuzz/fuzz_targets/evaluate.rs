#![no_main]
use libfuzzer_sys::fuzz_target;

use calcex::Evaluator;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let mut evaluator = Evaluator::new();
        let _ = evaluator.evaluate(s);
    }
});
