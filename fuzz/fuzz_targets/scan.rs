#![no_main]

use libfuzzer_sys::fuzz_target;
use prologtest_syntax::{ScanEvent, scan};

fuzz_target!(|data: &[u8]| {
    // Convert bytes to UTF-8 string (ignore invalid UTF-8)
    if let Ok(s) = std::str::from_utf8(data) {
        let mut in_suite = false;
        for item in scan(s) {
            match item {
                Ok(ScanEvent::SuiteBegin { .. }) => in_suite = true,
                Ok(ScanEvent::SuiteEnd { .. }) => in_suite = false,
                // Tests are only reported inside an open unit
                Ok(ScanEvent::TestCase { .. }) => assert!(in_suite),
                Err(_) => {}
            }
        }
    }
});
