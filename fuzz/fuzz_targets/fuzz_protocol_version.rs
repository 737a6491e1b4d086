//! Fuzz target for protocol version negotiation.
//!
//! Run with:
//! cargo +nightly fuzz run fuzz_protocol_version -- -max_total_time=600

#![no_main]

use crossnode_protocol::models::version::{
    common_versions, generation_of, highest_version, recognized_versions,
};
use crossnode_protocol::models::ProtocolGeneration;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|advertised: Vec<String>| {
    if advertised.len() > 64 {
        return;
    }

    let recognized = recognized_versions(&advertised);
    match highest_version(&advertised) {
        Some(highest) => {
            assert_eq!(recognized.first(), Some(&highest));
            assert_eq!(generation_of(&advertised), highest.generation());
        }
        None => {
            assert!(recognized.is_empty());
            assert_eq!(generation_of(&advertised), ProtocolGeneration::Legacy);
        }
    }

    let local = ["1.2", "1.1"];
    for version in common_versions(&local, &advertised) {
        assert!(recognized.contains(&version));
    }
});
