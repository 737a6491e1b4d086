//! Fuzz target for identifier parsing.
//!
//! Run with:
//! cargo +nightly fuzz run fuzz_identifier_parsing -- -max_total_time=600

#![no_main]

use crossnode_core::{CountryCode, EntityId, MessageId, MAX_IDENTIFIER_LENGTH};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(id) = s.parse::<MessageId>() {
        assert!(id.as_str().len() <= MAX_IDENTIFIER_LENGTH);
        let reparsed: MessageId = id.as_str().parse().unwrap();
        assert_eq!(id, reparsed);
    }

    if let Ok(entity) = s.parse::<EntityId>() {
        let reparsed: EntityId = entity.as_str().parse().unwrap();
        assert_eq!(entity, reparsed);
    }

    if let Ok(country) = s.parse::<CountryCode>() {
        assert_eq!(country.as_str().len(), 2);
    }
});
