//! Fuzz target for level-of-assurance parsing and negotiation.
//!
//! Checks that arbitrary published and requested lists never panic and that
//! a list legacy peers accept reads the same to current peers.
//!
//! Run with:
//! cargo +nightly fuzz run fuzz_loa_negotiation -- -max_total_time=600

#![no_main]

use arbitrary::Arbitrary;
use crossnode_protocol::models::{parse_loa_list, LoaComparison};
use crossnode_protocol::negotiation::{self, CompatibilityMode};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct NegotiationInput {
    published: String,
    requested: String,
    exact: bool,
}

fuzz_target!(|input: NegotiationInput| {
    if input.published.len() > 4096 || input.requested.len() > 4096 {
        return;
    }

    let Ok(published) = parse_loa_list(&input.published) else {
        return;
    };

    let current = negotiation::negotiate(&published, CompatibilityMode::Current);
    let legacy = negotiation::negotiate(&published, CompatibilityMode::Legacy);

    if let Ok(legacy) = &legacy {
        let current = current.as_ref().expect("legacy success implies current success");
        assert_eq!(legacy.level, current.level);
        assert_eq!(published.first(), Some(&legacy.level));
    }

    let Ok(requested) = parse_loa_list(&input.requested) else {
        return;
    };
    let comparison = if input.exact {
        LoaComparison::Exact
    } else {
        LoaComparison::Minimum
    };
    let _ = negotiation::validate_requested_loas(&requested, comparison);

    // Every level satisfies a request for itself.
    for level in &requested {
        assert!(negotiation::is_equal_or_better(
            std::slice::from_ref(level),
            std::slice::from_ref(level)
        ));
    }
});
