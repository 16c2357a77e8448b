//! Small shared helpers with no home in a single subsystem.

use siphasher::sip::SipHasher13;
use std::hash::{Hash, Hasher};

/// Fixed key so the hash is stable across processes and restarts, unlike
/// `std::collections::hash_map::DefaultHasher` which is randomized per
/// process. Both the enrichment stand-in metadata and the anomaly
/// detector's placeholder stock baseline depend on this being reproducible.
const STABLE_HASH_KEY: (u64, u64) = (0x5ca1_ab1e_dead_beef, 0x1337_c0de_f00d_face);

pub fn stable_hash(input: &str) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(STABLE_HASH_KEY.0, STABLE_HASH_KEY.1);
    input.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_across_calls() {
        assert_eq!(stable_hash("I1"), stable_hash("I1"));
    }

    #[test]
    fn different_inputs_usually_differ() {
        assert_ne!(stable_hash("I1"), stable_hash("I2"));
    }
}
