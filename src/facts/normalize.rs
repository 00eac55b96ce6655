//! Rename fact keys that are not valid variable names for the consumer.

use tracing::debug;

use super::FactsRecord;

/// Redundancy indicator as reported by the device; starts with a digit.
pub const DUAL_RE_KEY: &str = "2RE";
pub const HAS_DUAL_RE_KEY: &str = "has_2RE";

/// Move `2RE` to `has_2RE`. A record without `2RE` is left untouched.
pub fn normalize(facts: &mut FactsRecord) {
    if let Some(value) = facts.remove(DUAL_RE_KEY) {
        debug!("Renaming fact {} -> {}", DUAL_RE_KEY, HAS_DUAL_RE_KEY);
        facts.insert(HAS_DUAL_RE_KEY.to_string(), value);
    }
}
