//! Keyword intent matcher.
//!
//! Rules are checked in declaration order and the first one whose keyword
//! hit count reaches its `min_match_count` wins. There is no scoring.
//!
//! Matching is plain case-insensitive substring containment: "factura"
//! matches "FACTURAS" and "refactura" alike.

use tracing::debug;

use crate::rules::model::{IntentRule, RuleSet};

/// Return the first rule in `rules` that `text` qualifies for.
pub fn match_intent<'a>(text: &str, rules: &'a RuleSet) -> Option<&'a IntentRule> {
    let lowered = text.to_lowercase();

    for rule in rules.rules() {
        let hits = rule.keyword_hits(&lowered);
        if hits >= rule.detection_rules.min_match_count {
            debug!(
                intent_id = %rule.intent_id,
                hits,
                required = rule.detection_rules.min_match_count,
                "Message matched intent rule"
            );
            return Some(rule);
        }
    }

    debug!("No intent rule matched");
    None
}
