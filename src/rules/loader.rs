//! Rules document loading and validation.
//!
//! The document is JSON:
//!
//! ```json
//! {
//!   "intent-rules": [
//!     {
//!       "intent_id": "INTENT_INVOICE_REQ",
//!       "detection_rules": { "keywords": ["factura"], "min_match_count": 1 },
//!       "extraction_strategy": "REGEX_ONLY",
//!       "target_action": { "type": "STORED_PROCEDURE", "name": "sp_x", "params_map": {} }
//!     }
//!   ],
//!   "entity_patterns": { "extracted_ticket": "\\b(TCK-\\d+)\\b" }
//! }
//! ```
//!
//! Older rules key the action under `et_action`. It is renamed to
//! `target_action` before validation; if both are present `et_action` is
//! dropped without looking at it.

use std::collections::HashSet;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::pipeline::extractor::EntityRegistry;
use crate::rules::model::{IntentRule, RuleSet};

/// Top-level key holding the rule list.
pub const RULES_KEY: &str = "intent-rules";
/// Accepted spelling of `RULES_KEY`.
pub const RULES_KEY_ALIAS: &str = "intent_rules";
/// Optional top-level key with extra extraction patterns.
pub const PATTERNS_KEY: &str = "entity_patterns";

const ACTION_KEY: &str = "target_action";
const LEGACY_ACTION_KEY: &str = "et_action";

/// Everything the pipeline needs from the rules document.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    pub rules: RuleSet,
    pub entities: EntityRegistry,
}

/// Read and validate the rules document at `path`.
pub fn load_config(path: impl AsRef<Path>) -> Result<TriageConfig, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConfigError::NotFound {
            path: path.to_path_buf(),
        },
        _ => ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    let config = parse_config(&raw, path)?;
    info!(
        path = %path.display(),
        rules = config.rules.len(),
        patterns = config.entities.len(),
        "Intent rules loaded"
    );
    Ok(config)
}

/// Parse and validate a rules document. `origin` is only used in errors.
pub fn parse_config(raw: &str, origin: &Path) -> Result<TriageConfig, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        path: origin.to_path_buf(),
        reason,
    };

    let document: Value = serde_json::from_str(raw).map_err(|e| ConfigError::Parse {
        path: origin.to_path_buf(),
        reason: e.to_string(),
    })?;

    let Value::Object(mut top) = document else {
        return Err(invalid("expected a JSON object at the top level".into()));
    };

    let rules_value = top
        .remove(RULES_KEY)
        .or_else(|| top.remove(RULES_KEY_ALIAS))
        .ok_or_else(|| invalid(format!("missing field `{RULES_KEY}`")))?;

    let Value::Array(entries) = rules_value else {
        return Err(invalid(format!("`{RULES_KEY}` must be a list of rules")));
    };

    if entries.is_empty() {
        return Err(ConfigError::EmptyRuleSet {
            path: origin.to_path_buf(),
        });
    }

    let mut rules = Vec::with_capacity(entries.len());
    let mut seen = HashSet::new();
    for (index, entry) in entries.into_iter().enumerate() {
        let rule = parse_rule(index, entry).map_err(&invalid)?;
        if !seen.insert(rule.intent_id.clone()) {
            return Err(ConfigError::DuplicateIntent {
                intent_id: rule.intent_id,
            });
        }
        rules.push(rule);
    }

    let entities = parse_patterns(top.remove(PATTERNS_KEY)).map_err(|e| match e {
        PatternsError::Shape(reason) => invalid(reason),
        PatternsError::Config(e) => e,
    })?;

    warn_unknown_sources(&rules, &entities);

    Ok(TriageConfig {
        rules: RuleSet::from_validated(rules),
        entities,
    })
}

/// Rename the legacy action key. `target_action` wins if both exist.
pub fn normalize_action_field(rule: &mut Map<String, Value>) {
    if let Some(legacy) = rule.remove(LEGACY_ACTION_KEY) {
        if !rule.contains_key(ACTION_KEY) {
            rule.insert(ACTION_KEY.to_string(), legacy);
        }
    }
}

fn parse_rule(index: usize, entry: Value) -> Result<IntentRule, String> {
    let Value::Object(mut object) = entry else {
        return Err(format!("rule #{index}: expected an object"));
    };
    normalize_action_field(&mut object);

    let label = object
        .get("intent_id")
        .and_then(Value::as_str)
        .map(|id| format!("rule #{index} ({id})"))
        .unwrap_or_else(|| format!("rule #{index}"));

    serde_json::from_value(Value::Object(object)).map_err(|e| format!("{label}: {e}"))
}

enum PatternsError {
    Shape(String),
    Config(ConfigError),
}

fn parse_patterns(value: Option<Value>) -> Result<EntityRegistry, PatternsError> {
    let mut registry = EntityRegistry::builtin();
    let Some(value) = value else {
        return Ok(registry);
    };
    let Value::Object(patterns) = value else {
        return Err(PatternsError::Shape(format!(
            "`{PATTERNS_KEY}` must map entity keys to regex strings"
        )));
    };
    for (entity, pattern) in patterns {
        let Value::String(pattern) = pattern else {
            return Err(PatternsError::Shape(format!(
                "`{PATTERNS_KEY}.{entity}` must be a regex string"
            )));
        };
        registry
            .register(&entity, &pattern)
            .map_err(PatternsError::Config)?;
    }
    Ok(registry)
}

/// Unknown source keys load fine but never produce a value.
fn warn_unknown_sources(rules: &[IntentRule], entities: &EntityRegistry) {
    for rule in rules {
        for source in rule.target_action.params_map.sources() {
            if !entities.knows(source) {
                warn!(
                    intent_id = %rule.intent_id,
                    source,
                    "Parameter source has no extraction pattern; it will always be absent"
                );
            }
        }
    }
}
