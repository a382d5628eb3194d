//! Regex-based entity extraction.
//!
//! The set of entities to extract comes from the matched rule's parameter
//! map *values*. Two sentinels bypass the regex registry:
//! - `full_text_body` → the original text, verbatim
//! - `_meta.channel_id` → left absent here; the mapper fills it from the message
//!
//! Every other key is looked up in the `EntityRegistry`. Missing patterns and
//! non-matching patterns both yield an absent value, never an error.

use std::collections::HashMap;

use regex::Regex;
use tracing::debug;

use crate::error::ConfigError;
use crate::pipeline::types::ExtractedEntities;
use crate::rules::model::{FULL_TEXT_BODY, IntentRule, META_CHANNEL_ID};

/// Entity key for order identifiers such as `ORD-999`.
pub const ORDER_ID: &str = "extracted_order_id";

/// Entity key for Mexican RFC tax identifiers such as `XEXX010101000`.
pub const RFC: &str = "extracted_rfc";

const ORDER_ID_PATTERN: &str = r"\b(ORD-\d+)\b";
const RFC_PATTERN: &str = r"\b([A-ZÑ&]{3,4}\d{6}[A-Z0-9]{3})\b";

/// Compiled extraction pattern. Capture group 1 is the value.
#[derive(Debug, Clone)]
pub struct EntityPattern {
    regex: Regex,
}

impl EntityPattern {
    /// Compile `pattern` case-insensitively. It must contain a capture group.
    pub fn new(pattern: &str) -> Result<Self, String> {
        let regex = Regex::new(&format!("(?i){pattern}")).map_err(|e| e.to_string())?;
        if regex.captures_len() < 2 {
            return Err("pattern must contain a capture group".into());
        }
        Ok(Self { regex })
    }

    /// First match's capture group, if any.
    pub fn find(&self, text: &str) -> Option<String> {
        self.regex
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}

/// Registry of named extraction patterns.
#[derive(Debug, Clone)]
pub struct EntityRegistry {
    patterns: HashMap<String, EntityPattern>,
}

impl EntityRegistry {
    /// Registry containing only the built-in order-id and RFC patterns.
    pub fn builtin() -> Self {
        let mut patterns = HashMap::new();
        patterns.insert(
            ORDER_ID.to_string(),
            EntityPattern::new(ORDER_ID_PATTERN).expect("built-in order id pattern compiles"),
        );
        patterns.insert(
            RFC.to_string(),
            EntityPattern::new(RFC_PATTERN).expect("built-in RFC pattern compiles"),
        );
        Self { patterns }
    }

    /// Register an additional pattern. Built-in keys and sentinels are reserved.
    pub fn register(&mut self, entity: &str, pattern: &str) -> Result<(), ConfigError> {
        if is_sentinel(entity) || entity == ORDER_ID || entity == RFC {
            return Err(ConfigError::InvalidPattern {
                entity: entity.to_string(),
                reason: "entity key is reserved".into(),
            });
        }
        let compiled = EntityPattern::new(pattern).map_err(|e| ConfigError::InvalidPattern {
            entity: entity.to_string(),
            reason: e,
        })?;
        self.patterns.insert(entity.to_string(), compiled);
        Ok(())
    }

    pub fn get(&self, entity: &str) -> Option<&EntityPattern> {
        self.patterns.get(entity)
    }

    /// Whether `key` can produce a value: a registered pattern or a sentinel.
    pub fn knows(&self, key: &str) -> bool {
        is_sentinel(key) || self.patterns.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn is_sentinel(key: &str) -> bool {
    key == FULL_TEXT_BODY || key == META_CHANNEL_ID
}

/// Extracts the entities a rule asks for.
#[derive(Debug, Clone, Default)]
pub struct EntityExtractor {
    registry: EntityRegistry,
}

impl EntityExtractor {
    pub fn new(registry: EntityRegistry) -> Self {
        Self { registry }
    }

    /// Extract every entity referenced by `rule`'s parameter map from `text`.
    pub fn extract(&self, text: &str, rule: &IntentRule) -> ExtractedEntities {
        let mut entities = ExtractedEntities::new();

        for key in rule.target_action.params_map.sources() {
            let value = match key {
                FULL_TEXT_BODY => Some(text.to_string()),
                META_CHANNEL_ID => None,
                other => self.registry.get(other).and_then(|p| p.find(text)),
            };
            debug!(
                intent_id = %rule.intent_id,
                entity = key,
                found = value.is_some(),
                "Entity extracted"
            );
            entities.insert(key, value);
        }

        entities
    }
}
