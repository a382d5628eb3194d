//! Intent rule types, as read from the rules document.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// Parameter source meaning "the whole, unmodified message body".
pub const FULL_TEXT_BODY: &str = "full_text_body";

/// Parameter source meaning "the request's channel identifier".
pub const META_CHANNEL_ID: &str = "_meta.channel_id";

fn default_min_match_count() -> usize {
    1
}

/// Keyword criteria a message must meet to select a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionRules {
    /// Keywords searched for as case-insensitive substrings.
    pub keywords: Vec<String>,
    /// How many distinct keywords must appear. Defaults to 1.
    #[serde(default = "default_min_match_count")]
    pub min_match_count: usize,
    /// Informational priority marker, carried through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_flag: Option<String>,
}

/// The stored procedure a matched intent triggers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    /// Action type tag (e.g. "STORED_PROCEDURE").
    #[serde(rename = "type")]
    pub action_type: String,
    /// Procedure name handed to the executor.
    pub name: String,
    /// Output parameter name → source key.
    pub params_map: ParamsMap,
}

/// A single keyword-driven intent definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRule {
    pub intent_id: String,
    pub detection_rules: DetectionRules,
    /// Currently informational only.
    pub extraction_strategy: String,
    pub target_action: ActionDescriptor,
}

impl IntentRule {
    /// Count how many of this rule's keywords occur in already-lowercased text.
    pub fn keyword_hits(&self, lowered_text: &str) -> usize {
        self.detection_rules
            .keywords
            .iter()
            .filter(|kw| lowered_text.contains(&kw.to_lowercase()))
            .count()
    }

    /// Whether `keyword_hits` meets the configured threshold.
    pub fn qualifies(&self, lowered_text: &str) -> bool {
        self.keyword_hits(lowered_text) >= self.detection_rules.min_match_count
    }
}

/// Ordered parameter map.
///
/// Declaration order is kept so that parameter sets, SQL rendering and
/// "first missing parameter" reporting are deterministic. A repeated key
/// keeps its first position and takes the last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamsMap(Vec<(String, String)>);

impl ParamsMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a mapping.
    pub fn insert(&mut self, param: impl Into<String>, source: impl Into<String>) {
        let param = param.into();
        let source = source.into();
        match self.0.iter_mut().find(|(p, _)| *p == param) {
            Some(entry) => entry.1 = source,
            None => self.0.push((param, source)),
        }
    }

    /// Source key for a parameter.
    pub fn get(&self, param: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(p, _)| p == param)
            .map(|(_, s)| s.as_str())
    }

    /// `(param, source)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(p, s)| (p.as_str(), s.as_str()))
    }

    /// Distinct source keys in first-seen order.
    pub fn sources(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.0.len());
        for (_, source) in &self.0 {
            if !seen.contains(&source.as_str()) {
                seen.push(source);
            }
        }
        seen
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<P: Into<String>, S: Into<String>> FromIterator<(P, S)> for ParamsMap {
    fn from_iter<I: IntoIterator<Item = (P, S)>>(iter: I) -> Self {
        let mut map = ParamsMap::new();
        for (p, s) in iter {
            map.insert(p, s);
        }
        map
    }
}

impl Serialize for ParamsMap {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl<'de> Deserialize<'de> for ParamsMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ParamsMapVisitor;

        impl<'de> Visitor<'de> for ParamsMapVisitor {
            type Value = ParamsMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of parameter names to source keys")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ParamsMap, A::Error> {
                let mut map = ParamsMap::new();
                while let Some((param, source)) = access.next_entry::<String, String>()? {
                    map.insert(param, source);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(ParamsMapVisitor)
    }
}

/// Ordered, immutable collection of intent rules.
///
/// Constructed once by the loader and shared read-only behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<IntentRule>,
}

impl RuleSet {
    /// Wrap already-validated rules. The loader guarantees non-empty, unique ids.
    pub(crate) fn from_validated(rules: Vec<IntentRule>) -> Self {
        Self { rules }
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> &[IntentRule] {
        &self.rules
    }

    pub fn get(&self, intent_id: &str) -> Option<&IntentRule> {
        self.rules.iter().find(|r| r.intent_id == intent_id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_map_keeps_declaration_order() {
        let json = r#"{"@z": "a", "@a": "b", "@m": "c"}"#;
        let map: ParamsMap = serde_json::from_str(json).unwrap();
        let params: Vec<&str> = map.iter().map(|(p, _)| p).collect();
        assert_eq!(params, vec!["@z", "@a", "@m"]);
    }

    #[test]
    fn params_map_duplicate_key_takes_last_value() {
        let json = r#"{"@a": "first", "@b": "x", "@a": "second"}"#;
        let map: ParamsMap = serde_json::from_str(json).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("@a"), Some("second"));
        assert_eq!(map.iter().next(), Some(("@a", "second")));
    }

    #[test]
    fn params_map_sources_are_distinct() {
        let map: ParamsMap = [("@a", "x"), ("@b", "y"), ("@c", "x")]
            .into_iter()
            .collect();
        assert_eq!(map.sources(), vec!["x", "y"]);
    }

    #[test]
    fn params_map_serializes_as_object() {
        let map: ParamsMap = [("@b", "y"), ("@a", "x")].into_iter().collect();
        let value = serde_json::to_value(&map).unwrap();
        assert_eq!(value["@a"], "x");
        assert_eq!(value["@b"], "y");
    }

    #[test]
    fn min_match_count_defaults_to_one() {
        let rules: DetectionRules = serde_json::from_str(r#"{"keywords": ["a"]}"#).unwrap();
        assert_eq!(rules.min_match_count, 1);
        assert!(rules.priority_flag.is_none());
    }

    #[test]
    fn keyword_hits_counts_each_keyword_once() {
        let rule = IntentRule {
            intent_id: "T".into(),
            detection_rules: DetectionRules {
                keywords: vec!["Factura".into(), "orden".into(), "rfc".into()],
                min_match_count: 2,
                priority_flag: None,
            },
            extraction_strategy: "REGEX".into(),
            target_action: ActionDescriptor {
                action_type: "STORED_PROCEDURE".into(),
                name: "sp".into(),
                params_map: ParamsMap::new(),
            },
        };
        let text = "factura factura factura";
        assert_eq!(rule.keyword_hits(text), 1);
        assert!(!rule.qualifies(text));
        assert!(rule.qualifies("factura de la orden"));
    }
}
