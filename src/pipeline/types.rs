//! Shared types for the triage pipeline.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Inbound message ─────────────────────────────────────────────────

/// A message accepted for triage.
///
/// Both fields are required on the wire; emptiness is not checked here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Originating channel, e.g. "EMAIL_GATEWAY" or "CHAT_BOT".
    pub channel_id: String,
    /// Free-form message text.
    pub body: String,
}

impl IncomingMessage {
    pub fn new(channel_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            body: body.into(),
        }
    }
}

// ── Extraction output ───────────────────────────────────────────────

/// Entity values pulled out of one message. Absence is explicit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedEntities {
    values: HashMap<String, Option<String>>,
}

impl ExtractedEntities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Option<String>) {
        self.values.insert(key.into(), value);
    }

    /// Value for `key`, or `None` when absent or never requested.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_deref())
    }

    /// Whether `key` was requested during extraction (even if nothing was found).
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ── Parameter set ───────────────────────────────────────────────────

/// Ordered stored-procedure parameters handed to the action executor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParameterSet(Vec<(String, Option<String>)>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: Option<String>) {
        self.0.push((name.into(), value));
    }

    /// Value of a parameter; `None` if absent or unknown.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_deref()))
    }

    /// First parameter without a value, in declaration order.
    pub fn first_missing(&self) -> Option<&str> {
        self.0
            .iter()
            .find(|(_, v)| v.is_none())
            .map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ── Failure record ──────────────────────────────────────────────────

/// A pipeline failure that needs human follow-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualReviewRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub original_request: IncomingMessage,
    pub error_message: String,
    /// Intent determined before the failure; `None` if nothing matched.
    pub intent_id: Option<String>,
}

impl ManualReviewRecord {
    pub fn new(
        original_request: IncomingMessage,
        error_message: impl Into<String>,
        intent_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            original_request,
            error_message: error_message.into(),
            intent_id,
        }
    }
}

// ── Pipeline outcome ────────────────────────────────────────────────

/// What happened to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The action executed successfully.
    Executed {
        intent_id: String,
        action: String,
        parameters: ParameterSet,
    },
    /// Some stage failed; the record was handed to the exception recorder.
    Escalated(ManualReviewRecord),
}

impl PipelineOutcome {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Executed { .. } => "executed",
            Self::Escalated(_) => "escalated",
        }
    }

    pub fn is_executed(&self) -> bool {
        matches!(self, Self::Executed { .. })
    }
}
