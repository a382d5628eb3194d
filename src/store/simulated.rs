//! Simulated database — logs stored-procedure calls instead of running them.
//!
//! Keeps an in-memory journal of executed statements and manual review
//! records so the service stays observable without a real backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::error::ActionError;
use crate::pipeline::types::{ManualReviewRecord, ParameterSet};
use crate::store::traits::{ActionExecutor, ExceptionRecorder};

/// A simulated `EXEC` that went through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedStatement {
    pub action: String,
    pub params: ParameterSet,
    /// Rendered SQL, e.g. `EXEC sp_x @a='1', @b=NULL`.
    pub sql: String,
    pub executed_at: DateTime<Utc>,
}

/// In-memory stand-in for the finance database.
#[derive(Default)]
pub struct SimulatedDatabase {
    executions: RwLock<Vec<ExecutedStatement>>,
    reviews: RwLock<Vec<ManualReviewRecord>>,
}

impl SimulatedDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statements executed so far, oldest first.
    pub async fn executions(&self) -> Vec<ExecutedStatement> {
        self.executions.read().await.clone()
    }

    /// Manual review records logged so far, oldest first.
    pub async fn review_records(&self) -> Vec<ManualReviewRecord> {
        self.reviews.read().await.clone()
    }
}

#[async_trait]
impl ActionExecutor for SimulatedDatabase {
    async fn execute(&self, action: &str, params: &ParameterSet) -> Result<(), ActionError> {
        if let Some(missing) = params.first_missing() {
            let err = ActionError::MissingParameter {
                action: action.to_string(),
                param: missing.to_string(),
            };
            error!(action, param = missing, "{err}");
            return Err(err);
        }

        let sql = render_exec(action, params);
        info!(action, %sql, "Simulated database execution");

        self.executions.write().await.push(ExecutedStatement {
            action: action.to_string(),
            params: params.clone(),
            sql,
            executed_at: Utc::now(),
        });
        Ok(())
    }
}

#[async_trait]
impl ExceptionRecorder for SimulatedDatabase {
    async fn record_exception(&self, record: &ManualReviewRecord) {
        warn!(
            record_id = %record.id,
            timestamp = %record.timestamp,
            intent_id = record.intent_id.as_deref().unwrap_or("Not detected"),
            error = %record.error_message,
            channel = %record.original_request.channel_id,
            body = %record.original_request.body,
            "Manual review required"
        );
        self.reviews.write().await.push(record.clone());
    }
}

/// Render an `EXEC` statement: strings single-quoted, absent values as `NULL`.
pub fn render_exec(action: &str, params: &ParameterSet) -> String {
    let rendered = format_params(params);
    if rendered.is_empty() {
        format!("EXEC {action}")
    } else {
        format!("EXEC {action} {rendered}")
    }
}

fn format_params(params: &ParameterSet) -> String {
    params
        .iter()
        .map(|(name, value)| match value {
            Some(v) => format!("{name}='{v}'"),
            None => format!("{name}=NULL"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
