//! Collaborator traits the pipeline calls into.
//!
//! The pipeline never talks to a database directly. It hands a procedure
//! name plus parameters to an `ActionExecutor`, and failures to an
//! `ExceptionRecorder`. Both are injected as `Arc<dyn …>` so tests can
//! substitute recording doubles.

use async_trait::async_trait;

use crate::error::ActionError;
use crate::pipeline::types::{ManualReviewRecord, ParameterSet};

/// Executes the action a matched intent resolves to.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Run `action` with `params`.
    ///
    /// Implementations fail with `ActionError::MissingParameter` when any
    /// parameter value is absent.
    async fn execute(&self, action: &str, params: &ParameterSet) -> Result<(), ActionError>;
}

/// Persists manual review records. Best-effort: never fails the caller.
#[async_trait]
pub trait ExceptionRecorder: Send + Sync {
    async fn record_exception(&self, record: &ManualReviewRecord);
}
