//! Error types for the mailroom service.

use std::path::PathBuf;

/// Configuration errors. All of these are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found at: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("Could not read configuration file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not decode JSON from file {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("Configuration file {} is invalid: {reason}", .path.display())]
    Invalid { path: PathBuf, reason: String },

    #[error("Configuration file {} defines no intent rules", .path.display())]
    EmptyRuleSet { path: PathBuf },

    #[error("Duplicate intent_id '{intent_id}' in rule set")]
    DuplicateIntent { intent_id: String },

    #[error("Invalid extraction pattern for entity '{entity}': {reason}")]
    InvalidPattern { entity: String, reason: String },
}

/// Errors raised by an action executor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("Simulated DBError: Mandatory parameter '{param}' is missing for SP '{action}'.")]
    MissingParameter { action: String, param: String },

    #[error("Execution of '{action}' failed: {reason}")]
    ExecutionFailed { action: String, reason: String },
}

/// Per-message pipeline failures. Each one ends up as a manual review record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("No matching intent found for the request.")]
    NoIntentMatched,

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error("Processing aborted unexpectedly: {reason}")]
    Aborted { reason: String },
}

/// Errors handing a message to the background dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("Dispatch queue is closed")]
    QueueClosed,

    #[error("Dispatch queue is full ({capacity} pending)")]
    QueueFull { capacity: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_parameter_message_names_param_and_action() {
        let err = ActionError::MissingParameter {
            action: "sp_finance_process_invoice_request".into(),
            param: "@client_rfc".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Mandatory parameter '@client_rfc' is missing"));
        assert!(msg.contains("sp_finance_process_invoice_request"));
    }

    #[test]
    fn pipeline_error_is_transparent_over_action_error() {
        let action = ActionError::ExecutionFailed {
            action: "sp_x".into(),
            reason: "deadlock".into(),
        };
        let err = PipelineError::from(action.clone());
        assert_eq!(err.to_string(), action.to_string());
    }

    #[test]
    fn not_found_mentions_path() {
        let err = ConfigError::NotFound {
            path: PathBuf::from("nonexistent.json"),
        };
        assert!(err.to_string().contains("nonexistent.json"));
    }
}
