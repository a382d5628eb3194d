//! Message processor — runs one message through match → extract → map → execute.
//!
//! **Single failure boundary.** Any error from any stage is caught here exactly
//! once, turned into a `ManualReviewRecord` carrying whatever intent was
//! determined before the failure, and handed to the `ExceptionRecorder`.
//! Nothing propagates to the caller.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::pipeline::extractor::EntityExtractor;
use crate::pipeline::mapper::build_parameters;
use crate::pipeline::matcher::match_intent;
use crate::pipeline::types::{IncomingMessage, ManualReviewRecord, ParameterSet, PipelineOutcome};
use crate::rules::model::{IntentRule, RuleSet};
use crate::store::traits::{ActionExecutor, ExceptionRecorder};

/// Triage pipeline over an immutable rule set.
pub struct MessageProcessor {
    rules: Arc<RuleSet>,
    extractor: EntityExtractor,
    executor: Arc<dyn ActionExecutor>,
    recorder: Arc<dyn ExceptionRecorder>,
}

impl MessageProcessor {
    pub fn new(
        rules: Arc<RuleSet>,
        extractor: EntityExtractor,
        executor: Arc<dyn ActionExecutor>,
        recorder: Arc<dyn ExceptionRecorder>,
    ) -> Self {
        Self {
            rules,
            extractor,
            executor,
            recorder,
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Process a single message through the full pipeline.
    pub async fn process(&self, message: IncomingMessage) -> PipelineOutcome {
        info!(
            channel = %message.channel_id,
            body_len = message.body.len(),
            "Processing inbound message"
        );

        let Some(rule) = match_intent(&message.body, &self.rules) else {
            return self.escalate(message, PipelineError::NoIntentMatched, None).await;
        };

        match self.dispatch_rule(rule, &message).await {
            Ok(parameters) => {
                info!(
                    intent_id = %rule.intent_id,
                    action = %rule.target_action.name,
                    "Action executed"
                );
                PipelineOutcome::Executed {
                    intent_id: rule.intent_id.clone(),
                    action: rule.target_action.name.clone(),
                    parameters,
                }
            }
            Err(e) => {
                self.escalate(message, e, Some(rule.intent_id.clone()))
                    .await
            }
        }
    }

    /// Escalate a message whose processing panicked. The matched intent, if
    /// any, is lost with the task.
    pub async fn escalate_aborted(
        &self,
        message: IncomingMessage,
        reason: String,
    ) -> PipelineOutcome {
        self.escalate(message, PipelineError::Aborted { reason }, None)
            .await
    }

    /// Extract, map and execute for an already-matched rule.
    async fn dispatch_rule(
        &self,
        rule: &IntentRule,
        message: &IncomingMessage,
    ) -> Result<ParameterSet, PipelineError> {
        let extracted = self.extractor.extract(&message.body, rule);
        let parameters = build_parameters(rule, &extracted, message);

        debug!(
            intent_id = %rule.intent_id,
            action = %rule.target_action.name,
            params = parameters.len(),
            "Parameters mapped"
        );

        self.executor
            .execute(&rule.target_action.name, &parameters)
            .await?;
        Ok(parameters)
    }

    async fn escalate(
        &self,
        message: IncomingMessage,
        error: PipelineError,
        intent_id: Option<String>,
    ) -> PipelineOutcome {
        warn!(
            channel = %message.channel_id,
            intent_id = intent_id.as_deref().unwrap_or("none"),
            error = %error,
            "Pipeline failed, escalating to manual review"
        );
        let record = ManualReviewRecord::new(message, error.to_string(), intent_id);
        self.recorder.record_exception(&record).await;
        PipelineOutcome::Escalated(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use crate::error::ActionError;
    use crate::pipeline::extractor::{ORDER_ID, RFC};
    use crate::rules::model::{ActionDescriptor, DetectionRules, FULL_TEXT_BODY, META_CHANNEL_ID};

    /// Records every call; fails on absent parameters like the real executor.
    #[derive(Default)]
    struct RecordingBackend {
        executed: Mutex<Vec<(String, ParameterSet)>>,
        reviews: Mutex<Vec<ManualReviewRecord>>,
        fail_with: Option<ActionError>,
    }

    #[async_trait]
    impl ActionExecutor for RecordingBackend {
        async fn execute(&self, action: &str, params: &ParameterSet) -> Result<(), ActionError> {
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            if let Some(missing) = params.first_missing() {
                return Err(ActionError::MissingParameter {
                    action: action.into(),
                    param: missing.into(),
                });
            }
            self.executed
                .lock()
                .await
                .push((action.to_string(), params.clone()));
            Ok(())
        }
    }

    #[async_trait]
    impl ExceptionRecorder for RecordingBackend {
        async fn record_exception(&self, record: &ManualReviewRecord) {
            self.reviews.lock().await.push(record.clone());
        }
    }

    fn rules() -> Arc<RuleSet> {
        let invoice = IntentRule {
            intent_id: "INTENT_INVOICE_REQ".into(),
            detection_rules: DetectionRules {
                keywords: vec!["factura".into(), "facturar".into()],
                min_match_count: 1,
                priority_flag: Some("HIGH".into()),
            },
            extraction_strategy: "REGEX_ONLY".into(),
            target_action: ActionDescriptor {
                action_type: "STORED_PROCEDURE".into(),
                name: "sp_finance_process_invoice_request".into(),
                params_map: [
                    ("@order_ref", ORDER_ID),
                    ("@client_rfc", RFC),
                    ("@request_source", META_CHANNEL_ID),
                ]
                .into_iter()
                .collect(),
            },
        };
        let complaint = IntentRule {
            intent_id: "INTENT_COMPLAINT".into(),
            detection_rules: DetectionRules {
                keywords: vec!["queja".into()],
                min_match_count: 1,
                priority_flag: None,
            },
            extraction_strategy: "FULL_TEXT".into(),
            target_action: ActionDescriptor {
                action_type: "STORED_PROCEDURE".into(),
                name: "sp_support_log_complaint".into(),
                params_map: [("@complaint_text", FULL_TEXT_BODY), ("@channel", META_CHANNEL_ID)]
                    .into_iter()
                    .collect(),
            },
        };
        Arc::new(RuleSet::from_validated(vec![invoice, complaint]))
    }

    fn processor(backend: Arc<RecordingBackend>) -> MessageProcessor {
        MessageProcessor::new(
            rules(),
            EntityExtractor::default(),
            backend.clone(),
            backend,
        )
    }

    #[tokio::test]
    async fn happy_path_executes_without_review() {
        let backend = Arc::new(RecordingBackend::default());
        let processor = processor(backend.clone());

        let outcome = processor
            .process(IncomingMessage::new(
                "EMAIL_GATEWAY",
                "Hola, solicito factura para la orden ORD-999 con RFC XEXX010101000",
            ))
            .await;

        assert!(outcome.is_executed());
        let executed = backend.executed.lock().await;
        assert_eq!(executed.len(), 1);
        let (action, params) = &executed[0];
        assert_eq!(action, "sp_finance_process_invoice_request");
        assert_eq!(params.get("@order_ref"), Some("ORD-999"));
        assert_eq!(params.get("@client_rfc"), Some("XEXX010101000"));
        assert_eq!(params.get("@request_source"), Some("EMAIL_GATEWAY"));
        assert!(backend.reviews.lock().await.is_empty());
    }

    #[tokio::test]
    async fn missing_parameter_escalates_with_intent() {
        let backend = Arc::new(RecordingBackend::default());
        let processor = processor(backend.clone());

        let outcome = processor
            .process(IncomingMessage::new(
                "CHAT_BOT",
                "Quiero mi factura de la orden ORD-123, por favor.",
            ))
            .await;

        let PipelineOutcome::Escalated(record) = outcome else {
            panic!("expected escalation");
        };
        assert_eq!(record.intent_id.as_deref(), Some("INTENT_INVOICE_REQ"));
        assert!(record.error_message.contains("'@client_rfc'"));

        let reviews = backend.reviews.lock().await;
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0], record);
        assert!(backend.executed.lock().await.is_empty());
    }

    #[tokio::test]
    async fn no_match_escalates_without_intent() {
        let backend = Arc::new(RecordingBackend::default());
        let processor = processor(backend.clone());

        let message = IncomingMessage::new("CHAT_BOT", "Buenos días, ¿cómo están?");
        let outcome = processor.process(message.clone()).await;

        let PipelineOutcome::Escalated(record) = outcome else {
            panic!("expected escalation");
        };
        assert_eq!(record.intent_id, None);
        assert_eq!(record.error_message, "No matching intent found for the request.");
        assert_eq!(record.original_request, message);
        assert_eq!(backend.reviews.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn execution_failure_is_caught_uniformly() {
        let backend = Arc::new(RecordingBackend {
            fail_with: Some(ActionError::ExecutionFailed {
                action: "sp_support_log_complaint".into(),
                reason: "connection reset".into(),
            }),
            ..Default::default()
        });
        let processor = processor(backend.clone());

        let outcome = processor
            .process(IncomingMessage::new("CHAT_BOT", "Tengo una queja"))
            .await;

        let PipelineOutcome::Escalated(record) = outcome else {
            panic!("expected escalation");
        };
        assert_eq!(record.intent_id.as_deref(), Some("INTENT_COMPLAINT"));
        assert!(record.error_message.contains("connection reset"));
    }

    #[tokio::test]
    async fn full_text_body_passes_original_text() {
        let backend = Arc::new(RecordingBackend::default());
        let processor = processor(backend.clone());
        let body = "Tengo una QUEJA sobre el Servicio!";

        let outcome = processor
            .process(IncomingMessage::new("WHATSAPP", body))
            .await;

        let PipelineOutcome::Executed { parameters, .. } = outcome else {
            panic!("expected execution");
        };
        assert_eq!(parameters.get("@complaint_text"), Some(body));
        assert_eq!(parameters.get("@channel"), Some("WHATSAPP"));
    }

    #[tokio::test]
    async fn aborted_message_is_recorded_without_intent() {
        let backend = Arc::new(RecordingBackend::default());
        let processor = processor(backend.clone());

        let outcome = processor
            .escalate_aborted(IncomingMessage::new("CLI", "factura"), "boom".into())
            .await;

        let PipelineOutcome::Escalated(record) = outcome else {
            panic!("expected escalation");
        };
        assert_eq!(record.intent_id, None);
        assert_eq!(record.error_message, "Processing aborted unexpectedly: boom");
        assert_eq!(backend.reviews.lock().await.len(), 1);
    }
}
