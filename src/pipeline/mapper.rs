//! Maps extracted entities onto stored-procedure parameters.

use crate::pipeline::types::{ExtractedEntities, IncomingMessage, ParameterSet};
use crate::rules::model::{IntentRule, META_CHANNEL_ID};

/// Build the parameter set for `rule`'s action.
///
/// `_meta.channel_id` resolves to the message's channel and is never absent.
/// Every other source key is looked up in `extracted` and may be absent.
/// No validation happens here; the executor decides what is required.
pub fn build_parameters(
    rule: &IntentRule,
    extracted: &ExtractedEntities,
    message: &IncomingMessage,
) -> ParameterSet {
    let mut params = ParameterSet::new();
    for (param, source) in rule.target_action.params_map.iter() {
        let value = if source == META_CHANNEL_ID {
            Some(message.channel_id.clone())
        } else {
            extracted.get(source).map(str::to_string)
        };
        params.push(param, value);
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::model::{ActionDescriptor, DetectionRules, FULL_TEXT_BODY, ParamsMap};

    fn invoice_rule() -> IntentRule {
        IntentRule {
            intent_id: "INTENT_INVOICE_REQ".into(),
            detection_rules: DetectionRules {
                keywords: vec!["factura".into()],
                min_match_count: 1,
                priority_flag: None,
            },
            extraction_strategy: "REGEX_ONLY".into(),
            target_action: ActionDescriptor {
                action_type: "STORED_PROCEDURE".into(),
                name: "sp_finance_process_invoice_request".into(),
                params_map: [
                    ("@order_ref", "extracted_order_id"),
                    ("@client_rfc", "extracted_rfc"),
                    ("@request_source", META_CHANNEL_ID),
                ]
                .into_iter()
                .collect::<ParamsMap>(),
            },
        }
    }

    #[test]
    fn channel_id_comes_from_message() {
        let mut extracted = ExtractedEntities::new();
        extracted.insert("extracted_order_id", Some("ORD-1".into()));
        extracted.insert("extracted_rfc", Some("XEXX010101000".into()));
        extracted.insert(META_CHANNEL_ID, None);

        let message = IncomingMessage::new("EMAIL_GATEWAY", "irrelevant");
        let params = build_parameters(&invoice_rule(), &extracted, &message);

        assert_eq!(params.get("@request_source"), Some("EMAIL_GATEWAY"));
        assert_eq!(params.get("@order_ref"), Some("ORD-1"));
        assert_eq!(params.get("@client_rfc"), Some("XEXX010101000"));
        assert_eq!(params.first_missing(), None);
    }

    #[test]
    fn absent_entities_stay_absent() {
        let mut extracted = ExtractedEntities::new();
        extracted.insert("extracted_order_id", Some("ORD-1".into()));
        extracted.insert("extracted_rfc", None);

        let message = IncomingMessage::new("CHAT_BOT", "irrelevant");
        let params = build_parameters(&invoice_rule(), &extracted, &message);

        assert_eq!(params.len(), 3);
        assert_eq!(params.first_missing(), Some("@client_rfc"));
    }

    #[test]
    fn parameters_follow_map_order() {
        let message = IncomingMessage::new("CHAT_BOT", "x");
        let params = build_parameters(&invoice_rule(), &ExtractedEntities::new(), &message);
        let names: Vec<&str> = params.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["@order_ref", "@client_rfc", "@request_source"]);
    }

    #[test]
    fn shared_source_fills_every_parameter() {
        let mut rule = invoice_rule();
        rule.target_action.params_map = [("@body", FULL_TEXT_BODY), ("@copy", FULL_TEXT_BODY)]
            .into_iter()
            .collect();
        let mut extracted = ExtractedEntities::new();
        extracted.insert(FULL_TEXT_BODY, Some("Texto Original".into()));

        let message = IncomingMessage::new("CHAT_BOT", "Texto Original");
        let params = build_parameters(&rule, &extracted, &message);
        assert_eq!(params.get("@body"), Some("Texto Original"));
        assert_eq!(params.get("@copy"), Some("Texto Original"));
    }
}
