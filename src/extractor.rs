use tracing::debug;

use crate::models::{
    format_datetime, EmailMessage, ExtractionResult, Fields, FIELD_BANK, FIELD_EMAIL_DATE,
    FIELD_MESSAGE_ID, FIELD_PROCESS_TIME,
};
use crate::pattern_index::PatternIndex;

/// Pull the bare address out of a From header.
///
/// `Example Bank <alerts@examplebank.test>` gives `alerts@examplebank.test`;
/// a header without angle brackets is taken whole.
pub fn bare_address(from_header: &str) -> &str {
    let header = from_header.trim();
    if let Some(start) = header.rfind('<') {
        let rest = &header[start + 1..];
        if let Some(end) = rest.find('>') {
            return rest[..end].trim();
        }
    }
    header
}

pub struct Extractor<'a> {
    index: &'a PatternIndex,
}

impl<'a> Extractor<'a> {
    pub fn new(index: &'a PatternIndex) -> Self {
        Self { index }
    }

    pub fn extract(&self, message: &EmailMessage) -> ExtractionResult {
        let sender = bare_address(&message.from_header);
        let candidates = self.index.lookup(&message.subject, sender);

        for rule in candidates {
            let Some(caps) = rule.body_regex.captures(&message.body) else {
                continue;
            };
            debug!(message_id = %message.id, bank = %rule.bank, row = rule.row, "Body matched rule");

            if rule.is_informational() {
                return ExtractionResult::RecognizedNoMatch {
                    bank: rule.bank.clone(),
                };
            }

            let mut fields = Fields::new();
            for (i, name) in rule.capture_names.iter().enumerate() {
                let value = caps.get(i + 1).map(|m| m.as_str()).unwrap_or_default();
                fields.insert(name.as_str(), value);
            }
            fields.insert(FIELD_MESSAGE_ID, message.id.as_str());
            fields.insert(FIELD_EMAIL_DATE, format_datetime(&message.received_at));
            fields.insert(FIELD_BANK, rule.bank.as_str());
            fields.insert(FIELD_PROCESS_TIME, format_datetime(&message.observed_at));

            return ExtractionResult::Matched {
                fields,
                bank: rule.bank.clone(),
                message_id: message.id.clone(),
                received_at: message.received_at,
                observed_at: message.observed_at,
            };
        }

        ExtractionResult::RuleNotFound
    }
}
