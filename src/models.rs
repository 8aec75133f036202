use chrono::{DateTime, Utc};

/// Fixed fields stamped on every matched transaction row.
pub const FIELD_MESSAGE_ID: &str = "MessageID";
pub const FIELD_EMAIL_DATE: &str = "EmailDateTime";
pub const FIELD_BANK: &str = "Bank";
pub const FIELD_PROCESS_TIME: &str = "ProcessTime";

/// Extra fields carried by quarantine rows.
pub const FIELD_FROM: &str = "From";
pub const FIELD_SUBJECT: &str = "Subject";
pub const FIELD_BODY: &str = "Body";

/// Timestamp layout used for every date written to a table.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

/// One mail as handed over by a mail source.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub id: String,
    pub received_at: DateTime<Utc>,
    pub from_header: String,
    pub subject: String,
    pub body: String,
    /// When this run read the message, not when it arrived.
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct MailThread {
    pub messages: Vec<EmailMessage>,
}

/// A rule row exactly as it sits in the rules table, before compilation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRule {
    pub bank: String,
    pub subject: String,
    pub sender: String,
    pub body_regex: String,
    pub match_groups: String,
}

/// Field name to value mapping that keeps insertion order.
///
/// Column order in the destination tables follows the order fields were
/// first seen, so a plain `HashMap` would not do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(String, String)>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite. An overwritten field keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Like `get`, but ASCII case-insensitive on an exact miss.
    pub fn get_ignore_case(&self, name: &str) -> Option<&str> {
        self.get(name).or_else(|| {
            self.entries
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionResult {
    Matched {
        fields: Fields,
        bank: String,
        message_id: String,
        received_at: DateTime<Utc>,
        observed_at: DateTime<Utc>,
    },
    /// A rule with no capture names matched: a known, non-transactional mail.
    RecognizedNoMatch { bank: String },
    RuleNotFound,
}

impl ExtractionResult {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Matched { .. } => "matched",
            Self::RecognizedNoMatch { .. } => "recognized",
            Self::RuleNotFound => "unrecognized",
        }
    }
}
