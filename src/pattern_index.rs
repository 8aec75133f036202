use std::collections::HashMap;

use regex::{Regex, RegexBuilder};

use crate::error::{Result, ScanError};
use crate::models::{
    RawRule, FIELD_BANK, FIELD_EMAIL_DATE, FIELD_MESSAGE_ID, FIELD_PROCESS_TIME,
};

/// A rule's Subject or Sender cell starting with this opts out of exact keying.
pub const WILDCARD_MARKER: char = '/';

/// Bucket for wildcard rules. Literal keys always contain `KEY_SEPARATOR`,
/// so the two can never collide.
pub const WILDCARD_KEY: &str = "*";

pub const KEY_SEPARATOR: char = '|';

pub const DEFAULT_SUBJECT_KEY_LEN: usize = 30;

const RESERVED_FIELDS: &[&str] = &[FIELD_MESSAGE_ID, FIELD_EMAIL_DATE, FIELD_BANK, FIELD_PROCESS_TIME];

fn subject_prefix(subject: &str, key_len: usize) -> String {
    subject.trim().chars().take(key_len).collect()
}

fn normalize_sender(sender: &str) -> String {
    sender.trim().to_lowercase()
}

/// Derive the bucket key for a subject/sender pair.
///
/// Subjects are cut to `key_len` characters, so two subjects sharing a long
/// prefix land in the same bucket and are told apart by their body regexes.
pub fn lookup_key(subject: &str, sender: &str, key_len: usize) -> String {
    format!(
        "{}{KEY_SEPARATOR}{}",
        subject_prefix(subject, key_len),
        normalize_sender(sender)
    )
}

pub fn is_wildcard(cell: &str) -> bool {
    cell.trim_start().starts_with(WILDCARD_MARKER)
}

#[derive(Debug, Clone)]
pub struct ExtractionRule {
    /// 1-based position in the rules table.
    pub row: usize,
    pub bank: String,
    pub subject_pattern: String,
    pub sender_pattern: String,
    pub body_regex: Regex,
    pub capture_names: Vec<String>,
}

impl ExtractionRule {
    fn compile(row: usize, raw: &RawRule) -> Result<Self> {
        let bank = raw.bank.trim();
        if bank.is_empty() {
            return Err(ScanError::config(row, "missing Bank"));
        }
        if raw.body_regex.trim().is_empty() {
            return Err(ScanError::config(row, "missing BodyRegex"));
        }

        let body_regex = RegexBuilder::new(&raw.body_regex)
            .dot_matches_new_line(true)
            .build()
            .map_err(|e| ScanError::config(row, format!("invalid BodyRegex: {e}")))?;

        let capture_names = parse_capture_names(row, &raw.match_groups)?;
        let groups = body_regex.captures_len() - 1;
        if groups != capture_names.len() {
            return Err(ScanError::config(
                row,
                format!(
                    "BodyRegex has {groups} capture group(s) but MatchGroups names {}",
                    capture_names.len()
                ),
            ));
        }

        Ok(Self {
            row,
            bank: bank.to_string(),
            subject_pattern: raw.subject.clone(),
            sender_pattern: raw.sender.clone(),
            body_regex,
            capture_names,
        })
    }

    pub fn is_wildcard(&self) -> bool {
        is_wildcard(&self.subject_pattern) || is_wildcard(&self.sender_pattern)
    }

    /// Rules with no capture names only recognise a mail, they extract nothing.
    pub fn is_informational(&self) -> bool {
        self.capture_names.is_empty()
    }
}

fn parse_capture_names(row: usize, cell: &str) -> Result<Vec<String>> {
    if cell.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut names: Vec<String> = Vec::new();
    for name in cell.split(',').map(str::trim) {
        if name.is_empty() {
            return Err(ScanError::config(row, format!("empty name in MatchGroups '{cell}'")));
        }
        // Table columns are case-insensitive, so names are too.
        if let Some(reserved) = RESERVED_FIELDS.iter().find(|r| r.eq_ignore_ascii_case(name)) {
            return Err(ScanError::config(
                row,
                format!("'{name}' clashes with the reserved field '{reserved}'"),
            ));
        }
        if names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            return Err(ScanError::config(row, format!("duplicate name '{name}' in MatchGroups")));
        }
        names.push(name.to_string());
    }
    Ok(names)
}

/// Rules bucketed by lookup key, built once per run.
#[derive(Debug, Default)]
pub struct PatternIndex {
    buckets: HashMap<String, Vec<ExtractionRule>>,
    subject_key_len: usize,
    rule_count: usize,
}

impl PatternIndex {
    /// Compile every row. The first bad row aborts the build: a partial rule
    /// set would quietly push later mails into the unrecognized table.
    pub fn build(rows: &[RawRule], subject_key_len: usize) -> Result<Self> {
        let mut buckets: HashMap<String, Vec<ExtractionRule>> = HashMap::new();
        for (i, raw) in rows.iter().enumerate() {
            let rule = ExtractionRule::compile(i + 1, raw)?;
            let key = if rule.is_wildcard() {
                WILDCARD_KEY.to_string()
            } else {
                lookup_key(&raw.subject, &raw.sender, subject_key_len)
            };
            buckets.entry(key).or_default().push(rule);
        }
        Ok(Self {
            buckets,
            subject_key_len,
            rule_count: rows.len(),
        })
    }

    /// Candidate rules in priority order: the exact bucket if there is one,
    /// else every wildcard rule. The body regex picks among them.
    pub fn lookup(&self, subject: &str, sender: &str) -> &[ExtractionRule] {
        let key = lookup_key(subject, sender, self.subject_key_len);
        self.buckets
            .get(&key)
            .or_else(|| self.buckets.get(WILDCARD_KEY))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn subject_key_len(&self) -> usize {
        self.subject_key_len
    }

    pub fn len(&self) -> usize {
        self.rule_count
    }

    pub fn is_empty(&self) -> bool {
        self.rule_count == 0
    }

    /// Buckets sorted by key, wildcard bucket last.
    pub fn buckets(&self) -> Vec<(&str, &[ExtractionRule])> {
        let mut out: Vec<(&str, &[ExtractionRule])> = self
            .buckets
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
            .collect();
        out.sort_by(|a, b| {
            (a.0 == WILDCARD_KEY)
                .cmp(&(b.0 == WILDCARD_KEY))
                .then_with(|| a.0.cmp(b.0))
        });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(bank: &str, subject: &str, sender: &str, re: &str, groups: &str) -> RawRule {
        RawRule {
            bank: bank.to_string(),
            subject: subject.to_string(),
            sender: sender.to_string(),
            body_regex: re.to_string(),
            match_groups: groups.to_string(),
        }
    }

    #[test]
    fn test_lookup_key_is_deterministic() {
        let a = lookup_key("Transaction Alert", "alerts@bank.test", 30);
        let b = lookup_key("Transaction Alert", "alerts@bank.test", 30);
        assert_eq!(a, b);
        assert_eq!(a, "Transaction Alert|alerts@bank.test");
    }

    #[test]
    fn test_lookup_key_truncates_subject() {
        let long = "Debit alert for account ending 1234 on 2025-01-01";
        let key = lookup_key(long, "a@b.test", 10);
        assert_eq!(key, "Debit aler|a@b.test");
        assert_eq!(key, lookup_key("Debit alert for account ending 9999", "a@b.test", 10));
    }

    #[test]
    fn test_lookup_key_counts_chars_not_bytes() {
        let key = lookup_key("Überweisung eingegangen", "x@y.test", 3);
        assert_eq!(key, "Übe|x@y.test");
    }

    #[test]
    fn test_sender_is_case_insensitive() {
        assert_eq!(
            lookup_key("S", "Alerts@Bank.Test", 30),
            lookup_key("S", "alerts@bank.test", 30)
        );
    }

    #[test]
    fn test_capture_count_mismatch_is_configuration_error() {
        let rows = vec![raw("B", "S", "a@b.test", r"Rs\.(\d+) (\w+)", "Amount")];
        let err = PatternIndex::build(&rows, 30).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("2 capture group(s)"));
    }

    #[test]
    fn test_missing_bank_is_configuration_error() {
        let rows = vec![raw("  ", "S", "a@b.test", r"x", "")];
        let err = PatternIndex::build(&rows, 30).unwrap_err();
        assert!(matches!(err, ScanError::Configuration { row: 1, .. }));
    }

    #[test]
    fn test_missing_regex_reports_row() {
        let rows = vec![
            raw("B", "S", "a@b.test", r"ok", ""),
            raw("B", "S", "a@b.test", "", ""),
        ];
        let err = PatternIndex::build(&rows, 30).unwrap_err();
        assert!(matches!(err, ScanError::Configuration { row: 2, .. }));
    }

    #[test]
    fn test_invalid_regex_is_configuration_error() {
        let rows = vec![raw("B", "S", "a@b.test", r"(unclosed", "")];
        assert!(PatternIndex::build(&rows, 30).unwrap_err().is_configuration());
    }

    #[test]
    fn test_reserved_and_duplicate_names_rejected() {
        let rows = vec![raw("B", "S", "a@b.test", r"(\d+)", "Bank")];
        assert!(PatternIndex::build(&rows, 30).is_err());
        let rows = vec![raw("B", "S", "a@b.test", r"(\d+) (\d+)", "Amount, Amount")];
        assert!(PatternIndex::build(&rows, 30).is_err());
        let rows = vec![raw("B", "S", "a@b.test", r"(\d+) (\d+)", "Amount,")];
        assert!(PatternIndex::build(&rows, 30).is_err());
    }

    #[test]
    fn test_reserved_name_check_ignores_case() {
        let rows = vec![raw("B", "S", "a@b.test", r"(\d+) (\w+)", "Amount,bank")];
        let err = PatternIndex::build(&rows, 30).unwrap_err();
        assert!(matches!(err, ScanError::Configuration { row: 1, .. }));
        assert!(err.to_string().contains("reserved field 'Bank'"));
        let rows = vec![raw("B", "S", "a@b.test", r"(\d+)", "messageid")];
        assert!(PatternIndex::build(&rows, 30).unwrap_err().is_configuration());
    }

    #[test]
    fn test_duplicate_name_check_ignores_case() {
        let rows = vec![raw("B", "S", "a@b.test", r"(\d+) (\d+)", "Amount,amount")];
        let err = PatternIndex::build(&rows, 30).unwrap_err();
        assert!(err.to_string().contains("duplicate name 'amount'"));
    }

    #[test]
    fn test_capture_names_are_trimmed() {
        let rows = vec![raw("B", "S", "a@b.test", r"(\d+) (\w+)", " Amount , RefNo ")];
        let index = PatternIndex::build(&rows, 30).unwrap();
        let rules = index.lookup("S", "a@b.test");
        assert_eq!(rules[0].capture_names, vec!["Amount", "RefNo"]);
    }

    #[test]
    fn test_rules_sharing_key_keep_insertion_order() {
        let rows = vec![
            raw("First", "S", "a@b.test", r"x", ""),
            raw("Second", "S", "a@b.test", r"y", ""),
        ];
        let index = PatternIndex::build(&rows, 30).unwrap();
        let banks: Vec<_> = index.lookup("S", "a@b.test").iter().map(|r| r.bank.as_str()).collect();
        assert_eq!(banks, vec!["First", "Second"]);
    }

    #[test]
    fn test_unknown_key_without_wildcard_is_empty() {
        let rows = vec![raw("B", "S", "a@b.test", r"x", "")];
        let index = PatternIndex::build(&rows, 30).unwrap();
        assert!(index.lookup("Other", "a@b.test").is_empty());
    }

    #[test]
    fn test_wildcard_bucket_serves_any_unkeyed_message() {
        let rows = vec![
            raw("Literal", "Alert", "alerts@other.test", r"x", ""),
            raw("MyBank", "/", r"/.*@mybank\..*/", r"x", ""),
            raw("Rotating", "/", "/", r"y", ""),
        ];
        let index = PatternIndex::build(&rows, 30).unwrap();
        let banks: Vec<_> = index
            .lookup("Alert", "other@elsewhere.test")
            .iter()
            .map(|r| r.bank.as_str())
            .collect();
        assert_eq!(banks, vec!["MyBank", "Rotating"]);
        assert_eq!(index.lookup("Anything at all", "noreply@mybank.com").len(), 2);
    }

    #[test]
    fn test_literal_bucket_shadows_wildcard() {
        let rows = vec![
            raw("Literal", "Alert", "alerts@other.test", r"x", ""),
            raw("MyBank", "/", r"/.*@mybank\..*/", r"x", ""),
        ];
        let index = PatternIndex::build(&rows, 30).unwrap();
        let hits = index.lookup("Alert", "alerts@other.test");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].bank, "Literal");
    }

    #[test]
    fn test_wildcard_marker_on_subject_only() {
        let rows = vec![raw("B", "/", "alerts@b.test", r"x", "")];
        let index = PatternIndex::build(&rows, 30).unwrap();
        assert_eq!(index.buckets()[0].0, WILDCARD_KEY);
        assert_eq!(index.lookup("Statement ready", "any@where.test").len(), 1);
    }

    #[test]
    fn test_buckets_list_wildcard_last() {
        let rows = vec![
            raw("W", "/", "/", r"x", ""),
            raw("B", "S", "a@b.test", r"x", ""),
        ];
        let index = PatternIndex::build(&rows, 30).unwrap();
        let keys: Vec<_> = index.buckets().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["S|a@b.test", WILDCARD_KEY]);
        assert_eq!(index.len(), 2);
    }
}
