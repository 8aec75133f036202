use chrono::NaiveDate;

use crate::error::{Result, ScanError};
use crate::models::EmailMessage;

#[derive(Debug, Clone, PartialEq)]
enum Term {
    From(String),
    Subject(String),
    After(NaiveDate),
    Before(NaiveDate),
    Text(String),
}

/// A small search language over subject, sender, date and body.
///
/// Terms are whitespace separated and all must hold:
/// `from:bank.test subject:"Debit alert" after:2025-01-01 before:2025/02/01 ref`.
/// Matching is case-insensitive. `after` is inclusive, `before` exclusive.
/// Anything that is not one of those operators is plain text searched in the
/// subject and body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MailQuery {
    terms: Vec<Term>,
}

fn tokenize(query: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in query.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn parse_date(token: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y/%m/%d"))
        .map_err(|_| ScanError::MailSource(format!("invalid date in query term '{token}'")))
}

impl MailQuery {
    pub fn parse(query: &str) -> Result<Self> {
        let mut terms = Vec::new();
        for token in tokenize(query) {
            let term = match token.split_once(':') {
                Some((op, value)) if op.eq_ignore_ascii_case("from") => Term::From(value.to_lowercase()),
                Some((op, value)) if op.eq_ignore_ascii_case("subject") => {
                    Term::Subject(value.to_lowercase())
                }
                Some((op, value)) if op.eq_ignore_ascii_case("after") => {
                    Term::After(parse_date(&token, value)?)
                }
                Some((op, value)) if op.eq_ignore_ascii_case("before") => {
                    Term::Before(parse_date(&token, value)?)
                }
                _ => Term::Text(token.to_lowercase()),
            };
            terms.push(term);
        }
        Ok(Self { terms })
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn matches(&self, message: &EmailMessage) -> bool {
        let date = message.received_at.date_naive();
        self.terms.iter().all(|term| match term {
            Term::From(v) => message.from_header.to_lowercase().contains(v),
            Term::Subject(v) => message.subject.to_lowercase().contains(v),
            Term::After(d) => date >= *d,
            Term::Before(d) => date < *d,
            Term::Text(v) => {
                message.subject.to_lowercase().contains(v) || message.body.to_lowercase().contains(v)
            }
        })
    }
}
