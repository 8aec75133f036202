use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use mailparse::{parse_mail, MailHeaderMap, ParsedMail};
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{Result, ScanError};
use crate::mail::{MailQuery, MailSource};
use crate::models::{EmailMessage, MailThread};

pub const PROCESSED_DIR: &str = "processed";

fn block_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<\s*(br|/p|/div|/tr|/li|/h[1-6])\b[^>]*>").expect("invalid block tag regex")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("invalid tag regex"))
}

fn script_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style)\b.*?</(script|style)\s*>").expect("invalid script regex")
    })
}

/// Crude HTML to text: block ends become newlines, other tags vanish.
pub fn html_to_text(html: &str) -> String {
    let text = script_re().replace_all(html, "");
    let text = block_tag_re().replace_all(&text, "\n");
    let text = tag_re().replace_all(&text, "");
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn find_part(mail: &ParsedMail, mimetype: &str) -> Option<String> {
    if mail.ctype.mimetype.eq_ignore_ascii_case(mimetype) {
        if let Ok(body) = mail.get_body() {
            return Some(body);
        }
    }
    mail.subparts.iter().find_map(|part| find_part(part, mimetype))
}

/// Prefer the plain text part, fall back to flattened HTML.
fn extract_body(mail: &ParsedMail) -> String {
    find_part(mail, "text/plain")
        .or_else(|| find_part(mail, "text/html").map(|h| html_to_text(&h)))
        .unwrap_or_default()
}

/// Parse one `.eml` file. A missing Message-ID falls back to the sha256 of
/// the raw bytes so the id stays stable across runs.
pub fn parse_eml(path: &Path, observed_at: DateTime<Utc>) -> Result<EmailMessage> {
    let bytes = fs::read(path)?;
    let mail = parse_mail(&bytes)
        .map_err(|e| ScanError::MailSource(format!("{}: {e}", path.display())))?;

    let id = mail
        .headers
        .get_first_value("Message-ID")
        .map(|v| v.trim().trim_start_matches('<').trim_end_matches('>').to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| {
            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            hex::encode(hasher.finalize())
        });

    let received_at = match mail
        .headers
        .get_first_value("Date")
        .and_then(|d| mailparse::dateparse(&d).ok())
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
    {
        Some(dt) => dt,
        None => {
            debug!(path = %path.display(), "No usable Date header, using file mtime");
            DateTime::<Utc>::from(fs::metadata(path)?.modified()?)
        }
    };

    Ok(EmailMessage {
        id,
        received_at,
        from_header: mail.headers.get_first_value("From").unwrap_or_default(),
        subject: mail.headers.get_first_value("Subject").unwrap_or_default(),
        body: extract_body(&mail),
        observed_at,
    })
}

/// A directory of `.eml` files, one single-message thread per file, in file
/// name order. Subdirectories are not scanned.
pub struct EmlDirSource {
    dir: PathBuf,
    cache: Option<(String, Vec<(PathBuf, EmailMessage)>)>,
}

impl EmlDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: None,
        }
    }

    fn list_files(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            return Err(ScanError::MailSource(format!(
                "mail directory not found: {}",
                self.dir.display()
            )));
        }
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("eml"))
            })
            .collect();
        files.sort();
        Ok(files)
    }

    /// Parse and filter the whole directory once per distinct query.
    fn matching(&mut self, query: &str) -> Result<&[(PathBuf, EmailMessage)]> {
        let stale = self.cache.as_ref().map_or(true, |(q, _)| q != query);
        if stale {
            let filter = MailQuery::parse(query)?;
            let observed_at = Utc::now();
            let mut hits = Vec::new();
            for path in self.list_files()? {
                let message = match parse_eml(&path, observed_at) {
                    Ok(m) => m,
                    Err(ScanError::MailSource(reason)) => {
                        warn!(%reason, "Skipping unparseable message");
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                if filter.is_empty() || filter.matches(&message) {
                    hits.push((path, message));
                }
            }
            self.cache = Some((query.to_string(), hits));
        }
        Ok(self
            .cache
            .as_ref()
            .map(|(_, hits)| hits.as_slice())
            .unwrap_or_default())
    }
}

impl MailSource for EmlDirSource {
    fn search(&mut self, query: &str, offset: usize, page_size: usize) -> Result<Vec<MailThread>> {
        let hits = self.matching(query)?;
        Ok(hits
            .iter()
            .skip(offset)
            .take(page_size)
            .map(|(_, message)| MailThread {
                messages: vec![message.clone()],
            })
            .collect())
    }

    /// Move processed files into `processed/` so the next scan skips them.
    fn mark_processed(&mut self, message_ids: &[String]) -> Result<usize> {
        let Some((_, hits)) = self.cache.take() else {
            return Ok(0);
        };
        let target = self.dir.join(PROCESSED_DIR);
        fs::create_dir_all(&target)?;
        let mut moved = 0;
        for (path, message) in &hits {
            if !message_ids.contains(&message.id) {
                continue;
            }
            if let Some(name) = path.file_name() {
                fs::rename(path, target.join(name))?;
                moved += 1;
            }
        }
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &str = "From: Example Bank <alerts@examplebank.test>\r\n\
Subject: Transaction Alert\r\n\
Date: Wed, 15 Jan 2025 09:30:00 +0000\r\n\
Message-ID: <abc123@examplebank.test>\r\n\
Content-Type: text/plain\r\n\
\r\n\
Rs.1200.50 debited from your account.\r\nRef AB1234\r\n";

    const MULTIPART: &str = "From: alerts@examplebank.test\r\n\
Subject: Statement\r\n\
Date: Thu, 16 Jan 2025 10:00:00 +0000\r\n\
Content-Type: multipart/alternative; boundary=\"XX\"\r\n\
\r\n\
--XX\r\n\
Content-Type: text/html\r\n\
\r\n\
<html><body><p>Your statement &amp; summary</p><br>is ready</body></html>\r\n\
--XX--\r\n";

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_parse_plain_message() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.eml", PLAIN);
        let msg = parse_eml(&dir.path().join("a.eml"), Utc::now()).unwrap();
        assert_eq!(msg.id, "abc123@examplebank.test");
        assert_eq!(msg.subject, "Transaction Alert");
        assert_eq!(msg.from_header, "Example Bank <alerts@examplebank.test>");
        assert_eq!(msg.received_at.to_rfc3339(), "2025-01-15T09:30:00+00:00");
        assert!(msg.body.contains("Ref AB1234"));
    }

    #[test]
    fn test_html_only_message_is_flattened_and_hashed_id() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.eml", MULTIPART);
        let msg = parse_eml(&dir.path().join("b.eml"), Utc::now()).unwrap();
        assert_eq!(msg.id.len(), 64);
        assert!(msg.body.contains("Your statement & summary"));
        assert!(msg.body.contains("\nis ready"));
        assert!(!msg.body.contains('<'));
    }

    #[test]
    fn test_html_to_text_drops_scripts() {
        let text = html_to_text("<style>p{}</style><div>a</div><script>x()</script>b");
        assert_eq!(text, "a\nb");
    }

    #[test]
    fn test_search_pages_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "2.eml", MULTIPART);
        write(dir.path(), "1.eml", PLAIN);
        write(dir.path(), "notes.txt", "ignored");
        let mut source = EmlDirSource::new(dir.path());
        let first = source.search("", 0, 1).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].messages[0].subject, "Transaction Alert");
        let second = source.search("", 1, 1).unwrap();
        assert_eq!(second[0].messages[0].subject, "Statement");
        assert!(source.search("", 2, 1).unwrap().is_empty());
    }

    #[test]
    fn test_search_applies_query() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "1.eml", PLAIN);
        write(dir.path(), "2.eml", MULTIPART);
        let mut source = EmlDirSource::new(dir.path());
        let page = source.search("subject:statement", 0, 10).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].messages[0].subject, "Statement");
    }

    #[test]
    fn test_mark_processed_moves_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "1.eml", PLAIN);
        write(dir.path(), "2.eml", MULTIPART);
        let mut source = EmlDirSource::new(dir.path());
        source.search("", 0, 10).unwrap();
        let moved = source
            .mark_processed(&["abc123@examplebank.test".to_string()])
            .unwrap();
        assert_eq!(moved, 1);
        assert!(dir.path().join(PROCESSED_DIR).join("1.eml").exists());
        assert!(dir.path().join("2.eml").exists());
        let mut fresh = EmlDirSource::new(dir.path());
        assert_eq!(fresh.search("", 0, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_directory_is_mail_source_error() {
        let mut source = EmlDirSource::new("/definitely/not/here");
        assert!(matches!(source.search("", 0, 10), Err(ScanError::MailSource(_))));
    }
}
