use std::collections::HashMap;

use tracing::{debug, error, info, warn};

use crate::buffer::{RowBuffer, DEFAULT_BATCH_SIZE};
use crate::error::{Result, ScanError};
use crate::extractor::Extractor;
use crate::mail::MailSource;
use crate::models::{
    format_datetime, EmailMessage, ExtractionResult, Fields, FIELD_BANK, FIELD_BODY,
    FIELD_EMAIL_DATE, FIELD_FROM, FIELD_MESSAGE_ID, FIELD_PROCESS_TIME, FIELD_SUBJECT,
};
use crate::pattern_index::{PatternIndex, DEFAULT_SUBJECT_KEY_LEN};
use crate::rules::{load_rules, RULES_TABLE};
use crate::schema::ColumnSchema;
use crate::sink::TableSink;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const DEFAULT_RECOGNIZED_TABLE: &str = "Recognized";
pub const DEFAULT_UNRECOGNIZED_TABLE: &str = "Unrecognized";

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub query: String,
    pub page_size: usize,
    pub batch_size: usize,
    pub subject_key_len: usize,
    pub recognized_table: String,
    pub unrecognized_table: String,
    /// Ask the source to mark every message processed after a clean run.
    pub archive: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            query: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            subject_key_len: DEFAULT_SUBJECT_KEY_LEN,
            recognized_table: DEFAULT_RECOGNIZED_TABLE.to_string(),
            unrecognized_table: DEFAULT_UNRECOGNIZED_TABLE.to_string(),
            archive: false,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ScanReport {
    pub pages: usize,
    pub messages: usize,
    pub matched: usize,
    pub recognized: usize,
    pub unrecognized: usize,
    pub rows_written: usize,
    /// Rows routed per table, in first-use order.
    pub per_table: Vec<(String, usize)>,
    pub processed_ids: Vec<String>,
    pub archived: usize,
}

impl ScanReport {
    fn count_table(&mut self, table: &str) {
        match self.per_table.iter_mut().find(|(t, _)| t == table) {
            Some((_, n)) => *n += 1,
            None => self.per_table.push((table.to_string(), 1)),
        }
    }
}

/// State owned by one run. Nothing here outlives it.
pub struct ScanContext {
    pub index: PatternIndex,
    pub schema: ColumnSchema,
    pub buffer: RowBuffer,
    /// Lowercased bank name to the table its rows go to. Table names ignore
    /// case in the store, so `HDFC` and `Hdfc` share the first spelling seen.
    bank_tables: HashMap<String, String>,
}

impl ScanContext {
    /// Load and compile the rule table. Fails before any mail is touched.
    pub fn load(sink: &dyn TableSink, options: &ScanOptions) -> Result<Self> {
        let rows = load_rules(sink)?;
        let index = PatternIndex::build(&rows, options.subject_key_len)?;

        let reserved = [
            RULES_TABLE,
            options.recognized_table.as_str(),
            options.unrecognized_table.as_str(),
        ];
        let mut rules: Vec<_> = index.buckets().into_iter().flat_map(|(_, b)| b).collect();
        rules.sort_by_key(|r| r.row);
        let mut bank_tables = HashMap::new();
        for rule in rules {
            if reserved.iter().any(|r| r.eq_ignore_ascii_case(&rule.bank)) {
                return Err(ScanError::config(
                    rule.row,
                    format!("bank name '{}' clashes with a reserved table", rule.bank),
                ));
            }
            bank_tables
                .entry(rule.bank.to_lowercase())
                .or_insert_with(|| rule.bank.clone());
        }

        if index.is_empty() {
            warn!("Rules table is empty; every message will be filed as unrecognized");
        }
        info!(rules = index.len(), "Loaded extraction rules");
        Ok(Self {
            index,
            schema: ColumnSchema::new(),
            buffer: RowBuffer::new(options.batch_size),
            bank_tables,
        })
    }

    /// Destination table for a bank's matched rows.
    pub fn table_for(&self, bank: &str) -> String {
        self.bank_tables
            .get(&bank.to_lowercase())
            .cloned()
            .unwrap_or_else(|| bank.to_string())
    }
}

fn quarantine_fields(message: &EmailMessage, bank: Option<&str>) -> Fields {
    let mut fields = Fields::new();
    fields.insert(FIELD_MESSAGE_ID, message.id.as_str());
    fields.insert(FIELD_EMAIL_DATE, format_datetime(&message.received_at));
    fields.insert(FIELD_PROCESS_TIME, format_datetime(&message.observed_at));
    if let Some(bank) = bank {
        fields.insert(FIELD_BANK, bank);
    }
    fields.insert(FIELD_FROM, message.from_header.as_str());
    fields.insert(FIELD_SUBJECT, message.subject.as_str());
    fields.insert(FIELD_BODY, message.body.as_str());
    fields
}

pub struct Scanner<'a> {
    sink: &'a mut dyn TableSink,
    options: ScanOptions,
    ctx: ScanContext,
    report: ScanReport,
}

impl<'a> Scanner<'a> {
    pub fn new(sink: &'a mut dyn TableSink, mut options: ScanOptions) -> Result<Self> {
        options.page_size = options.page_size.max(1);
        let ctx = ScanContext::load(&*sink, &options)?;
        debug!(
            rules = ctx.index.len(),
            batch_size = ctx.buffer.batch_size(),
            page_size = options.page_size,
            "Scan context loaded"
        );
        Ok(Self {
            sink,
            options,
            ctx,
            report: ScanReport::default(),
        })
    }

    /// Page through the source until it returns an empty page, then flush
    /// whatever is still buffered. Any error aborts the run; rows still in the
    /// buffer at that point are not written and nothing is marked processed.
    pub fn run(mut self, source: &mut dyn MailSource) -> Result<ScanReport> {
        let mut offset = 0;
        loop {
            let threads = source.search(&self.options.query, offset, self.options.page_size)?;
            if threads.is_empty() {
                break;
            }
            self.report.pages += 1;
            info!(page = self.report.pages, offset, threads = threads.len(), "Fetched page");
            offset += threads.len();

            for thread in &threads {
                for message in &thread.messages {
                    self.process(message)?;
                }
            }
        }

        debug!(rows = self.ctx.buffer.pending_rows(), "Final flush");
        self.ctx
            .buffer
            .flush_all(self.sink)
            .inspect_err(|e| error!(error = %e, "Final flush failed"))?;
        self.report.rows_written = self.ctx.buffer.written();
        if self.options.archive && !self.report.processed_ids.is_empty() {
            self.report.archived = source.mark_processed(&self.report.processed_ids)?;
        }
        info!(
            messages = self.report.messages,
            matched = self.report.matched,
            recognized = self.report.recognized,
            unrecognized = self.report.unrecognized,
            "Scan finished"
        );
        Ok(self.report)
    }

    fn process(&mut self, message: &EmailMessage) -> Result<()> {
        self.report.messages += 1;
        let result = Extractor::new(&self.ctx.index).extract(message);
        debug!(message_id = %message.id, result = result.label(), "Extracted");

        let (table, fields) = match result {
            ExtractionResult::Matched {
                fields,
                bank,
                message_id,
                received_at,
                observed_at,
            } => {
                self.report.matched += 1;
                let table = self.ctx.table_for(&bank);
                debug!(
                    message_id = %message_id,
                    bank = %bank,
                    fields = fields.len(),
                    received = %received_at,
                    lag_secs = (observed_at - received_at).num_seconds(),
                    "Transaction extracted"
                );
                (table, fields)
            }
            ExtractionResult::RecognizedNoMatch { bank } => {
                self.report.recognized += 1;
                let fields = quarantine_fields(message, Some(bank.as_str()));
                (self.options.recognized_table.clone(), fields)
            }
            ExtractionResult::RuleNotFound => {
                self.report.unrecognized += 1;
                warn!(
                    message_id = %message.id,
                    subject = %message.subject,
                    from = %message.from_header,
                    "No rule matched"
                );
                (self.options.unrecognized_table.clone(), quarantine_fields(message, None))
            }
        };

        self.route(&table, &fields)
            .inspect_err(|e| error!(table = %table, error = %e, "Write failed, aborting scan"))?;
        self.report.count_table(&table);
        self.report.processed_ids.push(message.id.clone());
        Ok(())
    }

    fn route(&mut self, table: &str, fields: &Fields) -> Result<()> {
        self.ctx.schema.ensure_columns(self.sink, table, fields)?;
        let row = self.ctx.schema.to_positional_row(table, fields);
        self.ctx.buffer.add(self.sink, table, row)
    }
}

/// Build a fresh context from the rule table and run one full scan.
pub fn run_scan(
    source: &mut dyn MailSource,
    sink: &mut dyn TableSink,
    options: ScanOptions,
) -> Result<ScanReport> {
    Scanner::new(sink, options)?.run(source)
}
