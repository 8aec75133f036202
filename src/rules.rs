use crate::error::{Result, ScanError};
use crate::models::RawRule;
use crate::sink::TableSink;

pub const RULES_TABLE: &str = "Rules";

pub const RULE_COLUMNS: [&str; 5] = ["Bank", "Subject", "Sender", "BodyRegex", "MatchGroups"];

/// Create the rules table and add any required column it lacks.
pub fn ensure_rules_table(sink: &mut dyn TableSink) -> Result<()> {
    sink.get_or_create(RULES_TABLE)?;
    let header = sink.header_row(RULES_TABLE)?;
    for col in RULE_COLUMNS {
        if !header.iter().any(|h| h == col) {
            sink.append_header_column(RULES_TABLE, col)?;
        }
    }
    Ok(())
}

fn column_index(header: &[String], name: &str) -> Result<usize> {
    header
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| ScanError::RulesTable(format!("missing required column '{name}'")))
}

/// Read every rule row in table order. Extra columns are ignored.
pub fn load_rules(sink: &dyn TableSink) -> Result<Vec<RawRule>> {
    let header = match sink.header_row(RULES_TABLE) {
        Ok(h) => h,
        Err(ScanError::UnknownTable(_)) => {
            return Err(ScanError::RulesTable(format!(
                "table '{RULES_TABLE}' not found; run `txnscan init` first"
            )))
        }
        Err(e) => return Err(e),
    };
    let idx: Vec<usize> = RULE_COLUMNS
        .iter()
        .map(|c| column_index(&header, c))
        .collect::<Result<_>>()?;

    let cell = |row: &[String], i: usize| row.get(idx[i]).cloned().unwrap_or_default();
    Ok(sink
        .read_rows(RULES_TABLE)?
        .iter()
        .map(|row| RawRule {
            bank: cell(row, 0),
            subject: cell(row, 1),
            sender: cell(row, 2),
            body_regex: cell(row, 3),
            match_groups: cell(row, 4),
        })
        .collect())
}

pub fn add_rule(sink: &mut dyn TableSink, rule: &RawRule) -> Result<()> {
    ensure_rules_table(sink)?;
    let header = sink.header_row(RULES_TABLE)?;
    let mut row = vec![String::new(); header.len()];
    let values = [
        &rule.bank,
        &rule.subject,
        &rule.sender,
        &rule.body_regex,
        &rule.match_groups,
    ];
    for (name, value) in RULE_COLUMNS.iter().zip(values) {
        row[column_index(&header, name)?] = value.clone();
    }
    sink.append_row(RULES_TABLE, &row)
}
