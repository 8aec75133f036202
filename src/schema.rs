use std::collections::HashMap;

use tracing::debug;

use crate::error::{Result, ScanError};
use crate::models::Fields;
use crate::sink::TableSink;

/// Known columns per destination table. Columns are only ever appended.
#[derive(Debug, Default)]
pub struct ColumnSchema {
    tables: HashMap<String, Vec<String>>,
}

impl ColumnSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `table` has a column for every field, appending new ones in
    /// field order to both the tracked schema and the sink's header.
    pub fn ensure_columns(
        &mut self,
        sink: &mut dyn TableSink,
        table: &str,
        fields: &Fields,
    ) -> Result<&[String]> {
        if !self.tables.contains_key(table) {
            sink.get_or_create(table)?;
            let header = sink.header_row(table)?;
            self.tables.insert(table.to_string(), header);
        }
        let columns = self
            .tables
            .get_mut(table)
            .ok_or_else(|| ScanError::UnknownTable(table.to_string()))?;

        for name in fields.names() {
            if name.trim().is_empty() {
                return Err(ScanError::SinkWrite {
                    table: table.to_string(),
                    reason: "empty field name".to_string(),
                });
            }
            // SQLite column names ignore ASCII case.
            if columns.iter().any(|c| c.eq_ignore_ascii_case(name)) {
                continue;
            }
            sink.append_header_column(table, name)?;
            debug!(table, column = name, "Added column");
            columns.push(name.to_string());
        }
        Ok(columns.as_slice())
    }

    /// One value per known column, empty where the row has no such field.
    pub fn to_positional_row(&self, table: &str, fields: &Fields) -> Vec<String> {
        self.columns(table)
            .unwrap_or_default()
            .iter()
            .map(|c| fields.get_ignore_case(c).unwrap_or_default().to_string())
            .collect()
    }

    pub fn columns(&self, table: &str) -> Option<&[String]> {
        self.tables.get(table).map(Vec::as_slice)
    }
}
