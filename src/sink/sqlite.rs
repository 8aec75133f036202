use rusqlite::{params_from_iter, Connection};

use crate::error::{Result, ScanError};
use crate::sink::TableSink;

/// Hidden rowid column that keeps rows in insertion order.
const ROW_COLUMN: &str = "_row";

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sink_err(table: &str, reason: impl ToString) -> ScanError {
    ScanError::SinkWrite {
        table: table.to_string(),
        reason: reason.to_string(),
    }
}

/// Every logical table is a SQLite table of TEXT columns in header order.
pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    fn exists(&self, table: &str) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE")?;
        Ok(stmt.exists([table])?)
    }

    fn require(&self, table: &str) -> Result<()> {
        if self.exists(table)? {
            Ok(())
        } else {
            Err(ScanError::UnknownTable(table.to_string()))
        }
    }
}

impl TableSink for SqliteSink {
    fn get_or_create(&mut self, table: &str) -> Result<()> {
        if table.trim().is_empty() || table.to_lowercase().starts_with("sqlite_") {
            return Err(sink_err(table, "invalid table name"));
        }
        self.conn
            .execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {} ({ROW_COLUMN} INTEGER PRIMARY KEY)",
                quote_ident(table)
            ))
            .map_err(|e| sink_err(table, e))?;
        Ok(())
    }

    fn header_row(&self, table: &str) -> Result<Vec<String>> {
        self.require(table)?;
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(columns.into_iter().filter(|c| c != ROW_COLUMN).collect())
    }

    fn append_header_column(&mut self, table: &str, name: &str) -> Result<()> {
        if name.trim().is_empty() || name == ROW_COLUMN {
            return Err(sink_err(table, format!("invalid column name '{name}'")));
        }
        self.conn
            .execute_batch(&format!(
                "ALTER TABLE {} ADD COLUMN {} TEXT",
                quote_ident(table),
                quote_ident(name)
            ))
            .map_err(|e| sink_err(table, e))?;
        Ok(())
    }

    fn append_rows(&mut self, table: &str, rows: &[Vec<String>]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let header = self.header_row(table)?;
        let sql = if header.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table))
        } else {
            let cols: Vec<String> = header.iter().map(|c| quote_ident(c)).collect();
            let slots: Vec<String> = (1..=header.len()).map(|i| format!("?{i}")).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(table),
                cols.join(", "),
                slots.join(", ")
            )
        };

        let tx = self.conn.transaction().map_err(|e| sink_err(table, e))?;
        {
            let mut stmt = tx.prepare(&sql).map_err(|e| sink_err(table, e))?;
            for row in rows {
                if row.len() > header.len() {
                    return Err(sink_err(
                        table,
                        format!("row has {} values but the header has {} columns", row.len(), header.len()),
                    ));
                }
                let padded = row
                    .iter()
                    .map(String::as_str)
                    .chain(std::iter::repeat("").take(header.len() - row.len()));
                if header.is_empty() {
                    stmt.execute([]).map_err(|e| sink_err(table, e))?;
                } else {
                    stmt.execute(params_from_iter(padded))
                        .map_err(|e| sink_err(table, e))?;
                }
            }
        }
        tx.commit().map_err(|e| sink_err(table, e))?;
        Ok(())
    }

    fn read_rows(&self, table: &str) -> Result<Vec<Vec<String>>> {
        let header = self.header_row(table)?;
        if header.is_empty() {
            let count = self.row_count(table)?;
            return Ok(vec![Vec::new(); count]);
        }
        let cols: Vec<String> = header.iter().map(|c| quote_ident(c)).collect();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY {ROW_COLUMN}",
            cols.join(", "),
            quote_ident(table)
        ))?;
        let width = header.len();
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get::<_, Option<String>>(i).map(Option::unwrap_or_default))
                    .collect::<rusqlite::Result<Vec<String>>>()
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn table_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn row_count(&self, table: &str) -> Result<usize> {
        self.require(table)?;
        let count: i64 = self.conn.query_row(
            &format!("SELECT count(*) FROM {}", quote_ident(table)),
            [],
            |r| r.get(0),
        )?;
        Ok(count as usize)
    }
}
