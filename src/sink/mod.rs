//! Tabular store the scanner writes into.
//!
//! A table is a named, ordered header plus positional rows. Headers only grow
//! at the end, so a row shorter than the header is padded with empty cells.

pub mod sqlite;

pub use sqlite::SqliteSink;

use crate::error::Result;

pub trait TableSink {
    /// Create the table with an empty header if it does not exist yet.
    fn get_or_create(&mut self, table: &str) -> Result<()>;

    fn header_row(&self, table: &str) -> Result<Vec<String>>;

    fn append_header_column(&mut self, table: &str, name: &str) -> Result<()>;

    fn append_rows(&mut self, table: &str, rows: &[Vec<String>]) -> Result<()>;

    fn append_row(&mut self, table: &str, row: &[String]) -> Result<()> {
        self.append_rows(table, &[row.to_vec()])
    }

    /// All rows in insertion order, each as wide as the header.
    fn read_rows(&self, table: &str) -> Result<Vec<Vec<String>>>;

    fn table_names(&self) -> Result<Vec<String>>;

    fn row_count(&self, table: &str) -> Result<usize>;
}
