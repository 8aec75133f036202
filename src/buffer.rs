use tracing::info;

use crate::error::Result;
use crate::sink::TableSink;

pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Positional rows waiting to be appended, grouped per table in the order
/// tables were first written to.
#[derive(Debug)]
pub struct RowBuffer {
    batch_size: usize,
    pending: Vec<(String, Vec<Vec<String>>)>,
    written: usize,
}

impl RowBuffer {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            pending: Vec::new(),
            written: 0,
        }
    }

    /// Buffer a row, flushing the table once it holds a full batch.
    pub fn add(&mut self, sink: &mut dyn TableSink, table: &str, row: Vec<String>) -> Result<()> {
        let pos = match self.pending.iter().position(|(t, _)| t == table) {
            Some(pos) => pos,
            None => {
                self.pending.push((table.to_string(), Vec::new()));
                self.pending.len() - 1
            }
        };
        self.pending[pos].1.push(row);
        if self.pending[pos].1.len() >= self.batch_size {
            self.flush_at(sink, pos)?;
        }
        Ok(())
    }

    fn flush_at(&mut self, sink: &mut dyn TableSink, pos: usize) -> Result<usize> {
        let (table, rows) = &mut self.pending[pos];
        if rows.is_empty() {
            return Ok(0);
        }
        let batch = std::mem::take(rows);
        sink.append_rows(table, &batch)?;
        info!(table = %table, rows = batch.len(), "Flushed batch");
        self.written += batch.len();
        Ok(batch.len())
    }

    /// Flush every non-empty table buffer. Returns the number of rows written.
    pub fn flush_all(&mut self, sink: &mut dyn TableSink) -> Result<usize> {
        let mut total = 0;
        for pos in 0..self.pending.len() {
            total += self.flush_at(sink, pos)?;
        }
        Ok(total)
    }

    pub fn pending_rows(&self) -> usize {
        self.pending.iter().map(|(_, rows)| rows.len()).sum()
    }

    /// Rows successfully appended so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_sink;
    use crate::sink::SqliteSink;

    fn test_sink() -> (tempfile::TempDir, SqliteSink) {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = open_sink(dir.path()).unwrap();
        for table in ["a", "b"] {
            sink.get_or_create(table).unwrap();
            sink.append_header_column(table, "v").unwrap();
        }
        (dir, sink)
    }

    fn row(v: &str) -> Vec<String> {
        vec![v.to_string()]
    }

    #[test]
    fn test_flushes_at_threshold() {
        let (_dir, mut sink) = test_sink();
        let mut buf = RowBuffer::new(3);
        buf.add(&mut sink, "a", row("1")).unwrap();
        buf.add(&mut sink, "a", row("2")).unwrap();
        assert_eq!(sink.row_count("a").unwrap(), 0);
        assert_eq!(buf.pending_rows(), 2);
        buf.add(&mut sink, "a", row("3")).unwrap();
        assert_eq!(sink.row_count("a").unwrap(), 3);
        assert_eq!(buf.pending_rows(), 0);
        assert_eq!(buf.written(), 3);
    }

    #[test]
    fn test_threshold_is_per_table() {
        let (_dir, mut sink) = test_sink();
        let mut buf = RowBuffer::new(2);
        buf.add(&mut sink, "a", row("1")).unwrap();
        buf.add(&mut sink, "b", row("1")).unwrap();
        assert_eq!(sink.row_count("a").unwrap(), 0);
        assert_eq!(sink.row_count("b").unwrap(), 0);
        buf.add(&mut sink, "b", row("2")).unwrap();
        assert_eq!(sink.row_count("b").unwrap(), 2);
        assert_eq!(sink.row_count("a").unwrap(), 0);
    }

    #[test]
    fn test_flush_all_writes_partial_batches() {
        let (_dir, mut sink) = test_sink();
        let mut buf = RowBuffer::new(10);
        buf.add(&mut sink, "a", row("1")).unwrap();
        buf.add(&mut sink, "b", row("2")).unwrap();
        buf.add(&mut sink, "b", row("3")).unwrap();
        assert_eq!(buf.flush_all(&mut sink).unwrap(), 3);
        assert_eq!(sink.row_count("a").unwrap(), 1);
        assert_eq!(sink.row_count("b").unwrap(), 2);
        assert_eq!(buf.flush_all(&mut sink).unwrap(), 0);
    }

    #[test]
    fn test_zero_batch_size_flushes_every_row() {
        let (_dir, mut sink) = test_sink();
        let mut buf = RowBuffer::new(0);
        assert_eq!(buf.batch_size(), 1);
        buf.add(&mut sink, "a", row("1")).unwrap();
        assert_eq!(sink.row_count("a").unwrap(), 1);
    }

    #[test]
    fn test_failed_flush_surfaces_error() {
        let (_dir, mut sink) = test_sink();
        let mut buf = RowBuffer::new(1);
        let err = buf
            .add(&mut sink, "a", vec!["too".to_string(), "wide".to_string()])
            .unwrap_err();
        assert!(matches!(err, crate::error::ScanError::SinkWrite { .. }));
        assert_eq!(buf.written(), 0);
    }
}
