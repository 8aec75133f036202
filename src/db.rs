use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::error::Result;
use crate::rules::ensure_rules_table;
use crate::sink::SqliteSink;

pub const DB_FILE: &str = "txnscan.db";

pub fn db_path(data_dir: &Path) -> PathBuf {
    data_dir.join(DB_FILE)
}

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn open_sink(data_dir: &Path) -> Result<SqliteSink> {
    Ok(SqliteSink::new(get_connection(&db_path(data_dir))?))
}

/// Create the rules table. Output tables appear on first write.
pub fn init_db(sink: &mut SqliteSink) -> Result<()> {
    ensure_rules_table(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{RULES_TABLE, RULE_COLUMNS};
    use crate::sink::TableSink;

    fn test_sink() -> (tempfile::TempDir, SqliteSink) {
        let dir = tempfile::tempdir().unwrap();
        let sink = open_sink(dir.path()).unwrap();
        (dir, sink)
    }

    #[test]
    fn test_init_db_creates_rules_table() {
        let (_dir, mut sink) = test_sink();
        init_db(&mut sink).unwrap();
        assert_eq!(sink.header_row(RULES_TABLE).unwrap(), RULE_COLUMNS);
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, mut sink) = test_sink();
        init_db(&mut sink).unwrap();
        init_db(&mut sink).unwrap();
        assert_eq!(sink.header_row(RULES_TABLE).unwrap().len(), RULE_COLUMNS.len());
    }

    #[test]
    fn test_db_lives_in_data_dir() {
        let (dir, _sink) = test_sink();
        assert!(dir.path().join(DB_FILE).exists());
    }
}
