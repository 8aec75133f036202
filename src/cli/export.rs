use std::path::{Path, PathBuf};

use crate::db::open_sink;
use crate::error::Result;
use crate::settings::get_data_dir;
use crate::sink::TableSink;

fn default_path(table: &str) -> PathBuf {
    let date = chrono::Local::now().format("%Y-%m-%d").to_string();
    let safe: String = table
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    get_data_dir().join("exports").join(format!("{safe}-{date}.csv"))
}

/// Write header and rows of `table` as CSV. Returns the row count.
pub fn write_csv(sink: &dyn TableSink, table: &str, path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let header = sink.header_row(table)?;
    let rows = sink.read_rows(table)?;
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&header)?;
    for row in &rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(rows.len())
}

pub fn run(table: &str, output: Option<String>) -> Result<()> {
    let sink = open_sink(&get_data_dir())?;
    let path = output.map(PathBuf::from).unwrap_or_else(|| default_path(table));
    let count = write_csv(&sink, table, &path)?;
    println!("Wrote {count} row(s) to {}", path.display());
    Ok(())
}
