use comfy_table::{Cell, Table};

use crate::db::open_sink;
use crate::error::Result;
use crate::fmt::truncate;
use crate::settings::get_data_dir;
use crate::sink::TableSink;

pub fn list() -> Result<()> {
    let sink = open_sink(&get_data_dir())?;
    let mut table = Table::new();
    table.set_header(vec!["Table", "Columns", "Rows"]);
    for name in sink.table_names()? {
        table.add_row(vec![
            Cell::new(&name),
            Cell::new(sink.header_row(&name)?.len()),
            Cell::new(sink.row_count(&name)?),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn show(name: &str, limit: usize) -> Result<()> {
    let sink = open_sink(&get_data_dir())?;
    let header = sink.header_row(name)?;
    let rows = sink.read_rows(name)?;
    let skip = rows.len().saturating_sub(limit);

    let mut table = Table::new();
    table.set_header(header);
    for row in rows.iter().skip(skip) {
        table.add_row(row.iter().map(|v| Cell::new(truncate(v, 40))));
    }
    println!("{name}\n{table}");
    if skip > 0 {
        println!("({skip} earlier row(s) not shown)");
    }
    Ok(())
}
