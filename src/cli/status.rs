use crate::db::{db_path, open_sink};
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::rules::RULES_TABLE;
use crate::settings::load_settings;
use crate::sink::TableSink;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let data_dir = settings.data_dir();
    let db = db_path(&data_dir);

    println!("Data dir:    {}", data_dir.display());
    println!("Mail dir:    {}", settings.mail_dir().display());
    println!("Database:    {}", db.display());
    println!(
        "Query:       {}",
        if settings.query.is_empty() { "(all mail)" } else { settings.query.as_str() }
    );
    println!("Page size:   {}", settings.page_size);
    println!("Batch size:  {}", settings.batch_size);
    println!("Subject key: {} chars", settings.subject_key_len);

    if db.exists() {
        println!("DB size:     {}", format_bytes(std::fs::metadata(&db)?.len()));
        let sink = open_sink(&data_dir)?;
        let tables = sink.table_names()?;
        let rules = if tables.iter().any(|t| t == RULES_TABLE) {
            sink.row_count(RULES_TABLE)?
        } else {
            0
        };
        println!();
        println!("Rules:       {rules}");
        println!("Tables:      {}", tables.len());
    } else {
        println!();
        println!("Database not found. Run `txnscan init` to set up.");
    }
    Ok(())
}
