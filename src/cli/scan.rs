use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::db::open_sink;
use crate::error::Result;
use crate::mail::EmlDirSource;
use crate::scanner::run_scan;
use crate::settings::{load_settings, shellexpand_path};

pub struct ScanArgs {
    pub mail_dir: Option<String>,
    pub query: Option<String>,
    pub page_size: Option<usize>,
    pub batch_size: Option<usize>,
    pub archive: bool,
}

pub fn run(args: ScanArgs) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = args.mail_dir {
        settings.mail_dir = shellexpand_path(&dir);
    }
    let mut options = settings.scan_options();
    if let Some(query) = args.query {
        options.query = query;
    }
    if let Some(n) = args.page_size {
        options.page_size = n;
    }
    if let Some(n) = args.batch_size {
        options.batch_size = n;
    }
    options.archive = args.archive;

    let mut sink = open_sink(&settings.data_dir())?;
    let mut source = EmlDirSource::new(settings.mail_dir());
    let report = run_scan(&mut source, &mut sink, options)?;

    let mut table = Table::new();
    table.set_header(vec!["Table", "Rows"]);
    for (name, count) in &report.per_table {
        table.add_row(vec![Cell::new(name), Cell::new(count)]);
    }
    if !report.per_table.is_empty() {
        println!("{table}");
    }
    println!(
        "{} messages: {} matched, {} recognized, {} unrecognized",
        report.messages,
        report.matched.to_string().green(),
        report.recognized,
        if report.unrecognized > 0 {
            report.unrecognized.to_string().yellow()
        } else {
            report.unrecognized.to_string().normal()
        },
    );
    println!("{} rows written", report.rows_written);
    if args.archive {
        println!("Archived {} message(s)", report.archived);
    }
    Ok(())
}
