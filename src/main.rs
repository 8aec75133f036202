mod buffer;
mod cli;
mod db;
mod error;
mod extractor;
mod fmt;
mod mail;
mod models;
mod pattern_index;
mod rules;
mod scanner;
mod schema;
mod settings;
mod sink;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, RulesCommands};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("TXNSCAN_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir, mail_dir } => cli::init::run(data_dir, mail_dir),
        Commands::Rules { command } => match command {
            RulesCommands::Add {
                bank,
                subject,
                sender,
                regex,
                groups,
            } => cli::rules::add(&bank, &subject, &sender, &regex, &groups),
            RulesCommands::List => cli::rules::list(),
            RulesCommands::Check => cli::rules::check(),
        },
        Commands::Scan {
            mail_dir,
            query,
            page_size,
            batch_size,
            archive,
        } => cli::scan::run(cli::scan::ScanArgs {
            mail_dir,
            query,
            page_size,
            batch_size,
            archive,
        }),
        Commands::Tables => cli::tables::list(),
        Commands::Show { table, limit } => cli::tables::show(&table, limit),
        Commands::Export { table, output } => cli::export::run(&table, output),
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        if e.is_configuration() {
            eprintln!("Fix the Rules table (see `txnscan rules check`) and run again.");
        }
        std::process::exit(1);
    }
}
