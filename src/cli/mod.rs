pub mod export;
pub mod init;
pub mod rules;
pub mod scan;
pub mod status;
pub mod tables;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "txnscan", about = "Scan a mailbox for bank transaction alerts and file them into tables.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and create the rules table.
    Init {
        /// Path for txnscan data (default: ~/Documents/txnscan)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Directory of .eml files to scan (default: <data-dir>/inbox)
        #[arg(long = "mail-dir")]
        mail_dir: Option<String>,
    },
    /// Manage extraction rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Scan the mailbox and file every message into a table.
    Scan {
        /// Directory of .eml files (overrides settings)
        #[arg(long = "mail-dir")]
        mail_dir: Option<String>,
        /// Search query, e.g. 'from:bank.test after:2025-01-01'
        #[arg(long)]
        query: Option<String>,
        /// Threads fetched per page
        #[arg(long = "page-size")]
        page_size: Option<usize>,
        /// Rows buffered per table before a write
        #[arg(long = "batch-size")]
        batch_size: Option<usize>,
        /// Move processed messages into <mail-dir>/processed after a clean run
        #[arg(long)]
        archive: bool,
    },
    /// List tables with their row counts.
    Tables,
    /// Print the rows of a table.
    Show {
        /// Table name, e.g. a bank name or 'Unrecognized'
        table: String,
        /// Show only the last N rows
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Export a table to CSV.
    Export {
        /// Table name
        table: String,
        /// Output path (default: <data_dir>/exports/<table>-YYYY-MM-DD.csv)
        #[arg(long)]
        output: Option<String>,
    },
    /// Show settings and database summary.
    Status,
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// Append an extraction rule. Later rules have lower priority.
    Add {
        /// Bank name; matched rows go to a table of this name
        #[arg(long)]
        bank: String,
        /// Subject line, or a value starting with '/' for a wildcard rule
        #[arg(long, default_value = "")]
        subject: String,
        /// Sender address, or a value starting with '/' for a wildcard rule
        #[arg(long, default_value = "")]
        sender: String,
        /// Body regex; '.' also matches newlines
        #[arg(long)]
        regex: String,
        /// Comma-separated names for the capture groups
        #[arg(long, default_value = "")]
        groups: String,
    },
    /// List rules in priority order.
    List,
    /// Compile every rule and show how they are bucketed.
    Check,
}
