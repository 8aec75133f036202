use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A rule row that cannot be compiled. Raised before any message is read.
    #[error("Rule row {row}: {reason}")]
    Configuration { row: usize, reason: String },

    #[error("Rules table: {0}")]
    RulesTable(String),

    #[error("Write to table '{table}' failed: {reason}")]
    SinkWrite { table: String, reason: String },

    #[error("Mail source error: {0}")]
    MailSource(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Settings error: {0}")]
    Settings(String),
}

impl ScanError {
    pub fn config(row: usize, reason: impl Into<String>) -> Self {
        Self::Configuration {
            row,
            reason: reason.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::RulesTable(_))
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
