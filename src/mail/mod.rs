//! Where messages come from.

pub mod eml;
pub mod query;

pub use eml::EmlDirSource;
pub use query::MailQuery;

use crate::error::Result;
use crate::models::MailThread;

pub trait MailSource {
    /// One page of threads matching `query`. An empty page ends the scan.
    fn search(&mut self, query: &str, offset: usize, page_size: usize) -> Result<Vec<MailThread>>;

    /// Called once after a fully successful run with every processed id.
    fn mark_processed(&mut self, _message_ids: &[String]) -> Result<usize> {
        Ok(0)
    }
}
