//! Data access port trait.

use crate::domain::error::BarsignalError;
use crate::domain::table::Table;

pub trait DataPort {
    /// Load the table stored under `source`, rows in time order.
    fn fetch_table(&self, source: &str) -> Result<Table, BarsignalError>;

    fn list_sources(&self) -> Result<Vec<String>, BarsignalError>;
}
