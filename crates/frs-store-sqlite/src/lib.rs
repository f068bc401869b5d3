//! SQLite backend for the FRS warehouse loader.
//!
//! [`SqliteWarehouse`] owns the star schema and implements
//! [`frs_core::store::Warehouse`]; [`SqliteSource`] reads the operational
//! tables through [`frs_core::store::OperationalSource`]. Both wrap
//! [`tokio_rusqlite`] so database access runs on a dedicated thread without
//! blocking the async runtime.

mod encode;
mod query;
mod schema;
mod source;
mod warehouse;

pub mod error;

pub use error::{Error, Result};
pub use source::SqliteSource;
pub use warehouse::SqliteWarehouse;

#[cfg(test)]
mod tests;
