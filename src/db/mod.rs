//! SQLite-backed persistence.
//!
//! `sqlite` owns the connection, schema, and auth sessions; `tables` extends
//! [`Database`] with one method group per table; `cache` fronts hot settings
//! reads.

pub mod cache;
pub mod sqlite;
pub mod tables;

pub use sqlite::Database;
