//! MySQL data store for table-sync
//!
//! Implements the `copy-core` store contract on top of `mysql_async`:
//! structure via `SHOW CREATE TABLE`, server-side export with
//! `SELECT ... INTO OUTFILE`, import with `LOAD DATA INFILE`, and chunked
//! hash-keyed deletes. Each table pipeline gets its own connection from a
//! shared pool.

mod client;
pub mod sql;
mod store;
pub mod testing;

pub use client::{MySqlConnector, MySqlEndpoint, TrackingColumns};
pub use store::MySqlStore;
