//! Copy-decision and synchronization engine for table-sync
//!
//! Replicates a set of tables from a source store into a target store,
//! preferring a cheap hash-based incremental sync over a full re-copy
//! whenever that is safe.
//!
//! # Architecture
//!
//! ```text
//! RunCoordinator            (coordinator.rs, one task per worker)
//!    │
//!    └── TableCopier        (orchestrator.rs, per-table state machine)
//!           ├── consistency checks   (consistency.rs)
//!           ├── incremental sync     (incremental.rs)
//!           └── full copy            (full.rs)
//!                  └── BatchExecutor (batch.rs)
//! ```
//!
//! The engine never talks to a database directly. Everything it needs is
//! expressed through the [`DataStore`], [`StoreConnector`] and
//! [`RemoteFileTransfer`] traits, so concrete stores (MySQL in
//! `copy-mysql-store`, the in-memory fake in [`testing`]) are swapped in at
//! the edges.

pub mod artifact;
pub mod batch;
pub mod consistency;
pub mod coordinator;
mod error;
pub mod full;
pub mod incremental;
mod options;
pub mod orchestrator;
pub mod report;
pub mod store;
pub mod testing;
mod types;

pub use batch::BatchExecutor;
pub use coordinator::{dedupe_tables, RunCoordinator};
pub use error::{CopyError, Precondition};
pub use options::{CopyOptions, DEFAULT_BATCH_SIZE, DEFAULT_MAX_DIVERGENCE};
pub use orchestrator::TableCopier;
pub use report::{CopyOutcome, RunReport};
pub use store::{DataStore, RemoteFileTransfer, StoreConnector};
pub use types::{LastModified, RowHash, RowHashSet, SchemaDescriptor, TableName, ValidityVerdict};
