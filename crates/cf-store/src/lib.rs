//! DuckDB store for Costflow.
//!
//! Owns the `cf` schema: the dimension registry (units, cost types,
//! periods), the fact table with its audit log, import runs with their
//! validation errors and quality reports, and the read-model views.
//! The database lives at `target/costflow.duckdb` unless configured
//! otherwise.

pub mod audit;
pub mod connection;
pub mod ddl;
pub mod dimensions;
pub mod error;
pub mod errors;
pub mod facts;
pub mod input;
pub mod migration;
pub mod quality;
pub mod query;
pub(crate) mod row_helpers;
pub mod runs;

pub use audit::{AuditEntry, AuditOperation};
pub use connection::StatsDb;
pub use dimensions::DimensionIds;
pub use error::{StoreError, StoreResult};
pub use facts::{FactWrite, WriteOutcome};
pub use runs::ImportRun;
