//! cf-import - Import coordinator for Costflow
//!
//! An [`ImportCoordinator`] owns the lifecycle of one import run at a time:
//! it opens the run row, streams raw records through the validation engine,
//! writes accepted facts through the store, assesses batch quality, and
//! finalizes the run. [`source`] turns input files into raw record batches.

pub mod coordinator;
pub mod error;
pub mod source;

pub use coordinator::{ImportCoordinator, RunSummary};
pub use error::{ImportError, ImportResult};
pub use source::{load_source, ImportSource, InputFormat};
