//! Command implementations

pub(crate) mod audit;
pub(crate) mod common;
pub(crate) mod errors;
pub(crate) mod import;
pub(crate) mod init;
pub(crate) mod recover;
pub(crate) mod reference;
pub(crate) mod report;
pub(crate) mod runs;
pub(crate) mod view;
