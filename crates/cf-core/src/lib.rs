//! cf-core - Core library for Costflow
//!
//! This crate provides the domain types (administrative units, cost types,
//! periods, raw records), configuration parsing, the record validation
//! engine, the batch quality assessor, and the GUS payload transform used by
//! every other Costflow component. Nothing in here touches the database.

pub mod checksum;
mod code_newtype;
pub mod config;
pub mod dimension;
pub mod error;
pub mod quality;
pub mod record;
pub mod reference;
pub mod run;
pub(crate) mod serde_helpers;
pub mod transform;
pub mod validation;

pub use checksum::{compute_checksum, records_checksum};
pub use config::Config;
pub use dimension::{
    AdministrativeUnit, CostCategory, CostType, CostTypeCode, NewCostType, NewUnit, Period,
    UnitCode, UnitLevel, STORABLE_YEARS,
};
pub use error::{CoreError, CoreResult};
pub use quality::{
    DistributionStats, IqrRule, OutlierConfig, OutlierRule, QualityAssessor, QualityIssue,
    QualityReport, QualityThresholds, StdDevRule,
};
pub use record::{ErrorKind, FactCandidate, FactKey, RawRecord, RecordError};
pub use reference::ReferenceData;
pub use run::{RunCounts, RunStatus};
pub use transform::{map_variable, transform_payload, GusSeries, GusValue, TransformOutput};
pub use validation::{
    ReferenceLookup, ReferenceSnapshot, ValidationOutcome, ValidationRules, Validator,
};
