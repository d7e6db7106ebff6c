//! Read-model queries.
//!
//! - [`reports`] - Typed accessors for the `cf.v_*` views, top movers,
//!   province anomalies and summary statistics
//! - [`adhoc`] - Untyped listing of a read model, for printing

pub mod adhoc;
pub mod reports;

pub use adhoc::{read_model, QueryResult, READ_MODELS};
pub use reports::{
    cost_structure, costs_full, latest_import, province_anomalies, province_costs, summary_stats,
    top_movers, yearly_trend, CostRow, LatestImport, MoverRow, ProvinceAnomalies,
    ProvinceChangeRow, ProvinceCostRow, StructureRow, SummaryStats, TrendRow,
};
