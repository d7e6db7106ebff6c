//! Reference data files (`units:` / `cost_types:`).
//!
//! ```yaml
//! units:
//!   - code: "1400000"
//!     name: MAZOWIECKIE
//!     level: PROVINCE
//!   - code: "1465011"
//!     name: Warszawa
//!     parent_code: "1400000"
//! cost_types:
//!   - code: MUNICIPAL
//!     name: Municipal housing stock
//!     category: PUBLIC
//! ```

use crate::dimension::{CostCategory, CostTypeCode, NewCostType, NewUnit, UnitCode, UnitLevel};
use crate::error::{CoreError, CoreResult};
use crate::transform::known_variable_mappings;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReferenceFile {
    #[serde(default)]
    units: Vec<UnitEntry>,
    #[serde(default)]
    cost_types: Vec<CostTypeEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UnitEntry {
    code: UnitCode,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    parent_code: Option<UnitCode>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CostTypeEntry {
    code: CostTypeCode,
    name: String,
    category: String,
    #[serde(default)]
    description: Option<String>,
}

/// Validated reference data ready to be registered
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceData {
    pub units: Vec<NewUnit>,
    pub cost_types: Vec<NewCostType>,
}

impl ReferenceData {
    /// Load and validate a reference file.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse reference YAML. `origin` names the source in error messages.
    pub fn parse(content: &str, origin: &str) -> CoreResult<Self> {
        let invalid = |message: String| CoreError::ReferenceInvalid {
            path: origin.to_string(),
            message,
        };
        let file: ReferenceFile =
            serde_yaml::from_str(content).map_err(|e| invalid(e.to_string()))?;

        let mut units = Vec::with_capacity(file.units.len());
        for entry in file.units {
            let level = entry
                .level
                .as_deref()
                .map(str::parse::<UnitLevel>)
                .transpose()
                .map_err(|e| invalid(e.to_string()))?;
            let unit = NewUnit::derive(entry.code, entry.name.as_deref(), level, entry.parent_code)
                .map_err(|e| invalid(e.to_string()))?;
            units.push(unit);
        }

        let mut cost_types = Vec::with_capacity(file.cost_types.len());
        for entry in file.cost_types {
            let category: CostCategory =
                entry.category.parse().map_err(|e: CoreError| invalid(e.to_string()))?;
            cost_types.push(NewCostType {
                code: entry.code,
                name: entry.name,
                category,
                description: entry.description,
            });
        }

        Ok(Self { units, cost_types })
    }

    /// The cost types produced by the GUS payload transform.
    pub fn standard_cost_types() -> Vec<NewCostType> {
        known_variable_mappings()
            .filter_map(|m| {
                Some(NewCostType {
                    code: CostTypeCode::try_new(m.code)?,
                    name: m.name.to_string(),
                    category: m.category,
                    description: None,
                })
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty() && self.cost_types.is_empty()
    }
}

#[cfg(test)]
#[path = "reference_test.rs"]
mod tests;
