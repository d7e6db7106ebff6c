//! Transform statistics API payloads into raw records.
//!
//! The GUS local data bank returns one series per (unit, variable):
//!
//! ```json
//! [{"id": "011212000000", "name": "MAZOWIECKIE", "variable_name": "zasoby gminne (komunalne)",
//!   "values": [{"year": "2023", "val": 1234.5}]}]
//! ```
//!
//! Each non-null value becomes one [`RawRecord`]. Series whose variable does
//! not map to a known cost type are skipped.

use crate::dimension::{province_code_of, CostCategory, UnitLevel};
use crate::error::CoreResult;
use crate::record::RawRecord;
use crate::serde_helpers::lenient_string;
use serde::{Deserialize, Serialize};

/// One unit/variable series from the statistics API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GusSeries {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub variable_name: Option<String>,

    #[serde(default)]
    pub values: Vec<GusValue>,
}

/// A single yearly observation in a [`GusSeries`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GusValue {
    #[serde(default, deserialize_with = "lenient_string")]
    pub year: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub val: Option<String>,
}

/// Cost type a GUS variable name maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableMapping {
    pub code: &'static str,
    pub name: &'static str,
    pub category: CostCategory,
}

/// Keyword table, matched in order against the normalised variable name.
const VARIABLE_MAPPINGS: &[(&[&str], VariableMapping)] = &[
    (
        &["gminne", "komunalne"],
        VariableMapping {
            code: "MUNICIPAL",
            name: "Municipal housing stock",
            category: CostCategory::Public,
        },
    ),
    (
        &["skarbu panstwa", "skarb panstwa"],
        VariableMapping {
            code: "STATE_TREASURY",
            name: "State Treasury housing stock",
            category: CostCategory::Public,
        },
    ),
    (
        &["spoldzielni", "spoldzielcz"],
        VariableMapping {
            code: "COOPERATIVE",
            name: "Housing cooperative stock",
            category: CostCategory::Cooperative,
        },
    ),
    (
        &["tbs", "budownictwa spolecznego"],
        VariableMapping {
            code: "SOCIAL_TBS",
            name: "Social housing association (TBS) stock",
            category: CostCategory::Social,
        },
    ),
    (
        &["wspolnot"],
        VariableMapping {
            code: "HOUSING_COMMUNITY",
            name: "Housing community stock",
            category: CostCategory::Private,
        },
    ),
    (
        &["innych podmiotow", "inne podmioty"],
        VariableMapping {
            code: "OTHER_ENTITIES",
            name: "Stock of other entities",
            category: CostCategory::Private,
        },
    ),
    (
        &["zakladow pracy", "zaklady pracy"],
        VariableMapping {
            code: "EMPLOYER",
            name: "Employer-owned housing stock",
            category: CostCategory::Private,
        },
    ),
];

/// Every cost type the transform can produce.
pub fn known_variable_mappings() -> impl Iterator<Item = &'static VariableMapping> {
    VARIABLE_MAPPINGS.iter().map(|(_, m)| m)
}

/// Lowercase and strip Polish diacritics.
pub fn normalize_diacritics(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'ą' | 'Ą' => 'a',
            'ć' | 'Ć' => 'c',
            'ę' | 'Ę' => 'e',
            'ł' | 'Ł' => 'l',
            'ń' | 'Ń' => 'n',
            'ó' | 'Ó' => 'o',
            'ś' | 'Ś' => 's',
            'ź' | 'Ź' | 'ż' | 'Ż' => 'z',
            other => other,
        })
        .flat_map(char::to_lowercase)
        .collect()
}

/// Map a GUS variable name to a cost type by keyword.
pub fn map_variable(variable_name: &str) -> Option<VariableMapping> {
    let normalized = normalize_diacritics(variable_name);
    VARIABLE_MAPPINGS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| normalized.contains(k)))
        .map(|(_, mapping)| *mapping)
}

/// Turn an API unit id (12 digits, sometimes dashed) into a 7-digit code.
pub fn normalize_unit_id(id: &str) -> String {
    let digits: String = id.trim().chars().filter(|c| *c != '-').take(7).collect();
    format!("{digits:0>7}")
}

/// Records produced by [`transform_payload`] and what was dropped
#[derive(Debug, Clone, Default)]
pub struct TransformOutput {
    pub records: Vec<RawRecord>,
    pub skipped_null_values: usize,
    pub skipped_unmapped: usize,
}

/// Parse a payload file's text.
pub fn parse_payload(content: &str) -> CoreResult<Vec<GusSeries>> {
    Ok(serde_json::from_str(content)?)
}

/// Flatten API series into raw records.
///
/// `api_level` is the `unit-level` the payload was requested with; it fixes
/// the level of every unit in the payload.
pub fn transform_payload(series: &[GusSeries], api_level: u8) -> TransformOutput {
    let level = UnitLevel::from_api_level(api_level);
    let mut out = TransformOutput::default();

    for entry in series {
        let Some(id) = entry.id.as_deref() else {
            log::warn!("Skipping series without a unit id");
            out.skipped_unmapped += entry.values.len();
            continue;
        };
        let variable = entry.variable_name.as_deref().unwrap_or_default();
        let Some(mapping) = map_variable(variable) else {
            log::warn!("Unmapped GUS variable '{variable}', skipping {} values", entry.values.len());
            out.skipped_unmapped += entry.values.len();
            continue;
        };

        let unit_code = normalize_unit_id(id);
        let parent_code = match level {
            UnitLevel::District => province_code_of(&unit_code).map(|c| c.into_inner()),
            _ => None,
        };

        for value in &entry.values {
            let Some(val) = value.val.as_deref() else {
                out.skipped_null_values += 1;
                continue;
            };
            out.records.push(RawRecord {
                unit_code: Some(unit_code.clone()),
                unit_name: entry.name.clone(),
                unit_level: Some(level.as_str().to_string()),
                parent_code: parent_code.clone(),
                cost_type_code: Some(mapping.code.to_string()),
                cost_type_name: Some(variable.to_string()),
                category: Some(mapping.category.as_str().to_string()),
                year: value.year.clone(),
                value: Some(val.to_string()),
                ..Default::default()
            });
        }
    }

    log::debug!(
        "Transformed {} GUS values ({} null, {} unmapped)",
        out.records.len(),
        out.skipped_null_values,
        out.skipped_unmapped
    );
    out
}

#[cfg(test)]
#[path = "transform_test.rs"]
mod tests;
