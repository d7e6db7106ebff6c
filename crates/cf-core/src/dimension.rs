//! Dimension types: administrative units, cost types and reporting periods.
//!
//! Facts are keyed against these. Each dimension has a natural key (unit code,
//! cost-type code, year) that never changes once the row exists; the surrogate
//! ids are assigned by the store.

use crate::code_newtype::define_code;
use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

define_code! {
    /// GUS administrative unit code, the natural key of an [`AdministrativeUnit`].
    pub struct UnitCode;
}

define_code! {
    /// Cost type code, the natural key of a [`CostType`].
    pub struct CostTypeCode;
}

/// Territorial level of an administrative unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UnitLevel {
    /// The whole country
    Country,
    /// Voivodeship
    Province,
    /// Powiat
    District,
}

impl UnitLevel {
    /// Uppercase label used in the database and in input files.
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitLevel::Country => "COUNTRY",
            UnitLevel::Province => "PROVINCE",
            UnitLevel::District => "DISTRICT",
        }
    }

    /// Infer the level from a 7-digit GUS unit code.
    ///
    /// `0000000` and `00000xx` denote the country, `xx00000` a province and
    /// anything else a district.
    pub fn infer_from_code(code: &str) -> UnitLevel {
        if code.starts_with("00000") {
            UnitLevel::Country
        } else if code.ends_with("00000") {
            UnitLevel::Province
        } else {
            UnitLevel::District
        }
    }

    /// Map the statistics API `unit-level` query parameter to a level.
    pub fn from_api_level(level: u8) -> UnitLevel {
        match level {
            0 | 1 => UnitLevel::Country,
            2 => UnitLevel::Province,
            _ => UnitLevel::District,
        }
    }
}

impl fmt::Display for UnitLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitLevel {
    type Err = CoreError;

    /// Accepts the English labels and the Polish labels found in GUS exports.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "COUNTRY" | "POLSKA" => Ok(UnitLevel::Country),
            "PROVINCE" | "WOJEWODZTWO" => Ok(UnitLevel::Province),
            "DISTRICT" | "POWIAT" => Ok(UnitLevel::District),
            _ => Err(CoreError::UnknownVariant {
                kind: "unit level",
                value: s.to_string(),
            }),
        }
    }
}

/// Ownership category of a cost type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CostCategory {
    Public,
    Cooperative,
    Social,
    Private,
}

impl CostCategory {
    /// Every category, in reporting order.
    pub const ALL: [CostCategory; 4] = [
        CostCategory::Public,
        CostCategory::Cooperative,
        CostCategory::Social,
        CostCategory::Private,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CostCategory::Public => "PUBLIC",
            CostCategory::Cooperative => "COOPERATIVE",
            CostCategory::Social => "SOCIAL",
            CostCategory::Private => "PRIVATE",
        }
    }
}

impl fmt::Display for CostCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CostCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PUBLIC" | "PUBLICZNE" => Ok(CostCategory::Public),
            "COOPERATIVE" | "SPOLDZIELCZE" => Ok(CostCategory::Cooperative),
            "SOCIAL" | "SPOLECZNE" => Ok(CostCategory::Social),
            "PRIVATE" | "PRYWATNE" => Ok(CostCategory::Private),
            _ => Err(CoreError::UnknownVariant {
                kind: "cost category",
                value: s.to_string(),
            }),
        }
    }
}

/// Province code for a unit code: its first two digits followed by `00000`.
///
/// Returns `None` for country-level codes and codes too short to carry a
/// province prefix.
pub fn province_code_of(code: &str) -> Option<UnitCode> {
    if UnitLevel::infer_from_code(code) == UnitLevel::Country {
        return None;
    }
    let prefix = code.get(..2)?;
    UnitCode::try_new(format!("{prefix}00000"))
}

/// An administrative unit about to be registered.
///
/// Construction enforces the level/parent invariant: districts name their
/// province, the country has no parent, and a province's parent (if given at
/// all) can only be itself, which is normalised away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUnit {
    pub code: UnitCode,
    pub name: String,
    pub level: UnitLevel,
    pub parent_code: Option<UnitCode>,
}

impl NewUnit {
    /// Build a unit, checking level/parent consistency.
    pub fn new(
        code: UnitCode,
        name: impl Into<String>,
        level: UnitLevel,
        parent_code: Option<UnitCode>,
    ) -> CoreResult<Self> {
        let inconsistent = |reason: &str| CoreError::InconsistentUnit {
            code: code.to_string(),
            reason: reason.to_string(),
        };

        let parent_code = match (level, parent_code) {
            (UnitLevel::Country, Some(_)) => {
                return Err(inconsistent("a COUNTRY unit cannot have a parent province"))
            }
            (UnitLevel::Country, None) => None,
            (UnitLevel::Province, Some(p)) if p != code => {
                return Err(inconsistent(
                    "a PROVINCE unit cannot belong to another province",
                ))
            }
            (UnitLevel::Province, _) => None,
            (UnitLevel::District, None) => {
                return Err(inconsistent("a DISTRICT unit requires a parent province"))
            }
            (UnitLevel::District, Some(p)) if p == code => {
                return Err(inconsistent("a DISTRICT unit cannot be its own parent"))
            }
            (UnitLevel::District, Some(p)) => Some(p),
        };

        let name = name.into();
        Ok(Self {
            name: if name.trim().is_empty() {
                code.to_string()
            } else {
                name.trim().to_string()
            },
            code,
            level,
            parent_code,
        })
    }

    /// Derive a unit from whatever a raw record tells us about it.
    ///
    /// Missing level is inferred from the code, a missing district parent is
    /// derived from the code's province prefix and a missing name falls back
    /// to the code itself.
    pub fn derive(
        code: UnitCode,
        name: Option<&str>,
        level: Option<UnitLevel>,
        parent_code: Option<UnitCode>,
    ) -> CoreResult<Self> {
        let level = level.unwrap_or_else(|| UnitLevel::infer_from_code(&code));
        let parent_code = match level {
            UnitLevel::District => parent_code.or_else(|| province_code_of(&code)),
            _ => parent_code,
        };
        Self::new(code, name.unwrap_or_default(), level, parent_code)
    }
}

/// A registered administrative unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdministrativeUnit {
    pub id: i64,
    pub code: UnitCode,
    pub name: String,
    pub level: UnitLevel,
    pub parent_code: Option<UnitCode>,
}

/// A cost type about to be registered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCostType {
    pub code: CostTypeCode,
    pub name: String,
    pub category: CostCategory,
    #[serde(default)]
    pub description: Option<String>,
}

/// A registered cost type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostType {
    pub id: i64,
    pub code: CostTypeCode,
    pub name: String,
    pub category: CostCategory,
    pub description: Option<String>,
}

/// Years the period table accepts (`CHECK (year BETWEEN 1900 AND 2200)`).
pub const STORABLE_YEARS: RangeInclusive<i32> = 1900..=2200;

/// A reporting year
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub id: i64,
    pub year: i32,
    pub published_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
#[path = "dimension_test.rs"]
mod tests;
