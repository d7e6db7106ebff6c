//! Batch quality assessment.
//!
//! The assessor looks at one import batch from two angles: the raw candidate
//! set (every record, rejected or not) for null and duplicate diagnostics,
//! and the final fact values the run wrote for outliers, negatives and the
//! distribution summary. It then applies [`QualityThresholds`] to decide
//! whether the batch passes.

use crate::record::{ErrorKind, FactKey, RawRecord};
use crate::validation::ValidationOutcome;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Quality gate thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QualityThresholds {
    /// Highest acceptable share of records without a value, in percent
    #[serde(default = "default_null_threshold_pct")]
    pub null_threshold_pct: f64,

    /// Statistical rule used to flag outliers
    #[serde(default)]
    pub outlier: OutlierConfig,

    /// Fail the gate when two records in a batch target the same fact key
    #[serde(default = "default_require_zero_duplicates")]
    pub require_zero_duplicates: bool,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            null_threshold_pct: default_null_threshold_pct(),
            outlier: OutlierConfig::default(),
            require_zero_duplicates: default_require_zero_duplicates(),
        }
    }
}

fn default_null_threshold_pct() -> f64 {
    5.0
}

fn default_require_zero_duplicates() -> bool {
    true
}

/// Outlier rule selection as written in the config file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "lowercase")]
pub enum OutlierConfig {
    /// Values more than `k` sample standard deviations from the mean
    StdDev { k: f64 },
    /// Values outside `[Q1 - m*IQR, Q3 + m*IQR]`
    Iqr { multiplier: f64 },
}

impl Default for OutlierConfig {
    fn default() -> Self {
        OutlierConfig::StdDev { k: 3.0 }
    }
}

impl OutlierConfig {
    /// Instantiate the configured rule.
    pub fn build(&self) -> Box<dyn OutlierRule> {
        match *self {
            OutlierConfig::StdDev { k } => Box::new(StdDevRule { k }),
            OutlierConfig::Iqr { multiplier } => Box::new(IqrRule { multiplier }),
        }
    }
}

/// A pluggable rule deciding which values of a batch are outliers.
pub trait OutlierRule: Send + Sync {
    /// Short human-readable description, stored with the report.
    fn describe(&self) -> String;

    /// Number of values the rule flags.
    fn count_outliers(&self, values: &[f64]) -> usize;
}

/// Flags values beyond `k` sample standard deviations from the mean.
#[derive(Debug, Clone, Copy)]
pub struct StdDevRule {
    pub k: f64,
}

impl OutlierRule for StdDevRule {
    fn describe(&self) -> String {
        format!("stddev(k={})", self.k)
    }

    fn count_outliers(&self, values: &[f64]) -> usize {
        let Some(mean) = mean(values) else {
            return 0;
        };
        let sd = sample_stddev(values, mean);
        if sd == 0.0 {
            return 0;
        }
        values
            .iter()
            .filter(|v| (*v - mean).abs() > self.k * sd)
            .count()
    }
}

/// Flags values outside the Tukey fences of the interquartile range.
#[derive(Debug, Clone, Copy)]
pub struct IqrRule {
    pub multiplier: f64,
}

impl OutlierRule for IqrRule {
    fn describe(&self) -> String {
        format!("iqr(multiplier={})", self.multiplier)
    }

    fn count_outliers(&self, values: &[f64]) -> usize {
        if values.len() < 4 {
            return 0;
        }
        let sorted = sorted_copy(values);
        let q1 = quantile(&sorted, 0.25);
        let q3 = quantile(&sorted, 0.75);
        let iqr = q3 - q1;
        let low = q1 - self.multiplier * iqr;
        let high = q3 + self.multiplier * iqr;
        sorted.iter().filter(|v| **v < low || **v > high).count()
    }
}

/// Distribution summary over the fact values of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionStats {
    pub min: Decimal,
    pub max: Decimal,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; 0 for a single value
    pub stddev: f64,
}

impl DistributionStats {
    /// Summarise `values`, or `None` when there are none.
    pub fn compute(values: &[Decimal]) -> Option<Self> {
        let min = *values.iter().min()?;
        let max = *values.iter().max()?;
        let floats = to_f64s(values);
        let mean = mean(&floats)?;
        let sorted = sorted_copy(&floats);
        Some(Self {
            min,
            max,
            mean,
            median: quantile(&sorted, 0.5),
            stddev: sample_stddev(&floats, mean),
        })
    }
}

/// One violated quality check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    /// Check identifier (`null_percentage`, `duplicate_count`, `domain_violations`)
    pub check: String,
    pub observed: f64,
    /// Human-readable bound, e.g. `<= 5`
    pub expected: String,
}

/// Outcome of assessing one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub total_rows: u64,
    pub null_count: u64,
    pub null_percentage: f64,
    pub duplicate_count: u64,
    pub outlier_count: u64,
    pub negative_count: u64,
    pub domain_violation_count: u64,
    pub distribution: Option<DistributionStats>,
    pub outlier_rule: String,
    pub validation_passed: bool,
    pub issues: Vec<QualityIssue>,
}

/// Computes a [`QualityReport`] for a batch.
pub struct QualityAssessor<'a> {
    thresholds: &'a QualityThresholds,
    rule: Box<dyn OutlierRule>,
}

impl<'a> QualityAssessor<'a> {
    /// Assessor using the outlier rule named in `thresholds`.
    pub fn new(thresholds: &'a QualityThresholds) -> Self {
        Self {
            thresholds,
            rule: thresholds.outlier.build(),
        }
    }

    /// Assessor with a caller-supplied outlier rule.
    pub fn with_rule(thresholds: &'a QualityThresholds, rule: Box<dyn OutlierRule>) -> Self {
        Self { thresholds, rule }
    }

    /// Assess a batch.
    ///
    /// `records` and `outcomes` are parallel slices (one outcome per raw
    /// record). `fact_values` holds the final value of every fact key the run
    /// wrote or confirmed.
    pub fn assess(
        &self,
        records: &[RawRecord],
        outcomes: &[ValidationOutcome],
        fact_values: &[Decimal],
    ) -> QualityReport {
        let total_rows = records.len() as u64;
        let null_count = records.iter().filter(|r| r.value_is_null()).count() as u64;
        let null_percentage = if total_rows == 0 {
            0.0
        } else {
            round2(null_count as f64 / total_rows as f64 * 100.0)
        };

        let duplicate_count = count_duplicate_keys(outcomes);
        let domain_violation_count = outcomes
            .iter()
            .filter(|o| o.error_kind() == Some(ErrorKind::DomainViolation))
            .count() as u64;

        let floats = to_f64s(fact_values);
        let outlier_count = self.rule.count_outliers(&floats) as u64;
        let negative_count = fact_values.iter().filter(|v| **v < Decimal::ZERO).count() as u64;

        let mut issues = Vec::new();
        if null_percentage > self.thresholds.null_threshold_pct {
            issues.push(QualityIssue {
                check: "null_percentage".to_string(),
                observed: null_percentage,
                expected: format!("<= {}", self.thresholds.null_threshold_pct),
            });
        }
        if self.thresholds.require_zero_duplicates && duplicate_count > 0 {
            issues.push(QualityIssue {
                check: "duplicate_count".to_string(),
                observed: duplicate_count as f64,
                expected: "== 0".to_string(),
            });
        }
        if domain_violation_count > 0 {
            issues.push(QualityIssue {
                check: "domain_violations".to_string(),
                observed: domain_violation_count as f64,
                expected: "== 0".to_string(),
            });
        }

        QualityReport {
            total_rows,
            null_count,
            null_percentage,
            duplicate_count,
            outlier_count,
            negative_count,
            domain_violation_count,
            distribution: DistributionStats::compute(fact_values),
            outlier_rule: self.rule.describe(),
            validation_passed: issues.is_empty(),
            issues,
        }
    }
}

/// Accepted candidates whose key was already claimed earlier in the batch.
fn count_duplicate_keys(outcomes: &[ValidationOutcome]) -> u64 {
    let mut seen: HashSet<&FactKey> = HashSet::new();
    let mut duplicates = 0;
    for candidate in outcomes.iter().filter_map(ValidationOutcome::candidate) {
        if !seen.insert(&candidate.key) {
            duplicates += 1;
        }
    }
    duplicates
}

fn to_f64s(values: &[Decimal]) -> Vec<f64> {
    values.iter().filter_map(|v| v.to_f64()).collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn sample_stddev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Linear-interpolation quantile of an already sorted, non-empty slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
#[path = "quality_test.rs"]
mod tests;
