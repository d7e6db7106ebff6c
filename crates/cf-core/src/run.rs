//! Import run status and counters.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of an import run
///
/// A run starts `Running` and moves exactly once to one of the terminal
/// states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
    Partial,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Success => "SUCCESS",
            RunStatus::Failed => "FAILED",
            RunStatus::Partial => "PARTIAL",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RUNNING" => Ok(RunStatus::Running),
            "SUCCESS" => Ok(RunStatus::Success),
            "FAILED" => Ok(RunStatus::Failed),
            "PARTIAL" => Ok(RunStatus::Partial),
            _ => Err(CoreError::UnknownVariant {
                kind: "run status",
                value: s.to_string(),
            }),
        }
    }
}

/// Per-run record counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub processed: u64,
    pub inserted: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub failed: u64,
}

impl RunCounts {
    /// Records whose fact was written or confirmed by the run.
    pub fn written(&self) -> u64 {
        self.inserted + self.updated + self.unchanged
    }

    /// Terminal status for a run that processed its whole stream.
    ///
    /// An empty batch succeeds. A batch where every record failed is a
    /// failure, any mix of failures and writes is partial.
    pub fn decide(&self) -> RunStatus {
        if self.failed == 0 {
            RunStatus::Success
        } else if self.written() > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Failed
        }
    }
}

#[cfg(test)]
#[path = "run_test.rs"]
mod tests;
