//! Analysis results attached to a configuration
//!
//! Mirrors the result artifact the analyzer writes next to its report.
//! Unknown fields are ignored so newer analyzer versions still load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Parsed result artifact of one successful analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResults {
    /// When the analyzer finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
    /// Migration issues found in source files
    #[serde(default)]
    pub hints: Vec<Hint>,
    /// File-level classifications
    #[serde(default)]
    pub classifications: Vec<Classification>,
    /// Report location, filled in by the orchestrator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_path: Option<String>,
}

impl AnalysisResults {
    /// Total number of findings
    #[inline]
    #[must_use]
    pub fn finding_count(&self) -> usize {
        self.hints.len() + self.classifications.len()
    }

    /// Sum of story points across all findings
    #[must_use]
    pub fn effort(&self) -> u32 {
        self.hints
            .iter()
            .map(|h| h.effort)
            .chain(self.classifications.iter().map(|c| c.effort))
            .sum()
    }
}

/// A single migration issue at a source location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    /// Rule that produced the hint
    pub rule_id: String,
    /// Short title
    pub title: String,
    /// Affected file
    pub file: String,
    /// 1-based line, when known
    #[serde(default)]
    pub line: Option<u32>,
    /// Severity label (mandatory, optional, potential, ...)
    #[serde(default)]
    pub category: Option<String>,
    /// Story points
    #[serde(default)]
    pub effort: u32,
}

/// A classification applied to a whole file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    /// Rule that produced the classification
    pub rule_id: String,
    /// Short title
    pub title: String,
    /// Classified file
    pub file: String,
    /// Story points
    #[serde(default)]
    pub effort: u32,
}
