//! Uniform in-memory representation of coverage data, independent of any
//! specific report format, plus the review-facing types handed to the host.

use std::collections::BTreeMap;
use std::fmt;

/// Compute a coverage rate, returning 0.0 when the total is zero.
#[must_use]
pub fn rate(covered: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64
    }
}

/// A single line that was instrumentable.
#[derive(Debug, Clone)]
pub struct LineCoverage {
    pub line_number: u32,
    pub hit_count: u64,
}

/// A function/method that was instrumentable.
#[derive(Debug, Clone)]
pub struct FunctionCoverage {
    pub name: String,
    pub start_line: Option<u32>,
    pub end_line: Option<u32>,
    pub hit_count: u64,
}

/// Coverage data for a single source file.
#[derive(Debug, Clone, Default)]
pub struct FileCoverage {
    pub path: String,
    pub lines: Vec<LineCoverage>,
    pub functions: Vec<FunctionCoverage>,
}

impl FileCoverage {
    pub fn new(path: String) -> Self {
        Self {
            path,
            ..Default::default()
        }
    }
}

/// The complete result of parsing a single coverage report.
#[derive(Debug, Clone, Default)]
pub struct CoverageData {
    pub files: Vec<FileCoverage>,
}

impl CoverageData {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Category of a code unit identified by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Function,
    Method,
}

impl NodeKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Function => "function",
            NodeKind::Method => "method",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One under-tested code unit that touches changed lines.
///
/// Produced by the analyzer, consumed read-only by the translator.
#[derive(Debug, Clone)]
pub struct CoverageWarning {
    /// Source file path as recorded in the coverage report.
    pub file_path: String,
    pub node_kind: NodeKind,
    pub node_name: String,
    /// 1-based line where the unit begins.
    pub first_line: u32,
    /// Per-line hit counts for the instrumentable lines inside the unit,
    /// keyed by 1-based line number. Ordered ascending by construction.
    pub coverage: BTreeMap<u32, u64>,
    /// Covered/total over the unit's instrumentable lines, in 0.0–1.0.
    pub coverage_fraction: f64,
}

impl CoverageWarning {
    /// True when the line is instrumentable but was never executed.
    #[must_use]
    pub fn is_uncovered(&self, line_number: u32) -> bool {
        self.coverage.get(&line_number) == Some(&0)
    }

    /// Untested line numbers inside the unit, ascending.
    #[must_use]
    pub fn untested_lines(&self) -> Vec<u32> {
        self.coverage
            .keys()
            .copied()
            .filter(|&ln| self.is_uncovered(ln))
            .collect()
    }
}

/// Severity attached to a review message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.write_str("info"),
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// A single review comment handed to the host for rendering.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ReviewMessage {
    /// Source file path, as reported by the analyzer.
    pub file_path: String,
    /// Diff-relative anchor line, or `None` when the unit's first line was
    /// not part of any shown hunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub severity: Severity,
    pub text: String,
}
