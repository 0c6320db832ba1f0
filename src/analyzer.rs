//! Build coverage warnings for the code units touched by a change set.
//!
//! The analyzer reads a coverage report (LCOV or Cobertura, auto-detected),
//! derives code units from the report's function records, and emits one
//! [`CoverageWarning`] per unit that intersects the diff's added lines and
//! has at least one uncovered line.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::changeset::{absolutize, ChangeSet};
use crate::detect::{detect_format, Format};
use crate::error::{PatchcovError, Result};
use crate::model::{rate, CoverageData, CoverageWarning, FileCoverage, NodeKind};
use crate::parsers::cobertura::CoberturaParser;
use crate::parsers::lcov::LcovParser;
use crate::parsers::CoverageParser;

/// Report location used when the `lcov` option is unset.
pub const DEFAULT_REPORT_PATH: &str = "coverage/lcov.info";

/// Analyzer configuration, constructed once by the host and passed down.
#[derive(Debug, Clone, Default)]
pub struct AnalyzerOptions {
    /// Path to the coverage report (the `lcov` key).
    pub report: Option<PathBuf>,
    /// Syntax version hint for the analyzed sources (the `ruby-syntax`
    /// key). Accepted and currently unused: units are derived from the
    /// report's function records, not from source parse trees.
    pub syntax: Option<String>,
    /// Project root used to resolve relative file paths (the `path` key).
    pub root: Option<PathBuf>,
}

impl AnalyzerOptions {
    /// Build options from a flat key-value configuration. Recognized keys:
    /// `lcov`, `ruby-syntax`, `path`. Unset keys must be omitted from the
    /// map rather than passed with empty values.
    #[must_use]
    pub fn from_config(config: &BTreeMap<String, String>) -> Self {
        Self {
            report: config.get("lcov").map(PathBuf::from),
            syntax: config.get("ruby-syntax").cloned(),
            root: config.get("path").map(PathBuf::from),
        }
    }

    /// The project root: the `path` option, or the process working
    /// directory when unset.
    #[must_use]
    pub fn root(&self) -> PathBuf {
        self.root
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    /// Absolute path of the coverage report.
    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        let root = self.root();
        match &self.report {
            Some(path) => absolutize(path, &root),
            None => root.join(DEFAULT_REPORT_PATH),
        }
    }
}

/// Read the configured coverage report and build warnings for the changed
/// files in `changeset`. Fails with [`PatchcovError::ReportNotFound`] when
/// the report path does not exist.
pub fn build(changeset: &ChangeSet, options: &AnalyzerOptions) -> Result<Vec<CoverageWarning>> {
    let report_path = options.report_path();
    if !report_path.exists() {
        return Err(PatchcovError::ReportNotFound(
            report_path.display().to_string(),
        ));
    }
    let content = fs::read(&report_path)?;

    let format = detect_format(&report_path, &content).ok_or(PatchcovError::UnknownFormat)?;
    let data = parse_with_format(format, &content)?;

    Ok(warnings_for_data(&data, changeset, &options.root()))
}

fn parse_with_format(format: Format, content: &[u8]) -> Result<CoverageData> {
    match format {
        Format::Cobertura => CoberturaParser.parse(content),
        Format::Lcov => LcovParser.parse(content),
    }
}

/// Correlate parsed coverage data with the change set's added lines.
#[must_use]
pub fn warnings_for_data(
    data: &CoverageData,
    changeset: &ChangeSet,
    root: &Path,
) -> Vec<CoverageWarning> {
    let mut warnings = Vec::new();
    for file in &data.files {
        let key = absolutize(Path::new(&file.path), root);
        let Some(changed) = changeset.added_lines(&key) else {
            continue;
        };
        if changed.is_empty() {
            continue;
        }
        warnings.extend(file_warnings(file, changed));
    }
    warnings
}

/// Warnings for a single file given its added lines (ascending).
fn file_warnings(file: &FileCoverage, changed: &[u32]) -> Vec<CoverageWarning> {
    let line_hits: BTreeMap<u32, u64> = file
        .lines
        .iter()
        .map(|l| (l.line_number, l.hit_count))
        .collect();
    let last_instrumented = match line_hits.keys().next_back() {
        Some(&last) => last,
        None => return Vec::new(),
    };

    let units: Vec<(u32, Option<u32>, &str)> = file
        .functions
        .iter()
        .filter_map(|f| f.start_line.map(|start| (start, f.end_line, f.name.as_str())))
        .collect();

    let mut warnings = Vec::new();
    for (i, &(start, end_line, name)) in units.iter().enumerate() {
        // A unit runs through its recorded end line when the report has
        // one; otherwise to the line before the next unit's start, and for
        // the last unit through the file's last instrumented line.
        let end = end_line
            .or_else(|| {
                units
                    .get(i + 1)
                    .map(|&(next_start, _, _)| next_start.saturating_sub(1))
            })
            .unwrap_or(last_instrumented)
            .max(start);

        let coverage: BTreeMap<u32, u64> = line_hits
            .range(start..=end)
            .map(|(&ln, &hits)| (ln, hits))
            .collect();
        if coverage.is_empty() {
            continue;
        }

        let total = coverage.len() as u64;
        let covered = coverage.values().filter(|&&hits| hits > 0).count() as u64;
        if covered == total {
            continue; // Fully tested unit
        }
        if !intersects(changed, start, end) {
            continue; // Unit not touched by the diff
        }

        warnings.push(CoverageWarning {
            file_path: file.path.clone(),
            node_kind: node_kind(name),
            node_name: name.to_string(),
            first_line: start,
            coverage,
            coverage_fraction: round4(rate(covered, total)),
        });
    }
    warnings
}

/// True when any of the (ascending) changed lines falls inside [start, end].
fn intersects(changed: &[u32], start: u32, end: u32) -> bool {
    let idx = changed.partition_point(|&ln| ln < start);
    changed.get(idx).is_some_and(|&ln| ln <= end)
}

/// Ruby-style receiver separators mark instance/singleton methods; anything
/// else is reported as a plain function.
fn node_kind(name: &str) -> NodeKind {
    if name.contains('#') || name.contains('.') {
        NodeKind::Method
    } else {
        NodeKind::Function
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FunctionCoverage, LineCoverage};

    fn file_with(
        path: &str,
        lines: &[(u32, u64)],
        functions: &[(&str, u32, u64)],
    ) -> FileCoverage {
        FileCoverage {
            path: path.to_string(),
            lines: lines
                .iter()
                .map(|&(line_number, hit_count)| LineCoverage {
                    line_number,
                    hit_count,
                })
                .collect(),
            functions: functions
                .iter()
                .map(|&(name, start, hit_count)| FunctionCoverage {
                    name: name.to_string(),
                    start_line: Some(start),
                    end_line: None,
                    hit_count,
                })
                .collect(),
        }
    }

    #[test]
    fn test_options_from_config() {
        let config = BTreeMap::from([
            ("lcov".to_string(), "coverage/run.lcov".to_string()),
            ("path".to_string(), "/repo".to_string()),
        ]);
        let options = AnalyzerOptions::from_config(&config);
        assert_eq!(options.report, Some(PathBuf::from("coverage/run.lcov")));
        assert_eq!(options.syntax, None);
        assert_eq!(options.root, Some(PathBuf::from("/repo")));
        assert_eq!(
            options.report_path(),
            PathBuf::from("/repo/coverage/run.lcov")
        );
    }

    #[test]
    fn test_default_report_path() {
        let options = AnalyzerOptions {
            root: Some(PathBuf::from("/repo")),
            ..Default::default()
        };
        assert_eq!(
            options.report_path(),
            PathBuf::from("/repo/coverage/lcov.info")
        );
    }

    #[test]
    fn test_intersects() {
        assert!(intersects(&[5, 11], 10, 12));
        assert!(intersects(&[10], 10, 12));
        assert!(intersects(&[12], 10, 12));
        assert!(!intersects(&[9, 13], 10, 12));
        assert!(!intersects(&[], 10, 12));
    }

    #[test]
    fn test_file_warnings_touched_and_untested() {
        let file = file_with(
            "src/calc.rb",
            &[(10, 1), (11, 0), (12, 0), (14, 1), (15, 1)],
            &[("Calc#add", 10, 1), ("Calc#sub", 14, 1)],
        );

        // Diff touches line 11 only: one warning, for the first unit.
        let warnings = file_warnings(&file, &[11]);
        assert_eq!(warnings.len(), 1);
        let warning = &warnings[0];
        assert_eq!(warning.node_name, "Calc#add");
        assert_eq!(warning.node_kind, NodeKind::Method);
        assert_eq!(warning.first_line, 10);
        assert_eq!(
            warning.coverage,
            BTreeMap::from([(10, 1), (11, 0), (12, 0)])
        );
        assert_eq!(warning.coverage_fraction, 0.3333);
        assert_eq!(warning.untested_lines(), vec![11, 12]);
    }

    #[test]
    fn test_file_warnings_fully_covered_unit_skipped() {
        let file = file_with(
            "src/calc.rb",
            &[(10, 1), (11, 2), (14, 0)],
            &[("add", 10, 1), ("sub", 14, 0)],
        );

        // Both units touched, but only `sub` has an uncovered line.
        let warnings = file_warnings(&file, &[10, 14]);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].node_name, "sub");
        assert_eq!(warnings[0].node_kind, NodeKind::Function);
        assert_eq!(warnings[0].coverage_fraction, 0.0);
    }

    #[test]
    fn test_file_warnings_untouched_unit_skipped() {
        let file = file_with(
            "src/calc.rb",
            &[(10, 0), (14, 0)],
            &[("add", 10, 0), ("sub", 14, 0)],
        );
        let warnings = file_warnings(&file, &[14, 15]);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].node_name, "sub");
    }

    #[test]
    fn test_file_warnings_no_function_records() {
        let file = file_with("src/calc.rb", &[(1, 0), (2, 0)], &[]);
        assert!(file_warnings(&file, &[1, 2]).is_empty());
    }

    #[test]
    fn test_warnings_for_data_resolves_relative_paths() {
        let data = CoverageData {
            files: vec![file_with(
                "src/main.rs",
                &[(8, 1), (9, 1), (10, 0), (11, 0), (13, 0), (14, 1)],
                &[("main", 8, 1)],
            )],
        };
        let diff = include_str!("../tests/fixtures/diffs/modified_file.diff");
        let changeset = ChangeSet::from_diff(diff, Path::new("/repo"));

        let warnings = warnings_for_data(&data, &changeset, Path::new("/repo"));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].file_path, "src/main.rs");
        assert_eq!(warnings[0].untested_lines(), vec![10, 11, 13]);

        // A different root misses the change set keys entirely.
        assert!(warnings_for_data(&data, &changeset, Path::new("/elsewhere")).is_empty());
    }
}
