//! Convert coverage warnings into review messages anchored to diff lines.

use std::path::Path;

use crate::analyzer::{self, AnalyzerOptions};
use crate::changeset::{absolutize, ChangeSet};
use crate::model::{CoverageWarning, ReviewMessage, Severity};

const DEFAULT_LEVEL: Severity = Severity::Warning;

/// Translates the analyzer's warnings for one review run.
///
/// Holds the analyzer options the host constructed; coverage and diff data
/// are read-only inputs, so translation is pure and idempotent per run.
#[derive(Debug, Clone, Default)]
pub struct WarningTranslator {
    options: AnalyzerOptions,
}

impl WarningTranslator {
    #[must_use]
    pub fn new(options: AnalyzerOptions) -> Self {
        Self { options }
    }

    /// Produce one review message per under-tested code unit touching the
    /// change set.
    ///
    /// Returns an empty sequence immediately when the change set has no
    /// patches (the analyzer is never invoked). When the coverage report
    /// cannot be opened or read, emits one diagnostic on the error channel
    /// and degrades to an empty sequence instead of failing the review.
    #[must_use]
    pub fn run(&self, changeset: &ChangeSet) -> Vec<ReviewMessage> {
        if !changeset.has_patches() {
            return Vec::new();
        }

        match analyzer::build(changeset, &self.options) {
            Ok(warnings) => warnings
                .iter()
                .map(|warning| self.translate_one(warning, changeset))
                .collect(),
            Err(e) => {
                eprintln!("Warning: could not read coverage report: {e}");
                Vec::new()
            }
        }
    }

    /// Convert one coverage warning into a review message.
    ///
    /// The anchor is the diff position of the unit's first line; when that
    /// line was not part of any shown hunk the message is still emitted,
    /// unanchored.
    #[must_use]
    pub fn translate_one(
        &self,
        warning: &CoverageWarning,
        changeset: &ChangeSet,
    ) -> ReviewMessage {
        let untested = warning.untested_lines();
        let plural = if untested.len() > 1 { "s" } else { "" };
        let lines = untested
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let text = format!(
            "{} {} missing test{plural} for line{plural} {} (coverage: {})",
            warning.node_kind, warning.node_name, lines, warning.coverage_fraction
        );

        let key = absolutize(Path::new(&warning.file_path), &self.options.root());
        let line = changeset.resolve(&key, warning.first_line);

        ReviewMessage {
            file_path: warning.file_path.clone(),
            line,
            severity: DEFAULT_LEVEL,
            text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeKind;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn translator() -> WarningTranslator {
        WarningTranslator::new(AnalyzerOptions {
            root: Some(PathBuf::from("/repo")),
            ..Default::default()
        })
    }

    fn warning(coverage: &[(u32, u64)], fraction: f64) -> CoverageWarning {
        CoverageWarning {
            file_path: "src/main.rs".to_string(),
            node_kind: NodeKind::Method,
            node_name: "foo".to_string(),
            first_line: 10,
            coverage: coverage.iter().copied().collect::<BTreeMap<_, _>>(),
            coverage_fraction: fraction,
        }
    }

    fn changeset() -> ChangeSet {
        // src/main.rs: context at 8-9, additions at 10, 11, 13.
        let diff = include_str!("../tests/fixtures/diffs/modified_file.diff");
        ChangeSet::from_diff(diff, Path::new("/repo"))
    }

    #[test]
    fn test_plural_message_for_multiple_untested_lines() {
        let message = translator().translate_one(
            &warning(&[(10, 1), (11, 0), (12, 0)], 0.33),
            &changeset(),
        );
        assert_eq!(
            message.text,
            "method foo missing tests for lines 11, 12 (coverage: 0.33)"
        );
        // Line 10 is an added line at diff position 3.
        assert_eq!(message.line, Some(3));
        assert_eq!(message.severity, Severity::Warning);
        assert_eq!(message.file_path, "src/main.rs");
    }

    #[test]
    fn test_singular_message_for_one_untested_line() {
        let message = translator().translate_one(&warning(&[(10, 1), (11, 0)], 0.5), &changeset());
        assert_eq!(
            message.text,
            "method foo missing test for line 11 (coverage: 0.5)"
        );
    }

    #[test]
    fn test_untested_lines_listed_ascending() {
        // BTreeMap ordering, not insertion order, drives the listing.
        let mut coverage = BTreeMap::new();
        coverage.insert(30, 0);
        coverage.insert(12, 0);
        coverage.insert(21, 0);
        coverage.insert(10, 1);
        let warning = CoverageWarning {
            file_path: "src/main.rs".to_string(),
            node_kind: NodeKind::Function,
            node_name: "bar".to_string(),
            first_line: 10,
            coverage,
            coverage_fraction: 0.25,
        };
        let message = translator().translate_one(&warning, &changeset());
        assert_eq!(
            message.text,
            "function bar missing tests for lines 12, 21, 30 (coverage: 0.25)"
        );
    }

    #[test]
    fn test_unresolved_anchor_still_emits_message() {
        let mut w = warning(&[(10, 1), (11, 0)], 0.5);
        // Line 99 is not part of any hunk.
        w.first_line = 99;
        let message = translator().translate_one(&w, &changeset());
        assert_eq!(message.line, None);
        assert_eq!(message.file_path, "src/main.rs");
        assert!(message.text.contains("missing test for line 11"));
    }

    #[test]
    fn test_translation_is_idempotent() {
        let w = warning(&[(10, 1), (11, 0), (12, 0)], 0.33);
        let changeset = changeset();
        let translator = translator();
        assert_eq!(
            translator.translate_one(&w, &changeset),
            translator.translate_one(&w, &changeset)
        );
    }

    #[test]
    fn test_run_returns_empty_for_changeset_without_patches() {
        // The report path points at nothing; with zero patches the analyzer
        // is never consulted, so this stays silent and empty.
        let translator = WarningTranslator::new(AnalyzerOptions {
            report: Some(PathBuf::from("/definitely/not/here.lcov")),
            root: Some(PathBuf::from("/repo")),
            ..Default::default()
        });
        let empty = ChangeSet::from_diff("", Path::new("/repo"));
        assert!(translator.run(&empty).is_empty());
    }

    #[test]
    fn test_run_degrades_to_empty_when_report_is_missing() {
        let translator = WarningTranslator::new(AnalyzerOptions {
            report: Some(PathBuf::from("/definitely/not/here.lcov")),
            root: Some(PathBuf::from("/repo")),
            ..Default::default()
        });
        assert!(translator.run(&changeset()).is_empty());
    }
}
