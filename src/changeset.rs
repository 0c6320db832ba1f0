//! Parse a unified diff into a [`ChangeSet`]: the set of patches under
//! review, able to answer "is this file/line part of the diff, and at what
//! diff-relative position?".
//!
//! Positions follow the review-comment convention used by GitHub: within
//! each file, patch lines are counted 1-based starting after the file's
//! first hunk header, and subsequent hunk headers occupy a position of
//! their own. Added and context lines are addressable; deletions are not.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// Per-file view of the diff.
#[derive(Debug, Clone, Default)]
struct FilePatch {
    /// New-file line number -> diff-relative position.
    positions: HashMap<u32, u32>,
    /// Added line numbers in new-file numbering, ascending.
    added_lines: Vec<u32>,
}

/// The reviewed diff collection. Built once per run, read-only thereafter.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    files: HashMap<PathBuf, FilePatch>,
}

impl ChangeSet {
    /// Parse a unified diff (e.g. `git diff` output). File paths in the
    /// diff are keyed by their lexically-absolute form under `root`.
    #[must_use]
    pub fn from_diff(diff_text: &str, root: &Path) -> Self {
        let mut files: HashMap<PathBuf, FilePatch> = HashMap::new();
        let mut current_file: Option<PathBuf> = None;
        let mut in_hunk = false;
        let mut new_line_number: u32 = 0;
        let mut position: u32 = 0;

        for line in diff_text.lines() {
            if let Some(rest) = line.strip_prefix("+++ ") {
                in_hunk = false;
                position = 0;
                if rest == "/dev/null" {
                    current_file = None; // File was deleted
                } else {
                    // Strip common VCS prefixes: "b/" (default git), "a/"
                    // (some tools). Also handles --no-prefix diffs.
                    let path = rest
                        .strip_prefix("b/")
                        .or_else(|| rest.strip_prefix("a/"))
                        .unwrap_or(rest);
                    let key = absolutize(Path::new(path), root);
                    files.entry(key.clone()).or_default();
                    current_file = Some(key);
                }
            } else if line.starts_with("@@ ") {
                if current_file.is_some() {
                    if let Some(new_start) = parse_hunk_header(line) {
                        // The file's first hunk header is not a position;
                        // later ones are.
                        if in_hunk {
                            position += 1;
                        }
                        in_hunk = true;
                        new_line_number = new_start;
                    }
                }
            } else if line.starts_with("diff ") || line.starts_with("--- ") {
                // File boundary metadata between hunks.
                in_hunk = false;
            } else if in_hunk {
                let Some(patch) = current_file.as_ref().and_then(|f| files.get_mut(f)) else {
                    continue;
                };
                if line.starts_with('\\') {
                    // "\ No newline at end of file" — metadata, not a line
                } else if line.starts_with('+') {
                    position += 1;
                    patch.positions.insert(new_line_number, position);
                    patch.added_lines.push(new_line_number);
                    new_line_number += 1;
                } else if line.starts_with('-') {
                    // Deleted line occupies a position but is not addressable
                    position += 1;
                } else {
                    // Context line
                    position += 1;
                    patch.positions.insert(new_line_number, position);
                    new_line_number += 1;
                }
            }
        }

        Self { files }
    }

    /// True when the diff contained at least one patch.
    #[must_use]
    pub fn has_patches(&self) -> bool {
        !self.files.is_empty()
    }

    /// Map an absolute file path and a 1-based new-file line number to the
    /// diff-relative position, or `None` when the line was not part of any
    /// shown hunk. Deterministic for the lifetime of the ChangeSet.
    #[must_use]
    pub fn resolve(&self, path: &Path, line: u32) -> Option<u32> {
        self.files
            .get(path)
            .and_then(|patch| patch.positions.get(&line).copied())
    }

    /// Added line numbers (new-file numbering, ascending) for a file, or
    /// `None` when the file is not part of the diff.
    #[must_use]
    pub fn added_lines(&self, path: &Path) -> Option<&[u32]> {
        self.files.get(path).map(|p| p.added_lines.as_slice())
    }

    /// The files touched by the diff, keyed by absolute path.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }
}

/// Parse "new" start line from a hunk header like "@@ -10,5 +20,8 @@"
fn parse_hunk_header(line: &str) -> Option<u32> {
    let after_at = line.strip_prefix("@@ ")?;
    let parts: Vec<&str> = after_at.split(' ').collect();
    // parts[0] = "-old_start,old_count"
    // parts[1] = "+new_start,new_count" or "+new_start"
    if parts.len() < 2 {
        return None;
    }
    let new_part = parts[1].strip_prefix('+')?;
    let start_str = new_part.split(',').next()?;
    start_str.parse::<u32>().ok()
}

/// Lexically absolutize `path` against `root`: relative paths are joined,
/// and `.`/`..` components are folded without touching the filesystem.
#[must_use]
pub fn absolutize(path: &Path, root: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component.as_os_str());
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
