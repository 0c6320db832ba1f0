use std::path::PathBuf;

use tempfile::TempDir;

/// Create a temporary project root containing a coverage report at
/// `report_rel`. The caller must hold onto `TempDir` to keep the directory
/// alive.
pub fn project_with_report(report_rel: &str, report_contents: &[u8]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let report_path = dir.path().join(report_rel);
    std::fs::create_dir_all(report_path.parent().unwrap()).unwrap();
    std::fs::write(&report_path, report_contents).unwrap();
    let root = dir.path().to_path_buf();
    (dir, root)
}

/// A diff for src/main.rs whose added lines are 5, 8 and 10 (new-file
/// numbering); line 10 sits at diff position 8.
pub const MAIN_RS_DIFF: &str = "\
diff --git a/src/main.rs b/src/main.rs
index 1111111..2222222 100644
--- a/src/main.rs
+++ b/src/main.rs
@@ -3,5 +3,8 @@
 fn three() {}
 fn four() {}
+fn five() {}
 fn six() {}
 fn seven() {}
+fn eight() {}
 fn nine() {}
+fn ten() {}
";
