//! Architectural Enforcement Integration Tests
//!
//! Source-scanning checks for structural rules the compiler cannot see:
//! - Built-in apps reach the lifecycle only through the control channel
//! - Pixel storage is owned by the display compositor
//!
//! The helpers here walk the workspace sources; the rules live in `tests/`.

use std::fs;
use std::path::{Path, PathBuf};

/// Workspace root, two levels above this package
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

/// Every `.rs` file under `dir`, relative to the workspace root
#[must_use]
pub fn rust_files(dir: &str) -> Vec<PathBuf> {
    let root = workspace_root().join(dir);
    if !root.exists() {
        return Vec::new();
    }
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(&root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// A forbidden token found in source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File it was found in
    pub path: PathBuf,
    /// 1-based line
    pub line: usize,
    /// Token that matched
    pub token: String,
    /// The offending line, trimmed
    pub text: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} - {}: {}",
            self.path.display(),
            self.line,
            self.token,
            self.text
        )
    }
}

/// Find `tokens` in the code part of each line of `source`.
///
/// Line comments and doc comments are ignored.
#[must_use]
pub fn scan_source(path: &Path, source: &str, tokens: &[&str]) -> Vec<Violation> {
    let mut violations = Vec::new();
    for (idx, line) in source.lines().enumerate() {
        let code = line.split("//").next().unwrap_or(line);
        for token in tokens {
            if code.contains(token) {
                violations.push(Violation {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    token: (*token).to_string(),
                    text: line.trim().to_string(),
                });
            }
        }
    }
    violations
}

/// Scan every file in `files` for `tokens`
#[must_use]
pub fn scan_files(files: &[PathBuf], tokens: &[&str]) -> Vec<Violation> {
    files
        .iter()
        .filter_map(|path| fs::read_to_string(path).ok().map(|s| (path, s)))
        .flat_map(|(path, source)| scan_source(path, &source, tokens))
        .collect()
}

/// Print violations and fail the test if there are any
pub fn assert_clean(rule: &str, violations: &[Violation]) {
    if violations.is_empty() {
        return;
    }
    eprintln!("\n❌ {rule}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    panic!(
        "\nFound {} violation(s) of: {rule}\nFix these before merging!",
        violations.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comments_are_ignored() {
        let source = "// AppManager in a comment\n/// and in docs: AppManager\nlet x = 1; // AppManager\n";
        assert!(scan_source(Path::new("a.rs"), source, &["AppManager"]).is_empty());
    }

    #[test]
    fn test_code_is_reported_with_line() {
        let source = "fn f() {}\nuse proxi_core::AppManager;\n";
        let found = scan_source(Path::new("a.rs"), source, &["AppManager"]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].line, 2);
        assert_eq!(found[0].text, "use proxi_core::AppManager;");
    }

    #[test]
    fn test_workspace_sources_are_found() {
        assert!(!rust_files("host/core/src").is_empty());
    }
}
