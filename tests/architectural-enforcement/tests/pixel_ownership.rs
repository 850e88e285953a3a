//! Integration Test: Pixel Ownership
//!
//! **Policy**: Only the display compositor touches pixel storage. Everything
//! else draws by sending commands through a `DisplayHandle`.
//! **Forbidden outside `host/core/src/display/`**: `Pixmap`, `pixels_mut`.

use std::path::Path;

use architectural_enforcement::{assert_clean, rust_files, scan_files, workspace_root};

const DISPLAY_DIR: &str = "host/core/src/display";
const SOURCE_DIRS: &[&str] = &["host/core/src", "host/core/tests", "host/daemon/src"];

#[test]
fn test_pixel_storage_stays_in_the_compositor() {
    let display = workspace_root().join(DISPLAY_DIR);
    let files: Vec<_> = SOURCE_DIRS
        .iter()
        .flat_map(|dir| rust_files(dir))
        .filter(|path| !path.starts_with(&display))
        .collect();
    assert!(!files.is_empty(), "no sources found");

    let violations = scan_files(&files, &["Pixmap", "pixels_mut"]);
    assert_clean(
        "Pixel storage is only touched under host/core/src/display/",
        &violations,
    );
}

#[test]
fn test_compositor_does_own_the_pixels() {
    // guards against the rule passing because the display module moved
    let files = rust_files(DISPLAY_DIR);
    let found = scan_files(&files, &["Pixmap"]);
    assert!(
        !found.is_empty(),
        "expected pixel storage under {}",
        Path::new(DISPLAY_DIR).display()
    );
}
