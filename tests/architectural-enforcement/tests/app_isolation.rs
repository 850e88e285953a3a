//! Integration Test: App Isolation
//!
//! **Policy**: Built-in apps must not name the lifecycle manager. A hook that
//! swaps or reloads its own app through the manager would wait on the very
//! worker it runs on.
//! **Required**: Post requests through `AppServices::control`.

use architectural_enforcement::{assert_clean, rust_files, scan_files};

const APPS_DIR: &str = "host/daemon/src/apps";

#[test]
fn test_apps_do_not_name_the_manager() {
    let files = rust_files(APPS_DIR);
    assert!(!files.is_empty(), "no app sources under {APPS_DIR}");

    let violations = scan_files(&files, &["AppManager"]);
    assert_clean("Apps must use ControlHandle, not AppManager", &violations);
}
