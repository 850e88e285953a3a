//! App descriptors built from the apps directory
//!
//! ```text
//! apps/
//! ├── launcher/
//! │   ├── metadata.json       optional
//! │   ├── icon.png            optional
//! │   └── icon_selected.png   optional
//! └── clock/
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::display::Bitmap;

/// App type from `metadata.json`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppKind {
    /// Ordinary app, swapped in and out by the launcher
    #[default]
    App,
    /// Loaded at boot next to the launcher; hidden from the launcher grid
    Overlay,
}

fn default_version() -> String {
    "unknown".to_string()
}

fn default_author() -> String {
    "Unknown".to_string()
}

/// Contents of `metadata.json`; every field is optional
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppMetadata {
    /// Display name; defaults to the directory name
    pub name: Option<String>,
    /// Version string
    #[serde(default = "default_version")]
    pub version: String,
    /// App type
    #[serde(rename = "type")]
    pub kind: AppKind,
    /// One-line description
    pub description: String,
    /// Author
    #[serde(default = "default_author")]
    pub author: String,
    /// Registered factory to construct; defaults to the directory name
    pub entry: Option<String>,
}

impl Default for AppMetadata {
    fn default() -> Self {
        Self {
            name: None,
            version: default_version(),
            kind: AppKind::App,
            description: String::new(),
            author: default_author(),
            entry: None,
        }
    }
}

impl AppMetadata {
    /// Read `metadata.json` from `dir`.
    ///
    /// A missing file yields defaults; a malformed one is logged and also
    /// yields defaults.
    #[must_use]
    pub fn load(dir: &Path) -> Self {
        let path = dir.join("metadata.json");
        let Ok(text) = fs::read_to_string(&path) else {
            return Self::default();
        };
        match serde_json::from_str(&text) {
            Ok(meta) => meta,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Malformed app metadata, using defaults");
                Self::default()
            }
        }
    }
}

/// Immutable description of one discovered app
#[derive(Clone, Debug)]
pub struct AppDescriptor {
    /// Name the app is loaded by (its directory name)
    pub name: String,
    /// Parsed metadata
    pub metadata: AppMetadata,
    /// Launcher icon
    pub icon: Option<Arc<Bitmap>>,
    /// Launcher icon when selected
    pub icon_selected: Option<Arc<Bitmap>>,
    /// Factory name
    pub entry: String,
    /// App directory, if discovered on disk
    pub dir: Option<PathBuf>,
}

impl AppDescriptor {
    /// Descriptor for an app with no directory on disk
    #[must_use]
    pub fn new(name: impl Into<String>, kind: AppKind) -> Self {
        let name = name.into();
        Self {
            entry: name.clone(),
            name,
            metadata: AppMetadata {
                kind,
                ..AppMetadata::default()
            },
            icon: None,
            icon_selected: None,
            dir: None,
        }
    }

    /// Build a descriptor from an app directory
    #[must_use]
    pub fn from_dir(dir: &Path) -> Option<Self> {
        let name = dir.file_name()?.to_str()?.to_string();
        let metadata = AppMetadata::load(dir);
        let entry = metadata.entry.clone().unwrap_or_else(|| name.clone());
        Some(Self {
            icon: load_icon(&dir.join("icon.png")),
            icon_selected: load_icon(&dir.join("icon_selected.png")),
            name,
            metadata,
            entry,
            dir: Some(dir.to_path_buf()),
        })
    }

    /// Name to show in the launcher
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or(&self.name)
    }

    /// Whether this is an overlay app
    #[must_use]
    pub fn is_overlay(&self) -> bool {
        self.metadata.kind == AppKind::Overlay
    }
}

fn load_icon(path: &Path) -> Option<Arc<Bitmap>> {
    if !path.is_file() {
        return None;
    }
    match Bitmap::load_png(path) {
        Ok(bitmap) => Some(Arc::new(bitmap)),
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable app icon");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_metadata_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("clock");
        fs::create_dir(&app).unwrap();

        let desc = AppDescriptor::from_dir(&app).unwrap();
        assert_eq!(desc.name, "clock");
        assert_eq!(desc.entry, "clock");
        assert_eq!(desc.metadata, AppMetadata::default());
        assert_eq!(desc.metadata.version, "unknown");
        assert_eq!(desc.metadata.author, "Unknown");
        assert!(desc.icon.is_none());
    }

    #[test]
    fn test_partial_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("settings");
        fs::create_dir(&app).unwrap();
        fs::write(
            app.join("metadata.json"),
            r#"{"name": "Settings", "type": "overlay", "entry": "overlay_settings"}"#,
        )
        .unwrap();

        let desc = AppDescriptor::from_dir(&app).unwrap();
        assert!(desc.is_overlay());
        assert_eq!(desc.display_name(), "Settings");
        assert_eq!(desc.entry, "overlay_settings");
        assert_eq!(desc.metadata.version, "unknown");
    }

    #[test]
    fn test_malformed_metadata_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("broken");
        fs::create_dir(&app).unwrap();
        fs::write(app.join("metadata.json"), "{ not json").unwrap();

        let desc = AppDescriptor::from_dir(&app).unwrap();
        assert_eq!(desc.metadata, AppMetadata::default());
    }
}
