//! Host services handed to each app at construction

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::control::ControlHandle;
use super::descriptor::AppDescriptor;
use crate::display::{DisplayHandle, FontId, FontSet, ScreenSize};
use crate::speech::{SfxPlayer, Speaker};

/// Everything an app may touch on the host.
///
/// Apps never see the `AppManager`; lifecycle requests go through
/// [`ControlHandle`].
#[derive(Clone)]
pub struct AppServices {
    /// Name the app was loaded under
    pub name: String,
    /// Command channel to the compositor
    pub display: DisplayHandle,
    /// Screen size in pixels
    pub screen: ScreenSize,
    /// Shared fonts
    pub fonts: FontSet,
    /// Speech engine
    pub speech: Arc<dyn Speaker>,
    /// Sound effect player
    pub sfx: SfxPlayer,
    /// Deferred lifecycle requests
    pub control: ControlHandle,
    /// Every discovered app, sorted by name
    pub catalog: Arc<Vec<AppDescriptor>>,
    scratch_dir: PathBuf,
}

impl AppServices {
    /// Width of `text` in `font`
    #[must_use]
    pub fn measure(&self, font: FontId, text: &str) -> u32 {
        self.fonts.measure(font, text)
    }

    /// Per-app writable directory, created on first use
    ///
    /// # Errors
    ///
    /// Returns the IO error if the directory cannot be created.
    pub fn scratch_dir(&self) -> io::Result<&Path> {
        fs::create_dir_all(&self.scratch_dir)?;
        Ok(&self.scratch_dir)
    }
}

impl std::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppServices")
            .field("name", &self.name)
            .field("screen", &self.screen)
            .field("scratch_dir", &self.scratch_dir)
            .finish_non_exhaustive()
    }
}

/// Shared half of [`AppServices`]; stamps out a copy per app
#[derive(Clone)]
pub struct ServiceTemplate {
    display: DisplayHandle,
    fonts: FontSet,
    speech: Arc<dyn Speaker>,
    sfx: SfxPlayer,
    control: ControlHandle,
    catalog: Arc<Vec<AppDescriptor>>,
    data_dir: PathBuf,
}

impl ServiceTemplate {
    /// Build the template
    #[must_use]
    pub fn new(
        display: DisplayHandle,
        fonts: FontSet,
        speech: Arc<dyn Speaker>,
        sfx: SfxPlayer,
        control: ControlHandle,
        catalog: Vec<AppDescriptor>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            display,
            fonts,
            speech,
            sfx,
            control,
            catalog: Arc::new(catalog),
            data_dir: data_dir.into(),
        }
    }

    /// Services for the app named `name`
    #[must_use]
    pub fn for_app(&self, name: &str) -> AppServices {
        AppServices {
            name: name.to_string(),
            screen: self.display.size(),
            display: self.display.clone(),
            fonts: self.fonts.clone(),
            speech: Arc::clone(&self.speech),
            sfx: self.sfx.clone(),
            control: self.control.clone(),
            catalog: Arc::clone(&self.catalog),
            scratch_dir: self.data_dir.join("apps").join(name),
        }
    }

    /// Lifecycle request channel
    #[must_use]
    pub fn control(&self) -> &ControlHandle {
        &self.control
    }

    /// Replace the catalog, e.g. after discovery
    #[must_use]
    pub fn with_catalog(mut self, catalog: Vec<AppDescriptor>) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }
}

impl std::fmt::Debug for ServiceTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceTemplate")
            .field("apps", &self.catalog.len())
            .field("data_dir", &self.data_dir)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestServices;

    #[test]
    fn test_scratch_dir_is_per_app_and_lazy() {
        let dir = tempfile::tempdir().unwrap();
        let services = TestServices::new(dir.path());
        let clock = services.template.for_app("clock");

        let expected = dir.path().join("apps").join("clock");
        assert!(!expected.exists());
        assert_eq!(clock.scratch_dir().unwrap(), expected.as_path());
        assert!(expected.is_dir());
        assert_eq!(clock.name, "clock");
    }
}
