//! Factory registry
//!
//! Apps are compiled in. Each registers a constructor under an entry name;
//! discovery on disk decides which apps exist and which entry they use.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::app::AppUnit;
use super::descriptor::AppDescriptor;
use super::services::AppServices;

/// Constructor for one app unit
pub type AppFactory =
    Arc<dyn Fn(AppServices) -> anyhow::Result<Box<dyn AppUnit>> + Send + Sync + 'static>;

/// Errors instantiating an app
#[derive(Debug, Error)]
pub enum LoadError {
    /// No app with this name was discovered or registered
    #[error("Unknown app: {0}")]
    UnknownApp(String),

    /// The app's entry point names no registered factory
    #[error("App {app} has no entry point named {entry}")]
    NoEntryPoint {
        /// App name
        app: String,
        /// Entry that was looked up
        entry: String,
    },

    /// The factory returned an error
    #[error("App {app} failed to construct: {source}")]
    Construction {
        /// App name
        app: String,
        /// Factory error
        #[source]
        source: anyhow::Error,
    },
}

/// Discovered descriptors plus registered factories
#[derive(Clone, Default)]
pub struct AppRegistry {
    descriptors: BTreeMap<String, AppDescriptor>,
    factories: HashMap<String, AppFactory>,
}

impl AppRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under an entry name
    pub fn register<F>(&mut self, entry: impl Into<String>, factory: F)
    where
        F: Fn(AppServices) -> anyhow::Result<Box<dyn AppUnit>> + Send + Sync + 'static,
    {
        let entry = entry.into();
        debug!(entry = %entry, "Registered app factory");
        self.factories.insert(entry, Arc::new(factory));
    }

    /// Register a descriptor and its factory in one go
    pub fn register_unit<F>(&mut self, descriptor: AppDescriptor, factory: F)
    where
        F: Fn(AppServices) -> anyhow::Result<Box<dyn AppUnit>> + Send + Sync + 'static,
    {
        self.register(descriptor.entry.clone(), factory);
        self.descriptors.insert(descriptor.name.clone(), descriptor);
    }

    /// Scan `apps_dir` for app directories and record their descriptors.
    ///
    /// Returns the number of apps found.
    ///
    /// # Errors
    ///
    /// Returns the IO error if the directory cannot be listed.
    pub fn discover(&mut self, apps_dir: &Path) -> io::Result<usize> {
        let mut found = 0;
        for entry in fs::read_dir(apps_dir)? {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable apps directory entry");
                    continue;
                }
            };
            if !path.is_dir() {
                continue;
            }
            let Some(descriptor) = AppDescriptor::from_dir(&path) else {
                continue;
            };
            if !self.factories.contains_key(&descriptor.entry) {
                warn!(app = %descriptor.name, entry = %descriptor.entry, "App has no registered entry point");
            }
            self.descriptors.insert(descriptor.name.clone(), descriptor);
            found += 1;
        }
        info!(dir = %apps_dir.display(), apps = found, "Discovered apps");
        Ok(found)
    }

    /// Descriptor by app name
    #[must_use]
    pub fn descriptor(&self, name: &str) -> Option<&AppDescriptor> {
        self.descriptors.get(name)
    }

    /// All descriptors, sorted by name
    #[must_use]
    pub fn descriptors(&self) -> Vec<AppDescriptor> {
        self.descriptors.values().cloned().collect()
    }

    /// Names of overlay apps
    #[must_use]
    pub fn overlays(&self) -> Vec<String> {
        self.descriptors
            .values()
            .filter(|d| d.is_overlay())
            .map(|d| d.name.clone())
            .collect()
    }

    /// Construct the app named `name`
    ///
    /// # Errors
    ///
    /// Returns a `LoadError` if the app is unknown, has no factory, or its
    /// factory fails.
    pub fn instantiate(
        &self,
        name: &str,
        services: AppServices,
    ) -> Result<Box<dyn AppUnit>, LoadError> {
        let descriptor = self
            .descriptors
            .get(name)
            .ok_or_else(|| LoadError::UnknownApp(name.to_string()))?;
        let factory =
            self.factories
                .get(&descriptor.entry)
                .ok_or_else(|| LoadError::NoEntryPoint {
                    app: name.to_string(),
                    entry: descriptor.entry.clone(),
                })?;
        factory(services).map_err(|source| LoadError::Construction {
            app: name.to_string(),
            source,
        })
    }
}

impl std::fmt::Debug for AppRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppRegistry")
            .field("apps", &self.descriptors.keys().collect::<Vec<_>>())
            .field("entries", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
