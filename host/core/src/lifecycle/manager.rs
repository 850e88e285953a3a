//! The App Lifecycle Manager
//!
//! Owns loaded instances and their tick workers. Lifecycle operations are
//! serialized by one lock; key fan-out runs beside them and only contends on
//! the per-instance locks. Events for an instance that stays busy are queued
//! and delivered ahead of the next event that gets through.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::app::{invoke_hook, AppEvent};
use super::descriptor::AppDescriptor;
use super::registry::{AppRegistry, LoadError};
use super::services::ServiceTemplate;
use super::worker::{SharedUnit, WorkerHandle};
use crate::input::{KeyEventSink, KeyId};

// ============================================================================
// Errors
// ============================================================================

/// Step of a swap that failed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapStage {
    /// Loading the incoming app
    Load,
    /// Unloading the outgoing app
    Unload,
    /// Starting the incoming app
    Start,
}

impl fmt::Display for SwapStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Load => "load",
            Self::Unload => "unload",
            Self::Start => "start",
        })
    }
}

/// Lifecycle operation errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Instantiation failed
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Operation needs a loaded instance
    #[error("App {0} is not loaded")]
    NotLoaded(String),

    /// Tick rate must be finite and positive
    #[error("Invalid tick rate {hz} for app {app}")]
    InvalidTickRate {
        /// App name
        app: String,
        /// Rejected rate
        hz: f64,
    },

    /// The worker did not exit in time; it is left running detached
    #[error("App {app} did not stop within {timeout:?}")]
    StopTimeout {
        /// App name
        app: String,
        /// Timeout that elapsed
        timeout: Duration,
    },

    /// A previous worker for this app has not exited yet
    #[error("A previous worker for app {0} is still running")]
    WorkerLingering(String),

    /// The OS refused to create the tick thread
    #[error("Failed to spawn worker for app {app}: {source}")]
    Spawn {
        /// App name
        app: String,
        /// Thread creation error
        #[source]
        source: io::Error,
    },

    /// One step of a swap failed
    #[error("Swap {from} -> {to} failed at {stage}: {source}")]
    Swap {
        /// Outgoing app
        from: String,
        /// Incoming app
        to: String,
        /// Failing step
        stage: SwapStage,
        /// Underlying error
        #[source]
        source: Box<LifecycleError>,
    },
}

// ============================================================================
// Reports
// ============================================================================

/// Outcome of [`AppManager::stop_all`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StopReport {
    /// Apps whose workers exited
    pub stopped: Vec<String>,
    /// Apps whose workers were still alive at the deadline
    pub timed_out: Vec<String>,
}

impl StopReport {
    /// Every worker exited
    #[must_use]
    pub fn all_stopped(&self) -> bool {
        self.timed_out.is_empty()
    }
}

/// Outcome of [`AppManager::distribute`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers that returned normally
    pub delivered: Vec<String>,
    /// Handlers that errored or panicked
    pub failed: Vec<String>,
    /// Instances busy past the lock timeout; the event was queued for them
    pub skipped: Vec<String>,
}

// ============================================================================
// Manager
// ============================================================================

/// Queued events kept per busy instance; the oldest are dropped beyond this
pub const MAX_PENDING_EVENTS: usize = 64;

/// Manager tunables
#[derive(Clone, Debug, PartialEq)]
pub struct ManagerSettings {
    /// Bounded wait for an instance lock during fan-out
    pub dispatch_timeout: Duration,
    /// Per-app wait used by `unload`, `reload` and `swap`
    pub stop_timeout: Duration,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            dispatch_timeout: Duration::from_millis(250),
            stop_timeout: Duration::from_secs(2),
        }
    }
}

/// Loads, runs, swaps and unloads apps
pub struct AppManager {
    registry: AppRegistry,
    services: ServiceTemplate,
    settings: ManagerSettings,
    instances: DashMap<String, SharedUnit>,
    workers: DashMap<String, WorkerHandle>,
    pending: DashMap<String, VecDeque<AppEvent>>,
    ops: Mutex<()>,
}

impl AppManager {
    /// Create a manager
    #[must_use]
    pub fn new(registry: AppRegistry, services: ServiceTemplate, settings: ManagerSettings) -> Self {
        let services = services.with_catalog(registry.descriptors());
        Self {
            registry,
            services,
            settings,
            instances: DashMap::new(),
            workers: DashMap::new(),
            pending: DashMap::new(),
            ops: Mutex::new(()),
        }
    }

    /// Known apps, sorted by name
    #[must_use]
    pub fn descriptors(&self) -> Vec<AppDescriptor> {
        self.registry.descriptors()
    }

    /// Instantiate `name`. Loading a loaded app is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::Load` if the app cannot be constructed.
    pub fn load(&self, name: &str) -> Result<(), LifecycleError> {
        let _ops = self.ops.lock();
        self.load_locked(name)
    }

    /// Start the tick worker for a loaded app. Starting a running app is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// `NotLoaded`, `InvalidTickRate`, `WorkerLingering` or `Spawn`.
    pub fn start(&self, name: &str, hz: f64) -> Result<(), LifecycleError> {
        let _ops = self.ops.lock();
        self.start_locked(name, hz)
    }

    /// Stop the worker, waiting up to `timeout`. Stopping an app that is not
    /// running succeeds.
    ///
    /// # Errors
    ///
    /// `StopTimeout` if the worker is still alive at the deadline.
    pub fn stop(&self, name: &str, timeout: Duration) -> Result<(), LifecycleError> {
        let _ops = self.ops.lock();
        self.stop_locked(name, timeout)
    }

    /// Stop and discard the instance. Unloading an unknown app succeeds.
    ///
    /// # Errors
    ///
    /// Propagates a stop timeout; the instance stays loaded in that case.
    pub fn unload(&self, name: &str) -> Result<(), LifecycleError> {
        let _ops = self.ops.lock();
        self.unload_locked(name)
    }

    /// Unload and load `name`, restarting it at `hz` if it was running
    ///
    /// # Errors
    ///
    /// Any error from the unload, load or start step.
    pub fn reload(&self, name: &str, hz: f64) -> Result<(), LifecycleError> {
        let _ops = self.ops.lock();
        self.reload_locked(name, hz)
    }

    /// Replace `from` with `to`.
    ///
    /// `to` is loaded before `from` is touched, so a failed load leaves the
    /// running app alone. Swapping an app with itself reloads it and makes
    /// sure it runs.
    ///
    /// # Errors
    ///
    /// `LifecycleError::Swap` naming the failing stage.
    pub fn swap(&self, from: &str, to: &str, hz: f64) -> Result<(), LifecycleError> {
        let _ops = self.ops.lock();
        let stage_err = |stage: SwapStage| {
            move |source: LifecycleError| LifecycleError::Swap {
                from: from.to_string(),
                to: to.to_string(),
                stage,
                source: Box::new(source),
            }
        };

        if from == to {
            self.reload_locked(to, hz).map_err(|e| {
                let stage = match e {
                    LifecycleError::Load(_) => SwapStage::Load,
                    LifecycleError::StopTimeout { .. } => SwapStage::Unload,
                    _ => SwapStage::Start,
                };
                stage_err(stage)(e)
            })?;
            self.start_locked(to, hz)
                .map_err(stage_err(SwapStage::Start))?;
        } else {
            self.load_locked(to).map_err(stage_err(SwapStage::Load))?;
            self.unload_locked(from)
                .map_err(stage_err(SwapStage::Unload))?;
            self.start_locked(to, hz)
                .map_err(stage_err(SwapStage::Start))?;
        }
        info!(from = %from, to = %to, "Swapped apps");
        Ok(())
    }

    /// Queue a swap on the control task; returns false if it is not running
    pub fn swap_async(&self, from: &str, to: &str, hz: f64, delay: Duration) -> bool {
        self.services.control().swap(from, to, hz, delay)
    }

    /// Stop every worker. All stop flags are raised before any wait.
    pub fn stop_all(&self, timeout: Duration) -> StopReport {
        let _ops = self.ops.lock();
        let mut names: Vec<String> = self.workers.iter().map(|w| w.key().clone()).collect();
        names.sort();
        info!(apps = names.len(), "Stopping all apps");

        for name in &names {
            if let Some(worker) = self.workers.get(name) {
                worker.request_stop();
            }
        }

        let mut report = StopReport::default();
        for name in names {
            if self.stop_locked(&name, timeout).is_ok() {
                report.stopped.push(name);
            } else {
                report.timed_out.push(name);
            }
        }
        report
    }

    /// Deliver `event` to every loaded instance in name order.
    ///
    /// A failing handler does not affect the others. An instance whose lock
    /// stays busy past the dispatch timeout is skipped and the event is
    /// queued for it; queued events go first once its lock is free again.
    pub fn distribute(&self, event: &AppEvent) -> DispatchReport {
        let mut targets: Vec<(String, SharedUnit)> = self
            .instances
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        targets.sort_by(|a, b| a.0.cmp(&b.0));

        let hook = event.hook();
        let mut report = DispatchReport::default();
        for (name, unit) in targets {
            let Some(mut guard) = unit.try_lock_for(self.settings.dispatch_timeout) else {
                warn!(app = %name, hook = %hook, "App busy, event queued");
                self.defer(&name, event);
                report.skipped.push(name);
                continue;
            };
            if let Some((_, backlog)) = self.pending.remove(&name) {
                debug!(app = %name, events = backlog.len(), "Delivering queued events");
                for queued in backlog {
                    let _ = invoke_hook(&name, queued.hook(), || queued.deliver(&mut **guard));
                }
            }
            match invoke_hook(&name, hook, || event.deliver(&mut **guard)) {
                Ok(()) => report.delivered.push(name),
                Err(_) => report.failed.push(name),
            }
        }
        report
    }

    /// Events queued for `name` while it was busy
    #[must_use]
    pub fn pending_events(&self, name: &str) -> usize {
        self.pending.get(name).map_or(0, |q| q.len())
    }

    fn defer(&self, name: &str, event: &AppEvent) {
        let mut queue = self.pending.entry(name.to_string()).or_default();
        if queue.len() >= MAX_PENDING_EVENTS {
            queue.pop_front();
            warn!(app = %name, "Pending event queue full, dropped oldest");
        }
        queue.push_back(event.clone());
    }

    /// Load every overlay app; returns how many loaded
    pub fn load_overlays(&self) -> usize {
        let _ops = self.ops.lock();
        let mut loaded = 0;
        for name in self.registry.overlays() {
            match self.load_locked(&name) {
                Ok(()) => loaded += 1,
                Err(e) => warn!(app = %name, error = %e, "Failed to load overlay"),
            }
        }
        loaded
    }

    /// Whether `name` has a live instance
    #[must_use]
    pub fn is_loaded(&self, name: &str) -> bool {
        self.instances.contains_key(name)
    }

    /// Whether `name` has a worker that is alive and not stopping
    #[must_use]
    pub fn is_running(&self, name: &str) -> bool {
        self.workers.get(name).is_some_and(|w| w.is_running())
    }

    /// Loaded app names, sorted
    #[must_use]
    pub fn loaded_apps(&self) -> Vec<String> {
        let mut names: Vec<String> = self.instances.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Running app names, sorted
    #[must_use]
    pub fn running_apps(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .workers
            .iter()
            .filter(|w| w.is_running())
            .map(|w| w.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Updates completed by the current worker of `name`
    #[must_use]
    pub fn tick_count(&self, name: &str) -> Option<u64> {
        self.workers.get(name).map(|w| w.ticks())
    }

    // ------------------------------------------------------------------------
    // Operations with `ops` held
    // ------------------------------------------------------------------------

    fn load_locked(&self, name: &str) -> Result<(), LifecycleError> {
        if self.instances.contains_key(name) {
            debug!(app = %name, "App already loaded");
            return Ok(());
        }
        let unit = self
            .registry
            .instantiate(name, self.services.for_app(name))?;
        self.pending.remove(name);
        self.instances
            .insert(name.to_string(), Arc::new(Mutex::new(unit)));
        info!(app = %name, "App loaded");
        Ok(())
    }

    fn start_locked(&self, name: &str, hz: f64) -> Result<(), LifecycleError> {
        let unit = self
            .instances
            .get(name)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| LifecycleError::NotLoaded(name.to_string()))?;
        if !hz.is_finite() || hz <= 0.0 {
            return Err(LifecycleError::InvalidTickRate {
                app: name.to_string(),
                hz,
            });
        }
        if let Some(worker) = self.workers.get(name) {
            if worker.is_running() {
                debug!(app = %name, hz = worker.hz(), "App already running");
                return Ok(());
            }
            if worker.is_alive() {
                return Err(LifecycleError::WorkerLingering(name.to_string()));
            }
        }

        let worker = WorkerHandle::spawn(name, unit, hz).map_err(|source| LifecycleError::Spawn {
            app: name.to_string(),
            source,
        })?;
        self.workers.insert(name.to_string(), worker);
        info!(app = %name, hz, "App started");
        Ok(())
    }

    fn stop_locked(&self, name: &str, timeout: Duration) -> Result<(), LifecycleError> {
        let Some((key, mut worker)) = self.workers.remove(name) else {
            return Ok(());
        };
        worker.request_stop();
        if worker.wait(timeout) {
            info!(app = %name, ticks = worker.ticks(), "App stopped");
            return Ok(());
        }
        warn!(app = %name, timeout_ms = timeout.as_millis() as u64, "App did not stop in time, leaving worker detached");
        self.workers.insert(key, worker);
        Err(LifecycleError::StopTimeout {
            app: name.to_string(),
            timeout,
        })
    }

    fn unload_locked(&self, name: &str) -> Result<(), LifecycleError> {
        self.stop_locked(name, self.settings.stop_timeout)?;
        self.pending.remove(name);
        if self.instances.remove(name).is_some() {
            info!(app = %name, "App unloaded");
        }
        Ok(())
    }

    fn reload_locked(&self, name: &str, hz: f64) -> Result<(), LifecycleError> {
        let was_running = self.is_running(name);
        self.unload_locked(name)?;
        self.load_locked(name)?;
        if was_running {
            self.start_locked(name, hz)?;
        }
        info!(app = %name, restarted = was_running, "App reloaded");
        Ok(())
    }
}

impl KeyEventSink for AppManager {
    fn key_down(&self, key: &KeyId) {
        self.distribute(&AppEvent::KeyDown(key.clone()));
    }

    fn key_up(&self, key: &KeyId) {
        self.distribute(&AppEvent::KeyUp(key.clone()));
    }
}

impl fmt::Debug for AppManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppManager")
            .field("loaded", &self.loaded_apps())
            .field("running", &self.running_apps())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::AppKind;
    use crate::testing::{AppProbe, ScriptedApp, TestServices};
    use pretty_assertions::assert_eq;
    use std::thread;

    fn manager(apps: Vec<(&str, ScriptedApp)>) -> (AppManager, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let services = TestServices::new(dir.path());
        let mut registry = AppRegistry::new();
        for (name, app) in apps {
            registry.register_unit(AppDescriptor::new(name, AppKind::App), app.into_factory());
        }
        let settings = ManagerSettings {
            dispatch_timeout: Duration::from_millis(50),
            stop_timeout: Duration::from_millis(500),
        };
        (AppManager::new(registry, services.template, settings), dir)
    }

    #[test]
    fn test_load_is_idempotent() {
        let probe = AppProbe::default();
        let (manager, _dir) = manager(vec![("a", ScriptedApp::new(probe.clone()))]);

        manager.load("a").unwrap();
        manager.load("a").unwrap();
        assert_eq!(probe.constructs(), 1);
        assert_eq!(manager.loaded_apps(), vec!["a"]);
    }

    #[test]
    fn test_start_requires_load_and_valid_rate() {
        let (manager, _dir) = manager(vec![("a", ScriptedApp::new(AppProbe::default()))]);

        assert!(matches!(
            manager.start("a", 20.0),
            Err(LifecycleError::NotLoaded(_))
        ));
        assert!(manager.running_apps().is_empty());

        manager.load("a").unwrap();
        assert!(matches!(
            manager.start("a", 0.0),
            Err(LifecycleError::InvalidTickRate { .. })
        ));
        assert!(matches!(
            manager.start("a", f64::NAN),
            Err(LifecycleError::InvalidTickRate { .. })
        ));
        assert!(!manager.is_running("a"));
    }

    #[test]
    fn test_start_twice_keeps_one_worker() {
        let probe = AppProbe::default();
        let (manager, _dir) = manager(vec![("a", ScriptedApp::new(probe.clone()))]);
        manager.load("a").unwrap();
        manager.start("a", 50.0).unwrap();
        manager.start("a", 50.0).unwrap();
        thread::sleep(Duration::from_millis(50));
        manager.stop("a", Duration::from_secs(1)).unwrap();
        assert_eq!(probe.starts(), 1);
        assert_eq!(probe.stops(), 1);
    }

    #[test]
    fn test_stop_when_not_running_is_trivial() {
        let (manager, _dir) = manager(vec![("a", ScriptedApp::new(AppProbe::default()))]);
        manager.stop("a", Duration::from_millis(10)).unwrap();
        manager.load("a").unwrap();
        manager.stop("a", Duration::from_millis(10)).unwrap();
        manager.unload("never-loaded").unwrap();
    }

    #[test]
    fn test_unknown_swap_target_leaves_current_running() {
        let probe = AppProbe::default();
        let (manager, _dir) = manager(vec![("a", ScriptedApp::new(probe.clone()))]);
        manager.load("a").unwrap();
        manager.start("a", 20.0).unwrap();

        let err = manager.swap("a", "missing", 20.0).unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Swap {
                stage: SwapStage::Load,
                ..
            }
        ));
        assert!(manager.is_running("a"));
        assert_eq!(probe.stops(), 0);
        manager.stop_all(Duration::from_secs(1));
    }

    #[test]
    fn test_swap_to_self_reloads() {
        let probe = AppProbe::default();
        let (manager, _dir) = manager(vec![("a", ScriptedApp::new(probe.clone()))]);
        manager.load("a").unwrap();

        manager.swap("a", "a", 20.0).unwrap();
        assert_eq!(probe.constructs(), 2);
        assert!(manager.is_running("a"));
        assert!(manager.stop_all(Duration::from_secs(1)).all_stopped());
    }

    #[test]
    fn test_distribute_isolates_failures() {
        let good = AppProbe::default();
        let (manager, _dir) = manager(vec![
            ("a", ScriptedApp::new(AppProbe::default()).panicking_keys()),
            ("b", ScriptedApp::new(AppProbe::default()).failing_keys()),
            ("c", ScriptedApp::new(good.clone())),
        ]);
        for name in ["a", "b", "c"] {
            manager.load(name).unwrap();
        }

        let report = manager.distribute(&AppEvent::KeyDown(KeyId::from("KEY_A")));
        assert_eq!(report.delivered, vec!["c"]);
        assert_eq!(report.failed, vec!["a", "b"]);
        assert!(report.skipped.is_empty());
        assert_eq!(good.keys(), vec!["down KEY_A"]);
    }

    #[test]
    fn test_pending_queue_is_bounded_and_cleared_on_unload() {
        let release = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let stuck = AppProbe::default();
        let (manager, _dir) = manager(vec![(
            "stuck",
            ScriptedApp::new(stuck.clone()).hanging_update(Arc::clone(&release)),
        )]);
        manager.load("stuck").unwrap();
        manager.start("stuck", 20.0).unwrap();
        while stuck.updates() == 0 {
            thread::sleep(Duration::from_millis(5));
        }

        for _ in 0..MAX_PENDING_EVENTS + 3 {
            manager.distribute(&AppEvent::KeyDown(KeyId::from("KEY_A")));
        }
        assert_eq!(manager.pending_events("stuck"), MAX_PENDING_EVENTS);

        release.store(true, std::sync::atomic::Ordering::SeqCst);
        manager.unload("stuck").unwrap();
        assert_eq!(manager.pending_events("stuck"), 0);
        assert!(stuck.keys().is_empty());
    }

    #[test]
    fn test_distribute_skips_busy_instance() {
        let release = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let stuck = AppProbe::default();
        let (manager, _dir) = manager(vec![
            (
                "stuck",
                ScriptedApp::new(stuck.clone()).hanging_update(Arc::clone(&release)),
            ),
            ("well", ScriptedApp::new(AppProbe::default())),
        ]);
        manager.load("stuck").unwrap();
        manager.load("well").unwrap();
        manager.start("stuck", 20.0).unwrap();
        while stuck.updates() == 0 {
            thread::sleep(Duration::from_millis(5));
        }
        thread::sleep(Duration::from_millis(50));

        manager.key_down(&KeyId::from("KEY_A"));
        let report = manager.distribute(&AppEvent::KeyUp(KeyId::from("KEY_A")));
        assert_eq!(report.skipped, vec!["stuck"]);
        assert_eq!(report.delivered, vec!["well"]);
        assert_eq!(manager.pending_events("stuck"), 2);
        assert!(stuck.keys().is_empty());

        release.store(true, std::sync::atomic::Ordering::SeqCst);
        let report = manager.distribute(&AppEvent::KeyDown(KeyId::from("KEY_B")));
        assert_eq!(report.delivered, vec!["stuck", "well"]);
        assert_eq!(
            stuck.keys(),
            vec!["down KEY_A", "up KEY_A", "down KEY_B"]
        );
        assert_eq!(manager.pending_events("stuck"), 0);
        assert!(manager.stop_all(Duration::from_secs(2)).all_stopped());
    }
}
