//! Boot and shutdown of the appliance host
//!
//! Boot order:
//!
//! 1. panel and fonts (fatal), "Starting" screen
//! 2. synthesizer sanity check (error screen, then carry on)
//! 3. speech engine, app registry, lifecycle manager, control task
//! 4. overlays, then the launcher
//! 5. input thread
//!
//! Shutdown runs the other way round: input flag, stop every app, compositor.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use proxi_core::display::{self, share, DisplayHandle, DisplayWorker, FontSet, SharedDevice};
use proxi_core::input::{DeviceEnumerator, InputSubsystem, KeyEventSink, ShiftTable};
use proxi_core::lifecycle::{self, AppManager, AppRegistry, ControlHandle, ServiceTemplate};
use proxi_core::speech::{
    AplayPlayer, AudioSink, SfxPlayer, SpeechCache, SpeechEngine, SynthProcess, Synthesizer,
};
use proxi_core::{DisplayBackend, HostConfig, Speaker, StatusIcons};

use crate::apps::{self, Home};
use crate::terminal::{HeadlessDisplay, TerminalDisplay, TerminalEnumerator, TerminalGuard};

/// How long a missing-synthesizer error stays on screen
const MISSING_SYNTH_PAUSE: Duration = Duration::from_secs(5);

/// A booted host
pub struct Host {
    manager: Arc<AppManager>,
    display: DisplayHandle,
    display_worker: DisplayWorker,
    control_task: JoinHandle<()>,
    synth: Arc<SynthProcess>,
    input_shutdown: Arc<AtomicBool>,
    input_thread: Option<thread::JoinHandle<()>>,
    stop_all_timeout: Duration,
    // dropped last so the screen is restored after the final frame
    terminal: Option<TerminalGuard>,
}

fn open_device(config: &HostConfig) -> Result<(SharedDevice, Option<TerminalGuard>)> {
    let (width, height) = (config.display.width, config.display.height);
    match config.display.backend {
        DisplayBackend::Terminal => {
            let guard = TerminalGuard::enter().context("Failed to prepare terminal")?;
            Ok((share(TerminalDisplay::new(width, height)), Some(guard)))
        }
        DisplayBackend::Headless => Ok((share(HeadlessDisplay::new(width, height)), None)),
    }
}

/// Show an error screen for each missing synthesizer file
async fn check_synthesizer(config: &HostConfig, display: &DisplayHandle) {
    for path in [&config.speech.binary, &config.speech.model] {
        if path.exists() {
            continue;
        }
        error!(path = %path.display(), "Speech synthesizer file missing");
        display.set_screen("Error", format!("Missing {}", path.display()));
        tokio::time::sleep(MISSING_SYNTH_PAUSE).await;
    }
}

fn build_registry(config: &HostConfig) -> AppRegistry {
    let mut registry = AppRegistry::new();
    apps::register_builtin(
        &mut registry,
        &Home {
            launcher: config.apps.launcher.clone(),
            tick_rate: config.apps.tick_rate,
        },
    );
    if config.paths.apps_dir.is_dir() {
        if let Err(e) = registry.discover(&config.paths.apps_dir) {
            warn!(dir = %config.paths.apps_dir.display(), error = %e, "Failed to scan apps directory");
        }
    } else {
        info!(dir = %config.paths.apps_dir.display(), "No apps directory, built-in apps only");
    }
    registry
}

fn input_enumerator(config: &HostConfig, quit: &Arc<Notify>) -> Option<Box<dyn DeviceEnumerator>> {
    match config.display.backend {
        DisplayBackend::Terminal => Some(Box::new(TerminalEnumerator::new(Arc::clone(quit)))),
        #[cfg(feature = "evdev")]
        DisplayBackend::Headless => Some(Box::new(proxi_core::input::EvdevEnumerator)),
        #[cfg(not(feature = "evdev"))]
        DisplayBackend::Headless => None,
    }
}

fn icons(dir: Option<&Path>) -> StatusIcons {
    dir.map_or_else(StatusIcons::builtin, StatusIcons::load)
}

impl Host {
    /// Bring the host up.
    ///
    /// `quit` is notified by input backends that can ask for shutdown.
    ///
    /// # Errors
    ///
    /// Fails only if the panel, fonts or speech cache cannot be set up.
    pub async fn boot(config: &HostConfig, quit: Arc<Notify>) -> Result<Self> {
        // Display
        let (device, terminal) = open_device(config)?;
        let paths = &config.paths;
        let fonts = FontSet::load(&paths.font_regular, &paths.font_bold, &paths.font_small)
            .context("Failed to load fonts")?;
        let (display, display_worker) =
            display::start(device, fonts.clone(), config.display_timing())
                .context("Failed to start display compositor")?;
        if let Some(level) = config.display.contrast {
            if let Err(e) = display.set_contrast(level) {
                warn!(error = %e, "Failed to set initial contrast");
            }
        }
        display.set_screen("Starting", "Please wait...");

        // Speech
        check_synthesizer(config, &display).await;
        let status_icons = icons(paths.icon_dir.as_deref());
        let synth = Arc::new(SynthProcess::new(
            config.synth_command(),
            config.synth_framing(),
            config.synth_timing(),
        ));
        if let Err(e) = synth.start() {
            warn!(error = %e, "Synthesizer not started, will retry on first use");
        }
        let cache = SpeechCache::open(&paths.cache_dir).with_context(|| {
            format!("Failed to open speech cache {}", paths.cache_dir.display())
        })?;
        let player = AplayPlayer::new(config.speech.sample_rate).with_program(&config.speech.player);
        let engine = SpeechEngine::new(
            Arc::clone(&synth) as Arc<dyn Synthesizer>,
            cache,
            config.word_map(),
            Arc::new(player) as Arc<dyn AudioSink>,
            display.clone(),
            status_icons.clone(),
        );

        // Lifecycle
        let registry = build_registry(config);
        let (control, control_rx) = ControlHandle::channel();
        let services = ServiceTemplate::new(
            display.clone(),
            fonts,
            Arc::new(engine) as Arc<dyn Speaker>,
            SfxPlayer::new(config.speech.player.clone()),
            control,
            Vec::new(),
            paths.data_dir.clone(),
        );
        let manager = Arc::new(AppManager::new(
            registry,
            services,
            config.manager_settings(),
        ));
        let control_task = tokio::spawn(lifecycle::control::run(Arc::clone(&manager), control_rx));

        let overlays = manager.load_overlays();
        info!(overlays, "Overlays loaded");
        let launcher = &config.apps.launcher;
        if let Err(e) = manager
            .load(launcher)
            .and_then(|()| manager.start(launcher, config.apps.tick_rate))
        {
            warn!(app = %launcher, error = %e, "Launcher failed to start");
            display.set_screen("Error", format!("Launcher failed: {e}"));
        }

        // Input
        let input_shutdown = Arc::new(AtomicBool::new(false));
        let input_thread = match input_enumerator(config, &quit) {
            Some(enumerator) => {
                let mut subsystem = InputSubsystem::new(
                    enumerator,
                    Arc::clone(&manager) as Arc<dyn KeyEventSink>,
                    display.clone(),
                    status_icons,
                    config.input.clone(),
                    ShiftTable::default(),
                );
                let flag = Arc::clone(&input_shutdown);
                let handle = thread::Builder::new()
                    .name("input".to_string())
                    .spawn(move || {
                        if let Err(e) = subsystem.run(&flag) {
                            error!(error = %e, "Input subsystem stopped");
                        }
                    })
                    .context("Failed to spawn input thread")?;
                Some(handle)
            }
            None => {
                info!("No input backend for this display, running without a keyboard");
                None
            }
        };

        info!("Host booted");
        Ok(Self {
            manager,
            display,
            display_worker,
            control_task,
            synth,
            input_shutdown,
            input_thread,
            stop_all_timeout: config.apps.stop_all_timeout,
            terminal,
        })
    }

    /// Stop apps, input and the compositor
    pub async fn shutdown(self) {
        info!("Shutting down host");
        self.input_shutdown.store(true, Ordering::SeqCst);

        let manager = Arc::clone(&self.manager);
        let timeout = self.stop_all_timeout;
        match tokio::task::spawn_blocking(move || manager.stop_all(timeout)).await {
            Ok(report) if report.all_stopped() => info!(stopped = report.stopped.len(), "All apps stopped"),
            Ok(report) => warn!(timed_out = ?report.timed_out, "Some apps did not stop in time"),
            Err(e) => error!(error = %e, "stop_all task failed"),
        }
        self.control_task.abort();
        self.synth.shutdown();

        // evdev reads block until the next key; only the terminal keyboard polls
        if let Some(input) = self.input_thread {
            if self.terminal.is_some() || input.is_finished() {
                match tokio::task::spawn_blocking(move || input.join()).await {
                    Ok(Ok(())) => info!("Input thread stopped"),
                    Ok(Err(_)) => warn!("Input thread panicked"),
                    Err(e) => error!(error = %e, "Input join task failed"),
                }
            }
        }

        self.display.shutdown();
        match tokio::task::spawn_blocking(move || self.display_worker.join()).await {
            Ok(true) => info!("Display compositor stopped"),
            Ok(false) => warn!("Display compositor panicked"),
            Err(e) => error!(error = %e, "Display join task failed"),
        }
        drop(self.terminal);
    }
}
