//! The compositor's consumer loop
//!
//! One task drains the command queue, renders on a fixed poll interval and
//! drives the cursor blink timer. [`spawn`] runs it on a dedicated OS thread
//! with its own current-thread runtime so that the display keeps refreshing
//! no matter what the rest of the process is blocked on.

use std::ops::ControlFlow;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use super::command::DisplayCommand;
use super::compositor::Compositor;
use super::DisplayError;

/// Timer settings for the consumer loop
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayTiming {
    /// Poll interval for unconditional render checks
    pub render_interval: Duration,
    /// Cursor blink half-period
    pub blink_interval: Duration,
}

impl Default for DisplayTiming {
    fn default() -> Self {
        Self {
            render_interval: Duration::from_millis(100),
            blink_interval: Duration::from_millis(500),
        }
    }
}

/// Consume commands until `Shutdown` or until every sender is gone.
///
/// A final forced render happens on the way out.
pub async fn run(
    mut compositor: Compositor,
    mut rx: mpsc::UnboundedReceiver<DisplayCommand>,
    timing: DisplayTiming,
) {
    let mut render = time::interval(timing.render_interval);
    render.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut blink = time::interval_at(
        Instant::now() + timing.blink_interval,
        timing.blink_interval,
    );
    blink.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        width = compositor.size().width,
        height = compositor.size().height,
        "Display compositor started"
    );

    loop {
        tokio::select! {
            command = rx.recv() => {
                let Some(command) = command else {
                    debug!("All display handles dropped");
                    break;
                };
                if drain(&mut compositor, command, &mut rx).is_break() {
                    break;
                }
                compositor.render_logged(false);
            }
            _ = render.tick() => compositor.render_logged(false),
            _ = blink.tick() => {
                compositor.blink();
                compositor.render_logged(false);
            }
        }
    }

    compositor.render_logged(true);
    info!("Display compositor stopped");
}

/// Apply `first` and everything already queued behind it
fn drain(
    compositor: &mut Compositor,
    first: DisplayCommand,
    rx: &mut mpsc::UnboundedReceiver<DisplayCommand>,
) -> ControlFlow<()> {
    compositor.apply(first)?;
    while let Ok(command) = rx.try_recv() {
        compositor.apply(command)?;
    }
    ControlFlow::Continue(())
}

/// Join handle for the compositor thread
#[derive(Debug)]
pub struct DisplayWorker {
    handle: JoinHandle<()>,
}

impl DisplayWorker {
    /// Wait for the compositor to exit. Returns false if it panicked.
    pub fn join(self) -> bool {
        self.handle.join().is_ok()
    }

    /// Whether the compositor thread has exited
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Run the compositor on a dedicated `display` thread
///
/// # Errors
///
/// Returns `DisplayError::Spawn` if the thread cannot be created.
pub fn spawn(
    compositor: Compositor,
    rx: mpsc::UnboundedReceiver<DisplayCommand>,
    timing: DisplayTiming,
) -> Result<DisplayWorker, DisplayError> {
    let handle = std::thread::Builder::new()
        .name("display".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!(error = %e, "Failed to build display runtime");
                    return;
                }
            };
            runtime.block_on(run(compositor, rx, timing));
        })
        .map_err(DisplayError::Spawn)?;
    Ok(DisplayWorker { handle })
}
