//! Keyboard discovery and the key read loop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::device::{pick_keyboard, DeviceEnumerator, InputDevice, InputError};
use super::keys::{KeyId, ShiftTable, DEFAULT_SHIFT_KEY};
use super::tracker::{KeyTracker, KeyTransition};
use crate::display::{DisplayHandle, Layer, StatusIcons, ICON_SIZE};

/// Receiver of dispatched key events
pub trait KeyEventSink: Send + Sync {
    /// A key went down
    fn key_down(&self, key: &KeyId);

    /// A key went up
    fn key_up(&self, key: &KeyId);
}

/// Discovery and reconnect policy
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputConfig {
    /// Modifier that activates the shift table
    pub shift_key: KeyId,
    /// Delay between discovery attempts
    pub retry_delay: Duration,
    /// Discovery attempts before reporting "No Keyboard Found"; `None` retries forever
    pub max_retries: Option<u32>,
    /// Pause after a disconnect before rediscovery
    pub reconnect_delay: Duration,
    /// Pause after "No Keyboard Found" before starting over
    pub no_keyboard_delay: Duration,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            shift_key: KeyId::from(DEFAULT_SHIFT_KEY),
            retry_delay: Duration::from_millis(2500),
            max_retries: Some(24),
            reconnect_delay: Duration::from_secs(1),
            no_keyboard_delay: Duration::from_secs(5),
        }
    }
}

/// Finds the keyboard, keeps it connected and feeds its keys to the sink
pub struct InputSubsystem {
    enumerator: Box<dyn DeviceEnumerator>,
    sink: Arc<dyn KeyEventSink>,
    display: DisplayHandle,
    icons: StatusIcons,
    config: InputConfig,
    tracker: KeyTracker,
}

impl InputSubsystem {
    /// Create the subsystem
    #[must_use]
    pub fn new(
        enumerator: Box<dyn DeviceEnumerator>,
        sink: Arc<dyn KeyEventSink>,
        display: DisplayHandle,
        icons: StatusIcons,
        config: InputConfig,
        shift: ShiftTable,
    ) -> Self {
        let tracker = KeyTracker::new(config.shift_key.clone(), shift);
        Self {
            enumerator,
            sink,
            display,
            icons,
            config,
            tracker,
        }
    }

    /// Run until `shutdown` is raised.
    ///
    /// Device disconnects lead back to discovery; any other device error
    /// ends the loop.
    ///
    /// # Errors
    ///
    /// Returns `InputError::Io` for non-disconnect device failures.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<(), InputError> {
        while !shutdown.load(Ordering::SeqCst) {
            let Some(device) = self.discover(shutdown) else {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                warn!("No keyboard found");
                self.display.set_screen("Error", "No Keyboard Found");
                pause(self.config.no_keyboard_delay, shutdown);
                continue;
            };

            info!(device = device.name(), "Keyboard connected");
            self.display.set_screen("Ready", "Waiting for input...");

            match self.pump(device, shutdown) {
                Ok(()) => break,
                Err(InputError::Disconnected) => {
                    warn!("Keyboard disconnected, reconnecting");
                    self.tracker.clear();
                    self.display
                        .set_screen("Disconnected", "Keyboard lost. Reconnecting...");
                    self.show_searching();
                    pause(self.config.reconnect_delay, shutdown);
                }
                Err(e) => return Err(e),
            }
        }
        info!("Input subsystem stopped");
        Ok(())
    }

    /// Feed one raw event through edge detection and dispatch it
    pub fn dispatch(&mut self, event: super::device::RawKeyEvent) {
        match self.tracker.handle(event) {
            Some(KeyTransition::Down(key)) => self.sink.key_down(&key),
            Some(KeyTransition::Up(key)) => self.sink.key_up(&key),
            None => {}
        }
    }

    fn show_searching(&self) {
        let y = self.display.size().height as i32 - ICON_SIZE as i32;
        self.display
            .draw_image(Layer::Overlay, Arc::clone(&self.icons.searching), 0, y);
    }

    fn clear_searching(&self) {
        let y = self.display.size().height as i32 - ICON_SIZE as i32;
        self.display
            .clear_region(Layer::Overlay, 0, y, ICON_SIZE, ICON_SIZE);
    }

    fn discover(&mut self, shutdown: &AtomicBool) -> Option<Box<dyn InputDevice>> {
        self.display
            .set_screen("Connecting", "Looking for keyboard...");
        self.show_searching();

        let mut tries = 0u32;
        loop {
            if shutdown.load(Ordering::SeqCst) {
                return None;
            }
            match self.enumerator.enumerate() {
                Ok(devices) => {
                    debug!(count = devices.len(), "Enumerated input devices");
                    if let Some(device) = pick_keyboard(devices) {
                        self.display.set_screen(
                            "Connecting",
                            format!("Found Keyboard: {}", device.name()),
                        );
                        self.clear_searching();
                        return Some(device);
                    }
                }
                Err(e) => warn!(error = %e, "Failed to enumerate input devices"),
            }

            tries += 1;
            if self.config.max_retries.is_some_and(|max| tries >= max) {
                self.clear_searching();
                return None;
            }
            pause(self.config.retry_delay, shutdown);
        }
    }

    fn pump(
        &mut self,
        mut device: Box<dyn InputDevice>,
        shutdown: &AtomicBool,
    ) -> Result<(), InputError> {
        while !shutdown.load(Ordering::SeqCst) {
            for event in device.read_batch()? {
                self.dispatch(event);
            }
        }
        Ok(())
    }
}

/// Sleep up to `total`, waking early if `shutdown` is raised
fn pause(total: Duration, shutdown: &AtomicBool) {
    let deadline = Instant::now() + total;
    while !shutdown.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        std::thread::sleep((deadline - now).min(Duration::from_millis(50)));
    }
}
