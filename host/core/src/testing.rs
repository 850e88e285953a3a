//! Test doubles for the host seams
//!
//! Used by the unit tests in this crate, the integration tests under
//! `tests/`, and the daemon's app tests.

use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::display::{share, DisplayCommand, DisplayHandle, FontFace, FontSet, FrameLog, MemoryDisplay};
use crate::input::{DeviceEnumerator, InputDevice, InputError, KeyEventSink, KeyId, RawKeyEvent};
use crate::lifecycle::{AppServices, AppUnit, ControlHandle, ControlRequest, HookResult, ServiceTemplate};
use crate::speech::{AudioError, AudioSink, SfxPlayer, SpeechOutcome, Speaker, SynthesisError, Synthesizer};

// ============================================================================
// Display
// ============================================================================

/// Font whose glyphs are solid `width` x `height` blocks; spaces stay blank
#[derive(Clone, Copy, Debug)]
pub struct FixedWidthFont {
    width: u32,
    height: u32,
}

impl FixedWidthFont {
    /// Font with the given cell size
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl FontFace for FixedWidthFont {
    fn advance(&self, _ch: char) -> f32 {
        self.width as f32
    }

    fn ascent(&self) -> f32 {
        self.height as f32
    }

    fn line_height(&self) -> u32 {
        self.height
    }

    fn rasterize(&self, ch: char, x: f32, top: f32, plot: &mut dyn FnMut(i32, i32)) {
        if ch.is_whitespace() {
            return;
        }
        let (x0, y0) = (x.round() as i32, top.round() as i32);
        for dy in 0..self.height as i32 {
            for dx in 0..self.width as i32 {
                plot(x0 + dx, y0 + dy);
            }
        }
    }
}

/// Fonts built from one [`FixedWidthFont`]
#[must_use]
pub fn fixed_fonts(width: u32, height: u32) -> FontSet {
    FontSet::uniform(Arc::new(FixedWidthFont::new(width, height)))
}

// ============================================================================
// Speech
// ============================================================================

#[derive(Clone, Copy, Debug)]
enum SynthMode {
    Echo,
    Silent,
    Failing,
}

/// Synthesizer that counts calls and remembers what it was asked
#[derive(Debug)]
pub struct CountingSynthesizer {
    mode: SynthMode,
    calls: AtomicUsize,
    requests: Mutex<Vec<String>>,
}

impl CountingSynthesizer {
    fn with_mode(mode: SynthMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Returns the request text as audio bytes
    #[must_use]
    pub fn echo() -> Self {
        Self::with_mode(SynthMode::Echo)
    }

    /// Succeeds with no audio
    #[must_use]
    pub fn silent() -> Self {
        Self::with_mode(SynthMode::Silent)
    }

    /// Always fails with a write error
    #[must_use]
    pub fn failing() -> Self {
        Self::with_mode(SynthMode::Failing)
    }

    /// Number of synthesize calls
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Texts received, in order
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

impl Synthesizer for CountingSynthesizer {
    fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(text.to_string());
        match self.mode {
            SynthMode::Echo => Ok(text.as_bytes().to_vec()),
            SynthMode::Silent => Ok(Vec::new()),
            SynthMode::Failing => Err(SynthesisError::Write(io::Error::other("pipe closed"))),
        }
    }
}

/// Audio sink that keeps every buffer it is given
#[derive(Debug, Default)]
pub struct RecordingSink {
    played: Mutex<Vec<Vec<u8>>>,
}

impl RecordingSink {
    /// Buffers played so far
    #[must_use]
    pub fn played(&self) -> Vec<Vec<u8>> {
        self.played.lock().clone()
    }
}

impl AudioSink for RecordingSink {
    fn play(&self, pcm: &[u8]) -> Result<(), AudioError> {
        self.played.lock().push(pcm.to_vec());
        Ok(())
    }
}

/// Speaker that produces no audio and remembers what it was asked to say
#[derive(Debug, Default)]
pub struct NullSpeaker {
    spoken: Mutex<Vec<String>>,
}

impl NullSpeaker {
    /// Texts passed to `speak`
    #[must_use]
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().clone()
    }
}

impl Speaker for NullSpeaker {
    fn speak(&self, text: &str, _background: bool) -> SpeechOutcome {
        self.spoken.lock().push(text.to_string());
        SpeechOutcome::Skipped
    }

    fn is_cached(&self, _text: &str) -> bool {
        false
    }
}

// ============================================================================
// Input
// ============================================================================

/// Key sink that records `down KEY` / `up KEY` lines
#[derive(Debug, Default)]
pub struct RecordingKeySink {
    events: Mutex<Vec<String>>,
}

impl RecordingKeySink {
    /// Events in dispatch order
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl KeyEventSink for RecordingKeySink {
    fn key_down(&self, key: &KeyId) {
        self.events.lock().push(format!("down {key}"));
    }

    fn key_up(&self, key: &KeyId) {
        self.events.lock().push(format!("up {key}"));
    }
}

#[derive(Debug)]
enum Step {
    Events(Vec<RawKeyEvent>),
    Disconnect,
    Fail,
}

/// Input device that replays a script of batches and failures
#[derive(Debug)]
pub struct ScriptedDevice {
    name: String,
    steps: VecDeque<Step>,
}

impl ScriptedDevice {
    /// Device with an empty script
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: VecDeque::new(),
        }
    }

    /// Next read returns `events`
    #[must_use]
    pub fn then(mut self, events: Vec<RawKeyEvent>) -> Self {
        self.steps.push_back(Step::Events(events));
        self
    }

    /// Next read reports the device unplugged
    #[must_use]
    pub fn then_disconnect(mut self) -> Self {
        self.steps.push_back(Step::Disconnect);
        self
    }

    /// Next read fails with a fatal IO error
    #[must_use]
    pub fn then_fail(mut self) -> Self {
        self.steps.push_back(Step::Fail);
        self
    }

    /// Box as a trait object
    #[must_use]
    pub fn boxed(self) -> Box<dyn InputDevice> {
        Box::new(self)
    }
}

impl InputDevice for ScriptedDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_batch(&mut self) -> Result<Vec<RawKeyEvent>, InputError> {
        match self.steps.pop_front() {
            Some(Step::Events(events)) => Ok(events),
            Some(Step::Disconnect) => Err(InputError::Disconnected),
            Some(Step::Fail) => Err(InputError::Io(io::Error::other("device failed"))),
            None => {
                std::thread::sleep(Duration::from_millis(5));
                Ok(Vec::new())
            }
        }
    }
}

/// Enumerator returning one scripted device list per call, then nothing
#[derive(Default)]
pub struct ScriptedEnumerator {
    rounds: VecDeque<Vec<Box<dyn InputDevice>>>,
}

impl ScriptedEnumerator {
    /// Enumerator over `rounds`
    #[must_use]
    pub fn new(rounds: Vec<Vec<Box<dyn InputDevice>>>) -> Self {
        Self {
            rounds: rounds.into(),
        }
    }
}

impl DeviceEnumerator for ScriptedEnumerator {
    fn enumerate(&mut self) -> Result<Vec<Box<dyn InputDevice>>, InputError> {
        Ok(self.rounds.pop_front().unwrap_or_default())
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[derive(Debug, Default)]
struct ProbeInner {
    constructs: AtomicUsize,
    starts: AtomicUsize,
    updates: AtomicUsize,
    stops: AtomicUsize,
    keys: Mutex<Vec<String>>,
}

/// Shared hook counters for [`ScriptedApp`] instances
#[derive(Clone, Debug, Default)]
pub struct AppProbe {
    inner: Arc<ProbeInner>,
}

impl AppProbe {
    /// Instances constructed
    #[must_use]
    pub fn constructs(&self) -> usize {
        self.inner.constructs.load(Ordering::SeqCst)
    }

    /// `start` calls
    #[must_use]
    pub fn starts(&self) -> usize {
        self.inner.starts.load(Ordering::SeqCst)
    }

    /// `update` calls entered
    #[must_use]
    pub fn updates(&self) -> usize {
        self.inner.updates.load(Ordering::SeqCst)
    }

    /// `stop` calls
    #[must_use]
    pub fn stops(&self) -> usize {
        self.inner.stops.load(Ordering::SeqCst)
    }

    /// Key hooks entered, as `down KEY` / `up KEY`
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.keys.lock().clone()
    }
}

/// Configurable app unit that reports its hooks to an [`AppProbe`]
#[derive(Clone, Debug, Default)]
pub struct ScriptedApp {
    probe: AppProbe,
    fail_start: bool,
    fail_updates: bool,
    fail_keys: bool,
    panic_keys: bool,
    hang: Option<Arc<AtomicBool>>,
}

impl ScriptedApp {
    /// Well-behaved app
    #[must_use]
    pub fn new(probe: AppProbe) -> Self {
        Self {
            probe,
            ..Self::default()
        }
    }

    /// `start` returns an error
    #[must_use]
    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Every `update` returns an error
    #[must_use]
    pub fn failing_updates(mut self) -> Self {
        self.fail_updates = true;
        self
    }

    /// Key handlers return an error
    #[must_use]
    pub fn failing_keys(mut self) -> Self {
        self.fail_keys = true;
        self
    }

    /// Key handlers panic
    #[must_use]
    pub fn panicking_keys(mut self) -> Self {
        self.panic_keys = true;
        self
    }

    /// `update` blocks until `release` is raised
    #[must_use]
    pub fn hanging_update(mut self, release: Arc<AtomicBool>) -> Self {
        self.hang = Some(release);
        self
    }

    /// Factory stamping out copies of this app
    pub fn into_factory(
        self,
    ) -> impl Fn(AppServices) -> anyhow::Result<Box<dyn AppUnit>> + Send + Sync + 'static {
        move |_services| {
            self.probe.inner.constructs.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(self.clone()) as Box<dyn AppUnit>)
        }
    }

    fn key(&self, label: String) -> HookResult {
        self.probe.inner.keys.lock().push(label);
        if self.panic_keys {
            panic!("scripted key panic");
        }
        if self.fail_keys {
            anyhow::bail!("scripted key failure");
        }
        Ok(())
    }
}

impl AppUnit for ScriptedApp {
    fn start(&mut self) -> HookResult {
        self.probe.inner.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            anyhow::bail!("scripted start failure");
        }
        Ok(())
    }

    fn update(&mut self) -> HookResult {
        self.probe.inner.updates.fetch_add(1, Ordering::SeqCst);
        if let Some(release) = &self.hang {
            while !release.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(5));
            }
        }
        if self.fail_updates {
            anyhow::bail!("scripted update failure");
        }
        Ok(())
    }

    fn on_key_down(&mut self, key: &KeyId) -> HookResult {
        self.key(format!("down {key}"))
    }

    fn on_key_up(&mut self, key: &KeyId) -> HookResult {
        self.key(format!("up {key}"))
    }

    fn stop(&mut self) -> HookResult {
        self.probe.inner.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A [`ServiceTemplate`] over headless devices, with the receiving ends
/// exposed for inspection
pub struct TestServices {
    /// Template to hand to an `AppManager`
    pub template: ServiceTemplate,
    /// Commands apps sent to the display
    pub display_rx: UnboundedReceiver<DisplayCommand>,
    /// Lifecycle requests apps posted
    pub control_rx: UnboundedReceiver<ControlRequest>,
    /// Frames pushed to the memory display
    pub frames: FrameLog,
    /// Everything apps asked to speak
    pub speech: Arc<NullSpeaker>,
}

impl TestServices {
    /// 128x64 headless services with scratch space under `data_dir`
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        let (device, frames) = MemoryDisplay::new(128, 64);
        let (display, display_rx) = DisplayHandle::channel(share(device));
        let (control, control_rx) = ControlHandle::channel();
        let speech = Arc::new(NullSpeaker::default());
        let template = ServiceTemplate::new(
            display,
            fixed_fonts(4, 6),
            Arc::clone(&speech) as Arc<dyn Speaker>,
            SfxPlayer::disabled(),
            control,
            Vec::new(),
            data_dir,
        );
        Self {
            template,
            display_rx,
            control_rx,
            frames,
            speech,
        }
    }

    /// Drain queued display commands
    pub fn drain_display(&mut self) -> Vec<DisplayCommand> {
        let mut out = Vec::new();
        while let Ok(cmd) = self.display_rx.try_recv() {
            out.push(cmd);
        }
        out
    }
}
