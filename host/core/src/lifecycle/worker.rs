//! Per-app tick thread

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle, Thread};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::app::{invoke_hook, AppUnit, Hook};

/// A loaded app instance; the lock serializes its hooks
pub(crate) type SharedUnit = Arc<Mutex<Box<dyn AppUnit>>>;

/// Control side of a running tick thread
pub(crate) struct WorkerHandle {
    running: Arc<AtomicBool>,
    ticks: Arc<AtomicU64>,
    thread: Thread,
    // the sender lives on the worker's stack; disconnection means it exited
    exited: Mutex<mpsc::Receiver<()>>,
    join: Option<JoinHandle<()>>,
    hz: f64,
}

impl WorkerHandle {
    /// Spawn the tick thread for `name`
    pub(crate) fn spawn(name: &str, unit: SharedUnit, hz: f64) -> io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let ticks = Arc::new(AtomicU64::new(0));
        let (exit_tx, exit_rx) = mpsc::channel::<()>();
        let period = Duration::from_secs_f64(1.0 / hz);

        let app = name.to_string();
        let flag = Arc::clone(&running);
        let counter = Arc::clone(&ticks);
        let join = thread::Builder::new()
            .name(format!("app-{name}"))
            .spawn(move || {
                let _exit = exit_tx;
                tick_loop(&app, &unit, &flag, &counter, period);
            })?;

        Ok(Self {
            running,
            ticks,
            thread: join.thread().clone(),
            exited: Mutex::new(exit_rx),
            join: Some(join),
            hz,
        })
    }

    /// Ask the loop to finish and wake it from its sleep
    pub(crate) fn request_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.thread.unpark();
    }

    /// Wait up to `timeout` for the thread to exit
    pub(crate) fn wait(&mut self, timeout: Duration) -> bool {
        let exited = matches!(
            self.exited.lock().recv_timeout(timeout),
            Ok(()) | Err(RecvTimeoutError::Disconnected)
        );
        if exited {
            if let Some(join) = self.join.take() {
                let _ = join.join();
            }
        }
        exited
    }

    /// Whether the thread is still alive
    pub(crate) fn is_alive(&self) -> bool {
        matches!(
            self.exited.lock().try_recv(),
            Err(mpsc::TryRecvError::Empty)
        )
    }

    /// Alive and not asked to stop
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && self.is_alive()
    }

    pub(crate) fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub(crate) fn hz(&self) -> f64 {
        self.hz
    }
}

fn tick_loop(
    app: &str,
    unit: &SharedUnit,
    running: &AtomicBool,
    ticks: &AtomicU64,
    period: Duration,
) {
    info!(app = %app, period_ms = period.as_millis() as u64, "App worker started");
    let _ = invoke_hook(app, Hook::Start, || unit.lock().start());

    let mut next = Instant::now();
    while running.load(Ordering::SeqCst) {
        let _ = invoke_hook(app, Hook::Update, || unit.lock().update());
        ticks.fetch_add(1, Ordering::Relaxed);

        next += period;
        let now = Instant::now();
        if next <= now {
            // overran: resume from now rather than bursting
            next = now;
            continue;
        }
        while running.load(Ordering::SeqCst) {
            let now = Instant::now();
            if now >= next {
                break;
            }
            thread::park_timeout(next - now);
        }
    }

    let _ = invoke_hook(app, Hook::Stop, || unit.lock().stop());
    debug!(app = %app, ticks = ticks.load(Ordering::Relaxed), "Tick loop finished");
    info!(app = %app, "App worker stopped");
}
