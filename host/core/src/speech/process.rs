//! Long-lived external synthesis process
//!
//! The synthesizer reads one line of text per request on stdin and writes raw
//! PCM to stdout with no framing of its own. [`SynthProcess`] keeps one
//! instance alive, serializes requests through a mutex and decides when a
//! response is complete according to its [`Framing`].

use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

// =============================================================================
// Errors
// =============================================================================

/// Errors from the synthesis pipeline
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// The synthesis binary could not be started
    #[error("Failed to start synthesizer {program}: {source}")]
    Spawn {
        /// Program that was attempted
        program: String,
        /// Underlying IO error
        source: io::Error,
    },

    /// The request could not be written to the process
    #[error("Failed to send text to synthesizer: {0}")]
    Write(#[source] io::Error),

    /// The process produced no audio for the request
    #[error("Synthesizer produced no audio")]
    EmptyOutput,
}

/// Text-to-PCM backend
pub trait Synthesizer: Send + Sync {
    /// Synthesize one utterance to raw PCM
    ///
    /// # Errors
    ///
    /// Returns a `SynthesisError` when no audio could be produced.
    fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisError>;
}

// =============================================================================
// Configuration
// =============================================================================

/// How the end of a response is recognised
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Framing {
    /// Output has started and then stayed quiet for the settle window
    Quiescence,
    /// Output ends with this byte sequence, which is stripped
    Delimiter(Vec<u8>),
}

/// Response timing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SynthTiming {
    /// Upper bound on one response
    pub response_timeout: Duration,
    /// Quiet period that ends a response under [`Framing::Quiescence`]
    pub settle: Duration,
}

impl Default for SynthTiming {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(4),
            settle: Duration::from_millis(100),
        }
    }
}

/// Program and arguments of the synthesis process
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynthCommand {
    /// Executable
    pub program: PathBuf,
    /// Arguments
    pub args: Vec<String>,
}

impl SynthCommand {
    /// Arbitrary command line
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `piper --sentence_silence 0.1 --model <model> --output-raw [extra...]`
    #[must_use]
    pub fn piper(binary: impl Into<PathBuf>, model: &std::path::Path, extra: &[String]) -> Self {
        let mut args = vec![
            "--sentence_silence".to_string(),
            "0.1".to_string(),
            "--model".to_string(),
            model.display().to_string(),
            "--output-raw".to_string(),
        ];
        args.extend_from_slice(extra);
        Self::new(binary, args)
    }
}

// =============================================================================
// Process wrapper
// =============================================================================

struct Running {
    child: Child,
    stdin: ChildStdin,
    chunks: mpsc::Receiver<Vec<u8>>,
}

impl Running {
    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn terminate(mut self) {
        drop(self.stdin);
        if let Err(e) = self.child.kill() {
            // already exited
            debug!(error = %e, "Synthesizer kill failed");
        }
        let _ = self.child.wait();
    }
}

/// One persistent synthesis process, restarted on failure
pub struct SynthProcess {
    command: SynthCommand,
    framing: Framing,
    timing: SynthTiming,
    running: Mutex<Option<Running>>,
    spawns: AtomicUsize,
}

impl SynthProcess {
    /// Create a wrapper; the process starts on the first request or [`Self::start`]
    #[must_use]
    pub fn new(command: SynthCommand, framing: Framing, timing: SynthTiming) -> Self {
        Self {
            command,
            framing,
            timing,
            running: Mutex::new(None),
            spawns: AtomicUsize::new(0),
        }
    }

    /// Start the process now instead of on first use
    ///
    /// # Errors
    ///
    /// Returns `SynthesisError::Spawn` if the binary cannot be started.
    pub fn start(&self) -> Result<(), SynthesisError> {
        let mut slot = self.running.lock();
        if slot.as_mut().is_some_and(Running::is_alive) {
            return Ok(());
        }
        if let Some(old) = slot.take() {
            old.terminate();
        }
        *slot = Some(self.spawn()?);
        Ok(())
    }

    /// How many times a process has been started
    #[must_use]
    pub fn spawn_count(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }

    /// Stop the process if it is running
    pub fn shutdown(&self) {
        if let Some(running) = self.running.lock().take() {
            info!(program = %self.command.program.display(), "Stopping synthesizer");
            running.terminate();
        }
    }

    fn spawn(&self) -> Result<Running, SynthesisError> {
        let program = self.command.program.display().to_string();
        let mut child = Command::new(&self.command.program)
            .args(&self.command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SynthesisError::Spawn {
                program: program.clone(),
                source,
            })?;

        let spawn_err = |what: &str| SynthesisError::Spawn {
            program: program.clone(),
            source: io::Error::other(format!("child {what} unavailable")),
        };
        let stdin = child.stdin.take().ok_or_else(|| spawn_err("stdin"))?;
        let mut stdout = child.stdout.take().ok_or_else(|| spawn_err("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| spawn_err("stderr"))?;

        let (tx, chunks) = mpsc::channel();
        std::thread::Builder::new()
            .name("synth-stdout".to_string())
            .spawn(move || {
                let mut buf = [0u8; 4096];
                loop {
                    match stdout.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if tx.send(buf[..n].to_vec()).is_err() {
                                break;
                            }
                        }
                    }
                }
            })
            .map_err(|source| SynthesisError::Spawn {
                program: program.clone(),
                source,
            })?;

        std::thread::Builder::new()
            .name("synth-stderr".to_string())
            .spawn(move || {
                for line in BufReader::new(stderr).lines() {
                    match line {
                        Ok(line) => debug!(target: "proxi_core::speech::stderr", "{}", line.trim_end()),
                        Err(_) => break,
                    }
                }
            })
            .map_err(|source| SynthesisError::Spawn {
                program: program.clone(),
                source,
            })?;

        let count = self.spawns.fetch_add(1, Ordering::SeqCst) + 1;
        info!(program = %program, pid = child.id(), spawn = count, "Synthesizer started");
        Ok(Running {
            child,
            stdin,
            chunks,
        })
    }

    /// Send one request and collect its response
    fn exchange(&self, running: &mut Running, line: &str) -> Result<Vec<u8>, SynthesisError> {
        let stale: usize = running.chunks.try_iter().map(|c| c.len()).sum();
        if stale > 0 {
            debug!(bytes = stale, "Discarded stale synthesizer output");
        }

        let submit = |stdin: &mut ChildStdin| -> io::Result<()> {
            stdin.write_all(line.as_bytes())?;
            stdin.write_all(b"\n")?;
            stdin.flush()
        };
        submit(&mut running.stdin).map_err(SynthesisError::Write)?;

        let deadline = Instant::now() + self.timing.response_timeout;
        let mut output = Vec::new();
        loop {
            let now = Instant::now();
            if now >= deadline {
                debug!(bytes = output.len(), "Synthesizer response timed out");
                break;
            }
            let remaining = deadline - now;
            let wait = match self.framing {
                Framing::Quiescence if !output.is_empty() => self.timing.settle.min(remaining),
                _ => remaining,
            };

            match running.chunks.recv_timeout(wait) {
                Ok(chunk) => {
                    output.extend_from_slice(&chunk);
                    if let Framing::Delimiter(delim) = &self.framing {
                        if !delim.is_empty() && output.ends_with(delim) {
                            output.truncate(output.len() - delim.len());
                            break;
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if !output.is_empty() && self.framing == Framing::Quiescence {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        Ok(output)
    }
}

impl Synthesizer for SynthProcess {
    fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisError> {
        let line = text.replace(['\r', '\n'], " ");
        let mut slot = self.running.lock();
        // a spawn after the first ever is a restart; one per request
        let mut restarted = false;

        loop {
            if !slot.as_mut().is_some_and(Running::is_alive) {
                if let Some(dead) = slot.take() {
                    warn!("Synthesizer not running, restarting");
                    dead.terminate();
                }
                restarted = self.spawn_count() > 0;
                *slot = Some(self.spawn()?);
            }
            let Some(running) = slot.as_mut() else {
                return Err(SynthesisError::EmptyOutput);
            };

            let error = match self.exchange(running, &line) {
                Ok(audio) if !audio.is_empty() => return Ok(audio),
                Ok(_) => SynthesisError::EmptyOutput,
                Err(e) => e,
            };
            if let Some(failed) = slot.take() {
                failed.terminate();
            }
            if restarted {
                warn!(error = %error, "Synthesizer failed after restart");
                return Err(error);
            }
            warn!(error = %error, "Synthesizer request failed, restarting");
        }
    }
}

impl Drop for SynthProcess {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SynthProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthProcess")
            .field("command", &self.command)
            .field("framing", &self.framing)
            .field("spawns", &self.spawn_count())
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn echo(framing: Framing) -> SynthProcess {
        SynthProcess::new(
            SynthCommand::new("cat", Vec::new()),
            framing,
            SynthTiming::default(),
        )
    }

    #[test]
    fn test_quiescence_collects_response() {
        let synth = echo(Framing::Quiescence);
        assert_eq!(synth.synthesize("hello").unwrap(), b"hello\n".to_vec());
        assert_eq!(synth.synthesize("again").unwrap(), b"again\n".to_vec());
        assert_eq!(synth.spawn_count(), 1);
    }

    #[test]
    fn test_delimiter_is_stripped() {
        let synth = echo(Framing::Delimiter(b"\n".to_vec()));
        assert_eq!(synth.synthesize("hello").unwrap(), b"hello".to_vec());
    }

    #[test]
    fn test_newlines_flattened_to_one_request() {
        let synth = echo(Framing::Delimiter(b"\n".to_vec()));
        assert_eq!(synth.synthesize("two\nlines").unwrap(), b"two lines".to_vec());
    }

    #[test]
    fn test_dead_process_restarts_once_then_fails() {
        let synth = SynthProcess::new(
            SynthCommand::new("true", Vec::new()),
            Framing::Quiescence,
            SynthTiming {
                response_timeout: Duration::from_millis(500),
                settle: Duration::from_millis(50),
            },
        );
        assert!(synth.synthesize("hello").is_err());
        assert_eq!(synth.spawn_count(), 2);

        // dead on entry: that respawn is the only retry
        assert!(synth.synthesize("again").is_err());
        assert_eq!(synth.spawn_count(), 3);
    }

    #[test]
    fn test_missing_binary_is_spawn_error() {
        let synth = SynthProcess::new(
            SynthCommand::new("/nonexistent/synth", Vec::new()),
            Framing::Quiescence,
            SynthTiming::default(),
        );
        let err = synth.synthesize("hello").unwrap_err();
        assert!(matches!(err, SynthesisError::Spawn { .. }));
        assert_eq!(synth.spawn_count(), 0);
    }

    #[test]
    fn test_piper_command_line() {
        let cmd = SynthCommand::piper("piper", std::path::Path::new("/m/voice.onnx"), &[]);
        assert_eq!(
            cmd.args,
            vec!["--sentence_silence", "0.1", "--model", "/m/voice.onnx", "--output-raw"]
        );
    }
}
