//! Audio output
//!
//! Speech is played synchronously through an [`AudioSink`]; sound effects
//! are fire-and-forget through [`SfxPlayer`].

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, warn};

/// Errors from audio playback
#[derive(Debug, Error)]
pub enum AudioError {
    /// The player binary could not be started
    #[error("Failed to start audio player {program}: {source}")]
    Spawn {
        /// Program that was attempted
        program: String,
        /// Underlying IO error
        source: io::Error,
    },

    /// Streaming audio to the player failed
    #[error("Audio playback failed: {0}")]
    Io(#[from] io::Error),
}

/// Blocking PCM output
pub trait AudioSink: Send + Sync {
    /// Play raw PCM and return when playback has finished
    ///
    /// # Errors
    ///
    /// Returns an `AudioError` if the audio could not be played.
    fn play(&self, pcm: &[u8]) -> Result<(), AudioError>;
}

/// Plays 16-bit mono PCM through `aplay`, bounded by `timeout`
#[derive(Clone, Debug)]
pub struct AplayPlayer {
    program: String,
    sample_rate: u32,
    timeout_secs: u32,
}

impl AplayPlayer {
    /// Player for the given sample rate
    #[must_use]
    pub fn new(sample_rate: u32) -> Self {
        Self {
            program: "aplay".to_string(),
            sample_rate,
            timeout_secs: 5,
        }
    }

    /// Use a different player binary
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("timeout");
        cmd.arg(self.timeout_secs.to_string())
            .arg(&self.program)
            .args(["-R", "400", "-r"])
            .arg(self.sample_rate.to_string())
            .args(["-f", "S16_LE", "-t", "raw", "-"]);
        cmd
    }
}

impl AudioSink for AplayPlayer {
    fn play(&self, pcm: &[u8]) -> Result<(), AudioError> {
        let mut child = self
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| AudioError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(pcm) {
                // the player exits early when the timeout fires
                debug!(error = %e, "Audio player closed its input");
            }
        }
        let status = child.wait()?;
        if !status.success() {
            debug!(status = %status, "Audio player exited with failure");
        }
        Ok(())
    }
}

/// Fire-and-forget sound effect player
#[derive(Clone, Debug)]
pub struct SfxPlayer {
    program: Option<String>,
}

impl SfxPlayer {
    /// Play effects with `program <file>`
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: Some(program.into()),
        }
    }

    /// A player that plays nothing
    #[must_use]
    pub fn disabled() -> Self {
        Self { program: None }
    }

    /// Start playing `path` on a short-lived thread and return immediately.
    ///
    /// Missing files and player failures are logged, never reported.
    pub fn play(&self, path: &Path) {
        let Some(program) = self.program.clone() else {
            return;
        };
        if !path.is_file() {
            warn!(path = %path.display(), "Sound effect not found");
            return;
        }
        let path: PathBuf = path.to_path_buf();
        let spawned = std::thread::Builder::new()
            .name("sfx".to_string())
            .spawn(move || {
                let result = Command::new(&program)
                    .arg(&path)
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status();
                if let Err(e) = result {
                    warn!(program = %program, error = %e, "Failed to play sound effect");
                }
            });
        if let Err(e) = spawned {
            warn!(error = %e, "Failed to spawn sound effect thread");
        }
    }
}

impl Default for SfxPlayer {
    fn default() -> Self {
        Self::new("aplay")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aplay_command_line() {
        let player = AplayPlayer::new(22050);
        let cmd = player.command();
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(cmd.get_program(), "timeout");
        assert_eq!(
            args,
            vec!["5", "aplay", "-R", "400", "-r", "22050", "-f", "S16_LE", "-t", "raw", "-"]
        );
    }

    #[test]
    fn test_disabled_sfx_ignores_requests() {
        SfxPlayer::disabled().play(Path::new("/nonexistent.wav"));
        SfxPlayer::new("aplay").play(Path::new("/nonexistent.wav"));
    }
}
