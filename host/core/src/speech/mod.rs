//! Speech Synthesis Engine
//!
//! [`SpeechEngine::speak`] turns text into audio through a content-addressed
//! cache in front of a long-lived synthesis process:
//!
//! 1. Hash the literal text. On a cache hit, play the stored audio; the
//!    synthesizer is not touched.
//! 2. On a miss, apply the [`WordMap`] pronunciation fixups, synthesize,
//!    store the result under the hash of the *original* text, then play it.
//!
//! Progress is shown on screen unless the request is a background one.
//! Failures end in an error screen and a [`SpeechOutcome::Failed`], never in
//! an error returned to the caller.

mod audio;
mod cache;
mod process;
mod wordmap;

use std::sync::Arc;

use tracing::{debug, error, info, warn};

pub use audio::{AplayPlayer, AudioError, AudioSink, SfxPlayer};
pub use cache::{cache_key, SpeechCache, CACHE_EXTENSION};
pub use process::{Framing, SynthCommand, SynthProcess, SynthTiming, SynthesisError, Synthesizer};
pub use wordmap::WordMap;

use crate::display::{Bitmap, DisplayHandle, Layer, StatusIcons, ICON_SIZE};

/// What happened to a `speak` request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpeechOutcome {
    /// Blank text; nothing to say
    Skipped,
    /// Played from the cache
    Cached,
    /// Synthesized, cached and played
    Synthesized,
    /// No audio could be produced
    Failed(String),
}

/// The speech capability handed to apps
pub trait Speaker: Send + Sync {
    /// Say `text`, blocking until playback finishes.
    ///
    /// `background` suppresses the status screens.
    fn speak(&self, text: &str, background: bool) -> SpeechOutcome;

    /// Whether `text` already has cached audio
    fn is_cached(&self, text: &str) -> bool;
}

/// Cache + synthesizer + player, with on-screen status
pub struct SpeechEngine {
    synthesizer: Arc<dyn Synthesizer>,
    cache: SpeechCache,
    words: WordMap,
    sink: Arc<dyn AudioSink>,
    display: DisplayHandle,
    icons: StatusIcons,
}

impl SpeechEngine {
    /// Assemble an engine
    #[must_use]
    pub fn new(
        synthesizer: Arc<dyn Synthesizer>,
        cache: SpeechCache,
        words: WordMap,
        sink: Arc<dyn AudioSink>,
        display: DisplayHandle,
        icons: StatusIcons,
    ) -> Self {
        Self {
            synthesizer,
            cache,
            words,
            sink,
            display,
            icons,
        }
    }

    /// The cache backing this engine
    #[must_use]
    pub fn cache(&self) -> &SpeechCache {
        &self.cache
    }

    fn show_icon(&self, icon: &Arc<Bitmap>) {
        let y = self.display.size().height as i32 - ICON_SIZE as i32;
        self.display
            .draw_image(Layer::Overlay, Arc::clone(icon), 0, y);
    }

    fn clear_icon(&self) {
        let y = self.display.size().height as i32 - ICON_SIZE as i32;
        self.display
            .clear_region(Layer::Overlay, 0, y, ICON_SIZE, ICON_SIZE);
    }

    fn status(&self, background: bool, title: &str, body: &str, icon: Option<&Arc<Bitmap>>) {
        if background {
            return;
        }
        self.display.set_screen(title, body);
        if let Some(icon) = icon {
            self.show_icon(icon);
        }
    }

    fn play(&self, audio: &[u8], background: bool) {
        if let Err(e) = self.sink.play(audio) {
            warn!(error = %e, "Audio playback failed");
        }
        if !background {
            self.clear_icon();
        }
    }

    fn cached_audio(&self, text: &str) -> Option<Vec<u8>> {
        match self.cache.load(text) {
            Ok(audio) => audio,
            Err(e) => {
                warn!(error = %e, "Unreadable cache entry, synthesizing again");
                None
            }
        }
    }

    fn fail(&self, background: bool, reason: &str) -> SpeechOutcome {
        if !background {
            self.clear_icon();
            self.display.set_screen("Error", reason);
        }
        SpeechOutcome::Failed(reason.to_string())
    }
}

impl Speaker for SpeechEngine {
    fn speak(&self, text: &str, background: bool) -> SpeechOutcome {
        if text.trim().is_empty() {
            return SpeechOutcome::Skipped;
        }

        if let Some(audio) = self.cached_audio(text) {
            debug!(key = %cache_key(text), bytes = audio.len(), "Speech cache hit");
            self.status(background, "Cached", text, Some(&self.icons.speaking));
            self.play(&audio, background);
            return SpeechOutcome::Cached;
        }

        self.status(background, "Generating", text, Some(&self.icons.generating));
        let spoken = self.words.apply(text);
        let result = self.synthesizer.synthesize(&spoken);
        if !background {
            self.clear_icon();
        }

        let audio = match result {
            Ok(audio) if audio.is_empty() => {
                error!("Synthesizer returned no audio");
                return self.fail(background, "No audio generated");
            }
            Ok(audio) => audio,
            Err(SynthesisError::EmptyOutput) => {
                error!("Synthesizer returned no audio after restart");
                return self.fail(background, "No audio generated");
            }
            Err(e) => {
                error!(error = %e, "Speech synthesis failed");
                return self.fail(background, "TTS Generation Failed");
            }
        };

        match self.cache.store(text, &audio) {
            Ok(path) => info!(path = %path.display(), bytes = audio.len(), "Synthesized utterance"),
            Err(e) => warn!(error = %e, "Failed to cache synthesized audio"),
        }

        self.status(background, "Talking", text, Some(&self.icons.speaking));
        self.play(&audio, background);
        SpeechOutcome::Synthesized
    }

    fn is_cached(&self, text: &str) -> bool {
        self.cache.contains(text)
    }
}

impl std::fmt::Debug for SpeechEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechEngine")
            .field("cache", &self.cache)
            .field("word_map_entries", &self.words.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::display::{share, DisplayCommand, MemoryDisplay};
    use crate::testing::{CountingSynthesizer, RecordingSink};
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Fixture {
        engine: SpeechEngine,
        synth: Arc<CountingSynthesizer>,
        sink: Arc<RecordingSink>,
        rx: UnboundedReceiver<DisplayCommand>,
        _dir: tempfile::TempDir,
    }

    fn fixture(synth: CountingSynthesizer, words: WordMap) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let (display, _log) = MemoryDisplay::new(128, 64);
        let (handle, rx) = DisplayHandle::channel(share(display));
        let synth = Arc::new(synth);
        let sink = Arc::new(RecordingSink::default());
        let engine = SpeechEngine::new(
            Arc::clone(&synth) as Arc<dyn Synthesizer>,
            SpeechCache::open(dir.path().join("cache")).unwrap(),
            words,
            Arc::clone(&sink) as Arc<dyn AudioSink>,
            handle,
            StatusIcons::builtin(),
        );
        Fixture {
            engine,
            synth,
            sink,
            rx,
            _dir: dir,
        }
    }

    fn titles(rx: &mut UnboundedReceiver<DisplayCommand>) -> Vec<String> {
        let mut titles = Vec::new();
        while let Ok(cmd) = rx.try_recv() {
            if let DisplayCommand::SetScreen { title, .. } = cmd {
                titles.push(title);
            }
        }
        titles
    }

    #[test]
    fn test_blank_text_is_skipped() {
        let mut f = fixture(CountingSynthesizer::echo(), WordMap::empty());
        assert_eq!(f.engine.speak("   ", false), SpeechOutcome::Skipped);
        assert_eq!(f.synth.calls(), 0);
        assert!(titles(&mut f.rx).is_empty());
    }

    #[test]
    fn test_second_request_hits_cache() {
        let mut f = fixture(CountingSynthesizer::echo(), WordMap::empty());
        assert_eq!(f.engine.speak("Hello", false), SpeechOutcome::Synthesized);
        assert_eq!(f.engine.speak("Hello", false), SpeechOutcome::Cached);

        assert_eq!(f.synth.calls(), 1);
        let played = f.sink.played();
        assert_eq!(played.len(), 2);
        assert_eq!(played[0], played[1]);
        assert_eq!(titles(&mut f.rx), vec!["Generating", "Talking", "Cached"]);
    }

    #[test]
    fn test_word_map_applies_only_to_synthesis() {
        let words = WordMap::new(HashMap::from([("gif".to_string(), "jif".to_string())]));
        let f = fixture(CountingSynthesizer::echo(), words);
        f.engine.speak("gif", true);

        assert_eq!(f.synth.requests(), vec!["jif"]);
        assert!(f.engine.is_cached("gif"));
        assert!(!f.engine.is_cached("jif"));
        assert_eq!(f.engine.cache().load("gif").unwrap(), Some(b"jif".to_vec()));
    }

    #[test]
    fn test_cache_hit_skips_word_map() {
        let words = WordMap::new(HashMap::from([("gif".to_string(), "jif".to_string())]));
        let f = fixture(CountingSynthesizer::echo(), words);
        f.engine.cache().store("gif", b"stored").unwrap();

        assert_eq!(f.engine.speak("gif", true), SpeechOutcome::Cached);
        assert_eq!(f.synth.calls(), 0);
        assert_eq!(f.sink.played(), vec![b"stored".to_vec()]);
    }

    #[test]
    fn test_background_request_is_silent_on_screen() {
        let mut f = fixture(CountingSynthesizer::echo(), WordMap::empty());
        f.engine.speak("quiet", true);
        assert!(f.rx.try_recv().is_err());
    }

    #[test]
    fn test_empty_audio_shows_error() {
        let mut f = fixture(CountingSynthesizer::silent(), WordMap::empty());
        let outcome = f.engine.speak("Hello", false);

        assert_eq!(outcome, SpeechOutcome::Failed("No audio generated".to_string()));
        assert!(!f.engine.is_cached("Hello"));
        assert!(f.sink.played().is_empty());
        assert_eq!(titles(&mut f.rx), vec!["Generating", "Error"]);
    }

    #[test]
    fn test_synthesis_error_shows_error() {
        let mut f = fixture(CountingSynthesizer::failing(), WordMap::empty());
        let outcome = f.engine.speak("Hello", false);

        assert_eq!(outcome, SpeechOutcome::Failed("TTS Generation Failed".to_string()));
        assert_eq!(titles(&mut f.rx), vec!["Generating", "Error"]);
    }
}
