//! Compositor thread and speech cache behaviour through the public API

use std::sync::Arc;

use pretty_assertions::assert_eq;

use proxi_core::display::{self, share, DisplayTiming, FontId, Layer, MemoryDisplay, StatusIcons};
use proxi_core::speech::{AudioSink, SpeechCache, SpeechEngine, SpeechOutcome, Synthesizer, WordMap};
use proxi_core::testing::{fixed_fonts, CountingSynthesizer, RecordingSink};
use proxi_core::{DisplayHandle, Speaker};

// =============================================================================
// Display
// =============================================================================

#[test]
fn test_queued_draws_land_in_order() {
    let (device, log) = MemoryDisplay::new(64, 32);
    let (handle, worker) =
        display::start(share(device), fixed_fonts(4, 6), DisplayTiming::default()).unwrap();

    handle.clear_layer(Layer::Base);
    handle.draw_text(Layer::Base, FontId::Regular, "A", 0, 0);
    handle.draw_text(Layer::Base, FontId::Regular, "B", 8, 0);
    handle.shutdown();
    assert!(worker.join());

    let last = log.last().unwrap();
    assert_eq!(last.lit_in(0, 0, 4, 6), 24);
    assert_eq!(last.lit_in(8, 0, 4, 6), 24);
    for frame in log.frames() {
        if frame.lit_in(8, 0, 4, 6) > 0 {
            assert_eq!(frame.lit_in(0, 0, 4, 6), 24, "B rendered without A");
        }
    }
}

#[test]
fn test_sends_after_shutdown_are_ignored() {
    let (device, _log) = MemoryDisplay::new(32, 16);
    let (handle, worker) =
        display::start(share(device), fixed_fonts(4, 6), DisplayTiming::default()).unwrap();
    handle.shutdown();
    assert!(worker.join());

    // compositor is gone; producers must not panic
    handle.set_screen("Late", "ignored");
    assert!(!handle.send(proxi_core::DisplayCommand::ClearLayer(Layer::Overlay)));
    handle.set_contrast(40).unwrap();
}

// =============================================================================
// Speech
// =============================================================================

fn build_engine(cache_dir: &std::path::Path, synth: &Arc<CountingSynthesizer>) -> (SpeechEngine, Arc<RecordingSink>) {
    let (device, _log) = MemoryDisplay::new(128, 64);
    let (handle, _rx) = DisplayHandle::channel(share(device));
    let sink = Arc::new(RecordingSink::default());
    let engine = SpeechEngine::new(
        Arc::clone(synth) as Arc<dyn Synthesizer>,
        SpeechCache::open(cache_dir).unwrap(),
        WordMap::empty(),
        Arc::clone(&sink) as Arc<dyn AudioSink>,
        handle,
        StatusIcons::builtin(),
    );
    (engine, sink)
}

#[test]
fn test_repeat_utterance_is_byte_identical_and_not_resynthesized() {
    let dir = tempfile::tempdir().unwrap();
    let synth = Arc::new(CountingSynthesizer::echo());
    let (engine, sink) = build_engine(dir.path(), &synth);

    assert_eq!(engine.speak("Hello", false), SpeechOutcome::Synthesized);
    assert_eq!(engine.speak("Hello", false), SpeechOutcome::Cached);

    let played = sink.played();
    assert_eq!(played.len(), 2);
    assert_eq!(played[0], played[1]);
    assert_eq!(synth.calls(), 1);
}

#[test]
fn test_cache_survives_engine_restart() {
    let dir = tempfile::tempdir().unwrap();
    let first = Arc::new(CountingSynthesizer::echo());
    let (engine, _sink) = build_engine(dir.path(), &first);
    engine.speak("Good morning", true);
    drop(engine);

    let second = Arc::new(CountingSynthesizer::echo());
    let (engine, sink) = build_engine(dir.path(), &second);
    assert!(engine.is_cached("Good morning"));
    assert_eq!(engine.speak("Good morning", true), SpeechOutcome::Cached);
    assert_eq!(second.calls(), 0);
    assert_eq!(sink.played(), vec![b"Good morning".to_vec()]);
}

#[test]
fn test_failed_synthesis_is_not_cached() {
    let dir = tempfile::tempdir().unwrap();
    let synth = Arc::new(CountingSynthesizer::failing());
    let (engine, sink) = build_engine(dir.path(), &synth);

    let outcome = engine.speak("Hello", true);
    assert!(matches!(outcome, SpeechOutcome::Failed(_)));
    assert!(!engine.is_cached("Hello"));
    assert!(sink.played().is_empty());
    assert_eq!(synth.calls(), 1);
}
