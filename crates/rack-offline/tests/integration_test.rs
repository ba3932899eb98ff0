//! Offline Export Integration Tests
//!
//! Tests the export pipeline end to end:
//! - Render + encode against an independent WAV reader
//! - Bypass transparency through the container
//! - Load failures vs render failures

use std::f64::consts::PI;
use std::sync::Arc;

use rack_core::{AudioBuffer, ChainOrder, EffectKind, ParameterState};
use rack_offline::{OfflineError, RenderJob, decode_bytes, load_source, wav};

const SAMPLE_RATE: u32 = 44100;

fn all_bypassed() -> ParameterState {
    let mut params = ParameterState::new();
    for kind in EffectKind::ALL {
        params.set_bypass(kind, true);
    }
    params
}

fn read_wav(bytes: &[u8]) -> (hound::WavSpec, Vec<i16>) {
    let reader = hound::WavReader::new(std::io::Cursor::new(bytes)).unwrap();
    let spec = reader.spec();
    let samples = reader.into_samples::<i16>().map(Result::unwrap).collect();
    (spec, samples)
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROUND TRIP TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_silent_source_exports_silence() {
    let silent = Arc::new(AudioBuffer::new(2, SAMPLE_RATE as usize / 2, SAMPLE_RATE));
    for order in [ChainOrder::default(), ChainOrder::empty()] {
        let file = RenderJob::new(silent.clone(), &order, &all_bypassed()).run().unwrap();
        let (spec, samples) = read_wav(&file.bytes);
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, SAMPLE_RATE);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(samples.len(), SAMPLE_RATE as usize);
        assert!(samples.iter().all(|&s| s.abs() <= 1));
    }
}

#[test]
fn test_bypassed_sine_matches_source() {
    // 1 s of 440 Hz, mono duplicated to stereo, full chain at default
    // settings but every unit bypassed
    let sine: Vec<f64> = (0..SAMPLE_RATE as usize)
        .map(|i| (2.0 * PI * 440.0 * i as f64 / SAMPLE_RATE as f64).sin())
        .collect();
    let mono = Arc::new(AudioBuffer::from_planar(vec![sine.clone()], SAMPLE_RATE).unwrap());

    let file = RenderJob::new(mono, &ChainOrder::default(), &all_bypassed()).run().unwrap();
    let (_, samples) = read_wav(&file.bytes);

    for (frame, pair) in samples.chunks(2).enumerate() {
        let expected = wav::quantize(sine[frame]);
        assert_eq!(pair, [expected, expected], "frame {frame}");
    }
}

#[test]
fn test_active_chain_changes_audio() {
    let sine: Vec<f64> = (0..SAMPLE_RATE as usize / 4)
        .map(|i| 0.8 * (2.0 * PI * 440.0 * i as f64 / SAMPLE_RATE as f64).sin())
        .collect();
    let source = Arc::new(AudioBuffer::from_planar(vec![sine.clone(), sine], SAMPLE_RATE).unwrap());
    let file = RenderJob::new(source.clone(), &ChainOrder::default(), &ParameterState::new())
        .run()
        .unwrap();
    assert_eq!(file.buffer.frames(), source.frames());
    assert_ne!(file.buffer.channel(0), source.channel(0));
    assert!(!file.buffer.has_non_finite());
}

#[test]
fn test_export_decodes_back() {
    let ramp: Vec<f64> = (0..1000).map(|i| i as f64 / 1000.0 - 0.5).collect();
    let source = Arc::new(AudioBuffer::from_planar(vec![ramp.clone(), ramp], SAMPLE_RATE).unwrap());
    let file = RenderJob::new(source, &ChainOrder::empty(), &ParameterState::new()).run().unwrap();

    let decoded = decode_bytes(file.bytes.clone(), Some("wav")).unwrap();
    assert_eq!(decoded.frames(), 1000);
    for (a, b) in decoded.channel(0).iter().zip(file.buffer.channel(0)) {
        // one step of the coarser positive scale plus truncation
        assert!((a - b).abs() <= 2.0 / 32767.0);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILE TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(AudioBuffer::new(2, 4410, SAMPLE_RATE));
    let file = RenderJob::new(source, &ChainOrder::default(), &ParameterState::new()).run().unwrap();
    let path = file.save_in(dir.path()).unwrap();

    assert!(path.file_name().unwrap().to_string_lossy().starts_with("Studio_Export_"));
    let loaded = load_source(&path).unwrap();
    assert_eq!(loaded.frames(), 4410);
    assert_eq!(loaded.sample_rate(), SAMPLE_RATE);
}

#[test]
fn test_load_and_render_failures_are_distinct() {
    let dir = tempfile::tempdir().unwrap();
    let corrupt = dir.path().join("corrupt.wav");
    std::fs::write(&corrupt, b"RIFF\x00\x00garbage").unwrap();
    let load_err = load_source(&corrupt).unwrap_err();
    assert!(load_err.is_load_failure());

    let empty = Arc::new(AudioBuffer::new(2, 0, SAMPLE_RATE));
    let render_err = RenderJob::new(empty, &ChainOrder::default(), &ParameterState::new())
        .run()
        .unwrap_err();
    assert!(!render_err.is_load_failure());
    assert!(matches!(render_err, OfflineError::InvalidSource(_)));
    assert_ne!(load_err.to_string(), render_err.to_string());
}
