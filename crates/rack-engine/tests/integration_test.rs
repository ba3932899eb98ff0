//! Signal Chain Integration Tests
//!
//! Tests the complete chain:
//! - Routing under every order
//! - Bypass transparency
//! - Live and offline graphs producing identical audio
//! - Click-free live edits

use std::f64::consts::PI;
use std::sync::Arc;

use rack_core::{AudioBuffer, ChainOrder, EffectKind, ParameterState, RENDER_QUANTUM};
use rack_engine::{ChainGraph, ContextKind, Edge, EngineContext, LiveConfig, live_engine};

const SAMPLE_RATE: u32 = 48000;

fn sine(freq: f64, amplitude: f64, frames: usize) -> AudioBuffer {
    let samples: Vec<f64> = (0..frames)
        .map(|i| amplitude * (2.0 * PI * freq * i as f64 / SAMPLE_RATE as f64).sin())
        .collect();
    AudioBuffer::from_planar(vec![samples.clone(), samples], SAMPLE_RATE).unwrap()
}

fn constant(value: f64, frames: usize) -> AudioBuffer {
    AudioBuffer::from_planar(vec![vec![value; frames]; 2], SAMPLE_RATE).unwrap()
}

fn offline_render(source: &AudioBuffer, order: &ChainOrder, state: &ParameterState) -> AudioBuffer {
    let mut ctx = EngineContext::new(ContextKind::Offline, SAMPLE_RATE);
    let graph = ChainGraph::build(&mut ctx, order, state);
    assert!(graph.start_source(&mut ctx, Arc::new(source.clone()), 0));
    ctx.render(source.frames()).unwrap()
}

fn permutations(kinds: &[EffectKind]) -> Vec<Vec<EffectKind>> {
    if kinds.is_empty() {
        return vec![Vec::new()];
    }
    let mut out = Vec::new();
    for i in 0..kinds.len() {
        let mut rest = kinds.to_vec();
        let head = rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, head);
            out.push(tail);
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROUTING TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_every_order_routes_exactly() {
    let mut ctx = EngineContext::new(ContextKind::Offline, SAMPLE_RATE);
    let mut graph = ChainGraph::build(&mut ctx, &ChainOrder::default(), &ParameterState::new());
    let internal_edges = ctx.edges().len() - (EffectKind::COUNT + 1);

    let mut orders = permutations(&EffectKind::ALL);
    orders.push(vec![EffectKind::Delay]);
    orders.push(vec![EffectKind::Reverb, EffectKind::Eq]);
    orders.push(Vec::new());

    for order in orders {
        graph.rewire(&mut ctx, order.iter().copied());

        let mut expected = Vec::new();
        let mut previous = graph.source();
        for kind in &order {
            let unit = graph.units().get(*kind);
            expected.push(Edge { from: previous, to: unit.input() });
            previous = unit.output();
        }
        expected.push(Edge { from: previous, to: ctx.destination() });

        assert_eq!(graph.router().wiring(), expected.as_slice(), "order {order:?}");
        assert_eq!(ctx.edges().len(), internal_edges + order.len() + 1);
        assert_eq!(ctx.outgoing(graph.source()).count(), 1);
    }
}

#[test]
fn test_rewire_keeps_signal_single() {
    // A bypassed chain in any order is an exact copy; a duplicated path
    // would double the signal.
    let mut state = ParameterState::new();
    for kind in EffectKind::ALL {
        state.set_bypass(kind, true);
    }
    let source = constant(0.125, 4 * RENDER_QUANTUM);

    let mut ctx = EngineContext::new(ContextKind::Offline, SAMPLE_RATE);
    let mut graph = ChainGraph::build(&mut ctx, &ChainOrder::default(), &state);
    graph.rewire(&mut ctx, [EffectKind::Reverb, EffectKind::Compressor]);
    graph.rewire(&mut ctx, EffectKind::ALL.into_iter().rev());
    graph.start_source(&mut ctx, Arc::new(source.clone()), 0);

    let out = ctx.render(source.frames()).unwrap();
    assert!(out.channel(0).iter().all(|&s| s == 0.125));
}

// ═══════════════════════════════════════════════════════════════════════════════
// BYPASS AND LEVEL TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_all_bypassed_is_bit_exact() {
    let mut state = ParameterState::new();
    for kind in EffectKind::ALL {
        state.set_bypass(kind, true);
    }
    let source = sine(440.0, 0.8, 10_000);
    let out = offline_render(&source, &ChainOrder::default(), &state);
    assert_eq!(out.channels(), source.channels());
}

#[test]
fn test_empty_chain_is_bit_exact() {
    let source = sine(1000.0, 0.5, 3_000);
    let out = offline_render(&source, &ChainOrder::empty(), &ParameterState::new());
    assert_eq!(out.channels(), source.channels());
}

#[test]
fn test_flat_eq_is_transparent() {
    let source = sine(440.0, 0.5, 8_000);
    let order = ChainOrder::new(vec![EffectKind::Eq]).unwrap();
    let out = offline_render(&source, &order, &ParameterState::new());
    for (a, b) in out.channel(0).iter().zip(source.channel(0)) {
        assert!((a - b).abs() < 1e-9);
    }
}

#[test]
fn test_max_feedback_decays() {
    let mut state = ParameterState::new();
    state.set(EffectKind::Delay, "feedback", 0.9).unwrap();
    state.set(EffectKind::Delay, "time", 0.05).unwrap();
    state.set(EffectKind::Delay, "mix", 1.0).unwrap();
    let order = ChainOrder::new(vec![EffectKind::Delay]).unwrap();

    let mut source = constant(0.0, SAMPLE_RATE as usize * 4);
    source.channel_mut(0)[0] = 1.0;
    let out = offline_render(&source, &order, &state);

    let second = SAMPLE_RATE as usize;
    let peak = |range: std::ops::Range<usize>| out.channel(0)[range].iter().fold(0.0f64, |m, s| m.max(s.abs()));
    assert!(peak(0..second) <= 1.0);
    assert!(peak(3 * second..4 * second) < 0.01);
    assert!(!out.has_non_finite());
}

#[test]
fn test_reverb_adds_tail() {
    let mut source = constant(0.0, SAMPLE_RATE as usize);
    source.channel_mut(0)[0] = 1.0;
    source.channel_mut(1)[0] = 1.0;
    let order = ChainOrder::new(vec![EffectKind::Reverb]).unwrap();
    let out = offline_render(&source, &order, &ParameterState::new());
    // dry path at 1 - mix, plus a quiet first wet sample
    assert!((out.channel(0)[0] - 0.7).abs() < 0.01);
    assert!(out.channel(0)[1000..].iter().any(|s| s.abs() > 0.0));
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIVE / OFFLINE PARITY
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_live_matches_offline() {
    let mut state = ParameterState::new();
    state.set(EffectKind::Eq, "lowGain", 6.0).unwrap();
    state.set(EffectKind::Compressor, "threshold", -30.0).unwrap();
    state.set(EffectKind::Delay, "time", 0.01).unwrap();
    state.set(EffectKind::Reverb, "mix", 0.5).unwrap();
    let order = ChainOrder::new(vec![EffectKind::Reverb, EffectKind::Delay, EffectKind::Eq, EffectKind::Compressor]).unwrap();
    let source = sine(220.0, 0.7, 20 * RENDER_QUANTUM);

    let offline = offline_render(&source, &order, &state);

    let config = LiveConfig::default().with_sample_rate(SAMPLE_RATE);
    let (mut chain, mut processor) = live_engine(config, order, state).unwrap();
    chain.load(source.clone()).unwrap();
    chain.play().unwrap();
    let mut live = Vec::new();
    for _ in 0..20 {
        let block = processor.render_quantum();
        live.extend_from_slice(&block.channels[1]);
    }

    assert_eq!(live.as_slice(), offline.channel(1));
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIVE EDIT TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_live_bypass_is_click_free() {
    let order = ChainOrder::new(vec![EffectKind::Compressor]).unwrap();
    let config = LiveConfig::default().with_sample_rate(SAMPLE_RATE);
    let (mut chain, mut processor) = live_engine(config, order, ParameterState::new()).unwrap();
    chain.load(constant(0.5, SAMPLE_RATE as usize * 3)).unwrap();
    chain.play().unwrap();

    // settle the compressor
    let mut last = 0.0;
    for _ in 0..(SAMPLE_RATE as usize / RENDER_QUANTUM) {
        last = processor.render_quantum().channels[0][RENDER_QUANTUM - 1];
    }
    assert!(last < 0.4, "compressor should reduce a -6 dB signal");

    chain.toggle_bypass(EffectKind::Compressor);
    let mut max_step = 0.0f64;
    for _ in 0..(SAMPLE_RATE as usize / RENDER_QUANTUM) {
        let block = processor.render_quantum();
        for &s in &block.channels[0] {
            max_step = max_step.max((s - last).abs());
            last = s;
        }
    }
    assert!(max_step < 2e-3, "step {max_step}");
    assert!((last - 0.5).abs() < 1e-6);
}

#[test]
fn test_live_reorder_while_playing() {
    let mut state = ParameterState::new();
    for kind in EffectKind::ALL {
        state.set_bypass(kind, true);
    }
    let config = LiveConfig::default().with_sample_rate(SAMPLE_RATE);
    let (mut chain, mut processor) = live_engine(config, ChainOrder::default(), state).unwrap();
    chain.load(constant(0.25, 10 * RENDER_QUANTUM)).unwrap();
    chain.play().unwrap();

    processor.render_quantum();
    chain.move_unit(0, 3).unwrap();
    chain.move_unit(2, 1).unwrap();
    let block = processor.render_quantum();
    assert!(block.channels[0].iter().all(|&s| s == 0.25));
    assert_eq!(chain.order().ids(), vec!["compressor", "reverb", "delay", "eq"]);
}
