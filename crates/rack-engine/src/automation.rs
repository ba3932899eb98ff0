//! Automation engine
//!
//! Translates parameter-store values into writes on node controls. Two
//! modes exist: immediate (used while building a graph, and for offline
//! renders) and smoothed (used for live edits, so nothing clicks).

use rack_core::{EditTarget, ParameterEdit, ParameterState};

use crate::context::EngineContext;
use crate::factory::{EffectUnit, UnitSet};
use crate::node::{NodeId, ParamSlot};

/// Time constant of the engage/thru crossfade (seconds)
pub const BYPASS_TIME_CONSTANT: f64 = 0.05;

/// Time constant of gain, dynamics, feedback and mix changes (seconds)
pub const PARAM_TIME_CONSTANT: f64 = 0.1;

/// Time constant of delay-time changes (seconds)
pub const DELAY_TIME_CONSTANT: f64 = 0.2;

/// One value for one node control
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlWrite {
    pub node: NodeId,
    pub slot: ParamSlot,
    pub value: f64,
}

/// Writes produced by one parameter edit
///
/// At most two controls move together (a crossfade pair); fixed size so it
/// can travel to the audio thread without allocating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlUpdate {
    writes: [Option<ControlWrite>; 2],
    pub time_constant: f64,
}

impl ControlUpdate {
    pub fn none() -> Self {
        Self {
            writes: [None, None],
            time_constant: 0.0,
        }
    }

    pub fn single(write: ControlWrite, time_constant: f64) -> Self {
        Self {
            writes: [Some(write), None],
            time_constant,
        }
    }

    pub fn pair(a: ControlWrite, b: ControlWrite, time_constant: f64) -> Self {
        Self {
            writes: [Some(a), Some(b)],
            time_constant,
        }
    }

    pub fn writes(&self) -> impl Iterator<Item = &ControlWrite> {
        self.writes.iter().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.iter().all(Option::is_none)
    }
}

/// How an update lands on the timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Every control of every unit jumps to its stored value
    Immediate,
    /// Only the edited control moves, along an exponential ramp
    Smoothed(ParameterEdit),
}

/// Maps parameter values onto unit controls
pub struct AutomationEngine;

impl AutomationEngine {
    /// Control writes for one edit target of one unit
    pub fn control_update(unit: &EffectUnit, state: &ParameterState, target: EditTarget) -> ControlUpdate {
        let kind = unit.kind();
        let params = state.effect(kind);

        let index = match target {
            EditTarget::Bypass => {
                let engaged = if params.is_bypassed() { 0.0 } else { 1.0 };
                let ports = unit.ports();
                return ControlUpdate::pair(
                    write(ports.engage, ParamSlot::Gain, engaged),
                    write(ports.thru, ParamSlot::Gain, 1.0 - engaged),
                    BYPASS_TIME_CONSTANT,
                );
            }
            EditTarget::Param(index) => index,
        };

        let Some(desc) = kind.descriptor().params.get(index) else {
            log::warn!("{kind}: no parameter at index {index}");
            return ControlUpdate::none();
        };
        let value = params.value_at(index);

        match (*unit, desc.id) {
            (EffectUnit::Eq { high, .. }, "highGain") => {
                ControlUpdate::single(write(high, ParamSlot::FilterGain, value), PARAM_TIME_CONSTANT)
            }
            (EffectUnit::Eq { mid, .. }, "midGain") => {
                ControlUpdate::single(write(mid, ParamSlot::FilterGain, value), PARAM_TIME_CONSTANT)
            }
            (EffectUnit::Eq { low, .. }, "lowGain") => {
                ControlUpdate::single(write(low, ParamSlot::FilterGain, value), PARAM_TIME_CONSTANT)
            }
            (EffectUnit::Compressor { compressor, .. }, id) => {
                let slot = match id {
                    "threshold" => ParamSlot::Threshold,
                    "ratio" => ParamSlot::Ratio,
                    "attack" => ParamSlot::Attack,
                    "release" => ParamSlot::Release,
                    _ => return ControlUpdate::none(),
                };
                ControlUpdate::single(write(compressor, slot, value), PARAM_TIME_CONSTANT)
            }
            (EffectUnit::Delay { delay, .. }, "time") => {
                ControlUpdate::single(write(delay, ParamSlot::DelayTime, value), DELAY_TIME_CONSTANT)
            }
            (EffectUnit::Delay { feedback, .. }, "feedback") => {
                ControlUpdate::single(write(feedback, ParamSlot::Gain, value), PARAM_TIME_CONSTANT)
            }
            (EffectUnit::Delay { dry, wet, .. }, "mix") | (EffectUnit::Reverb { dry, wet, .. }, "mix") => {
                ControlUpdate::pair(
                    write(dry, ParamSlot::Gain, 1.0 - value),
                    write(wet, ParamSlot::Gain, value),
                    PARAM_TIME_CONSTANT,
                )
            }
            // decay is descriptive; the impulse is fixed per context
            _ => ControlUpdate::none(),
        }
    }

    /// Every control of every unit, at current stored values
    pub fn snapshot(units: &UnitSet, state: &ParameterState) -> Vec<ControlUpdate> {
        units
            .iter()
            .flat_map(|unit| {
                let count = unit.kind().descriptor().params.len();
                std::iter::once(EditTarget::Bypass)
                    .chain((0..count).map(EditTarget::Param))
                    .map(move |target| Self::control_update(unit, state, target))
            })
            .filter(|update| !update.is_empty())
            .collect()
    }

    /// Push stored values into the context
    pub fn apply(ctx: &mut EngineContext, units: &UnitSet, state: &ParameterState, at_frame: u64, mode: ApplyMode) {
        match mode {
            ApplyMode::Immediate => {
                for update in Self::snapshot(units, state) {
                    Self::write(ctx, &update, at_frame, false);
                }
            }
            ApplyMode::Smoothed(edit) => {
                let update = Self::control_update(units.get(edit.kind), state, edit.target);
                Self::write(ctx, &update, at_frame, true);
            }
        }
    }

    /// Schedule one update on the node controls
    pub fn write(ctx: &mut EngineContext, update: &ControlUpdate, at_frame: u64, smoothed: bool) {
        for w in update.writes() {
            let Some(param) = ctx.param_mut(w.node, w.slot) else {
                log::error!("no {:?} control on {:?}", w.slot, w.node);
                continue;
            };
            if smoothed {
                param.set_target_at(w.value, at_frame, update.time_constant);
            } else {
                param.set_value_at(w.value, at_frame);
            }
        }
    }
}

#[inline]
fn write(node: NodeId, slot: ParamSlot, value: f64) -> ControlWrite {
    ControlWrite { node, slot, value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextKind;
    use crate::factory::EffectUnitFactory;
    use approx::assert_relative_eq;
    use rack_core::EffectKind;

    fn setup() -> (EngineContext, UnitSet, ParameterState) {
        let mut ctx = EngineContext::new(ContextKind::Offline, 44100);
        let units = EffectUnitFactory::build_all(&mut ctx);
        (ctx, units, ParameterState::new())
    }

    #[test]
    fn test_mix_is_complementary() {
        let (_, units, mut state) = setup();
        for kind in [EffectKind::Delay, EffectKind::Reverb] {
            for mix in [0.0, 0.25, 0.7, 1.0] {
                let edit = state.set(kind, "mix", mix).unwrap();
                let update = AutomationEngine::control_update(units.get(kind), &state, edit.target);
                let values: Vec<f64> = update.writes().map(|w| w.value).collect();
                assert_eq!(values.len(), 2);
                assert_relative_eq!(values[0] + values[1], 1.0, epsilon = 1e-12);
                assert_eq!(values[1], mix);
            }
        }
    }

    #[test]
    fn test_bypass_crossfade_pair() {
        let (_, units, mut state) = setup();
        let edit = state.set_bypass(EffectKind::Eq, true);
        let update = AutomationEngine::control_update(units.get(EffectKind::Eq), &state, edit.target);
        let ports = units.get(EffectKind::Eq).ports();
        let writes: Vec<_> = update.writes().copied().collect();
        assert_eq!(writes[0], ControlWrite { node: ports.engage, slot: ParamSlot::Gain, value: 0.0 });
        assert_eq!(writes[1], ControlWrite { node: ports.thru, slot: ParamSlot::Gain, value: 1.0 });
        assert_eq!(update.time_constant, BYPASS_TIME_CONSTANT);
    }

    #[test]
    fn test_delay_time_uses_slow_ramp() {
        let (_, units, mut state) = setup();
        let edit = state.set(EffectKind::Delay, "time", 0.5).unwrap();
        let update = AutomationEngine::control_update(units.get(EffectKind::Delay), &state, edit.target);
        assert_eq!(update.time_constant, DELAY_TIME_CONSTANT);
    }

    #[test]
    fn test_reverb_decay_has_no_control() {
        let (_, units, mut state) = setup();
        let edit = state.set(EffectKind::Reverb, "decay", 4.0).unwrap();
        assert!(AutomationEngine::control_update(units.get(EffectKind::Reverb), &state, edit.target).is_empty());
    }

    #[test]
    fn test_feedback_stays_below_unity() {
        let (mut ctx, units, state) = setup();
        let EffectUnit::Delay { feedback, .. } = *units.get(EffectKind::Delay) else {
            unreachable!()
        };
        let update = ControlUpdate::single(write(feedback, ParamSlot::Gain, 1e9), 0.0);
        AutomationEngine::write(&mut ctx, &update, 0, false);
        assert!(ctx.param(feedback, ParamSlot::Gain).unwrap().final_value() < 1.0);

        AutomationEngine::apply(&mut ctx, &units, &state, 0, ApplyMode::Immediate);
        assert_eq!(ctx.param(feedback, ParamSlot::Gain).unwrap().final_value(), 0.4);
    }

    #[test]
    fn test_immediate_apply_is_idempotent() {
        let (mut ctx, units, state) = setup();
        AutomationEngine::apply(&mut ctx, &units, &state, 0, ApplyMode::Immediate);
        let first: Vec<f64> = AutomationEngine::snapshot(&units, &state)
            .iter()
            .flat_map(|u| u.writes().map(|w| ctx.param(w.node, w.slot).unwrap().final_value()).collect::<Vec<_>>())
            .collect();
        AutomationEngine::apply(&mut ctx, &units, &state, 0, ApplyMode::Immediate);
        let second: Vec<f64> = AutomationEngine::snapshot(&units, &state)
            .iter()
            .flat_map(|u| u.writes().map(|w| ctx.param(w.node, w.slot).unwrap().final_value()).collect::<Vec<_>>())
            .collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2 * 4 + 3 + 4 + 1 + 1 + 2 + 2);
    }

    #[test]
    fn test_smoothed_apply_schedules_ramp() {
        let (mut ctx, units, mut state) = setup();
        let edit = state.set(EffectKind::Eq, "midGain", 12.0).unwrap();
        AutomationEngine::apply(&mut ctx, &units, &state, 256, ApplyMode::Smoothed(edit));
        let EffectUnit::Eq { mid, .. } = *units.get(EffectKind::Eq) else {
            unreachable!()
        };
        let param = ctx.param(mid, ParamSlot::FilterGain).unwrap();
        assert!(param.is_automating());
        assert_eq!(param.final_value(), 12.0);
    }
}
