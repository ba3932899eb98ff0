//! Parameter store
//!
//! Current values for every parameter of every effect kind, plus a bypass
//! flag per effect. Values are clamped to their descriptor range on entry,
//! so everything downstream can assume in-range values.

use crate::catalog::{EffectKind, ParameterDescriptor};
use crate::error::{RackError, RackResult};

/// What a single edit touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditTarget {
    Bypass,
    /// Index into the effect descriptor's parameter list
    Param(usize),
}

/// A single parameter edit, as handed to the automation engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParameterEdit {
    pub kind: EffectKind,
    pub target: EditTarget,
}

/// Values of one effect
#[derive(Debug, Clone, PartialEq)]
pub struct EffectParams {
    kind: EffectKind,
    bypass: bool,
    values: Vec<f64>,
}

impl EffectParams {
    fn defaults(kind: EffectKind) -> Self {
        Self {
            kind,
            bypass: false,
            values: kind.descriptor().defaults(),
        }
    }

    #[inline]
    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    #[inline]
    pub fn is_bypassed(&self) -> bool {
        self.bypass
    }

    pub fn value(&self, param: &str) -> Option<f64> {
        let index = self.kind.descriptor().param_index(param)?;
        Some(self.values[index])
    }

    /// Value by descriptor index
    #[inline]
    pub fn value_at(&self, index: usize) -> f64 {
        self.values[index]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Descriptor/value pairs in descriptor order
    pub fn iter(&self) -> impl Iterator<Item = (&'static ParameterDescriptor, f64)> + '_ {
        self.kind
            .descriptor()
            .params
            .iter()
            .zip(self.values.iter().copied())
    }
}

/// Parameter values and bypass flags for the whole catalog
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterState {
    effects: Vec<EffectParams>,
}

impl Default for ParameterState {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterState {
    /// Every effect at its catalog defaults, none bypassed
    pub fn new() -> Self {
        Self {
            effects: EffectKind::ALL.into_iter().map(EffectParams::defaults).collect(),
        }
    }

    #[inline]
    pub fn effect(&self, kind: EffectKind) -> &EffectParams {
        &self.effects[kind.index()]
    }

    pub fn value(&self, kind: EffectKind, param: &str) -> RackResult<f64> {
        self.effect(kind)
            .value(param)
            .ok_or_else(|| unknown_param(kind, param))
    }

    #[inline]
    pub fn is_bypassed(&self, kind: EffectKind) -> bool {
        self.effect(kind).bypass
    }

    /// Store a value, clamped to the descriptor range
    pub fn set(&mut self, kind: EffectKind, param: &str, value: f64) -> RackResult<ParameterEdit> {
        let desc = kind.descriptor();
        let index = desc
            .param_index(param)
            .ok_or_else(|| unknown_param(kind, param))?;
        let clamped = desc.params[index].clamp(value);
        if clamped != value {
            log::debug!("{kind}.{param}: {value} clamped to {clamped}");
        }
        self.effects[kind.index()].values[index] = clamped;
        Ok(ParameterEdit {
            kind,
            target: EditTarget::Param(index),
        })
    }

    /// Same as [`set`](Self::set) with the effect given by id
    pub fn set_by_id(&mut self, effect: &str, param: &str, value: f64) -> RackResult<ParameterEdit> {
        let kind = EffectKind::from_id(effect).ok_or_else(|| RackError::UnknownEffect(effect.to_string()))?;
        self.set(kind, param, value)
    }

    pub fn set_bypass(&mut self, kind: EffectKind, bypass: bool) -> ParameterEdit {
        self.effects[kind.index()].bypass = bypass;
        ParameterEdit {
            kind,
            target: EditTarget::Bypass,
        }
    }

    pub fn toggle_bypass(&mut self, kind: EffectKind) -> ParameterEdit {
        let bypass = !self.is_bypassed(kind);
        self.set_bypass(kind, bypass)
    }

    /// Back to catalog defaults
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

fn unknown_param(kind: EffectKind, param: &str) -> RackError {
    RackError::UnknownParameter {
        effect: kind.id().to_string(),
        param: param.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let state = ParameterState::new();
        assert_eq!(state.value(EffectKind::Compressor, "threshold").unwrap(), -24.0);
        assert_eq!(state.value(EffectKind::Reverb, "mix").unwrap(), 0.3);
        assert!(EffectKind::ALL.iter().all(|&k| !state.is_bypassed(k)));
    }

    #[test]
    fn test_set_clamps_on_entry() {
        let mut state = ParameterState::new();
        let edit = state.set(EffectKind::Delay, "feedback", 3.0).unwrap();
        assert_eq!(edit.target, EditTarget::Param(1));
        assert_eq!(state.value(EffectKind::Delay, "feedback").unwrap(), 0.9);

        state.set(EffectKind::Eq, "lowGain", -100.0).unwrap();
        assert_eq!(state.value(EffectKind::Eq, "lowGain").unwrap(), -24.0);
    }

    #[test]
    fn test_unknown_ids() {
        let mut state = ParameterState::new();
        assert!(matches!(
            state.set(EffectKind::Eq, "q", 1.0),
            Err(RackError::UnknownParameter { .. })
        ));
        assert!(matches!(
            state.set_by_id("flanger", "rate", 1.0),
            Err(RackError::UnknownEffect(_))
        ));
    }

    #[test]
    fn test_bypass_and_reset() {
        let mut state = ParameterState::new();
        state.toggle_bypass(EffectKind::Reverb);
        assert!(state.is_bypassed(EffectKind::Reverb));
        state.set(EffectKind::Reverb, "mix", 0.9).unwrap();
        state.reset();
        assert_eq!(state, ParameterState::new());
    }
}
