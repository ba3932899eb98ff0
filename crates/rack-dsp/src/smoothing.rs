//! Sample-accurate automatable parameters
//!
//! An [`AudioParam`] holds the current value of one control plus a timeline
//! of scheduled changes keyed by absolute frame. Two kinds of change exist:
//! an instant set, and an exponential approach toward a target with a time
//! constant. The audio thread pulls one value per frame.

use std::collections::VecDeque;

/// A ramp within this distance of its target lands on it
pub const SNAP_THRESHOLD: f64 = 1e-6;

/// Pre-reserved timeline slots, so scheduling rarely allocates
const EVENT_CAPACITY: usize = 16;

/// Scheduled change on a parameter timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamEvent {
    /// Jump to `value` at `frame`
    SetValue { frame: u64, value: f64 },
    /// From `frame` on, approach `target` exponentially; `coeff` is the
    /// per-frame fraction of the remaining distance covered
    SetTarget { frame: u64, target: f64, coeff: f64 },
}

impl ParamEvent {
    #[inline]
    pub fn frame(&self) -> u64 {
        match *self {
            ParamEvent::SetValue { frame, .. } | ParamEvent::SetTarget { frame, .. } => frame,
        }
    }

    #[inline]
    fn settles_at(&self) -> f64 {
        match *self {
            ParamEvent::SetValue { value, .. } => value,
            ParamEvent::SetTarget { target, .. } => target,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Ramp {
    target: f64,
    coeff: f64,
}

/// Per-frame coefficient for a time constant in seconds
#[inline]
pub fn ramp_coefficient(time_constant: f64, sample_rate: f64) -> f64 {
    if time_constant <= 0.0 {
        1.0
    } else {
        1.0 - (-1.0 / (time_constant * sample_rate)).exp()
    }
}

/// Automatable control value
#[derive(Debug, Clone)]
pub struct AudioParam {
    value: f64,
    min: f64,
    max: f64,
    sample_rate: f64,
    events: VecDeque<ParamEvent>,
    ramp: Option<Ramp>,
}

impl AudioParam {
    pub fn new(default: f64, min: f64, max: f64, sample_rate: f64) -> Self {
        Self {
            value: default.clamp(min, max),
            min,
            max,
            sample_rate,
            events: VecDeque::with_capacity(EVENT_CAPACITY),
            ramp: None,
        }
    }

    /// Value produced by the most recent frame
    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    #[inline]
    pub fn range(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    /// Value the parameter ends up at once every scheduled change has run
    pub fn final_value(&self) -> f64 {
        if let Some(last) = self.events.back() {
            last.settles_at()
        } else if let Some(ramp) = self.ramp {
            ramp.target
        } else {
            self.value
        }
    }

    #[inline]
    pub fn is_automating(&self) -> bool {
        !self.events.is_empty() || self.ramp.is_some()
    }

    pub fn events(&self) -> impl Iterator<Item = &ParamEvent> {
        self.events.iter()
    }

    /// Clamp into this parameter's range. NaN collapses to `min`.
    #[inline]
    fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            self.min
        } else {
            value.clamp(self.min, self.max)
        }
    }

    /// Jump to `value` at `frame`
    pub fn set_value_at(&mut self, value: f64, frame: u64) {
        let value = self.clamp(value);
        self.schedule(ParamEvent::SetValue { frame, value });
    }

    /// Approach `target` from `frame` on with the given time constant (seconds)
    pub fn set_target_at(&mut self, target: f64, frame: u64, time_constant: f64) {
        let target = self.clamp(target);
        let coeff = ramp_coefficient(time_constant, self.sample_rate);
        self.schedule(ParamEvent::SetTarget { frame, target, coeff });
    }

    /// Drop the timeline and hold `value` from now on
    pub fn set_immediate(&mut self, value: f64) {
        self.events.clear();
        self.ramp = None;
        self.value = self.clamp(value);
    }

    fn schedule(&mut self, event: ParamEvent) {
        // Stable: events sharing a frame run in scheduling order
        let at = self.events.partition_point(|e| e.frame() <= event.frame());
        self.events.insert(at, event);
    }

    #[inline]
    fn apply(&mut self, event: ParamEvent) {
        match event {
            ParamEvent::SetValue { value, .. } => {
                self.value = value;
                self.ramp = None;
            }
            ParamEvent::SetTarget { target, coeff, .. } => {
                if (self.value - target).abs() < SNAP_THRESHOLD {
                    self.value = target;
                    self.ramp = None;
                } else {
                    self.ramp = Some(Ramp { target, coeff });
                }
            }
        }
    }

    /// Value for `frame`, then advance the ramp by one frame
    #[inline]
    pub fn tick(&mut self, frame: u64) -> f64 {
        while let Some(&event) = self.events.front() {
            if event.frame() > frame {
                break;
            }
            self.events.pop_front();
            self.apply(event);
        }

        let out = self.value;
        if let Some(ramp) = self.ramp {
            self.value += ramp.coeff * (ramp.target - self.value);
            if (self.value - ramp.target).abs() < SNAP_THRESHOLD {
                self.value = ramp.target;
                self.ramp = None;
            }
        }
        out
    }

    /// Fill `out` with values for consecutive frames starting at `start_frame`
    pub fn fill(&mut self, start_frame: u64, out: &mut [f64]) {
        if !self.is_automating() {
            out.fill(self.value);
            return;
        }
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.tick(start_frame + i as u64);
        }
    }

    /// Block-rate read: value at `start_frame`, timeline advanced over `len` frames
    pub fn block_value(&mut self, start_frame: u64, len: usize) -> f64 {
        if !self.is_automating() {
            return self.value;
        }
        let first = self.tick(start_frame);
        for i in 1..len as u64 {
            self.tick(start_frame + i);
        }
        first
    }
}
