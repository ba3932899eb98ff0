//! Effect catalog
//!
//! Static descriptors for every effect kind the rack can build: identity,
//! display metadata and the parameter set with ranges, steps and defaults.

use serde::{Deserialize, Serialize};

/// Bumped whenever an effect kind is added to or removed from [`CATALOG`].
///
/// Persisted chain orders record the version they were written with.
pub const CATALOG_VERSION: u32 = 1;

/// Effect kinds known to the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Eq,
    Compressor,
    Delay,
    Reverb,
}

impl EffectKind {
    pub const COUNT: usize = 4;

    /// Every kind, in default chain order
    pub const ALL: [EffectKind; Self::COUNT] = [
        EffectKind::Eq,
        EffectKind::Compressor,
        EffectKind::Delay,
        EffectKind::Reverb,
    ];

    /// Stable identifier used for persistence and lookups
    #[inline]
    pub const fn id(self) -> &'static str {
        match self {
            EffectKind::Eq => "eq",
            EffectKind::Compressor => "compressor",
            EffectKind::Delay => "delay",
            EffectKind::Reverb => "reverb",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    /// Dense index, usable for per-kind arrays
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn descriptor(self) -> &'static EffectDescriptor {
        &CATALOG[self.index()]
    }
}

impl std::fmt::Display for EffectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Unit tag shown next to a parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamUnit {
    Decibels,
    Ratio,
    Seconds,
    Percent,
}

impl ParamUnit {
    pub const fn tag(self) -> &'static str {
        match self {
            ParamUnit::Decibels => "dB",
            ParamUnit::Ratio => ":1",
            ParamUnit::Seconds => "s",
            ParamUnit::Percent => "%",
        }
    }
}

/// Slider orientation hint for front ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SliderStyle {
    Vertical,
    Horizontal,
}

/// Static description of one parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParameterDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub default: f64,
    pub unit: ParamUnit,
    pub style: SliderStyle,
}

impl ParameterDescriptor {
    /// Clamp into `[min, max]`. NaN maps to the default.
    #[inline]
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            self.default
        } else {
            value.clamp(self.min, self.max)
        }
    }

    /// Human readable value with unit, as shown beside a slider
    pub fn format_value(&self, value: f64) -> String {
        match self.unit {
            ParamUnit::Percent => format!("{}%", round_half_up(value * 100.0)),
            ParamUnit::Decibels => {
                let sign = if value > 0.0 { "+" } else { "" };
                format!("{sign}{}dB", round_half_up(value))
            }
            ParamUnit::Ratio => format!("{}:1", round_half_up(value)),
            ParamUnit::Seconds => {
                let decimals = if self.step < 0.1 { 2 } else { 1 };
                format!("{value:.decimals$}{}", self.unit.tag())
            }
        }
    }
}

#[inline]
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Static description of one effect kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EffectDescriptor {
    pub kind: EffectKind,
    pub name: &'static str,
    pub icon: &'static str,
    pub params: &'static [ParameterDescriptor],
}

impl EffectDescriptor {
    #[inline]
    pub fn id(&self) -> &'static str {
        self.kind.id()
    }

    pub fn param(&self, id: &str) -> Option<&'static ParameterDescriptor> {
        self.params.iter().find(|p| p.id == id)
    }

    pub fn param_index(&self, id: &str) -> Option<usize> {
        self.params.iter().position(|p| p.id == id)
    }

    /// Default values in descriptor order
    pub fn defaults(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.default).collect()
    }
}

const fn db_slider(id: &'static str, name: &'static str) -> ParameterDescriptor {
    ParameterDescriptor {
        id,
        name,
        min: -24.0,
        max: 24.0,
        step: 0.1,
        default: 0.0,
        unit: ParamUnit::Decibels,
        style: SliderStyle::Vertical,
    }
}

static EQ_PARAMS: [ParameterDescriptor; 3] = [
    db_slider("highGain", "High"),
    db_slider("midGain", "Mid"),
    db_slider("lowGain", "Low"),
];

static COMPRESSOR_PARAMS: [ParameterDescriptor; 4] = [
    ParameterDescriptor {
        id: "threshold",
        name: "Thresh",
        min: -60.0,
        max: 0.0,
        step: 1.0,
        default: -24.0,
        unit: ParamUnit::Decibels,
        style: SliderStyle::Vertical,
    },
    ParameterDescriptor {
        id: "ratio",
        name: "Ratio",
        min: 1.0,
        max: 20.0,
        step: 0.1,
        default: 4.0,
        unit: ParamUnit::Ratio,
        style: SliderStyle::Vertical,
    },
    ParameterDescriptor {
        id: "attack",
        name: "Atk",
        min: 0.0,
        max: 1.0,
        step: 0.001,
        default: 0.003,
        unit: ParamUnit::Seconds,
        style: SliderStyle::Horizontal,
    },
    ParameterDescriptor {
        id: "release",
        name: "Rel",
        min: 0.01,
        max: 1.0,
        step: 0.001,
        default: 0.25,
        unit: ParamUnit::Seconds,
        style: SliderStyle::Horizontal,
    },
];

static DELAY_PARAMS: [ParameterDescriptor; 3] = [
    ParameterDescriptor {
        id: "time",
        name: "Time",
        min: 0.01,
        max: 1.0,
        step: 0.01,
        default: 0.3,
        unit: ParamUnit::Seconds,
        style: SliderStyle::Horizontal,
    },
    ParameterDescriptor {
        id: "feedback",
        name: "F.Back",
        min: 0.0,
        max: 0.9,
        step: 0.01,
        default: 0.4,
        unit: ParamUnit::Percent,
        style: SliderStyle::Horizontal,
    },
    ParameterDescriptor {
        id: "mix",
        name: "Mix",
        min: 0.0,
        max: 1.0,
        step: 0.01,
        default: 0.4,
        unit: ParamUnit::Percent,
        style: SliderStyle::Horizontal,
    },
];

static REVERB_PARAMS: [ParameterDescriptor; 2] = [
    ParameterDescriptor {
        id: "decay",
        name: "Size",
        min: 0.5,
        max: 5.0,
        step: 0.1,
        default: 2.0,
        unit: ParamUnit::Seconds,
        style: SliderStyle::Horizontal,
    },
    ParameterDescriptor {
        id: "mix",
        name: "Mix",
        min: 0.0,
        max: 1.0,
        step: 0.01,
        default: 0.3,
        unit: ParamUnit::Percent,
        style: SliderStyle::Horizontal,
    },
];

/// The effect catalog, indexed by [`EffectKind::index`]
pub static CATALOG: [EffectDescriptor; EffectKind::COUNT] = [
    EffectDescriptor {
        kind: EffectKind::Eq,
        name: "Parametric EQ",
        icon: "sliders",
        params: &EQ_PARAMS,
    },
    EffectDescriptor {
        kind: EffectKind::Compressor,
        name: "Compressor",
        icon: "compress",
        params: &COMPRESSOR_PARAMS,
    },
    EffectDescriptor {
        kind: EffectKind::Delay,
        name: "Stereo Delay",
        icon: "stopwatch",
        params: &DELAY_PARAMS,
    },
    EffectDescriptor {
        kind: EffectKind::Reverb,
        name: "Reverb",
        icon: "water",
        params: &REVERB_PARAMS,
    },
];

/// Look up a descriptor by its string id
pub fn lookup(id: &str) -> Option<&'static EffectDescriptor> {
    CATALOG.iter().find(|d| d.id() == id)
}
