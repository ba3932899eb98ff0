//! Effect unit factory
//!
//! Builds the node sub-graph of each effect kind inside a context. Every
//! unit has the same outer shape:
//!
//! ```text
//! input ─► engage ─► [stages] ─► output
//!   └────► thru ──────────────────┘
//! ```
//!
//! `engage` and `thru` are complementary gains driven by the bypass flag,
//! so a bypassed unit contributes its input unchanged and nothing else.

use rack_core::EffectKind;
use rack_dsp::{FilterType, SHELF_Q};

use crate::context::EngineContext;
use crate::dsp_wrappers::{CompressorNode, ConvolverNode, DelayNode, FilterNode};
use crate::node::{GainNode, NodeId};

pub const LOW_SHELF_FREQ: f64 = 320.0;
pub const PEAKING_FREQ: f64 = 1000.0;
pub const HIGH_SHELF_FREQ: f64 = 3200.0;
pub const PEAKING_Q: f64 = 1.0;

/// Longest delay time the delay unit can hold (seconds)
pub const MAX_DELAY_SECONDS: f64 = 2.0;

/// Hard ceiling of the feedback gain, keeps the loop decaying
pub const MAX_FEEDBACK: f64 = 0.95;

/// Outer nodes shared by every unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitPorts {
    pub input: NodeId,
    pub engage: NodeId,
    pub thru: NodeId,
    pub output: NodeId,
}

/// One effect instantiated in a context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectUnit {
    Eq {
        ports: UnitPorts,
        low: NodeId,
        mid: NodeId,
        high: NodeId,
    },
    Compressor {
        ports: UnitPorts,
        compressor: NodeId,
    },
    Delay {
        ports: UnitPorts,
        delay: NodeId,
        feedback: NodeId,
        dry: NodeId,
        wet: NodeId,
    },
    Reverb {
        ports: UnitPorts,
        convolver: NodeId,
        dry: NodeId,
        wet: NodeId,
    },
}

impl EffectUnit {
    pub fn kind(&self) -> EffectKind {
        match self {
            EffectUnit::Eq { .. } => EffectKind::Eq,
            EffectUnit::Compressor { .. } => EffectKind::Compressor,
            EffectUnit::Delay { .. } => EffectKind::Delay,
            EffectUnit::Reverb { .. } => EffectKind::Reverb,
        }
    }

    pub fn ports(&self) -> &UnitPorts {
        match self {
            EffectUnit::Eq { ports, .. }
            | EffectUnit::Compressor { ports, .. }
            | EffectUnit::Delay { ports, .. }
            | EffectUnit::Reverb { ports, .. } => ports,
        }
    }

    /// Entry point of the unit
    #[inline]
    pub fn input(&self) -> NodeId {
        self.ports().input
    }

    /// Exit point of the unit
    #[inline]
    pub fn output(&self) -> NodeId {
        self.ports().output
    }
}

/// One unit per effect kind, indexed by [`EffectKind::index`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitSet {
    units: [EffectUnit; EffectKind::COUNT],
}

impl UnitSet {
    #[inline]
    pub fn get(&self, kind: EffectKind) -> &EffectUnit {
        &self.units[kind.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &EffectUnit> {
        self.units.iter()
    }

    /// Units in the given order
    pub fn ordered<'a>(&'a self, kinds: &'a [EffectKind]) -> impl Iterator<Item = &'a EffectUnit> + 'a {
        kinds.iter().map(move |&kind| self.get(kind))
    }
}

/// Creates effect units inside a context
pub struct EffectUnitFactory;

impl EffectUnitFactory {
    /// Build one unit. Every node starts at a neutral value; the automation
    /// engine applies real parameter values afterwards.
    pub fn build(ctx: &mut EngineContext, kind: EffectKind) -> EffectUnit {
        let sr = ctx.sample_rate() as f64;
        let ports = Self::ports(ctx);

        let unit = match kind {
            EffectKind::Eq => {
                let low = ctx.add_node(Box::new(FilterNode::new(FilterType::LowShelf, LOW_SHELF_FREQ, SHELF_Q, sr)));
                let mid = ctx.add_node(Box::new(FilterNode::new(FilterType::Peaking, PEAKING_FREQ, PEAKING_Q, sr)));
                let high = ctx.add_node(Box::new(FilterNode::new(FilterType::HighShelf, HIGH_SHELF_FREQ, SHELF_Q, sr)));
                ctx.connect(ports.engage, low);
                ctx.connect(low, mid);
                ctx.connect(mid, high);
                ctx.connect(high, ports.output);
                EffectUnit::Eq { ports, low, mid, high }
            }
            EffectKind::Compressor => {
                let compressor = ctx.add_node(Box::new(CompressorNode::new(sr)));
                ctx.connect(ports.engage, compressor);
                ctx.connect(compressor, ports.output);
                EffectUnit::Compressor { ports, compressor }
            }
            EffectKind::Delay => {
                let delay = ctx.add_node(Box::new(DelayNode::new(MAX_DELAY_SECONDS, sr)));
                let feedback = ctx.add_node(Box::new(GainNode::new(0.0, MAX_FEEDBACK, sr)));
                let dry = ctx.add_node(Box::new(GainNode::unity(sr)));
                let wet = ctx.add_node(Box::new(GainNode::new(0.0, 1.0, sr)));
                ctx.connect(ports.engage, dry);
                ctx.connect(dry, ports.output);
                ctx.connect(ports.engage, delay);
                ctx.connect(delay, feedback);
                ctx.connect(feedback, delay);
                ctx.connect(delay, wet);
                ctx.connect(wet, ports.output);
                EffectUnit::Delay {
                    ports,
                    delay,
                    feedback,
                    dry,
                    wet,
                }
            }
            EffectKind::Reverb => {
                let impulse = ctx.impulse().clone();
                let convolver = ctx.add_node(Box::new(ConvolverNode::new(&impulse)));
                let dry = ctx.add_node(Box::new(GainNode::unity(sr)));
                let wet = ctx.add_node(Box::new(GainNode::new(0.0, 1.0, sr)));
                ctx.connect(ports.engage, dry);
                ctx.connect(dry, ports.output);
                ctx.connect(ports.engage, convolver);
                ctx.connect(convolver, wet);
                ctx.connect(wet, ports.output);
                EffectUnit::Reverb {
                    ports,
                    convolver,
                    dry,
                    wet,
                }
            }
        };

        log::debug!("built {kind} unit ({} nodes in context)", ctx.node_count());
        unit
    }

    /// One unit for every kind in the catalog
    pub fn build_all(ctx: &mut EngineContext) -> UnitSet {
        UnitSet {
            units: EffectKind::ALL.map(|kind| Self::build(ctx, kind)),
        }
    }

    fn ports(ctx: &mut EngineContext) -> UnitPorts {
        let sr = ctx.sample_rate() as f64;
        let input = ctx.add_node(Box::new(GainNode::unity(sr)));
        let engage = ctx.add_node(Box::new(GainNode::unity(sr)));
        let thru = ctx.add_node(Box::new(GainNode::new(0.0, 1.0, sr)));
        let output = ctx.add_node(Box::new(GainNode::unity(sr)));
        ctx.connect(input, engage);
        ctx.connect(input, thru);
        ctx.connect(thru, output);
        UnitPorts {
            input,
            engage,
            thru,
            output,
        }
    }
}
