//! Chain graph
//!
//! Source, effect units and routing assembled in one context. Live and
//! offline rendering both go through [`ChainGraph::build`], so the two
//! graphs are wired identically.

use std::sync::Arc;

use rack_core::{AudioBuffer, ChainOrder, EffectKind, ParameterState};

use crate::automation::{ApplyMode, AutomationEngine};
use crate::context::EngineContext;
use crate::factory::{EffectUnitFactory, UnitSet};
use crate::node::{BufferSourceNode, NodeId};
use crate::router::SignalRouter;

/// A complete signal chain inside one context
pub struct ChainGraph {
    units: UnitSet,
    source: NodeId,
    router: SignalRouter,
}

impl ChainGraph {
    /// Build every unit, route `order`, then apply `state` immediately
    pub fn build(ctx: &mut EngineContext, order: &ChainOrder, state: &ParameterState) -> Self {
        let source = ctx.add_node(Box::new(BufferSourceNode::new()));
        let units = EffectUnitFactory::build_all(ctx);
        // Room for the longest route, so live rewires never grow either list
        let route_edges = EffectKind::COUNT + 1;
        ctx.reserve_edges(route_edges);
        let mut graph = Self {
            units,
            source,
            router: SignalRouter::with_capacity(route_edges),
        };
        graph.rewire(ctx, order.iter());
        let now = ctx.current_frame();
        AutomationEngine::apply(ctx, &graph.units, state, now, ApplyMode::Immediate);
        log::info!("chain graph built: {order} at {} Hz", ctx.sample_rate());
        graph
    }

    /// Route the units in `kinds` between source and destination
    pub fn rewire(&mut self, ctx: &mut EngineContext, kinds: impl IntoIterator<Item = EffectKind>) {
        let destination = ctx.destination();
        let units = &self.units;
        self.router
            .connect(ctx, self.source, destination, kinds.into_iter().map(|kind| units.get(kind)));
    }

    #[inline]
    pub fn units(&self) -> &UnitSet {
        &self.units
    }

    #[inline]
    pub fn source(&self) -> NodeId {
        self.source
    }

    pub fn router(&self) -> &SignalRouter {
        &self.router
    }

    /// The source node
    pub fn source_mut<'a>(&self, ctx: &'a mut EngineContext) -> Option<&'a mut BufferSourceNode> {
        ctx.node_as_mut::<BufferSourceNode>(self.source)
    }

    /// Load `buffer` and start it from `offset` frames
    pub fn start_source(&self, ctx: &mut EngineContext, buffer: Arc<AudioBuffer>, offset: usize) -> bool {
        match self.source_mut(ctx) {
            Some(source) => {
                source.set_buffer(buffer);
                source.start(offset);
                true
            }
            None => {
                log::error!("source node missing from context");
                false
            }
        }
    }
}
