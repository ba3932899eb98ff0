//! Signal router
//!
//! Wires a source through a sequence of units into a destination, and
//! rewires on every order change. Only the edges it created itself are
//! touched; the inside of each unit is left alone.

use crate::context::{Edge, EngineContext};
use crate::factory::EffectUnit;
use crate::node::NodeId;

/// Owns the edges between units
#[derive(Debug, Default, Clone)]
pub struct SignalRouter {
    wiring: Vec<Edge>,
}

impl SignalRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Router that can hold `edges` routed edges without growing
    pub fn with_capacity(edges: usize) -> Self {
        Self {
            wiring: Vec::with_capacity(edges),
        }
    }

    pub fn capacity(&self) -> usize {
        self.wiring.capacity()
    }

    /// Route `source -> units... -> destination`, replacing the previous route
    ///
    /// Every unit's output ends up with exactly one outgoing routed edge and
    /// the source with exactly one, so no duplicated signal paths survive a
    /// reorder.
    pub fn connect<'a>(
        &mut self,
        ctx: &mut EngineContext,
        source: NodeId,
        destination: NodeId,
        units: impl IntoIterator<Item = &'a EffectUnit>,
    ) {
        ctx.disconnect_all(source);
        for edge in self.wiring.drain(..) {
            ctx.disconnect(edge.from, edge.to);
        }

        let mut previous = source;
        for unit in units {
            self.link(ctx, previous, unit.input());
            previous = unit.output();
        }
        self.link(ctx, previous, destination);

        log::debug!("routed {} edges", self.wiring.len());
    }

    /// Edges currently owned by the router, in signal order
    pub fn wiring(&self) -> &[Edge] {
        &self.wiring
    }

    fn link(&mut self, ctx: &mut EngineContext, from: NodeId, to: NodeId) {
        ctx.connect(from, to);
        self.wiring.push(Edge { from, to });
    }
}
