//! Processing context
//!
//! Owns a node arena and the edges between nodes, and renders the graph
//! one quantum at a time. A live context runs for the lifetime of the
//! session; an offline context is built for one render and dropped.

use std::sync::Arc;

use rack_core::{AudioBuffer, CHANNELS, RENDER_QUANTUM, RackError, RackResult};
use rack_dsp::{AudioParam, ImpulseResponse};

use crate::node::{AudioNode, DestinationNode, NodeId, ParamSlot, RenderClock, StereoBlock};

/// Which timeline a context drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Live,
    Offline,
}

/// Directed connection between two nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
}

/// Node graph plus its timeline
pub struct EngineContext {
    kind: ContextKind,
    sample_rate: u32,
    nodes: Vec<Box<dyn AudioNode>>,
    outputs: Vec<StereoBlock>,
    edges: Vec<Edge>,
    processing_order: Vec<NodeId>,
    deferred: Vec<NodeId>,
    /// Sort scratch, reused so a rewire does not allocate once sized
    marks: Vec<Mark>,
    dirty: bool,
    /// Pre-allocated input mix, reused for every node
    input: StereoBlock,
    destination: NodeId,
    frame: u64,
    impulse: Arc<ImpulseResponse>,
}

impl EngineContext {
    /// New context holding only its destination node
    pub fn new(kind: ContextKind, sample_rate: u32) -> Self {
        let impulse = Arc::new(ImpulseResponse::decaying_noise(sample_rate as f64));
        let mut ctx = Self {
            kind,
            sample_rate,
            nodes: Vec::new(),
            outputs: Vec::new(),
            edges: Vec::new(),
            processing_order: Vec::new(),
            deferred: Vec::new(),
            marks: Vec::new(),
            dirty: true,
            input: StereoBlock::SILENT,
            destination: NodeId(0),
            frame: 0,
            impulse,
        };
        ctx.destination = ctx.add_node(Box::new(DestinationNode));
        log::debug!("{kind:?} context at {sample_rate} Hz");
        ctx
    }

    #[inline]
    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// First frame of the next quantum to render
    #[inline]
    pub fn current_frame(&self) -> u64 {
        self.frame
    }

    pub fn current_time(&self) -> f64 {
        self.frame as f64 / self.sample_rate as f64
    }

    #[inline]
    pub fn destination(&self) -> NodeId {
        self.destination
    }

    /// Reverb impulse synthesized for this context
    pub fn impulse(&self) -> &Arc<ImpulseResponse> {
        &self.impulse
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, node: Box<dyn AudioNode>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        self.outputs.push(StereoBlock::SILENT);
        self.dirty = true;
        id
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Make room for `additional` more edges
    pub fn reserve_edges(&mut self, additional: usize) {
        self.edges.reserve(additional);
    }

    pub fn edge_capacity(&self) -> usize {
        self.edges.capacity()
    }

    /// Connect two nodes; false if either is unknown or the edge exists
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> bool {
        if from.index() >= self.nodes.len() || to.index() >= self.nodes.len() {
            log::error!("connect {from:?} -> {to:?}: unknown node");
            return false;
        }
        let edge = Edge { from, to };
        if self.edges.contains(&edge) {
            return false;
        }
        self.edges.push(edge);
        self.dirty = true;
        true
    }

    /// Remove one edge
    pub fn disconnect(&mut self, from: NodeId, to: NodeId) {
        let before = self.edges.len();
        self.edges.retain(|e| e.from != from || e.to != to);
        self.dirty |= self.edges.len() != before;
    }

    /// Remove every edge leaving `from`
    pub fn disconnect_all(&mut self, from: NodeId) {
        let before = self.edges.len();
        self.edges.retain(|e| e.from != from);
        self.dirty |= self.edges.len() != before;
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Nodes `from` feeds
    pub fn outgoing(&self, from: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.edges.iter().filter(move |e| e.from == from).map(|e| e.to)
    }

    pub fn node(&self, id: NodeId) -> Option<&dyn AudioNode> {
        self.nodes.get(id.index()).map(|n| n.as_ref())
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut (dyn AudioNode + 'static)> {
        self.nodes.get_mut(id.index()).map(|n| n.as_mut())
    }

    /// Downcast a node to its concrete type
    pub fn node_as_mut<T: AudioNode + 'static>(&mut self, id: NodeId) -> Option<&mut T> {
        self.node_mut(id)?.as_any_mut().downcast_mut::<T>()
    }

    pub fn param(&self, id: NodeId, slot: ParamSlot) -> Option<&AudioParam> {
        self.node(id)?.param(slot)
    }

    pub fn param_mut(&mut self, id: NodeId, slot: ParamSlot) -> Option<&mut AudioParam> {
        self.node_mut(id)?.param_mut(slot)
    }

    /// Recalculate processing order using topological sort
    ///
    /// Edges into deferring nodes are left out, which breaks every cycle
    /// that runs through a delay.
    fn update_processing_order(&mut self) {
        if !self.dirty {
            return;
        }

        let count = self.nodes.len();
        let mut order = std::mem::take(&mut self.processing_order);
        let mut marks = std::mem::take(&mut self.marks);
        order.clear();
        order.reserve(count);
        marks.clear();
        marks.resize(count, Mark::Unvisited);

        for index in 0..count {
            if marks[index] == Mark::Unvisited {
                self.visit(NodeId(index as u32), &mut marks, &mut order);
            }
        }

        order.reverse();
        self.deferred.clear();
        self.deferred.extend(
            order
                .iter()
                .copied()
                .filter(|id| self.nodes[id.index()].defers_input()),
        );
        self.processing_order = order;
        self.marks = marks;
        self.dirty = false;
    }

    fn visit(&self, id: NodeId, marks: &mut [Mark], order: &mut Vec<NodeId>) {
        match marks[id.index()] {
            // Cycle without a delay - skip
            Mark::OnStack => return,
            Mark::Done => return,
            Mark::Unvisited => {}
        }

        marks[id.index()] = Mark::OnStack;

        // Visit all nodes this node outputs to
        for edge in &self.edges {
            if edge.from == id && !self.nodes[edge.to.index()].defers_input() {
                self.visit(edge.to, marks, order);
            }
        }

        marks[id.index()] = Mark::Done;
        order.push(id);
    }

    /// Render one quantum and return the destination output
    pub fn render_quantum(&mut self) -> &StereoBlock {
        self.update_processing_order();

        let clock = RenderClock {
            frame: self.frame,
            sample_rate: self.sample_rate as f64,
        };

        let Self {
            nodes,
            outputs,
            edges,
            processing_order,
            deferred,
            input,
            ..
        } = self;

        for &id in processing_order.iter() {
            let node = &mut nodes[id.index()];
            if node.defers_input() {
                node.process(&StereoBlock::SILENT, &mut outputs[id.index()], clock);
                continue;
            }
            gather_input(edges, outputs, id, input);
            node.process(input, &mut outputs[id.index()], clock);
        }

        for &id in deferred.iter() {
            gather_input(edges, outputs, id, input);
            nodes[id.index()].absorb(input);
        }

        self.frame += RENDER_QUANTUM as u64;
        &self.outputs[self.destination.index()]
    }

    /// Render `frames` frames of output into a new buffer
    pub fn render(&mut self, frames: usize) -> RackResult<AudioBuffer> {
        let mut buffer = AudioBuffer::try_new(CHANNELS, frames, self.sample_rate)?;
        let mut written = 0;
        while written < frames {
            let count = (frames - written).min(RENDER_QUANTUM);
            let block = *self.render_quantum();
            for ch in 0..CHANNELS {
                buffer.channel_mut(ch)[written..written + count].copy_from_slice(&block.channels[ch][..count]);
            }
            written += count;
        }
        if buffer.has_non_finite() {
            return Err(RackError::InvalidBuffer("render produced non-finite samples".into()));
        }
        Ok(buffer)
    }

    /// Reset every node's state
    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            node.reset();
        }
        for out in &mut self.outputs {
            out.silence();
        }
    }
}

/// Depth-first sort state of one node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Sum of all outputs connected to `to`
#[inline]
fn gather_input(edges: &[Edge], outputs: &[StereoBlock], to: NodeId, input: &mut StereoBlock) {
    input.silence();
    for edge in edges.iter().filter(|e| e.to == to) {
        input.accumulate(&outputs[edge.from.index()]);
    }
}
