//! Audio graph - owns nodes, message queues and the polyphony resolution

use core::marker::PhantomData;

use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rtrb::{Consumer, Producer, RingBuffer};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::node::{AudioNode, Message, Node, NodeId, NodeMessage, ProcessContext, Variant};
use crate::nodes::CaptureError;
use crate::queue::Chunk;
use crate::registry::NodeRegistry;
use crate::socket::{AudioData, InputWindow, OutputWindow, Route, Signal, SocketType, Sockets};
use crate::universe::{Descriptor, PolyphonyError, Universe, UniverseId, Universes};
use crate::BLOCK_SIZE;

/// Upper bound on resolution passes before giving up. Built-in nodes settle
/// in one pass; the bound only matters for inference that feeds back.
const MAX_RESOLVE_PASSES: usize = 16;

/// Graph-wide settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GraphConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Capacity of each node's message queue.
    pub message_queue_size: usize,
    /// Instances to pre-allocate per output, so typical voice counts don't
    /// allocate on the processing thread.
    pub polyphony_hint: usize,
}

impl GraphConfig {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            message_queue_size: 64,
            polyphony_hint: 32,
        }
    }

    pub fn with_message_queue_size(mut self, size: usize) -> Self {
        self.message_queue_size = size.max(1);
        self
    }

    pub fn with_polyphony_hint(mut self, voices: usize) -> Self {
        self.polyphony_hint = voices;
        self
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self::new(48_000)
    }
}

/// Errors reported to the owner of a [`Graph`].
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("no node with id {0:?}")]
    UnknownNode(NodeId),

    #[error("no node type registered as {0:?}")]
    UnknownType(String),

    #[error("node {node:?} has no {direction} socket {socket}")]
    NoSuchSocket {
        node: NodeId,
        socket: usize,
        direction: &'static str,
    },

    #[error("cannot connect a {from:?} output to a {to:?} input")]
    SocketMismatch { from: SocketType, to: SocketType },

    #[error("graph contains a cycle through node {0:?}")]
    Cycle(NodeId),

    #[error("polyphony cannot be resolved at node {node:?}: {source}")]
    Polyphony {
        node: NodeId,
        #[source]
        source: PolyphonyError,
    },

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("{0} is not available in this build")]
    Unavailable(&'static str),
}

/// A handle for sending messages to a node in a [`Graph`].
///
/// Handles are returned when you add a node and provide two capabilities:
/// 1. **Connections** - Pass [`id`](Self::id) to [`Graph::connect`]
/// 2. **Messages** - Send events and payloads via [`Handle::send`]
///
/// # Message Delivery
///
/// Messages are buffered in a lock-free ring buffer and processed at the start
/// of the node's next block. If the buffer is full, [`Handle::send`] returns
/// `Err(msg)` with the message that couldn't be sent.
pub struct Handle<M: Message> {
    pub(crate) node_id: NodeId,
    pub(crate) sender: Producer<NodeMessage>,
    pub(crate) _marker: PhantomData<M>,
}

impl<M: Message> Handle<M> {
    #[inline]
    pub fn id(&self) -> NodeId {
        self.node_id
    }

    /// Send a message to the node.
    ///
    /// Lock-free and safe to call from any thread.
    ///
    /// # Returns
    ///
    /// - `Ok(())` if the message was queued successfully
    /// - `Err(msg)` if the queue is full (message dropped)
    pub fn send(&mut self, msg: M) -> Result<(), M> {
        if self.sender.is_full() {
            return Err(msg);
        }
        // Single producer: a slot seen free stays free
        let pushed = self.sender.push(msg.into_message());
        debug_assert!(pushed.is_ok(), "message queue filled after a free slot was seen");
        Ok(())
    }

    /// Free slots in the message queue.
    #[inline]
    pub fn capacity_left(&self) -> usize {
        self.sender.slots()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Connection {
    from_socket: usize,
    to_socket: usize,
}

struct NodeSlot {
    node: Node,
    receiver: Consumer<NodeMessage>,
    sockets: Sockets,
    own: UniverseId,
    descriptor: Option<Descriptor>,
    routes: Vec<Route>,
    /// Constant blocks read by unconnected audio inputs.
    defaults: Vec<Chunk>,
    /// Fan-in scratch, one block per input socket.
    collapsed: Vec<Chunk>,
}

/// A graph of nodes evaluated once per block.
///
/// Nodes run in topological order. Before the first tick, and again after any
/// topology change, the graph resolves every node's polyphony [`Descriptor`]
/// and decides how each edge adapts instance counts between universes. A graph
/// whose polyphony can't be resolved does not run.
///
/// # Example
///
/// ```
/// use polyphon::{Graph, GraphConfig, NodeRegistry};
/// use polyphon::nodes::Sine;
///
/// let registry = NodeRegistry::standard();
/// let mut graph = Graph::new(GraphConfig::new(48_000), &registry);
/// let sine = graph.add(Sine::new());
///
/// graph.process().unwrap();
/// let out = graph.audio_output(sine.id(), Sine::OUTPUT).unwrap();
/// assert_eq!(out.len(), 1);
/// ```
pub struct Graph {
    ctx: ProcessContext,
    config: GraphConfig,
    registry: NodeRegistry,

    topology: petgraph::Graph<NodeId, Connection>,
    slots: Vec<NodeSlot>,
    /// Output signals per node, indexed like `slots`.
    signals: Vec<Vec<Signal>>,
    universes: Universes,

    order: Vec<usize>,
    resolved: bool,
    ticks: u64,
}

impl Graph {
    pub fn new(config: GraphConfig, registry: &NodeRegistry) -> Self {
        Self {
            ctx: ProcessContext {
                sample_rate: config.sample_rate,
                buffer_size: BLOCK_SIZE,
            },
            config,
            registry: registry.clone(),
            topology: petgraph::Graph::with_capacity(64, 64),
            slots: Vec::with_capacity(64),
            signals: Vec::with_capacity(64),
            universes: Universes::new(),
            order: Vec::with_capacity(64),
            resolved: false,
            ticks: 0,
        }
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.ctx.sample_rate
    }

    #[inline]
    pub fn context(&self) -> &ProcessContext {
        &self.ctx
    }

    #[inline]
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Ticks processed so far.
    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn universes(&self) -> &Universes {
        &self.universes
    }

    /// Add a node, returns a handle for connections and messages
    pub fn add<N>(&mut self, node: N) -> Handle<N::Message>
    where
        N: AudioNode + Into<Node>,
    {
        let (node_id, sender) = self.insert(node.into());
        Handle {
            node_id,
            sender,
            _marker: PhantomData,
        }
    }

    /// Add a node by its registered type name.
    pub fn add_named(&mut self, type_name: &str) -> Result<Handle<NodeMessage>, GraphError> {
        let node = self.registry.create(type_name, &self.ctx)?;
        let (node_id, sender) = self.insert(node);
        Ok(Handle {
            node_id,
            sender,
            _marker: PhantomData,
        })
    }

    fn insert(&mut self, node: Node) -> (NodeId, Producer<NodeMessage>) {
        let id = NodeId(self.slots.len() as u32);
        let (producer, receiver) = RingBuffer::new(self.config.message_queue_size);
        let sockets = node.sockets();

        let defaults = sockets
            .inputs
            .iter()
            .map(|socket| {
                let mut chunk = Chunk::SILENT;
                chunk.iter_mut().for_each(|s| *s = socket.default);
                chunk
            })
            .collect();

        let hint = self.config.polyphony_hint;
        let outputs = sockets
            .outputs
            .iter()
            .map(|&kind| {
                let mut signal = Signal::new(kind);
                match &mut signal {
                    Signal::Audio(data) => data.reserve(hint),
                    Signal::Events(events) => events.reserve(64),
                }
                signal
            })
            .collect();

        debug!(node = ?id, kind = node.type_name(), "added node");

        let index = self.topology.add_node(id);
        debug_assert_eq!(index.index(), id.index());

        self.slots.push(NodeSlot {
            node,
            receiver,
            sockets,
            own: self.universes.allocate(),
            descriptor: None,
            routes: vec![Route::Unconnected; sockets.inputs.len()],
            defaults,
            collapsed: vec![Chunk::SILENT; sockets.inputs.len()],
        });
        self.signals.push(outputs);
        self.universes.reserve_reports(self.config.polyphony_hint);
        self.resolved = false;

        (id, producer)
    }

    fn slot(&self, id: NodeId) -> Result<&NodeSlot, GraphError> {
        self.slots.get(id.index()).ok_or(GraphError::UnknownNode(id))
    }

    /// Connect output socket `from_socket` of `from` to input socket
    /// `to_socket` of `to`. An input takes at most one connection; an
    /// existing one is replaced.
    pub fn connect(
        &mut self,
        from: NodeId,
        from_socket: usize,
        to: NodeId,
        to_socket: usize,
    ) -> Result<(), GraphError> {
        let from_kind = *self
            .slot(from)?
            .sockets
            .outputs
            .get(from_socket)
            .ok_or(GraphError::NoSuchSocket {
                node: from,
                socket: from_socket,
                direction: "output",
            })?;
        let to_kind = self
            .slot(to)?
            .sockets
            .inputs
            .get(to_socket)
            .ok_or(GraphError::NoSuchSocket {
                node: to,
                socket: to_socket,
                direction: "input",
            })?
            .kind;

        if from_kind != to_kind {
            return Err(GraphError::SocketMismatch {
                from: from_kind,
                to: to_kind,
            });
        }

        self.disconnect(to, to_socket);
        self.topology.add_edge(
            petgraph::graph::NodeIndex::new(from.index()),
            petgraph::graph::NodeIndex::new(to.index()),
            Connection { from_socket, to_socket },
        );
        self.resolved = false;
        trace!(?from, from_socket, ?to, to_socket, "connected");
        Ok(())
    }

    /// Remove the connection feeding input `to_socket` of `to`, if any.
    pub fn disconnect(&mut self, to: NodeId, to_socket: usize) -> bool {
        if to.index() >= self.slots.len() {
            return false;
        }
        let index = petgraph::graph::NodeIndex::new(to.index());
        let edge = self
            .topology
            .edges_directed(index, Direction::Incoming)
            .find(|e| e.weight().to_socket == to_socket)
            .map(|e| e.id());

        match edge {
            Some(edge) => {
                self.topology.remove_edge(edge);
                self.resolved = false;
                true
            }
            None => false,
        }
    }

    /// Force polyphony to be resolved again before the next tick.
    pub fn invalidate_polyphony(&mut self) {
        self.resolved = false;
    }

    /// Resolve every node's descriptor and the adaptation on every edge.
    ///
    /// Runs automatically from [`process`](Self::process) after a topology
    /// change; the result is cached until the next one.
    pub fn resolve_polyphony(&mut self) -> Result<(), GraphError> {
        self.resolved = false;

        let order = petgraph::algo::toposort(&self.topology, None)
            .map_err(|cycle| GraphError::Cycle(self.topology[cycle.node_id()]))?;
        self.order.clear();
        self.order.extend(order.iter().map(|index| index.index()));

        // Which output feeds which input, before adaptation is known
        for slot in &mut self.slots {
            slot.routes.iter_mut().for_each(|r| *r = Route::Unconnected);
        }
        for edge in self.topology.edge_references() {
            let Connection { from_socket, to_socket } = *edge.weight();
            if let Some(route) = self.slots[edge.target().index()].routes.get_mut(to_socket) {
                *route = Route::Direct {
                    node: edge.source().index(),
                    socket: from_socket,
                };
            }
        }

        let mut inputs = Vec::new();
        let mut passes = 0;
        loop {
            passes += 1;
            let mut changed = None;

            for &i in &self.order {
                inputs.clear();
                inputs.extend(self.slots[i].routes.iter().map(|route| match route {
                    Route::Unconnected => Universe::Mono,
                    Route::Direct { node, .. } | Route::Broadcast { node, .. } | Route::Collapse { node, .. } => {
                        self.slots[*node].descriptor.map_or(Universe::Mono, |d| d.output)
                    }
                }));

                let slot = &mut self.slots[i];
                let descriptor = slot
                    .node
                    .infer_polyphony(&inputs, slot.own)
                    .map_err(|source| GraphError::Polyphony {
                        node: NodeId(i as u32),
                        source,
                    })?;

                if slot.descriptor != Some(descriptor) {
                    slot.descriptor = Some(descriptor);
                    changed = Some(i);
                }
            }

            let Some(last) = changed else {
                break;
            };
            if passes >= MAX_RESOLVE_PASSES {
                return Err(GraphError::Polyphony {
                    node: NodeId(last as u32),
                    source: PolyphonyError::NonConvergent { passes },
                });
            }
        }

        for i in 0..self.slots.len() {
            let expected = self.slots[i].descriptor.map_or(Universe::Mono, |d| d.input);
            for socket in 0..self.slots[i].routes.len() {
                let Route::Direct { node, socket: from_socket } = self.slots[i].routes[socket] else {
                    continue;
                };
                let found = self.slots[node].descriptor.map_or(Universe::Mono, |d| d.output);
                let events = self.slots[i].sockets.inputs[socket].kind == SocketType::Events;

                self.slots[i].routes[socket] = match (found, expected) {
                    _ if events => Route::Direct { node, socket: from_socket },
                    (Universe::Mono, Universe::Mono) => Route::Direct { node, socket: from_socket },
                    (Universe::Mono, Universe::Poly(_)) => Route::Broadcast { node, socket: from_socket },
                    (Universe::Poly(_), Universe::Mono) => Route::Collapse { node, socket: from_socket },
                    (Universe::Poly(a), Universe::Poly(b)) if a == b => Route::Direct { node, socket: from_socket },
                    (Universe::Poly(_), Universe::Poly(_)) => {
                        return Err(GraphError::Polyphony {
                            node: NodeId(i as u32),
                            source: PolyphonyError::Mismatch { expected, found },
                        });
                    }
                };
            }
        }

        debug!(nodes = self.slots.len(), passes, "polyphony resolved");
        self.resolved = true;
        Ok(())
    }

    /// Process one block through every node.
    ///
    /// Returns an error, and runs no node, if polyphony can't be resolved.
    pub fn process(&mut self) -> Result<(), GraphError> {
        if !self.resolved {
            if let Err(e) = self.resolve_polyphony() {
                warn!(error = %e, "graph not processed");
                return Err(e);
            }
        }

        self.universes.begin_tick();

        for k in 0..self.order.len() {
            let i = self.order[k];
            let mut outputs = core::mem::take(&mut self.signals[i]);

            let NodeSlot {
                node,
                receiver,
                descriptor,
                routes,
                defaults,
                collapsed,
                ..
            } = &mut self.slots[i];

            for (socket, route) in routes.iter().enumerate() {
                if let Route::Collapse { node: from, socket: from_socket } = *route {
                    match self.signals[from].get(from_socket).and_then(Signal::as_audio) {
                        Some(data) => data.sum_into(&mut collapsed[socket]),
                        None => collapsed[socket] = Chunk::SILENT,
                    }
                }
            }

            let mut inputs = InputWindow {
                routes,
                defaults,
                collapsed,
                signals: &self.signals,
                descriptor: descriptor.unwrap_or_else(Descriptor::mono),
                universes: &mut self.universes,
            };
            let mut window = OutputWindow { signals: &mut outputs };
            node.process(&self.ctx, receiver, &mut inputs, &mut window);

            self.signals[i] = outputs;
        }

        self.ticks += 1;
        Ok(())
    }

    /// Signal produced on `socket` of `node` during the last tick.
    pub fn output(&self, node: NodeId, socket: usize) -> Option<&Signal> {
        self.signals.get(node.index())?.get(socket)
    }

    pub fn audio_output(&self, node: NodeId, socket: usize) -> Option<&AudioData> {
        self.output(node, socket)?.as_audio()
    }

    /// Instances carried by an output socket after the last tick. Event
    /// outputs always carry one.
    pub fn instance_count(&self, node: NodeId, socket: usize) -> usize {
        match self.output(node, socket) {
            Some(Signal::Audio(data)) => data.len(),
            Some(Signal::Events(_)) => 1,
            None => 0,
        }
    }

    /// Resolved descriptor of a node, if polyphony has been resolved.
    pub fn descriptor(&self, node: NodeId) -> Option<Descriptor> {
        self.slots.get(node.index())?.descriptor
    }

    pub fn type_name(&self, node: NodeId) -> Option<&'static str> {
        Some(self.slots.get(node.index())?.node.type_name())
    }

    /// Borrow a node as its concrete type.
    pub fn node<N: Variant>(&self, id: NodeId) -> Option<&N> {
        N::peek(&self.slots.get(id.index())?.node)
    }

    pub fn node_mut<N: Variant>(&mut self, id: NodeId) -> Option<&mut N> {
        N::peek_mut(&mut self.slots.get_mut(id.index())?.node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::nodes::{ChunkSink, EventInput, Instrument, Sampler, Sine};
    use crate::queue::ChunkQueue;

    fn graph() -> Graph {
        Graph::new(GraphConfig::new(48_000), &NodeRegistry::standard())
    }

    #[test]
    fn rejects_bad_connections() {
        let mut g = graph();
        let keys = g.add(EventInput::new());
        let sine = g.add(Sine::new());

        assert!(matches!(
            g.connect(keys.id(), 0, sine.id(), Sine::FREQUENCY),
            Err(GraphError::SocketMismatch { .. })
        ));
        assert!(matches!(
            g.connect(sine.id(), 3, sine.id(), 0),
            Err(GraphError::NoSuchSocket { direction: "output", .. })
        ));
        assert!(matches!(
            g.connect(keys.id(), 0, NodeId(99), 0),
            Err(GraphError::UnknownNode(NodeId(99)))
        ));
    }

    #[test]
    fn cycles_are_reported() {
        let mut g = graph();
        let a = g.add(Sine::new());
        let b = g.add(Sine::new());
        g.connect(a.id(), 0, b.id(), Sine::FREQUENCY).unwrap();
        g.connect(b.id(), 0, a.id(), Sine::FREQUENCY).unwrap();

        assert!(matches!(g.process(), Err(GraphError::Cycle(_))));
        assert_eq!(g.ticks(), 0);

        assert!(g.disconnect(a.id(), Sine::FREQUENCY));
        assert!(g.process().is_ok());
    }

    #[test]
    fn instrument_outputs_own_universe() {
        let mut g = graph();
        let keys = g.add(EventInput::new());
        let piano = g.add(Instrument::new());
        let sine = g.add(Sine::new());
        g.connect(keys.id(), 0, piano.id(), Instrument::EVENTS).unwrap();
        g.connect(piano.id(), Instrument::FREQUENCY, sine.id(), Sine::FREQUENCY).unwrap();
        g.resolve_polyphony().unwrap();

        let piano_out = g.descriptor(piano.id()).unwrap().output;
        assert!(piano_out.is_poly());
        assert_eq!(g.descriptor(sine.id()).unwrap().internal, piano_out);
        assert_eq!(g.descriptor(keys.id()).unwrap(), Descriptor::mono());
    }

    #[test]
    fn two_instruments_into_one_oscillator_conflict() {
        let mut g = graph();
        let a = g.add(Instrument::new());
        let b = g.add(Instrument::new());
        let sine = g.add(Sine::new());
        g.connect(a.id(), Instrument::FREQUENCY, sine.id(), Sine::FREQUENCY).unwrap();
        g.connect(b.id(), Instrument::DECAY, sine.id(), Sine::AMPLITUDE).unwrap();

        let err = g.process().unwrap_err();
        assert!(matches!(
            err,
            GraphError::Polyphony {
                source: PolyphonyError::Conflict { .. },
                ..
            }
        ));
        assert_eq!(g.ticks(), 0);
    }

    #[test]
    fn poly_into_mono_input_is_summed() {
        let mut g = graph();
        let mut keys = g.add(EventInput::new());
        let piano = g.add(Instrument::new());
        let (producer, mut consumer) = ChunkQueue::new(4);
        let sink = g.add(ChunkSink::new(producer));
        g.connect(keys.id(), 0, piano.id(), Instrument::EVENTS).unwrap();
        g.connect(piano.id(), Instrument::VELOCITY, sink.id(), ChunkSink::INPUT).unwrap();

        keys.send(Event::note_on(60, 127)).unwrap();
        keys.send(Event::note_on(64, 127)).unwrap();
        keys.send(Event::note_on(67, 127)).unwrap();
        g.process().unwrap();

        let mixed = consumer.pop().unwrap();
        assert!(mixed.iter().all(|s| (*s - 3.0).abs() < 1e-6));
    }

    #[test]
    fn mono_into_poly_is_broadcast() {
        let mut g = graph();
        let mut keys = g.add(EventInput::new());
        let piano = g.add(Instrument::new());
        let sine = g.add(Sine::new());
        let level = g.add(Sampler::new());
        g.connect(keys.id(), 0, piano.id(), Instrument::EVENTS).unwrap();
        g.connect(piano.id(), Instrument::FREQUENCY, sine.id(), Sine::FREQUENCY).unwrap();
        g.connect(level.id(), Sampler::AUDIO, sine.id(), Sine::AMPLITUDE).unwrap();

        keys.send(Event::note_on(60, 100)).unwrap();
        keys.send(Event::note_on(72, 100)).unwrap();
        g.process().unwrap();

        assert_eq!(g.instance_count(sine.id(), Sine::OUTPUT), 2);
        // Idle sampler feeds zero amplitude to every voice
        let out = g.audio_output(sine.id(), Sine::OUTPUT).unwrap();
        assert!(out.instances().iter().all(|c| c.iter().all(|s| *s == 0.0)));
    }

    #[test]
    fn outputs_are_typed_before_the_first_tick() {
        let mut g = Graph::new(
            GraphConfig::new(48_000).with_polyphony_hint(8),
            &NodeRegistry::standard(),
        );
        let keys = g.add(EventInput::new());
        let piano = g.add(Instrument::new());

        assert_eq!(g.output(keys.id(), 0).map(Signal::kind), Some(SocketType::Events));
        assert!(g.output(keys.id(), 0).and_then(Signal::as_events).is_some_and(<[Event]>::is_empty));
        for socket in 0..4 {
            let data = g.audio_output(piano.id(), socket).unwrap();
            // Silent single instance until the node runs
            assert_eq!(data.len(), 1);
            assert!(data.instances()[0].iter().all(|s| *s == 0.0));
        }
        assert!(g.output(piano.id(), 4).is_none());
    }

    #[test]
    fn add_named_uses_the_registry() {
        let mut g = graph();
        let keys = g.add_named("EventInput").unwrap();
        assert_eq!(g.type_name(keys.id()), Some("EventInput"));
        assert!(g.node::<EventInput>(keys.id()).is_some());
        assert!(g.node::<Sine>(keys.id()).is_none());

        assert!(matches!(g.add_named("Theremin"), Err(GraphError::UnknownType(name)) if name == "Theremin"));
    }

    #[test]
    fn full_message_queue_returns_the_message() {
        let mut g = Graph::new(
            GraphConfig::new(48_000).with_message_queue_size(2),
            &NodeRegistry::standard(),
        );
        let mut keys = g.add(EventInput::new());
        keys.send(Event::note_on(60, 1)).unwrap();
        keys.send(Event::note_on(61, 1)).unwrap();
        assert_eq!(keys.send(Event::note_on(62, 1)), Err(Event::note_on(62, 1)));

        g.process().unwrap();
        assert_eq!(keys.capacity_left(), 2);
        assert_eq!(g.output(keys.id(), 0).and_then(Signal::as_events).map(<[Event]>::len), Some(2));
    }

    #[test]
    fn accepted_messages_all_arrive_in_order() {
        let mut g = Graph::new(
            GraphConfig::new(48_000).with_message_queue_size(4),
            &NodeRegistry::standard(),
        );
        let mut keys = g.add(EventInput::new());

        for round in 0..3u8 {
            let mut accepted = Vec::new();
            let mut note = round * 10;
            while keys.capacity_left() > 0 {
                keys.send(Event::note_off(note)).unwrap();
                accepted.push(Event::note_off(note));
                note += 1;
            }
            assert!(keys.send(Event::Trigger).is_err());

            g.process().unwrap();
            assert_eq!(g.output(keys.id(), 0).and_then(Signal::as_events), Some(&accepted[..]));
        }
        assert_eq!(g.node::<EventInput>(keys.id()).unwrap().sent(), 12);
    }
}
