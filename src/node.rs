//! Core node trait, message plumbing and the closed set of node kinds.

use rtrb::Consumer;

use crate::event::Event;
use crate::nodes::{CaptureNode, ChunkSink, EventInput, Instrument, Sampler, SamplerMessage, Sine};
use crate::socket::{InputWindow, OutputWindow, Sockets};
use crate::universe::{Descriptor, PolyphonyError, Universe, UniverseId};

/// Information available during audio processing.
///
/// Passed to every [`AudioNode::process`] call.
#[derive(Clone, Copy, Debug)]
pub struct ProcessContext {
    /// Sample rate of the graph in Hz (e.g., 44100, 48000)
    pub sample_rate: u32,
    /// Number of samples per block (always [`BLOCK_SIZE`](crate::BLOCK_SIZE))
    pub buffer_size: usize,
}

/// Unique identifier for a node within a graph.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Everything that can travel through a node's message queue.
///
/// Messages are the out-of-band side channel: parameter changes, incoming
/// events and binary payloads such as sample data. They are drained at the
/// start of the receiving node's next `process` call.
#[derive(Clone, Debug)]
pub enum NodeMessage {
    /// Carries nothing; used by nodes without parameters.
    Empty,
    Event(Event),
    Sampler(SamplerMessage),
}

/// Conversion between a node's own message type and [`NodeMessage`].
pub trait Message: Sized + Send + 'static {
    fn into_message(self) -> NodeMessage;

    /// `None` if the message is meant for a different kind of node.
    fn from_message(message: NodeMessage) -> Option<Self>;
}

impl Message for () {
    fn into_message(self) -> NodeMessage {
        NodeMessage::Empty
    }

    fn from_message(_message: NodeMessage) -> Option<Self> {
        None
    }
}

impl Message for NodeMessage {
    fn into_message(self) -> NodeMessage {
        self
    }

    fn from_message(message: NodeMessage) -> Option<Self> {
        Some(message)
    }
}

impl Message for Event {
    fn into_message(self) -> NodeMessage {
        NodeMessage::Event(self)
    }

    fn from_message(message: NodeMessage) -> Option<Self> {
        match message {
            NodeMessage::Event(event) => Some(event),
            _ => None,
        }
    }
}

impl Message for SamplerMessage {
    fn into_message(self) -> NodeMessage {
        NodeMessage::Sampler(self)
    }

    fn from_message(message: NodeMessage) -> Option<Self> {
        match message {
            NodeMessage::Sampler(msg) => Some(msg),
            _ => None,
        }
    }
}

/// The trait every processing node implements.
///
/// A node declares a fixed set of typed [`Sockets`], maps the polyphony of its
/// inputs to a [`Descriptor`], and processes one block per tick.
///
/// # Message-Based Parameters
///
/// Instead of shared mutable state, nodes receive parameter updates and
/// out-of-band payloads via messages, drained at the start of `process()`.
pub trait AudioNode: Send + 'static {
    /// Message type for parameter updates (use `()` if none needed)
    type Message: Message;

    /// Input and output socket layout. Must not change over the node's life.
    fn sockets(&self) -> Sockets;

    /// Map the universes arriving on each input socket to this node's
    /// descriptor. `own` is a polyphonic universe reserved for this node,
    /// for nodes that create instances themselves.
    ///
    /// Must be a pure function of its arguments. The default forces all
    /// inputs into one shared universe.
    fn infer_polyphony(&self, inputs: &[Universe], own: UniverseId) -> Result<Descriptor, PolyphonyError> {
        let _ = own;
        Descriptor::shared(inputs)
    }

    /// Process one block.
    ///
    /// 1. Drain and handle all pending messages
    /// 2. Read from `inputs`, write to `outputs`
    fn process(
        &mut self,
        ctx: &ProcessContext,
        messages: impl Iterator<Item = Self::Message>,
        inputs: &mut InputWindow<'_>,
        outputs: &mut OutputWindow<'_>,
    );
}

/// Access to a concrete node type stored inside [`Node`].
pub trait Variant: AudioNode + Sized {
    fn peek(node: &Node) -> Option<&Self>;
    fn peek_mut(node: &mut Node) -> Option<&mut Self>;
}

fn run<N: AudioNode>(
    node: &mut N,
    ctx: &ProcessContext,
    receiver: &mut Consumer<NodeMessage>,
    inputs: &mut InputWindow<'_>,
    outputs: &mut OutputWindow<'_>,
) {
    let messages = core::iter::from_fn(|| loop {
        let message = receiver.pop().ok()?;
        match N::Message::from_message(message) {
            Some(message) => return Some(message),
            None => tracing::trace!("discarding message not meant for this node"),
        }
    });
    node.process(ctx, messages, inputs, outputs);
}

macro_rules! node_variants {
    ($($variant:ident($ty:ty) => $name:literal),* $(,)?) => {
        /// Every kind of node a graph can hold.
        ///
        /// Dispatch is a `match`, resolved once per node per tick.
        pub enum Node {
            $($variant($ty),)*
        }

        impl Node {
            /// Name the node kind is registered under.
            pub fn type_name(&self) -> &'static str {
                match self {
                    $(Node::$variant(_) => $name,)*
                }
            }

            pub fn sockets(&self) -> Sockets {
                match self {
                    $(Node::$variant(n) => n.sockets(),)*
                }
            }

            pub fn infer_polyphony(
                &self,
                inputs: &[Universe],
                own: UniverseId,
            ) -> Result<Descriptor, PolyphonyError> {
                match self {
                    $(Node::$variant(n) => n.infer_polyphony(inputs, own),)*
                }
            }

            pub(crate) fn process(
                &mut self,
                ctx: &ProcessContext,
                receiver: &mut Consumer<NodeMessage>,
                inputs: &mut InputWindow<'_>,
                outputs: &mut OutputWindow<'_>,
            ) {
                match self {
                    $(Node::$variant(n) => run(n, ctx, receiver, inputs, outputs),)*
                }
            }
        }

        $(
            impl From<$ty> for Node {
                fn from(node: $ty) -> Self {
                    Node::$variant(node)
                }
            }

            impl Variant for $ty {
                fn peek(node: &Node) -> Option<&Self> {
                    match node {
                        Node::$variant(n) => Some(n),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }

                fn peek_mut(node: &mut Node) -> Option<&mut Self> {
                    match node {
                        Node::$variant(n) => Some(n),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }
            }
        )*
    };
}

node_variants! {
    Events(EventInput) => "EventInput",
    Instrument(Instrument) => "Instrument",
    Sampler(Sampler) => "Sampler",
    Capture(CaptureNode) => "Capture",
    Sine(Sine) => "Sine",
    Sink(ChunkSink) => "ChunkSink",
}
