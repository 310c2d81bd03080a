//! # polyphon
//!
//! The real-time core of a node-based modular synthesizer.
//!
//! A [`Graph`] of nodes exchanges fixed-size blocks of samples ([`Chunk`]s) and
//! event batches once per processing tick. Three pieces make this more than a
//! plain audio graph:
//!
//! - **Polyphony algebra** ([`universe`]): every signal carries a number of
//!   parallel instances, resolved graph-wide before a tick runs. Nodes such as
//!   the [`Instrument`](nodes::Instrument) fan a single event stream out into
//!   one instance per sounding voice; mono inputs downstream fan them back in.
//! - **Voice lifecycle** ([`nodes::Instrument`]): note events become a bounded
//!   set of live, decaying voices with stable per-tick slot positions.
//! - **Lock-free capture** ([`queue`], [`nodes::CaptureNode`]): hardware input
//!   is handed to the graph through a wait-free chunk queue filled by the
//!   device callback.
//!
//! ## Quick Start
//!
//! ```
//! use polyphon::{Event, Graph, GraphConfig, NodeRegistry};
//! use polyphon::nodes::{EventInput, Instrument, Sine};
//!
//! let registry = NodeRegistry::standard();
//! let mut graph = Graph::new(GraphConfig::new(48_000), &registry);
//!
//! let mut keys = graph.add(EventInput::new());
//! let piano = graph.add(Instrument::new());
//! let sine = graph.add(Sine::new());
//!
//! graph.connect(keys.id(), 0, piano.id(), Instrument::EVENTS).unwrap();
//! graph.connect(piano.id(), Instrument::FREQUENCY, sine.id(), Sine::FREQUENCY).unwrap();
//! graph.connect(piano.id(), Instrument::DECAY, sine.id(), Sine::AMPLITUDE).unwrap();
//!
//! keys.send(Event::note_on(60, 100)).ok();
//! keys.send(Event::note_on(64, 100)).ok();
//! graph.process().unwrap();
//!
//! assert_eq!(graph.instance_count(sine.id(), 0), 2);
//! ```
//!
//! ## Features
//!
//! - `cpal_input` - open hardware input streams through CPAL ([`CpalInput`])

pub mod event;
pub mod graph;
pub mod node;
pub mod nodes;
pub mod queue;
pub mod registry;
pub mod socket;
pub mod universe;

#[cfg(feature = "cpal_input")]
mod device;

pub use event::Event;
pub use graph::{Graph, GraphConfig, GraphError, Handle};
pub use node::{AudioNode, Message, Node, NodeId, NodeMessage, ProcessContext};
pub use queue::{Chunk, ChunkConsumer, ChunkProducer, ChunkQueue};
pub use registry::NodeRegistry;
pub use socket::{AudioData, AudioInput, InputWindow, OutputWindow, Signal, SocketType, Sockets};
pub use universe::{Descriptor, PolyphonyError, Universe, UniverseId, Universes};

#[cfg(feature = "cpal_input")]
pub use device::CpalInput;

/// Number of samples per block and per [`Chunk`].
pub const BLOCK_SIZE: usize = dasp_graph::Buffer::LEN;
