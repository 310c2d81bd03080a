//! Built-in audio nodes.
//!
//! Nodes are organized into two categories:
//!
//! ## Sources ([`source`])
//!
//! Produce signals from events, messages or hardware:
//! - [`EventInput`] - Inject events sent from the control thread
//! - [`Instrument`] - Turn note events into polyphonic voice signals
//! - [`Sampler`] - Play an in-memory sample on trigger
//! - [`CaptureNode`] - Read hardware input through a chunk queue
//! - [`Sine`] - Per-voice sine oscillator with frequency/amplitude inputs
//!
//! ## Sinks ([`sink`])
//!
//! Consume audio with no audio outputs:
//! - [`ChunkSink`] - Push mixed-down blocks into a chunk queue
//!
//! # Message Types
//!
//! - [`Event`](crate::Event) - Sent to [`EventInput`]
//! - [`SamplerMessage`] - Load, unload and configure a [`Sampler`]
//!
//! Nodes without out-of-band parameters use `()` as their message type.

pub mod sink;
pub mod source;

pub use sink::ChunkSink;
pub use source::{
    CaptureConfig, CaptureError, CaptureFeed, CaptureNode, EventInput, Instrument, PlaybackMode, SampleData,
    Sampler, SamplerMessage, Sine, StreamGuard, VoicePhase, VoiceState,
};
