//! Typed sockets and the per-tick views a node reads and writes.

use crate::event::Event;
use crate::queue::Chunk;
use crate::universe::{Descriptor, Universes};

static SILENCE: Chunk = Chunk::SILENT;

/// Kind of data a socket carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SocketType {
    /// Blocks of samples, one block per instance. Control values travel as
    /// audio and are read as a scalar from the first sample.
    Audio,
    /// A batch of discrete events for the tick.
    Events,
}

/// An input socket declaration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputSocket {
    pub kind: SocketType,
    /// Constant value an unconnected audio input reads as.
    pub default: f32,
}

impl InputSocket {
    pub const fn audio(default: f32) -> Self {
        Self {
            kind: SocketType::Audio,
            default,
        }
    }

    pub const fn events() -> Self {
        Self {
            kind: SocketType::Events,
            default: 0.0,
        }
    }
}

/// The fixed socket layout of a node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sockets {
    pub inputs: &'static [InputSocket],
    pub outputs: &'static [SocketType],
}

impl Sockets {
    pub const fn new(inputs: &'static [InputSocket], outputs: &'static [SocketType]) -> Self {
        Self { inputs, outputs }
    }
}

/// Per-instance audio blocks carried by one socket.
#[derive(Clone, Debug)]
pub struct AudioData {
    instances: Vec<Chunk>,
}

impl Default for AudioData {
    fn default() -> Self {
        Self {
            instances: vec![Chunk::SILENT],
        }
    }
}

impl AudioData {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    #[inline]
    pub fn instances(&self) -> &[Chunk] {
        &self.instances
    }

    #[inline]
    pub fn instances_mut(&mut self) -> &mut [Chunk] {
        &mut self.instances
    }

    /// Resize to `count` instances. New instances start silent.
    #[inline]
    pub fn resize(&mut self, count: usize) {
        self.instances.resize(count, Chunk::SILENT);
    }

    pub(crate) fn reserve(&mut self, capacity: usize) {
        self.instances
            .reserve(capacity.saturating_sub(self.instances.len()));
    }

    /// Set every sample of every instance to `value`.
    pub fn fill(&mut self, value: f32) {
        for chunk in &mut self.instances {
            chunk.iter_mut().for_each(|s| *s = value);
        }
    }

    /// Sum all instances into `dest` (fan-in).
    pub fn sum_into(&self, dest: &mut Chunk) {
        *dest = Chunk::SILENT;
        for chunk in &self.instances {
            for (d, s) in dest.iter_mut().zip(chunk.iter()) {
                *d += *s;
            }
        }
    }
}

/// Data produced on an output socket during the last tick.
#[derive(Clone, Debug)]
pub enum Signal {
    Audio(AudioData),
    Events(Vec<Event>),
}

impl Signal {
    pub(crate) fn new(kind: SocketType) -> Self {
        match kind {
            SocketType::Audio => Signal::Audio(AudioData::new()),
            SocketType::Events => Signal::Events(Vec::new()),
        }
    }

    pub fn kind(&self) -> SocketType {
        match self {
            Signal::Audio(_) => SocketType::Audio,
            Signal::Events(_) => SocketType::Events,
        }
    }

    pub fn as_audio(&self) -> Option<&AudioData> {
        match self {
            Signal::Audio(data) => Some(data),
            Signal::Events(_) => None,
        }
    }

    pub fn as_events(&self) -> Option<&[Event]> {
        match self {
            Signal::Events(events) => Some(events),
            Signal::Audio(_) => None,
        }
    }
}

/// How an input socket is fed this tick, decided when polyphony is resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Route {
    Unconnected,
    /// Same universe on both ends.
    Direct { node: usize, socket: usize },
    /// Mono source read by every instance.
    Broadcast { node: usize, socket: usize },
    /// Polyphonic source summed into a mono input.
    Collapse { node: usize, socket: usize },
}

/// Read access to one resolved audio input.
#[derive(Clone, Copy, Debug)]
pub struct AudioInput<'a> {
    buffers: &'a [Chunk],
    broadcast: bool,
}

impl<'a> AudioInput<'a> {
    fn shared(chunk: &'a Chunk) -> Self {
        Self {
            buffers: core::slice::from_ref(chunk),
            broadcast: true,
        }
    }

    /// Block for instance `i`. Broadcast inputs return the same block for
    /// every instance; missing instances read as silence.
    #[inline]
    pub fn instance(&self, i: usize) -> &'a Chunk {
        if self.broadcast {
            &self.buffers[0]
        } else {
            self.buffers.get(i).unwrap_or(&SILENCE)
        }
    }

    /// Number of distinct blocks behind this input.
    #[inline]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    #[inline]
    pub fn is_broadcast(&self) -> bool {
        self.broadcast
    }
}

/// Everything a node may read during [`process`](crate::AudioNode::process):
/// its resolved inputs, its polyphony descriptor and the universe table.
pub struct InputWindow<'a> {
    pub(crate) routes: &'a [Route],
    pub(crate) defaults: &'a [Chunk],
    pub(crate) collapsed: &'a [Chunk],
    pub(crate) signals: &'a [Vec<Signal>],
    pub(crate) descriptor: Descriptor,
    pub(crate) universes: &'a mut Universes,
}

impl<'a> InputWindow<'a> {
    /// Resolved audio input on `socket`.
    pub fn audio(&self, socket: usize) -> AudioInput<'a> {
        let signals: &'a [Vec<Signal>] = self.signals;
        let defaults: &'a [Chunk] = self.defaults;
        let collapsed: &'a [Chunk] = self.collapsed;

        let source = |node: usize, socket: usize| {
            signals
                .get(node)
                .and_then(|outputs| outputs.get(socket))
                .and_then(Signal::as_audio)
                .map(AudioData::instances)
        };

        let default = || AudioInput::shared(defaults.get(socket).unwrap_or(&SILENCE));

        match self.routes.get(socket).copied().unwrap_or(Route::Unconnected) {
            Route::Unconnected => default(),
            Route::Direct { node, socket } => source(node, socket).map_or_else(default, |buffers| AudioInput {
                buffers,
                broadcast: false,
            }),
            Route::Broadcast { node, socket } => source(node, socket)
                .and_then(|buffers| buffers.first())
                .map_or_else(default, AudioInput::shared),
            Route::Collapse { .. } => AudioInput::shared(collapsed.get(socket).unwrap_or(&SILENCE)),
        }
    }

    /// First sample of the first instance of an audio input.
    #[inline]
    pub fn scalar(&self, socket: usize) -> f32 {
        self.audio(socket).instance(0)[0]
    }

    /// Events on `socket` this tick. Unconnected sockets carry none.
    pub fn events(&self, socket: usize) -> &'a [Event] {
        let (node, socket) = match self.routes.get(socket) {
            Some(Route::Direct { node, socket })
            | Some(Route::Broadcast { node, socket })
            | Some(Route::Collapse { node, socket }) => (*node, *socket),
            _ => return &[],
        };

        let signals: &'a [Vec<Signal>] = self.signals;
        signals
            .get(node)
            .and_then(|outputs| outputs.get(socket))
            .and_then(Signal::as_events)
            .unwrap_or(&[])
    }

    #[inline]
    pub fn descriptor(&self) -> Descriptor {
        self.descriptor
    }

    /// Number of instances the node computes this tick.
    #[inline]
    pub fn instances(&self) -> usize {
        self.universes.count(self.descriptor.internal)
    }

    #[inline]
    pub fn universes(&self) -> &Universes {
        &*self.universes
    }

    #[inline]
    pub fn universes_mut(&mut self) -> &mut Universes {
        &mut *self.universes
    }
}

/// Write access to a node's output sockets.
pub struct OutputWindow<'a> {
    pub(crate) signals: &'a mut [Signal],
}

impl<'a> OutputWindow<'a> {
    pub fn audio(&mut self, socket: usize) -> Option<&mut AudioData> {
        match self.signals.get_mut(socket) {
            Some(Signal::Audio(data)) => Some(data),
            _ => None,
        }
    }

    pub fn events(&mut self, socket: usize) -> Option<&mut Vec<Event>> {
        match self.signals.get_mut(socket) {
            Some(Signal::Events(events)) => Some(events),
            _ => None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}
