//! Polyphonic voice engine

use tracing::trace;

use crate::event::{note_to_freq, Event, MAX_NOTE};
use crate::node::{AudioNode, ProcessContext};
use crate::socket::{InputSocket, InputWindow, OutputWindow, SocketType, Sockets};
use crate::universe::{Descriptor, PolyphonyError, Universe, UniverseId};

const NOTES: usize = MAX_NOTE as usize + 1;

/// Longest release tail, in seconds. Keeps the tail window finite in `f32`.
pub const MAX_SUSTAIN_SECS: f32 = 3600.0;

/// Lifecycle stage of a voice as seen from outside a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoicePhase {
    Sounding,
    /// Playing its release tail.
    Released,
    /// Marked for removal; never observed after the tick that killed it.
    Dead,
}

/// One sounding note.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoiceState {
    pub note: u8,
    /// Pitch in Hz.
    pub freq: f32,
    /// Velocity normalized to `0.0..=1.0`.
    pub velocity: f32,
    /// Samples since note-on.
    pub age: u64,
    /// Samples since release began. Zero until released.
    pub since_rel: u64,
    pub released: bool,
    pub dead: bool,
}

impl VoiceState {
    fn new(note: u8, velocity: u8) -> Self {
        Self {
            note,
            freq: note_to_freq(note),
            velocity: velocity.min(127) as f32 / 127.0,
            age: 0,
            since_rel: 0,
            released: false,
            dead: false,
        }
    }

    pub fn phase(&self) -> VoicePhase {
        if self.dead {
            VoicePhase::Dead
        } else if self.released {
            VoicePhase::Released
        } else {
            VoicePhase::Sounding
        }
    }

    fn release(&mut self, instant: bool) {
        self.released = true;
        self.dead |= instant;
    }

    /// Envelope value `offset` samples into the current block.
    #[inline]
    fn decay_at(&self, offset: u64, window: f32) -> f32 {
        if !self.released {
            1.0
        } else if window > 0.0 {
            ((window - (self.since_rel + offset) as f32) / window).max(0.0)
        } else {
            0.0
        }
    }
}

/// Where the voice for a pitch lives during a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    /// Index into the live voices carried over from the previous tick.
    Live(usize),
    /// Index into the voices created this tick.
    New(usize),
}

/// Turns a stream of note events into one signal instance per sounding voice.
///
/// Reads an event batch and a sustain time (seconds) each tick and emits, per
/// live voice, its frequency, velocity, running age in seconds and a linear
/// release envelope. Its outputs live in the node's own polyphonic universe,
/// whose slot positions stay stable across ticks: survivors keep their order
/// and new voices are appended after them.
pub struct Instrument {
    voices: Vec<VoiceState>,
    created: Vec<VoiceState>,
    survivors: Vec<VoiceState>,
    removed: Vec<usize>,
    index: [Option<Slot>; NOTES],
}

impl Instrument {
    pub const EVENTS: usize = 0;
    pub const SUSTAIN: usize = 1;

    pub const FREQUENCY: usize = 0;
    pub const VELOCITY: usize = 1;
    pub const RUNTIME: usize = 2;
    pub const DECAY: usize = 3;

    const SOCKETS: Sockets = Sockets::new(
        &[InputSocket::events(), InputSocket::audio(0.0)],
        &[SocketType::Audio, SocketType::Audio, SocketType::Audio, SocketType::Audio],
    );

    pub fn new() -> Self {
        Self::with_capacity(32)
    }

    /// Pre-allocate room for `voices` simultaneous voices.
    pub fn with_capacity(voices: usize) -> Self {
        Self {
            voices: Vec::with_capacity(voices),
            created: Vec::with_capacity(voices),
            survivors: Vec::with_capacity(voices),
            removed: Vec::with_capacity(voices),
            index: [None; NOTES],
        }
    }

    /// Live voices after the last tick.
    #[inline]
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Live voices in slot order.
    #[inline]
    pub fn voices(&self) -> &[VoiceState] {
        &self.voices
    }

    /// The most recent voice started for `note`, if still alive.
    pub fn voice_for(&self, note: u8) -> Option<&VoiceState> {
        match self.index.get(note as usize).copied().flatten()? {
            Slot::Live(i) => self.voices.get(i),
            Slot::New(_) => None,
        }
    }

    fn voice_mut(&mut self, note: u8) -> Option<&mut VoiceState> {
        match self.index[note as usize]? {
            Slot::Live(i) => self.voices.get_mut(i),
            Slot::New(i) => self.created.get_mut(i),
        }
    }

    fn apply(&mut self, events: &[Event], instant: bool) {
        self.created.clear();

        for event in events {
            match *event {
                Event::NoteOn { note, velocity } if note <= MAX_NOTE => {
                    if let Some(previous) = self.voice_mut(note) {
                        previous.release(instant);
                    }
                    self.created.push(VoiceState::new(note, velocity));
                    self.index[note as usize] = Some(Slot::New(self.created.len() - 1));
                }
                Event::NoteOff { note } if note <= MAX_NOTE => {
                    if let Some(voice) = self.voice_mut(note) {
                        voice.release(instant);
                    }
                }
                e if e.is_panic() => {
                    self.voices
                        .iter_mut()
                        .chain(self.created.iter_mut())
                        .for_each(|v| v.dead = true);
                }
                e => trace!(event = ?e, "instrument ignoring event"),
            }
        }
    }

    /// Kill voices whose tail has run out and split the rest off as survivors.
    fn sweep(&mut self, tail: u64) {
        self.removed.clear();
        self.survivors.clear();

        for (slot, voice) in self.voices.iter_mut().enumerate() {
            if voice.released && voice.since_rel > tail {
                voice.dead = true;
            }
            if voice.dead {
                self.removed.push(slot);
            } else {
                self.survivors.push(*voice);
            }
        }
    }

    fn rebuild(&mut self) {
        core::mem::swap(&mut self.voices, &mut self.survivors);
        self.voices.extend(self.created.iter().filter(|v| !v.dead));
        self.created.clear();

        self.index = [None; NOTES];
        for (slot, voice) in self.voices.iter().enumerate() {
            self.index[voice.note as usize] = Some(Slot::Live(slot));
        }
    }

    fn emit(&mut self, sample_rate: f32, sustain: f32, outputs: &mut OutputWindow<'_>) {
        let count = self.voices.len();
        let window = sustain * sample_rate;

        if let Some(out) = outputs.audio(Self::FREQUENCY) {
            out.resize(count);
            for (chunk, voice) in out.instances_mut().iter_mut().zip(&self.voices) {
                chunk.iter_mut().for_each(|s| *s = voice.freq);
            }
        }

        if let Some(out) = outputs.audio(Self::VELOCITY) {
            out.resize(count);
            for (chunk, voice) in out.instances_mut().iter_mut().zip(&self.voices) {
                chunk.iter_mut().for_each(|s| *s = voice.velocity);
            }
        }

        if let Some(out) = outputs.audio(Self::RUNTIME) {
            out.resize(count);
            let rate = sample_rate as f64;
            for (chunk, voice) in out.instances_mut().iter_mut().zip(&self.voices) {
                for (j, s) in chunk.iter_mut().enumerate() {
                    *s = ((voice.age + j as u64) as f64 / rate) as f32;
                }
            }
        }

        if let Some(out) = outputs.audio(Self::DECAY) {
            out.resize(count);
            for (chunk, voice) in out.instances_mut().iter_mut().zip(&self.voices) {
                for (j, s) in chunk.iter_mut().enumerate() {
                    *s = voice.decay_at(j as u64, window);
                }
            }
        }
    }

    fn advance(&mut self, samples: u64) {
        for voice in &mut self.voices {
            voice.age += samples;
            if voice.released {
                voice.since_rel += samples;
            }
        }
    }
}

impl Default for Instrument {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioNode for Instrument {
    type Message = ();

    fn sockets(&self) -> Sockets {
        Self::SOCKETS
    }

    fn infer_polyphony(&self, _inputs: &[Universe], own: UniverseId) -> Result<Descriptor, PolyphonyError> {
        Ok(Descriptor::new(Universe::Mono, Universe::Mono, Universe::Poly(own)))
    }

    fn process(
        &mut self,
        ctx: &ProcessContext,
        _messages: impl Iterator<Item = ()>,
        inputs: &mut InputWindow<'_>,
        outputs: &mut OutputWindow<'_>,
    ) {
        let own = match inputs.descriptor().output {
            Universe::Poly(id) => Some(id),
            Universe::Mono => None,
        };
        if let Some(id) = own {
            inputs.universes_mut().ensure(id, self.voices.len());
        }

        // NaN and negative sustain both collapse to an instant cutoff
        let sustain = inputs.scalar(Self::SUSTAIN).max(0.0).min(MAX_SUSTAIN_SECS);
        let sample_rate = ctx.sample_rate as f32;
        let tail = (sustain * sample_rate) as u64;

        self.apply(inputs.events(Self::EVENTS), sustain == 0.0);
        self.sweep(tail);

        let added = self.created.iter().filter(|v| !v.dead).count();
        if let Some(id) = own {
            inputs.universes_mut().update(id, &self.removed, added);
        }
        if !self.removed.is_empty() || added > 0 {
            trace!(removed = self.removed.len(), added, "voice set changed");
        }

        self.rebuild();
        self.emit(sample_rate, sustain, outputs);
        self.advance(ctx.buffer_size as u64);
    }
}
