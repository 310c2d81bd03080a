//! Triggered sample playback

use std::sync::Arc;

use tracing::debug;

use crate::event::Event;
use crate::node::{AudioNode, ProcessContext};
use crate::socket::{InputSocket, InputWindow, OutputWindow, SocketType, Sockets};
use crate::universe::{Descriptor, PolyphonyError, Universe, UniverseId};

/// An immutable mono sample buffer, shared cheaply between threads.
#[derive(Clone, Debug)]
pub struct SampleData {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl SampleData {
    pub fn new(samples: impl Into<Arc<[f32]>>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate: sample_rate.max(1),
        }
    }

    /// Build from interleaved frames, averaging channels down to mono.
    pub fn from_interleaved(samples: &[f32], channels: usize, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let mono: Vec<f32> = samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();
        Self::new(mono, sample_rate)
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// What happens when the playhead reaches the end of the sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackMode {
    /// Stop and output silence until the next trigger.
    #[default]
    OneShot,
    /// Wrap to the start and keep playing.
    Loop,
}

/// Messages to control a sampler
#[derive(Clone, Debug)]
pub enum SamplerMessage {
    /// Replace the sample buffer. Playback stops until the next trigger.
    Load(SampleData),
    /// Drop the sample buffer and stop.
    Unload,
    SetMode(PlaybackMode),
}

/// Plays an in-memory sample from the start whenever a trigger arrives.
///
/// Sample data is delivered out of band through [`SamplerMessage::Load`] and
/// resampled to the graph rate with linear interpolation. Triggers with no
/// sample loaded do nothing.
#[derive(Debug, Default)]
pub struct Sampler {
    data: Option<SampleData>,
    mode: PlaybackMode,
    /// Position in source samples.
    playhead: f64,
    running: bool,
}

impl Sampler {
    pub const TRIGGER: usize = 0;

    pub const AUDIO: usize = 0;

    const SOCKETS: Sockets = Sockets::new(&[InputSocket::events()], &[SocketType::Audio]);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sample(mut self, data: SampleData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_mode(mut self, mode: PlaybackMode) -> Self {
        self.mode = mode;
        self
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.data.as_ref().is_some_and(|d| !d.is_empty())
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[inline]
    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    /// Playhead in source samples.
    #[inline]
    pub fn playhead(&self) -> f64 {
        self.playhead
    }

    fn handle(&mut self, msg: SamplerMessage) {
        match msg {
            SamplerMessage::Load(data) => {
                debug!(samples = data.len(), rate = data.sample_rate(), "sampler loaded");
                self.data = Some(data);
                self.playhead = 0.0;
                self.running = false;
            }
            SamplerMessage::Unload => {
                self.data = None;
                self.playhead = 0.0;
                self.running = false;
            }
            SamplerMessage::SetMode(mode) => self.mode = mode,
        }
    }

    fn trigger(&mut self) {
        if self.is_loaded() {
            self.playhead = 0.0;
            self.running = true;
        }
    }
}

impl AudioNode for Sampler {
    type Message = SamplerMessage;

    fn sockets(&self) -> Sockets {
        Self::SOCKETS
    }

    fn infer_polyphony(&self, _inputs: &[Universe], _own: UniverseId) -> Result<Descriptor, PolyphonyError> {
        Ok(Descriptor::mono())
    }

    fn process(
        &mut self,
        ctx: &ProcessContext,
        messages: impl Iterator<Item = SamplerMessage>,
        inputs: &mut InputWindow<'_>,
        outputs: &mut OutputWindow<'_>,
    ) {
        for msg in messages {
            self.handle(msg);
        }

        if inputs.events(Self::TRIGGER).iter().any(|e| matches!(e, Event::Trigger)) {
            self.trigger();
        }

        let Some(out) = outputs.audio(Self::AUDIO) else {
            return;
        };
        out.resize(1);
        let chunk = &mut out.instances_mut()[0];

        let data = match &self.data {
            Some(data) if self.running && !data.is_empty() => data,
            _ => {
                self.running = false;
                chunk.iter_mut().for_each(|s| *s = 0.0);
                return;
            }
        };

        let samples = data.samples();
        let len = samples.len() as f64;
        let step = data.sample_rate() as f64 / ctx.sample_rate as f64;
        let looping = self.mode == PlaybackMode::Loop;

        for sample in chunk.iter_mut() {
            if self.playhead >= len {
                if looping {
                    self.playhead %= len;
                } else {
                    self.running = false;
                    *sample = 0.0;
                    continue;
                }
            }

            let idx = self.playhead as usize;
            let frac = (self.playhead - idx as f64) as f32;
            let a = samples[idx];
            let b = match samples.get(idx + 1) {
                Some(&b) => b,
                None if looping => samples[0],
                None => a,
            };
            *sample = a + (b - a) * frac;
            self.playhead += step;
        }

        if !looping && self.playhead >= len {
            self.running = false;
        }
    }
}
