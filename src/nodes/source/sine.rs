//! Sine wave oscillator

use crate::node::{AudioNode, ProcessContext};
use crate::socket::{InputSocket, InputWindow, OutputWindow, SocketType, Sockets};

/// A sine oscillator with one phase per instance.
///
/// Frequency and amplitude are audio-rate inputs. When they come from a
/// polyphonic source the oscillator runs once per voice, and its phases follow
/// the universe's change report so each voice keeps a continuous waveform.
pub struct Sine {
    phases: Vec<f32>,
}

impl Sine {
    pub const FREQUENCY: usize = 0;
    pub const AMPLITUDE: usize = 1;

    pub const OUTPUT: usize = 0;

    const SOCKETS: Sockets = Sockets::new(
        &[
            InputSocket::audio(440.0),
            // -12dB, safe default
            InputSocket::audio(0.25),
        ],
        &[SocketType::Audio],
    );

    pub fn new() -> Self {
        Self {
            phases: Vec::with_capacity(32),
        }
    }

    /// Current phase of each instance, in cycles.
    #[inline]
    pub fn phases(&self) -> &[f32] {
        &self.phases
    }
}

impl Default for Sine {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioNode for Sine {
    type Message = ();

    fn sockets(&self) -> Sockets {
        Self::SOCKETS
    }

    fn process(
        &mut self,
        ctx: &ProcessContext,
        _messages: impl Iterator<Item = ()>,
        inputs: &mut InputWindow<'_>,
        outputs: &mut OutputWindow<'_>,
    ) {
        let internal = inputs.descriptor().internal;
        inputs.universes().compact(internal, &mut self.phases, 0.0);

        let Some(out) = outputs.audio(Self::OUTPUT) else {
            return;
        };
        out.resize(self.phases.len());

        let frequency = inputs.audio(Self::FREQUENCY);
        let amplitude = inputs.audio(Self::AMPLITUDE);
        let inv_rate = 1.0 / ctx.sample_rate as f32;

        for (i, (chunk, phase)) in out.instances_mut().iter_mut().zip(&mut self.phases).enumerate() {
            let freq = frequency.instance(i);
            let amp = amplitude.instance(i);

            for ((sample, f), a) in chunk.iter_mut().zip(freq.iter()).zip(amp.iter()) {
                *sample = (*phase * core::f32::consts::TAU).sin() * a;

                *phase += f.max(0.0) * inv_rate;
                // Phase stays in [0, 1) even for frequencies above the sample rate
                *phase -= phase.floor();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::Chunk;
    use crate::socket::{Route, Signal};
    use crate::universe::{Descriptor, Universe, Universes};
    use crate::BLOCK_SIZE;

    fn constant(value: f32) -> Chunk {
        let mut c = Chunk::SILENT;
        c.iter_mut().for_each(|s| *s = value);
        c
    }

    fn run(sine: &mut Sine, universes: &mut Universes, descriptor: Descriptor, signals: &[Vec<Signal>]) -> Vec<Chunk> {
        let ctx = ProcessContext {
            sample_rate: 48_000,
            buffer_size: BLOCK_SIZE,
        };
        let routes = if signals.is_empty() {
            [Route::Unconnected, Route::Unconnected]
        } else {
            [Route::Direct { node: 0, socket: 0 }, Route::Direct { node: 0, socket: 1 }]
        };
        let defaults = [constant(440.0), constant(0.25)];
        let mut out = vec![Signal::new(SocketType::Audio)];

        let mut inputs = InputWindow {
            routes: &routes,
            defaults: &defaults,
            collapsed: &[],
            signals,
            descriptor,
            universes,
        };
        let mut outputs = OutputWindow { signals: &mut out };
        sine.process(&ctx, core::iter::empty(), &mut inputs, &mut outputs);

        out[0].as_audio().unwrap().instances().to_vec()
    }

    fn voices(values: &[(f32, f32)]) -> Vec<Vec<Signal>> {
        let mut freq = crate::socket::AudioData::new();
        let mut amp = crate::socket::AudioData::new();
        freq.resize(values.len());
        amp.resize(values.len());
        for (i, (f, a)) in values.iter().enumerate() {
            freq.instances_mut()[i] = constant(*f);
            amp.instances_mut()[i] = constant(*a);
        }
        vec![vec![Signal::Audio(freq), Signal::Audio(amp)]]
    }

    #[test]
    fn mono_defaults_produce_a_quiet_a440() {
        let mut sine = Sine::new();
        let mut universes = Universes::new();
        let out = run(&mut sine, &mut universes, Descriptor::mono(), &[]);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0][0], 0.0);
        let peak = out[0].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak > 0.2 && peak <= 0.25 + 1e-6);
        assert!((sine.phases()[0] - 440.0 * BLOCK_SIZE as f32 / 48_000.0).abs() < 1e-4);
    }

    #[test]
    fn phases_follow_voices() {
        let mut sine = Sine::new();
        let mut universes = Universes::new();
        let id = universes.allocate();
        let poly = Universe::Poly(id);
        let descriptor = Descriptor::new(poly, poly, poly);

        universes.update(id, &[], 2);
        let out = run(&mut sine, &mut universes, descriptor, &voices(&[(100.0, 1.0), (200.0, 0.5)]));
        assert_eq!(out.len(), 2);
        let second = sine.phases()[1];

        // First voice ends, a third starts
        universes.begin_tick();
        universes.update(id, &[0], 1);
        let out = run(&mut sine, &mut universes, descriptor, &voices(&[(200.0, 0.5), (300.0, 1.0)]));
        assert_eq!(out.len(), 2);
        assert_eq!(sine.phases().len(), 2);
        // Surviving voice continues from where it was
        assert!((out[0][0] - (second * core::f32::consts::TAU).sin() * 0.5).abs() < 1e-5);
        // New voice starts at zero phase
        assert_eq!(out[1][0], 0.0);
    }
}
