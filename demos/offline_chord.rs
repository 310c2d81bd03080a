//! Render a released chord offline and report the voice count as it decays
//!
//! Run with: cargo run --example offline_chord

use polyphon::nodes::{ChunkSink, EventInput, Instrument, PlaybackMode, SampleData, Sampler, SamplerMessage, Sine};
use polyphon::{ChunkQueue, Event, Graph, GraphConfig, NodeRegistry, BLOCK_SIZE};
use tracing::info;

const RATE: u32 = 48_000;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let registry = NodeRegistry::standard();
    let mut graph = Graph::new(GraphConfig::new(RATE), &registry);

    let mut keys = graph.add(EventInput::new());
    let piano = graph.add(Instrument::new()).id();
    let sine = graph.add(Sine::new()).id();

    // Constant 0.3 s sustain from a looping single-sample buffer
    let mut sustain = graph.add(Sampler::new().with_mode(PlaybackMode::Loop));
    let mut gate = graph.add(EventInput::new());
    sustain
        .send(SamplerMessage::Load(SampleData::new(vec![0.3], RATE)))
        .map_err(|_| "sustain queue full")?;
    gate.send(Event::Trigger).map_err(|_| "gate queue full")?;

    let (producer, mut consumer) = ChunkQueue::new(1024);
    let out = graph.add(ChunkSink::new(producer)).id();

    graph.connect(keys.id(), 0, piano, Instrument::EVENTS)?;
    graph.connect(gate.id(), 0, sustain.id(), Sampler::TRIGGER)?;
    graph.connect(sustain.id(), Sampler::AUDIO, piano, Instrument::SUSTAIN)?;
    graph.connect(piano, Instrument::FREQUENCY, sine, Sine::FREQUENCY)?;
    graph.connect(piano, Instrument::DECAY, sine, Sine::AMPLITUDE)?;
    graph.connect(sine, Sine::OUTPUT, out, ChunkSink::INPUT)?;

    for note in [60, 64, 67] {
        keys.send(Event::note_on(note, 100)).map_err(|_| "event queue full")?;
    }

    let blocks_per_second = RATE as usize / BLOCK_SIZE;
    let mut peak = 0.0f32;

    for block in 0..blocks_per_second {
        if block == blocks_per_second / 2 {
            for note in [60, 64, 67] {
                keys.send(Event::note_off(note)).map_err(|_| "event queue full")?;
            }
            info!("chord released");
        }

        graph.process()?;

        while let Some(chunk) = consumer.pop() {
            peak = chunk.iter().fold(peak, |m, s| m.max(s.abs()));
        }

        if block % 75 == 0 {
            let voices = graph.node::<Instrument>(piano).map_or(0, Instrument::voice_count);
            info!(block, voices, peak, "rendering");
        }
    }

    info!(
        ticks = graph.ticks(),
        voices = graph.instance_count(sine, Sine::OUTPUT),
        peak,
        "done"
    );
    Ok(())
}
