use criterion::{black_box, criterion_group, criterion_main, Criterion};
use polyphon::nodes::{CaptureFeed, ChunkSink, EventInput, Instrument, Sine};
use polyphon::{ChunkQueue, Event, Graph, GraphConfig, NodeRegistry, BLOCK_SIZE};

fn voice_graph(notes: u8) -> Graph {
    let mut graph = Graph::new(GraphConfig::new(48_000), &NodeRegistry::standard());
    let mut keys = graph.add(EventInput::new());
    let piano = graph.add(Instrument::new()).id();
    let sine = graph.add(Sine::new()).id();
    let (producer, _consumer) = ChunkQueue::new(4);
    let sink = graph.add(ChunkSink::new(producer)).id();

    graph.connect(keys.id(), 0, piano, Instrument::EVENTS).unwrap();
    graph.connect(piano, Instrument::FREQUENCY, sine, Sine::FREQUENCY).unwrap();
    graph.connect(piano, Instrument::DECAY, sine, Sine::AMPLITUDE).unwrap();
    graph.connect(sine, Sine::OUTPUT, sink, ChunkSink::INPUT).unwrap();

    for note in 0..notes {
        keys.send(Event::note_on(48 + note, 100)).unwrap();
    }
    graph.process().unwrap();
    graph
}

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("Graph.process() 1 voice", |b| {
        let mut graph = voice_graph(1);
        b.iter(|| graph.process().unwrap())
    });

    c.bench_function("Graph.process() 16 voices", |b| {
        let mut graph = voice_graph(16);
        b.iter(|| graph.process().unwrap())
    });

    c.bench_function("CaptureFeed.write() stereo block", |b| {
        let (producer, mut consumer) = ChunkQueue::new(8);
        let mut feed = CaptureFeed::new(producer, 2);
        let frames = vec![0.1f32; BLOCK_SIZE * 2];

        b.iter(|| {
            feed.write(black_box(&frames));
            black_box(consumer.pop())
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
