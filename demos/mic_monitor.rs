//! Print the level of the default input device for a few seconds
//!
//! Run with: cargo run --example mic_monitor --features cpal_input

use std::thread::sleep;
use std::time::{Duration, Instant};

use polyphon::nodes::{CaptureConfig, CaptureNode};
use polyphon::{CpalInput, Graph, GraphConfig, NodeRegistry, BLOCK_SIZE};
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let input = CpalInput::default_input()?;
    info!(device = input.name(), rate = input.sample_rate(), channels = input.channels(), "using input");

    let registry = NodeRegistry::standard();
    let mut graph = Graph::new(GraphConfig::new(input.sample_rate()), &registry);
    let mic = graph.add(input.open(CaptureConfig::default())?).id();

    let start = Instant::now();
    let rate = graph.sample_rate() as f64;
    let mut blocks = 0u64;
    let mut sum = 0.0f64;
    let mut count = 0usize;

    while start.elapsed() < Duration::from_secs(5) {
        let target = (start.elapsed().as_secs_f64() * rate / BLOCK_SIZE as f64) as u64;
        while blocks < target {
            graph.process()?;
            blocks += 1;

            if let Some(out) = graph.audio_output(mic, CaptureNode::AUDIO) {
                sum += out.instances()[0].iter().map(|s| (*s as f64).powi(2)).sum::<f64>();
                count += BLOCK_SIZE;
            }

            if blocks % 375 == 0 {
                let rms = (sum / count.max(1) as f64).sqrt();
                let node = graph.node::<CaptureNode>(mic);
                info!(
                    rms,
                    underruns = node.map_or(0, CaptureNode::underruns),
                    dropped = node.map_or(0, CaptureNode::dropped),
                    "level"
                );
                sum = 0.0;
                count = 0;
            }
        }
        sleep(Duration::from_micros(500));
    }

    Ok(())
}
