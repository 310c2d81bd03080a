//! Hardware input through a lock-free chunk queue

use std::sync::mpsc::Sender;
use std::thread::JoinHandle;

use thiserror::Error;
use tracing::{debug, warn};

use crate::node::{AudioNode, ProcessContext};
use crate::queue::{Chunk, ChunkConsumer, ChunkProducer, DEFAULT_QUEUE_CHUNKS};
use crate::socket::{InputWindow, OutputWindow, SocketType, Sockets};
use crate::universe::{Descriptor, PolyphonyError, Universe, UniverseId};
use crate::BLOCK_SIZE;

/// Failures opening a hardware input stream.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device available")]
    NoDevice,

    #[error("failed to query input config: {0}")]
    Config(String),

    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to build input stream: {0}")]
    Build(String),

    #[error("failed to start input stream: {0}")]
    Play(String),

    #[error("failed to spawn capture thread: {0}")]
    Thread(String),

    #[error("capture thread exited before the stream opened")]
    ThreadExited,
}

/// Queue sizing for a capture node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Ring buffer capacity in chunks (rounded up to a power of two).
    pub queue_chunks: usize,
    /// Chunks allowed to pile up before the oldest are discarded.
    pub max_backlog: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            queue_chunks: DEFAULT_QUEUE_CHUNKS,
            max_backlog: 8,
        }
    }
}

impl CaptureConfig {
    pub fn with_queue_chunks(mut self, chunks: usize) -> Self {
        self.queue_chunks = chunks;
        self
    }

    pub fn with_max_backlog(mut self, chunks: usize) -> Self {
        self.max_backlog = chunks;
        self
    }

    /// Never discard queued chunks; latency grows until the queue fills.
    pub fn without_backlog_limit(mut self) -> Self {
        self.max_backlog = usize::MAX;
        self
    }
}

/// Producer side of a capture node, run inside the device callback.
///
/// Downmixes interleaved hardware frames to mono, packs them into chunks
/// and pushes each full chunk. Never allocates, locks or logs.
pub struct CaptureFeed {
    producer: ChunkProducer,
    pending: Chunk,
    filled: usize,
    channels: usize,
}

impl CaptureFeed {
    pub fn new(producer: ChunkProducer, channels: usize) -> Self {
        Self {
            producer,
            pending: Chunk::SILENT,
            filled: 0,
            channels: channels.max(1),
        }
    }

    pub fn write(&mut self, data: &[f32]) {
        self.write_frames(data, |s| s);
    }

    pub fn write_i16(&mut self, data: &[i16]) {
        self.write_frames(data, |s| s as f32 / 32_768.0);
    }

    pub fn write_u16(&mut self, data: &[u16]) {
        self.write_frames(data, |s| (s as f32 - 32_768.0) / 32_768.0);
    }

    /// Samples waiting for the current chunk to fill.
    #[inline]
    pub fn pending(&self) -> usize {
        self.filled
    }

    #[inline]
    pub fn dropped(&self) -> usize {
        self.producer.dropped()
    }

    fn write_frames<S: Copy>(&mut self, data: &[S], to_f32: impl Fn(S) -> f32) {
        for frame in data.chunks(self.channels) {
            let sum: f32 = frame.iter().map(|&s| to_f32(s)).sum();
            self.pending[self.filled] = sum / frame.len() as f32;
            self.filled += 1;

            if self.filled == BLOCK_SIZE {
                let chunk = core::mem::replace(&mut self.pending, Chunk::SILENT);
                // Full queue: the chunk is dropped and counted
                let _ = self.producer.push(chunk);
                self.filled = 0;
            }
        }
    }
}

/// Keeps a device stream alive. Dropping it stops the stream and waits for
/// the thread that owns it to exit.
pub struct StreamGuard {
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl StreamGuard {
    pub fn new(shutdown: Sender<()>, thread: JoinHandle<()>) -> Self {
        Self {
            shutdown: Some(shutdown),
            thread: Some(thread),
        }
    }

    /// A guard with no stream behind it, for queues fed by other means.
    pub fn detached() -> Self {
        Self {
            shutdown: None,
            thread: None,
        }
    }

    #[inline]
    pub fn is_attached(&self) -> bool {
        self.thread.is_some()
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("capture thread panicked");
            } else {
                debug!("capture stream closed");
            }
        }
    }
}

/// Graph side of hardware capture: one mono audio output fed from a chunk queue.
///
/// Pops one chunk per tick. An empty queue yields silence and counts an
/// underrun. When more than `max_backlog` chunks are waiting the oldest are
/// skipped so input latency stays bounded.
pub struct CaptureNode {
    // Declared first so the stream stops before the consumer is released
    stream: StreamGuard,
    consumer: ChunkConsumer,
    config: CaptureConfig,
    underruns: u64,
    skipped: u64,
    reported_drops: usize,
}

impl CaptureNode {
    pub const AUDIO: usize = 0;

    const SOCKETS: Sockets = Sockets::new(&[], &[SocketType::Audio]);

    pub fn new(consumer: ChunkConsumer, stream: StreamGuard, config: CaptureConfig) -> Self {
        Self {
            stream,
            consumer,
            config,
            underruns: 0,
            skipped: 0,
            reported_drops: 0,
        }
    }

    /// Read from a queue filled by something other than a device stream.
    pub fn from_queue(consumer: ChunkConsumer) -> Self {
        Self::new(consumer, StreamGuard::detached(), CaptureConfig::default())
    }

    pub fn with_config(mut self, config: CaptureConfig) -> Self {
        self.config = config;
        self
    }

    /// Ticks that found the queue empty.
    #[inline]
    pub fn underruns(&self) -> u64 {
        self.underruns
    }

    /// Chunks discarded to bound latency.
    #[inline]
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Chunks the producer dropped because the queue was full.
    #[inline]
    pub fn dropped(&self) -> usize {
        self.consumer.dropped()
    }

    /// Chunks waiting in the queue.
    #[inline]
    pub fn backlog(&self) -> usize {
        self.consumer.len()
    }

    #[inline]
    pub fn is_streaming(&self) -> bool {
        self.stream.is_attached() && !self.consumer.is_abandoned()
    }
}

impl AudioNode for CaptureNode {
    type Message = ();

    fn sockets(&self) -> Sockets {
        Self::SOCKETS
    }

    fn infer_polyphony(&self, _inputs: &[Universe], _own: UniverseId) -> Result<Descriptor, PolyphonyError> {
        Ok(Descriptor::mono())
    }

    fn process(
        &mut self,
        _ctx: &ProcessContext,
        _messages: impl Iterator<Item = ()>,
        _inputs: &mut InputWindow<'_>,
        outputs: &mut OutputWindow<'_>,
    ) {
        let backlog = self.consumer.len();
        if backlog > self.config.max_backlog {
            let skipped = self.consumer.skip(backlog - self.config.max_backlog);
            self.skipped += skipped as u64;
            debug!(skipped, "capture backlog trimmed");
        }

        let dropped = self.consumer.dropped();
        if dropped != self.reported_drops {
            warn!(dropped = dropped - self.reported_drops, "capture queue overflowed");
            self.reported_drops = dropped;
        }

        let Some(out) = outputs.audio(Self::AUDIO) else {
            return;
        };
        out.resize(1);
        let chunk = &mut out.instances_mut()[0];

        if !self.consumer.pop_into(chunk) {
            *chunk = Chunk::SILENT;
            self.underruns += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::ChunkQueue;
    use crate::socket::Signal;
    use crate::universe::Universes;

    fn tick(node: &mut CaptureNode) -> Chunk {
        let ctx = ProcessContext {
            sample_rate: 48_000,
            buffer_size: BLOCK_SIZE,
        };
        let mut universes = Universes::new();
        let mut out = vec![Signal::new(SocketType::Audio)];
        let mut inputs = InputWindow {
            routes: &[],
            defaults: &[],
            collapsed: &[],
            signals: &[],
            descriptor: Descriptor::mono(),
            universes: &mut universes,
        };
        let mut outputs = OutputWindow { signals: &mut out };
        node.process(&ctx, core::iter::empty(), &mut inputs, &mut outputs);
        out[0].as_audio().unwrap().instances()[0].clone()
    }

    #[test]
    fn feed_packs_samples_into_chunks() {
        let (producer, mut consumer) = ChunkQueue::new(4);
        let mut feed = CaptureFeed::new(producer, 1);

        let samples: Vec<f32> = (0..BLOCK_SIZE + 5).map(|i| i as f32).collect();
        feed.write(&samples);

        assert_eq!(feed.pending(), 5);
        let chunk = consumer.pop().unwrap();
        assert_eq!(chunk[0], 0.0);
        assert_eq!(chunk[BLOCK_SIZE - 1], (BLOCK_SIZE - 1) as f32);
        assert!(consumer.pop().is_none());
    }

    #[test]
    fn feed_downmixes_and_converts() {
        let (producer, mut consumer) = ChunkQueue::new(4);
        let mut feed = CaptureFeed::new(producer, 2);

        let frames: Vec<i16> = (0..BLOCK_SIZE).flat_map(|_| [16_384, -16_384 / 2]).collect();
        feed.write_i16(&frames);
        let chunk = consumer.pop().unwrap();
        assert!(chunk.iter().all(|s| (*s - 0.125).abs() < 1e-6));

        let frames: Vec<u16> = vec![32_768; BLOCK_SIZE * 2];
        feed.write_u16(&frames);
        assert!(consumer.pop().unwrap().iter().all(|s| *s == 0.0));
    }

    #[test]
    fn feed_drops_when_queue_is_full() {
        let (producer, consumer) = ChunkQueue::new(2);
        let mut feed = CaptureFeed::new(producer, 1);
        feed.write(&vec![0.5; BLOCK_SIZE * 5]);

        assert_eq!(consumer.len(), 2);
        assert_eq!(feed.dropped(), 3);
    }

    #[test]
    fn underflow_yields_silence() {
        let (_producer, consumer) = ChunkQueue::new(4);
        let mut node = CaptureNode::from_queue(consumer);

        let out = tick(&mut node);
        assert!(out.iter().all(|s| *s == 0.0));
        assert_eq!(node.underruns(), 1);
        assert!(!node.is_streaming());
    }

    #[test]
    fn pops_one_chunk_per_tick_in_order() {
        let (producer, consumer) = ChunkQueue::new(8);
        let mut feed = CaptureFeed::new(producer, 1);
        let mut node = CaptureNode::from_queue(consumer);

        feed.write(&vec![0.25; BLOCK_SIZE]);
        feed.write(&vec![0.75; BLOCK_SIZE]);

        assert_eq!(tick(&mut node)[0], 0.25);
        assert_eq!(tick(&mut node)[0], 0.75);
        assert_eq!(tick(&mut node)[0], 0.0);
        assert_eq!(node.underruns(), 1);
    }

    #[test]
    fn backlog_is_bounded() {
        let (producer, consumer) = ChunkQueue::new(16);
        let mut feed = CaptureFeed::new(producer, 1);
        let mut node = CaptureNode::from_queue(consumer).with_config(CaptureConfig::default().with_max_backlog(2));

        for i in 0..10 {
            feed.write(&vec![i as f32; BLOCK_SIZE]);
        }

        // Keeps only the newest two, then plays the older of those
        assert_eq!(tick(&mut node)[0], 8.0);
        assert_eq!(node.skipped(), 8);
        assert_eq!(node.backlog(), 1);
        assert_eq!(tick(&mut node)[0], 9.0);
    }

    #[test]
    fn dropping_the_node_stops_the_stream_before_releasing_the_queue() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::{mpsc, Arc};

        let (producer, consumer) = ChunkQueue::new(4);
        let mut feed = CaptureFeed::new(producer, 1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let finished = Arc::new(AtomicBool::new(false));
        let queue_alive = Arc::new(AtomicBool::new(false));

        let thread = {
            let finished = finished.clone();
            let queue_alive = queue_alive.clone();
            std::thread::spawn(move || {
                let _ = shutdown_rx.recv();
                // Stands in for a last callback racing the teardown
                queue_alive.store(!feed.producer.is_abandoned(), Ordering::SeqCst);
                feed.write(&[0.5; BLOCK_SIZE]);
                finished.store(true, Ordering::SeqCst);
            })
        };

        let node = CaptureNode::new(consumer, StreamGuard::new(shutdown_tx, thread), CaptureConfig::default());
        assert!(node.is_streaming());
        assert!(!finished.load(Ordering::SeqCst));

        drop(node);
        assert!(finished.load(Ordering::SeqCst));
        assert!(queue_alive.load(Ordering::SeqCst));
    }

    #[test]
    fn detached_guard_drops_quietly() {
        let guard = StreamGuard::detached();
        assert!(!guard.is_attached());
        drop(guard);
    }
}
