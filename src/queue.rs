//! Lock-free chunk queue between the device callback and the graph.
//!
//! A [`ChunkQueue`] is a bounded single-producer/single-consumer ring of
//! [`Chunk`]s backed by [`rtrb`]. The producer side lives in the audio device
//! callback and must never block or allocate; the consumer side is drained by
//! the graph once per tick.
//!
//! When the queue is full the *incoming* chunk is dropped and counted. The
//! queue never grows.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rtrb::{Consumer, Producer, RingBuffer};

use crate::BLOCK_SIZE;

/// One block of audio samples, the unit moved through queues and per-voice buffers.
pub type Chunk = dasp_graph::Buffer;

/// Default queue capacity in chunks (32768 samples).
pub const DEFAULT_QUEUE_CHUNKS: usize = (1 << 15) / BLOCK_SIZE;

#[derive(Debug, Default)]
struct QueueStats {
    dropped: AtomicUsize,
}

/// Constructor for a producer/consumer pair.
pub struct ChunkQueue;

impl ChunkQueue {
    /// Create a queue holding at least `capacity` chunks.
    ///
    /// The capacity is rounded up to the next power of two (minimum 2).
    pub fn new(capacity: usize) -> (ChunkProducer, ChunkConsumer) {
        let capacity = capacity.max(2).next_power_of_two();
        let (producer, consumer) = RingBuffer::<Chunk>::new(capacity);
        let stats = Arc::new(QueueStats::default());

        (
            ChunkProducer {
                producer,
                stats: stats.clone(),
            },
            ChunkConsumer { consumer, stats },
        )
    }

    /// Create a queue with [`DEFAULT_QUEUE_CHUNKS`] slots.
    pub fn with_default_capacity() -> (ChunkProducer, ChunkConsumer) {
        Self::new(DEFAULT_QUEUE_CHUNKS)
    }
}

/// Producer half. Safe to use from a real-time callback.
pub struct ChunkProducer {
    producer: Producer<Chunk>,
    stats: Arc<QueueStats>,
}

impl ChunkProducer {
    /// Enqueue a chunk.
    ///
    /// Returns `Err(chunk)` if the queue is full; the chunk is dropped and the
    /// dropped counter is incremented.
    #[inline]
    pub fn push(&mut self, chunk: Chunk) -> Result<(), Chunk> {
        self.producer.push(chunk).map_err(|rtrb::PushError::Full(c)| {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            c
        })
    }

    /// Free slots.
    #[inline]
    pub fn slots(&self) -> usize {
        self.producer.slots()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.producer.is_full()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.producer.buffer().capacity()
    }

    /// Chunks dropped because the queue was full.
    #[inline]
    pub fn dropped(&self) -> usize {
        self.stats.dropped.load(Ordering::Relaxed)
    }

    /// Whether the consumer half has been dropped.
    #[inline]
    pub fn is_abandoned(&self) -> bool {
        self.producer.is_abandoned()
    }
}

/// Consumer half, drained from the graph thread.
pub struct ChunkConsumer {
    consumer: Consumer<Chunk>,
    stats: Arc<QueueStats>,
}

impl ChunkConsumer {
    /// Dequeue the oldest chunk, or `None` if the queue is empty.
    #[inline]
    pub fn pop(&mut self) -> Option<Chunk> {
        self.consumer.pop().ok()
    }

    /// Dequeue the oldest chunk into `dest`.
    ///
    /// Returns `false` and leaves `dest` untouched if the queue is empty.
    #[inline]
    pub fn pop_into(&mut self, dest: &mut Chunk) -> bool {
        match self.consumer.pop() {
            Ok(chunk) => {
                *dest = chunk;
                true
            }
            Err(_) => false,
        }
    }

    /// Iterate over every chunk available right now, oldest first.
    ///
    /// Chunks pushed while the iterator is alive are not included.
    pub fn drain(&mut self) -> impl Iterator<Item = Chunk> + '_ {
        let available = self.consumer.slots();
        let consumer = &mut self.consumer;
        (0..available).map_while(move |_| consumer.pop().ok())
    }

    /// Discard up to `n` of the oldest chunks, returning how many were discarded.
    pub fn skip(&mut self, n: usize) -> usize {
        let n = n.min(self.consumer.slots());
        for _ in 0..n {
            let _ = self.consumer.pop();
        }
        n
    }

    /// Chunks waiting to be read.
    #[inline]
    pub fn len(&self) -> usize {
        self.consumer.slots()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.consumer.buffer().capacity()
    }

    /// Chunks the producer had to drop because the queue was full.
    #[inline]
    pub fn dropped(&self) -> usize {
        self.stats.dropped.load(Ordering::Relaxed)
    }

    /// Whether the producer half has been dropped.
    #[inline]
    pub fn is_abandoned(&self) -> bool {
        self.consumer.is_abandoned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(value: f32) -> Chunk {
        let mut c = Chunk::SILENT;
        c.iter_mut().for_each(|s| *s = value);
        c
    }

    #[test]
    fn capacity_rounds_to_power_of_two() {
        let (producer, consumer) = ChunkQueue::new(5);
        assert_eq!(producer.capacity(), 8);
        assert_eq!(consumer.capacity(), 8);

        let (producer, _) = ChunkQueue::new(0);
        assert_eq!(producer.capacity(), 2);

        let (producer, _) = ChunkQueue::with_default_capacity();
        assert_eq!(producer.capacity(), 512);
    }

    #[test]
    fn pops_in_push_order() {
        let (mut producer, mut consumer) = ChunkQueue::new(8);
        for i in 1..=5 {
            producer.push(chunk(i as f32)).unwrap();
        }

        let values: Vec<f32> = consumer.drain().map(|c| c[0]).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(consumer.pop().is_none());
    }

    #[test]
    fn overflow_drops_newest() {
        let (mut producer, mut consumer) = ChunkQueue::new(4);
        for i in 0..4 {
            assert!(producer.push(chunk(i as f32)).is_ok());
        }
        let rejected = producer.push(chunk(99.0)).unwrap_err();
        assert_eq!(rejected[0], 99.0);
        assert!(producer.push(chunk(100.0)).is_err());

        assert_eq!(producer.dropped(), 2);
        assert_eq!(consumer.dropped(), 2);
        assert_eq!(consumer.len(), 4);

        let values: Vec<f32> = consumer.drain().map(|c| c[BLOCK_SIZE - 1]).collect();
        assert_eq!(values, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn underflow_reports_no_data() {
        let (_producer, mut consumer) = ChunkQueue::new(4);
        let mut dest = chunk(7.0);

        assert!(!consumer.pop_into(&mut dest));
        assert_eq!(dest[0], 7.0);
        assert!(consumer.pop().is_none());
        assert_eq!(consumer.drain().count(), 0);
    }

    #[test]
    fn skip_discards_oldest() {
        let (mut producer, mut consumer) = ChunkQueue::new(8);
        for i in 0..6 {
            producer.push(chunk(i as f32)).unwrap();
        }

        assert_eq!(consumer.skip(4), 4);
        assert_eq!(consumer.pop().map(|c| c[0]), Some(4.0));
        assert_eq!(consumer.skip(10), 1);
        assert!(consumer.is_empty());
    }

    #[test]
    fn wraps_around_without_growing() {
        let (mut producer, mut consumer) = ChunkQueue::new(4);
        for round in 0..10 {
            producer.push(chunk(round as f32)).unwrap();
            producer.push(chunk(round as f32 + 0.5)).unwrap();
            assert_eq!(consumer.pop().map(|c| c[0]), Some(round as f32));
            assert_eq!(consumer.pop().map(|c| c[0]), Some(round as f32 + 0.5));
        }
        assert_eq!(producer.capacity(), 4);
        assert_eq!(producer.dropped(), 0);
    }

    #[test]
    fn producer_and_consumer_cross_threads() {
        let (mut producer, mut consumer) = ChunkQueue::new(1024);

        let handle = std::thread::spawn(move || {
            for i in 0..500 {
                while producer.push(chunk(i as f32)).is_err() {
                    std::thread::yield_now();
                }
            }
        });

        let mut values = Vec::with_capacity(500);
        while values.len() < 500 {
            match consumer.pop() {
                Some(c) => values.push(c[0]),
                None => std::thread::yield_now(),
            }
        }
        handle.join().unwrap();

        assert!(values.iter().enumerate().all(|(i, v)| *v == i as f32));
        assert!(consumer.pop().is_none());
        assert_eq!(consumer.dropped(), 0);
    }

    #[test]
    fn small_queue_hands_off_while_both_sides_run() {
        // Capacity far below the chunk count forces the producer to wait on the consumer
        let (mut producer, mut consumer) = ChunkQueue::new(2);

        let handle = std::thread::spawn(move || {
            for i in 0..200 {
                while producer.push(chunk(i as f32)).is_err() {
                    std::thread::yield_now();
                }
            }
            producer.dropped()
        });

        let mut next = 0.0;
        while next < 200.0 {
            if let Some(c) = consumer.pop() {
                assert_eq!(c[0], next);
                assert_eq!(c[BLOCK_SIZE - 1], next);
                next += 1.0;
            } else {
                std::thread::yield_now();
            }
        }

        // Every rejected push was retried, so each one shows up in the counter
        let rejected = handle.join().unwrap();
        assert_eq!(consumer.dropped(), rejected);
        assert!(consumer.is_abandoned());
    }
}
