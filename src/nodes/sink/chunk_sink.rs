//! Chunk queue sink for handing audio to another thread

use crate::node::{AudioNode, ProcessContext};
use crate::queue::ChunkProducer;
use crate::socket::{InputSocket, InputWindow, OutputWindow, Sockets};
use crate::universe::{Descriptor, PolyphonyError, Universe, UniverseId};

/// A sink that pushes one mono block per tick into a chunk queue.
///
/// Polyphonic sources are summed into the single input. Useful for:
/// - Feeding an output device callback
/// - Sending audio to another thread
/// - Recording/analysis
pub struct ChunkSink {
    producer: ChunkProducer,
}

impl ChunkSink {
    pub const INPUT: usize = 0;

    const SOCKETS: Sockets = Sockets::new(&[InputSocket::audio(0.0)], &[]);

    pub fn new(producer: ChunkProducer) -> Self {
        Self { producer }
    }

    /// Free chunk slots in the queue.
    #[inline]
    pub fn available(&self) -> usize {
        self.producer.slots()
    }

    /// Blocks dropped because the reader fell behind.
    #[inline]
    pub fn dropped(&self) -> usize {
        self.producer.dropped()
    }
}

impl AudioNode for ChunkSink {
    type Message = (); // No control messages

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
        inputs: &mut InputWindow<'_>,
        _outputs: &mut OutputWindow<'_>,
    ) {
        // Full queue: the block is dropped and counted
        let _ = self.producer.push(inputs.audio(Self::INPUT).instance(0).clone());
    }
}
