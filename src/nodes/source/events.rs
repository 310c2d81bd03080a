//! Event injection from the control thread

use crate::event::Event;
use crate::node::{AudioNode, ProcessContext};
use crate::socket::{InputWindow, OutputWindow, SocketType, Sockets};

/// Turns events sent through its [`Handle`](crate::Handle) into one event
/// batch per tick.
///
/// Events keep the order they were sent in. The batch is empty on ticks
/// where nothing arrived.
#[derive(Debug, Default)]
pub struct EventInput {
    sent: u64,
}

impl EventInput {
    pub const EVENTS: usize = 0;

    const SOCKETS: Sockets = Sockets::new(&[], &[SocketType::Events]);

    pub fn new() -> Self {
        Self::default()
    }

    /// Total events forwarded so far.
    #[inline]
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl AudioNode for EventInput {
    type Message = Event;

    fn sockets(&self) -> Sockets {
        Self::SOCKETS
    }

    fn process(
        &mut self,
        _ctx: &ProcessContext,
        messages: impl Iterator<Item = Event>,
        _inputs: &mut InputWindow<'_>,
        outputs: &mut OutputWindow<'_>,
    ) {
        let Some(batch) = outputs.events(Self::EVENTS) else {
            // Still drain so stale events don't leak into a later tick
            messages.for_each(drop);
            return;
        };

        batch.clear();
        batch.extend(messages);
        self.sent += batch.len() as u64;
    }
}
