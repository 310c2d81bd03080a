//! Discrete events delivered to nodes once per tick.

/// Highest valid MIDI pitch.
pub const MAX_NOTE: u8 = 127;

/// Control change: all sound off.
pub const CC_ALL_SOUND_OFF: u8 = 120;
/// Control change: all notes off.
pub const CC_ALL_NOTES_OFF: u8 = 123;

/// A single MIDI-like event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    Control { controller: u8, value: u8 },
    /// Start a one-shot action such as sample playback.
    Trigger,
}

impl Event {
    pub fn note_on(note: u8, velocity: u8) -> Self {
        Event::NoteOn { note, velocity }
    }

    pub fn note_off(note: u8) -> Self {
        Event::NoteOff { note }
    }

    /// An "all notes off" control change.
    pub fn panic() -> Self {
        Event::Control {
            controller: CC_ALL_NOTES_OFF,
            value: 0,
        }
    }

    /// Whether this event kills every sounding voice.
    pub fn is_panic(&self) -> bool {
        matches!(
            self,
            Event::Control { controller, .. }
                if *controller == CC_ALL_SOUND_OFF || *controller == CC_ALL_NOTES_OFF
        )
    }

    /// Pitch carried by a note event, if any.
    pub fn note(&self) -> Option<u8> {
        match self {
            Event::NoteOn { note, .. } | Event::NoteOff { note } => Some(*note),
            _ => None,
        }
    }

    /// Decode a raw MIDI channel message. The channel nibble is ignored.
    ///
    /// A note-on with velocity 0 decodes as a note-off. Returns `None` for
    /// truncated or unsupported messages.
    pub fn from_midi(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        let data1 = *data.first()?;
        if data1 > 0x7f {
            return None;
        }

        match status & 0xf0 {
            0x80 => Some(Event::NoteOff { note: data1 }),
            0x90 => {
                let velocity = *data.get(1)?;
                if velocity == 0 {
                    Some(Event::NoteOff { note: data1 })
                } else {
                    Some(Event::NoteOn {
                        note: data1,
                        velocity: velocity.min(0x7f),
                    })
                }
            }
            0xb0 => Some(Event::Control {
                controller: data1,
                value: data.get(1).copied()?.min(0x7f),
            }),
            _ => None,
        }
    }
}

/// Convert a MIDI note number to frequency in Hz (A4 = 440 Hz = note 69).
#[inline]
pub fn note_to_freq(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}
