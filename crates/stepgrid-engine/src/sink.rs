use serde::{Deserialize, Serialize};

/// Note event produced by the player. A velocity of zero is a note-off.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputEvent {
    pub note: u8,
    pub velocity: u8,
    /// Offset from the start of the block, in transport units.
    pub time: f64,
}

impl OutputEvent {
    pub fn is_note_on(&self) -> bool {
        self.velocity > 0
    }

    pub fn is_note_off(&self) -> bool {
        self.velocity == 0
    }
}

/// Receiver of emitted note events.
pub trait NoteSink {
    fn note_event(&mut self, note: u8, velocity: u8, time: f64);
}

impl NoteSink for Vec<OutputEvent> {
    #[inline]
    fn note_event(&mut self, note: u8, velocity: u8, time: f64) {
        self.push(OutputEvent {
            note,
            velocity,
            time,
        });
    }
}

impl<S: NoteSink + ?Sized> NoteSink for &mut S {
    #[inline]
    fn note_event(&mut self, note: u8, velocity: u8, time: f64) {
        (**self).note_event(note, velocity, time);
    }
}

/// Adapts a closure into a [`NoteSink`].
pub struct FnSink<F>(pub F);

impl<F: FnMut(u8, u8, f64)> NoteSink for FnSink<F> {
    #[inline]
    fn note_event(&mut self, note: u8, velocity: u8, time: f64) {
        (self.0)(note, velocity, time);
    }
}

/// Sorts one block of events by time. Events sharing a time keep the order
/// they were emitted in, which for a single note always alternates on and
/// off.
pub fn sort_block_events(events: &mut [OutputEvent]) {
    events.sort_by(|a, b| a.time.total_cmp(&b.time));
}
