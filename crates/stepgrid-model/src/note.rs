use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Highest valid MIDI note number.
pub const MAX_NOTE: u8 = 127;
/// Number of MIDI channels.
pub const CHANNELS: usize = 16;

/// A MIDI note on a specific channel.
///
/// Ordered by channel first, then note number, so it can key ordered maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Note {
    pub note: u8,
    pub channel: u8,
}

impl Note {
    pub fn new(note: u8, channel: u8) -> Self {
        debug_assert!(note <= MAX_NOTE, "note {note} out of range");
        debug_assert!((channel as usize) < CHANNELS, "channel {channel} out of range");
        Self {
            note: note.min(MAX_NOTE),
            channel: channel.min(CHANNELS as u8 - 1),
        }
    }

    /// Dense index in `0..CHANNELS * 128`, following the [`Ord`] order.
    #[inline]
    pub fn index(self) -> usize {
        self.channel as usize * (MAX_NOTE as usize + 1) + self.note as usize
    }

    /// Inverse of [`Note::index`].
    #[inline]
    pub fn from_index(index: usize) -> Self {
        let per_channel = MAX_NOTE as usize + 1;
        Self {
            note: (index % per_channel) as u8,
            channel: (index / per_channel) as u8,
        }
    }
}

impl Ord for Note {
    fn cmp(&self, other: &Self) -> Ordering {
        self.channel
            .cmp(&other.channel)
            .then(self.note.cmp(&other.note))
    }
}

impl PartialOrd for Note {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteMessageKind {
    NoteOn,
    NoteOff,
}

/// Parsed channel voice note message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteMessage {
    pub kind: NoteMessageKind,
    pub note: Note,
    pub velocity: u8,
}

impl NoteMessage {
    /// Parses raw MIDI bytes. Only `0x8n` and `0x9n` are recognised; a note-on
    /// with velocity zero is reported as a note-off.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&status, rest) = data.split_first()?;
        let kind = status & 0xF0;
        if kind != 0x80 && kind != 0x90 {
            return None;
        }
        let &[note, velocity, ..] = rest else {
            return None;
        };
        let note = Note::new(note & 0x7F, status & 0x0F);
        let velocity = velocity & 0x7F;
        let kind = if kind == 0x90 && velocity > 0 {
            NoteMessageKind::NoteOn
        } else {
            NoteMessageKind::NoteOff
        };
        Some(Self {
            kind,
            note,
            velocity,
        })
    }
}
