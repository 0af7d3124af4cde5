//! stepgrid model
//! ==============
//! Pattern grids, trigger ranges and persisted sequencer state. Everything in
//! this crate is edited outside the audio thread and handed to the playback
//! engine as a complete snapshot.

pub mod error;
pub mod grid;
pub mod note;
pub mod pattern;
pub mod schema;
pub mod slots;
pub mod state;

pub use error::StateError;
pub use grid::{midi_note_to_row, row_to_midi_note, GridPos, PATTERN_HEIGHT};
pub use note::{Note, NoteMessage, NoteMessageKind, CHANNELS, MAX_NOTE};
pub use pattern::{
    Cell, Pattern, PatternId, DEFAULT_SPEED, DEFAULT_VELOCITY, DEFAULT_WIDTH, MAX_WIDTH, MIN_WIDTH,
};
pub use schema::{CellDocument, PatternDocument, StateDocument};
pub use slots::{SlotArray, SlotId};
pub use state::State;

#[cfg(any(test, feature = "fuzzing"))]
pub use state::fuzz_parse_state;
