//! stepgrid engine
//! ===============
//! Real-time playback of note-triggered step patterns.
//!
//! A host drives [`SequencerProcessor::process`] once per audio block. The
//! processor turns the host transport into [`TimeParams`], feeds incoming
//! note messages to the [`Player`] and converts the notes it schedules back
//! into frame-stamped MIDI. Pattern data arrives through a [`StateHandle`] as
//! whole snapshots, so editing never races playback.

pub mod active_notes;
pub mod config;
pub mod handoff;
pub mod player;
pub mod processor;
pub mod sink;
pub mod stats;
pub mod time;
pub mod timing;

pub use active_notes::ActiveNotes;
pub use config::EngineConfig;
pub use handoff::StateHandle;
pub use player::{
    pattern_start_time_offset, ActivePattern, Player, FINISHED_MIN_NOTE_LENGTH, OUTPUT_CHANNEL,
};
pub use processor::{MidiEvent, ProcessorError, SequencerProcessor, STATE_KEY};
pub use sink::{sort_block_events, FnSink, NoteSink, OutputEvent};
pub use stats::{ActivePatternStats, PlaybackStats, TransportStats};
pub use time::TimeParams;
pub use timing::{HostTimePosition, TimePositionCalc, DEFAULT_TICKS_PER_BEAT, STEPS_PER_BAR};
