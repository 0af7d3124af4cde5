//! Per-block driver: host transport and MIDI in, scheduled MIDI out.

use serde::{Deserialize, Serialize};
use stepgrid_model::{NoteMessage, NoteMessageKind, Pattern, State, StateError};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::config::EngineConfig;
use crate::handoff::StateHandle;
use crate::player::{Player, OUTPUT_CHANNEL};
use crate::sink::{sort_block_events, OutputEvent};
use crate::stats::{PlaybackStats, TransportStats};
use crate::timing::{HostTimePosition, TimePositionCalc};

/// Host state key holding the serialized [`State`].
pub const STATE_KEY: &str = "pattern";

const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("unknown state key `{0}`")]
    UnknownStateKey(String),
    #[error(transparent)]
    State(#[from] StateError),
}

/// Raw MIDI message at a frame offset inside a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MidiEvent {
    pub frame: u32,
    pub data: [u8; 3],
    pub len: u8,
}

impl MidiEvent {
    /// Copies up to three bytes of `bytes`.
    pub fn new(frame: u32, bytes: &[u8]) -> Self {
        let mut data = [0; 3];
        let len = bytes.len().min(data.len());
        data[..len].copy_from_slice(&bytes[..len]);
        Self {
            frame,
            data,
            len: len as u8,
        }
    }

    pub fn note_on(frame: u32, channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(frame, &[NOTE_ON | (channel & 0x0f), note, velocity])
    }

    pub fn note_off(frame: u32, channel: u8, note: u8) -> Self {
        Self::new(frame, &[NOTE_OFF | (channel & 0x0f), note, 0])
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data[..usize::from(self.len).min(self.data.len())]
    }

    fn from_output(frame: u32, event: &OutputEvent) -> Self {
        if event.is_note_on() {
            Self::note_on(frame, OUTPUT_CHANNEL, event.note, event.velocity)
        } else {
            Self::note_off(frame, OUTPUT_CHANNEL, event.note)
        }
    }
}

/// The sequencer as a host sees it.
pub struct SequencerProcessor {
    player: Player,
    state: StateHandle,
    events: Vec<OutputEvent>,
    stats: PlaybackStats,
    note_triggered: bool,
}

impl SequencerProcessor {
    pub fn new(config: &EngineConfig, state: StateHandle) -> Self {
        let note_triggered = state.load().play_note_triggered;
        Self {
            player: Player::new(config),
            state,
            events: Vec::with_capacity(config.event_capacity),
            stats: PlaybackStats {
                transport: TransportStats::default(),
                active_patterns: Vec::with_capacity(config.max_active_patterns + 1),
            },
            note_triggered,
        }
    }

    pub fn state_handle(&self) -> &StateHandle {
        &self.state
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn stats(&self) -> &PlaybackStats {
        &self.stats
    }

    /// Runs one block of `frames` frames, appending the block's output to
    /// `out` in frame order.
    pub fn process(
        &mut self,
        position: &HostTimePosition,
        sample_rate: f64,
        frames: u32,
        midi_in: &[MidiEvent],
        out: &mut Vec<MidiEvent>,
    ) {
        let calc = TimePositionCalc::new(*position, sample_rate);
        let tp = calc.time_params(frames);
        let state = self.state.load();

        self.sync_note_triggered(&state);

        // Only note-ons are gated; a note-off must always reach its pattern.
        let accept_note_on = state.play_note_triggered && tp.is_schedulable();
        for event in midi_in {
            let Some(message) = NoteMessage::parse(event.bytes()) else {
                continue;
            };
            let time = calc.frame_to_time(event.frame);
            match message.kind {
                NoteMessageKind::NoteOn if accept_note_on => {
                    let started = self.player.start_note_triggered(
                        &state,
                        message.note,
                        message.velocity,
                        time,
                        &tp,
                    );
                    trace!(note = message.note.note, frame = event.frame, started, "note on");
                }
                NoteMessageKind::NoteOn => {}
                NoteMessageKind::NoteOff => {
                    let end_time = if time.is_finite() { time } else { f64::NEG_INFINITY };
                    self.player.stop_patterns(message.note, end_time);
                    trace!(note = message.note.note, frame = event.frame, "note off");
                }
            }
        }

        self.sync_selected(&state);

        self.events.clear();
        self.player.run(&mut self.events, &state, &tp);
        sort_block_events(&mut self.events);
        out.extend(
            self.events
                .iter()
                .map(|event| MidiEvent::from_output(calc.offset_to_frame(event.time, frames), event)),
        );

        self.stats.transport = TransportStats::from(position);
        self.player
            .collect_stats(&state, &tp, &mut self.stats.active_patterns);
    }

    /// Drops note-triggered playback when triggering is switched off.
    fn sync_note_triggered(&mut self, state: &State) {
        if self.note_triggered && !state.play_note_triggered {
            debug!(active = self.player.active_patterns().len(), "note triggering disabled");
            self.player.stop_note_triggered();
        }
        self.note_triggered = state.play_note_triggered;
    }

    fn sync_selected(&mut self, state: &State) {
        let wanted = if state.play_selected {
            state.selected_pattern().map(Pattern::id)
        } else {
            None
        };
        let current = self.player.selected_pattern().map(|ap| ap.pattern_id);
        if wanted == current {
            return;
        }
        match wanted {
            Some(_) => self.player.play_selected_pattern(state),
            None => self.player.stop_selected_pattern(),
        }
    }

    /// JSON for the initial value of [`STATE_KEY`].
    pub fn default_state() -> Result<String, ProcessorError> {
        Ok(State::default().to_json_string()?)
    }

    pub fn get_state(&self, key: &str) -> Result<String, ProcessorError> {
        check_key(key)?;
        Ok(self.state.load().to_json_string()?)
    }

    /// Replaces the live state. A document that fails to parse leaves the
    /// current state in place.
    pub fn set_state(&self, key: &str, value: &str) -> Result<(), ProcessorError> {
        check_key(key)?;
        let state = State::from_json_str(value).map_err(|err| {
            warn!(%err, "rejected state document");
            err
        })?;
        debug!(patterns = state.num_patterns(), "state replaced");
        self.state.publish(state);
        Ok(())
    }
}

fn check_key(key: &str) -> Result<(), ProcessorError> {
    if key == STATE_KEY {
        Ok(())
    } else {
        Err(ProcessorError::UnknownStateKey(key.to_owned()))
    }
}
