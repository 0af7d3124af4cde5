use stepgrid_model::{Note, CHANNELS, MAX_NOTE};

use crate::sink::NoteSink;
use crate::time::TimeParams;

const SLOTS: usize = CHANNELS * (MAX_NOTE as usize + 1);

/// Sounding output notes and the absolute time each one ends.
///
/// Backed by a dense table indexed by [`Note::index`], so tracking a note never
/// allocates and note-offs come out in (channel, note) order.
#[derive(Debug, Clone)]
pub struct ActiveNotes {
    end_times: Box<[Option<f64>]>,
    sounding: usize,
}

impl Default for ActiveNotes {
    fn default() -> Self {
        Self::new()
    }
}

impl ActiveNotes {
    pub fn new() -> Self {
        Self {
            end_times: vec![None; SLOTS].into_boxed_slice(),
            sounding: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.sounding
    }

    pub fn is_empty(&self) -> bool {
        self.sounding == 0
    }

    pub fn is_sounding(&self, note: Note) -> bool {
        self.end_time(note).is_some()
    }

    pub fn end_time(&self, note: Note) -> Option<f64> {
        self.end_times.get(note.index()).copied().flatten()
    }

    /// Starts `note` at block offset `start_time`, ending at absolute
    /// `end_time`. A note that is still sounding is cut at `start_time`
    /// first.
    pub fn play_note<S: NoteSink + ?Sized>(
        &mut self,
        sink: &mut S,
        note: Note,
        velocity: u8,
        start_time: f64,
        end_time: f64,
    ) {
        let Some(slot) = self.end_times.get_mut(note.index()) else {
            return;
        };
        if slot.is_some() {
            sink.note_event(note.note, 0, start_time);
        } else {
            self.sounding += 1;
        }
        *slot = Some(end_time);
        sink.note_event(note.note, velocity, start_time);
    }

    /// Emits note-offs for every note ending inside this block.
    pub fn handle_note_offs<S: NoteSink + ?Sized>(&mut self, sink: &mut S, tp: &TimeParams) {
        if self.sounding == 0 {
            return;
        }
        for (index, slot) in self.end_times.iter_mut().enumerate() {
            let Some(end_time) = *slot else {
                continue;
            };
            let offset = end_time - tp.time;
            if offset < tp.window {
                sink.note_event(Note::from_index(index).note, 0, offset);
                *slot = None;
                self.sounding -= 1;
            }
        }
    }

    /// Emits note-offs for every note ending no later than block offset
    /// `offset`, so a column starting at `offset` sees them released.
    pub fn release_until<S: NoteSink + ?Sized>(&mut self, sink: &mut S, tp: &TimeParams, offset: f64) {
        if self.sounding == 0 {
            return;
        }
        for (index, slot) in self.end_times.iter_mut().enumerate() {
            let Some(end_time) = *slot else {
                continue;
            };
            let end_offset = end_time - tp.time;
            if end_offset <= offset {
                sink.note_event(Note::from_index(index).note, 0, end_offset);
                *slot = None;
                self.sounding -= 1;
            }
        }
    }

    /// Silences everything at the start of the block.
    pub fn stop_notes<S: NoteSink + ?Sized>(&mut self, sink: &mut S) {
        if self.sounding == 0 {
            return;
        }
        for (index, slot) in self.end_times.iter_mut().enumerate() {
            if slot.take().is_some() {
                sink.note_event(Note::from_index(index).note, 0, 0.0);
            }
        }
        self.sounding = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::OutputEvent;

    fn ev(note: u8, velocity: u8, time: f64) -> OutputEvent {
        OutputEvent {
            note,
            velocity,
            time,
        }
    }

    #[test]
    fn retrigger_cuts_previous_note() {
        let mut notes = ActiveNotes::new();
        let mut out = Vec::new();
        notes.play_note(&mut out, Note::new(60, 0), 100, 0.0, 4.0);
        notes.play_note(&mut out, Note::new(60, 0), 90, 1.0, 2.0);
        assert_eq!(out, vec![ev(60, 100, 0.0), ev(60, 0, 1.0), ev(60, 90, 1.0)]);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes.end_time(Note::new(60, 0)), Some(2.0));
    }

    #[test]
    fn note_offs_wait_for_their_block() {
        let mut notes = ActiveNotes::new();
        let mut out = Vec::new();
        notes.play_note(&mut out, Note::new(60, 0), 100, 0.0, 1.0);
        notes.play_note(&mut out, Note::new(64, 0), 100, 0.0, 3.0);
        out.clear();

        notes.handle_note_offs(&mut out, &TimeParams::new(0.0, 1.0, 2.0, true));
        assert_eq!(out, vec![ev(60, 0, 1.0)]);
        assert!(notes.is_sounding(Note::new(64, 0)));

        out.clear();
        notes.handle_note_offs(&mut out, &TimeParams::new(2.0, 1.0, 2.0, true));
        assert_eq!(out, vec![ev(64, 0, 1.0)]);
        assert!(notes.is_empty());
    }

    #[test]
    fn end_exactly_at_window_end_belongs_to_next_block() {
        let mut notes = ActiveNotes::new();
        let mut out = Vec::new();
        notes.play_note(&mut out, Note::new(60, 0), 100, 0.0, 2.0);
        out.clear();
        notes.handle_note_offs(&mut out, &TimeParams::new(0.0, 1.0, 2.0, true));
        assert!(out.is_empty());
        notes.handle_note_offs(&mut out, &TimeParams::new(2.0, 1.0, 2.0, true));
        assert_eq!(out, vec![ev(60, 0, 0.0)]);
    }

    #[test]
    fn release_until_stops_at_offset() {
        let mut notes = ActiveNotes::new();
        let mut out = Vec::new();
        notes.play_note(&mut out, Note::new(60, 0), 100, 0.0, 11.0);
        notes.play_note(&mut out, Note::new(62, 0), 100, 0.0, 13.0);
        out.clear();
        let tp = TimeParams::new(10.0, 1.0, 4.0, true);
        notes.release_until(&mut out, &tp, 0.5);
        assert!(out.is_empty());
        notes.release_until(&mut out, &tp, 1.0);
        assert_eq!(out, vec![ev(60, 0, 1.0)]);
        assert_eq!(notes.len(), 1);
    }

    #[test]
    fn stop_silences_in_note_order() {
        let mut notes = ActiveNotes::new();
        let mut out = Vec::new();
        notes.play_note(&mut out, Note::new(72, 0), 100, 0.0, 10.0);
        notes.play_note(&mut out, Note::new(48, 0), 100, 0.0, 10.0);
        out.clear();
        notes.stop_notes(&mut out);
        assert_eq!(out, vec![ev(48, 0, 0.0), ev(72, 0, 0.0)]);
        assert!(notes.is_empty());
        notes.stop_notes(&mut out);
        assert_eq!(out.len(), 2);
    }
}
