//! Pattern playback.
//!
//! Every triggered pattern occurrence is an [`ActivePattern`]. Once per block
//! [`Player::run`] works out which grid columns start inside the block, plays
//! their cells through [`ActiveNotes`] and retires occurrences whose stop time
//! has passed.

use serde::{Deserialize, Serialize};
use stepgrid_model::{row_to_midi_note, GridPos, Note, Pattern, PatternId, State, PATTERN_HEIGHT};

use crate::active_notes::ActiveNotes;
use crate::config::EngineConfig;
use crate::sink::NoteSink;
use crate::stats::ActivePatternStats;
use crate::time::TimeParams;

/// Once a pattern has been told to stop, notes it would cut to this length
/// or shorter are not played.
///
/// Empirical: it hides blips that otherwise appear right at the stop time.
pub const FINISHED_MIN_NOTE_LENGTH: f64 = 1.0;

/// Channel every output note is sent on.
pub const OUTPUT_CHANNEL: u8 = 0;

/// Column bounds this close to an integer are treated as that integer.
const COLUMN_EPSILON: f64 = 1e-9;

/// One live occurrence of a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivePattern {
    pub pattern_id: PatternId,
    /// Absolute time of column 0 of the first loop.
    pub start_time: f64,
    /// Absolute stop time, meaningful once `finished` is set.
    pub end_time: f64,
    pub finished: bool,
    /// Note that triggered this occurrence.
    pub note: Note,
    pub velocity: u8,
}

impl ActivePattern {
    pub fn new(pattern_id: PatternId, start_time: f64, note: Note, velocity: u8) -> Self {
        Self {
            pattern_id,
            start_time,
            end_time: 0.0,
            finished: false,
            note,
            velocity,
        }
    }

    pub fn finish(&mut self, end_time: f64) {
        self.finished = true;
        self.end_time = end_time;
    }

    /// End of the span this occurrence may still play in the current block.
    pub fn window_end(&self, tp: &TimeParams) -> f64 {
        if self.finished {
            tp.window_end().min(self.end_time)
        } else {
            tp.window_end()
        }
    }

    /// Step velocity scaled by the trigger velocity.
    pub fn note_out_velocity(&self, step_velocity: u8) -> u8 {
        let scaled = (f64::from(step_velocity) * f64::from(self.velocity) / 127.0).round();
        scaled.clamp(1.0, 127.0) as u8
    }

    fn note_end_time(&self, step_end_time: f64) -> f64 {
        if self.finished {
            step_end_time.min(self.end_time)
        } else {
            step_end_time
        }
    }

    fn min_note_length(&self) -> f64 {
        if self.finished {
            FINISHED_MIN_NOTE_LENGTH
        } else {
            0.0
        }
    }

    /// Columns of `pattern` starting inside this block, if any.
    fn scan(&self, pattern_index: usize, pattern: &Pattern, tp: &TimeParams) -> Scan {
        let window_start = tp.time;
        if window_start >= self.window_end(tp) {
            return Scan::Done;
        }
        let step_duration = tp.step_duration * pattern.speed();
        if !(step_duration.is_finite() && step_duration > 0.0) {
            return Scan::Idle;
        }
        let pattern_elapsed = window_start - self.start_time;
        let pattern_duration = step_duration * pattern.width() as f64;
        // Before the first loop the elapsed time is used as is, so the lead-in
        // is measured from column 0.
        let pattern_time = if pattern_elapsed < 0.0 {
            pattern_elapsed
        } else {
            pattern_elapsed % pattern_duration
        };

        let last_column = snap_column((pattern_time + tp.window) / step_duration).ceil() - 1.0;
        let next_column = snap_column(pattern_time / step_duration).ceil().max(0.0);
        if last_column.is_nan() || last_column < next_column {
            return Scan::Idle;
        }
        Scan::Columns(ColumnScan {
            active: *self,
            pattern_index,
            next_column: next_column as i64,
            last_column: last_column as i64,
            pattern_time,
            step_duration,
        })
    }
}

fn snap_column(value: f64) -> f64 {
    let nearest = value.round();
    if (value - nearest).abs() < COLUMN_EPSILON {
        nearest
    } else {
        value
    }
}

/// Phase at which `note` enters a pattern: the position of the note inside
/// the trigger range, as a fraction of one loop.
pub fn pattern_start_time_offset(pattern: &Pattern, note: u8, step_duration: f64) -> f64 {
    if !(step_duration.is_finite() && step_duration > 0.0) || !pattern.triggers(note) {
        return 0.0;
    }
    let (first_note, last_note) = pattern.note_trigger_range();
    let range = f64::from(last_note - first_note) + 1.0;
    let percent_from_start = f64::from(note - first_note) / range;
    let pattern_duration = step_duration * pattern.width() as f64;
    percent_from_start * pattern_duration
}

enum Scan {
    /// Past the stop time; drop the occurrence.
    Done,
    /// Still live, nothing starts in this block.
    Idle,
    Columns(ColumnScan),
}

#[derive(Debug, Clone, Copy)]
struct ColumnScan {
    active: ActivePattern,
    pattern_index: usize,
    next_column: i64,
    last_column: i64,
    pattern_time: f64,
    step_duration: f64,
}

impl ColumnScan {
    fn is_exhausted(&self) -> bool {
        self.next_column > self.last_column
    }

    /// Offset of the next column from the block start.
    fn column_time(&self) -> f64 {
        (self.next_column as f64 * self.step_duration - self.pattern_time).max(0.0)
    }

    fn play_next_column<S: NoteSink + ?Sized>(
        &mut self,
        sink: &mut S,
        notes: &mut ActiveNotes,
        pattern: &Pattern,
        tp: &TimeParams,
    ) {
        let ap = &self.active;
        let column = self.next_column.rem_euclid(pattern.width() as i64) as i32;
        let column_time = self.column_time();
        let onset = tp.time + column_time;
        notes.release_until(sink, tp, column_time);
        for row in 0..PATTERN_HEIGHT {
            let pos = GridPos::new(column, row as i32);
            if pattern.is_extension_of_tied(pos) {
                continue;
            }
            let velocity = pattern.get_velocity(pos);
            if velocity == 0 {
                continue;
            }
            let length = f64::from(pattern.get_length(pos));
            let note_end_time = ap.note_end_time(onset + self.step_duration * length);
            if note_end_time - onset > ap.min_note_length() {
                notes.play_note(
                    sink,
                    Note::new(row_to_midi_note(row), OUTPUT_CHANNEL),
                    ap.note_out_velocity(velocity),
                    column_time,
                    note_end_time,
                );
            }
        }
        self.next_column += 1;
    }
}

/// Plays every pending column across `scans` in onset order, so notes reach
/// [`ActiveNotes`] with non-decreasing start times and every emitted event is
/// in time order apart from the closing note-offs.
fn play_scans<S: NoteSink + ?Sized>(
    scans: &mut [ColumnScan],
    sink: &mut S,
    notes: &mut ActiveNotes,
    state: &State,
    tp: &TimeParams,
) {
    loop {
        let mut earliest: Option<(usize, f64)> = None;
        for (index, scan) in scans.iter().enumerate() {
            if scan.is_exhausted() {
                continue;
            }
            let onset = scan.column_time();
            if earliest.map_or(true, |(_, best)| onset < best) {
                earliest = Some((index, onset));
            }
        }
        let Some((index, _)) = earliest else {
            return;
        };
        let scan = &mut scans[index];
        match state.patterns().get(scan.pattern_index) {
            Some(pattern) => scan.play_next_column(sink, notes, pattern, tp),
            None => scan.next_column = scan.last_column + 1,
        }
    }
}

fn find_pattern(state: &State, id: PatternId) -> Option<(usize, &Pattern)> {
    state
        .patterns()
        .iter()
        .enumerate()
        .find(|(_, pattern)| pattern.id() == id)
}

/// Note-triggered and selected pattern playback.
///
/// Storage is sized up front from [`EngineConfig`]; `run` does not allocate
/// unless more patterns are active than configured.
#[derive(Debug, Clone)]
pub struct Player {
    active_patterns: Vec<ActivePattern>,
    selected: Option<ActivePattern>,
    notes: ActiveNotes,
    scans: Vec<ColumnScan>,
}

impl Default for Player {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl Player {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            active_patterns: Vec::with_capacity(config.max_active_patterns),
            selected: None,
            notes: ActiveNotes::new(),
            scans: Vec::with_capacity(config.max_active_patterns + 1),
        }
    }

    pub fn active_patterns(&self) -> &[ActivePattern] {
        &self.active_patterns
    }

    pub fn active_notes(&self) -> &ActiveNotes {
        &self.notes
    }

    pub fn selected_pattern(&self) -> Option<&ActivePattern> {
        self.selected.as_ref()
    }

    /// Starts every pattern whose trigger range holds `note`, replacing any
    /// occurrences the same note started earlier. Returns how many started.
    pub fn start_note_triggered(
        &mut self,
        state: &State,
        note: Note,
        velocity: u8,
        start_time: f64,
        tp: &TimeParams,
    ) -> usize {
        self.active_patterns.retain(|ap| ap.note != note);
        let before = self.active_patterns.len();
        for pattern in state.patterns_for_note(note) {
            let offset = pattern_start_time_offset(pattern, note.note, tp.step_duration);
            self.active_patterns.push(ActivePattern::new(
                pattern.id(),
                start_time - offset,
                note,
                velocity,
            ));
        }
        self.active_patterns.len() - before
    }

    /// Lets every occurrence started by `note` play out until `end_time`.
    pub fn stop_patterns(&mut self, note: Note, end_time: f64) {
        for ap in self
            .active_patterns
            .iter_mut()
            .filter(|ap| ap.note == note && !ap.finished)
        {
            ap.finish(end_time);
        }
    }

    /// Drops every note-triggered occurrence at once. Sounding notes still
    /// receive their scheduled note-offs.
    pub fn stop_note_triggered(&mut self) {
        self.active_patterns.clear();
    }

    /// Loops the selected pattern from time zero at full velocity.
    pub fn play_selected_pattern(&mut self, state: &State) {
        self.selected = state.selected_pattern().map(|pattern| {
            ActivePattern::new(
                pattern.id(),
                0.0,
                Note::new(pattern.first_note(), OUTPUT_CHANNEL),
                127,
            )
        });
    }

    pub fn stop_selected_pattern(&mut self) {
        self.selected = None;
    }

    /// Advances playback by one block.
    pub fn run<S: NoteSink + ?Sized>(&mut self, sink: &mut S, state: &State, tp: &TimeParams) {
        if !tp.playing {
            self.active_patterns.clear();
            self.notes.stop_notes(sink);
            return;
        }
        if !tp.is_schedulable() {
            return;
        }

        self.scans.clear();
        let scans = &mut self.scans;
        self.active_patterns.retain(|ap| {
            let Some((index, pattern)) = find_pattern(state, ap.pattern_id) else {
                return false;
            };
            match ap.scan(index, pattern, tp) {
                Scan::Done => false,
                Scan::Idle => true,
                Scan::Columns(scan) => {
                    scans.push(scan);
                    true
                }
            }
        });
        if let Some(ap) = self.selected {
            match find_pattern(state, ap.pattern_id).map(|(index, pattern)| ap.scan(index, pattern, tp)) {
                None | Some(Scan::Done) => self.selected = None,
                Some(Scan::Idle) => {}
                Some(Scan::Columns(scan)) => self.scans.push(scan),
            }
        }

        play_scans(&mut self.scans, sink, &mut self.notes, state, tp);
        self.notes.handle_note_offs(sink, tp);
    }

    /// Plays the columns of a single occurrence that start in this block.
    /// Returns false once the occurrence is over.
    pub fn run_active_pattern<S: NoteSink + ?Sized>(
        &mut self,
        sink: &mut S,
        ap: &ActivePattern,
        state: &State,
        tp: &TimeParams,
    ) -> bool {
        if !tp.is_schedulable() {
            return true;
        }
        let Some((index, pattern)) = find_pattern(state, ap.pattern_id) else {
            return false;
        };
        match ap.scan(index, pattern, tp) {
            Scan::Done => false,
            Scan::Idle => true,
            Scan::Columns(mut scan) => {
                while !scan.is_exhausted() {
                    scan.play_next_column(sink, &mut self.notes, pattern, tp);
                }
                true
            }
        }
    }

    /// Loop position of every live occurrence, selected slot included.
    pub fn collect_stats(&self, state: &State, tp: &TimeParams, out: &mut Vec<ActivePatternStats>) {
        out.clear();
        for ap in self.active_patterns.iter().chain(self.selected.iter()) {
            let Some(pattern) = state.get_pattern(ap.pattern_id) else {
                continue;
            };
            let duration = tp.step_duration * pattern.speed() * pattern.width() as f64;
            let time = if duration.is_finite() && duration > 0.0 {
                (tp.time - ap.start_time).rem_euclid(duration)
            } else {
                0.0
            };
            out.push(ActivePatternStats {
                pattern_id: ap.pattern_id,
                duration,
                time,
            });
        }
    }
}
