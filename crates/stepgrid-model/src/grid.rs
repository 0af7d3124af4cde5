use std::ops::{Add, AddAssign, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use crate::note::MAX_NOTE;

/// Number of rows in every pattern, one per MIDI note.
pub const PATTERN_HEIGHT: usize = 128;

/// Column/row coordinate inside a pattern grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Wraps the position into `[0, width) x [0, height)`.
    pub fn wrapped(self, width: usize, height: usize) -> Self {
        Self {
            x: self.x.rem_euclid(width.max(1) as i32),
            y: self.y.rem_euclid(height.max(1) as i32),
        }
    }
}

impl Add for GridPos {
    type Output = GridPos;

    fn add(self, rhs: GridPos) -> GridPos {
        GridPos::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for GridPos {
    fn add_assign(&mut self, rhs: GridPos) {
        *self = *self + rhs;
    }
}

impl Sub for GridPos {
    type Output = GridPos;

    fn sub(self, rhs: GridPos) -> GridPos {
        GridPos::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for GridPos {
    fn sub_assign(&mut self, rhs: GridPos) {
        *self = *self - rhs;
    }
}

/// Row 0 is the highest MIDI note.
#[inline]
pub fn row_to_midi_note(row: usize) -> u8 {
    debug_assert!(row < PATTERN_HEIGHT, "row {row} out of range");
    MAX_NOTE - row.min(PATTERN_HEIGHT - 1) as u8
}

#[inline]
pub fn midi_note_to_row(note: u8) -> usize {
    debug_assert!(note <= MAX_NOTE, "note {note} out of range");
    (MAX_NOTE - note.min(MAX_NOTE)) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_map_to_descending_notes() {
        assert_eq!(row_to_midi_note(0), 127);
        assert_eq!(row_to_midi_note(127), 0);
        assert_eq!(midi_note_to_row(60), 67);
        assert_eq!(row_to_midi_note(midi_note_to_row(60)), 60);
    }

    #[test]
    fn wraps_negative_positions() {
        let pos = GridPos::new(-1, 130).wrapped(16, PATTERN_HEIGHT);
        assert_eq!(pos, GridPos::new(15, 2));
    }
}
