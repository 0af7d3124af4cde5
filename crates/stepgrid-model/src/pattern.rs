//! Sparse step grid.
//!
//! Cells live in a [`SlotArray`] and a dense `width * height` table maps every
//! coordinate to the id of the cell covering it. A tied cell of length `n`
//! is referenced from `n` consecutive columns of its row; only the first of
//! those (the cell's own position) is its head.

use serde::{Deserialize, Serialize};

use crate::grid::{midi_note_to_row, row_to_midi_note, GridPos, PATTERN_HEIGHT};
use crate::note::MAX_NOTE;
use crate::slots::{SlotArray, SlotId};

pub type PatternId = u32;

pub const MIN_WIDTH: usize = 1;
pub const MAX_WIDTH: usize = 32;
pub const DEFAULT_WIDTH: usize = 32;
pub const DEFAULT_VELOCITY: u8 = 127;
pub const DEFAULT_SPEED: f64 = 1.0;

/// One active grid entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub position: GridPos,
    pub velocity: u8,
    pub selected: bool,
    pub length: u32,
}

impl Cell {
    pub fn new(position: GridPos, velocity: u8) -> Self {
        Self {
            position,
            velocity,
            selected: false,
            length: 1,
        }
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = length;
        self
    }

    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Pattern {
    id: PatternId,
    width: usize,
    first_note: u8,
    last_note: u8,
    speed: f64,
    default_velocity: u8,
    cursor: GridPos,
    cells: SlotArray<Cell>,
    grid: Vec<SlotId>,
}

impl Pattern {
    pub fn new(id: PatternId) -> Self {
        Self::with_width(id, DEFAULT_WIDTH)
    }

    pub fn with_width(id: PatternId, width: usize) -> Self {
        debug_assert!(
            (MIN_WIDTH..=MAX_WIDTH).contains(&width),
            "pattern width {width} out of range"
        );
        let width = width.clamp(MIN_WIDTH, MAX_WIDTH);
        Self {
            id,
            width,
            first_note: 0,
            last_note: MAX_NOTE,
            speed: DEFAULT_SPEED,
            default_velocity: DEFAULT_VELOCITY,
            cursor: GridPos::default(),
            cells: SlotArray::new(),
            grid: vec![SlotId::NULL; width * PATTERN_HEIGHT],
        }
    }

    pub fn id(&self) -> PatternId {
        self.id
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        PATTERN_HEIGHT
    }

    pub fn first_note(&self) -> u8 {
        self.first_note
    }

    pub fn last_note(&self) -> u8 {
        self.last_note
    }

    /// Inclusive MIDI note range that triggers this pattern.
    pub fn note_trigger_range(&self) -> (u8, u8) {
        (self.first_note, self.last_note)
    }

    pub fn triggers(&self, note: u8) -> bool {
        self.first_note <= note && note <= self.last_note
    }

    pub fn set_note_trigger_range(&mut self, first_note: u8, last_note: u8) {
        debug_assert!(first_note <= last_note, "inverted trigger range");
        let first = first_note.min(MAX_NOTE);
        let last = last_note.min(MAX_NOTE);
        self.first_note = first.min(last);
        self.last_note = first.max(last);
    }

    /// Playback rate multiplier applied to the host step duration.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f64) {
        debug_assert!(speed.is_finite() && speed > 0.0, "invalid speed {speed}");
        if speed.is_finite() && speed > 0.0 {
            self.speed = speed;
        }
    }

    /// Velocity given to newly activated cells.
    pub fn default_velocity(&self) -> u8 {
        self.default_velocity
    }

    pub fn set_default_velocity(&mut self, velocity: u8) {
        self.default_velocity = velocity.clamp(1, MAX_NOTE);
    }

    pub fn cursor(&self) -> GridPos {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: GridPos) {
        self.cursor = cursor;
    }

    pub fn is_valid_coords(&self, pos: GridPos) -> bool {
        pos.x >= 0 && (pos.x as usize) < self.width && pos.y >= 0 && (pos.y as usize) < PATTERN_HEIGHT
    }

    fn grid_index(&self, pos: GridPos) -> Option<usize> {
        let valid = self.is_valid_coords(pos);
        debug_assert!(valid, "coordinate {pos:?} outside {}x{PATTERN_HEIGHT}", self.width);
        valid.then(|| pos.x as usize * PATTERN_HEIGHT + pos.y as usize)
    }

    fn cell_id(&self, pos: GridPos) -> SlotId {
        self.grid_index(pos)
            .map(|index| self.grid[index])
            .unwrap_or(SlotId::NULL)
    }

    /// Cell covering `pos`, which for a tied cell may start in an earlier column.
    pub fn cell(&self, pos: GridPos) -> Option<&Cell> {
        self.cells.get(self.cell_id(pos))
    }

    pub fn exists(&self, pos: GridPos) -> bool {
        self.is_valid_coords(pos) && self.cells.exists(self.cell_id(pos))
    }

    pub fn is_active(&self, pos: GridPos) -> bool {
        self.exists(pos)
    }

    /// Velocity of the cell covering `pos`, or 0 when silent.
    pub fn get_velocity(&self, pos: GridPos) -> u8 {
        self.cell(pos).map_or(0, |cell| cell.velocity)
    }

    /// Length in steps of the cell covering `pos`, or 0 when silent.
    pub fn get_length(&self, pos: GridPos) -> u32 {
        self.cell(pos).map_or(0, |cell| cell.length)
    }

    pub fn get_selected(&self, pos: GridPos) -> bool {
        self.cell(pos).is_some_and(|cell| cell.selected)
    }

    /// True for every column of a tied cell except its head.
    pub fn is_extension_of_tied(&self, pos: GridPos) -> bool {
        self.cell(pos).is_some_and(|cell| cell.position != pos)
    }

    fn get_or_create(&mut self, pos: GridPos) -> Option<SlotId> {
        let index = self.grid_index(pos)?;
        let id = self.grid[index];
        if self.cells.exists(id) {
            return Some(id);
        }
        let id = self.cells.push(Cell::new(pos, self.default_velocity));
        self.grid[index] = id;
        Some(id)
    }

    /// Sets the velocity of the cell at `pos`, activating it if needed. A zero
    /// velocity clears the cell.
    pub fn set_velocity(&mut self, pos: GridPos, velocity: u8) {
        if velocity == 0 {
            self.clear_cell(pos);
            return;
        }
        if let Some(id) = self.get_or_create(pos) {
            if let Some(cell) = self.cells.get_mut(id) {
                cell.velocity = velocity.min(MAX_NOTE);
            }
        }
    }

    pub fn set_active(&mut self, pos: GridPos, active: bool) {
        if active {
            self.get_or_create(pos);
        } else {
            self.clear_cell(pos);
        }
    }

    pub fn set_selected(&mut self, pos: GridPos, selected: bool) {
        let id = self.cell_id(pos);
        if let Some(cell) = self.cells.get_mut(id) {
            cell.selected = selected;
        }
    }

    /// Removes the cell covering `pos`, including every column of a tie.
    pub fn clear_cell(&mut self, pos: GridPos) {
        let Some(head) = self.cell(pos).map(|cell| cell.position) else {
            return;
        };
        self.set_length(head, 1);
        let id = self.cell_id(head);
        if let Some(index) = self.grid_index(head) {
            self.grid[index] = SlotId::NULL;
        }
        self.cells.remove_if_exists(id);
    }

    /// Changes the length of the cell covering `pos`. Growing absorbs whatever
    /// occupied the new columns; the tie is clamped to the last column.
    pub fn set_length(&mut self, pos: GridPos, length: u32) {
        debug_assert!(length >= 1, "cell length must be at least 1");
        let id = self.cell_id(pos);
        let Some(cell) = self.cells.get(id) else {
            return;
        };
        let head = cell.position;
        let current = cell.length;
        let max_length = (self.width - head.x as usize) as u32;
        debug_assert!(length <= max_length, "tie of {length} passes the last column");
        let target = length.clamp(1, max_length);

        for column in (target..current).rev() {
            if let Some(index) = self.grid_index(GridPos::new(head.x + column as i32, head.y)) {
                self.grid[index] = SlotId::NULL;
            }
        }
        for column in current..target {
            let covered = GridPos::new(head.x + column as i32, head.y);
            self.clear_cell(covered);
            if let Some(index) = self.grid_index(covered) {
                self.grid[index] = id;
            }
        }
        if let Some(cell) = self.cells.get_mut(id) {
            cell.length = target;
        }
    }

    /// Writes a full cell description, replacing whatever covered its position.
    pub fn set_cell(&mut self, cell: &Cell) {
        if cell.velocity == 0 || !self.is_valid_coords(cell.position) {
            return;
        }
        if self.is_extension_of_tied(cell.position) {
            self.clear_cell(cell.position);
        }
        self.set_velocity(cell.position, cell.velocity);
        self.set_length(cell.position, cell.length.max(1));
        self.set_selected(cell.position, cell.selected);
    }

    /// Places `cells` shifted by `at`, wrapping around both grid axes.
    pub fn put_cells(&mut self, cells: &[Cell], at: GridPos) {
        for cell in cells {
            let mut placed = *cell;
            placed.position = (cell.position + at).wrapped(self.width, PATTERN_HEIGHT);
            let max_length = (self.width - placed.position.x as usize) as u32;
            placed.length = placed.length.clamp(1, max_length);
            self.set_cell(&placed);
        }
    }

    pub fn move_selected_cells(&mut self, delta: GridPos) {
        let moved: Vec<Cell> = self.selected_cells().copied().collect();
        for cell in &moved {
            self.clear_cell(cell.position);
        }
        self.put_cells(&moved, delta);
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.cells.values()
    }

    pub fn selected_cells(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.cells().filter(|cell| cell.selected)
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn select_all(&mut self) {
        for (_, cell) in self.cells.iter_mut() {
            cell.selected = true;
        }
    }

    /// Clears every selection flag, returning how many cells were selected.
    pub fn deselect_all(&mut self) -> usize {
        let mut count = 0;
        for (_, cell) in self.cells.iter_mut() {
            if cell.selected {
                cell.selected = false;
                count += 1;
            }
        }
        count
    }

    pub fn num_selected(&self) -> usize {
        self.selected_cells().count()
    }

    pub fn resize_width(&mut self, new_width: usize) {
        debug_assert!(
            (MIN_WIDTH..=MAX_WIDTH).contains(&new_width),
            "pattern width {new_width} out of range"
        );
        let new_width = new_width.clamp(MIN_WIDTH, MAX_WIDTH);
        let mut grid = vec![SlotId::NULL; new_width * PATTERN_HEIGHT];
        let kept = grid.len().min(self.grid.len());
        grid[..kept].copy_from_slice(&self.grid[..kept]);
        self.grid = grid;
        self.width = new_width;

        self.cells.retain(|cell| (cell.position.x as usize) < new_width);
        for (_, cell) in self.cells.iter_mut() {
            let max_length = (new_width - cell.position.x as usize) as u32;
            cell.length = cell.length.min(max_length);
        }
    }

    pub fn move_cursor_to_lowest_note(&mut self) {
        let lowest = self
            .cells()
            .map(|cell| row_to_midi_note(cell.position.y as usize))
            .min()
            .unwrap_or(MAX_NOTE);
        self.cursor = GridPos::new(0, midi_note_to_row(lowest) as i32);
    }

    /// Deep copy carrying a different id.
    pub fn duplicate_as(&self, id: PatternId) -> Self {
        let mut copy = self.clone();
        copy.id = id;
        copy
    }
}
