//! On-disk JSON shape of [`State`](crate::State).
//!
//! Optional keys fall back to their defaults so documents written before
//! speed, default velocity and tie lengths existed still load.

use serde::{Deserialize, Serialize};

use crate::error::StateError;
use crate::grid::{GridPos, PATTERN_HEIGHT};
use crate::note::MAX_NOTE;
use crate::pattern::{Cell, Pattern, PatternId, DEFAULT_SPEED, DEFAULT_VELOCITY, MAX_WIDTH, MIN_WIDTH};
use crate::state::State;

pub const NO_SELECTION: i64 = -1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    #[serde(default = "no_selection")]
    pub selected: i64,
    #[serde(default)]
    pub play_selected: bool,
    #[serde(default = "enabled")]
    pub play_note_triggered: bool,
    #[serde(default)]
    pub patterns: Vec<PatternDocument>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatternDocument {
    pub id: PatternId,
    pub width: usize,
    #[serde(default = "pattern_height")]
    pub height: usize,
    pub first_note: u8,
    pub last_note: u8,
    #[serde(default)]
    pub cursor_x: i32,
    #[serde(default)]
    pub cursor_y: i32,
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default = "default_velocity")]
    pub default_velocity: u8,
    #[serde(default)]
    pub cells: Vec<CellDocument>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellDocument {
    pub x: i32,
    pub y: i32,
    pub v: u8,
    #[serde(default, skip_serializing_if = "is_false")]
    pub s: bool,
    #[serde(default = "unit_length", skip_serializing_if = "is_unit_length")]
    pub l: u32,
}

fn no_selection() -> i64 {
    NO_SELECTION
}

fn enabled() -> bool {
    true
}

fn pattern_height() -> usize {
    PATTERN_HEIGHT
}

fn default_speed() -> f64 {
    DEFAULT_SPEED
}

fn default_velocity() -> u8 {
    DEFAULT_VELOCITY
}

fn unit_length() -> u32 {
    1
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_unit_length(value: &u32) -> bool {
    *value == 1
}

impl From<&State> for StateDocument {
    fn from(state: &State) -> Self {
        Self {
            selected: state.selected_id().map_or(NO_SELECTION, i64::from),
            play_selected: state.play_selected,
            play_note_triggered: state.play_note_triggered,
            patterns: state.patterns().iter().map(PatternDocument::from).collect(),
        }
    }
}

impl From<&Pattern> for PatternDocument {
    fn from(pattern: &Pattern) -> Self {
        let mut cells: Vec<CellDocument> = pattern
            .cells()
            .map(|cell| CellDocument {
                x: cell.position.x,
                y: cell.position.y,
                v: cell.velocity,
                s: cell.selected,
                l: cell.length,
            })
            .collect();
        cells.sort_by_key(|cell| (cell.x, cell.y));
        Self {
            id: pattern.id(),
            width: pattern.width(),
            height: pattern.height(),
            first_note: pattern.first_note(),
            last_note: pattern.last_note(),
            cursor_x: pattern.cursor().x,
            cursor_y: pattern.cursor().y,
            speed: pattern.speed(),
            default_velocity: pattern.default_velocity(),
            cells,
        }
    }
}

impl TryFrom<&PatternDocument> for Pattern {
    type Error = StateError;

    fn try_from(doc: &PatternDocument) -> Result<Self, Self::Error> {
        let id = doc.id;
        if !(MIN_WIDTH..=MAX_WIDTH).contains(&doc.width) {
            return Err(StateError::invalid(format!(
                "pattern {id}: width {} outside {MIN_WIDTH}..={MAX_WIDTH}",
                doc.width
            )));
        }
        if doc.height != PATTERN_HEIGHT {
            return Err(StateError::invalid(format!(
                "pattern {id}: height must be {PATTERN_HEIGHT}, got {}",
                doc.height
            )));
        }
        if doc.first_note > doc.last_note || doc.last_note > MAX_NOTE {
            return Err(StateError::invalid(format!(
                "pattern {id}: trigger range {}..={} is not valid",
                doc.first_note, doc.last_note
            )));
        }
        if !doc.speed.is_finite() || doc.speed <= 0.0 {
            return Err(StateError::invalid(format!(
                "pattern {id}: speed {} must be positive",
                doc.speed
            )));
        }
        if doc.default_velocity == 0 || doc.default_velocity > MAX_NOTE {
            return Err(StateError::invalid(format!(
                "pattern {id}: default velocity {} outside 1..=127",
                doc.default_velocity
            )));
        }

        let mut occupied = vec![false; doc.width * PATTERN_HEIGHT];
        for cell in &doc.cells {
            let in_grid = cell.x >= 0
                && (cell.x as usize) < doc.width
                && cell.y >= 0
                && (cell.y as usize) < PATTERN_HEIGHT;
            if !in_grid {
                return Err(StateError::invalid(format!(
                    "pattern {id}: cell ({}, {}) outside the grid",
                    cell.x, cell.y
                )));
            }
            if cell.v == 0 || cell.v > MAX_NOTE {
                return Err(StateError::invalid(format!(
                    "pattern {id}: cell ({}, {}) velocity {} outside 1..=127",
                    cell.x, cell.y, cell.v
                )));
            }
            if cell.l == 0 || cell.x as usize + cell.l as usize > doc.width {
                return Err(StateError::invalid(format!(
                    "pattern {id}: cell ({}, {}) length {} does not fit",
                    cell.x, cell.y, cell.l
                )));
            }
            for column in cell.x as usize..cell.x as usize + cell.l as usize {
                let slot = &mut occupied[column * PATTERN_HEIGHT + cell.y as usize];
                if *slot {
                    return Err(StateError::invalid(format!(
                        "pattern {id}: cells overlap at ({column}, {})",
                        cell.y
                    )));
                }
                *slot = true;
            }
        }

        let mut pattern = Pattern::with_width(id, doc.width);
        pattern.set_note_trigger_range(doc.first_note, doc.last_note);
        pattern.set_speed(doc.speed);
        pattern.set_default_velocity(doc.default_velocity);
        pattern.set_cursor(GridPos::new(doc.cursor_x, doc.cursor_y));
        for cell in &doc.cells {
            pattern.set_cell(&Cell {
                position: GridPos::new(cell.x, cell.y),
                velocity: cell.v,
                selected: cell.s,
                length: cell.l,
            });
        }
        Ok(pattern)
    }
}

impl TryFrom<&StateDocument> for State {
    type Error = StateError;

    fn try_from(doc: &StateDocument) -> Result<Self, Self::Error> {
        let mut state = State::new();
        for pattern_doc in &doc.patterns {
            if state.get_pattern(pattern_doc.id).is_some() {
                return Err(StateError::invalid(format!(
                    "duplicate pattern id {}",
                    pattern_doc.id
                )));
            }
            state.insert_pattern(Pattern::try_from(pattern_doc)?);
        }
        state.play_selected = doc.play_selected;
        state.play_note_triggered = doc.play_note_triggered;
        let selected = PatternId::try_from(doc.selected)
            .ok()
            .filter(|id| state.get_pattern(*id).is_some());
        if selected.is_none() && doc.selected != NO_SELECTION {
            tracing::warn!(selected = doc.selected, "selected pattern missing from state");
        }
        state.set_selected_id(selected);
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_optional_keys_use_defaults() {
        let json = r#"{
            "selected": 0,
            "patterns": [{
                "id": 0, "width": 16, "height": 128,
                "first_note": 0, "last_note": 15,
                "cells": [{"x": 1, "y": 2, "v": 99}]
            }]
        }"#;
        let doc: StateDocument = serde_json::from_str(json).unwrap();
        let state = State::try_from(&doc).unwrap();
        let pattern = state.get_pattern(0).unwrap();
        assert_eq!(pattern.speed(), DEFAULT_SPEED);
        assert_eq!(pattern.default_velocity(), DEFAULT_VELOCITY);
        assert_eq!(pattern.get_length(GridPos::new(1, 2)), 1);
        assert!(!pattern.get_selected(GridPos::new(1, 2)));
        assert!(!state.play_selected);
        assert!(state.play_note_triggered);
    }

    #[test]
    fn rejects_overlapping_ties() {
        let doc = StateDocument {
            selected: NO_SELECTION,
            play_selected: false,
            play_note_triggered: true,
            patterns: vec![PatternDocument {
                id: 0,
                width: 8,
                height: PATTERN_HEIGHT,
                first_note: 0,
                last_note: 15,
                cursor_x: 0,
                cursor_y: 0,
                speed: 1.0,
                default_velocity: 127,
                cells: vec![
                    CellDocument { x: 0, y: 4, v: 100, s: false, l: 3 },
                    CellDocument { x: 2, y: 4, v: 100, s: false, l: 1 },
                ],
            }],
        };
        let err = State::try_from(&doc).unwrap_err();
        assert!(matches!(err, StateError::Invalid(_)));
    }

    #[test]
    fn rejects_bad_dimensions_and_ranges() {
        let base = PatternDocument {
            id: 0,
            width: 8,
            height: PATTERN_HEIGHT,
            first_note: 0,
            last_note: 15,
            cursor_x: 0,
            cursor_y: 0,
            speed: 1.0,
            default_velocity: 127,
            cells: Vec::new(),
        };
        let cases = [
            PatternDocument { width: 0, ..base.clone() },
            PatternDocument { width: 33, ..base.clone() },
            PatternDocument { height: 64, ..base.clone() },
            PatternDocument { first_note: 20, last_note: 10, ..base.clone() },
            PatternDocument { last_note: 128, ..base.clone() },
            PatternDocument { speed: 0.0, ..base.clone() },
            PatternDocument { speed: f64::NAN, ..base.clone() },
            PatternDocument { default_velocity: 0, ..base.clone() },
            PatternDocument {
                cells: vec![CellDocument { x: 8, y: 0, v: 1, s: false, l: 1 }],
                ..base.clone()
            },
            PatternDocument {
                cells: vec![CellDocument { x: 0, y: 0, v: 0, s: false, l: 1 }],
                ..base.clone()
            },
            PatternDocument {
                cells: vec![CellDocument { x: 6, y: 0, v: 1, s: false, l: 3 }],
                ..base.clone()
            },
        ];
        for case in cases {
            assert!(Pattern::try_from(&case).is_err(), "accepted {case:?}");
        }
        assert!(Pattern::try_from(&base).is_ok());
    }

    #[test]
    fn unknown_selection_is_dropped() {
        let doc = StateDocument {
            selected: 42,
            play_selected: true,
            play_note_triggered: false,
            patterns: Vec::new(),
        };
        let state = State::try_from(&doc).unwrap();
        assert_eq!(state.selected_id(), None);
        assert!(state.play_selected);
        assert!(!state.play_note_triggered);
    }
}
