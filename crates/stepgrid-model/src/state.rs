use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

use crate::error::StateError;
use crate::note::{Note, MAX_NOTE};
use crate::pattern::{Pattern, PatternId};
use crate::schema::StateDocument;

/// Starting notes tried, in order, when placing the trigger range of a new
/// pattern.
const CONVENIENT_RANGE_STARTS: [u8; 5] = [0, 24, 48, 72, 96];
const NEW_PATTERN_RANGE: u8 = 16;

/// Every pattern of the sequencer plus selection and play flags.
#[derive(Debug, Clone)]
pub struct State {
    selected: Option<PatternId>,
    patterns: Vec<Pattern>,
    /// Loop the selected pattern regardless of incoming notes.
    pub play_selected: bool,
    /// Start patterns from incoming notes.
    pub play_note_triggered: bool,
}

impl Default for State {
    fn default() -> Self {
        Self {
            selected: None,
            patterns: Vec::new(),
            play_selected: false,
            play_note_triggered: true,
        }
    }
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn num_patterns(&self) -> usize {
        self.patterns.len()
    }

    pub fn get_pattern(&self, id: PatternId) -> Option<&Pattern> {
        self.patterns.iter().find(|pattern| pattern.id() == id)
    }

    pub fn get_pattern_mut(&mut self, id: PatternId) -> Option<&mut Pattern> {
        self.patterns.iter_mut().find(|pattern| pattern.id() == id)
    }

    /// Patterns whose trigger range contains `note`.
    pub fn patterns_for_note(&self, note: Note) -> impl Iterator<Item = &Pattern> + '_ {
        self.patterns
            .iter()
            .filter(move |pattern| pattern.triggers(note.note))
    }

    pub fn first_pattern_with_note(&self, note: Note) -> Option<&Pattern> {
        self.patterns_for_note(note).next()
    }

    pub fn next_unused_id(&self) -> PatternId {
        self.patterns
            .iter()
            .map(|pattern| pattern.id() + 1)
            .max()
            .unwrap_or(0)
    }

    pub(crate) fn insert_pattern(&mut self, pattern: Pattern) {
        self.patterns.push(pattern);
    }

    /// Picks a 16 note trigger range starting at the first unused octave-ish
    /// start, falling back to the lowest range.
    pub fn try_find_free_16_range(&self) -> (u8, u8) {
        let mut used = [false; MAX_NOTE as usize + 1];
        for pattern in &self.patterns {
            for note in pattern.first_note()..=pattern.last_note() {
                used[note as usize] = true;
            }
        }
        let start = CONVENIENT_RANGE_STARTS
            .into_iter()
            .find(|start| !used[*start as usize])
            .unwrap_or(0);
        (start, start + NEW_PATTERN_RANGE - 1)
    }

    pub fn create_pattern(&mut self) -> &mut Pattern {
        let mut pattern = Pattern::new(self.next_unused_id());
        let (first, last) = self.try_find_free_16_range();
        pattern.set_note_trigger_range(first, last);
        self.patterns.push(pattern);
        let index = self.patterns.len() - 1;
        &mut self.patterns[index]
    }

    pub fn duplicate_pattern(&mut self, id: PatternId) -> Result<&mut Pattern, StateError> {
        let next_id = self.next_unused_id();
        let copy = self
            .get_pattern(id)
            .ok_or(StateError::UnknownPattern(id))?
            .duplicate_as(next_id);
        self.patterns.push(copy);
        let index = self.patterns.len() - 1;
        Ok(&mut self.patterns[index])
    }

    /// Deletes a pattern and moves the selection to its successor, or its
    /// predecessor when it was last. Playback drops instances of missing ids.
    pub fn delete_pattern(&mut self, id: PatternId) -> Option<Pattern> {
        let index = self.patterns.iter().position(|pattern| pattern.id() == id)?;
        let removed = self.patterns.remove(index);
        self.selected = self
            .patterns
            .get(index)
            .or_else(|| self.patterns.last())
            .map(Pattern::id);
        Some(removed)
    }

    pub fn selected_id(&self) -> Option<PatternId> {
        self.selected
    }

    pub fn set_selected_id(&mut self, id: Option<PatternId>) {
        self.selected = id;
    }

    pub fn selected_pattern(&self) -> Option<&Pattern> {
        self.selected.and_then(|id| self.get_pattern(id))
    }

    pub fn to_document(&self) -> StateDocument {
        StateDocument::from(self)
    }

    pub fn to_json_string(&self) -> Result<String, StateError> {
        Ok(serde_json::to_string(&self.to_document())?)
    }

    pub fn from_json_str(json: &str) -> Result<Self, StateError> {
        let document: StateDocument = serde_json::from_str(json)?;
        State::try_from(&document)
    }

    pub fn write_to_file(&self, path: &Path) -> Result<(), StateError> {
        debug!(path = %path.display(), "writing state file");
        let json = serde_json::to_string_pretty(&self.to_document())?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Reads a state file, returning `None` when it does not exist.
    pub fn read_from_file(path: &Path) -> Result<Option<Self>, StateError> {
        debug!(path = %path.display(), "reading state file");
        match fs::read_to_string(path) {
            Ok(contents) => State::from_json_str(&contents).map(Some),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Parses arbitrary bytes as a state document, discarding the outcome.
#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_parse_state(data: &[u8]) {
    if let Ok(json) = std::str::from_utf8(data) {
        if let Ok(state) = State::from_json_str(json) {
            let _ = state.to_json_string();
        }
    }
}
