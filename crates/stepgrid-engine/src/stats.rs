use serde::{Deserialize, Serialize};
use stepgrid_model::PatternId;

use crate::timing::HostTimePosition;

/// Loop position of one live pattern occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivePatternStats {
    pub pattern_id: PatternId,
    /// Length of one loop.
    pub duration: f64,
    /// Position inside the current loop.
    pub time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TransportStats {
    pub playing: bool,
    pub bar: i32,
    pub beat: i32,
    pub tick: f64,
    pub beats_per_bar: f64,
    pub beats_per_minute: f64,
}

impl From<&HostTimePosition> for TransportStats {
    fn from(position: &HostTimePosition) -> Self {
        Self {
            playing: position.playing,
            bar: position.bar,
            beat: position.beat,
            tick: position.tick,
            beats_per_bar: position.beats_per_bar,
            beats_per_minute: position.beats_per_minute,
        }
    }
}

/// Snapshot refreshed after every processed block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackStats {
    pub transport: TransportStats,
    pub active_patterns: Vec<ActivePatternStats>,
}
