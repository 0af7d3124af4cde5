use serde::{Deserialize, Serialize};

/// Sizes of the buffers the engine allocates up front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Note-triggered pattern occurrences that fit without reallocating.
    pub max_active_patterns: usize,
    /// Output events per block that fit without reallocating.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_active_patterns: 64,
            event_capacity: 512,
        }
    }
}
