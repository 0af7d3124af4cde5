use serde::{Deserialize, Serialize};

/// Transport snapshot for one processing block.
///
/// `time`, `step_duration` and `window` share a unit (host ticks in the
/// plugin, anything in tests); the engine never converts between units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeParams {
    /// Absolute position at the start of the block.
    pub time: f64,
    /// Duration of one grid column before the pattern speed is applied.
    pub step_duration: f64,
    /// Length of the block.
    pub window: f64,
    pub playing: bool,
}

impl TimeParams {
    pub fn new(time: f64, step_duration: f64, window: f64, playing: bool) -> Self {
        Self {
            time,
            step_duration,
            window,
            playing,
        }
    }

    /// True when the block describes a non-empty, finite span the engine can
    /// schedule against. Other blocks are treated as no-ops.
    pub fn is_schedulable(&self) -> bool {
        self.time.is_finite()
            && self.step_duration.is_finite()
            && self.step_duration > 0.0
            && self.window.is_finite()
            && self.window > 0.0
    }

    #[inline]
    pub fn window_end(&self) -> f64 {
        self.time + self.window
    }

    /// The same transport advanced by one block.
    pub fn next_block(&self) -> Self {
        Self {
            time: self.window_end(),
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_blocks() {
        assert!(TimeParams::new(0.0, 1.0, 0.5, true).is_schedulable());
        assert!(!TimeParams::new(0.0, 0.0, 0.5, true).is_schedulable());
        assert!(!TimeParams::new(0.0, -1.0, 0.5, true).is_schedulable());
        assert!(!TimeParams::new(0.0, 1.0, -0.5, true).is_schedulable());
        assert!(!TimeParams::new(0.0, 1.0, 0.0, true).is_schedulable());
        assert!(!TimeParams::new(f64::NAN, 1.0, 0.5, true).is_schedulable());
        assert!(!TimeParams::new(0.0, f64::INFINITY, 0.5, true).is_schedulable());
    }

    #[test]
    fn next_block_advances_time() {
        let tp = TimeParams::new(2.0, 1.0, 0.5, true).next_block();
        assert_eq!(tp.time, 2.5);
        assert_eq!(tp.window, 0.5);
    }
}
