//! Host transport to engine time.
//!
//! The engine counts in host ticks. A step is one sixteenth of a bar, so a
//! bar always holds sixteen steps whatever the time signature.

use serde::{Deserialize, Serialize};

use crate::time::TimeParams;

pub const DEFAULT_TICKS_PER_BEAT: f64 = 1920.0;
pub const STEPS_PER_BAR: f64 = 16.0;

/// Bar/beat/tick transport as reported by the host. Bars and beats count
/// from 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HostTimePosition {
    pub playing: bool,
    pub bar: i32,
    pub beat: i32,
    pub tick: f64,
    pub ticks_per_beat: f64,
    pub beats_per_bar: f64,
    pub beats_per_minute: f64,
}

impl Default for HostTimePosition {
    fn default() -> Self {
        Self::stopped(120.0)
    }
}

impl HostTimePosition {
    /// A stopped 4/4 transport at the top of bar 1.
    pub fn stopped(beats_per_minute: f64) -> Self {
        Self {
            playing: false,
            bar: 1,
            beat: 1,
            tick: 0.0,
            ticks_per_beat: DEFAULT_TICKS_PER_BEAT,
            beats_per_bar: 4.0,
            beats_per_minute,
        }
    }

    pub fn with_playing(mut self, playing: bool) -> Self {
        self.playing = playing;
        self
    }

    /// Position `global_tick` ticks after the start of bar 1, keeping the
    /// tempo and signature.
    pub fn at_tick(&self, global_tick: f64) -> Self {
        if !(self.ticks_per_beat > 0.0 && self.beats_per_bar > 0.0) {
            return *self;
        }
        let global_beat = (global_tick / self.ticks_per_beat).max(0.0);
        let bars = (global_beat / self.beats_per_bar).floor();
        let beat_in_bar = (global_beat - bars * self.beats_per_bar).floor();
        Self {
            bar: bars as i32 + 1,
            beat: beat_in_bar as i32 + 1,
            tick: (global_beat - global_beat.floor()) * self.ticks_per_beat,
            ..*self
        }
    }
}

/// Derived timing for one block at a given sample rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimePositionCalc {
    pub position: HostTimePosition,
    pub sample_rate: f64,
}

impl TimePositionCalc {
    pub fn new(position: HostTimePosition, sample_rate: f64) -> Self {
        Self {
            position,
            sample_rate,
        }
    }

    pub fn beats_per_second(&self) -> f64 {
        self.position.beats_per_minute / 60.0
    }

    pub fn global_beat(&self) -> f64 {
        let p = &self.position;
        f64::from(p.bar - 1) * p.beats_per_bar + f64::from(p.beat - 1) + p.tick / p.ticks_per_beat
    }

    pub fn global_tick(&self) -> f64 {
        self.global_beat() * self.position.ticks_per_beat
    }

    pub fn ticks_per_second(&self) -> f64 {
        self.beats_per_second() * self.position.ticks_per_beat
    }

    pub fn frames_per_tick(&self) -> f64 {
        self.sample_rate / self.ticks_per_second()
    }

    pub fn sixteenth_note_duration_in_ticks(&self) -> f64 {
        self.ticks_per_second() / (STEPS_PER_BAR / self.position.beats_per_bar * self.beats_per_second())
    }

    /// Engine time for a block of `frames` frames starting at the position.
    pub fn time_params(&self, frames: u32) -> TimeParams {
        TimeParams {
            time: self.global_tick(),
            step_duration: self.sixteenth_note_duration_in_ticks(),
            window: f64::from(frames) / self.frames_per_tick(),
            playing: self.position.playing,
        }
    }

    /// Absolute engine time of a frame inside the block.
    pub fn frame_to_time(&self, frame: u32) -> f64 {
        self.global_tick() + f64::from(frame) / self.frames_per_tick()
    }

    /// Frame inside a block of `frames` frames for an offset from its start.
    pub fn offset_to_frame(&self, offset: f64, frames: u32) -> u32 {
        let frame = (offset * self.frames_per_tick()).round();
        if !frame.is_finite() || frame <= 0.0 {
            return 0;
        }
        (frame as u32).min(frames.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calc(bpm: f64) -> TimePositionCalc {
        TimePositionCalc::new(HostTimePosition::stopped(bpm).with_playing(true), 48_000.0)
    }

    #[test]
    fn derived_rates_at_120_bpm() {
        let calc = calc(120.0);
        assert_eq!(calc.ticks_per_second(), 3840.0);
        assert_eq!(calc.frames_per_tick(), 12.5);
        assert_eq!(calc.sixteenth_note_duration_in_ticks(), 480.0);
        let tp = calc.time_params(500);
        assert_eq!(tp.time, 0.0);
        assert_eq!(tp.window, 40.0);
        assert_eq!(tp.step_duration, 480.0);
        assert!(tp.playing);
    }

    #[test]
    fn global_position_counts_from_bar_one() {
        let mut position = HostTimePosition::stopped(120.0);
        position.bar = 3;
        position.beat = 2;
        position.tick = 960.0;
        let calc = TimePositionCalc::new(position, 48_000.0);
        assert_eq!(calc.global_beat(), 9.5);
        assert_eq!(calc.global_tick(), 9.5 * 1920.0);
        assert_eq!(calc.frame_to_time(25), 9.5 * 1920.0 + 2.0);
    }

    #[test]
    fn at_tick_inverts_global_tick() {
        let start = HostTimePosition::stopped(100.0);
        let moved = start.at_tick(9.5 * 1920.0);
        assert_eq!((moved.bar, moved.beat, moved.tick), (3, 2, 960.0));
        let calc = TimePositionCalc::new(moved, 44_100.0);
        assert_eq!(calc.global_tick(), 9.5 * 1920.0);
    }

    #[test]
    fn three_four_still_has_sixteen_steps_per_bar() {
        let mut position = HostTimePosition::stopped(120.0);
        position.beats_per_bar = 3.0;
        let calc = TimePositionCalc::new(position, 48_000.0);
        let bar_ticks = 3.0 * position.ticks_per_beat;
        assert!((calc.sixteenth_note_duration_in_ticks() * 16.0 - bar_ticks).abs() < 1e-9);
    }

    #[test]
    fn offsets_clamp_into_the_block() {
        let calc = calc(120.0);
        assert_eq!(calc.offset_to_frame(4.0, 512), 50);
        assert_eq!(calc.offset_to_frame(-3.0, 512), 0);
        assert_eq!(calc.offset_to_frame(1_000.0, 512), 511);
        assert_eq!(calc.offset_to_frame(1.0, 0), 0);
    }

    #[test]
    fn zero_tempo_is_not_schedulable() {
        let tp = calc(0.0).time_params(512);
        assert!(!tp.is_schedulable());
        assert_eq!(calc(0.0).offset_to_frame(4.0, 512), 0);
    }
}
