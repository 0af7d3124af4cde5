use serde::Serialize;
use stepgrid_engine::{
    EngineConfig, HostTimePosition, MidiEvent, SequencerProcessor, StateHandle, TimePositionCalc,
    STEPS_PER_BAR,
};
use stepgrid_model::State;
use tracing::debug;

/// A note held from one step to another during the render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerSpec {
    pub note: u8,
    pub velocity: u8,
    pub start_step: f64,
    pub end_step: f64,
}

/// Parses `NOTE[:VELOCITY]@START..END`, with positions in steps.
pub fn parse_trigger(text: &str) -> Result<TriggerSpec, String> {
    let (note_part, span) = text
        .split_once('@')
        .ok_or_else(|| format!("`{text}` is missing `@START..END`"))?;
    let (note, velocity) = match note_part.split_once(':') {
        Some((note, velocity)) => (note, Some(velocity)),
        None => (note_part, None),
    };
    let note: u8 = note
        .trim()
        .parse()
        .map_err(|_| format!("invalid note `{note}`"))?;
    if note > 127 {
        return Err(format!("note {note} is above 127"));
    }
    let velocity: u8 = match velocity {
        Some(velocity) => velocity
            .trim()
            .parse()
            .map_err(|_| format!("invalid velocity `{velocity}`"))?,
        None => 127,
    };
    if !(1..=127).contains(&velocity) {
        return Err(format!("velocity {velocity} must be within 1..=127"));
    }
    let (start, end) = span
        .split_once("..")
        .ok_or_else(|| format!("`{span}` is not a START..END step range"))?;
    let start_step: f64 = start
        .trim()
        .parse()
        .map_err(|_| format!("invalid start step `{start}`"))?;
    let end_step: f64 = end
        .trim()
        .parse()
        .map_err(|_| format!("invalid end step `{end}`"))?;
    if !(start_step.is_finite() && end_step.is_finite() && 0.0 <= start_step && start_step < end_step) {
        return Err(format!("step range {start_step}..{end_step} is empty or negative"));
    }
    Ok(TriggerSpec {
        note,
        velocity,
        start_step,
        end_step,
    })
}

#[derive(Debug, Clone, Copy)]
pub struct RenderSettings {
    pub beats_per_minute: f64,
    pub sample_rate: f64,
    pub block_frames: u32,
    pub bars: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            beats_per_minute: 120.0,
            sample_rate: 48_000.0,
            block_frames: 512,
            bars: 1,
        }
    }
}

/// One emitted MIDI message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RenderedEvent {
    /// Sample position from the start of the render.
    pub sample: u64,
    /// Offset inside the block that produced it.
    pub frame: u32,
    pub status: u8,
    pub note: u8,
    pub velocity: u8,
}

impl RenderedEvent {
    fn new(block_start: u64, event: &MidiEvent) -> Self {
        let [status, note, velocity] = event.data;
        Self {
            sample: block_start + u64::from(event.frame),
            frame: event.frame,
            status,
            note,
            velocity,
        }
    }

    pub fn is_note_on(&self) -> bool {
        self.status & 0xf0 == 0x90 && self.velocity > 0
    }
}

/// Plays `state` for the configured number of bars with a running
/// transport, feeding `triggers` as note input. The transport is stopped at
/// the end so every sounding note gets its note-off.
pub fn render(
    state: State,
    triggers: &[TriggerSpec],
    settings: &RenderSettings,
    config: &EngineConfig,
) -> Vec<RenderedEvent> {
    let mut processor = SequencerProcessor::new(config, StateHandle::new(state));
    let transport = HostTimePosition::stopped(settings.beats_per_minute).with_playing(true);
    let calc = TimePositionCalc::new(transport, settings.sample_rate);
    let frames_per_tick = calc.frames_per_tick();
    let frames_per_step = calc.sixteenth_note_duration_in_ticks() * frames_per_tick;
    let step_to_frame = |step: f64| (step * frames_per_step).round() as u64;
    let total_frames = step_to_frame(f64::from(settings.bars) * STEPS_PER_BAR);
    let block_frames = settings.block_frames.max(1);
    debug!(total_frames, frames_per_step, "rendering");

    let mut rendered = Vec::new();
    let mut midi_in = Vec::new();
    let mut out = Vec::new();
    let mut block_start = 0u64;
    while block_start < total_frames {
        let frames = (total_frames - block_start).min(u64::from(block_frames)) as u32;
        let block_end = block_start + u64::from(frames);
        midi_in.clear();
        for trigger in triggers {
            let on = step_to_frame(trigger.start_step);
            if (block_start..block_end).contains(&on) {
                let frame = (on - block_start) as u32;
                midi_in.push(MidiEvent::note_on(frame, 0, trigger.note, trigger.velocity));
            }
            let off = step_to_frame(trigger.end_step);
            if (block_start..block_end).contains(&off) {
                let frame = (off - block_start) as u32;
                midi_in.push(MidiEvent::note_off(frame, 0, trigger.note));
            }
        }
        midi_in.sort_by_key(|event| event.frame);

        let position = transport.at_tick(block_start as f64 / frames_per_tick);
        out.clear();
        processor.process(&position, settings.sample_rate, frames, &midi_in, &mut out);
        rendered.extend(out.iter().map(|event| RenderedEvent::new(block_start, event)));
        block_start = block_end;
    }

    let stopped = transport
        .at_tick(total_frames as f64 / frames_per_tick)
        .with_playing(false);
    out.clear();
    processor.process(&stopped, settings.sample_rate, 1, &[], &mut out);
    rendered.extend(out.iter().map(|event| RenderedEvent::new(total_frames, event)));
    rendered
}

/// A state with `patterns` patterns; the first holds a four-on-the-floor
/// kick with offbeat hats and is selected.
pub fn starter_state(patterns: usize) -> State {
    use stepgrid_model::{midi_note_to_row, GridPos};

    const KICK: u8 = 36;
    const CLOSED_HAT: u8 = 42;

    let mut state = State::new();
    for index in 0..patterns {
        let pattern = state.create_pattern();
        pattern.resize_width(16);
        if index == 0 {
            for beat in 0..4 {
                let x = beat * 4;
                pattern.set_velocity(GridPos::new(x, midi_note_to_row(KICK) as i32), 120);
                pattern.set_velocity(GridPos::new(x + 2, midi_note_to_row(CLOSED_HAT) as i32), 90);
            }
            pattern.move_cursor_to_lowest_note();
        }
    }
    let first = state.patterns().first().map(|pattern| pattern.id());
    state.set_selected_id(first);
    state
}
