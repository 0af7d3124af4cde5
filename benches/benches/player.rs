use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use stepgrid_engine::{
    EngineConfig, HostTimePosition, MidiEvent, OutputEvent, Player, SequencerProcessor,
    StateHandle, TimeParams,
};
use stepgrid_model::{GridPos, Note, State};

/// Eight full 32-step patterns sharing overlapping trigger ranges.
fn dense_state() -> State {
    let mut state = State::new();
    for index in 0..8 {
        let pattern = state.create_pattern();
        pattern.set_note_trigger_range(48, 71);
        for x in 0..32 {
            for y in (0..128).step_by(9) {
                if (x + y + index) % 3 == 0 {
                    pattern.set_velocity(GridPos::new(x, y), 100);
                }
            }
        }
    }
    state
}

fn player_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("player");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(30);

    group.bench_function("24_triggers_block512", |b| {
        let state = dense_state();
        let mut player = Player::default();
        let mut tp = TimeParams::new(0.0, 480.0, 40.96, true);
        for note in 48..72 {
            player.start_note_triggered(&state, Note::new(note, 0), 110, 0.0, &tp);
        }
        let mut events: Vec<OutputEvent> = Vec::with_capacity(EngineConfig::default().event_capacity);

        b.iter(|| {
            events.clear();
            player.run(&mut events, &state, &tp);
            tp = tp.next_block();
        });
    });

    group.bench_function("processor_block64", |b| {
        let mut processor =
            SequencerProcessor::new(&EngineConfig::default(), StateHandle::new(dense_state()));
        let position = HostTimePosition::stopped(140.0).with_playing(true);
        let midi: Vec<MidiEvent> = (48..60)
            .map(|note| MidiEvent::note_on(0, 0, note, 100))
            .collect();
        let mut out = Vec::with_capacity(512);
        let mut tick = 0.0;

        b.iter(|| {
            out.clear();
            let block = position.at_tick(tick);
            processor.process(&block, 48_000.0, 64, &midi, &mut out);
            tick += 64.0 / 48_000.0 * 140.0 / 60.0 * 1920.0;
        });
    });

    group.finish();
}

criterion_group!(benches, player_run);
criterion_main!(benches);
