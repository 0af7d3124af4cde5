use proptest::prelude::*;
use stepgrid_model::{Cell, GridPos, Pattern, PatternDocument, State, StateError, PATTERN_HEIGHT};

fn sample_state() -> State {
    let mut state = State::new();
    let a = state.create_pattern().id();
    let b = state.create_pattern().id();
    state.set_selected_id(Some(a));
    state.play_selected = true;

    let pattern = state.get_pattern_mut(a).unwrap();
    pattern.set_velocity(GridPos::new(0, 1), 100);
    pattern.set_speed(0.5);
    pattern.set_default_velocity(80);
    pattern.set_cursor(GridPos::new(3, 4));

    let pattern = state.get_pattern_mut(b).unwrap();
    pattern.resize_width(12);
    pattern.set_velocity(GridPos::new(2, 3), 99);
    pattern.set_length(GridPos::new(2, 3), 3);
    pattern.set_velocity(GridPos::new(5, 6), 103);
    pattern.set_selected(GridPos::new(5, 6), true);
    state
}

#[test]
fn json_round_trip_preserves_everything() {
    let state = sample_state();
    let json = state.to_json_string().unwrap();
    let loaded = State::from_json_str(&json).unwrap();

    assert_eq!(loaded.selected_id(), state.selected_id());
    assert_eq!(loaded.play_selected, state.play_selected);
    assert_eq!(loaded.to_document(), state.to_document());

    let b = loaded.patterns()[1].id();
    let pattern = loaded.get_pattern(b).unwrap();
    assert_eq!(pattern.width(), 12);
    assert_eq!(pattern.get_length(GridPos::new(2, 3)), 3);
    assert!(pattern.is_extension_of_tied(GridPos::new(4, 3)));
    assert!(pattern.get_selected(GridPos::new(5, 6)));

    let a = loaded.patterns()[0].id();
    let pattern = loaded.get_pattern(a).unwrap();
    assert_eq!(pattern.speed(), 0.5);
    assert_eq!(pattern.default_velocity(), 80);
    assert_eq!(pattern.cursor(), GridPos::new(3, 4));
}

#[test]
fn file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    assert!(State::read_from_file(&path).unwrap().is_none());

    let state = sample_state();
    state.write_to_file(&path).unwrap();
    let loaded = State::read_from_file(&path).unwrap().expect("state file");
    assert_eq!(loaded.to_document(), state.to_document());
}

#[test]
fn garbage_is_rejected() {
    assert!(matches!(
        State::from_json_str("{ not json"),
        Err(StateError::Json(_))
    ));
    assert!(matches!(
        State::from_json_str(
            r#"{"patterns":[{"id":1,"width":4,"first_note":0,"last_note":3},
                            {"id":1,"width":4,"first_note":0,"last_note":3}]}"#
        ),
        Err(StateError::Invalid(_))
    ));
}

fn cell_strategy(width: usize) -> impl Strategy<Value = Cell> {
    (
        0..width as i32,
        0..PATTERN_HEIGHT as i32,
        1u8..=127,
        any::<bool>(),
        1u32..4,
    )
        .prop_map(|(x, y, velocity, selected, length)| {
            Cell::new(GridPos::new(x, y), velocity)
                .with_selected(selected)
                .with_length(length)
        })
}

fn pattern_strategy() -> impl Strategy<Value = Pattern> {
    (1usize..=32, 0u8..=127, 0u8..=127, 1u32..8, 1u8..=127).prop_flat_map(
        |(width, a, b, speed_quarters, default_velocity)| {
            prop::collection::vec(cell_strategy(width), 0..24).prop_map(move |cells| {
                let mut pattern = Pattern::with_width(7, width);
                pattern.set_note_trigger_range(a.min(b), a.max(b));
                pattern.set_speed(speed_quarters as f64 * 0.25);
                pattern.set_default_velocity(default_velocity);
                pattern.put_cells(&cells, GridPos::default());
                pattern
            })
        },
    )
}

proptest! {
    #[test]
    fn arbitrary_patterns_round_trip(pattern in pattern_strategy()) {
        let doc = PatternDocument::from(&pattern);
        let restored = Pattern::try_from(&doc).unwrap();
        prop_assert_eq!(PatternDocument::from(&restored), doc);
        for x in 0..pattern.width() as i32 {
            for y in 0..PATTERN_HEIGHT as i32 {
                let pos = GridPos::new(x, y);
                prop_assert_eq!(restored.get_velocity(pos), pattern.get_velocity(pos));
                prop_assert_eq!(restored.get_length(pos), pattern.get_length(pos));
                prop_assert_eq!(restored.is_extension_of_tied(pos), pattern.is_extension_of_tied(pos));
                prop_assert_eq!(restored.get_selected(pos), pattern.get_selected(pos));
            }
        }
    }
}
