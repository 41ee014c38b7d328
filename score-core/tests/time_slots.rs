use std::sync::Arc;

use itertools::Itertools;
use score_core::{
    primitives::{Clef, Key, Meter, Rational, Span},
    time_slots::group_time_slots,
    Project, Score, ScoreSettings, Sequence, Staff, VariableRepository, Voice,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn simple(text: &str) -> Arc<Sequence> {
    Arc::new(Sequence::simple(text, &ScoreSettings::default()).unwrap())
}

fn covered(slots: &[score_core::time_slots::TimeSlot]) -> Span {
    slots
        .iter()
        .flat_map(|slot| slot.elements.iter())
        .map(|event| event.duration())
        .sum()
}

#[test]
fn slots_cover_every_sequence() {
    init();
    let variables = VariableRepository::default();
    let sequences = [
        Sequence::composite([simple("c8( d) \\grace e16 f4."), simple("\\key g \\major s8 <g b>2 r4")]),
        Sequence::tuplet(simple("c8 d e\\> f g\\!"), Rational::new(4, 5)).unwrap(),
        Sequence::retrograde(simple("c4~ c8 \\grace d16 e8 \\clef bass f2")),
        Sequence::split([simple("c2"), simple("e4 f g a")]),
    ];
    for sequence in sequences.iter() {
        let events = sequence.elements(&variables).unwrap();
        let slots = group_time_slots(&events, 0, 0);
        assert_eq!(covered(&slots), sequence.duration(&variables).unwrap());
        assert!(slots.iter().tuple_windows().all(|(a, b)| a.time < b.time));
        assert_eq!(group_time_slots(&events, 0, 0), slots);
    }
}

#[test]
fn ids_are_stable_and_unique() {
    init();
    let staff = Staff::new(Clef::Treble, Key::default(), Meter::default())
        .with_voice(Voice::new(simple("c4 \\grace d16 e4 <f a>2")))
        .with_voice(Voice::new(simple("c2 c2")));
    let project = Project::new(Score::new(vec![staff]));
    let ids = |slots: Vec<score_core::time_slots::TimeSlot>| {
        slots
            .iter()
            .flat_map(|slot| slot.notes())
            .filter_map(|note| note.uniq.clone())
            .collect_vec()
    };
    let merged = ids(project.staff_time_slots(0).unwrap());
    assert_eq!(merged.len(), 6);
    assert_eq!(merged.iter().unique().count(), merged.len());
    assert_eq!(
        ids(project.voice_time_slots(0, 0).unwrap()),
        vec!["0-0-0", "0-0-1", "0-0-2", "0-0-3"]
    );
    assert_eq!(ids(project.voice_time_slots(0, 1).unwrap()), ids(project.voice_time_slots(0, 1).unwrap()));
}

#[test]
fn slots_serialize() {
    init();
    let staff = Staff::new(Clef::Treble, Key::default(), Meter::default())
        .with_voice(Voice::new(simple("c'8 d' \\clef bass e4")));
    let project = Project::new(Score::new(vec![staff]));
    let slots = project.voice_time_slots(0, 0).unwrap();
    let json = serde_json::to_value(&slots).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 3);
    assert_eq!(json[0]["elements"][0]["Note"]["uniq"], "0-0-0");
    assert_eq!(json[2]["states"].as_array().unwrap().len(), 1);

    let groups = serde_json::to_value(project.beam_groups(0, 0).unwrap()).unwrap();
    assert_eq!(groups[0]["beams"][0]["level"], 0);

    let states = serde_json::to_value(project.state_map().unwrap()).unwrap();
    assert_eq!(states["entries"].as_array().unwrap().len(), 2);
}
