use std::sync::Arc;

use itertools::Itertools;
use score_core::{
    accidentals::AccidentalManager,
    primitives::{Clef, Key, Meter, Mode, Pitch},
    Project, Score, ScoreSettings, Sequence, Staff, Voice,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn pitches(text: &str) -> Vec<Pitch> {
    text.split_whitespace().map(|p| p.parse().unwrap()).collect()
}

#[test]
fn e_flat_major_in_one_bar() {
    init();
    let e_flat = Key::from_tonic("es".parse().unwrap(), Mode::Major);
    assert_eq!(e_flat, Key::new(-3, Mode::Major));
    let mut manager = AccidentalManager::new(e_flat);
    let shown = pitches("c' c' cis' cis' c")
        .iter()
        .map(|p| manager.get_accidental(p))
        .collect_vec();
    assert_eq!(shown, vec![None, None, Some(1), None, Some(0)]);

    manager.new_bar();
    let shown = pitches("cis' as' a'")
        .iter()
        .map(|p| manager.get_accidental(p))
        .collect_vec();
    assert_eq!(shown, vec![Some(1), None, Some(0)]);
}

#[test]
fn bars_and_key_changes_of_a_staff() {
    init();
    let settings = ScoreSettings::default();
    let upper = Sequence::simple("bes'2 b' bes' b' \\key f \\major bes'1", &settings).unwrap();
    let lower = Sequence::simple("r1 r1 \\clef bass bes,1", &settings).unwrap();
    let staff = Staff::new(Clef::Treble, Key::default(), Meter::new(4, 4))
        .with_voice(Voice::new(Arc::new(upper)))
        .with_voice(Voice::new(Arc::new(lower)));
    let project = Project::new(Score::new(vec![staff]));

    let upper = project.accidentals(0, 0).unwrap();
    assert_eq!(upper["0-0-0"], vec![Some(-1)]);
    assert_eq!(upper["0-0-1"], vec![Some(0)]);
    assert_eq!(upper["0-0-2"], vec![Some(-1)]);
    assert_eq!(upper["0-0-3"], vec![Some(0)]);
    assert_eq!(upper["0-0-5"], vec![None]);

    // the key change of the upper voice applies to the lower one
    let lower = project.accidentals(0, 1).unwrap();
    assert_eq!(lower["0-1-3"], vec![None]);
    assert!(!lower.contains_key("0-1-2"));
}
