use std::sync::Arc;

use score_core::{
    notation::read_events,
    optics::{voice_lens, ElementIndex, ElementLens, InsertionPoint, Lens},
    primitives::{Absolute, Clef, Direction, Event, Key, Meter, Rational},
    Project, Score, ScoreSettings, Sequence, Staff, VariableRepository, Voice,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn events(text: &str) -> Vec<Event> {
    read_events(text, &ScoreSettings::default()).unwrap()
}

fn flexible(text: &str) -> Arc<Sequence> {
    Arc::new(Sequence::flexible(text, &ScoreSettings::default()).unwrap())
}

/// Two staves sharing the variable `theme`; the lower one plays it as a
/// triplet.
fn project() -> Project {
    let theme = Arc::new(Sequence::simple("c'8 d' e'", &ScoreSettings::default()).unwrap());
    let variables = VariableRepository::default().with_variable("theme", theme);
    let upper = Staff::new(Clef::Treble, Key::default(), Meter::new(3, 8))
        .with_voice(Voice::new(flexible("$theme f'4.")));
    let lower = Staff::new(Clef::Bass, Key::default(), Meter::new(3, 8)).with_voice(
        Voice::new(Arc::new(Sequence::tuplet(flexible("$theme"), Rational::new(2, 3)).unwrap()))
            .with_direction(Direction::Down),
    );
    Project::new(Score::new(vec![upper, lower])).with_variables(variables)
}

#[test]
fn addressing() {
    init();
    let project = project();
    let at = |staff, n, d| InsertionPoint::new(staff, 0, Absolute::new(n, d));
    assert_eq!(at(0, 1, 8).element_index(&project).unwrap(), ElementIndex::At(1));
    assert_eq!(at(0, 1, 16).element_index(&project).unwrap(), ElementIndex::Before(1));
    assert_eq!(at(1, 1, 12).element_index(&project).unwrap(), ElementIndex::At(1));
    assert_eq!(at(1, 1, 4).element_index(&project).unwrap(), ElementIndex::Before(3));
    assert!(InsertionPoint::new(0, 2, Absolute::ZERO)
        .element_index(&project)
        .is_err());
}

#[test]
fn edits_propagate_through_variables() {
    init();
    let project = project();
    let lens = ElementLens::new(InsertionPoint::new(1, 0, Absolute::new(1, 6)));
    let shown = lens.get(&project).unwrap().unwrap();
    assert_eq!(shown.as_note().unwrap().tuplet, Some(Rational::new(2, 3)));

    let edited = lens
        .over(&project, |event| {
            event.map(|e| e.map_pitches(|_| "g'".parse().unwrap()))
        })
        .unwrap();
    assert_eq!(
        edited.variables.get("theme").unwrap().elements(&edited.variables).unwrap(),
        events("c'8 d' g'")
    );
    assert_eq!(edited.voice_events(0, 0).unwrap(), events("c'8 d' g' f'4."));
    let lower = edited.voice_events(1, 0).unwrap();
    assert_eq!(lower[2].as_note().unwrap().tuplet, Some(Rational::new(2, 3)));
    assert_eq!(lower[2].as_note().unwrap().direction, Some(Direction::Down));

    // the old snapshot is untouched
    assert_eq!(project.voice_events(0, 0).unwrap(), events("c'8 d' e' f'4."));
}

#[test]
fn deletion_and_voice_replacement() {
    init();
    let project = project();
    let lens = ElementLens::new(InsertionPoint::new(0, 0, Absolute::new(3, 8)));
    let edited = lens.set(&project, None).unwrap();
    assert_eq!(edited.voice_events(0, 0).unwrap(), events("c'8 d' e'"));
    assert_eq!(edited.variables, project.variables);

    let voice = voice_lens(1, 0)
        .over(&project, |voice| Voice {
            content: Arc::new(Sequence::retrograde(voice.content)),
            ..voice
        })
        .unwrap();
    let retro = voice.voice_events(1, 0).unwrap();
    let pitches = retro
        .iter()
        .map(|e| e.as_note().unwrap().pitches[0].to_string())
        .collect::<Vec<_>>();
    assert_eq!(pitches, vec!["e'", "d'", "c'"]);
}
