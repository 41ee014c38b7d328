//! Named transforms a flexible sequence can apply to its arguments.
//!
//! Every function takes the resolved argument events and its extra
//! arguments (plain strings, read by the function itself):
//!
//! | name             | extra arguments            |
//! |------------------|----------------------------|
//! | `Identity`       |                            |
//! | `Relative`       | start pitch                |
//! | `Reverse`        |                            |
//! | `Repeat`         | count, optional scale      |
//! | `Grace`          |                            |
//! | `Tuplet`         | factor                     |
//! | `Transpose`      | from pitch, to pitch       |
//! | `ModalTranspose` | tonic, mode, steps         |
//! | `AddLyrics`      | syllables                  |

use std::{collections::HashMap, str::FromStr};

use log::trace;
use once_cell::sync::Lazy;

use crate::{
    error::{ScoreError, ScoreResult},
    primitives::{Absolute, Event, Interval, Key, Mode, Pitch, Rational},
};

pub type SequenceFunction = fn(Vec<Event>, &[String]) -> ScoreResult<Vec<Event>>;

static FUNCTIONS: Lazy<HashMap<&'static str, SequenceFunction>> =
    Lazy::new(|| {
        let mut table: HashMap<&'static str, SequenceFunction> = HashMap::new();
        table.insert("Identity", identity);
        table.insert("Relative", relative);
        table.insert("Reverse", reverse);
        table.insert("Repeat", repeat);
        table.insert("Grace", grace);
        table.insert("Tuplet", tuplet);
        table.insert("Transpose", transpose);
        table.insert("ModalTranspose", modal_transpose);
        table.insert("AddLyrics", add_lyrics);
        table
    });

/// Apply the function `name` to resolved events.
///
/// # Errors
///
/// [`ScoreError::MalformedInput`] for an unknown name or bad extra
/// arguments.
pub fn apply_function(
    name: &str,
    events: Vec<Event>,
    extra_args: &[String],
) -> ScoreResult<Vec<Event>> {
    let function = FUNCTIONS.get(name).ok_or_else(|| {
        ScoreError::MalformedInput(format!("unknown function: `{name}`"))
    })?;
    trace!("applying {name}{extra_args:?} to {} events", events.len());
    function(events, extra_args)
}

pub fn function_names() -> Vec<&'static str> {
    let mut names: Vec<_> = FUNCTIONS.keys().copied().collect();
    names.sort();
    names
}

fn expect_args(
    function: &str,
    extra_args: &[String],
    range: std::ops::RangeInclusive<usize>,
) -> ScoreResult<()> {
    match range.contains(&extra_args.len()) {
        true => Ok(()),
        false => Err(ScoreError::MalformedInput(format!(
            "{function} expects {range:?} extra arguments, got {}",
            extra_args.len()
        ))),
    }
}

fn parse_arg<T>(function: &str, extra_args: &[String], idx: usize) -> ScoreResult<T>
where
    T: FromStr,
{
    let arg = extra_args.get(idx).ok_or_else(|| {
        ScoreError::MalformedInput(format!("{function}: missing argument {idx}"))
    })?;
    arg.parse().map_err(|_| {
        ScoreError::MalformedInput(format!("{function}: bad argument `{arg}`"))
    })
}

fn identity(events: Vec<Event>, extra_args: &[String]) -> ScoreResult<Vec<Event>> {
    expect_args("Identity", extra_args, 0..=0)?;
    Ok(events)
}

fn reverse(events: Vec<Event>, extra_args: &[String]) -> ScoreResult<Vec<Event>> {
    expect_args("Reverse", extra_args, 0..=0)?;
    Ok(retrograde(&events).into_iter().map(|(event, _)| event).collect())
}

fn repeat(events: Vec<Event>, extra_args: &[String]) -> ScoreResult<Vec<Event>> {
    expect_args("Repeat", extra_args, 1..=2)?;
    let count: usize = parse_arg("Repeat", extra_args, 0)?;
    let events = match extra_args.len() {
        2 => {
            let scale: Rational = parse_arg("Repeat", extra_args, 1)?;
            if scale.compare(&Rational::ZERO) <= 0 {
                return Err(ScoreError::MalformedInput(format!(
                    "Repeat: scale must be positive, got {scale}"
                )));
            }
            events
                .iter()
                .map(|e| e.checked_scaled(scale))
                .collect::<ScoreResult<Vec<_>>>()?
        }
        _ => events,
    };
    Ok(std::iter::repeat(events).take(count).flatten().collect())
}

/// Notes become grace notes; spacers are dropped, as grace content takes
/// no time.
fn grace(events: Vec<Event>, extra_args: &[String]) -> ScoreResult<Vec<Event>> {
    expect_args("Grace", extra_args, 0..=0)?;
    Ok(events
        .into_iter()
        .filter(|event| !matches!(event, Event::Spacer(_)))
        .map(|mut event| {
            if let Some(note) = event.as_note_mut() {
                note.grace = true;
            }
            event
        })
        .collect())
}

fn tuplet(events: Vec<Event>, extra_args: &[String]) -> ScoreResult<Vec<Event>> {
    expect_args("Tuplet", extra_args, 1..=1)?;
    let factor: Rational = parse_arg("Tuplet", extra_args, 0)?;
    apply_tuplet(&events, factor)
}

fn transpose(events: Vec<Event>, extra_args: &[String]) -> ScoreResult<Vec<Event>> {
    expect_args("Transpose", extra_args, 2..=2)?;
    let from: Pitch = parse_arg("Transpose", extra_args, 0)?;
    let to: Pitch = parse_arg("Transpose", extra_args, 1)?;
    let interval = Interval::between(from, to);
    events
        .iter()
        .map(|e| e.try_map_pitches(|p| p.add_interval(interval)))
        .collect()
}

fn modal_transpose(
    events: Vec<Event>,
    extra_args: &[String],
) -> ScoreResult<Vec<Event>> {
    expect_args("ModalTranspose", extra_args, 3..=3)?;
    let tonic: Pitch = parse_arg("ModalTranspose", extra_args, 0)?;
    let mode = match extra_args[1].as_str() {
        "major" | "\\major" => Mode::Major,
        "minor" | "\\minor" => Mode::Minor,
        other => {
            return Err(ScoreError::MalformedInput(format!(
                "ModalTranspose: unknown mode `{other}`"
            )))
        }
    };
    let steps: i32 = parse_arg("ModalTranspose", extra_args, 2)?;
    let key = Key::from_tonic(tonic, mode);
    events
        .iter()
        .map(|e| e.try_map_pitches(|p| modal_step(p, key, steps)))
        .collect()
}

fn add_lyrics(events: Vec<Event>, extra_args: &[String]) -> ScoreResult<Vec<Event>> {
    expect_args("AddLyrics", extra_args, 1..=usize::MAX)?;
    let syllables = extra_args
        .iter()
        .flat_map(|text| text.split_whitespace())
        .map(String::from)
        .collect::<Vec<_>>();
    Ok(attach_lyrics(&events, &syllables))
}

/// Lilypond-like relative octaves: every pitch lands within a fourth of the
/// previous one, octave marks shift from there. In a chord the reference
/// moves from pitch to pitch, and the next note is relative to the first
/// pitch of the chord.
fn relative(events: Vec<Event>, extra_args: &[String]) -> ScoreResult<Vec<Event>> {
    expect_args("Relative", extra_args, 1..=1)?;
    let mut reference: Pitch = parse_arg("Relative", extra_args, 0)?;
    Ok(events
        .into_iter()
        .map(|event| match event {
            Event::Note(note) if !note.is_rest() => {
                let mut chord_reference = reference;
                let pitches = note
                    .pitches
                    .iter()
                    .enumerate()
                    .map(|(idx, pitch)| {
                        let resolved = relative_pitch(chord_reference, *pitch);
                        chord_reference = resolved;
                        if idx == 0 {
                            reference = resolved;
                        }
                        resolved
                    })
                    .collect();
                Event::Note(note.with_pitches(pitches))
            }
            other => other,
        })
        .collect())
}

fn relative_pitch(reference: Pitch, written: Pitch) -> Pitch {
    let mut steps = (written.class as i32 - reference.class as i32).rem_euclid(7);
    if steps > 3 {
        steps -= 7;
    }
    let diatonic = reference.diatonic_number() + steps + 7 * written.octave as i32;
    Pitch::from_diatonic(diatonic, written.alteration)
}

/// Move a pitch `steps` scale degrees keeping its deviation from the key.
pub fn modal_step(pitch: &Pitch, key: Key, steps: i32) -> ScoreResult<Pitch> {
    let deviation = pitch.alteration - key.alteration_for(pitch.class);
    let moved = Pitch::from_diatonic(pitch.diatonic_number() + steps, 0);
    Pitch::with_alteration(
        moved,
        (key.alteration_for(moved.class) + deviation) as i32,
    )
}

/// Multiply tuplet factors of notes; spacers and decorations are scaled to
/// keep the timing consistent. A resulting factor of 1 is dropped.
///
/// # Errors
///
/// [`ScoreError::MalformedInput`] for a factor that is not positive, and
/// [`ScoreError::InternalInvariantViolation`] when a factor or duration
/// leaves the rational range.
pub fn apply_tuplet(events: &[Event], factor: Rational) -> ScoreResult<Vec<Event>> {
    check_tuplet_factor(factor)?;
    events
        .iter()
        .map(|event| match event {
            Event::Note(note) => {
                let mut note = note.clone();
                let combined = note.tuplet.unwrap_or(Rational::ONE).checked_mul(factor)?;
                note.tuplet = match combined == Rational::ONE {
                    true => None,
                    false => Some(combined),
                };
                Ok(Event::Note(note))
            }
            Event::Spacer(_) | Event::LongDecoration(_) => event.checked_scaled(factor),
            Event::StateChange(_) => Ok(event.clone()),
        })
        .collect()
}

pub fn check_tuplet_factor(factor: Rational) -> ScoreResult<()> {
    match factor.compare(&Rational::ZERO) > 0 {
        true => Ok(()),
        false => Err(ScoreError::MalformedInput(format!(
            "tuplet factor must be positive, got {factor}"
        ))),
    }
}

/// Attach syllables to singable notes: pitched, not grace and not the
/// continuation of a tie. `_` skips a note.
pub fn attach_lyrics(events: &[Event], syllables: &[String]) -> Vec<Event> {
    let mut syllables = syllables.iter();
    let mut tied = false;
    events
        .iter()
        .map(|event| match event {
            Event::Note(note) if !note.is_rest() && !note.grace => {
                let continuation = std::mem::replace(&mut tied, note.tie);
                let mut note = note.clone();
                if !continuation {
                    match syllables.next() {
                        Some(syllable) if syllable != "_" => {
                            note.text.push(syllable.clone())
                        }
                        _ => (),
                    }
                }
                Event::Note(note)
            }
            Event::Note(note) if note.is_rest() => {
                tied = false;
                event.clone()
            }
            other => other.clone(),
        })
        .collect()
}

/// Events in reversed time order, each with its index in `events`.
///
/// Ties move to the note that now comes first. A long decoration is
/// attached to the notes it connected, now in swapped roles; without such
/// notes its span is mirrored as is.
pub fn retrograde(events: &[Event]) -> Vec<(Event, usize)> {
    let mut starts = Vec::with_capacity(events.len());
    let mut time = Absolute::ZERO;
    for event in events {
        starts.push(time);
        time += event.duration();
    }
    let end = time;
    let mirror = |idx: usize| Absolute::ZERO + (end - (starts[idx] + events[idx].duration()));
    let note_at = |time: Absolute| {
        (0..events.len()).find(|idx| {
            starts[*idx] == time && matches!(&events[*idx], Event::Note(n) if !n.grace)
        })
    };

    let mut reversed: Vec<(Absolute, Event, usize)> = (0..events.len())
        .rev()
        .filter(|idx| !matches!(events[*idx], Event::LongDecoration(_)))
        .map(|idx| (mirror(idx), events[idx].clone(), idx))
        .collect();
    for (idx, event) in events.iter().enumerate() {
        let Event::LongDecoration(decoration) = event else {
            continue;
        };
        let first = note_at(starts[idx]);
        let last = note_at(starts[idx] + decoration.length);
        let (start, length) = match (first, last) {
            (Some(first), Some(last)) => (mirror(last), mirror(first) - mirror(last)),
            _ => (
                Absolute::ZERO + (end - (starts[idx] + decoration.length)),
                decoration.length,
            ),
        };
        let mut decoration = decoration.clone();
        decoration.length = length;
        let position = reversed
            .iter()
            .position(|(t, e, _)| *t >= start && !matches!(e, Event::LongDecoration(_)))
            .unwrap_or(reversed.len());
        reversed.insert(position, (start, Event::LongDecoration(decoration), idx));
    }

    let mut output: Vec<(Event, usize)> =
        reversed.into_iter().map(|(_, event, idx)| (event, idx)).collect();
    let note_positions: Vec<usize> = output
        .iter()
        .enumerate()
        .filter(|(_, (e, _))| matches!(e, Event::Note(n) if !n.grace))
        .map(|(pos, _)| pos)
        .collect();
    let ties: Vec<bool> = note_positions
        .iter()
        .map(|pos| output[*pos].0.as_note().map(|n| n.tie).unwrap_or(false))
        .collect();
    for (nth, pos) in note_positions.iter().enumerate() {
        let tie = ties.get(nth + 1).copied().unwrap_or(false);
        if let Some(note) = output[*pos].0.as_note_mut() {
            note.tie = tie;
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::{apply_function, function_names, modal_step, retrograde};
    use crate::{
        error::ScoreError,
        notation::read_events,
        primitives::{Event, Key, Mode, Pitch, Rational, Span},
        settings::ScoreSettings,
    };

    fn events(text: &str) -> Vec<Event> {
        read_events(text, &ScoreSettings::default()).unwrap()
    }
    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }
    fn pitches(events: &[Event]) -> String {
        events
            .iter()
            .filter_map(|e| e.as_note())
            .flat_map(|n| n.pitches.iter().map(|p| p.to_string()))
            .join(" ")
    }

    #[test]
    fn table() {
        assert_eq!(function_names().len(), 9);
        assert!(matches!(
            apply_function("Nope", vec![], &[]),
            Err(ScoreError::MalformedInput(_))
        ));
        assert!(apply_function("Identity", vec![], &args(&["x"])).is_err());
        assert!(apply_function("Repeat", vec![], &args(&["two"])).is_err());
        assert!(apply_function("Tuplet", vec![], &args(&["0"])).is_err());
    }

    #[test]
    fn relative_octaves() {
        let out = apply_function("Relative", events("c d b g' <c e g> f,"), &args(&["c'"]))
            .unwrap();
        assert_eq!(pitches(&out), "c' d' b g' c'' e'' g'' f'");
    }

    #[test]
    fn transposition() {
        let out =
            apply_function("Transpose", events("c' fis'"), &args(&["c'", "es'"])).unwrap();
        assert_eq!(pitches(&out), "es' a'");
        let key = Key::from_tonic("c".parse().unwrap(), Mode::Major);
        let b: Pitch = "b".parse().unwrap();
        assert_eq!(modal_step(&b, key, 1).unwrap().to_string(), "c'");
        let out = apply_function(
            "ModalTranspose",
            events("c' d' fis'"),
            &args(&["c", "major", "2"]),
        )
        .unwrap();
        assert_eq!(pitches(&out), "e' f' ais'");
        assert!(matches!(
            apply_function("Transpose", events("c' bisis"), &args(&["c'", "cis'"])),
            Err(ScoreError::MalformedInput(_))
        ));
    }

    #[test]
    fn repeat_and_scale() {
        let out = apply_function("Repeat", events("c8 d"), &args(&["3", "2"])).unwrap();
        assert_eq!(out.len(), 6);
        let total: Span = out.iter().map(|e| e.duration()).sum();
        assert_eq!(total, Span::new(3, 2));
    }

    #[test]
    fn grace_and_tuplet() {
        let out = apply_function("Grace", events("c16 s d"), &[]).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|e| e.is_grace()));
        let out = apply_function("Tuplet", events("c8 d e"), &args(&["2/3"])).unwrap();
        let total: Span = out.iter().map(|e| e.duration()).sum();
        assert_eq!(total, Span::new(1, 4));
        assert_eq!(out[0].as_note().unwrap().tuplet, Some(Rational::new(2, 3)));
        let back = apply_function("Tuplet", out, &args(&["3/2"])).unwrap();
        assert_eq!(back[0].as_note().unwrap().tuplet, None);
    }

    #[test]
    fn tuplet_factors_out_of_range() {
        let tiny = args(&["1/4294967311"]);
        let once = apply_function("Tuplet", events("c'4 d'"), &tiny).unwrap();
        assert!(matches!(
            apply_function("Tuplet", once, &tiny),
            Err(ScoreError::InternalInvariantViolation(_))
        ));
        assert!(matches!(
            apply_function("Repeat", events("c'2."), &args(&["2", "9223372036854775807"])),
            Err(ScoreError::InternalInvariantViolation(_))
        ));
    }

    #[test]
    fn lyrics_skip_ties_and_rests() {
        let out = apply_function(
            "AddLyrics",
            events("c4~ c d r \\grace f16 e4 g"),
            &args(&["la li _"]),
        )
        .unwrap();
        let texts = out
            .iter()
            .filter_map(|e| e.as_note())
            .map(|n| n.text.join(""))
            .collect_vec();
        assert_eq!(texts, vec!["la", "", "li", "", "", "", ""]);
    }

    #[test]
    fn retrograde_moves_ties_and_decorations() {
        let source = events("c4~( c d8 e)");
        let reversed = retrograde(&source);
        let order = reversed.iter().map(|(_, idx)| *idx).collect_vec();
        assert_eq!(order, vec![0, 4, 3, 2, 1]);
        match &reversed[0].0 {
            // from `e` (now first) to the first `c` (now at 1/2)
            Event::LongDecoration(slur) => assert_eq!(slur.length, Span::new(1, 2)),
            other => panic!("unexpected {other:?}"),
        }
        let ties = reversed
            .iter()
            .filter_map(|(e, _)| e.as_note())
            .map(|n| n.tie)
            .collect_vec();
        assert_eq!(ties, vec![false, false, true, false]);
    }
}
