//! Beam groups of a voice.
//!
//! Notes are collected into a group while they have beams. Every beam level
//! is a sub-group opened at the note which first needs it and closed at the
//! last note still having it. A group is flushed by a rest, a spacer, a note
//! without beams, or by a beat boundary with a note exactly on it. Beats
//! without a note on them are bridged, so tuplets may straddle them.
//!
//! Grace notes are beamed by their own accumulator, which knows nothing of
//! beats and is flushed by the next regular element.

use log::trace;
use serde::Serialize;

use crate::{
    error::{ScoreError, ScoreResult},
    primitives::{get_undotted_value, Absolute, Event, Note},
    time_slots::TimeSlot,
};

/// One horizontal stroke. A stub has only one end: `to_index: None` points
/// right from the first note of a group, `from_index: None` points left.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub struct Beam {
    pub from_index: Option<usize>,
    pub to_index: Option<usize>,
    /// 0 is the primary beam.
    pub level: usize,
}

#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct BeamGroup {
    pub notes: Vec<Note>,
    /// Ordered by level, then by position.
    pub beams: Vec<Beam>,
    pub grace: bool,
}

/// Number of beams of a note value: 8th → 1 ... 128th → 5.
pub fn beam_count(note: &Note) -> ScoreResult<usize> {
    let undotted = get_undotted_value(note.duration)?.get();
    if undotted.numerator() != 1 {
        return Ok(0);
    }
    match undotted.denominator() {
        1 | 2 | 4 => Ok(0),
        8 => Ok(1),
        16 => Ok(2),
        32 => Ok(3),
        64 => Ok(4),
        128 => Ok(5),
        other => Err(ScoreError::InternalInvariantViolation(format!(
            "no beam count for note value 1/{other}"
        ))),
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    grace: bool,
    notes: Vec<Note>,
    beams: Vec<Beam>,
    /// Start index of every open level.
    open: Vec<usize>,
}
impl Accumulator {
    fn new(grace: bool) -> Self {
        Self {
            grace,
            ..Default::default()
        }
    }

    fn push(&mut self, note: Note, count: usize) -> ScoreResult<()> {
        let index = self.notes.len();
        if index > 0 {
            while self.open.len() > count {
                self.close_level(index - 1)?;
            }
        }
        while self.open.len() < count {
            self.open.push(index);
        }
        self.notes.push(note);
        Ok(())
    }

    fn close_level(&mut self, end: usize) -> ScoreResult<()> {
        let level = self.open.len().checked_sub(1).ok_or_else(|| {
            ScoreError::InternalInvariantViolation(
                "beam level stack underflow".to_string(),
            )
        })?;
        let start = self.open.pop().unwrap_or_default();
        let beam = match (start == end, start == 0) {
            (false, _) => Beam {
                from_index: Some(start),
                to_index: Some(end),
                level,
            },
            (true, true) => Beam {
                from_index: Some(start),
                to_index: None,
                level,
            },
            (true, false) => Beam {
                from_index: None,
                to_index: Some(start),
                level,
            },
        };
        self.beams.push(beam);
        Ok(())
    }

    /// Close every level; groups of less than two notes are dropped.
    fn flush(&mut self, output: &mut Vec<BeamGroup>) -> ScoreResult<()> {
        if let Some(end) = self.notes.len().checked_sub(1) {
            while !self.open.is_empty() {
                self.close_level(end)?;
            }
        }
        let grace = self.grace;
        let mut group = std::mem::replace(self, Self::new(grace));
        if group.notes.len() < 2 {
            return Ok(());
        }
        group
            .beams
            .sort_by_key(|b| (b.level, b.from_index.or(b.to_index)));
        trace!(
            "beam group of {} notes, {} beams",
            group.notes.len(),
            group.beams.len()
        );
        output.push(BeamGroup {
            notes: group.notes,
            beams: group.beams,
            grace: group.grace,
        });
        Ok(())
    }
}

/// Beam groups of a voice.
///
/// `beats` is an infinite iterator of beat times starting at 0, as given by
/// [`MeterMap::beats`](crate::primitives::MeterMap::beats).
pub fn beam_groups(
    events: &[Event],
    beats: impl Iterator<Item = Absolute>,
) -> ScoreResult<Vec<BeamGroup>> {
    let mut beats = beats.peekable();
    let mut output = Vec::new();
    let mut regular = Accumulator::new(false);
    let mut grace = Accumulator::new(true);
    let mut time = Absolute::ZERO;
    for event in events {
        match event {
            Event::Note(note) if note.grace => match beam_count(note)? {
                0 => grace.flush(&mut output)?,
                count => grace.push(note.clone(), count)?,
            },
            Event::Note(note) => {
                grace.flush(&mut output)?;
                while beats.next_if(|beat| *beat < time).is_some() {}
                if beats.next_if_eq(&time).is_some() {
                    regular.flush(&mut output)?;
                }
                match (note.is_rest(), beam_count(note)?) {
                    (true, _) | (_, 0) => regular.flush(&mut output)?,
                    (false, count) => regular.push(note.clone(), count)?,
                }
            }
            Event::Spacer(_) => {
                grace.flush(&mut output)?;
                regular.flush(&mut output)?;
            }
            Event::StateChange(_) | Event::LongDecoration(_) => (),
        }
        time += event.duration();
    }
    grace.flush(&mut output)?;
    regular.flush(&mut output)?;
    Ok(output)
}

/// Beam groups of a voice grouped into time slots.
pub fn beam_slots(
    slots: &[TimeSlot],
    beats: impl Iterator<Item = Absolute>,
) -> ScoreResult<Vec<BeamGroup>> {
    let events: Vec<Event> = slots
        .iter()
        .flat_map(|slot| slot.elements.iter().cloned())
        .collect();
    beam_groups(&events, beats)
}

#[cfg(test)]
mod tests {
    use super::{beam_count, beam_groups, Beam};
    use crate::{
        error::ScoreError,
        notation::read_events,
        primitives::{Meter, MeterMap, Note, Span},
        settings::ScoreSettings,
    };

    fn groups(text: &str, meter: Meter) -> Vec<super::BeamGroup> {
        let events = read_events(text, &ScoreSettings::default()).unwrap();
        beam_groups(&events, MeterMap::new(meter).beats()).unwrap()
    }

    #[test]
    fn counts() {
        let note = |n, d| Note::new(vec![], Span::new(n, d));
        assert_eq!(beam_count(&note(1, 4)).unwrap(), 0);
        assert_eq!(beam_count(&note(3, 16)).unwrap(), 1);
        assert_eq!(beam_count(&note(1, 128)).unwrap(), 5);
        assert_eq!(beam_count(&note(2, 1)).unwrap(), 0);
        assert!(matches!(
            beam_count(&note(1, 256)),
            Err(ScoreError::InternalInvariantViolation(_))
        ));
    }

    #[test]
    fn stubs_point_away_from_group_ends() {
        let groups = groups("c8 c16 c16 c8. c16 c16 c8 c16", Meter::new(1, 4));
        assert_eq!(groups[1].beams[1], Beam {
            from_index: None,
            to_index: Some(1),
            level: 1,
        });
        assert_eq!(
            groups[2].beams,
            vec![
                Beam {
                    from_index: Some(0),
                    to_index: Some(2),
                    level: 0,
                },
                Beam {
                    from_index: Some(0),
                    to_index: None,
                    level: 1,
                },
                Beam {
                    from_index: None,
                    to_index: Some(2),
                    level: 1,
                },
            ]
        );
    }

    #[test]
    fn tuplets_bridge_beats_without_notes() {
        // 3 eighths in the time of 2 cross the beat at 1/4 between notes
        let events = read_events("c8 d e", &ScoreSettings::default()).unwrap();
        let events = crate::sequence::functions::apply_tuplet(
            &events,
            crate::primitives::Rational::new(2, 3),
        )
        .unwrap();
        let groups = beam_groups(&events, MeterMap::new(Meter::new(1, 8)).beats()).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].notes.len(), 3);
    }

    #[test]
    fn graces_are_beamed_apart() {
        let groups = groups(
            "c8 \\grace d16 \\grace e16 f8 \\grace g16 r4",
            Meter::new(4, 4),
        );
        assert_eq!(groups.len(), 2);
        assert!(groups[0].grace);
        assert_eq!(groups[0].notes.len(), 2);
        assert!(!groups[1].grace);
        assert_eq!(groups[1].notes.len(), 2);
    }

    #[test]
    fn rests_and_spacers_break_groups() {
        let groups = groups("c8 d r e f s g a", Meter::new(1, 1));
        assert_eq!(groups.len(), 3);
        assert!(groups
            .iter()
            .all(|g| g.notes.iter().all(|n| !n.is_rest())));
    }
}
