//! A smallest piece of music, that is held by a sequence.
//!
//! [`Event`] is a closed sum type; consumers match on it exhaustively.
use std::{fmt, str::FromStr};

use derivative::Derivative;
use serde::{Deserialize, Serialize};

use crate::error::{ScoreError, ScoreResult};

use super::{Clef, Key, Meter, Pitch, Rational, Span};

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum Event {
    Note(Note),
    Spacer(Spacer),
    StateChange(StateChange),
    LongDecoration(LongDecoration),
}
impl Event {
    /// Time the event occupies in its voice.
    pub fn duration(&self) -> Span {
        match self {
            Self::Note(note) => note.effective_duration(),
            Self::Spacer(spacer) => spacer.duration,
            Self::StateChange(_) | Self::LongDecoration(_) => Span::ZERO,
        }
    }

    /// Augmentation (factor > 1) or diminution (factor < 1).
    ///
    /// State changes are left as they are.
    pub fn scaled(&self, factor: Rational) -> Self {
        match self {
            Self::Note(note) => Self::Note(Note {
                duration: note.duration.scaled(factor),
                ..note.clone()
            }),
            Self::Spacer(spacer) => Self::Spacer(Spacer {
                duration: spacer.duration.scaled(factor),
            }),
            Self::LongDecoration(decoration) => {
                Self::LongDecoration(LongDecoration {
                    length: decoration.length.scaled(factor),
                    ..decoration.clone()
                })
            }
            Self::StateChange(_) => self.clone(),
        }
    }

    /// [`Event::scaled`], failing when a value leaves the rational range.
    pub fn checked_scaled(&self, factor: Rational) -> ScoreResult<Self> {
        Ok(match self {
            Self::Note(note) => Self::Note(Note {
                duration: note.duration.checked_scaled(factor)?,
                ..note.clone()
            }),
            Self::Spacer(spacer) => Self::Spacer(Spacer {
                duration: spacer.duration.checked_scaled(factor)?,
            }),
            Self::LongDecoration(decoration) => {
                Self::LongDecoration(LongDecoration {
                    length: decoration.length.checked_scaled(factor)?,
                    ..decoration.clone()
                })
            }
            Self::StateChange(_) => self.clone(),
        })
    }

    /// [`Event::duration`], failing when it leaves the rational range.
    pub fn checked_duration(&self) -> ScoreResult<Span> {
        match self {
            Self::Note(note) if !note.grace => match note.tuplet {
                Some(factor) => note.duration.checked_scaled(factor),
                None => Ok(note.duration),
            },
            _ => Ok(self.duration()),
        }
    }

    /// Apply `f` to every pitch of a note; other events are returned as is.
    pub fn map_pitches(&self, f: impl Fn(&Pitch) -> Pitch) -> Self {
        match self {
            Self::Note(note) => Self::Note(note.with_pitches(
                note.pitches.iter().map(f).collect(),
            )),
            _ => self.clone(),
        }
    }

    /// [`Event::map_pitches`] with a fallible `f`.
    pub fn try_map_pitches(
        &self,
        f: impl Fn(&Pitch) -> ScoreResult<Pitch>,
    ) -> ScoreResult<Self> {
        match self {
            Self::Note(note) => Ok(Self::Note(note.with_pitches(
                note.pitches.iter().map(f).collect::<ScoreResult<_>>()?,
            ))),
            _ => Ok(self.clone()),
        }
    }

    pub fn as_note(&self) -> Option<&Note> {
        match self {
            Self::Note(note) => Some(note),
            _ => None,
        }
    }
    pub fn as_note_mut(&mut self) -> Option<&mut Note> {
        match self {
            Self::Note(note) => Some(note),
            _ => None,
        }
    }

    pub fn is_grace(&self) -> bool {
        matches!(self, Self::Note(note) if note.grace)
    }
}
impl From<Note> for Event {
    fn from(value: Note) -> Self {
        Self::Note(value)
    }
}
impl From<StateChange> for Event {
    fn from(value: StateChange) -> Self {
        Self::StateChange(value)
    }
}
impl From<Spacer> for Event {
    fn from(value: Spacer) -> Self {
        Self::Spacer(value)
    }
}
impl From<LongDecoration> for Event {
    fn from(value: LongDecoration) -> Self {
        Self::LongDecoration(value)
    }
}

/// Note, chord or rest (no pitches).
#[derive(Derivative, Clone, Serialize, Deserialize)]
#[derivative(Debug, PartialEq, Default)]
pub struct Note {
    /// Ordered set, lowest first.
    pub pitches: Vec<Pitch>,
    /// Nominal (displayed) duration.
    #[derivative(Default(value = "Span::new(1, 4)"))]
    pub duration: Span,
    /// Multiplies the nominal duration for timing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuplet: Option<Rational>,
    #[serde(default)]
    pub tie: bool,
    #[serde(default)]
    pub grace: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expressions: Vec<Expression>,
    /// Lyric syllables.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    /// Assigned by time-slot grouping: `{staff}-{voice}-{index}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[derivative(PartialEq = "ignore")]
    pub uniq: Option<String>,
}
impl Note {
    pub fn new(pitches: Vec<Pitch>, duration: Span) -> Self {
        Self {
            duration,
            ..Self::default()
        }
        .with_pitches(pitches)
    }
    pub fn rest(duration: Span) -> Self {
        Self::new(Vec::new(), duration)
    }
    /// Same note with another pitch set (sorted, without duplicates).
    pub fn with_pitches(&self, mut pitches: Vec<Pitch>) -> Self {
        pitches.sort();
        pitches.dedup();
        Self {
            pitches,
            ..self.clone()
        }
    }
    pub fn is_rest(&self) -> bool {
        self.pitches.is_empty()
    }
    /// Grace notes do not take time; tuplets scale the nominal value.
    pub fn effective_duration(&self) -> Span {
        if self.grace {
            return Span::ZERO;
        }
        match self.tuplet {
            Some(factor) => self.duration.scaled(factor),
            None => self.duration,
        }
    }
    pub fn set_tie(&mut self, tie: bool) -> &mut Self {
        self.tie = tie;
        self
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Expression {
    Staccato,
    Accent,
    Tenuto,
    Marcato,
    Fermata,
}
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Staccato => "-.",
            Self::Accent => "->",
            Self::Tenuto => "--",
            Self::Marcato => "-^",
            Self::Fermata => "\\fermata",
        };
        write!(f, "{s}")
    }
}
impl FromStr for Expression {
    type Err = ScoreError;
    fn from_str(s: &str) -> ScoreResult<Self> {
        match s {
            "-." => Ok(Self::Staccato),
            "->" => Ok(Self::Accent),
            "--" => Ok(Self::Tenuto),
            "-^" => Ok(Self::Marcato),
            "\\fermata" => Ok(Self::Fermata),
            x => Err(ScoreError::MalformedInput(format!(
                "unknown expression: `{x}`"
            ))),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct Spacer {
    pub duration: Span,
}

/// Key, clef and/or meter taking effect at a position. Takes no time.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StateChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Key>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clef: Option<Clef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meter: Option<Meter>,
}
impl StateChange {
    pub fn key(key: Key) -> Self {
        Self {
            key: Some(key),
            ..Default::default()
        }
    }
    pub fn clef(clef: Clef) -> Self {
        Self {
            clef: Some(clef),
            ..Default::default()
        }
    }
    pub fn meter(meter: Meter) -> Self {
        Self {
            meter: Some(meter),
            ..Default::default()
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum DecorationKind {
    Slur,
    Crescendo,
    Decrescendo,
}

/// Slur or hairpin starting at its position and spanning `length`.
///
/// It spans time without occupying it.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct LongDecoration {
    pub kind: DecorationKind,
    pub length: Span,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

#[cfg(test)]
mod tests {
    use super::{DecorationKind, Event, LongDecoration, Note, StateChange};
    use crate::primitives::{Clef, Pitch, Rational, Span};

    fn c() -> Pitch {
        "c'".parse().unwrap()
    }

    #[test]
    fn durations() {
        let mut note = Note::new(vec![c()], Span::new(1, 8));
        assert_eq!(Event::from(note.clone()).duration(), Span::new(1, 8));
        note.tuplet = Some(Rational::new(2, 3));
        assert_eq!(note.effective_duration(), Span::new(1, 12));
        note.grace = true;
        assert_eq!(note.effective_duration(), Span::ZERO);
        assert_eq!(
            Event::from(StateChange::clef(Clef::Bass)).duration(),
            Span::ZERO
        );
    }

    #[test]
    fn scaling_leaves_states_alone() {
        let slur = Event::LongDecoration(LongDecoration {
            kind: DecorationKind::Slur,
            length: Span::new(1, 2),
            direction: None,
        });
        let double = Rational::from_integer(2);
        match slur.scaled(double) {
            Event::LongDecoration(d) => assert_eq!(d.length, Span::from(Rational::ONE)),
            other => panic!("unexpected {other:?}"),
        }
        let state = Event::from(StateChange::clef(Clef::Alto));
        assert_eq!(state.scaled(double), state);
        let note = Event::from(Note::new(vec![c()], Span::new(1, 8)));
        assert_eq!(note.scaled(double).duration(), Span::new(1, 4));
    }

    #[test]
    fn equality_ignores_uniq() {
        let a = Note::new(vec![c(), c()], Span::new(1, 4));
        let mut b = a.clone();
        b.uniq = Some("0-0-3".into());
        assert_eq!(a, b);
        assert_eq!(a.pitches.len(), 1);
        assert_eq!(Note::default().duration, Span::new(1, 4));
        assert!(Note::rest(Span::new(1, 2)).is_rest());
    }
}
