//! Sequence algebra: time-ordered events with a total duration.
//!
//! Derived variants share their sources through `Arc` and compute their
//! elements on every read. Every read takes the [`VariableRepository`] to
//! resolve flexible content against.
//!
//! ```
//! use std::sync::Arc;
//! use score_core::{
//!     primitives::{Rational, Span},
//!     sequence::Sequence,
//!     settings::ScoreSettings,
//!     variables::VariableRepository,
//! };
//!
//! let settings = ScoreSettings::default();
//! let variables = VariableRepository::default();
//! let motif = Arc::new(Sequence::simple("c'8 d' e'", &settings)?);
//! let triplet = Sequence::tuplet(motif.clone(), Rational::new(2, 3))?;
//! let both = Sequence::composite([motif, Arc::new(triplet)]);
//! assert_eq!(both.duration(&variables)?, Span::new(5, 8));
//! # Ok::<(), score_core::error::ScoreError>(())
//! ```

use std::sync::Arc;

use log::trace;

use crate::{
    error::ScoreResult,
    notation::read_events,
    primitives::{Event, Rational, Spacer, Span},
    settings::ScoreSettings,
    variables::VariableRepository,
};

pub mod flexible;
pub mod functions;

pub use flexible::{FlexibleItem, FlexibleSequence, FunctionCall};

use functions::{apply_tuplet, attach_lyrics, check_tuplet_factor, retrograde};

#[derive(Debug, PartialEq, Clone)]
pub enum Sequence {
    /// Concrete events.
    Simple(Vec<Event>),
    /// Concatenation of sequences.
    Composite(Vec<Arc<Sequence>>),
    /// Reversed source, same duration.
    Retrograde(Arc<Sequence>),
    /// Source with every tuplet factor multiplied by `factor`.
    Tuplet {
        source: Arc<Sequence>,
        factor: Rational,
    },
    /// Source with syllables on its singable notes.
    Lyrics {
        source: Arc<Sequence>,
        syllables: Vec<String>,
    },
    /// Simultaneous branches of one authored voice.
    Split(Vec<Arc<Sequence>>),
    Flexible(FlexibleSequence),
}
impl Sequence {
    pub fn simple(text: &str, settings: &ScoreSettings) -> ScoreResult<Self> {
        Ok(Self::Simple(read_events(text, settings)?))
    }
    pub fn from_events(events: Vec<Event>) -> Self {
        Self::Simple(events)
    }
    pub fn flexible(text: &str, settings: &ScoreSettings) -> ScoreResult<Self> {
        Ok(Self::Flexible(FlexibleSequence::from_text(text, settings)?))
    }
    pub fn composite(children: impl IntoIterator<Item = Arc<Sequence>>) -> Self {
        Self::Composite(children.into_iter().collect())
    }
    pub fn retrograde(source: Arc<Sequence>) -> Self {
        Self::Retrograde(source)
    }
    /// # Errors
    ///
    /// [`ScoreError::MalformedInput`] unless `factor` is positive.
    pub fn tuplet(source: Arc<Sequence>, factor: Rational) -> ScoreResult<Self> {
        check_tuplet_factor(factor)?;
        Ok(Self::Tuplet { source, factor })
    }
    /// Syllables are separated by whitespace; `_` skips a note.
    pub fn lyrics(source: Arc<Sequence>, text: &str) -> Self {
        Self::Lyrics {
            source,
            syllables: text.split_whitespace().map(String::from).collect(),
        }
    }
    pub fn split(branches: impl IntoIterator<Item = Arc<Sequence>>) -> Self {
        Self::Split(branches.into_iter().collect())
    }

    /// Resolved events.
    ///
    /// # Errors
    ///
    /// Resolution errors of flexible content: undefined or cyclic
    /// variables, unknown functions or bad function arguments. Events whose
    /// positions leave the rational range are
    /// [`ScoreError::InternalInvariantViolation`].
    pub fn elements(&self, variables: &VariableRepository) -> ScoreResult<Vec<Event>> {
        let events = self.resolve(variables, &mut Vec::new())?;
        total_duration(&events)?;
        Ok(events)
    }

    /// Sum of the durations of all elements.
    pub fn duration(&self, variables: &VariableRepository) -> ScoreResult<Span> {
        total_duration(&self.resolve(variables, &mut Vec::new())?)
    }

    /// Every simultaneous branch; one branch unless this is a split.
    pub fn branches(&self, variables: &VariableRepository) -> ScoreResult<Vec<Vec<Event>>> {
        match self {
            Self::Split(branches) => branches
                .iter()
                .map(|branch| branch.elements(variables))
                .collect(),
            _ => Ok(vec![self.elements(variables)?]),
        }
    }

    pub fn is_split(&self) -> bool {
        matches!(self, Self::Split(_))
    }

    /// `stack` holds the variables being resolved, to catch cycles.
    pub(crate) fn resolve(
        &self,
        variables: &VariableRepository,
        stack: &mut Vec<String>,
    ) -> ScoreResult<Vec<Event>> {
        match self {
            Self::Simple(events) => Ok(events.clone()),
            Self::Composite(children) => {
                let mut events = Vec::new();
                for child in children.iter() {
                    events.append(&mut child.resolve(variables, stack)?);
                }
                Ok(events)
            }
            Self::Retrograde(source) => Ok(retrograde(&source.resolve(variables, stack)?)
                .into_iter()
                .map(|(event, _)| event)
                .collect()),
            Self::Tuplet { source, factor } => {
                apply_tuplet(&source.resolve(variables, stack)?, *factor)
            }
            Self::Lyrics { source, syllables } => {
                Ok(attach_lyrics(&source.resolve(variables, stack)?, syllables))
            }
            Self::Split(branches) => {
                let mut resolved = Vec::with_capacity(branches.len());
                for branch in branches.iter() {
                    resolved.push(branch.resolve(variables, stack)?);
                }
                pad_first_branch(resolved)
            }
            Self::Flexible(flexible) => flexible.resolve(variables, stack),
        }
    }
}

/// Sum of event durations in voice order. Every running position is
/// checked, so later position arithmetic on the same events stays in range.
fn total_duration(events: &[Event]) -> ScoreResult<Span> {
    Span::checked_sum(
        events
            .iter()
            .map(|e| e.checked_duration())
            .collect::<ScoreResult<Vec<_>>>()?,
    )
}

/// First branch, followed by a spacer up to the end of the longest one.
fn pad_first_branch(branches: Vec<Vec<Event>>) -> ScoreResult<Vec<Event>> {
    let durations = branches
        .iter()
        .map(|events| total_duration(events))
        .collect::<ScoreResult<Vec<_>>>()?;
    let longest = durations.iter().copied().max().unwrap_or(Span::ZERO);
    let first_duration = durations.first().copied().unwrap_or(Span::ZERO);
    let mut first = branches.into_iter().next().unwrap_or_default();
    if first_duration < longest {
        trace!("padding split by {}", longest - first_duration);
        first.push(Event::Spacer(Spacer {
            duration: longest - first_duration,
        }));
    }
    Ok(first)
}
