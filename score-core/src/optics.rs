//! Addressing and copy-on-write editing of a project.
//!
//! A [`Lens`] focuses one part of a structure. `set` and `over` never touch
//! their input: they return a new structure sharing every untouched subtree
//! with the old one, so readers of a previous snapshot are not disturbed.
//!
//! [`ElementLens`] focuses the element of an authored voice at an
//! [`InsertionPoint`] and edits it through every layer of the voice
//! content. An edit reaching a variable changes the variable itself, so
//! every place referencing it sees the edit.
//!
//! ```
//! use std::sync::Arc;
//! use score_core::{
//!     notation::read_events,
//!     optics::{ElementLens, InsertionPoint, Lens},
//!     primitives::{Absolute, Clef, Key, Meter},
//!     score::{Project, Score, Staff, Voice},
//!     sequence::Sequence,
//!     settings::ScoreSettings,
//! };
//!
//! let settings = ScoreSettings::default();
//! let voice = Voice::new(Arc::new(Sequence::simple("c'4 d' e'", &settings)?));
//! let staff = Staff::new(Clef::Treble, Key::default(), Meter::default()).with_voice(voice);
//! let project = Project::new(Score::new(vec![staff]));
//!
//! let lens = ElementLens::new(InsertionPoint::new(0, 0, Absolute::new(1, 4)));
//! let f = read_events("f'4", &settings)?.pop();
//! let edited = lens.set(&project, f.clone())?;
//! assert_eq!(lens.get(&edited)?, f);
//! assert_eq!(lens.get(&project)?, read_events("d'4", &settings)?.pop());
//! # Ok::<(), score_core::error::ScoreError>(())
//! ```

use std::{marker::PhantomData, sync::Arc};

use log::debug;

use crate::{
    error::{ScoreError, ScoreResult},
    primitives::{Absolute, Event, Rational},
    score::{Project, Score, Staff, Voice},
    sequence::{
        flexible::resolve_item,
        functions::{apply_tuplet, attach_lyrics, retrograde},
        FlexibleItem, FlexibleSequence, Sequence,
    },
    variables::VariableRepository,
};

pub trait Lens<S, A> {
    fn get(&self, source: &S) -> ScoreResult<A>;
    fn set(&self, source: &S, value: A) -> ScoreResult<S>;

    fn over(&self, source: &S, f: impl FnOnce(A) -> A) -> ScoreResult<S>
    where
        Self: Sized,
    {
        let value = self.get(source)?;
        self.set(source, f(value))
    }

    /// Focus further, through `inner`.
    fn then<B, I>(self, inner: I) -> Composed<Self, I, A>
    where
        Self: Sized,
        I: Lens<A, B>,
    {
        Composed {
            outer: self,
            inner,
            middle: PhantomData,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Composed<O, I, M> {
    outer: O,
    inner: I,
    middle: PhantomData<fn() -> M>,
}
impl<S, M, A, O, I> Lens<S, A> for Composed<O, I, M>
where
    O: Lens<S, M>,
    I: Lens<M, A>,
{
    fn get(&self, source: &S) -> ScoreResult<A> {
        self.inner.get(&self.outer.get(source)?)
    }
    fn set(&self, source: &S, value: A) -> ScoreResult<S> {
        let middle = self.outer.get(source)?;
        let middle = self.inner.set(&middle, value)?;
        self.outer.set(source, middle)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreLens;
impl Lens<Project, Score> for ScoreLens {
    fn get(&self, source: &Project) -> ScoreResult<Score> {
        Ok(source.score.clone())
    }
    fn set(&self, source: &Project, value: Score) -> ScoreResult<Project> {
        Ok(Project {
            score: value,
            variables: source.variables.clone(),
            settings: source.settings,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StaffLens(pub usize);
impl Lens<Score, Staff> for StaffLens {
    fn get(&self, source: &Score) -> ScoreResult<Staff> {
        source.staff(self.0).cloned()
    }
    fn set(&self, source: &Score, value: Staff) -> ScoreResult<Score> {
        let mut score = source.clone();
        let staff = score
            .staves
            .get_mut(self.0)
            .ok_or(ScoreError::NoSuchStaff(self.0))?;
        *staff = value;
        Ok(score)
    }
}

/// Authored voice of a staff.
#[derive(Debug, Clone, Copy)]
pub struct VoiceLens {
    pub staff: usize,
    pub voice: usize,
}
impl Lens<Staff, Voice> for VoiceLens {
    fn get(&self, source: &Staff) -> ScoreResult<Voice> {
        source.voices.get(self.voice).cloned().ok_or(self.missing())
    }
    fn set(&self, source: &Staff, value: Voice) -> ScoreResult<Staff> {
        let mut staff = source.clone();
        let voice = staff.voices.get_mut(self.voice).ok_or(self.missing())?;
        *voice = value;
        Ok(staff)
    }
}
impl VoiceLens {
    fn missing(&self) -> ScoreError {
        ScoreError::NoSuchVoice {
            staff: self.staff,
            voice: self.voice,
        }
    }
}

/// Lens from a project to one of its authored voices.
pub fn voice_lens(staff: usize, voice: usize) -> impl Lens<Project, Voice> {
    ScoreLens
        .then(StaffLens(staff))
        .then(VoiceLens { staff, voice })
}

/// A logical position: staff, authored voice and time.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct InsertionPoint {
    pub staff: usize,
    pub voice: usize,
    pub time: Absolute,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ElementIndex {
    /// A note or spacer starts exactly at the time.
    At(usize),
    /// Nothing starts there; a new element goes at this index.
    Before(usize),
}

impl InsertionPoint {
    pub fn new(staff: usize, voice: usize, time: Absolute) -> Self {
        Self { staff, voice, time }
    }

    pub fn element_index(&self, project: &Project) -> ScoreResult<ElementIndex> {
        let voice = voice_lens(self.staff, self.voice).get(project)?;
        let events = voice.content.elements(&project.variables)?;
        Ok(locate_time(&events, self.time))
    }
}

/// First non-grace note or spacer starting at `time`; otherwise the index
/// of the first element starting at or after it.
fn locate_time(events: &[Event], time: Absolute) -> ElementIndex {
    let mut start = Absolute::ZERO;
    let mut insertion = None;
    for (idx, event) in events.iter().enumerate() {
        if start > time {
            insertion.get_or_insert(idx);
            break;
        }
        if start == time {
            match event {
                Event::Note(note) if !note.grace => return ElementIndex::At(idx),
                Event::Spacer(_) => return ElementIndex::At(idx),
                _ => {
                    insertion.get_or_insert(idx);
                }
            }
        }
        start += event.duration();
    }
    ElementIndex::Before(insertion.unwrap_or(events.len()))
}

/// Element at an insertion point; `None` when nothing starts there.
///
/// Setting `Some` replaces the element or inserts a new one, setting `None`
/// deletes it.
#[derive(Debug, Clone, Copy)]
pub struct ElementLens {
    pub point: InsertionPoint,
}
impl ElementLens {
    pub fn new(point: InsertionPoint) -> Self {
        Self { point }
    }
}
impl Lens<Project, Option<Event>> for ElementLens {
    fn get(&self, source: &Project) -> ScoreResult<Option<Event>> {
        let voice = voice_lens(self.point.staff, self.point.voice).get(source)?;
        let events = voice.content.elements(&source.variables)?;
        Ok(match locate_time(&events, self.point.time) {
            ElementIndex::At(idx) => events.into_iter().nth(idx),
            ElementIndex::Before(_) => None,
        })
    }

    fn set(&self, source: &Project, value: Option<Event>) -> ScoreResult<Project> {
        let lens = voice_lens(self.point.staff, self.point.voice);
        let voice = lens.get(source)?;
        let events = voice.content.elements(&source.variables)?;
        let (index, edit) = match (locate_time(&events, self.point.time), value) {
            (ElementIndex::At(idx), Some(event)) => (idx, Edit::Replace(event)),
            (ElementIndex::At(idx), None) => (idx, Edit::Delete),
            (ElementIndex::Before(idx), Some(event)) => (idx, Edit::Insert(event)),
            (ElementIndex::Before(_), None) => return Ok(source.clone()),
        };
        debug!("{edit:?} at element {index} of {:?}", self.point);
        let mut variables = source.variables.clone();
        let content = edit_sequence(&voice.content, index, edit, &mut variables)?;
        let mut project = lens.set(
            source,
            Voice {
                content: Arc::new(content),
                ..voice
            },
        )?;
        project.variables = variables;
        Ok(project)
    }
}

/// Change of one resolved element of a sequence.
#[derive(Debug, PartialEq, Clone)]
pub enum Edit {
    Replace(Event),
    Insert(Event),
    Delete,
}
impl Edit {
    fn map(self, f: impl FnOnce(Event) -> Event) -> Self {
        match self {
            Self::Replace(event) => Self::Replace(f(event)),
            Self::Insert(event) => Self::Insert(f(event)),
            Self::Delete => Self::Delete,
        }
    }
    fn try_map(self, f: impl FnOnce(Event) -> ScoreResult<Event>) -> ScoreResult<Self> {
        Ok(match self {
            Self::Replace(event) => Self::Replace(f(event)?),
            Self::Insert(event) => Self::Insert(f(event)?),
            Self::Delete => Self::Delete,
        })
    }
    fn is_insert(&self) -> bool {
        matches!(self, Self::Insert(_))
    }
}

/// Apply an edit at `index` of the resolved elements of `sequence`.
///
/// Returns the new sequence. Edits landing in variables replace those
/// variables in `variables`.
pub fn edit_sequence(
    sequence: &Sequence,
    index: usize,
    edit: Edit,
    variables: &mut VariableRepository,
) -> ScoreResult<Sequence> {
    edit_layer(sequence, index, edit, variables, &mut Vec::new())
}

fn edit_layer(
    sequence: &Sequence,
    index: usize,
    edit: Edit,
    variables: &mut VariableRepository,
    stack: &mut Vec<String>,
) -> ScoreResult<Sequence> {
    match sequence {
        Sequence::Simple(events) => Ok(Sequence::Simple(edit_events(events, index, edit)?)),
        Sequence::Composite(children) => {
            let mut lengths = Vec::with_capacity(children.len());
            for child in children.iter() {
                lengths.push(child.resolve(variables, stack)?.len());
            }
            let mut children = children.clone();
            match (locate_part(&lengths, index, edit.is_insert()), edit) {
                (Some((child, local)), edit) => {
                    let edited = edit_layer(&children[child], local, edit, variables, stack)?;
                    children[child] = Arc::new(edited);
                }
                (None, Edit::Insert(event)) if index == 0 => {
                    children.push(Arc::new(Sequence::Simple(vec![event])));
                }
                (None, _) => return Err(out_of_range(index, lengths.iter().sum())),
            }
            Ok(Sequence::Composite(children))
        }
        Sequence::Retrograde(source) => {
            let source_events = source.resolve(variables, stack)?;
            let order = retrograde(&source_events);
            let (local, edit) = match (order.get(index), edit) {
                (Some((_, src)), Edit::Insert(event)) => (src + 1, Edit::Insert(event)),
                (None, Edit::Insert(event)) if index == order.len() => (0, Edit::Insert(event)),
                (Some((_, src)), edit) => {
                    let tie = source_events[*src].as_note().map(|n| n.tie);
                    (*src, edit.map(|event| with_tie(event, tie)))
                }
                (None, _) => return Err(out_of_range(index, order.len())),
            };
            let edited = edit_layer(source, local, edit, variables, stack)?;
            Ok(Sequence::Retrograde(Arc::new(edited)))
        }
        Sequence::Tuplet { source, factor } => {
            let edit = edit.try_map(|event| unscale(event, *factor))?;
            let edited = edit_layer(source, index, edit, variables, stack)?;
            Ok(Sequence::Tuplet {
                source: Arc::new(edited),
                factor: *factor,
            })
        }
        Sequence::Lyrics { source, syllables } => {
            let edit = match edit {
                Edit::Replace(event) => {
                    let plain = source.resolve(variables, stack)?;
                    let sung = attach_lyrics(&plain, syllables);
                    Edit::Replace(strip_syllables(event, plain.get(index), sung.get(index)))
                }
                other => other,
            };
            let edited = edit_layer(source, index, edit, variables, stack)?;
            Ok(Sequence::Lyrics {
                source: Arc::new(edited),
                syllables: syllables.clone(),
            })
        }
        Sequence::Split(branches) => {
            let shown = sequence.resolve(variables, stack)?.len();
            let Some(first) = branches.first() else {
                return match edit {
                    Edit::Insert(event) if index == 0 => Ok(Sequence::Split(vec![Arc::new(
                        Sequence::Simple(vec![event]),
                    )])),
                    _ => Err(out_of_range(index, 0)),
                };
            };
            let own = first.resolve(variables, stack)?.len();
            if index > shown || (index == shown && !edit.is_insert()) {
                return Err(out_of_range(index, shown));
            }
            let (local, edit) = match edit {
                edit if index < own => (index, edit),
                // the padding spacer is not stored anywhere
                Edit::Replace(event) | Edit::Insert(event) => (own, Edit::Insert(event)),
                Edit::Delete => return Ok(sequence.clone()),
            };
            let mut branches = branches.clone();
            branches[0] = Arc::new(edit_layer(first, local, edit, variables, stack)?);
            Ok(Sequence::Split(branches))
        }
        Sequence::Flexible(flexible) => Ok(Sequence::Flexible(edit_flexible(
            flexible, index, edit, variables, stack,
        )?)),
    }
}

fn edit_flexible(
    flexible: &FlexibleSequence,
    index: usize,
    edit: Edit,
    variables: &mut VariableRepository,
    stack: &mut Vec<String>,
) -> ScoreResult<FlexibleSequence> {
    let mut lengths = Vec::with_capacity(flexible.items.len());
    for item in flexible.items.iter() {
        lengths.push(resolve_item(item, variables, stack)?.len());
    }
    let mut items = flexible.items.clone();
    if let Edit::Insert(event) = &edit {
        if let Some(position) = item_boundary(&lengths, index) {
            items.insert(position, FlexibleItem::Event(event.clone()));
            return Ok(FlexibleSequence::new(items));
        }
    }
    let (item, local) = locate_part(&lengths, index, false)
        .ok_or_else(|| out_of_range(index, lengths.iter().sum()))?;
    match &flexible.items[item] {
        FlexibleItem::Event(_) => match edit {
            Edit::Replace(event) => items[item] = FlexibleItem::Event(event),
            Edit::Delete => {
                items.remove(item);
            }
            Edit::Insert(_) => {
                return Err(ScoreError::InternalInvariantViolation(format!(
                    "insertion inside the single event of item {item}"
                )))
            }
        },
        FlexibleItem::Variable(name) => {
            if stack.contains(name) {
                return Err(ScoreError::CyclicVariable(name.clone()));
            }
            let sequence = variables
                .get(name)
                .cloned()
                .ok_or_else(|| ScoreError::UndefinedVariable(name.clone()))?;
            debug!("editing variable `{name}` at element {local}");
            stack.push(name.clone());
            let edited = edit_layer(&sequence, local, edit, variables, stack);
            stack.pop();
            *variables = variables.with_variable(name.clone(), Arc::new(edited?));
        }
        FlexibleItem::Function(call) => {
            let events = resolve_item(&items[item], variables, stack)?;
            debug!(
                "materializing `{}` into {} events before editing",
                call.name,
                events.len()
            );
            items.splice(item..item + 1, events.into_iter().map(FlexibleItem::Event));
            return edit_flexible(&FlexibleSequence::new(items), index, edit, variables, stack);
        }
    }
    Ok(FlexibleSequence::new(items))
}

fn edit_events(events: &[Event], index: usize, edit: Edit) -> ScoreResult<Vec<Event>> {
    let mut events = events.to_vec();
    match edit {
        Edit::Replace(event) if index < events.len() => events[index] = event,
        Edit::Delete if index < events.len() => {
            events.remove(index);
        }
        Edit::Insert(event) if index <= events.len() => events.insert(index, event),
        _ => return Err(out_of_range(index, events.len())),
    }
    Ok(events)
}

/// Part holding element `index`, and the index inside it. With `insert`,
/// the very end belongs to the last part.
fn locate_part(lengths: &[usize], index: usize, insert: bool) -> Option<(usize, usize)> {
    let mut offset = 0;
    for (part, length) in lengths.iter().enumerate() {
        if index < offset + length {
            return Some((part, index - offset));
        }
        offset += length;
    }
    match (insert && index == offset, lengths.len().checked_sub(1)) {
        (true, Some(last)) => Some((last, lengths[last])),
        _ => None,
    }
}

/// Item position where element `index` starts, if it starts an item or
/// ends the sequence.
fn item_boundary(lengths: &[usize], index: usize) -> Option<usize> {
    let mut offset = 0;
    for (position, length) in lengths.iter().enumerate() {
        if offset == index {
            return Some(position);
        }
        offset += length;
    }
    (offset == index).then_some(lengths.len())
}

fn out_of_range(index: usize, length: usize) -> ScoreError {
    ScoreError::MalformedInput(format!(
        "no element {index} in a sequence of {length}"
    ))
}

fn with_tie(mut event: Event, tie: Option<bool>) -> Event {
    if let (Some(note), Some(tie)) = (event.as_note_mut(), tie) {
        note.tie = tie;
    }
    event
}

fn unscale(event: Event, factor: Rational) -> ScoreResult<Event> {
    Ok(apply_tuplet(std::slice::from_ref(&event), factor.checked_recip()?)?
        .pop()
        .unwrap_or(event))
}

/// Remove the syllables a lyrics layer added to the shown note.
fn strip_syllables(mut event: Event, plain: Option<&Event>, sung: Option<&Event>) -> Event {
    let added = match (plain.and_then(Event::as_note), sung.and_then(Event::as_note)) {
        (Some(plain), Some(sung)) => sung.text.len().saturating_sub(plain.text.len()),
        _ => 0,
    };
    if let Some(note) = event.as_note_mut() {
        let keep = note.text.len().saturating_sub(added);
        note.text.truncate(keep);
    }
    event
}
