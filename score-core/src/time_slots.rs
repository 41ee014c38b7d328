//! Grouping of a voice into time slots: everything that happens at one
//! instant.
//!
//! Slots are derived data. They are recomputed from the resolved events
//! whenever needed and never edited.
//!
//! At one rational instant the order is:
//!
//! 1. grace notes closing the previous note ("after" graces),
//! 2. bar lines and state changes,
//! 3. grace notes leading to the note ("before" graces),
//! 4. notes, spacers and decorations.

use std::collections::BTreeMap;

use itertools::Itertools;
use log::{trace, warn};
use serde::Serialize;

use crate::primitives::{
    Absolute, Event, ExtendedAbsolute, Note, Pitch, StateChange,
};

#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct TimeSlot {
    pub time: ExtendedAbsolute,
    /// Notes, spacers and decorations, in voice order.
    pub elements: Vec<Event>,
    pub states: Vec<StateChange>,
}
impl TimeSlot {
    fn new(time: ExtendedAbsolute) -> Self {
        Self {
            time,
            elements: Vec::new(),
            states: Vec::new(),
        }
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.elements.iter().filter_map(|e| e.as_note())
    }
}

/// Stable identity of an element: `{staff}-{voice}-{index}`.
pub fn uniq(staff: usize, voice: usize, index: usize) -> String {
    format!("{staff}-{voice}-{index}")
}

/// Extended times of every event of a voice, by the tier rules.
///
/// A run of grace notes leads to the following note (or spacer) when there
/// is one; otherwise, at the end of the voice or before a state change, it
/// closes the previous note.
pub fn extended_times(events: &[Event]) -> Vec<ExtendedAbsolute> {
    let mut times = Vec::with_capacity(events.len());
    let mut time = Absolute::ZERO;
    let mut grace_index = 0;
    let mut grace_before = false;
    for (idx, event) in events.iter().enumerate() {
        let extended = match event {
            Event::Note(note) if note.grace => {
                let starts_run = !events[..idx]
                    .iter()
                    .rev()
                    .find(|e| !matches!(e, Event::LongDecoration(_)))
                    .is_some_and(|e| e.is_grace());
                if starts_run {
                    grace_index = 0;
                    grace_before = leads_to_note(&events[idx..]);
                } else {
                    grace_index += 1;
                }
                match grace_before {
                    true => ExtendedAbsolute::grace_before(time, grace_index),
                    false => ExtendedAbsolute::grace_after(time, grace_index),
                }
            }
            Event::StateChange(_) => ExtendedAbsolute::state(time),
            _ => ExtendedAbsolute::note(time),
        };
        times.push(extended);
        time += event.duration();
    }
    times
}

/// Whether the first element after the leading grace notes (decorations
/// skipped) is a note or a spacer.
fn leads_to_note(events: &[Event]) -> bool {
    events
        .iter()
        .find(|e| !e.is_grace() && !matches!(e, Event::LongDecoration(_)))
        .map(|e| matches!(e, Event::Note(_) | Event::Spacer(_)))
        .unwrap_or(false)
}

/// Group resolved events of one voice into ordered time slots.
///
/// Notes get their `uniq` id here. A state change joins the first slot at
/// its instant which does not sort before it, or forms its own slot.
pub fn group_time_slots(
    events: &[Event],
    staff: usize,
    voice: usize,
) -> Vec<TimeSlot> {
    let times = extended_times(events);
    let mut slots: BTreeMap<ExtendedAbsolute, TimeSlot> = BTreeMap::new();
    let mut states = Vec::new();
    for (idx, (event, time)) in events.iter().zip_eq(times).enumerate() {
        match event {
            Event::StateChange(state) => states.push((time, *state)),
            _ => {
                let mut event = event.clone();
                if let Some(note) = event.as_note_mut() {
                    note.uniq = Some(uniq(staff, voice, idx));
                }
                slots
                    .entry(time)
                    .or_insert_with(|| TimeSlot::new(time))
                    .elements
                    .push(event);
            }
        }
    }
    for (time, state) in states {
        let host = slots
            .range(time..)
            .next()
            .filter(|(t, _)| t.time == time.time)
            .map(|(t, _)| *t)
            .unwrap_or(time);
        trace!("state change at {time} joins slot {host}");
        slots
            .entry(host)
            .or_insert_with(|| TimeSlot::new(host))
            .states
            .push(state);
    }
    slots.into_values().collect()
}

/// Tie from one note to the next non-grace note of its voice.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct TieLink {
    pub from: String,
    pub to: String,
    /// Pitches present in both notes.
    pub pitches: Vec<Pitch>,
}

/// Resolve ties of one voice by `uniq` ids.
///
/// A tie with nothing to continue into is dropped with a warning.
pub fn tie_links(slots: &[TimeSlot]) -> Vec<TieLink> {
    let notes = slots
        .iter()
        .flat_map(|slot| slot.notes())
        .filter(|note| !note.grace)
        .collect_vec();
    let mut links = Vec::new();
    for (note, next) in notes.iter().tuple_windows() {
        if !note.tie {
            continue;
        }
        let pitches = note
            .pitches
            .iter()
            .filter(|p| next.pitches.contains(*p))
            .copied()
            .collect_vec();
        match (&note.uniq, &next.uniq, pitches.is_empty()) {
            (Some(from), Some(to), false) => links.push(TieLink {
                from: from.clone(),
                to: to.clone(),
                pitches,
            }),
            _ => warn!("tie of {:?} has nothing to continue into", note.uniq),
        }
    }
    if let Some(last) = notes.last().filter(|n| n.tie) {
        warn!("tie of {:?} at the end of the voice", last.uniq);
    }
    links
}

/// Merge slot lists of several voices into one, joining slots of equal
/// extended time.
pub fn merge_slots(voices: Vec<Vec<TimeSlot>>) -> Vec<TimeSlot> {
    voices
        .into_iter()
        .kmerge_by(|a, b| a.time < b.time)
        .coalesce(|mut a, b| match a.time == b.time {
            true => {
                a.elements.extend(b.elements);
                a.states.extend(b.states);
                Ok(a)
            }
            false => Err((a, b)),
        })
        .collect()
}
