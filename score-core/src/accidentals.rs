//! Decides which pitches need a printed accidental.
//!
//! The manager remembers, for the current bar, the last alteration of every
//! pitch and of every bare pitch class. It must be fed in time order.

use std::collections::HashMap;

use itertools::Itertools;
use log::trace;

use crate::{
    primitives::{Absolute, ExtendedAbsolute, Key, Pitch},
    time_slots::TimeSlot,
};

#[derive(Debug, Clone)]
pub struct AccidentalManager {
    key: Key,
    /// (class, octave) → alteration.
    by_pitch: HashMap<(u8, i8), i8>,
    /// class → alteration.
    by_class: HashMap<u8, i8>,
}
impl AccidentalManager {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            by_pitch: HashMap::new(),
            by_class: HashMap::new(),
        }
    }

    pub fn key(&self) -> Key {
        self.key
    }

    /// Alteration to print for the pitch, `Some(0)` being a natural.
    pub fn get_accidental(&mut self, pitch: &Pitch) -> Option<i8> {
        let alteration = pitch.alteration;
        let exact = self.by_pitch.get(&(pitch.class, pitch.octave)).copied();
        let class = self.by_class.get(&pitch.class).copied();
        let accidental = match (exact, class) {
            (Some(shown), _) if shown == alteration => None,
            (_, Some(shown)) if shown != alteration => Some(alteration),
            _ => match self.key.alteration_for(pitch.class) == alteration {
                true => None,
                false => Some(alteration),
            },
        };
        self.by_pitch.insert((pitch.class, pitch.octave), alteration);
        self.by_class.insert(pitch.class, alteration);
        accidental
    }

    pub fn new_bar(&mut self) {
        self.by_pitch.clear();
        self.by_class.clear();
    }

    pub fn set_key(&mut self, key: Key) {
        self.new_bar();
        self.key = key;
    }
}

/// Accidentals of every note of a voice, by `uniq` id, one per pitch.
///
/// Memory is reset at every bar line and key change. Key changes come from
/// the slots themselves and from `key_changes` (changes met in other voices
/// or staves). Grace notes closing a note at a bar line still belong to the
/// bar before it.
pub fn voice_accidentals(
    slots: &[TimeSlot],
    key: Key,
    key_changes: &[(Absolute, Key)],
    bars: impl Iterator<Item = Absolute>,
) -> HashMap<String, Vec<Option<i8>>> {
    let mut bars = bars.skip_while(|bar| *bar <= Absolute::ZERO).peekable();
    let mut key_changes = key_changes
        .iter()
        .copied()
        .sorted_by_key(|(time, _)| *time)
        .peekable();
    let (_, accidentals) = slots.iter().fold(
        (AccidentalManager::new(key), HashMap::new()),
        |(mut manager, mut accidentals), slot| {
            let time = slot.time;
            let mut crossed = false;
            while bars
                .next_if(|bar| ExtendedAbsolute::state(*bar) <= time)
                .is_some()
            {
                crossed = true;
            }
            if crossed {
                manager.new_bar();
            }
            while let Some((_, key)) =
                key_changes.next_if(|(at, _)| ExtendedAbsolute::state(*at) <= time)
            {
                manager.set_key(key);
            }
            if let Some(key) = slot.states.iter().filter_map(|s| s.key).last() {
                manager.set_key(key);
            }
            for note in slot.notes() {
                let per_pitch = note
                    .pitches
                    .iter()
                    .map(|pitch| manager.get_accidental(pitch))
                    .collect_vec();
                if let Some(uniq) = &note.uniq {
                    trace!("accidentals of {uniq}: {per_pitch:?}");
                    accidentals.insert(uniq.clone(), per_pitch);
                }
            }
            (manager, accidentals)
        },
    );
    accidentals
}
