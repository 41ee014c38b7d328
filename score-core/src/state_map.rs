//! Time-indexed record of key, clef and meter changes.
//!
//! Clefs belong to one staff, keys and meters to the whole score. The
//! initial clef, key and meter of a staff are entries of that staff at
//! time 0, so a global change at 0 overrides them.

use std::fmt;

use log::debug;
use serde::Serialize;

use crate::{
    error::{ScoreError, ScoreResult, StateKind},
    primitives::{Absolute, Clef, Event, Key, Meter, MeterMap, Pitch, StateChange},
    score::Score,
    variables::VariableRepository,
};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub enum Scope {
    Staff(usize),
    Global,
}
impl Scope {
    fn applies_to(&self, staff: usize) -> bool {
        match self {
            Self::Staff(idx) => *idx == staff,
            Self::Global => true,
        }
    }
}
impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Staff(idx) => write!(f, "staff {idx}"),
            Self::Global => write!(f, "score"),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize)]
pub struct StateEntry {
    pub time: Absolute,
    pub scope: Scope,
    pub state: StateChange,
}

/// Key, clef and meter active at some time.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize)]
pub struct ActiveState {
    pub key: Key,
    pub clef: Clef,
    pub meter: Meter,
}
impl ActiveState {
    fn apply(&mut self, state: &StateChange) {
        if let Some(key) = state.key {
            self.key = key;
        }
        if let Some(clef) = state.clef {
            self.clef = clef;
        }
        if let Some(meter) = state.meter {
            self.meter = meter;
        }
    }

    /// Pitch written at a staff position (0 = middle line), with the
    /// alteration of the key.
    pub fn pitch_at_staff_position(&self, staff_position: i32) -> Pitch {
        let natural = self.clef.pitch_at(staff_position);
        Pitch {
            alteration: self.key.alteration_for(natural.class),
            ..natural
        }
    }
}

#[derive(Debug, PartialEq, Clone, Default, Serialize)]
pub struct StateMap {
    /// Ordered by time; equal times keep insertion order.
    entries: Vec<StateEntry>,
}
impl StateMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// State map of a whole score: initial states of every staff and the
    /// state changes of all its voices.
    pub fn from_score(
        score: &Score,
        variables: &VariableRepository,
    ) -> ScoreResult<Self> {
        let mut map = Self::new();
        for (idx, staff) in score.staves.iter().enumerate() {
            map.insert_initial(idx, staff.clef, staff.key, staff.meter)?;
        }
        for (idx, staff) in score.staves.iter().enumerate() {
            for voice in staff.resolved_voices(variables)? {
                let mut time = Absolute::ZERO;
                for event in voice.events.iter() {
                    if let Event::StateChange(state) = event {
                        map.insert(time, idx, *state)?;
                    }
                    time += event.duration();
                }
            }
        }
        Ok(map)
    }

    pub fn entries(&self) -> &[StateEntry] {
        &self.entries
    }

    pub fn insert_initial(
        &mut self,
        staff: usize,
        clef: Clef,
        key: Key,
        meter: Meter,
    ) -> ScoreResult<()> {
        let state = StateChange {
            key: Some(key),
            clef: Some(clef),
            meter: Some(meter),
        };
        self.insert_scoped(Absolute::ZERO, Scope::Staff(staff), state)
    }

    /// Insert a state change met in a voice of `staff`: the clef stays with
    /// the staff, key and meter go to the whole score.
    ///
    /// # Errors
    ///
    /// [`ScoreError::ConflictingStateChange`] when another value of the same
    /// field is already asserted at the same time and scope.
    pub fn insert(
        &mut self,
        time: Absolute,
        staff: usize,
        state: StateChange,
    ) -> ScoreResult<()> {
        if let Some(clef) = state.clef {
            self.insert_scoped(time, Scope::Staff(staff), StateChange::clef(clef))?;
        }
        let global = StateChange {
            clef: None,
            ..state
        };
        if global.key.is_some() || global.meter.is_some() {
            self.insert_scoped(time, Scope::Global, global)?;
        }
        Ok(())
    }

    fn insert_scoped(
        &mut self,
        time: Absolute,
        scope: Scope,
        state: StateChange,
    ) -> ScoreResult<()> {
        for entry in self
            .entries
            .iter()
            .filter(|e| e.time == time && e.scope == scope)
        {
            check_conflict(StateKind::Key, time, scope, entry.state.key, state.key)?;
            check_conflict(StateKind::Clef, time, scope, entry.state.clef, state.clef)?;
            check_conflict(StateKind::Meter, time, scope, entry.state.meter, state.meter)?;
        }
        debug!("state change at {time} in {scope}: {state:?}");
        let position = self.entries.partition_point(|e| e.time <= time);
        self.entries.insert(
            position,
            StateEntry {
                time,
                scope,
                state,
            },
        );
        Ok(())
    }

    /// Fold of every entry of the staff (or global) up to `time`.
    pub fn get_state_at(&self, time: Absolute, staff: usize) -> ActiveState {
        self.entries
            .iter()
            .take_while(|e| e.time <= time)
            .filter(|e| e.scope.applies_to(staff))
            .fold(ActiveState::default(), |mut active, entry| {
                active.apply(&entry.state);
                active
            })
    }

    /// Meter changes effective for the staff, the initial meter first.
    pub fn meters(&self, staff: usize) -> Vec<(Absolute, Meter)> {
        let mut meters: Vec<(Absolute, Meter)> = Vec::new();
        for entry in self.entries.iter().filter(|e| e.scope.applies_to(staff)) {
            let Some(meter) = entry.state.meter else {
                continue;
            };
            match meters.last_mut() {
                Some(last) if last.0 == entry.time => last.1 = meter,
                _ => meters.push((entry.time, meter)),
            }
        }
        meters
    }

    /// Bars and beats of the staff.
    pub fn meter_map(&self, staff: usize, compound: bool) -> MeterMap {
        let meters = self.meters(staff);
        let initial = meters
            .first()
            .filter(|(time, _)| *time == Absolute::ZERO)
            .map(|(_, meter)| *meter)
            .unwrap_or_default();
        MeterMap::with_changes(initial, meters).compound(compound)
    }

    /// Key changes effective for the staff after time 0.
    pub fn key_changes(&self, staff: usize) -> Vec<(Absolute, Key)> {
        self.entries
            .iter()
            .filter(|e| e.scope.applies_to(staff) && e.time > Absolute::ZERO)
            .filter_map(|e| e.state.key.map(|key| (e.time, key)))
            .collect()
    }
}

fn check_conflict<T>(
    kind: StateKind,
    time: Absolute,
    scope: Scope,
    existing: Option<T>,
    incoming: Option<T>,
) -> ScoreResult<()>
where
    T: PartialEq + fmt::Display,
{
    match (existing, incoming) {
        (Some(existing), Some(incoming)) if existing != incoming => {
            Err(ScoreError::ConflictingStateChange {
                kind,
                time,
                scope: scope.to_string(),
                existing: existing.to_string(),
                incoming: incoming.to_string(),
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::{Scope, StateMap};
    use crate::{
        error::{ScoreError, StateKind},
        primitives::{Absolute, Clef, Key, Meter, Mode, StateChange},
    };

    fn map() -> StateMap {
        let mut map = StateMap::new();
        map.insert_initial(0, Clef::Treble, Key::default(), Meter::new(4, 4))
            .unwrap();
        map.insert_initial(1, Clef::Bass, Key::default(), Meter::new(4, 4))
            .unwrap();
        map
    }

    #[test]
    fn clefs_are_per_staff_keys_are_global() {
        let mut map = map();
        let later = Absolute::new(1, 1);
        map.insert(later, 0, StateChange::clef(Clef::Alto)).unwrap();
        map.insert(later, 1, StateChange::key(Key::new(2, Mode::Major)))
            .unwrap();
        let upper = map.get_state_at(later, 0);
        let lower = map.get_state_at(later, 1);
        assert_eq!((upper.clef, lower.clef), (Clef::Alto, Clef::Bass));
        assert_eq!(upper.key, Key::new(2, Mode::Major));
        assert_eq!(lower.key, Key::new(2, Mode::Major));
        assert_eq!(map.get_state_at(Absolute::new(1, 2), 0).clef, Clef::Treble);
        assert_eq!(map.key_changes(0), vec![(later, Key::new(2, Mode::Major))]);
    }

    #[test]
    fn conflicts() {
        let mut map = map();
        let time = Absolute::new(1, 2);
        map.insert(time, 0, StateChange::clef(Clef::Alto)).unwrap();
        map.insert(time, 0, StateChange::clef(Clef::Alto)).unwrap();
        map.insert(time, 1, StateChange::clef(Clef::Tenor)).unwrap();
        assert_eq!(
            map.insert(time, 0, StateChange::clef(Clef::Bass)),
            Err(ScoreError::ConflictingStateChange {
                kind: StateKind::Clef,
                time,
                scope: Scope::Staff(0).to_string(),
                existing: "alto".into(),
                incoming: "bass".into(),
            })
        );
        map.insert(time, 0, StateChange::meter(Meter::new(3, 4))).unwrap();
        assert!(matches!(
            map.insert(time, 1, StateChange::meter(Meter::new(6, 8))),
            Err(ScoreError::ConflictingStateChange {
                kind: StateKind::Meter,
                ..
            })
        ));
    }

    #[test]
    fn meters_and_staff_positions() {
        let mut map = map();
        map.insert(Absolute::ZERO, 0, StateChange::meter(Meter::new(3, 4)))
            .unwrap();
        map.insert(Absolute::new(3, 2), 1, StateChange::meter(Meter::new(2, 4)))
            .unwrap();
        assert_eq!(
            map.meters(0),
            vec![
                (Absolute::ZERO, Meter::new(3, 4)),
                (Absolute::new(3, 2), Meter::new(2, 4)),
            ]
        );
        let bars: Vec<Absolute> = map.meter_map(0, true).bars().take(4).collect();
        assert_eq!(
            bars,
            vec![
                Absolute::ZERO,
                Absolute::new(3, 4),
                Absolute::new(3, 2),
                Absolute::new(2, 1),
            ]
        );

        map.insert(Absolute::ZERO, 0, StateChange::key(Key::new(-2, Mode::Major)))
            .unwrap();
        let state = map.get_state_at(Absolute::ZERO, 0);
        // treble middle line is b', flattened in B-flat major
        assert_eq!(state.pitch_at_staff_position(0).to_string(), "bes'");
        assert_eq!(state.pitch_at_staff_position(-1).to_string(), "a'");
    }
}
