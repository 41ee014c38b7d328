//! The document: project, score, staves and voices.
//!
//! Everything here is immutable data. Edits replace whole subtrees (see
//! [`crate::optics`]); derived structures like time slots, beam groups and
//! the state map are computed on demand by the [`Project`] methods.
//!
//! Voices are addressed two ways. Edits address the authored voices of a
//! staff. Analysis addresses resolved voices, where a split voice counts
//! once per branch.

use std::{collections::HashMap, sync::Arc};

use log::debug;

use crate::{
    accidentals::voice_accidentals,
    beaming::{beam_slots, BeamGroup},
    error::{ScoreError, ScoreResult},
    primitives::{Absolute, Clef, Direction, Event, Key, Meter},
    sequence::Sequence,
    settings::ScoreSettings,
    state_map::StateMap,
    time_slots::{group_time_slots, merge_slots, tie_links, TieLink, TimeSlot},
    variables::VariableRepository,
};

#[derive(Debug, PartialEq, Clone)]
pub struct Voice {
    pub content: Arc<Sequence>,
    /// Stem direction for notes not having their own.
    pub direction: Option<Direction>,
}
impl Voice {
    pub fn new(content: Arc<Sequence>) -> Self {
        Self {
            content,
            direction: None,
        }
    }
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }
}

/// Events of one resolved voice.
#[derive(Debug, PartialEq, Clone)]
pub struct ResolvedVoice {
    pub events: Vec<Event>,
    pub direction: Option<Direction>,
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Staff {
    pub clef: Clef,
    pub key: Key,
    pub meter: Meter,
    pub voices: Vec<Voice>,
}
impl Staff {
    pub fn new(clef: Clef, key: Key, meter: Meter) -> Self {
        Self {
            clef,
            key,
            meter,
            voices: Vec::new(),
        }
    }
    pub fn with_voice(mut self, voice: Voice) -> Self {
        self.voices.push(voice);
        self
    }

    /// Resolve every voice; a split voice gives one voice per branch.
    ///
    /// Branches of a split voice without direction are stemmed up (first)
    /// and down (others).
    pub fn resolved_voices(
        &self,
        variables: &VariableRepository,
    ) -> ScoreResult<Vec<ResolvedVoice>> {
        let mut resolved = Vec::new();
        for voice in self.voices.iter() {
            let branches = voice.content.branches(variables)?;
            let split = branches.len() > 1;
            for (idx, events) in branches.into_iter().enumerate() {
                let direction = match (voice.direction, split, idx) {
                    (Some(direction), _, _) => Some(direction),
                    (None, true, 0) => Some(Direction::Up),
                    (None, true, _) => Some(Direction::Down),
                    (None, false, _) => None,
                };
                resolved.push(ResolvedVoice {
                    events: apply_direction(events, direction),
                    direction,
                });
            }
        }
        Ok(resolved)
    }
}

fn apply_direction(events: Vec<Event>, direction: Option<Direction>) -> Vec<Event> {
    let Some(direction) = direction else {
        return events;
    };
    events
        .into_iter()
        .map(|mut event| {
            if let Some(note) = event.as_note_mut() {
                note.direction.get_or_insert(direction);
            }
            event
        })
        .collect()
}

/// Repeated part of the score, `from` < `to`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct RepeatSpan {
    pub from: Absolute,
    pub to: Absolute,
}
impl RepeatSpan {
    pub fn new(from: Absolute, to: Absolute) -> ScoreResult<Self> {
        match from < to {
            true => Ok(Self { from, to }),
            false => Err(ScoreError::MalformedInput(format!(
                "repeat from {from} to {to} is empty"
            ))),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Score {
    pub staves: Vec<Staff>,
    pub repeats: Vec<RepeatSpan>,
}
impl Score {
    pub fn new(staves: Vec<Staff>) -> Self {
        Self {
            staves,
            repeats: Vec::new(),
        }
    }
    pub fn with_repeat(mut self, repeat: RepeatSpan) -> Self {
        self.repeats.push(repeat);
        self
    }
    pub fn staff(&self, staff: usize) -> ScoreResult<&Staff> {
        self.staves.get(staff).ok_or(ScoreError::NoSuchStaff(staff))
    }
}

/// Score with its variables and settings.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Project {
    pub score: Score,
    pub variables: VariableRepository,
    pub settings: ScoreSettings,
}
impl Project {
    pub fn new(score: Score) -> Self {
        Self {
            score,
            ..Default::default()
        }
    }
    pub fn with_variables(mut self, variables: VariableRepository) -> Self {
        self.variables = variables;
        self
    }
    pub fn with_settings(mut self, settings: ScoreSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Resolved voices of a staff.
    pub fn voices(&self, staff: usize) -> ScoreResult<Vec<ResolvedVoice>> {
        self.score.staff(staff)?.resolved_voices(&self.variables)
    }

    pub fn voice_events(&self, staff: usize, voice: usize) -> ScoreResult<Vec<Event>> {
        self.voices(staff)?
            .into_iter()
            .nth(voice)
            .map(|v| v.events)
            .ok_or(ScoreError::NoSuchVoice { staff, voice })
    }

    pub fn voice_time_slots(&self, staff: usize, voice: usize) -> ScoreResult<Vec<TimeSlot>> {
        let events = self.voice_events(staff, voice)?;
        debug!("grouping {} events of voice {staff}-{voice}", events.len());
        Ok(group_time_slots(&events, staff, voice))
    }

    /// Time slots of all resolved voices of a staff, merged.
    pub fn staff_time_slots(&self, staff: usize) -> ScoreResult<Vec<TimeSlot>> {
        let voices = self
            .voices(staff)?
            .iter()
            .enumerate()
            .map(|(idx, voice)| group_time_slots(&voice.events, staff, idx))
            .collect();
        Ok(merge_slots(voices))
    }

    pub fn state_map(&self) -> ScoreResult<StateMap> {
        StateMap::from_score(&self.score, &self.variables)
    }

    pub fn tie_links(&self, staff: usize, voice: usize) -> ScoreResult<Vec<TieLink>> {
        Ok(tie_links(&self.voice_time_slots(staff, voice)?))
    }

    pub fn beam_groups(&self, staff: usize, voice: usize) -> ScoreResult<Vec<BeamGroup>> {
        let slots = self.voice_time_slots(staff, voice)?;
        let meters = self
            .state_map()?
            .meter_map(staff, self.settings.compound_beats);
        beam_slots(&slots, meters.beats())
    }

    /// Printed accidentals of every note of a voice, by `uniq` id.
    pub fn accidentals(
        &self,
        staff: usize,
        voice: usize,
    ) -> ScoreResult<HashMap<String, Vec<Option<i8>>>> {
        let slots = self.voice_time_slots(staff, voice)?;
        let states = self.state_map()?;
        let key = states.get_state_at(Absolute::ZERO, staff).key;
        let meters = states.meter_map(staff, self.settings.compound_beats);
        Ok(voice_accidentals(
            &slots,
            key,
            &states.key_changes(staff),
            meters.bars(),
        ))
    }
}
