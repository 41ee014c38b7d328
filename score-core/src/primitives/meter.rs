//! Main "ruler" for moving through a voice: meters, bar lines and beats.
//!
//! Meters are conceptually unbounded, so bar lines and beats are produced by
//! [`BeatCursor`], an infinite iterator. Restart it by asking the
//! [`MeterMap`] for a new one.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{ScoreError, ScoreResult};

use super::{Absolute, Rational, Span};

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct Meter {
    pub count: u32,
    pub value: u32,
    /// Length of an incomplete first bar.
    pub upbeat: Option<Span>,
}
impl Meter {
    pub fn new(count: u32, value: u32) -> Self {
        Self {
            count,
            value,
            upbeat: None,
        }
    }
    pub fn with_upbeat(mut self, upbeat: Span) -> Self {
        self.upbeat = Some(upbeat);
        self
    }
    pub fn bar_length(&self) -> Span {
        Span::new(self.count as i64, self.value as i64)
    }
    /// 6/8, 9/8, 12/16... are counted in dotted beats when `compound`.
    pub fn beat_length(&self, compound: bool) -> Span {
        let is_compound =
            self.count > 3 && self.count % 3 == 0 && self.value >= 8;
        match compound && is_compound {
            true => Span::new(3, self.value as i64),
            false => Span::new(1, self.value as i64),
        }
    }
}
impl Default for Meter {
    fn default() -> Self {
        Self::new(4, 4)
    }
}
impl fmt::Display for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.count, self.value)
    }
}
impl FromStr for Meter {
    type Err = ScoreError;
    fn from_str(s: &str) -> ScoreResult<Self> {
        let malformed =
            || ScoreError::MalformedInput(format!("bad meter: `{s}`"));
        let (count, value) = s.split_once('/').ok_or_else(malformed)?;
        let count: u32 = count.trim().parse().map_err(|_| malformed())?;
        let value: u32 = value.trim().parse().map_err(|_| malformed())?;
        if count == 0 || value == 0 || !value.is_power_of_two() {
            return Err(malformed());
        }
        Ok(Self::new(count, value))
    }
}

/// Bar number (0-based) and distance from the bar start.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct RelativePosition {
    pub bar: u32,
    pub offset: Span,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CursorKind {
    Bars,
    Beats,
}

/// Meter changes of one staff, ordered by time.
///
/// Every meter change starts a new bar.
#[derive(Debug, PartialEq, Clone)]
pub struct MeterMap {
    changes: Vec<(Absolute, Meter)>,
    compound: bool,
}
impl MeterMap {
    pub fn new(meter: Meter) -> Self {
        Self {
            changes: vec![(Absolute::ZERO, meter)],
            compound: true,
        }
    }
    /// Changes may come unsorted; a change at time 0 replaces the initial
    /// meter.
    pub fn with_changes(
        initial: Meter,
        changes: impl IntoIterator<Item = (Absolute, Meter)>,
    ) -> Self {
        let mut map = Self::new(initial);
        for (time, meter) in changes {
            match map.changes.iter_mut().find(|(t, _)| *t == time) {
                Some(existing) => existing.1 = meter,
                None => map.changes.push((time, meter)),
            }
        }
        map.changes.sort_by(|a, b| a.0.cmp(&b.0));
        map
    }
    pub fn compound(mut self, compound: bool) -> Self {
        self.compound = compound;
        self
    }

    pub fn meter_at(&self, time: Absolute) -> Meter {
        self.segment_at(time).1
    }

    fn segment_at(&self, time: Absolute) -> (Absolute, Meter) {
        self.changes
            .iter()
            .rev()
            .find(|(start, _)| *start <= time)
            .copied()
            .unwrap_or(self.changes[0])
    }

    fn next_change_after(&self, time: Absolute) -> Option<Absolute> {
        self.changes
            .iter()
            .map(|(start, _)| *start)
            .find(|start| *start > time)
    }

    /// Infinite iterator of bar line times, starting at 0.
    pub fn bars(&self) -> BeatCursor {
        BeatCursor::new(self.clone(), CursorKind::Bars)
    }
    /// Infinite iterator of beat times, starting at 0.
    pub fn beats(&self) -> BeatCursor {
        BeatCursor::new(self.clone(), CursorKind::Beats)
    }

    /// Convert absolute position to bar number and offset.
    pub fn relative_position(&self, absolute: Absolute) -> RelativePosition {
        let mut bar = 0;
        let mut bar_start = Absolute::ZERO;
        for line in self.bars() {
            if line > absolute {
                break;
            }
            if line > Absolute::ZERO {
                bar += 1;
            }
            bar_start = line;
        }
        RelativePosition {
            bar,
            offset: absolute - bar_start,
        }
    }
}

/// Restartable cursor over bar lines or beats.
///
/// `next()` never returns `None`.
#[derive(Debug, Clone)]
pub struct BeatCursor {
    map: MeterMap,
    kind: CursorKind,
    next_time: Absolute,
}
impl BeatCursor {
    pub fn new(map: MeterMap, kind: CursorKind) -> Self {
        Self {
            map,
            kind,
            next_time: Absolute::ZERO,
        }
    }

    fn step(&self, meter: &Meter) -> Span {
        match self.kind {
            CursorKind::Bars => meter.bar_length(),
            CursorKind::Beats => meter.beat_length(self.map.compound),
        }
    }

    /// First grid point strictly after `current`.
    fn following(&self, current: Absolute) -> Absolute {
        let (start, meter) = self.map.segment_at(current);
        let step = self.step(&meter);
        let origin = start + meter.upbeat.unwrap_or(Span::ZERO);
        let steps = (current - origin).get().div(step.get()).floor() + 1;
        let candidate = origin + step.scaled(Rational::from_integer(steps));
        match self.map.next_change_after(current) {
            Some(change) if change <= candidate => change,
            _ => candidate,
        }
    }
}
impl Iterator for BeatCursor {
    type Item = Absolute;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next_time;
        self.next_time = self.following(current);
        Some(current)
    }
}
