//! Pitches, intervals, keys and clefs.
//!
//! Pitch octaves follow the text notation: unmarked `c` is octave 0 and
//! `c'` (middle C, MIDI 60) is octave 1.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{ScoreError, ScoreResult};

/// Semitones above C of the natural pitch classes.
const SEMITONES: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];
/// Position on the circle of fifths of the natural pitch classes (C = 0).
const FIFTHS: [i32; 7] = [0, 2, 4, -1, 1, 3, 5];
const NAMES: [char; 7] = ['c', 'd', 'e', 'f', 'g', 'a', 'b'];

/// Ordered from low to high: by diatonic number, then alteration.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct Pitch {
    /// Diatonic class, 0 (c) to 6 (b).
    pub class: u8,
    pub octave: i8,
    /// -2 (double flat) to 2 (double sharp).
    pub alteration: i8,
}
impl Pitch {
    pub fn new(class: u8, octave: i8, alteration: i8) -> Self {
        Self {
            class: class % 7,
            octave,
            alteration,
        }
    }

    /// Pitch with the given diatonic number and alteration.
    pub fn from_diatonic(diatonic: i32, alteration: i8) -> Self {
        Self {
            class: diatonic.rem_euclid(7) as u8,
            octave: diatonic.div_euclid(7) as i8,
            alteration,
        }
    }

    /// Staff-independent ordinal: one step per line/space.
    pub fn diatonic_number(&self) -> i32 {
        self.octave as i32 * 7 + self.class as i32
    }

    /// Position on the circle of fifths; flats negative, sharps positive.
    pub fn circle_of_fifths_number(&self) -> i32 {
        FIFTHS[self.class as usize] + 7 * self.alteration as i32
    }

    pub fn midi_number(&self) -> i32 {
        (self.octave as i32 + 4) * 12
            + SEMITONES[self.class as usize]
            + self.alteration as i32
    }

    /// Transpose by an interval, keeping the interval quality.
    ///
    /// ```
    /// # use score_core::primitives::{Interval, Pitch};
    /// let b: Pitch = "b".parse()?;
    /// // major third up from b is dis'
    /// assert_eq!(b.add_interval(Interval::new(2, 0))?, "dis'".parse()?);
    /// // bisis has no augmented unison
    /// assert!("bisis".parse::<Pitch>()?.add_interval(Interval::new(0, 1)).is_err());
    /// # Ok::<(), score_core::error::ScoreError>(())
    /// ```
    pub fn add_interval(&self, interval: Interval) -> ScoreResult<Self> {
        let target = Self::from_diatonic(
            self.diatonic_number() + interval.interval,
            0,
        );
        let semitones = self.midi_number() + interval.semitones();
        Self::with_alteration(target, semitones - target.midi_number())
    }

    /// Natural pitch altered, if the alteration is a written one.
    pub fn with_alteration(natural: Pitch, alteration: i32) -> ScoreResult<Self> {
        match alteration {
            -2..=2 => Ok(Self {
                alteration: alteration as i8,
                ..natural
            }),
            _ => Err(ScoreError::MalformedInput(format!(
                "{} altered by {alteration} semitones can not be written",
                Self { alteration: 0, ..natural }
            ))),
        }
    }

    pub fn name(&self) -> char {
        NAMES[self.class as usize]
    }
}
impl PartialOrd for Pitch {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Pitch {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.diatonic_number(), self.alteration)
            .cmp(&(other.diatonic_number(), other.alteration))
    }
}
impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        write!(f, "{name}")?;
        let suffix = match (name, self.alteration) {
            (_, 0) => "",
            (_, 1) => "is",
            (_, 2) => "isis",
            ('e' | 'a', -1) => "s",
            ('e' | 'a', -2) => "ses",
            (_, -1) => "es",
            (_, -2) => "eses",
            _ => "?",
        };
        write!(f, "{suffix}")?;
        let marks = match self.octave >= 0 {
            true => "'".repeat(self.octave as usize),
            false => ",".repeat(self.octave.unsigned_abs() as usize),
        };
        write!(f, "{marks}")
    }
}
impl FromStr for Pitch {
    type Err = ScoreError;

    /// Read `name[is|es...][',...]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed =
            || ScoreError::MalformedInput(format!("bad pitch: `{s}`"));
        let mut chars = s.chars();
        let name = chars.next().ok_or_else(malformed)?;
        let class = NAMES
            .iter()
            .position(|n| *n == name)
            .ok_or_else(malformed)? as u8;
        let rest = chars.as_str();
        let marks_at = rest.find(['\'', ',']).unwrap_or(rest.len());
        let (accidentals, marks) = rest.split_at(marks_at);
        let alteration = match (name, accidentals) {
            (_, "") => 0,
            (_, "is") => 1,
            (_, "isis") => 2,
            (_, "es") => -1,
            (_, "eses") => -2,
            ('e' | 'a', "s") => -1,
            ('e' | 'a', "ses") => -2,
            _ => return Err(malformed()),
        };
        let mut octave = 0_i8;
        for mark in marks.chars() {
            match mark {
                '\'' => octave += 1,
                ',' => octave -= 1,
                _ => return Err(malformed()),
            }
        }
        Ok(Self::new(class, octave, alteration))
    }
}

/// Distance from C to the pitch `interval` diatonic steps above it,
/// altered by `alteration` semitones.
///
/// `Interval::new(2, 0)` is a major third, `Interval::new(2, -1)` a minor
/// third, `Interval::new(4, 0)` a perfect fifth.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct Interval {
    pub interval: i32,
    pub alteration: i32,
}
impl Interval {
    pub fn new(interval: i32, alteration: i32) -> Self {
        Self {
            interval,
            alteration,
        }
    }
    /// Interval that moves `from` onto `to`.
    pub fn between(from: Pitch, to: Pitch) -> Self {
        let steps = to.diatonic_number() - from.diatonic_number();
        let natural = Self::new(steps, 0).semitones();
        Self::new(steps, to.midi_number() - from.midi_number() - natural)
    }
    pub fn semitones(&self) -> i32 {
        let octaves = self.interval.div_euclid(7);
        let class = self.interval.rem_euclid(7) as usize;
        octaves * 12 + SEMITONES[class] + self.alteration
    }
}

#[derive(
    Debug, PartialEq, Eq, Hash, Clone, Copy, Default, Serialize, Deserialize,
)]
pub enum Mode {
    #[default]
    Major,
    Minor,
}

/// Key signature as a position on the circle of fifths.
#[derive(
    Debug, PartialEq, Eq, Hash, Clone, Copy, Default, Serialize, Deserialize,
)]
pub struct Key {
    /// Number of sharps (positive) or flats (negative).
    pub fifths: i8,
    pub mode: Mode,
}
impl Key {
    pub fn new(fifths: i8, mode: Mode) -> Self {
        Self { fifths, mode }
    }
    /// Key of the given tonic: `Key::from_tonic("es".parse()?, Major)` has
    /// three flats.
    pub fn from_tonic(tonic: Pitch, mode: Mode) -> Self {
        let offset = match mode {
            Mode::Major => 0,
            Mode::Minor => 3,
        };
        Self::new(
            (tonic.circle_of_fifths_number() - offset) as i8,
            mode,
        )
    }
    pub fn tonic(&self) -> Pitch {
        let fifths = self.fifths as i32
            + match self.mode {
                Mode::Major => 0,
                Mode::Minor => 3,
            };
        let natural = (fifths + 1).rem_euclid(7) - 1;
        let class = FIFTHS
            .iter()
            .position(|f| *f == natural)
            .unwrap_or(0);
        Pitch::new(class as u8, 0, ((fifths - natural) / 7) as i8)
    }
    /// Alteration implied by the signature for a diatonic class.
    pub fn alteration_for(&self, class: u8) -> i8 {
        // order of sharps: f c g d a e b, which is fifths -1..=5
        let position = FIFTHS[class as usize % 7] + 1;
        let fifths = self.fifths as i32;
        let mut alteration = 0;
        if fifths > 0 {
            alteration += (fifths - position + 6).div_euclid(7) as i8;
        } else if fifths < 0 {
            alteration -= (position - fifths).div_euclid(7) as i8;
        }
        alteration
    }
}
impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            Mode::Major => "major",
            Mode::Minor => "minor",
        };
        write!(f, "{} \\{}", self.tonic(), mode)
    }
}

#[derive(
    Debug, PartialEq, Eq, Hash, Clone, Copy, Default, Serialize, Deserialize,
)]
pub enum Clef {
    #[default]
    Treble,
    Bass,
    Alto,
    Tenor,
    Percussion,
}
impl Clef {
    /// Pitch on the middle line of the staff.
    pub fn middle_line(&self) -> Pitch {
        match self {
            Self::Treble => Pitch::new(6, 1, 0),
            Self::Bass => Pitch::new(1, 0, 0),
            Self::Alto | Self::Percussion => Pitch::new(0, 1, 0),
            Self::Tenor => Pitch::new(5, 0, 0),
        }
    }
    /// Natural pitch at a staff position (0 = middle line, +1 per step).
    pub fn pitch_at(&self, staff_position: i32) -> Pitch {
        Pitch::from_diatonic(
            self.middle_line().diatonic_number() + staff_position,
            0,
        )
    }
    pub fn staff_position(&self, pitch: &Pitch) -> i32 {
        pitch.diatonic_number() - self.middle_line().diatonic_number()
    }
}
impl fmt::Display for Clef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Treble => "treble",
            Self::Bass => "bass",
            Self::Alto => "alto",
            Self::Tenor => "tenor",
            Self::Percussion => "percussion",
        };
        write!(f, "{name}")
    }
}
impl FromStr for Clef {
    type Err = ScoreError;
    fn from_str(s: &str) -> ScoreResult<Self> {
        match s {
            "treble" | "G" | "violin" => Ok(Self::Treble),
            "bass" | "F" => Ok(Self::Bass),
            "alto" | "C" => Ok(Self::Alto),
            "tenor" => Ok(Self::Tenor),
            "percussion" => Ok(Self::Percussion),
            x => Err(ScoreError::MalformedInput(format!("unknown clef: `{x}`"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Clef, Interval, Key, Mode, Pitch};
    use crate::error::ScoreError;

    fn p(s: &str) -> Pitch {
        s.parse().unwrap()
    }

    #[test]
    fn derived_numbers() {
        assert_eq!(p("c'").midi_number(), 60);
        assert_eq!(p("a'").midi_number(), 69);
        assert_eq!(p("c,,").midi_number(), 24);
        assert_eq!(p("bes").midi_number(), 58);
        assert_eq!(p("c'").diatonic_number(), 7);
        assert_eq!(p("es").circle_of_fifths_number(), -3);
        assert_eq!(p("fis").circle_of_fifths_number(), 6);
        assert_eq!(p("c,'"), p("c"));
        assert!(p("g'") < p("c''"));
        assert!(p("cis'") > p("c'"));
    }

    #[test]
    fn display_round_trip() {
        for s in ["c", "cis'", "es,", "as''", "beses", "fisis'"] {
            assert_eq!(p(s).to_string(), s);
        }
        assert!("h".parse::<Pitch>().is_err());
        assert!("cxs".parse::<Pitch>().is_err());
    }

    #[test]
    fn intervals() {
        assert_eq!(p("c'").add_interval(Interval::new(2, -1)).unwrap(), p("es'"));
        assert_eq!(p("f").add_interval(Interval::new(4, 0)).unwrap(), p("c'"));
        assert_eq!(p("b").add_interval(Interval::new(4, 0)).unwrap(), p("fis'"));
        // a minor third down
        assert_eq!(p("d'").add_interval(Interval::new(-2, 0)).unwrap(), p("b"));
        let i = Interval::between(p("e"), p("gis'"));
        assert_eq!(i, Interval::new(9, 0));
        assert_eq!(p("a").add_interval(i).unwrap(), p("cis''"));
        assert!(matches!(
            p("eses").add_interval(Interval::new(0, -1)),
            Err(ScoreError::MalformedInput(_))
        ));
        assert_eq!(p("eses").add_interval(Interval::new(1, 0)).unwrap(), p("fes"));
    }

    #[test]
    fn key_signatures() {
        let es = Key::from_tonic(p("es"), Mode::Major);
        assert_eq!(es.fifths, -3);
        let altered: Vec<i8> = (0..7).map(|c| es.alteration_for(c)).collect();
        // c d e f g a b
        assert_eq!(altered, vec![0, 0, -1, 0, 0, -1, -1]);
        let d = Key::new(2, Mode::Major);
        let altered: Vec<i8> = (0..7).map(|c| d.alteration_for(c)).collect();
        assert_eq!(altered, vec![1, 0, 0, 1, 0, 0, 0]);
        assert_eq!(Key::new(-3, Mode::Minor).tonic(), p("c"));
        assert_eq!(es.tonic(), p("es"));
        assert_eq!(Key::new(6, Mode::Major).tonic(), p("fis"));
        assert_eq!(Key::new(0, Mode::Minor).to_string(), "a \\minor");
    }

    #[test]
    fn clef_positions() {
        assert_eq!(Clef::Treble.pitch_at(0), p("b'"));
        assert_eq!(Clef::Treble.pitch_at(-6), p("c'"));
        assert_eq!(Clef::Bass.pitch_at(2), p("f"));
        assert_eq!(Clef::Alto.staff_position(&p("c'")), 0);
    }
}
