//! Elements, from which the score is constructed.
//!
//! At first, text or typed events are collected into sequences.
//! Then sequences are resolved against the variables of a project.
//! Then resolved events are grouped into time slots per voice.
//! Then time slots are analysed for beams, accidentals and state.

pub mod duration;
pub mod event;
pub mod meter;
pub mod pitch;
pub mod rational;
pub mod time;

pub use duration::{
    decompose_span, get_dot_number, get_dotted_value, get_undotted_value,
    parse_duration, LIMIT_DENOMINATOR,
};
pub use event::{
    DecorationKind, Direction, Event, Expression, LongDecoration, Note,
    Spacer, StateChange,
};
pub use meter::{BeatCursor, CursorKind, Meter, MeterMap, RelativePosition};
pub use pitch::{Clef, Interval, Key, Mode, Pitch};
pub use rational::Rational;
pub use time::{tier, Absolute, ExtendedAbsolute, Span, Time};
