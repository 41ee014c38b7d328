//! Engine-wide settings.
//!
//! Settings are plain data: the editor layer may persist them with serde
//! and hands them to the places that need them (the note-text reader and
//! the meter cursors).

use serde::{Deserialize, Serialize};

use crate::primitives::Span;

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreSettings {
    /// Duration used by the text reader until the first explicit one.
    pub default_duration: Span,
    /// Group compound meters (6/8, 9/8, 12/16...) in dotted beats.
    pub compound_beats: bool,
}
impl ScoreSettings {
    pub fn new(default_duration: Span, compound_beats: bool) -> Self {
        Self {
            default_duration,
            compound_beats,
        }
    }
}
impl Default for ScoreSettings {
    fn default() -> Self {
        Self {
            default_duration: Span::new(1, 4),
            compound_beats: true,
        }
    }
}
