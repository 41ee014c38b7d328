//! Core of a music notation document: sequences of events, their
//! resolution against variables, and the analyses a renderer needs:
//! time slots, beam groups, accidentals and the state map.
//!
//! ```
//! use std::sync::Arc;
//! use score_core::{
//!     primitives::{Clef, Key, Meter},
//!     score::{Project, Score, Staff, Voice},
//!     sequence::Sequence,
//!     settings::ScoreSettings,
//! };
//!
//! let settings = ScoreSettings::default();
//! let melody = Sequence::simple("c'8 d' e' f' g'2", &settings)?;
//! let staff = Staff::new(Clef::Treble, Key::default(), Meter::new(4, 4))
//!     .with_voice(Voice::new(Arc::new(melody)));
//! let project = Project::new(Score::new(vec![staff]));
//!
//! let groups = project.beam_groups(0, 0)?;
//! assert_eq!(groups.len(), 2);
//! # Ok::<(), score_core::error::ScoreError>(())
//! ```

pub mod accidentals;
pub mod beaming;
pub mod error;
pub mod lilypond_render;
pub mod notation;
pub mod optics;
pub mod primitives;
pub mod score;
pub mod sequence;
pub mod settings;
pub mod state_map;
pub mod time_slots;
pub mod variables;

pub use error::{ScoreError, ScoreResult};
pub use score::{Project, Score, Staff, Voice};
pub use sequence::Sequence;
pub use settings::ScoreSettings;
pub use variables::VariableRepository;
