//! Rendering of events back to the note text the reader understands.
//!
//! `read_events(render_events(events))` gives back equal events, as long as
//! every duration is a (dotted) note value.

use itertools::Itertools;

use crate::{
    error::{ScoreError, ScoreResult},
    primitives::{
        decompose_span, get_dot_number, get_undotted_value, Absolute, Clef,
        DecorationKind, Event, Key, Meter, Note, Pitch, Span, StateChange,
    },
};

pub trait RendersToLilypond {
    fn render_lilypond(&self) -> ScoreResult<String>;
}

impl RendersToLilypond for Pitch {
    fn render_lilypond(&self) -> ScoreResult<String> {
        Ok(self.to_string())
    }
}

impl RendersToLilypond for Span {
    /// Single (dotted) note value: `4`, `8.`, `\breve`.
    fn render_lilypond(&self) -> ScoreResult<String> {
        let dots = get_dot_number(*self)?;
        let undotted = get_undotted_value(*self)?.get();
        let value = match (undotted.numerator(), undotted.denominator()) {
            (4, 1) => "\\longa".to_string(),
            (2, 1) => "\\breve".to_string(),
            (_, denominator) => denominator.to_string(),
        };
        Ok(format!("{value}{}", ".".repeat(dots as usize)))
    }
}

impl RendersToLilypond for Key {
    fn render_lilypond(&self) -> ScoreResult<String> {
        Ok(format!("\\key {self}"))
    }
}
impl RendersToLilypond for Clef {
    fn render_lilypond(&self) -> ScoreResult<String> {
        Ok(format!("\\clef {self}"))
    }
}
impl RendersToLilypond for Meter {
    fn render_lilypond(&self) -> ScoreResult<String> {
        Ok(format!("\\time {self}"))
    }
}

impl RendersToLilypond for StateChange {
    fn render_lilypond(&self) -> ScoreResult<String> {
        let key = self.key.map(|k| k.render_lilypond()).transpose()?;
        let clef = self.clef.map(|c| c.render_lilypond()).transpose()?;
        let meter = self.meter.map(|m| m.render_lilypond()).transpose()?;
        Ok([key, clef, meter].into_iter().flatten().join(" "))
    }
}

impl RendersToLilypond for Note {
    /// Note without decoration marks. Values that are not a single note
    /// value are split into tied notes.
    fn render_lilypond(&self) -> ScoreResult<String> {
        let head = match self.pitches.len() {
            0 => "r".to_string(),
            1 => self.pitches[0].render_lilypond()?,
            _ => format!(
                "<{}>",
                self.pitches.iter().map(|p| p.to_string()).join(" ")
            ),
        };
        let grace = match self.grace {
            true => "\\grace ",
            false => "",
        };
        let expressions = self.expressions.iter().join("");
        let parts = duration_tokens(self.duration)?;
        let Some(last) = parts.len().checked_sub(1) else {
            return Err(ScoreError::IllegalDuration(self.duration.get()));
        };
        let words = parts.iter().enumerate().map(|(idx, duration)| {
            let tie = match (idx == last && self.tie) || (idx < last && !self.is_rest()) {
                true => "~",
                false => "",
            };
            match idx {
                0 => format!("{grace}{head}{duration}{tie}{expressions}"),
                _ => format!("{head}{duration}{tie}"),
            }
        });
        Ok(words.collect_vec().join(" "))
    }
}

impl RendersToLilypond for Event {
    fn render_lilypond(&self) -> ScoreResult<String> {
        match self {
            Self::Note(note) => note.render_lilypond(),
            Self::Spacer(spacer) => Ok(duration_tokens(spacer.duration)?
                .iter()
                .map(|d| format!("s{d}"))
                .join(" ")),
            Self::StateChange(state) => state.render_lilypond(),
            Self::LongDecoration(_) => Ok(String::new()),
        }
    }
}

/// Note values adding up to the span, largest first.
fn duration_tokens(span: Span) -> ScoreResult<Vec<String>> {
    match span.render_lilypond() {
        Ok(token) => Ok(vec![token]),
        Err(_) => decompose_span(span)?
            .iter()
            .map(|part| part.render_lilypond())
            .collect(),
    }
}

fn opening_mark(kind: DecorationKind) -> &'static str {
    match kind {
        DecorationKind::Slur => "(",
        DecorationKind::Crescendo => "\\<",
        DecorationKind::Decrescendo => "\\>",
    }
}
fn closing_mark(kind: DecorationKind) -> &'static str {
    match kind {
        DecorationKind::Slur => ")",
        _ => "\\!",
    }
}

/// Render a voice as note text.
///
/// Long decorations become marks on the notes where they start and end.
pub fn render_events(events: &[Event]) -> ScoreResult<String> {
    let mut words = Vec::new();
    let mut time = Absolute::ZERO;
    let mut opening: Vec<&'static str> = Vec::new();
    let mut closing: Vec<(Absolute, &'static str)> = Vec::new();
    for event in events {
        match event {
            Event::LongDecoration(decoration) => {
                opening.push(opening_mark(decoration.kind));
                closing.push((time + decoration.length, closing_mark(decoration.kind)));
                continue;
            }
            Event::Note(note) if !note.grace => {
                let mut marks = closing
                    .iter()
                    .filter(|(end, _)| *end == time)
                    .map(|(_, mark)| *mark)
                    .collect_vec();
                closing.retain(|(end, _)| *end != time);
                marks.append(&mut opening);
                words.push(format!("{}{}", event.render_lilypond()?, marks.join("")));
            }
            _ => words.push(event.render_lilypond()?),
        }
        time += event.duration();
    }
    Ok(words.into_iter().filter(|w| !w.is_empty()).join(" "))
}

#[cfg(test)]
mod tests {
    use super::{render_events, RendersToLilypond};
    use crate::{
        notation::read_events,
        primitives::{Note, Span},
        settings::ScoreSettings,
    };

    #[test]
    fn spans() {
        assert_eq!(Span::new(3, 8).render_lilypond().unwrap(), "8.");
        assert_eq!(Span::new(3, 1).render_lilypond().unwrap(), "\\breve.");
        assert_eq!(Span::new(1, 1).render_lilypond().unwrap(), "1");
        assert!(Span::new(5, 8).render_lilypond().is_err());
    }

    #[test]
    fn long_notes_are_tied() {
        let note = Note::new(vec!["c'".parse().unwrap()], Span::new(5, 8));
        assert_eq!(note.render_lilypond().unwrap(), "c'2~ c'8");
        let rest = Note::rest(Span::new(5, 8));
        assert_eq!(rest.render_lilypond().unwrap(), "r2 r8");
        let chord = Note::new(
            vec!["c'".parse().unwrap(), "e'".parse().unwrap()],
            Span::new(9, 8),
        );
        assert_eq!(chord.render_lilypond().unwrap(), "<c' e'>1~ <c' e'>8");
        assert!(Note::rest(Span::ZERO).render_lilypond().is_err());
    }

    #[test]
    fn renders_back_to_equal_events() {
        let settings = ScoreSettings::default();
        for text in [
            "c'4 d'8.-> <e' g'>16~ e'4 r2",
            "\\key es \\major \\clef bass \\time 3/4 s2.",
            "\\grace d''16 c''8( d'' e''4) f''\\< g'' a''\\!",
        ] {
            let events = read_events(text, &settings).unwrap();
            let rendered = render_events(&events).unwrap();
            assert_eq!(read_events(&rendered, &settings).unwrap(), events, "{rendered}");
        }
    }
}
