//! Reader of the compact note text used to fill sequences.
//!
//! The text is a whitespace-separated list of words:
//!
//! - notes `cis'8.~`, chords `<c e g>2`, rests `r4`, spacers `s4` or
//!   `\skip 4`;
//! - expressions `-.`, `->`, `--`, `-^`, `\fermata` and decoration marks
//!   `(`, `)`, `\<`, `\>`, `\!` attached to a note word;
//! - `\grace` before a note word;
//! - state commands `\key es \major`, `\clef bass`, `\meter 3/4` (or
//!   `\time 3/4`);
//! - `$name` variable references and `@Name(extra, args, text)` function
//!   calls (only where the caller accepts them);
//! - `%` comments up to the end of line.
//!
//! A duration carries over to the following words until the next one is
//! given; the first default comes from [`ScoreSettings`].
//!
//! In a call, every comma-separated part but the last is a plain argument,
//! the last one is note text read with the duration current at the call.
//! Calls nest and must fit on one line.
//!
//! ```
//! use score_core::{notation::{read_items, TextItem}, settings::ScoreSettings};
//!
//! let items = read_items("c8 @Transpose(c', g', d e $theme) f", &ScoreSettings::default())?;
//! assert_eq!(items.len(), 3);
//! assert!(matches!(&items[1], TextItem::Call { name, .. } if name == "Transpose"));
//! # Ok::<(), score_core::error::ScoreError>(())
//! ```
//!
//! ```
//! use score_core::{notation::read_events, settings::ScoreSettings};
//!
//! let events = read_events("c'8 d' \\clef bass <e g>4.", &ScoreSettings::default())?;
//! assert_eq!(events.len(), 4);
//! # Ok::<(), score_core::error::ScoreError>(())
//! ```

use log::trace;

use crate::{
    error::{ScoreError, ScoreResult},
    primitives::{
        parse_duration, Absolute, DecorationKind, Event, Key, LongDecoration,
        Mode, Note, Pitch, Spacer, Span, StateChange,
    },
    settings::ScoreSettings,
};

use self::note_notations::{DecorationMark, NoteHead, NoteWord};

pub mod note_notations;

/// Item of a text that may reference variables.
#[derive(Debug, PartialEq, Clone)]
pub enum TextItem {
    Event(Event),
    Variable(String),
    Call {
        name: String,
        args: Vec<TextItem>,
        extra_args: Vec<String>,
    },
}

/// Read a text that holds only events.
///
/// # Errors
///
/// [`ScoreError::MalformedInput`] for unreadable words, `$name` references
/// and function calls.
pub fn read_events(
    text: &str,
    settings: &ScoreSettings,
) -> ScoreResult<Vec<Event>> {
    read_items(text, settings)?
        .into_iter()
        .map(|item| match item {
            TextItem::Event(event) => Ok(event),
            TextItem::Variable(name) => Err(ScoreError::MalformedInput(
                format!("variable `${name}` outside of a flexible sequence"),
            )),
            TextItem::Call { name, .. } => Err(ScoreError::MalformedInput(
                format!("call of `@{name}` outside of a flexible sequence"),
            )),
        })
        .collect()
}

/// Read a text that may reference variables with `$name` and call
/// functions with `@Name(...)`.
pub fn read_items(
    text: &str,
    settings: &ScoreSettings,
) -> ScoreResult<Vec<TextItem>> {
    let mut reader = Reader::new(settings);
    let mut words = split_words(text)?.into_iter();
    while let Some(word) = words.next() {
        reader.read_word(word, &mut words)?;
    }
    reader.finish()
}

/// Split text into words, keeping chords (`<c e g>4.`) and calls
/// (`@Repeat(2, c d)`) together.
fn split_words(text: &str) -> ScoreResult<Vec<&str>> {
    let mut words = Vec::new();
    for line in text.lines() {
        let line = match line.find('%') {
            Some(comment) => &line[..comment],
            None => line,
        };
        let mut rest = line.trim_start();
        while !rest.is_empty() {
            let group_end = match rest.chars().next() {
                Some('<') => rest.find('>').ok_or_else(|| {
                    ScoreError::MalformedInput(format!("unclosed chord: `{rest}`"))
                })?,
                Some('@') => call_end(rest).ok_or_else(|| {
                    ScoreError::MalformedInput(format!("unclosed call: `{rest}`"))
                })?,
                _ => 0,
            };
            let end = rest[group_end..]
                .find(char::is_whitespace)
                .map(|idx| idx + group_end)
                .unwrap_or(rest.len());
            words.push(&rest[..end]);
            rest = rest[end..].trim_start();
        }
    }
    Ok(words)
}

/// Index of the parenthesis closing the first opened one.
fn call_end(text: &str) -> Option<usize> {
    let mut depth = 0;
    for (idx, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' if depth == 1 => return Some(idx),
            ')' => depth -= 1,
            _ => (),
        }
    }
    None
}

/// Split on commas outside of parentheses.
fn split_arguments(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0;
    let mut start = 0;
    for (idx, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&text[start..idx]);
                start = idx + 1;
            }
            _ => (),
        }
    }
    parts.push(&text[start..]);
    parts
}

fn read_call(word: &str, settings: &ScoreSettings) -> ScoreResult<TextItem> {
    let malformed =
        || ScoreError::MalformedInput(format!("bad function call: `{word}`"));
    let (name, inner) = word
        .strip_prefix('@')
        .and_then(|call| call.strip_suffix(')'))
        .and_then(|call| call.split_once('('))
        .ok_or_else(malformed)?;
    if name.is_empty() || !name.chars().all(char::is_alphanumeric) {
        return Err(malformed());
    }
    let mut parts = split_arguments(inner);
    let text = parts.pop().unwrap_or_default();
    Ok(TextItem::Call {
        name: name.to_string(),
        args: read_items(text, settings)?,
        extra_args: parts.iter().map(|part| part.trim().to_string()).collect(),
    })
}

/// Try to get the argument of a command, and return an error at fail.
fn get_argument<'a>(
    words: &mut impl Iterator<Item = &'a str>,
    command: &str,
) -> ScoreResult<&'a str> {
    words.next().ok_or_else(|| {
        ScoreError::MalformedInput(format!("`{command}` needs an argument"))
    })
}

/// Decoration that is waiting for its closing note.
#[derive(Debug, Clone, Copy)]
struct OpenDecoration {
    index: usize,
    start: Absolute,
}

struct Reader {
    settings: ScoreSettings,
    items: Vec<TextItem>,
    duration: Span,
    time: Absolute,
    grace_next: bool,
    slur: Option<OpenDecoration>,
    hairpin: Option<OpenDecoration>,
}
impl Reader {
    fn new(settings: &ScoreSettings) -> Self {
        Self {
            settings: *settings,
            items: Vec::new(),
            duration: settings.default_duration,
            time: Absolute::ZERO,
            grace_next: false,
            slur: None,
            hairpin: None,
        }
    }

    fn read_word<'a>(
        &mut self,
        word: &'a str,
        words: &mut impl Iterator<Item = &'a str>,
    ) -> ScoreResult<()> {
        trace!("reading word `{word}`");
        match word {
            "\\grace" => {
                self.grace_next = true;
                Ok(())
            }
            "\\key" => {
                let tonic: Pitch = get_argument(words, word)?.parse()?;
                let mode = match get_argument(words, word)? {
                    "\\major" => Mode::Major,
                    "\\minor" => Mode::Minor,
                    other => {
                        return Err(ScoreError::MalformedInput(format!(
                            "unknown mode: `{other}`"
                        )))
                    }
                };
                self.push_event(StateChange::key(Key::from_tonic(tonic, mode)))
            }
            "\\clef" => {
                let clef = get_argument(words, word)?.parse()?;
                self.push_event(StateChange::clef(clef))
            }
            "\\meter" | "\\time" => {
                let meter = get_argument(words, word)?.parse()?;
                self.push_event(StateChange::meter(meter))
            }
            "\\skip" => {
                let duration = parse_duration(get_argument(words, word)?)?;
                self.duration = duration;
                self.push_event(Spacer { duration })
            }
            "(" | ")" | "\\<" | "\\>" | "\\!" => Err(ScoreError::MalformedInput(
                format!("`{word}` must be attached to a note"),
            )),
            _ if word.starts_with('$') => self.push_variable(&word[1..]),
            _ if word.starts_with('@') => {
                let settings = ScoreSettings {
                    default_duration: self.duration,
                    ..self.settings
                };
                let call = read_call(word, &settings)?;
                self.push_reference(call, word)
            }
            _ => self.push_note_word(word.parse()?),
        }
    }

    fn push_event(&mut self, event: impl Into<Event>) -> ScoreResult<()> {
        if self.grace_next {
            return Err(ScoreError::MalformedInput(
                "`\\grace` must be followed by a note".to_string(),
            ));
        }
        let event = event.into();
        self.time += event.duration();
        self.items.push(TextItem::Event(event));
        Ok(())
    }

    fn push_variable(&mut self, name: &str) -> ScoreResult<()> {
        if name.is_empty() {
            return Err(ScoreError::MalformedInput(
                "variable reference without a name".to_string(),
            ));
        }
        self.push_reference(TextItem::Variable(name.to_string()), name)
    }

    /// Variables and calls have no known duration here.
    fn push_reference(&mut self, item: TextItem, word: &str) -> ScoreResult<()> {
        if self.grace_next {
            return Err(ScoreError::MalformedInput(format!(
                "`\\grace` can not be applied to `{word}`"
            )));
        }
        if self.slur.is_some() || self.hairpin.is_some() {
            return Err(ScoreError::MalformedInput(format!(
                "decoration spans over `{word}`"
            )));
        }
        self.items.push(item);
        Ok(())
    }

    fn push_note_word(&mut self, word: NoteWord) -> ScoreResult<()> {
        if let Some(duration) = word.duration {
            self.duration = duration;
        }
        for mark in word.marks.iter() {
            self.apply_mark(*mark)?;
        }
        let grace = std::mem::take(&mut self.grace_next);
        match word.head {
            NoteHead::Spacer if grace => Err(ScoreError::MalformedInput(
                "spacer can not be a grace note".to_string(),
            )),
            NoteHead::Spacer => self.push_event(Spacer {
                duration: self.duration,
            }),
            head => {
                let pitches = match head {
                    NoteHead::Pitches(pitches) => pitches,
                    _ => Vec::new(),
                };
                let mut note = Note::new(pitches, self.duration);
                note.tie = word.tie;
                note.grace = grace;
                note.expressions = word.expressions;
                self.push_event(note)
            }
        }
    }

    /// Open decorations start at the note carrying the mark. Closing marks
    /// end the decoration at the start of their note.
    fn apply_mark(&mut self, mark: DecorationMark) -> ScoreResult<()> {
        match mark {
            DecorationMark::SlurStart => {
                if self.slur.is_some() {
                    return Err(ScoreError::MalformedInput(
                        "nested slurs".to_string(),
                    ));
                }
                self.slur = Some(self.open(DecorationKind::Slur));
            }
            DecorationMark::SlurEnd => {
                let open = self.slur.take().ok_or_else(|| {
                    ScoreError::MalformedInput("unopened slur".to_string())
                })?;
                self.close(open);
            }
            DecorationMark::CrescendoStart | DecorationMark::DecrescendoStart => {
                if let Some(open) = self.hairpin.take() {
                    self.close(open);
                }
                let kind = match mark {
                    DecorationMark::CrescendoStart => DecorationKind::Crescendo,
                    _ => DecorationKind::Decrescendo,
                };
                self.hairpin = Some(self.open(kind));
            }
            DecorationMark::HairpinEnd => {
                let open = self.hairpin.take().ok_or_else(|| {
                    ScoreError::MalformedInput("unopened hairpin".to_string())
                })?;
                self.close(open);
            }
        }
        Ok(())
    }

    fn open(&mut self, kind: DecorationKind) -> OpenDecoration {
        let index = self.items.len();
        self.items.push(TextItem::Event(Event::LongDecoration(
            LongDecoration {
                kind,
                length: Span::ZERO,
                direction: None,
            },
        )));
        OpenDecoration {
            index,
            start: self.time,
        }
    }

    fn close(&mut self, open: OpenDecoration) {
        if let Some(TextItem::Event(Event::LongDecoration(decoration))) =
            self.items.get_mut(open.index)
        {
            decoration.length = self.time - open.start;
        }
    }

    fn finish(self) -> ScoreResult<Vec<TextItem>> {
        if self.grace_next {
            return Err(ScoreError::MalformedInput(
                "`\\grace` at the end of text".to_string(),
            ));
        }
        if self.slur.is_some() || self.hairpin.is_some() {
            return Err(ScoreError::MalformedInput(
                "decoration is not closed".to_string(),
            ));
        }
        Ok(self.items)
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::{read_events, read_items, split_words, TextItem};
    use crate::{
        error::ScoreError,
        primitives::{
            Clef, DecorationKind, Event, Key, Meter, Mode, Span, StateChange,
        },
        settings::ScoreSettings,
    };

    fn read(text: &str) -> Vec<Event> {
        read_events(text, &ScoreSettings::default()).unwrap()
    }

    #[test]
    fn words() {
        assert_eq!(
            split_words("c4 <c e  g>8.~ % comment\n  r").unwrap(),
            vec!["c4", "<c e  g>8.~", "r"]
        );
    }

    #[test]
    fn durations_carry_over() {
        let durations = read("c d8 e f2. g")
            .iter()
            .map(|e| e.duration())
            .collect_vec();
        assert_eq!(
            durations,
            vec![
                Span::new(1, 4),
                Span::new(1, 8),
                Span::new(1, 8),
                Span::new(3, 4),
                Span::new(3, 4),
            ]
        );
        let settings = ScoreSettings::new(Span::new(1, 8), true);
        let events = read_events("c d", &settings).unwrap();
        assert_eq!(events[1].duration(), Span::new(1, 8));
    }

    #[test]
    fn states_and_spacers() {
        let events = read("\\key es \\major \\clef bass \\time 3/4 \\skip 2 s4");
        assert_eq!(
            events[0],
            Event::StateChange(StateChange::key(Key::new(-3, Mode::Major)))
        );
        assert_eq!(events[1], Event::StateChange(StateChange::clef(Clef::Bass)));
        assert_eq!(
            events[2],
            Event::StateChange(StateChange::meter(Meter::new(3, 4)))
        );
        assert_eq!(events[3].duration(), Span::new(1, 2));
        assert_eq!(events[4].duration(), Span::new(1, 4));
    }

    #[test]
    fn grace_and_chords() {
        let events = read("\\grace d'16 <c' e' g'>4 r");
        let grace = events[0].as_note().unwrap();
        assert!(grace.grace);
        assert_eq!(events[0].duration(), Span::ZERO);
        assert_eq!(events[1].as_note().unwrap().pitches.len(), 3);
        assert!(events[2].as_note().unwrap().is_rest());
        assert_eq!(events[2].duration(), Span::new(1, 4));
    }

    #[test]
    fn decorations_span_to_closing_note() {
        let events = read("c8( d e f) g4\\< a b\\!");
        let decorations = events
            .iter()
            .filter_map(|e| match e {
                Event::LongDecoration(d) => Some((d.kind, d.length)),
                _ => None,
            })
            .collect_vec();
        assert_eq!(
            decorations,
            vec![
                (DecorationKind::Slur, Span::new(3, 8)),
                (DecorationKind::Crescendo, Span::new(1, 2)),
            ]
        );
        assert!(matches!(events[0], Event::LongDecoration(_)));
        assert!(matches!(events[5], Event::LongDecoration(_)));
    }

    #[test]
    fn variables() {
        let items = read_items("c $theme d", &ScoreSettings::default()).unwrap();
        assert_eq!(items[1], TextItem::Variable("theme".to_string()));
        assert!(matches!(
            read_events("c $theme", &ScoreSettings::default()),
            Err(ScoreError::MalformedInput(_))
        ));
    }

    #[test]
    fn function_calls() {
        let settings = ScoreSettings::default();
        let items = read_items("c8 @Transpose(c', g', d e $theme) f", &settings).unwrap();
        assert_eq!(items.len(), 3);
        let TextItem::Call { name, args, extra_args } = &items[1] else {
            panic!("call expected, got {:?}", items[1]);
        };
        assert_eq!(name, "Transpose");
        assert_eq!(extra_args, &vec!["c'".to_string(), "g'".to_string()]);
        assert_eq!(args.len(), 3);
        assert!(matches!(&args[0], TextItem::Event(e) if e.duration() == Span::new(1, 8)));
        assert_eq!(args[2], TextItem::Variable("theme".to_string()));
        assert!(matches!(&items[2], TextItem::Event(e) if e.duration() == Span::new(1, 8)));

        let items = read_items("@Repeat(2, @Tuplet(2/3, c8( d e)))", &settings).unwrap();
        let TextItem::Call { name, args, extra_args } = &items[0] else {
            panic!("call expected, got {:?}", items[0]);
        };
        assert_eq!((name.as_str(), extra_args.len()), ("Repeat", 1));
        let TextItem::Call { name, args, .. } = &args[0] else {
            panic!("nested call expected, got {:?}", args[0]);
        };
        assert_eq!(name, "Tuplet");
        assert_eq!(args.len(), 4);

        for text in [
            "@Repeat(2, c d",
            "@(c d)",
            "@Grace(c)x",
            "c4( @Grace(d) e)",
            "\\grace @Grace(d)",
        ] {
            assert!(read_items(text, &settings).is_err(), "{text}");
        }
        assert!(read_events("@Grace(c)", &settings).is_err());
        assert_eq!(split_words("a @R(1, b  c) d").unwrap(), vec!["a", "@R(1, b  c)", "d"]);
    }

    #[test]
    fn malformed() {
        for text in [
            "c4 (",
            "c4( d",
            "d)",
            "\\grace",
            "\\grace \\clef bass c",
            "\\key c",
            "\\key c \\dorian",
            "\\clef",
            "\\time 3/5",
            "c4\\< $x d\\!",
            "c7",
        ] {
            assert!(
                read_events(text, &ScoreSettings::default()).is_err(),
                "{text}"
            );
        }
    }
}
