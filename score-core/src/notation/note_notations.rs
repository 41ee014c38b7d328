use std::str::FromStr;

use crate::{
    error::{ScoreError, ScoreResult},
    primitives::{parse_duration, Expression, Pitch, Span},
};

/// What a note word sounds like.
#[derive(Debug, PartialEq, Clone)]
pub enum NoteHead {
    Pitches(Vec<Pitch>),
    Rest,
    Spacer,
}

/// Marks opening and closing long decorations.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DecorationMark {
    SlurStart,
    SlurEnd,
    CrescendoStart,
    DecrescendoStart,
    HairpinEnd,
}

/// One note, chord, rest or spacer word: `cis'8.~-.(`, `<c e g>2`, `r4`.
#[derive(Debug, PartialEq, Clone)]
pub struct NoteWord {
    pub head: NoteHead,
    pub duration: Option<Span>,
    pub tie: bool,
    pub expressions: Vec<Expression>,
    pub marks: Vec<DecorationMark>,
}

fn malformed(word: &str, what: &str) -> ScoreError {
    ScoreError::MalformedInput(format!("{what} in `{word}`"))
}

fn split_head(word: &str) -> ScoreResult<(NoteHead, &str)> {
    if let Some(inner) = word.strip_prefix('<') {
        let end = inner
            .find('>')
            .ok_or_else(|| malformed(word, "unclosed chord"))?;
        let pitches = inner[..end]
            .split_whitespace()
            .map(Pitch::from_str)
            .collect::<ScoreResult<Vec<_>>>()?;
        if pitches.is_empty() {
            return Err(malformed(word, "empty chord"));
        }
        return Ok((NoteHead::Pitches(pitches), &inner[end + 1..]));
    }
    if let Some(rest) = word.strip_prefix('r') {
        return Ok((NoteHead::Rest, rest));
    }
    if let Some(rest) = word.strip_prefix('s') {
        return Ok((NoteHead::Spacer, rest));
    }
    let head_len = word
        .find(|c: char| c.is_ascii_digit() || "~-\\().".contains(c))
        .unwrap_or(word.len());
    let pitch = word[..head_len].parse()?;
    Ok((NoteHead::Pitches(vec![pitch]), &word[head_len..]))
}

fn split_duration(word: &str, rest: &str) -> ScoreResult<(Option<Span>, usize)> {
    if rest.starts_with("\\breve") || rest.starts_with("\\longa") {
        let value_len = "\\breve".len();
        let dots = rest[value_len..]
            .chars()
            .take_while(|c| *c == '.')
            .count();
        let duration = parse_duration(&rest[..value_len + dots])?;
        return Ok((Some(duration), value_len + dots));
    }
    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    let dots = rest[digits..].chars().take_while(|c| *c == '.').count();
    match (digits, dots) {
        (0, 0) => Ok((None, 0)),
        (0, _) => Err(malformed(word, "dots without duration")),
        _ => Ok((Some(parse_duration(&rest[..digits + dots])?), digits + dots)),
    }
}

impl FromStr for NoteWord {
    type Err = ScoreError;

    fn from_str(word: &str) -> Result<Self, Self::Err> {
        let (head, rest) = split_head(word)?;
        let (duration, consumed) = split_duration(word, rest)?;
        let mut note = Self {
            head,
            duration,
            tie: false,
            expressions: Vec::new(),
            marks: Vec::new(),
        };
        let mut suffix = &rest[consumed..];
        while let Some(c) = suffix.chars().next() {
            match c {
                '~' => {
                    note.tie = true;
                    suffix = &suffix[1..];
                }
                '(' => {
                    note.marks.push(DecorationMark::SlurStart);
                    suffix = &suffix[1..];
                }
                ')' => {
                    note.marks.push(DecorationMark::SlurEnd);
                    suffix = &suffix[1..];
                }
                '-' => {
                    let token = suffix
                        .get(..2)
                        .ok_or_else(|| malformed(word, "dangling `-`"))?;
                    note.expressions.push(token.parse()?);
                    suffix = &suffix[2..];
                }
                '\\' => {
                    let name_len = suffix[1..]
                        .chars()
                        .take_while(|c| c.is_ascii_alphabetic())
                        .count();
                    let command = match name_len {
                        0 => suffix
                            .get(..2)
                            .ok_or_else(|| malformed(word, "dangling `\\`"))?,
                        len => &suffix[..len + 1],
                    };
                    match command {
                        "\\<" => note.marks.push(DecorationMark::CrescendoStart),
                        "\\>" => {
                            note.marks.push(DecorationMark::DecrescendoStart)
                        }
                        "\\!" => note.marks.push(DecorationMark::HairpinEnd),
                        other => note.expressions.push(other.parse()?),
                    }
                    suffix = &suffix[command.len()..];
                }
                _ => return Err(malformed(word, "unexpected characters")),
            }
        }
        Ok(note)
    }
}
