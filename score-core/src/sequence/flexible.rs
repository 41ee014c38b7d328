//! Sequence with variable references and function calls.
//!
//! Nothing is cached: every read resolves against the repository given, so
//! a changed variable shows up at every place that references it.

use log::debug;

use crate::{
    error::{ScoreError, ScoreResult},
    notation::{read_items, TextItem},
    primitives::Event,
    settings::ScoreSettings,
    variables::VariableRepository,
};

use super::functions::apply_function;

#[derive(Debug, PartialEq, Clone)]
pub enum FlexibleItem {
    Event(Event),
    Variable(String),
    Function(FunctionCall),
}
impl From<Event> for FlexibleItem {
    fn from(value: Event) -> Self {
        Self::Event(value)
    }
}
impl From<TextItem> for FlexibleItem {
    fn from(value: TextItem) -> Self {
        match value {
            TextItem::Event(event) => Self::Event(event),
            TextItem::Variable(name) => Self::Variable(name),
            TextItem::Call {
                name,
                args,
                extra_args,
            } => Self::Function(FunctionCall {
                name,
                args: args.into_iter().map(Self::from).collect(),
                extra_args,
            }),
        }
    }
}

/// `name(args; extra_args)`: `args` are resolved into events and handed to
/// the function together with the plain `extra_args`.
#[derive(Debug, PartialEq, Clone)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<FlexibleItem>,
    pub extra_args: Vec<String>,
}
impl FunctionCall {
    pub fn new(
        name: impl Into<String>,
        args: Vec<FlexibleItem>,
        extra_args: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            args,
            extra_args: extra_args.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct FlexibleSequence {
    pub items: Vec<FlexibleItem>,
}
impl FlexibleSequence {
    pub fn new(items: Vec<FlexibleItem>) -> Self {
        Self { items }
    }

    /// Note text, where `$name` becomes a variable reference and
    /// `@Name(extra, args, text)` a function call.
    pub fn from_text(text: &str, settings: &ScoreSettings) -> ScoreResult<Self> {
        Ok(Self::new(
            read_items(text, settings)?
                .into_iter()
                .map(FlexibleItem::from)
                .collect(),
        ))
    }

    pub(crate) fn resolve(
        &self,
        variables: &VariableRepository,
        stack: &mut Vec<String>,
    ) -> ScoreResult<Vec<Event>> {
        let mut events = Vec::new();
        for item in self.items.iter() {
            events.append(&mut resolve_item(item, variables, stack)?);
        }
        Ok(events)
    }

    /// Number of resolved events every item produces.
    pub fn item_lengths(
        &self,
        variables: &VariableRepository,
    ) -> ScoreResult<Vec<usize>> {
        self.items
            .iter()
            .map(|item| Ok(resolve_item(item, variables, &mut Vec::new())?.len()))
            .collect()
    }
}

pub(crate) fn resolve_item(
    item: &FlexibleItem,
    variables: &VariableRepository,
    stack: &mut Vec<String>,
) -> ScoreResult<Vec<Event>> {
    match item {
        FlexibleItem::Event(event) => Ok(vec![event.clone()]),
        FlexibleItem::Variable(name) => {
            if stack.contains(name) {
                return Err(ScoreError::CyclicVariable(name.clone()));
            }
            let sequence = variables
                .get(name)
                .ok_or_else(|| ScoreError::UndefinedVariable(name.clone()))?;
            debug!("resolving variable `{name}`");
            stack.push(name.clone());
            let events = sequence.resolve(variables, stack);
            stack.pop();
            events
        }
        FlexibleItem::Function(call) => {
            let mut args = Vec::new();
            for arg in call.args.iter() {
                args.append(&mut resolve_item(arg, variables, stack)?);
            }
            apply_function(&call.name, args, &call.extra_args)
        }
    }
}
