//! Named sequences of a project.
//!
//! The repository is never changed in place: `with_variable` and
//! `without_variable` return a new repository, and the old one stays valid
//! for whoever still reads it. Sequences are shared through `Arc`, so the
//! copy is shallow.

use std::{collections::HashMap, sync::Arc};

use crate::sequence::Sequence;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableRepository {
    variables: HashMap<String, Arc<Sequence>>,
}
impl VariableRepository {
    pub fn get(&self, name: &str) -> Option<&Arc<Sequence>> {
        self.variables.get(name)
    }
    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Sorted names of all variables.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> =
            self.variables.keys().map(|k| k.as_str()).collect();
        names.sort();
        names
    }

    pub fn with_variable(
        &self,
        name: impl Into<String>,
        sequence: Arc<Sequence>,
    ) -> Self {
        let mut variables = self.variables.clone();
        variables.insert(name.into(), sequence);
        Self { variables }
    }

    pub fn without_variable(&self, name: &str) -> Self {
        let mut variables = self.variables.clone();
        variables.remove(name);
        Self { variables }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::VariableRepository;
    use crate::{sequence::Sequence, settings::ScoreSettings};

    #[test]
    fn copy_on_write() {
        let settings = ScoreSettings::default();
        let first = VariableRepository::default().with_variable(
            "theme",
            Arc::new(Sequence::simple("c d", &settings).unwrap()),
        );
        let second = first.with_variable(
            "theme",
            Arc::new(Sequence::simple("e", &settings).unwrap()),
        );
        let old = first.get("theme").unwrap().elements(&first).unwrap();
        let new = second.get("theme").unwrap().elements(&second).unwrap();
        assert_eq!((old.len(), new.len()), (2, 1));
        assert_eq!(second.names(), vec!["theme"]);
        assert!(!second.without_variable("theme").contains("theme"));
        assert!(second.contains("theme"));
    }
}
