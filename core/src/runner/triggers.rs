use memchr::memmem;

use crate::error::RunnerError;

/// Ordered, immutable list of literal trigger strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerSet {
    triggers: Vec<String>,
}

impl TriggerSet {
    pub fn new<I, S>(triggers: I) -> Result<Self, RunnerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let triggers = triggers.into_iter().map(Into::into).collect::<Vec<_>>();
        if let Some(pos) = triggers.iter().position(|t| t.is_empty()) {
            return Err(RunnerError::Config(format!(
                "trigger #{} is empty",
                pos + 1
            )));
        }
        Ok(Self { triggers })
    }

    /// Parse a whitespace separated list, e.g. `"Error Warning"`.
    pub fn from_spaced(s: &str) -> Self {
        Self {
            triggers: s.split_whitespace().map(str::to_string).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.triggers.iter().map(String::as_str)
    }

    /// Every trigger contained in `line`, in set order. Duplicates in the set
    /// are reported once each.
    pub fn matches<'a>(&'a self, line: &'a [u8]) -> impl Iterator<Item = &'a str> + 'a {
        self.triggers
            .iter()
            .filter(move |t| memmem::find(line, t.as_bytes()).is_some())
            .map(String::as_str)
    }
}
