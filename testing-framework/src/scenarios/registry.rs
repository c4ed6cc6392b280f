//! Step registry
//!
//! Step definitions pair a regular expression with a handler. Matching
//! ignores the keyword a step was written with, a `Then` definition answers
//! to `Given` text as well. Patterns are expected to be anchored (`^...$`).

use std::{fmt, str::FromStr};

use anyhow::{anyhow, Context, Result};
use futures::future::LocalBoxFuture;
use regex::Regex;

use super::parser::StepKeyword;

pub type StepFuture<'a> = LocalBoxFuture<'a, Result<()>>;

/// Handler of a step: borrows the scenario world for the duration of the step
pub type StepFn<W> = for<'a> fn(&'a mut W, StepArgs) -> StepFuture<'a>;

/// Values captured from the step text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepArgs {
    text: String,
    captures: Vec<String>,
}

impl StepArgs {
    pub fn new(text: impl Into<String>, captures: Vec<String>) -> Self {
        Self {
            text: text.into(),
            captures,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.captures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }

    pub fn get(&self, idx: usize) -> Result<&str> {
        self.captures
            .get(idx)
            .map(String::as_str)
            .ok_or_else(|| anyhow!("step '{}' has no capture #{}", self.text, idx))
    }

    pub fn parse<T>(&self, idx: usize) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let raw = self.get(idx)?;
        raw.parse::<T>()
            .map_err(|e| anyhow!("{}", e))
            .with_context(|| format!("invalid value '{}' in step '{}'", raw, self.text))
    }
}

pub struct StepDefinition<W> {
    keyword: StepKeyword,
    pattern: Regex,
    handler: StepFn<W>,
}

impl<W> StepDefinition<W> {
    pub fn keyword(&self) -> StepKeyword {
        self.keyword
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn handler(&self) -> StepFn<W> {
        self.handler
    }
}

impl<W> fmt::Debug for StepDefinition<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} /{}/", self.keyword.as_str(), self.pattern.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    Undefined,
    // Patterns of every definition that matched
    Ambiguous(Vec<String>),
}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("no step definition matches"),
            Self::Ambiguous(patterns) => {
                write!(f, "{} step definitions match: {}", patterns.len(), patterns.join(", "))
            }
        }
    }
}

impl std::error::Error for MatchError {}

pub struct StepRegistry<W> {
    definitions: Vec<StepDefinition<W>>,
}

impl<W> Default for StepRegistry<W> {
    fn default() -> Self {
        Self {
            definitions: Vec::new(),
        }
    }
}

impl<W> StepRegistry<W> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        keyword: StepKeyword,
        pattern: &str,
        handler: StepFn<W>,
    ) -> Result<&mut Self, regex::Error> {
        let pattern = Regex::new(pattern)?;
        self.definitions.push(StepDefinition {
            keyword,
            pattern,
            handler,
        });
        Ok(self)
    }

    pub fn given(&mut self, pattern: &str, handler: StepFn<W>) -> Result<&mut Self, regex::Error> {
        self.register(StepKeyword::Given, pattern, handler)
    }

    pub fn when(&mut self, pattern: &str, handler: StepFn<W>) -> Result<&mut Self, regex::Error> {
        self.register(StepKeyword::When, pattern, handler)
    }

    pub fn then(&mut self, pattern: &str, handler: StepFn<W>) -> Result<&mut Self, regex::Error> {
        self.register(StepKeyword::Then, pattern, handler)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn definitions(&self) -> &[StepDefinition<W>] {
        &self.definitions
    }

    /// Find the single definition matching `text` and extract its captures
    pub fn find(&self, text: &str) -> Result<(&StepDefinition<W>, StepArgs), MatchError> {
        let mut found: Option<(&StepDefinition<W>, StepArgs)> = None;
        let mut patterns: Vec<String> = Vec::new();

        for definition in &self.definitions {
            let Some(captures) = definition.pattern.captures(text) else {
                continue;
            };
            patterns.push(definition.pattern.as_str().to_owned());
            if found.is_none() {
                // Optional groups that did not participate are passed as empty strings
                let values = captures
                    .iter()
                    .skip(1)
                    .map(|m| m.map(|m| m.as_str().to_owned()).unwrap_or_default())
                    .collect();
                found = Some((definition, StepArgs::new(text, values)));
            }
        }

        match (found, patterns.len()) {
            (Some(found), 1) => Ok(found),
            (Some(_), _) => Err(MatchError::Ambiguous(patterns)),
            (None, _) => Err(MatchError::Undefined),
        }
    }
}
