//! Feature file parser
//!
//! Understands the subset of Gherkin the acceptance scenarios are written in:
//! `Feature:`, `Background:`, `Scenario:`, tag lines, `#` comments and the
//! step keywords `Given`, `When`, `Then`, `And`, `But` and `*`.
//! Conjunctions take the keyword of the step before them.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKeyword {
    Given,
    When,
    Then,
}

impl StepKeyword {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Given => "Given",
            Self::When => "When",
            Self::Then => "Then",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Resolved keyword (`And`/`But` replaced by the previous one)
    pub keyword: StepKeyword,
    /// Keyword exactly as written in the file
    pub written: String,
    pub text: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub name: String,
    pub tags: Vec<String>,
    pub steps: Vec<Step>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Feature {
    pub name: String,
    pub description: Vec<String>,
    pub tags: Vec<String>,
    pub background: Vec<Step>,
    pub scenarios: Vec<Scenario>,
    pub path: Option<PathBuf>,
}

impl Feature {
    /// Feature tags followed by the scenario's own tags
    pub fn effective_tags<'a>(&'a self, scenario: &'a Scenario) -> impl Iterator<Item = &'a str> {
        self.tags
            .iter()
            .chain(scenario.tags.iter())
            .map(String::as_str)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no 'Feature:' header found")]
    MissingFeature,
    #[error("line {line}: a file can only hold one feature")]
    DuplicateFeature { line: usize },
    #[error("line {line}: '{keyword}' is not supported")]
    Unsupported { line: usize, keyword: String },
    #[error("line {line}: step found before any Background or Scenario")]
    StepOutsideScenario { line: usize },
    #[error("line {line}: '{keyword}' has no preceding step to continue")]
    DanglingConjunction { line: usize, keyword: String },
    #[error("line {line}: background must come before the first scenario")]
    LateBackground { line: usize },
    #[error("line {line}: step without text")]
    EmptyStep { line: usize },
    #[error("line {line}: unexpected content '{content}'")]
    UnexpectedLine { line: usize, content: String },
}

// Where the next step line belongs
enum Block {
    Preamble,
    Background,
    Scenario,
}

const UNSUPPORTED: [&str; 5] = ["Scenario Outline:", "Scenario Template:", "Examples:", "Rule:", "\"\"\""];

/// Parse the source of a single feature file
pub fn parse_feature(source: &str) -> Result<Feature, ParseError> {
    let mut feature: Option<Feature> = None;
    let mut block = Block::Preamble;
    let mut pending_tags: Vec<String> = Vec::new();
    let mut previous: Option<StepKeyword> = None;

    for (idx, raw) in source.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if trimmed.starts_with('@') {
            pending_tags.extend(trimmed.split_whitespace().map(str::to_owned));
            continue;
        }

        if let Some(keyword) = UNSUPPORTED.iter().find(|k| trimmed.starts_with(**k)) {
            return Err(ParseError::Unsupported {
                line,
                keyword: keyword.to_string(),
            });
        }
        if trimmed.starts_with('|') {
            return Err(ParseError::Unsupported {
                line,
                keyword: "data table".to_owned(),
            });
        }

        if let Some(name) = trimmed.strip_prefix("Feature:") {
            if feature.is_some() {
                return Err(ParseError::DuplicateFeature { line });
            }
            feature = Some(Feature {
                name: name.trim().to_owned(),
                tags: std::mem::take(&mut pending_tags),
                ..Default::default()
            });
            continue;
        }

        let Some(current) = feature.as_mut() else {
            return Err(ParseError::MissingFeature);
        };

        if trimmed.starts_with("Background:") {
            if !current.scenarios.is_empty() {
                return Err(ParseError::LateBackground { line });
            }
            block = Block::Background;
            previous = None;
            continue;
        }

        if let Some(name) = trimmed.strip_prefix("Scenario:") {
            current.scenarios.push(Scenario {
                name: name.trim().to_owned(),
                tags: std::mem::take(&mut pending_tags),
                steps: Vec::new(),
                line,
            });
            block = Block::Scenario;
            previous = None;
            continue;
        }

        if let Some((written, text)) = split_step(trimmed) {
            let keyword = match written {
                "Given" => StepKeyword::Given,
                "When" => StepKeyword::When,
                "Then" => StepKeyword::Then,
                _ => previous.ok_or_else(|| ParseError::DanglingConjunction {
                    line,
                    keyword: written.to_owned(),
                })?,
            };
            if text.is_empty() {
                return Err(ParseError::EmptyStep { line });
            }

            let step = Step {
                keyword,
                written: written.to_owned(),
                text: text.to_owned(),
                line,
            };
            match block {
                Block::Preamble => return Err(ParseError::StepOutsideScenario { line }),
                Block::Background => current.background.push(step),
                Block::Scenario => match current.scenarios.last_mut() {
                    Some(scenario) => scenario.steps.push(step),
                    None => return Err(ParseError::StepOutsideScenario { line }),
                },
            }
            previous = Some(keyword);
            continue;
        }

        // Free text is only allowed as a description, before any step of the block
        match block {
            Block::Preamble => current.description.push(trimmed.to_owned()),
            Block::Background if current.background.is_empty() => {}
            Block::Scenario
                if current
                    .scenarios
                    .last()
                    .map(|s| s.steps.is_empty())
                    .unwrap_or(false) => {}
            _ => {
                return Err(ParseError::UnexpectedLine {
                    line,
                    content: trimmed.to_owned(),
                })
            }
        }
    }

    feature.ok_or(ParseError::MissingFeature)
}

fn split_step(line: &str) -> Option<(&str, &str)> {
    ["Given", "When", "Then", "And", "But", "*"]
        .iter()
        .find_map(|keyword| {
            let rest = line.strip_prefix(keyword)?;
            if rest.is_empty() {
                Some((*keyword, ""))
            } else if rest.starts_with(char::is_whitespace) {
                Some((*keyword, rest.trim()))
            } else {
                None
            }
        })
}

/// Read and parse one `.feature` file
pub fn load_feature(path: impl AsRef<Path>) -> Result<Feature> {
    let path = path.as_ref();
    let source = fs::read_to_string(path)
        .with_context(|| format!("Error while reading feature file {}", path.display()))?;
    let mut feature = parse_feature(&source)
        .with_context(|| format!("Error while parsing feature file {}", path.display()))?;
    feature.path = Some(path.to_path_buf());
    Ok(feature)
}

/// Load every `.feature` file of a directory, sorted by file name
pub fn load_features_dir(dir: impl AsRef<Path>) -> Result<Vec<Feature>> {
    let dir = dir.as_ref();
    let mut paths = fs::read_dir(dir)
        .with_context(|| format!("Error while listing features in {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Error while listing features in {}", dir.display()))?;
    paths.retain(|p| p.extension().map(|ext| ext == "feature").unwrap_or(false));
    paths.sort();

    paths.iter().map(|path| load_feature(path)).collect()
}
