//! Scenario execution engine
//!
//! Runs parsed features against a [`StepRegistry`], one scenario at a time.
//! Every scenario gets a fresh world from the factory handed to
//! [`ScenarioExecutor::run`], background steps run before the scenario's own
//! steps, and each step is bounded by the configured step timeout. The first
//! step that does not pass marks the scenario failed and skips the rest.
//!
//! # Example
//!
//! ```rust,ignore
//! use acceptance_testing_framework::scenarios::{load_features_dir, RunnerOptions, ScenarioExecutor};
//!
//! let features = load_features_dir("features")?;
//! let executor = ScenarioExecutor::new(steps::registry()?, RunnerOptions::default());
//! let report = executor.run(&features, || AcceptanceWorld::new(...)).await;
//!
//! assert!(report.is_success());
//! ```

use std::{
    fmt,
    time::{Duration, Instant},
};

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};

use acceptance_common::config::DEFAULT_STEP_TIMEOUT;

use super::{
    parser::{Feature, Scenario, Step, StepKeyword},
    registry::{MatchError, StepRegistry},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Passed,
    Failed(String),
    Skipped,
    Undefined,
    Ambiguous(Vec<String>),
    TimedOut(Duration),
}

impl StepStatus {
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => f.write_str("passed"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
            Self::Skipped => f.write_str("skipped"),
            Self::Undefined => f.write_str("undefined"),
            Self::Ambiguous(patterns) => write!(f, "ambiguous ({})", patterns.join(" | ")),
            Self::TimedOut(after) => write!(f, "timed out after {}s", after.as_secs()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StepReport {
    pub keyword: StepKeyword,
    pub text: String,
    pub line: usize,
    pub status: StepStatus,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub feature: String,
    pub name: String,
    pub tags: Vec<String>,
    pub steps: Vec<StepReport>,
    /// Set when the world could not be built, no step ran
    pub setup_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl ScenarioReport {
    pub fn is_success(&self) -> bool {
        self.setup_error.is_none() && self.steps.iter().all(|s| s.status.is_passed())
    }

    /// The step that stopped the scenario, if any
    pub fn failed_step(&self) -> Option<&StepReport> {
        self.steps
            .iter()
            .find(|s| !s.status.is_passed() && !s.status.is_skipped())
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub scenarios: Vec<ScenarioReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn passed(&self) -> usize {
        self.scenarios.iter().filter(|s| s.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.scenarios.len() - self.passed()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScenarioReport> {
        self.scenarios.iter().filter(|s| !s.is_success())
    }

    pub fn summary(&self) -> String {
        let steps = self.scenarios.iter().flat_map(|s| s.steps.iter());
        let (mut passed, mut skipped, mut other) = (0usize, 0usize, 0usize);
        for step in steps {
            match step.status {
                StepStatus::Passed => passed += 1,
                StepStatus::Skipped => skipped += 1,
                _ => other += 1,
            }
        }

        format!(
            "{} scenarios ({} passed, {} failed), {} steps ({} passed, {} failed, {} skipped) in {}s",
            self.scenarios.len(),
            self.passed(),
            self.failed(),
            passed + skipped + other,
            passed,
            other,
            skipped,
            (self.finished_at - self.started_at).num_seconds()
        )
    }
}

#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub step_timeout: Duration,
    /// Run only scenarios carrying one of these tags (with or without `@`)
    pub tags: Vec<String>,
    /// Run only scenarios whose name contains this text
    pub name_filter: Option<String>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            step_timeout: DEFAULT_STEP_TIMEOUT,
            tags: Vec::new(),
            name_filter: None,
        }
    }
}

impl RunnerOptions {
    fn selects(&self, feature: &Feature, scenario: &Scenario) -> bool {
        if let Some(filter) = &self.name_filter {
            if !scenario.name.contains(filter.as_str()) {
                return false;
            }
        }

        if self.tags.is_empty() {
            return true;
        }
        feature.effective_tags(scenario).any(|tag| {
            self.tags
                .iter()
                .any(|wanted| wanted.trim_start_matches('@') == tag.trim_start_matches('@'))
        })
    }
}

/// Scenario executor that runs parsed features with a step registry
pub struct ScenarioExecutor<W> {
    registry: StepRegistry<W>,
    options: RunnerOptions,
}

impl<W> ScenarioExecutor<W> {
    pub fn new(registry: StepRegistry<W>, options: RunnerOptions) -> Self {
        Self { registry, options }
    }

    pub fn registry(&self) -> &StepRegistry<W> {
        &self.registry
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Run every selected scenario of `features`, in file order
    pub async fn run<F>(&self, features: &[Feature], mut make_world: F) -> RunReport
    where
        F: FnMut() -> Result<W>,
    {
        let started_at = Utc::now();
        let mut scenarios = Vec::new();

        for feature in features {
            let selected: Vec<&Scenario> = feature
                .scenarios
                .iter()
                .filter(|s| self.options.selects(feature, s))
                .collect();
            if selected.is_empty() {
                debug!("No scenario selected in feature '{}'", feature.name);
                continue;
            }

            info!("Feature: {} ({} scenarios)", feature.name, selected.len());
            for scenario in selected {
                let report = self.run_scenario(feature, scenario, make_world()).await;
                scenarios.push(report);
            }
        }

        if scenarios.is_empty() {
            warn!("No scenario matched the current filters");
        }

        RunReport {
            scenarios,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Run a single scenario (background included) on the given world
    pub async fn run_scenario(
        &self,
        feature: &Feature,
        scenario: &Scenario,
        world: Result<W>,
    ) -> ScenarioReport {
        let started_at = Utc::now();
        let clock = Instant::now();
        info!("Scenario: {}", scenario.name);

        let steps = feature.background.iter().chain(scenario.steps.iter());
        let mut report = ScenarioReport {
            feature: feature.name.clone(),
            name: scenario.name.clone(),
            tags: feature.effective_tags(scenario).map(str::to_owned).collect(),
            steps: Vec::new(),
            setup_error: None,
            started_at,
            duration: Duration::ZERO,
        };

        let mut world = match world {
            Ok(world) => world,
            Err(e) => {
                error!("Could not prepare scenario '{}': {:#}", scenario.name, e);
                report.setup_error = Some(format!("{:#}", e));
                report.steps = steps.map(skipped).collect();
                report.duration = clock.elapsed();
                return report;
            }
        };

        let mut halted = false;
        for step in steps {
            if halted {
                report.steps.push(skipped(step));
                continue;
            }

            let started = Instant::now();
            let status = self.run_step(&mut world, step).await;
            let duration = started.elapsed();

            if status.is_passed() {
                info!("  {} {} ({}ms)", step.written, step.text, duration.as_millis());
            } else {
                error!("  {} {} [line {}]: {}", step.written, step.text, step.line, status);
                halted = true;
            }

            report.steps.push(StepReport {
                keyword: step.keyword,
                text: step.text.clone(),
                line: step.line,
                status,
                duration,
            });
        }

        report.duration = clock.elapsed();
        if report.is_success() {
            info!("Scenario '{}' passed in {}s", scenario.name, report.duration.as_secs());
        } else {
            warn!("Scenario '{}' failed", scenario.name);
        }
        report
    }

    async fn run_step(&self, world: &mut W, step: &Step) -> StepStatus {
        let (definition, args) = match self.registry.find(&step.text) {
            Ok(found) => found,
            Err(MatchError::Undefined) => return StepStatus::Undefined,
            Err(MatchError::Ambiguous(patterns)) => return StepStatus::Ambiguous(patterns),
        };

        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "Running '{}' with {:?} as {:?}",
                step.text,
                args,
                definition
            );
        }

        let handler = definition.handler();
        let timeout = self.options.step_timeout;
        match tokio::time::timeout(timeout, handler(world, args)).await {
            Ok(Ok(())) => StepStatus::Passed,
            Ok(Err(e)) => StepStatus::Failed(format!("{:#}", e)),
            Err(_) => StepStatus::TimedOut(timeout),
        }
    }
}

fn skipped(step: &Step) -> StepReport {
    StepReport {
        keyword: step.keyword,
        text: step.text.clone(),
        line: step.line,
        status: StepStatus::Skipped,
        duration: Duration::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::{parse_feature, StepArgs, StepFuture};
    use anyhow::{anyhow, ensure};

    #[derive(Default)]
    struct Tally {
        value: i64,
    }

    fn start_at(world: &mut Tally, args: StepArgs) -> StepFuture<'_> {
        Box::pin(async move {
            world.value = args.parse(0)?;
            Ok(())
        })
    }

    fn add(world: &mut Tally, args: StepArgs) -> StepFuture<'_> {
        Box::pin(async move {
            world.value += args.parse::<i64>(0)?;
            Ok(())
        })
    }

    fn expect(world: &mut Tally, args: StepArgs) -> StepFuture<'_> {
        Box::pin(async move {
            let wanted: i64 = args.parse(0)?;
            ensure!(world.value == wanted, "tally is {}, expected {}", world.value, wanted);
            Ok(())
        })
    }

    fn stall(_world: &mut Tally, _args: StepArgs) -> StepFuture<'_> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        })
    }

    fn registry() -> StepRegistry<Tally> {
        let mut registry = StepRegistry::new();
        registry
            .given(r"^a tally of (-?\d+)$", start_at)
            .unwrap()
            .when(r"^I add (-?\d+)$", add)
            .unwrap()
            .then(r"^the tally is (-?\d+)$", expect)
            .unwrap()
            .when(r"^nothing ever happens$", stall)
            .unwrap();
        registry
    }

    const FEATURE: &str = r#"
Feature: Tally
  Background:
    Given a tally of 10

  @fast
  Scenario: Adding
    When I add 5
    Then the tally is 15

  Scenario: Wrong total
    When I add 1
    Then the tally is 99
    And the tally is 11

  Scenario: Unknown step
    When I multiply by 2
    Then the tally is 20
"#;

    #[tokio::test]
    async fn test_run_report() {
        let feature = parse_feature(FEATURE).unwrap();
        let executor = ScenarioExecutor::new(registry(), RunnerOptions::default());
        let report = executor.run(&[feature], || Ok(Tally::default())).await;

        assert_eq!(report.scenarios.len(), 3);
        assert_eq!(report.passed(), 1);
        assert_eq!(report.failed(), 2);
        assert!(!report.is_success());

        let adding = &report.scenarios[0];
        assert!(adding.is_success());
        // Background step comes first
        assert_eq!(adding.steps.len(), 3);
        assert_eq!(adding.steps[0].text, "a tally of 10");

        let wrong = &report.scenarios[1];
        assert!(matches!(wrong.steps[2].status, StepStatus::Failed(ref m) if m.contains("tally is 11")));
        assert_eq!(wrong.steps[3].status, StepStatus::Skipped);
        assert_eq!(wrong.failed_step().map(|s| s.line), Some(13));

        let unknown = &report.scenarios[2];
        assert_eq!(unknown.steps[1].status, StepStatus::Undefined);
        assert_eq!(unknown.steps[2].status, StepStatus::Skipped);

        assert!(report.summary().starts_with("3 scenarios (1 passed, 2 failed)"));
    }

    #[tokio::test]
    async fn test_filters() {
        let feature = parse_feature(FEATURE).unwrap();
        let options = RunnerOptions {
            tags: vec!["fast".to_owned()],
            ..Default::default()
        };
        let executor = ScenarioExecutor::new(registry(), options);
        let report = executor.run(&[feature.clone()], || Ok(Tally::default())).await;
        assert_eq!(report.scenarios.len(), 1);
        assert_eq!(report.scenarios[0].tags, vec!["@fast"]);

        let options = RunnerOptions {
            name_filter: Some("Wrong".to_owned()),
            ..Default::default()
        };
        let executor = ScenarioExecutor::new(registry(), options);
        let report = executor.run(&[feature], || Ok(Tally::default())).await;
        assert_eq!(report.scenarios.len(), 1);
        assert_eq!(report.scenarios[0].name, "Wrong total");
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_timeout() {
        let source = "Feature: f\n  Scenario: s\n    When nothing ever happens\n    Then the tally is 0\n";
        let feature = parse_feature(source).unwrap();
        let options = RunnerOptions {
            step_timeout: Duration::from_secs(2),
            ..Default::default()
        };
        let executor = ScenarioExecutor::new(registry(), options);
        let report = executor.run(&[feature], || Ok(Tally::default())).await;

        let steps = &report.scenarios[0].steps;
        assert_eq!(steps[0].status, StepStatus::TimedOut(Duration::from_secs(2)));
        assert_eq!(steps[1].status, StepStatus::Skipped);
    }

    #[tokio::test]
    async fn test_world_setup_failure() {
        let feature = parse_feature(FEATURE).unwrap();
        let executor = ScenarioExecutor::new(registry(), RunnerOptions::default());
        let report = executor
            .run(&[feature], || Err(anyhow!("fixtures unavailable")))
            .await;

        assert_eq!(report.failed(), 3);
        let first = &report.scenarios[0];
        assert_eq!(first.setup_error.as_deref(), Some("fixtures unavailable"));
        assert!(first.steps.iter().all(|s| s.status.is_skipped()));
        assert!(first.failed_step().is_none());
    }

    #[tokio::test]
    async fn test_ambiguous_step() {
        let mut registry = registry();
        registry.then(r"^the tally is (\d+)$", expect).unwrap();
        let source = "Feature: f\n  Scenario: s\n    Then the tally is 0\n";
        let feature = parse_feature(source).unwrap();
        let executor = ScenarioExecutor::new(registry, RunnerOptions::default());
        let report = executor.run(&[feature], || Ok(Tally::default())).await;

        assert!(matches!(
            report.scenarios[0].steps[0].status,
            StepStatus::Ambiguous(ref patterns) if patterns.len() == 2
        ));
    }
}
