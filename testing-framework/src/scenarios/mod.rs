//! Feature file parser, step registry and scenario executor
//!
//! Scenarios are written in plain Gherkin:
//!
//! ```gherkin
//! Feature: Create a new topic
//!
//!   Scenario: Publish a message to a topic
//!     Given a first account with more than 1 hbars
//!     When A topic is created with the memo "Taxi rides" with the first account as the submit key
//!     And The message "Ride #1" is published to the topic
//!     Then The message "Ride #1" is received by the topic and can be printed to the console
//! ```
//!
//! Each step line is matched against the regular expressions of a
//! [`StepRegistry`], the matching handler runs against the scenario's world.

pub mod executor;
pub mod parser;
pub mod registry;

pub use executor::{
    RunReport, RunnerOptions, ScenarioExecutor, ScenarioReport, StepReport, StepStatus,
};
pub use parser::{
    load_feature, load_features_dir, parse_feature, Feature, ParseError, Scenario, Step,
    StepKeyword,
};
pub use registry::{MatchError, StepArgs, StepDefinition, StepFn, StepFuture, StepRegistry};
