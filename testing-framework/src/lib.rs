//! # Hedera acceptance scenarios
//!
//! Behaviour-driven acceptance suite for the Hedera account, consensus topic
//! and token services.
//!
//! ## Architecture Overview
//!
//! - **scenarios**: feature file parser, regex step registry and executor
//! - **steps**: step definitions for the consensus and token features
//! - **helpers**: one network round trip per helper, plus assertions
//! - **world**: per-scenario context (bound client, keys, ids, pending transfer)
//!
//! Network access goes through the
//! [`Ledger`](acceptance_common::ledger::Ledger) seam from `acceptance_common`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use acceptance_testing_framework::{config::RunnerConfig, run_suite};
//!
//! let config = RunnerConfig::from_file("runner.json")?;
//! let report = run_suite(&config).await?;
//! assert!(report.is_success(), "{}", report.summary());
//! ```
//!
//! ## Features
//!
//! - **default**: suite library and `acceptance-runner` binary
//! - **live-network**: enables the `live_network` test target, which runs the
//!   shipped features against the network configured by `ACCEPTANCE_CONFIG`

#![warn(clippy::all)]

pub mod config;
pub mod helpers;
pub mod scenarios;
pub mod steps;
pub mod world;

use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;

use acceptance_common::{
    config::Fixtures,
    ledger::{HederaConnector, LedgerConnector},
};

use crate::{
    config::RunnerConfig,
    scenarios::{load_features_dir, Feature, RunReport, RunnerOptions, ScenarioExecutor},
    world::{AcceptanceWorld, WorldSettings},
};

/// Run `features` with the shipped step definitions, a fresh world per scenario
pub async fn run_features(
    features: &[Feature],
    connector: Arc<dyn LedgerConnector>,
    fixtures: Fixtures,
    options: RunnerOptions,
    settings: WorldSettings,
) -> Result<RunReport> {
    let registry = steps::registry().context("Error while building the step registry")?;
    let executor = ScenarioExecutor::new(registry, options);
    let fixtures = Arc::new(fixtures);

    let report = executor
        .run(features, || {
            Ok(AcceptanceWorld::new(
                connector.clone(),
                fixtures.clone(),
                settings.clone(),
            ))
        })
        .await;
    Ok(report)
}

/// Load fixtures and features as configured and run them against the configured network
pub async fn run_suite(config: &RunnerConfig) -> Result<RunReport> {
    let fixtures = Fixtures::load(&config.fixtures)
        .with_context(|| format!("Error while loading fixtures from {}", config.fixtures))?;
    let features = load_features_dir(&config.features_dir)?;
    info!(
        "Running {} features on {} with {} fixture accounts",
        features.len(),
        config.network,
        fixtures.len()
    );

    let connector = Arc::new(HederaConnector::new(config.network));
    run_features(
        &features,
        connector,
        fixtures,
        config.runner_options(),
        config.world_settings(),
    )
    .await
}
