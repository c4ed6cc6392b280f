use std::{path::Path, process::ExitCode};

use anyhow::Result;
use clap::Parser;
use log::{error, info};

use acceptance_common::logger;
use acceptance_testing_framework::{config::RunnerConfig, run_suite};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let mut config: RunnerConfig = RunnerConfig::parse();
    if let Some(path) = config.config_file.as_ref() {
        if config.generate_config_template {
            if Path::new(path).exists() {
                eprintln!("Config file already exists at {}", path);
                return Ok(ExitCode::SUCCESS);
            }

            config.write_template(path)?;
            println!("Config file template generated at {}", path);
            return Ok(ExitCode::SUCCESS);
        }

        config = RunnerConfig::from_file(path)?;
    } else if config.generate_config_template {
        eprintln!("Provided config file path is required to generate the template with --config-file");
        return Ok(ExitCode::SUCCESS);
    }

    logger::init(config.log_level);

    let report = run_suite(&config).await?;
    for failure in report.failures() {
        match (&failure.setup_error, failure.failed_step()) {
            (Some(reason), _) => error!("{} / {}: {}", failure.feature, failure.name, reason),
            (None, Some(step)) => error!(
                "{} / {} (line {}): {}",
                failure.feature, failure.name, step.line, step.status
            ),
            (None, None) => error!("{} / {}", failure.feature, failure.name),
        }
    }
    info!("{}", report.summary());

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
