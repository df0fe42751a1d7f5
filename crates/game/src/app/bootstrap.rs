use std::path::PathBuf;

use field_engine::{load_field_config, ConfigError, FieldConfig};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::cli::RunnerOptions;
use super::scenario::{Scenario, ScenarioError};

const DEFAULT_TICKS: u32 = 120;
const DEFAULT_DT_SECONDS: f32 = 1.0 / 30.0;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    #[error("failed to write report {path}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode report: {0}")]
    EncodeReport(#[from] serde_json::Error),
}

#[derive(Debug)]
pub(crate) struct AppWiring {
    pub(crate) config: FieldConfig,
    pub(crate) scenario: Scenario,
    pub(crate) scenario_label: String,
    pub(crate) ticks: u32,
    pub(crate) dt_seconds: f32,
    pub(crate) time_scale: f32,
    pub(crate) report_path: Option<PathBuf>,
}

/// Command-line values win over scenario values, which win over defaults.
pub(crate) fn build_app(options: &RunnerOptions) -> Result<AppWiring, AppError> {
    info!("=== Field Sim Startup ===");

    let config = load_field_config(options.config.as_deref())?;
    let (scenario, scenario_label) = match &options.scenario {
        Some(path) => (Scenario::load(path)?, path.display().to_string()),
        None => (Scenario::builtin_demo()?, "builtin:line_crossing".to_string()),
    };
    let config = scenario.layer_config(config)?;

    let ticks = options.ticks.or(scenario.ticks).unwrap_or(DEFAULT_TICKS);
    let dt_seconds = options.dt.or(scenario.dt).unwrap_or(DEFAULT_DT_SECONDS);
    let time_scale = options.time_scale.unwrap_or(1.0);
    info!(
        scenario = %scenario_label,
        ticks,
        dt_seconds,
        time_scale,
        "app_configured"
    );

    Ok(AppWiring {
        config,
        scenario,
        scenario_label,
        ticks,
        dt_seconds,
        time_scale,
        report_path: options.report.clone(),
    })
}

pub(crate) fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_values_override_scenario_values() {
        let options = RunnerOptions {
            ticks: Some(7),
            ..RunnerOptions::default()
        };
        let wiring = build_app(&options).expect("wiring");
        assert_eq!(wiring.ticks, 7);
        assert_eq!(wiring.dt_seconds, 0.1);
        assert_eq!(wiring.time_scale, 1.0);
        assert_eq!(wiring.scenario_label, "builtin:line_crossing");
        assert_eq!(wiring.config.triggers.cross_distance_squared, 0.0004);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let options = RunnerOptions {
            config: Some(temp.path().join("absent.json")),
            ..RunnerOptions::default()
        };
        let error = build_app(&options).expect_err("missing config");
        assert!(matches!(error, AppError::Config(_)));
    }

    #[test]
    fn config_file_is_applied() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("field.json");
        std::fs::write(&path, r#"{ "movement": { "npc_iterations": 4 } }"#).expect("write");
        let options = RunnerOptions {
            config: Some(path),
            ..RunnerOptions::default()
        };
        let wiring = build_app(&options).expect("wiring");
        assert_eq!(wiring.config.movement.npc_iterations, 4);
    }
}
