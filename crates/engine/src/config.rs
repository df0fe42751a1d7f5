use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub const FIELD_CONFIG_ENV_VAR: &str = "FIELDSIM_CONFIG";

/// Radius used by the actor-versus-actor solid test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionRadiusPolicy {
    /// Compare against the other actor's radius only. Shipped gameplay depends on it.
    #[default]
    OtherOnly,
    /// Compare against the sum of both radii.
    Sum,
}

/// Tie-break when several triangles contain an actor's planar position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementPolicy {
    #[default]
    ClosestElevation,
    /// Deprecated: highest surface at or below the actor, falling back to the closest.
    HighestBelow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    pub player_iterations: u32,
    pub npc_iterations: u32,
    pub probe_angle_degrees: f32,
    pub slide_step_degrees: f32,
    pub turn_step_degrees: f32,
    /// Probe radius for actors that are not solid.
    pub non_solid_probe_radius: f32,
    pub collision_policy: CollisionRadiusPolicy,
    pub placement_policy: PlacementPolicy,
    /// Arrival tolerance added to the stop distance, as a fraction of `speed * dt`.
    pub arrival_tolerance_factor: f32,
    pub run_speed_threshold: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            player_iterations: 8,
            npc_iterations: 16,
            probe_angle_degrees: 45.0,
            slide_step_degrees: 7.03125,
            turn_step_degrees: 11.25,
            non_solid_probe_radius: 0.01,
            collision_policy: CollisionRadiusPolicy::OtherOnly,
            placement_policy: PlacementPolicy::ClosestElevation,
            arrival_tolerance_factor: 0.5,
            run_speed_threshold: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub near_cooldown_ticks: u32,
    pub cross_distance_squared: f32,
    pub script_priority: u8,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            near_cooldown_ticks: 5,
            cross_distance_squared: 1.0,
            script_priority: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    /// Gravity-like constant of the jump arc. Call sites historically used
    /// both 13.08 and 1.0.
    pub jump_gravity: f32,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self { jump_gravity: 13.08 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub movement: MovementConfig,
    pub triggers: TriggerConfig,
    pub actions: ActionConfig,
    pub talk_script_priority: u8,
    pub metrics_log_interval_ticks: u32,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            movement: MovementConfig::default(),
            triggers: TriggerConfig::default(),
            actions: ActionConfig::default(),
            talk_script_priority: 1,
            metrics_log_interval_ticks: 60,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config json: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("failed to parse config json at {path}: {source}")]
    ParseAt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config value {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

impl FieldConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let config = deserialize_tracked(&mut deserializer)?;
        config.validate()?;
        Ok(config)
    }

    /// Layers a partial JSON object over this config. Objects merge key by
    /// key; any other value replaces what it overrides.
    pub fn with_overrides(&self, overrides: &serde_json::Value) -> Result<Self, ConfigError> {
        let mut merged = serde_json::to_value(self).map_err(ConfigError::Parse)?;
        merge_json(&mut merged, overrides);
        let config = deserialize_tracked(merged)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let movement = &self.movement;
        if movement.player_iterations == 0 {
            return Err(invalid("movement.player_iterations", "must be at least 1"));
        }
        if movement.npc_iterations == 0 {
            return Err(invalid("movement.npc_iterations", "must be at least 1"));
        }
        require_positive("movement.non_solid_probe_radius", movement.non_solid_probe_radius)?;
        require_positive("movement.probe_angle_degrees", movement.probe_angle_degrees)?;
        require_positive("movement.slide_step_degrees", movement.slide_step_degrees)?;
        require_positive("movement.turn_step_degrees", movement.turn_step_degrees)?;
        require_non_negative(
            "movement.arrival_tolerance_factor",
            movement.arrival_tolerance_factor,
        )?;
        require_non_negative("movement.run_speed_threshold", movement.run_speed_threshold)?;
        require_non_negative(
            "triggers.cross_distance_squared",
            self.triggers.cross_distance_squared,
        )?;
        if !self.actions.jump_gravity.is_finite() {
            return Err(invalid("actions.jump_gravity", "must be finite"));
        }
        if self.metrics_log_interval_ticks == 0 {
            return Err(invalid("metrics_log_interval_ticks", "must be at least 1"));
        }
        Ok(())
    }
}

/// Explicit path first, then `FIELDSIM_CONFIG`, then defaults.
pub fn load_field_config(explicit: Option<&Path>) -> Result<FieldConfig, ConfigError> {
    if let Some(path) = explicit {
        info!(path = %path.display(), source = "argument", "field_config_load");
        return FieldConfig::load_from_path(path);
    }
    match env::var(FIELD_CONFIG_ENV_VAR) {
        Ok(value) => {
            let path = PathBuf::from(value);
            info!(path = %path.display(), source = "environment", "field_config_load");
            FieldConfig::load_from_path(&path)
        }
        Err(env::VarError::NotPresent) => Ok(FieldConfig::default()),
        Err(source) => Err(ConfigError::EnvVar {
            var: FIELD_CONFIG_ENV_VAR,
            source,
        }),
    }
}

fn deserialize_tracked<'de, D>(deserializer: D) -> Result<FieldConfig, ConfigError>
where
    D: serde::Deserializer<'de, Error = serde_json::Error>,
{
    serde_path_to_error::deserialize(deserializer).map_err(|error| {
        let path = error.path().to_string();
        let source = error.into_inner();
        if path.is_empty() || path == "." {
            ConfigError::Parse(source)
        } else {
            ConfigError::ParseAt { path, source }
        }
    })
}

fn merge_json(base: &mut serde_json::Value, overrides: &serde_json::Value) {
    match (base, overrides) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overrides) => *base = overrides.clone(),
    }
}

fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.into(),
    }
}

fn require_positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("expected a positive number, got {value}")))
    }
}

fn require_non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(
            field,
            format!("expected a non-negative number, got {value}"),
        ))
    }
}
