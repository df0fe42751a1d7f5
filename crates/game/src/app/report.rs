use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use field_engine::{AnimationRequest, FieldMetricsSnapshot, FieldWorld, MovementState, Vec3};
use serde::Serialize;

use super::script_log::ScriptLogEntry;

const REPORT_STAGING_SUFFIX: &str = ".partial";

/// End-of-run summary, printed and optionally written as JSON.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct RunSummary {
    pub(crate) scenario: String,
    pub(crate) ticks: u64,
    pub(crate) metrics: FieldMetricsSnapshot,
    pub(crate) rejected_orders: u32,
    pub(crate) actors: Vec<ActorSummary>,
    pub(crate) script_calls: Vec<ScriptLogEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ActorSummary {
    pub(crate) name: String,
    pub(crate) position: Vec3,
    pub(crate) heading: f32,
    pub(crate) offset: Vec3,
    pub(crate) triangle: Option<u32>,
    pub(crate) movement_state: MovementState,
    pub(crate) animation: AnimationRequest,
}

impl ActorSummary {
    pub(crate) fn collect(world: &FieldWorld) -> Vec<Self> {
        world
            .actors()
            .map(|actor| Self {
                name: actor.name().to_string(),
                position: actor.position(),
                heading: actor.heading(),
                offset: actor.offset(),
                triangle: actor.triangle().map(|triangle| triangle.0),
                movement_state: actor.movement_state(),
                animation: actor.animation(),
            })
            .collect()
    }
}

impl RunSummary {
    pub(crate) fn render_text(&self) -> String {
        let mut lines = vec![
            format!("scenario: {}", self.scenario),
            format!(
                "ticks: {} ({:.2}s simulated)",
                self.ticks, self.metrics.simulated_seconds
            ),
            format!(
                "moves: {} committed, {} blocked; placements failed: {}",
                self.metrics.moves_committed,
                self.metrics.moves_blocked,
                self.metrics.placements_failed
            ),
            format!(
                "triggers: {} events; scripts: {} requested, {} resumed; rejected orders: {}",
                self.metrics.trigger_events,
                self.metrics.script_requests,
                self.metrics.continuations_resumed,
                self.rejected_orders
            ),
        ];
        for actor in &self.actors {
            let triangle = actor
                .triangle
                .map_or_else(|| "-".to_string(), |triangle| triangle.to_string());
            lines.push(format!(
                "  {} at ({:.3}, {:.3}, {:.3}) heading {:.1} triangle {} state {:?} anim {:?}",
                actor.name,
                actor.position.x,
                actor.position.y,
                actor.position.z,
                actor.heading,
                triangle,
                actor.movement_state,
                actor.animation
            ));
        }
        lines.join("\n")
    }
}

/// Writes the report beside `path` first, then swaps it into place.
pub(crate) fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let staging = staging_path(path);
    let result = fs::write(&staging, text).and_then(|()| swap_into_place(&staging, path));
    if result.is_err() {
        let _ = fs::remove_file(&staging);
    }
    result
}

fn swap_into_place(staging: &Path, path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(error) if error.kind() != io::ErrorKind::NotFound => return Err(error),
        _ => {}
    }
    fs::rename(staging, path)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut staging = path.as_os_str().to_owned();
    staging.push(REPORT_STAGING_SUFFIX);
    PathBuf::from(staging)
}
