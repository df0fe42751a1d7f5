use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use field_engine::{
    ActorDesc, ActorId, ConfigError, ContinuationToken, Easing, FieldConfig, FieldError, FieldWorld,
    RequestStatus, ScriptHost, Triangle, TriangleId, TriggerDesc, TurnDirection, Vec3, Walkmesh,
    WalkmeshError,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

const DEMO_SCENARIO_JSON: &str = include_str!("../../scenarios/line_crossing.json");

#[derive(Debug, Error)]
pub(crate) enum ScenarioError {
    #[error("failed to read scenario {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse scenario json: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("parse scenario json at {path}: {source}")]
    ParseAt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("validation failed at {path}: {message}")]
    Invalid { path: String, message: String },
    #[error(transparent)]
    Walkmesh(#[from] WalkmeshError),
    #[error(transparent)]
    Field(#[from] FieldError),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Scenario {
    #[serde(default)]
    pub(crate) ticks: Option<u32>,
    #[serde(default)]
    pub(crate) dt: Option<f32>,
    /// Partial `FieldConfig` layered over the loaded one.
    #[serde(default)]
    pub(crate) config: Option<serde_json::Value>,
    pub(crate) walkmesh: Vec<Triangle>,
    #[serde(default)]
    pub(crate) triggers: Vec<TriggerDesc>,
    #[serde(default)]
    pub(crate) actors: Vec<ScenarioActor>,
    #[serde(default)]
    pub(crate) orders: Vec<ScheduledOrder>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ScenarioActor {
    #[serde(flatten)]
    pub(crate) desc: ActorDesc,
    #[serde(default)]
    pub(crate) player: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ScheduledOrder {
    pub(crate) tick: u64,
    pub(crate) actor: String,
    #[serde(default)]
    pub(crate) waiter: Option<u64>,
    #[serde(flatten)]
    pub(crate) order: Order,
}

/// Script-layer requests a scenario can schedule.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum Order {
    MoveTo {
        target: Vec3,
    },
    Follow {
        target: String,
    },
    Stop,
    Teleport {
        position: Vec3,
    },
    Linear {
        target: Vec3,
        seconds: f32,
        #[serde(default)]
        easing: Easing,
    },
    Jump {
        target: Vec3,
        seconds: f32,
    },
    Turn {
        heading: f32,
        seconds: f32,
        #[serde(default)]
        direction: TurnDirection,
        #[serde(default)]
        easing: Easing,
    },
    TurnTo {
        target: String,
        seconds: f32,
        #[serde(default)]
        direction: TurnDirection,
        #[serde(default)]
        easing: Easing,
    },
    Offset {
        offset: Vec3,
        seconds: f32,
        #[serde(default)]
        easing: Easing,
    },
    Talk,
    SetTrigger {
        name: String,
        enabled: bool,
    },
    LockTriangle {
        triangle: u32,
        locked: bool,
    },
}

impl Order {
    /// Orders naming another actor, for validation.
    fn referenced_actor(&self) -> Option<&str> {
        match self {
            Self::Follow { target } | Self::TurnTo { target, .. } => Some(target),
            _ => None,
        }
    }
}

/// Order with actor names resolved to ids.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ResolvedOrder {
    pub(crate) tick: u64,
    pub(crate) actor: ActorId,
    pub(crate) actor_name: String,
    pub(crate) waiter: Option<ContinuationToken>,
    pub(crate) order: Order,
}

#[derive(Debug)]
pub(crate) struct LoadedScenario {
    pub(crate) world: FieldWorld,
    pub(crate) actor_ids: HashMap<String, ActorId>,
    /// Sorted by tick, stable within a tick.
    pub(crate) orders: Vec<ResolvedOrder>,
}

impl Scenario {
    pub(crate) fn builtin_demo() -> Result<Self, ScenarioError> {
        Self::from_json_str(DEMO_SCENARIO_JSON)
    }

    pub(crate) fn load(path: &Path) -> Result<Self, ScenarioError> {
        let raw = fs::read_to_string(path).map_err(|source| ScenarioError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let scenario = Self::from_json_str(&raw)?;
        info!(
            path = %path.display(),
            triangles = scenario.walkmesh.len(),
            actors = scenario.actors.len(),
            orders = scenario.orders.len(),
            "scenario_loaded"
        );
        Ok(scenario)
    }

    pub(crate) fn from_json_str(raw: &str) -> Result<Self, ScenarioError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let scenario = match serde_path_to_error::deserialize::<_, Scenario>(&mut deserializer) {
            Ok(scenario) => scenario,
            Err(error) => {
                let path = error.path().to_string();
                let source = error.into_inner();
                return Err(if path.is_empty() || path == "." {
                    ScenarioError::Parse(source)
                } else {
                    ScenarioError::ParseAt { path, source }
                });
            }
        };
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<(), ScenarioError> {
        if let Some(dt) = self.dt {
            if !(dt.is_finite() && dt > 0.0) {
                return Err(invalid("dt", format!("expected a positive number, got {dt}")));
            }
        }

        if let Some(config) = &self.config {
            if !config.is_object() {
                return Err(invalid("config", "expected an object of config overrides"));
            }
        }

        let mut names = HashMap::new();
        let mut player = None;
        for (index, actor) in self.actors.iter().enumerate() {
            let name = &actor.desc.name;
            if name.is_empty() {
                return Err(invalid(format!("actors[{index}].name"), "must not be empty"));
            }
            if names.insert(name.as_str(), index).is_some() {
                return Err(invalid(
                    format!("actors[{index}].name"),
                    format!("duplicate actor name '{name}'"),
                ));
            }
            if actor.player {
                if player.is_some() {
                    return Err(invalid("actors", "at most one actor may be the player"));
                }
                player = Some(name.as_str());
            }
        }

        for (index, order) in self.orders.iter().enumerate() {
            if !names.contains_key(order.actor.as_str()) {
                return Err(invalid(
                    format!("orders[{index}].actor"),
                    format!("unknown actor '{}'", order.actor),
                ));
            }
            if order.order == Order::Talk && player != Some(order.actor.as_str()) {
                return Err(invalid(
                    format!("orders[{index}].actor"),
                    format!("only the player can talk, not '{}'", order.actor),
                ));
            }
            if let Some(target) = order.order.referenced_actor() {
                if !names.contains_key(target) {
                    return Err(invalid(
                        format!("orders[{index}].target"),
                        format!("unknown actor '{target}'"),
                    ));
                }
            }
        }
        Ok(())
    }

    pub(crate) fn layer_config(&self, base: FieldConfig) -> Result<FieldConfig, ConfigError> {
        match &self.config {
            Some(overrides) => {
                let config = base.with_overrides(overrides)?;
                info!("scenario_config_applied");
                Ok(config)
            }
            None => Ok(base),
        }
    }

    /// Builds the world: walkmesh and triggers first, then actors in order.
    pub(crate) fn instantiate(&self, config: FieldConfig) -> Result<LoadedScenario, ScenarioError> {
        let walkmesh = Walkmesh::new(self.walkmesh.clone())?;
        let mut world = FieldWorld::new(config);
        world.load_map(walkmesh, self.triggers.clone())?;

        let mut actor_ids = HashMap::new();
        for actor in &self.actors {
            let id = world.spawn_actor(actor.desc.clone());
            if actor.player {
                world.set_player(id)?;
            }
            actor_ids.insert(actor.desc.name.clone(), id);
        }

        let mut orders = Vec::with_capacity(self.orders.len());
        for (index, order) in self.orders.iter().enumerate() {
            let actor = actor_ids
                .get(&order.actor)
                .copied()
                .ok_or_else(|| invalid(format!("orders[{index}].actor"), "unknown actor"))?;
            orders.push(ResolvedOrder {
                tick: order.tick,
                actor,
                actor_name: order.actor.clone(),
                waiter: order.waiter.map(ContinuationToken),
                order: order.order.clone(),
            });
        }
        orders.sort_by_key(|order| order.tick);

        Ok(LoadedScenario {
            world,
            actor_ids,
            orders,
        })
    }
}

impl LoadedScenario {
    /// Issues one order against the world.
    pub(crate) fn apply(
        &mut self,
        order: &ResolvedOrder,
        host: &mut dyn ScriptHost,
    ) -> Result<Option<RequestStatus>, ScenarioError> {
        let id = order.actor;
        let waiter = order.waiter;
        let status = match &order.order {
            Order::MoveTo { target } => Some(self.world.request_move_to_point(id, *target, waiter)?),
            Order::Follow { target } => {
                let target = self.lookup(target)?;
                Some(self.world.request_move_to_actor(id, target, waiter)?)
            }
            Order::Stop => {
                self.world.unset_move(id, host)?;
                None
            }
            Order::Teleport { position } => {
                self.world.set_position(id, *position)?;
                None
            }
            Order::Linear {
                target,
                seconds,
                easing,
            } => Some(self.world.request_linear(id, *target, *seconds, *easing, waiter)?),
            Order::Jump { target, seconds } => {
                Some(self.world.request_jump(id, *target, *seconds, waiter)?)
            }
            Order::Turn {
                heading,
                seconds,
                direction,
                easing,
            } => Some(self.world.request_turn(id, *heading, *direction, *seconds, *easing, waiter)?),
            Order::TurnTo {
                target,
                seconds,
                direction,
                easing,
            } => {
                let target = self.lookup(target)?;
                Some(self.world.request_turn_to_actor(
                    id, target, *direction, *seconds, *easing, waiter,
                )?)
            }
            Order::Offset {
                offset,
                seconds,
                easing,
            } => Some(self.world.request_offset(id, *offset, *seconds, *easing, waiter)?),
            Order::Talk => {
                if self.world.player() != Some(id) {
                    return Err(invalid(
                        "orders.actor",
                        format!("only the player can talk, not '{}'", order.actor_name),
                    ));
                }
                self.world.try_talk(host)?;
                None
            }
            Order::SetTrigger { name, enabled } => {
                self.world.set_trigger_enabled(name, *enabled)?;
                None
            }
            Order::LockTriangle { triangle, locked } => {
                self.world.set_triangle_locked(TriangleId(*triangle), *locked)?;
                None
            }
        };
        Ok(status)
    }

    fn lookup(&self, name: &str) -> Result<ActorId, ScenarioError> {
        self.actor_ids
            .get(name)
            .copied()
            .ok_or_else(|| invalid("orders.target", format!("unknown actor '{name}'")))
    }
}

fn invalid(path: impl Into<String>, message: impl Into<String>) -> ScenarioError {
    ScenarioError::Invalid {
        path: path.into(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use field_engine::{MovementState, RecordingScriptHost};
    use serde_json::json;

    fn square_json(orders: serde_json::Value) -> String {
        json!({
            "walkmesh": [
                {
                    "a": { "x": -2.0, "y": -2.0, "z": 0.0 },
                    "b": { "x": 2.0, "y": -2.0, "z": 0.0 },
                    "c": { "x": 2.0, "y": 2.0, "z": 0.0 },
                    "neighbors": [null, null, 1]
                },
                {
                    "a": { "x": -2.0, "y": -2.0, "z": 0.0 },
                    "b": { "x": 2.0, "y": 2.0, "z": 0.0 },
                    "c": { "x": -2.0, "y": 2.0, "z": 0.0 },
                    "neighbors": [0, null, null]
                }
            ],
            "actors": [
                { "name": "cloud", "position": { "x": 1.0, "y": 1.0, "z": 0.0 }, "player": true },
                { "name": "tifa", "position": { "x": -1.0, "y": -1.5, "z": 0.0 }, "talkable": true }
            ],
            "orders": orders
        })
        .to_string()
    }

    #[test]
    fn builtin_demo_parses_and_instantiates() {
        let scenario = Scenario::builtin_demo().expect("demo parses");
        let loaded = scenario
            .instantiate(FieldConfig::default())
            .expect("demo instantiates");
        assert!(loaded.world.player().is_some());
        assert!(!loaded.orders.is_empty());
        assert!(loaded
            .orders
            .windows(2)
            .all(|pair| pair[0].tick <= pair[1].tick));
    }

    #[test]
    fn orders_parse_with_defaults_and_resolve_names() {
        let raw = square_json(json!([
            { "tick": 4, "actor": "tifa", "kind": "turn_to", "target": "cloud", "seconds": 0.5 },
            { "tick": 1, "actor": "cloud", "kind": "move_to", "target": { "x": -1.0, "y": 1.0, "z": 0.0 }, "waiter": 9 }
        ]));
        let scenario = Scenario::from_json_str(&raw).expect("scenario");
        let mut loaded = scenario.instantiate(FieldConfig::default()).expect("loaded");
        assert_eq!(loaded.orders[0].tick, 1);
        assert_eq!(
            loaded.orders[1].order,
            Order::TurnTo {
                target: "cloud".to_string(),
                seconds: 0.5,
                direction: TurnDirection::Closest,
                easing: Easing::Linear,
            }
        );

        let mut host = RecordingScriptHost::default();
        let first = loaded.orders[0].clone();
        let status = loaded.apply(&first, &mut host).expect("apply");
        assert_eq!(status, Some(RequestStatus::Pending(ContinuationToken(9))));
    }

    #[test]
    fn parse_errors_report_the_json_path() {
        let raw = square_json(json!([
            { "tick": "soon", "actor": "cloud", "kind": "stop" }
        ]));
        let error = Scenario::from_json_str(&raw).expect_err("bad tick");
        assert!(
            error.to_string().contains("orders[0]"),
            "unexpected message: {error}"
        );
    }

    #[test]
    fn unknown_actor_references_are_rejected() {
        let raw = square_json(json!([
            { "tick": 0, "actor": "cloud", "kind": "follow", "target": "sephiroth" }
        ]));
        let error = Scenario::from_json_str(&raw).expect_err("unknown target");
        assert!(matches!(error, ScenarioError::Invalid { ref path, .. } if path == "orders[0].target"));
    }

    #[test]
    fn talk_orders_from_other_actors_are_rejected() {
        let raw = square_json(json!([
            { "tick": 0, "actor": "tifa", "kind": "talk" }
        ]));
        let error = Scenario::from_json_str(&raw).expect_err("npc talk");
        assert!(matches!(error, ScenarioError::Invalid { ref path, .. } if path == "orders[0].actor"));

        let mut loaded = Scenario::from_json_str(&square_json(json!([])))
            .expect("scenario")
            .instantiate(FieldConfig::default())
            .expect("loaded");
        let cloud = loaded.actor_ids["cloud"];
        let tifa = loaded.actor_ids["tifa"];
        let order = ResolvedOrder {
            tick: 0,
            actor: tifa,
            actor_name: "tifa".to_string(),
            waiter: None,
            order: Order::Talk,
        };
        let mut host = RecordingScriptHost::default();
        let error = loaded.apply(&order, &mut host).expect_err("npc talk");
        assert!(matches!(error, ScenarioError::Invalid { .. }));
        assert_eq!(loaded.world.player(), Some(cloud));
        assert!(host.calls().is_empty());
    }

    #[test]
    fn scenario_config_layers_over_the_loaded_config() {
        let mut value: serde_json::Value =
            serde_json::from_str(&square_json(json!([]))).expect("json");
        value["config"] = json!({ "triggers": { "cross_distance_squared": 0.0004 } });
        let scenario = Scenario::from_json_str(&value.to_string()).expect("scenario");
        let base = FieldConfig {
            talk_script_priority: 3,
            ..FieldConfig::default()
        };
        let config = scenario.layer_config(base).expect("layered");
        assert_eq!(config.triggers.cross_distance_squared, 0.0004);
        assert_eq!(config.talk_script_priority, 3);

        value["config"] = json!(2);
        let error = Scenario::from_json_str(&value.to_string()).expect_err("not an object");
        assert!(matches!(error, ScenarioError::Invalid { ref path, .. } if path == "config"));
    }

    #[test]
    fn bad_adjacency_surfaces_as_walkmesh_error() {
        let raw = json!({
            "walkmesh": [
                {
                    "a": { "x": 0.0, "y": 0.0, "z": 0.0 },
                    "b": { "x": 1.0, "y": 0.0, "z": 0.0 },
                    "c": { "x": 0.0, "y": 1.0, "z": 0.0 },
                    "neighbors": [4, null, null]
                }
            ]
        })
        .to_string();
        let scenario = Scenario::from_json_str(&raw).expect("parses");
        let error = scenario
            .instantiate(FieldConfig::default())
            .expect_err("out of range neighbor");
        assert!(matches!(error, ScenarioError::Walkmesh(_)));
    }

    #[test]
    fn rejected_request_surfaces_field_error() {
        let raw = square_json(json!([
            { "tick": 0, "actor": "tifa", "kind": "jump", "target": { "x": 0.0, "y": 0.0, "z": 0.0 }, "seconds": 0.0 }
        ]));
        let mut loaded = Scenario::from_json_str(&raw)
            .expect("scenario")
            .instantiate(FieldConfig::default())
            .expect("loaded");
        let order = loaded.orders[0].clone();
        let mut host = RecordingScriptHost::default();
        let error = loaded.apply(&order, &mut host).expect_err("zero duration");
        assert!(matches!(error, ScenarioError::Field(FieldError::InvalidDuration { .. })));
        let tifa = loaded.actor_ids["tifa"];
        assert_eq!(
            loaded.world.actor(tifa).expect("tifa").movement_state(),
            MovementState::OnMesh
        );
    }
}
