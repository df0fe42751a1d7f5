mod clock;
mod config;
pub mod field;
mod math;
pub mod walkmesh;

pub use clock::{FixedFrameClock, FrameClock};
pub use config::{
    load_field_config, ActionConfig, CollisionRadiusPolicy, ConfigError, FieldConfig,
    MovementConfig, PlacementPolicy, TriggerConfig, FIELD_CONFIG_ENV_VAR,
};
pub use field::{
    ActionKind, Actor, ActorDesc, ActorId, AnimationRequest, ContinuationToken, Easing,
    FieldError, FieldMetricsSnapshot, FieldWorld, MetricsHandle, MoveOutcome, MoveTarget,
    MovementState, NullScriptHost, RecordingScriptHost, RequestStatus, ScriptCall, ScriptHost,
    TickReport, TriggerDesc, TriggerEvent, TurnDirection,
};
pub use math::{
    direction_from_heading, heading_from_direction, normalize_degrees, Vec2, Vec3, LENGTH_EPSILON,
};
pub use walkmesh::{BorderWalk, Triangle, TriangleId, Walkmesh, WalkmeshError};
