mod actor;
mod continuation;
mod metrics;
mod movement;
mod placement;
mod sequencer;
mod trigger;
mod trigger_eval;
mod world;

pub use actor::{
    ActionTimer, Actor, ActorDesc, ActorId, ActorIdAllocator, ActorRegistry, AnimationRequest,
    Easing, JumpAction, LinearAction, MoveTarget, MovementState, OffsetAction, TurnAction,
    TurnDirection,
};
pub use continuation::{
    ActionKind, ContinuationQueue, ContinuationToken, NullScriptHost, RecordingScriptHost,
    RequestStatus, ScriptCall, ScriptHost,
};
pub use metrics::{FieldMetricsSnapshot, MetricsHandle};
pub use movement::{unset_move, MoveOutcome, MovementResolver};
pub use placement::{Placement, PlacementResolver};
pub use sequencer::{jump_position, ActionSequencer};
pub use trigger::{
    SegmentProximity, Trigger, TriggerDesc, TriggerError, TriggerEvent, TriggerId, TriggerSet,
    TriggerState,
};
pub use trigger_eval::{TriggerEvaluator, TriggerFiring};
pub use world::{FieldError, FieldWorld, TickReport, TALK_EVENT};
