use thiserror::Error;
use tracing::{info, warn};

use super::actor::{
    ActionTimer, Actor, ActorDesc, ActorId, ActorRegistry, Easing, JumpAction, LinearAction,
    MoveTarget, MovementState, OffsetAction, TurnAction, TurnDirection,
};
use super::continuation::{
    ActionKind, ContinuationToken, CountingHost, RequestStatus, ScriptHost,
};
use super::metrics::{FieldMetricsSnapshot, MetricsAccumulator, MetricsHandle, TickCounts};
use super::movement::{self, MoveOutcome, MovementResolver};
use super::placement::PlacementResolver;
use super::sequencer::ActionSequencer;
use super::trigger::{TriggerDesc, TriggerError, TriggerSet};
use super::trigger_eval::{faces, TriggerEvaluator, TriggerFiring};
use crate::config::FieldConfig;
use crate::math::{heading_from_direction, normalize_degrees, Vec3};
use crate::walkmesh::{TriangleId, Walkmesh, WalkmeshError};

pub const TALK_EVENT: &str = "on_talk";

#[derive(Debug, Error)]
pub enum FieldError {
    #[error("unknown actor {0:?}")]
    UnknownActor(ActorId),
    #[error("unknown trigger '{0}'")]
    UnknownTrigger(String),
    #[error("no player actor is set")]
    NoPlayer,
    #[error("actor {actor:?} is busy with a {action} action")]
    ActorBusy { actor: ActorId, action: ActionKind },
    #[error("actor {0:?} is not bound to the walkmesh")]
    NotOnWalkmesh(ActorId),
    #[error("{action} duration must be positive and finite, got {seconds}")]
    InvalidDuration { action: ActionKind, seconds: f32 },
    #[error("actor {0:?} cannot target itself")]
    SelfTarget(ActorId),
    #[error(transparent)]
    Walkmesh(#[from] WalkmeshError),
    #[error(transparent)]
    Trigger(#[from] TriggerError),
}

/// Everything that happened during one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub moves: Vec<(ActorId, MoveOutcome)>,
    pub trigger_firings: Vec<TriggerFiring>,
    pub completed_actions: Vec<(ActorId, ActionKind)>,
    pub placement_failures: Vec<ActorId>,
}

/// Walkmesh, actors and trigger lines of one field, advanced one tick at a
/// time by the owner's frame loop.
#[derive(Debug)]
pub struct FieldWorld {
    config: FieldConfig,
    walkmesh: Walkmesh,
    actors: ActorRegistry,
    triggers: TriggerSet,
    player: Option<ActorId>,
    metrics: MetricsAccumulator,
    metrics_handle: MetricsHandle,
    tick_count: u64,
}

impl FieldWorld {
    pub fn new(config: FieldConfig) -> Self {
        let metrics = MetricsAccumulator::new(config.metrics_log_interval_ticks);
        Self {
            config,
            walkmesh: Walkmesh::empty(),
            actors: ActorRegistry::default(),
            triggers: TriggerSet::default(),
            player: None,
            metrics,
            metrics_handle: MetricsHandle::default(),
            tick_count: 0,
        }
    }

    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    pub fn walkmesh(&self) -> &Walkmesh {
        &self.walkmesh
    }

    pub fn triggers(&self) -> &TriggerSet {
        &self.triggers
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn metrics_handle(&self) -> MetricsHandle {
        self.metrics_handle.clone()
    }

    pub fn metrics_totals(&self) -> FieldMetricsSnapshot {
        self.metrics.totals()
    }

    /// Replaces the walkmesh and trigger lines. Actors keep their positions
    /// and are re-anchored on the next tick. Nothing changes on error.
    pub fn load_map(
        &mut self,
        walkmesh: Walkmesh,
        triggers: Vec<TriggerDesc>,
    ) -> Result<(), FieldError> {
        let triggers = TriggerSet::from_descs(triggers)?;
        self.walkmesh = walkmesh;
        self.triggers = triggers;
        self.unanchor_all();
        info!(
            triangles = self.walkmesh.triangle_count(),
            triggers = self.triggers.len(),
            "field_map_loaded"
        );
        Ok(())
    }

    pub fn unload_map(&mut self) {
        self.walkmesh = Walkmesh::empty();
        self.triggers.clear();
        self.unanchor_all();
        info!("field_map_unloaded");
    }

    fn unanchor_all(&mut self) {
        for actor in self.actors.as_mut_slice() {
            actor.unanchor();
        }
    }

    pub fn spawn_actor(&mut self, desc: ActorDesc) -> ActorId {
        let id = self.actors.spawn(desc);
        if !self.walkmesh.is_empty() {
            let placement =
                PlacementResolver::new(&self.walkmesh, self.config.movement.placement_policy);
            if let Some(actor) = self.actors.find_mut(id) {
                if actor.movement_state == MovementState::NeedsReattach {
                    placement.anchor(actor);
                }
            }
        }
        id
    }

    /// Scripts still waiting on the removed actor are dropped, never resumed.
    pub fn despawn_actor(&mut self, id: ActorId) -> Result<Actor, FieldError> {
        let actor = self.actors.despawn(id).ok_or(FieldError::UnknownActor(id))?;
        if self.player == Some(id) {
            self.player = None;
        }
        if !actor.waiters.is_empty() {
            warn!(
                actor = %actor.name,
                pending = actor.waiters.len(),
                "despawned_actor_had_waiters"
            );
        }
        Ok(actor)
    }

    pub fn set_player(&mut self, id: ActorId) -> Result<(), FieldError> {
        self.actor_checked(id)?;
        self.player = Some(id);
        Ok(())
    }

    pub fn player(&self) -> Option<ActorId> {
        self.player
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.find(id)
    }

    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.actors.find_mut(id)
    }

    pub fn actor_by_name(&self, name: &str) -> Option<&Actor> {
        self.actors.find_by_name(name)
    }

    pub fn actors(&self) -> impl Iterator<Item = &Actor> {
        self.actors.iter()
    }

    fn actor_checked(&self, id: ActorId) -> Result<&Actor, FieldError> {
        self.actors.find(id).ok_or(FieldError::UnknownActor(id))
    }

    fn actor_checked_mut(&mut self, id: ActorId) -> Result<&mut Actor, FieldError> {
        self.actors.find_mut(id).ok_or(FieldError::UnknownActor(id))
    }

    pub fn set_trigger_enabled(&mut self, name: &str, enabled: bool) -> Result<(), FieldError> {
        let id = self
            .triggers
            .id_by_name(name)
            .ok_or_else(|| FieldError::UnknownTrigger(name.to_string()))?;
        self.triggers.set_enabled(id, enabled);
        info!(trigger = name, enabled, "trigger_enabled_changed");
        Ok(())
    }

    pub fn set_triangle_locked(&mut self, id: TriangleId, locked: bool) -> Result<(), FieldError> {
        self.walkmesh.set_locked(id, locked)?;
        info!(triangle = id.0, locked, "triangle_lock_changed");
        Ok(())
    }

    pub fn request_move_to_point(
        &mut self,
        id: ActorId,
        target: Vec3,
        waiter: Option<ContinuationToken>,
    ) -> Result<RequestStatus, FieldError> {
        self.start_move(id, MoveTarget::Point(target), waiter)
    }

    pub fn request_move_to_actor(
        &mut self,
        id: ActorId,
        target: ActorId,
        waiter: Option<ContinuationToken>,
    ) -> Result<RequestStatus, FieldError> {
        if id == target {
            return Err(FieldError::SelfTarget(id));
        }
        self.actor_checked(target)?;
        self.start_move(id, MoveTarget::Actor(target), waiter)
    }

    fn start_move(
        &mut self,
        id: ActorId,
        target: MoveTarget,
        waiter: Option<ContinuationToken>,
    ) -> Result<RequestStatus, FieldError> {
        let actor = self.actor_checked_mut(id)?;
        ensure_not_relocating(actor)?;
        if !actor.movement_state.is_walkmesh_bound() {
            return Err(FieldError::NotOnWalkmesh(id));
        }
        actor.move_target = Some(target);
        Ok(register_waiter(actor, ActionKind::Move, waiter))
    }

    /// Clears the move order and resumes scripts waiting on it.
    pub fn unset_move(&mut self, id: ActorId, host: &mut dyn ScriptHost) -> Result<(), FieldError> {
        let actor = self.actor_checked_mut(id)?;
        movement::unset_move(actor, host);
        Ok(())
    }

    /// Teleports the actor. Walkmesh-bound actors are re-anchored; returns
    /// whether the actor ends up anchored.
    pub fn set_position(&mut self, id: ActorId, position: Vec3) -> Result<bool, FieldError> {
        let policy = self.config.movement.placement_policy;
        let actor = self
            .actors
            .find_mut(id)
            .ok_or(FieldError::UnknownActor(id))?;
        ensure_not_relocating(actor)?;
        actor.position = position;
        if !actor.movement_state.is_walkmesh_bound() {
            return Ok(false);
        }
        actor.unanchor();
        Ok(PlacementResolver::new(&self.walkmesh, policy).anchor(actor))
    }

    pub fn request_linear(
        &mut self,
        id: ActorId,
        end: Vec3,
        seconds: f32,
        easing: Easing,
        waiter: Option<ContinuationToken>,
    ) -> Result<RequestStatus, FieldError> {
        validate_duration(ActionKind::Linear, seconds)?;
        let actor = self.actor_checked(id)?;
        ensure_not_relocating(actor)?;
        ensure_no_move_order(actor)?;

        let resume_state = actor.movement_state;
        if seconds == 0.0 || easing == Easing::None {
            let sequencer =
                ActionSequencer::new(&self.walkmesh, self.config.movement.placement_policy);
            let Some(actor) = self.actors.find_mut(id) else {
                return Err(FieldError::UnknownActor(id));
            };
            actor.position = end;
            sequencer.finish_relocation(actor, resume_state);
            return Ok(RequestStatus::Proceed);
        }

        let actor = self.actor_checked_mut(id)?;
        actor.linear = Some(LinearAction {
            start: actor.position,
            end,
            easing,
            timer: ActionTimer::new(seconds),
            resume_state,
        });
        actor.movement_state = MovementState::LinearSlide;
        actor.triangle = None;
        Ok(register_waiter(actor, ActionKind::Linear, waiter))
    }

    pub fn request_jump(
        &mut self,
        id: ActorId,
        end: Vec3,
        seconds: f32,
        waiter: Option<ContinuationToken>,
    ) -> Result<RequestStatus, FieldError> {
        if !(seconds.is_finite() && seconds > 0.0) {
            return Err(FieldError::InvalidDuration {
                action: ActionKind::Jump,
                seconds,
            });
        }
        let gravity = self.config.actions.jump_gravity;
        let actor = self.actor_checked_mut(id)?;
        ensure_not_relocating(actor)?;
        ensure_no_move_order(actor)?;

        actor.jump = Some(JumpAction {
            start: actor.position,
            end,
            gravity,
            timer: ActionTimer::new(seconds),
            resume_state: actor.movement_state,
        });
        actor.movement_state = MovementState::Jump;
        actor.triangle = None;
        Ok(register_waiter(actor, ActionKind::Jump, waiter))
    }

    /// A new turn replaces one in flight; its waiters resume when this one ends.
    pub fn request_turn(
        &mut self,
        id: ActorId,
        heading: f32,
        direction: TurnDirection,
        seconds: f32,
        easing: Easing,
        waiter: Option<ContinuationToken>,
    ) -> Result<RequestStatus, FieldError> {
        validate_duration(ActionKind::Turn, seconds)?;
        let actor = self.actor_checked_mut(id)?;
        Ok(start_turn(
            actor,
            normalize_degrees(heading),
            None,
            direction,
            seconds,
            easing,
            waiter,
        ))
    }

    pub fn request_turn_to_actor(
        &mut self,
        id: ActorId,
        target: ActorId,
        direction: TurnDirection,
        seconds: f32,
        easing: Easing,
        waiter: Option<ContinuationToken>,
    ) -> Result<RequestStatus, FieldError> {
        if id == target {
            return Err(FieldError::SelfTarget(id));
        }
        validate_duration(ActionKind::Turn, seconds)?;
        let target_position = self.actor_checked(target)?.position;
        let actor = self.actor_checked_mut(id)?;
        let heading = heading_from_direction(target_position.xy() - actor.position.xy())
            .unwrap_or(actor.heading);
        Ok(start_turn(
            actor,
            heading,
            Some(target),
            direction,
            seconds,
            easing,
            waiter,
        ))
    }

    pub fn request_offset(
        &mut self,
        id: ActorId,
        offset: Vec3,
        seconds: f32,
        easing: Easing,
        waiter: Option<ContinuationToken>,
    ) -> Result<RequestStatus, FieldError> {
        validate_duration(ActionKind::Offset, seconds)?;
        let actor = self.actor_checked_mut(id)?;
        if seconds == 0.0 || easing == Easing::None {
            actor.offset = offset;
            actor.offset_action = None;
            return Ok(RequestStatus::Proceed);
        }
        actor.offset_action = Some(OffsetAction {
            start: actor.offset,
            end: offset,
            easing,
            timer: ActionTimer::new(seconds),
        });
        Ok(register_waiter(actor, ActionKind::Offset, waiter))
    }

    /// Dispatches `on_talk` for the closest talkable actor the player faces
    /// and stands within the talk radius of.
    pub fn try_talk(&self, host: &mut dyn ScriptHost) -> Result<Option<ActorId>, FieldError> {
        let player_id = self.player.ok_or(FieldError::NoPlayer)?;
        let player = self.actor_checked(player_id)?;
        let origin = player.position.xy();

        let mut best: Option<(f32, &Actor)> = None;
        for other in self.actors.iter() {
            if other.id == player_id || !other.talkable {
                continue;
            }
            if !player.shares_vertical_band(player.position.z, other) {
                continue;
            }
            let distance = origin.distance(other.position.xy());
            if distance > other.talk_radius {
                continue;
            }
            if !faces(player.heading, origin, other.position.xy()) {
                continue;
            }
            if best.map_or(true, |(best_distance, _)| distance < best_distance) {
                best = Some((distance, other));
            }
        }

        let Some((_, partner)) = best else {
            return Ok(None);
        };
        info!(player = %player.name, partner = %partner.name, "talk_started");
        host.request_script(&partner.name, TALK_EVENT, self.config.talk_script_priority);
        Ok(Some(partner.id))
    }

    /// Placement, walkmesh movement, player triggers, then timed actions.
    pub fn tick(&mut self, dt: f32, host: &mut dyn ScriptHost) -> TickReport {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let mut host = CountingHost::new(host);
        let mut report = TickReport {
            tick: self.tick_count,
            ..TickReport::default()
        };
        let mut counts = TickCounts::default();

        if !self.walkmesh.is_empty() {
            let placement =
                PlacementResolver::new(&self.walkmesh, self.config.movement.placement_policy);
            for actor in self.actors.as_mut_slice() {
                if actor.movement_state == MovementState::NeedsReattach && !placement.anchor(actor)
                {
                    counts.placements_failed += 1;
                    report.placement_failures.push(actor.id);
                }
            }
        }

        let player_index = self.player.and_then(|id| self.actors.index_of(id));
        let mut player_moved = false;
        {
            let resolver = MovementResolver::new(&self.walkmesh, &self.config.movement);
            let actors = self.actors.as_mut_slice();
            for index in 0..actors.len() {
                let actor = &actors[index];
                if !actor.movement_state.is_walkmesh_bound() || actor.move_target.is_none() {
                    continue;
                }
                let id = actor.id;
                let speed = actor.move_speed;
                let is_player = player_index == Some(index);
                let outcome =
                    resolver.perform_walkmesh_move(actors, index, is_player, speed, dt, &mut host);
                match outcome {
                    MoveOutcome::Moved { .. } => counts.moves_committed += 1,
                    MoveOutcome::Blocked => counts.moves_blocked += 1,
                    _ => {}
                }
                if is_player {
                    player_moved = outcome.moved();
                }
                report.moves.push((id, outcome));
            }
        }

        if let Some(index) = player_index {
            let evaluator = TriggerEvaluator::new(&self.config.triggers);
            let player = &self.actors.as_slice()[index];
            report.trigger_firings =
                evaluator.evaluate(&mut self.triggers, player, player_moved, &mut host);
            counts.trigger_events = report.trigger_firings.len() as u32;
        }

        {
            let sequencer =
                ActionSequencer::new(&self.walkmesh, self.config.movement.placement_policy);
            let actors = self.actors.as_mut_slice();
            for index in 0..actors.len() {
                let id = actors[index].id;
                for kind in sequencer.advance(actors, index, dt, &mut host) {
                    report.completed_actions.push((id, kind));
                }
            }
        }

        counts.script_requests = host.requests;
        counts.continuations_resumed = host.continuations;
        self.metrics.record_tick(dt, counts);
        if let Some(snapshot) = self.metrics.maybe_snapshot() {
            self.metrics_handle.publish(snapshot);
            info!(
                ticks = snapshot.ticks,
                simulated_seconds = snapshot.simulated_seconds,
                moves_committed = snapshot.moves_committed,
                moves_blocked = snapshot.moves_blocked,
                placements_failed = snapshot.placements_failed,
                trigger_events = snapshot.trigger_events,
                continuations_resumed = snapshot.continuations_resumed,
                "field_metrics"
            );
        }
        self.tick_count = self.tick_count.saturating_add(1);
        report
    }
}

fn ensure_not_relocating(actor: &Actor) -> Result<(), FieldError> {
    let action = match actor.movement_state {
        MovementState::LinearSlide => ActionKind::Linear,
        MovementState::Jump => ActionKind::Jump,
        _ => return Ok(()),
    };
    Err(FieldError::ActorBusy {
        actor: actor.id,
        action,
    })
}

fn ensure_no_move_order(actor: &Actor) -> Result<(), FieldError> {
    if actor.move_target.is_some() {
        return Err(FieldError::ActorBusy {
            actor: actor.id,
            action: ActionKind::Move,
        });
    }
    Ok(())
}

fn validate_duration(action: ActionKind, seconds: f32) -> Result<(), FieldError> {
    if seconds.is_finite() && seconds >= 0.0 {
        Ok(())
    } else {
        Err(FieldError::InvalidDuration { action, seconds })
    }
}

fn register_waiter(
    actor: &mut Actor,
    kind: ActionKind,
    waiter: Option<ContinuationToken>,
) -> RequestStatus {
    match waiter {
        Some(token) => {
            actor.waiters.enqueue(kind, token);
            RequestStatus::Pending(token)
        }
        None => RequestStatus::Proceed,
    }
}

fn start_turn(
    actor: &mut Actor,
    heading: f32,
    target: Option<ActorId>,
    direction: TurnDirection,
    seconds: f32,
    easing: Easing,
    waiter: Option<ContinuationToken>,
) -> RequestStatus {
    if seconds == 0.0 || easing == Easing::None {
        actor.heading = heading;
        actor.turn = None;
        return RequestStatus::Proceed;
    }
    let start_heading = actor.heading;
    actor.turn = Some(TurnAction {
        start_heading,
        sweep_degrees: direction.sweep(start_heading, heading),
        direction,
        target,
        easing,
        timer: ActionTimer::new(seconds),
    });
    register_waiter(actor, ActionKind::Turn, waiter)
}
