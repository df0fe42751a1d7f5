use tracing::{debug, error, trace, warn};

use super::actor::{Actor, AnimationRequest, MoveTarget};
use super::continuation::{ActionKind, ScriptHost};
use crate::config::{CollisionRadiusPolicy, MovementConfig};
use crate::math::{heading_from_direction, Vec2, Vec3, LENGTH_EPSILON};
use crate::walkmesh::{TriangleId, Walkmesh};

/// Result of one walkmesh move attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    NoOrder,
    /// The actor being followed no longer exists; the order was cleared.
    TargetLost,
    /// Already within stop distance; the order was cleared.
    Arrived,
    /// Zero-length step.
    Stationary,
    /// No anchored triangle; the order was cleared.
    Unanchored,
    /// Every slide direction was obstructed. The order is kept.
    Blocked,
    Moved { arrived: bool },
}

impl MoveOutcome {
    pub fn moved(self) -> bool {
        matches!(self, Self::Moved { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum MovePlan {
    Skip(MoveOutcome),
    Commit {
        position: Vec3,
        triangle: TriangleId,
        heading: Option<f32>,
        arrived: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ProbeHits {
    positive: bool,
    negative: bool,
    centre: bool,
}

enum Steer {
    Accept,
    Rotate(f32),
    GiveUp,
}

/// Advances actors towards their move target across the walkmesh, sliding
/// around locked borders and solid actors.
pub struct MovementResolver<'a> {
    walkmesh: &'a Walkmesh,
    config: &'a MovementConfig,
}

impl<'a> MovementResolver<'a> {
    pub fn new(walkmesh: &'a Walkmesh, config: &'a MovementConfig) -> Self {
        Self { walkmesh, config }
    }

    pub fn perform_walkmesh_move(
        &self,
        actors: &mut [Actor],
        index: usize,
        is_player: bool,
        speed: f32,
        dt: f32,
        host: &mut dyn ScriptHost,
    ) -> MoveOutcome {
        if index >= actors.len() {
            return MoveOutcome::NoOrder;
        }
        let plan = self.plan_move(actors, index, is_player, speed, dt);
        let actor = &mut actors[index];

        match plan {
            MovePlan::Skip(outcome) => {
                match outcome {
                    MoveOutcome::TargetLost => {
                        warn!(actor = %actor.name, "move_target_lost");
                        unset_move(actor, host);
                    }
                    MoveOutcome::Arrived => {
                        debug!(actor = %actor.name, "move_arrived");
                        unset_move(actor, host);
                    }
                    MoveOutcome::Unanchored => {
                        error!(actor = %actor.name, "move_without_triangle");
                        unset_move(actor, host);
                    }
                    MoveOutcome::Blocked => {
                        trace!(actor = %actor.name, "move_blocked");
                    }
                    MoveOutcome::NoOrder | MoveOutcome::Stationary | MoveOutcome::Moved { .. } => {}
                }
                outcome
            }
            MovePlan::Commit {
                position,
                triangle,
                heading,
                arrived,
            } => {
                actor.position = position;
                actor.triangle = Some(triangle);
                if let Some(heading) = heading {
                    actor.heading = heading;
                }
                if actor.auto_animate {
                    actor.animation = if speed >= self.config.run_speed_threshold {
                        AnimationRequest::Run
                    } else {
                        AnimationRequest::Walk
                    };
                }
                trace!(
                    actor = %actor.name,
                    x = position.x,
                    y = position.y,
                    z = position.z,
                    triangle = triangle.0,
                    "move_committed"
                );
                if arrived {
                    debug!(actor = %actor.name, "move_arrived");
                    unset_move(actor, host);
                }
                MoveOutcome::Moved { arrived }
            }
        }
    }

    fn plan_move(
        &self,
        actors: &[Actor],
        index: usize,
        is_player: bool,
        speed: f32,
        dt: f32,
    ) -> MovePlan {
        let actor = &actors[index];
        let Some(order) = actor.move_target else {
            return MovePlan::Skip(MoveOutcome::NoOrder);
        };
        let target = match order {
            MoveTarget::Point(point) => point,
            MoveTarget::Actor(id) => match actors.iter().find(|other| other.id == id) {
                Some(other) => other.position,
                None => return MovePlan::Skip(MoveOutcome::TargetLost),
            },
        };

        let origin = actor.position.xy();
        let to_target = target.xy() - origin;
        if to_target.length() <= actor.stop_distance {
            return MovePlan::Skip(MoveOutcome::Arrived);
        }

        let step_length = speed * dt;
        let Some(direction) = to_target.normalized() else {
            return MovePlan::Skip(MoveOutcome::Stationary);
        };
        if !step_length.is_finite() || step_length <= LENGTH_EPSILON {
            return MovePlan::Skip(MoveOutcome::Stationary);
        }

        let Some(start) = actor
            .triangle
            .filter(|id| self.walkmesh.triangle(*id).is_some())
        else {
            return MovePlan::Skip(MoveOutcome::Unanchored);
        };

        let step_length = self.shorten_by_slope(start, actor.position, direction, step_length);
        let heading = if actor.auto_rotate {
            heading_from_direction(direction)
        } else {
            None
        };
        let radius = if actor.solid {
            actor.solid_radius
        } else {
            self.config.non_solid_probe_radius
        };

        let budget = if is_player {
            self.config.player_iterations
        } else {
            self.config.npc_iterations
        };

        let mut direction = direction;
        for _ in 0..budget {
            let end = origin + direction * step_length;
            let hits = self.probe(actors, index, start, end, direction, radius);
            match self.steer(hits, is_player) {
                Steer::Accept => {
                    let walk = match self.walkmesh.walk(start, end) {
                        Ok(walk) if !walk.blocked => walk,
                        _ => return MovePlan::Skip(MoveOutcome::Blocked),
                    };
                    let remaining = target.xy().distance(end);
                    let tolerance = actor.stop_distance
                        + self.config.arrival_tolerance_factor * speed * dt;
                    return MovePlan::Commit {
                        position: end.extend(walk.z),
                        triangle: walk.triangle,
                        heading,
                        arrived: remaining <= tolerance,
                    };
                }
                Steer::Rotate(degrees) => direction = direction.rotated_degrees(degrees),
                Steer::GiveUp => return MovePlan::Skip(MoveOutcome::Blocked),
            }
        }
        MovePlan::Skip(MoveOutcome::Blocked)
    }

    /// Planar step length after following the surface slope of `triangle`.
    fn shorten_by_slope(
        &self,
        triangle: TriangleId,
        position: Vec3,
        direction: Vec2,
        step_length: f32,
    ) -> f32 {
        let planar = direction * step_length;
        let end = position.xy() + planar;
        let Some(end_z) = self.walkmesh.elevation_at(triangle, end) else {
            return step_length;
        };
        let along_surface = planar.extend(end_z - position.z).length();
        if !along_surface.is_finite() || along_surface <= LENGTH_EPSILON {
            return step_length;
        }
        step_length * (step_length / along_surface)
    }

    fn probe(
        &self,
        actors: &[Actor],
        index: usize,
        start: TriangleId,
        end: Vec2,
        direction: Vec2,
        radius: f32,
    ) -> ProbeHits {
        let angle = self.config.probe_angle_degrees;
        let blocked = |offset: Vec2| {
            let point = end + offset * radius;
            self.border_blocked(start, point) || self.actor_blocked(actors, index, point, radius)
        };
        ProbeHits {
            positive: blocked(direction.rotated_degrees(angle)),
            negative: blocked(direction.rotated_degrees(-angle)),
            centre: blocked(direction),
        }
    }

    fn border_blocked(&self, start: TriangleId, point: Vec2) -> bool {
        self.walkmesh
            .walk(start, point)
            .map_or(true, |walk| walk.blocked)
    }

    fn actor_blocked(&self, actors: &[Actor], index: usize, point: Vec2, radius: f32) -> bool {
        let actor = &actors[index];
        if !actor.solid {
            return false;
        }
        actors.iter().enumerate().any(|(other_index, other)| {
            if other_index == index || !other.solid {
                return false;
            }
            if !actor.shares_vertical_band(actor.position.z, other) {
                return false;
            }
            let reach = match self.config.collision_policy {
                CollisionRadiusPolicy::OtherOnly => other.solid_radius,
                CollisionRadiusPolicy::Sum => other.solid_radius + radius,
            };
            point.distance_squared(other.position.xy()) < reach * reach
        })
    }

    /// Positive probe blocked turns the step towards negative headings and
    /// vice versa; a blocked centre doubles as a harder turn.
    fn steer(&self, hits: ProbeHits, is_player: bool) -> Steer {
        let slide = self.config.slide_step_degrees;
        let turn = self.config.turn_step_degrees;
        match (hits.positive, hits.centre, hits.negative) {
            (false, false, false) => Steer::Accept,
            (true, _, true) => Steer::GiveUp,
            (true, false, false) => Steer::Rotate(-slide),
            (false, false, true) => Steer::Rotate(slide),
            (true, true, false) => Steer::Rotate(-turn),
            (false, true, true) => Steer::Rotate(turn),
            (false, true, false) if is_player => Steer::GiveUp,
            (false, true, false) => Steer::Rotate(turn),
        }
    }
}

/// Clears the move order and resumes scripts waiting on it.
pub fn unset_move(actor: &mut Actor, host: &mut dyn ScriptHost) -> usize {
    actor.move_target = None;
    if actor.auto_animate {
        actor.animation = AnimationRequest::Idle;
    }
    actor.waiters.resume(ActionKind::Move, host)
}
