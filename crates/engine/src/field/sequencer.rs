use tracing::debug;

use super::actor::{Actor, JumpAction, MovementState};
use super::continuation::{ActionKind, ScriptHost};
use super::placement::PlacementResolver;
use crate::config::PlacementPolicy;
use crate::math::{heading_from_direction, normalize_degrees, Vec3};
use crate::walkmesh::Walkmesh;

/// Time-driven linear slides, jumps, turns and offsets.
///
/// Each kind runs independently of the walkmesh move order and of the other
/// kinds. Completion resumes the scripts waiting on that kind.
pub struct ActionSequencer<'a> {
    walkmesh: &'a Walkmesh,
    placement_policy: PlacementPolicy,
}

impl<'a> ActionSequencer<'a> {
    pub fn new(walkmesh: &'a Walkmesh, placement_policy: PlacementPolicy) -> Self {
        Self {
            walkmesh,
            placement_policy,
        }
    }

    /// Returns the action kinds that completed during this advance.
    pub fn advance(
        &self,
        actors: &mut [Actor],
        index: usize,
        dt: f32,
        host: &mut dyn ScriptHost,
    ) -> Vec<ActionKind> {
        let Some(turn_goal) = actors.get(index).map(|actor| resolve_turn_goal(actors, actor)) else {
            return Vec::new();
        };
        let actor = &mut actors[index];
        let mut completed = Vec::new();

        if let Some(mut linear) = actor.linear.take() {
            linear.timer.advance(dt);
            if linear.timer.is_finished() {
                actor.position = linear.end;
                self.finish_relocation(actor, linear.resume_state);
                completed.push(ActionKind::Linear);
            } else {
                let t = linear.easing.apply(linear.timer.progress());
                actor.position = linear.start.lerp(linear.end, t);
                actor.linear = Some(linear);
            }
        }

        if let Some(mut jump) = actor.jump.take() {
            jump.timer.advance(dt);
            if jump.timer.is_finished() {
                actor.position = jump.end;
                self.finish_relocation(actor, jump.resume_state);
                completed.push(ActionKind::Jump);
            } else {
                actor.position = jump_position(&jump);
                actor.jump = Some(jump);
            }
        }

        if let Some(mut turn) = actor.turn.take() {
            if let Some(goal) = turn_goal {
                turn.sweep_degrees = turn.direction.sweep(turn.start_heading, goal);
            }
            turn.timer.advance(dt);
            let t = if turn.timer.is_finished() {
                1.0
            } else {
                turn.easing.apply(turn.timer.progress())
            };
            actor.heading = normalize_degrees(turn.start_heading + turn.sweep_degrees * t);
            if turn.timer.is_finished() {
                completed.push(ActionKind::Turn);
            } else {
                actor.turn = Some(turn);
            }
        }

        if let Some(mut offset) = actor.offset_action.take() {
            offset.timer.advance(dt);
            if offset.timer.is_finished() {
                actor.offset = offset.end;
                completed.push(ActionKind::Offset);
            } else {
                let t = offset.easing.apply(offset.timer.progress());
                actor.offset = offset.start.lerp(offset.end, t);
                actor.offset_action = Some(offset);
            }
        }

        for kind in &completed {
            let resumed = actor.waiters.resume(*kind, host);
            debug!(
                actor = %actor.name,
                action = kind.as_str(),
                resumed,
                "action_completed"
            );
        }
        completed
    }

    /// Restores the pre-action movement state, re-anchoring walkmesh-bound
    /// actors. A failed placement leaves `NeedsReattach` for the next tick.
    pub(crate) fn finish_relocation(&self, actor: &mut Actor, resume_state: MovementState) {
        actor.triangle = None;
        if !resume_state.is_walkmesh_bound() {
            actor.movement_state = MovementState::None;
            return;
        }
        actor.movement_state = MovementState::NeedsReattach;
        PlacementResolver::new(self.walkmesh, self.placement_policy).anchor(actor);
    }
}

/// Live heading towards a turn's target actor, if it still exists.
fn resolve_turn_goal(actors: &[Actor], actor: &Actor) -> Option<f32> {
    let target_id = actor.turn.as_ref()?.target?;
    let target = actors.iter().find(|other| other.id == target_id)?;
    heading_from_direction(target.position.xy() - actor.position.xy())
}

/// Planar lerp with a ballistic height:
/// `z(t) = start.z + t * ((end.z - start.z) / T + T * g) - g * t^2`.
pub fn jump_position(jump: &JumpAction) -> Vec3 {
    let total = jump.timer.total_seconds;
    let t = jump.timer.elapsed_seconds.clamp(0.0, total);
    let planar = jump.start.xy().lerp(jump.end.xy(), jump.timer.progress());
    if total <= 0.0 {
        return jump.end;
    }
    let g = jump.gravity;
    let z = jump.start.z + t * ((jump.end.z - jump.start.z) / total + total * g) - g * t * t;
    planar.extend(z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::actor::{
        ActionTimer, ActorDesc, ActorRegistry, Easing, LinearAction, OffsetAction, TurnAction,
        TurnDirection,
    };
    use crate::field::continuation::{ContinuationToken, RecordingScriptHost};
    use crate::walkmesh::test_meshes::flat_square;
    use crate::walkmesh::TriangleId;

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() <= 1.0e-4,
            "{actual} vs {expected}"
        );
    }

    #[test]
    fn jump_arc_starts_and_ends_exactly_on_endpoints() {
        let cases = [
            (Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 3.0), 0.5, 13.08),
            (Vec3::new(-1.0, 4.0, 2.5), Vec3::new(1.0, 1.0, -1.0), 1.7, 1.0),
            (Vec3::new(3.0, 3.0, 0.0), Vec3::new(3.0, 3.0, 0.0), 0.1, 0.0),
        ];
        for (start, end, total, gravity) in cases {
            let mut jump = JumpAction {
                start,
                end,
                gravity,
                timer: ActionTimer::new(total),
                resume_state: MovementState::None,
            };
            assert_close(jump_position(&jump).z, start.z);
            jump.timer.elapsed_seconds = total;
            let landed = jump_position(&jump);
            assert_close(landed.z, end.z);
            assert_close(landed.x, end.x);
            assert_close(landed.y, end.y);
        }
    }

    #[test]
    fn jump_rises_above_both_endpoints_mid_flight() {
        let jump = JumpAction {
            start: Vec3::new(0.0, 0.0, 0.0),
            end: Vec3::new(1.0, 0.0, 0.0),
            gravity: 13.08,
            timer: ActionTimer {
                total_seconds: 1.0,
                elapsed_seconds: 0.5,
            },
            resume_state: MovementState::None,
        };
        let apex = jump_position(&jump);
        assert_close(apex.x, 0.5);
        assert_close(apex.z, 13.08 * 0.25);
    }

    #[test]
    fn linear_slide_eases_and_reanchors_on_completion() {
        let mesh = flat_square();
        let sequencer = ActionSequencer::new(&mesh, PlacementPolicy::ClosestElevation);
        let mut registry = ActorRegistry::default();
        let id = registry.spawn(ActorDesc::named("cloud").at(Vec3::new(-1.0, 1.0, 0.0)));
        let index = registry.index_of(id).expect("index");
        {
            let actor = &mut registry.as_mut_slice()[index];
            actor.movement_state = MovementState::LinearSlide;
            actor.linear = Some(LinearAction {
                start: Vec3::new(-1.0, 1.0, 0.0),
                end: Vec3::new(1.0, -1.0, 0.5),
                easing: Easing::Smooth,
                timer: ActionTimer::new(1.0),
                resume_state: MovementState::OnMesh,
            });
            actor.waiters.enqueue(ActionKind::Linear, ContinuationToken(3));
        }
        let mut host = RecordingScriptHost::default();

        let completed = sequencer.advance(registry.as_mut_slice(), index, 0.5, &mut host);
        assert!(completed.is_empty());
        let midway = registry.as_slice()[index].position();
        assert_close(midway.x, 0.0);
        assert_close(midway.z, 0.25);

        let completed = sequencer.advance(registry.as_mut_slice(), index, 0.5, &mut host);
        assert_eq!(completed, vec![ActionKind::Linear]);
        let actor = &registry.as_slice()[index];
        assert_eq!(actor.movement_state(), MovementState::OnMesh);
        assert_eq!(actor.triangle(), Some(TriangleId(0)));
        assert_eq!(actor.position().z, 0.0);
        assert_eq!(host.resumed_tokens(), vec![ContinuationToken(3)]);
    }

    #[test]
    fn relocation_off_the_mesh_waits_for_reattach() {
        let mesh = flat_square();
        let sequencer = ActionSequencer::new(&mesh, PlacementPolicy::ClosestElevation);
        let mut registry = ActorRegistry::default();
        let id = registry.spawn(ActorDesc::named("cloud").at(Vec3::new(9.0, 9.0, 0.0)));
        let actor = registry.find_mut(id).expect("actor");
        sequencer.finish_relocation(actor, MovementState::OnMesh);
        assert_eq!(actor.movement_state(), MovementState::NeedsReattach);
        assert_eq!(actor.triangle(), None);

        sequencer.finish_relocation(actor, MovementState::None);
        assert_eq!(actor.movement_state(), MovementState::None);
    }

    #[test]
    fn turn_sweeps_requested_direction_and_tracks_target_actor() {
        let mesh = flat_square();
        let sequencer = ActionSequencer::new(&mesh, PlacementPolicy::ClosestElevation);
        let mut registry = ActorRegistry::default();
        let cloud = registry.spawn(ActorDesc::named("cloud").at(Vec3::new(0.0, 0.0, 0.0)));
        let tifa = registry.spawn(ActorDesc::named("tifa").at(Vec3::new(1.0, 0.0, 0.0)));
        let index = registry.index_of(cloud).expect("index");
        {
            let actor = &mut registry.as_mut_slice()[index];
            actor.heading = 0.0;
            actor.turn = Some(TurnAction {
                start_heading: 0.0,
                sweep_degrees: 90.0,
                direction: TurnDirection::Closest,
                target: Some(tifa),
                easing: Easing::Linear,
                timer: ActionTimer::new(1.0),
            });
        }
        let mut host = RecordingScriptHost::default();

        sequencer.advance(registry.as_mut_slice(), index, 0.5, &mut host);
        assert_close(registry.as_slice()[index].heading(), 45.0);

        // Target walks around to the other side; the sweep follows it.
        registry.find_mut(tifa).expect("tifa").position = Vec3::new(-1.0, 0.0, 0.0);
        let completed = sequencer.advance(registry.as_mut_slice(), index, 0.5, &mut host);
        assert_eq!(completed, vec![ActionKind::Turn]);
        assert_close(registry.as_slice()[index].heading(), 270.0);
        assert!(!registry.as_slice()[index].is_turning());
    }

    #[test]
    fn counter_clockwise_turn_takes_the_long_way() {
        let mesh = flat_square();
        let sequencer = ActionSequencer::new(&mesh, PlacementPolicy::ClosestElevation);
        let mut registry = ActorRegistry::default();
        let id = registry.spawn(ActorDesc::named("cloud"));
        let index = registry.index_of(id).expect("index");
        registry.as_mut_slice()[index].turn = Some(TurnAction {
            start_heading: 0.0,
            sweep_degrees: TurnDirection::CounterClockwise.sweep(0.0, 90.0),
            direction: TurnDirection::CounterClockwise,
            target: None,
            easing: Easing::Linear,
            timer: ActionTimer::new(1.0),
        });
        let mut host = RecordingScriptHost::default();
        sequencer.advance(registry.as_mut_slice(), index, 0.5, &mut host);
        assert_close(registry.as_slice()[index].heading(), 225.0);
    }

    #[test]
    fn offset_runs_alongside_other_actions() {
        let mesh = flat_square();
        let sequencer = ActionSequencer::new(&mesh, PlacementPolicy::ClosestElevation);
        let mut registry = ActorRegistry::default();
        let id = registry.spawn(ActorDesc::named("cloud"));
        let index = registry.index_of(id).expect("index");
        {
            let actor = &mut registry.as_mut_slice()[index];
            actor.offset_action = Some(OffsetAction {
                start: Vec3::default(),
                end: Vec3::new(0.0, 0.0, 1.0),
                easing: Easing::Linear,
                timer: ActionTimer::new(0.2),
            });
            actor.turn = Some(TurnAction {
                start_heading: 0.0,
                sweep_degrees: 180.0,
                direction: TurnDirection::Clockwise,
                target: None,
                easing: Easing::Linear,
                timer: ActionTimer::new(0.2),
            });
            actor.waiters.enqueue(ActionKind::Offset, ContinuationToken(1));
            actor.waiters.enqueue(ActionKind::Turn, ContinuationToken(2));
        }
        let mut host = RecordingScriptHost::default();
        let completed = sequencer.advance(registry.as_mut_slice(), index, 0.25, &mut host);
        assert_eq!(completed, vec![ActionKind::Turn, ActionKind::Offset]);
        assert_eq!(registry.as_slice()[index].offset(), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(
            host.resumed_tokens(),
            vec![ContinuationToken(2), ContinuationToken(1)]
        );
    }
}
