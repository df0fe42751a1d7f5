use serde::{Deserialize, Serialize};

use super::continuation::ContinuationQueue;
use crate::math::{normalize_degrees, Vec3};
use crate::walkmesh::TriangleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementState {
    /// Not bound to the walkmesh.
    #[default]
    None,
    OnMesh,
    LinearSlide,
    Jump,
    /// Bound to the walkmesh but lost its triangle; placement retries every tick.
    NeedsReattach,
}

impl MovementState {
    pub fn is_walkmesh_bound(self) -> bool {
        matches!(self, Self::OnMesh | Self::NeedsReattach)
    }
}

/// Move order. Actor targets are weak: resolved by id every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveTarget {
    Point(Vec3),
    Actor(ActorId),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    /// Jump straight to the end value.
    None,
    #[default]
    Linear,
    /// Cubic ease-in/ease-out: `-2t^3 + 3t^2`.
    Smooth,
}

impl Easing {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::None => 1.0,
            Self::Linear => t,
            Self::Smooth => -2.0 * t * t * t + 3.0 * t * t,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnDirection {
    #[default]
    Closest,
    /// Heading increases.
    Clockwise,
    /// Heading decreases.
    CounterClockwise,
}

impl TurnDirection {
    /// Signed sweep in degrees from `start` to `end` honouring the direction.
    pub fn sweep(self, start: f32, end: f32) -> f32 {
        match self {
            Self::Closest => (end - start + 180.0).rem_euclid(360.0) - 180.0,
            Self::Clockwise => (end - start).rem_euclid(360.0),
            Self::CounterClockwise => -(start - end).rem_euclid(360.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationRequest {
    #[default]
    Idle,
    Walk,
    Run,
}

/// Elapsed/total clock shared by every timed action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionTimer {
    pub total_seconds: f32,
    pub elapsed_seconds: f32,
}

impl ActionTimer {
    pub fn new(total_seconds: f32) -> Self {
        Self {
            total_seconds: total_seconds.max(0.0),
            elapsed_seconds: 0.0,
        }
    }

    pub fn advance(&mut self, dt: f32) {
        self.elapsed_seconds = (self.elapsed_seconds + dt.max(0.0)).clamp(0.0, self.total_seconds);
    }

    pub fn progress(&self) -> f32 {
        if self.total_seconds <= 0.0 {
            return 1.0;
        }
        (self.elapsed_seconds / self.total_seconds).clamp(0.0, 1.0)
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed_seconds >= self.total_seconds
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearAction {
    pub start: Vec3,
    pub end: Vec3,
    pub easing: Easing,
    pub timer: ActionTimer,
    /// State restored on completion; walkmesh-bound actors are re-anchored.
    pub resume_state: MovementState,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JumpAction {
    pub start: Vec3,
    pub end: Vec3,
    pub gravity: f32,
    pub timer: ActionTimer,
    pub resume_state: MovementState,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnAction {
    pub start_heading: f32,
    pub sweep_degrees: f32,
    pub direction: TurnDirection,
    pub target: Option<ActorId>,
    pub easing: Easing,
    pub timer: ActionTimer,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetAction {
    pub start: Vec3,
    pub end: Vec3,
    pub easing: Easing,
    pub timer: ActionTimer,
}

/// Spawn parameters for an actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorDesc {
    pub name: String,
    pub position: Vec3,
    pub heading: f32,
    pub solid: bool,
    pub solid_radius: f32,
    pub talkable: bool,
    pub talk_radius: f32,
    pub height: f32,
    pub auto_rotate: bool,
    pub auto_animate: bool,
    pub move_speed: f32,
    pub stop_distance: f32,
    /// Bind to the walkmesh at spawn.
    pub on_mesh: bool,
}

impl Default for ActorDesc {
    fn default() -> Self {
        Self {
            name: String::new(),
            position: Vec3::default(),
            heading: 0.0,
            solid: true,
            solid_radius: 0.25,
            talkable: false,
            talk_radius: 0.5,
            height: 1.8,
            auto_rotate: true,
            auto_animate: true,
            move_speed: 1.0,
            stop_distance: 0.0,
            on_mesh: true,
        }
    }
}

impl ActorDesc {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Actor {
    pub(crate) id: ActorId,
    pub(crate) name: String,
    pub(crate) position: Vec3,
    pub(crate) heading: f32,
    pub(crate) offset: Vec3,
    pub(crate) movement_state: MovementState,
    pub(crate) triangle: Option<TriangleId>,
    pub(crate) solid: bool,
    pub(crate) solid_radius: f32,
    pub(crate) talkable: bool,
    pub(crate) talk_radius: f32,
    pub(crate) height: f32,
    pub(crate) auto_rotate: bool,
    pub(crate) auto_animate: bool,
    pub(crate) move_speed: f32,
    pub(crate) stop_distance: f32,
    pub(crate) move_target: Option<MoveTarget>,
    pub(crate) animation: AnimationRequest,
    pub(crate) linear: Option<LinearAction>,
    pub(crate) jump: Option<JumpAction>,
    pub(crate) turn: Option<TurnAction>,
    pub(crate) offset_action: Option<OffsetAction>,
    pub(crate) waiters: ContinuationQueue,
}

impl Actor {
    pub(crate) fn from_desc(id: ActorId, desc: ActorDesc) -> Self {
        let movement_state = if desc.on_mesh {
            MovementState::NeedsReattach
        } else {
            MovementState::None
        };
        Self {
            id,
            name: desc.name,
            position: desc.position,
            heading: normalize_degrees(desc.heading),
            offset: Vec3::default(),
            movement_state,
            triangle: None,
            solid: desc.solid,
            solid_radius: desc.solid_radius.max(0.0),
            talkable: desc.talkable,
            talk_radius: desc.talk_radius.max(0.0),
            height: desc.height.max(0.0),
            auto_rotate: desc.auto_rotate,
            auto_animate: desc.auto_animate,
            move_speed: desc.move_speed.max(0.0),
            stop_distance: desc.stop_distance.max(0.0),
            move_target: None,
            animation: AnimationRequest::Idle,
            linear: None,
            jump: None,
            turn: None,
            offset_action: None,
            waiters: ContinuationQueue::default(),
        }
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn heading(&self) -> f32 {
        self.heading
    }

    pub fn offset(&self) -> Vec3 {
        self.offset
    }

    pub fn movement_state(&self) -> MovementState {
        self.movement_state
    }

    /// `None` exactly when the actor is not anchored to the walkmesh.
    pub fn triangle(&self) -> Option<TriangleId> {
        self.triangle
    }

    pub fn is_anchored(&self) -> bool {
        self.triangle.is_some()
    }

    pub fn is_solid(&self) -> bool {
        self.solid
    }

    pub fn solid_radius(&self) -> f32 {
        self.solid_radius
    }

    pub fn is_talkable(&self) -> bool {
        self.talkable
    }

    pub fn talk_radius(&self) -> f32 {
        self.talk_radius
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn move_speed(&self) -> f32 {
        self.move_speed
    }

    pub fn stop_distance(&self) -> f32 {
        self.stop_distance
    }

    pub fn move_target(&self) -> Option<MoveTarget> {
        self.move_target
    }

    pub fn animation(&self) -> AnimationRequest {
        self.animation
    }

    pub fn waiters(&self) -> &ContinuationQueue {
        &self.waiters
    }

    pub fn is_turning(&self) -> bool {
        self.turn.is_some()
    }

    pub fn is_offsetting(&self) -> bool {
        self.offset_action.is_some()
    }

    pub fn set_solid(&mut self, solid: bool) {
        self.solid = solid;
    }

    pub fn set_talkable(&mut self, talkable: bool) {
        self.talkable = talkable;
    }

    pub fn set_move_speed(&mut self, speed: f32) {
        self.move_speed = speed.max(0.0);
    }

    pub fn set_stop_distance(&mut self, distance: f32) {
        self.stop_distance = distance.max(0.0);
    }

    pub fn set_heading(&mut self, heading: f32) {
        self.heading = normalize_degrees(heading);
    }

    pub fn set_auto_rotate(&mut self, enabled: bool) {
        self.auto_rotate = enabled;
    }

    pub fn set_auto_animate(&mut self, enabled: bool) {
        self.auto_animate = enabled;
    }

    /// Vertical extent `[z, z + height]` overlaps the other actor's.
    pub(crate) fn shares_vertical_band(&self, z: f32, other: &Actor) -> bool {
        let top = z + self.height;
        let other_top = other.position.z + other.height;
        z <= other_top && other.position.z <= top
    }

    pub(crate) fn unanchor(&mut self) {
        self.triangle = None;
        if self.movement_state == MovementState::OnMesh {
            self.movement_state = MovementState::NeedsReattach;
        }
    }
}

#[derive(Debug, Default)]
pub struct ActorIdAllocator {
    next: u64,
}

impl ActorIdAllocator {
    pub fn allocate(&mut self) -> ActorId {
        let id = ActorId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Actors of the loaded field, in spawn order.
#[derive(Debug, Default)]
pub struct ActorRegistry {
    allocator: ActorIdAllocator,
    actors: Vec<Actor>,
}

impl ActorRegistry {
    pub fn spawn(&mut self, desc: ActorDesc) -> ActorId {
        let id = self.allocator.allocate();
        self.actors.push(Actor::from_desc(id, desc));
        id
    }

    pub fn despawn(&mut self, id: ActorId) -> Option<Actor> {
        let index = self.index_of(id)?;
        Some(self.actors.remove(index))
    }

    pub fn index_of(&self, id: ActorId) -> Option<usize> {
        self.actors.iter().position(|actor| actor.id == id)
    }

    pub fn find(&self, id: ActorId) -> Option<&Actor> {
        self.actors.iter().find(|actor| actor.id == id)
    }

    pub fn find_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.actors.iter_mut().find(|actor| actor.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Actor> {
        self.actors.iter().find(|actor| actor.name == name)
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Actor> {
        self.actors.iter()
    }

    pub(crate) fn as_slice(&self) -> &[Actor] {
        &self.actors
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Actor] {
        &mut self.actors
    }

    pub fn clear(&mut self) {
        self.actors.clear();
    }
}
