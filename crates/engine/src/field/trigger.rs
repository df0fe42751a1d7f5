use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::{Vec2, Vec3, LENGTH_EPSILON};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEvent {
    Approach,
    Cross,
    Near,
    NearOnce,
    Leave,
}

impl TriggerEvent {
    /// Script entry point name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approach => "on_approach",
            Self::Cross => "on_cross",
            Self::Near => "on_near",
            Self::NearOnce => "on_near_once",
            Self::Leave => "on_leave",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerDesc {
    pub name: String,
    pub a: Vec3,
    pub b: Vec3,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerError {
    #[error("trigger '{name}' has coincident endpoints")]
    DegenerateSegment { name: String },
    #[error("duplicate trigger name '{name}'")]
    DuplicateName { name: String },
}

/// Player interaction state for one trigger line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerState {
    pub approached: bool,
    pub crossed: bool,
    pub near_once_fired: bool,
    pub near_cooldown: u32,
}

impl TriggerState {
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Perpendicular foot of a point on a trigger segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentProximity {
    pub distance_squared: f32,
    pub foot: Vec2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    name: String,
    a: Vec3,
    b: Vec3,
    enabled: bool,
    pub(crate) state: TriggerState,
}

impl Trigger {
    pub fn new(desc: TriggerDesc) -> Result<Self, TriggerError> {
        if desc.a.xy().distance(desc.b.xy()) <= LENGTH_EPSILON {
            return Err(TriggerError::DegenerateSegment { name: desc.name });
        }
        Ok(Self {
            name: desc.name,
            a: desc.a,
            b: desc.b,
            enabled: desc.enabled,
            state: TriggerState::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoints(&self) -> (Vec3, Vec3) {
        (self.a, self.b)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    /// Planar distance to the segment, or `None` when the perpendicular foot
    /// falls outside the segment.
    pub fn proximity(&self, point: Vec2) -> Option<SegmentProximity> {
        let start = self.a.xy();
        let segment = self.b.xy() - start;
        let length_squared = segment.length_squared();
        if length_squared <= 0.0 {
            return None;
        }
        let t = (point - start).dot(segment) / length_squared;
        if !(0.0..=1.0).contains(&t) {
            return None;
        }
        let foot = start + segment * t;
        Some(SegmentProximity {
            distance_squared: point.distance_squared(foot),
            foot,
        })
    }
}

/// Trigger lines of the loaded field.
#[derive(Debug, Clone, Default)]
pub struct TriggerSet {
    triggers: Vec<Trigger>,
}

impl TriggerSet {
    pub fn from_descs(descs: Vec<TriggerDesc>) -> Result<Self, TriggerError> {
        let mut set = Self::default();
        for desc in descs {
            set.add(desc)?;
        }
        Ok(set)
    }

    pub fn add(&mut self, desc: TriggerDesc) -> Result<TriggerId, TriggerError> {
        if self.id_by_name(&desc.name).is_some() {
            return Err(TriggerError::DuplicateName { name: desc.name });
        }
        let id = TriggerId(self.triggers.len() as u32);
        self.triggers.push(Trigger::new(desc)?);
        Ok(id)
    }

    pub fn id_by_name(&self, name: &str) -> Option<TriggerId> {
        self.triggers
            .iter()
            .position(|trigger| trigger.name == name)
            .map(|index| TriggerId(index as u32))
    }

    pub fn get(&self, id: TriggerId) -> Option<&Trigger> {
        self.triggers.get(id.0 as usize)
    }

    /// Disabling freezes the interaction state until re-enabled.
    pub fn set_enabled(&mut self, id: TriggerId, enabled: bool) -> bool {
        match self.triggers.get_mut(id.0 as usize) {
            Some(trigger) => {
                trigger.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TriggerId, &Trigger)> {
        self.triggers
            .iter()
            .enumerate()
            .map(|(index, trigger)| (TriggerId(index as u32), trigger))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (TriggerId, &mut Trigger)> {
        self.triggers
            .iter_mut()
            .enumerate()
            .map(|(index, trigger)| (TriggerId(index as u32), trigger))
    }

    pub fn clear(&mut self) {
        self.triggers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertical_line() -> Trigger {
        Trigger::new(TriggerDesc {
            name: "gate".to_string(),
            a: Vec3::new(0.0, 0.0, 0.0),
            b: Vec3::new(0.0, 2.0, 0.0),
            enabled: true,
        })
        .expect("trigger")
    }

    #[test]
    fn proximity_projects_onto_segment() {
        let trigger = vertical_line();
        let proximity = trigger.proximity(Vec2::new(0.5, 1.0)).expect("inside");
        assert!((proximity.distance_squared - 0.25).abs() < 1.0e-6);
        assert_eq!(proximity.foot, Vec2::new(0.0, 1.0));
    }

    #[test]
    fn proximity_is_none_past_segment_ends() {
        let trigger = vertical_line();
        assert!(trigger.proximity(Vec2::new(0.1, -0.5)).is_none());
        assert!(trigger.proximity(Vec2::new(0.1, 2.5)).is_none());
        assert!(trigger.proximity(Vec2::new(0.1, 2.0)).is_some());
    }

    #[test]
    fn degenerate_and_duplicate_triggers_are_rejected() {
        let point = Vec3::new(1.0, 1.0, 0.0);
        let degenerate = Trigger::new(TriggerDesc {
            name: "dot".to_string(),
            a: point,
            b: point,
            enabled: true,
        });
        assert!(matches!(
            degenerate,
            Err(TriggerError::DegenerateSegment { .. })
        ));

        let line = TriggerDesc {
            name: "gate".to_string(),
            a: Vec3::new(0.0, 0.0, 0.0),
            b: Vec3::new(1.0, 0.0, 0.0),
            enabled: true,
        };
        let duplicate = TriggerSet::from_descs(vec![line.clone(), line]);
        assert_eq!(
            duplicate.err(),
            Some(TriggerError::DuplicateName {
                name: "gate".to_string()
            })
        );
    }

    #[test]
    fn set_enabled_reports_unknown_ids() {
        let mut set = TriggerSet::from_descs(vec![TriggerDesc {
            name: "gate".to_string(),
            a: Vec3::new(0.0, 0.0, 0.0),
            b: Vec3::new(1.0, 0.0, 0.0),
            enabled: true,
        }])
        .expect("set");
        let id = set.id_by_name("gate").expect("id");
        assert!(set.set_enabled(id, false));
        assert!(!set.get(id).expect("trigger").is_enabled());
        assert!(!set.set_enabled(TriggerId(3), true));
    }
}
