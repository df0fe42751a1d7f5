use tracing::debug;

use super::actor::Actor;
use super::continuation::ScriptHost;
use super::trigger::{TriggerEvent, TriggerId, TriggerSet, TriggerState};
use crate::config::TriggerConfig;
use crate::math::{heading_from_direction, normalize_degrees, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerFiring {
    pub trigger: TriggerId,
    pub event: TriggerEvent,
}

/// Per-tick proximity and crossing checks of the player against every
/// enabled trigger line. Other actors never activate triggers.
pub struct TriggerEvaluator<'a> {
    config: &'a TriggerConfig,
}

impl<'a> TriggerEvaluator<'a> {
    pub fn new(config: &'a TriggerConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(
        &self,
        triggers: &mut TriggerSet,
        player: &Actor,
        moving: bool,
        host: &mut dyn ScriptHost,
    ) -> Vec<TriggerFiring> {
        let radius_squared = player.solid_radius * player.solid_radius;
        let position = player.position.xy();
        let mut firings = Vec::new();

        for (id, trigger) in triggers.iter_mut() {
            if !trigger.is_enabled() {
                continue;
            }
            let proximity = trigger.proximity(position);
            let inside = proximity.filter(|p| p.distance_squared <= radius_squared);
            let facing = inside.is_some_and(|p| faces(player.heading, position, p.foot));

            let mut events = Vec::new();
            step_state(
                &mut trigger.state,
                inside.map(|p| p.distance_squared),
                facing && moving,
                self.config,
                &mut events,
            );

            for event in events {
                debug!(
                    trigger = trigger.name(),
                    event = event.as_str(),
                    actor = %player.name,
                    "trigger_fired"
                );
                host.request_script(trigger.name(), event.as_str(), self.config.script_priority);
                firings.push(TriggerFiring { trigger: id, event });
            }
        }
        firings
    }
}

/// `inside` carries the squared distance when the player is within radius.
fn step_state(
    state: &mut TriggerState,
    inside: Option<f32>,
    can_approach: bool,
    config: &TriggerConfig,
    events: &mut Vec<TriggerEvent>,
) {
    if !state.approached {
        if inside.is_some() && can_approach {
            state.approached = true;
            events.push(TriggerEvent::Approach);
        } else {
            return;
        }
    }

    let Some(distance_squared) = inside else {
        state.clear();
        events.push(TriggerEvent::Leave);
        return;
    };

    if !state.crossed && distance_squared < config.cross_distance_squared {
        state.crossed = true;
        events.push(TriggerEvent::Cross);
    }
    if !state.near_once_fired {
        state.near_once_fired = true;
        events.push(TriggerEvent::NearOnce);
    }
    if state.near_cooldown == 0 {
        state.near_cooldown = config.near_cooldown_ticks;
        events.push(TriggerEvent::Near);
    } else {
        state.near_cooldown -= 1;
    }
}

/// Heading points into the half-plane containing `foot`.
pub(crate) fn faces(heading: f32, position: Vec2, foot: Vec2) -> bool {
    let Some(to_foot) = heading_from_direction(foot - position) else {
        return false;
    };
    let relative = normalize_degrees(to_foot - heading + 90.0);
    relative > 0.0 && relative < 180.0
}
