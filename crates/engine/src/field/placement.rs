use tracing::{debug, error};

use super::actor::{Actor, MovementState};
use crate::config::PlacementPolicy;
use crate::math::Vec3;
use crate::walkmesh::{TriangleId, Walkmesh};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub triangle: TriangleId,
    pub z: f32,
}

/// Finds the supporting triangle for a planar position.
///
/// Every triangle is tested; walkmeshes are small enough per map that a
/// spatial index is not worth keeping in sync with lock toggles.
pub struct PlacementResolver<'a> {
    walkmesh: &'a Walkmesh,
    policy: PlacementPolicy,
}

impl<'a> PlacementResolver<'a> {
    pub fn new(walkmesh: &'a Walkmesh, policy: PlacementPolicy) -> Self {
        Self { walkmesh, policy }
    }

    /// Ties go to the lowest triangle index.
    pub fn resolve(&self, position: Vec3) -> Option<Placement> {
        let point = position.xy();
        let candidates = self
            .walkmesh
            .triangles()
            .filter(|(_, triangle)| triangle.contains_point(point))
            .map(|(id, triangle)| Placement {
                triangle: id,
                z: triangle.elevation_at(point.x, point.y),
            })
            .collect::<Vec<_>>();

        match self.policy {
            PlacementPolicy::ClosestElevation => closest_to(&candidates, position.z),
            PlacementPolicy::HighestBelow => {
                let mut best: Option<Placement> = None;
                for candidate in candidates.iter().filter(|c| c.z <= position.z) {
                    if best.map_or(true, |current| candidate.z > current.z) {
                        best = Some(*candidate);
                    }
                }
                best.or_else(|| closest_to(&candidates, position.z))
            }
        }
    }

    /// Anchors the actor, rewriting its height. Leaves it untouched on failure.
    pub fn anchor(&self, actor: &mut Actor) -> bool {
        let Some(placement) = self.resolve(actor.position) else {
            error!(
                actor = %actor.name,
                x = actor.position.x,
                y = actor.position.y,
                z = actor.position.z,
                "placement_failed"
            );
            return false;
        };
        actor.position.z = placement.z;
        actor.triangle = Some(placement.triangle);
        if actor.movement_state == MovementState::NeedsReattach {
            actor.movement_state = MovementState::OnMesh;
        }
        debug!(
            actor = %actor.name,
            triangle = placement.triangle.0,
            z = placement.z,
            "actor_anchored"
        );
        true
    }
}

fn closest_to(candidates: &[Placement], z: f32) -> Option<Placement> {
    let mut best: Option<Placement> = None;
    for candidate in candidates {
        let better = best.map_or(true, |current| {
            (candidate.z - z).abs() < (current.z - z).abs()
        });
        if better {
            best = Some(*candidate);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::actor::{ActorDesc, ActorRegistry};
    use crate::math::Vec2;
    use crate::walkmesh::Triangle;

    /// Ground floor at z=0 and a bridge at z=3 over the same square.
    fn two_level_mesh() -> Walkmesh {
        let square = |z: f32| {
            Triangle::new(
                Vec3::new(0.0, 0.0, z),
                Vec3::new(4.0, 0.0, z),
                Vec3::new(0.0, 4.0, z),
            )
        };
        Walkmesh::new(vec![square(0.0), square(3.0)]).expect("mesh")
    }

    #[test]
    fn single_flat_triangle_anchors_at_plane_elevation() {
        let mesh = Walkmesh::new(vec![Triangle::new(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        )])
        .expect("mesh");
        let mut registry = ActorRegistry::default();
        let id = registry.spawn(ActorDesc::named("cloud").at(Vec3::new(0.2, 0.2, 7.5)));
        let actor = registry.find_mut(id).expect("actor");

        let resolver = PlacementResolver::new(&mesh, PlacementPolicy::ClosestElevation);
        assert!(resolver.anchor(actor));
        assert_eq!(actor.triangle(), Some(TriangleId(0)));
        assert_eq!(actor.position().z, 0.0);
        assert_eq!(actor.movement_state(), MovementState::OnMesh);
    }

    #[test]
    fn placement_matches_plane_elevation_inside_sloped_triangles() {
        let mesh = Walkmesh::new(vec![
            Triangle::new(
                Vec3::new(0.0, 0.0, 1.0),
                Vec3::new(3.0, 0.0, 2.5),
                Vec3::new(0.0, 3.0, -0.5),
            ),
            Triangle::new(
                Vec3::new(10.0, 0.0, 0.0),
                Vec3::new(12.0, 0.0, 4.0),
                Vec3::new(10.0, 2.0, 2.0),
            ),
        ])
        .expect("mesh");
        let resolver = PlacementResolver::new(&mesh, PlacementPolicy::ClosestElevation);
        for (id, triangle) in mesh.triangles() {
            let [a, b, c] = triangle.vertices();
            for (wa, wb) in [(0.2, 0.3), (0.6, 0.1), (0.33, 0.33)] {
                let wc = 1.0 - wa - wb;
                let x = a.x * wa + b.x * wb + c.x * wc;
                let y = a.y * wa + b.y * wb + c.y * wc;
                let placement = resolver.resolve(Vec3::new(x, y, 50.0)).expect("placed");
                assert_eq!(placement.triangle, id);
                let expected = triangle.elevation_at(x, y);
                assert!((placement.z - expected).abs() < 1.0e-4);
                let barycentric_z = a.z * wa + b.z * wb + c.z * wc;
                assert!((placement.z - barycentric_z).abs() < 1.0e-4);
            }
        }
    }

    #[test]
    fn overlapping_levels_resolve_to_closest_elevation() {
        let mesh = two_level_mesh();
        let resolver = PlacementResolver::new(&mesh, PlacementPolicy::ClosestElevation);
        let low = resolver.resolve(Vec3::new(1.0, 1.0, 0.4)).expect("low");
        assert_eq!(low.triangle, TriangleId(0));
        let high = resolver.resolve(Vec3::new(1.0, 1.0, 2.2)).expect("high");
        assert_eq!(high.triangle, TriangleId(1));
        let tie = resolver.resolve(Vec3::new(1.0, 1.0, 1.5)).expect("tie");
        assert_eq!(tie.triangle, TriangleId(0));
    }

    #[test]
    fn highest_below_policy_prefers_surface_underneath() {
        let mesh = two_level_mesh();
        let resolver = PlacementResolver::new(&mesh, PlacementPolicy::HighestBelow);
        let placement = resolver.resolve(Vec3::new(1.0, 1.0, 2.9)).expect("below");
        assert_eq!(placement.triangle, TriangleId(0));
        let under_everything = resolver.resolve(Vec3::new(1.0, 1.0, -1.0)).expect("fallback");
        assert_eq!(under_everything.triangle, TriangleId(0));
    }

    #[test]
    fn point_outside_every_triangle_fails_without_mutation() {
        let mesh = two_level_mesh();
        let mut registry = ActorRegistry::default();
        let id = registry.spawn(ActorDesc::named("cloud").at(Vec3::new(9.0, 9.0, 1.0)));
        let actor = registry.find_mut(id).expect("actor");
        let resolver = PlacementResolver::new(&mesh, PlacementPolicy::ClosestElevation);
        assert!(!resolver.anchor(actor));
        assert_eq!(actor.triangle(), None);
        assert_eq!(actor.position(), Vec3::new(9.0, 9.0, 1.0));
        assert!(resolver.resolve(Vec2::new(9.0, 9.0).extend(0.0)).is_none());
    }
}
