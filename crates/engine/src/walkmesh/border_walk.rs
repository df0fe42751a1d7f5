use tracing::warn;

use super::{PointSide, TriangleId, Walkmesh, WalkmeshError};
use crate::math::Vec2;

/// Result of walking from a triangle towards a planar point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderWalk {
    /// The walk hit the mesh boundary or a locked triangle.
    pub blocked: bool,
    /// Triangle where the walk stopped.
    pub triangle: TriangleId,
    /// Plane elevation of `triangle` at the target point.
    pub z: f32,
}

impl Walkmesh {
    /// Point-location walk across adjacency from `start` towards `target`.
    ///
    /// Locked triangles and boundary edges stop the walk in both directions.
    /// The walk is bounded by the triangle count so malformed adjacency
    /// cycles report `blocked` instead of spinning.
    pub fn walk(&self, start: TriangleId, target: Vec2) -> Result<BorderWalk, WalkmeshError> {
        let mut current = start;
        let mut triangle = self
            .triangle(current)
            .ok_or(WalkmeshError::UnknownTriangle(start.0))?;
        let max_steps = self.triangle_count().saturating_add(1);
        let mut steps = 0usize;

        loop {
            let edge = match triangle.locate(target) {
                PointSide::Inside => {
                    return Ok(BorderWalk {
                        blocked: false,
                        triangle: current,
                        z: triangle.elevation_at(target.x, target.y),
                    });
                }
                PointSide::OutsideEdge(edge) => edge,
                PointSide::Degenerate => break,
            };

            let Some(next) = triangle.neighbors[edge] else {
                break;
            };
            let Some(next_triangle) = self.triangle(next) else {
                break;
            };
            if next_triangle.locked {
                break;
            }

            steps += 1;
            if steps > max_steps {
                warn!(
                    start = start.0,
                    stopped_at = current.0,
                    target_x = target.x,
                    target_y = target.y,
                    "walkmesh_walk_step_limit"
                );
                break;
            }
            current = next;
            triangle = next_triangle;
        }

        Ok(BorderWalk {
            blocked: true,
            triangle: current,
            z: triangle.elevation_at(target.x, target.y),
        })
    }
}
