mod border_walk;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::{Vec2, Vec3};

pub use border_walk::BorderWalk;

/// Number of edges (and adjacency slots) per triangle.
pub const TRIANGLE_EDGE_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriangleId(pub u32);

impl TriangleId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Walkmesh triangle.
///
/// Adjacency slot 0 is edge `a -> b`, slot 1 is `b -> c`, slot 2 is `c -> a`.
/// `None` marks the mesh boundary. A locked triangle stays in its neighbours'
/// adjacency; the lock is evaluated on the triangle being entered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
    #[serde(default)]
    pub neighbors: [Option<TriangleId>; TRIANGLE_EDGE_COUNT],
    #[serde(default)]
    pub locked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PointSide {
    Inside,
    OutsideEdge(usize),
    Degenerate,
}

impl Triangle {
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self {
            a,
            b,
            c,
            neighbors: [None; TRIANGLE_EDGE_COUNT],
            locked: false,
        }
    }

    pub fn with_neighbors(mut self, neighbors: [Option<TriangleId>; TRIANGLE_EDGE_COUNT]) -> Self {
        self.neighbors = neighbors;
        self
    }

    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    pub fn vertices(&self) -> [Vec3; TRIANGLE_EDGE_COUNT] {
        [self.a, self.b, self.c]
    }

    /// Solves the plane through `a`, `b`, `c` for z at `(x, y)`.
    ///
    /// Triangles that are vertical in projection have no unique answer and
    /// report the height of `a`.
    pub fn elevation_at(&self, x: f32, y: f32) -> f32 {
        let normal = (self.b - self.a).cross(self.c - self.a);
        if normal.z.abs() <= f32::EPSILON {
            return self.a.z;
        }
        self.a.z - (normal.x * (x - self.a.x) + normal.y * (y - self.a.y)) / normal.z
    }

    /// Planar containment test; points on an edge count as inside.
    pub fn contains_point(&self, point: Vec2) -> bool {
        matches!(self.locate(point), PointSide::Inside)
    }

    /// Signed-area test against the three directed edges, independent of
    /// winding. Reports the first edge slot the point lies outside of.
    pub(crate) fn locate(&self, point: Vec2) -> PointSide {
        let [a, b, c] = [self.a.xy(), self.b.xy(), self.c.xy()];
        let orientation = (b - a).perp_dot(c - a);
        if orientation == 0.0 || !orientation.is_finite() {
            return PointSide::Degenerate;
        }
        let winding = orientation.signum();
        for (edge, (start, end)) in [(a, b), (b, c), (c, a)].into_iter().enumerate() {
            let side = (end - start).perp_dot(point - start) * winding;
            if side < 0.0 {
                return PointSide::OutsideEdge(edge);
            }
        }
        PointSide::Inside
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WalkmeshError {
    #[error("triangle {triangle} edge {edge} references missing triangle {neighbor} (count {count})")]
    NeighborOutOfRange {
        triangle: u32,
        edge: usize,
        neighbor: u32,
        count: usize,
    },
    #[error("triangle {triangle} edge {edge} references itself")]
    SelfNeighbor { triangle: u32, edge: usize },
    #[error("unknown triangle {0}")]
    UnknownTriangle(u32),
    #[error("walkmesh has {0} triangles; ids must fit in u32")]
    TooManyTriangles(usize),
}

/// Read-only navigation surface for one loaded map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Walkmesh {
    triangles: Vec<Triangle>,
}

impl Walkmesh {
    pub fn new(triangles: Vec<Triangle>) -> Result<Self, WalkmeshError> {
        let count = triangles.len();
        if u32::try_from(count).is_err() {
            return Err(WalkmeshError::TooManyTriangles(count));
        }
        for (index, triangle) in triangles.iter().enumerate() {
            for (edge, neighbor) in triangle.neighbors.iter().enumerate() {
                let Some(neighbor) = neighbor else {
                    continue;
                };
                if neighbor.index() >= count {
                    return Err(WalkmeshError::NeighborOutOfRange {
                        triangle: index as u32,
                        edge,
                        neighbor: neighbor.0,
                        count,
                    });
                }
                if neighbor.index() == index {
                    return Err(WalkmeshError::SelfNeighbor {
                        triangle: index as u32,
                        edge,
                    });
                }
            }
        }
        Ok(Self { triangles })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn triangle(&self, id: TriangleId) -> Option<&Triangle> {
        self.triangles.get(id.index())
    }

    pub fn triangles(&self) -> impl Iterator<Item = (TriangleId, &Triangle)> {
        self.triangles
            .iter()
            .enumerate()
            .map(|(index, triangle)| (TriangleId(index as u32), triangle))
    }

    pub fn vertex_a(&self, id: TriangleId) -> Option<Vec3> {
        self.triangle(id).map(|triangle| triangle.a)
    }

    pub fn vertex_b(&self, id: TriangleId) -> Option<Vec3> {
        self.triangle(id).map(|triangle| triangle.b)
    }

    pub fn vertex_c(&self, id: TriangleId) -> Option<Vec3> {
        self.triangle(id).map(|triangle| triangle.c)
    }

    /// Neighbour across `edge`; `None` for the mesh boundary, an unknown
    /// triangle or an edge slot outside `0..3`.
    pub fn neighbor(&self, id: TriangleId, edge: usize) -> Option<TriangleId> {
        self.triangle(id)
            .and_then(|triangle| triangle.neighbors.get(edge).copied().flatten())
    }

    /// Unknown triangles are impassable.
    pub fn is_locked(&self, id: TriangleId) -> bool {
        self.triangle(id).map_or(true, |triangle| triangle.locked)
    }

    pub fn set_locked(&mut self, id: TriangleId, locked: bool) -> Result<(), WalkmeshError> {
        let triangle = self
            .triangles
            .get_mut(id.index())
            .ok_or(WalkmeshError::UnknownTriangle(id.0))?;
        triangle.locked = locked;
        Ok(())
    }

    pub fn elevation_at(&self, id: TriangleId, point: Vec2) -> Option<f32> {
        self.triangle(id)
            .map(|triangle| triangle.elevation_at(point.x, point.y))
    }
}
