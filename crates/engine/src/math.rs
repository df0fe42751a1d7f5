use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

/// Lengths at or below this are treated as zero when normalizing.
pub const LENGTH_EPSILON: f32 = 1.0e-6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn dot(self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 3D cross product of two planar vectors.
    pub fn perp_dot(self, other: Vec2) -> f32 {
        self.x * other.y - self.y * other.x
    }

    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    pub fn distance_squared(self, other: Vec2) -> f32 {
        (other - self).length_squared()
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (other - self).length()
    }

    pub fn normalized(self) -> Option<Vec2> {
        let length = self.length();
        if !length.is_finite() || length <= LENGTH_EPSILON {
            return None;
        }
        Some(Vec2 {
            x: self.x / length,
            y: self.y / length,
        })
    }

    /// Rotates by `degrees`; positive angles increase the heading of the vector.
    pub fn rotated_degrees(self, degrees: f32) -> Vec2 {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Vec2 {
            x: self.x * cos - self.y * sin,
            y: self.x * sin + self.y * cos,
        }
    }

    pub fn lerp(self, end: Vec2, t: f32) -> Vec2 {
        self + (end - self) * t
    }

    pub fn extend(self, z: f32) -> Vec3 {
        Vec3 {
            x: self.x,
            y: self.y,
            z,
        }
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn xy(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn lerp(self, end: Vec3, t: f32) -> Vec3 {
        self + (end - self) * t
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Wraps an angle in degrees into `[0, 360)`.
pub fn normalize_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Heading convention: 0 degrees faces `(0, -1)` and angles grow towards `+x`.
pub fn heading_from_direction(direction: Vec2) -> Option<f32> {
    let direction = direction.normalized()?;
    let up = Vec2::new(0.0, -1.0);
    let angle = direction.dot(up).clamp(-1.0, 1.0).acos().to_degrees();
    let heading = if direction.x < 0.0 { 360.0 - angle } else { angle };
    Some(normalize_degrees(heading))
}

pub fn direction_from_heading(heading_degrees: f32) -> Vec2 {
    Vec2::new(0.0, -1.0).rotated_degrees(heading_degrees)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() <= 1.0e-3,
            "{actual} vs {expected}"
        );
    }

    #[test]
    fn heading_convention_matches_cardinal_directions() {
        assert_close(heading_from_direction(Vec2::new(0.0, -1.0)).expect("up"), 0.0);
        assert_close(heading_from_direction(Vec2::new(1.0, 0.0)).expect("east"), 90.0);
        assert_close(heading_from_direction(Vec2::new(0.0, 1.0)).expect("down"), 180.0);
        assert_close(heading_from_direction(Vec2::new(-1.0, 0.0)).expect("west"), 270.0);
        assert!(heading_from_direction(Vec2::default()).is_none());
    }

    #[test]
    fn positive_rotation_increases_heading() {
        let rotated = direction_from_heading(30.0).rotated_degrees(45.0);
        assert_close(heading_from_direction(rotated).expect("heading"), 75.0);
    }

    #[test]
    fn normalize_degrees_wraps_negative_and_large_angles() {
        assert_close(normalize_degrees(-90.0), 270.0);
        assert_close(normalize_degrees(720.0), 0.0);
        assert_close(normalize_degrees(359.5), 359.5);
    }
}
