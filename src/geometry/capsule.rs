//! Capsule volume used for players and bots.

use glam::{DMat4, DVec3};

use super::aabb::Aabb;

/// A sphere of `radius` swept along the segment `start -> end`.
///
/// When `start == end` the capsule degenerates to a sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capsule {
    pub start: DVec3,
    pub end: DVec3,
    pub radius: f64,
}

impl Capsule {
    /// Create a capsule. `radius` must be positive.
    pub fn new(start: DVec3, end: DVec3, radius: f64) -> Self {
        debug_assert!(radius > 0.0, "capsule radius must be positive");
        Self { start, end, radius }
    }

    pub fn sphere(center: DVec3, radius: f64) -> Self {
        Self::new(center, center, radius)
    }

    #[inline]
    pub fn is_sphere(&self) -> bool {
        self.start == self.end
    }

    #[inline]
    pub fn center(&self) -> DVec3 {
        (self.start + self.end) * 0.5
    }

    /// Box around the swept segment only, without the radius.
    #[inline]
    pub fn segment_aabb(&self) -> Aabb {
        Aabb::from_segment(self.start, self.end)
    }

    /// Box enclosing the whole capsule.
    #[inline]
    pub fn aabb(&self) -> Aabb {
        self.segment_aabb().expanded(self.radius)
    }

    /// The same capsule moved by `offset`.
    #[inline]
    pub fn translated(&self, offset: DVec3) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
            radius: self.radius,
        }
    }

    /// Map the segment through `matrix`. The radius is left unchanged, so
    /// the matrix is expected to be rigid.
    #[inline]
    pub fn transformed(&self, matrix: &DMat4) -> Self {
        Self {
            start: matrix.transform_point3(self.start),
            end: matrix.transform_point3(self.end),
            radius: self.radius,
        }
    }
}
