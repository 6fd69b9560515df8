//! Axis-aligned bounding boxes used by the octree and the triangle BVH.

use glam::DVec3;

/// Tolerance used for inclusive node-cube tests, absorbing floating point jitter.
pub const AABB_EPSILON: f64 = 1e-6;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    /// Create a box from two opposite corners, normalising so that `min <= max`.
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Box described by its center and full extents.
    pub fn from_center_size(center: DVec3, size: DVec3) -> Self {
        let half = size.abs() * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Cube described by its center and edge length.
    pub fn cube(center: DVec3, edge: f64) -> Self {
        Self::from_center_size(center, DVec3::splat(edge))
    }

    /// Smallest box enclosing all `points`. Returns `None` for an empty iterator.
    pub fn from_points<I: IntoIterator<Item = DVec3>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut aabb = Self {
            min: first,
            max: first,
        };
        for p in iter {
            aabb.min = aabb.min.min(p);
            aabb.max = aabb.max.max(p);
        }
        Some(aabb)
    }

    /// Box enclosing the segment `a -> b`.
    pub fn from_segment(a: DVec3, b: DVec3) -> Self {
        Self::new(a, b)
    }

    #[inline]
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Full extents along each axis.
    #[inline]
    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    /// Grow the box by `amount` on every side.
    #[inline]
    pub fn expanded(&self, amount: f64) -> Self {
        Self {
            min: self.min - DVec3::splat(amount),
            max: self.max + DVec3::splat(amount),
        }
    }

    /// Smallest box enclosing both boxes.
    #[inline]
    pub fn union(&self, other: &Aabb) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Strict overlap: boxes that only touch on a face, edge or corner do not overlap.
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
            && self.min.z < other.max.z
            && self.max.z > other.min.z
    }

    /// Inclusive overlap, widened by `epsilon` on every axis.
    #[inline]
    pub fn intersects_with_tolerance(&self, other: &Aabb, epsilon: f64) -> bool {
        self.min.x <= other.max.x + epsilon
            && self.max.x >= other.min.x - epsilon
            && self.min.y <= other.max.y + epsilon
            && self.max.y >= other.min.y - epsilon
            && self.min.z <= other.max.z + epsilon
            && self.max.z >= other.min.z - epsilon
    }

    /// True when `other` lies entirely inside this box (boundary inclusive).
    #[inline]
    pub fn contains(&self, other: &Aabb) -> bool {
        other.min.x >= self.min.x
            && other.max.x <= self.max.x
            && other.min.y >= self.min.y
            && other.max.y <= self.max.y
            && other.min.z >= self.min.z
            && other.max.z <= self.max.z
    }

    #[inline]
    pub fn contains_point(&self, p: DVec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Parametric interval `[t_enter, t_exit]` over which the ray
    /// `origin + dir * t` (restricted to `t_min..=t_max`) lies inside the box.
    pub fn ray_interval(&self, origin: DVec3, dir: DVec3, t_min: f64, t_max: f64) -> Option<(f64, f64)> {
        let mut t_min = t_min;
        let mut t_max = t_max;
        for axis in 0..3 {
            let (enter, exit) = slab_interval(origin[axis], dir[axis], self.min[axis], self.max[axis], t_min, t_max)?;
            t_min = enter;
            t_max = exit;
        }
        Some((t_min, t_max))
    }

    /// True when the segment `a -> b` touches the box.
    #[inline]
    pub fn intersects_segment(&self, a: DVec3, b: DVec3) -> bool {
        self.ray_interval(a, b - a, 0.0, 1.0).is_some()
    }
}

// Clip the running interval against one slab of the box.
fn slab_interval(origin: f64, dir: f64, lo: f64, hi: f64, t_min: f64, t_max: f64) -> Option<(f64, f64)> {
    if dir.abs() > f64::EPSILON {
        let inv = 1.0 / dir;
        let t1 = (lo - origin) * inv;
        let t2 = (hi - origin) * inv;
        let enter = t_min.max(t1.min(t2));
        let exit = t_max.min(t1.max(t2));
        (enter <= exit).then_some((enter, exit))
    } else if origin < lo || origin > hi {
        None
    } else {
        Some((t_min, t_max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_overlap_excludes_touching() {
        let a = Aabb::new(DVec3::ZERO, DVec3::ONE);
        let b = Aabb::new(DVec3::splat(0.5), DVec3::splat(2.0));
        let touching = Aabb::new(DVec3::new(1.0, 0.0, 0.0), DVec3::new(2.0, 1.0, 1.0));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&touching));
        assert!(a.intersects_with_tolerance(&touching, 0.0));
    }

    #[test]
    fn test_aabb_tolerance_absorbs_jitter() {
        let a = Aabb::new(DVec3::ZERO, DVec3::ONE);
        let b = Aabb::new(DVec3::new(1.0 + 1e-9, 0.0, 0.0), DVec3::new(2.0, 1.0, 1.0));
        assert!(!a.intersects_with_tolerance(&b, 0.0));
        assert!(a.intersects_with_tolerance(&b, AABB_EPSILON));
    }

    #[test]
    fn test_aabb_contains() {
        let outer = Aabb::cube(DVec3::ZERO, 4.0);
        let inner = Aabb::from_center_size(DVec3::new(1.0, 1.0, 1.0), DVec3::splat(1.0));
        let spanning = Aabb::from_center_size(DVec3::ZERO, DVec3::splat(5.0));
        assert!(outer.contains(&inner));
        assert!(!outer.contains(&spanning));
        assert!(outer.contains_point(DVec3::splat(2.0)));
        assert!(!outer.contains_point(DVec3::splat(2.1)));
    }

    #[test]
    fn test_aabb_from_points() {
        assert!(Aabb::from_points(std::iter::empty()).is_none());
        let aabb = Aabb::from_points([DVec3::new(1.0, -2.0, 3.0), DVec3::new(-1.0, 2.0, 0.0)]).unwrap();
        assert_eq!(aabb.min, DVec3::new(-1.0, -2.0, 0.0));
        assert_eq!(aabb.max, DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(aabb.center(), DVec3::new(0.0, 0.0, 1.5));
    }

    #[test]
    fn test_segment_intersection() {
        let aabb = Aabb::cube(DVec3::ZERO, 2.0);
        assert!(aabb.intersects_segment(DVec3::new(-5.0, 0.0, 0.0), DVec3::new(5.0, 0.0, 0.0)));
        assert!(!aabb.intersects_segment(DVec3::new(-5.0, 2.0, 0.0), DVec3::new(5.0, 2.0, 0.0)));
        assert!(!aabb.intersects_segment(DVec3::new(2.0, 0.0, 0.0), DVec3::new(5.0, 0.0, 0.0)));
        // Segment parallel to an axis, starting inside
        assert!(aabb.intersects_segment(DVec3::ZERO, DVec3::new(0.0, 0.0, 0.5)));
    }

    #[test]
    fn test_ray_interval() {
        let aabb = Aabb::cube(DVec3::ZERO, 2.0);
        let (enter, exit) = aabb
            .ray_interval(DVec3::new(-3.0, 0.0, 0.0), DVec3::X, 0.0, 10.0)
            .unwrap();
        assert!((enter - 2.0).abs() < 1e-12);
        assert!((exit - 4.0).abs() < 1e-12);
    }
}
