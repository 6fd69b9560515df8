//! Triangle primitive and the closest-point queries the resolver is built on.

use glam::{DMat4, DVec3};

use super::aabb::Aabb;

const EPSILON: f64 = 1e-12;

/// A triangle in either world or collider-local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub a: DVec3,
    pub b: DVec3,
    pub c: DVec3,
}

impl Triangle {
    pub fn new(a: DVec3, b: DVec3, c: DVec3) -> Self {
        Self { a, b, c }
    }

    #[inline]
    pub fn vertices(&self) -> [DVec3; 3] {
        [self.a, self.b, self.c]
    }

    #[inline]
    pub fn centroid(&self) -> DVec3 {
        (self.a + self.b + self.c) / 3.0
    }

    /// Unnormalized face normal (length is twice the area).
    #[inline]
    pub fn scaled_normal(&self) -> DVec3 {
        (self.b - self.a).cross(self.c - self.a)
    }

    /// Unit face normal, or zero for a degenerate triangle.
    #[inline]
    pub fn normal(&self) -> DVec3 {
        self.scaled_normal().normalize_or_zero()
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.scaled_normal().length() * 0.5
    }

    pub fn aabb(&self) -> Aabb {
        Aabb {
            min: self.a.min(self.b).min(self.c),
            max: self.a.max(self.b).max(self.c),
        }
    }

    /// Apply an affine transform to every vertex.
    pub fn transformed(&self, matrix: &DMat4) -> Self {
        Self {
            a: matrix.transform_point3(self.a),
            b: matrix.transform_point3(self.b),
            c: matrix.transform_point3(self.c),
        }
    }

    /// True when every vertex is a finite number.
    pub fn is_finite(&self) -> bool {
        self.a.is_finite() && self.b.is_finite() && self.c.is_finite()
    }

    /// Closest point on the triangle to `p`.
    ///
    /// Walks the Voronoi regions of the vertices, edges and face using
    /// barycentric coordinates.
    pub fn closest_point(&self, p: DVec3) -> DVec3 {
        let (a, b, c) = (self.a, self.b, self.c);
        let ab = b - a;
        let ac = c - a;

        let ap = p - a;
        let d1 = ab.dot(ap);
        let d2 = ac.dot(ap);
        if d1 <= 0.0 && d2 <= 0.0 {
            return a;
        }

        let bp = p - b;
        let d3 = ab.dot(bp);
        let d4 = ac.dot(bp);
        if d3 >= 0.0 && d4 <= d3 {
            return b;
        }

        let vc = d1 * d4 - d3 * d2;
        if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
            let v = d1 / (d1 - d3);
            return a + ab * v;
        }

        let cp = p - c;
        let d5 = ab.dot(cp);
        let d6 = ac.dot(cp);
        if d6 >= 0.0 && d5 <= d6 {
            return c;
        }

        let vb = d5 * d2 - d1 * d6;
        if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
            let w = d2 / (d2 - d6);
            return a + ac * w;
        }

        let va = d3 * d6 - d5 * d4;
        if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
            let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
            return b + (c - b) * w;
        }

        let denom = 1.0 / (va + vb + vc);
        let v = vb * denom;
        let w = vc * denom;
        a + ab * v + ac * w
    }

    /// Approximate closest pair between the segment `start -> end` and the triangle.
    ///
    /// Takes the triangle's closest point to each endpoint, keeps the nearer
    /// one, projects it onto the segment, then refines the triangle point
    /// against that segment point. Returns `(segment_point, triangle_point)`.
    pub fn closest_points_to_segment(&self, start: DVec3, end: DVec3) -> (DVec3, DVec3) {
        let to_start = self.closest_point(start);
        let to_end = self.closest_point(end);
        let nearer = if to_start.distance_squared(start) <= to_end.distance_squared(end) {
            to_start
        } else {
            to_end
        };
        let (segment_point, _) = closest_point_on_segment(nearer, start, end);
        (segment_point, self.closest_point(segment_point))
    }

    /// Möller–Trumbore ray test. Returns the ray parameter `t` of the hit,
    /// restricted to `0..=max_t`. Both faces are hit.
    pub fn ray_intersection(&self, origin: DVec3, dir: DVec3, max_t: f64) -> Option<f64> {
        let edge1 = self.b - self.a;
        let edge2 = self.c - self.a;
        let pvec = dir.cross(edge2);
        let det = edge1.dot(pvec);
        if det.abs() < EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let tvec = origin - self.a;
        let u = tvec.dot(pvec) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let qvec = tvec.cross(edge1);
        let v = dir.dot(qvec) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = edge2.dot(qvec) * inv_det;
        (0.0..=max_t).contains(&t).then_some(t)
    }
}

/// Closest point on the segment `a -> b` to `p`, with its parameter in `0..=1`.
pub fn closest_point_on_segment(p: DVec3, a: DVec3, b: DVec3) -> (DVec3, f64) {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < EPSILON {
        return (a, 0.0);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (a + ab * t, t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor() -> Triangle {
        Triangle::new(
            DVec3::new(-1.0, 0.0, -1.0),
            DVec3::new(-1.0, 0.0, 1.0),
            DVec3::new(1.0, 0.0, 0.0),
        )
    }

    #[test]
    fn test_closest_point_on_face() {
        let tri = floor();
        let p = tri.closest_point(DVec3::new(0.0, 2.0, 0.0));
        assert!((p - DVec3::ZERO).length() < 1e-12);
    }

    #[test]
    fn test_closest_point_on_vertex_and_edge() {
        let tri = floor();
        let vertex = tri.closest_point(DVec3::new(5.0, 1.0, 0.0));
        assert!((vertex - DVec3::new(1.0, 0.0, 0.0)).length() < 1e-12);

        let edge = tri.closest_point(DVec3::new(-3.0, 1.0, 0.0));
        assert!((edge - DVec3::new(-1.0, 0.0, 0.0)).length() < 1e-12);
    }

    #[test]
    fn test_normal_and_area() {
        let tri = floor();
        assert!((tri.normal() - DVec3::Y).length() < 1e-12);
        assert!((tri.area() - 2.0).abs() < 1e-12);

        let sliver = Triangle::new(DVec3::ZERO, DVec3::X, DVec3::X * 2.0);
        assert_eq!(sliver.area(), 0.0);
        assert_eq!(sliver.normal(), DVec3::ZERO);
    }

    #[test]
    fn test_segment_closest_points_vertical_capsule() {
        let tri = floor();
        let (seg, on_tri) =
            tri.closest_points_to_segment(DVec3::new(0.0, 0.1, 0.0), DVec3::new(0.0, 1.1, 0.0));
        assert!((seg - DVec3::new(0.0, 0.1, 0.0)).length() < 1e-12);
        assert!((on_tri - DVec3::ZERO).length() < 1e-12);
    }

    #[test]
    fn test_closest_point_on_segment_clamps() {
        let (p, t) = closest_point_on_segment(DVec3::new(5.0, 1.0, 0.0), DVec3::ZERO, DVec3::X);
        assert_eq!(p, DVec3::X);
        assert_eq!(t, 1.0);

        let (p, t) = closest_point_on_segment(DVec3::new(3.0, 0.0, 0.0), DVec3::ONE, DVec3::ONE);
        assert_eq!(p, DVec3::ONE);
        assert_eq!(t, 0.0);
    }

    #[test]
    fn test_ray_intersection() {
        let tri = floor();
        let t = tri
            .ray_intersection(DVec3::new(0.0, 2.0, 0.0), -DVec3::Y, 10.0)
            .unwrap();
        assert!((t - 2.0).abs() < 1e-12);
        assert!(tri.ray_intersection(DVec3::new(0.0, 2.0, 0.0), -DVec3::Y, 1.0).is_none());
        assert!(tri.ray_intersection(DVec3::new(5.0, 2.0, 0.0), -DVec3::Y, 10.0).is_none());
        assert!(tri.ray_intersection(DVec3::new(0.0, 2.0, 0.0), DVec3::X, 10.0).is_none());
    }
}
