//! Narrow-phase ray casting against collider BVHs.

use glam::DVec3;

use crate::collider::Collider;
use crate::octree::Octree;

/// Closest surface hit along a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: DVec3,
    /// Unit surface normal facing back towards the ray origin.
    pub normal: DVec3,
    pub distance: f64,
    /// Index of the collider in the slice passed to [`cast_ray`].
    pub collider: usize,
}

/// Nearest hit among `colliders` for the ray `origin + dir * t`, `t <= max_dist`.
///
/// `dir` need not be normalized; `distance` is always in world units.
/// Colliders without a BVH are ignored.
pub fn cast_ray(colliders: &[&Collider], origin: DVec3, dir: DVec3, max_dist: f64) -> Option<RayHit> {
    let dir = dir.try_normalize()?;
    let mut best: Option<RayHit> = None;

    for (index, collider) in colliders.iter().enumerate() {
        let Some(narrow_phase) = collider.narrow_phase() else {
            continue;
        };
        let inverse = narrow_phase.transform.inverse();
        // The affine map keeps the ray parameter, so `t` stays a world distance
        let local_origin = inverse.transform_point3(origin);
        let local_dir = inverse.transform_vector3(dir);
        let limit = best.map_or(max_dist, |hit| hit.distance);

        if let Some(hit) = narrow_phase.bvh.raycast(local_origin, local_dir, limit) {
            let triangle = &narrow_phase.bvh.triangles()[hit.triangle];
            let mut normal = narrow_phase.transform.direction_to_world(triangle.normal());
            if normal.dot(dir) > 0.0 {
                normal = -normal;
            }
            best = Some(RayHit {
                point: origin + dir * hit.t,
                normal,
                distance: hit.t,
                collider: index,
            });
        }
    }
    best
}

impl Octree {
    /// Broad phase with [`Octree::query_ray`], then [`cast_ray`] on the candidates.
    pub fn raycast(&self, origin: DVec3, dir: DVec3, max_dist: f64) -> Option<(RayHit, &Collider)> {
        let dir = dir.try_normalize()?;
        let candidates = self.query_ray(origin, dir, max_dist);
        let hit = cast_ray(&candidates, origin, dir, max_dist)?;
        Some((hit, candidates[hit.collider]))
    }
}
