//! Capsule penetration resolver.
//!
//! For each candidate collider carrying a BVH, the capsule is brought into
//! the collider's local space, nearby triangles are tested, and every
//! penetrating triangle yields a push-out vector. The pushes are then
//! blended into a single bounded correction.

use std::time::{Duration, Instant};

use glam::DVec3;
use tracing::warn;

use crate::collider::{Collider, NarrowPhase};
use crate::geometry::{Capsule, Triangle};

/// Distances below this are treated as the segment touching the triangle.
const CONTACT_EPSILON: f64 = 1e-9;

/// Resolver settings.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Upper bound on the length of the combined push. Default: 0.5.
    pub max_push: f64,
    /// Largest weight given to a secondary push. Default: 0.5.
    pub secondary_blend: f64,
    /// Calls slower than this are logged. Default: 3 ms.
    pub slow_call_warning: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_push: 0.5,
            secondary_blend: 0.5,
            slow_call_warning: Duration::from_millis(3),
        }
    }
}

/// Resolves capsule penetration against static triangle geometry.
#[derive(Debug, Clone, Default)]
pub struct CapsuleResolver {
    config: ResolverConfig,
}

impl CapsuleResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Combined push-out displacement for `capsule` against `colliders`.
    ///
    /// Returns zero when nothing penetrates. Colliders without a BVH are
    /// skipped.
    pub fn resolve(&self, capsule: &Capsule, colliders: &[&Collider]) -> DVec3 {
        let started = Instant::now();
        let mut pushes = Vec::new();
        for collider in colliders {
            if let Some(narrow_phase) = collider.narrow_phase() {
                collect_pushes(narrow_phase, capsule, &mut pushes);
            }
        }
        let push = combine_pushes(pushes, self.config.secondary_blend, self.config.max_push);

        let elapsed = started.elapsed();
        if elapsed > self.config.slow_call_warning {
            warn!(?elapsed, candidates = colliders.len(), "slow capsule resolve");
        }
        push
    }

    /// True when the capsule penetrates any candidate.
    pub fn penetrates(&self, capsule: &Capsule, colliders: &[&Collider]) -> bool {
        let mut pushes = Vec::new();
        colliders
            .iter()
            .filter_map(|c| c.narrow_phase())
            .any(|narrow_phase| {
                collect_pushes(narrow_phase, capsule, &mut pushes);
                !pushes.is_empty()
            })
    }
}

/// Push-out for a single triangle, in the triangle's space.
///
/// Returns `None` when the capsule segment is at least `radius` away.
pub fn triangle_push(triangle: &Triangle, capsule: &Capsule) -> Option<DVec3> {
    let (segment_point, triangle_point) = triangle.closest_points_to_segment(capsule.start, capsule.end);
    let offset = segment_point - triangle_point;
    let dist_sq = offset.length_squared();
    if dist_sq >= capsule.radius * capsule.radius {
        return None;
    }

    let distance = dist_sq.sqrt();
    let direction = if distance > CONTACT_EPSILON {
        offset / distance
    } else {
        // Segment touches the surface: push along the face normal, towards
        // the side the capsule center is on.
        let normal = triangle.normal();
        if normal == DVec3::ZERO {
            return None;
        }
        if (capsule.center() - triangle_point).dot(normal) < 0.0 {
            -normal
        } else {
            normal
        }
    };
    Some(direction * (capsule.radius - distance))
}

fn collect_pushes(narrow_phase: &NarrowPhase, capsule: &Capsule, out: &mut Vec<DVec3>) {
    let transform = &narrow_phase.transform;
    let local = transform.capsule_to_local(capsule);
    narrow_phase.bvh.for_each_near_capsule(&local, |triangle| {
        if let Some(push) = triangle_push(triangle, &local) {
            let depth = push.length();
            out.push(transform.direction_to_world(push) * depth);
        }
    });
}

/// Blend push vectors: the largest is applied in full, each other one is
/// weighted by `min(max_blend, |v| / |largest|)`, and the sum is capped at
/// `max_len`.
pub fn combine_pushes(mut pushes: Vec<DVec3>, max_blend: f64, max_len: f64) -> DVec3 {
    pushes.sort_by(|a, b| b.length_squared().total_cmp(&a.length_squared()));
    let Some((primary, rest)) = pushes.split_first() else {
        return DVec3::ZERO;
    };
    let primary_len = primary.length();
    if primary_len <= 0.0 {
        return DVec3::ZERO;
    }

    let mut combined = *primary;
    for push in rest {
        let weight = (push.length() / primary_len).min(max_blend);
        combined += *push * weight;
    }
    combined.clamp_length_max(max_len)
}
