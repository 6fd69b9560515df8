//! Per-collider triangle bounding volume hierarchy.
//!
//! Built once when a collider is created and never mutated afterwards. Nodes
//! live in a flat array; leaves reference contiguous ranges of the reordered
//! triangle list.

use glam::DVec3;

use crate::geometry::{Aabb, Capsule, Triangle};

/// Maximum triangles stored in a leaf.
const MAX_LEAF_TRIANGLES: usize = 4;

/// Depth limit for construction. Keeps traversal stacks bounded.
const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy)]
enum NodeKind {
    Leaf { start: usize, count: usize },
    Inner { left: usize, right: usize },
}

#[derive(Debug, Clone, Copy)]
struct BvhNode {
    aabb: Aabb,
    kind: NodeKind,
}

/// Bounding volume hierarchy over a triangle soup.
#[derive(Debug, Clone)]
pub struct TriangleBvh {
    triangles: Vec<Triangle>,
    nodes: Vec<BvhNode>,
}

/// Nearest ray hit inside a BVH.
#[derive(Debug, Clone, Copy)]
pub struct BvhRayHit {
    /// Ray parameter of the hit.
    pub t: f64,
    /// Index into [`TriangleBvh::triangles`].
    pub triangle: usize,
}

impl TriangleBvh {
    /// Build a hierarchy using median splits along the longest centroid axis.
    pub fn build(triangles: Vec<Triangle>) -> Self {
        if triangles.is_empty() {
            return Self {
                triangles,
                nodes: Vec::new(),
            };
        }

        let centroids: Vec<DVec3> = triangles.iter().map(Triangle::centroid).collect();
        let mut order: Vec<usize> = (0..triangles.len()).collect();
        let placeholder = BvhNode {
            aabb: triangles[0].aabb(),
            kind: NodeKind::Leaf { start: 0, count: 0 },
        };
        let mut nodes = vec![placeholder];
        let mut stack = vec![(0usize, 0usize, triangles.len(), 0usize)];

        while let Some((index, start, end, depth)) = stack.pop() {
            let range = &mut order[start..end];
            let aabb = range
                .iter()
                .map(|&i| triangles[i].aabb())
                .reduce(|acc, b| acc.union(&b))
                .unwrap_or(placeholder.aabb);
            let count = end - start;

            let split_axis = if count <= MAX_LEAF_TRIANGLES || depth >= MAX_DEPTH {
                None
            } else {
                let bounds = Aabb::from_points(range.iter().map(|&i| centroids[i])).unwrap_or(aabb);
                let extent = bounds.size();
                let axis = if extent.x >= extent.y && extent.x >= extent.z {
                    0
                } else if extent.y >= extent.z {
                    1
                } else {
                    2
                };
                (extent[axis] > f64::EPSILON).then_some(axis)
            };

            let Some(axis) = split_axis else {
                nodes[index] = BvhNode {
                    aabb,
                    kind: NodeKind::Leaf { start, count },
                };
                continue;
            };

            let half = count / 2;
            range.select_nth_unstable_by(half, |&a, &b| centroids[a][axis].total_cmp(&centroids[b][axis]));

            let left = nodes.len();
            let right = left + 1;
            nodes.push(placeholder);
            nodes.push(placeholder);
            nodes[index] = BvhNode {
                aabb,
                kind: NodeKind::Inner { left, right },
            };
            stack.push((left, start, start + half, depth + 1));
            stack.push((right, start + half, end, depth + 1));
        }

        let triangles = order.iter().map(|&i| triangles[i]).collect();
        Self { triangles, nodes }
    }

    /// Triangles in leaf order.
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Bounds of every triangle, or `None` when empty.
    pub fn aabb(&self) -> Option<Aabb> {
        self.nodes.first().map(|n| n.aabb)
    }

    /// Visit every triangle whose leaf bounds come within `capsule.radius` of
    /// the capsule segment. Subtrees farther away are pruned.
    pub fn for_each_near_capsule<F: FnMut(&Triangle)>(&self, capsule: &Capsule, mut visit: F) {
        if self.nodes.is_empty() {
            return;
        }
        let mut stack = Vec::with_capacity(MAX_DEPTH * 2);
        stack.push(0usize);
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !node
                .aabb
                .expanded(capsule.radius)
                .intersects_segment(capsule.start, capsule.end)
            {
                continue;
            }
            match node.kind {
                NodeKind::Leaf { start, count } => {
                    for tri in &self.triangles[start..start + count] {
                        visit(tri);
                    }
                }
                NodeKind::Inner { left, right } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
    }

    /// Nearest triangle hit by `origin + dir * t` for `t` in `0..=max_t`.
    pub fn raycast(&self, origin: DVec3, dir: DVec3, max_t: f64) -> Option<BvhRayHit> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut best: Option<BvhRayHit> = None;
        let mut stack = Vec::with_capacity(MAX_DEPTH * 2);
        stack.push(0usize);
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            let limit = best.map_or(max_t, |hit| hit.t);
            if node.aabb.ray_interval(origin, dir, 0.0, limit).is_none() {
                continue;
            }
            match node.kind {
                NodeKind::Leaf { start, count } => {
                    for (offset, tri) in self.triangles[start..start + count].iter().enumerate() {
                        let limit = best.map_or(max_t, |hit| hit.t);
                        if let Some(t) = tri.ray_intersection(origin, dir, limit) {
                            best = Some(BvhRayHit {
                                t,
                                triangle: start + offset,
                            });
                        }
                    }
                }
                NodeKind::Inner { left, right } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        best
    }
}
