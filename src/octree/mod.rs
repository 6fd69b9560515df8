//! Octree broad phase over static map colliders.
//!
//! The tree is built once per map load and is read-only afterwards; every
//! query method takes `&self` and may be called any number of times per
//! tick. Dynamic entities are never inserted.
//!
//! Queries are broad phase only: they may return false positives but never
//! miss a collider whose box overlaps the (padded) query box.

#[cfg(feature = "json")]
pub mod format;
pub mod node;

use glam::DVec3;
use tracing::{debug, warn};

use crate::collider::{Collider, NarrowPhase};
use crate::geometry::{Aabb, Capsule};

pub use self::node::OctreeNode;

/// Octree settings.
#[derive(Debug, Clone)]
pub struct OctreeConfig {
    /// Maximum subdivision depth. Default: 8.
    pub max_depth: u32,
    /// Objects a node holds before it splits. Default: 8.
    pub max_objects: usize,
    /// Padding added around every query box. Default: 1.5.
    pub query_padding: f64,
    /// Margin around the collider bounds when fitting the root cube. Default: 1.0.
    pub bounds_margin: f64,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 8,
            max_objects: 8,
            query_padding: 1.5,
            bounds_margin: 1.0,
        }
    }
}

/// Outcome of [`Octree::build`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub inserted: usize,
    /// Names (or `None` for unnamed) of colliders that fell outside the root.
    pub rejected: Vec<Option<String>>,
}

/// Spatial index over collider boxes.
#[derive(Debug, Clone)]
pub struct Octree {
    root: OctreeNode,
    query_padding: f64,
}

impl Octree {
    /// Empty tree whose root cube has edge `size` around `center`.
    pub fn new(center: DVec3, size: f64, config: &OctreeConfig) -> Self {
        Self {
            root: OctreeNode::new(center, size, 0, config.max_depth, config.max_objects),
            query_padding: config.query_padding,
        }
    }

    pub(crate) fn from_root(root: OctreeNode, query_padding: f64) -> Self {
        Self { root, query_padding }
    }

    /// Fit a root cube around all colliders and insert them in order.
    ///
    /// Rejected colliders are logged and listed in the report.
    pub fn build(colliders: Vec<Collider>, config: &OctreeConfig) -> (Self, BuildReport) {
        let bounds = colliders
            .iter()
            .map(|c| *c.aabb())
            .reduce(|acc, b| acc.union(&b))
            .unwrap_or(Aabb::cube(DVec3::ZERO, 0.0));
        let edge = bounds.size().max_element() + config.bounds_margin * 2.0;
        let mut tree = Self::new(bounds.center(), edge.max(f64::EPSILON), config);

        let mut report = BuildReport::default();
        for collider in colliders {
            let name = collider.name().map(str::to_owned);
            if tree.insert(collider) {
                report.inserted += 1;
            } else {
                warn!(collider = ?name, "collider outside octree bounds, dropped");
                report.rejected.push(name);
            }
        }

        debug!(
            inserted = report.inserted,
            rejected = report.rejected.len(),
            nodes = tree.node_count(),
            depth = tree.depth(),
            "built octree"
        );
        (tree, report)
    }

    pub fn root(&self) -> &OctreeNode {
        &self.root
    }

    /// Padding applied when a query does not specify one.
    pub fn query_padding(&self) -> f64 {
        self.query_padding
    }

    /// Insert a collider. Returns `false`, leaving the tree untouched, when the
    /// collider box lies outside the root cube.
    pub fn insert(&mut self, collider: Collider) -> bool {
        self.root.insert(collider)
    }

    /// Colliders whose boxes overlap `range` grown by `padding`
    /// (the tree default when `None`).
    pub fn query_range(&self, range: &Aabb, padding: Option<f64>) -> Vec<&Collider> {
        let padded = range.expanded(padding.unwrap_or(self.query_padding));
        let mut out = Vec::new();
        self.root.query_into(&padded, &mut out);
        out
    }

    /// Broad-phase candidates along the segment `origin -> origin + direction * max_dist`.
    pub fn query_ray(&self, origin: DVec3, direction: DVec3, max_dist: f64) -> Vec<&Collider> {
        let range = Aabb::from_segment(origin, origin + direction * max_dist);
        self.query_range(&range, None)
    }

    /// Broad-phase candidates for a capsule: its swept segment grown by
    /// `radius + padding`.
    pub fn query_capsule(&self, capsule: &Capsule) -> Vec<&Collider> {
        self.query_range(&capsule.aabb(), None)
    }

    pub fn query_sphere(&self, center: DVec3, radius: f64) -> Vec<&Collider> {
        self.query_range(&Aabb::cube(center, radius * 2.0), None)
    }

    /// Total colliders in the tree.
    pub fn count(&self) -> usize {
        self.root.count()
    }

    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }

    /// Deepest node depth reached.
    pub fn depth(&self) -> u32 {
        self.root.deepest()
    }

    /// Every collider in the tree.
    pub fn colliders(&self) -> Vec<&Collider> {
        self.root.colliders()
    }

    /// Depth-first iteration, a node's objects before its children's.
    pub fn iter(&self) -> impl Iterator<Item = &Collider> {
        self.root.colliders().into_iter()
    }

    /// Attach BVH data to colliders restored without it (see the persisted
    /// map format). `lookup` is asked once per collider lacking narrow-phase
    /// data. Returns how many colliders became collidable.
    pub fn bind_narrow_phase<F>(&mut self, mut lookup: F) -> usize
    where
        F: FnMut(&Collider) -> Option<NarrowPhase>,
    {
        let mut bound = 0;
        self.root.for_each_collider_mut(&mut |collider: &mut Collider| {
            if collider.is_collidable() {
                return;
            }
            if let Some(narrow_phase) = lookup(collider) {
                if collider.bind_narrow_phase(narrow_phase) {
                    bound += 1;
                }
            }
        });
        bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Triangle;

    fn boxed(name: &str, center: DVec3, size: f64) -> Collider {
        Collider::placeholder(Some(name.into()), center, DVec3::splat(size))
    }

    fn scattered(n: usize) -> Vec<Collider> {
        (0..n)
            .map(|i| {
                let f = i as f64;
                let center = DVec3::new((f * 7.3) % 40.0 - 20.0, (f * 3.1) % 10.0, (f * 5.7) % 40.0 - 20.0);
                boxed(&format!("c{i}"), center, 0.5 + (i % 4) as f64)
            })
            .collect()
    }

    fn keys(tree: &Octree) -> Vec<[i64; 6]> {
        let mut keys: Vec<[i64; 6]> = tree
            .colliders()
            .iter()
            .map(|c| {
                let (p, s) = (c.center() * 1e6, c.size() * 1e6);
                [p.x as i64, p.y as i64, p.z as i64, s.x as i64, s.y as i64, s.z as i64]
            })
            .collect();
        keys.sort_unstable();
        keys
    }

    #[test]
    fn test_build_inserts_everything() {
        let config = OctreeConfig {
            max_objects: 2,
            ..Default::default()
        };
        let (tree, report) = Octree::build(scattered(64), &config);
        assert_eq!(report.inserted, 64);
        assert!(report.rejected.is_empty());
        assert_eq!(tree.count(), 64);
        assert!(tree.node_count() > 1);
    }

    #[test]
    fn test_insert_rejected_outside_root() {
        let mut tree = Octree::new(DVec3::ZERO, 10.0, &OctreeConfig::default());
        assert!(!tree.insert(boxed("far", DVec3::splat(100.0), 1.0)));
        assert_eq!(tree.count(), 0);
    }

    #[test]
    fn test_insertion_order_does_not_change_membership() {
        let config = OctreeConfig {
            max_objects: 1,
            ..Default::default()
        };
        let forward = scattered(40);
        let mut backward = scattered(40);
        backward.reverse();
        let (a, _) = Octree::build(forward, &config);
        let (b, _) = Octree::build(backward, &config);
        assert_eq!(keys(&a), keys(&b));
    }

    #[test]
    fn test_query_range_is_sound() {
        let config = OctreeConfig {
            max_objects: 1,
            ..Default::default()
        };
        let colliders = scattered(80);
        let (tree, _) = Octree::build(colliders.clone(), &config);

        for probe in [
            Aabb::new(DVec3::new(-5.0, 0.0, -5.0), DVec3::new(5.0, 3.0, 5.0)),
            Aabb::new(DVec3::new(10.0, 5.0, -20.0), DVec3::new(20.0, 10.0, -10.0)),
            Aabb::cube(DVec3::new(-15.0, 2.0, 15.0), 0.5),
        ] {
            let found = tree.query_range(&probe, Some(0.0));
            for c in &colliders {
                if c.aabb().overlaps(&probe) {
                    assert!(
                        found.iter().any(|f| f.name() == c.name()),
                        "missing {:?} for probe {:?}",
                        c.name(),
                        probe
                    );
                }
            }
        }
    }

    #[test]
    fn test_query_padding() {
        let mut tree = Octree::new(DVec3::ZERO, 32.0, &OctreeConfig::default());
        tree.insert(boxed("near", DVec3::new(2.8, 0.0, 0.0), 1.0));
        let probe = Aabb::cube(DVec3::ZERO, 2.0);
        assert!(tree.query_range(&probe, Some(0.0)).is_empty());
        assert_eq!(tree.query_range(&probe, None).len(), 1);
    }

    #[test]
    fn test_query_shapes() {
        let mut tree = Octree::new(DVec3::ZERO, 64.0, &OctreeConfig::default());
        tree.insert(boxed("wall", DVec3::new(10.0, 0.0, 0.0), 2.0));

        assert_eq!(tree.query_ray(DVec3::ZERO, DVec3::X, 20.0).len(), 1);
        assert!(tree.query_ray(DVec3::ZERO, -DVec3::X, 20.0).is_empty());

        let capsule = Capsule::new(DVec3::new(7.5, -1.0, 0.0), DVec3::new(7.5, 1.0, 0.0), 0.5);
        assert_eq!(tree.query_capsule(&capsule).len(), 1);
        let far = capsule.translated(DVec3::new(-10.0, 0.0, 0.0));
        assert!(tree.query_capsule(&far).is_empty());

        assert_eq!(tree.query_sphere(DVec3::new(12.0, 0.0, 0.0), 0.1).len(), 1);
        assert!(tree.query_sphere(DVec3::new(-12.0, 0.0, 0.0), 0.1).is_empty());
    }

    #[test]
    fn test_queries_do_not_mutate() {
        let (tree, _) = Octree::build(scattered(30), &OctreeConfig::default());
        let probe = Aabb::cube(DVec3::ZERO, 10.0);
        let first: Vec<Option<&str>> = tree.query_range(&probe, None).iter().map(|c| c.name()).collect();
        let second: Vec<Option<&str>> = tree.query_range(&probe, None).iter().map(|c| c.name()).collect();
        assert_eq!(first, second);
        assert_eq!(tree.count(), 30);
    }

    #[test]
    fn test_bind_narrow_phase() {
        use crate::bvh::TriangleBvh;
        use std::sync::Arc;

        let (mut tree, _) = Octree::build(vec![boxed("floor", DVec3::ZERO, 2.0)], &OctreeConfig::default());
        let bvh = Arc::new(TriangleBvh::build(vec![Triangle::new(
            DVec3::new(-1.0, 0.0, -1.0),
            DVec3::new(-1.0, 0.0, 1.0),
            DVec3::new(1.0, 0.0, 0.0),
        )]));
        let bound = tree.bind_narrow_phase(|c| (c.name() == Some("floor")).then(|| NarrowPhase::world(bvh.clone())));
        assert_eq!(bound, 1);
        assert!(tree.colliders()[0].is_collidable());
        assert_eq!(tree.bind_narrow_phase(|_| None), 0);
    }
}
