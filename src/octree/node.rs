//! Octree node: a cube holding colliders and, once split, eight octant children.

use glam::DVec3;

use crate::collider::Collider;
use crate::geometry::{Aabb, AABB_EPSILON};

/// One cube of the octree.
///
/// Colliders that fit entirely inside a single octant are pushed down once
/// the node splits; colliders spanning several octants stay here.
#[derive(Debug, Clone)]
pub struct OctreeNode {
    pub(crate) center: DVec3,
    pub(crate) size: f64,
    pub(crate) depth: u32,
    pub(crate) max_depth: u32,
    pub(crate) max_objects: usize,
    pub(crate) objects: Vec<Collider>,
    pub(crate) children: Option<Box<[OctreeNode; 8]>>,
}

impl OctreeNode {
    pub fn new(center: DVec3, size: f64, depth: u32, max_depth: u32, max_objects: usize) -> Self {
        Self {
            center,
            size,
            depth,
            max_depth,
            max_objects,
            objects: Vec::new(),
            children: None,
        }
    }

    #[inline]
    pub fn center(&self) -> DVec3 {
        self.center
    }

    /// Edge length of the cube.
    #[inline]
    pub fn size(&self) -> f64 {
        self.size
    }

    #[inline]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn max_objects(&self) -> usize {
        self.max_objects
    }

    #[inline]
    pub fn aabb(&self) -> Aabb {
        Aabb::cube(self.center, self.size)
    }

    /// Colliders stored directly at this node.
    pub fn objects(&self) -> &[Collider] {
        &self.objects
    }

    pub fn children(&self) -> Option<&[OctreeNode; 8]> {
        self.children.as_deref()
    }

    /// Insert a collider below this node. Returns `false` when its box does
    /// not touch this node's cube.
    pub fn insert(&mut self, collider: Collider) -> bool {
        if !self
            .aabb()
            .intersects_with_tolerance(collider.aabb(), AABB_EPSILON)
        {
            return false;
        }

        if self.children.is_none()
            && self.objects.len() >= self.max_objects
            && self.depth < self.max_depth
        {
            self.subdivide();
        }

        self.place(collider);
        true
    }

    // Push into the unique child fully containing the collider, else keep here.
    fn place(&mut self, collider: Collider) {
        if let Some(children) = self.children.as_deref_mut() {
            if let Some(child) = children
                .iter_mut()
                .find(|child| child.aabb().contains(collider.aabb()))
            {
                child.insert(collider);
                return;
            }
        }
        self.objects.push(collider);
    }

    /// Split into eight octants and redistribute the objects held here.
    fn subdivide(&mut self) {
        let quarter = self.size / 4.0;
        let half = self.size / 2.0;
        let children = std::array::from_fn(|i| {
            let offset = DVec3::new(
                if i & 1 == 0 { -quarter } else { quarter },
                if i & 2 == 0 { -quarter } else { quarter },
                if i & 4 == 0 { -quarter } else { quarter },
            );
            OctreeNode::new(
                self.center + offset,
                half,
                self.depth + 1,
                self.max_depth,
                self.max_objects,
            )
        });
        self.children = Some(Box::new(children));

        for collider in std::mem::take(&mut self.objects) {
            self.place(collider);
        }
    }

    /// Collect every collider whose box strictly overlaps `range`.
    pub fn query_into<'a>(&'a self, range: &Aabb, out: &mut Vec<&'a Collider>) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if !node.aabb().intersects_with_tolerance(range, AABB_EPSILON) {
                continue;
            }
            out.extend(node.objects.iter().filter(|c| c.aabb().overlaps(range)));
            if let Some(children) = node.children.as_deref() {
                // Reversed so children are visited in octant order
                stack.extend(children.iter().rev());
            }
        }
    }

    /// Total colliders stored in this subtree.
    pub fn count(&self) -> usize {
        self.objects.len()
            + self
                .children
                .as_deref()
                .map_or(0, |children| children.iter().map(OctreeNode::count).sum())
    }

    /// Total nodes in this subtree, including this one.
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .as_deref()
            .map_or(0, |children| children.iter().map(OctreeNode::node_count).sum())
    }

    /// Deepest depth reached below this node.
    pub fn deepest(&self) -> u32 {
        self.children.as_deref().map_or(self.depth, |children| {
            children.iter().map(OctreeNode::deepest).max().unwrap_or(self.depth)
        })
    }

    /// Every collider in the subtree, node objects before their children's.
    pub fn colliders(&self) -> Vec<&Collider> {
        let mut out = Vec::with_capacity(self.count());
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.extend(node.objects.iter());
            if let Some(children) = node.children.as_deref() {
                stack.extend(children.iter().rev());
            }
        }
        out
    }

    /// Visit every collider mutably. Only used while a map is being loaded.
    pub(crate) fn for_each_collider_mut<F: FnMut(&mut Collider)>(&mut self, visit: &mut F) {
        for collider in &mut self.objects {
            visit(collider);
        }
        if let Some(children) = self.children.as_deref_mut() {
            for child in children.iter_mut() {
                child.for_each_collider_mut(visit);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(center: DVec3, size: f64) -> Collider {
        Collider::placeholder(None, center, DVec3::splat(size))
    }

    #[test]
    fn test_insert_outside_rejected() {
        let mut node = OctreeNode::new(DVec3::ZERO, 10.0, 0, 4, 4);
        assert!(!node.insert(boxed(DVec3::splat(20.0), 1.0)));
        assert_eq!(node.count(), 0);
        // Partially overlapping the root is accepted and kept at the root
        assert!(node.insert(boxed(DVec3::splat(5.0), 1.0)));
        assert_eq!(node.objects().len(), 1);
    }

    #[test]
    fn test_insert_touching_root_within_epsilon() {
        let mut node = OctreeNode::new(DVec3::ZERO, 10.0, 0, 4, 4);
        let touching = boxed(DVec3::new(5.5 + 1e-9, 0.0, 0.0), 1.0);
        assert!(node.insert(touching));
    }

    #[test]
    fn test_subdivision_trigger() {
        let mut node = OctreeNode::new(DVec3::ZERO, 8.0, 0, 1, 1);
        assert!(node.insert(boxed(DVec3::splat(-2.0), 1.0)));
        assert!(node.children().is_none());
        assert!(node.insert(boxed(DVec3::splat(2.0), 1.0)));

        let children = node.children().unwrap();
        assert_eq!(children.len(), 8);
        assert!(node.objects().is_empty());
        assert_eq!(children[0].objects().len(), 1);
        assert_eq!(children[7].objects().len(), 1);
        assert_eq!(children[0].center(), DVec3::splat(-2.0));
        assert_eq!(children[7].center(), DVec3::splat(2.0));
        assert_eq!(children[7].size(), 4.0);
        assert_eq!(children[7].depth(), 1);
    }

    #[test]
    fn test_spanning_object_stays_in_parent() {
        let mut node = OctreeNode::new(DVec3::ZERO, 8.0, 0, 3, 1);
        node.insert(boxed(DVec3::splat(2.0), 1.0));
        node.insert(boxed(DVec3::ZERO, 1.0));
        assert!(node.children().is_some());
        assert_eq!(node.objects().len(), 1);
        assert_eq!(node.objects()[0].center(), DVec3::ZERO);
        assert_eq!(node.count(), 2);
    }

    #[test]
    fn test_max_depth_stops_subdivision() {
        let mut node = OctreeNode::new(DVec3::ZERO, 8.0, 0, 0, 1);
        for i in 0..5 {
            node.insert(boxed(DVec3::new(i as f64 - 2.0, 0.0, 0.0), 0.5));
        }
        assert!(node.children().is_none());
        assert_eq!(node.objects().len(), 5);
        assert_eq!(node.deepest(), 0);
    }

    #[test]
    fn test_query_descends_and_filters() {
        let mut node = OctreeNode::new(DVec3::ZERO, 16.0, 0, 4, 1);
        for x in [-6.0, -2.0, 2.0, 6.0] {
            node.insert(boxed(DVec3::new(x, 0.5, 0.5), 1.0));
        }
        let mut out = Vec::new();
        node.query_into(&Aabb::new(DVec3::new(1.0, 0.0, 0.0), DVec3::new(7.0, 1.0, 1.0)), &mut out);
        let mut xs: Vec<f64> = out.iter().map(|c| c.center().x).collect();
        xs.sort_by(f64::total_cmp);
        assert_eq!(xs, vec![2.0, 6.0]);
    }
}
