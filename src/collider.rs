//! Static map colliders stored in the octree.

use std::sync::Arc;

use glam::{DMat3, DMat4, DVec3};

use crate::bvh::TriangleBvh;
use crate::geometry::{Aabb, Capsule, Triangle};

/// World matrix of a collider together with its cached inverse and normal matrix.
///
/// The cache is only recomputed by [`ColliderTransform::set_matrix`]; static
/// colliders therefore pay for the inversion once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColliderTransform {
    matrix: DMat4,
    inverse: DMat4,
    normal_matrix: DMat3,
}

impl ColliderTransform {
    pub const IDENTITY: Self = Self {
        matrix: DMat4::IDENTITY,
        inverse: DMat4::IDENTITY,
        normal_matrix: DMat3::IDENTITY,
    };

    pub fn from_matrix(matrix: DMat4) -> Self {
        let mut transform = Self::IDENTITY;
        transform.set_matrix(matrix);
        transform
    }

    /// Replace the world matrix and refresh the cached inverse and normal matrix.
    pub fn set_matrix(&mut self, matrix: DMat4) {
        self.matrix = matrix;
        self.inverse = matrix.inverse();
        self.normal_matrix = DMat3::from_mat4(matrix).inverse().transpose();
    }

    #[inline]
    pub fn matrix(&self) -> &DMat4 {
        &self.matrix
    }

    #[inline]
    pub fn inverse(&self) -> &DMat4 {
        &self.inverse
    }

    #[inline]
    pub fn normal_matrix(&self) -> &DMat3 {
        &self.normal_matrix
    }

    /// Map a local-space direction (push or surface normal) back to world space.
    #[inline]
    pub fn direction_to_world(&self, local: DVec3) -> DVec3 {
        (self.normal_matrix * local).normalize_or_zero()
    }

    /// Bring a world-space capsule into collider-local space.
    #[inline]
    pub fn capsule_to_local(&self, capsule: &Capsule) -> Capsule {
        capsule.transformed(&self.inverse)
    }
}

impl Default for ColliderTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Narrow-phase data: a triangle BVH and the transform placing it in the world.
///
/// The BVH is shared so that several colliders referencing the same model
/// asset do not duplicate it.
#[derive(Debug, Clone)]
pub struct NarrowPhase {
    pub bvh: Arc<TriangleBvh>,
    pub transform: ColliderTransform,
}

impl NarrowPhase {
    /// Triangles already in world space.
    pub fn world(bvh: Arc<TriangleBvh>) -> Self {
        Self {
            bvh,
            transform: ColliderTransform::IDENTITY,
        }
    }

    /// Triangles in local space placed by `matrix`.
    pub fn local(bvh: Arc<TriangleBvh>, matrix: DMat4) -> Self {
        Self {
            bvh,
            transform: ColliderTransform::from_matrix(matrix),
        }
    }

    /// World-space bounds of the BVH contents.
    pub fn world_aabb(&self) -> Option<Aabb> {
        let local = self.bvh.aabb()?;
        let (min, max) = (local.min, local.max);
        let corners = (0..8).map(|i| {
            DVec3::new(
                if i & 1 == 0 { min.x } else { max.x },
                if i & 2 == 0 { min.y } else { max.y },
                if i & 4 == 0 { min.z } else { max.z },
            )
        });
        Aabb::from_points(corners.map(|c| self.transform.matrix().transform_point3(c)))
    }
}

/// A connected (or proximity-merged) set of world-space triangles.
#[derive(Debug, Clone)]
pub struct TriangleGroup {
    pub narrow_phase: NarrowPhase,
}

/// Fallback for a source mesh that could not be split into indexed triangles,
/// or for an object restored from the persisted map format.
///
/// Without narrow-phase data the collider is indexed but never collides.
#[derive(Debug, Clone, Default)]
pub struct WholeMesh {
    pub narrow_phase: Option<NarrowPhase>,
}

/// Explicit collider kind.
#[derive(Debug, Clone)]
pub enum ColliderShape {
    TriangleGroup(TriangleGroup),
    WholeMesh(WholeMesh),
}

/// Reference to the model asset a collider was exported from.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetRef {
    pub file: Option<String>,
    pub model: Option<String>,
    pub offset: Option<DVec3>,
}

/// An indexable piece of static map geometry.
///
/// `center`, `size` and `aabb` describe the same box and are fixed at
/// construction.
#[derive(Debug, Clone)]
pub struct Collider {
    name: Option<String>,
    center: DVec3,
    size: DVec3,
    aabb: Aabb,
    user_data: Option<AssetRef>,
    shape: ColliderShape,
}

impl Collider {
    /// Group of world-space triangles. Returns `None` for an empty group.
    pub fn triangle_group(name: Option<String>, triangles: Vec<Triangle>) -> Option<Self> {
        let bvh = TriangleBvh::build(triangles);
        let aabb = bvh.aabb()?;
        Some(Self::with_box(
            name,
            aabb,
            ColliderShape::TriangleGroup(TriangleGroup {
                narrow_phase: NarrowPhase::world(Arc::new(bvh)),
            }),
        ))
    }

    /// Whole-mesh collider whose bounds come from the narrow-phase data.
    pub fn whole_mesh(name: Option<String>, narrow_phase: NarrowPhase) -> Option<Self> {
        let aabb = narrow_phase.world_aabb()?;
        Some(Self::with_box(
            name,
            aabb,
            ColliderShape::WholeMesh(WholeMesh {
                narrow_phase: Some(narrow_phase),
            }),
        ))
    }

    /// Box-only whole-mesh collider with no narrow-phase data.
    ///
    /// `center` and `size` are kept exactly as given; the box is derived from
    /// them.
    pub fn placeholder(name: Option<String>, center: DVec3, size: DVec3) -> Self {
        Self {
            name,
            center,
            size,
            aabb: Aabb::from_center_size(center, size),
            user_data: None,
            shape: ColliderShape::WholeMesh(WholeMesh::default()),
        }
    }

    fn with_box(name: Option<String>, aabb: Aabb, shape: ColliderShape) -> Self {
        Self {
            name,
            center: aabb.center(),
            size: aabb.size(),
            aabb,
            user_data: None,
            shape,
        }
    }

    pub fn with_user_data(mut self, user_data: AssetRef) -> Self {
        self.user_data = Some(user_data);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn center(&self) -> DVec3 {
        self.center
    }

    #[inline]
    pub fn size(&self) -> DVec3 {
        self.size
    }

    #[inline]
    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    pub fn user_data(&self) -> Option<&AssetRef> {
        self.user_data.as_ref()
    }

    pub fn shape(&self) -> &ColliderShape {
        &self.shape
    }

    /// BVH and transform, when the collider has them.
    #[inline]
    pub fn narrow_phase(&self) -> Option<&NarrowPhase> {
        match &self.shape {
            ColliderShape::TriangleGroup(group) => Some(&group.narrow_phase),
            ColliderShape::WholeMesh(mesh) => mesh.narrow_phase.as_ref(),
        }
    }

    /// Colliders without a BVH are indexed but never resolved against.
    #[inline]
    pub fn is_collidable(&self) -> bool {
        self.narrow_phase().is_some()
    }

    /// Attach narrow-phase data to a whole-mesh collider. Triangle groups
    /// always carry their own and are left untouched. Returns whether the
    /// data was attached.
    pub(crate) fn bind_narrow_phase(&mut self, narrow_phase: NarrowPhase) -> bool {
        match &mut self.shape {
            ColliderShape::TriangleGroup(_) => false,
            ColliderShape::WholeMesh(mesh) => {
                mesh.narrow_phase = Some(narrow_phase);
                true
            }
        }
    }
}
