//! Geometry preprocessor: turns world meshes into indexable colliders.
//!
//! # Pipeline
//!
//! 1. Extract indexed triangles and transform them to world space
//! 2. Drop degenerate (zero-area) triangles
//! 3. Group the rest with the configured [`GroupingStrategy`]
//! 4. Build one [`Collider`] per group, each with its own triangle BVH
//!
//! Meshes without an index buffer fall back to a single whole-mesh collider.

pub mod grouping;
pub mod mesh;

use std::sync::Arc;

use tracing::debug;

use crate::bvh::TriangleBvh;
use crate::collider::{Collider, NarrowPhase};
use crate::error::GeometryError;
use crate::geometry::{Aabb, Triangle};

pub use self::mesh::SourceMesh;

/// How triangles of one mesh are grouped into colliders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GroupingStrategy {
    /// One collider per set of triangles connected through shared vertices.
    Connectivity,
    /// Triangles whose centroids lie within `merge_distance` are merged.
    Proximity,
}

/// Preprocessor settings.
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    /// Grouping strategy. Default: [`GroupingStrategy::Connectivity`].
    pub strategy: GroupingStrategy,
    /// Decimal places used when comparing vertex positions. Default: 4.
    pub vertex_precision: u32,
    /// Centroid merge distance for [`GroupingStrategy::Proximity`]. Default: 2.0.
    pub proximity_merge_distance: f64,
    /// Triangles with a smaller area are dropped. Default: 1e-9.
    pub min_triangle_area: f64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            strategy: GroupingStrategy::Connectivity,
            vertex_precision: 4,
            proximity_merge_distance: 2.0,
            min_triangle_area: 1e-9,
        }
    }
}

/// Counters describing one preprocessing run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreprocessReport {
    pub meshes: usize,
    pub triangles: usize,
    pub degenerate_dropped: usize,
    pub groups: usize,
    pub whole_mesh_fallbacks: usize,
    /// Whole-mesh fallbacks that could not get a BVH either.
    pub uncollidable: usize,
}

/// Converts source meshes into colliders.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Process every mesh. Colliders come out in mesh order, then group order.
    pub fn run(&self, meshes: &[SourceMesh]) -> Result<(Vec<Collider>, PreprocessReport), GeometryError> {
        let mut colliders = Vec::new();
        let mut report = PreprocessReport::default();

        for mesh in meshes {
            report.meshes += 1;
            match mesh.world_triangles()? {
                Some(triangles) => self.group_mesh(mesh, triangles, &mut colliders, &mut report),
                None => self.whole_mesh(mesh, &mut colliders, &mut report)?,
            }
        }

        debug!(
            meshes = report.meshes,
            triangles = report.triangles,
            dropped = report.degenerate_dropped,
            groups = report.groups,
            fallbacks = report.whole_mesh_fallbacks,
            "preprocessed map geometry"
        );
        Ok((colliders, report))
    }

    fn group_mesh(
        &self,
        mesh: &SourceMesh,
        triangles: Vec<Triangle>,
        colliders: &mut Vec<Collider>,
        report: &mut PreprocessReport,
    ) {
        let total = triangles.len();
        let triangles: Vec<Triangle> = triangles
            .into_iter()
            .filter(|t| t.area() >= self.config.min_triangle_area)
            .collect();
        report.triangles += triangles.len();
        report.degenerate_dropped += total - triangles.len();

        let groups = match self.config.strategy {
            GroupingStrategy::Connectivity => {
                grouping::connected_components(&triangles, self.config.vertex_precision)
            }
            GroupingStrategy::Proximity => {
                grouping::proximity_buckets(&triangles, self.config.proximity_merge_distance)
            }
        };

        let single = groups.len() == 1;
        for (index, group) in groups.into_iter().enumerate() {
            let name = if single {
                mesh.name.clone()
            } else {
                format!("{}#{}", mesh.name, index)
            };
            let group_triangles = group.into_iter().map(|i| triangles[i]).collect();
            if let Some(collider) = Collider::triangle_group(Some(name), group_triangles) {
                colliders.push(match &mesh.user_data {
                    Some(user_data) => collider.with_user_data(user_data.clone()),
                    None => collider,
                });
                report.groups += 1;
            }
        }
    }

    fn whole_mesh(
        &self,
        mesh: &SourceMesh,
        colliders: &mut Vec<Collider>,
        report: &mut PreprocessReport,
    ) -> Result<(), GeometryError> {
        let collider = match mesh.local_soup()? {
            Some(soup) => {
                let total = soup.len();
                let soup: Vec<Triangle> = soup
                    .into_iter()
                    .filter(|t| t.area() >= self.config.min_triangle_area)
                    .collect();
                report.triangles += soup.len();
                report.degenerate_dropped += total - soup.len();
                let narrow_phase = NarrowPhase::local(Arc::new(TriangleBvh::build(soup)), mesh.world);
                Collider::whole_mesh(Some(mesh.name.clone()), narrow_phase)
            }
            None => {
                report.uncollidable += 1;
                Aabb::from_points(mesh.world_points())
                    .map(|aabb| Collider::placeholder(Some(mesh.name.clone()), aabb.center(), aabb.size()))
            }
        };

        if let Some(collider) = collider {
            report.whole_mesh_fallbacks += 1;
            colliders.push(match &mesh.user_data {
                Some(user_data) => collider.with_user_data(user_data.clone()),
                None => collider,
            });
        }
        Ok(())
    }
}
