//! Source meshes as handed over by asset loading.

use glam::{DMat4, DVec3};

use crate::collider::AssetRef;
use crate::error::GeometryError;
use crate::geometry::Triangle;

/// A renderable mesh with its world transform.
#[derive(Debug, Clone)]
pub struct SourceMesh {
    pub name: String,
    /// Vertex positions in mesh-local space.
    pub positions: Vec<DVec3>,
    /// Triangle list indices. `None` when the asset has no index buffer.
    pub indices: Option<Vec<u32>>,
    pub world: DMat4,
    pub user_data: Option<AssetRef>,
}

impl SourceMesh {
    pub fn indexed(name: impl Into<String>, positions: Vec<DVec3>, indices: Vec<u32>, world: DMat4) -> Self {
        Self {
            name: name.into(),
            positions,
            indices: Some(indices),
            world,
            user_data: None,
        }
    }

    pub fn unindexed(name: impl Into<String>, positions: Vec<DVec3>, world: DMat4) -> Self {
        Self {
            name: name.into(),
            positions,
            indices: None,
            world,
            user_data: None,
        }
    }

    /// Axis-aligned box mesh (12 triangles) centered at `center` with full extents `size`.
    pub fn cuboid(name: impl Into<String>, center: DVec3, size: DVec3) -> Self {
        let h = size * 0.5;
        let positions = (0..8)
            .map(|i| {
                DVec3::new(
                    if i & 1 == 0 { -h.x } else { h.x },
                    if i & 2 == 0 { -h.y } else { h.y },
                    if i & 4 == 0 { -h.z } else { h.z },
                )
            })
            .collect();
        #[rustfmt::skip]
        let indices = vec![
            0, 4, 6, 0, 6, 2, // -x
            1, 3, 7, 1, 7, 5, // +x
            0, 1, 5, 0, 5, 4, // -y
            2, 6, 7, 2, 7, 3, // +y
            0, 2, 3, 0, 3, 1, // -z
            4, 5, 7, 4, 7, 6, // +z
        ];
        Self::indexed(name, positions, indices, DMat4::from_translation(center))
    }

    pub fn with_user_data(mut self, user_data: AssetRef) -> Self {
        self.user_data = Some(user_data);
        self
    }

    fn check_positions(&self) -> Result<(), GeometryError> {
        match self.positions.iter().position(|p| !p.is_finite()) {
            Some(vertex) => Err(GeometryError::NonFiniteVertex {
                mesh: self.name.clone(),
                vertex,
            }),
            None => Ok(()),
        }
    }

    /// Indexed triangles transformed to world space.
    ///
    /// Returns `Ok(None)` when the mesh has no index buffer.
    pub fn world_triangles(&self) -> Result<Option<Vec<Triangle>>, GeometryError> {
        let Some(indices) = &self.indices else {
            return Ok(None);
        };
        self.check_positions()?;
        if indices.len() % 3 != 0 {
            return Err(GeometryError::RaggedIndices {
                mesh: self.name.clone(),
                len: indices.len(),
            });
        }

        let vertex = |index: u32| -> Result<DVec3, GeometryError> {
            self.positions
                .get(index as usize)
                .map(|p| self.world.transform_point3(*p))
                .ok_or_else(|| GeometryError::IndexOutOfRange {
                    mesh: self.name.clone(),
                    index,
                    vertex_count: self.positions.len(),
                })
        };

        indices
            .chunks_exact(3)
            .map(|tri| Ok(Triangle::new(vertex(tri[0])?, vertex(tri[1])?, vertex(tri[2])?)))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// Consecutive position triples in mesh-local space, for meshes without an
    /// index buffer. Returns `Ok(None)` when the vertex count is not a multiple of 3.
    pub fn local_soup(&self) -> Result<Option<Vec<Triangle>>, GeometryError> {
        self.check_positions()?;
        if self.positions.is_empty() || self.positions.len() % 3 != 0 {
            return Ok(None);
        }
        Ok(Some(
            self.positions
                .chunks_exact(3)
                .map(|p| Triangle::new(p[0], p[1], p[2]))
                .collect(),
        ))
    }

    /// World-space corners of the vertex bounds.
    pub fn world_points(&self) -> impl Iterator<Item = DVec3> + '_ {
        self.positions.iter().map(|p| self.world.transform_point3(*p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cuboid_triangles_in_world_space() {
        let mesh = SourceMesh::cuboid("crate", DVec3::new(5.0, 0.5, 0.0), DVec3::ONE);
        let tris = mesh.world_triangles().unwrap().unwrap();
        assert_eq!(tris.len(), 12);
        for tri in &tris {
            assert!((tri.area() - 0.5).abs() < 1e-12);
            for v in tri.vertices() {
                assert!((v.x - 5.0).abs() <= 0.5 + 1e-12);
                assert!((v.y - 0.5).abs() <= 0.5 + 1e-12);
            }
        }
    }

    #[test]
    fn test_cuboid_normals_point_outward() {
        let mesh = SourceMesh::cuboid("crate", DVec3::ZERO, DVec3::splat(2.0));
        for tri in mesh.world_triangles().unwrap().unwrap() {
            assert!(tri.normal().dot(tri.centroid()) > 0.0);
        }
    }

    #[test]
    fn test_index_out_of_range() {
        let mesh = SourceMesh::indexed("bad", vec![DVec3::ZERO; 3], vec![0, 1, 3], DMat4::IDENTITY);
        assert!(matches!(
            mesh.world_triangles(),
            Err(GeometryError::IndexOutOfRange { index: 3, .. })
        ));
    }

    #[test]
    fn test_ragged_indices() {
        let mesh = SourceMesh::indexed("bad", vec![DVec3::ZERO; 3], vec![0, 1], DMat4::IDENTITY);
        assert!(matches!(mesh.world_triangles(), Err(GeometryError::RaggedIndices { len: 2, .. })));
    }

    #[test]
    fn test_unindexed_soup() {
        let mesh = SourceMesh::unindexed("soup", vec![DVec3::ZERO, DVec3::X, DVec3::Z], DMat4::IDENTITY);
        assert!(mesh.world_triangles().unwrap().is_none());
        assert_eq!(mesh.local_soup().unwrap().unwrap().len(), 1);

        let ragged = SourceMesh::unindexed("ragged", vec![DVec3::ZERO, DVec3::X], DMat4::IDENTITY);
        assert!(ragged.local_soup().unwrap().is_none());
    }

    #[test]
    fn test_non_finite_vertex() {
        let mesh = SourceMesh::unindexed("nan", vec![DVec3::ZERO, DVec3::NAN, DVec3::Z], DMat4::IDENTITY);
        assert!(matches!(mesh.local_soup(), Err(GeometryError::NonFiniteVertex { vertex: 1, .. })));
    }
}
