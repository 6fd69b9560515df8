//! Persisted map format: a JSON tree mirroring [`OctreeNode`].
//!
//! ```json
//! { "center": {"x":0,"y":0,"z":0}, "size": 64, "depth": 0, "maxDepth": 8, "maxObjects": 8,
//!   "objects": [ { "name": "crate", "center": [1,0,2], "size": [1,1,1],
//!                  "userData": { "file": "props.glb", "model": "crate", "offset": [0,0,0] } } ],
//!   "children": null }
//! ```
//!
//! Triangles and BVHs are not part of the format. Restored objects are
//! box-only whole-mesh colliders until [`Octree::bind_narrow_phase`] attaches
//! their geometry.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::collider::{AssetRef, Collider};
use crate::error::MapError;

use super::{Octree, OctreeConfig, OctreeNode};

/// A vector written either as `[x, y, z]` or `{x, y, z}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
enum VecRepr {
    Array([f64; 3]),
    Object { x: f64, y: f64, z: f64 },
}

impl VecRepr {
    fn array(v: DVec3) -> Self {
        Self::Array(v.to_array())
    }

    fn object(v: DVec3) -> Self {
        Self::Object {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }

    fn to_dvec3(self) -> DVec3 {
        match self {
            Self::Array(a) => DVec3::from_array(a),
            Self::Object { x, y, z } => DVec3::new(x, y, z),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct UserDataRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    offset: Option<VecRepr>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    center: VecRepr,
    size: VecRepr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_data: Option<UserDataRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeRecord {
    center: VecRepr,
    size: f64,
    depth: u32,
    max_depth: u32,
    max_objects: usize,
    #[serde(default)]
    objects: Vec<ObjectRecord>,
    #[serde(default)]
    children: Option<Vec<NodeRecord>>,
}

impl From<&Collider> for ObjectRecord {
    fn from(collider: &Collider) -> Self {
        Self {
            name: collider.name().map(str::to_owned),
            center: VecRepr::array(collider.center()),
            size: VecRepr::array(collider.size()),
            user_data: collider.user_data().map(|u| UserDataRecord {
                file: u.file.clone(),
                model: u.model.clone(),
                offset: u.offset.map(VecRepr::array),
            }),
        }
    }
}

impl From<&OctreeNode> for NodeRecord {
    fn from(node: &OctreeNode) -> Self {
        Self {
            center: VecRepr::object(node.center),
            size: node.size,
            depth: node.depth,
            max_depth: node.max_depth,
            max_objects: node.max_objects,
            objects: node.objects.iter().map(ObjectRecord::from).collect(),
            children: node
                .children
                .as_deref()
                .map(|children| children.iter().map(NodeRecord::from).collect()),
        }
    }
}

impl TryFrom<ObjectRecord> for Collider {
    type Error = MapError;

    fn try_from(record: ObjectRecord) -> Result<Self, MapError> {
        let size = record.size.to_dvec3();
        if size.min_element() < 0.0 {
            return Err(MapError::InvalidObjectSize { name: record.name });
        }
        let collider = Collider::placeholder(record.name, record.center.to_dvec3(), size);
        Ok(match record.user_data {
            Some(u) => collider.with_user_data(AssetRef {
                file: u.file,
                model: u.model,
                offset: u.offset.map(VecRepr::to_dvec3),
            }),
            None => collider,
        })
    }
}

impl TryFrom<NodeRecord> for OctreeNode {
    type Error = MapError;

    fn try_from(record: NodeRecord) -> Result<Self, MapError> {
        if record.size.is_nan() || record.size <= 0.0 {
            return Err(MapError::InvalidNodeSize {
                depth: record.depth,
                size: record.size,
            });
        }
        let mut node = OctreeNode::new(
            record.center.to_dvec3(),
            record.size,
            record.depth,
            record.max_depth,
            record.max_objects,
        );
        node.objects = record
            .objects
            .into_iter()
            .map(Collider::try_from)
            .collect::<Result<_, _>>()?;

        if let Some(children) = record.children {
            let found = children.len();
            let children: Vec<OctreeNode> = children
                .into_iter()
                .map(OctreeNode::try_from)
                .collect::<Result<_, _>>()?;
            let children: [OctreeNode; 8] = children.try_into().map_err(|_| MapError::ChildCount {
                depth: record.depth,
                found,
            })?;
            node.children = Some(Box::new(children));
        }
        Ok(node)
    }
}

impl Octree {
    /// Serialize the tree to the persisted JSON format.
    pub fn to_json(&self) -> Result<String, MapError> {
        Ok(serde_json::to_string(&NodeRecord::from(self.root()))?)
    }

    /// Pretty-printed variant of [`Octree::to_json`].
    pub fn to_json_pretty(&self) -> Result<String, MapError> {
        Ok(serde_json::to_string_pretty(&NodeRecord::from(self.root()))?)
    }

    /// Restore a tree from the persisted JSON format.
    ///
    /// Node layout, depth limits and capacities come from the document; only
    /// `config.query_padding` is taken from `config`. Objects keep the node
    /// they were listed under.
    pub fn from_json(json: &str, config: &OctreeConfig) -> Result<Self, MapError> {
        let record: NodeRecord = serde_json::from_str(json)?;
        Ok(Self::from_root(OctreeNode::try_from(record)?, config.query_padding))
    }
}
