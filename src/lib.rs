//! Ricochet collision engine
//!
//! Static-geometry collision for capsule-shaped players and bots: an octree
//! broad phase over map colliders, BVH-accelerated capsule-vs-triangle
//! resolution, and a sub-stepped movement integrator.
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! 1. **geometry** - Boxes, triangles, capsules and their closest-point math
//! 2. **bvh** - Per-collider triangle bounding volume hierarchy
//! 3. **collider** - Triangle groups and whole meshes with cached transforms
//! 4. **preprocess** - Turns world meshes into colliders (connectivity or proximity grouping)
//! 5. **octree** - Broad phase index and the persisted JSON map format (feature = "json")
//! 6. **resolver** - Capsule penetration push-out
//! 7. **raycast** - Narrow-phase ray hits
//! 8. **integrator** - Stepped movement with swept tunneling guard and ground snap
//! 9. **nav** - Stuck detection and recovery for bots
//!
//! The octree and every collider are immutable after a map is loaded, so all
//! queries take `&self` and may run any number of times per tick.

pub mod bvh;
pub mod collider;
pub mod error;
pub mod geometry;
pub mod integrator;
pub mod nav;
pub mod octree;
pub mod preprocess;
pub mod raycast;
pub mod resolver;

// Re-export commonly used types
pub use bvh::TriangleBvh;
pub use collider::{AssetRef, Collider, ColliderShape, ColliderTransform, NarrowPhase};
pub use error::{GeometryError, MapError};
pub use geometry::{Aabb, Capsule, Triangle};
pub use integrator::{Body, ContactKind, Integrator, MovementConfig, StepReport};
pub use nav::{find_free_position, Escape, NavConfig, NavStep, Navigator, StuckDetector};
pub use octree::{BuildReport, Octree, OctreeConfig, OctreeNode};
pub use preprocess::{GroupingStrategy, PreprocessConfig, PreprocessReport, Preprocessor, SourceMesh};
pub use raycast::{cast_ray, RayHit};
pub use resolver::{CapsuleResolver, ResolverConfig};

// Re-export glam for convenience
pub use glam;
