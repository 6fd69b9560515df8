//! Geometric primitives shared by the broad phase and the narrow phase.

pub mod aabb;
pub mod capsule;
pub mod triangle;

pub use aabb::{Aabb, AABB_EPSILON};
pub use capsule::Capsule;
pub use triangle::{closest_point_on_segment, Triangle};
