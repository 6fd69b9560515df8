//! Shared arena setup for the collision benchmarks.
//!
//! ## Running
//!
//! Wall-clock (criterion):
//!   cargo bench --manifest-path benchmarks/Cargo.toml --bench collision
//!
//! iai-callgrind (instruction counts, requires valgrind):
//!   cargo install iai-callgrind-runner
//!   cargo bench --manifest-path benchmarks/Cargo.toml --bench collision_iai
//!
//! Filter by group:
//!   cargo bench --manifest-path benchmarks/Cargo.toml --bench collision -- octree

use glam::DVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ricochet::{Body, Capsule, Collider, Octree, OctreeConfig, Preprocessor, SourceMesh};

/// Floor, four boundary walls, and `crates` scattered boxes on a `extent` square.
pub fn arena_meshes(crates: usize, extent: f64) -> Vec<SourceMesh> {
    let half = extent * 0.5;
    let mut meshes = vec![
        SourceMesh::cuboid("floor", DVec3::new(0.0, -0.5, 0.0), DVec3::new(extent, 1.0, extent)),
        SourceMesh::cuboid("wall_n", DVec3::new(0.0, 2.5, half), DVec3::new(extent, 5.0, 1.0)),
        SourceMesh::cuboid("wall_s", DVec3::new(0.0, 2.5, -half), DVec3::new(extent, 5.0, 1.0)),
        SourceMesh::cuboid("wall_e", DVec3::new(half, 2.5, 0.0), DVec3::new(1.0, 5.0, extent)),
        SourceMesh::cuboid("wall_w", DVec3::new(-half, 2.5, 0.0), DVec3::new(1.0, 5.0, extent)),
    ];
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for i in 0..crates {
        let size = DVec3::new(
            rng.random_range(0.5..3.0),
            rng.random_range(0.5..3.0),
            rng.random_range(0.5..3.0),
        );
        let center = DVec3::new(
            rng.random_range(-half + 2.0..half - 2.0),
            size.y * 0.5,
            rng.random_range(-half + 2.0..half - 2.0),
        );
        meshes.push(SourceMesh::cuboid(format!("crate{i}"), center, size));
    }
    meshes
}

pub fn arena_colliders(crates: usize, extent: f64) -> anyhow::Result<Vec<Collider>> {
    let (colliders, _) = Preprocessor::default().run(&arena_meshes(crates, extent))?;
    Ok(colliders)
}

pub fn arena(crates: usize, extent: f64) -> anyhow::Result<Octree> {
    let (tree, report) = Octree::build(arena_colliders(crates, extent)?, &OctreeConfig::default());
    anyhow::ensure!(report.rejected.is_empty(), "arena colliders rejected: {:?}", report.rejected);
    Ok(tree)
}

/// Player-sized bodies standing on the floor with random horizontal velocities.
pub fn bodies(n: usize, extent: f64) -> Vec<Body> {
    let half = extent * 0.5 - 2.0;
    let mut rng = StdRng::seed_from_u64(42);
    (0..n)
        .map(|_| {
            let mut body = Body::new(DVec3::new(rng.random_range(-half..half), 0.0, rng.random_range(-half..half)), 0.3, 1.8);
            body.velocity = DVec3::new(rng.random_range(-6.0..6.0), 0.0, rng.random_range(-6.0..6.0));
            body
        })
        .collect()
}

/// Capsules touching the floor at random spots.
pub fn floor_capsules(n: usize, extent: f64) -> Vec<Capsule> {
    bodies(n, extent)
        .iter()
        .map(|b| b.capsule().translated(DVec3::new(0.0, -0.05, 0.0)))
        .collect()
}
