//! Collision engine benchmarks (iai-callgrind - instruction counts).
//!
//! Prerequisites:
//!   cargo install iai-callgrind-runner
//!   sudo dnf install valgrind   # Fedora/WSL2
//!
//! Run all:    cargo bench --manifest-path benchmarks/Cargo.toml --bench collision_iai

use std::hint::black_box;

use glam::DVec3;
use iai_callgrind::{library_benchmark, library_benchmark_group, main};
use ricochet::{Capsule, CapsuleResolver, Integrator, Octree, OctreeConfig};
use ricochet_bench::*;

const EXTENT: f64 = 100.0;

fn probe() -> Capsule {
    Capsule::new(DVec3::new(1.3, 0.25, -2.1), DVec3::new(1.3, 1.5, -2.1), 0.3)
}

// ---------------------------------------------------------------------------
// Map load
// ---------------------------------------------------------------------------

#[library_benchmark]
fn octree_build_100() {
    let colliders = arena_colliders(black_box(100), EXTENT).expect("arena");
    black_box(Octree::build(colliders, &OctreeConfig::default()));
}

#[library_benchmark]
fn octree_build_500() {
    let colliders = arena_colliders(black_box(500), EXTENT).expect("arena");
    black_box(Octree::build(colliders, &OctreeConfig::default()));
}

library_benchmark_group!(
    name = map_load_group;
    benchmarks = octree_build_100, octree_build_500
);

// ---------------------------------------------------------------------------
// Narrow phase
// ---------------------------------------------------------------------------

#[library_benchmark]
fn resolve_floor_contact() {
    let tree = arena(black_box(100), EXTENT).expect("arena");
    let capsule = probe();
    let candidates = tree.query_capsule(&capsule);
    black_box(CapsuleResolver::default().resolve(&capsule, &candidates));
}

#[library_benchmark]
fn raycast_down() {
    let tree = arena(black_box(100), EXTENT).expect("arena");
    black_box(tree.raycast(DVec3::new(1.3, 2.0, -2.1), DVec3::NEG_Y, 5.0));
}

library_benchmark_group!(
    name = narrow_phase_group;
    benchmarks = resolve_floor_contact, raycast_down
);

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

#[library_benchmark]
fn integrate_64_bodies() {
    let tree = arena(black_box(100), EXTENT).expect("arena");
    let integrator = Integrator::default();
    let mut bodies = bodies(64, EXTENT);
    for body in &mut bodies {
        black_box(integrator.integrate(body, 1.0 / 60.0, &tree));
    }
}

library_benchmark_group!(
    name = movement_group;
    benchmarks = integrate_64_bodies
);

main!(
    library_benchmark_groups = map_load_group,
    narrow_phase_group,
    movement_group
);
