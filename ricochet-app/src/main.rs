use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use glam::DVec3;
use log::{debug, info, warn};
use ricochet::{
    Body, Collider, Escape, Integrator, MovementConfig, NarrowPhase, NavConfig, Navigator, Octree,
    OctreeConfig, Preprocessor, SourceMesh, TriangleBvh,
};

// ============================================================================
// CLI Argument Parsing
// ============================================================================

#[derive(Parser)]
#[command(author, version, about = "Headless bot arena on the ricochet collision engine", long_about = None)]
struct Args {
    /// Map in the persisted JSON format. A generated arena is used when absent
    #[arg(short, long)]
    map: Option<PathBuf>,

    /// Ticks to simulate
    #[arg(short, long, default_value_t = 600)]
    ticks: u32,

    /// Simulation ticks per second
    #[arg(long, default_value_t = 60.0)]
    tick_rate: f64,

    /// Number of bots
    #[arg(short, long, default_value_t = 8)]
    bots: usize,

    /// Use the fine sub-step length
    #[arg(long, default_value_t = false)]
    high_precision: bool,

    /// Write the octree to this path in the persisted JSON format
    #[arg(short, long)]
    export: Option<PathBuf>,
}

// ============================================================================
// Map
// ============================================================================

const ARENA_EXTENT: f64 = 40.0;

fn arena_meshes() -> Vec<SourceMesh> {
    let half = ARENA_EXTENT * 0.5;
    let mut meshes = vec![
        SourceMesh::cuboid("floor", DVec3::new(0.0, -0.5, 0.0), DVec3::new(ARENA_EXTENT, 1.0, ARENA_EXTENT)),
        SourceMesh::cuboid("wall_n", DVec3::new(0.0, 2.0, half), DVec3::new(ARENA_EXTENT, 4.0, 1.0)),
        SourceMesh::cuboid("wall_s", DVec3::new(0.0, 2.0, -half), DVec3::new(ARENA_EXTENT, 4.0, 1.0)),
        SourceMesh::cuboid("wall_e", DVec3::new(half, 2.0, 0.0), DVec3::new(1.0, 4.0, ARENA_EXTENT)),
        SourceMesh::cuboid("wall_w", DVec3::new(-half, 2.0, 0.0), DVec3::new(1.0, 4.0, ARENA_EXTENT)),
    ];
    // Ring of pillars with a low crate beside each
    for i in 0..8 {
        let angle = std::f64::consts::TAU * f64::from(i) / 8.0;
        let at = DVec3::new(angle.cos(), 0.0, angle.sin()) * 9.0;
        meshes.push(SourceMesh::cuboid(
            format!("pillar{i}"),
            at + DVec3::Y * 2.0,
            DVec3::new(1.2, 4.0, 1.2),
        ));
        meshes.push(SourceMesh::cuboid(
            format!("crate{i}"),
            at * 0.6 + DVec3::Y * 0.4,
            DVec3::splat(0.8),
        ));
    }
    meshes
}

fn generated_octree() -> Result<Octree> {
    let (colliders, report) = Preprocessor::default().run(&arena_meshes())?;
    info!(
        "preprocessed {} meshes into {} colliders ({} degenerate triangles dropped)",
        report.meshes,
        colliders.len(),
        report.degenerate_dropped
    );
    let (tree, build) = Octree::build(colliders, &OctreeConfig::default());
    for name in &build.rejected {
        warn!("collider {:?} fell outside the arena bounds", name);
    }
    Ok(tree)
}

// The persisted format only keeps boxes, so restored objects collide as boxes.
fn box_narrow_phase(collider: &Collider) -> Option<NarrowPhase> {
    let mesh = SourceMesh::cuboid("restored", collider.center(), collider.size());
    let triangles = mesh.world_triangles().ok()??;
    Some(NarrowPhase::world(Arc::new(TriangleBvh::build(triangles))))
}

fn load_octree(path: &Path) -> Result<Octree> {
    let json = std::fs::read_to_string(path).with_context(|| format!("reading map {}", path.display()))?;
    let mut tree = Octree::from_json(&json, &OctreeConfig::default())
        .with_context(|| format!("parsing map {}", path.display()))?;
    let bound = tree.bind_narrow_phase(box_narrow_phase);
    info!("loaded {} colliders from {} ({} collidable)", tree.count(), path.display(), bound);
    Ok(tree)
}

// ============================================================================
// Bots
// ============================================================================

struct Bot {
    body: Body,
    navigator: Navigator,
    waypoint: usize,
    escapes: u32,
    rollbacks: u32,
}

fn waypoints() -> Vec<DVec3> {
    (0..6)
        .map(|i| {
            let angle = std::f64::consts::TAU * f64::from(i) / 6.0 + 0.3;
            DVec3::new(angle.cos(), 0.0, angle.sin()) * 14.0
        })
        .collect()
}

fn spawn_bots(count: usize, movement: &MovementConfig) -> Vec<Bot> {
    (0..count)
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / count.max(1) as f64;
            let position = DVec3::new(angle.cos() * 3.0, 0.5, angle.sin() * 3.0);
            Bot {
                body: Body::new(position, 0.3, 1.8),
                navigator: Navigator::new(NavConfig::default(), Integrator::new(movement.clone(), Default::default())),
                waypoint: i,
                escapes: 0,
                rollbacks: 0,
            }
        })
        .collect()
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    anyhow::ensure!(args.tick_rate > 0.0, "tick rate must be positive");

    let tree = match &args.map {
        Some(path) => load_octree(path)?,
        None => generated_octree()?,
    };
    info!("octree: {} colliders, {} nodes, depth {}", tree.count(), tree.node_count(), tree.depth());

    let movement = MovementConfig {
        high_precision: args.high_precision,
        ..Default::default()
    };
    let route = waypoints();
    let mut bots = spawn_bots(args.bots, &movement);
    let delta = 1.0 / args.tick_rate;
    let mut busiest = Duration::ZERO;

    let started = Instant::now();
    for tick in 0..args.ticks {
        let tick_start = Instant::now();
        for bot in &mut bots {
            let target = route[bot.waypoint % route.len()];
            let to_target = (target - bot.body.position).with_y(0.0);
            if to_target.length() < 1.0 {
                bot.waypoint += 1;
            }
            let desired = to_target.normalize_or_zero() * 5.0;

            let step = bot.navigator.tick(&mut bot.body, desired, delta, &tree);
            if step.step.rolled_back {
                bot.rollbacks += 1;
            }
            if let Some(escape) = step.escape {
                bot.escapes += 1;
                if let Escape::Relocate(to) = escape {
                    debug!("tick {}: bot relocated to {:?}", tick, to);
                }
            }
        }
        busiest = busiest.max(tick_start.elapsed());
    }
    let elapsed = started.elapsed();

    for (i, bot) in bots.iter().enumerate() {
        info!(
            "bot {}: at {:.2?}, grounded {}, {} waypoints, {} rollbacks, {} escapes",
            i, bot.body.position, bot.body.grounded, bot.waypoint, bot.rollbacks, bot.escapes
        );
    }
    info!(
        "simulated {} ticks for {} bots in {:?} (slowest tick {:?})",
        args.ticks,
        bots.len(),
        elapsed,
        busiest
    );

    if let Some(path) = &args.export {
        let json = tree.to_json_pretty()?;
        std::fs::write(path, json).with_context(|| format!("writing map {}", path.display()))?;
        info!("exported map to {}", path.display());
    }
    Ok(())
}
