//! Stepped movement integrator for capsule bodies.
//!
//! # Tick
//!
//! 1. Split `velocity * delta` into equal sub-steps no longer than the
//!    configured maximum step
//! 2. Before the first sub-step, sample the whole motion; if any sample
//!    penetrates a wall or ceiling deeper than the start position does,
//!    roll back and halve the velocity
//! 3. Per sub-step: move, query the octree, resolve, and react to the push
//!    (ground, wall or ceiling)
//! 4. Probe downwards once to snap slowly falling bodies onto the ground
//!
//! Gravity and input are the caller's business; the integrator only moves
//! the body by its current velocity.

use std::time::Instant;

use glam::DVec3;
use tracing::{trace, warn};

use crate::geometry::Capsule;
use crate::octree::Octree;
use crate::resolver::CapsuleResolver;

/// Movement settings.
#[derive(Debug, Clone)]
pub struct MovementConfig {
    /// Maximum distance covered by one sub-step. Default: 0.1.
    pub max_step: f64,
    /// Maximum sub-step distance in high-precision mode. Default: 0.02.
    pub precise_max_step: f64,
    /// Use `precise_max_step`. Default: false.
    pub high_precision: bool,
    /// Upper bound on sub-steps per tick. Default: 50.
    pub max_substeps: u32,
    /// Pushes shorter than this are ignored. Default: 0.001.
    pub push_epsilon: f64,
    /// Push normals with a larger `y` count as ground. Default: 0.7.
    pub ground_slope: f64,
    /// Push normals with `y` below the negated value count as ceiling. Default: 0.7.
    pub ceiling_slope: f64,
    /// Displacements longer than this get the swept check. Default: 0.05.
    pub sweep_threshold: f64,
    /// Capsule samples taken along the motion by the swept check. Default: 5.
    pub sweep_samples: u32,
    /// Height above the feet the ground probe starts from. Default: 0.25.
    pub ground_probe_height: f64,
    /// How far below the feet the ground probe reaches. Default: 0.1.
    pub ground_snap_distance: f64,
    /// Bodies falling faster than this are not snapped. Default: 4.0.
    pub ground_snap_max_fall_speed: f64,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            max_step: 0.1,
            precise_max_step: 0.02,
            high_precision: false,
            max_substeps: 50,
            push_epsilon: 0.001,
            ground_slope: 0.7,
            ceiling_slope: 0.7,
            sweep_threshold: 0.05,
            sweep_samples: 5,
            ground_probe_height: 0.25,
            ground_snap_distance: 0.1,
            ground_snap_max_fall_speed: 4.0,
        }
    }
}

impl MovementConfig {
    /// Sub-step length in effect.
    pub fn step_length(&self) -> f64 {
        if self.high_precision {
            self.precise_max_step
        } else {
            self.max_step
        }
    }

    /// Sub-steps needed to cover `distance`.
    pub fn substeps_for(&self, distance: f64) -> u32 {
        let steps = (distance / self.step_length()).ceil();
        if steps.is_finite() {
            (steps as u32).clamp(1, self.max_substeps.max(1))
        } else {
            1
        }
    }
}

/// A moving capsule: player, bot or projectile.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    /// Bottom of the capsule.
    pub position: DVec3,
    pub velocity: DVec3,
    pub grounded: bool,
    pub radius: f64,
    /// Total height, feet to top of the head.
    pub height: f64,
}

impl Body {
    pub fn new(position: DVec3, radius: f64, height: f64) -> Self {
        Self {
            position,
            velocity: DVec3::ZERO,
            grounded: false,
            radius,
            height,
        }
    }

    /// World-space capsule for the current position.
    pub fn capsule(&self) -> Capsule {
        self.capsule_at(self.position)
    }

    /// Capsule the body would occupy with its feet at `position`.
    pub fn capsule_at(&self, position: DVec3) -> Capsule {
        let start = position + DVec3::Y * self.radius;
        let end = position + DVec3::Y * (self.height - self.radius).max(self.radius);
        Capsule::new(start, end, self.radius)
    }
}

/// What a push normal says about the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactKind {
    Ground,
    Wall,
    Ceiling,
}

/// Summary of one [`Integrator::integrate`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    pub substeps: u32,
    /// The swept check fired and the body was returned to its start.
    pub rolled_back: bool,
    pub grounded: bool,
    /// Sub-steps that produced a push.
    pub contacts: u32,
    /// The ground probe moved the body onto the floor.
    pub snapped: bool,
}

/// Moves bodies through static octree geometry.
#[derive(Debug, Clone, Default)]
pub struct Integrator {
    config: MovementConfig,
    resolver: CapsuleResolver,
}

impl Integrator {
    pub fn new(config: MovementConfig, resolver: CapsuleResolver) -> Self {
        Self { config, resolver }
    }

    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    pub fn resolver(&self) -> &CapsuleResolver {
        &self.resolver
    }

    /// Advance `body` by `velocity * delta`, resolving collisions against `octree`.
    pub fn integrate(&self, body: &mut Body, delta: f64, octree: &Octree) -> StepReport {
        let started = Instant::now();
        let displacement = body.velocity * delta;
        let distance = displacement.length();
        let substeps = self.config.substeps_for(distance);
        let mut report = StepReport {
            substeps,
            ..Default::default()
        };

        if distance > self.config.sweep_threshold && self.sweep_blocked(body, displacement, octree) {
            body.velocity *= 0.5;
            report.rolled_back = true;
            report.grounded = body.grounded;
            trace!(position = ?body.position, "swept check rolled back motion");
            return report;
        }

        body.grounded = false;
        let mut step = displacement / f64::from(substeps);
        for _ in 0..substeps {
            body.position += step;
            let capsule = body.capsule();
            let candidates = octree.query_capsule(&capsule);
            if candidates.is_empty() {
                continue;
            }
            let push = self.resolver.resolve(&capsule, &candidates);
            if push.length() <= self.config.push_epsilon {
                continue;
            }

            body.position += push;
            report.contacts += 1;
            self.respond_to_push(body, push);

            // Slide the rest of the motion along the surface
            let normal = push.normalize();
            let into = step.dot(normal);
            if into < 0.0 {
                step -= normal * into;
            }
        }

        if !body.grounded {
            report.snapped = self.snap_to_ground(body, octree);
        }
        report.grounded = body.grounded;

        let elapsed = started.elapsed();
        if elapsed > self.resolver.config().slow_call_warning {
            warn!(?elapsed, substeps, "slow integrate");
        }
        trace!(position = ?body.position, velocity = ?body.velocity, ?report, "integrated body");
        report
    }

    /// Classify a unit push normal.
    pub fn classify_push(&self, normal: DVec3) -> ContactKind {
        if normal.y > self.config.ground_slope {
            ContactKind::Ground
        } else if normal.y < -self.config.ceiling_slope {
            ContactKind::Ceiling
        } else {
            ContactKind::Wall
        }
    }

    /// Update velocity and grounded state for a resolver push.
    ///
    /// Ground zeroes downward velocity and keeps horizontal velocity. Walls
    /// remove the horizontal velocity heading into them. Ceilings stop upward
    /// motion. Returns `None` for a zero push.
    pub fn respond_to_push(&self, body: &mut Body, push: DVec3) -> Option<ContactKind> {
        let normal = push.try_normalize()?;
        let kind = self.classify_push(normal);
        match kind {
            ContactKind::Ground => {
                body.velocity.y = body.velocity.y.max(0.0);
                body.grounded = true;
            }
            ContactKind::Wall => {
                if let Some(wall) = DVec3::new(normal.x, 0.0, normal.z).try_normalize() {
                    let horizontal = DVec3::new(body.velocity.x, 0.0, body.velocity.z);
                    let into = horizontal.dot(wall);
                    if into < 0.0 {
                        body.velocity -= wall * into;
                    }
                }
            }
            ContactKind::Ceiling => {
                body.velocity.y = body.velocity.y.min(0.0);
            }
        }
        Some(kind)
    }

    // Samples at i / n for i in 1..=n along the full motion. Ground pushes
    // never block, so walking and landing go through the sub-steps.
    fn sweep_blocked(&self, body: &Body, displacement: DVec3, octree: &Octree) -> bool {
        if displacement == DVec3::ZERO {
            return false;
        }
        let baseline = self.blocking_depth(&body.capsule(), octree);
        let samples = self.config.sweep_samples.max(1);
        (1..=samples).any(|i| {
            let t = f64::from(i) / f64::from(samples);
            let capsule = body.capsule_at(body.position + displacement * t);
            self.blocking_depth(&capsule, octree) > baseline + self.config.push_epsilon
        })
    }

    // Length of the resolver push when it is a wall or ceiling push, else zero.
    fn blocking_depth(&self, capsule: &Capsule, octree: &Octree) -> f64 {
        let candidates = octree.query_capsule(capsule);
        if candidates.is_empty() {
            return 0.0;
        }
        let push = self.resolver.resolve(capsule, &candidates);
        match push.try_normalize() {
            Some(normal) if self.classify_push(normal) != ContactKind::Ground => push.length(),
            _ => 0.0,
        }
    }

    fn snap_to_ground(&self, body: &mut Body, octree: &Octree) -> bool {
        let falling = -body.velocity.y;
        if falling < 0.0 || falling > self.config.ground_snap_max_fall_speed {
            return false;
        }
        let origin = body.position + DVec3::Y * self.config.ground_probe_height;
        let reach = self.config.ground_probe_height + self.config.ground_snap_distance;
        let Some((hit, _)) = octree.raycast(origin, DVec3::NEG_Y, reach) else {
            return false;
        };
        if hit.normal.y <= self.config.ground_slope {
            return false;
        }
        body.position.y = hit.point.y;
        body.velocity.y = 0.0;
        body.grounded = true;
        true
    }
}
