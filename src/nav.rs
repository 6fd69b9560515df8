//! Bot navigation helpers layered on the integrator.
//!
//! The integrator never teleports a body out of geometry it cannot resolve.
//! [`Navigator`] watches progress instead and escalates through a jump, a
//! sidestep and finally a relocation to a probed free position.

use std::collections::VecDeque;
use std::f64::consts::TAU;

use glam::DVec3;
use tracing::{debug, warn};

use crate::integrator::{Body, Integrator, StepReport};
use crate::octree::Octree;
use crate::resolver::CapsuleResolver;

/// Navigator settings.
#[derive(Debug, Clone)]
pub struct NavConfig {
    /// Vertical acceleration applied every tick. Default: -9.81.
    pub gravity: f64,
    /// Positions remembered by the stuck detector. Default: 30.
    pub window: usize,
    /// Minimum horizontal progress across the window. Default: 0.5.
    pub progress_threshold: f64,
    /// Vertical speed of the jump escape. Default: 5.0.
    pub jump_speed: f64,
    /// Horizontal speed of the sidestep escape. Default: 3.0.
    pub sidestep_speed: f64,
    /// Ticks a sidestep lasts. Default: 15.
    pub sidestep_ticks: u32,
    /// Ring radii probed by [`find_free_position`], innermost first.
    /// Default: 0.5, 1.0, 2.0, 4.0.
    pub probe_radii: Vec<f64>,
    /// Probes per ring. Default: 8.
    pub probe_directions: u32,
    /// Height added to every probe. Default: 0.1.
    pub probe_lift: f64,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            gravity: -9.81,
            window: 30,
            progress_threshold: 0.5,
            jump_speed: 5.0,
            sidestep_speed: 3.0,
            sidestep_ticks: 15,
            probe_radii: vec![0.5, 1.0, 2.0, 4.0],
            probe_directions: 8,
            probe_lift: 0.1,
        }
    }
}

/// Detects a body that wants to move but makes no horizontal progress.
#[derive(Debug, Clone)]
pub struct StuckDetector {
    window: usize,
    threshold: f64,
    positions: VecDeque<DVec3>,
}

impl StuckDetector {
    pub fn new(window: usize, threshold: f64) -> Self {
        let window = window.max(2);
        Self {
            window,
            threshold,
            positions: VecDeque::with_capacity(window),
        }
    }

    /// Record a position. Returns `true` when the window is full, the body
    /// wants to move, and it has moved less than the threshold horizontally.
    pub fn record(&mut self, position: DVec3, desired_speed: f64) -> bool {
        if self.positions.len() == self.window {
            self.positions.pop_front();
        }
        self.positions.push_back(position);
        desired_speed > 0.0 && self.is_full() && self.progress() < self.threshold
    }

    /// Horizontal distance between the oldest and newest recorded positions.
    pub fn progress(&self) -> f64 {
        match (self.positions.front(), self.positions.back()) {
            (Some(first), Some(last)) => (*last - *first).with_y(0.0).length(),
            _ => 0.0,
        }
    }

    pub fn is_full(&self) -> bool {
        self.positions.len() == self.window
    }

    pub fn reset(&mut self) {
        self.positions.clear();
    }
}

/// Probe rings around `body` for a spot where its capsule touches nothing.
///
/// Probes are tried ring by ring, starting along +X and turning towards +Z.
/// Returns the feet position of the first free probe.
pub fn find_free_position(body: &Body, octree: &Octree, resolver: &CapsuleResolver, config: &NavConfig) -> Option<DVec3> {
    let directions = config.probe_directions.max(1);
    for &radius in &config.probe_radii {
        for k in 0..directions {
            let angle = TAU * f64::from(k) / f64::from(directions);
            let offset = DVec3::new(angle.cos() * radius, config.probe_lift, angle.sin() * radius);
            let position = body.position + offset;
            let capsule = body.capsule_at(position);
            let candidates = octree.query_capsule(&capsule);
            if !resolver.penetrates(&capsule, &candidates) {
                return Some(position);
            }
        }
    }
    None
}

/// Escape action taken by [`Navigator::tick`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Escape {
    Jump,
    Sidestep,
    /// Moved to the given feet position.
    Relocate(DVec3),
}

/// Outcome of one [`Navigator::tick`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavStep {
    pub step: StepReport,
    pub stuck: bool,
    pub escape: Option<Escape>,
}

/// Drives one body: gravity, steering, integration, stuck recovery.
#[derive(Debug, Clone)]
pub struct Navigator {
    config: NavConfig,
    integrator: Integrator,
    detector: StuckDetector,
    escalation: u32,
    sidestep: Option<(DVec3, u32)>,
}

impl Navigator {
    pub fn new(config: NavConfig, integrator: Integrator) -> Self {
        let detector = StuckDetector::new(config.window, config.progress_threshold);
        Self {
            config,
            integrator,
            detector,
            escalation: 0,
            sidestep: None,
        }
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    pub fn integrator(&self) -> &Integrator {
        &self.integrator
    }

    /// Advance one tick with `desired` as the wanted horizontal velocity.
    pub fn tick(&mut self, body: &mut Body, desired: DVec3, delta: f64, octree: &Octree) -> NavStep {
        let desired = desired.with_y(0.0);
        let steering = match self.sidestep.as_mut() {
            Some((direction, remaining)) if *remaining > 0 => {
                *remaining -= 1;
                *direction * self.config.sidestep_speed
            }
            _ => {
                self.sidestep = None;
                desired
            }
        };
        body.velocity.x = steering.x;
        body.velocity.z = steering.z;
        body.velocity.y += self.config.gravity * delta;

        let step = self.integrator.integrate(body, delta, octree);
        let stuck = self.detector.record(body.position, desired.length());
        if !stuck && self.detector.is_full() {
            self.escalation = 0;
        }
        let escape = stuck.then(|| self.escape(body, desired, octree));

        NavStep { step, stuck, escape }
    }

    fn escape(&mut self, body: &mut Body, desired: DVec3, octree: &Octree) -> Escape {
        self.detector.reset();
        let stage = self.escalation;
        self.escalation += 1;

        let escape = match stage {
            0 => {
                body.velocity.y = self.config.jump_speed;
                Escape::Jump
            }
            1 => {
                let lateral = DVec3::Y.cross(desired).try_normalize().unwrap_or(DVec3::X);
                self.sidestep = Some((lateral, self.config.sidestep_ticks));
                Escape::Sidestep
            }
            _ => {
                self.escalation = 0;
                match find_free_position(body, octree, self.integrator.resolver(), &self.config) {
                    Some(position) => {
                        body.position = position;
                        body.velocity = DVec3::ZERO;
                        Escape::Relocate(position)
                    }
                    None => {
                        warn!(position = ?body.position, "no free position around stuck body");
                        Escape::Jump
                    }
                }
            }
        };
        debug!(?escape, position = ?body.position, "stuck body escape");
        escape
    }
}
