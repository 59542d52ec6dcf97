//! Synthetic avatar movement for the headless client
//!
//! The avatar walks between random points inside a circle around the origin,
//! pausing at each one. Heading follows the direction of travel and the
//! animation state follows the current speed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{AnimationState, Location, Rotation};
use std::f32::consts::TAU;

/// Speeds at or above this many units per second animate as running
pub const RUN_THRESHOLD: f32 = 3.0;

const ARRIVAL_DISTANCE: f32 = 0.05;
const MIN_PAUSE_SECS: f32 = 0.5;
const MAX_PAUSE_SECS: f32 = 2.0;

pub fn state_for_speed(speed: f32) -> AnimationState {
    if speed <= f32::EPSILON {
        AnimationState::Idle
    } else if speed < RUN_THRESHOLD {
        AnimationState::Walking
    } else {
        AnimationState::Running
    }
}

/// Pose produced by one motion step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub location: Location,
    pub rotation: Rotation,
    pub state: AnimationState,
}

pub struct Wanderer {
    rng: StdRng,
    radius: f32,
    base_speed: f32,

    x: f32,
    z: f32,
    yaw: f32,

    target: (f32, f32),
    leg_speed: f32,
    pause_remaining: f32,
}

impl Wanderer {
    pub fn new(radius: f32, speed: f32) -> Self {
        Self::with_rng(radius, speed, StdRng::from_entropy())
    }

    /// Deterministic generator for reproducible runs
    pub fn seeded(radius: f32, speed: f32, seed: u64) -> Self {
        Self::with_rng(radius, speed, StdRng::seed_from_u64(seed))
    }

    fn with_rng(radius: f32, speed: f32, rng: StdRng) -> Self {
        let mut wanderer = Self {
            rng,
            radius: radius.max(0.0),
            base_speed: speed.max(0.0),
            x: 0.0,
            z: 0.0,
            yaw: 0.0,
            target: (0.0, 0.0),
            leg_speed: 0.0,
            pause_remaining: 0.0,
        };
        wanderer.pick_target();
        wanderer
    }

    fn pick_target(&mut self) {
        let angle = self.rng.gen_range(0.0..TAU);
        // sqrt keeps targets uniformly spread over the disc
        let distance = self.radius * self.rng.gen_range(0.0f32..=1.0).sqrt();
        self.target = (distance * angle.cos(), distance * angle.sin());
        self.leg_speed = self.base_speed * self.rng.gen_range(0.5..=1.5);
    }

    pub fn pose(&self) -> Pose {
        let moving = self.pause_remaining <= 0.0 && self.leg_speed > 0.0;
        Pose {
            location: Location::new(self.x, 0.0, self.z),
            rotation: Rotation::from_yaw(self.yaw),
            state: state_for_speed(if moving { self.leg_speed } else { 0.0 }),
        }
    }

    /// Advances the avatar by `dt` seconds and returns the new pose
    pub fn step(&mut self, dt: f32) -> Pose {
        if self.pause_remaining > 0.0 {
            self.pause_remaining -= dt;
            if self.pause_remaining <= 0.0 {
                self.pause_remaining = 0.0;
                self.pick_target();
            }
            return self.pose();
        }

        let dx = self.target.0 - self.x;
        let dz = self.target.1 - self.z;
        let remaining = (dx * dx + dz * dz).sqrt();
        let travel = self.leg_speed * dt;

        if remaining <= ARRIVAL_DISTANCE || travel >= remaining {
            self.x = self.target.0;
            self.z = self.target.1;
            self.pause_remaining = self.rng.gen_range(MIN_PAUSE_SECS..=MAX_PAUSE_SECS);
        } else {
            self.x += dx / remaining * travel;
            self.z += dz / remaining * travel;
        }

        if remaining > ARRIVAL_DISTANCE {
            // Facing +Z at yaw zero
            self.yaw = dx.atan2(dz);
        }

        self.pose()
    }
}
