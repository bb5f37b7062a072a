//! boat_sim.rs — Boat kinematics
//!
//! Moves a single keelboat under the target speed the polar gives for its
//! current heading and wind:
//! - Velocity is kept in world units per nominal tick (1 unit = 1 m, 60 ticks/s)
//! - Sideways velocity bleeds into the heading direction (alignment)
//! - Quadratic water drag opposes motion but never reverses it
//! - Velocity eases toward the polar target (acceleration)
//!
//! `dt` is converted to nominal ticks, and each blend factor compounds as
//! `1 − (1 − f)^ticks`, so a 1/60 s step reproduces one frame exactly and
//! coarser steps stay stable.

use regatta_types::{normalize_heading, Point, WindSample};
use serde::{Deserialize, Serialize};

use crate::polar::PolarTable;

// Below this speed (units/tick) the boat has no meaningful direction of travel
const MIN_MOVING_SPEED: f64 = 0.01;

// ── Parameters ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KinematicsConfig {
    /// Nominal frame rate the blend factors are expressed in
    pub tick_rate_hz: f64,
    /// World units per second per knot
    pub speed_scale: f64,
    pub boat_length_m: f64,
    pub mass_kg: f64,
    pub drag_coefficient: f64,
    pub drag_scale: f64,
    /// Per-tick fraction of sideways velocity turned onto the heading
    pub alignment_factor: f64,
    /// Per-tick fraction of the gap to target velocity closed
    pub acceleration_factor: f64,
}

impl Default for KinematicsConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60.0,
            speed_scale: 5.0,
            boat_length_m: 15.0,
            mass_kg: 4000.0,
            drag_coefficient: 0.02,
            drag_scale: 10.0,
            alignment_factor: 0.05,
            acceleration_factor: 0.01,
        }
    }
}

impl KinematicsConfig {
    /// Knots → world units per nominal tick
    pub fn knots_to_tick_speed(&self, knots: f64) -> f64 {
        knots * self.speed_scale / self.tick_rate_hz
    }

    /// World units per nominal tick → knots
    pub fn tick_speed_to_knots(&self, units: f64) -> f64 {
        units * self.tick_rate_hz / self.speed_scale
    }
}

// ── Boat state ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoatState {
    /// Hull center, world frame (meters)
    pub position: Point,
    /// Compass heading, [0, 360)
    pub heading_deg: f64,
    /// World units per nominal tick
    pub vel_x: f64,
    pub vel_y: f64,
    /// Derived from |velocity| after every step
    pub speed_knots: f64,
}

impl BoatState {
    /// Boat at rest
    pub fn new(position: Point, heading_deg: f64) -> Self {
        Self {
            position,
            heading_deg: normalize_heading(heading_deg),
            vel_x: 0.0,
            vel_y: 0.0,
            speed_knots: 0.0,
        }
    }

    /// Boat already moving at `speed_knots` along its heading
    pub fn with_speed(position: Point, heading_deg: f64, speed_knots: f64, cfg: &KinematicsConfig) -> Self {
        let mut boat = Self::new(position, heading_deg);
        boat.set_speed(speed_knots, cfg);
        boat
    }

    pub fn set_speed(&mut self, speed_knots: f64, cfg: &KinematicsConfig) {
        let units = cfg.knots_to_tick_speed(speed_knots.max(0.0));
        let (ux, uy) = heading_unit(self.heading_deg);
        self.vel_x = units * ux;
        self.vel_y = units * uy;
        self.speed_knots = cfg.tick_speed_to_knots(units);
    }

    /// Forward-most point: half a hull length ahead of center along the heading
    pub fn bow_position(&self, cfg: &KinematicsConfig) -> Point {
        self.position.project(self.heading_deg, cfg.boat_length_m / 2.0)
    }

    /// World units per nominal tick
    pub fn speed_units(&self) -> f64 {
        (self.vel_x * self.vel_x + self.vel_y * self.vel_y).sqrt()
    }

    /// Adds `delta_deg` to the heading, normalized to [0, 360)
    pub fn turn(&mut self, delta_deg: f64) {
        if delta_deg.is_finite() {
            self.heading_deg = normalize_heading(self.heading_deg + delta_deg);
        }
    }
}

/// Unit vector along a compass heading (Y grows southward)
fn heading_unit(heading_deg: f64) -> (f64, f64) {
    let h = heading_deg.to_radians();
    (h.sin(), -h.cos())
}

/// Fraction left after compounding a per-tick blend over `ticks`
fn compound(factor: f64, ticks: f64) -> f64 {
    1.0 - (1.0 - factor.clamp(0.0, 1.0)).powf(ticks)
}

// ── Step ──────────────────────────────────────────────────────────────────────

/// Advance `boat` by `dt` seconds under `wind`.
/// Returns the distance moved (meters).
pub fn step(boat: &mut BoatState, wind: &WindSample, polar: &PolarTable, cfg: &KinematicsConfig, dt: f64) -> f64 {
    if !(dt > 0.0) || !dt.is_finite() {
        return 0.0;
    }
    let ticks = dt * cfg.tick_rate_hz;

    let twa = wind.twa(boat.heading_deg);
    let target = cfg.knots_to_tick_speed(polar.boat_speed(twa, wind.speed_knots));
    let (ux, uy) = heading_unit(boat.heading_deg);

    // Alignment
    if boat.speed_units() > MIN_MOVING_SPEED {
        let forward = boat.vel_x * ux + boat.vel_y * uy;
        let a = compound(cfg.alignment_factor, ticks);
        boat.vel_x = boat.vel_x * (1.0 - a) + forward * ux * a;
        boat.vel_y = boat.vel_y * (1.0 - a) + forward * uy * a;
    }

    // Drag
    let speed = boat.speed_units();
    if speed > MIN_MOVING_SPEED && cfg.mass_kg > 0.0 {
        let per_tick = cfg.drag_coefficient * speed * speed / cfg.mass_kg * cfg.drag_scale / cfg.tick_rate_hz;
        let loss = (per_tick * ticks).min(speed);
        let keep = (speed - loss) / speed;
        boat.vel_x *= keep;
        boat.vel_y *= keep;
    }

    // Acceleration toward target
    let a = compound(cfg.acceleration_factor, ticks);
    boat.vel_x += (target * ux - boat.vel_x) * a;
    boat.vel_y += (target * uy - boat.vel_y) * a;

    let dx = boat.vel_x * ticks;
    let dy = boat.vel_y * ticks;
    boat.position.x += dx;
    boat.position.y += dy;
    boat.speed_knots = cfg.tick_speed_to_knots(boat.speed_units());

    (dx * dx + dy * dy).sqrt()
}
