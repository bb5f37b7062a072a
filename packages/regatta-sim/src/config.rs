//! config.rs — TOML configuration
//!
//! Every tunable lives in one `SimConfig` with a section per concern. Each
//! section is `#[serde(default)]`, so a file only lists what it changes; the
//! embedded `config.toml` is the fallback when no file is found.

use std::path::Path;

use regatta_types::{Course, Point};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::boat_sim::KinematicsConfig;
use crate::helm::HelmConfig;
use crate::polar::{PolarError, PolarTable};
use crate::wind::WindConfig;

pub const DEFAULT_CONFIG_TOML: &str = include_str!("../config.toml");

/// Driver tick rate bounds; the loop period is `1 / update_rate_hz`
pub const MIN_UPDATE_RATE_HZ: f64 = 1.0;
pub const MAX_UPDATE_RATE_HZ: f64 = 1000.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("invalid polar table: {0}")]
    Polar(#[from] PolarError),
}

// ── Sections ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    /// Countdown to the gun
    pub timer_duration_s: f64,
    pub player_name: String,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self { timer_duration_s: 30.0, player_name: "Skipper".into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoatConfig {
    /// Start position, meters south of the line center
    pub start_offset_m: f64,
    pub start_heading_deg: f64,
    /// Start moving at the polar speed for the start heading
    pub start_at_full_speed: bool,
}

impl Default for BoatConfig {
    fn default() -> Self {
        Self { start_offset_m: 180.0, start_heading_deg: 90.0, start_at_full_speed: true }
    }
}

/// Custom polar table, same layout as the embedded one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolarConfig {
    pub wind_speeds: Vec<f64>,
    pub angles: Vec<f64>,
    pub speeds: Vec<Vec<f64>>,
    pub beat_angles: Vec<f64>,
    pub beat_vmg: Vec<f64>,
}

impl PolarConfig {
    pub fn build(&self) -> Result<PolarTable, PolarError> {
        PolarTable::new(
            self.wind_speeds.clone(),
            self.angles.clone(),
            self.speeds.clone(),
            self.beat_angles.clone(),
            self.beat_vmg.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Driver tick rate
    pub update_rate_hz: f64,
    /// Sim seconds per wall second
    pub sim_speed: f64,
    /// Base RNG seed; restarts derive theirs from it
    pub seed: u64,
    pub start_paused: bool,
    pub ctrl_port: u16,
    pub results_path: String,
    /// Telemetry frames per log line
    pub log_every_ticks: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            update_rate_hz: 60.0,
            sim_speed: 1.0,
            seed: 42,
            start_paused: true,
            ctrl_port: 9090,
            results_path: "results.jsonl".into(),
            log_every_ticks: 300,
        }
    }
}

// ── Root ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub race: RaceConfig,
    pub course: Course,
    pub boat: BoatConfig,
    pub wind: WindConfig,
    pub kinematics: KinematicsConfig,
    pub helm: HelmConfig,
    pub polar: Option<PolarConfig>,
    pub simulation: SimulationConfig,
}

impl SimConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: SimConfig = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
        Self::from_toml_str(&raw)
    }

    /// The embedded defaults
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_toml_str(DEFAULT_CONFIG_TOML)
    }

    pub fn polar_table(&self) -> Result<PolarTable, ConfigError> {
        match &self.polar {
            Some(p) => Ok(p.build()?),
            None => Ok(PolarTable::default()),
        }
    }

    /// Boat start position: `start_offset_m` south of the line center
    pub fn start_position(&self) -> Point {
        let center = self.course.line_center();
        Point::new(center.x, center.y + self.boat.start_offset_m)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        let c = &self.course;

        if !c.pin.is_finite() || !c.committee.is_finite() {
            return invalid("course line ends must be finite".into());
        }
        if c.pin.y != c.committee.y {
            return invalid(format!("start line must be horizontal (pin y={}, committee y={})", c.pin.y, c.committee.y));
        }
        if c.pin.x == c.committee.x {
            return invalid("start line has zero length".into());
        }
        if let Some(mark) = c.upwind_mark {
            if !mark.is_finite() {
                return invalid("upwind mark must be finite".into());
            }
            if mark.y >= c.line_y() {
                return invalid(format!("upwind mark (y={}) must be north of the line (y={})", mark.y, c.line_y()));
            }
        }

        if !(self.race.timer_duration_s >= 0.0) {
            return invalid(format!("timer_duration_s must be ≥ 0, got {}", self.race.timer_duration_s));
        }

        let w = &self.wind;
        if !(w.world_width_m > 0.0) || !w.world_width_m.is_finite() {
            return invalid(format!("wind.world_width_m must be > 0, got {}", w.world_width_m));
        }
        if !w.median_direction_deg.is_finite() {
            return invalid("wind.median_direction_deg must be finite".into());
        }
        if !(w.left_speed_knots >= 0.0 && w.right_speed_knots >= 0.0)
            || !w.left_speed_knots.is_finite()
            || !w.right_speed_knots.is_finite()
        {
            return invalid("wind speeds must be finite and ≥ 0".into());
        }
        let osc = &w.oscillation;
        if osc.enabled {
            if osc.min_shift_duration_s <= 0.0 || osc.max_shift_duration_s < osc.min_shift_duration_s {
                return invalid("oscillation shift durations must satisfy 0 < min ≤ max".into());
            }
            if osc.bias_phase_durations_s.iter().any(|d| !(*d > 0.0)) {
                return invalid("bias phase durations must be > 0".into());
            }
            if osc.max_shift_angle_deg.abs() > 15.0 || osc.bias_max_angle_deg.abs() > 15.0 {
                return invalid("wind shifts are limited to 15°".into());
            }
            if osc.bias_min_angle_deg > osc.bias_max_angle_deg {
                return invalid("bias_min_angle_deg must be ≤ bias_max_angle_deg".into());
            }
        }

        let k = &self.kinematics;
        for (name, v) in [
            ("tick_rate_hz", k.tick_rate_hz),
            ("speed_scale", k.speed_scale),
            ("boat_length_m", k.boat_length_m),
            ("mass_kg", k.mass_kg),
            ("drag_coefficient", k.drag_coefficient),
            ("drag_scale", k.drag_scale),
            ("alignment_factor", k.alignment_factor),
            ("acceleration_factor", k.acceleration_factor),
        ] {
            if !v.is_finite() {
                return invalid(format!("kinematics.{name} must be finite, got {v}"));
            }
        }
        if !(k.tick_rate_hz > 0.0) || !(k.speed_scale > 0.0) {
            return invalid("kinematics tick_rate_hz and speed_scale must be > 0".into());
        }
        if !(k.mass_kg > 0.0) || k.boat_length_m < 0.0 {
            return invalid("boat mass must be > 0 and length ≥ 0".into());
        }
        if k.drag_coefficient < 0.0 || k.drag_scale < 0.0 {
            return invalid("drag_coefficient and drag_scale must be ≥ 0".into());
        }
        for (name, f) in [("alignment_factor", k.alignment_factor), ("acceleration_factor", k.acceleration_factor)] {
            if !(0.0..=1.0).contains(&f) {
                return invalid(format!("{name} must be within [0, 1], got {f}"));
            }
        }

        if !(self.helm.step_deg > 0.0) || self.helm.repeat_delay_s < 0.0 {
            return invalid("helm step must be > 0 and repeat delay ≥ 0".into());
        }

        let s = &self.simulation;
        if !(MIN_UPDATE_RATE_HZ..=MAX_UPDATE_RATE_HZ).contains(&s.update_rate_hz) {
            return invalid(format!(
                "update_rate_hz must be within [{MIN_UPDATE_RATE_HZ}, {MAX_UPDATE_RATE_HZ}], got {}",
                s.update_rate_hz
            ));
        }
        if !(s.sim_speed > 0.0) || !s.sim_speed.is_finite() {
            return invalid(format!("sim_speed must be finite and > 0, got {}", s.sim_speed));
        }

        if let Some(p) = &self.polar {
            p.build()?;
        }
        Ok(())
    }
}
