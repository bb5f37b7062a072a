//! wind.rs — Spatial + temporal wind model
//!
//! Wind at a point is the composite of:
//! - Speed: linear left→right gradient across the world width (clamped at the edges)
//! - Direction: a three-phase oscillation around the median direction
//!   (shift out → hold at peak → shift back), re-randomized every cycle
//! - Optionally, a first cycle with a persistent start-line bias (10 s out, 25 s hold, 10 s back)
//!
//! Oscillation is driven by accumulated simulation time passed to [`WindField::advance`],
//! never by call count, so a paused simulation freezes the wind exactly.
//! With oscillation disabled the wind blows from the median direction forever.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use regatta_types::{normalize_heading, signed_angle, Point, WindSample};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ── Configuration ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindConfig {
    /// Direction the wind blows from around which it oscillates
    pub median_direction_deg: f64,
    /// Speed at x = 0
    pub left_speed_knots: f64,
    /// Speed at x = world_width_m
    pub right_speed_knots: f64,
    pub world_width_m: f64,
    pub oscillation: OscillationConfig,
}

impl Default for WindConfig {
    fn default() -> Self {
        Self {
            median_direction_deg: 0.0,
            left_speed_knots: 14.0,
            right_speed_knots: 8.0,
            world_width_m: 2000.0,
            oscillation: OscillationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OscillationConfig {
    /// false = steady direction
    pub enabled: bool,
    /// Full out/peak/back cycle length is drawn from [min, max)
    pub min_shift_duration_s: f64,
    pub max_shift_duration_s: f64,
    /// Shift angle is drawn from [-max, max)
    pub max_shift_angle_deg: f64,
    /// Start with a persistent bias cycle favoring one end of the line
    pub start_line_bias: bool,
    pub bias_min_angle_deg: f64,
    pub bias_max_angle_deg: f64,
    /// Bias cycle phase lengths: out, peak, back
    pub bias_phase_durations_s: [f64; 3],
}

impl Default for OscillationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_shift_duration_s: 13.0,
            max_shift_duration_s: 25.0,
            max_shift_angle_deg: 10.0,
            start_line_bias: true,
            bias_min_angle_deg: 5.0,
            bias_max_angle_deg: 15.0,
            bias_phase_durations_s: [10.0, 25.0, 10.0],
        }
    }
}

// ── Oscillation state ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ShiftPhase {
    /// Ramping from the median toward the shift angle
    Out,
    /// Holding at the shift angle
    Peak,
    /// Ramping back to the median
    Back,
}

/// One out/peak/back cycle
#[derive(Debug, Clone, Copy)]
struct ShiftCycle {
    angle_deg: f64,
    durations_s: [f64; 3],
}

impl ShiftCycle {
    fn duration(&self, phase: ShiftPhase) -> f64 {
        match phase {
            ShiftPhase::Out => self.durations_s[0],
            ShiftPhase::Peak => self.durations_s[1],
            ShiftPhase::Back => self.durations_s[2],
        }
    }
}

// Guards the phase walk against zero-length phases from a bad config
const MIN_PHASE_S: f64 = 1e-3;

// ── Wind field ────────────────────────────────────────────────────────────────

pub struct WindField {
    median_direction: f64,
    left_speed: f64,
    right_speed: f64,
    world_width: f64,
    current_direction: f64,
    oscillation: Option<OscillationConfig>,
    phase: ShiftPhase,
    phase_start: f64,
    cycle: ShiftCycle,
    is_initial_bias_cycle: bool,
    rng: ChaCha8Rng,
}

impl WindField {
    /// Oscillating field with the default cycle parameters and no start-line bias.
    pub fn new(left_speed_knots: f64, right_speed_knots: f64, world_width_m: f64, seed: u64) -> Self {
        Self::from_config(
            &WindConfig {
                left_speed_knots,
                right_speed_knots,
                world_width_m,
                oscillation: OscillationConfig { start_line_bias: false, ..Default::default() },
                ..Default::default()
            },
            seed,
        )
    }

    /// Uniform, steady wind.
    pub fn constant(direction_deg: f64, speed_knots: f64) -> Self {
        Self::from_config(
            &WindConfig {
                median_direction_deg: direction_deg,
                left_speed_knots: speed_knots,
                right_speed_knots: speed_knots,
                oscillation: OscillationConfig { enabled: false, ..Default::default() },
                ..Default::default()
            },
            0,
        )
    }

    pub fn from_config(cfg: &WindConfig, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let median = normalize_heading(cfg.median_direction_deg);

        let oscillation = cfg.oscillation.enabled.then(|| cfg.oscillation.clone());
        let (cycle, is_bias) = match &oscillation {
            Some(osc) if osc.start_line_bias => (bias_cycle(osc, &mut rng), true),
            Some(osc) => (random_cycle(osc, &mut rng), false),
            None => (ShiftCycle { angle_deg: 0.0, durations_s: [f64::INFINITY; 3] }, false),
        };

        if is_bias {
            debug!("Start-line bias: {:+.1}° for {:?}s", cycle.angle_deg, cycle.durations_s);
        }

        Self {
            median_direction: median,
            left_speed: cfg.left_speed_knots,
            right_speed: cfg.right_speed_knots,
            world_width: cfg.world_width_m,
            current_direction: median,
            oscillation,
            phase: ShiftPhase::Out,
            phase_start: 0.0,
            cycle,
            is_initial_bias_cycle: is_bias,
            rng,
        }
    }

    /// Wind at `pos` for the current oscillation state.
    pub fn sample(&self, pos: Point) -> WindSample {
        WindSample::new(self.current_direction, self.speed_at(pos.x))
    }

    /// Gradient speed at world x. Non-finite x falls back to the left speed.
    pub fn speed_at(&self, x: f64) -> f64 {
        if !x.is_finite() || !(self.world_width > 0.0) || !self.world_width.is_finite() {
            return self.left_speed;
        }
        let t = (x / self.world_width).clamp(0.0, 1.0);
        self.left_speed + (self.right_speed - self.left_speed) * t
    }

    /// Move the oscillation to simulation time `now` (seconds since construction).
    pub fn advance(&mut self, now: f64) {
        let Some(osc) = self.oscillation.clone() else { return };
        if !now.is_finite() {
            return;
        }

        // Walk every phase boundary up to `now`; phase_start moves by whole
        // durations so the result depends only on `now`.
        loop {
            let duration = self.cycle.duration(self.phase).max(MIN_PHASE_S);
            if now - self.phase_start < duration {
                break;
            }
            self.phase_start += duration;
            self.phase = match self.phase {
                ShiftPhase::Out => ShiftPhase::Peak,
                ShiftPhase::Peak => ShiftPhase::Back,
                ShiftPhase::Back => {
                    self.cycle = random_cycle(&osc, &mut self.rng);
                    self.is_initial_bias_cycle = false;
                    debug!(
                        "Wind cycle: {:+.1}° over {:.1}s",
                        self.cycle.angle_deg,
                        self.cycle.durations_s.iter().sum::<f64>()
                    );
                    ShiftPhase::Out
                }
            };
        }

        let duration = self.cycle.duration(self.phase).max(MIN_PHASE_S);
        let progress = ((now - self.phase_start) / duration).clamp(0.0, 1.0);
        let offset = match self.phase {
            ShiftPhase::Out => self.cycle.angle_deg * progress,
            ShiftPhase::Peak => self.cycle.angle_deg,
            ShiftPhase::Back => self.cycle.angle_deg * (1.0 - progress),
        };
        self.current_direction = normalize_heading(self.median_direction + offset);
    }

    pub fn direction(&self) -> f64 { self.current_direction }

    pub fn median_direction(&self) -> f64 { self.median_direction }

    /// Signed offset of the current direction from the median, (−180, 180]
    pub fn shift_offset(&self) -> f64 {
        signed_angle(self.current_direction - self.median_direction)
    }

    pub fn shift_phase(&self) -> ShiftPhase { self.phase }

    /// Peak angle of the running cycle
    pub fn shift_angle(&self) -> f64 { self.cycle.angle_deg }

    pub fn is_oscillating(&self) -> bool { self.oscillation.is_some() }

    pub fn is_initial_bias_cycle(&self) -> bool { self.is_initial_bias_cycle }

    pub fn left_speed(&self) -> f64 { self.left_speed }

    pub fn right_speed(&self) -> f64 { self.right_speed }
}

fn random_cycle(osc: &OscillationConfig, rng: &mut ChaCha8Rng) -> ShiftCycle {
    let shift_duration = draw(rng, osc.min_shift_duration_s, osc.max_shift_duration_s);
    let angle = draw(rng, -osc.max_shift_angle_deg, osc.max_shift_angle_deg);
    ShiftCycle { angle_deg: angle, durations_s: [shift_duration / 3.0; 3] }
}

fn bias_cycle(osc: &OscillationConfig, rng: &mut ChaCha8Rng) -> ShiftCycle {
    let magnitude = draw(rng, osc.bias_min_angle_deg, osc.bias_max_angle_deg);
    let angle = if rng.gen_bool(0.5) { magnitude } else { -magnitude };
    ShiftCycle { angle_deg: angle, durations_s: osc.bias_phase_durations_s }
}

/// Uniform draw from [lo, hi); degenerate ranges return `lo`.
fn draw(rng: &mut ChaCha8Rng, lo: f64, hi: f64) -> f64 {
    if hi > lo { rng.gen_range(lo..hi) } else { lo }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn speed_interpolates_across_width() {
        let wind = WindField::new(10.0, 20.0, 2000.0, 1);
        for (x, expected) in [(0.0, 10.0), (500.0, 12.5), (1000.0, 15.0), (1500.0, 17.5), (2000.0, 20.0)] {
            assert_abs_diff_eq!(wind.sample(Point::new(x, 1000.0)).speed_knots, expected, epsilon = 0.1);
        }
    }

    #[test]
    fn speed_clamps_outside_world() {
        let wind = WindField::new(10.0, 20.0, 2000.0, 1);
        assert_abs_diff_eq!(wind.sample(Point::new(-100.0, 1000.0)).speed_knots, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(wind.sample(Point::new(3000.0, 1000.0)).speed_knots, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn invalid_position_falls_back_to_left_speed() {
        let wind = WindField::new(14.0, 8.0, 2000.0, 1);
        assert_eq!(wind.sample(Point::new(f64::NAN, 0.0)).speed_knots, 14.0);
        assert_eq!(wind.sample(Point::new(f64::INFINITY, 0.0)).speed_knots, 14.0);
    }

    #[test]
    fn y_does_not_matter() {
        let wind = WindField::new(10.0, 20.0, 2000.0, 1);
        let a = wind.sample(Point::new(1000.0, 0.0));
        let b = wind.sample(Point::new(1000.0, 3000.0));
        assert_eq!(a, b);
    }

    #[test]
    fn starts_at_median_direction() {
        let wind = WindField::new(14.0, 8.0, 2000.0, 7);
        assert_eq!(wind.sample(Point::new(0.0, 0.0)).direction_deg, 0.0);
        assert_eq!(wind.shift_phase(), ShiftPhase::Out);
    }

    #[test]
    fn constant_wind_never_moves() {
        let mut wind = WindField::constant(90.0, 12.0);
        for i in 0..1000 {
            wind.advance(i as f64);
        }
        assert_eq!(wind.direction(), 90.0);
        assert_eq!(wind.sample(Point::new(1234.0, 5.0)).speed_knots, 12.0);
    }

    #[test]
    fn oscillation_ramps_out_then_holds() {
        let mut wind = WindField::new(10.0, 10.0, 2000.0, 42);
        let angle = wind.shift_angle();
        let third = {
            // phase length is a third of the drawn cycle; find it by stepping into Peak
            let mut t = 0.0;
            while wind.shift_phase() == ShiftPhase::Out {
                t += 0.01;
                wind.advance(t);
            }
            t
        };
        assert!((13.0 / 3.0 - 0.02..25.0 / 3.0 + 0.02).contains(&third), "phase length {third}");
        assert_abs_diff_eq!(wind.shift_offset(), angle, epsilon = 1e-9);

        let mut fresh = WindField::new(10.0, 10.0, 2000.0, 42);
        fresh.advance(third / 2.0);
        assert_abs_diff_eq!(fresh.shift_offset(), angle / 2.0, epsilon = 0.05);
    }

    #[test]
    fn advance_depends_on_time_not_calls() {
        let mut stepped = WindField::new(10.0, 10.0, 2000.0, 9);
        let mut jumped = WindField::new(10.0, 10.0, 2000.0, 9);
        for i in 1..=6000 {
            stepped.advance(i as f64 / 60.0);
        }
        jumped.advance(100.0);
        assert_abs_diff_eq!(stepped.direction(), jumped.direction(), epsilon = 1e-9);
        assert_eq!(stepped.shift_phase(), jumped.shift_phase());

        // repeated calls at the same time change nothing
        let before = jumped.direction();
        jumped.advance(100.0);
        jumped.advance(100.0);
        assert_eq!(jumped.direction(), before);
    }

    #[test]
    fn same_seed_replays_same_wind() {
        let cfg = WindConfig::default();
        let mut a = WindField::from_config(&cfg, 1234);
        let mut b = WindField::from_config(&cfg, 1234);
        for i in 0..3000 {
            let t = i as f64 * 0.25;
            a.advance(t);
            b.advance(t);
            assert_eq!(a.direction(), b.direction());
        }
    }

    #[test]
    fn stays_within_fifteen_degrees() {
        let mut wind = WindField::from_config(&WindConfig::default(), 5);
        for i in 0..36_000 {
            wind.advance(i as f64 * 0.1);
            let offset = wind.shift_offset();
            assert!(offset.abs() <= 15.0, "offset {offset} at t={}", i as f64 * 0.1);
            assert!((0.0..360.0).contains(&wind.direction()));
        }
    }

    #[test]
    fn bias_cycle_uses_fixed_timings() {
        let mut wind = WindField::from_config(&WindConfig::default(), 77);
        assert!(wind.is_initial_bias_cycle());
        let bias = wind.shift_angle();
        assert!((5.0..15.0).contains(&bias.abs()), "bias {bias}");

        wind.advance(5.0);
        assert_abs_diff_eq!(wind.shift_offset(), bias / 2.0, epsilon = 1e-9);

        wind.advance(10.0);
        assert_eq!(wind.shift_phase(), ShiftPhase::Peak);
        assert_abs_diff_eq!(wind.shift_offset(), bias, epsilon = 1e-9);

        wind.advance(34.9);
        assert_eq!(wind.shift_phase(), ShiftPhase::Peak);

        wind.advance(40.0);
        assert_eq!(wind.shift_phase(), ShiftPhase::Back);
        assert_abs_diff_eq!(wind.shift_offset(), bias / 2.0, epsilon = 1e-9);

        wind.advance(45.0);
        assert!(!wind.is_initial_bias_cycle());
        assert_eq!(wind.shift_phase(), ShiftPhase::Out);
        assert_abs_diff_eq!(wind.shift_offset(), 0.0, epsilon = 1e-9);
        assert!(wind.shift_angle().abs() < 10.0);
    }

    #[test]
    fn bias_sign_varies_with_seed() {
        let signs: Vec<bool> = (0..32)
            .map(|seed| WindField::from_config(&WindConfig::default(), seed).shift_angle() > 0.0)
            .collect();
        assert!(signs.iter().any(|&s| s));
        assert!(signs.iter().any(|&s| !s));
    }

    #[test]
    fn direction_normalized_around_north() {
        let cfg = WindConfig { median_direction_deg: 0.0, ..Default::default() };
        let mut wind = WindField::from_config(&cfg, 3);
        wind.advance(20.0); // inside the bias peak
        let dir = wind.direction();
        assert!((0.0..360.0).contains(&dir));
        if wind.shift_angle() < 0.0 {
            assert!(dir > 340.0);
        } else {
            assert!(dir < 20.0);
        }
    }
}
