//! scenarios.rs — Named race presets
//!
//! Each preset patches a loaded config so the same course can be sailed in
//! the wind variants the game has shipped with. Selectable with `--preset`
//! on the command line or the `preset` control command at runtime.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::SimConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// Left/right gradient, oscillating shifts, start-line bias (the default race)
    Classic,
    /// Uniform steady breeze, no shifts
    SteadyBreeze,
    /// Speed gradient only, direction fixed
    Gradient,
    /// Oscillating shifts with no start-line bias
    Shifty,
    /// Classic wind on a course with no windward mark
    NoUpwindMark,
}

impl Scenario {
    /// Patch `cfg` in place. Leaves everything the preset doesn't care about alone.
    pub fn apply(self, cfg: &mut SimConfig) {
        let wind = &mut cfg.wind;
        match self {
            Scenario::Classic => {
                wind.left_speed_knots = 14.0;
                wind.right_speed_knots = 8.0;
                wind.oscillation.enabled = true;
                wind.oscillation.start_line_bias = true;
            }
            Scenario::SteadyBreeze => {
                let mean = (wind.left_speed_knots + wind.right_speed_knots) / 2.0;
                wind.left_speed_knots = mean;
                wind.right_speed_knots = mean;
                wind.oscillation.enabled = false;
            }
            Scenario::Gradient => {
                wind.oscillation.enabled = false;
            }
            Scenario::Shifty => {
                wind.oscillation.enabled = true;
                wind.oscillation.start_line_bias = false;
            }
            Scenario::NoUpwindMark => {
                cfg.course.upwind_mark = None;
            }
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Scenario::Classic => "14→8 kt gradient, oscillating, start-line bias",
            Scenario::SteadyBreeze => "uniform steady breeze",
            Scenario::Gradient => "speed gradient, steady direction",
            Scenario::Shifty => "oscillating shifts, no bias",
            Scenario::NoUpwindMark => "no windward mark",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::Simulation;
    use regatta_types::Point;

    #[test]
    fn steady_breeze_is_uniform_and_fixed() {
        let mut cfg = SimConfig::default();
        Scenario::SteadyBreeze.apply(&mut cfg);
        assert_eq!(cfg.wind.left_speed_knots, 11.0);
        assert_eq!(cfg.wind.right_speed_knots, 11.0);
        assert!(!cfg.wind.oscillation.enabled);

        let mut sim = Simulation::new(cfg).unwrap();
        sim.set_paused(false);
        for _ in 0..3600 {
            sim.tick(0.0, 1.0 / 60.0);
        }
        assert_eq!(sim.wind().direction(), 0.0);
        assert_eq!(sim.wind().sample(Point::new(0.0, 0.0)).speed_knots, 11.0);
    }

    #[test]
    fn gradient_keeps_speeds() {
        let mut cfg = SimConfig::default();
        Scenario::Gradient.apply(&mut cfg);
        assert_eq!(cfg.wind.left_speed_knots, 14.0);
        assert_eq!(cfg.wind.right_speed_knots, 8.0);
        assert!(!cfg.wind.oscillation.enabled);
    }

    #[test]
    fn shifty_has_no_bias() {
        let mut cfg = SimConfig::default();
        Scenario::Shifty.apply(&mut cfg);
        let sim = Simulation::new(cfg).unwrap();
        assert!(sim.wind().is_oscillating());
        assert!(!sim.wind().is_initial_bias_cycle());
    }

    #[test]
    fn classic_restores_bias_after_other_presets() {
        let mut cfg = SimConfig::default();
        Scenario::SteadyBreeze.apply(&mut cfg);
        Scenario::Classic.apply(&mut cfg);
        let sim = Simulation::new(cfg).unwrap();
        assert!(sim.wind().is_initial_bias_cycle());
    }

    #[test]
    fn no_upwind_mark_removes_mark_only() {
        let mut cfg = SimConfig::default();
        Scenario::NoUpwindMark.apply(&mut cfg);
        assert!(cfg.course.upwind_mark.is_none());
        assert!(cfg.validate().is_ok());
        assert!(cfg.wind.oscillation.enabled);
    }

    #[test]
    fn preset_names_parse_from_json() {
        let s: Scenario = serde_json::from_str("\"steady-breeze\"").unwrap();
        assert_eq!(s, Scenario::SteadyBreeze);
        let s: Scenario = serde_json::from_str("\"no-upwind-mark\"").unwrap();
        assert_eq!(s, Scenario::NoUpwindMark);
    }
}
