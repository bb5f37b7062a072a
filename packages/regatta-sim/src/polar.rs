//! polar.rs — Boat performance polar
//!
//! Converts (true wind angle, true wind speed) into target boat speed:
//! - Below 30° TWA the boat is in irons (0 kt)
//! - 30°..52°: close-hauled, blended from the beat VMG at the beat angle up to the 52° speed
//! - 52°..150°: bilinear interpolation over the measured table
//! - Wind speeds outside the table extrapolate from the nearest breakpoint pair
//!
//! Pure and deterministic. Safe to call every tick and from analytics code.

use thiserror::Error;

/// TWA below which no boat can sail
pub const NO_GO_ANGLE_DEG: f64 = 30.0;

/// First angle breakpoint of every table
pub const TABLE_MIN_ANGLE_DEG: f64 = 52.0;

const WIND_SPEEDS: [f64; 9] = [4.0, 6.0, 8.0, 10.0, 12.0, 14.0, 16.0, 20.0, 24.0];
const ANGLES: [f64; 8] = [52.0, 60.0, 75.0, 90.0, 110.0, 120.0, 135.0, 150.0];

// [wind_speed_index][angle_index], knots
const SPEED_TABLE: [[f64; 8]; 9] = [
    [3.73, 3.94, 4.06, 3.99, 4.02, 3.85, 3.37, 2.78],   // 4 kt
    [5.05, 5.30, 5.45, 5.47, 5.53, 5.34, 4.77, 4.03],   // 6 kt
    [6.01, 6.25, 6.41, 6.55, 6.64, 6.49, 5.96, 5.18],   // 8 kt
    [6.62, 6.79, 6.93, 7.13, 7.23, 7.14, 6.81, 6.16],   // 10 kt
    [6.94, 7.10, 7.24, 7.47, 7.65, 7.58, 7.33, 6.89],   // 12 kt
    [7.08, 7.27, 7.48, 7.67, 8.04, 7.99, 7.76, 7.35],   // 14 kt
    [7.16, 7.35, 7.65, 7.82, 8.39, 8.41, 8.21, 7.76],   // 16 kt
    [7.24, 7.46, 7.84, 8.19, 8.89, 9.34, 9.24, 8.64],   // 20 kt
    [7.26, 7.49, 7.95, 8.44, 9.30, 10.14, 10.85, 9.90], // 24 kt
];

const BEAT_VMG: [f64; 9] = [2.40, 3.33, 4.09, 4.63, 4.96, 5.10, 5.17, 5.24, 5.20];
const BEAT_ANGLES: [f64; 9] = [42.7, 42.7, 40.4, 38.9, 37.5, 36.9, 36.6, 36.6, 37.2];

#[derive(Debug, Error, PartialEq)]
pub enum PolarError {
    #[error("polar table needs at least two {0} breakpoints")]
    TooFewBreakpoints(&'static str),
    #[error("{0} breakpoints must be strictly increasing")]
    NotIncreasing(&'static str),
    #[error("angle breakpoints must start at {TABLE_MIN_ANGLE_DEG}°, got {0}°")]
    BadFirstAngle(f64),
    #[error("beat angle {0}° outside [{NO_GO_ANGLE_DEG}°, {TABLE_MIN_ANGLE_DEG}°)")]
    BadBeatAngle(f64),
    #[error("{what} has {got} entries, expected {expected}")]
    ShapeMismatch { what: &'static str, got: usize, expected: usize },
}

/// Immutable polar table. Built once, read-only thereafter.
#[derive(Debug, Clone)]
pub struct PolarTable {
    wind_speeds: Vec<f64>,
    angles: Vec<f64>,
    speeds: Vec<Vec<f64>>,
    beat_angles: Vec<f64>,
    beat_vmg: Vec<f64>,
}

impl Default for PolarTable {
    fn default() -> Self {
        Self {
            wind_speeds: WIND_SPEEDS.to_vec(),
            angles: ANGLES.to_vec(),
            speeds: SPEED_TABLE.iter().map(|row| row.to_vec()).collect(),
            beat_angles: BEAT_ANGLES.to_vec(),
            beat_vmg: BEAT_VMG.to_vec(),
        }
    }
}

impl PolarTable {
    /// Build a custom table. `speeds[i][j]` is the speed at `wind_speeds[i]`, `angles[j]`.
    pub fn new(
        wind_speeds: Vec<f64>,
        angles: Vec<f64>,
        speeds: Vec<Vec<f64>>,
        beat_angles: Vec<f64>,
        beat_vmg: Vec<f64>,
    ) -> Result<Self, PolarError> {
        check_breakpoints("wind speed", &wind_speeds)?;
        check_breakpoints("angle", &angles)?;
        if angles[0] != TABLE_MIN_ANGLE_DEG {
            return Err(PolarError::BadFirstAngle(angles[0]));
        }
        check_len("speed table rows", speeds.len(), wind_speeds.len())?;
        for row in &speeds {
            check_len("speed table row", row.len(), angles.len())?;
        }
        check_len("beat angles", beat_angles.len(), wind_speeds.len())?;
        check_len("beat VMG", beat_vmg.len(), wind_speeds.len())?;
        if let Some(&bad) = beat_angles.iter().find(|a| !(NO_GO_ANGLE_DEG..TABLE_MIN_ANGLE_DEG).contains(*a)) {
            return Err(PolarError::BadBeatAngle(bad));
        }

        Ok(Self { wind_speeds, angles, speeds, beat_angles, beat_vmg })
    }

    /// Target boat speed (knots, ≥ 0) for a signed TWA (degrees) and TWS (knots).
    pub fn boat_speed(&self, twa_deg: f64, tws_knots: f64) -> f64 {
        if !twa_deg.is_finite() || !tws_knots.is_finite() {
            return 0.0;
        }
        let abs_twa = abs_twa(twa_deg);

        if abs_twa < NO_GO_ANGLE_DEG {
            return 0.0;
        }

        let speed = if abs_twa < TABLE_MIN_ANGLE_DEG {
            let beat_angle = self.beat_angle(tws_knots);
            if abs_twa < beat_angle {
                return 0.0;
            }
            let vmg = self.beat_vmg(tws_knots);
            let speed_52 = self.speed_at_angle(TABLE_MIN_ANGLE_DEG, tws_knots);
            let factor = (abs_twa - beat_angle) / (TABLE_MIN_ANGLE_DEG - beat_angle);
            vmg + (speed_52 - vmg) * factor
        } else {
            self.speed_at_angle(abs_twa, tws_knots)
        };

        speed.max(0.0)
    }

    /// Closest sailable TWA for this wind speed
    pub fn beat_angle(&self, tws_knots: f64) -> f64 {
        let i = self.wind_index(tws_knots);
        self.lerp_wind(tws_knots, &self.beat_angles, i)
    }

    pub fn beat_vmg(&self, tws_knots: f64) -> f64 {
        let i = self.wind_index(tws_knots);
        self.lerp_wind(tws_knots, &self.beat_vmg, i)
    }

    pub fn wind_speeds(&self) -> &[f64] { &self.wind_speeds }

    pub fn angles(&self) -> &[f64] { &self.angles }

    /// Lower index of the bracketing wind-speed pair, clamped so `i + 1` is valid.
    fn wind_index(&self, tws: f64) -> usize {
        bracket(&self.wind_speeds, tws)
    }

    fn lerp_wind(&self, tws: f64, values: &[f64], i: usize) -> f64 {
        let (w1, w2) = (self.wind_speeds[i], self.wind_speeds[i + 1]);
        lerp(values[i], values[i + 1], (tws - w1) / (w2 - w1))
    }

    fn speed_at_angle(&self, twa: f64, tws: f64) -> f64 {
        let wi = self.wind_index(tws);
        let ai = bracket(&self.angles, twa);

        let (a1, a2) = (self.angles[ai], self.angles[ai + 1]);
        let t_angle = (twa - a1) / (a2 - a1);
        let s1 = lerp(self.speeds[wi][ai], self.speeds[wi][ai + 1], t_angle);
        let s2 = lerp(self.speeds[wi + 1][ai], self.speeds[wi + 1][ai + 1], t_angle);

        let (w1, w2) = (self.wind_speeds[wi], self.wind_speeds[wi + 1]);
        lerp(s1, s2, (tws - w1) / (w2 - w1))
    }
}

/// |TWA| folded into [0, 180]
pub fn abs_twa(twa_deg: f64) -> f64 {
    let a = twa_deg.abs() % 360.0;
    if a > 180.0 { 360.0 - a } else { a }
}

fn bracket(breakpoints: &[f64], x: f64) -> usize {
    let last = breakpoints.len() - 2;
    (0..=last).find(|&i| x <= breakpoints[i + 1]).unwrap_or(last)
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn check_breakpoints(what: &'static str, values: &[f64]) -> Result<(), PolarError> {
    if values.len() < 2 {
        return Err(PolarError::TooFewBreakpoints(what));
    }
    if values.windows(2).any(|w| !(w[1] > w[0])) {
        return Err(PolarError::NotIncreasing(what));
    }
    Ok(())
}

fn check_len(what: &'static str, got: usize, expected: usize) -> Result<(), PolarError> {
    if got == expected {
        Ok(())
    } else {
        Err(PolarError::ShapeMismatch { what, got, expected })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn matches_table_at_breakpoints() {
        let polar = PolarTable::default();
        assert_abs_diff_eq!(polar.boat_speed(90.0, 10.0), 7.13, epsilon = 1e-9);
        assert_abs_diff_eq!(polar.boat_speed(52.0, 10.0), 6.62, epsilon = 1e-9);
        assert_abs_diff_eq!(polar.boat_speed(150.0, 24.0), 9.90, epsilon = 1e-9);
        assert_abs_diff_eq!(polar.boat_speed(120.0, 4.0), 3.85, epsilon = 1e-9);
    }

    #[test]
    fn bilinear_between_breakpoints() {
        let polar = PolarTable::default();
        // halfway between the 8 kt and 10 kt rows
        assert_abs_diff_eq!(polar.boat_speed(90.0, 9.0), (6.55 + 7.13) / 2.0, epsilon = 1e-9);
        // halfway between 90° and 110° on the 10 kt row
        assert_abs_diff_eq!(polar.boat_speed(100.0, 10.0), (7.13 + 7.23) / 2.0, epsilon = 1e-9);
    }

    #[test]
    fn no_go_zone_is_zero() {
        let polar = PolarTable::default();
        for twa in [0.0, 10.0, 29.9, -29.9, 35.0, 38.8] {
            assert_eq!(polar.boat_speed(twa, 10.0), 0.0, "twa={twa}");
        }
    }

    #[test]
    fn close_hauled_blends_from_beat_vmg_to_52() {
        let polar = PolarTable::default();
        assert_abs_diff_eq!(polar.beat_angle(10.0), 38.9, epsilon = 1e-9);
        let beat = polar.beat_angle(10.0);
        assert_abs_diff_eq!(polar.boat_speed(beat, 10.0), 4.63, epsilon = 1e-9);

        let mid = (38.9 + 52.0) / 2.0;
        assert_abs_diff_eq!(polar.boat_speed(mid, 10.0), (4.63 + 6.62) / 2.0, epsilon = 1e-9);

        // continuous across the 52° seam
        assert_abs_diff_eq!(polar.boat_speed(51.9999, 10.0), 6.62, epsilon = 1e-3);
    }

    #[test]
    fn symmetric_in_twa_sign() {
        let polar = PolarTable::default();
        for tws in [3.0, 7.5, 10.0, 17.0, 26.0] {
            for twa in (0..=180).map(f64::from) {
                assert_eq!(polar.boat_speed(twa, tws), polar.boat_speed(-twa, tws));
            }
        }
    }

    #[test]
    fn rises_then_falls_across_table() {
        let polar = PolarTable::default();
        let at = |twa: f64| polar.boat_speed(twa, 10.0);
        let rising = [52.0, 60.0, 75.0, 90.0, 110.0];
        for w in rising.windows(2) {
            assert!(at(w[1]) > at(w[0]), "{}° should beat {}°", w[1], w[0]);
        }
        let falling = [110.0, 120.0, 135.0, 150.0];
        for w in falling.windows(2) {
            assert!(at(w[1]) < at(w[0]), "{}° should trail {}°", w[1], w[0]);
        }
    }

    #[test]
    fn wind_outside_table_extrapolates() {
        let polar = PolarTable::default();
        assert_abs_diff_eq!(polar.boat_speed(90.0, 30.0), 8.19 + (8.44 - 8.19) * 2.5, epsilon = 1e-9);
        assert_abs_diff_eq!(polar.boat_speed(90.0, 2.0), 3.99 - (5.47 - 3.99), epsilon = 1e-9);
        assert!(polar.boat_speed(90.0, -50.0) >= 0.0);
    }

    #[test]
    fn deep_downwind_uses_last_angle_pair() {
        let polar = PolarTable::default();
        assert_abs_diff_eq!(polar.boat_speed(180.0, 10.0), 6.81 + (6.16 - 6.81) * 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(polar.boat_speed(-170.0, 10.0), polar.boat_speed(170.0, 10.0), epsilon = 1e-12);
        // keeps falling past 150°, never back up to close-reach speeds
        assert_abs_diff_eq!(polar.boat_speed(170.0, 10.0), 6.81 + (6.16 - 6.81) * 35.0 / 15.0, epsilon = 1e-9);
        let run = [150.0, 160.0, 170.0, 180.0].map(|twa| polar.boat_speed(twa, 10.0));
        assert!(run.windows(2).all(|w| w[1] < w[0]), "{run:?}");
        assert!(polar.boat_speed(170.0, 10.0) < polar.boat_speed(52.0, 10.0));
    }

    #[test]
    fn non_finite_input_is_zero() {
        let polar = PolarTable::default();
        assert_eq!(polar.boat_speed(f64::NAN, 10.0), 0.0);
        assert_eq!(polar.boat_speed(90.0, f64::INFINITY), 0.0);
    }

    #[test]
    fn abs_twa_folds_wraparound() {
        assert_eq!(abs_twa(-45.0), 45.0);
        assert_eq!(abs_twa(200.0), 160.0);
        assert_eq!(abs_twa(-350.0), 10.0);
        assert_eq!(abs_twa(540.0), 180.0);
    }

    #[test]
    fn rejects_malformed_tables() {
        let rows = vec![vec![1.0, 2.0], vec![2.0, 3.0]];
        assert_eq!(
            PolarTable::new(vec![6.0, 4.0], vec![52.0, 90.0], rows.clone(), vec![40.0; 2], vec![2.0; 2])
                .unwrap_err(),
            PolarError::NotIncreasing("wind speed")
        );
        assert_eq!(
            PolarTable::new(vec![4.0, 6.0], vec![45.0, 90.0], rows.clone(), vec![40.0; 2], vec![2.0; 2])
                .unwrap_err(),
            PolarError::BadFirstAngle(45.0)
        );
        assert!(matches!(
            PolarTable::new(vec![4.0, 6.0], vec![52.0, 90.0], rows.clone(), vec![40.0; 3], vec![2.0; 2]),
            Err(PolarError::ShapeMismatch { .. })
        ));
        assert_eq!(
            PolarTable::new(vec![4.0, 6.0], vec![52.0, 90.0], rows.clone(), vec![40.0, 55.0], vec![2.0; 2])
                .unwrap_err(),
            PolarError::BadBeatAngle(55.0)
        );
        assert!(PolarTable::new(vec![4.0, 6.0], vec![52.0, 90.0], rows, vec![40.0; 2], vec![2.0; 2]).is_ok());
    }
}
