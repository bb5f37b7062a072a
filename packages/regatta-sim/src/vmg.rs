//! vmg.rs — Velocity-made-good analytics
//!
//! Read-only numbers derived from the boat and the wind it sees:
//! - current VMG and the best VMG achievable on the current point of sail
//! - the TWA that achieves it (1° brute-force scan over the polar)
//! - VMG efficiency and the jib telltale deflection that visualizes it
//!
//! Nothing here is cached; every call rescans the polar.

use regatta_types::{Course, Point, WindSample};
use serde::Serialize;

use crate::polar::{abs_twa, PolarTable};

/// Efficiency is clamped to this before mapping to a deflection
const MAX_EFFICIENCY: f64 = 1.2;
/// Within this many degrees of the optimal TWA the telltale barely moves
const NEAR_OPTIMAL_DEG: f64 = 2.0;
const FALLBACK_UPWIND_TWA: f64 = 45.0;
const FALLBACK_DOWNWIND_TWA: f64 = 150.0;

/// VMG toward (positive) or away from (negative) the wind
pub fn current_vmg(speed_knots: f64, twa_deg: f64) -> f64 {
    speed_knots * twa_deg.to_radians().cos()
}

fn polar_vmg(polar: &PolarTable, angle: f64, tws: f64) -> f64 {
    polar.boat_speed(angle, tws) * angle.to_radians().cos()
}

/// Best VMG on the current point of sail. Upwind (|twa| ≤ 90) scans 30..=90°
/// for the maximum; downwind scans 90..=180° for the minimum.
pub fn best_vmg(polar: &PolarTable, twa_deg: f64, tws_knots: f64) -> f64 {
    if abs_twa(twa_deg) <= 90.0 {
        (30..=90)
            .map(|a| polar_vmg(polar, a as f64, tws_knots))
            .fold(0.0, f64::max)
    } else {
        (90..=180)
            .map(|a| polar_vmg(polar, a as f64, tws_knots))
            .fold(0.0, f64::min)
    }
}

/// TWA giving the best VMG: 30..=60° upwind, 120..=170° downwind.
/// Falls back to 45° / 150° when nothing beats zero VMG.
pub fn optimal_twa(polar: &PolarTable, twa_deg: f64, tws_knots: f64) -> f64 {
    if abs_twa(twa_deg) <= 90.0 {
        let mut best = (FALLBACK_UPWIND_TWA, 0.0);
        for a in 30..=60 {
            let vmg = polar_vmg(polar, a as f64, tws_knots);
            if vmg > best.1 {
                best = (a as f64, vmg);
            }
        }
        best.0
    } else {
        let mut best = (FALLBACK_DOWNWIND_TWA, 0.0);
        for a in 120..=170 {
            let vmg = polar_vmg(polar, a as f64, tws_knots);
            if vmg < best.1 {
                best = (a as f64, vmg);
            }
        }
        best.0
    }
}

/// Current VMG as a fraction of the best; 0 when the best is ~0.
pub fn vmg_efficiency(current: f64, best: f64) -> f64 {
    if best.abs() > 1e-3 { current / best } else { 0.0 }
}

/// Jib telltale angle in degrees: 0 = streaming, positive = drooping (footing),
/// negative = lifting (pinching).
pub fn telltale_deflection(abs_twa_deg: f64, optimal_twa_deg: f64, efficiency: f64) -> f64 {
    let eff = if efficiency.is_finite() { efficiency.clamp(0.0, MAX_EFFICIENCY) } else { 0.0 };

    let magnitude = if eff >= 0.95 {
        0.0
    } else if eff >= 0.75 {
        45.0 * (0.95 - eff) / 0.20
    } else if eff >= 0.50 {
        45.0 + 30.0 * (0.75 - eff) / 0.25
    } else {
        85.0 - 10.0 * eff / 0.50
    };

    let diff = abs_twa_deg - optimal_twa_deg;
    if diff.abs() < NEAR_OPTIMAL_DEG {
        let sign = if diff < 0.0 { -1.0 } else { 1.0 };
        magnitude * 0.2 * sign
    } else if diff < 0.0 {
        -magnitude
    } else {
        magnitude * 0.7
    }
}

// ── Snapshot ──────────────────────────────────────────────────────────────────

/// Everything a dashboard shows about how well the boat is sailing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    pub twa_deg: f64,
    pub tws_knots: f64,
    pub speed_knots: f64,
    pub target_speed_knots: f64,
    pub vmg_knots: f64,
    pub best_vmg_knots: f64,
    pub optimal_twa_deg: f64,
    pub efficiency: f64,
    pub telltale_deg: f64,
    pub distance_to_line_m: f64,
}

impl Performance {
    pub fn compute(
        polar: &PolarTable,
        course: &Course,
        bow: Point,
        heading_deg: f64,
        speed_knots: f64,
        wind: &WindSample,
    ) -> Self {
        let twa = wind.twa(heading_deg);
        let tws = wind.speed_knots;
        let vmg = current_vmg(speed_knots, twa);
        let best = best_vmg(polar, twa, tws);
        let optimal = optimal_twa(polar, twa, tws);
        let efficiency = vmg_efficiency(vmg, best);
        Self {
            twa_deg: twa,
            tws_knots: tws,
            speed_knots,
            target_speed_knots: polar.boat_speed(twa, tws),
            vmg_knots: vmg,
            best_vmg_knots: best,
            optimal_twa_deg: optimal,
            efficiency,
            telltale_deg: telltale_deflection(abs_twa(twa), optimal, efficiency),
            distance_to_line_m: course.signed_distance_to_line(bow),
        }
    }
}
