//! # regatta-types
//!
//! Shared race-simulation structures for the Regatta Suite single-boat simulator.
//!
//! These types are used by:
//! - `regatta-sim`: produced by the tick loop, consumed by its commands
//! - control-panel clients: telemetry frames and control commands over the WebSocket
//! - result stores: the finalized [`RaceResult`] record
//!
//! ## Coordinate Conventions
//!
//! - **World frame**: meters, X = east, Y = south (screen-down). North / upwind is −Y.
//! - **Angles**: degrees, 0 = North, clockwise. Wind direction is where the wind blows *from*.
//! - **TWA**: heading − wind direction, normalized to (−180, 180].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Angles ────────────────────────────────────────────────────────────────────

/// Normalize a compass angle to [0, 360).
pub fn normalize_heading(deg: f64) -> f64 {
    let d = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if d >= 360.0 { 0.0 } else { d }
}

/// Normalize a relative angle to (−180, 180].
pub fn signed_angle(deg: f64) -> f64 {
    let d = normalize_heading(deg);
    if d > 180.0 { d - 360.0 } else { d }
}

// ── 2D Point ──────────────────────────────────────────────────────────────────

/// Position in the world frame (meters)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self { Self { x, y } }

    pub fn dist(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Point `distance` meters away along compass `heading_deg`.
    pub fn project(&self, heading_deg: f64, distance: f64) -> Point {
        let h = heading_deg.to_radians();
        Point::new(self.x + distance * h.sin(), self.y - distance * h.cos())
    }

    /// Compass bearing from `self` to `other`, [0, 360).
    pub fn bearing_to(&self, other: &Point) -> f64 {
        let dx = other.x - self.x;
        let dy = self.y - other.y; // north is −Y
        normalize_heading(dx.atan2(dy).to_degrees())
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

// ── Wind ──────────────────────────────────────────────────────────────────────

/// Wind at one place and time. Produced fresh per query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindSample {
    /// Direction the wind blows from, [0, 360)
    pub direction_deg: f64,
    pub speed_knots: f64,
}

impl WindSample {
    pub fn new(direction_deg: f64, speed_knots: f64) -> Self {
        Self { direction_deg, speed_knots }
    }

    /// True wind angle for a boat on `heading_deg`, (−180, 180].
    pub fn twa(&self, heading_deg: f64) -> f64 {
        signed_angle(heading_deg - self.direction_deg)
    }
}

// ── Course ────────────────────────────────────────────────────────────────────

/// Fixed race course: a horizontal start/finish line between the pin and the
/// committee boat, plus an optional upwind mark to be left to port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Course {
    /// Start line port end (pin mark)
    pub pin: Point,
    /// Start line starboard end (committee boat)
    pub committee: Point,
    /// Windward mark. Some practice layouts leave it out.
    #[serde(alias = "upwind_mark")]
    pub upwind_mark: Option<Point>,
}

impl Default for Course {
    fn default() -> Self {
        Self {
            pin: Point::new(800.0, 2400.0),
            committee: Point::new(1200.0, 2400.0),
            upwind_mark: Some(Point::new(1000.0, 1780.0)),
        }
    }
}

impl Course {
    /// Y coordinate of the start/finish line
    pub fn line_y(&self) -> f64 {
        (self.pin.y + self.committee.y) / 2.0
    }

    /// Midpoint of the start/finish line
    pub fn line_center(&self) -> Point {
        Point::new((self.pin.x + self.committee.x) / 2.0, self.line_y())
    }

    /// True when `p` lies horizontally between the pin and the committee boat (inclusive).
    pub fn within_line_bounds(&self, p: Point) -> bool {
        let min_x = self.pin.x.min(self.committee.x);
        let max_x = self.pin.x.max(self.committee.x);
        p.x >= min_x && p.x <= max_x
    }

    /// Perpendicular distance from `p` to the infinite start line.
    /// Negative on the course side (north of the line).
    pub fn signed_distance_to_line(&self, p: Point) -> f64 {
        let (s, e) = (self.pin, self.committee);
        let a = e.y - s.y;
        let b = s.x - e.x;
        let c = e.x * s.y - s.x * e.y;
        let norm = (a * a + b * b).sqrt();
        if norm == 0.0 {
            return p.y - s.y;
        }
        -(a * p.x + b * p.y + c) / norm
    }
}

// ── Race Phase ────────────────────────────────────────────────────────────────

/// Coarse race progress, derived from the rule flags for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RacePhase {
    PreStart,
    Ocs,
    Started,
    LineCrossed,
    Rounding,
    MarkRounded,
    Finished,
}

// ── Control Commands (collaborator → simulation) ─────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnDirection {
    /// Counter-clockwise (heading decreases)
    Port,
    /// Clockwise (heading increases)
    Starboard,
}

/// Commands from input/UI collaborators.
/// JSON: `{ "cmd": "jump_timer", "args": { "seconds": 10 } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "args", rename_all = "snake_case")]
pub enum ControlCommand {
    SetHeadingDelta { degrees: f64 },
    Steer { direction: TurnDirection },
    Pause,
    Resume,
    TogglePause,
    Restart,
    JumpTimer { seconds: f64 },
    ToggleDebugOverride,
}

// ── Telemetry (simulation → collaborators) ───────────────────────────────────

/// Snapshot of everything a renderer or dashboard needs between ticks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Telemetry {
    pub tick: u64,
    pub paused: bool,
    pub debug_override: bool,
    pub phase: RacePhase,
    pub position: Point,
    pub bow: Point,
    pub heading_deg: f64,
    pub speed_knots: f64,
    pub wind: WindSample,
    pub twa_deg: f64,
    pub vmg_knots: f64,
    pub best_vmg_knots: f64,
    pub distance_to_line_m: f64,
    /// Seconds until the gun; 0 once started
    pub time_to_start_s: f64,
    pub race_time_s: f64,
    pub is_ocs: bool,
    pub race_started: bool,
    pub has_crossed_line: bool,
    pub mark_rounded: bool,
    pub race_finished: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_late: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_time_s: Option<f64>,
}

// ── Race Result (simulation → result stores) ─────────────────────────────────

/// Finalized record, produced once when the boat finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceResult {
    pub player_name: String,
    pub race_time_seconds: f64,
    pub seconds_late: f64,
    pub speed_percentage: f64,
    pub mark_rounded: bool,
    /// Meters sailed between the gun and the finish
    pub distance_sailed: f64,
    /// Knots
    pub average_speed: f64,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn signed_angle_range() {
        assert_eq!(signed_angle(180.0), 180.0);
        assert_eq!(signed_angle(-180.0), 180.0);
        assert_eq!(signed_angle(190.0), -170.0);
        assert_eq!(signed_angle(-190.0), 170.0);
        assert_eq!(signed_angle(720.0), 0.0);
        assert_eq!(normalize_heading(-90.0), 270.0);
    }

    #[test]
    fn project_and_bearing_use_compass_frame() {
        let p = Point::new(100.0, 100.0);
        let north = p.project(0.0, 10.0);
        assert_abs_diff_eq!(north.y, 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(north.x, 100.0, epsilon = 1e-9);

        let east = p.project(90.0, 10.0);
        assert_abs_diff_eq!(east.x, 110.0, epsilon = 1e-9);

        assert_abs_diff_eq!(p.bearing_to(&east), 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.bearing_to(&Point::new(100.0, 200.0)), 180.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.bearing_to(&Point::new(0.0, 100.0)), 270.0, epsilon = 1e-9);
    }

    #[test]
    fn line_bounds_are_inclusive() {
        let course = Course::default();
        let cases = [
            (1000.0, true),
            (810.0, true),
            (1190.0, true),
            (700.0, false),
            (1300.0, false),
            (800.0, true),
            (1200.0, true),
        ];
        for (x, expected) in cases {
            assert_eq!(course.within_line_bounds(Point::new(x, 2400.0)), expected, "x={x}");
        }
    }

    #[test]
    fn distance_to_line_is_negative_on_course_side() {
        let course = Course::default();
        assert_abs_diff_eq!(course.signed_distance_to_line(Point::new(1000.0, 2300.0)), -100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(course.signed_distance_to_line(Point::new(1000.0, 2450.0)), 50.0, epsilon = 1e-9);
    }

    #[test]
    fn twa_is_relative_to_wind() {
        let wind = WindSample::new(350.0, 10.0);
        assert_abs_diff_eq!(wind.twa(40.0), 50.0, epsilon = 1e-9);
        assert_abs_diff_eq!(wind.twa(300.0), -50.0, epsilon = 1e-9);
    }

    #[test]
    fn command_wire_format() {
        let cmd: ControlCommand =
            serde_json::from_str(r#"{"cmd":"jump_timer","args":{"seconds":10.0}}"#).unwrap();
        assert_eq!(cmd, ControlCommand::JumpTimer { seconds: 10.0 });

        let cmd: ControlCommand = serde_json::from_str(r#"{"cmd":"pause"}"#).unwrap();
        assert_eq!(cmd, ControlCommand::Pause);

        let cmd: ControlCommand =
            serde_json::from_str(r#"{"cmd":"steer","args":{"direction":"port"}}"#).unwrap();
        assert_eq!(cmd, ControlCommand::Steer { direction: TurnDirection::Port });
    }

    #[test]
    fn result_uses_snake_case_fields() {
        let result = RaceResult {
            player_name: "Ada".into(),
            race_time_seconds: 95.5,
            seconds_late: 1.25,
            speed_percentage: 88.0,
            mark_rounded: true,
            distance_sailed: 1450.0,
            average_speed: 3.0,
            timestamp: Utc::now(),
        };
        let v = serde_json::to_value(&result).unwrap();
        assert_eq!(v["player_name"], "Ada");
        assert_eq!(v["race_time_seconds"], 95.5);
        assert_eq!(v["mark_rounded"], true);
    }

    #[test]
    fn course_accepts_partial_input() {
        let course: Course = serde_json::from_str(r#"{"upwind_mark":{"x":1000.0,"y":1500.0}}"#).unwrap();
        assert_eq!(course.pin, Point::new(800.0, 2400.0));
        assert_eq!(course.upwind_mark, Some(Point::new(1000.0, 1500.0)));

        let course: Course = serde_json::from_str(r#"{"upwindMark":null}"#).unwrap();
        assert_eq!(course.upwind_mark, None);
    }
}
