//! race_rules.rs — Race progress state machine
//!
//! PRESTART → (OCS ⇄ CLEAR) → STARTED → LINE_CROSSED → ROUNDING(1→2→3) → MARK_ROUNDED → FINISHED
//!
//! Driven by one bow position per tick. Crossings compare the previous and the
//! current bow sample, so a bow that jumps the line between two samples still
//! has to straddle it to count. Every update returns the transitions it made.
//!
//! North (upwind, course side) is −Y.

use regatta_types::{Course, Point, RacePhase, WindSample};
use serde::Serialize;
use tracing::info;

use crate::polar::PolarTable;
use crate::vmg::current_vmg;

/// Hysteresis band around the upwind mark, meters
const MARK_HYSTERESIS_M: f64 = 1.0;
/// Reference TWA for the crossing speed percentage
const BEAT_REFERENCE_TWA: f64 = 45.0;

// ── State ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceState {
    pub race_started: bool,
    pub is_ocs: bool,
    pub has_crossed_line: bool,
    /// Elapsed seconds (since timer start) at the crossing
    pub line_crossing_time: Option<f64>,
    pub seconds_late: Option<f64>,
    pub vmg_at_crossing: Option<f64>,
    pub speed_percentage: Option<f64>,
    pub mark_rounding_phase1: bool,
    pub mark_rounding_phase2: bool,
    pub mark_rounding_phase3: bool,
    pub mark_rounded: bool,
    pub race_finished: bool,
    /// Race time (since the gun) at the finish
    pub finish_time: Option<f64>,
    pub prev_bow_position: Point,
}

impl RaceState {
    pub fn phase(&self) -> RacePhase {
        if self.race_finished {
            RacePhase::Finished
        } else if self.mark_rounded {
            RacePhase::MarkRounded
        } else if self.mark_rounding_phase1 {
            RacePhase::Rounding
        } else if self.has_crossed_line {
            RacePhase::LineCrossed
        } else if self.is_ocs {
            RacePhase::Ocs
        } else if self.race_started {
            RacePhase::Started
        } else {
            RacePhase::PreStart
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RaceEvent {
    Gun,
    OcsRaised,
    OcsCleared,
    LineCrossed { seconds_late: f64, speed_percentage: f64 },
    RoundingPhase { phase: u8 },
    RoundingReset,
    MarkRounded,
    Finished { race_time: f64 },
}

/// Everything the rules need to know about one tick
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    pub bow: Point,
    /// Seconds since the countdown began
    pub elapsed_s: f64,
    pub timer_duration_s: f64,
    /// Seconds since the gun
    pub race_time_s: f64,
    pub speed_knots: f64,
    pub heading_deg: f64,
    /// Wind at the hull center
    pub wind: WindSample,
    pub polar: &'a PolarTable,
}

// ── Rules ─────────────────────────────────────────────────────────────────────

pub struct RaceRules {
    course: Course,
    state: RaceState,
}

impl RaceRules {
    /// `initial_bow` seeds the previous-sample position for crossing detection.
    pub fn new(course: Course, initial_bow: Point) -> Self {
        Self {
            course,
            state: RaceState { prev_bow_position: initial_bow, ..Default::default() },
        }
    }

    pub fn state(&self) -> &RaceState { &self.state }

    pub fn course(&self) -> &Course { &self.course }

    /// Start the race once the countdown has run out. Returns true on the tick it fires.
    pub fn check_gun(&mut self, elapsed_s: f64, timer_duration_s: f64) -> bool {
        if self.state.race_started || elapsed_s < timer_duration_s {
            return false;
        }
        self.state.race_started = true;
        info!("🔫 Gun at {:.2}s", elapsed_s);
        true
    }

    /// Consume the new bow position.
    pub fn update(&mut self, obs: &Observation) -> Vec<RaceEvent> {
        let mut events = Vec::new();
        if self.state.race_finished {
            return events;
        }

        let bow = obs.bow;
        let line_y = self.course.line_y();
        let within = self.course.within_line_bounds(bow);

        if !self.state.race_started && bow.y <= line_y && within && !self.state.is_ocs {
            self.state.is_ocs = true;
            info!("⚠️  OCS at x={:.1}", bow.x);
            events.push(RaceEvent::OcsRaised);
        }
        if self.state.is_ocs && bow.y > line_y && within {
            self.state.is_ocs = false;
            info!("✅ OCS cleared");
            events.push(RaceEvent::OcsCleared);
        }

        if self.state.race_started {
            if !self.state.has_crossed_line && !self.state.is_ocs {
                self.check_line_crossing(obs, &mut events);
            }
            if self.state.has_crossed_line {
                self.update_mark_rounding(bow, &mut events);
            }
            if self.state.has_crossed_line && self.state.mark_rounded {
                self.check_finish(obs, &mut events);
            }
        }

        self.state.prev_bow_position = bow;
        events
    }

    fn check_line_crossing(&mut self, obs: &Observation, events: &mut Vec<RaceEvent>) {
        let line_y = self.course.line_y();
        let prev = self.state.prev_bow_position;
        if !(prev.y > line_y && obs.bow.y <= line_y && self.course.within_line_bounds(obs.bow)) {
            return;
        }

        let seconds_late = obs.elapsed_s - obs.timer_duration_s;
        let twa = obs.wind.twa(obs.heading_deg);
        let beat_speed = obs.polar.boat_speed(BEAT_REFERENCE_TWA, obs.wind.speed_knots);
        let speed_percentage = if beat_speed > 0.0 { obs.speed_knots / beat_speed * 100.0 } else { 0.0 };

        let s = &mut self.state;
        s.has_crossed_line = true;
        s.line_crossing_time = Some(obs.elapsed_s);
        s.seconds_late = Some(seconds_late);
        s.vmg_at_crossing = Some(current_vmg(obs.speed_knots, twa));
        s.speed_percentage = Some(speed_percentage);

        info!("🏁 Start: {:.2}s late at {:.0}% of target", seconds_late, speed_percentage);
        events.push(RaceEvent::LineCrossed { seconds_late, speed_percentage });
    }

    /// Leave the mark to port: pass north of it, cross to its west while
    /// still north, then come back south of it.
    fn update_mark_rounding(&mut self, bow: Point, events: &mut Vec<RaceEvent>) {
        let Some(mark) = self.course.upwind_mark else { return };
        let s = &mut self.state;

        if !s.mark_rounding_phase1 && bow.y <= mark.y - MARK_HYSTERESIS_M {
            s.mark_rounding_phase1 = true;
            events.push(RaceEvent::RoundingPhase { phase: 1 });
        }

        if s.mark_rounding_phase1 && !s.mark_rounding_phase2
            && bow.y < mark.y && bow.x <= mark.x - MARK_HYSTERESIS_M
        {
            s.mark_rounding_phase2 = true;
            events.push(RaceEvent::RoundingPhase { phase: 2 });
        }
        if s.mark_rounding_phase2 && !s.mark_rounding_phase3 && bow.y < mark.y && bow.x > mark.x {
            // back east of the mark before going round it
            s.mark_rounding_phase2 = false;
            events.push(RaceEvent::RoundingReset);
        }

        if s.mark_rounding_phase1 && s.mark_rounding_phase2 && !s.mark_rounding_phase3
            && bow.y >= mark.y + MARK_HYSTERESIS_M
        {
            s.mark_rounding_phase3 = true;
            s.mark_rounded = true;
            info!("🔄 Mark rounded");
            events.push(RaceEvent::RoundingPhase { phase: 3 });
            events.push(RaceEvent::MarkRounded);
        }
    }

    fn check_finish(&mut self, obs: &Observation, events: &mut Vec<RaceEvent>) {
        let line_y = self.course.line_y();
        let prev = self.state.prev_bow_position;
        if prev.y < line_y && obs.bow.y >= line_y && self.course.within_line_bounds(obs.bow) {
            self.state.race_finished = true;
            self.state.finish_time = Some(obs.race_time_s);
            info!("🏆 Finished in {:.2}s", obs.race_time_s);
            events.push(RaceEvent::Finished { race_time: obs.race_time_s });
        }
    }
}
