//! simulation.rs — Single-boat race simulation
//!
//! Owns every piece of race state and runs the per-tick pipeline:
//!   heading input → countdown/gun → wind.advance → wind.sample → boat step → rules.update
//!
//! Time only moves inside `tick`, by the `dt` it is given. A paused
//! simulation ignores ticks and heading input, so the wind, the countdown
//! and the race clock all freeze together. Restart rebuilds everything from
//! the config with a fresh seed derived from the base seed.

use chrono::Utc;
use regatta_types::{ControlCommand, Course, Point, RaceResult, Telemetry, WindSample};
use tracing::{debug, info};

use crate::boat_sim::{self, BoatState};
use crate::config::{ConfigError, SimConfig};
use crate::helm::Helm;
use crate::polar::PolarTable;
use crate::race_rules::{Observation, RaceEvent, RaceRules, RaceState};
use crate::vmg::{best_vmg, current_vmg, Performance};
use crate::wind::WindField;

pub enum TickResult {
    /// Nothing moved
    Paused,
    /// Race transitions made this tick, in order
    Advanced(Vec<RaceEvent>),
}

pub struct Simulation {
    cfg: SimConfig,
    polar: PolarTable,
    wind: WindField,
    boat: BoatState,
    rules: RaceRules,
    helm: Helm,
    /// Seconds since the countdown began
    elapsed_s: f64,
    /// Seconds since the gun, frozen at the finish
    race_time_s: f64,
    paused: bool,
    debug_override: bool,
    /// Heading input queued by commands for the next tick
    pending_turn_deg: f64,
    distance_sailed: f64,
    restarts: u64,
    seed: u64,
    tick_count: u64,
    result: Option<RaceResult>,
}

impl Simulation {
    pub fn new(cfg: SimConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let polar = cfg.polar_table()?;
        let seed = cfg.simulation.seed;
        let mut sim = Self {
            wind: WindField::from_config(&cfg.wind, seed),
            boat: BoatState::new(Point::default(), 0.0),
            rules: RaceRules::new(cfg.course.clone(), Point::default()),
            helm: Helm::new(cfg.helm.clone()),
            elapsed_s: 0.0,
            race_time_s: 0.0,
            paused: cfg.simulation.start_paused,
            debug_override: false,
            pending_turn_deg: 0.0,
            distance_sailed: 0.0,
            restarts: 0,
            seed,
            tick_count: 0,
            result: None,
            polar,
            cfg,
        };
        sim.place_boat();
        Ok(sim)
    }

    fn place_boat(&mut self) {
        let start = self.cfg.start_position();
        let kin = &self.cfg.kinematics;
        let mut boat = BoatState::new(start, self.cfg.boat.start_heading_deg);
        if self.cfg.boat.start_at_full_speed {
            let wind = self.wind.sample(start);
            let target = self.polar.boat_speed(wind.twa(boat.heading_deg), wind.speed_knots);
            boat.set_speed(target, kin);
        }
        self.rules = RaceRules::new(self.cfg.course.clone(), boat.bow_position(kin));
        self.boat = boat;
    }

    /// Full reinitialization. Always leaves the simulation running.
    pub fn restart(&mut self) {
        self.restarts += 1;
        self.seed = self.cfg.simulation.seed.wrapping_add(self.restarts);
        self.wind = WindField::from_config(&self.cfg.wind, self.seed);
        self.helm.reset();
        self.elapsed_s = 0.0;
        self.race_time_s = 0.0;
        self.paused = false;
        self.debug_override = false;
        self.pending_turn_deg = 0.0;
        self.distance_sailed = 0.0;
        self.tick_count = 0;
        self.result = None;
        self.place_boat();
        info!("↺ Restart #{} (seed {})", self.restarts, self.seed);
    }

    // ── Tick ──────────────────────────────────────────────────────────────────

    /// Advance by `dt` seconds, turning by `heading_delta_deg` first.
    pub fn tick(&mut self, heading_delta_deg: f64, dt: f64) -> TickResult {
        if self.paused {
            return TickResult::Paused;
        }

        let turn = heading_delta_deg + std::mem::take(&mut self.pending_turn_deg);
        self.boat.turn(turn);

        if !(dt > 0.0) || !dt.is_finite() {
            return TickResult::Advanced(Vec::new());
        }
        self.tick_count += 1;
        self.elapsed_s += dt;
        self.wind.advance(self.elapsed_s);

        let mut events = Vec::new();
        if self.rules.check_gun(self.elapsed_s, self.cfg.race.timer_duration_s) {
            self.race_time_s = 0.0;
            events.push(RaceEvent::Gun);
        }
        let racing = self.rules.state().race_started && !self.rules.state().race_finished;
        if racing {
            self.race_time_s += dt;
        }

        let wind = self.wind.sample(self.boat.position);
        let moved = boat_sim::step(&mut self.boat, &wind, &self.polar, &self.cfg.kinematics, dt);
        if racing {
            self.distance_sailed += moved;
        }

        let obs = Observation {
            bow: self.boat.bow_position(&self.cfg.kinematics),
            elapsed_s: self.elapsed_s,
            timer_duration_s: self.cfg.race.timer_duration_s,
            race_time_s: self.race_time_s,
            speed_knots: self.boat.speed_knots,
            heading_deg: self.boat.heading_deg,
            wind,
            polar: &self.polar,
        };
        events.extend(self.rules.update(&obs));

        if self.rules.state().race_finished && self.result.is_none() {
            self.result = Some(self.build_result());
        }
        TickResult::Advanced(events)
    }

    fn build_result(&self) -> RaceResult {
        let state = self.rules.state();
        let race_time = state.finish_time.unwrap_or(self.race_time_s);
        let average_speed = if race_time > 0.0 {
            self.distance_sailed / race_time / self.cfg.kinematics.speed_scale
        } else {
            0.0
        };
        RaceResult {
            player_name: self.cfg.race.player_name.clone(),
            race_time_seconds: race_time,
            seconds_late: state.seconds_late.unwrap_or(0.0),
            speed_percentage: state.speed_percentage.unwrap_or(0.0),
            mark_rounded: state.mark_rounded,
            distance_sailed: self.distance_sailed,
            average_speed,
            timestamp: Utc::now(),
        }
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    pub fn apply(&mut self, cmd: &ControlCommand) {
        debug!("Command: {:?}", cmd);
        match cmd {
            ControlCommand::SetHeadingDelta { degrees } => self.set_heading_delta(*degrees),
            ControlCommand::Steer { direction } => {
                if !self.paused {
                    self.pending_turn_deg += self.helm.turn(*direction, self.elapsed_s);
                }
            }
            ControlCommand::Pause => self.set_paused(true),
            ControlCommand::Resume => self.set_paused(false),
            ControlCommand::TogglePause => self.set_paused(!self.paused),
            ControlCommand::Restart => self.restart(),
            ControlCommand::JumpTimer { seconds } => self.jump_timer(*seconds),
            ControlCommand::ToggleDebugOverride => {
                self.debug_override = !self.debug_override;
                info!("🐞 Debug override {}", if self.debug_override { "on" } else { "off" });
            }
        }
    }

    /// Queue a heading change for the next tick. Ignored while paused.
    pub fn set_heading_delta(&mut self, degrees: f64) {
        if !self.paused && degrees.is_finite() {
            self.pending_turn_deg += degrees;
        }
    }

    pub fn set_paused(&mut self, paused: bool) {
        if self.paused != paused {
            self.paused = paused;
            info!("{}", if paused { "⏸ Paused" } else { "▶ Resumed" });
        }
    }

    /// Skip the countdown forward; never past the gun, and only before it.
    pub fn jump_timer(&mut self, seconds: f64) {
        if self.rules.state().race_started || !(seconds > 0.0) {
            return;
        }
        self.elapsed_s = (self.elapsed_s + seconds).min(self.cfg.race.timer_duration_s);
        info!("⏩ Countdown at {:.1}s / {:.1}s", self.elapsed_s, self.cfg.race.timer_duration_s);
    }

    pub fn set_player_name(&mut self, name: impl Into<String>) {
        self.cfg.race.player_name = name.into();
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn boat(&self) -> &BoatState { &self.boat }

    pub fn bow_position(&self) -> Point { self.boat.bow_position(&self.cfg.kinematics) }

    pub fn wind_at_boat(&self) -> WindSample { self.wind.sample(self.boat.position) }

    pub fn wind(&self) -> &WindField { &self.wind }

    pub fn polar(&self) -> &PolarTable { &self.polar }

    pub fn course(&self) -> &Course { self.rules.course() }

    pub fn config(&self) -> &SimConfig { &self.cfg }

    pub fn race_state(&self) -> &RaceState { self.rules.state() }

    pub fn elapsed_s(&self) -> f64 { self.elapsed_s }

    pub fn race_time_s(&self) -> f64 { self.race_time_s }

    /// Seconds until the gun, 0 once it has fired
    pub fn time_to_start_s(&self) -> f64 {
        (self.cfg.race.timer_duration_s - self.elapsed_s).max(0.0)
    }

    pub fn is_paused(&self) -> bool { self.paused }

    pub fn debug_override(&self) -> bool { self.debug_override }

    pub fn distance_sailed(&self) -> f64 { self.distance_sailed }

    pub fn seed(&self) -> u64 { self.seed }

    pub fn restarts(&self) -> u64 { self.restarts }

    pub fn tick_count(&self) -> u64 { self.tick_count }

    /// Set once, on the tick the boat finishes
    pub fn result(&self) -> Option<&RaceResult> { self.result.as_ref() }

    pub fn performance(&self) -> Performance {
        Performance::compute(
            &self.polar,
            self.rules.course(),
            self.bow_position(),
            self.boat.heading_deg,
            self.boat.speed_knots,
            &self.wind_at_boat(),
        )
    }

    pub fn telemetry(&self) -> Telemetry {
        let wind = self.wind_at_boat();
        let twa = wind.twa(self.boat.heading_deg);
        let bow = self.bow_position();
        let s = self.rules.state();
        Telemetry {
            tick: self.tick_count,
            paused: self.paused,
            debug_override: self.debug_override,
            phase: s.phase(),
            position: self.boat.position,
            bow,
            heading_deg: self.boat.heading_deg,
            speed_knots: self.boat.speed_knots,
            wind,
            twa_deg: twa,
            vmg_knots: current_vmg(self.boat.speed_knots, twa),
            best_vmg_knots: best_vmg(&self.polar, twa, wind.speed_knots),
            distance_to_line_m: self.rules.course().signed_distance_to_line(bow),
            time_to_start_s: self.time_to_start_s(),
            race_time_s: self.race_time_s,
            is_ocs: s.is_ocs,
            race_started: s.race_started,
            has_crossed_line: s.has_crossed_line,
            mark_rounded: s.mark_rounded,
            race_finished: s.race_finished,
            seconds_late: s.seconds_late,
            speed_percentage: s.speed_percentage,
            finish_time_s: s.finish_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use regatta_types::{RacePhase, TurnDirection};

    const DT: f64 = 1.0 / 60.0;

    fn sim() -> Simulation {
        Simulation::new(SimConfig::default()).unwrap()
    }

    fn running() -> Simulation {
        let mut s = sim();
        s.set_paused(false);
        s
    }

    #[test]
    fn starts_paused_below_the_line_at_speed() {
        let s = sim();
        assert!(s.is_paused());
        assert_eq!(s.boat().position, Point::new(1000.0, 2580.0));
        assert_eq!(s.boat().heading_deg, 90.0);

        let wind = s.wind_at_boat();
        let target = s.polar().boat_speed(wind.twa(90.0), wind.speed_knots);
        assert!(target > 0.0);
        assert_abs_diff_eq!(s.boat().speed_knots, target, epsilon = 1e-9);
        assert_eq!(s.race_state().phase(), RacePhase::PreStart);
        assert_eq!(s.time_to_start_s(), 30.0);
    }

    #[test]
    fn paused_ticks_change_nothing() {
        let mut s = sim();
        let before = s.boat().clone();
        let dir = s.wind().direction();
        for _ in 0..600 {
            assert!(matches!(s.tick(5.0, DT), TickResult::Paused));
        }
        assert_eq!(s.boat(), &before);
        assert_eq!(s.elapsed_s(), 0.0);
        assert_eq!(s.wind().direction(), dir);
        assert_eq!(s.tick_count(), 0);
    }

    #[test]
    fn heading_commands_ignored_while_paused() {
        let mut s = sim();
        s.apply(&ControlCommand::SetHeadingDelta { degrees: 30.0 });
        s.apply(&ControlCommand::Steer { direction: TurnDirection::Port });
        s.apply(&ControlCommand::Resume);
        s.tick(0.0, DT);
        assert_eq!(s.boat().heading_deg, 90.0);
    }

    #[test]
    fn heading_delta_applies_and_wraps() {
        let mut s = running();
        s.tick(-100.0, DT);
        assert_abs_diff_eq!(s.boat().heading_deg, 350.0, epsilon = 1e-9);
        s.apply(&ControlCommand::SetHeadingDelta { degrees: 15.0 });
        s.tick(0.0, DT);
        assert_abs_diff_eq!(s.boat().heading_deg, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn steering_is_rate_limited_in_sim_time() {
        let mut s = running();
        s.apply(&ControlCommand::Steer { direction: TurnDirection::Starboard });
        s.apply(&ControlCommand::Steer { direction: TurnDirection::Starboard });
        s.tick(0.0, DT);
        assert_abs_diff_eq!(s.boat().heading_deg, 92.0, epsilon = 1e-9);

        // 1/60 s later: still inside the 30 ms window
        s.apply(&ControlCommand::Steer { direction: TurnDirection::Starboard });
        s.tick(0.0, DT);
        assert_abs_diff_eq!(s.boat().heading_deg, 92.0, epsilon = 1e-9);

        s.apply(&ControlCommand::Steer { direction: TurnDirection::Port });
        s.tick(0.0, DT);
        assert_abs_diff_eq!(s.boat().heading_deg, 90.0, epsilon = 1e-9);
    }

    #[test]
    fn gun_fires_at_timer_and_race_clock_runs() {
        let mut s = running();
        let mut gun_tick = None;
        for i in 0..(31 * 60) {
            if let TickResult::Advanced(events) = s.tick(0.0, DT) {
                if events.contains(&RaceEvent::Gun) {
                    gun_tick = Some(i);
                }
            }
        }
        let gun_tick = gun_tick.expect("gun never fired");
        assert!((1798..=1800).contains(&gun_tick), "gun at tick {gun_tick}");
        assert!(s.race_state().race_started);
        assert_eq!(s.time_to_start_s(), 0.0);
        assert_abs_diff_eq!(s.race_time_s(), s.elapsed_s() - 30.0, epsilon = 2.0 * DT);
    }

    #[test]
    fn jump_timer_clamps_and_only_before_start() {
        let mut s = sim();
        s.jump_timer(10.0);
        assert_eq!(s.elapsed_s(), 10.0);
        s.apply(&ControlCommand::JumpTimer { seconds: 10.0 });
        s.apply(&ControlCommand::JumpTimer { seconds: 10.0 });
        assert_eq!(s.elapsed_s(), 30.0);
        assert!(!s.race_state().race_started);

        s.set_paused(false);
        s.tick(0.0, DT);
        assert!(s.race_state().race_started);
        let elapsed = s.elapsed_s();
        s.jump_timer(10.0);
        assert_eq!(s.elapsed_s(), elapsed);
    }

    #[test]
    fn jump_timer_ignores_non_positive() {
        let mut s = sim();
        s.jump_timer(-5.0);
        s.jump_timer(f64::NAN);
        assert_eq!(s.elapsed_s(), 0.0);
    }

    #[test]
    fn restart_reinitializes_unpaused_with_new_seed() {
        let mut s = running();
        for _ in 0..120 {
            s.tick(1.0, DT);
        }
        s.apply(&ControlCommand::ToggleDebugOverride);
        s.apply(&ControlCommand::Pause);
        assert!(s.is_paused());

        s.apply(&ControlCommand::Restart);
        assert!(!s.is_paused());
        assert!(!s.debug_override());
        assert_eq!(s.elapsed_s(), 0.0);
        assert_eq!(s.boat().position, Point::new(1000.0, 2580.0));
        assert_eq!(s.boat().heading_deg, 90.0);
        assert_eq!(s.race_state(), &RaceState { prev_bow_position: s.bow_position(), ..Default::default() });
        assert_eq!(s.seed(), 43);
        assert_eq!(s.restarts(), 1);
        assert!(s.result().is_none());
    }

    #[test]
    fn toggle_pause_and_debug() {
        let mut s = sim();
        s.apply(&ControlCommand::TogglePause);
        assert!(!s.is_paused());
        s.apply(&ControlCommand::TogglePause);
        assert!(s.is_paused());
        s.apply(&ControlCommand::ToggleDebugOverride);
        assert!(s.debug_override());
        assert!(s.telemetry().debug_override);
    }

    #[test]
    fn bad_dt_does_not_advance_time() {
        let mut s = running();
        s.tick(0.0, 0.0);
        s.tick(0.0, -1.0);
        s.tick(0.0, f64::NAN);
        assert_eq!(s.elapsed_s(), 0.0);
        assert_eq!(s.tick_count(), 0);
    }

    #[test]
    fn telemetry_reflects_state() {
        let mut s = running();
        s.tick(0.0, DT);
        let t = s.telemetry();
        assert_eq!(t.tick, 1);
        assert!(!t.paused);
        assert_eq!(t.phase, RacePhase::PreStart);
        assert_eq!(t.position, s.boat().position);
        assert_abs_diff_eq!(t.distance_to_line_m, s.bow_position().y - 2400.0, epsilon = 1e-9);
        assert_abs_diff_eq!(t.time_to_start_s, 30.0 - DT, epsilon = 1e-9);
        assert!(t.seconds_late.is_none());

        let p = s.performance();
        assert_abs_diff_eq!(p.vmg_knots, t.vmg_knots, epsilon = 1e-12);
        assert_abs_diff_eq!(p.best_vmg_knots, t.best_vmg_knots, epsilon = 1e-12);
    }
}
