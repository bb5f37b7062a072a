//! # regatta-sim
//!
//! Real-time single-boat sailing race simulation.
//!
//! Per tick, in order: the wind field advances to the current simulation
//! time, is sampled at the boat, the polar turns that wind into a target
//! speed, the kinematics move the boat, and the race rules consume the new
//! bow position. [`simulation::Simulation`] owns all of it; the `regatta-sim`
//! binary drives it on a timer and talks to control panels over a WebSocket.

pub mod boat_sim;
pub mod config;
pub mod helm;
pub mod leaderboard;
pub mod persistence;
pub mod polar;
pub mod race_rules;
pub mod scenarios;
pub mod simulation;
pub mod vmg;
pub mod wind;

pub use config::{ConfigError, SimConfig};
pub use polar::{PolarError, PolarTable};
pub use race_rules::{RaceEvent, RaceState};
pub use simulation::{Simulation, TickResult};
pub use wind::WindField;
