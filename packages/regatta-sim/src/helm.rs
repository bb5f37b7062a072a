//! helm.rs — Tiller input rate limiting
//!
//! Each accepted turn moves the heading by a fixed step. Turns arriving faster
//! than the repeat delay are dropped. Time is simulation time, so a held key
//! turns the boat at the same rate whatever the wall clock does.

use regatta_types::TurnDirection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HelmConfig {
    pub step_deg: f64,
    pub repeat_delay_s: f64,
}

impl Default for HelmConfig {
    fn default() -> Self {
        Self { step_deg: 2.0, repeat_delay_s: 0.030 }
    }
}

pub struct Helm {
    cfg: HelmConfig,
    last_turn: Option<f64>,
}

impl Helm {
    pub fn new(cfg: HelmConfig) -> Self {
        Self { cfg, last_turn: None }
    }

    /// Heading change for a turn request at simulation time `now`; 0 if rate-limited.
    pub fn turn(&mut self, direction: TurnDirection, now: f64) -> f64 {
        if let Some(last) = self.last_turn {
            if now - last < self.cfg.repeat_delay_s {
                return 0.0;
            }
        }
        self.last_turn = Some(now);
        match direction {
            TurnDirection::Port => -self.cfg.step_deg,
            TurnDirection::Starboard => self.cfg.step_deg,
        }
    }

    pub fn reset(&mut self) {
        self.last_turn = None;
    }
}
