//! leaderboard.rs — In-memory ranking of finished races
//!
//! Only races where the mark was rounded rank. Ties on race time keep
//! submission order. Two results are the same race when the player name and
//! the race time to the hundredth of a second agree.

use regatta_types::RaceResult;

pub const DEFAULT_TOP_N: usize = 10;
pub const MAX_NAME_LEN: usize = 20;

#[derive(Debug, Default, Clone)]
pub struct Leaderboard {
    results: Vec<RaceResult>,
}

impl Leaderboard {
    pub fn new(results: Vec<RaceResult>) -> Self {
        Self { results }
    }

    pub fn push(&mut self, result: RaceResult) {
        self.results.push(result);
    }

    pub fn len(&self) -> usize { self.results.len() }

    pub fn is_empty(&self) -> bool { self.results.is_empty() }

    /// Completed races, fastest first
    pub fn ranked(&self) -> Vec<&RaceResult> {
        let mut completed: Vec<&RaceResult> = self.results.iter().filter(|r| r.mark_rounded).collect();
        completed.sort_by(|a, b| a.race_time_seconds.total_cmp(&b.race_time_seconds));
        completed
    }

    pub fn top(&self, n: usize) -> Vec<&RaceResult> {
        let mut ranked = self.ranked();
        ranked.truncate(n);
        ranked
    }

    /// 1-based rank of an already recorded result
    pub fn rank_of(&self, result: &RaceResult) -> Option<usize> {
        self.ranked().iter().position(|r| same_race(r, result)).map(|i| i + 1)
    }

    /// Would `result` make the top `n` if it were added now?
    pub fn qualifies(&self, result: &RaceResult, n: usize) -> bool {
        if !result.mark_rounded {
            return false;
        }
        let faster = self
            .results
            .iter()
            .filter(|r| r.mark_rounded && centis(r.race_time_seconds) < centis(result.race_time_seconds))
            .count();
        faster < n
    }
}

fn centis(seconds: f64) -> i64 {
    (seconds * 100.0).round() as i64
}

fn same_race(a: &RaceResult, b: &RaceResult) -> bool {
    a.player_name == b.player_name && centis(a.race_time_seconds) == centis(b.race_time_seconds)
}

/// Keep letters, digits, space, `-` and `_`; trim; at most 20 chars. None if nothing is left.
pub fn sanitize_player_name(raw: &str) -> Option<String> {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .take(MAX_NAME_LEN)
        .collect();
    let trimmed = kept.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// `MM:SS.cc`
pub fn format_race_time(seconds: f64) -> String {
    let total = centis(seconds.max(0.0));
    format!("{:02}:{:02}.{:02}", total / 6000, (total / 100) % 60, total % 100)
}
