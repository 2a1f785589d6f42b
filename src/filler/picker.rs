//! Ad-hoc filler selection against play history

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{ContentProgram, DAY_MS, MINUTE_MS, SLACK_MS};
use crate::random::SeededRng;

/// Largest integer exactly representable as an f64; "never" for wait times
pub const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

/// Time-since-played assumed for programs and lists with no history
const NEVER_PLAYED_MS: i64 = DAY_MS;

/// Recency above this contributes nothing further to a program's score
const RECENCY_CAP_MS: i64 = 5 * MINUTE_MS;

/// A channel's filler list as the picker sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelFillerList {
    pub id: String,
    #[serde(default = "default_list_weight")]
    pub weight: f64,
    /// Minimum time between two plays from this list
    #[serde(default)]
    pub cooldown_ms: i64,
    pub programs: Vec<ContentProgram>,
}

fn default_list_weight() -> f64 {
    1.0
}

impl ChannelFillerList {
    pub fn new(id: impl Into<String>, programs: Vec<ContentProgram>) -> Self {
        Self {
            id: id.into(),
            weight: 1.0,
            cooldown_ms: 0,
            programs,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_cooldown(mut self, cooldown_ms: i64) -> Self {
        self.cooldown_ms = cooldown_ms;
        self
    }
}

/// One play of a program on a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayRecord {
    pub program_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_id: Option<String>,
    pub played_at_ms: i64,
}

impl PlayRecord {
    pub fn new(program_id: impl Into<String>, list_id: Option<&str>, played_at_ms: i64) -> Self {
        Self {
            program_id: program_id.into(),
            list_id: list_id.map(str::to_string),
            played_at_ms,
        }
    }
}

/// Outcome of a pick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillerPick {
    pub program: Option<ContentProgram>,
    pub list_id: Option<String>,
    /// 0 when something was picked, [`MAX_SAFE_INTEGER`] when nothing can
    /// ever fit, otherwise how long until the first candidate comes off
    /// cooldown
    pub minimum_wait_ms: i64,
}

impl FillerPick {
    pub fn is_picked(&self) -> bool {
        self.program.is_some()
    }
}

/// Latest play per program and per list
struct History {
    programs: HashMap<String, i64>,
    lists: HashMap<String, i64>,
}

impl History {
    fn index(records: &[PlayRecord]) -> Self {
        let mut programs: HashMap<String, i64> = HashMap::new();
        let mut lists: HashMap<String, i64> = HashMap::new();
        for record in records {
            let latest = programs.entry(record.program_id.clone()).or_insert(i64::MIN);
            *latest = (*latest).max(record.played_at_ms);
            if let Some(list_id) = &record.list_id {
                let latest = lists.entry(list_id.clone()).or_insert(i64::MIN);
                *latest = (*latest).max(record.played_at_ms);
            }
        }
        Self { programs, lists }
    }

    fn since(last: Option<&i64>, now_ms: i64) -> i64 {
        match last {
            // Plays stamped in the future count as just played
            Some(&at) => now_ms.saturating_sub(at).max(0),
            None => NEVER_PLAYED_MS,
        }
    }

    fn since_program(&self, id: &str, now_ms: i64) -> i64 {
        Self::since(self.programs.get(id), now_ms)
    }

    fn since_list(&self, id: &str, now_ms: i64) -> i64 {
        Self::since(self.lists.get(id), now_ms)
    }
}

/// Picks one filler program to cover a gap, weighting lists by their
/// configured weight and programs by recency and duration
#[derive(Debug, Clone, Copy)]
pub struct FillerPicker {
    repeat_cooldown_ms: i64,
}

impl Default for FillerPicker {
    fn default() -> Self {
        Self::new(30 * MINUTE_MS)
    }
}

impl FillerPicker {
    /// `repeat_cooldown_ms` is the channel-wide minimum time between two
    /// plays of the same program
    pub fn new(repeat_cooldown_ms: i64) -> Self {
        Self {
            repeat_cooldown_ms: repeat_cooldown_ms.max(0),
        }
    }

    pub fn repeat_cooldown_ms(&self) -> i64 {
        self.repeat_cooldown_ms
    }

    pub fn pick(
        &self,
        lists: &[ChannelFillerList],
        history: &[PlayRecord],
        max_duration_ms: i64,
        now_ms: i64,
        rng: &mut SeededRng,
    ) -> FillerPick {
        let history = History::index(history);
        let mut minimum_wait = MAX_SAFE_INTEGER;
        let mut list_weight = 0.0;
        let mut chosen_list: Option<usize> = None;
        let mut picked: Option<&ContentProgram> = None;
        let mut score_total = 0.0;

        for (list_idx, list) in lists.iter().enumerate() {
            list_weight += list.weight;

            let mut programs: Vec<&ContentProgram> = list.programs.iter().collect();
            rng.shuffle(&mut programs);

            for program in programs {
                if program.duration_ms > max_duration_ms + SLACK_MS {
                    continue;
                }

                let since = history.since_program(&program.id, now_ms);
                if since < self.repeat_cooldown_ms {
                    let wait = self.repeat_cooldown_ms - since;
                    if program.duration_ms + wait <= max_duration_ms {
                        minimum_wait = minimum_wait.min(wait);
                    }
                    continue;
                }

                if chosen_list != Some(list_idx) {
                    let list_since = history.since_list(&list.id, now_ms);
                    if list_since < list.cooldown_ms {
                        let wait = list.cooldown_ms - list_since;
                        if program.duration_ms + wait <= max_duration_ms {
                            minimum_wait = minimum_wait.min(wait);
                        }
                        break;
                    }
                    if !rng.bool(list.weight, list_weight) {
                        break;
                    }
                    // A later list winning the draw replaces earlier picks
                    chosen_list = Some(list_idx);
                    picked = None;
                    score_total = 0.0;
                }

                let score = norm_s(since.min(RECENCY_CAP_MS)) + norm_d(program.duration_ms);
                score_total += score;
                if rng.bool(score, score_total) {
                    picked = Some(program);
                }
            }
        }

        match (picked, chosen_list) {
            (Some(program), Some(list_idx)) => {
                tracing::debug!(program_id = %program.id, list_id = %lists[list_idx].id, "Filler picked");
                FillerPick {
                    program: Some(program.clone()),
                    list_id: Some(lists[list_idx].id.clone()),
                    minimum_wait_ms: 0,
                }
            }
            _ => FillerPick {
                program: None,
                list_id: None,
                minimum_wait_ms: minimum_wait,
            },
        }
    }
}

/// Duration normalization; compresses logarithmically above three minutes
pub fn norm_d(duration_ms: i64) -> f64 {
    let mut minutes = duration_ms.max(0) as f64 / MINUTE_MS as f64;
    if minutes >= 3.0 {
        minutes = 3.0 + minutes.ln();
    }
    let y = 10_000.0 * ((minutes * 1000.0).ceil() + 1.0);
    (y / 1_000_000.0).ceil() + 1.0
}

/// Recency normalization; grows quadratically
pub fn norm_s(since_ms: i64) -> f64 {
    let base = (since_ms.max(0) as f64 / 600.0).ceil() + 1.0;
    let y = base * base;
    (y / 1_000_000.0).ceil() + 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn filler(id: &str, minutes: i64) -> ContentProgram {
        ContentProgram::movie(id, id.to_uppercase(), minutes * MINUTE_MS)
    }

    fn rng() -> SeededRng {
        SeededRng::from_seed(&[5, 6, 7])
    }

    #[test]
    fn test_norm_functions() {
        // 1 minute: y = 10000 * 1001
        assert_eq!(norm_d(MINUTE_MS), 12.0);
        assert!(norm_d(10 * MINUTE_MS) > norm_d(2 * MINUTE_MS));
        // 0 ms: (0 + 1)^2 = 1
        assert_eq!(norm_s(0), 2.0);
        // 5 minutes: (500 + 1)^2 = 251001
        assert_eq!(norm_s(RECENCY_CAP_MS), 2.0);
        // 1 day: (144000 + 1)^2 = 20736288001
        assert_eq!(norm_s(DAY_MS), 20_738.0);
    }

    #[test]
    fn test_picks_fitting_program() {
        let lists = vec![ChannelFillerList::new("ads", vec![filler("long", 10), filler("short", 1)])];
        let pick = FillerPicker::new(0).pick(&lists, &[], 2 * MINUTE_MS, 0, &mut rng());
        assert_eq!(pick.program.map(|p| p.id), Some("short".to_string()));
        assert_eq!(pick.list_id.as_deref(), Some("ads"));
        assert_eq!(pick.minimum_wait_ms, 0);
    }

    #[test]
    fn test_nothing_fits() {
        let lists = vec![ChannelFillerList::new("ads", vec![filler("long", 10)])];
        let pick = FillerPicker::new(0).pick(&lists, &[], MINUTE_MS, 0, &mut rng());
        assert!(!pick.is_picked());
        assert_eq!(pick.minimum_wait_ms, MAX_SAFE_INTEGER);
    }

    #[test]
    fn test_repeat_cooldown_reports_wait() {
        let lists = vec![ChannelFillerList::new("ads", vec![filler("a", 1)])];
        let history = vec![PlayRecord::new("a", Some("ads"), 0)];
        let now = 10 * MINUTE_MS;
        let pick = FillerPicker::new(30 * MINUTE_MS).pick(&lists, &history, 60 * MINUTE_MS, now, &mut rng());
        assert!(!pick.is_picked());
        assert_eq!(pick.minimum_wait_ms, 20 * MINUTE_MS);

        // Waiting would push it past the gap
        let tight = FillerPicker::new(30 * MINUTE_MS).pick(&lists, &history, 5 * MINUTE_MS, now, &mut rng());
        assert_eq!(tight.minimum_wait_ms, MAX_SAFE_INTEGER);
    }

    #[test]
    fn test_list_cooldown_uses_list_history() {
        let lists = vec![ChannelFillerList::new("ads", vec![filler("a", 1)]).with_cooldown(15 * MINUTE_MS)];
        // "a" itself was never played; the list was, via another program
        let history = vec![PlayRecord::new("other", Some("ads"), 0)];
        let pick = FillerPicker::new(30 * MINUTE_MS).pick(&lists, &history, 60 * MINUTE_MS, 10 * MINUTE_MS, &mut rng());
        assert!(!pick.is_picked());
        assert_eq!(pick.minimum_wait_ms, 5 * MINUTE_MS);
    }

    #[test]
    fn test_zero_weight_list_never_wins() {
        let lists = vec![
            ChannelFillerList::new("never", vec![filler("n", 1)]).with_weight(0.0),
            ChannelFillerList::new("always", vec![filler("y", 1)]),
        ];
        let mut rng = rng();
        for _ in 0..50 {
            let pick = FillerPicker::new(0).pick(&lists, &[], 5 * MINUTE_MS, 0, &mut rng);
            assert_eq!(pick.list_id.as_deref(), Some("always"));
        }
    }

    #[test]
    fn test_same_seed_same_pick() {
        let lists = vec![
            ChannelFillerList::new("a", (0..8).map(|i| filler(&format!("a{i}"), 1 + i)).collect()),
            ChannelFillerList::new("b", (0..8).map(|i| filler(&format!("b{i}"), 1 + i)).collect()),
        ];
        let picker = FillerPicker::default();
        let first = picker.pick(&lists, &[], 10 * MINUTE_MS, 0, &mut rng());
        let second = picker.pick(&lists, &[], 10 * MINUTE_MS, 0, &mut rng());
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn prop_minimum_wait_never_negative(
            plays in prop::collection::vec((0usize..6, 0usize..3, -DAY_MS..DAY_MS), 0..20),
            cooldown_min in 0i64..120,
            list_cooldown_min in 0i64..120,
            gap_min in 0i64..90,
            seed in any::<u32>(),
        ) {
            let lists: Vec<ChannelFillerList> = (0..3)
                .map(|l| {
                    ChannelFillerList::new(
                        format!("l{l}"),
                        (0..2).map(|p| filler(&format!("p{}", l * 2 + p), 1 + (l * 2 + p) as i64 * 3)).collect(),
                    )
                    .with_cooldown(list_cooldown_min * MINUTE_MS)
                })
                .collect();
            let history: Vec<PlayRecord> = plays
                .iter()
                .map(|(p, l, at)| PlayRecord::new(format!("p{p}"), Some(format!("l{l}").as_str()), *at))
                .collect();

            let mut rng = SeededRng::from_seed(&[seed]);
            let pick = FillerPicker::new(cooldown_min * MINUTE_MS)
                .pick(&lists, &history, gap_min * MINUTE_MS, 0, &mut rng);

            prop_assert!(pick.minimum_wait_ms >= 0);
            prop_assert_eq!(pick.is_picked(), pick.minimum_wait_ms == 0);
        }
    }
}
