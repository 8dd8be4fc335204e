//! Job Roulette reference data, history model and session state.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

// ── Jobs ─────────────────────────────────────────────────────

/// Tier of a job. Serialized in lowercase to match stored history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobCategory {
    Unique,
    Basic,
    Advanced,
    Master,
}

impl JobCategory {
    pub fn label(self) -> &'static str {
        match self {
            JobCategory::Unique => "固有職",
            JobCategory::Basic => "基本職",
            JobCategory::Advanced => "上級職",
            JobCategory::Master => "マスター職",
        }
    }
}

pub const BASIC_JOBS: [&str; 10] = [
    "戦士",
    "武闘家",
    "魔法使い",
    "僧侶",
    "踊り子",
    "盗賊",
    "吟遊詩人",
    "船乗り",
    "羊飼い",
    "笑わせ師",
];

pub const ADVANCED_JOBS: [&str; 7] = [
    "バトルマスター",
    "魔法戦士",
    "賢者",
    "パラディン",
    "スーパースター",
    "まもの使い",
    "海賊",
];

pub const MASTER_JOBS: [&str; 3] = ["ゴッドハンド", "天地雷鳴士", "勇者"];

/// Gate on an advanced or master job.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Prerequisite {
    /// Every listed job must be mastered.
    All(&'static [&'static str]),
    /// At least `count` of the listed jobs must be mastered.
    Count {
        requires: &'static [&'static str],
        count: usize,
    },
    /// At least this many jobs from [`ADVANCED_JOBS`] must be mastered.
    AdvancedCount(usize),
}

/// Rule table. Jobs without an entry are always available.
pub fn prerequisite(job: &str) -> Option<Prerequisite> {
    let rule = match job {
        "バトルマスター" => Prerequisite::All(&["戦士", "武闘家"]),
        "魔法戦士" => Prerequisite::All(&["戦士", "魔法使い"]),
        "賢者" => Prerequisite::All(&["魔法使い", "僧侶"]),
        "パラディン" => Prerequisite::All(&["武闘家", "僧侶"]),
        "スーパースター" => Prerequisite::All(&["踊り子", "吟遊詩人", "笑わせ師"]),
        "まもの使い" => Prerequisite::All(&["盗賊", "羊飼い"]),
        "海賊" => Prerequisite::All(&["盗賊", "船乗り"]),
        "ゴッドハンド" => Prerequisite::All(&["バトルマスター", "パラディン"]),
        "天地雷鳴士" => Prerequisite::Count {
            requires: &["賢者", "スーパースター", "海賊"],
            count: 2,
        },
        "勇者" => Prerequisite::AdvancedCount(3),
        _ => return None,
    };
    Some(rule)
}

/// Category of a known job name. Unique jobs are looked up through the roster.
pub fn category_of(job: &str) -> Option<JobCategory> {
    if BASIC_JOBS.contains(&job) {
        Some(JobCategory::Basic)
    } else if ADVANCED_JOBS.contains(&job) {
        Some(JobCategory::Advanced)
    } else if MASTER_JOBS.contains(&job) {
        Some(JobCategory::Master)
    } else if CHARACTERS.iter().any(|c| c.unique_job == job) {
        Some(JobCategory::Unique)
    } else {
        None
    }
}

// ── Characters & Phases ──────────────────────────────────────

pub struct Character {
    pub name: &'static str,
    pub emoji: &'static str,
    pub unique_job: &'static str,
    /// Phase numbers (1..=3) in which the character is in the party.
    pub phases: &'static [u8],
}

impl Character {
    pub fn is_active_in(&self, phase: Phase) -> bool {
        self.phases.contains(&phase.number())
    }
}

pub const CHARACTERS: [Character; 5] = [
    Character {
        name: "主人公",
        emoji: "⚓",
        unique_job: "ひよっこ漁師",
        phases: &[1, 2, 3],
    },
    Character {
        name: "マリベル",
        emoji: "🎀",
        unique_job: "ひよっこ網元",
        phases: &[1, 2, 3],
    },
    Character {
        name: "ガボ",
        emoji: "🐺",
        unique_job: "オオカミ少年",
        phases: &[1, 2, 3],
    },
    Character {
        name: "アイラ",
        emoji: "💃",
        unique_job: "ユバールの踊り手",
        phases: &[2, 3],
    },
    Character {
        name: "メルビン",
        emoji: "🛡️",
        unique_job: "神の兵士",
        phases: &[3],
    },
];

/// Characters in the party for a phase, in roster order.
pub fn characters_for_phase(phase: Phase) -> Vec<&'static Character> {
    CHARACTERS.iter().filter(|c| c.is_active_in(phase)).collect()
}

/// Story stage. Decides the active party and whether dual jobs are allowed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    One,
    Two,
    Three,
}

pub const ALL_PHASES: [Phase; 3] = [Phase::One, Phase::Two, Phase::Three];

pub struct PhaseInfo {
    pub label: &'static str,
    pub dual_job: bool,
}

impl Phase {
    pub fn number(self) -> u8 {
        match self {
            Phase::One => 1,
            Phase::Two => 2,
            Phase::Three => 3,
        }
    }

    pub fn from_number(n: u8) -> Option<Phase> {
        match n {
            1 => Some(Phase::One),
            2 => Some(Phase::Two),
            3 => Some(Phase::Three),
            _ => None,
        }
    }

    pub fn info(self) -> PhaseInfo {
        match self {
            Phase::One => PhaseInfo {
                label: "転職解放",
                dual_job: false,
            },
            Phase::Two => PhaseInfo {
                label: "アイラ加入",
                dual_job: true,
            },
            Phase::Three => PhaseInfo {
                label: "メルビン加入",
                dual_job: true,
            },
        }
    }
}

// ── History ──────────────────────────────────────────────────

/// Maximum number of history entries kept (oldest dropped first).
pub const MAX_HISTORY: usize = 50;

/// One job held by a character in a history entry.
///
/// Older saves stored bare job names; those are normalized on read
/// (see [`StoredJob`]) so the rest of the crate only sees this shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredJob")]
pub struct JobRecord {
    pub name: String,
    pub category: JobCategory,
    pub mastered: bool,
}

impl JobRecord {
    pub fn new(name: &str, category: JobCategory) -> Self {
        Self {
            name: name.to_string(),
            category,
            mastered: false,
        }
    }
}

/// Wire shape of a job entry: a legacy bare name or a full record.
///
/// Bare names always read back as basic and not mastered, whatever the
/// catalogue says about the name.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredJob {
    Name(String),
    Record {
        name: String,
        category: Option<JobCategory>,
        #[serde(default)]
        mastered: bool,
    },
}

impl From<StoredJob> for JobRecord {
    fn from(stored: StoredJob) -> Self {
        match stored {
            StoredJob::Name(name) => JobRecord {
                name,
                category: JobCategory::Basic,
                mastered: false,
            },
            StoredJob::Record {
                name,
                category,
                mastered,
            } => JobRecord {
                category: category
                    .or_else(|| category_of(&name))
                    .unwrap_or(JobCategory::Basic),
                name,
                mastered,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub character: String,
    /// Main job first, then the secondary job in dual-job phases.
    pub jobs: Vec<JobRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub phase: u8,
    #[serde(
        rename = "phaseLabel",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub phase_label: Option<String>,
    #[serde(default)]
    pub timing: String,
    pub assignments: Vec<Assignment>,
}

impl HistoryEntry {
    pub fn assignment_for(&self, character: &str) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.character == character)
    }

    /// Jobs of the entry flattened in display order, paired with their owner.
    pub fn job_slots(&self) -> impl Iterator<Item = (&str, &JobRecord)> {
        self.assignments
            .iter()
            .flat_map(|a| a.jobs.iter().map(move |j| (a.character.as_str(), j)))
    }

    /// Header label: the stored phase label, or `Phase N`.
    pub fn phase_display(&self) -> String {
        match &self.phase_label {
            Some(label) if !label.is_empty() => label.clone(),
            _ => format!("Phase {}", self.phase),
        }
    }
}

/// Character name → job names marked mastered anywhere in history.
pub type MasteredJobs = BTreeMap<String, BTreeSet<String>>;

// ── Session ──────────────────────────────────────────────────

/// Exclusion toggles applied when building pools.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DrawOptions {
    pub exclude_prev: bool,
    pub exclude_mastered: bool,
}

/// A job eligible for selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolJob {
    pub name: &'static str,
    pub category: JobCategory,
}

/// Base delay between reveal frames.
pub const FRAME_BASE_MS: f64 = 40.0;
/// Extra delay added per frame during the final slowdown.
pub const FRAME_SLOWDOWN_MS: f64 = 60.0;
/// Number of trailing frames that slow down.
pub const SLOWDOWN_FRAMES: u32 = 5;
/// Reveal frame count range: `MIN_FRAMES..MIN_FRAMES + FRAME_JITTER`.
pub const MIN_FRAMES: u32 = 20;
pub const FRAME_JITTER: u32 = 10;

/// One slot reveal: cycles through pool names, then locks the chosen job.
#[derive(Clone, Debug, PartialEq)]
pub struct RevealStep {
    /// Index into [`PendingDraw::assignments`].
    pub card: usize,
    /// 0 = main job, 1 = secondary job.
    pub slot: usize,
    pub total_frames: u32,
    pub frame: u32,
    /// Milliseconds accumulated towards the next frame.
    pub elapsed_ms: f64,
    /// Name currently flashing in the slot.
    pub shown: &'static str,
}

/// A draw whose results are fixed but still being revealed.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingDraw {
    pub phase: Phase,
    pub timing: String,
    pub assignments: Vec<Assignment>,
    /// Pool used for each assignment (same indices), for the cycling display.
    pub pools: Vec<Vec<PoolJob>>,
    pub steps: Vec<RevealStep>,
    /// Index of the step being revealed; equals `steps.len()` once done.
    pub current: usize,
}

impl PendingDraw {
    pub fn is_finished(&self) -> bool {
        self.current >= self.steps.len()
    }
}

/// Active screen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Screen {
    Main,
    History,
}

/// Modal prompt layered over the current screen.
#[derive(Clone, Debug, PartialEq)]
pub enum Prompt {
    None,
    EditTiming,
    ConfirmClear,
    /// Imported entries waiting for a merge / replace decision.
    ConfirmImport(Vec<HistoryEntry>),
}

/// Maximum number of log lines kept.
pub const MAX_LOG: usize = 30;

/// Everything the app mutates, passed explicitly into every operation.
pub struct Session {
    pub phase: Phase,
    pub options: DrawOptions,
    /// Free-text label saved with the next draw (e.g. where in the story).
    pub timing: String,
    pub history: Vec<HistoryEntry>,
    /// Draw being revealed. `Some` means a draw is in flight.
    pub draw: Option<PendingDraw>,
    /// Results of the last completed draw, kept on the cards.
    pub last_result: Vec<Assignment>,
    pub screen: Screen,
    pub prompt: Prompt,
    /// Selected entry in the history screen.
    pub selected_entry: usize,
    pub rng_seed: u64,
    pub log: Vec<String>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            phase: Phase::One,
            options: DrawOptions::default(),
            timing: String::new(),
            history: Vec::new(),
            draw: None,
            last_result: Vec::new(),
            screen: Screen::Main,
            prompt: Prompt::None,
            selected_entry: 0,
            rng_seed: 42,
            log: vec!["職業ルーレットへようこそ！".into()],
        }
    }

    pub fn is_rolling(&self) -> bool {
        self.draw.is_some()
    }

    pub fn add_log(&mut self, text: &str) {
        self.log.push(text.to_string());
        if self.log.len() > MAX_LOG {
            self.log.remove(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_rosters() {
        let names = |p| {
            characters_for_phase(p)
                .iter()
                .map(|c| c.name)
                .collect::<Vec<_>>()
        };
        assert_eq!(names(Phase::One), vec!["主人公", "マリベル", "ガボ"]);
        assert_eq!(names(Phase::Two).len(), 4);
        assert!(names(Phase::Two).contains(&"アイラ"));
        assert_eq!(names(Phase::Three).len(), 5);
        assert!(names(Phase::Three).contains(&"メルビン"));
    }

    #[test]
    fn dual_job_only_after_phase_one() {
        assert!(!Phase::One.info().dual_job);
        assert!(Phase::Two.info().dual_job);
        assert!(Phase::Three.info().dual_job);
    }

    #[test]
    fn phase_number_roundtrip() {
        for p in ALL_PHASES {
            assert_eq!(Phase::from_number(p.number()), Some(p));
            assert!(!p.info().label.is_empty());
        }
        assert_eq!(Phase::from_number(0), None);
        assert_eq!(Phase::from_number(4), None);
    }

    #[test]
    fn every_gated_job_has_a_rule() {
        for job in ADVANCED_JOBS.iter().chain(MASTER_JOBS.iter()) {
            assert!(prerequisite(job).is_some(), "{job} has no rule");
        }
        for job in BASIC_JOBS {
            assert!(prerequisite(job).is_none(), "{job} should be free");
        }
        for c in &CHARACTERS {
            assert!(!c.unique_job.is_empty());
            assert!(prerequisite(c.unique_job).is_none());
        }
    }

    #[test]
    fn rule_requirements_are_known_jobs() {
        for job in ADVANCED_JOBS.iter().chain(MASTER_JOBS.iter()) {
            let reqs: &[&str] = match prerequisite(job) {
                Some(Prerequisite::All(r)) => r,
                Some(Prerequisite::Count { requires, .. }) => requires,
                _ => &[],
            };
            for r in reqs {
                assert!(category_of(r).is_some(), "{job} requires unknown {r}");
            }
        }
    }

    #[test]
    fn categories_are_stable() {
        assert_eq!(category_of("戦士"), Some(JobCategory::Basic));
        assert_eq!(category_of("賢者"), Some(JobCategory::Advanced));
        assert_eq!(category_of("勇者"), Some(JobCategory::Master));
        assert_eq!(category_of("神の兵士"), Some(JobCategory::Unique));
        assert_eq!(category_of("村人"), None);
    }

    #[test]
    fn bare_job_name_is_normalized() {
        let rec: JobRecord = serde_json::from_str(r#""戦士""#).unwrap();
        assert_eq!(
            rec,
            JobRecord {
                name: "戦士".into(),
                category: JobCategory::Basic,
                mastered: false,
            }
        );
    }

    #[test]
    fn bare_advanced_name_reads_as_basic() {
        let rec: JobRecord = serde_json::from_str(r#""賢者""#).unwrap();
        assert_eq!(rec.category, JobCategory::Basic);
        assert!(!rec.mastered);
    }

    #[test]
    fn record_without_category_uses_catalogue() {
        let rec: JobRecord = serde_json::from_str(r#"{"name":"賢者"}"#).unwrap();
        assert_eq!(rec.category, JobCategory::Advanced);
    }

    #[test]
    fn bare_unknown_name_defaults_to_basic() {
        let rec: JobRecord = serde_json::from_str(r#""村人""#).unwrap();
        assert_eq!(rec.category, JobCategory::Basic);
        assert!(!rec.mastered);
    }

    #[test]
    fn record_job_keeps_fields() {
        let rec: JobRecord =
            serde_json::from_str(r#"{"name":"賢者","category":"advanced","mastered":true}"#)
                .unwrap();
        assert_eq!(rec.category, JobCategory::Advanced);
        assert!(rec.mastered);
    }

    #[test]
    fn record_is_always_written_structured() {
        let rec: JobRecord = serde_json::from_str(r#""僧侶""#).unwrap();
        let json = serde_json::to_string(&rec).unwrap();
        assert_eq!(json, r#"{"name":"僧侶","category":"basic","mastered":false}"#);
    }

    #[test]
    fn legacy_entry_with_mixed_jobs() {
        let json = r#"{
            "timestamp": 1700000000000,
            "phase": 2,
            "phaseLabel": "アイラ加入",
            "timing": "",
            "assignments": [
                {"character": "主人公", "jobs": ["戦士", {"name": "僧侶", "category": "basic", "mastered": true}]}
            ]
        }"#;
        let entry: HistoryEntry = serde_json::from_str(json).unwrap();
        let jobs = &entry.assignments[0].jobs;
        assert_eq!(jobs.len(), 2);
        assert!(!jobs[0].mastered);
        assert!(jobs[1].mastered);
        assert_eq!(entry.phase_display(), "アイラ加入");
    }

    #[test]
    fn phase_display_falls_back_to_number() {
        let entry = HistoryEntry {
            timestamp: 0,
            phase: 3,
            phase_label: None,
            timing: String::new(),
            assignments: vec![],
        };
        assert_eq!(entry.phase_display(), "Phase 3");
    }

    #[test]
    fn job_slots_flatten_in_order() {
        let entry = HistoryEntry {
            timestamp: 0,
            phase: 2,
            phase_label: None,
            timing: String::new(),
            assignments: vec![
                Assignment {
                    character: "主人公".into(),
                    jobs: vec![
                        JobRecord::new("戦士", JobCategory::Basic),
                        JobRecord::new("僧侶", JobCategory::Basic),
                    ],
                },
                Assignment {
                    character: "ガボ".into(),
                    jobs: vec![JobRecord::new("盗賊", JobCategory::Basic)],
                },
            ],
        };
        let slots: Vec<(&str, &str)> = entry
            .job_slots()
            .map(|(c, j)| (c, j.name.as_str()))
            .collect();
        assert_eq!(
            slots,
            vec![("主人公", "戦士"), ("主人公", "僧侶"), ("ガボ", "盗賊")]
        );
    }

    #[test]
    fn log_truncation() {
        let mut s = Session::new();
        for i in 0..40 {
            s.add_log(&format!("msg {}", i));
        }
        assert_eq!(s.log.len(), MAX_LOG);
        assert_eq!(s.log.last().map(String::as_str), Some("msg 39"));
    }

    #[test]
    fn initial_session() {
        let s = Session::new();
        assert_eq!(s.phase, Phase::One);
        assert!(!s.is_rolling());
        assert!(s.history.is_empty());
        assert_eq!(s.screen, Screen::Main);
        assert_eq!(s.prompt, Prompt::None);
    }
}
