//! Job Roulette: eligibility engine and draw sequencing (no rendering / IO).

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, FixedOffset};

use super::state::{
    characters_for_phase, prerequisite, Assignment, Character, DrawOptions, HistoryEntry,
    JobCategory, JobRecord, MasteredJobs, PendingDraw, Phase, PoolJob, Prerequisite, Prompt,
    RevealStep, Screen, Session, ADVANCED_JOBS, BASIC_JOBS, FRAME_BASE_MS, FRAME_JITTER,
    FRAME_SLOWDOWN_MS, MASTER_JOBS, MAX_HISTORY, MIN_FRAMES, SLOWDOWN_FRAMES,
};

// ── RNG ───────────────────────────────────────────────────────────────

/// Source of uniform picks for the selector and the reveal animation.
pub trait JobRng {
    /// Uniform index in `0..n`. Callers never pass `n == 0`.
    fn below(&mut self, n: usize) -> usize;
}

fn next_rng(seed: u64) -> u64 {
    seed.wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407)
}

#[derive(Clone, Debug)]
pub struct SeededRng {
    pub seed: u64,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl JobRng for SeededRng {
    fn below(&mut self, n: usize) -> usize {
        self.seed = next_rng(self.seed);
        ((self.seed >> 33) % n as u64) as usize
    }
}

// ── Mastery ───────────────────────────────────────────────────────────

/// Collect, per character, every job flagged mastered anywhere in history.
pub fn compute_mastered_jobs(history: &[HistoryEntry]) -> MasteredJobs {
    let mut mastered = MasteredJobs::new();
    for assignment in history.iter().flat_map(|e| e.assignments.iter()) {
        for job in assignment.jobs.iter().filter(|j| j.mastered) {
            mastered
                .entry(assignment.character.clone())
                .or_default()
                .insert(job.name.clone());
        }
    }
    mastered
}

/// Flip the mastered flag of one job in one entry.
///
/// Returns a new history, or `None` when the entry, the character's
/// assignment or the job cannot be found. The input is never modified.
pub fn toggle_mastered_in_history(
    history: &[HistoryEntry],
    index: usize,
    character: &str,
    job: &str,
) -> Option<Vec<HistoryEntry>> {
    let entry = history.get(index)?;
    let a_idx = entry
        .assignments
        .iter()
        .position(|a| a.character == character)?;
    let j_idx = entry.assignments[a_idx]
        .jobs
        .iter()
        .position(|j| j.name == job)?;
    toggle_mastered_at(history, index, a_idx, j_idx)
}

/// Flip one job addressed by position: entry, assignment, job.
///
/// Needed when one character holds the same job name in both slots.
pub fn toggle_mastered_at(
    history: &[HistoryEntry],
    index: usize,
    assignment: usize,
    job: usize,
) -> Option<Vec<HistoryEntry>> {
    history
        .get(index)?
        .assignments
        .get(assignment)?
        .jobs
        .get(job)?;

    let mut updated = history.to_vec();
    let record = &mut updated[index].assignments[assignment].jobs[job];
    record.mastered = !record.mastered;
    Some(updated)
}

/// Job names the character held in the most recent entry.
///
/// Only the latest entry counts: if the character sat out that draw, the
/// result is empty.
pub fn previous_jobs(character: &str, history: &[HistoryEntry]) -> Vec<String> {
    history
        .first()
        .and_then(|latest| latest.assignment_for(character))
        .map(|a| a.jobs.iter().map(|j| j.name.clone()).collect())
        .unwrap_or_default()
}

/// True when the character has never been assigned a job.
pub fn is_first_draw(character: &str, history: &[HistoryEntry]) -> bool {
    !history
        .iter()
        .any(|e| e.assignment_for(character).is_some())
}

// ── Prerequisites ─────────────────────────────────────────────────────

/// Evaluate a rule against one character's mastered set.
pub fn rule_satisfied(rule: &Prerequisite, mastered: &BTreeSet<String>) -> bool {
    match rule {
        Prerequisite::All(requires) => requires.iter().all(|j| mastered.contains(*j)),
        Prerequisite::Count { requires, count } => {
            requires.iter().filter(|j| mastered.contains(**j)).count() >= *count
        }
        // Master-tier jobs never count here.
        Prerequisite::AdvancedCount(count) => {
            ADVANCED_JOBS
                .iter()
                .filter(|j| mastered.contains(**j))
                .count()
                >= *count
        }
    }
}

pub fn check_prerequisites(character: &str, job: &str, mastered: &MasteredJobs) -> bool {
    let Some(rule) = prerequisite(job) else {
        return true;
    };
    let empty = BTreeSet::new();
    rule_satisfied(&rule, mastered.get(character).unwrap_or(&empty))
}

// ── Pool ──────────────────────────────────────────────────────────────

/// Inputs for building one character's pool.
pub struct PoolRequest<'a> {
    pub mastered: &'a MasteredJobs,
    pub options: DrawOptions,
    pub prev_jobs: &'a [String],
    /// Unique jobs are withheld on a character's first draw.
    pub first_draw: bool,
}

pub fn should_exclude(
    job: &str,
    prev_jobs: &[String],
    own_mastered: &BTreeSet<String>,
    options: DrawOptions,
) -> bool {
    (options.exclude_prev && prev_jobs.iter().any(|p| p == job))
        || (options.exclude_mastered && own_mastered.contains(job))
}

/// Eligible jobs in pool order: unique, basic, advanced, master.
pub fn available_jobs(character: &Character, req: &PoolRequest) -> Vec<PoolJob> {
    let empty = BTreeSet::new();
    let own = req.mastered.get(character.name).unwrap_or(&empty);
    let keep = |job: &str| !should_exclude(job, req.prev_jobs, own, req.options);
    let unlocked = |job: &str| check_prerequisites(character.name, job, req.mastered);

    let mut jobs = Vec::new();

    if !req.first_draw && keep(character.unique_job) {
        jobs.push(PoolJob {
            name: character.unique_job,
            category: JobCategory::Unique,
        });
    }

    jobs.extend(
        BASIC_JOBS
            .iter()
            .filter(|&&name| keep(name))
            .map(|&name| PoolJob {
                name,
                category: JobCategory::Basic,
            }),
    );

    for (names, category) in [
        (&ADVANCED_JOBS[..], JobCategory::Advanced),
        (&MASTER_JOBS[..], JobCategory::Master),
    ] {
        jobs.extend(
            names
                .iter()
                .filter(|&&name| unlocked(name) && keep(name))
                .map(|&name| PoolJob { name, category }),
        );
    }

    jobs
}

// ── Selector ──────────────────────────────────────────────────────────

/// Pick uniformly among pool entries not named in `exclude`.
///
/// When `exclude` covers the whole pool, picks from the whole pool instead.
/// `None` only for an empty pool.
pub fn pick_random_job<'p>(
    pool: &'p [PoolJob],
    exclude: &[&str],
    rng: &mut impl JobRng,
) -> Option<&'p PoolJob> {
    if pool.is_empty() {
        return None;
    }
    let filtered: Vec<&PoolJob> = pool
        .iter()
        .filter(|j| !exclude.contains(&j.name))
        .collect();
    if filtered.is_empty() {
        return pool.get(rng.below(pool.len()));
    }
    filtered.get(rng.below(filtered.len())).copied()
}

// ── Draw ──────────────────────────────────────────────────────────────

/// Decide every slot of a draw up front and lay out its reveal steps.
///
/// Characters with an empty pool are skipped. `None` when nobody can draw.
pub fn plan_draw(
    history: &[HistoryEntry],
    phase: Phase,
    options: DrawOptions,
    timing: &str,
    rng: &mut impl JobRng,
) -> Option<PendingDraw> {
    let mastered = compute_mastered_jobs(history);
    let dual = phase.info().dual_job;

    let mut assignments = Vec::new();
    let mut pools = Vec::new();
    let mut steps = Vec::new();

    for character in characters_for_phase(phase) {
        let prev_jobs = previous_jobs(character.name, history);
        let req = PoolRequest {
            mastered: &mastered,
            options,
            prev_jobs: &prev_jobs,
            first_draw: is_first_draw(character.name, history),
        };
        let pool = available_jobs(character, &req);
        let Some(main) = pick_random_job(&pool, &[], rng).cloned() else {
            continue;
        };

        let mut jobs = vec![JobRecord::new(main.name, main.category)];
        if dual {
            if let Some(sub) = pick_random_job(&pool, &[main.name], rng) {
                jobs.push(JobRecord::new(sub.name, sub.category));
            }
        }

        let card = assignments.len();
        for slot in 0..jobs.len() {
            steps.push(new_step(card, slot, &pool, rng));
        }
        assignments.push(Assignment {
            character: character.name.to_string(),
            jobs,
        });
        pools.push(pool);
    }

    if assignments.is_empty() {
        return None;
    }

    Some(PendingDraw {
        phase,
        timing: timing.trim().to_string(),
        assignments,
        pools,
        steps,
        current: 0,
    })
}

fn new_step(card: usize, slot: usize, pool: &[PoolJob], rng: &mut impl JobRng) -> RevealStep {
    RevealStep {
        card,
        slot,
        total_frames: MIN_FRAMES + rng.below(FRAME_JITTER as usize) as u32,
        frame: 0,
        elapsed_ms: 0.0,
        shown: pool[rng.below(pool.len())].name,
    }
}

/// Delay after `frame`: constant, then growing over the last few frames.
pub fn frame_delay_ms(frame: u32, total_frames: u32) -> f64 {
    let slow_from = total_frames.saturating_sub(SLOWDOWN_FRAMES);
    if frame > slow_from {
        FRAME_BASE_MS + (frame - slow_from) as f64 * FRAME_SLOWDOWN_MS
    } else {
        FRAME_BASE_MS
    }
}

/// Total time a step takes to lock.
pub fn step_duration_ms(total_frames: u32) -> f64 {
    (0..total_frames).map(|f| frame_delay_ms(f, total_frames)).sum()
}

/// Feed elapsed time into the reveal. Steps run strictly one after another.
pub fn advance_reveal(draw: &mut PendingDraw, elapsed_ms: f64, rng: &mut impl JobRng) {
    let mut remaining = elapsed_ms;
    while remaining > 0.0 && !draw.is_finished() {
        let step = &mut draw.steps[draw.current];
        let needed = frame_delay_ms(step.frame, step.total_frames) - step.elapsed_ms;
        if remaining < needed {
            step.elapsed_ms += remaining;
            break;
        }
        remaining -= needed;
        step.elapsed_ms = 0.0;
        step.frame += 1;
        if step.frame >= step.total_frames {
            draw.current += 1;
        } else if let Some(pool) = draw.pools.get(step.card) {
            if !pool.is_empty() {
                step.shown = pool[rng.below(pool.len())].name;
            }
        }
    }
}

/// What a card slot shows during a draw.
#[derive(Debug, PartialEq)]
pub enum SlotView<'a> {
    Waiting,
    Rolling(&'a str),
    Decided(&'a JobRecord),
}

pub fn slot_view(draw: &PendingDraw, card: usize, slot: usize) -> SlotView<'_> {
    let Some(idx) = draw
        .steps
        .iter()
        .position(|s| s.card == card && s.slot == slot)
    else {
        return SlotView::Waiting;
    };
    if idx < draw.current {
        match draw.assignments.get(card).and_then(|a| a.jobs.get(slot)) {
            Some(job) => SlotView::Decided(job),
            None => SlotView::Waiting,
        }
    } else if idx == draw.current {
        SlotView::Rolling(draw.steps[idx].shown)
    } else {
        SlotView::Waiting
    }
}

/// Begin a draw for the current phase. Rejected while one is in flight.
pub fn start_draw(session: &mut Session) -> bool {
    if session.is_rolling() {
        session.add_log("抽選中です。終わるまでお待ちください");
        return false;
    }
    let mut rng = SeededRng::new(session.rng_seed);
    let planned = plan_draw(
        &session.history,
        session.phase,
        session.options,
        &session.timing,
        &mut rng,
    );
    session.rng_seed = rng.seed;

    match planned {
        Some(draw) => {
            session.last_result.clear();
            session.add_log(&format!(
                "ルーレット開始 (Phase {} {})",
                draw.phase.number(),
                draw.phase.info().label
            ));
            session.draw = Some(draw);
            true
        }
        None => {
            session.add_log("抽選できる職業がありません");
            false
        }
    }
}

/// Advance the in-flight draw. Returns true when it completed on this call
/// (history gained an entry).
pub fn advance_draw(session: &mut Session, elapsed_ms: f64, now_ms: i64) -> bool {
    let Some(draw) = session.draw.as_mut() else {
        return false;
    };
    let mut rng = SeededRng::new(session.rng_seed);
    advance_reveal(draw, elapsed_ms, &mut rng);
    session.rng_seed = rng.seed;

    if !draw.is_finished() {
        return false;
    }
    match session.draw.take() {
        Some(done) => {
            finish_draw(session, done, now_ms);
            true
        }
        None => false,
    }
}

fn finish_draw(session: &mut Session, draw: PendingDraw, now_ms: i64) {
    for a in &draw.assignments {
        let names: Vec<&str> = a.jobs.iter().map(|j| j.name.as_str()).collect();
        session.add_log(&format!("{} → {}", a.character, names.join(" / ")));
    }

    let entry = HistoryEntry {
        timestamp: now_ms,
        phase: draw.phase.number(),
        phase_label: Some(draw.phase.info().label.to_string()),
        timing: draw.timing,
        assignments: draw.assignments.clone(),
    };
    push_history(&mut session.history, entry);
    session.last_result = draw.assignments;
    session.selected_entry = 0;
}

// ── Session Controls ──────────────────────────────────────────────────

pub fn set_phase(session: &mut Session, phase: Phase) -> bool {
    if session.is_rolling() {
        return false;
    }
    if session.phase == phase {
        return false;
    }
    session.phase = phase;
    session.last_result.clear();
    session.add_log(&format!(
        "Phase {} {} に切り替え",
        phase.number(),
        phase.info().label
    ));
    true
}

pub fn toggle_exclude_prev(session: &mut Session) {
    session.options.exclude_prev = !session.options.exclude_prev;
    let state = on_off(session.options.exclude_prev);
    session.add_log(&format!("直前の職を除外: {state}"));
}

pub fn toggle_exclude_mastered(session: &mut Session) {
    session.options.exclude_mastered = !session.options.exclude_mastered;
    let state = on_off(session.options.exclude_mastered);
    session.add_log(&format!("マスター済みを除外: {state}"));
}

pub fn on_off(flag: bool) -> &'static str {
    if flag {
        "ON"
    } else {
        "OFF"
    }
}

/// Maximum length of the session label, in characters.
pub const MAX_TIMING_CHARS: usize = 40;

pub fn push_timing_char(session: &mut Session, c: char) -> bool {
    if c.is_control() || session.timing.chars().count() >= MAX_TIMING_CHARS {
        return false;
    }
    session.timing.push(c);
    true
}

pub fn pop_timing_char(session: &mut Session) -> bool {
    session.timing.pop().is_some()
}

// ── History ───────────────────────────────────────────────────────────

/// Prepend an entry, dropping the oldest beyond [`MAX_HISTORY`].
pub fn push_history(history: &mut Vec<HistoryEntry>, entry: HistoryEntry) {
    history.insert(0, entry);
    history.truncate(MAX_HISTORY);
}

pub fn delete_history_entry(history: &mut Vec<HistoryEntry>, index: usize) -> bool {
    if index >= history.len() {
        return false;
    }
    history.remove(index);
    true
}

/// Union of both histories keyed by timestamp (existing entries win),
/// newest first, capped at [`MAX_HISTORY`].
pub fn merge_history(existing: &[HistoryEntry], imported: &[HistoryEntry]) -> Vec<HistoryEntry> {
    let mut by_time: BTreeMap<i64, HistoryEntry> = BTreeMap::new();
    for entry in existing.iter().chain(imported.iter()) {
        by_time
            .entry(entry.timestamp)
            .or_insert_with(|| entry.clone());
    }
    by_time
        .into_values()
        .rev()
        .take(MAX_HISTORY)
        .collect()
}

/// Imported entries alone, newest first, capped at [`MAX_HISTORY`].
pub fn replace_history(imported: Vec<HistoryEntry>) -> Vec<HistoryEntry> {
    let mut history = imported;
    history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    history.truncate(MAX_HISTORY);
    history
}

fn clamp_selection(session: &mut Session) {
    session.selected_entry = session
        .selected_entry
        .min(session.history.len().saturating_sub(1));
}

pub fn select_entry(session: &mut Session, index: usize) -> bool {
    if index >= session.history.len() {
        return false;
    }
    session.selected_entry = index;
    true
}

pub fn move_selection(session: &mut Session, down: bool) -> bool {
    if down {
        select_entry(session, session.selected_entry + 1)
    } else if session.selected_entry > 0 {
        select_entry(session, session.selected_entry - 1)
    } else {
        false
    }
}

/// Toggle the n-th job (flattened across assignments) of the selected entry.
pub fn toggle_selected_job(session: &mut Session, slot: usize) -> bool {
    let index = session.selected_entry;
    let Some(entry) = session.history.get(index) else {
        return false;
    };
    let Some((a_idx, j_idx)) = entry
        .assignments
        .iter()
        .enumerate()
        .flat_map(|(a, asg)| (0..asg.jobs.len()).map(move |j| (a, j)))
        .nth(slot)
    else {
        return false;
    };

    match toggle_mastered_at(&session.history, index, a_idx, j_idx) {
        Some(updated) => {
            session.history = updated;
            let assignment = &session.history[index].assignments[a_idx];
            let record = &assignment.jobs[j_idx];
            let mark = if record.mastered { "★ マスター" } else { "☆ 未マスター" };
            let line = format!("{} の {}: {mark}", assignment.character, record.name);
            session.add_log(&line);
            true
        }
        None => false,
    }
}

pub fn delete_selected_entry(session: &mut Session) -> bool {
    if !delete_history_entry(&mut session.history, session.selected_entry) {
        return false;
    }
    clamp_selection(session);
    session.add_log("履歴を1件削除しました");
    true
}

pub fn request_clear(session: &mut Session) -> bool {
    if session.history.is_empty() {
        return false;
    }
    session.prompt = Prompt::ConfirmClear;
    true
}

pub fn clear_history(session: &mut Session) {
    session.history.clear();
    session.selected_entry = 0;
    session.prompt = Prompt::None;
    session.add_log("履歴とマスター状況を全て削除しました");
}

/// How an import is combined with existing history.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ImportMode {
    Merge,
    Replace,
}

/// Stage imported entries. Applied immediately when history is empty,
/// otherwise the user is asked to merge or replace.
pub fn offer_import(session: &mut Session, imported: Vec<HistoryEntry>) {
    if session.history.is_empty() {
        apply_import(session, imported, ImportMode::Replace);
    } else {
        session.add_log(&format!(
            "{}件を読み込みました。マージ / 上書きを選んでください",
            imported.len()
        ));
        session.prompt = Prompt::ConfirmImport(imported);
    }
}

pub fn apply_import(session: &mut Session, imported: Vec<HistoryEntry>, mode: ImportMode) {
    let count = imported.len();
    session.history = match mode {
        ImportMode::Merge => merge_history(&session.history, &imported),
        ImportMode::Replace => replace_history(imported),
    };
    session.prompt = Prompt::None;
    session.screen = Screen::History;
    clamp_selection(session);
    let how = match mode {
        ImportMode::Merge => "マージ",
        ImportMode::Replace => "上書き",
    };
    session.add_log(&format!("{count}件をインポート ({how})"));
}

// ── Formatting ────────────────────────────────────────────────────────

/// `YYYY/MM/DD HH:MM` for a millisecond timestamp.
///
/// `offset_minutes` follows `Date.getTimezoneOffset()`: minutes to add to
/// local time to get UTC (JST is -540).
pub fn format_time(timestamp_ms: i64, offset_minutes: i32) -> String {
    let Some(utc) = DateTime::from_timestamp_millis(timestamp_ms) else {
        return "----/--/-- --:--".to_string();
    };
    match FixedOffset::west_opt(offset_minutes * 60) {
        Some(offset) => utc.with_timezone(&offset).format("%Y/%m/%d %H:%M").to_string(),
        None => utc.format("%Y/%m/%d %H:%M").to_string(),
    }
}
