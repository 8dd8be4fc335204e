//! Semantic action IDs for Job Roulette click targets.

// ── Main screen ──────────────────────────────────────────────
pub const PHASE_BASE: u16 = 1; // +index 0..2
pub const TOGGLE_EXCLUDE_PREV: u16 = 10;
pub const TOGGLE_EXCLUDE_MASTERED: u16 = 11;
pub const EDIT_TIMING: u16 = 12;
pub const START_DRAW: u16 = 13;
pub const GO_HISTORY: u16 = 14;

// ── History screen ───────────────────────────────────────────
pub const BACK: u16 = 20;
pub const DELETE_ENTRY: u16 = 30;
pub const CLEAR_HISTORY: u16 = 31;
pub const EXPORT: u16 = 32;
pub const IMPORT: u16 = 33;
pub const SELECT_ENTRY_BASE: u16 = 100; // +entry index 0..49
pub const TOGGLE_JOB_BASE: u16 = 200; // +job slot 0..9

// ── Prompts ──────────────────────────────────────────────────
pub const CONFIRM_YES: u16 = 40;
pub const CONFIRM_NO: u16 = 41;
pub const IMPORT_MERGE: u16 = 42;
pub const IMPORT_REPLACE: u16 = 43;
pub const FINISH_EDIT: u16 = 44;
