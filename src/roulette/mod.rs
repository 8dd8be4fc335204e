//! Job Roulette: random job assignments for the party, gated by mastery.

pub mod actions;
pub mod logic;
pub mod render;
pub mod save;
pub mod state;

use std::cell::RefCell;
use std::rc::Rc;

use ratzilla::ratatui::layout::Rect;
use ratzilla::ratatui::Frame;

use crate::input::{ClickState, InputEvent};
use crate::time::{self, TICKS_PER_SEC};

use actions::*;
use logic::ImportMode;
use state::{Prompt, Screen, Session, ALL_PHASES};

pub struct RouletteApp {
    pub session: Session,
}

impl RouletteApp {
    pub fn new() -> Self {
        let session = Session::new();

        #[cfg(target_arch = "wasm32")]
        let session = {
            let mut s = session;
            save::remove_legacy_data();
            if save::load_history(&mut s) {
                let n = s.history.len();
                s.add_log(&format!("履歴を{n}件ロードしました"));
            }
            save::load_prefs(&mut s);
            s.rng_seed = time::now_ms() as u64;
            s
        };

        Self { session }
    }

    /// Handle an input event. Returns true if the event was consumed.
    pub fn handle_input(&mut self, event: &InputEvent) -> bool {
        let consumed = match event {
            InputEvent::Click(id) => self.handle_click(*id),
            other => self.handle_key_event(other),
        };
        if consumed {
            #[cfg(target_arch = "wasm32")]
            save::save_all(&self.session);
        }
        consumed
    }

    /// Advance the reveal animation by `delta_ticks`.
    pub fn tick(&mut self, delta_ticks: u32) {
        if delta_ticks == 0 || !self.session.is_rolling() {
            return;
        }
        let elapsed = delta_ticks as f64 * 1000.0 / TICKS_PER_SEC as f64;
        if logic::advance_draw(&mut self.session, elapsed, time::now_ms()) {
            #[cfg(target_arch = "wasm32")]
            save::save_history(&self.session);
        }
    }

    pub fn render(&self, f: &mut Frame, area: Rect, click_state: &Rc<RefCell<ClickState>>) {
        render::render(&self.session, f, area, click_state);
    }

    /// Parse an import document and stage it (merge/replace prompt if needed).
    pub fn import_text(&mut self, text: &str) {
        match save::parse_import(text) {
            Ok(entries) => logic::offer_import(&mut self.session, entries),
            Err(e) => self.session.add_log(&format!("インポート失敗: {e}")),
        }
    }

    fn import(&mut self) -> bool {
        match save::read_import_text() {
            Some(text) => self.import_text(&text),
            None => self.session.add_log(&format!(
                "インポートするJSONを localStorage の {} に置いてください",
                save::IMPORT_KEY
            )),
        }
        true
    }

    fn export(&mut self) -> bool {
        if self.session.history.is_empty() {
            self.session.add_log("エクスポートする履歴がありません");
            return true;
        }
        match save::export_json(&self.session, time::now_ms()) {
            Ok(json) => {
                if save::write_export(&json) {
                    let n = self.session.history.len();
                    self.session
                        .add_log(&format!("{n}件を {} に書き出しました", save::EXPORT_KEY));
                } else {
                    self.session.add_log("エクスポートはブラウザでのみ利用できます");
                }
            }
            Err(e) => self.session.add_log(&format!("エクスポート失敗: {e}")),
        }
        true
    }

    fn select_phase(&mut self, index: usize) -> bool {
        match ALL_PHASES.get(index) {
            Some(&phase) => {
                if self.session.is_rolling() {
                    self.session.add_log("抽選中はフェーズを変更できません");
                    return true;
                }
                logic::set_phase(&mut self.session, phase)
            }
            None => false,
        }
    }

    fn start_edit(&mut self) -> bool {
        self.session.prompt = Prompt::EditTiming;
        true
    }

    fn finish_edit(&mut self) -> bool {
        self.session.prompt = Prompt::None;
        let label = self.session.timing.trim().to_string();
        if label.is_empty() {
            self.session.add_log("タイミングのメモを消去しました");
        } else {
            self.session.add_log(&format!("タイミング: {label}"));
        }
        true
    }

    fn go_back(&mut self) -> bool {
        match self.session.screen {
            Screen::History => {
                self.session.screen = Screen::Main;
                true
            }
            Screen::Main => false,
        }
    }

    fn cancel_prompt(&mut self) -> bool {
        if matches!(self.session.prompt, Prompt::ConfirmImport(_)) {
            self.session.add_log("インポートを取り消しました");
        }
        self.session.prompt = Prompt::None;
        true
    }

    fn resolve_import(&mut self, mode: ImportMode) -> bool {
        match std::mem::replace(&mut self.session.prompt, Prompt::None) {
            Prompt::ConfirmImport(entries) => {
                logic::apply_import(&mut self.session, entries, mode);
                true
            }
            other => {
                self.session.prompt = other;
                false
            }
        }
    }

    fn handle_key_event(&mut self, event: &InputEvent) -> bool {
        // Label editing swallows everything.
        if self.session.prompt == Prompt::EditTiming {
            return match event {
                InputEvent::Key(c) => logic::push_timing_char(&mut self.session, *c),
                InputEvent::Backspace => logic::pop_timing_char(&mut self.session),
                InputEvent::Enter | InputEvent::Esc => self.finish_edit(),
                InputEvent::Click(_) => false,
            };
        }

        match event {
            InputEvent::Key(c) => self.handle_key(*c),
            InputEvent::Esc => match self.session.prompt {
                Prompt::None => self.go_back(),
                _ => self.cancel_prompt(),
            },
            _ => false,
        }
    }

    fn handle_key(&mut self, key: char) -> bool {
        match self.session.prompt {
            Prompt::ConfirmClear => {
                return match key {
                    'y' => {
                        logic::clear_history(&mut self.session);
                        true
                    }
                    'n' => self.cancel_prompt(),
                    _ => false,
                };
            }
            Prompt::ConfirmImport(_) => {
                return match key {
                    'm' => self.resolve_import(ImportMode::Merge),
                    'o' => self.resolve_import(ImportMode::Replace),
                    'n' => self.cancel_prompt(),
                    _ => false,
                };
            }
            Prompt::None | Prompt::EditTiming => {}
        }

        match self.session.screen {
            Screen::Main => match key {
                '1'..='3' => self.select_phase(key as usize - '1' as usize),
                'p' => { logic::toggle_exclude_prev(&mut self.session); true }
                'm' => { logic::toggle_exclude_mastered(&mut self.session); true }
                't' => self.start_edit(),
                ' ' | 'r' => logic::start_draw(&mut self.session),
                'h' => { self.session.screen = Screen::History; true }
                _ => false,
            },
            Screen::History => match key {
                'j' => logic::move_selection(&mut self.session, true),
                'k' => logic::move_selection(&mut self.session, false),
                '1'..='9' => logic::toggle_selected_job(&mut self.session, key as usize - '1' as usize),
                '0' => logic::toggle_selected_job(&mut self.session, 9),
                'd' => logic::delete_selected_entry(&mut self.session),
                'c' => logic::request_clear(&mut self.session),
                'e' => self.export(),
                'i' => self.import(),
                '-' => self.go_back(),
                _ => false,
            },
        }
    }

    fn handle_click(&mut self, action_id: u16) -> bool {
        if self.session.prompt == Prompt::EditTiming {
            return match action_id {
                FINISH_EDIT | EDIT_TIMING => self.finish_edit(),
                _ => false,
            };
        }

        match action_id {
            CONFIRM_YES if self.session.prompt == Prompt::ConfirmClear => {
                logic::clear_history(&mut self.session);
                true
            }
            CONFIRM_NO if self.session.prompt != Prompt::None => self.cancel_prompt(),
            IMPORT_MERGE => self.resolve_import(ImportMode::Merge),
            IMPORT_REPLACE => self.resolve_import(ImportMode::Replace),
            // Anything else is blocked while a prompt is open.
            _ if self.session.prompt != Prompt::None => false,

            id if (PHASE_BASE..PHASE_BASE + ALL_PHASES.len() as u16).contains(&id) => {
                self.select_phase((id - PHASE_BASE) as usize)
            }
            TOGGLE_EXCLUDE_PREV => {
                logic::toggle_exclude_prev(&mut self.session);
                true
            }
            TOGGLE_EXCLUDE_MASTERED => {
                logic::toggle_exclude_mastered(&mut self.session);
                true
            }
            EDIT_TIMING => self.start_edit(),
            START_DRAW => logic::start_draw(&mut self.session),
            GO_HISTORY => {
                self.session.screen = Screen::History;
                true
            }
            BACK => self.go_back(),
            DELETE_ENTRY => logic::delete_selected_entry(&mut self.session),
            CLEAR_HISTORY => logic::request_clear(&mut self.session),
            EXPORT => self.export(),
            IMPORT => self.import(),
            id if (SELECT_ENTRY_BASE..TOGGLE_JOB_BASE).contains(&id) => {
                logic::select_entry(&mut self.session, (id - SELECT_ENTRY_BASE) as usize)
            }
            id if id >= TOGGLE_JOB_BASE => {
                logic::toggle_selected_job(&mut self.session, (id - TOGGLE_JOB_BASE) as usize)
            }
            _ => false,
        }
    }
}
