//! Job Roulette rendering (read-only from session).

use std::cell::RefCell;
use std::rc::Rc;

use ratzilla::ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratzilla::ratatui::style::{Color, Modifier, Style};
use ratzilla::ratatui::text::{Line, Span};
use ratzilla::ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratzilla::ratatui::Frame;

use crate::input::{is_narrow_layout, ClickState};
use crate::time;
use crate::widgets::{scroll_to_show, ClickableList, TabBar};

use super::actions::*;
use super::logic::{compute_mastered_jobs, format_time, on_off, slot_view, SlotView};
use super::state::{
    characters_for_phase, HistoryEntry, JobCategory, JobRecord, Prompt, Screen, Session,
    ALL_PHASES, CHARACTERS,
};

pub fn render(
    session: &Session,
    f: &mut Frame,
    area: Rect,
    click_state: &Rc<RefCell<ClickState>>,
) {
    match session.screen {
        Screen::Main => render_main(session, f, area, click_state),
        Screen::History => render_history(session, f, area, click_state),
    }
}

fn key_span(key: &str) -> Span<'static> {
    Span::styled(
        format!(" [{key}] "),
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )
}

fn category_color(category: JobCategory) -> Color {
    match category {
        JobCategory::Unique => Color::Magenta,
        JobCategory::Basic => Color::White,
        JobCategory::Advanced => Color::Cyan,
        JobCategory::Master => Color::Yellow,
    }
}

fn job_span(job: &JobRecord) -> Span<'static> {
    Span::styled(
        format!("{} ({})", job.name, job.category.label()),
        Style::default()
            .fg(category_color(job.category))
            .add_modifier(Modifier::BOLD),
    )
}

fn borders_for(is_narrow: bool) -> Borders {
    if is_narrow {
        Borders::TOP | Borders::BOTTOM
    } else {
        Borders::ALL
    }
}

// ── Main Screen ────────────────────────────────────────────────────────

fn render_main(
    session: &Session,
    f: &mut Frame,
    area: Rect,
    click_state: &Rc<RefCell<ClickState>>,
) {
    let is_narrow = is_narrow_layout(area.width);
    let borders = borders_for(is_narrow);

    let slots = if session.phase.info().dual_job { 2 } else { 1 };
    let card_rows = characters_for_phase(session.phase).len() as u16 * (1 + slots) + 2;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),         // Phase tabs
            Constraint::Length(7),         // Options
            Constraint::Length(card_rows), // Cards
            Constraint::Min(3),            // Log / prompt
        ])
        .split(area);

    render_phase_tabs(session, f, chunks[0], borders, is_narrow, click_state);
    render_options(session, f, chunks[1], borders, click_state);
    render_cards(session, f, chunks[2], borders);
    render_footer(session, f, chunks[3], borders, click_state);
}

fn render_phase_tabs(
    session: &Session,
    f: &mut Frame,
    area: Rect,
    borders: Borders,
    is_narrow: bool,
    click_state: &Rc<RefCell<ClickState>>,
) {
    let rolling = session.is_rolling();
    let mut bar = TabBar::new(" │ ");
    for (i, phase) in ALL_PHASES.iter().enumerate() {
        let label = if is_narrow {
            format!("P{}", phase.number())
        } else {
            format!("{} {}", phase.number(), phase.info().label)
        };
        let style = if *phase == session.phase {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else if rolling {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Gray)
        };
        bar = bar.tab(label, style, PHASE_BASE + i as u16);
    }

    let title = if rolling {
        " 抽選中… "
    } else if is_narrow {
        " 職業ルーレット "
    } else {
        " DQ7 職業ルーレット - フェーズ選択 "
    };
    let block = Block::default()
        .borders(borders)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Span::styled(
            title,
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ));

    let mut cs = click_state.borrow_mut();
    bar.block(block).render(f, area, &mut cs);
}

fn option_line(key: &str, label: &str, flag: bool) -> Line<'static> {
    let color = if flag { Color::Green } else { Color::DarkGray };
    Line::from(vec![
        key_span(key),
        Span::styled(format!("{label}: "), Style::default().fg(Color::White)),
        Span::styled(
            on_off(flag),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
    ])
}

fn timing_line(session: &Session) -> Line<'static> {
    if session.prompt == Prompt::EditTiming {
        return Line::from(vec![
            key_span("Enter"),
            Span::styled("タイミング: ", Style::default().fg(Color::White)),
            Span::styled(
                format!("{}▌", session.timing),
                Style::default().fg(Color::Yellow),
            ),
            Span::styled("  (入力中)", Style::default().fg(Color::DarkGray)),
        ]);
    }
    let shown = if session.timing.trim().is_empty() {
        Span::styled("(未設定)", Style::default().fg(Color::DarkGray))
    } else {
        Span::styled(session.timing.clone(), Style::default().fg(Color::White))
    };
    Line::from(vec![
        key_span("t"),
        Span::styled("タイミング: ", Style::default().fg(Color::White)),
        shown,
    ])
}

fn render_options(
    session: &Session,
    f: &mut Frame,
    area: Rect,
    borders: Borders,
    click_state: &Rc<RefCell<ClickState>>,
) {
    let editing = session.prompt == Prompt::EditTiming;
    let mut cl = ClickableList::new();

    cl.push_clickable(
        option_line("p", "直前の職を除外", session.options.exclude_prev),
        TOGGLE_EXCLUDE_PREV,
    );
    cl.push_clickable(
        option_line("m", "マスター済みを除外", session.options.exclude_mastered),
        TOGGLE_EXCLUDE_MASTERED,
    );
    cl.push_clickable(
        timing_line(session),
        if editing { FINISH_EDIT } else { EDIT_TIMING },
    );

    let draw_label = if session.is_rolling() {
        Span::styled("抽選中…", Style::default().fg(Color::DarkGray))
    } else {
        Span::styled(
            "ルーレットを回す！",
            Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        )
    };
    cl.push_clickable(Line::from(vec![key_span("r"), draw_label]), START_DRAW);
    cl.push_clickable(
        Line::from(vec![
            key_span("h"),
            Span::styled(
                format!("履歴・マスター管理 ({}件)", session.history.len()),
                Style::default().fg(Color::White),
            ),
        ]),
        GO_HISTORY,
    );

    let mut cs = click_state.borrow_mut();
    cl.register_targets(area, &mut cs, 1, 1, 0);

    let block = Block::default()
        .borders(borders)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" オプション ");
    let widget = Paragraph::new(cl.into_lines()).block(block);
    f.render_widget(widget, area);
}

/// One job slot of a character card.
fn slot_line(session: &Session, character: &str, slot: usize, dual: bool) -> Line<'static> {
    let label = match (dual, slot) {
        (false, _) => "職業",
        (true, 0) => "メイン",
        _ => "サブ",
    };
    let waiting = |text: &'static str| Span::styled(text, Style::default().fg(Color::DarkGray));

    let body = match &session.draw {
        Some(draw) => match draw.assignments.iter().position(|a| a.character == character) {
            Some(card) => match slot_view(draw, card, slot) {
                SlotView::Rolling(name) => Span::styled(
                    format!("▶ {name}"),
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
                SlotView::Decided(job) => job_span(job),
                SlotView::Waiting => waiting("？？？"),
            },
            None => waiting("候補なし"),
        },
        None => match session
            .last_result
            .iter()
            .find(|a| a.character == character)
            .and_then(|a| a.jobs.get(slot))
        {
            Some(job) => job_span(job),
            None => waiting("---"),
        },
    };

    Line::from(vec![
        Span::styled(format!("   {label}: "), Style::default().fg(Color::Gray)),
        body,
    ])
}

fn render_cards(session: &Session, f: &mut Frame, area: Rect, borders: Borders) {
    let dual = session.phase.info().dual_job;
    let slots = if dual { 2 } else { 1 };

    let mut lines = Vec::new();
    for c in characters_for_phase(session.phase) {
        lines.push(Line::from(Span::styled(
            format!(" {} {}", c.emoji, c.name),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )));
        for slot in 0..slots {
            lines.push(slot_line(session, c.name, slot, dual));
        }
    }

    let title = if dual {
        " パーティ (メイン + サブ) "
    } else {
        " パーティ "
    };
    let block = Block::default()
        .borders(borders)
        .border_style(Style::default().fg(Color::Magenta))
        .title(title);
    let widget = Paragraph::new(lines).block(block);
    f.render_widget(widget, area);
}

// ── Footer (log or prompt) ─────────────────────────────────────────────

fn render_footer(
    session: &Session,
    f: &mut Frame,
    area: Rect,
    borders: Borders,
    click_state: &Rc<RefCell<ClickState>>,
) {
    match &session.prompt {
        Prompt::ConfirmClear => render_confirm_clear(f, area, borders, click_state),
        Prompt::ConfirmImport(entries) => {
            render_confirm_import(session, entries.len(), f, area, borders, click_state)
        }
        Prompt::None | Prompt::EditTiming => render_log(session, f, area, borders),
    }
}

fn footer_height(session: &Session) -> u16 {
    match session.prompt {
        Prompt::ConfirmClear => 5,
        Prompt::ConfirmImport(_) => 6,
        Prompt::None | Prompt::EditTiming => 6,
    }
}

fn render_confirm_clear(
    f: &mut Frame,
    area: Rect,
    borders: Borders,
    click_state: &Rc<RefCell<ClickState>>,
) {
    let mut cl = ClickableList::new();
    cl.push(Line::from(Span::styled(
        " 履歴とマスター状況を全て削除します。",
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    )));
    cl.push_clickable(
        Line::from(vec![key_span("y"), Span::raw("削除する")]),
        CONFIRM_YES,
    );
    cl.push_clickable(
        Line::from(vec![key_span("n"), Span::raw("やめる")]),
        CONFIRM_NO,
    );

    let mut cs = click_state.borrow_mut();
    cl.register_targets(area, &mut cs, 1, 1, 0);

    let block = Block::default()
        .borders(borders)
        .border_style(Style::default().fg(Color::Red))
        .title(" 確認 ");
    f.render_widget(Paragraph::new(cl.into_lines()).block(block), area);
}

fn render_confirm_import(
    session: &Session,
    incoming: usize,
    f: &mut Frame,
    area: Rect,
    borders: Borders,
    click_state: &Rc<RefCell<ClickState>>,
) {
    let mut cl = ClickableList::new();
    cl.push(Line::from(Span::styled(
        format!(
            " 読込 {incoming}件 / 現在 {}件",
            session.history.len()
        ),
        Style::default().fg(Color::White),
    )));
    cl.push_clickable(
        Line::from(vec![key_span("m"), Span::raw("マージ (重複は現在の履歴を優先)")]),
        IMPORT_MERGE,
    );
    cl.push_clickable(
        Line::from(vec![key_span("o"), Span::raw("上書き")]),
        IMPORT_REPLACE,
    );
    cl.push_clickable(
        Line::from(vec![key_span("n"), Span::raw("やめる")]),
        CONFIRM_NO,
    );

    let mut cs = click_state.borrow_mut();
    cl.register_targets(area, &mut cs, 1, 1, 0);

    let block = Block::default()
        .borders(borders)
        .border_style(Style::default().fg(Color::Green))
        .title(" インポート ");
    f.render_widget(Paragraph::new(cl.into_lines()).block(block), area);
}

fn render_log(session: &Session, f: &mut Frame, area: Rect, borders: Borders) {
    let max_lines = area.height.saturating_sub(2) as usize;
    let start = session.log.len().saturating_sub(max_lines);
    let lines: Vec<Line> = session.log[start..]
        .iter()
        .map(|msg| {
            Line::from(Span::styled(
                format!(" > {}", msg),
                Style::default().fg(Color::DarkGray),
            ))
        })
        .collect();

    let block = Block::default()
        .borders(borders)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" ログ ");
    let widget = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    f.render_widget(widget, area);
}

// ── History Screen ─────────────────────────────────────────────────────

fn render_history(
    session: &Session,
    f: &mut Frame,
    area: Rect,
    click_state: &Rc<RefCell<ClickState>>,
) {
    let is_narrow = is_narrow_layout(area.width);
    let borders = borders_for(is_narrow);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),                          // Toolbar
            Constraint::Length(CHARACTERS.len() as u16 + 2), // Mastery
            Constraint::Min(5),                             // Entries
            Constraint::Length(footer_height(session)),     // Log / prompt
        ])
        .split(area);

    render_toolbar(f, chunks[0], borders, is_narrow, click_state);
    render_mastery(session, f, chunks[1], borders);
    render_entries(session, f, chunks[2], borders, click_state);
    render_footer(session, f, chunks[3], borders, click_state);
}

fn render_toolbar(
    f: &mut Frame,
    area: Rect,
    borders: Borders,
    is_narrow: bool,
    click_state: &Rc<RefCell<ClickState>>,
) {
    let buttons: [(&str, &str, u16); 5] = [
        ("-", "戻る", BACK),
        ("d", "削除", DELETE_ENTRY),
        ("c", "全削除", CLEAR_HISTORY),
        ("e", "出力", EXPORT),
        ("i", "読込", IMPORT),
    ];
    let style = Style::default().fg(Color::White);
    let bar = buttons.iter().fold(TabBar::new("│"), |bar, (key, label, id)| {
        let text = if is_narrow {
            label.to_string()
        } else {
            format!("{key}:{label}")
        };
        bar.tab(text, style, *id)
    });

    let block = Block::default()
        .borders(borders)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Span::styled(
            " 履歴・マスター管理 ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ));
    let mut cs = click_state.borrow_mut();
    bar.block(block).render(f, area, &mut cs);
}

fn render_mastery(session: &Session, f: &mut Frame, area: Rect, borders: Borders) {
    let mastered = compute_mastered_jobs(&session.history);
    let lines: Vec<Line> = CHARACTERS
        .iter()
        .map(|c| {
            let jobs = mastered.get(c.name);
            let count = jobs.map_or(0, |j| j.len());
            let names = jobs
                .map(|j| j.iter().map(String::as_str).collect::<Vec<_>>().join(", "))
                .unwrap_or_default();
            Line::from(vec![
                Span::styled(
                    format!(" {} {} ★{count} ", c.emoji, c.name),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(names, Style::default().fg(Color::Yellow)),
            ])
        })
        .collect();

    let block = Block::default()
        .borders(borders)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" マスター済み ");
    let widget = Paragraph::new(lines).block(block);
    f.render_widget(widget, area);
}

fn entry_header(entry: &HistoryEntry, selected: bool, offset_minutes: i32) -> Line<'static> {
    let marker = if selected { "▶" } else { " " };
    let stars = entry.job_slots().filter(|(_, j)| j.mastered).count();
    let mut spans = vec![
        Span::styled(
            format!(" {marker} {} ", format_time(entry.timestamp, offset_minutes)),
            Style::default().fg(if selected { Color::Yellow } else { Color::Gray }),
        ),
        Span::styled(entry.phase_display(), Style::default().fg(Color::Cyan)),
    ];
    if !entry.timing.is_empty() {
        spans.push(Span::styled(
            format!(" 〈{}〉", entry.timing),
            Style::default().fg(Color::White),
        ));
    }
    if stars > 0 {
        spans.push(Span::styled(
            format!(" ★{stars}"),
            Style::default().fg(Color::Yellow),
        ));
    }
    Line::from(spans)
}

fn entry_summary(entry: &HistoryEntry) -> Line<'static> {
    let parts: Vec<String> = entry
        .assignments
        .iter()
        .map(|a| {
            let jobs: Vec<&str> = a.jobs.iter().map(|j| j.name.as_str()).collect();
            format!("{}:{}", a.character, jobs.join("/"))
        })
        .collect();
    Line::from(Span::styled(
        format!("     {}", parts.join("  ")),
        Style::default().fg(Color::DarkGray),
    ))
}

/// Number key bound to a job slot (`1`-`9`, then `0`).
fn slot_key(slot: usize) -> String {
    match slot {
        0..=8 => (slot + 1).to_string(),
        9 => "0".to_string(),
        _ => "・".to_string(),
    }
}

fn job_toggle_line(slot: usize, character: &str, job: &JobRecord) -> Line<'static> {
    let (mark, color) = if job.mastered {
        ("★", Color::Yellow)
    } else {
        ("☆", Color::DarkGray)
    };
    Line::from(vec![
        Span::raw("   "),
        key_span(&slot_key(slot)),
        Span::styled(mark, Style::default().fg(color)),
        Span::styled(format!(" {character}: "), Style::default().fg(Color::Gray)),
        job_span(job),
    ])
}

fn render_entries(
    session: &Session,
    f: &mut Frame,
    area: Rect,
    borders: Borders,
    click_state: &Rc<RefCell<ClickState>>,
) {
    let offset = time::local_offset_minutes();
    let mut cl = ClickableList::new();
    let mut focus = (0, 0);

    if session.history.is_empty() {
        cl.push(Line::from(Span::styled(
            " 履歴はまだありません。メイン画面でルーレットを回しましょう。",
            Style::default().fg(Color::DarkGray),
        )));
    }

    for (i, entry) in session.history.iter().enumerate() {
        let selected = i == session.selected_entry;
        cl.push_clickable(
            entry_header(entry, selected, offset),
            SELECT_ENTRY_BASE + i as u16,
        );
        if selected {
            let start = cl.last_index().unwrap_or(0);
            for (slot, (character, job)) in entry.job_slots().enumerate() {
                cl.push_clickable(
                    job_toggle_line(slot, character, job),
                    TOGGLE_JOB_BASE + slot as u16,
                );
            }
            focus = (start, cl.last_index().unwrap_or(start));
        } else {
            cl.push(entry_summary(entry));
        }
    }

    // Keep the selected entry's toggles in view, header first.
    let visible = area.height.saturating_sub(2) as usize;
    let scroll = scroll_to_show(focus.1, visible).min(focus.0 as u16);

    let mut cs = click_state.borrow_mut();
    cl.register_targets(area, &mut cs, 1, 1, scroll);

    let title = format!(
        " 履歴 {}件 (j/k 選択・数字でマスター切替) ",
        session.history.len()
    );
    let block = Block::default()
        .borders(borders)
        .border_style(Style::default().fg(Color::Green))
        .title(title);
    let widget = Paragraph::new(cl.into_lines())
        .block(block)
        .scroll((scroll, 0));
    f.render_widget(widget, area);
}
