//! Shared input handling: coordinate conversion, click targets, and event types.

use ratzilla::ratatui::layout::Rect;

/// Input events, normalized from keyboard, mouse, and touch sources.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// A printable key press.
    Key(char),
    /// Backspace (label editing).
    Backspace,
    /// Enter.
    Enter,
    /// Escape.
    Esc,
    /// A click/tap on a registered target, identified by a semantic action ID.
    Click(u16),
}

/// A region on screen that can be tapped/clicked to trigger an action.
#[derive(Debug, Clone)]
pub struct ClickTarget {
    /// The rectangular region (in terminal cell coordinates) for hit testing.
    pub rect: Rect,
    pub action_id: u16,
}

/// Shared state between the render loop and click handler.
pub struct ClickState {
    pub targets: Vec<ClickTarget>,
    pub terminal_cols: u16,
    pub terminal_rows: u16,
}

impl ClickState {
    pub fn new() -> Self {
        Self {
            targets: Vec::new(),
            terminal_cols: 0,
            terminal_rows: 0,
        }
    }

    pub fn clear_targets(&mut self) {
        self.targets.clear();
    }

    pub fn add_click_target(&mut self, rect: Rect, action_id: u16) {
        self.targets.push(ClickTarget { rect, action_id });
    }

    /// Register a full-row click target at the given row within an area.
    pub fn add_row_target(&mut self, area: Rect, row: u16, action_id: u16) {
        if row >= area.y && row < area.y + area.height {
            self.targets.push(ClickTarget {
                rect: Rect::new(area.x, row, area.width, 1),
                action_id,
            });
        }
    }

    /// Register click targets for a horizontal tab bar.
    ///
    /// Each entry in `tab_widths` is `(display_width, action_id)` of the padded
    /// label. Every tab covers its label plus half of the adjacent separators;
    /// the first and last tabs stretch to the edges of the area.
    pub fn register_tab_targets(
        &mut self,
        tab_widths: &[(u16, u16)],
        separator_width: u16,
        x: u16,
        y: u16,
        total_width: u16,
        height: u16,
    ) {
        let n = tab_widths.len();
        if n == 0 || total_width == 0 {
            return;
        }

        let mut starts: Vec<u16> = Vec::with_capacity(n);
        let mut cursor: u16 = 0;
        for (i, &(w, _)) in tab_widths.iter().enumerate() {
            if i > 0 {
                cursor += separator_width;
            }
            starts.push(cursor);
            cursor += w;
        }

        let ends: Vec<u16> = starts
            .iter()
            .zip(tab_widths)
            .map(|(&s, &(w, _))| s + w)
            .collect();

        for (i, &(_, action_id)) in tab_widths.iter().enumerate() {
            let left = if i == 0 {
                0
            } else {
                ends[i - 1] + (starts[i] - ends[i - 1]) / 2
            };
            let right = if i == n - 1 {
                total_width
            } else {
                ends[i] + (starts[i + 1] - ends[i]) / 2
            };

            let w = right.saturating_sub(left);
            if w > 0 {
                self.add_click_target(Rect::new(x + left, y, w, height), action_id);
            }
        }
    }

    /// Hit-test a cell against all targets. Later registrations win on overlap.
    pub fn hit_test(&self, col: u16, row: u16) -> Option<u16> {
        self.targets.iter().rev().find_map(|t| {
            let r = &t.rect;
            if col >= r.x && col < r.x + r.width && row >= r.y && row < r.y + r.height {
                Some(t.action_id)
            } else {
                None
            }
        })
    }
}

/// Whether a screen width (in columns) should use the narrow layout.
pub fn is_narrow_layout(width: u16) -> bool {
    width < 60
}

/// Convert a pixel Y coordinate (relative to the grid's top edge) to a row.
pub fn pixel_y_to_row(click_y: f64, grid_height: f64, terminal_rows: u16) -> Option<u16> {
    if grid_height <= 0.0 || terminal_rows == 0 || click_y < 0.0 {
        return None;
    }
    let cell_height = grid_height / terminal_rows as f64;
    let row = (click_y / cell_height) as u16;
    if row >= terminal_rows {
        None
    } else {
        Some(row)
    }
}

/// Convert a pixel X coordinate (relative to the grid's left edge) to a column.
pub fn pixel_x_to_col(click_x: f64, grid_width: f64, terminal_cols: u16) -> Option<u16> {
    if grid_width <= 0.0 || terminal_cols == 0 || click_x < 0.0 {
        return None;
    }
    let cell_width = grid_width / terminal_cols as f64;
    let col = (click_x / cell_width) as u16;
    if col >= terminal_cols {
        None
    } else {
        Some(col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── hit_test ──────────────────────────────────────────────

    #[test]
    fn hit_test_rows() {
        let mut cs = ClickState::new();
        cs.add_click_target(Rect::new(0, 10, 80, 1), 1);
        cs.add_click_target(Rect::new(0, 11, 80, 1), 2);

        assert_eq!(cs.hit_test(5, 10), Some(1));
        assert_eq!(cs.hit_test(5, 11), Some(2));
        assert_eq!(cs.hit_test(5, 9), None);
        assert_eq!(cs.hit_test(5, 12), None);
    }

    #[test]
    fn hit_test_card_block() {
        // A three-row character card.
        let mut cs = ClickState::new();
        cs.add_click_target(Rect::new(0, 5, 40, 3), 13);

        assert_eq!(cs.hit_test(10, 4), None);
        assert_eq!(cs.hit_test(10, 5), Some(13));
        assert_eq!(cs.hit_test(10, 7), Some(13));
        assert_eq!(cs.hit_test(10, 8), None);
    }

    #[test]
    fn hit_test_later_target_wins() {
        let mut cs = ClickState::new();
        // History entry row, then a job toggle drawn on top of part of it.
        cs.add_click_target(Rect::new(0, 5, 80, 1), 100);
        cs.add_click_target(Rect::new(5, 5, 10, 1), 200);

        assert_eq!(cs.hit_test(7, 5), Some(200));
        assert_eq!(cs.hit_test(0, 5), Some(100));
        assert_eq!(cs.hit_test(20, 5), Some(100));
    }

    #[test]
    fn clear_removes_targets() {
        let mut cs = ClickState::new();
        cs.add_click_target(Rect::new(0, 1, 80, 1), 1);
        cs.clear_targets();
        assert!(cs.targets.is_empty());
        assert_eq!(cs.hit_test(0, 1), None);
    }

    #[test]
    fn row_target_outside_area_ignored() {
        let mut cs = ClickState::new();
        let area = Rect::new(5, 10, 30, 5);
        cs.add_row_target(area, 9, 1);
        cs.add_row_target(area, 15, 2);
        cs.add_row_target(area, 12, 3);

        assert_eq!(cs.targets.len(), 1);
        assert_eq!(cs.hit_test(15, 12), Some(3));
    }

    // ── tab targets ───────────────────────────────────────────

    #[test]
    fn phase_tabs_split_separators() {
        // " Phase 1 " = 9 cols, separator " │ " = 3 cols.
        let mut cs = ClickState::new();
        cs.register_tab_targets(&[(9, 1), (9, 2), (9, 3)], 3, 0, 0, 60, 1);

        assert_eq!(cs.targets.len(), 3);
        assert_eq!(cs.hit_test(0, 0), Some(1));
        assert_eq!(cs.hit_test(9, 0), Some(1));
        assert_eq!(cs.hit_test(10, 0), Some(2));
        assert_eq!(cs.hit_test(21, 0), Some(2));
        assert_eq!(cs.hit_test(22, 0), Some(3));
        assert_eq!(cs.hit_test(59, 0), Some(3));
    }

    #[test]
    fn tab_targets_respect_offset() {
        let mut cs = ClickState::new();
        cs.register_tab_targets(&[(6, 10), (6, 11)], 1, 5, 3, 30, 2);

        assert_eq!(cs.hit_test(5, 3), Some(10));
        assert_eq!(cs.hit_test(5, 4), Some(10));
        assert_eq!(cs.hit_test(4, 3), None);
    }

    #[test]
    fn tab_targets_empty() {
        let mut cs = ClickState::new();
        cs.register_tab_targets(&[], 3, 0, 0, 80, 1);
        assert!(cs.targets.is_empty());
    }

    // ── layout / pixels ───────────────────────────────────────

    #[test]
    fn narrow_layout_threshold() {
        assert!(is_narrow_layout(59));
        assert!(!is_narrow_layout(60));
    }

    #[test]
    fn pixel_to_row() {
        assert_eq!(pixel_y_to_row(0.0, 450.0, 30), Some(0));
        assert_eq!(pixel_y_to_row(15.0, 450.0, 30), Some(1));
        assert_eq!(pixel_y_to_row(449.0, 450.0, 30), Some(29));
        assert_eq!(pixel_y_to_row(450.0, 450.0, 30), None);
        assert_eq!(pixel_y_to_row(-1.0, 450.0, 30), None);
        assert_eq!(pixel_y_to_row(10.0, 0.0, 30), None);
        assert_eq!(pixel_y_to_row(10.0, 450.0, 0), None);
    }

    #[test]
    fn pixel_to_col() {
        assert_eq!(pixel_x_to_col(0.0, 800.0, 80), Some(0));
        assert_eq!(pixel_x_to_col(10.0, 800.0, 80), Some(1));
        assert_eq!(pixel_x_to_col(799.0, 800.0, 80), Some(79));
        assert_eq!(pixel_x_to_col(800.0, 800.0, 80), None);
        assert_eq!(pixel_x_to_col(-1.0, 800.0, 80), None);
    }

    #[test]
    fn tap_reaches_toggle_cell() {
        let mut cs = ClickState::new();
        cs.terminal_cols = 40;
        cs.terminal_rows = 50;
        cs.add_click_target(Rect::new(4, 20, 12, 1), 203);

        let (w, h) = (40.0 * 9.0, 50.0 * 15.0);
        let col = pixel_x_to_col(6.0 * 9.0 + 4.0, w, cs.terminal_cols).unwrap();
        let row = pixel_y_to_row(20.0 * 15.0 + 7.0, h, cs.terminal_rows).unwrap();
        assert_eq!(cs.hit_test(col, row), Some(203));
    }
}
