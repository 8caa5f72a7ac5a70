//! Scrollable tabular grid widget.
//!
//! Renders one dataset as a bordered table with fixed-width columns, a
//! title, horizontal column scrolling (column 0 is pinned) and an optional
//! row selection that the vertical scroll window follows. The dataset is
//! guarded by an internal lock so the background poller can replace it while
//! the foreground thread renders.

use std::sync::{Mutex, MutexGuard};

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::widgets::{Block, BorderType, Widget};

use super::control::Control;
use super::style::Styles;

/// Row offsets inside the widget bounds: title sits on the top border,
/// then the column header row and its separator, then data.
const HEADER_OFFSET: u16 = 1;
const SEPARATOR_OFFSET: u16 = 2;
const DATA_OFFSET: u16 = 3;

/// Horizontal alignment of a column's cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Right,
}

/// Per-cell style callback: dataset row index, column name, cell value.
pub type CellStyleFn = dyn Fn(usize, &str, &str) -> Style + Send + Sync;

/// Column metadata: header label, alignment and fixed display width.
#[derive(Debug, Clone)]
pub struct GridColumn {
    pub name: String,
    pub align: TextAlign,
    pub width: u16,
}

impl GridColumn {
    pub fn new(name: &str, align: TextAlign, width: u16) -> Self {
        Self {
            name: name.to_string(),
            align,
            width,
        }
    }

    /// Formats a value padded to the column width; wider values keep their
    /// natural width rather than being clipped mid-cell.
    pub fn format(&self, value: &str) -> String {
        let w = self.width as usize;
        match self.align {
            TextAlign::Left => format!("{value:<w$}"),
            TextAlign::Right => format!("{value:>w$}"),
        }
    }

    /// Formats the header label: padded like a cell, then title-cased.
    pub fn format_header(&self) -> String {
        title_case(&self.format(&self.name))
    }
}

/// Upper-cases the first letter of every word, where words are separated by
/// any non-alphanumeric character ("current-jobs-ready" ->
/// "Current-Jobs-Ready").
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut word_start = true;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if word_start {
                out.extend(c.to_uppercase());
            } else {
                out.push(c);
            }
            word_start = false;
        } else {
            out.push(c);
            word_start = true;
        }
    }
    out
}

/// Mutable widget state behind the grid's lock.
#[derive(Debug)]
struct GridState {
    rows: Vec<Vec<String>>,
    bounds: Rect,
    data_area: Rect,
    /// First scrollable column drawn after the pinned column 0; never below 1.
    h_scroll: usize,
    v_scroll: usize,
    selected: Option<usize>,
    focused: bool,
    visible: bool,
}

impl GridState {
    fn visible_rows(&self) -> usize {
        self.data_area.height as usize
    }

    /// Re-clamps scroll offsets and selection against the dataset and
    /// viewport, keeping the selected row inside the visible window.
    fn clamp_scroll(&mut self) {
        let len = self.rows.len();
        if len == 0 {
            self.selected = None;
            self.v_scroll = 0;
            return;
        }
        let sel = self.selected.unwrap_or(0).min(len - 1);
        self.selected = Some(sel);

        let cap = self.visible_rows();
        self.v_scroll = self.v_scroll.min(len.saturating_sub(cap));
        if cap > 0 {
            if sel < self.v_scroll {
                self.v_scroll = sel;
            } else if sel >= self.v_scroll + cap {
                self.v_scroll = sel + 1 - cap;
            }
        }
    }
}

/// Tabular widget over a row/column dataset with scrolling and selection.
pub struct ScrollableGrid {
    columns: Vec<GridColumn>,
    title: String,
    v_scrollable: bool,
    style_fn: Option<Box<CellStyleFn>>,
    state: Mutex<GridState>,
}

impl ScrollableGrid {
    /// Creates a grid with fixed columns. `v_scrollable` enables the row
    /// selection cursor and vertical scrolling.
    pub fn new(title: &str, columns: Vec<GridColumn>, v_scrollable: bool) -> Self {
        Self {
            columns,
            title: title.to_string(),
            v_scrollable,
            style_fn: None,
            state: Mutex::new(GridState {
                rows: Vec::new(),
                bounds: Rect::default(),
                data_area: Rect::default(),
                h_scroll: 1,
                v_scroll: 0,
                selected: None,
                focused: false,
                visible: false,
            }),
        }
    }

    /// Installs a per-cell style callback, consulted for unselected data
    /// cells.
    pub fn with_style_fn(
        mut self,
        f: impl Fn(usize, &str, &str) -> Style + Send + Sync + 'static,
    ) -> Self {
        self.style_fn = Some(Box::new(f));
        self
    }

    pub fn columns(&self) -> &[GridColumn] {
        &self.columns
    }

    fn state(&self) -> MutexGuard<'_, GridState> {
        // dataset replacement is atomic per lock scope, so a poisoned lock
        // holds no torn state
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replaces the dataset. Rows whose width does not match the column
    /// count are dropped; well-formed rows keep their relative order. Safe
    /// to call from the poller thread while the foreground thread renders.
    pub fn update_data(&self, rows: Vec<Vec<String>>) {
        let cols = self.columns.len();
        let mut st = self.state();
        st.rows = rows.into_iter().filter(|r| r.len() == cols).collect();
        st.clamp_scroll();
    }

    /// Snapshot of the currently selected row, if any.
    pub fn current_row(&self) -> Option<Vec<String>> {
        let st = self.state();
        st.selected.and_then(|i| st.rows.get(i).cloned())
    }

    pub fn row_count(&self) -> usize {
        self.state().rows.len()
    }

    /// Sets the widget's drawable rectangle and recomputes the inner data
    /// rectangle (border, header row and separator reserved).
    pub fn resize(&self, area: Rect) {
        let mut st = self.state();
        st.bounds = area;
        let inner_w = area.width.saturating_sub(2);
        let inner_h = area.height.saturating_sub(DATA_OFFSET + 1);
        st.data_area = if inner_w == 0 || area.height <= DATA_OFFSET {
            Rect::default()
        } else {
            Rect::new(area.x + 1, area.y + DATA_OFFSET, inner_w, inner_h)
        };
        st.clamp_scroll();
    }

    /// Handles a key event; a visible grid consumes all four arrow keys even
    /// when the move is a no-op, so arrows never leak into the command
    /// table.
    pub fn handle_event(&self, key: KeyEvent) -> bool {
        if !self.visible() {
            return false;
        }
        match key.code {
            KeyCode::Left => {
                self.scroll_left();
                true
            }
            KeyCode::Right => {
                self.scroll_right();
                true
            }
            KeyCode::Up => {
                self.scroll_up();
                true
            }
            KeyCode::Down => {
                self.scroll_down();
                true
            }
            _ => false,
        }
    }

    pub fn set_focus(&self, focused: bool) {
        self.state().focused = focused;
    }

    pub fn focused(&self) -> bool {
        self.state().focused
    }

    pub fn set_visible(&self, visible: bool) {
        self.state().visible = visible;
    }

    pub fn visible(&self) -> bool {
        self.state().visible
    }

    fn scroll_left(&self) {
        let mut st = self.state();
        if st.h_scroll > 1 {
            st.h_scroll -= 1;
        }
    }

    fn scroll_right(&self) {
        let max = self.columns.len().saturating_sub(1).max(1);
        let mut st = self.state();
        st.h_scroll = (st.h_scroll + 1).min(max);
    }

    fn scroll_up(&self) {
        if !self.v_scrollable {
            return;
        }
        let mut st = self.state();
        if let Some(sel) = st.selected {
            st.selected = Some(sel.saturating_sub(1));
        }
        st.clamp_scroll();
    }

    fn scroll_down(&self) {
        if !self.v_scrollable {
            return;
        }
        let mut st = self.state();
        if let Some(sel) = st.selected {
            st.selected = Some(sel + 1);
        }
        st.clamp_scroll();
    }

    /// Draws border, title, headers and the visible data window.
    pub fn render(&self, buf: &mut Buffer) {
        if !self.visible() {
            return;
        }
        let st = self.state();
        let area = st.bounds.intersection(buf.area);
        if area != st.bounds || area.width < 4 || area.height < DATA_OFFSET + 2 {
            return;
        }
        self.draw_frame(&st, buf);
        self.draw_heading(&st, buf);
        self.draw_data(&st, buf);
        self.draw_hints(&st, buf);
    }

    fn border_style(st: &GridState) -> Style {
        let style = Styles::border();
        if st.focused {
            style.add_modifier(Modifier::BOLD)
        } else {
            style
        }
    }

    fn draw_frame(&self, st: &GridState, buf: &mut Buffer) {
        let style = Self::border_style(st);
        Block::bordered()
            .border_type(BorderType::Double)
            .border_style(style)
            .title(self.title.to_uppercase())
            .title_alignment(Alignment::Center)
            .title_style(style)
            .render(st.bounds, buf);

        // header/data separator joined into the side borders
        let y = st.bounds.y + SEPARATOR_OFFSET;
        if let Some(cell) = buf.cell_mut((st.bounds.x, y)) {
            cell.set_symbol("╠").set_style(style);
        }
        for x in st.bounds.x + 1..st.bounds.right().saturating_sub(1) {
            if let Some(cell) = buf.cell_mut((x, y)) {
                cell.set_symbol("═").set_style(style);
            }
        }
        if let Some(cell) = buf.cell_mut((st.bounds.right().saturating_sub(1), y)) {
            cell.set_symbol("╣").set_style(style);
        }
    }

    /// Lays out one row's visible cells: (column index, x position,
    /// formatted text). Column 0 is always first; columns then follow from
    /// the horizontal scroll offset, stopping before the first one whose
    /// formatted width would overflow the data rectangle.
    fn layout_row(
        &self,
        st: &GridState,
        format: impl Fn(&GridColumn, usize) -> String,
    ) -> Vec<(usize, u16, String)> {
        let max_w = st.data_area.width as usize;
        let mut out = Vec::new();
        let mut used = 0usize;
        for (i, col) in self.columns.iter().enumerate() {
            if i != 0 && i < st.h_scroll {
                continue;
            }
            let text = format(col, i);
            let tw = text.chars().count();
            if used + tw > max_w {
                break;
            }
            out.push((i, st.data_area.x + used as u16, text));
            used += tw;
        }
        out
    }

    fn draw_heading(&self, st: &GridState, buf: &mut Buffer) {
        let style = if st.focused {
            Styles::header_focused()
        } else {
            Styles::header_unfocused()
        };
        let y = st.bounds.y + HEADER_OFFSET;
        let blank = " ".repeat(st.data_area.width as usize);
        buf.set_string(st.data_area.x, y, &blank, style);
        for (_, x, text) in self.layout_row(st, |col, _| col.format_header()) {
            buf.set_string(x, y, &text, style);
        }
    }

    fn draw_data(&self, st: &GridState, buf: &mut Buffer) {
        let cap = st.visible_rows();
        for (idx, row) in st.rows.iter().enumerate().skip(st.v_scroll).take(cap) {
            let y = st.data_area.y + (idx - st.v_scroll) as u16;
            let selected = self.v_scrollable && st.selected == Some(idx);
            for (col, x, text) in self.layout_row(st, |c, i| c.format(&row[i])) {
                let style = if selected {
                    Styles::selected()
                } else if let Some(style_fn) = &self.style_fn {
                    style_fn(idx, &self.columns[col].name, &row[col])
                } else {
                    Styles::default()
                };
                buf.set_string(x, y, &text, style);
            }
        }
    }

    /// Scroll hint arrows, shown only while focused.
    fn draw_hints(&self, st: &GridState, buf: &mut Buffer) {
        if !st.focused {
            return;
        }
        let style = Styles::hint();
        let y = st.bounds.y + HEADER_OFFSET;
        buf.set_string(st.bounds.x, y, "←", style);
        buf.set_string(st.bounds.right().saturating_sub(1), y, "→", style);
        if self.v_scrollable && st.data_area.height > 0 {
            let cx = st.bounds.x + st.bounds.width / 2;
            buf.set_string(cx.saturating_sub(1), st.bounds.y + SEPARATOR_OFFSET, " ↑ ", style);
            buf.set_string(
                cx.saturating_sub(1),
                st.data_area.y + st.data_area.height,
                " ↓ ",
                style,
            );
        }
    }
}

impl Control for ScrollableGrid {
    fn handle_event(&self, key: KeyEvent) -> bool {
        ScrollableGrid::handle_event(self, key)
    }

    fn render(&self, buf: &mut Buffer) {
        ScrollableGrid::render(self, buf)
    }

    fn resize(&self, area: Rect) {
        ScrollableGrid::resize(self, area)
    }

    fn set_focus(&self, focused: bool) {
        ScrollableGrid::set_focus(self, focused)
    }

    fn focused(&self) -> bool {
        ScrollableGrid::focused(self)
    }

    fn set_visible(&self, visible: bool) {
        ScrollableGrid::set_visible(self, visible)
    }

    fn visible(&self) -> bool {
        ScrollableGrid::visible(self)
    }
}
