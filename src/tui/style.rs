//! Color scheme and styles.

use ratatui::style::{Color, Modifier, Style};

/// Dashboard color palette. Stays close to the terminal defaults so the
/// dashboard inherits the user's scheme.
pub struct Theme;

impl Theme {
    pub const ACCENT: Color = Color::Red;
    pub const STATUS: Color = Color::Yellow;
    pub const SELECTION: Color = Color::Blue;
    pub const CRITICAL: Color = Color::Red;
}

/// Pre-defined styles.
pub struct Styles;

impl Styles {
    /// Default cell/text style.
    pub fn default() -> Style {
        Style::new()
    }

    /// Grid border; bold is added while the grid is focused.
    pub fn border() -> Style {
        Style::new()
    }

    /// Column header row of a focused grid.
    pub fn header_focused() -> Style {
        Style::new().add_modifier(Modifier::REVERSED)
    }

    /// Column header row of an unfocused grid.
    pub fn header_unfocused() -> Style {
        Style::new().add_modifier(Modifier::BOLD)
    }

    /// Selected data row.
    pub fn selected() -> Style {
        Style::new()
            .fg(Theme::SELECTION)
            .add_modifier(Modifier::REVERSED)
    }

    /// Scroll hint arrows.
    pub fn hint() -> Style {
        Style::new().add_modifier(Modifier::BOLD)
    }

    /// Accented cells (hostname column, command shortcuts).
    pub fn accent() -> Style {
        Style::new().fg(Theme::ACCENT)
    }

    /// Critical values (non-zero buried counts).
    pub fn critical() -> Style {
        Style::new().fg(Theme::CRITICAL).add_modifier(Modifier::BOLD)
    }

    /// Connection info in the header line.
    pub fn info() -> Style {
        Style::new().fg(Theme::ACCENT).add_modifier(Modifier::BOLD)
    }

    /// Status line at the bottom of the screen.
    pub fn status() -> Style {
        Style::new().fg(Theme::STATUS)
    }
}
