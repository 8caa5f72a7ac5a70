//! Focusable widget abstraction.

use crossterm::event::KeyEvent;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;

/// Capability set shared by every focusable dashboard widget.
///
/// The dashboard owns its widgets as `Arc<dyn Control>` and drives them
/// exclusively through this trait, so new widget kinds can be added without
/// touching the dispatch loop. Methods take `&self`: implementations keep
/// mutable state behind interior locks so a widget can also be shared with
/// the background poller.
pub trait Control: Send + Sync {
    /// Handles a key event, returning whether it was consumed. Unconsumed
    /// events fall through to the dashboard's command table.
    fn handle_event(&self, key: KeyEvent) -> bool;

    /// Draws the widget into the frame buffer at its current bounds.
    fn render(&self, buf: &mut Buffer);

    /// Sets the widget's drawable rectangle. Idempotent; called on every
    /// layout pass.
    fn resize(&self, area: Rect);

    fn set_focus(&self, focused: bool);
    fn focused(&self) -> bool;

    fn set_visible(&self, visible: bool);
    fn visible(&self) -> bool;
}
