//! View trait for displaying revealed answers and collecting user actions.

use crate::error::Result;
use crate::render::ui::ViewFrame;
use crate::session::events::Rating;
use std::time::Duration;

/// User intents a view can report back to the replay loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewAction {
    Abort,
    NewChat,
    Rate(Rating),
    Quit,
}

/// Core trait for answer views.
pub trait AnswerView {
    /// Draw the current frame.
    fn render(&mut self, frame: &ViewFrame<'_>) -> Result<()>;

    /// Wait up to `timeout` for user input.
    fn poll_action(&mut self, timeout: Duration) -> Result<Option<ViewAction>>;

    /// Take over the terminal (raw mode, alternate screen).
    fn initialize(&mut self) -> Result<()>;

    /// Restore the terminal.
    fn cleanup(&mut self) -> Result<()>;
}
