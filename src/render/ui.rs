//! Terminal rendering components.
//!
//! This module hosts the ratatui preview along with the view trait, the per-frame view
//! state and styling utilities.

pub mod renderer;
pub mod state;
pub mod terminal;
pub mod theme;

pub use renderer::{AnswerView, ViewAction};
pub use state::{StatusLine, ViewFrame};
pub use terminal::TerminalUI;
pub use theme::ColorTheme;

#[cfg(test)]
pub use renderer::tests::MockView;
