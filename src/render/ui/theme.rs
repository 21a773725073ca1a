//! Color theme and styling definitions using ratatui colors

use ratatui::style::{Color, Modifier, Style};

/// Color theme for the answer preview
#[derive(Debug, Clone)]
pub struct ColorTheme {
    /// Normal text color (None uses terminal default)
    pub normal_text: Option<Color>,

    /// Text inside bold markers
    pub bold_text: Style,

    /// Border of the pane holding the authoritative answer
    pub active_border: Style,

    /// Border of the other pane
    pub inactive_border: Style,

    /// Status line background
    pub status_bg: Color,

    /// Status line text
    pub status_fg: Color,
}

impl Default for ColorTheme {
    fn default() -> Self {
        Self {
            normal_text: None,
            bold_text: Style::default()
                .fg(Color::LightCyan)
                .add_modifier(Modifier::BOLD),
            active_border: Style::default().fg(Color::Yellow),
            inactive_border: Style::default().fg(Color::DarkGray),
            status_bg: Color::Blue,
            status_fg: Color::White,
        }
    }
}

impl ColorTheme {
    /// Create a monochrome theme for terminals without color support
    pub fn monochrome() -> Self {
        Self {
            normal_text: None,
            bold_text: Style::default().add_modifier(Modifier::BOLD),
            active_border: Style::default().add_modifier(Modifier::BOLD),
            inactive_border: Style::default(),
            status_bg: Color::Black,
            status_fg: Color::White,
        }
    }

    pub fn text_style(&self) -> Style {
        match self.normal_text {
            Some(color) => Style::default().fg(color),
            None => Style::default(),
        }
    }
}
