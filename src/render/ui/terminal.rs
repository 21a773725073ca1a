//! Terminal preview implementation using ratatui
//!
//! Shows the direct answer and the agent log side by side while they are revealed,
//! with a status line underneath. The pane holding the authoritative buffer gets the
//! highlighted border.

use crate::error::Result;
use crate::markdown::{self, MarkupMarkers, Segment};
use crate::render::protocol::ActiveSource;
use crate::render::ui::{AnswerView, ColorTheme, ViewAction, ViewFrame};
use crate::session::events::Rating;
use ratatui::crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io::{self, Stdout};
use std::time::Duration;

type CrosstermTerminal = Terminal<CrosstermBackend<Stdout>>;

/// Terminal UI implementation with ratatui backend
pub struct TerminalUI {
    terminal: Option<CrosstermTerminal>,
    theme: ColorTheme,
}

impl TerminalUI {
    pub fn new() -> Result<Self> {
        Ok(Self {
            terminal: None,
            theme: ColorTheme::default(),
        })
    }

    pub fn with_theme(theme: ColorTheme) -> Result<Self> {
        Ok(Self {
            terminal: None,
            theme,
        })
    }

    fn key_to_action(&self, key: KeyCode, modifiers: KeyModifiers) -> Option<ViewAction> {
        match (key, modifiers) {
            (KeyCode::Esc, _) => Some(ViewAction::Abort),
            (KeyCode::Char('n'), KeyModifiers::NONE) => Some(ViewAction::NewChat),
            (KeyCode::Char('+'), _) => Some(ViewAction::Rate(Rating::Up)),
            (KeyCode::Char('-'), _) => Some(ViewAction::Rate(Rating::Down)),
            (KeyCode::Char('q'), KeyModifiers::NONE)
            | (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(ViewAction::Quit),
            _ => None,
        }
    }

    fn render_pane(
        frame: &mut Frame,
        area: Rect,
        title: &str,
        text: &str,
        active: bool,
        markers: &MarkupMarkers,
        theme: &ColorTheme,
    ) {
        let lines = markup_lines(text, markers, theme);
        let visible = area.height.saturating_sub(2) as usize;
        let scroll = lines.len().saturating_sub(visible) as u16;
        let border = if active {
            theme.active_border
        } else {
            theme.inactive_border
        };

        let paragraph = Paragraph::new(lines)
            .style(theme.text_style())
            .block(
                Block::default()
                    .title(title)
                    .borders(Borders::ALL)
                    .border_style(border),
            )
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0));
        frame.render_widget(paragraph, area);
    }

    fn render_status(frame: &mut Frame, area: Rect, line: String, theme: &ColorTheme) {
        let style = Style::default().bg(theme.status_bg).fg(theme.status_fg);
        frame.render_widget(Paragraph::new(line).style(style), area);
    }
}

/// Convert transformed text into styled lines: bold markers become styled spans and
/// break markers (and raw newlines) start new lines.
pub fn markup_lines<'a>(
    text: &'a str,
    markers: &MarkupMarkers,
    theme: &ColorTheme,
) -> Vec<Line<'a>> {
    let mut lines = Vec::new();
    let mut current: Vec<Span<'a>> = Vec::new();

    for segment in markdown::segments(text, markers) {
        match segment {
            Segment::Text { text, bold } => {
                for (index, part) in text.split('\n').enumerate() {
                    if index > 0 {
                        lines.push(Line::from(std::mem::take(&mut current)));
                    }
                    if part.is_empty() {
                        continue;
                    }
                    current.push(if bold {
                        Span::styled(part, theme.bold_text)
                    } else {
                        Span::raw(part)
                    });
                }
            }
            Segment::LineBreak => lines.push(Line::from(std::mem::take(&mut current))),
        }
    }
    lines.push(Line::from(current));
    lines
}

impl AnswerView for TerminalUI {
    fn render(&mut self, view: &ViewFrame<'_>) -> Result<()> {
        if let Some(ref mut terminal) = self.terminal {
            let theme = &self.theme;
            let snapshot = view.snapshot;
            let status = view.status.format(snapshot);

            terminal.draw(move |frame| {
                let size = frame.size();
                let rows = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Min(0), Constraint::Length(1)].as_ref())
                    .split(size);
                let panes = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(55), Constraint::Percentage(45)].as_ref())
                    .split(rows[0]);

                Self::render_pane(
                    frame,
                    panes[0],
                    " answer ",
                    &snapshot.direct_text,
                    snapshot.active_source != ActiveSource::Agent,
                    view.markers,
                    theme,
                );
                Self::render_pane(
                    frame,
                    panes[1],
                    " agent log ",
                    &snapshot.agent_text,
                    snapshot.active_source == ActiveSource::Agent,
                    view.markers,
                    theme,
                );
                Self::render_status(frame, rows[1], status, theme);
            })?;
        }
        Ok(())
    }

    fn poll_action(&mut self, timeout: Duration) -> Result<Option<ViewAction>> {
        if event::poll(timeout)? {
            if let Event::Key(key_event) = event::read()? {
                if key_event.kind == KeyEventKind::Press {
                    return Ok(self.key_to_action(key_event.code, key_event.modifiers));
                }
            }
        }
        Ok(None)
    }

    fn initialize(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        self.terminal = Some(terminal);
        Ok(())
    }

    fn cleanup(&mut self) -> Result<()> {
        if self.terminal.is_some() {
            disable_raw_mode()?;
            execute!(io::stdout(), LeaveAlternateScreen)?;
            self.terminal = None;
        }
        Ok(())
    }
}

impl Drop for TerminalUI {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
