use crate::tui::Frame;
use anyhow::Result;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;

pub mod details;
pub mod list;
pub mod search;

/// Requests a component passes up to the application loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
}

pub trait Component {
    fn handle_input(&mut self, event: KeyEvent) -> Result<Option<Action>>;
    fn render(&self, frame: &mut Frame, area: Rect);
}

pub(crate) mod palette {
    use ratatui::style::Color;

    pub const BACKGROUND: Color = Color::Rgb(16, 16, 28);
    pub const PANEL: Color = Color::Rgb(22, 22, 35);
    pub const HEADER_ROW: Color = Color::Rgb(26, 26, 36);
    pub const BORDER: Color = Color::Rgb(75, 75, 120);
    pub const FOCUS_BORDER: Color = Color::Rgb(129, 199, 245);
    pub const TEXT: Color = Color::Rgb(230, 230, 250);
    pub const MUTED: Color = Color::Rgb(140, 140, 170);
    pub const DISABLED: Color = Color::Rgb(90, 90, 110);
    pub const HIGHLIGHT: Color = Color::Rgb(40, 40, 65);
    pub const HIGHLIGHT_UNFOCUSED: Color = Color::Rgb(30, 30, 45);
}

/// Helper function to create a centered rectangle.
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
pub(crate) mod testing {
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    pub fn terminal() -> Terminal<TestBackend> {
        Terminal::new(TestBackend::new(100, 30)).unwrap()
    }

    /// The rendered screen as one string, rows joined by newlines.
    pub fn screen(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer
            .content
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    pub fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }
}
