//! Patient search screen.
//!
//! Owns the raw input value and hands every edit to [`PatientQueries`], which
//! debounces on its own. Shows the error banner with a retry control whenever
//! the active query has failed, and the result table otherwise.

use crate::components::list::PatientList;
use crate::components::{palette, Action, Component};
use crate::query::patients::{PatientListState, PatientQueries};
use crate::tui::Frame;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{prelude::*, widgets::*};
use std::time::{Duration, Instant};

pub const PLACEHOLDER: &str = "Search patients by name...";
const ADD_PATIENT_NOTICE: &str = "Adding patients is not available yet.";
const NOTICE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Search,
    Table,
    AddPatient,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Search => Focus::Table,
            Focus::Table => Focus::AddPatient,
            Focus::AddPatient => Focus::Search,
        }
    }

    fn previous(self) -> Self {
        match self {
            Focus::Search => Focus::AddPatient,
            Focus::Table => Focus::Search,
            Focus::AddPatient => Focus::Table,
        }
    }
}

pub struct PatientSearch {
    input: String,
    queries: PatientQueries,
    state: PatientListState,
    list: PatientList,
    focus: Focus,
    notice: Option<String>,
    notice_time: Option<Instant>,
}

impl PatientSearch {
    pub fn new(queries: PatientQueries) -> Self {
        Self {
            input: String::new(),
            queries,
            state: PatientListState::default(),
            list: PatientList::new(),
            focus: Focus::Search,
            notice: None,
            notice_time: None,
        }
    }

    /// The raw input value, exactly as typed.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Pulls the latest state for the active term. Called once per frame.
    pub fn update(&mut self) {
        self.state = self.queries.observe();
        self.sync_list();
        self.check_notice_timeout();
    }

    /// Re-issues the request for the active term.
    pub fn retry(&mut self) {
        self.state = self.queries.retry();
        self.sync_list();
    }

    /// Banner text when the active query has failed.
    pub fn error_message(&self) -> Option<String> {
        if !self.state.is_error {
            return None;
        }
        let reason = self
            .state
            .error
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "Unknown error".to_string());
        Some(format!("Failed to load patients: {reason}"))
    }

    /// When the typed term will settle and need a frame.
    pub fn next_deadline(&self) -> Option<tokio::time::Instant> {
        self.queries.next_deadline()
    }

    pub fn list(&self) -> &PatientList {
        &self.list
    }

    fn sync_list(&mut self) {
        self.list
            .set_view(self.state.is_loading, self.state.data.clone());
    }

    fn edit(&mut self, edit: impl FnOnce(&mut String)) {
        edit(&mut self.input);
        self.queries.set_term(&self.input);
        self.set_focus(Focus::Search);
    }

    fn set_focus(&mut self, focus: Focus) {
        self.focus = focus;
        self.list.set_focused(focus == Focus::Table);
    }

    fn set_notice(&mut self, message: &str) {
        self.notice = Some(message.to_string());
        self.notice_time = Some(Instant::now());
    }

    fn check_notice_timeout(&mut self) {
        if let Some(time) = self.notice_time {
            if time.elapsed() >= NOTICE_TIMEOUT {
                self.notice = None;
                self.notice_time = None;
            }
        }
    }

    fn render_input_row(&self, frame: &mut Frame, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(20), Constraint::Length(17)])
            .split(area);

        let search_focused = self.focus == Focus::Search;
        let search_block = Block::default()
            .title(" Search ")
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(if search_focused {
                palette::FOCUS_BORDER
            } else {
                palette::BORDER
            }))
            .style(Style::default().bg(palette::PANEL));

        let input = if self.input.is_empty() {
            Paragraph::new(PLACEHOLDER).style(Style::default().fg(palette::MUTED))
        } else {
            Paragraph::new(self.input.as_str()).style(Style::default().fg(palette::TEXT))
        };
        let inner = search_block.inner(columns[0]);
        frame.render_widget(input.block(search_block), columns[0]);

        if search_focused && !self.list.has_overlay() {
            let offset = u16::try_from(self.input.chars().count()).unwrap_or(u16::MAX);
            let x = inner.x.saturating_add(offset).min(inner.right().saturating_sub(1));
            frame.set_cursor_position((x, inner.y));
        }

        let add_focused = self.focus == Focus::AddPatient;
        let add_button = Paragraph::new("Add Patient")
            .style(Style::default().fg(palette::DISABLED))
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(if add_focused {
                        palette::FOCUS_BORDER
                    } else {
                        palette::DISABLED
                    })),
            );
        frame.render_widget(add_button, columns[1]);
    }

    fn render_error(&self, frame: &mut Frame, area: Rect, message: String) {
        let text = vec![
            Line::from(""),
            Line::from(Span::styled(
                message,
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "► Retry ◄",
                Style::default()
                    .fg(palette::FOCUS_BORDER)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "Enter or Ctrl+R to retry",
                Style::default().fg(palette::MUTED),
            )),
        ];
        let banner = Paragraph::new(text)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .title(" Error ")
                    .title_alignment(Alignment::Center)
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(Color::Red))
                    .style(Style::default().bg(palette::PANEL)),
            );
        frame.render_widget(banner, area);
    }
}

impl Component for PatientSearch {
    fn handle_input(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if self.list.has_overlay() {
            return self.list.handle_input(key);
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('r') | KeyCode::Char('R') => self.retry(),
                KeyCode::Char('u') | KeyCode::Char('U') => self.edit(String::clear),
                _ => {}
            }
            return Ok(None);
        }

        match key.code {
            KeyCode::Esc => return Ok(Some(Action::Quit)),
            KeyCode::Tab => self.set_focus(self.focus.next()),
            KeyCode::BackTab => self.set_focus(self.focus.previous()),
            KeyCode::Char(c) => self.edit(|input| input.push(c)),
            KeyCode::Backspace => self.edit(|input| {
                input.pop();
            }),
            KeyCode::Enter if self.state.is_error => self.retry(),
            KeyCode::Enter if self.focus == Focus::AddPatient => {
                self.set_notice(ADD_PATIENT_NOTICE);
            }
            KeyCode::Down if self.focus == Focus::Search => self.set_focus(Focus::Table),
            _ if self.focus == Focus::Table => return self.list.handle_input(key),
            _ => {}
        }
        Ok(None)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // Section title
                Constraint::Length(3), // Search input and Add Patient
                Constraint::Min(6),    // Results or error
                Constraint::Length(1), // Help text
                Constraint::Length(1), // Notice
            ])
            .split(area);

        let title = Paragraph::new("Patient List").style(
            Style::default()
                .fg(palette::TEXT)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(title, layout[0]);

        self.render_input_row(frame, layout[1]);

        match self.error_message() {
            Some(message) => self.render_error(frame, layout[2], message),
            None => self.list.render(frame, layout[2]),
        }

        let help_text = if self.list.has_overlay() {
            "Esc/Enter: Close details"
        } else {
            "Type to search | ↓/Tab: To results | ↑↓: Navigate | Enter: View | Ctrl+R: Retry | Esc: Quit"
        };
        frame.render_widget(
            Paragraph::new(help_text)
                .style(Style::default().fg(palette::MUTED))
                .alignment(Alignment::Center),
            layout[3],
        );

        if let Some(notice) = &self.notice {
            frame.render_widget(
                Paragraph::new(notice.as_str())
                    .style(
                        Style::default()
                            .fg(Color::Yellow)
                            .add_modifier(Modifier::BOLD),
                    )
                    .alignment(Alignment::Center),
                layout[4],
            );
        }
    }
}
