//! Patient result table.
//!
//! Renders from `{is_loading, patients}` only: a loading row while a request
//! is in flight (even over stale rows), a "no results" row for an empty list,
//! otherwise one row per patient plus a count summary. Selecting a row opens
//! the detail overlay from the row's own data.

use crate::components::details::render_details;
use crate::components::{palette, Action, Component};
use crate::models::{PatientListResponse, PatientRecord};
use crate::tui::Frame;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{prelude::*, widgets::*};
use std::sync::Arc;
use time::OffsetDateTime;

pub const LOADING_TEXT: &str = "Loading patients...";
pub const EMPTY_TEXT: &str = "No patients found. Please try again.";

const COLUMNS: [&str; 5] = ["Name", "DOB", "ID", "Resource Type", "Actions"];

/// What the table body shows.
#[derive(Debug, PartialEq, Eq)]
pub enum ListBody<'a> {
    Loading,
    Empty,
    Rows(&'a [PatientRecord]),
}

/// "Showing N patient(s)", or nothing for an empty list.
pub fn summary(count: usize) -> Option<String> {
    match count {
        0 => None,
        1 => Some("Showing 1 patient".to_string()),
        n => Some(format!("Showing {n} patients")),
    }
}

/// Component to display the patient table and the selected patient's overlay.
pub struct PatientList {
    is_loading: bool,
    data: Option<Arc<PatientListResponse>>,
    state: TableState,
    selected: Option<PatientRecord>,
    focused: bool,
}

impl PatientList {
    pub fn new() -> Self {
        Self {
            is_loading: false,
            data: None,
            state: TableState::default(),
            selected: None,
            focused: false,
        }
    }

    /// Replaces what the table shows. Keeps the row cursor in bounds.
    pub fn set_view(&mut self, is_loading: bool, data: Option<Arc<PatientListResponse>>) {
        self.is_loading = is_loading;
        self.data = data;

        let len = self.patients().len();
        if len == 0 {
            self.state.select(None);
        } else {
            let selection = self.state.selected().unwrap_or(0).min(len - 1);
            self.state.select(Some(selection));
        }
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    pub fn patients(&self) -> &[PatientRecord] {
        self.data
            .as_ref()
            .map(|list| list.patients.as_slice())
            .unwrap_or_default()
    }

    pub fn body(&self) -> ListBody<'_> {
        if self.is_loading {
            ListBody::Loading
        } else if self.patients().is_empty() {
            ListBody::Empty
        } else {
            ListBody::Rows(self.patients())
        }
    }

    /// Opens the overlay for the highlighted row, replacing any open one.
    pub fn open_details(&mut self) {
        let highlighted = match self.body() {
            ListBody::Rows(patients) => {
                self.state.selected().and_then(|i| patients.get(i)).cloned()
            }
            ListBody::Loading | ListBody::Empty => None,
        };
        if let Some(patient) = highlighted {
            self.selected = Some(patient);
        }
    }

    pub fn close_details(&mut self) {
        self.selected = None;
    }

    pub fn selected_patient(&self) -> Option<&PatientRecord> {
        self.selected.as_ref()
    }

    pub fn has_overlay(&self) -> bool {
        self.selected.is_some()
    }

    fn select_next(&mut self) {
        let len = self.patients().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    fn select_previous(&mut self) {
        let len = self.patients().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    fn table_block(&self) -> Block<'static> {
        Block::default()
            .title(" Patients ")
            .title_alignment(Alignment::Center)
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(if self.focused {
                palette::FOCUS_BORDER
            } else {
                palette::BORDER
            }))
            .style(Style::default().bg(palette::PANEL))
    }

    fn render_table(&self, frame: &mut Frame, area: Rect) {
        let header = Row::new(
            COLUMNS
                .iter()
                .map(|h| Cell::from(*h).style(Style::default().fg(palette::TEXT))),
        )
        .style(Style::default().bg(palette::HEADER_ROW))
        .height(1)
        .bottom_margin(1);

        let widths = [
            Constraint::Percentage(30),
            Constraint::Percentage(14),
            Constraint::Percentage(26),
            Constraint::Percentage(18),
            Constraint::Percentage(12),
        ];

        let body = self.body();
        let rows: Vec<Row> = match body {
            ListBody::Rows(patients) => patients
                .iter()
                .map(|patient| {
                    Row::new(vec![
                        Cell::from(patient.display_name().to_string()),
                        Cell::from(patient.birth_date.clone()),
                        Cell::from(patient.id.clone()),
                        Cell::from(patient.resource_type.clone()),
                        Cell::from("View").style(Style::default().fg(palette::FOCUS_BORDER)),
                    ])
                })
                .collect(),
            ListBody::Loading | ListBody::Empty => Vec::new(),
        };

        let highlight = Style::default()
            .bg(if self.focused {
                palette::HIGHLIGHT
            } else {
                palette::HIGHLIGHT_UNFOCUSED
            })
            .add_modifier(Modifier::BOLD);

        let block = self.table_block();
        let inner = block.inner(area);
        let table = Table::new(rows, widths)
            .header(header)
            .block(block)
            .style(Style::default().fg(palette::TEXT))
            .row_highlight_style(highlight)
            .highlight_symbol(if self.focused { "► " } else { "  " });

        frame.render_stateful_widget(table, area, &mut self.state.clone());

        let message = match body {
            ListBody::Loading => Some(LOADING_TEXT),
            ListBody::Empty => Some(EMPTY_TEXT),
            ListBody::Rows(_) => None,
        };
        if let Some(message) = message {
            // Below the header row and its margin.
            let message_area = Rect {
                y: inner.y.saturating_add(2),
                height: inner.height.saturating_sub(2),
                ..inner
            };
            let paragraph = Paragraph::new(message)
                .style(Style::default().fg(palette::MUTED))
                .alignment(Alignment::Center);
            frame.render_widget(paragraph, message_area);
        }
    }
}

impl Component for PatientList {
    fn handle_input(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if self.has_overlay() {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter) {
                self.close_details();
            }
            return Ok(None);
        }
        match key.code {
            KeyCode::Down => self.select_next(),
            KeyCode::Up => self.select_previous(),
            KeyCode::Enter => self.open_details(),
            _ => {}
        }
        Ok(None)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(5), Constraint::Length(1)])
            .split(area);

        self.render_table(frame, layout[0]);

        let summary_text = match self.body() {
            ListBody::Rows(patients) => summary(patients.len()),
            ListBody::Loading | ListBody::Empty => None,
        };
        if let Some(text) = summary_text {
            frame.render_widget(
                Paragraph::new(text)
                    .style(Style::default().fg(palette::TEXT))
                    .alignment(Alignment::Center),
                layout[1],
            );
        }

        if let Some(patient) = &self.selected {
            let today = OffsetDateTime::now_utc().date();
            render_details(frame, frame.area(), patient, today);
        }
    }
}

impl Default for PatientList {
    fn default() -> Self {
        Self::new()
    }
}
