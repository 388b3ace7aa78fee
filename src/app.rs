//! The main application loop for the patient directory.
//!
//! Each frame pulls the latest query state, draws, then waits up to one frame
//! for input. Fetches progress on the runtime in the background; the loop
//! never blocks on the network.

use crate::components::search::PatientSearch;
use crate::components::{palette, Action, Component};
use crate::tui::{self, Tui};
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{prelude::*, widgets::*};
use tracing::info;

/// Main application struct.
pub struct App {
    /// Flag indicating if the application should quit.
    pub should_quit: bool,
    /// The patient search screen.
    pub search: PatientSearch,
}

impl App {
    pub fn new(search: PatientSearch) -> Self {
        Self {
            should_quit: false,
            search,
        }
    }

    /// Runs the draw/input loop until the user quits.
    ///
    /// # Errors
    ///
    /// Returns an error if drawing or reading terminal input fails.
    pub fn run(&mut self, tui: &mut Tui) -> Result<()> {
        info!("Patient directory started");
        while !self.should_quit {
            self.search.update();
            tui.draw(|frame| self.render_ui(frame))?;
            self.handle_event(tui.next_event(self.search.next_deadline())?)?;
        }
        info!("Patient directory closing");
        Ok(())
    }

    fn handle_event(&mut self, event: tui::Event) -> Result<()> {
        match event {
            tui::Event::Input(crossterm::event::Event::Key(key)) => self.handle_key(key),
            // Resizes and mouse events just redraw on the next frame.
            tui::Event::Input(_) | tui::Event::Tick => Ok(()),
        }
    }

    /// Routes a key press; Ctrl+Q quits from anywhere.
    pub fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        if key.kind != KeyEventKind::Press {
            return Ok(());
        }
        if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return Ok(());
        }
        if let Some(Action::Quit) = self.search.handle_input(key)? {
            self.should_quit = true;
        }
        Ok(())
    }

    pub fn render_ui(&self, frame: &mut crate::tui::Frame<'_>) {
        let area = frame.area();
        frame.render_widget(
            Block::default().style(Style::default().bg(palette::BACKGROUND)),
            area,
        );

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(10)])
            .margin(1)
            .split(area);

        let header_block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(palette::BORDER));
        let title = Paragraph::new("PATIENT MANAGEMENT")
            .style(
                Style::default()
                    .fg(palette::TEXT)
                    .add_modifier(Modifier::BOLD),
            )
            .alignment(Alignment::Center)
            .block(header_block);
        frame.render_widget(title, layout[0]);

        self.search.render(frame, layout[1]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakePatientApi;
    use crate::components::testing::{ctrl, key, screen, terminal};
    use crate::models::fixtures::squad;
    use crate::query::patients::testing::queries;
    use crate::query::patients::LoadingPolicy;
    use std::sync::Arc;
    use std::time::Duration;

    fn new_app(api: &Arc<FakePatientApi>) -> App {
        App::new(PatientSearch::new(queries(api, LoadingPolicy::LoadingWins)))
    }

    #[tokio::test(start_paused = true)]
    async fn renders_header_and_patient_table() {
        let api = Arc::new(FakePatientApi::new());
        api.respond(None, 0, Ok(squad()));
        let mut app = new_app(&api);

        app.search.update();
        tokio::time::sleep(Duration::from_millis(10)).await;
        app.search.update();

        let mut terminal = terminal();
        terminal.draw(|frame| app.render_ui(frame)).unwrap();
        let screen = screen(&terminal);
        assert!(screen.contains("PATIENT MANAGEMENT"));
        assert!(screen.contains("Patient List"));
        assert!(screen.contains("Thierry Henry"));
        assert!(screen.contains("Showing 3 patients"));
    }

    #[tokio::test(start_paused = true)]
    async fn ctrl_q_and_escape_quit() {
        let api = Arc::new(FakePatientApi::new());

        let mut app = new_app(&api);
        app.handle_key(ctrl('q')).unwrap();
        assert!(app.should_quit);

        let mut app = new_app(&api);
        app.handle_key(key(KeyCode::Esc)).unwrap();
        assert!(app.should_quit);
    }

    #[tokio::test(start_paused = true)]
    async fn key_releases_are_ignored() {
        let api = Arc::new(FakePatientApi::new());
        let mut app = new_app(&api);

        let mut release = key(KeyCode::Char('x'));
        release.kind = KeyEventKind::Release;
        app.handle_key(release).unwrap();
        assert_eq!(app.search.input(), "");

        app.handle_key(key(KeyCode::Char('x'))).unwrap();
        assert_eq!(app.search.input(), "x");
    }
}
