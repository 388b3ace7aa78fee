use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture},
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{io, time::Duration};
use tokio::time::Instant;

/// What the event loop wakes up for.
#[derive(Debug, Clone)]
pub enum Event {
    Input(event::Event),
    /// No input before the next frame or debounce deadline.
    Tick,
}

pub type Frame<'a> = ratatui::Frame<'a>;

pub struct Tui {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    framerate: f64,
}

impl Tui {
    pub fn new(terminal: Terminal<CrosstermBackend<io::Stdout>>) -> Self {
        Self {
            terminal,
            framerate: 30.0,
        }
    }

    pub fn init(&mut self) -> Result<()> {
        terminal::enable_raw_mode()?;
        crossterm::execute!(io::stdout(), EnterAlternateScreen, EnableMouseCapture)?;
        self.terminal.hide_cursor()?;
        self.terminal.clear()?;
        Ok(())
    }

    pub fn exit(&mut self) -> Result<()> {
        self.terminal.show_cursor()?;
        terminal::disable_raw_mode()?;
        crossterm::execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture)?;
        Ok(())
    }

    pub fn draw(&mut self, render: impl FnOnce(&mut Frame)) -> Result<()> {
        self.terminal.draw(render)?;
        Ok(())
    }

    /// Waits for input until the next frame, or until `deadline` if it comes sooner.
    pub fn next_event(&self, deadline: Option<Instant>) -> Result<Event> {
        let frame = Duration::from_secs_f64(1.0 / self.framerate);
        let timeout = poll_timeout(frame, deadline, Instant::now());

        if event::poll(timeout)? {
            return Ok(Event::Input(event::read()?));
        }

        Ok(Event::Tick)
    }
}

/// How long to block on input: one frame, cut short by a pending deadline.
fn poll_timeout(frame: Duration, deadline: Option<Instant>, now: Instant) -> Duration {
    match deadline {
        Some(deadline) => frame.min(deadline.saturating_duration_since(now)),
        None => frame,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(33);

    #[test]
    fn waits_a_full_frame_without_deadline() {
        assert_eq!(poll_timeout(FRAME, None, Instant::now()), FRAME);
    }

    #[test]
    fn wakes_early_for_a_nearer_deadline() {
        let now = Instant::now();
        let soon = now + Duration::from_millis(5);
        assert_eq!(poll_timeout(FRAME, Some(soon), now), Duration::from_millis(5));
        assert_eq!(
            poll_timeout(FRAME, Some(now + Duration::from_secs(1)), now),
            FRAME
        );
        assert_eq!(
            poll_timeout(FRAME, Some(now - Duration::from_millis(1)), now),
            Duration::ZERO
        );
    }
}
