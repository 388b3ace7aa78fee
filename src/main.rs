use anyhow::Result;
use crossterm::{
    event::DisableMouseCapture,
    terminal::{self, LeaveAlternateScreen},
};
use patient_directory::api::{HttpPatientApi, PatientApi};
use patient_directory::app::App;
use patient_directory::components::search::PatientSearch;
use patient_directory::config::Config;
use patient_directory::logging;
use patient_directory::query::{PatientQueries, QueryCache};
use patient_directory::tui::Tui;
use ratatui::prelude::{CrosstermBackend, Terminal};
use std::io;
use std::sync::Arc;
use tracing::warn;

fn main() -> Result<()> {
    let loaded = Config::load();
    let config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => Config::from_env(),
    };
    let _log_guard = logging::init_logging(&Config::log_dir()?, &config.log_level)?;
    if let Err(e) = &loaded {
        warn!(error = %e, "Failed to load config, using defaults");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    // Fetches are spawned onto this runtime while the UI loop runs on the main thread.
    let _runtime = runtime.enter();

    let api: Arc<dyn PatientApi> = Arc::new(HttpPatientApi::new(
        config.api_base_url.clone(),
        config.request_timeout(),
    )?);
    let lists = QueryCache::new(config.query_options());
    let details = QueryCache::new(config.query_options());
    let queries = PatientQueries::new(
        api,
        lists.clone(),
        details.clone(),
        config.debounce(),
        config.loading_policy,
    );

    let _guard = CleanupGuard;

    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
    terminal.clear()?;

    let mut tui = Tui::new(terminal);
    tui.init()?;

    let mut app = App::new(PatientSearch::new(queries));
    let res = app.run(&mut tui);

    tui.exit()?;
    lists.dispose();
    details.dispose();

    if let Err(e) = res {
        eprintln!("Application Error: {e}");
    }
    Ok(())
}

struct CleanupGuard;

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        // Ignore errors during cleanup
        let _ = terminal::disable_raw_mode();
        let _ = crossterm::execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
    }
}
