//! Terminal progress screen using ratatui
//!
//! Shows what a catalog load or save import is doing:
//! - Current phase and the package/file being read
//! - Running counters
//! - Activity log of status messages

mod components;

use anyhow::Result;
use crossterm::event::{self, Event as CrosstermEvent};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::Terminal;
use std::io::{self, Stdout};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::progress::{ProgressEvent, ProgressSink};
use components::{CounterPanel, LogPanel, StatusPanel};

/// Minimum time between redraws caused by counter-only events
const REDRAW_INTERVAL: Duration = Duration::from_millis(50);

/// Phases shown in the status panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Preparing,
    LoadingCatalogs,
    ImportingSave,
    Complete,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Preparing => write!(f, "Preparing store"),
            Phase::LoadingCatalogs => write!(f, "Loading game catalogs"),
            Phase::ImportingSave => write!(f, "Importing save game"),
            Phase::Complete => write!(f, "Complete"),
        }
    }
}

/// Panels and their state, independent of the terminal
struct Screen {
    status: StatusPanel,
    counters: CounterPanel,
    log: LogPanel,
}

impl Screen {
    fn new() -> Self {
        Self {
            status: StatusPanel::new(),
            counters: CounterPanel::new(),
            log: LogPanel::new(),
        }
    }

    /// Fold one event in; returns whether it carried a status message
    fn apply(&mut self, event: &ProgressEvent) -> bool {
        if let Some(package) = &event.package {
            self.status.set_package(package);
        }
        if let Some(file) = &event.file {
            self.status.set_file(file);
        }
        if !event.counters.is_empty() {
            self.counters.update(&event.counters);
        }
        match &event.status {
            Some(status) => {
                self.log.add(status.clone());
                true
            }
            None => false,
        }
    }

    fn draw<B: Backend>(&self, terminal: &mut Terminal<B>) -> Result<()> {
        terminal.draw(|frame| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(5), // Status panel
                    Constraint::Length(4), // Counters
                    Constraint::Min(5),    // Log panel
                ])
                .split(frame.area());

            self.status.render(frame, chunks[0]);
            self.counters.render(frame, chunks[1]);
            self.log.render(frame, chunks[2]);
        })?;
        Ok(())
    }
}

/// Full-screen progress display; receives events as a [`ProgressSink`]
pub struct UiApp {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    screen: Screen,
    last_draw: Option<Instant>,
}

impl UiApp {
    /// Create the UI and enter the alternate screen
    pub fn new() -> Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            screen: Screen::new(),
            last_draw: None,
        })
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.screen.status.set_phase(phase);
        self.redraw();
    }

    pub fn log(&mut self, message: impl Into<String>) {
        self.screen.log.add(message);
        self.redraw();
    }

    fn redraw(&mut self) {
        if let Err(e) = self.screen.draw(&mut self.terminal) {
            debug!("Failed to draw progress screen: {:#}", e);
        }
        self.last_draw = Some(Instant::now());
    }

    /// Show the summary, wait for a key and restore the terminal
    pub fn finish(mut self, summary: &str) -> Result<()> {
        self.set_phase(Phase::Complete);
        for line in summary.lines() {
            self.screen.log.add(line);
        }
        self.log("Press any key to exit...");

        loop {
            if event::poll(Duration::from_millis(100))? {
                if let CrosstermEvent::Key(_) = event::read()? {
                    break;
                }
            }
        }

        self.restore()
    }

    /// Restore the terminal without waiting
    pub fn restore(mut self) -> Result<()> {
        terminal::disable_raw_mode()?;
        self.terminal.backend_mut().execute(LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl ProgressSink for UiApp {
    fn report(&mut self, event: &ProgressEvent) {
        let logged = self.screen.apply(event);
        let due = self
            .last_draw
            .map_or(true, |last| last.elapsed() >= REDRAW_INTERVAL);
        if logged || due {
            self.redraw();
        }
    }
}

impl Drop for UiApp {
    fn drop(&mut self) {
        // Best effort cleanup
        terminal::disable_raw_mode().ok();
        self.terminal
            .backend_mut()
            .execute(LeaveAlternateScreen)
            .ok();
        self.terminal.show_cursor().ok();
    }
}
