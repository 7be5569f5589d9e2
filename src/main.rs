mod ui_renderer;
mod view_managers;

use chrono::{DateTime, Local};
use clap::Parser;
use color_eyre::{Result, eyre::eyre};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use dotenvy::dotenv;
use exercise_runner::{
    api_client::{ApiClient, ExerciseDetails},
    config::{self, AppConfig, ConfigForm, Overrides},
    log_util,
    practice::{AttemptPhase, PracticeEngine},
};
use ratatui::{DefaultTerminal, Frame};
use std::{
    path::PathBuf,
    sync::{
        Arc,
        mpsc::{Receiver, TryRecvError},
    },
    time::Duration,
};
use tracing::{debug, info};
use ui_renderer::UiRenderer;
use view_managers::{
    ConfigManager, PracticeManager, ResultsManager, practice_manager::TaskMessage,
};

pub(crate) const LOADING_FRAMES: [&str; 4] = ["-", "\\", "|", "/"];

/// Take an LMS practice exercise from the terminal.
#[derive(Debug, Parser)]
#[command(name = "exercise-runner", version, about)]
struct Cli {
    /// Identifier of the exercise to practice.
    exercise_id: String,
    /// User the submission is recorded for.
    #[arg(long, env = "EXERCISE_USER_ID")]
    user_id: Option<String>,
    /// Base URL of the LMS API, e.g. http://localhost:5029/api.
    #[arg(long = "api-url", env = "EXERCISE_API_URL")]
    api_url: Option<String>,
    /// Bearer token sent with every request.
    #[arg(long, env = "EXERCISE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AppView {
    Practice,
    Results,
    Config,
}

fn main() -> color_eyre::Result<()> {
    dotenv().ok();
    color_eyre::install()?;
    let cli = Cli::parse();
    let log_result = log_util::init();
    let terminal = ratatui::init();
    let result = App::new(cli, log_result).run(terminal);
    ratatui::restore();
    result
}

/// The main application which holds the state and logic of the application.
#[derive(Debug)]
pub struct App {
    /// Is the application running?
    pub(crate) running: bool,
    /// Current view being displayed.
    pub(crate) view: AppView,
    /// The attempt in progress.
    pub(crate) engine: PracticeEngine,
    /// REST adapter shared with background tasks.
    pub(crate) api: Option<Arc<ApiClient>>,
    /// Command line / environment values layered over the stored config.
    pub(crate) overrides: Overrides,
    /// Highlighted option within the current question.
    pub(crate) option_index: usize,
    /// First visible row of the results breakdown.
    pub(crate) results_scroll: usize,
    /// Any error encountered while loading, answering, or submitting.
    pub(crate) error: Option<String>,
    /// The last load or submission failure, cleared when that work is retried.
    pub(crate) task_error: Option<String>,
    /// Latest status line.
    pub(crate) status: Option<String>,
    /// Spinner frame index for the active loading indicator.
    pub(crate) loading_frame: usize,
    /// Receives background task updates.
    pub(crate) task_receiver: Option<Receiver<TaskMessage>>,
    /// Title and limits of the exercise, when the server provided them.
    pub(crate) exercise_details: Option<ExerciseDetails>,
    /// When the current attempt's questions arrived.
    pub(crate) attempt_started: Option<DateTime<Local>>,
    /// When the current attempt was accepted by the server.
    pub(crate) attempt_finished: Option<DateTime<Local>>,
    /// Where tracing output is written, if logging could be set up.
    pub(crate) log_path: Option<PathBuf>,
    /// Holds the editable configuration state when rendering the config view.
    pub(crate) config_form: ConfigForm,
}

impl App {
    /// Construct a new instance of [`App`].
    fn new(cli: Cli, log_result: Result<PathBuf>) -> Self {
        let mut aggregated_error: Option<String> = None;

        let log_path = match log_result {
            Ok(path) => Some(path),
            Err(err) => {
                Self::push_error(&mut aggregated_error, format!("Logging unavailable: {}", err));
                None
            }
        };

        if let Err(err) = config::initialize() {
            Self::push_error(
                &mut aggregated_error,
                format!("Configuration load failed: {}", err),
            );
        }

        let overrides = Overrides {
            api_base_url: cli.api_url,
            user_id: cli.user_id,
            access_token: cli.access_token,
        };
        let effective = config::current().with_overrides(&overrides);
        let api = match ApiClient::from_config(&effective) {
            Ok(client) => Some(Arc::new(client)),
            Err(err) => {
                Self::push_error(&mut aggregated_error, format!("API unavailable: {}", err));
                None
            }
        };
        info!(
            "App: practicing exercise {} against {}",
            cli.exercise_id, effective.api_base_url
        );

        Self {
            running: false,
            view: AppView::Practice,
            engine: PracticeEngine::new(cli.exercise_id),
            api,
            overrides,
            option_index: 0,
            results_scroll: 0,
            error: aggregated_error,
            task_error: None,
            status: None,
            loading_frame: 0,
            task_receiver: None,
            exercise_details: None,
            attempt_started: None,
            attempt_finished: None,
            log_path,
            config_form: ConfigForm::from_config(config::current()),
        }
    }

    /// Run the application's main loop.
    pub fn run(mut self, mut terminal: DefaultTerminal) -> Result<()> {
        self.running = true;
        PracticeManager::new(&mut self).start_load();
        let tick_rate = Duration::from_millis(120);
        while self.running {
            self.poll_task_messages();
            terminal.draw(|frame| self.render(frame))?;
            self.handle_crossterm_events(tick_rate)?;
        }
        Ok(())
    }

    /// Configuration with command line and environment overrides applied.
    pub(crate) fn effective_config(&self) -> AppConfig {
        config::current().with_overrides(&self.overrides)
    }

    /// Rebuild the API client after the stored configuration changed.
    pub(crate) fn refresh_api_client(&mut self) {
        match ApiClient::from_config(&self.effective_config()) {
            Ok(client) => self.api = Some(Arc::new(client)),
            Err(err) => {
                Self::push_error(&mut self.error, format!("API unavailable: {}", err));
                self.api = None;
            }
        }
    }

    /// Dispatch rendering based on the active view.
    fn render(&mut self, frame: &mut Frame) {
        UiRenderer::new(self).render(frame);
    }

    /// Reads the crossterm events and updates the state of [`App`].
    fn handle_crossterm_events(&mut self, tick_rate: Duration) -> Result<()> {
        if event::poll(tick_rate)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => self.on_key_event(key),
                Event::Mouse(_) => {}
                Event::Resize(_, _) => {}
                _ => {}
            }
            self.poll_task_messages();
        } else {
            self.on_tick();
        }
        Ok(())
    }

    fn on_tick(&mut self) {
        if self.engine.is_busy() {
            self.loading_frame = (self.loading_frame + 1) % LOADING_FRAMES.len();
        }
        self.poll_task_messages();
    }

    fn poll_task_messages(&mut self) {
        let Some(receiver) = self.task_receiver.as_ref() else {
            return;
        };
        let message = match receiver.try_recv() {
            Ok(message) => message,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => {
                debug!("App: background worker disconnected");
                match self.engine.phase() {
                    AttemptPhase::Loading => TaskMessage::QuestionsLoaded {
                        questions: Err(eyre!("background worker disconnected")),
                        details: None,
                    },
                    _ => TaskMessage::SubmissionFinished(Err(eyre!(
                        "background worker disconnected"
                    ))),
                }
            }
        };

        self.task_receiver = None;
        match message {
            TaskMessage::QuestionsLoaded { questions, details } => {
                PracticeManager::new(self).handle_questions_loaded(questions, details)
            }
            TaskMessage::SubmissionFinished(result) => {
                PracticeManager::new(self).handle_submission_finished(result)
            }
        }
    }

    /// Handles the key events and updates the state of [`App`].
    fn on_key_event(&mut self, key: KeyEvent) {
        if self.view == AppView::Config && self.config_form.is_editing_access_token() {
            ConfigManager::new(self).handle_key(key);
            return;
        }

        match (key.modifiers, key.code) {
            (_, KeyCode::Esc | KeyCode::Char('q'))
            | (KeyModifiers::CONTROL, KeyCode::Char('c') | KeyCode::Char('C')) => self.quit(),
            _ => match self.view {
                AppView::Practice => PracticeManager::new(self).handle_key(key),
                AppView::Results => ResultsManager::new(self).handle_key(key),
                AppView::Config => ConfigManager::new(self).handle_key(key),
            },
        }
    }

    pub(crate) fn return_to_practice(&mut self) {
        if matches!(self.view, AppView::Config) {
            self.config_form = ConfigForm::from_config(config::current());
        }
        self.view = match self.engine.phase() {
            AttemptPhase::Submitted(_) => AppView::Results,
            _ => AppView::Practice,
        };
    }

    /// Set running to false to quit the application.
    fn quit(&mut self) {
        self.running = false;
    }

    /// Append a message to an optional error slot.
    pub(crate) fn push_error(slot: &mut Option<String>, message: String) {
        if let Some(existing) = slot {
            existing.push_str(" | ");
            existing.push_str(&message);
        } else {
            *slot = Some(message);
        }
    }

    /// Remove one message previously added with [`App::push_error`].
    pub(crate) fn retract_error(slot: &mut Option<String>, message: &str) {
        let Some(existing) = slot.take() else {
            return;
        };
        let remaining: Vec<&str> = existing
            .split(" | ")
            .filter(|part| *part != message)
            .collect();
        if !remaining.is_empty() {
            *slot = Some(remaining.join(" | "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retracting_an_error_keeps_the_others() {
        let mut slot = None;
        App::push_error(&mut slot, "Logging unavailable: disk full".to_string());
        App::push_error(&mut slot, "failed to load questions: timeout".to_string());

        App::retract_error(&mut slot, "failed to load questions: timeout");
        assert_eq!(slot.as_deref(), Some("Logging unavailable: disk full"));

        App::retract_error(&mut slot, "Logging unavailable: disk full");
        assert_eq!(slot, None);
    }
}
