use super::ConfigManager;
use crate::{App, AppView};
use chrono::Local;
use color_eyre::eyre::{Result, eyre};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use exercise_runner::{
    api_client::ExerciseDetails,
    practice::{AttemptPhase, PracticeError, QuestionPayload, SubmissionReceipt, ports},
};
use std::{future::Future, sync::mpsc, thread};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

/// Results delivered from background network tasks.
#[derive(Debug)]
pub(crate) enum TaskMessage {
    QuestionsLoaded {
        questions: Result<Vec<QuestionPayload>>,
        details: Option<ExerciseDetails>,
    },
    SubmissionFinished(Result<SubmissionReceipt>),
}

pub(crate) struct PracticeManager<'a> {
    app: &'a mut App,
}

impl<'a> PracticeManager<'a> {
    pub(crate) fn new(app: &'a mut App) -> Self {
        Self { app }
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) {
        match (key.modifiers, key.code) {
            (KeyModifiers::NONE, KeyCode::Down | KeyCode::Char('j')) => self.next_option(),
            (KeyModifiers::NONE, KeyCode::Up | KeyCode::Char('k')) => self.previous_option(),
            (KeyModifiers::NONE, KeyCode::Char(' ')) => self.select_highlighted(),
            (KeyModifiers::NONE, KeyCode::Enter) => self.confirm(),
            (KeyModifiers::NONE, KeyCode::Char(digit @ '1'..='9')) => {
                let index = digit as usize - '1' as usize;
                if self.option_count().is_some_and(|len| index < len) {
                    self.app.option_index = index;
                    self.select_highlighted();
                }
            }
            (KeyModifiers::NONE, KeyCode::Char('n') | KeyCode::Right | KeyCode::Tab) => {
                self.next_question()
            }
            (KeyModifiers::NONE, KeyCode::Char('p') | KeyCode::Left)
            | (_, KeyCode::BackTab) => self.previous_question(),
            (KeyModifiers::NONE, KeyCode::Char('s')) => self.start_submission(),
            (KeyModifiers::NONE, KeyCode::Char('r')) => self.retry(),
            (KeyModifiers::NONE, KeyCode::Char('c')) => ConfigManager::new(self.app).show_config(),
            _ => {}
        }
    }

    /// Fetch the question list, and the exercise overview alongside it, on a
    /// background thread. A failed load is discarded first so the retry
    /// starts a fresh attempt.
    pub(crate) fn start_load(&mut self) {
        if matches!(self.app.engine.phase(), AttemptPhase::LoadFailed(_)) {
            self.app.engine.reset();
        }
        if let Err(err) = self.app.engine.begin_load() {
            debug!("App: ignoring load request: {}", err);
            return;
        }
        self.clear_task_error();

        let Some(api) = self.app.api.clone() else {
            let result = self
                .app
                .engine
                .finish_load(Err(eyre!("API client unavailable. Check the API settings.")));
            if let Err(err) = result {
                self.record_task_error(err.to_string());
            }
            self.app.status = Some("Press r to retry loading.".to_string());
            return;
        };

        self.app.view = AppView::Practice;
        self.app.option_index = 0;
        self.app.results_scroll = 0;
        self.app.loading_frame = 0;
        self.app.attempt_started = None;
        self.app.attempt_finished = None;
        self.app.status = Some("Loading questions...".to_string());

        let exercise_id = self.app.engine.exercise_id().to_string();
        let policy = self.app.effective_config().request_policy();
        info!("App: starting question load for exercise {}", exercise_id);
        self.spawn_task(
            |err| TaskMessage::QuestionsLoaded {
                questions: Err(err),
                details: None,
            },
            move || async move {
                let (questions, details) = tokio::join!(
                    ports::fetch_with_retry(api.as_ref(), &exercise_id, &policy),
                    api.fetch_exercise(&exercise_id)
                );
                let details = match details {
                    Ok(details) => Some(details),
                    Err(err) => {
                        warn!("App: exercise details unavailable: {:#}", err);
                        None
                    }
                };
                TaskMessage::QuestionsLoaded { questions, details }
            },
        );
    }

    pub(crate) fn handle_questions_loaded(
        &mut self,
        result: Result<Vec<QuestionPayload>>,
        details: Option<ExerciseDetails>,
    ) {
        if details.is_some() {
            self.app.exercise_details = details;
        }

        match self.app.engine.finish_load(result) {
            Ok(0) => {
                self.app.status = Some("This exercise has no questions.".to_string());
            }
            Ok(count) => {
                self.app.attempt_started = Some(Local::now());
                self.sync_option_index();
                self.app.status = Some(format!("Loaded {} question(s).", count));
            }
            Err(err) => {
                self.record_task_error(err.to_string());
                self.app.status = Some("Press r to retry loading.".to_string());
            }
        }
    }

    /// Send the attempt on a background thread. Ignored while a submission is
    /// already in flight.
    pub(crate) fn start_submission(&mut self) {
        if self.app.engine.is_busy() {
            debug!("App: submission already in flight; ignoring request");
            return;
        }

        let Some(api) = self.app.api.clone() else {
            App::push_error(
                &mut self.app.error,
                "API client unavailable. Check the API settings.".to_string(),
            );
            return;
        };

        let config = self.app.effective_config();
        if config.user_id.trim().is_empty() {
            warn!("App: submitting without a user id");
        }

        let request = match self.app.engine.begin_submission(&config.user_id) {
            Ok(request) => request,
            Err(err) => {
                self.app.status = Some(err.to_string());
                return;
            }
        };

        self.clear_task_error();
        self.app.loading_frame = 0;
        self.app.status = Some("Submitting...".to_string());
        let policy = config.request_policy();
        info!(
            "App: submitting {} outcome(s) for exercise {}",
            request.question_submissions.len(),
            request.exercise_id
        );
        self.spawn_task(
            |err| TaskMessage::SubmissionFinished(Err(err)),
            move || async move {
                let result = ports::submit_once(api.as_ref(), &request, &policy).await;
                TaskMessage::SubmissionFinished(result)
            },
        );
    }

    pub(crate) fn handle_submission_finished(&mut self, result: Result<SubmissionReceipt>) {
        match self.app.engine.finish_submission(result) {
            Ok(summary) => {
                self.app.attempt_finished = Some(Local::now());
                self.app.results_scroll = 0;
                self.app.view = AppView::Results;
                self.app.status = Some(format!("Your score: {}", summary.display_percentage()));
            }
            Err(err) => {
                self.record_task_error(err.to_string());
                self.app.status =
                    Some("Submission failed. Press s or r to try again.".to_string());
            }
        }
    }

    /// Show a failed load or submission in the error panel and remember it so
    /// the next attempt can take it down again.
    fn record_task_error(&mut self, message: String) {
        App::push_error(&mut self.app.error, message.clone());
        self.app.task_error = Some(message);
    }

    /// Remove the previous task failure from the error panel, leaving every
    /// other message in place.
    fn clear_task_error(&mut self) {
        if let Some(message) = self.app.task_error.take() {
            App::retract_error(&mut self.app.error, &message);
        }
    }

    /// Run `task` on its own thread and Tokio runtime, reporting back over a
    /// fresh channel.
    fn spawn_task<F, Fut>(
        &mut self,
        on_runtime_error: fn(color_eyre::Report) -> TaskMessage,
        task: F,
    ) where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = TaskMessage>,
    {
        let (sender, receiver) = mpsc::channel();
        self.app.task_receiver = Some(receiver);

        thread::spawn(move || {
            let runtime = match Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    let _ = sender.send(on_runtime_error(eyre!(
                        "Failed to build Tokio runtime: {}",
                        err
                    )));
                    return;
                }
            };

            let message = runtime.block_on(task());
            drop(runtime);
            let _ = sender.send(message);
        });
    }

    fn retry(&mut self) {
        match self.app.engine.phase() {
            AttemptPhase::LoadFailed(_) => self.start_load(),
            AttemptPhase::Ready if self.app.task_error.is_some() => self.start_submission(),
            _ => {}
        }
    }

    fn confirm(&mut self) {
        if !self.app.engine.has_answered_current() {
            self.select_highlighted();
        } else if self.app.engine.is_last_question() {
            self.start_submission();
        } else {
            self.next_question();
        }
    }

    fn select_highlighted(&mut self) {
        match self.app.engine.select_current(self.app.option_index) {
            Ok(()) => {
                self.app.status = if self.app.engine.is_last_question() {
                    Some("Press Enter to submit.".to_string())
                } else {
                    Some("Press Enter for the next question.".to_string())
                };
            }
            Err(err) => self.report(err),
        }
    }

    fn next_question(&mut self) {
        match self.app.engine.next() {
            Ok(_) => {
                self.sync_option_index();
                self.app.status = None;
            }
            Err(err) => self.report(err),
        }
    }

    fn previous_question(&mut self) {
        match self.app.engine.previous() {
            Ok(_) => {
                self.sync_option_index();
                self.app.status = None;
            }
            Err(err) => self.report(err),
        }
    }

    fn next_option(&mut self) {
        let Some(len) = self.option_count() else {
            return;
        };
        self.app.option_index = (self.app.option_index + 1) % len;
    }

    fn previous_option(&mut self) {
        let Some(len) = self.option_count() else {
            return;
        };
        self.app.option_index = if self.app.option_index == 0 {
            len - 1
        } else {
            self.app.option_index - 1
        };
    }

    fn option_count(&self) -> Option<usize> {
        self.app
            .engine
            .current_question()
            .map(|question| question.options.len())
            .filter(|len| *len > 0)
    }

    /// Point the highlight at the recorded answer, or the first option.
    fn sync_option_index(&mut self) {
        let engine = &self.app.engine;
        self.app.option_index = engine
            .current_question()
            .zip(engine.chosen_for_current())
            .and_then(|(question, chosen)| {
                question.options.iter().position(|option| option.id == chosen)
            })
            .unwrap_or(0);
    }

    /// Gate violations are shown on the status line rather than the error panel.
    fn report(&mut self, err: PracticeError) {
        debug!("App: practice action rejected: {}", err);
        self.app.status = Some(err.to_string());
    }
}
