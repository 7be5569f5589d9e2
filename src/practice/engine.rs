use super::{
    answers::AnswerTracker,
    cursor::{NavigationCursor, NavigationError},
    model::{Question, QuestionPayload, validate_questions},
    ports::{self, QuestionSource, RequestPolicy, SubmissionGateway, SubmissionReceipt, SubmissionRequest},
    scorer::{self, QuestionReview, ScoreSummary},
};
use color_eyre::eyre;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PracticeError {
    #[error("failed to load questions: {0}")]
    LoadFailure(String),

    #[error("option '{option_id}' is not a choice of question '{question_id}'")]
    InvalidSelection {
        question_id: String,
        option_id: String,
    },

    #[error("failed to submit exercise: {0}")]
    SubmissionFailure(String),

    #[error("answer all {total} questions before submitting ({answered} answered)")]
    IncompleteAttempt { answered: usize, total: usize },

    #[error("move to the last question before submitting")]
    SubmitBeforeLastQuestion,

    #[error("questions have not been loaded")]
    NotLoaded,

    #[error("this exercise has no questions")]
    NoQuestions,

    #[error("questions were already requested for this attempt")]
    AlreadyLoaded,

    #[error("no question load is in progress")]
    LoadNotStarted,

    #[error("a submission is already in progress")]
    SubmissionInFlight,

    #[error("no submission is in progress")]
    SubmissionNotStarted,

    #[error("this attempt has already been submitted")]
    AlreadySubmitted,

    #[error(transparent)]
    Navigation(#[from] NavigationError),
}

/// Where an attempt is in its lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptPhase {
    Idle,
    Loading,
    LoadFailed(String),
    Ready,
    Submitting,
    Submitted(ScoreSummary),
}

/// Immediate feedback for the current question once it has an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerFeedback {
    pub is_correct: bool,
    pub correct_text: Option<String>,
}

/// State of one attempt at one exercise: the loaded questions, the answers
/// given so far, and the question currently shown.
#[derive(Debug, Clone)]
pub struct PracticeEngine {
    exercise_id: String,
    questions: Vec<Question>,
    answers: AnswerTracker,
    cursor: NavigationCursor,
    phase: AttemptPhase,
}

impl PracticeEngine {
    pub fn new(exercise_id: impl Into<String>) -> Self {
        Self {
            exercise_id: exercise_id.into(),
            questions: Vec::new(),
            answers: AnswerTracker::new(),
            cursor: NavigationCursor::new(0),
            phase: AttemptPhase::Idle,
        }
    }

    pub fn exercise_id(&self) -> &str {
        &self.exercise_id
    }

    pub fn phase(&self) -> &AttemptPhase {
        &self.phase
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn answers(&self) -> &AnswerTracker {
        &self.answers
    }

    pub fn cursor_index(&self) -> usize {
        self.cursor.index()
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn answered_count(&self) -> usize {
        self.questions
            .iter()
            .filter(|question| self.answers.is_answered(&question.id))
            .count()
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.phase, AttemptPhase::Loading | AttemptPhase::Submitting)
    }

    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            AttemptPhase::Ready | AttemptPhase::Submitting | AttemptPhase::Submitted(_) => {
                self.questions.get(self.cursor.index())
            }
            _ => None,
        }
    }

    pub fn chosen_for_current(&self) -> Option<&str> {
        self.current_question()
            .and_then(|question| self.answers.chosen(&question.id))
    }

    pub fn has_answered_current(&self) -> bool {
        self.chosen_for_current().is_some()
    }

    pub fn is_last_question(&self) -> bool {
        self.cursor.is_last()
    }

    pub fn can_go_next(&self) -> bool {
        self.ensure_interactive().is_ok() && self.cursor.can_advance(self.has_answered_current())
    }

    pub fn can_go_previous(&self) -> bool {
        self.ensure_interactive().is_ok() && self.cursor.can_retreat()
    }

    pub fn can_submit(&self) -> bool {
        self.check_submit().is_ok()
    }

    /// Mark the attempt as waiting for its question list. Allowed once per attempt.
    pub fn begin_load(&mut self) -> Result<(), PracticeError> {
        if self.phase != AttemptPhase::Idle {
            return Err(PracticeError::AlreadyLoaded);
        }
        self.phase = AttemptPhase::Loading;
        debug!("PracticeEngine: loading questions for exercise {}", self.exercise_id);
        Ok(())
    }

    /// Apply the outcome of a question fetch. Malformed payloads are rejected
    /// as a load failure and leave the sequence empty.
    pub fn finish_load(
        &mut self,
        result: eyre::Result<Vec<QuestionPayload>>,
    ) -> Result<usize, PracticeError> {
        if self.phase != AttemptPhase::Loading {
            return Err(PracticeError::LoadNotStarted);
        }

        let validated = result
            .map_err(|err| format!("{err:#}"))
            .and_then(|payloads| validate_questions(payloads).map_err(|err| err.to_string()));

        match validated {
            Ok(questions) => {
                let count = questions.len();
                self.cursor = NavigationCursor::new(count);
                self.questions = questions;
                self.phase = AttemptPhase::Ready;
                info!(
                    "PracticeEngine: loaded {} question(s) for exercise {}",
                    count, self.exercise_id
                );
                Ok(count)
            }
            Err(message) => {
                warn!("PracticeEngine: question load failed: {}", message);
                self.questions.clear();
                self.cursor = NavigationCursor::new(0);
                self.phase = AttemptPhase::LoadFailed(message.clone());
                Err(PracticeError::LoadFailure(message))
            }
        }
    }

    /// Fetch the question list through `source` and apply it.
    pub async fn load(
        &mut self,
        source: &dyn QuestionSource,
        policy: &RequestPolicy,
    ) -> Result<usize, PracticeError> {
        self.begin_load()?;
        let result = ports::fetch_with_retry(source, &self.exercise_id, policy).await;
        self.finish_load(result)
    }

    /// Record the option chosen for any loaded question, replacing an earlier choice.
    pub fn select_answer(&mut self, question_id: &str, option_id: &str) -> Result<(), PracticeError> {
        self.ensure_interactive()?;
        let belongs = self
            .questions
            .iter()
            .find(|question| question.id == question_id)
            .is_some_and(|question| question.option(option_id).is_some());
        if !belongs {
            return Err(PracticeError::InvalidSelection {
                question_id: question_id.to_string(),
                option_id: option_id.to_string(),
            });
        }

        self.answers.select(question_id, option_id);
        debug!(
            "PracticeEngine: question {} answered with option {}",
            question_id, option_id
        );
        Ok(())
    }

    /// Select the option at `option_index` of the current question.
    pub fn select_current(&mut self, option_index: usize) -> Result<(), PracticeError> {
        self.ensure_interactive()?;
        let Some(question) = self.questions.get(self.cursor.index()) else {
            return Err(PracticeError::NoQuestions);
        };
        let Some(option) = question.options.get(option_index) else {
            return Err(PracticeError::InvalidSelection {
                question_id: question.id.clone(),
                option_id: format!("#{}", option_index + 1),
            });
        };
        let (question_id, option_id) = (question.id.clone(), option.id.clone());
        self.select_answer(&question_id, &option_id)
    }

    pub fn next(&mut self) -> Result<usize, PracticeError> {
        self.ensure_interactive()?;
        let answered = self.has_answered_current();
        let index = self.cursor.advance(answered)?;
        debug!(
            "PracticeEngine: moved to question {} of {}",
            index + 1,
            self.cursor.len()
        );
        Ok(index)
    }

    /// Step back one question; the answer left behind is kept.
    pub fn previous(&mut self) -> Result<usize, PracticeError> {
        self.ensure_interactive()?;
        let index = self.cursor.retreat()?;
        debug!(
            "PracticeEngine: moved to question {} of {}",
            index + 1,
            self.cursor.len()
        );
        Ok(index)
    }

    /// Check the submit gate and build the request. On success the attempt is
    /// marked in flight until [`Self::finish_submission`] is called.
    pub fn begin_submission(&mut self, user_id: &str) -> Result<SubmissionRequest, PracticeError> {
        self.check_submit()?;
        let request = SubmissionRequest {
            exercise_id: self.exercise_id.clone(),
            user_id: user_id.to_string(),
            question_submissions: scorer::question_outcomes(&self.questions, &self.answers),
        };
        self.phase = AttemptPhase::Submitting;
        debug!(
            "PracticeEngine: submitting exercise {} for user {}",
            self.exercise_id, user_id
        );
        Ok(request)
    }

    /// Apply the outcome of a submission. Failure returns the attempt to its
    /// pre-submit state with every answer intact.
    pub fn finish_submission(
        &mut self,
        result: eyre::Result<SubmissionReceipt>,
    ) -> Result<ScoreSummary, PracticeError> {
        if self.phase != AttemptPhase::Submitting {
            return Err(PracticeError::SubmissionNotStarted);
        }

        match result {
            Ok(receipt) => {
                let summary = self.score();
                self.phase = AttemptPhase::Submitted(summary);
                info!(
                    "PracticeEngine: exercise {} submitted, score {} ({})",
                    self.exercise_id,
                    summary.display_percentage(),
                    receipt.message.as_deref().unwrap_or("no message")
                );
                Ok(summary)
            }
            Err(err) => {
                let message = format!("{err:#}");
                warn!("PracticeEngine: submission failed: {}", message);
                self.phase = AttemptPhase::Ready;
                Err(PracticeError::SubmissionFailure(message))
            }
        }
    }

    /// Submit the attempt through `gateway`. Never retried automatically.
    pub async fn submit(
        &mut self,
        gateway: &dyn SubmissionGateway,
        user_id: &str,
        policy: &RequestPolicy,
    ) -> Result<ScoreSummary, PracticeError> {
        let request = self.begin_submission(user_id)?;
        let result = ports::submit_once(gateway, &request, policy).await;
        self.finish_submission(result)
    }

    pub fn score(&self) -> ScoreSummary {
        scorer::score(&self.questions, &self.answers)
    }

    pub fn review(&self) -> Vec<QuestionReview> {
        scorer::review(&self.questions, &self.answers)
    }

    pub fn answer_feedback(&self) -> Option<AnswerFeedback> {
        let question = self.current_question()?;
        self.answers.chosen(&question.id)?;
        Some(AnswerFeedback {
            is_correct: scorer::is_correct(question, &self.answers),
            correct_text: question.correct_option().map(|option| option.text.clone()),
        })
    }

    /// Throw away the attempt so the next load starts from scratch.
    pub fn reset(&mut self) {
        self.questions.clear();
        self.answers.clear();
        self.cursor = NavigationCursor::new(0);
        self.phase = AttemptPhase::Idle;
        debug!("PracticeEngine: attempt reset for exercise {}", self.exercise_id);
    }

    fn ensure_interactive(&self) -> Result<(), PracticeError> {
        match self.phase {
            AttemptPhase::Ready if self.questions.is_empty() => Err(PracticeError::NoQuestions),
            AttemptPhase::Ready => Ok(()),
            AttemptPhase::Submitting => Err(PracticeError::SubmissionInFlight),
            AttemptPhase::Submitted(_) => Err(PracticeError::AlreadySubmitted),
            AttemptPhase::Idle | AttemptPhase::Loading | AttemptPhase::LoadFailed(_) => {
                Err(PracticeError::NotLoaded)
            }
        }
    }

    fn check_submit(&self) -> Result<(), PracticeError> {
        self.ensure_interactive()?;
        let answered = self.answered_count();
        let total = self.questions.len();
        if answered != total {
            return Err(PracticeError::IncompleteAttempt { answered, total });
        }
        if !self.cursor.is_last() {
            return Err(PracticeError::SubmitBeforeLastQuestion);
        }
        Ok(())
    }
}
