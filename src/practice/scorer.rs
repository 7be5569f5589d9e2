use super::{answers::AnswerTracker, model::Question, ports::QuestionSubmission};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub correct_count: usize,
    pub total_count: usize,
    pub percentage: f64,
}

impl ScoreSummary {
    pub fn display_percentage(&self) -> String {
        format!("{:.1}%", self.percentage)
    }
}

/// One row of the results breakdown shown after submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionReview {
    pub question_text: String,
    pub chosen_text: Option<String>,
    pub correct_text: Option<String>,
    pub is_correct: bool,
}

/// Unweighted score over every question: each counts once, whatever its
/// `points` value, and the denominator is the question count rather than the
/// answered count.
pub fn score(questions: &[Question], answers: &AnswerTracker) -> ScoreSummary {
    let total_count = questions.len();
    let correct_count = questions
        .iter()
        .filter(|question| is_correct(question, answers))
        .count();
    let percentage = if total_count == 0 {
        0.0
    } else {
        100.0 * correct_count as f64 / total_count as f64
    };

    ScoreSummary {
        correct_count,
        total_count,
        percentage,
    }
}

/// Per-question outcomes sent to the grading endpoint. Unanswered questions
/// are reported as incorrect.
pub fn question_outcomes(questions: &[Question], answers: &AnswerTracker) -> Vec<QuestionSubmission> {
    questions
        .iter()
        .map(|question| QuestionSubmission {
            question_id: question.id.clone(),
            is_correct: is_correct(question, answers),
        })
        .collect()
}

pub fn review(questions: &[Question], answers: &AnswerTracker) -> Vec<QuestionReview> {
    questions
        .iter()
        .map(|question| QuestionReview {
            question_text: question.text.clone(),
            chosen_text: chosen_option_text(question, answers),
            correct_text: question.correct_option().map(|option| option.text.clone()),
            is_correct: is_correct(question, answers),
        })
        .collect()
}

pub(crate) fn is_correct(question: &Question, answers: &AnswerTracker) -> bool {
    answers
        .chosen(&question.id)
        .and_then(|option_id| question.option(option_id))
        .map(|option| option.is_correct)
        .unwrap_or(false)
}

fn chosen_option_text(question: &Question, answers: &AnswerTracker) -> Option<String> {
    answers
        .chosen(&question.id)
        .and_then(|option_id| question.option(option_id))
        .map(|option| option.text.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::practice::model::AnswerOption;

    fn question(id: &str, points: f64) -> Question {
        Question {
            id: id.to_string(),
            text: format!("question {id}"),
            options: vec![
                AnswerOption {
                    id: format!("{id}-right"),
                    text: "right".to_string(),
                    is_correct: true,
                },
                AnswerOption {
                    id: format!("{id}-wrong"),
                    text: "wrong".to_string(),
                    is_correct: false,
                },
            ],
            points: Some(points),
        }
    }

    #[test]
    fn one_of_two_correct_is_fifty_percent() {
        let questions = vec![question("q1", 1.0), question("q2", 1.0)];
        let mut answers = AnswerTracker::new();
        answers.select("q1", "q1-right");
        answers.select("q2", "q2-wrong");

        let summary = score(&questions, &answers);

        assert_eq!(
            summary,
            ScoreSummary {
                correct_count: 1,
                total_count: 2,
                percentage: 50.0,
            }
        );
        assert_eq!(summary.display_percentage(), "50.0%");
    }

    #[test]
    fn scoring_is_repeatable() {
        let questions = vec![question("q1", 1.0), question("q2", 1.0), question("q3", 1.0)];
        let mut answers = AnswerTracker::new();
        answers.select("q1", "q1-right");
        answers.select("q2", "q2-right");
        answers.select("q3", "q3-wrong");

        let first = score(&questions, &answers);
        let second = score(&questions, &answers);

        assert_eq!(first, second);
        assert_eq!(first.display_percentage(), "66.7%");
    }

    #[test]
    fn points_do_not_weight_the_score() {
        // Unweighted scoring is the observed behaviour; switching to weighted
        // scoring must change this test on purpose.
        let questions = vec![question("heavy", 90.0), question("light", 10.0)];
        let mut answers = AnswerTracker::new();
        answers.select("heavy", "heavy-wrong");
        answers.select("light", "light-right");

        assert_eq!(score(&questions, &answers).percentage, 50.0);
    }

    #[test]
    fn overwritten_answer_is_scored_not_the_stale_one() {
        let questions = vec![question("q1", 1.0)];
        let mut answers = AnswerTracker::new();
        answers.select("q1", "q1-wrong");
        assert_eq!(score(&questions, &answers).correct_count, 0);

        answers.select("q1", "q1-right");
        assert_eq!(score(&questions, &answers).correct_count, 1);
    }

    #[test]
    fn empty_exercise_scores_zero_without_dividing() {
        let summary = score(&[], &AnswerTracker::new());

        assert_eq!(summary.total_count, 0);
        assert_eq!(summary.percentage, 0.0);
    }

    #[test]
    fn unanswered_questions_count_against_total() {
        let questions = vec![question("q1", 1.0), question("q2", 1.0)];
        let mut answers = AnswerTracker::new();
        answers.select("q1", "q1-right");

        assert_eq!(score(&questions, &answers).percentage, 50.0);
        let outcomes = question_outcomes(&questions, &answers);
        assert!(outcomes[0].is_correct);
        assert!(!outcomes[1].is_correct);
        assert_eq!(outcomes[1].question_id, "q2");
    }

    #[test]
    fn review_lists_chosen_and_correct_text() {
        let questions = vec![question("q1", 1.0), question("q2", 1.0)];
        let mut answers = AnswerTracker::new();
        answers.select("q1", "q1-wrong");

        let rows = review(&questions, &answers);

        assert_eq!(rows[0].chosen_text.as_deref(), Some("wrong"));
        assert_eq!(rows[0].correct_text.as_deref(), Some("right"));
        assert!(!rows[0].is_correct);
        assert_eq!(rows[1].chosen_text, None);
    }
}
