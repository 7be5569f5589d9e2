use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// A selectable answer choice. `is_correct` is authoritative for grading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerOption {
    pub id: String,
    pub text: String,
    pub is_correct: bool,
}

/// A single-answer multiple choice question, validated at the load boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub options: Vec<AnswerOption>,
    /// Carried from the API but not used for scoring.
    pub points: Option<f64>,
}

impl Question {
    pub fn option(&self, option_id: &str) -> Option<&AnswerOption> {
        self.options.iter().find(|option| option.id == option_id)
    }

    pub fn correct_option(&self) -> Option<&AnswerOption> {
        self.options.iter().find(|option| option.is_correct)
    }
}

/// Question shape as returned by `GET /questions/by-exercise/{id}`.
///
/// Every field is optional so that a malformed entry still deserializes and is
/// rejected by [`validate_questions`] with a precise reason.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub options: Option<Vec<OptionPayload>>,
    #[serde(default)]
    pub points: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub is_correct: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("question {position} has no identifier")]
    MissingQuestionId { position: usize },

    #[error("question '{question_id}' appears more than once")]
    DuplicateQuestionId { question_id: String },

    #[error("question '{question_id}' has no options")]
    MissingOptions { question_id: String },

    #[error("option {position} of question '{question_id}' has no identifier")]
    MissingOptionId {
        question_id: String,
        position: usize,
    },

    #[error("question '{question_id}' lists option '{option_id}' more than once")]
    DuplicateOptionId {
        question_id: String,
        option_id: String,
    },

    #[error("question '{question_id}' has {count} correct options, expected exactly one")]
    CorrectOptionCount { question_id: String, count: usize },
}

/// Convert raw payloads into closed [`Question`] values, keeping the order the
/// API returned them in.
pub fn validate_questions(
    payloads: Vec<QuestionPayload>,
) -> Result<Vec<Question>, ValidationError> {
    let mut seen_ids = HashSet::new();
    let mut questions = Vec::with_capacity(payloads.len());

    for (position, payload) in payloads.into_iter().enumerate() {
        let question = validate_question(position + 1, payload)?;
        if !seen_ids.insert(question.id.clone()) {
            return Err(ValidationError::DuplicateQuestionId {
                question_id: question.id,
            });
        }
        questions.push(question);
    }

    Ok(questions)
}

fn validate_question(position: usize, payload: QuestionPayload) -> Result<Question, ValidationError> {
    let id = non_blank(payload.id).ok_or(ValidationError::MissingQuestionId { position })?;

    let raw_options = match payload.options {
        Some(options) if !options.is_empty() => options,
        _ => return Err(ValidationError::MissingOptions { question_id: id }),
    };

    let mut option_ids = HashSet::new();
    let mut options = Vec::with_capacity(raw_options.len());
    for (index, raw) in raw_options.into_iter().enumerate() {
        let option_id = non_blank(raw.id).ok_or_else(|| ValidationError::MissingOptionId {
            question_id: id.clone(),
            position: index + 1,
        })?;
        if !option_ids.insert(option_id.clone()) {
            return Err(ValidationError::DuplicateOptionId {
                question_id: id,
                option_id,
            });
        }
        options.push(AnswerOption {
            id: option_id,
            text: raw.text.unwrap_or_default(),
            is_correct: raw.is_correct.unwrap_or(false),
        });
    }

    let correct = options.iter().filter(|option| option.is_correct).count();
    if correct != 1 {
        return Err(ValidationError::CorrectOptionCount {
            question_id: id,
            count: correct,
        });
    }

    Ok(Question {
        id,
        text: payload.text.unwrap_or_default(),
        options,
        points: payload.points,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(id: &str, correct: bool) -> OptionPayload {
        OptionPayload {
            id: Some(id.to_string()),
            text: Some(format!("option {id}")),
            is_correct: Some(correct),
        }
    }

    fn payload(id: &str, options: Vec<OptionPayload>) -> QuestionPayload {
        QuestionPayload {
            id: Some(id.to_string()),
            text: Some(format!("question {id}")),
            options: Some(options),
            points: Some(10.0),
        }
    }

    #[test]
    fn keeps_questions_in_received_order() {
        let payloads = vec![
            payload("q2", vec![option("a", true), option("b", false)]),
            payload("q1", vec![option("c", false), option("d", true)]),
        ];

        let questions = validate_questions(payloads).unwrap();

        let ids: Vec<_> = questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["q2", "q1"]);
        assert_eq!(questions[1].correct_option().unwrap().id, "d");
        assert_eq!(questions[0].points, Some(10.0));
    }

    #[test]
    fn parses_camel_case_wire_shape() {
        let body = r#"[{"id":"q1","text":"2 + 2?","points":5,
            "options":[{"id":"o1","text":"4","isCorrect":true},{"id":"o2","text":"5","isCorrect":false}]}]"#;
        let payloads: Vec<QuestionPayload> = serde_json::from_str(body).unwrap();

        let questions = validate_questions(payloads).unwrap();

        assert_eq!(questions[0].text, "2 + 2?");
        assert!(questions[0].option("o1").unwrap().is_correct);
        assert!(!questions[0].option("o2").unwrap().is_correct);
    }

    #[test]
    fn rejects_question_without_identifier() {
        let mut bad = payload("q1", vec![option("a", true)]);
        bad.id = Some("  ".to_string());

        let err = validate_questions(vec![bad]).unwrap_err();

        assert_eq!(err, ValidationError::MissingQuestionId { position: 1 });
    }

    #[test]
    fn rejects_missing_or_empty_options() {
        let mut missing = payload("q1", Vec::new());
        missing.options = None;
        assert!(matches!(
            validate_questions(vec![missing]),
            Err(ValidationError::MissingOptions { .. })
        ));

        let empty = payload("q2", Vec::new());
        assert!(matches!(
            validate_questions(vec![empty]),
            Err(ValidationError::MissingOptions { .. })
        ));
    }

    #[test]
    fn rejects_option_without_identifier() {
        let mut nameless = option("a", true);
        nameless.id = None;

        let err = validate_questions(vec![payload("q1", vec![option("b", false), nameless])])
            .unwrap_err();

        assert_eq!(
            err,
            ValidationError::MissingOptionId {
                question_id: "q1".to_string(),
                position: 2,
            }
        );
    }

    #[test]
    fn rejects_duplicate_identifiers() {
        let duplicated_question = vec![
            payload("q1", vec![option("a", true)]),
            payload("q1", vec![option("b", true)]),
        ];
        assert!(matches!(
            validate_questions(duplicated_question),
            Err(ValidationError::DuplicateQuestionId { .. })
        ));

        let duplicated_option = vec![payload("q1", vec![option("a", true), option("a", false)])];
        assert!(matches!(
            validate_questions(duplicated_option),
            Err(ValidationError::DuplicateOptionId { .. })
        ));
    }

    #[test]
    fn requires_exactly_one_correct_option() {
        let none = vec![payload("q1", vec![option("a", false), option("b", false)])];
        assert_eq!(
            validate_questions(none).unwrap_err(),
            ValidationError::CorrectOptionCount {
                question_id: "q1".to_string(),
                count: 0,
            }
        );

        let two = vec![payload("q1", vec![option("a", true), option("b", true)])];
        assert!(matches!(
            validate_questions(two),
            Err(ValidationError::CorrectOptionCount { count: 2, .. })
        ));
    }

    #[test]
    fn empty_list_is_valid() {
        assert!(validate_questions(Vec::new()).unwrap().is_empty());
    }
}
