pub mod answers;
pub mod cursor;
pub mod engine;
pub mod model;
pub mod ports;
pub mod scorer;

pub use engine::{AnswerFeedback, AttemptPhase, PracticeEngine, PracticeError};
pub use model::{AnswerOption, Question, QuestionPayload};
pub use ports::{QuestionSource, RequestPolicy, SubmissionGateway, SubmissionReceipt, SubmissionRequest};
pub use scorer::{QuestionReview, ScoreSummary};
