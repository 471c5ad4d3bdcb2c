mod answer;
mod ids;
mod question;
mod results;
mod session;
mod topic;

pub use ids::{OptionId, ParseIdError, QuestionId, SessionId, TopicId};

pub use answer::{AnswerLog, AnswerTally, mistaken_questions};
pub use question::{AnswerOption, Question, QuestionError};
pub use results::{SessionResults, Verdict, format_clock};
pub use session::{
    FinishReason, Session, SessionConfig, SessionConfigError, SessionMode, SessionOutcome,
};
pub use topic::{Topic, TopicError, TopicName};
