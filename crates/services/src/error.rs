//! Shared error types for the services crate.

use thiserror::Error;

use exam_core::model::{OptionId, QuestionId, SessionConfigError, SessionId, TopicId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("topic {0} not found")]
    TopicNotFound(TopicId),
    #[error("session {0} not found")]
    SessionNotFound(SessionId),
    #[error("option {option_id} not found for question {question_id}")]
    OptionNotFound {
        option_id: OptionId,
        question_id: QuestionId,
    },
    #[error("session {0} is already finished")]
    Finished(SessionId),
    #[error("exam timer task failed: {0}")]
    Timer(String),
    #[error(transparent)]
    Config(#[from] SessionConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
