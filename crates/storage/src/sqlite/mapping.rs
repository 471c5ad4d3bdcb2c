use exam_core::model::{
    AnswerLog, AnswerOption, OptionId, QuestionId, Session, SessionConfig, SessionId,
    SessionMode, SessionOutcome, TopicId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Maps driver errors, separating constraint violations from connectivity.
pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::RowNotFound => StorageError::NotFound,
        sqlx::Error::Database(db)
            if db.is_unique_violation()
                || db.is_foreign_key_violation()
                || db.is_check_violation() =>
        {
            StorageError::Conflict
        }
        _ => StorageError::Connection(e.to_string()),
    }
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn topic_id_from_i64(v: i64) -> Result<TopicId, StorageError> {
    Ok(TopicId::new(i64_to_u64("topic_id", v)?))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn option_id_from_i64(v: i64) -> Result<OptionId, StorageError> {
    Ok(OptionId::new(i64_to_u64("option_id", v)?))
}

pub(crate) fn session_id_from_i64(v: i64) -> Result<SessionId, StorageError> {
    Ok(SessionId::new(i64_to_u64("session_id", v)?))
}

fn optional_u32(row: &SqliteRow, column: &'static str) -> Result<Option<u32>, StorageError> {
    row.try_get::<Option<i64>, _>(column)
        .map_err(ser)?
        .map(|v| u32_from_i64(column, v))
        .transpose()
}

pub(crate) fn map_option_row(row: &SqliteRow) -> Result<AnswerOption, StorageError> {
    Ok(AnswerOption::new(
        option_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        question_id_from_i64(row.try_get::<i64, _>("question_id").map_err(ser)?)?,
        row.try_get::<String, _>("text").map_err(ser)?,
        row.try_get::<bool, _>("is_correct").map_err(ser)?,
    ))
}

pub(crate) fn map_session_row(row: &SqliteRow) -> Result<Session, StorageError> {
    let mode_str: String = row.try_get("mode").map_err(ser)?;
    let mode = SessionMode::parse(&mode_str).map_err(ser)?;
    let config = SessionConfig::from_parts(
        mode,
        optional_u32(row, "duration_sec")?,
        optional_u32(row, "max_mistakes")?,
    )
    .map_err(ser)?;

    let finished_at: Option<chrono::DateTime<chrono::Utc>> =
        row.try_get("finished_at").map_err(ser)?;
    let outcome = match finished_at {
        Some(finished_at) => Some(SessionOutcome {
            finished_at,
            score: optional_u32(row, "score")?.unwrap_or(0),
            mistakes_count: optional_u32(row, "mistakes_count")?.unwrap_or(0),
        }),
        None => None,
    };

    Session::from_persisted(
        session_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        config,
        row.try_get("started_at").map_err(ser)?,
        outcome,
    )
    .map_err(ser)
}

pub(crate) fn map_answer_row(row: &SqliteRow) -> Result<AnswerLog, StorageError> {
    Ok(AnswerLog::new(
        session_id_from_i64(row.try_get::<i64, _>("session_id").map_err(ser)?)?,
        question_id_from_i64(row.try_get::<i64, _>("question_id").map_err(ser)?)?,
        option_id_from_i64(row.try_get::<i64, _>("selected_option_id").map_err(ser)?)?,
        row.try_get::<bool, _>("is_correct").map_err(ser)?,
        row.try_get("answered_at").map_err(ser)?,
    ))
}
