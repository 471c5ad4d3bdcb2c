use exam_core::model::{AnswerLog, SessionId};

use super::SqliteRepository;
use super::mapping::{db_err, id_i64, map_answer_row};
use crate::repository::{AnswerLogRepository, StorageError};

#[async_trait::async_trait]
impl AnswerLogRepository for SqliteRepository {
    async fn append_answer(&self, log: &AnswerLog) -> Result<i64, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO answer_logs (
                    session_id, question_id, selected_option_id, is_correct, answered_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(id_i64("session_id", log.session_id.value())?)
        .bind(id_i64("question_id", log.question_id.value())?)
        .bind(id_i64("selected_option_id", log.selected_option_id.value())?)
        .bind(log.is_correct)
        .bind(log.answered_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(res.last_insert_rowid())
    }

    async fn answers_for_session(&self, id: SessionId) -> Result<Vec<AnswerLog>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT session_id, question_id, selected_option_id, is_correct, answered_at
                FROM answer_logs
                WHERE session_id = ?1
                ORDER BY answered_at ASC, id ASC
            ",
        )
        .bind(id_i64("session_id", id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_answer_row(&row)?);
        }
        Ok(out)
    }
}
