use exam_core::model::{QuestionId, Session, SessionId, SessionOutcome};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{db_err, id_i64, map_session_row, question_id_from_i64, ser, session_id_from_i64};
use crate::repository::{NewSessionRecord, SessionRepository, StorageError};

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn create_session(&self, session: NewSessionRecord) -> Result<SessionId, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let res = sqlx::query(
            r"
                INSERT INTO sessions (mode, started_at, duration_sec, max_mistakes)
                VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(session.config.mode().as_str())
        .bind(session.started_at)
        .bind(session.config.duration_sec().map(i64::from))
        .bind(session.config.max_mistakes().map(i64::from))
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        let session_id = res.last_insert_rowid();

        for (order_index, question_id) in session.question_ids.iter().enumerate() {
            let order_index = i64::try_from(order_index)
                .map_err(|_| StorageError::Serialization("order_index overflow".into()))?;
            sqlx::query(
                r"
                    INSERT INTO session_questions (session_id, question_id, order_index)
                    VALUES (?1, ?2, ?3)
                ",
            )
            .bind(session_id)
            .bind(id_i64("question_id", question_id.value())?)
            .bind(order_index)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;

        session_id_from_i64(session_id)
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    id, mode, started_at, duration_sec, max_mistakes,
                    finished_at, score, mistakes_count
                FROM sessions
                WHERE id = ?1
            ",
        )
        .bind(id_i64("session_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_session_row).transpose()
    }

    async fn session_question_ids(
        &self,
        id: SessionId,
    ) -> Result<Vec<QuestionId>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT question_id
                FROM session_questions
                WHERE session_id = ?1
                ORDER BY order_index ASC
            ",
        )
        .bind(id_i64("session_id", id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|row| question_id_from_i64(row.try_get::<i64, _>("question_id").map_err(ser)?))
            .collect()
    }

    async fn finish_session(
        &self,
        id: SessionId,
        outcome: SessionOutcome,
    ) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
                UPDATE sessions
                SET finished_at = ?2, score = ?3, mistakes_count = ?4
                WHERE id = ?1 AND started_at <= ?2
            ",
        )
        .bind(id_i64("session_id", id.value())?)
        .bind(outcome.finished_at)
        .bind(i64::from(outcome.score))
        .bind(i64::from(outcome.mistakes_count))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() > 0 {
            return Ok(());
        }
        match self.get_session(id).await? {
            Some(_) => Err(StorageError::Serialization(
                "finished_at is before started_at".into(),
            )),
            None => Err(StorageError::NotFound),
        }
    }
}
