use std::collections::HashMap;

use exam_core::model::{AnswerOption, OptionId, Question, QuestionId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{db_err, id_i64, map_option_row, question_id_from_i64, ser};
use crate::repository::{NewQuestionRecord, QuestionRepository, StorageError};

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn upsert_question(
        &self,
        question: NewQuestionRecord,
    ) -> Result<QuestionId, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = sqlx::query(
            r"
                INSERT INTO questions (external_id, text, image_url, explanation)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(external_id) DO UPDATE SET
                    text = excluded.text,
                    image_url = excluded.image_url,
                    explanation = excluded.explanation
                RETURNING id
            ",
        )
        .bind(&question.external_id)
        .bind(&question.text)
        .bind(&question.image_url)
        .bind(&question.explanation)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        let question_id: i64 = row.try_get("id").map_err(ser)?;

        for (position, option) in question.options.iter().enumerate() {
            let position = i64::try_from(position)
                .map_err(|_| StorageError::Serialization("position overflow".into()))?;
            sqlx::query(
                r"
                    INSERT INTO options (question_id, position, text, is_correct)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(question_id, position) DO UPDATE SET
                        text = excluded.text,
                        is_correct = excluded.is_correct
                ",
            )
            .bind(question_id)
            .bind(position)
            .bind(&option.text)
            .bind(option.is_correct)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        let kept = i64::try_from(question.options.len())
            .map_err(|_| StorageError::Serialization("option count overflow".into()))?;
        sqlx::query("DELETE FROM options WHERE question_id = ?1 AND position >= ?2")
            .bind(question_id)
            .bind(kept)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        sqlx::query("DELETE FROM question_topics WHERE question_id = ?1")
            .bind(question_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        for topic_id in &question.topic_ids {
            sqlx::query(
                r"
                    INSERT INTO question_topics (question_id, topic_id)
                    VALUES (?1, ?2)
                    ON CONFLICT DO NOTHING
                ",
            )
            .bind(question_id)
            .bind(id_i64("topic_id", topic_id.value())?)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;

        question_id_from_i64(question_id)
    }

    async fn all_question_ids(&self) -> Result<Vec<QuestionId>, StorageError> {
        let rows = sqlx::query("SELECT id FROM questions ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter()
            .map(|row| question_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?))
            .collect()
    }

    async fn get_questions(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut bound = Vec::with_capacity(ids.len());
        for id in ids {
            bound.push(id_i64("question_id", id.value())?);
        }

        let question_sql = format!(
            "SELECT id, external_id, text, image_url, explanation FROM questions WHERE id IN ({})",
            placeholders(ids.len())
        );
        let mut query = sqlx::query(&question_sql);
        for id in &bound {
            query = query.bind(*id);
        }
        let question_rows = query.fetch_all(&self.pool).await.map_err(db_err)?;

        let option_sql = format!(
            "SELECT id, question_id, text, is_correct FROM options \
             WHERE question_id IN ({}) ORDER BY question_id ASC, position ASC",
            placeholders(ids.len())
        );
        let mut query = sqlx::query(&option_sql);
        for id in &bound {
            query = query.bind(*id);
        }
        let option_rows = query.fetch_all(&self.pool).await.map_err(db_err)?;

        let mut options: HashMap<QuestionId, Vec<AnswerOption>> = HashMap::new();
        for row in &option_rows {
            let option = map_option_row(row)?;
            options.entry(option.question_id).or_default().push(option);
        }

        let mut by_id = HashMap::with_capacity(question_rows.len());
        for row in &question_rows {
            let id = question_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;
            let question = Question::new(
                id,
                row.try_get::<String, _>("external_id").map_err(ser)?,
                row.try_get::<String, _>("text").map_err(ser)?,
                row.try_get::<Option<String>, _>("image_url").map_err(ser)?,
                row.try_get::<Option<String>, _>("explanation").map_err(ser)?,
                options.remove(&id).unwrap_or_default(),
            )
            .map_err(ser)?;
            by_id.insert(id, question);
        }

        ids.iter()
            .map(|id| by_id.get(id).cloned().ok_or(StorageError::NotFound))
            .collect()
    }

    async fn find_option(
        &self,
        option_id: OptionId,
        question_id: QuestionId,
    ) -> Result<Option<AnswerOption>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, question_id, text, is_correct
                FROM options
                WHERE id = ?1 AND question_id = ?2
            ",
        )
        .bind(id_i64("option_id", option_id.value())?)
        .bind(id_i64("question_id", question_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_option_row).transpose()
    }
}
