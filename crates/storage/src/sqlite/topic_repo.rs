use exam_core::model::{QuestionId, Topic, TopicId, TopicName};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{db_err, id_i64, question_id_from_i64, ser, topic_id_from_i64, u32_from_i64};
use crate::repository::{StorageError, TopicRepository, TopicSummary};

fn map_topic_row(row: &SqliteRow) -> Result<Topic, StorageError> {
    let id = topic_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;
    let name = TopicName::new(row.try_get::<String, _>("name").map_err(ser)?).map_err(ser)?;
    Ok(Topic::new(id, name))
}

#[async_trait::async_trait]
impl TopicRepository for SqliteRepository {
    async fn upsert_topic(&self, name: &TopicName) -> Result<TopicId, StorageError> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let row = sqlx::query(
            r"
                INSERT INTO topics (name) VALUES (?1)
                ON CONFLICT(name) DO UPDATE SET name = excluded.name
                RETURNING id
            ",
        )
        .bind(name.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        topic_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)
    }

    async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>, StorageError> {
        let row = sqlx::query("SELECT id, name FROM topics WHERE id = ?1")
            .bind(id_i64("topic_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(map_topic_row).transpose()
    }

    async fn list_topics(&self) -> Result<Vec<TopicSummary>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT t.id, t.name, COUNT(qt.question_id) AS question_count
                FROM topics t
                LEFT JOIN question_topics qt ON qt.topic_id = t.id
                GROUP BY t.id, t.name
                ORDER BY t.name ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(TopicSummary {
                topic: map_topic_row(&row)?,
                question_count: u32_from_i64(
                    "question_count",
                    row.try_get::<i64, _>("question_count").map_err(ser)?,
                )?,
            });
        }
        Ok(out)
    }

    async fn question_ids_for_topic(&self, id: TopicId) -> Result<Vec<QuestionId>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT question_id
                FROM question_topics
                WHERE topic_id = ?1
                ORDER BY question_id ASC
            ",
        )
        .bind(id_i64("topic_id", id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|row| question_id_from_i64(row.try_get::<i64, _>("question_id").map_err(ser)?))
            .collect()
    }
}
