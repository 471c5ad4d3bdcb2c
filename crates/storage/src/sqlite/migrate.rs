use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the versioned migrations for the current schema.
///
/// Version 1 creates the question bank (topics, questions, options, links)
/// and the session tables (sessions, session questions, answer logs).
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        let statements = [
            r"
                CREATE TABLE IF NOT EXISTS topics (
                    id INTEGER PRIMARY KEY,
                    name TEXT NOT NULL UNIQUE
                );
            ",
            r"
                CREATE TABLE IF NOT EXISTS questions (
                    id INTEGER PRIMARY KEY,
                    external_id TEXT NOT NULL UNIQUE,
                    text TEXT NOT NULL,
                    image_url TEXT,
                    explanation TEXT
                );
            ",
            r"
                CREATE TABLE IF NOT EXISTS options (
                    id INTEGER PRIMARY KEY,
                    question_id INTEGER NOT NULL,
                    position INTEGER NOT NULL CHECK (position >= 0),
                    text TEXT NOT NULL,
                    is_correct INTEGER NOT NULL CHECK (is_correct IN (0, 1)),
                    UNIQUE (question_id, position),
                    FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE
                );
            ",
            r"
                CREATE TABLE IF NOT EXISTS question_topics (
                    question_id INTEGER NOT NULL,
                    topic_id INTEGER NOT NULL,
                    PRIMARY KEY (question_id, topic_id),
                    FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE,
                    FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
                );
            ",
            r"
                CREATE TABLE IF NOT EXISTS sessions (
                    id INTEGER PRIMARY KEY,
                    mode TEXT NOT NULL CHECK (mode IN ('training', 'exam')),
                    started_at TEXT NOT NULL,
                    duration_sec INTEGER CHECK (duration_sec > 0),
                    max_mistakes INTEGER CHECK (max_mistakes >= 0),
                    finished_at TEXT,
                    score INTEGER CHECK (score >= 0),
                    mistakes_count INTEGER CHECK (mistakes_count >= 0),
                    CHECK (
                        (mode = 'training' AND duration_sec IS NULL AND max_mistakes IS NULL)
                        OR (mode = 'exam' AND duration_sec IS NOT NULL AND max_mistakes IS NOT NULL)
                    )
                );
            ",
            r"
                CREATE TABLE IF NOT EXISTS session_questions (
                    session_id INTEGER NOT NULL,
                    question_id INTEGER NOT NULL,
                    order_index INTEGER NOT NULL CHECK (order_index >= 0),
                    PRIMARY KEY (session_id, order_index),
                    UNIQUE (session_id, question_id),
                    FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE,
                    FOREIGN KEY (question_id) REFERENCES questions(id)
                );
            ",
            r"
                CREATE TABLE IF NOT EXISTS answer_logs (
                    id INTEGER PRIMARY KEY,
                    session_id INTEGER NOT NULL,
                    question_id INTEGER NOT NULL,
                    selected_option_id INTEGER NOT NULL,
                    is_correct INTEGER NOT NULL CHECK (is_correct IN (0, 1)),
                    answered_at TEXT NOT NULL,
                    FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE,
                    FOREIGN KEY (question_id) REFERENCES questions(id),
                    FOREIGN KEY (selected_option_id) REFERENCES options(id)
                );
            ",
            r"
                CREATE INDEX IF NOT EXISTS idx_question_topics_topic
                    ON question_topics (topic_id, question_id);
            ",
            r"
                CREATE INDEX IF NOT EXISTS idx_answer_logs_session_answered_at
                    ON answer_logs (session_id, answered_at, id);
            ",
        ];

        for statement in statements {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
