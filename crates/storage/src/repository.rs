use async_trait::async_trait;
use chrono::{DateTime, Utc};
use exam_core::model::{
    AnswerLog, AnswerOption, OptionId, Question, QuestionError, QuestionId, Session,
    SessionConfig, SessionId, SessionOutcome, Topic, TopicId, TopicName,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    /// Unique or foreign-key constraint violation.
    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// A topic together with the number of questions linked to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSummary {
    pub topic: Topic,
    pub question_count: u32,
}

/// Insert shape for an option; ids are assigned by storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOptionRecord {
    pub text: String,
    pub is_correct: bool,
}

impl NewOptionRecord {
    #[must_use]
    pub fn new(text: impl Into<String>, is_correct: bool) -> Self {
        Self {
            text: text.into(),
            is_correct,
        }
    }
}

/// Insert/update shape for a question, keyed by `external_id`.
///
/// Options are matched by position. Surplus options of an existing question
/// are removed, which fails with `StorageError::Conflict` once they are
/// referenced by answer logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuestionRecord {
    pub external_id: String,
    pub text: String,
    pub image_url: Option<String>,
    pub explanation: Option<String>,
    pub options: Vec<NewOptionRecord>,
    pub topic_ids: Vec<TopicId>,
}

/// Insert shape for a session and its fixed question order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSessionRecord {
    pub config: SessionConfig,
    pub started_at: DateTime<Utc>,
    /// Presentation order; index in this list becomes `order_index`.
    pub question_ids: Vec<QuestionId>,
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait TopicRepository: Send + Sync {
    /// Insert a topic or return the id of the existing one with this name.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the topic cannot be stored.
    async fn upsert_topic(&self, name: &TopicName) -> Result<TopicId, StorageError>;

    /// Fetch a topic by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>, StorageError>;

    /// All topics ordered by name, with question counts.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_topics(&self) -> Result<Vec<TopicSummary>, StorageError>;

    /// Ids of every question linked to the topic, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn question_ids_for_topic(&self, id: TopicId) -> Result<Vec<QuestionId>, StorageError>;
}

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Insert or update a question by external id, replacing its topic links.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` on constraint violations (unknown
    /// topic, referenced surplus option) or other storage errors.
    async fn upsert_question(&self, question: NewQuestionRecord)
    -> Result<QuestionId, StorageError>;

    /// Ids of the whole question pool, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn all_question_ids(&self) -> Result<Vec<QuestionId>, StorageError>;

    /// Fetch questions with options, in the order of `ids`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if any id is missing.
    async fn get_questions(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError>;

    /// Resolve an option only if it belongs to the given question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn find_option(
        &self,
        option_id: OptionId,
        question_id: QuestionId,
    ) -> Result<Option<AnswerOption>, StorageError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Create a session and its question rows atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored; nothing is
    /// committed in that case.
    async fn create_session(&self, session: NewSessionRecord) -> Result<SessionId, StorageError>;

    /// Fetch a session by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StorageError>;

    /// Question ids of a session ordered by `order_index`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn session_question_ids(&self, id: SessionId)
    -> Result<Vec<QuestionId>, StorageError>;

    /// Overwrite `finished_at`, `score` and `mistakes_count`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist.
    async fn finish_session(
        &self,
        id: SessionId,
        outcome: SessionOutcome,
    ) -> Result<(), StorageError>;
}

#[async_trait]
pub trait AnswerLogRepository: Send + Sync {
    /// Append an answer log row and return its row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the log cannot be stored.
    async fn append_answer(&self, log: &AnswerLog) -> Result<i64, StorageError>;

    /// Every answer of a session ordered by `answered_at`, then insertion.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn answers_for_session(&self, id: SessionId) -> Result<Vec<AnswerLog>, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone)]
struct StoredQuestion {
    external_id: String,
    text: String,
    image_url: Option<String>,
    explanation: Option<String>,
    options: Vec<AnswerOption>,
    topic_ids: Vec<TopicId>,
}

#[derive(Default)]
struct MemoryState {
    next_id: u64,
    topics: BTreeMap<TopicId, TopicName>,
    questions: BTreeMap<QuestionId, StoredQuestion>,
    sessions: HashMap<SessionId, Session>,
    session_questions: HashMap<SessionId, Vec<QuestionId>>,
    answers: Vec<AnswerLog>,
}

impl MemoryState {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn option_is_referenced(&self, id: OptionId) -> bool {
        self.answers.iter().any(|a| a.selected_option_id == id)
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

fn build_question(id: QuestionId, stored: &StoredQuestion) -> Result<Question, StorageError> {
    Question::new(
        id,
        stored.external_id.clone(),
        stored.text.clone(),
        stored.image_url.clone(),
        stored.explanation.clone(),
        stored.options.clone(),
    )
    .map_err(|e: QuestionError| StorageError::Serialization(e.to_string()))
}

#[async_trait]
impl TopicRepository for InMemoryRepository {
    async fn upsert_topic(&self, name: &TopicName) -> Result<TopicId, StorageError> {
        let mut guard = self.lock()?;
        if let Some((id, _)) = guard.topics.iter().find(|(_, n)| *n == name) {
            return Ok(*id);
        }
        let id = TopicId::new(guard.allocate());
        guard.topics.insert(id, name.clone());
        Ok(id)
    }

    async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .topics
            .get(&id)
            .map(|name| Topic::new(id, name.clone())))
    }

    async fn list_topics(&self) -> Result<Vec<TopicSummary>, StorageError> {
        let guard = self.lock()?;
        let mut out: Vec<TopicSummary> = guard
            .topics
            .iter()
            .map(|(id, name)| {
                let count = guard
                    .questions
                    .values()
                    .filter(|q| q.topic_ids.contains(id))
                    .count();
                TopicSummary {
                    topic: Topic::new(*id, name.clone()),
                    question_count: u32::try_from(count).unwrap_or(u32::MAX),
                }
            })
            .collect();
        out.sort_by(|a, b| a.topic.name().as_str().cmp(b.topic.name().as_str()));
        Ok(out)
    }

    async fn question_ids_for_topic(&self, id: TopicId) -> Result<Vec<QuestionId>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .questions
            .iter()
            .filter(|(_, q)| q.topic_ids.contains(&id))
            .map(|(qid, _)| *qid)
            .collect())
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn upsert_question(
        &self,
        question: NewQuestionRecord,
    ) -> Result<QuestionId, StorageError> {
        let mut guard = self.lock()?;
        if question
            .topic_ids
            .iter()
            .any(|t| !guard.topics.contains_key(t))
        {
            return Err(StorageError::Conflict);
        }

        let existing = guard
            .questions
            .iter()
            .find(|(_, q)| q.external_id == question.external_id)
            .map(|(id, q)| (*id, q.options.clone()));
        let (id, previous) = match existing {
            Some((id, options)) => (id, options),
            None => (QuestionId::new(guard.allocate()), Vec::new()),
        };

        if previous
            .iter()
            .skip(question.options.len())
            .any(|o| guard.option_is_referenced(o.id))
        {
            return Err(StorageError::Conflict);
        }

        let mut options = Vec::with_capacity(question.options.len());
        for (position, record) in question.options.into_iter().enumerate() {
            let option_id = match previous.get(position) {
                Some(old) => old.id,
                None => OptionId::new(guard.allocate()),
            };
            options.push(AnswerOption::new(
                option_id,
                id,
                record.text,
                record.is_correct,
            ));
        }

        let mut topic_ids = question.topic_ids;
        topic_ids.sort();
        topic_ids.dedup();

        guard.questions.insert(
            id,
            StoredQuestion {
                external_id: question.external_id,
                text: question.text,
                image_url: question.image_url,
                explanation: question.explanation,
                options,
                topic_ids,
            },
        );
        Ok(id)
    }

    async fn all_question_ids(&self) -> Result<Vec<QuestionId>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.questions.keys().copied().collect())
    }

    async fn get_questions(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError> {
        let guard = self.lock()?;
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            match guard.questions.get(id) {
                Some(stored) => found.push(build_question(*id, stored)?),
                None => return Err(StorageError::NotFound),
            }
        }
        Ok(found)
    }

    async fn find_option(
        &self,
        option_id: OptionId,
        question_id: QuestionId,
    ) -> Result<Option<AnswerOption>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .questions
            .get(&question_id)
            .and_then(|q| q.options.iter().find(|o| o.id == option_id))
            .cloned())
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn create_session(&self, session: NewSessionRecord) -> Result<SessionId, StorageError> {
        let mut guard = self.lock()?;
        let mut seen = HashSet::new();
        for qid in &session.question_ids {
            if !guard.questions.contains_key(qid) || !seen.insert(*qid) {
                return Err(StorageError::Conflict);
            }
        }

        let id = SessionId::new(guard.allocate());
        guard
            .sessions
            .insert(id, Session::new(id, session.config, session.started_at));
        guard.session_questions.insert(id, session.question_ids);
        Ok(id)
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.sessions.get(&id).cloned())
    }

    async fn session_question_ids(
        &self,
        id: SessionId,
    ) -> Result<Vec<QuestionId>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.session_questions.get(&id).cloned().unwrap_or_default())
    }

    async fn finish_session(
        &self,
        id: SessionId,
        outcome: SessionOutcome,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let current = guard.sessions.get(&id).ok_or(StorageError::NotFound)?;
        let updated = Session::from_persisted(
            id,
            current.config(),
            current.started_at(),
            Some(outcome),
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
        guard.sessions.insert(id, updated);
        Ok(())
    }
}

#[async_trait]
impl AnswerLogRepository for InMemoryRepository {
    async fn append_answer(&self, log: &AnswerLog) -> Result<i64, StorageError> {
        let mut guard = self.lock()?;
        let option_known = guard
            .questions
            .get(&log.question_id)
            .is_some_and(|q| q.options.iter().any(|o| o.id == log.selected_option_id));
        if !guard.sessions.contains_key(&log.session_id) || !option_known {
            return Err(StorageError::Conflict);
        }
        guard.answers.push(log.clone());
        i64::try_from(guard.answers.len())
            .map_err(|_| StorageError::Serialization("answer id overflow".into()))
    }

    async fn answers_for_session(&self, id: SessionId) -> Result<Vec<AnswerLog>, StorageError> {
        let guard = self.lock()?;
        let mut logs: Vec<AnswerLog> = guard
            .answers
            .iter()
            .filter(|a| a.session_id == id)
            .cloned()
            .collect();
        // stable: equal timestamps keep insertion order
        logs.sort_by_key(|a| a.answered_at);
        Ok(logs)
    }
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub topics: Arc<dyn TopicRepository>,
    pub questions: Arc<dyn QuestionRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub answers: Arc<dyn AnswerLogRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Wire every repository role to one backend.
    #[must_use]
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: TopicRepository
            + QuestionRepository
            + SessionRepository
            + AnswerLogRepository
            + Clone
            + 'static,
    {
        Self {
            topics: Arc::new(repo.clone()),
            questions: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            answers: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::time::fixed_now;

    fn question(external_id: &str, topics: Vec<TopicId>) -> NewQuestionRecord {
        NewQuestionRecord {
            external_id: external_id.to_string(),
            text: format!("Question {external_id}"),
            image_url: None,
            explanation: Some("Because.".into()),
            options: vec![
                NewOptionRecord::new("Right", true),
                NewOptionRecord::new("Wrong", false),
            ],
            topic_ids: topics,
        }
    }

    #[tokio::test]
    async fn upsert_question_keeps_ids_and_option_identity() {
        let repo = InMemoryRepository::new();
        let topic = repo
            .upsert_topic(&TopicName::new("Signs").unwrap())
            .await
            .unwrap();

        let id = repo.upsert_question(question("t1-q1", vec![topic])).await.unwrap();
        let first = repo.get_questions(&[id]).await.unwrap();
        let option_ids: Vec<_> = first[0].options().iter().map(|o| o.id).collect();

        let mut edited = question("t1-q1", vec![topic]);
        edited.text = "Edited".into();
        let again = repo.upsert_question(edited).await.unwrap();
        assert_eq!(again, id);

        let second = repo.get_questions(&[id]).await.unwrap();
        assert_eq!(second[0].text(), "Edited");
        let second_ids: Vec<_> = second[0].options().iter().map(|o| o.id).collect();
        assert_eq!(option_ids, second_ids);
    }

    #[tokio::test]
    async fn topics_list_by_name_with_counts() {
        let repo = InMemoryRepository::new();
        let b = repo.upsert_topic(&TopicName::new("Overtaking").unwrap()).await.unwrap();
        let a = repo.upsert_topic(&TopicName::new("Junctions").unwrap()).await.unwrap();
        assert_eq!(
            repo.upsert_topic(&TopicName::new("Junctions").unwrap()).await.unwrap(),
            a
        );

        repo.upsert_question(question("q1", vec![a, b])).await.unwrap();
        repo.upsert_question(question("q2", vec![a])).await.unwrap();

        let topics = repo.list_topics().await.unwrap();
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].topic.id(), a);
        assert_eq!(topics[0].question_count, 2);
        assert_eq!(topics[1].question_count, 1);
        assert_eq!(repo.question_ids_for_topic(b).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn finish_session_requires_existing_session() {
        let repo = InMemoryRepository::new();
        let err = repo
            .finish_session(
                SessionId::new(99),
                SessionOutcome {
                    finished_at: fixed_now(),
                    score: 0,
                    mistakes_count: 0,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn create_session_rejects_unknown_questions() {
        let repo = InMemoryRepository::new();
        let err = repo
            .create_session(NewSessionRecord {
                config: SessionConfig::Training,
                started_at: fixed_now(),
                question_ids: vec![QuestionId::new(12)],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
        assert!(repo.get_session(SessionId::new(1)).await.unwrap().is_none());
    }
}
