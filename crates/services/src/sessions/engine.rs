use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use exam_core::model::{
    AnswerLog, AnswerTally, FinishReason, OptionId, QuestionId, SessionConfig, SessionId,
    SessionMode, SessionOutcome, SessionResults, TopicId, mistaken_questions,
};
use storage::repository::{
    AnswerLogRepository, NewSessionRecord, QuestionRepository, SessionRepository, Storage,
    StorageError, TopicRepository, TopicSummary,
};

use super::plan::QuestionPicker;
use super::rules::ExamRules;
use super::snapshot::SessionSnapshot;
use crate::Clock;
use crate::error::SessionError;

/// Result of submitting one answer.
///
/// Exam sessions also report the running mistake count and whether the
/// answer ended the exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubmitAnswerResult {
    pub is_correct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mistakes_count: Option<u32>,
    pub is_finished: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<FinishReason>,
}

/// Outcome of deriving a mistake-review session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MistakesReview {
    Created(SessionId),
    /// The source session has no incorrect answers; show its results instead.
    NoMistakes { source: SessionId },
}

/// The session state machine: creation, answering, timing and finalization.
///
/// Every operation reads and writes through the repositories and keeps no
/// per-session state in memory. Tallies are always recomputed from the full
/// answer log.
#[derive(Clone)]
pub struct SessionEngine {
    clock: Clock,
    rules: ExamRules,
    topics: Arc<dyn TopicRepository>,
    questions: Arc<dyn QuestionRepository>,
    sessions: Arc<dyn SessionRepository>,
    answers: Arc<dyn AnswerLogRepository>,
}

impl SessionEngine {
    #[must_use]
    pub fn new(
        clock: Clock,
        topics: Arc<dyn TopicRepository>,
        questions: Arc<dyn QuestionRepository>,
        sessions: Arc<dyn SessionRepository>,
        answers: Arc<dyn AnswerLogRepository>,
    ) -> Self {
        Self {
            clock,
            rules: ExamRules::default(),
            topics,
            questions,
            sessions,
            answers,
        }
    }

    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.topics),
            Arc::clone(&storage.questions),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.answers),
        )
    }

    #[must_use]
    pub fn with_rules(mut self, rules: ExamRules) -> Self {
        self.rules = rules;
        self
    }

    /// Same repositories, different time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn rules(&self) -> &ExamRules {
        &self.rules
    }

    /// Topics ordered by name with their question counts.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn list_topics(&self) -> Result<Vec<TopicSummary>, SessionError> {
        Ok(self.topics.list_topics().await?)
    }

    /// Start a training session over a random selection of a topic's questions.
    ///
    /// A topic without questions yields a session with no questions.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::TopicNotFound` if the topic does not exist.
    pub async fn create_training_session(&self, topic_id: TopicId) -> Result<SessionId, SessionError> {
        if self.topics.get_topic(topic_id).await?.is_none() {
            return Err(SessionError::TopicNotFound(topic_id));
        }
        let pool = self.topics.question_ids_for_topic(topic_id).await?;
        let selected =
            QuestionPicker::with_cap(self.rules.training_question_cap()).pick_random(pool);

        let id = self.create(SessionConfig::Training, selected).await?;
        info!(session_id = %id, topic_id = %topic_id, "training session created");
        Ok(id)
    }

    /// Start an exam over a random selection of the whole question pool.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` for storage or configuration failures.
    pub async fn create_exam_session(&self) -> Result<SessionId, SessionError> {
        let pool = self.questions.all_question_ids().await?;
        let selected =
            QuestionPicker::with_cap(self.rules.exam_question_count()).pick_random(pool);

        let id = self.create(self.rules.exam_config()?, selected).await?;
        info!(session_id = %id, "exam session created");
        Ok(id)
    }

    async fn create(
        &self,
        config: SessionConfig,
        question_ids: Vec<QuestionId>,
    ) -> Result<SessionId, SessionError> {
        let count = question_ids.len();
        let id = self
            .sessions
            .create_session(NewSessionRecord {
                config,
                started_at: self.clock.now(),
                question_ids,
            })
            .await?;
        debug!(session_id = %id, mode = config.mode().as_str(), questions = count, "session rows written");
        Ok(id)
    }

    /// Seconds left on an exam, recomputed from the clock on every call.
    ///
    /// Returns 0 for missing, training, finished or untimed sessions.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn exam_remaining_seconds(&self, session_id: SessionId) -> Result<u32, SessionError> {
        let Some(session) = self.sessions.get_session(session_id).await? else {
            return Ok(0);
        };
        if session.mode() != SessionMode::Exam {
            return Ok(0);
        }
        Ok(session.remaining_seconds(self.clock.now()))
    }

    /// Record an answer and, for exams, apply the mistake limit.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::OptionNotFound` if the option does not belong to
    /// the question, `SessionError::SessionNotFound` for unknown sessions and
    /// `SessionError::Finished` once the session is terminal. No row is
    /// written in any of these cases.
    pub async fn submit_answer(
        &self,
        session_id: SessionId,
        question_id: QuestionId,
        option_id: OptionId,
    ) -> Result<SubmitAnswerResult, SessionError> {
        let option = self
            .questions
            .find_option(option_id, question_id)
            .await?
            .ok_or(SessionError::OptionNotFound {
                option_id,
                question_id,
            })?;

        let session = self
            .sessions
            .get_session(session_id)
            .await?
            .ok_or(SessionError::SessionNotFound(session_id))?;
        if session.is_finished() {
            return Err(SessionError::Finished(session_id));
        }

        let log = AnswerLog::new(
            session_id,
            question_id,
            option_id,
            option.is_correct,
            self.clock.now(),
        );
        self.answers.append_answer(&log).await?;
        debug!(
            session_id = %session_id,
            question_id = %question_id,
            is_correct = option.is_correct,
            "answer recorded"
        );

        let Some(max_mistakes) = session.max_mistakes().filter(|_| session.is_exam()) else {
            return Ok(SubmitAnswerResult {
                is_correct: option.is_correct,
                mistakes_count: None,
                is_finished: false,
                reason: None,
            });
        };

        let logs = self.answers.answers_for_session(session_id).await?;
        let mistakes_count = AnswerTally::from_logs(&logs).incorrect;
        if mistakes_count > max_mistakes {
            self.finish_session(session_id, Some(FinishReason::Mistakes))
                .await?;
            return Ok(SubmitAnswerResult {
                is_correct: option.is_correct,
                mistakes_count: Some(mistakes_count),
                is_finished: true,
                reason: Some(FinishReason::Mistakes),
            });
        }

        Ok(SubmitAnswerResult {
            is_correct: option.is_correct,
            mistakes_count: Some(mistakes_count),
            is_finished: false,
            reason: None,
        })
    }

    /// Finalize a session from its full answer log.
    ///
    /// Safe to call repeatedly: each call recomputes the tally and overwrites
    /// `finished_at`, `score` and `mistakes_count`. `finished_at` never
    /// precedes `started_at`. `reason` is only logged.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SessionNotFound` if the session does not exist.
    pub async fn finish_session(
        &self,
        session_id: SessionId,
        reason: Option<FinishReason>,
    ) -> Result<SessionOutcome, SessionError> {
        let session = self
            .sessions
            .get_session(session_id)
            .await?
            .ok_or(SessionError::SessionNotFound(session_id))?;
        let logs = self.answers.answers_for_session(session_id).await?;
        let tally = AnswerTally::from_logs(&logs);
        // A wall clock stepped backwards must not finish before the start.
        let finished_at = self.clock.now().max(session.started_at());
        let outcome = SessionOutcome {
            finished_at,
            score: tally.correct,
            mistakes_count: tally.incorrect,
        };

        self.sessions
            .finish_session(session_id, outcome)
            .await
            .map_err(|e| match e {
                StorageError::NotFound => SessionError::SessionNotFound(session_id),
                other => SessionError::Storage(other),
            })?;

        info!(
            session_id = %session_id,
            reason = reason.map_or("completed", FinishReason::as_str),
            score = outcome.score,
            mistakes = outcome.mistakes_count,
            "session finished"
        );
        Ok(outcome)
    }

    /// Build a training session from the questions answered wrong in `source`.
    ///
    /// Questions keep the order of their first mistake; nothing is shuffled or
    /// capped.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SessionNotFound` if the source does not exist.
    pub async fn create_mistakes_training_from_session(
        &self,
        source: SessionId,
    ) -> Result<MistakesReview, SessionError> {
        if self.sessions.get_session(source).await?.is_none() {
            return Err(SessionError::SessionNotFound(source));
        }
        let logs = self.answers.answers_for_session(source).await?;
        let question_ids = mistaken_questions(&logs);
        if question_ids.is_empty() {
            debug!(session_id = %source, "no mistakes to review");
            return Ok(MistakesReview::NoMistakes { source });
        }

        let id = self.create(SessionConfig::Training, question_ids).await?;
        info!(session_id = %id, source = %source, "mistake review session created");
        Ok(MistakesReview::Created(id))
    }

    /// Load a session with its ordered questions and latest answers.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SessionNotFound` if the session does not exist.
    pub async fn load_session(&self, session_id: SessionId) -> Result<SessionSnapshot, SessionError> {
        let session = self
            .sessions
            .get_session(session_id)
            .await?
            .ok_or(SessionError::SessionNotFound(session_id))?;
        let ids = self.sessions.session_question_ids(session_id).await?;
        let questions = self.questions.get_questions(&ids).await?;
        let logs = self.answers.answers_for_session(session_id).await?;
        Ok(SessionSnapshot::new(session, questions, &logs))
    }

    /// Results for a session, finalizing it first if it is still open.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SessionNotFound` if the session does not exist.
    pub async fn session_results(&self, session_id: SessionId) -> Result<SessionResults, SessionError> {
        let mut session = self
            .sessions
            .get_session(session_id)
            .await?
            .ok_or(SessionError::SessionNotFound(session_id))?;
        if !session.is_finished() {
            self.finish_session(session_id, None).await?;
            session = self
                .sessions
                .get_session(session_id)
                .await?
                .ok_or(SessionError::SessionNotFound(session_id))?;
        }
        let logs = self.answers.answers_for_session(session_id).await?;
        Ok(SessionResults::compute(
            &session,
            &logs,
            self.rules.exam_question_count(),
        ))
    }
}
