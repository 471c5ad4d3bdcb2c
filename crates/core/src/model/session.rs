use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::SessionId;
use crate::time::elapsed_whole_seconds;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionConfigError {
    #[error("exam duration must be > 0 seconds")]
    InvalidDuration,

    #[error("exam sessions require both a duration and a mistake limit")]
    MissingExamLimits,

    #[error("training sessions cannot carry exam limits")]
    UnexpectedExamLimits,

    #[error("invalid session mode: {0}")]
    InvalidMode(String),

    #[error("finished_at is before started_at")]
    InvalidTimeRange,
}

//
// ─── MODE ──────────────────────────────────────────────────────────────────────
//

/// How a session is run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Untimed practice; no mistake limit.
    Training,
    /// Timed, mistake-limited exam simulation.
    Exam,
}

impl SessionMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionMode::Training => "training",
            SessionMode::Exam => "exam",
        }
    }

    /// Parses the storage representation of a mode.
    ///
    /// # Errors
    ///
    /// Returns `SessionConfigError::InvalidMode` for unknown values.
    pub fn parse(value: &str) -> Result<Self, SessionConfigError> {
        match value {
            "training" => Ok(Self::Training),
            "exam" => Ok(Self::Exam),
            other => Err(SessionConfigError::InvalidMode(other.to_string())),
        }
    }
}

/// Why a session was terminated early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    Time,
    Mistakes,
}

impl FinishReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FinishReason::Time => "time",
            FinishReason::Mistakes => "mistakes",
        }
    }
}

//
// ─── CONFIG ────────────────────────────────────────────────────────────────────
//

/// Mode plus the limits that go with it.
///
/// Exam sessions always carry a duration and a mistake limit; training
/// sessions carry neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionConfig {
    Training,
    Exam { duration_sec: u32, max_mistakes: u32 },
}

impl SessionConfig {
    /// Build an exam configuration.
    ///
    /// # Errors
    ///
    /// Returns `SessionConfigError::InvalidDuration` for a zero duration.
    pub fn exam(duration_sec: u32, max_mistakes: u32) -> Result<Self, SessionConfigError> {
        if duration_sec == 0 {
            return Err(SessionConfigError::InvalidDuration);
        }
        Ok(Self::Exam {
            duration_sec,
            max_mistakes,
        })
    }

    /// Rebuild a configuration from its column representation.
    ///
    /// # Errors
    ///
    /// Returns `SessionConfigError` if the limits do not match the mode.
    pub fn from_parts(
        mode: SessionMode,
        duration_sec: Option<u32>,
        max_mistakes: Option<u32>,
    ) -> Result<Self, SessionConfigError> {
        match (mode, duration_sec, max_mistakes) {
            (SessionMode::Training, None, None) => Ok(Self::Training),
            (SessionMode::Training, _, _) => Err(SessionConfigError::UnexpectedExamLimits),
            (SessionMode::Exam, Some(duration), Some(max)) => Self::exam(duration, max),
            (SessionMode::Exam, _, _) => Err(SessionConfigError::MissingExamLimits),
        }
    }

    #[must_use]
    pub fn mode(self) -> SessionMode {
        match self {
            SessionConfig::Training => SessionMode::Training,
            SessionConfig::Exam { .. } => SessionMode::Exam,
        }
    }

    #[must_use]
    pub fn duration_sec(self) -> Option<u32> {
        match self {
            SessionConfig::Training => None,
            SessionConfig::Exam { duration_sec, .. } => Some(duration_sec),
        }
    }

    #[must_use]
    pub fn max_mistakes(self) -> Option<u32> {
        match self {
            SessionConfig::Training => None,
            SessionConfig::Exam { max_mistakes, .. } => Some(max_mistakes),
        }
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Totals written when a session is finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOutcome {
    pub finished_at: DateTime<Utc>,
    pub score: u32,
    pub mistakes_count: u32,
}

/// A persisted quiz session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: SessionId,
    config: SessionConfig,
    started_at: DateTime<Utc>,
    outcome: Option<SessionOutcome>,
}

impl Session {
    #[must_use]
    pub fn new(id: SessionId, config: SessionConfig, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            config,
            started_at,
            outcome: None,
        }
    }

    /// Rehydrate a session from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionConfigError::InvalidTimeRange` if the outcome predates
    /// the start.
    pub fn from_persisted(
        id: SessionId,
        config: SessionConfig,
        started_at: DateTime<Utc>,
        outcome: Option<SessionOutcome>,
    ) -> Result<Self, SessionConfigError> {
        if outcome.is_some_and(|o| o.finished_at < started_at) {
            return Err(SessionConfigError::InvalidTimeRange);
        }
        Ok(Self {
            id,
            config,
            started_at,
            outcome,
        })
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn config(&self) -> SessionConfig {
        self.config
    }

    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.config.mode()
    }

    #[must_use]
    pub fn is_exam(&self) -> bool {
        self.mode() == SessionMode::Exam
    }

    #[must_use]
    pub fn duration_sec(&self) -> Option<u32> {
        self.config.duration_sec()
    }

    #[must_use]
    pub fn max_mistakes(&self) -> Option<u32> {
        self.config.max_mistakes()
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.outcome
    }

    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.outcome.map(|o| o.finished_at)
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    #[must_use]
    pub fn score(&self) -> Option<u32> {
        self.outcome.map(|o| o.score)
    }

    #[must_use]
    pub fn mistakes_count(&self) -> Option<u32> {
        self.outcome.map(|o| o.mistakes_count)
    }

    /// Seconds left on the exam clock at `now`.
    ///
    /// Zero for training sessions, finished sessions and sessions without a
    /// duration; otherwise `max(0, duration - elapsed)`.
    #[must_use]
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> u32 {
        if self.is_finished() {
            return 0;
        }
        let Some(duration) = self.duration_sec() else {
            return 0;
        };
        let elapsed = elapsed_whole_seconds(self.started_at, now);
        u64::from(duration)
            .saturating_sub(elapsed)
            .try_into()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn exam(started_at: DateTime<Utc>) -> Session {
        Session::new(
            SessionId::new(1),
            SessionConfig::exam(1200, 2).unwrap(),
            started_at,
        )
    }

    #[test]
    fn config_round_trips_through_parts() {
        let config = SessionConfig::from_parts(SessionMode::Exam, Some(1200), Some(2)).unwrap();
        assert_eq!(config.duration_sec(), Some(1200));
        assert_eq!(config.max_mistakes(), Some(2));
        assert_eq!(
            SessionConfig::from_parts(SessionMode::Training, None, None).unwrap(),
            SessionConfig::Training
        );
    }

    #[test]
    fn config_rejects_mismatched_limits() {
        assert_eq!(
            SessionConfig::from_parts(SessionMode::Exam, Some(1200), None).unwrap_err(),
            SessionConfigError::MissingExamLimits
        );
        assert_eq!(
            SessionConfig::from_parts(SessionMode::Training, Some(60), None).unwrap_err(),
            SessionConfigError::UnexpectedExamLimits
        );
        assert_eq!(
            SessionConfig::exam(0, 2).unwrap_err(),
            SessionConfigError::InvalidDuration
        );
    }

    #[test]
    fn mode_parses_storage_values() {
        assert_eq!(SessionMode::parse("exam").unwrap(), SessionMode::Exam);
        assert_eq!(SessionMode::Training.as_str(), "training");
        assert!(SessionMode::parse("quiz").is_err());
    }

    #[test]
    fn remaining_seconds_counts_down_and_floors_at_zero() {
        let start = fixed_now();
        let session = exam(start);

        assert_eq!(session.remaining_seconds(start), 1200);
        assert_eq!(
            session.remaining_seconds(start + Duration::milliseconds(61_900)),
            1139
        );
        assert_eq!(session.remaining_seconds(start + Duration::seconds(1200)), 0);
        assert_eq!(session.remaining_seconds(start + Duration::hours(3)), 0);
    }

    #[test]
    fn remaining_seconds_is_zero_for_training_and_finished() {
        let start = fixed_now();
        let training = Session::new(SessionId::new(2), SessionConfig::Training, start);
        assert_eq!(training.remaining_seconds(start), 0);

        let finished = Session::from_persisted(
            SessionId::new(3),
            SessionConfig::exam(1200, 2).unwrap(),
            start,
            Some(SessionOutcome {
                finished_at: start,
                score: 0,
                mistakes_count: 0,
            }),
        )
        .unwrap();
        assert_eq!(finished.remaining_seconds(start), 0);
    }

    #[test]
    fn outcome_before_start_is_rejected() {
        let start = fixed_now();
        let err = Session::from_persisted(
            SessionId::new(4),
            SessionConfig::Training,
            start,
            Some(SessionOutcome {
                finished_at: start - Duration::seconds(1),
                score: 0,
                mistakes_count: 0,
            }),
        )
        .unwrap_err();
        assert_eq!(err, SessionConfigError::InvalidTimeRange);
    }
}
