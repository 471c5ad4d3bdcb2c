use exam_core::model::{SessionConfig, SessionConfigError};

/// Fixed parameters for building sessions.
///
/// Defaults mirror the official theory exam: 20 questions, 20 minutes,
/// at most 2 mistakes. Training sessions draw up to 20 questions per topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExamRules {
    exam_question_count: u32,
    exam_duration_sec: u32,
    exam_max_mistakes: u32,
    training_question_cap: u32,
}

impl Default for ExamRules {
    fn default() -> Self {
        Self {
            exam_question_count: 20,
            exam_duration_sec: 1200,
            exam_max_mistakes: 2,
            training_question_cap: 20,
        }
    }
}

impl ExamRules {
    /// Build custom rules.
    ///
    /// # Errors
    ///
    /// Returns `SessionConfigError::InvalidDuration` for a zero duration.
    pub fn new(
        exam_question_count: u32,
        exam_duration_sec: u32,
        exam_max_mistakes: u32,
        training_question_cap: u32,
    ) -> Result<Self, SessionConfigError> {
        if exam_duration_sec == 0 {
            return Err(SessionConfigError::InvalidDuration);
        }
        Ok(Self {
            exam_question_count,
            exam_duration_sec,
            exam_max_mistakes,
            training_question_cap,
        })
    }

    #[must_use]
    pub fn exam_question_count(&self) -> u32 {
        self.exam_question_count
    }

    #[must_use]
    pub fn exam_duration_sec(&self) -> u32 {
        self.exam_duration_sec
    }

    #[must_use]
    pub fn exam_max_mistakes(&self) -> u32 {
        self.exam_max_mistakes
    }

    #[must_use]
    pub fn training_question_cap(&self) -> u32 {
        self.training_question_cap
    }

    /// Session configuration for a new exam.
    ///
    /// # Errors
    ///
    /// Returns `SessionConfigError` if the rules describe an invalid exam.
    pub fn exam_config(&self) -> Result<SessionConfig, SessionConfigError> {
        SessionConfig::exam(self.exam_duration_sec, self.exam_max_mistakes)
    }
}
