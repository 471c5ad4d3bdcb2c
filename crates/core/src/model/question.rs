use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{OptionId, QuestionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question external id cannot be empty")]
    EmptyExternalId,

    #[error("question text cannot be empty")]
    EmptyText,

    #[error("option text cannot be empty")]
    EmptyOptionText,

    #[error("option {option} does not belong to question {question}")]
    ForeignOption { option: OptionId, question: QuestionId },
}

//
// ─── OPTION ────────────────────────────────────────────────────────────────────
//

/// One selectable answer of a question.
///
/// `is_correct` is the current value; answer logs copy it at submission time
/// so later edits never rewrite history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: OptionId,
    pub question_id: QuestionId,
    pub text: String,
    pub is_correct: bool,
}

impl AnswerOption {
    #[must_use]
    pub fn new(
        id: OptionId,
        question_id: QuestionId,
        text: impl Into<String>,
        is_correct: bool,
    ) -> Self {
        Self {
            id,
            question_id,
            text: text.into(),
            is_correct,
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A multiple-choice question with its options in presentation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    external_id: String,
    text: String,
    image_url: Option<String>,
    explanation: Option<String>,
    options: Vec<AnswerOption>,
}

impl Question {
    /// Build a validated question.
    ///
    /// Well-formed data has exactly one correct option, but that is not
    /// enforced here.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if text fields are empty or an option is owned
    /// by a different question.
    pub fn new(
        id: QuestionId,
        external_id: impl Into<String>,
        text: impl Into<String>,
        image_url: Option<String>,
        explanation: Option<String>,
        options: Vec<AnswerOption>,
    ) -> Result<Self, QuestionError> {
        let external_id = external_id.into();
        if external_id.trim().is_empty() {
            return Err(QuestionError::EmptyExternalId);
        }
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        for option in &options {
            if option.question_id != id {
                return Err(QuestionError::ForeignOption {
                    option: option.id,
                    question: id,
                });
            }
            if option.text.trim().is_empty() {
                return Err(QuestionError::EmptyOptionText);
            }
        }

        Ok(Self {
            id,
            external_id,
            text,
            image_url: image_url.filter(|url| !url.trim().is_empty()),
            explanation: explanation.filter(|e| !e.trim().is_empty()),
            options,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    #[must_use]
    pub fn options(&self) -> &[AnswerOption] {
        &self.options
    }

    #[must_use]
    pub fn option(&self, id: OptionId) -> Option<&AnswerOption> {
        self.options.iter().find(|o| o.id == id)
    }

    /// First option flagged as correct, if any.
    #[must_use]
    pub fn correct_option(&self) -> Option<&AnswerOption> {
        self.options.iter().find(|o| o.is_correct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(question: u64) -> Vec<AnswerOption> {
        let q = QuestionId::new(question);
        vec![
            AnswerOption::new(OptionId::new(1), q, "Stop", false),
            AnswerOption::new(OptionId::new(2), q, "Yield", true),
        ]
    }

    #[test]
    fn question_exposes_correct_option() {
        let q = Question::new(
            QuestionId::new(5),
            "ticket-1-q5",
            "What does the sign mean?",
            Some("  ".into()),
            None,
            options(5),
        )
        .unwrap();

        assert_eq!(q.correct_option().unwrap().id, OptionId::new(2));
        assert_eq!(q.option(OptionId::new(1)).unwrap().text, "Stop");
        assert_eq!(q.image_url(), None);
    }

    #[test]
    fn question_rejects_foreign_options() {
        let err = Question::new(QuestionId::new(6), "x", "text", None, None, options(5))
            .unwrap_err();
        assert!(matches!(err, QuestionError::ForeignOption { .. }));
    }

    #[test]
    fn question_rejects_empty_text() {
        let err =
            Question::new(QuestionId::new(5), "x", " ", None, None, options(5)).unwrap_err();
        assert_eq!(err, QuestionError::EmptyText);
    }
}
