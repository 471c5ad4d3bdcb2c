use std::collections::HashMap;

use exam_core::model::{AnswerLog, OptionId, Question, QuestionId, Session};

use super::progress::SessionProgress;

/// Latest answer given to a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerState {
    pub selected_option_id: OptionId,
    pub is_correct: bool,
}

/// Everything needed to resume a session: questions in order plus prior answers.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session: Session,
    pub questions: Vec<Question>,
    /// Last answer per question; earlier duplicates are superseded.
    pub answers: HashMap<QuestionId, AnswerState>,
}

impl SessionSnapshot {
    pub(crate) fn new(session: Session, questions: Vec<Question>, logs: &[AnswerLog]) -> Self {
        let answers = logs
            .iter()
            .map(|log| {
                (
                    log.question_id,
                    AnswerState {
                        selected_option_id: log.selected_option_id,
                        is_correct: log.is_correct,
                    },
                )
            })
            .collect();
        Self {
            session,
            questions,
            answers,
        }
    }

    #[must_use]
    pub fn answer(&self, question_id: QuestionId) -> Option<AnswerState> {
        self.answers.get(&question_id).copied()
    }

    /// Incorrect latest answers, as shown on a resumed exam header.
    #[must_use]
    pub fn mistakes_count(&self) -> usize {
        self.answers.values().filter(|a| !a.is_correct).count()
    }

    /// Index of the first question without an answer.
    #[must_use]
    pub fn next_unanswered(&self) -> Option<usize> {
        self.questions
            .iter()
            .position(|q| !self.answers.contains_key(&q.id()))
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let total = self.questions.len();
        let answered = self
            .questions
            .iter()
            .filter(|q| self.answers.contains_key(&q.id()))
            .count();
        SessionProgress {
            total,
            answered,
            remaining: total.saturating_sub(answered),
            is_complete: self.session.is_finished(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{AnswerOption, SessionConfig, SessionId};
    use exam_core::time::fixed_now;

    fn question(id: u64) -> Question {
        let qid = QuestionId::new(id);
        Question::new(
            qid,
            format!("q{id}"),
            "text",
            None,
            None,
            vec![
                AnswerOption::new(OptionId::new(id * 10), qid, "a", true),
                AnswerOption::new(OptionId::new(id * 10 + 1), qid, "b", false),
            ],
        )
        .unwrap()
    }

    fn log(question: u64, option: u64, is_correct: bool) -> AnswerLog {
        AnswerLog::new(
            SessionId::new(1),
            QuestionId::new(question),
            OptionId::new(option),
            is_correct,
            fixed_now(),
        )
    }

    #[test]
    fn later_answers_supersede_earlier_ones() {
        let session = Session::new(SessionId::new(1), SessionConfig::Training, fixed_now());
        let logs = vec![log(1, 11, false), log(1, 10, true), log(2, 21, false)];
        let snapshot = SessionSnapshot::new(session, vec![question(1), question(2), question(3)], &logs);

        assert_eq!(
            snapshot.answer(QuestionId::new(1)),
            Some(AnswerState {
                selected_option_id: OptionId::new(10),
                is_correct: true
            })
        );
        assert_eq!(snapshot.mistakes_count(), 1);
        assert_eq!(snapshot.next_unanswered(), Some(2));

        let progress = snapshot.progress();
        assert_eq!(progress.total, 3);
        assert_eq!(progress.answered, 2);
        assert_eq!(progress.remaining, 1);
        assert!(!progress.is_complete);
    }
}
