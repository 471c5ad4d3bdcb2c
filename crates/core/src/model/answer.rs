use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::model::ids::{OptionId, QuestionId, SessionId};

//
// ─── ANSWER LOG ────────────────────────────────────────────────────────────────
//

/// Record of a single submitted answer.
///
/// `is_correct` is frozen at submission time. Logs are append-only; the same
/// question may appear more than once in a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerLog {
    pub session_id: SessionId,
    pub question_id: QuestionId,
    pub selected_option_id: OptionId,
    pub is_correct: bool,
    pub answered_at: DateTime<Utc>,
}

impl AnswerLog {
    #[must_use]
    pub fn new(
        session_id: SessionId,
        question_id: QuestionId,
        selected_option_id: OptionId,
        is_correct: bool,
        answered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            question_id,
            selected_option_id,
            is_correct,
            answered_at,
        }
    }
}

//
// ─── TALLY ─────────────────────────────────────────────────────────────────────
//

/// Correct/incorrect counts derived from a full answer log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnswerTally {
    pub correct: u32,
    pub incorrect: u32,
}

impl AnswerTally {
    #[must_use]
    pub fn from_logs(logs: &[AnswerLog]) -> Self {
        logs.iter().fold(Self::default(), |mut tally, log| {
            if log.is_correct {
                tally.correct = tally.correct.saturating_add(1);
            } else {
                tally.incorrect = tally.incorrect.saturating_add(1);
            }
            tally
        })
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.correct.saturating_add(self.incorrect)
    }

    /// Share of correct answers, rounded to a whole percent. Zero when empty.
    #[must_use]
    pub fn percent(&self) -> u32 {
        let total = self.total();
        if total == 0 {
            return 0;
        }
        let scaled = u64::from(self.correct) * 100;
        let total = u64::from(total);
        // round half up
        u32::try_from((scaled * 2 + total) / (total * 2)).unwrap_or(100)
    }
}

/// Questions answered incorrectly, in first-mistake order without repeats.
///
/// Logs are ordered by `answered_at` first; ties keep their stored order.
#[must_use]
pub fn mistaken_questions(logs: &[AnswerLog]) -> Vec<QuestionId> {
    let mut wrong: Vec<&AnswerLog> = logs.iter().filter(|log| !log.is_correct).collect();
    wrong.sort_by_key(|log| log.answered_at);

    let mut seen = HashSet::new();
    wrong
        .into_iter()
        .map(|log| log.question_id)
        .filter(|id| seen.insert(*id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn log(question: u64, is_correct: bool, offset_secs: i64) -> AnswerLog {
        AnswerLog::new(
            SessionId::new(1),
            QuestionId::new(question),
            OptionId::new(question * 10),
            is_correct,
            fixed_now() + Duration::seconds(offset_secs),
        )
    }

    #[test]
    fn tally_counts_every_row() {
        let logs = vec![log(1, true, 0), log(1, false, 1), log(2, false, 2)];
        let tally = AnswerTally::from_logs(&logs);
        assert_eq!(tally.correct, 1);
        assert_eq!(tally.incorrect, 2);
        assert_eq!(tally.total(), 3);
    }

    #[test]
    fn percent_rounds_to_nearest() {
        let tally = AnswerTally {
            correct: 18,
            incorrect: 2,
        };
        assert_eq!(tally.percent(), 90);
        assert_eq!(
            AnswerTally {
                correct: 2,
                incorrect: 1
            }
            .percent(),
            67
        );
        assert_eq!(
            AnswerTally {
                correct: 1,
                incorrect: 1
            }
            .percent(),
            50
        );
        assert_eq!(AnswerTally::default().percent(), 0);
    }

    #[test]
    fn mistaken_questions_keep_first_occurrence() {
        let logs = vec![
            log(3, false, 0),
            log(2, true, 1),
            log(1, false, 2),
            log(3, false, 3),
            log(5, false, 4),
        ];
        assert_eq!(
            mistaken_questions(&logs),
            vec![QuestionId::new(3), QuestionId::new(1), QuestionId::new(5)]
        );
    }

    #[test]
    fn mistaken_questions_follow_answer_time() {
        let logs = vec![log(5, false, 10), log(1, false, 5)];
        assert_eq!(
            mistaken_questions(&logs),
            vec![QuestionId::new(1), QuestionId::new(5)]
        );
    }
}
