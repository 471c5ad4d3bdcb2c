use serde::Serialize;

use crate::model::answer::{AnswerLog, AnswerTally};
use crate::model::ids::SessionId;
use crate::model::session::{Session, SessionMode};
use crate::time::elapsed_whole_seconds;

/// Headline of a results screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    TrainingCompleted,
    ExamPassed,
    /// Within the mistake limit, but fewer answers than a full exam.
    ExamIncomplete,
    ExamFailed,
}

impl Verdict {
    /// Decide the headline for a session.
    ///
    /// `exam_question_count` is the size of a full exam.
    #[must_use]
    pub fn decide(session: &Session, tally: AnswerTally, exam_question_count: u32) -> Self {
        if session.mode() == SessionMode::Training {
            return Verdict::TrainingCompleted;
        }
        match session.max_mistakes() {
            Some(max) if tally.incorrect > max => Verdict::ExamFailed,
            Some(_) if tally.total() < exam_question_count => Verdict::ExamIncomplete,
            _ => Verdict::ExamPassed,
        }
    }

    #[must_use]
    pub fn is_pass(self) -> bool {
        matches!(self, Verdict::ExamPassed)
    }
}

/// Presentation-agnostic results of a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionResults {
    pub session_id: SessionId,
    pub mode: SessionMode,
    pub correct: u32,
    pub mistakes: u32,
    pub total: u32,
    pub percent: u32,
    pub max_mistakes: Option<u32>,
    pub duration_sec: Option<u32>,
    /// Exam only; capped at the configured duration.
    pub time_used_sec: Option<u32>,
    pub verdict: Verdict,
}

impl SessionResults {
    /// Derive results from the session and its full answer log.
    ///
    /// Counts come from the log, not from the stored score, so they always
    /// agree with history.
    #[must_use]
    pub fn compute(session: &Session, logs: &[AnswerLog], exam_question_count: u32) -> Self {
        let tally = AnswerTally::from_logs(logs);
        let time_used_sec = match (session.is_exam(), session.finished_at()) {
            (true, Some(finished_at)) => {
                let elapsed = elapsed_whole_seconds(session.started_at(), finished_at);
                let cap = u64::from(session.duration_sec().unwrap_or(0));
                u32::try_from(elapsed.min(cap)).ok()
            }
            _ => None,
        };

        Self {
            session_id: session.id(),
            mode: session.mode(),
            correct: tally.correct,
            mistakes: tally.incorrect,
            total: tally.total(),
            percent: tally.percent(),
            max_mistakes: session.max_mistakes(),
            duration_sec: session.duration_sec(),
            time_used_sec,
            verdict: Verdict::decide(session, tally, exam_question_count),
        }
    }
}

/// Formats seconds as `m:ss`, e.g. `20:00` or `0:07`.
#[must_use]
pub fn format_clock(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
