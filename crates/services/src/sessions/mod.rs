mod engine;
mod plan;
mod progress;
mod rules;
mod snapshot;
mod timer;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use engine::{MistakesReview, SessionEngine, SubmitAnswerResult};
pub use progress::SessionProgress;
pub use rules::ExamRules;
pub use snapshot::{AnswerState, SessionSnapshot};
pub use timer::{
    Countdown, ExamClockSource, ExamTimer, Step, TimerConfig, TimerExit, TimerState,
};
