#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod sessions;

pub use exam_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, SessionError};
pub use sessions::{
    AnswerState, Countdown, ExamClockSource, ExamRules, ExamTimer, MistakesReview,
    SessionEngine, SessionProgress, SessionSnapshot, Step, SubmitAnswerResult, TimerConfig,
    TimerExit, TimerState,
};
