use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use exam_core::model::{SessionId, format_clock};
use services::{AppServices, ExamTimer, SessionError, TimerExit, TimerState};

use crate::render;

enum Input {
    Choice(usize),
    Quit,
    Invalid,
}

fn parse_input(line: &str, options: usize) -> Input {
    let line = line.trim();
    if line.eq_ignore_ascii_case("q") {
        return Input::Quit;
    }
    match line.parse::<usize>() {
        Ok(n) if (1..=options).contains(&n) => Input::Choice(n - 1),
        _ => Input::Invalid,
    }
}

/// Walk through the unanswered questions of a session on stdin/stdout.
///
/// Exams run the countdown in the background; when it expires the session is
/// finalized and the loop stops. Quitting leaves the session open for resume.
pub async fn run(services: &AppServices, session_id: SessionId) -> Result<()> {
    let engine = services.engine();
    let snapshot = engine
        .load_session(session_id)
        .await
        .with_context(|| format!("failed to load session {session_id}"))?;

    if snapshot.session.is_finished() {
        let results = engine.session_results(session_id).await?;
        println!("{}", render::results(&results));
        return Ok(());
    }

    let duration = snapshot
        .session
        .duration_sec()
        .filter(|_| snapshot.session.is_exam());
    let timer = ExamTimer::start(
        services.clock_source(),
        session_id,
        duration,
        services.timer_config(),
    );
    let mut timer_state = timer.subscribe();
    let mut timer_live = timer.state() != TimerState::Unstarted;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let total = snapshot.questions.len();
    let start = snapshot.next_unanswered().unwrap_or(total);
    if start > 0 {
        println!("{}", render::resume(&snapshot));
    }
    let mut timed_out = false;
    let mut quit = false;

    'questions: for (position, question) in snapshot.questions.iter().enumerate().skip(start) {
        print!("{}", render::question(position, total, question));
        if let Some(remaining) = timer.state().remaining() {
            println!("  time left {}", format_clock(remaining));
        }

        let choice = loop {
            tokio::select! {
                changed = timer_state.changed(), if timer_live => {
                    if changed.is_err() {
                        timer_live = false;
                    }
                    if *timer_state.borrow_and_update() == TimerState::Finalized {
                        timed_out = true;
                        break 'questions;
                    }
                }
                line = lines.next_line() => {
                    let Some(line) = line.context("failed to read stdin")? else {
                        quit = true;
                        break 'questions;
                    };
                    match parse_input(&line, question.options().len()) {
                        Input::Choice(index) => break index,
                        Input::Quit => {
                            quit = true;
                            break 'questions;
                        }
                        Input::Invalid => {
                            println!("enter 1-{} or q", question.options().len());
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    quit = true;
                    break 'questions;
                }
            }
        };

        let option = &question.options()[choice];
        let result = match engine
            .submit_answer(session_id, question.id(), option.id)
            .await
        {
            Ok(result) => result,
            // The countdown finalized the exam while the answer was in flight.
            Err(SessionError::Finished(_)) => {
                timed_out = true;
                break;
            }
            Err(err) => return Err(err.into()),
        };
        println!("{}", render::answer(&result, question.explanation()));
        if result.is_finished {
            break;
        }
    }

    let exit = timer.cancel().await?;
    debug!(session_id = %session_id, exit = ?exit, "session runner stopped");
    if timed_out || exit == TimerExit::Finalized {
        println!("\ntime is up");
    }
    if quit && !timed_out && exit != TimerExit::Finalized {
        println!("\nsession {session_id} paused; run it again to resume");
        return Ok(());
    }

    let results = engine.session_results(session_id).await?;
    println!("\n{}", render::results(&results));
    Ok(())
}
