use exam_core::model::{Question, SessionResults, SessionMode, Verdict, format_clock};
use services::{SessionSnapshot, SubmitAnswerResult};
use storage::repository::TopicSummary;

pub fn topics(topics: &[TopicSummary]) -> String {
    if topics.is_empty() {
        return "no topics yet".to_string();
    }
    topics
        .iter()
        .map(|t| {
            format!(
                "{:>4}  {}  ({} questions)",
                t.topic.id().to_string(),
                t.topic.name(),
                t.question_count
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn question(position: usize, total: usize, question: &Question) -> String {
    let mut out = format!("\n[{}/{}] {}\n", position + 1, total, question.text());
    if let Some(image) = question.image_url() {
        out.push_str(&format!("  image: {image}\n"));
    }
    for (i, option) in question.options().iter().enumerate() {
        out.push_str(&format!("  {}) {}\n", i + 1, option.text));
    }
    out
}

pub fn resume(snapshot: &SessionSnapshot) -> String {
    let progress = snapshot.progress();
    let mut out = format!(
        "resuming session {}: {} of {} answered",
        snapshot.session.id(),
        progress.answered,
        progress.total
    );
    if snapshot.session.is_exam() {
        out.push_str(&format!(", mistakes: {}", snapshot.mistakes_count()));
    }
    out
}

pub fn answer(result: &SubmitAnswerResult, explanation: Option<&str>) -> String {
    let mut out = if result.is_correct {
        "correct".to_string()
    } else {
        "incorrect".to_string()
    };
    if let Some(mistakes) = result.mistakes_count {
        out.push_str(&format!(" (mistakes: {mistakes})"));
    }
    if !result.is_correct {
        if let Some(text) = explanation {
            out.push_str(&format!("\n  {text}"));
        }
    }
    if result.is_finished {
        out.push_str("\nexam over: mistake limit exceeded");
    }
    out
}

pub fn results(results: &SessionResults) -> String {
    let headline = match results.verdict {
        Verdict::TrainingCompleted => "Training completed",
        Verdict::ExamPassed => "Exam passed",
        Verdict::ExamIncomplete => "Exam incomplete",
        Verdict::ExamFailed => "Exam failed",
    };
    let mut lines = vec![
        format!("{headline} (session {})", results.session_id),
        format!(
            "Correct: {} / {} ({}%)",
            results.correct, results.total, results.percent
        ),
    ];
    match results.max_mistakes {
        Some(max) => lines.push(format!("Mistakes: {} (max {max})", results.mistakes)),
        None => lines.push(format!("Mistakes: {}", results.mistakes)),
    }
    if results.mode == SessionMode::Exam {
        if let (Some(used), Some(duration)) = (results.time_used_sec, results.duration_sec) {
            lines.push(format!(
                "Time used: {} of {}",
                format_clock(used),
                format_clock(duration)
            ));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::SessionId;

    fn passed_exam() -> SessionResults {
        SessionResults {
            session_id: SessionId::new(4),
            mode: SessionMode::Exam,
            correct: 18,
            mistakes: 2,
            total: 20,
            percent: 90,
            max_mistakes: Some(2),
            duration_sec: Some(1200),
            time_used_sec: Some(700),
            verdict: Verdict::ExamPassed,
        }
    }

    #[test]
    fn exam_results_show_time_used() {
        let text = results(&passed_exam());
        assert!(text.starts_with("Exam passed (session 4)"));
        assert!(text.contains("Correct: 18 / 20 (90%)"));
        assert!(text.contains("Mistakes: 2 (max 2)"));
        assert!(text.contains("Time used: 11:40 of 20:00"));
    }

    #[test]
    fn resumed_exam_shows_mistakes_so_far() {
        use exam_core::model::{AnswerOption, OptionId, QuestionId, Session, SessionConfig};
        use exam_core::time::fixed_now;
        use services::AnswerState;

        let questions: Vec<Question> = (1..=3)
            .map(|n| {
                let id = QuestionId::new(n);
                let options = vec![
                    AnswerOption::new(OptionId::new(n * 10), id, "stop", true),
                    AnswerOption::new(OptionId::new(n * 10 + 1), id, "go", false),
                ];
                Question::new(id, format!("q{n}"), "Which sign?", None, None, options).unwrap()
            })
            .collect();
        let answers = [
            (QuestionId::new(1), OptionId::new(11), false),
            (QuestionId::new(2), OptionId::new(20), true),
        ]
        .into_iter()
        .map(|(q, o, is_correct)| {
            (
                q,
                AnswerState {
                    selected_option_id: o,
                    is_correct,
                },
            )
        })
        .collect();
        let snapshot = SessionSnapshot {
            session: Session::new(
                SessionId::new(8),
                SessionConfig::exam(1200, 2).unwrap(),
                fixed_now(),
            ),
            questions,
            answers,
        };

        assert_eq!(
            resume(&snapshot),
            "resuming session 8: 2 of 3 answered, mistakes: 1"
        );
    }

    #[test]
    fn finishing_answer_mentions_limit() {
        let result = SubmitAnswerResult {
            is_correct: false,
            mistakes_count: Some(3),
            is_finished: true,
            reason: Some(exam_core::model::FinishReason::Mistakes),
        };
        let text = answer(&result, Some("Yield to the right."));
        assert!(text.starts_with("incorrect (mistakes: 3)"));
        assert!(text.contains("Yield to the right."));
        assert!(text.ends_with("mistake limit exceeded"));
    }
}
