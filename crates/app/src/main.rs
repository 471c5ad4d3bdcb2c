//! Command-line driver for the driving-theory exam engine.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use exam_core::model::{FinishReason, OptionId, QuestionId, SessionId, TopicId, format_clock};
use services::{AppServices, Clock, ExamRules, MistakesReview};

mod render;
mod runner;
mod sqlite_url;

#[derive(Parser, Debug)]
#[command(name = "exam")]
#[command(about = "Driving-theory training and exam sessions")]
#[command(version)]
struct Args {
    /// SQLite database URL or file path
    #[arg(long, global = true, default_value = sqlite_url::DEFAULT_DB_URL, env = "EXAM_DB_URL")]
    db: String,

    /// Print machine-readable JSON where supported
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List topics with their question counts
    Topics,
    /// Start a training session over one topic
    Train {
        #[arg(long)]
        topic: TopicId,
    },
    /// Start a timed exam over the whole question pool
    Exam,
    /// Submit an answer
    Answer {
        #[arg(long)]
        session: SessionId,
        #[arg(long)]
        question: QuestionId,
        #[arg(long)]
        option: OptionId,
    },
    /// Seconds left on an exam
    Remaining {
        #[arg(long)]
        session: SessionId,
    },
    /// Finalize a session
    Finish {
        #[arg(long)]
        session: SessionId,
        #[arg(long, value_enum)]
        reason: Option<ReasonArg>,
    },
    /// Start a training session from the mistakes of another session
    Mistakes {
        #[arg(long)]
        session: SessionId,
    },
    /// Show the results of a session, finalizing it if needed
    Results {
        #[arg(long)]
        session: SessionId,
    },
    /// Answer a session interactively
    Run {
        #[arg(long)]
        session: SessionId,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ReasonArg {
    Time,
    Mistakes,
}

impl From<ReasonArg> for FinishReason {
    fn from(value: ReasonArg) -> Self {
        match value {
            ReasonArg::Time => FinishReason::Time,
            ReasonArg::Mistakes => FinishReason::Mistakes,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "app=info,services=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let db_url = sqlite_url::normalize(&args.db);
    sqlite_url::prepare_file(&db_url)?;
    info!(db = %db_url, "opening database");

    let services = AppServices::new_sqlite(&db_url, Clock::default(), ExamRules::default())
        .await
        .with_context(|| format!("failed to open {db_url}"))?;
    let engine = services.engine();

    match args.command {
        Command::Topics => {
            let topics = engine.list_topics().await?;
            println!("{}", render::topics(&topics));
        }
        Command::Train { topic } => {
            let id = engine.create_training_session(topic).await?;
            println!("{id}");
        }
        Command::Exam => {
            let id = engine.create_exam_session().await?;
            println!("{id}");
        }
        Command::Answer {
            session,
            question,
            option,
        } => {
            let result = engine.submit_answer(session, question, option).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", render::answer(&result, None));
            }
        }
        Command::Remaining { session } => {
            let remaining = engine.exam_remaining_seconds(session).await?;
            if args.json {
                println!("{}", serde_json::json!({ "remaining_seconds": remaining }));
            } else {
                println!("{}", format_clock(remaining));
            }
        }
        Command::Finish { session, reason } => {
            let outcome = engine.finish_session(session, reason.map(Into::into)).await?;
            println!(
                "finished: {} correct, {} mistakes",
                outcome.score, outcome.mistakes_count
            );
        }
        Command::Mistakes { session } => {
            match engine.create_mistakes_training_from_session(session).await? {
                MistakesReview::Created(id) => println!("{id}"),
                MistakesReview::NoMistakes { source } => {
                    let results = engine.session_results(source).await?;
                    println!("no mistakes to review\n{}", render::results(&results));
                }
            }
        }
        Command::Results { session } => {
            let results = engine.session_results(session).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                println!("{}", render::results(&results));
            }
        }
        Command::Run { session } => runner::run(&services, session).await?,
    }

    Ok(())
}
