//! quizforge CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use uuid::Uuid;

mod commands;

#[derive(Parser)]
#[command(name = "quizforge", version, about = "Adaptive assessment engine")]
struct Cli {
    /// JSON file holding subjects, tests and attempts
    #[arg(long, global = true, default_value = "quizforge-store.json")]
    store: PathBuf,

    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a test for a student
    Generate {
        /// Student id
        #[arg(long)]
        student: Uuid,

        /// Subject id or external code
        #[arg(long)]
        subject: String,

        /// EASY, MEDIUM or HARD
        #[arg(long, default_value = "MEDIUM")]
        difficulty: String,

        /// Question types (comma-separated, e.g. "SINGLE_CHOICE,OPEN_SHORT")
        #[arg(long, default_value = "SINGLE_CHOICE")]
        types: String,

        /// Number of questions
        #[arg(long, default_value = "10")]
        count: u32,

        /// Topic codes (comma-separated)
        #[arg(long)]
        topics: Option<String>,

        /// Language tag (defaults to the configured language)
        #[arg(long)]
        language: Option<String>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Print a test with its answer key redacted
    Show {
        #[arg(long)]
        student: Uuid,

        #[arg(long)]
        test: Uuid,
    },

    /// Submit answers from a JSON file and grade them
    Submit {
        #[arg(long)]
        student: Uuid,

        #[arg(long)]
        test: Uuid,

        /// JSON file: {"answers": [...]} or a bare answers array
        #[arg(long)]
        answers: PathBuf,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Review a graded attempt
    Review {
        #[arg(long)]
        student: Uuid,

        #[arg(long)]
        attempt: Uuid,

        /// Output format: text, markdown, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// List a student's attempts
    History {
        #[arg(long)]
        student: Uuid,

        /// Subject id or external code
        #[arg(long)]
        subject: Option<String>,

        #[arg(long, default_value = "1")]
        page: usize,

        #[arg(long, default_value = "20")]
        page_size: usize,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Show weak topics and weekly progress
    Progress {
        #[arg(long)]
        student: Uuid,

        /// Subject id or external code
        #[arg(long)]
        subject: Option<String>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Create a starter config
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("quizforge=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = commands::Context {
        store_path: cli.store,
        config_path: cli.config,
    };

    let result = match cli.command {
        Commands::Generate {
            student,
            subject,
            difficulty,
            types,
            count,
            topics,
            language,
            format,
        } => {
            commands::generate::execute(
                &ctx,
                student,
                subject,
                difficulty,
                types,
                count,
                topics,
                language,
                format,
            )
            .await
        }
        Commands::Show { student, test } => commands::show::execute(&ctx, student, test).await,
        Commands::Submit {
            student,
            test,
            answers,
            format,
        } => commands::submit::execute(&ctx, student, test, answers, format).await,
        Commands::Review {
            student,
            attempt,
            format,
        } => commands::review::execute(&ctx, student, attempt, format).await,
        Commands::History {
            student,
            subject,
            page,
            page_size,
            format,
        } => commands::history::execute(&ctx, student, subject, page, page_size, format).await,
        Commands::Progress {
            student,
            subject,
            format,
        } => commands::progress::execute(&ctx, student, subject, format).await,
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
