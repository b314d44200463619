mod import;

use anyhow::{Context, Result};
use askboard_core::cache::{read_popular_tags, read_top_users, MemoryCache};
use askboard_core::config::Settings;
use askboard_core::jobs::{Job, PopularTagsJob, TopUsersJob};
use askboard_core::rating::{answer_rating, profile_rating, question_rating};
use askboard_core::store::SledStore;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "askboard")]
#[command(about = "Operate the Q&A board's primary store and rankings", long_about = None)]
struct Cli {
    /// Primary store directory (defaults to ASKBOARD_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load profiles, tags, questions and answers from JSON/JSONL files or a directory
    Import {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
    },
    /// Run one ranking job now and print what it published
    Rank {
        #[arg(value_enum)]
        job: RankJob,
    },
    /// Evaluate a rating formula with the configured weights
    Rating {
        #[command(subcommand)]
        target: RatingTarget,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RankJob {
    PopularTags,
    TopUsers,
}

#[derive(Subcommand)]
enum RatingTarget {
    Question {
        #[arg(long, default_value_t = 0)]
        likes: u64,
        #[arg(long, default_value_t = 0)]
        dislikes: u64,
        #[arg(long, default_value_t = 0)]
        answers: u64,
    },
    Answer {
        #[arg(long, default_value_t = 0)]
        likes: u64,
        #[arg(long, default_value_t = 0)]
        dislikes: u64,
        #[arg(long, default_value_t = false)]
        correct: bool,
    },
    Profile {
        #[arg(long, default_value_t = 0)]
        questions: u64,
        #[arg(long, default_value_t = 0)]
        answers: u64,
        #[arg(long, default_value_t = 0)]
        correct: u64,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    let db_path = cli.db.unwrap_or_else(|| settings.db_path.clone());

    match cli.command {
        Commands::Import { input } => {
            let store = open_store(&db_path)?;
            let summary = import::import_path(&store, Path::new(&input), &settings.weights)?;
            tracing::info!(
                profiles = summary.profiles,
                tags = summary.tags,
                questions = summary.questions,
                answers = summary.answers,
                "import complete"
            );
            Ok(())
        }
        Commands::Rank { job } => rank(&db_path, job, &settings),
        Commands::Rating { target } => {
            let w = &settings.weights;
            let rating = match target {
                RatingTarget::Question { likes, dislikes, answers } => question_rating(w, likes, dislikes, answers),
                RatingTarget::Answer { likes, dislikes, correct } => answer_rating(w, likes, dislikes, correct),
                RatingTarget::Profile { questions, answers, correct } => profile_rating(w, questions, answers, correct),
            };
            println!("{rating}");
            Ok(())
        }
    }
}

fn open_store(path: &Path) -> Result<SledStore> {
    SledStore::open(path).with_context(|| format!("opening store at {}", path.display()))
}

fn rank(db_path: &Path, job: RankJob, settings: &Settings) -> Result<()> {
    let store = Arc::new(open_store(db_path)?);
    let cache = Arc::new(MemoryCache::new());
    let json = match job {
        RankJob::PopularTags => {
            PopularTagsJob::new(store, cache.clone()).with_ttl(settings.popular_tags_ttl).run()?;
            serde_json::to_string_pretty(&read_popular_tags(cache.as_ref()).unwrap_or_default())?
        }
        RankJob::TopUsers => {
            TopUsersJob::new(store, cache.clone()).with_ttl(settings.top_users_ttl).run()?;
            serde_json::to_string_pretty(&read_top_users(cache.as_ref()).unwrap_or_default())?
        }
    };
    println!("{json}");
    Ok(())
}
