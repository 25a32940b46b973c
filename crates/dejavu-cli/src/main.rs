//! dejavu: operator tool for the media-intelligence engine.
//!
//! Runs store migrations, inspects per-chat import state and lists the
//! features the engine registers with the command layer.

mod logging;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use dejavu_core::defaults::DATABASE_URL;
use dejavu_core::{
    ChatImportState, ChatStateRepository, IgnoreListRepository, ImportPhase,
    MediaEmbeddingRepository, MediaType,
};
use dejavu_db::{log_pool_metrics, Database, PoolConfig};
use dejavu_media::{features, MediaConfig, Trigger};

#[derive(Parser)]
#[command(name = "dejavu")]
#[command(author, version, about = "Operator tool for the dejavu media engine")]
#[command(propagate_version = true)]
struct Cli {
    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL", default_value = DATABASE_URL, global = true)]
    database_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,

    /// Show import state and stored rows for a chat
    Status {
        /// Chat identifier
        #[arg(short, long, allow_hyphen_values = true)]
        chat: i64,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// List the features exposed to the command layer
    Features {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Validate the engine configuration from the environment
    Config,
}

#[derive(Debug, Serialize)]
struct ChatStatus {
    chat_id: i64,
    phase: ImportPhase,
    state: ChatImportState,
    watermark: Option<i64>,
    updated_at: Option<DateTime<Utc>>,
    photo_rows: i64,
    video_rows: i64,
    ignored: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = logging::LogSettings::from_env();
    let _log_guard = logging::init(&settings);

    match cli.command {
        Commands::Migrate => {
            let db = connect(&cli.database_url).await?;
            db.migrate().await.context("running migrations")?;
            log_pool_metrics(db.pool());
            info!(subsystem = "cli", op = "migrate", "Migrations applied");
            println!("Migrations applied.");
        }
        Commands::Status { chat, json } => {
            let db = connect(&cli.database_url).await?;
            let status = chat_status(&db, chat).await?;
            log_pool_metrics(db.pool());
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
        Commands::Features { json } => {
            let features = features();
            if json {
                println!("{}", serde_json::to_string_pretty(&features)?);
            } else {
                for feature in features {
                    let triggers: Vec<String> = feature.triggers.iter().map(describe).collect();
                    println!(
                        "{:<20} {:<28} {}",
                        feature.name,
                        triggers.join(", "),
                        feature.description.unwrap_or("(hidden)")
                    );
                }
            }
        }
        Commands::Config => {
            let config = MediaConfig::from_env().context("invalid engine configuration")?;
            let pool = PoolConfig::from_env().context("invalid pool configuration")?;
            println!("{:#?}", config);
            println!("{:#?}", pool);
        }
    }
    Ok(())
}

async fn connect(url: &str) -> anyhow::Result<Database> {
    let pool = PoolConfig::from_env().context("invalid pool configuration")?;
    Database::connect_with_config(url, &pool)
        .await
        .context("connecting to the database")
}

async fn chat_status(db: &Database, chat_id: i64) -> anyhow::Result<ChatStatus> {
    let state = db
        .chat_state
        .get(chat_id)
        .await?
        .unwrap_or_else(|| ChatImportState::new(chat_id));
    Ok(ChatStatus {
        chat_id,
        phase: state.phase(),
        state,
        watermark: db.media.max_message_id(chat_id).await?,
        updated_at: db.chat_state.updated_at(chat_id).await?,
        photo_rows: db
            .media
            .count_for_chat(chat_id, Some(MediaType::Photo))
            .await?,
        video_rows: db
            .media
            .count_for_chat(chat_id, Some(MediaType::Video))
            .await?,
        ignored: db.ignored.count_for_chat(chat_id).await?,
    })
}

fn print_status(status: &ChatStatus) {
    println!("chat:          {}", status.chat_id);
    println!("phase:         {}", status.phase);
    println!(
        "watermark:     {}",
        status
            .watermark
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!(
        "updated:       {}",
        status
            .updated_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string())
    );
    println!("photo rows:    {}", status.photo_rows);
    println!("video rows:    {}", status.video_rows);
    println!("ignored media: {}", status.ignored);
}

fn describe(trigger: &Trigger) -> String {
    match trigger {
        Trigger::Command(name) => format!("/{}", name),
        Trigger::Media => "photo|video".to_string(),
        Trigger::Callback(prefix) => format!("callback {}*", prefix),
    }
}
