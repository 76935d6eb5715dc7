use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wildprompt::config::AppConfig;
use wildprompt::expand::{has_choice_points, Expander};
use wildprompt::models::{split_path, ImportFragmentInput};
use wildprompt::{api, db};

#[derive(Parser)]
#[command(name = "wildprompt")]
#[command(about = "Wildcard and fragment expansion for image-generation prompts")]
struct Cli {
    /// Database file (overrides config and WILDPROMPT_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Port for HTTP API
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Expand a prompt and print the result
    Expand {
        prompt: String,

        /// Number of expansions to print
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,
    },
    /// Report whether a prompt contains choice points
    Check { prompt: String },
    /// Import a text file as a fragment, one line per entry
    Import {
        file: PathBuf,

        /// Fragment path (`folder/name`). Defaults to the file stem.
        #[arg(long)]
        path: Option<String>,
    },
    /// List fragments
    List,
    /// Reset sequential counters for one path, or all of them
    Reset { path: Option<String> },
    /// Print the effective configuration
    Config {
        /// Also write it to the config file
        #[arg(long)]
        save: bool,
    },
}

/// Initialize tracing with output to stderr (for one-shot commands) or stdout
fn init_tracing(use_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "wildprompt=info,tower_http=info".into()),
    );

    if use_stderr {
        // One-shot commands print results on stdout
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn open_database(config: &AppConfig) -> anyhow::Result<db::Database> {
    let db = match &config.database_path {
        Some(path) => db::Database::open(path.clone())?,
        None => db::Database::open_default()?,
    };
    db.migrate()?;
    Ok(db)
}

async fn serve(config: &AppConfig, port: u16) -> anyhow::Result<()> {
    tracing::info!("Starting wildprompt server on port {}", port);

    let db = open_database(config)?;
    let app = api::create_router(db, config.expand.clone());

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("wildprompt server listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let use_stderr = !matches!(cli.command, None | Some(Commands::Serve { .. }));
    init_tracing(use_stderr);

    let mut config = AppConfig::load();
    if let Some(path) = cli.db {
        config.database_path = Some(path);
    }

    match cli.command {
        Some(Commands::Serve { port }) => {
            serve(&config, port.unwrap_or(config.port)).await?;
        }
        Some(Commands::Expand { prompt, count }) => {
            let expander = Expander::with_config(open_database(&config)?, config.expand.clone());
            for _ in 0..count {
                println!("{}", expander.expand(&prompt).await?);
            }
        }
        Some(Commands::Check { prompt }) => {
            println!("{}", has_choice_points(&prompt));
        }
        Some(Commands::Import { file, path }) => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let path = match path {
                Some(path) => path,
                None => file
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(str::to_string)
                    .ok_or_else(|| anyhow::anyhow!("Cannot derive a fragment name from {}", file.display()))?,
            };
            let (folder, name) = split_path(&path);

            let db = open_database(&config)?;
            let fragment = db.import_fragment(ImportFragmentInput { folder, name, text })?;
            println!("Imported {} ({} lines)", fragment.path(), fragment.line_count);
        }
        Some(Commands::List) => {
            let db = open_database(&config)?;
            for fragment in db.list_fragments()? {
                println!("{}\t{}", fragment.path(), fragment.line_count);
            }
        }
        Some(Commands::Reset { path }) => {
            let expander = Expander::with_config(open_database(&config)?, config.expand.clone());
            expander.reset_sequential_counters(path.as_deref()).await?;
            match path {
                Some(path) => println!("Reset sequential counter for {}", path),
                None => println!("Reset all sequential counters"),
            }
        }
        Some(Commands::Config { save }) => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            if save {
                config.save()?;
                tracing::info!("Saved configuration");
            }
        }
        None => {
            serve(&config, config.port).await?;
        }
    }

    Ok(())
}
