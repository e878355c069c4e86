use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod config;

use config::{load_config, Config};
use taskdeck_chat::ChatService;
use taskdeck_mailer::{EmailQueue, HttpMailTransport, Mailer, MailerConfig};
use taskdeck_monitor::{Monitor, MonitorConfig};
use taskdeck_notify::Dispatcher;
use taskdeck_provider::{LlmProvider, OpenAiProvider, StubProvider};
use taskdeck_server::state::AppState;
use taskdeck_store::Store;

#[derive(Parser)]
#[command(name = "taskdeck", version, about = "taskdeck task management service")]
struct Cli {
    #[arg(
        long,
        default_value = "~/.taskdeck",
        help = "Data root directory (contains taskdeck.yaml, the database and logs/)"
    )]
    data_root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Start the API server, due-date monitor and mail sweeper")]
    Serve {
        #[arg(long, help = "Override the bind address from the config")]
        bind: Option<String>,
    },
    #[command(about = "Validate the config file")]
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // Expand ~ to home directory
    if cli.data_root.starts_with("~") {
        if let Some(home) = std::env::var_os("HOME") {
            cli.data_root =
                PathBuf::from(home).join(cli.data_root.strip_prefix("~").unwrap_or(&cli.data_root));
        }
    }

    let log_dir = cli.data_root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "taskdeck.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config_path = cli.data_root.join("taskdeck.yaml");

    match command {
        Commands::Validate => {
            let config = load_config(&config_path)?;
            println!(
                "Config valid. model {}, mailer {}, monitor every {}s, bind {}.",
                config.provider.model,
                if config.mailer.enabled { "enabled" } else { "disabled" },
                config.monitor.check_interval_secs,
                config.server.bind
            );
        }
        Commands::Serve { bind } => {
            let config = if config_path.is_file() {
                load_config(&config_path)?
            } else {
                tracing::warn!(path = %config_path.display(), "no config file, using defaults");
                Config::default()
            };
            serve(&cli.data_root, config, bind).await?;
        }
    }

    Ok(())
}

async fn serve(data_root: &Path, config: Config, bind_override: Option<String>) -> Result<()> {
    let db_path = data_root.join(&config.database.file);
    let db_path = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("database path is not valid UTF-8"))?;
    let store = Store::open(db_path)?;
    tracing::info!(path = db_path, "database opened");

    let provider: Arc<dyn LlmProvider> = match &config.provider.api_key {
        Some(key) if !key.is_empty() => Arc::new(OpenAiProvider::new(
            key.clone(),
            config.provider.api_base.clone(),
        )),
        _ => {
            tracing::warn!("no provider api key configured, using stub provider");
            Arc::new(StubProvider)
        }
    };

    let transport = Arc::new(HttpMailTransport::new(
        config.mailer.api_url.clone(),
        config.mailer.api_key.clone(),
        config.mailer.from.clone(),
    ));
    let mailer = Mailer::new(
        transport,
        EmailQueue::new(),
        MailerConfig {
            enabled: config.mailer.enabled,
            sweep_interval_secs: config.mailer.sweep_interval_secs,
            retry_gap: chrono::Duration::seconds(config.mailer.retry_gap_secs),
            max_attempts: config.mailer.max_attempts,
        },
    );
    let sweeper = if config.mailer.enabled {
        Some(mailer.spawn_sweeper())
    } else {
        None
    };

    let dispatcher = Dispatcher::new(store.clone(), mailer, config.server.base_url.clone());
    let chat = ChatService::new(
        store.clone(),
        Arc::clone(&provider),
        config.provider.model.clone(),
    );

    let monitor = Arc::new(Monitor::new(
        store.clone(),
        dispatcher.clone(),
        MonitorConfig {
            check_interval_secs: config.monitor.check_interval_secs,
        },
    ));
    monitor.start();

    let bind = bind_override.unwrap_or(config.server.bind);
    let state = AppState {
        store,
        chat,
        dispatcher,
    };
    let result = taskdeck_server::serve(state, &bind).await;

    monitor.stop();
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    result
}
