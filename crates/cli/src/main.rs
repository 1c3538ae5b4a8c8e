mod config_commands;
mod shard_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "rhea", about = "Rhea account gateway", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file to use instead of searching the default locations.
    #[arg(long, short, global = true, env = "RHEA_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the account gateway.
    Gateway,
    /// Configuration inspection.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
    /// List shards registered with a running gateway.
    Shards {
        /// Registration endpoint; defaults to `inter.uri` from the config.
        #[arg(long)]
        uri: Option<String>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Gateway => {
            info!(version = env!("CARGO_PKG_VERSION"), "rhea starting");
            rhea_gateway::start_gateway(config_path).await
        },
        Commands::Config { action } => config_commands::handle_config(action, config_path),
        Commands::Shards { uri, json } => {
            let uri = match uri {
                Some(uri) => uri,
                None => rhea_config::discover_and_load(config_path).inter.uri,
            };
            shard_commands::list_shards(&uri, json).await
        },
    }
}
