use clap::{Parser, Subcommand};
use geotrace::config::Config;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "geotrace", about = "Telemetry ingest API and TCP/HTTP demo servers")]
struct Cli {
    /// TOML config file. Defaults to $XDG_CONFIG_HOME/geotrace/config.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Append logs to this file instead of stderr.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Raw TCP server that writes every chunk back prefixed with "Echo: ".
    TcpEcho {
        #[arg(long)]
        listen: Option<String>,
    },
    /// HTTP server that answers every request with a JSON description of it.
    HttpEcho {
        #[arg(long)]
        listen: Option<String>,
    },
    /// Catch-all HTTP handler that logs each request and replies OK.
    RequestLog {
        #[arg(long)]
        listen: Option<String>,
    },
    /// Telemetry ingest API with last/history queries.
    Telemetry {
        #[arg(long)]
        listen: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    init_tracing(&config.logging.level, cli.log_file.as_deref())?;

    match cli.command {
        Command::TcpEcho { listen } => {
            if let Some(listen) = listen {
                config.tcp_echo.listen = listen;
            }
            geotrace::tcp_echo::run(&config.tcp_echo).await
        }
        Command::HttpEcho { listen } => {
            if let Some(listen) = listen {
                config.http_echo.listen = listen;
            }
            geotrace::http_echo::run(&config.http_echo).await
        }
        Command::RequestLog { listen } => {
            if let Some(listen) = listen {
                config.request_log.listen = listen;
            }
            geotrace::request_log::run(&config.request_log).await
        }
        Command::Telemetry { listen } => {
            if let Some(listen) = listen {
                config.telemetry.listen = listen;
            }
            geotrace::telemetry::run(&config.telemetry).await
        }
    }
}

fn init_tracing(level: &str, log_file: Option<&std::path::Path>) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .with_env_filter(filter)
                .init();
            tracing::info!("geotrace log started, tail -f {}", path.display());
        }
        None => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    Ok(())
}
