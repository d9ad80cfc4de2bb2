use clap::Parser;
use media_dl::{Config, MediaService, shutdown_signal};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Media download service: submit a URL, follow its progress, fetch the file.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file; missing fields take their defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides the config file).
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Directory for per-job scratch storage (overrides the config file).
    #[arg(short, long)]
    work_root: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.log_json);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "media-dl stopped with an error");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,media_dl=debug".into());

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run(args: Args) -> media_dl::Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(bind) = args.bind {
        config.server.api.bind_address = bind;
    }
    if let Some(work_root) = args.work_root {
        config.jobs.work_root = work_root;
    }

    let config = Arc::new(config);
    let service = Arc::new(MediaService::new((*config).clone()).await?);

    let served = media_dl::api::start_api_server(service.clone(), config, shutdown_signal()).await;

    // Scratch storage is reclaimed even if the server failed
    service.shutdown().await;
    served
}
