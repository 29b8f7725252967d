mod args;
mod config;
mod report;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use clipdrop_http::{HttpControlPlane, PresignedPutStore};
use clipdrop_uploader::{UploadOrchestrator, UploadRequest};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use args::Args;
use config::CliConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,clipdrop=debug")),
        )
        .init();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let mut cfg = CliConfig::load()?;
    if let Some(url) = &args.api_url {
        cfg.api_base_url = url.trim_end_matches('/').to_string();
    }

    let requests = args
        .files
        .iter()
        .map(|path| {
            UploadRequest::from_path(&args.event_id, path, &args.content_type, args.angle)
                .with_context(|| format!("cannot upload {}", path.display()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let control = HttpControlPlane::new(cfg.api_base_url.as_str())?;
    let store = PresignedPutStore::new()?;

    info!(
        api = %cfg.api_base_url,
        event = %args.event_id,
        files = requests.len(),
        concurrency = cfg.uploader.concurrency,
        "uploading"
    );

    let mut orchestrator = UploadOrchestrator::new(cfg.uploader.clone());
    let forwarder = orchestrator
        .take_events()
        .map(|rx| tokio::spawn(report::log_events(rx)));

    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling uploads");
            cancel.cancel();
        }
    });

    let reports = orchestrator.upload_batch(&control, &store, &requests).await;

    // Dropping the orchestrator closes the event channel so the logger
    // can drain and exit.
    drop(orchestrator);
    if let Some(handle) = forwarder {
        let _ = handle.await;
    }

    println!("{}", report::summary(&reports));

    Ok(if reports.iter().all(|r| r.success) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
