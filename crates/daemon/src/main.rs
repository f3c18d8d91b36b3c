//! The mnemo daemon: loads configuration, connects the store, wires the
//! runtime, and serves the tool-dispatch RPC over a Unix domain socket while
//! a background worker drains the job queue and a scheduler feeds it
//! retention sweeps. Shutdown is cooperative via a `watch::channel`,
//! mirroring the teacher's unified-daemon server loop.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tracing::{error, info, warn};

use mnemo_config::AppConfig;
use mnemo_rpc::Dispatcher;
use mnemo_service::Runtime;

#[derive(Parser, Debug)]
#[command(name = "mnemo-daemon", about = "Conversational memory service daemon")]
struct Cli {
    /// Unix domain socket to listen on.
    #[arg(long, env = "MNEMO_SOCKET_PATH", default_value = "/tmp/mnemo.sock")]
    socket_path: PathBuf,

    /// Optional directory for a rolling-file tracing sink, in addition to stderr.
    #[arg(long, env = "MNEMO_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Probe an already-running daemon's health endpoint and exit.
    #[arg(long)]
    status: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _file_guard = init_tracing(cli.log_dir.as_deref());

    if cli.status {
        return probe_status(&cli.socket_path).await;
    }

    let config = AppConfig::load().context("loading configuration")?;
    let runtime = Runtime::bootstrap(&config).await.context("bootstrapping runtime")?;
    let dispatcher = std::sync::Arc::new(Dispatcher::new(runtime.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker_handle = mnemo_jobs::spawn_worker_loop(runtime.jobs.clone(), shutdown_rx.clone());
    let retention_handle = mnemo_jobs::spawn_retention_scheduler(runtime.jobs.clone(), shutdown_rx.clone());

    if cli.socket_path.exists() {
        let _ = std::fs::remove_file(&cli.socket_path);
    }
    let listener = UnixListener::bind(&cli.socket_path)
        .with_context(|| format!("binding unix socket at {}", cli.socket_path.display()))?;
    info!(path = %cli.socket_path.display(), "mnemo daemon listening");

    let mut shutdown_rx_accept = shutdown_rx.clone();
    loop {
        tokio::select! {
            changed = shutdown_rx_accept.changed() => {
                if changed.is_ok() && *shutdown_rx_accept.borrow() {
                    break;
                }
            }
            accept = listener.accept() => {
                let (stream, _) = accept?;
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(stream, dispatcher).await {
                        error!(%err, "connection handler failed");
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received ctrl-c, shutting down");
                let _ = shutdown_tx.send(true);
                break;
            }
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = worker_handle.await;
    let _ = retention_handle.await;
    let _ = std::fs::remove_file(&cli.socket_path);
    info!("mnemo daemon stopped");
    Ok(())
}

/// Reads one JSON-lines `{tool, arguments}` request and writes one JSON-lines
/// response, then closes the connection — callers reconnect per call.
async fn handle_connection(stream: UnixStream, dispatcher: std::sync::Arc<Dispatcher>) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(());
    }

    #[derive(serde::Deserialize)]
    struct Request {
        tool: String,
        #[serde(default)]
        arguments: serde_json::Value,
    }

    let response = match serde_json::from_str::<Request>(line.trim()) {
        Ok(request) => match dispatcher.dispatch(&request.tool, request.arguments).await {
            Ok(value) => serde_json::json!({ "ok": true, "result": value }),
            Err(err) => serde_json::json!({
                "ok": false,
                "client_error": err.is_client_error(),
                "error": err.to_string(),
            }),
        },
        Err(err) => serde_json::json!({ "ok": false, "client_error": true, "error": format!("malformed request: {err}") }),
    };

    let mut payload = serde_json::to_vec(&response)?;
    payload.push(b'\n');
    write_half.write_all(&payload).await?;
    Ok(())
}

async fn probe_status(socket_path: &std::path::Path) -> Result<()> {
    let stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("connecting to {}", socket_path.display()))?;
    let (read_half, mut write_half) = stream.into_split();
    let request = serde_json::json!({ "tool": "health.check", "arguments": {} });
    let mut payload = serde_json::to_vec(&request)?;
    payload.push(b'\n');
    write_half.write_all(&payload).await?;

    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    reader.read_line(&mut line).await?;
    println!("{}", line.trim());
    Ok(())
}

fn init_tracing(log_dir: Option<&std::path::Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "mnemo-daemon.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let registry = tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false));
            if registry.try_init().is_err() {
                warn!("tracing already initialized");
            }
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .try_init();
            None
        }
    }
}
