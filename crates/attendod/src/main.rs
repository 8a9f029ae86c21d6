//! attendod - The attendance tracking service
//!
//! Wires together:
//! - Configuration loading
//! - Store initialization
//! - Attendance engine and auto-timeout sweeper
//! - IPC server
//! - Intern notification delivery

mod dispatch;
mod notify;

use anyhow::{Context, Result};
use attendo_api::{ErrorCode, ErrorInfo, Event, EventPayload, RecordKind, Response};
use attendo_config::{Policy, load_config};
use attendo_core::{AttendanceEngine, AutoTimeoutSweeper};
use attendo_ipc::{IpcServer, PeerInfo, ServerMessage};
use attendo_store::{AuditEvent, AuditEventType, SqliteStore, Store};
use attendo_util::{ClientId, RateLimiter, SystemClock, database_path, default_config_path};
use clap::Parser;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::dispatch::handle_command;
use crate::notify::{ChannelNotifier, spawn_delivery};

/// attendod - Intern attendance tracking service
#[derive(Parser, Debug)]
#[command(name = "attendod")]
#[command(about = "Intern attendance tracking service", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/attendod/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override (or set ATTENDO_SOCKET env var)
    #[arg(short, long, env = "ATTENDO_SOCKET")]
    socket: Option<PathBuf>,

    /// Data directory override (or set ATTENDO_DATA_DIR env var)
    #[arg(short, long, env = "ATTENDO_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Requests per second per client
const RATE_LIMIT: u32 = 30;

/// Forget rate-limit buckets idle this long
const RATE_LIMIT_STALE: Duration = Duration::from_secs(60);

/// Main service state
struct Service {
    engine: Arc<AttendanceEngine>,
    sweeper: Arc<AutoTimeoutSweeper>,
    ipc: Arc<IpcServer>,
    store: Arc<dyn Store>,
    notices: tokio::sync::mpsc::UnboundedReceiver<attendo_core::InternNotice>,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        let policy = read_policy(&args.config)?;

        let socket_path = args
            .socket
            .clone()
            .unwrap_or_else(|| policy.service.socket_path.clone());

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| policy.service.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = database_path(&data_dir);
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStarted))
            .context("Failed to write audit log")?;

        let (notifier, notices) = ChannelNotifier::new();
        let engine = Arc::new(AttendanceEngine::new(policy, store.clone(), Arc::new(notifier)));
        let sweeper = Arc::new(AutoTimeoutSweeper::new(engine.clone(), Arc::new(SystemClock)));

        let mut ipc = IpcServer::new(&socket_path);
        ipc.start()
            .await
            .with_context(|| format!("Failed to bind socket {:?}", socket_path))?;

        Ok(Self {
            engine,
            sweeper,
            ipc: Arc::new(ipc),
            store,
            notices,
        })
    }

    async fn run(self) -> Result<()> {
        let Service {
            engine,
            sweeper,
            ipc,
            store,
            notices,
        } = self;

        let _delivery = spawn_delivery(notices);

        if engine.policy().service.catch_up_on_start {
            run_catch_up(&sweeper, &ipc).await;
        }

        let mut ipc_messages = ipc
            .take_message_receiver()
            .await
            .context("IPC message receiver already taken")?;

        let ipc_accept = ipc.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        let mut sigterm = signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        let face_to_face_sweep = tokio::time::sleep_until(next_sweep(&sweeper, RecordKind::FaceToFace));
        let async_sweep = tokio::time::sleep_until(next_sweep(&sweeper, RecordKind::Async));
        tokio::pin!(face_to_face_sweep, async_sweep);

        let mut rate_limiter: RateLimiter = RateLimiter::new(RATE_LIMIT, Duration::from_secs(1));
        let mut cleanup_timer = tokio::time::interval(RATE_LIMIT_STALE);
        let mut peers: HashMap<ClientId, PeerInfo> = HashMap::new();

        info!("Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                _ = &mut face_to_face_sweep => {
                    spawn_sweep(&sweeper, &ipc, RecordKind::FaceToFace);
                    face_to_face_sweep.as_mut().reset(next_sweep(&sweeper, RecordKind::FaceToFace));
                }

                _ = &mut async_sweep => {
                    spawn_sweep(&sweeper, &ipc, RecordKind::Async);
                    async_sweep.as_mut().reset(next_sweep(&sweeper, RecordKind::Async));
                }

                _ = cleanup_timer.tick() => {
                    let dropped = rate_limiter.cleanup(RATE_LIMIT_STALE);
                    if dropped > 0 {
                        debug!(dropped, tracked = rate_limiter.tracked(), "Rate limiter cleanup");
                    }
                }

                Some(msg) = ipc_messages.recv() => {
                    handle_ipc_message(&engine, &ipc, &store, &mut rate_limiter, &mut peers, msg).await;
                }
            }
        }

        info!("Shutting down attendod");

        ipc.broadcast_event(Event::new(EventPayload::Shutdown));

        if let Err(e) = store.append_audit(AuditEvent::new(AuditEventType::ServiceStopped)) {
            warn!(error = %e, "Failed to log service shutdown");
        }

        ipc.shutdown();

        info!("Shutdown complete");
        Ok(())
    }
}

/// Load the config file, or the built-in schedule if there is none
fn read_policy(path: &Path) -> Result<Policy> {
    if !path.exists() {
        info!(config_path = %path.display(), "No config file, using built-in defaults");
        return Ok(Policy::default());
    }

    let policy =
        load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?;

    info!(
        config_path = %path.display(),
        face_to_face = %policy.window(RecordKind::FaceToFace),
        asynchronous = %policy.window(RecordKind::Async),
        "Configuration loaded"
    );
    Ok(policy)
}

/// When the next sweep of `kind` is due; a day out if no instant can be computed
fn next_sweep(sweeper: &AutoTimeoutSweeper, kind: RecordKind) -> Instant {
    let wait = sweeper
        .next_run(kind)
        .and_then(|next| (next - attendo_util::now()).to_std().ok())
        .unwrap_or(Duration::from_secs(24 * 3600));

    debug!(kind = %kind, wait_secs = wait.as_secs(), "Next sweep scheduled");
    Instant::now() + wait
}

/// Run a sweep off the service loop and broadcast what it closed
fn spawn_sweep(sweeper: &Arc<AutoTimeoutSweeper>, ipc: &Arc<IpcServer>, kind: RecordKind) {
    let sweeper = sweeper.clone();
    let ipc = ipc.clone();

    tokio::spawn(async move {
        match tokio::task::spawn_blocking(move || sweeper.on_tick(kind)).await {
            Ok(Ok(outcome)) => {
                for event in outcome.events {
                    ipc.broadcast_event(dispatch::to_event(event));
                }
            }
            Ok(Err(e)) => error!(kind = %kind, error = %e, "Sweep failed"),
            Err(e) => error!(kind = %kind, error = %e, "Sweep task panicked"),
        }
    });
}

async fn run_catch_up(sweeper: &Arc<AutoTimeoutSweeper>, ipc: &Arc<IpcServer>) {
    let task = sweeper.clone();
    match tokio::task::spawn_blocking(move || task.catch_up()).await {
        Ok(Ok(outcome)) => {
            info!(
                closed = outcome.value.closed.len(),
                failed = outcome.value.failures.len(),
                "Catch-up sweep finished"
            );
            for event in outcome.events {
                ipc.broadcast_event(dispatch::to_event(event));
            }
        }
        Ok(Err(e)) => error!(error = %e, "Catch-up sweep failed"),
        Err(e) => error!(error = %e, "Catch-up sweep task panicked"),
    }
}

async fn handle_ipc_message(
    engine: &Arc<AttendanceEngine>,
    ipc: &Arc<IpcServer>,
    store: &Arc<dyn Store>,
    rate_limiter: &mut RateLimiter,
    peers: &mut HashMap<ClientId, PeerInfo>,
    msg: ServerMessage,
) {
    match msg {
        ServerMessage::Request { client_id, request } => {
            if !rate_limiter.check(&client_id) {
                let response = Response::error(
                    request.request_id,
                    ErrorInfo::new(ErrorCode::RateLimited, "Too many requests"),
                );
                let _ = ipc.send_response(&client_id, response).await;
                return;
            }

            let Some(peer) = peers.get(&client_id).copied() else {
                debug!(client_id = %client_id, "Request from unknown client");
                return;
            };

            let dispatched = handle_command(
                engine,
                client_id,
                peer,
                request.request_id,
                &request.actor,
                request.command,
                attendo_util::now(),
            );

            let _ = ipc.send_response(&client_id, dispatched.response).await;
            for event in dispatched.events {
                ipc.broadcast_event(event);
            }
        }

        ServerMessage::ClientConnected { client_id, peer } => {
            peers.insert(client_id, peer);

            let _ = store.append_audit(AuditEvent::new(AuditEventType::ClientConnected {
                client_id: client_id.to_string(),
                role: peer.role.to_string(),
                uid: peer.uid,
            }));
        }

        ServerMessage::ClientDisconnected { client_id } => {
            debug!(client_id = %client_id, "Client disconnected");
            peers.remove(&client_id);
            rate_limiter.remove(&client_id);

            let _ = store.append_audit(AuditEvent::new(AuditEventType::ClientDisconnected {
                client_id: client_id.to_string(),
            }));
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "attendod starting");

    if attendo_util::is_mock_time_active() {
        warn!(now = %attendo_util::now(), "Mock time is active");
    }

    let service = Service::new(&args).await?;
    service.run().await
}
