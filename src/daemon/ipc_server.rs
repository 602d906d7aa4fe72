//! IPC Server -- cross-platform local socket, line-delimited JSON-RPC protocol.
//!
//! Uses `interprocess` for cross-platform IPC:
//!   - Unix/macOS: Unix domain sockets
//!   - Windows: Named pipes
//!
//! Each connection is handled in its own thread, so a long manual sweep
//! never blocks event submission.
//!
//! Methods:
//!   ping            → {"pong": true}
//!   status          → daemon status JSON
//!   shutdown        → initiate graceful shutdown
//!   sweep_now       → admin-only full sweep, replies with the report
//!   configure       → admin-only view/set of a guild's inactive_time
//!   thread_updated  → queue reconciliation of the carried thread state
//!   message_deleted → queue reconciliation of the owning thread
//!   queue_status    → event queue stats (pending, processed, errors, dropped)

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use thread_reaper::constants::PROTOCOL_VERSION;
use thread_reaper::guild::{GuildId, ThreadId, ThreadState, UserId};
use thread_reaper::moderation::reconciler::PlatformEvent;
use thread_reaper::moderation::scheduler::SweepOutcome;
use thread_reaper::ReaperError;

use super::DaemonContext;

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
    id: u64,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl JsonRpcError {
    const INVALID_PARAMS: i64 = -32602;
    const METHOD_NOT_FOUND: i64 = -32601;
    const PERMISSION_DENIED: i64 = -32001;
    const QUEUE_FULL: i64 = -32002;
    const INTERNAL: i64 = -1;

    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn invalid_params(e: impl std::fmt::Display) -> Self {
        Self::new(Self::INVALID_PARAMS, format!("Invalid params: {}", e))
    }
}

impl From<ReaperError> for JsonRpcError {
    fn from(e: ReaperError) -> Self {
        let code = match e {
            ReaperError::PermissionDenied { .. } => Self::PERMISSION_DENIED,
            ReaperError::InvalidInput(_) => Self::INVALID_PARAMS,
            _ => Self::INTERNAL,
        };
        Self::new(code, e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct CommandParams {
    guild_id: GuildId,
    actor_id: UserId,
    #[serde(default)]
    inactive_time: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ThreadUpdatedParams {
    thread: ThreadState,
}

#[derive(Debug, Deserialize)]
struct MessageDeletedParams {
    guild_id: GuildId,
    thread_id: ThreadId,
}

fn parse<T: serde::de::DeserializeOwned>(params: &serde_json::Value) -> Result<T, JsonRpcError> {
    serde_json::from_value(params.clone()).map_err(JsonRpcError::invalid_params)
}

/// Run the IPC listener. Each incoming connection spawns a handler thread;
/// all of them are joined before this returns.
pub fn run(socket_path: &Path, ctx: Arc<DaemonContext>) -> Result<(), Box<dyn std::error::Error>> {
    use interprocess::local_socket::{prelude::*, GenericFilePath, ListenerOptions};

    // Stale socket from a killed daemon.
    let _ = std::fs::remove_file(socket_path);

    let listener = ListenerOptions::new()
        .name(socket_path.to_fs_name::<GenericFilePath>()?)
        .create_sync()?;

    tracing::info!("IPC listening on {:?}", socket_path);

    let mut handlers: Vec<JoinHandle<()>> = Vec::new();

    while ctx.running.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok(stream) => {
                if !ctx.running.load(Ordering::Relaxed) {
                    break;
                }
                handlers.retain(|h| !h.is_finished());
                let ctx = ctx.clone();
                handlers.push(std::thread::spawn(move || handle_connection(stream, &ctx)));
            }
            Err(e) => {
                if !ctx.running.load(Ordering::Relaxed) {
                    break;
                }
                tracing::warn!("Accept error: {}", e);
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    }

    let _ = std::fs::remove_file(socket_path);
    if !handlers.is_empty() {
        tracing::info!(count = handlers.len(), "Waiting for in-flight IPC requests");
    }
    for h in handlers {
        let _ = h.join();
    }
    tracing::info!("IPC server stopped");
    Ok(())
}

/// Wake the listener by connecting to it (unblocks `accept` on shutdown).
pub fn wake(socket_path: &Path) {
    use interprocess::local_socket::{prelude::*, GenericFilePath};

    if let Ok(name) = socket_path.to_fs_name::<GenericFilePath>() {
        let _ = interprocess::local_socket::Stream::connect(name);
    }
}

fn handle_connection(stream: interprocess::local_socket::Stream, ctx: &DaemonContext) {
    let mut stream = stream;
    let mut line = String::new();
    {
        let mut reader = BufReader::new(&mut stream);
        if reader.read_line(&mut line).is_err() || line.trim().is_empty() {
            return;
        }
    }

    let data: serde_json::Value = match serde_json::from_str(&line) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "IPC: invalid JSON received");
            return;
        }
    };

    let method = data.get("method").and_then(|v| v.as_str()).unwrap_or("");
    let params = data.get("params").cloned().unwrap_or(serde_json::json!({}));
    let id = data.get("id").and_then(|v| v.as_u64()).unwrap_or(0);

    let request_start = Instant::now();
    tracing::debug!(method, id, "IPC request received");

    let result = dispatch(method, &params, ctx);

    tracing::debug!(
        method,
        duration_ms = request_start.elapsed().as_millis() as u64,
        ok = result.is_ok(),
        "IPC request completed"
    );

    let response = match result {
        Ok(r) => JsonRpcResponse {
            jsonrpc: "2.0",
            result: Some(r),
            error: None,
            id,
        },
        Err(err) => JsonRpcResponse {
            jsonrpc: "2.0",
            result: None,
            error: Some(err),
            id,
        },
    };

    if let Ok(json) = serde_json::to_string(&response) {
        let _ = stream.write_all(json.as_bytes());
        let _ = stream.write_all(b"\n");
        let _ = stream.flush();
    }
}

fn dispatch(
    method: &str,
    params: &serde_json::Value,
    ctx: &DaemonContext,
) -> Result<serde_json::Value, JsonRpcError> {
    match method {
        "ping" => Ok(serde_json::json!({"pong": true})),

        "shutdown" => {
            tracing::info!("Shutdown requested via IPC");
            ctx.running.store(false, Ordering::Relaxed);
            Ok(serde_json::json!({"shutting_down": true}))
        }

        "status" => Ok(build_status(ctx)),

        "queue_status" => Ok(ctx.events.queue_stats()),

        "sweep_now" => {
            let p: CommandParams = parse(params)?;
            match ctx.commands.sweep_now(p.guild_id, p.actor_id, &ctx.running)? {
                SweepOutcome::Completed(report) => Ok(serde_json::json!({
                    "status": "completed",
                    "report": report,
                })),
                SweepOutcome::AlreadyRunning => Ok(serde_json::json!({"status": "already_running"})),
            }
        }

        "configure" => {
            let p: CommandParams = parse(params)?;
            let reply = ctx.commands.configure(p.guild_id, p.actor_id, p.inactive_time)?;
            Ok(serde_json::json!({
                "guild_id": reply.guild_id,
                "config": reply.config,
                "updated": reply.updated,
                "message": reply.render(),
            }))
        }

        "thread_updated" => {
            let p: ThreadUpdatedParams = parse(params)?;
            submit(ctx, PlatformEvent::ThreadUpdated { thread: p.thread })
        }

        "message_deleted" => {
            let p: MessageDeletedParams = parse(params)?;
            submit(
                ctx,
                PlatformEvent::MessageDeleted {
                    guild_id: p.guild_id,
                    thread_id: p.thread_id,
                },
            )
        }

        _ => Err(JsonRpcError::new(
            JsonRpcError::METHOD_NOT_FOUND,
            format!("Unknown method: {}", method),
        )),
    }
}

fn submit(ctx: &DaemonContext, event: PlatformEvent) -> Result<serde_json::Value, JsonRpcError> {
    let thread_id = event.thread_id();
    tracing::info!(kind = event.kind(), thread_id = %thread_id, "IPC: queuing platform event");
    match ctx.events.submit(event) {
        Ok(()) => Ok(serde_json::json!({"queued": true, "thread_id": thread_id})),
        Err(_) => Err(JsonRpcError::new(
            JsonRpcError::QUEUE_FULL,
            "Event queue full, the next sweep will cover this thread",
        )),
    }
}

fn build_status(ctx: &DaemonContext) -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": PROTOCOL_VERSION,
        "pid": std::process::id(),
        "uptime_secs": ctx.start_time.elapsed().as_secs(),
        "sweep_interval_secs": ctx.config.sweep_interval_secs,
        "config_backend": ctx.config.config_backend,
        "sweeps": ctx.scheduler.stats(),
        "event_queue": ctx.events.queue_stats(),
        "configured_guilds": ctx.configs.known_guilds().map(|g| g.len()).ok(),
        "health": "ok",
    })
}
