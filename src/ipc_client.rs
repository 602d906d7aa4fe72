//! Daemon IPC client -- JSON-RPC over a local socket (interprocess).
//!   - Unix/macOS: Unix domain socket at `{data_dir}/reaper.sock`
//!   - Windows: named pipe
//!
//! One request per connection, one line each way.

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{IPC_TIMEOUT_SECS, SWEEP_IPC_TIMEOUT_SECS};
use crate::guild::{GuildId, ThreadId, ThreadState, UserId};
use crate::storage::path_utils;
use crate::{ReaperError, ReaperResult};

#[derive(Debug, Serialize)]
struct IpcRequest<'a> {
    jsonrpc: &'a str,
    method: &'a str,
    params: serde_json::Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct IpcResponse {
    result: Option<serde_json::Value>,
    error: Option<IpcError>,
}

#[derive(Debug, Deserialize)]
struct IpcError {
    code: i64,
    message: String,
}

pub fn socket_path() -> PathBuf {
    path_utils::socket_path()
}

/// True when the daemon answers a ping.
pub fn ping() -> bool {
    call_daemon("ping", serde_json::json!({}))
        .map(|v| v.get("pong").is_some())
        .unwrap_or(false)
}

pub fn daemon_status() -> ReaperResult<serde_json::Value> {
    call_daemon("status", serde_json::json!({}))
}

pub fn shutdown() -> ReaperResult<serde_json::Value> {
    call_daemon("shutdown", serde_json::json!({}))
}

pub fn sweep_now(guild_id: GuildId, actor: UserId) -> ReaperResult<serde_json::Value> {
    call_daemon_with_timeout(
        "sweep_now",
        serde_json::json!({ "guild_id": guild_id, "actor_id": actor }),
        Duration::from_secs(SWEEP_IPC_TIMEOUT_SECS),
    )
}

pub fn configure(
    guild_id: GuildId,
    actor: UserId,
    inactive_time: Option<u64>,
) -> ReaperResult<serde_json::Value> {
    let mut params = serde_json::json!({ "guild_id": guild_id, "actor_id": actor });
    if let Some(secs) = inactive_time {
        params["inactive_time"] = serde_json::json!(secs);
    }
    call_daemon("configure", params)
}

pub fn thread_updated(thread: &ThreadState) -> ReaperResult<serde_json::Value> {
    call_daemon("thread_updated", serde_json::json!({ "thread": thread }))
}

pub fn message_deleted(guild_id: GuildId, thread_id: ThreadId) -> ReaperResult<serde_json::Value> {
    call_daemon(
        "message_deleted",
        serde_json::json!({ "guild_id": guild_id, "thread_id": thread_id }),
    )
}

fn do_ipc_call(sock_path: PathBuf, request_json: String) -> ReaperResult<serde_json::Value> {
    use interprocess::local_socket::{prelude::*, GenericFilePath};

    let name = sock_path
        .to_fs_name::<GenericFilePath>()
        .map_err(|e| ReaperError::Ipc(format!("Invalid socket name: {}", e)))?;

    let mut stream = interprocess::local_socket::Stream::connect(name)
        .map_err(|e| ReaperError::Ipc(format!("Failed to connect to daemon: {}", e)))?;

    stream
        .write_all(request_json.as_bytes())
        .and_then(|_| stream.write_all(b"\n"))
        .and_then(|_| stream.flush())
        .map_err(|e| ReaperError::Ipc(format!("Failed to write to daemon: {}", e)))?;

    let mut reader = BufReader::new(&mut stream);
    let mut response_line = String::new();
    reader
        .read_line(&mut response_line)
        .map_err(|e| ReaperError::Ipc(format!("Failed to read daemon response: {}", e)))?;

    let response: IpcResponse = serde_json::from_str(&response_line)
        .map_err(|e| ReaperError::Ipc(format!("Invalid daemon response: {}", e)))?;

    if let Some(err) = response.error {
        return Err(ReaperError::Ipc(format!("Daemon error ({}): {}", err.code, err.message)));
    }

    Ok(response
        .result
        .unwrap_or(serde_json::Value::Object(Default::default())))
}

fn call_daemon(method: &str, params: serde_json::Value) -> ReaperResult<serde_json::Value> {
    call_daemon_with_timeout(method, params, Duration::from_secs(IPC_TIMEOUT_SECS))
}

/// Connect, write, read, parse in a dedicated thread, bounded by `timeout`.
fn call_daemon_with_timeout(
    method: &str,
    params: serde_json::Value,
    timeout: Duration,
) -> ReaperResult<serde_json::Value> {
    let sock_path = socket_path();

    // Named pipes on Windows don't create files.
    #[cfg(unix)]
    if !sock_path.exists() {
        return Err(ReaperError::Ipc(format!(
            "Daemon socket not found: {}. Is the daemon running?",
            sock_path.display()
        )));
    }

    let request = IpcRequest {
        jsonrpc: "2.0",
        method,
        params,
        id: 1,
    };
    let request_json = serde_json::to_string(&request)?;

    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        tx.send(do_ipc_call(sock_path, request_json)).ok();
    });

    rx.recv_timeout(timeout).map_err(|_| {
        ReaperError::Ipc(format!("Daemon IPC timeout after {}s", timeout.as_secs()))
    })?
}
