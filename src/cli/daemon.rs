use anyhow::{Context, Result};
use thread_reaper::ipc_client;
use thread_reaper::storage::path_utils;

/// Start the daemon as a background child process.
pub fn start() -> Result<()> {
    let pid_file = path_utils::pid_path();
    if let Some(pid) = read_pid() {
        if is_process_alive(pid) {
            println!("Daemon already running (PID {})", pid);
            return Ok(());
        }
        // Stale PID file
        let _ = std::fs::remove_file(&pid_file);
    }

    let self_bin = std::env::current_exe().context("Failed to get current exe")?;

    let mut child = std::process::Command::new(&self_bin)
        .args(["daemon", "run"])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .context("Failed to start daemon")?;

    println!("Daemon started (PID {})", child.id());

    // Avoid a zombie if this process outlives the daemon.
    std::thread::spawn(move || {
        let _ = child.wait();
    });

    Ok(())
}

pub fn stop() -> Result<()> {
    let pid_file = path_utils::pid_path();

    if ipc_client::shutdown().is_ok() {
        println!("Daemon shutdown requested via IPC");
        for _ in 0..10 {
            if !pid_file.exists() {
                println!("Daemon stopped");
                return Ok(());
            }
            std::thread::sleep(std::time::Duration::from_millis(200));
        }
        println!("Daemon may still be shutting down");
        return Ok(());
    }

    match read_pid() {
        Some(pid) => {
            kill_process(pid);
            let _ = std::fs::remove_file(&pid_file);
            let _ = std::fs::remove_file(path_utils::socket_path());
            println!("Daemon stopped (killed PID {})", pid);
        }
        None => println!("Daemon is not running"),
    }
    Ok(())
}

pub fn status() -> Result<()> {
    let pid = match read_pid() {
        Some(pid) => pid,
        None => {
            println!("Daemon: not running");
            return Ok(());
        }
    };

    if !is_process_alive(pid) {
        println!("Daemon: stale PID file (process {} not found)", pid);
        return Ok(());
    }

    match ipc_client::daemon_status() {
        Ok(resp) => {
            println!("Daemon: running (PID {})", pid);
            if let Some(uptime) = resp.get("uptime_secs") {
                println!("Uptime: {}s", uptime);
            }
            if let Some(interval) = resp.get("sweep_interval_secs") {
                println!("Sweep interval: {}s", interval);
            }
            if let Some(sweeps) = resp.get("sweeps") {
                println!(
                    "Sweeps: {} completed, {} dropped, running={}",
                    sweeps["completed"], sweeps["dropped_triggers"], sweeps["running"]
                );
                let last = &sweeps["last_report"];
                if !last.is_null() {
                    println!(
                        "Last sweep: {} threads, {} archived, {} errors in {}ms",
                        last["threads_seen"], last["archived"], last["errors"], last["duration_ms"]
                    );
                }
            }
            if let Some(queue) = resp.get("event_queue") {
                println!(
                    "Event queue: {} pending, {} processed, {} errors, {} dropped",
                    queue["pending"], queue["processed"], queue["errors"], queue["dropped"]
                );
            }
        }
        Err(_) => println!("Daemon: running (PID {}) but IPC unavailable", pid),
    }

    Ok(())
}

/// True when a daemon answers on the socket.
pub fn is_running() -> bool {
    read_pid().map(is_process_alive).unwrap_or(false) && ipc_client::ping()
}

fn read_pid() -> Option<i32> {
    std::fs::read_to_string(path_utils::pid_path())
        .ok()
        .and_then(|s| s.trim().parse::<i32>().ok())
}

fn is_process_alive(pid: i32) -> bool {
    #[cfg(unix)]
    {
        // Signal 0 only checks existence and permission.
        unsafe { libc::kill(pid, 0) == 0 }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        true
    }
}

fn kill_process(pid: i32) {
    #[cfg(unix)]
    unsafe {
        libc::kill(pid, libc::SIGTERM);
    }
    #[cfg(not(unix))]
    {
        let _ = std::process::Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/F"])
            .output();
    }
}
