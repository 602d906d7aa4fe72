// === Guild defaults ===
pub const DEFAULT_INACTIVE_TIME_SECS: u64 = 60 * 60 * 24; // 24h

// === Archive ===
pub const ARCHIVE_REASON: &str = "auto-archived: inactive for longer than configured threshold";

// === Sweep ===
pub const SWEEP_INTERVAL_SECS: u64 = 300; // 5 min
pub const SHUTDOWN_POLL_MS: u64 = 500;

// === Event reconciliation ===
pub const EVENT_WORKERS: usize = 2;
pub const EVENT_QUEUE_CAPACITY: usize = 256;

// === SQLite Tuning ===
pub const SQLITE_BUSY_TIMEOUT_MS: u32 = 5_000;
pub const DAEMON_WAL_AUTOCHECKPOINT: u32 = 1_000;
pub const CLI_WAL_AUTOCHECKPOINT: u32 = 0;

// === IPC ===
pub const IPC_TIMEOUT_SECS: u64 = 5;
pub const PROTOCOL_VERSION: u32 = 1;
/// Manual sweeps reply only once the sweep is done.
pub const SWEEP_IPC_TIMEOUT_SECS: u64 = 600;
