use std::path::PathBuf;

/// Data directory, overridable with `THREAD_REAPER_DATA_DIR`.
/// Linux: ~/.config/thread-reaper/
/// macOS: ~/Library/Application Support/thread-reaper/
/// Windows: %APPDATA%/thread-reaper/
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("THREAD_REAPER_DATA_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(expand_tilde(&dir));
        }
    }
    let base = dirs::config_dir().unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
    });
    base.join("thread-reaper")
}

/// {data_dir}/daemon_config.json
pub fn daemon_config_path() -> PathBuf {
    data_dir().join("daemon_config.json")
}

/// {data_dir}/guilds/ -- one `{guild_id}_config.json` per guild (file backend).
pub fn guild_configs_dir() -> PathBuf {
    data_dir().join("guilds")
}

/// {data_dir}/configs.db (sqlite backend).
pub fn config_db_path() -> PathBuf {
    data_dir().join("configs.db")
}

/// {data_dir}/platform.db -- local mirror of guilds, threads and messages.
pub fn platform_db_path() -> PathBuf {
    data_dir().join("platform.db")
}

/// {data_dir}/reaper.sock
pub fn socket_path() -> PathBuf {
    data_dir().join("reaper.sock")
}

/// {data_dir}/daemon.pid
pub fn pid_path() -> PathBuf {
    data_dir().join("daemon.pid")
}

/// {data_dir}/daemon.log
pub fn log_path() -> PathBuf {
    data_dir().join("daemon.log")
}

pub fn expand_tilde(path: &str) -> String {
    if path.starts_with("~/") || path == "~" {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde("/tmp/reaper"), "/tmp/reaper");
        assert_eq!(expand_tilde("relative/~"), "relative/~");
    }

    #[test]
    fn test_layout_is_under_data_dir() {
        let root = data_dir();
        assert!(socket_path().starts_with(&root));
        assert!(guild_configs_dir().starts_with(&root));
        assert!(platform_db_path().ends_with("platform.db"));
    }
}
