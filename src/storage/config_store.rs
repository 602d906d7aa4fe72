//! Per-guild config persistence on top of a [`KvStore`].
//!
//! Every read and write of one guild's record goes through that guild's
//! mutex, so a configuration command and a concurrent first-access default
//! write cannot lose each other's update. Different guilds never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::{ConfigBackend, GuildConfig};
use crate::guild::GuildId;
use crate::storage::kv::{JsonFileStore, KvStore, SqliteKvStore};
use crate::storage::path_utils;
use crate::{ReaperError, ReaperResult};

pub struct ConfigStore {
    kv: Arc<dyn KvStore>,
    locks: Mutex<HashMap<GuildId, Arc<Mutex<()>>>>,
}

impl ConfigStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Store for `backend` under the data directory.
    pub fn open(backend: ConfigBackend) -> ReaperResult<Self> {
        let kv: Arc<dyn KvStore> = match backend {
            ConfigBackend::File => Arc::new(JsonFileStore::new(path_utils::guild_configs_dir())),
            ConfigBackend::Sqlite => Arc::new(SqliteKvStore::open(&path_utils::config_db_path())?),
        };
        tracing::debug!(backend = ?backend, "Config store opened");
        Ok(Self::new(kv))
    }

    fn guild_lock(&self, guild_id: GuildId) -> Arc<Mutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        locks.entry(guild_id).or_default().clone()
    }

    /// Config for `guild_id`, defaulted (and persisted) on first access.
    ///
    /// A missing record is never an error. A record that exists but cannot be
    /// read or decoded is.
    pub fn get(&self, guild_id: GuildId) -> ReaperResult<GuildConfig> {
        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());
        self.load_locked(guild_id)
    }

    /// Stored config for `guild_id`, or the default. Never writes.
    pub fn peek(&self, guild_id: GuildId) -> ReaperResult<GuildConfig> {
        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());
        Ok(self.read_locked(guild_id)?.unwrap_or_default())
    }

    /// Persist `config` for `guild_id`.
    pub fn set(&self, guild_id: GuildId, config: &GuildConfig) -> ReaperResult<()> {
        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());
        self.write_locked(guild_id, config)
    }

    /// Read-modify-write under the guild lock. Always persists, returns the new config.
    pub fn update<F>(&self, guild_id: GuildId, f: F) -> ReaperResult<GuildConfig>
    where
        F: FnOnce(&mut GuildConfig),
    {
        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut config = self.load_locked(guild_id)?;
        f(&mut config);
        self.write_locked(guild_id, &config)?;
        Ok(config)
    }

    /// Guilds that have a persisted record.
    pub fn known_guilds(&self) -> ReaperResult<Vec<GuildId>> {
        Ok(self
            .kv
            .keys()?
            .iter()
            .filter_map(|k| k.parse::<GuildId>().ok())
            .collect())
    }

    fn read_locked(&self, guild_id: GuildId) -> ReaperResult<Option<GuildConfig>> {
        match self.kv.get(&guild_id.to_string())? {
            Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| {
                ReaperError::Storage(format!("Corrupt config for guild {}: {}", guild_id, e))
            }),
            None => Ok(None),
        }
    }

    fn load_locked(&self, guild_id: GuildId) -> ReaperResult<GuildConfig> {
        match self.read_locked(guild_id)? {
            Some(config) => Ok(config),
            None => {
                let config = GuildConfig::default();
                if let Err(e) = self.write_locked(guild_id, &config) {
                    tracing::warn!(guild = %guild_id, error = %e, "Failed to persist default config");
                } else {
                    tracing::debug!(guild = %guild_id, "Created default guild config");
                }
                Ok(config)
            }
        }
    }

    fn write_locked(&self, guild_id: GuildId, config: &GuildConfig) -> ReaperResult<()> {
        let json = serde_json::to_string_pretty(config)?;
        self.kv
            .put(&guild_id.to_string(), &json)
            .map_err(|e| ReaperError::ConfigWrite {
                guild_id,
                reason: e.to_string(),
            })
    }
}
