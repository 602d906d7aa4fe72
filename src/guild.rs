//! Platform identifiers and thread state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// SQLite stores integers as i64; snowflakes never use the sign bit.
            pub fn as_sql(self) -> i64 {
                self.0 as i64
            }

            pub fn from_sql(v: i64) -> Self {
                Self(v as u64)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<u64>().map(Self)
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                Self(v)
            }
        }
    };
}

snowflake_id!(
    /// A top-level community (server).
    GuildId
);
snowflake_id!(ThreadId);
snowflake_id!(UserId);
snowflake_id!(MessageId);

/// Why a thread is exempt from auto-archiving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exemption {
    Archived,
    Locked,
    Pinned,
}

impl Exemption {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Archived => "archived",
            Self::Locked => "locked",
            Self::Pinned => "pinned",
        }
    }
}

impl std::fmt::Display for Exemption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thread state as reported by the platform, without message history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadState {
    pub id: ThreadId,
    pub guild_id: GuildId,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub pinned: bool,
}

impl ThreadState {
    pub fn new(id: ThreadId, guild_id: GuildId) -> Self {
        Self {
            id,
            guild_id,
            archived: false,
            locked: false,
            pinned: false,
        }
    }

    /// First exemption that applies, checked archived → locked → pinned.
    pub fn exemption(&self) -> Option<Exemption> {
        if self.archived {
            Some(Exemption::Archived)
        } else if self.locked {
            Some(Exemption::Locked)
        } else if self.pinned {
            Some(Exemption::Pinned)
        } else {
            None
        }
    }
}

/// Point-in-time view of a thread used for a single evaluation.
///
/// Built fresh from platform state every time; never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSnapshot {
    pub state: ThreadState,
    /// Timestamp of the newest message, `None` when the thread has no messages.
    pub last_activity: Option<DateTime<Utc>>,
}

impl ThreadSnapshot {
    pub fn capture(state: ThreadState, last_activity: Option<DateTime<Utc>>) -> Self {
        Self { state, last_activity }
    }
}
