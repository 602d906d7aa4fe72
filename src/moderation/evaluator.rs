//! Inactivity evaluator -- pure archive/skip decision for one thread.
//!
//! Rules, first match wins:
//!   1. archived, locked or pinned → Skip
//!   2. no messages → Archive
//!   3. last message + inactive_time < now → Archive
//!   4. otherwise → Skip

use chrono::{DateTime, Utc};

use crate::config::GuildConfig;
use crate::guild::{Exemption, ThreadSnapshot};
use crate::time_utils;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveCause {
    NoMessages,
    Inactive { idle_secs: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipCause {
    Exempt(Exemption),
    Active { idle_secs: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Archive(ArchiveCause),
    Skip(SkipCause),
}

impl Decision {
    pub fn is_archive(&self) -> bool {
        matches!(self, Self::Archive(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Archive(ArchiveCause::NoMessages) => "archive (no messages)",
            Self::Archive(ArchiveCause::Inactive { .. }) => "archive (inactive)",
            Self::Skip(SkipCause::Exempt(Exemption::Archived)) => "skip (archived)",
            Self::Skip(SkipCause::Exempt(Exemption::Locked)) => "skip (locked)",
            Self::Skip(SkipCause::Exempt(Exemption::Pinned)) => "skip (pinned)",
            Self::Skip(SkipCause::Active { .. }) => "skip (active)",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

pub fn evaluate(snapshot: &ThreadSnapshot, config: &GuildConfig, now: DateTime<Utc>) -> Decision {
    if let Some(exemption) = snapshot.state.exemption() {
        return Decision::Skip(SkipCause::Exempt(exemption));
    }

    let last = match snapshot.last_activity {
        Some(last) => last,
        None => return Decision::Archive(ArchiveCause::NoMessages),
    };

    let idle_secs = time_utils::idle_secs(&last, &now);
    // A threshold too large to add to the timestamp never expires.
    let expires_at = i64::try_from(config.inactive_time)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|window| last.checked_add_signed(window));

    match expires_at {
        Some(expires_at) if expires_at < now => Decision::Archive(ArchiveCause::Inactive { idle_secs }),
        _ => Decision::Skip(SkipCause::Active { idle_secs }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use chrono::Duration;

    fn snap(builder: ThreadBuilder, last: Option<DateTime<Utc>>) -> ThreadSnapshot {
        ThreadSnapshot::capture(builder.build(), last)
    }

    fn cfg(secs: u64) -> GuildConfig {
        GuildConfig::with_inactive_time(secs)
    }

    #[test]
    fn test_exempt_threads_always_skip() {
        let now = Utc::now();
        let ancient = Some(now - Duration::days(3650));
        for (builder, exemption) in [
            (ThreadBuilder::new(1, 1).archived(), Exemption::Archived),
            (ThreadBuilder::new(1, 1).locked(), Exemption::Locked),
            (ThreadBuilder::new(1, 1).pinned(), Exemption::Pinned),
        ] {
            for last in [None, ancient, Some(now)] {
                let d = evaluate(&snap(builder.clone(), last), &cfg(1), now);
                assert_eq!(d, Decision::Skip(SkipCause::Exempt(exemption)));
            }
        }
    }

    #[test]
    fn test_archived_wins_over_locked_and_pinned() {
        let now = Utc::now();
        let s = snap(ThreadBuilder::new(1, 1).pinned().locked().archived(), None);
        assert_eq!(
            evaluate(&s, &cfg(60), now),
            Decision::Skip(SkipCause::Exempt(Exemption::Archived))
        );
    }

    #[test]
    fn test_no_messages_archives() {
        let s = snap(ThreadBuilder::new(1, 1), None);
        assert_eq!(
            evaluate(&s, &cfg(u64::MAX), Utc::now()),
            Decision::Archive(ArchiveCause::NoMessages)
        );
    }

    #[test]
    fn test_boundary_is_strict() {
        let now = Utc::now();
        let window = 3_600;

        let at_boundary = snap(ThreadBuilder::new(1, 1), Some(now - Duration::seconds(window)));
        assert!(!evaluate(&at_boundary, &cfg(window as u64), now).is_archive());

        let just_past = snap(
            ThreadBuilder::new(1, 1),
            Some(now - Duration::seconds(window) - Duration::milliseconds(1)),
        );
        assert!(evaluate(&just_past, &cfg(window as u64), now).is_archive());

        let inside = snap(ThreadBuilder::new(1, 1), Some(now - Duration::seconds(window - 1)));
        assert!(!evaluate(&inside, &cfg(window as u64), now).is_archive());
    }

    #[test]
    fn test_default_config_90000s_idle_archives() {
        let now = Utc::now();
        let s = snap(ThreadBuilder::new(1, 1), Some(now - Duration::seconds(90_000)));
        assert_eq!(
            evaluate(&s, &GuildConfig::default(), now),
            Decision::Archive(ArchiveCause::Inactive { idle_secs: 90_000 })
        );
    }

    #[test]
    fn test_pinned_for_a_year_is_never_archived() {
        let s = snap(ThreadBuilder::new(1, 1).pinned(), Some(days_ago(365)));
        assert!(!evaluate(&s, &GuildConfig::default(), Utc::now()).is_archive());
    }

    #[test]
    fn test_huge_threshold_never_expires() {
        let s = snap(ThreadBuilder::new(1, 1), Some(days_ago(10_000)));
        assert!(matches!(
            evaluate(&s, &cfg(u64::MAX), Utc::now()),
            Decision::Skip(SkipCause::Active { .. })
        ));
    }

    #[test]
    fn test_future_timestamp_is_active() {
        let now = Utc::now();
        let s = snap(ThreadBuilder::new(1, 1), Some(now + Duration::seconds(30)));
        assert_eq!(
            evaluate(&s, &cfg(1), now),
            Decision::Skip(SkipCause::Active { idle_secs: -30 })
        );
    }

    #[test]
    fn test_deterministic() {
        let now = Utc::now();
        let s = snap(ThreadBuilder::new(1, 1), Some(hours_ago(5)));
        assert_eq!(evaluate(&s, &cfg(60), now), evaluate(&s, &cfg(60), now));
    }
}
