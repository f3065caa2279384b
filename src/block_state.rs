//! Block cooldown state machine.
//!
//! The upstream site answers automated traffic with 403s once it decides to
//! block. The tracker persists that signal inside [`Metadata`] and gates
//! future attempts with an exponentially growing cooldown so a blocked
//! source is never hammered.

use chrono::{DateTime, Duration, Utc};

use crate::config::Config;
use crate::domain::{Metadata, ScrapeStatus};

/// Derived view over the persisted metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Clear,
    Cooling {
        next_allowed_at: DateTime<Utc>,
        forbidden_count: u32,
    },
}

impl BlockState {
    pub fn from_metadata(meta: Option<&Metadata>) -> Self {
        match meta {
            Some(m) if m.status == ScrapeStatus::Forbidden => match m.next_allowed_attempt {
                Some(at) => BlockState::Cooling {
                    next_allowed_at: at,
                    forbidden_count: m.forbidden_count,
                },
                None => BlockState::Clear,
            },
            _ => BlockState::Clear,
        }
    }

    /// May a fetch be attempted right now? Boundary inclusive: an attempt at
    /// exactly `next_allowed_at` is allowed.
    pub fn may_attempt(&self, now: DateTime<Utc>) -> bool {
        match self {
            BlockState::Clear => true,
            BlockState::Cooling { next_allowed_at, .. } => now >= *next_allowed_at,
        }
    }
}

/// Cooldown hours for the n-th consecutive block signal (1-based), doubling
/// from the base and clamped at the maximum.
pub fn backoff_hours(forbidden_count: u32, base_hours: u64, max_hours: u64) -> u64 {
    if forbidden_count == 0 {
        return 0;
    }
    let doubled = base_hours.saturating_mul(1u64.checked_shl(forbidden_count - 1).unwrap_or(u64::MAX));
    doubled.min(max_hours)
}

/// Records a block signal: bumps the consecutive-forbidden counter and
/// extends the cooldown. An existing unexpired deadline that is already
/// later than the freshly computed one is kept; the counter still advances.
pub fn register_block(meta: &mut Metadata, now: DateTime<Utc>, config: &Config) {
    meta.forbidden_count += 1;
    let hours = backoff_hours(meta.forbidden_count, config.block_base_hours, config.block_max_hours);
    let candidate = now + Duration::hours(hours as i64);

    let keep_existing = meta
        .next_allowed_attempt
        .is_some_and(|existing| existing > now && existing > candidate);
    if !keep_existing {
        meta.next_allowed_attempt = Some(candidate);
        meta.backoff_hours = Some(hours);
    }
    meta.status = ScrapeStatus::Forbidden;
}

/// A successful fetch clears the cooldown entirely.
pub fn clear_block(meta: &mut Metadata) {
    meta.forbidden_count = 0;
    meta.next_allowed_attempt = None;
    meta.backoff_hours = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_config() -> Config {
        Config {
            source_url: "http://example.test".into(),
            table_element_id: "resultado".into(),
            media_dir: "media".into(),
            probe_max_attempts: 4,
            probe_base_backoff_secs: 1.5,
            probe_max_backoff_secs: 60.0,
            probe_jitter_secs: 1.5,
            block_base_hours: 2,
            block_max_hours: 168,
            browser_wait_secs: 20,
            strict_filters: false,
            redis_url: None,
            remote: None,
        }
    }

    #[test]
    fn backoff_doubles_then_clamps() {
        let expected = [2u64, 4, 8, 16, 32];
        for (i, want) in expected.iter().enumerate() {
            assert_eq!(backoff_hours(i as u32 + 1, 2, 168), *want);
        }
        assert_eq!(backoff_hours(10, 2, 168), 168);
        assert_eq!(backoff_hours(63, 2, 168), 168);
    }

    #[test]
    fn may_attempt_boundary_is_inclusive() {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let state = BlockState::Cooling { next_allowed_at: at, forbidden_count: 1 };
        assert!(!state.may_attempt(at - Duration::seconds(1)));
        assert!(state.may_attempt(at));
        assert!(state.may_attempt(at + Duration::seconds(1)));
    }

    #[test]
    fn register_block_grows_the_cooldown() {
        let cfg = test_config();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let mut meta = Metadata::default();

        register_block(&mut meta, now, &cfg);
        assert_eq!(meta.forbidden_count, 1);
        assert_eq!(meta.backoff_hours, Some(2));
        assert_eq!(meta.next_allowed_attempt, Some(now + Duration::hours(2)));
        assert_eq!(meta.status, ScrapeStatus::Forbidden);

        // Second signal an hour later: 4h from now beats the remaining 1h.
        let later = now + Duration::hours(1);
        register_block(&mut meta, later, &cfg);
        assert_eq!(meta.forbidden_count, 2);
        assert_eq!(meta.next_allowed_attempt, Some(later + Duration::hours(4)));
    }

    #[test]
    fn register_block_never_shortens_an_existing_deadline() {
        let mut cfg = test_config();
        cfg.block_base_hours = 1;
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let mut meta = Metadata::default();
        meta.forbidden_count = 1;
        meta.next_allowed_attempt = Some(now + Duration::hours(100));
        meta.status = ScrapeStatus::Forbidden;

        register_block(&mut meta, now, &cfg);
        // Counter advances, deadline stays.
        assert_eq!(meta.forbidden_count, 2);
        assert_eq!(meta.next_allowed_attempt, Some(now + Duration::hours(100)));
    }

    #[test]
    fn clear_resets_everything() {
        let cfg = test_config();
        let now = Utc::now();
        let mut meta = Metadata::default();
        register_block(&mut meta, now, &cfg);
        clear_block(&mut meta);
        assert_eq!(meta.forbidden_count, 0);
        assert!(meta.next_allowed_attempt.is_none());
        assert!(BlockState::from_metadata(Some(&meta)).may_attempt(now));
    }

    #[test]
    fn state_from_missing_metadata_is_clear() {
        assert_eq!(BlockState::from_metadata(None), BlockState::Clear);
        assert!(BlockState::from_metadata(None).may_attempt(Utc::now()));
    }
}
