//! Optional scheduler capability.
//!
//! The acquisition is driven by an external periodic scheduler that may or
//! may not be present in a deployment. The pipeline only depends on being
//! called; this trait lets callers ask whether scheduling is available
//! without coupling to any queue's internals.

use tracing::debug;

pub trait SchedulerPort: Send + Sync {
    fn can_schedule(&self) -> bool;
    fn schedule(&self, job: &str) -> crate::error::Result<()>;
}

/// Stand-in when no task queue is deployed: scheduling requests are
/// acknowledged and dropped.
#[derive(Debug, Default)]
pub struct NoopScheduler;

impl SchedulerPort for NoopScheduler {
    fn can_schedule(&self) -> bool {
        false
    }

    fn schedule(&self, job: &str) -> crate::error::Result<()> {
        debug!("no scheduler available, dropping job '{}'", job);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_scheduler_accepts_and_drops() {
        let scheduler = NoopScheduler;
        assert!(!scheduler.can_schedule());
        assert!(scheduler.schedule("scrape").is_ok());
    }
}
