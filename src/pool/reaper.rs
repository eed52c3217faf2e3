//! Idle connection eviction.
//!
//! # Responsibilities
//! - Periodically close connections idle for longer than `idle_timeout_ms`
//! - Exit when the pool closes or is dropped

use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;

use crate::pool::manager::ConnectionPool;

pub struct IdleReaper {
    pool: Weak<ConnectionPool>,
    idle_timeout: Duration,
}

impl IdleReaper {
    pub fn new(pool: &Arc<ConnectionPool>, idle_timeout: Duration) -> Self {
        Self {
            pool: Arc::downgrade(pool),
            idle_timeout,
        }
    }

    /// Run the reaper on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        let Some(mut closed) = self.pool.upgrade().map(|pool| pool.closed_signal()) else {
            return;
        };

        // Check twice per timeout so nothing lingers much past its deadline.
        let period = (self.idle_timeout / 2).max(Duration::from_millis(10));
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        tracing::debug!(idle_timeout = ?self.idle_timeout, "Idle reaper starting");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(pool) = self.pool.upgrade() else { break };
                    if pool.is_closed() {
                        break;
                    }
                    let evicted = pool.evict_idle(self.idle_timeout);
                    if evicted > 0 {
                        tracing::debug!(cluster = %pool.config().name, evicted, "Closed idle connections");
                    }
                }
                changed = closed.changed() => {
                    if changed.is_err() || *closed.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::debug!("Idle reaper stopped");
    }
}
