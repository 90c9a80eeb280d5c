//! Scheduler for concurrency limiting and request pacing
//!
//! This module handles:
//! - Global concurrency limiting via semaphores
//! - Respecting a minimum interval between request starts
//! - Integrating robots.txt crawl delays

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// A granted request slot
///
/// The concurrency permit is released when this value is dropped.
pub struct ScheduledFetch {
    _permit: OwnedSemaphorePermit,
}

/// Scheduler hands out request slots
///
/// The scheduler coordinates:
/// - Global concurrency limits (max requests in flight)
/// - A minimum time between the start of any two requests
///
/// It is shared between spawned fetch tasks behind an `Arc`.
pub struct Scheduler {
    /// Global semaphore for limiting concurrent fetches
    global_semaphore: Arc<Semaphore>,

    /// Minimum interval between request starts, in milliseconds
    interval_ms: AtomicU64,

    /// Earliest instant the next request may start
    next_slot: Mutex<Option<Instant>>,
}

impl Scheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `concurrency` - Maximum number of requests in flight
    /// * `min_interval` - Minimum time between request starts
    pub fn new(concurrency: usize, min_interval: Duration) -> Self {
        Self {
            global_semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            interval_ms: AtomicU64::new(duration_ms(min_interval)),
            next_slot: Mutex::new(None),
        }
    }

    /// Returns the current minimum interval between request starts
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.load(Ordering::SeqCst))
    }

    /// Raises the interval to at least `delay`
    ///
    /// Used for robots.txt crawl delays; the interval never goes down.
    pub fn raise_interval(&self, delay: Duration) {
        let previous = self
            .interval_ms
            .fetch_max(duration_ms(delay), Ordering::SeqCst);
        if duration_ms(delay) > previous {
            tracing::info!("Request interval raised to {:?}", delay);
        }
    }

    /// Waits for a concurrency permit and the next pacing slot
    ///
    /// # Returns
    ///
    /// * `Some(ScheduledFetch)` - The caller may start its request now
    /// * `None` - The scheduler was closed
    pub async fn acquire(&self) -> Option<ScheduledFetch> {
        let permit = self.global_semaphore.clone().acquire_owned().await.ok()?;

        let start = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let start = match *next_slot {
                Some(slot) if slot > now => slot,
                _ => now,
            };
            *next_slot = Some(start + self.interval());
            start
        };

        tokio::time::sleep_until(start).await;
        tracing::trace!("Request slot granted");

        Some(ScheduledFetch { _permit: permit })
    }

    /// Returns the number of free concurrency permits
    pub fn available_permits(&self) -> usize {
        self.global_semaphore.available_permits()
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Calculates the effective delay for an origin
///
/// This takes the maximum of:
/// - The configured request delay
/// - The robots.txt crawl delay (if specified)
pub fn effective_delay(configured: Duration, robots_delay: Option<Duration>) -> Duration {
    std::cmp::max(configured, robots_delay.unwrap_or(Duration::ZERO))
}
