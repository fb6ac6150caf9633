//! Fixed-window request counting per client key.
//!
//! Each key gets a window of `window` length starting at its first request.
//! Up to `max_requests` are admitted inside that window; the counter starts
//! over as soon as the window has elapsed, so up to twice the limit can pass
//! across a window boundary.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Counter state of one client within its current window
#[derive(Debug, Clone, Copy)]
struct ClientWindow {
    count: u32,
    reset_at: Instant,
}

impl ClientWindow {
    fn open(now: Instant, window: Duration) -> Self {
        Self {
            count: 1,
            reset_at: now + window,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now > self.reset_at
    }
}

/// Outcome of an admission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitVerdict {
    pub limited: bool,
    pub limit: u32,
    pub window_seconds: u64,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitVerdict {
    /// Whole seconds until the window resets, rounded up
    pub fn retry_after_secs(&self) -> u64 {
        let millis = (self.reset_at - Utc::now()).num_milliseconds().max(0) as u64;
        millis.div_ceil(1000)
    }
}

type WindowTable = Arc<Mutex<HashMap<String, ClientWindow>>>;

/// In-memory rate limiter with a background sweep of expired windows.
///
/// Must be created inside a tokio runtime. Call [`RateLimiter::shutdown`] to
/// stop the sweep task and wait for it; dropping the limiter only signals it.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    clients: WindowTable,
    stop: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl RateLimiter {
    /// Create a limiter sweeping every two windows
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self::with_sweep_interval(max_requests, window, window.saturating_mul(2))
    }

    pub fn with_sweep_interval(max_requests: u32, window: Duration, sweep_interval: Duration) -> Self {
        let clients: WindowTable = Arc::new(Mutex::new(HashMap::new()));
        let stop = CancellationToken::new();

        let sweeper = tokio::spawn(run_sweeper(
            clients.clone(),
            sweep_interval.max(MIN_SWEEP_INTERVAL),
            stop.clone(),
        ));

        Self {
            max_requests,
            window,
            clients,
            stop,
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    /// Record a request for `client_key` and report whether it is over the limit
    pub fn admit(&self, client_key: &str) -> RateLimitVerdict {
        let now = Instant::now();
        let mut clients = lock_table(&self.clients);

        let (limited, reset_at) = match clients.get_mut(client_key) {
            Some(window) if !window.is_expired(now) => {
                if window.count >= self.max_requests {
                    (true, window.reset_at)
                } else {
                    window.count += 1;
                    (false, window.reset_at)
                }
            }
            Some(window) => {
                *window = ClientWindow::open(now, self.window);
                (false, window.reset_at)
            }
            None => {
                let window = ClientWindow::open(now, self.window);
                clients.insert(client_key.to_string(), window);
                (false, window.reset_at)
            }
        };
        drop(clients);

        if limited {
            debug!(client = %client_key, limit = self.max_requests, "Rate limit exceeded");
        }

        RateLimitVerdict {
            limited,
            limit: self.max_requests,
            window_seconds: self.window.as_secs(),
            reset_at: wall_clock(reset_at, now),
        }
    }

    /// Remove expired windows now, returning how many were evicted
    pub fn sweep_expired(&self) -> usize {
        sweep_table(&self.clients, Instant::now())
    }

    /// Number of clients currently tracked
    pub fn tracked_clients(&self) -> usize {
        lock_table(&self.clients).len()
    }

    /// Stop the sweep task and wait for it to finish
    pub async fn shutdown(&self) {
        self.stop.cancel();

        let handle = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Rate limit sweeper terminated abnormally: {}", e);
            }
        }
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

fn lock_table(table: &WindowTable) -> MutexGuard<'_, HashMap<String, ClientWindow>> {
    // Entries are plain values, a panic mid-update cannot leave one torn.
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

fn sweep_table(table: &WindowTable, now: Instant) -> usize {
    let mut clients = lock_table(table);
    let before = clients.len();
    clients.retain(|_, window| !window.is_expired(now));
    before - clients.len()
}

fn wall_clock(at: Instant, now: Instant) -> DateTime<Utc> {
    let remaining = chrono::Duration::from_std(at.saturating_duration_since(now))
        .unwrap_or_else(|_| chrono::Duration::zero());
    Utc::now() + remaining
}

async fn run_sweeper(clients: WindowTable, period: Duration, stop: CancellationToken) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                let removed = sweep_table(&clients, Instant::now());
                if removed > 0 {
                    debug!(removed, "Evicted expired rate limit windows");
                }
            }
        }
    }

    debug!("Rate limit sweeper stopped");
}
