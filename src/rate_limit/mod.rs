//! Fixed-window request counting per client key.
//!
//! The client key comes from a header the caller controls, so this is abuse
//! damping rather than enforcement. Window state sits behind [`WindowStore`];
//! the in-memory store is process-local.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Keyed fixed-window counters. A shared backend can implement this to
/// spread limits across processes.
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Counts a request from `client` against its current window. Returns
    /// `false` without counting when the window already holds `ceiling`.
    async fn admit(&self, client: &str, window: Duration, ceiling: u32) -> bool;
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    window_start: Instant,
}

struct Windows {
    entries: HashMap<String, RateWindow>,
    last_sweep: Instant,
}

/// In-process window store. Windows that have run out are swept at most
/// once per window length, so spoofed keys do not accumulate.
pub struct MemoryWindows {
    state: Mutex<Windows>,
}

impl MemoryWindows {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Windows {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }
}

impl Default for MemoryWindows {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WindowStore for MemoryWindows {
    async fn admit(&self, client: &str, window: Duration, ceiling: u32) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock().await;

        if now.duration_since(state.last_sweep) > window {
            let before = state.entries.len();
            state
                .entries
                .retain(|_, w| now.duration_since(w.window_start) <= window);
            state.last_sweep = now;
            debug!(
                "Swept {} expired rate windows",
                before - state.entries.len()
            );
        }

        let entry = state.entries.entry(client.to_string()).or_insert(RateWindow {
            count: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) > window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= ceiling {
            debug!("Rate limit hit for {} ({} requests)", client, entry.count);
            return false;
        }

        entry.count += 1;
        true
    }
}

/// Per-endpoint limit: a window length and ceiling over a shared store.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn WindowStore>,
    window: Duration,
    ceiling: u32,
}

impl RateLimiter {
    pub fn new(window: Duration, ceiling: u32) -> Self {
        Self::with_store(Arc::new(MemoryWindows::new()), window, ceiling)
    }

    pub fn with_store(store: Arc<dyn WindowStore>, window: Duration, ceiling: u32) -> Self {
        Self {
            store,
            window,
            ceiling,
        }
    }

    /// Counts a request from `client`. Returns `false` when the client has
    /// already used its ceiling in the current window; denied requests are
    /// not counted.
    pub async fn check(&self, client: &str) -> bool {
        self.store.admit(client, self.window, self.ceiling).await
    }
}
