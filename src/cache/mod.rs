use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Keyed result store with time-based expiry. The in-memory implementation
/// is process-local; a shared backend can implement the same trait.
#[async_trait]
pub trait Store<V>: Send + Sync {
    /// Returns the value for `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Option<V>;

    /// Stores `value`, replacing any previous record and resetting its age.
    async fn put(&self, key: String, value: V);
}

struct CacheRecord<V> {
    data: V,
    stored_at: Instant,
}

pub struct MemoryStore<V> {
    records: Mutex<HashMap<String, CacheRecord<V>>>,
    ttl: Duration,
}

impl<V> MemoryStore<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            ttl,
        }
    }
}

#[async_trait]
impl<V> Store<V> for MemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<V> {
        let records = self.records.lock().await;
        records
            .get(key)
            .filter(|record| record.stored_at.elapsed() < self.ttl)
            .map(|record| record.data.clone())
    }

    async fn put(&self, key: String, value: V) {
        self.records.lock().await.insert(
            key,
            CacheRecord {
                data: value,
                stored_at: Instant::now(),
            },
        );
    }
}
