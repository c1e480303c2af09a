//! In-process `KeyStore` backed by a `DashMap`, with lazy expiry on read and an
//! optional periodic sweep.

use super::{KeyStore, KeyTtl};
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use log::{debug, info};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::time::interval;

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    fn remaining_secs(&self, now: Instant) -> u64 {
        self.expires_at.saturating_duration_since(now).as_secs()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryKeyStore {
    entries: Arc<DashMap<String, MemoryEntry>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store plus a background task removing expired entries every `sweep_interval`.
    /// The task ends once the last handle to the store is dropped. Must be called from
    /// within a Tokio runtime.
    pub fn with_sweeper(sweep_interval: Duration) -> Self {
        let store = Self::new();
        store.start_sweep_task(sweep_interval);
        store
    }

    fn start_sweep_task(&self, sweep_interval: Duration) {
        info!(
            "Starting in-memory cache sweep every {}s",
            sweep_interval.as_secs()
        );
        let weak_entries: Weak<DashMap<String, MemoryEntry>> = Arc::downgrade(&self.entries);

        tokio::spawn(async move {
            let mut interval_timer = interval(sweep_interval);
            interval_timer.tick().await; // first tick fires immediately

            loop {
                interval_timer.tick().await;
                let Some(entries) = weak_entries.upgrade() else {
                    debug!("In-memory cache dropped, stopping sweep task");
                    break;
                };
                let evicted = sweep_expired(&entries);
                if evicted > 0 {
                    debug!("Cache cleanup: evicted {} expired entries", evicted);
                }
            }
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn sweep_expired(entries: &DashMap<String, MemoryEntry>) -> usize {
    let now = Instant::now();
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired_at(now));
    before.saturating_sub(entries.len())
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let value = match self.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => Some(entry.value.clone()),
            Some(_) => None,
            None => return Ok(None),
        };
        if value.is_none() {
            // Guard dropped above; re-check so a concurrent fresh write is not removed.
            self.entries.remove_if(key, |_, entry| entry.is_expired_at(now));
        }
        Ok(value)
    }

    async fn set_raw(&self, key: &str, value: String, ttl_secs: u64) -> Result<()> {
        let entry = MemoryEntry {
            value,
            expires_at: Instant::now() + Duration::from_secs(ttl_secs),
        };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn clear(&self, prefix: &str) -> Result<usize> {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before.saturating_sub(self.entries.len()))
    }

    async fn ttl_listing(&self, prefix: &str) -> Result<Vec<KeyTtl>> {
        let now = Instant::now();
        Ok(self
            .entries
            .iter()
            .filter(|item| item.key().starts_with(prefix) && !item.value().is_expired_at(now))
            .map(|item| KeyTtl {
                key: item.key().clone(),
                ttl_seconds: item.value().remaining_secs(now),
            })
            .collect())
    }
}
