//! In-memory telemetry store (no persistence)
//!
//! This backend keeps readings in a bounded ring buffer. It's useful for:
//! - Testing without database dependencies
//! - Deployments without a storage section in the config
//!
//! ## Limitations
//!
//! - **No persistence**: All data lost on restart
//! - **Limited capacity**: oldest readings are evicted once the buffer is full

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use super::backend::{TelemetryStore, validate};
use super::error::StorageResult;
use crate::Reading;

/// Maximum readings to keep in memory
pub const DEFAULT_CAPACITY: usize = 1000;

/// In-memory store
///
/// Readings are kept sorted oldest to newest so that out-of-order inserts
/// still come back correctly from `latest`.
pub struct MemoryStore {
    readings: RwLock<VecDeque<Reading>>,
    capacity: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            readings: RwLock::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            capacity: capacity.max(1),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TelemetryStore for MemoryStore {
    async fn insert(&self, reading: Reading) -> StorageResult<Reading> {
        validate(&reading)?;

        let mut readings = self.readings.write().await;
        let position = readings.partition_point(|r| r.timestamp <= reading.timestamp);
        readings.insert(position, reading.clone());

        while readings.len() > self.capacity {
            readings.pop_front();
        }

        trace!("stored reading, {} in memory", readings.len());
        Ok(reading)
    }

    async fn latest(&self, limit: usize) -> StorageResult<Vec<Reading>> {
        let readings = self.readings.read().await;
        Ok(readings.iter().rev().take(limit).cloned().collect())
    }

    async fn since(&self, since: DateTime<Utc>) -> StorageResult<Vec<Reading>> {
        let readings = self.readings.read().await;
        Ok(readings
            .iter()
            .rev()
            .take_while(|r| r.timestamp >= since)
            .cloned()
            .collect())
    }

    async fn cleanup_before(&self, before: DateTime<Utc>) -> StorageResult<usize> {
        let mut readings = self.readings.write().await;
        let len = readings.len();
        readings.retain(|r| r.timestamp >= before);
        let deleted = len - readings.len();

        debug!("in-memory cleanup removed {deleted} readings");
        Ok(deleted)
    }

    async fn count(&self) -> StorageResult<usize> {
        Ok(self.readings.read().await.len())
    }
}
