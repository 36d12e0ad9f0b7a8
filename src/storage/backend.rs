//! Telemetry store trait definition
//!
//! This module defines the `TelemetryStore` trait that every persistence
//! backend implements. It is the boundary between the ingestion pipeline and
//! whatever database the deployment uses.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::{StorageError, StorageResult};
use crate::Reading;

/// Append-only store of sensor readings
///
/// ## Ordering
///
/// Every query returns readings ordered by timestamp, newest first.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` as they are shared between the
/// ingestion task, the alert actor and the HTTP handlers.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Persist a reading and return it as stored
    async fn insert(&self, reading: Reading) -> StorageResult<Reading>;

    /// The `limit` most recent readings, newest first
    async fn latest(&self, limit: usize) -> StorageResult<Vec<Reading>>;

    /// All readings taken at or after `since`, newest first
    async fn since(&self, since: DateTime<Utc>) -> StorageResult<Vec<Reading>>;

    /// Delete readings older than `before`
    ///
    /// Used for retention policy enforcement. Returns the number of readings deleted.
    async fn cleanup_before(&self, before: DateTime<Utc>) -> StorageResult<usize>;

    /// Total number of stored readings
    async fn count(&self) -> StorageResult<usize>;
}

/// Reject readings that break the data model before they reach a backend
pub fn validate(reading: &Reading) -> StorageResult<()> {
    if !reading.has_valid_moisture() {
        return Err(StorageError::InvalidReading(format!(
            "soil moisture {} outside [0, 1]",
            reading.soil_moisture
        )));
    }

    if !reading.temperature.is_finite() || !reading.humidity.is_finite() {
        return Err(StorageError::InvalidReading(
            "temperature and humidity must be finite".to_string(),
        ));
    }

    Ok(())
}
