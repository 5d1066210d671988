use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use crate::errors::CoreError;
use crate::models::chart::ChartDataPoint;
use crate::models::price::PreviousPrice;

/// Which cache slot a record lives in. Each kind has its own TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheKind {
    /// The fully assembled chart series
    ChartSeries,
    /// Live daily points from the winning provider
    DailyData,
}

impl CacheKind {
    pub const ALL: [CacheKind; 2] = [CacheKind::ChartSeries, CacheKind::DailyData];

    /// Stable one-byte code used in the on-disk header.
    pub fn code(self) -> u8 {
        match self {
            CacheKind::ChartSeries => 1,
            CacheKind::DailyData => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(CacheKind::ChartSeries),
            2 => Some(CacheKind::DailyData),
            _ => None,
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            CacheKind::ChartSeries => "chart-series.plwc",
            CacheKind::DailyData => "daily-data.plwc",
        }
    }
}

impl std::fmt::Display for CacheKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKind::ChartSeries => write!(f, "chart-series"),
            CacheKind::DailyData => write!(f, "daily-data"),
        }
    }
}

/// A cached assembly result plus its two headline figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Write time, epoch milliseconds
    pub timestamp_ms: i64,
    pub data: Vec<ChartDataPoint>,
    pub latest_price: f64,
    pub previous_price: PreviousPrice,
    /// Name of the provider the data came from, if any
    #[serde(default)]
    pub source: Option<String>,
}

impl CacheRecord {
    /// Fresh while `0 <= now - timestamp < ttl`. Records from the future are stale.
    pub fn is_fresh(&self, now_ms: i64, ttl: Duration) -> bool {
        let age = now_ms - self.timestamp_ms;
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        (0..ttl_ms).contains(&age)
    }
}

/// Key-value store with one record per `CacheKind`.
///
/// `put` replaces the slot as a whole; readers never observe a partial record.
pub trait CacheStore: Send + Sync {
    fn get(&self, kind: CacheKind) -> Result<Option<CacheRecord>, CoreError>;

    fn put(&self, kind: CacheKind, record: CacheRecord) -> Result<(), CoreError>;

    fn invalidate(&self, kind: CacheKind) -> Result<(), CoreError>;
}

/// Process-local cache store.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    slots: Mutex<HashMap<CacheKind, CacheRecord>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, kind: CacheKind) -> Result<Option<CacheRecord>, CoreError> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let record = slots.get(&kind).cloned();
        debug!(%kind, hit = record.is_some(), "Cache GET");
        Ok(record)
    }

    fn put(&self, kind: CacheKind, record: CacheRecord) -> Result<(), CoreError> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        debug!(%kind, points = record.data.len(), "Cache PUT");
        slots.insert(kind, record);
        Ok(())
    }

    fn invalidate(&self, kind: CacheKind) -> Result<(), CoreError> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.remove(&kind);
        Ok(())
    }
}
