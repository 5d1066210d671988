// ═══════════════════════════════════════════════════════════════════
// Storage Tests — cache records, file format, memory and file stores
// ═══════════════════════════════════════════════════════════════════

use chrono::NaiveDate;
use std::time::Duration;

use powerlaw_core::errors::CoreError;
use powerlaw_core::models::chart::ChartDataPoint;
use powerlaw_core::models::price::PreviousPrice;
use powerlaw_core::storage::cache::{CacheKind, CacheRecord, CacheStore, MemoryCacheStore};
use powerlaw_core::storage::format::{self, CURRENT_VERSION, MAGIC, MIN_HEADER_SIZE};
use powerlaw_core::storage::manager::FileCacheStore;

fn record(timestamp_ms: i64) -> CacheRecord {
    let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    CacheRecord {
        timestamp_ms,
        data: vec![ChartDataPoint {
            date,
            price: Some(60_000.0),
            median_model: 70_000.0,
            support_model: 30_000.0,
            days_since_genesis: 5597,
            is_future: false,
        }],
        latest_price: 61_000.0,
        previous_price: PreviousPrice {
            usd: 60_000.0,
            local: 9_000_000.0,
        },
        source: Some("CoinGecko".into()),
    }
}

// ═══════════════════════════════════════════════════════════════════
// CacheKind / CacheRecord
// ═══════════════════════════════════════════════════════════════════

mod records {
    use super::*;

    #[test]
    fn kind_codes_round_trip() {
        for kind in CacheKind::ALL {
            assert_eq!(CacheKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(CacheKind::from_code(0), None);
        assert_eq!(CacheKind::from_code(9), None);
    }

    #[test]
    fn kinds_have_distinct_files() {
        assert_ne!(
            CacheKind::ChartSeries.file_name(),
            CacheKind::DailyData.file_name()
        );
    }

    #[test]
    fn freshness_window() {
        let r = record(1_000_000);
        let ttl = Duration::from_secs(60);
        assert!(r.is_fresh(1_000_000, ttl));
        assert!(r.is_fresh(1_059_999, ttl));
        assert!(!r.is_fresh(1_060_000, ttl));
    }

    #[test]
    fn future_record_is_stale() {
        let r = record(1_000_000);
        assert!(!r.is_fresh(999_999, Duration::from_secs(60)));
    }
}

// ═══════════════════════════════════════════════════════════════════
// File Format
// ═══════════════════════════════════════════════════════════════════

mod file_format {
    use super::*;

    #[test]
    fn header_layout() {
        let bytes = format::write_file(CURRENT_VERSION, CacheKind::DailyData, 42, b"payload");
        assert_eq!(&bytes[0..4], MAGIC);
        assert_eq!(bytes.len(), MIN_HEADER_SIZE + 7);

        let (header, payload) = format::read_file(&bytes).unwrap();
        assert_eq!(header.version, CURRENT_VERSION);
        assert_eq!(header.kind, CacheKind::DailyData);
        assert_eq!(header.timestamp_ms, 42);
        assert_eq!(header.payload_len, 7);
        assert_eq!(payload, b"payload");
    }

    #[test]
    fn too_small() {
        let err = format::read_file(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidFileFormat(_)));
    }

    #[test]
    fn wrong_magic() {
        let mut bytes = format::write_file(CURRENT_VERSION, CacheKind::ChartSeries, 1, b"x");
        bytes[0] = b'X';
        assert!(matches!(
            format::read_file(&bytes),
            Err(CoreError::InvalidFileFormat(_))
        ));
    }

    #[test]
    fn future_version_rejected() {
        let bytes = format::write_file(CURRENT_VERSION + 1, CacheKind::ChartSeries, 1, b"x");
        assert!(matches!(
            format::read_file(&bytes),
            Err(CoreError::UnsupportedVersion(v)) if v == CURRENT_VERSION + 1
        ));
    }

    #[test]
    fn unknown_kind_rejected() {
        let mut bytes = format::write_file(CURRENT_VERSION, CacheKind::ChartSeries, 1, b"x");
        bytes[6] = 77;
        assert!(format::read_file(&bytes).is_err());
    }

    #[test]
    fn truncated_payload() {
        let bytes = format::write_file(CURRENT_VERSION, CacheKind::ChartSeries, 1, b"0123456789");
        let err = format::read_file(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }
}

// ═══════════════════════════════════════════════════════════════════
// MemoryCacheStore
// ═══════════════════════════════════════════════════════════════════

mod memory_store {
    use super::*;

    #[test]
    fn empty_until_put() {
        let store = MemoryCacheStore::new();
        assert_eq!(store.get(CacheKind::ChartSeries).unwrap(), None);
        store.put(CacheKind::ChartSeries, record(5)).unwrap();
        assert_eq!(store.get(CacheKind::ChartSeries).unwrap(), Some(record(5)));
        assert_eq!(store.get(CacheKind::DailyData).unwrap(), None);
    }

    #[test]
    fn put_replaces_whole_record() {
        let store = MemoryCacheStore::new();
        store.put(CacheKind::DailyData, record(1)).unwrap();
        store.put(CacheKind::DailyData, record(2)).unwrap();
        assert_eq!(store.get(CacheKind::DailyData).unwrap().unwrap().timestamp_ms, 2);
    }

    #[test]
    fn invalidate_clears_one_kind() {
        let store = MemoryCacheStore::new();
        store.put(CacheKind::DailyData, record(1)).unwrap();
        store.put(CacheKind::ChartSeries, record(1)).unwrap();
        store.invalidate(CacheKind::DailyData).unwrap();
        assert_eq!(store.get(CacheKind::DailyData).unwrap(), None);
        assert!(store.get(CacheKind::ChartSeries).unwrap().is_some());
    }
}

// ═══════════════════════════════════════════════════════════════════
// FileCacheStore
// ═══════════════════════════════════════════════════════════════════

mod file_store {
    use super::*;

    #[test]
    fn creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = FileCacheStore::new(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(store.dir(), nested.as_path());
    }

    #[test]
    fn persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        FileCacheStore::new(dir.path())
            .unwrap()
            .put(CacheKind::ChartSeries, record(123))
            .unwrap();

        let reopened = FileCacheStore::new(dir.path()).unwrap();
        assert_eq!(reopened.get(CacheKind::ChartSeries).unwrap(), Some(record(123)));
        assert_eq!(reopened.get(CacheKind::DailyData).unwrap(), None);
    }

    #[test]
    fn no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path()).unwrap();
        store.put(CacheKind::DailyData, record(1)).unwrap();
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec![CacheKind::DailyData.file_name().to_string()]);
    }

    #[test]
    fn concurrent_writers_leave_one_whole_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path()).unwrap();

        std::thread::scope(|scope| {
            for writer in 0..4i64 {
                let store = store.clone();
                scope.spawn(move || {
                    for round in 0..50i64 {
                        store
                            .put(CacheKind::ChartSeries, record(writer * 1_000 + round))
                            .unwrap();
                    }
                });
            }
        });

        let stored = store.get(CacheKind::ChartSeries).unwrap().unwrap();
        assert_eq!(stored, record(stored.timestamp_ms));
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec![CacheKind::ChartSeries.file_name().to_string()]);
    }

    #[test]
    fn invalidate_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path()).unwrap();
        assert!(store.invalidate(CacheKind::ChartSeries).is_ok());
        store.put(CacheKind::ChartSeries, record(1)).unwrap();
        store.invalidate(CacheKind::ChartSeries).unwrap();
        assert!(!store.path_for(CacheKind::ChartSeries).exists());
    }

    #[test]
    fn corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path()).unwrap();
        std::fs::write(store.path_for(CacheKind::ChartSeries), b"garbage").unwrap();
        assert!(store.get(CacheKind::ChartSeries).is_err());
    }

    #[test]
    fn decode_checks_kind() {
        let bytes = FileCacheStore::encode(CacheKind::DailyData, &record(9)).unwrap();
        assert!(FileCacheStore::decode(CacheKind::DailyData, &bytes).is_ok());
        assert!(matches!(
            FileCacheStore::decode(CacheKind::ChartSeries, &bytes),
            Err(CoreError::InvalidFileFormat(_))
        ));
    }

    #[test]
    fn decode_checks_timestamp() {
        let payload = bincode::serialize(&record(9)).unwrap();
        let bytes = format::write_file(CURRENT_VERSION, CacheKind::DailyData, 10, &payload);
        assert!(FileCacheStore::decode(CacheKind::DailyData, &bytes).is_err());
    }
}
