//! ==============================================================================
//! history.rs - bounded, persisted reading history for one stream
//! ==============================================================================
//!
//! purpose:
//!     keeps the last `capacity` readings of a stream (oldest first), mirrors
//!     them into a snapshot after every append, and derives statistics and a
//!     csv export from whatever is currently buffered.
//!
//! durability:
//!     best-effort. a failed snapshot write is logged and the in-memory append
//!     stands. a missing or corrupt snapshot at startup means an empty buffer.
//!
//! relationships:
//!     - used by: stream.rs (append on every successful poll), server.rs
//!     - uses: snapshot.rs (durable slot), domain.rs (Reading, Statistics)
//!
//! ==============================================================================

use crate::domain::{Reading, Statistics};
use crate::error::PersistenceError;
use crate::snapshot::SnapshotStore;

use chrono::{DateTime, Local, SecondsFormat, Utc};
use std::collections::VecDeque;
use std::sync::Arc;

/// default window size, one reading per poll
pub const DEFAULT_CAPACITY: usize = 60;

/// csv header, column order is fixed for spreadsheet imports
pub const CSV_HEADER: &str = "timestamp_iso,time_local,value";

pub struct HistoryStore {
    key: String,
    capacity: usize,
    readings: VecDeque<Reading>,
    latest: Option<f64>,
    snapshots: Arc<dyn SnapshotStore>,
}

impl HistoryStore {
    /// create a store and rehydrate it from the snapshot under `key`
    pub fn open(key: impl Into<String>, capacity: usize, snapshots: Arc<dyn SnapshotStore>) -> Self {
        let capacity = capacity.max(1);
        let mut store = Self {
            key: key.into(),
            capacity,
            readings: VecDeque::with_capacity(capacity),
            latest: None,
            snapshots,
        };
        store.load();
        store
    }

    /// replace the buffer with the persisted snapshot. never fails.
    pub fn load(&mut self) {
        self.readings.clear();
        self.latest = None;

        let parsed = match self.read_snapshot() {
            Ok(Some(readings)) => readings,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("[HISTORY] Ignoring snapshot {}: {}", self.key, e);
                return;
            }
        };

        let skip = parsed.len().saturating_sub(self.capacity);
        self.readings.extend(parsed.into_iter().skip(skip));
        self.latest = self.readings.back().map(|r| r.value);
        tracing::debug!(
            "[HISTORY] Restored {} readings for {}",
            self.readings.len(),
            self.key
        );
    }

    fn read_snapshot(&self) -> Result<Option<Vec<Reading>>, PersistenceError> {
        let Some(raw) = self.snapshots.read(&self.key)? else {
            return Ok(None);
        };
        let readings = serde_json::from_str(&raw).map_err(PersistenceError::Decode)?;
        Ok(Some(readings))
    }

    /// push to the tail, evict from the head past capacity, then persist
    pub fn append(&mut self, reading: Reading) {
        self.readings.push_back(reading);
        while self.readings.len() > self.capacity {
            self.readings.pop_front();
        }
        self.latest = Some(reading.value);

        if let Err(e) = self.persist() {
            tracing::warn!("[HISTORY] Snapshot write failed for {}: {}", self.key, e);
        }
    }

    fn persist(&self) -> Result<(), PersistenceError> {
        let encoded = serde_json::to_string(&self.readings).map_err(PersistenceError::Encode)?;
        self.snapshots.write(&self.key, &encoded)
    }

    /// drop every reading and the snapshot itself
    pub fn clear(&mut self) {
        self.readings.clear();
        self.latest = None;
        if let Err(e) = self.snapshots.remove(&self.key) {
            tracing::warn!("[HISTORY] Snapshot removal failed for {}: {}", self.key, e);
        }
    }

    /// `None` while the buffer is empty
    pub fn statistics(&self) -> Option<Statistics> {
        statistics(self.readings.iter())
    }

    pub fn export_csv(&self) -> String {
        to_csv(self.readings.iter())
    }

    /// oldest first
    pub fn readings(&self) -> Vec<Reading> {
        self.readings.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<f64> {
        self.latest
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// min/max/mean in one pass; `None` for an empty window
pub fn statistics<'a, I>(readings: I) -> Option<Statistics>
where
    I: IntoIterator<Item = &'a Reading>,
{
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for r in readings {
        count += 1;
        sum += r.value;
        min = min.min(r.value);
        max = max.max(r.value);
    }

    if count == 0 {
        return None;
    }
    Some(Statistics {
        min,
        max,
        mean: sum / count as f64,
        count,
    })
}

/// header row plus one row per reading, no trailing newline
pub fn to_csv<'a, I>(readings: I) -> String
where
    I: IntoIterator<Item = &'a Reading>,
{
    let mut out = String::from(CSV_HEADER);
    for r in readings {
        let (iso, local) = match DateTime::<Utc>::from_timestamp_millis(r.timestamp) {
            Some(utc) => (
                utc.to_rfc3339_opts(SecondsFormat::Millis, true),
                utc.with_timezone(&Local).format("%d/%m/%Y %H:%M:%S").to_string(),
            ),
            None => (String::new(), String::new()),
        };
        out.push('\n');
        out.push_str(&format!("{},{},{:.3}", iso, local, r.value));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{FileSnapshotStore, MemorySnapshotStore};

    const KEY: &str = "distance_readings_v1";

    fn memory() -> Arc<dyn SnapshotStore> {
        Arc::new(MemorySnapshotStore::new())
    }

    /// snapshot slot that refuses every write
    struct ReadOnlySlots;

    impl SnapshotStore for ReadOnlySlots {
        fn read(&self, _key: &str) -> Result<Option<String>, PersistenceError> {
            Ok(None)
        }
        fn write(&self, _key: &str, _contents: &str) -> Result<(), PersistenceError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
        }
        fn remove(&self, _key: &str) -> Result<(), PersistenceError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
        }
    }

    #[test]
    fn test_eviction_keeps_last_n_in_order() {
        let n = 5;
        for k in 0..8 {
            let mut store = HistoryStore::open(KEY, n, memory());
            for i in 0..(n + k) {
                store.append(Reading::new(i as i64, i as f64));
            }
            assert_eq!(store.len(), n);
            let values: Vec<f64> = store.readings().iter().map(|r| r.value).collect();
            let expected: Vec<f64> = (k..n + k).map(|i| i as f64).collect();
            assert_eq!(values, expected);
        }
    }

    #[test]
    fn test_short_sequence_is_not_padded() {
        let mut store = HistoryStore::open(KEY, 60, memory());
        store.append(Reading::new(1, 1.0));
        store.append(Reading::new(2, 2.0));
        assert_eq!(store.len(), 2);
        assert_eq!(store.latest(), Some(2.0));
    }

    #[test]
    fn test_statistics_empty_is_none() {
        let store = HistoryStore::open(KEY, 60, memory());
        assert_eq!(store.statistics(), None);
    }

    #[test]
    fn test_statistics_values() {
        let mut store = HistoryStore::open(KEY, 60, memory());
        for (t, v) in [(1, 1.0), (2, 5.0), (3, 3.0)] {
            store.append(Reading::new(t, v));
        }
        let stats = store.statistics().unwrap();
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 5.0);
        assert_eq!(stats.mean, 3.0);
        assert_eq!(stats.count, 3);
    }

    #[test]
    fn test_reload_round_trip() {
        let slots = memory();
        let mut store = HistoryStore::open(KEY, 60, slots.clone());
        let written = [
            Reading::new(1_700_000_000_000, 10.5),
            Reading::new(1_700_000_001_500, 11.25),
            Reading::new(1_700_000_003_000, 9.0),
        ];
        for r in written {
            store.append(r);
        }

        let fresh = HistoryStore::open(KEY, 60, slots);
        assert_eq!(fresh.readings(), written.to_vec());
        assert_eq!(fresh.latest(), Some(9.0));
    }

    #[test]
    fn test_reload_truncates_oversized_snapshot() {
        let slots = memory();
        let oversized: Vec<Reading> = (0..10).map(|i| Reading::new(i, i as f64)).collect();
        slots
            .write(KEY, &serde_json::to_string(&oversized).unwrap())
            .unwrap();

        let store = HistoryStore::open(KEY, 4, slots);
        assert_eq!(store.readings(), oversized[6..].to_vec());
        assert_eq!(store.latest(), Some(9.0));
    }

    #[test]
    fn test_corrupt_snapshot_yields_empty() {
        let slots = memory();
        slots.write(KEY, "{not json").unwrap();
        let store = HistoryStore::open(KEY, 60, slots.clone());
        assert!(store.is_empty());
        assert_eq!(store.latest(), None);

        slots.write(KEY, r#"{"timestamp": 1, "value": 2}"#).unwrap();
        assert!(HistoryStore::open(KEY, 60, slots).is_empty());
    }

    #[test]
    fn test_clear_removes_snapshot() {
        let slots = memory();
        let mut store = HistoryStore::open(KEY, 60, slots.clone());
        store.append(Reading::new(1, 1.0));
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.latest(), None);

        store.load();
        assert!(store.is_empty());
        assert_eq!(slots.read(KEY).unwrap(), None);
    }

    #[test]
    fn test_failed_persist_keeps_append() {
        let mut store = HistoryStore::open(KEY, 60, Arc::new(ReadOnlySlots));
        store.append(Reading::new(1, 4.0));
        assert_eq!(store.len(), 1);
        assert_eq!(store.latest(), Some(4.0));

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_streams_do_not_share_slots() {
        let slots = memory();
        let mut a = HistoryStore::open("a", 60, slots.clone());
        a.append(Reading::new(1, 1.0));
        let b = HistoryStore::open("b", 60, slots);
        assert!(b.is_empty());
    }

    #[test]
    fn test_file_backed_reload() {
        let dir = tempfile::tempdir().unwrap();
        let slots: Arc<dyn SnapshotStore> = Arc::new(FileSnapshotStore::new(dir.path()));
        {
            let mut store = HistoryStore::open(KEY, 3, slots.clone());
            for i in 0..5 {
                store.append(Reading::new(i, i as f64 * 0.5));
            }
        }
        let store = HistoryStore::open(KEY, 3, slots);
        let values: Vec<f64> = store.readings().iter().map(|r| r.value).collect();
        assert_eq!(values, vec![1.0, 1.5, 2.0]);
    }

    #[test]
    fn test_export_single_row() {
        let mut store = HistoryStore::open(KEY, 60, memory());
        store.append(Reading::new(1_700_000_000_000, 12.345));

        let csv = store.export_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "timestamp_iso,time_local,value");

        let cols: Vec<&str> = lines[1].split(',').collect();
        assert_eq!(cols.len(), 3);
        assert_eq!(cols[0], "2023-11-14T22:13:20.000Z");
        assert_eq!(cols[2], "12.345");
    }

    #[test]
    fn test_export_local_time_column() {
        use chrono::TimeZone;

        let readings = [Reading::new(1_700_000_000_000, 1.0)];
        let csv = to_csv(readings.iter());
        let row = csv.lines().nth(1).unwrap();
        let local = row.split(',').nth(1).unwrap();

        let expected = Local
            .timestamp_millis_opt(1_700_000_000_000)
            .unwrap()
            .format("%d/%m/%Y %H:%M:%S")
            .to_string();
        assert_eq!(local, expected);
        assert_eq!(local.len(), "14/11/2023 22:13:20".len());
        assert_eq!(&local[2..3], "/");
        assert_eq!(&local[5..6], "/");
        assert!(!local.contains(','));
        assert_eq!(row.matches(',').count(), 2);
    }

    #[test]
    fn test_open_clamps_zero_capacity() {
        let mut store = HistoryStore::open(KEY, 0, memory());
        assert_eq!(store.key(), KEY);
        assert_eq!(store.capacity(), 1);
        store.append(Reading::new(1, 1.0));
        store.append(Reading::new(2, 2.0));
        assert_eq!(store.len(), 1);
        assert_eq!(store.latest(), Some(2.0));
    }

    #[test]
    fn test_export_empty_is_header_only() {
        let store = HistoryStore::open(KEY, 60, memory());
        assert_eq!(store.export_csv(), CSV_HEADER);
    }

    #[test]
    fn test_export_pads_precision() {
        let readings = [Reading::new(0, 3.0), Reading::new(1, 0.1)];
        let csv = to_csv(readings.iter());
        let values: Vec<&str> = csv
            .lines()
            .skip(1)
            .map(|l| l.rsplit(',').next().unwrap())
            .collect();
        assert_eq!(values, vec!["3.000", "0.100"]);
    }
}
