//! Bounded, FIFO-trimmed persistent store of completed encounters (§4.6,
//! §6, §8 scenario 6).
//!
//! The store itself never serializes anything — it only holds the opaque
//! bytes a [`crate::codec::SnapshotCodec`] produced, plus enough metadata to
//! browse the list without decoding every entry.

use chrono::{DateTime, Utc};

use crate::snapshot::EncounterExport;

/// One persisted encounter: its metadata plus the codec's opaque,
/// already-compressed bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub encounter: EncounterExport,
    pub engine_version: &'static str,
    pub opaque_bytes: Vec<u8>,
}

impl Recording {
    #[must_use]
    pub const fn end_time(&self) -> DateTime<Utc> {
        self.encounter.end_time
    }
}

/// Append-only list bounded at a fixed capacity; the oldest entry is
/// dropped before each insert once the store is full.
#[derive(Debug, Clone)]
pub struct RecordingStore {
    capacity: usize,
    recordings: Vec<Recording>,
}

impl RecordingStore {
    /// # Panics
    ///
    /// Panics if `capacity` is zero — a store that can hold nothing is a
    /// configuration error, not a runtime state to route through `Result`
    /// (callers validate via [`crate::config::EngineConfig::validated`]
    /// first).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RecordingStore capacity must be non-zero");
        Self {
            capacity,
            recordings: Vec::with_capacity(capacity),
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.recordings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recordings.is_empty()
    }

    /// Oldest-to-newest view of everything currently retained.
    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = &Recording> {
        self.recordings.iter()
    }

    /// Appends `recording`, dropping the oldest entry first if the store is
    /// already at capacity.
    pub fn insert(&mut self, recording: Recording) {
        if self.recordings.len() >= self.capacity {
            self.recordings.remove(0);
        }
        self.recordings.push(recording);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::EncounterPayload;
    use chrono::TimeZone;

    fn recording(id: u64, end_secs: i64) -> Recording {
        Recording {
            encounter: EncounterExport {
                payload: EncounterPayload::Raid {
                    encounter_id: id,
                    name: format!("boss-{id}"),
                    difficulty: "Heroic".to_string(),
                    group_size: 20,
                },
                start_time: Utc.timestamp_opt(0, 0).unwrap(),
                end_time: Utc.timestamp_opt(end_secs, 0).unwrap(),
                success: Some(true),
            },
            engine_version: "test",
            opaque_bytes: vec![1, 2, 3],
        }
    }

    #[test]
    fn retains_only_the_most_recent_n_in_insertion_order() {
        let mut store = RecordingStore::new(3);
        for i in 1..=4 {
            store.insert(recording(i, i as i64));
        }
        assert_eq!(store.len(), 3);
        let ids: Vec<_> = store
            .iter()
            .map(|r| match &r.encounter.payload {
                EncounterPayload::Raid { encounter_id, .. } => *encounter_id,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(ids, vec![2, 3, 4]);
    }

    #[test]
    fn under_capacity_keeps_everything() {
        let mut store = RecordingStore::new(5);
        store.insert(recording(1, 1));
        store.insert(recording(2, 2));
        assert_eq!(store.len(), 2);
    }
}
