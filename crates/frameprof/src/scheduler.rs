//! Deferred snapshot write-back (§4.6, §9: "model as a small, explicit
//! scheduler with one pending task per encounter close. Do not spawn
//! threads.").
//!
//! The engine never serializes a snapshot synchronously when an encounter
//! closes — that can breach the host's per-call time budget (§4.6). Instead
//! the closed snapshot is parked here, and the host drives a tick roughly
//! once a second; each tick either writes it out (if the host reports combat
//! has ended) or leaves it pending for the next tick.

use thiserror::Error;
use tracing::warn;

use crate::codec::{CodecError, SnapshotCodec};
use crate::snapshot::Snapshot;
use crate::store::{Recording, RecordingStore};

/// Failure surfaced by the external persistence collaborator a [`SnapshotScheduler`]
/// hands encoded bytes to. Opaque to the core, matching [`CodecError`] (§11).
#[derive(Debug, Error)]
#[error("failed to persist recording: {0}")]
pub struct SinkError(pub String);

/// Where a scheduler tick hands the bytes a [`SnapshotCodec`] produced.
/// Implementations append to durable storage; the in-process
/// [`RecordingStore`] itself implements this so tests and small hosts can
/// skip a real backing store entirely.
pub trait SnapshotSink {
    fn persist(&mut self, recording: Recording) -> Result<(), SinkError>;
}

impl SnapshotSink for RecordingStore {
    fn persist(&mut self, recording: Recording) -> Result<(), SinkError> {
        self.insert(recording);
        Ok(())
    }
}

/// Outcome of one [`SnapshotScheduler::tick`] call, useful mostly for tests
/// and diagnostics — the engine does not otherwise branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing was pending.
    Idle,
    /// A snapshot was pending but the host reported combat in progress
    /// (§7 `SnapshotDeferred`); rescheduled silently.
    Deferred,
    /// The pending snapshot was encoded and handed to the sink successfully;
    /// the scheduler has no more pending work.
    Written,
    /// Encoding or persistence failed; the recording is dropped and the
    /// scheduler has no more pending work (§7 `SnapshotFailed`).
    Failed,
}

/// One pending snapshot, queued when an encounter closes, drained by
/// [`SnapshotScheduler::tick`].
#[derive(Debug)]
struct Pending {
    snapshot: Snapshot,
    engine_version: &'static str,
}

/// Holds at most one pending snapshot at a time and retries its write-back
/// on each host-driven tick until it either succeeds or fails once.
///
/// The ticker is "self-cancelling": a tick always clears `pending` before
/// attempting to encode/persist, so a failing collaborator cannot loop
/// (§5 "Cancellation / timeouts").
#[derive(Debug, Default)]
pub struct SnapshotScheduler {
    pending: Option<Pending>,
}

impl SnapshotScheduler {
    #[must_use]
    pub const fn new() -> Self {
        Self { pending: None }
    }

    /// `true` while a snapshot is parked awaiting write-back.
    #[must_use]
    pub const fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Queues `snapshot` for write-back, replacing anything already
    /// pending. The engine only ever calls this once per closed encounter,
    /// since the encounter lifecycle does not allow overlapping closes, but
    /// a later snapshot taking priority over a never-drained earlier one is
    /// the safe behavior if that invariant is ever violated.
    pub fn enqueue(&mut self, snapshot: Snapshot, engine_version: &'static str) {
        self.pending = Some(Pending { snapshot, engine_version });
    }

    /// Drives one scheduler tick (§4.6, §5: "≈1-Hz deferred ticker").
    ///
    /// `in_combat` is the host's current combat-state report; while `true`
    /// the tick defers without touching `codec` or `sink`. Once it is
    /// `false`, the pending snapshot (if any) is cleared immediately and
    /// then encoded and persisted — clearing first means a panic-free
    /// encode/persist failure cannot be retried into a loop.
    pub fn tick(
        &mut self,
        in_combat: bool,
        codec: &dyn SnapshotCodec,
        sink: &mut dyn SnapshotSink,
    ) -> TickOutcome {
        if self.pending.is_none() {
            return TickOutcome::Idle;
        }
        if in_combat {
            return TickOutcome::Deferred;
        }

        let Pending { snapshot, engine_version } = self.pending.take().expect("checked above");

        match encode_and_persist(&snapshot, engine_version, codec, sink) {
            Ok(()) => TickOutcome::Written,
            Err(reason) => {
                warn!(%reason, "snapshot write-back failed, recording dropped");
                TickOutcome::Failed
            }
        }
    }
}

fn encode_and_persist(
    snapshot: &Snapshot,
    engine_version: &'static str,
    codec: &dyn SnapshotCodec,
    sink: &mut dyn SnapshotSink,
) -> Result<(), String> {
    let opaque_bytes = codec.encode(snapshot).map_err(|e: CodecError| e.to_string())?;
    let recording = Recording {
        encounter: snapshot.encounter.clone(),
        engine_version,
        opaque_bytes,
    };
    sink.persist(recording).map_err(|e| e.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use crate::snapshot::{EncounterExport, EncounterPayload};
    use crate::sketch::SketchExport;
    use crate::sketch_params::SketchParams;
    use crate::tracker::TrackerExport;
    use chrono::{TimeZone, Utc};
    use indexmap::IndexMap;

    fn snapshot() -> Snapshot {
        Snapshot {
            encounter: EncounterExport {
                payload: EncounterPayload::Manual,
                start_time: Utc.timestamp_opt(0, 0).unwrap(),
                end_time: Utc.timestamp_opt(1, 0).unwrap(),
                success: None,
            },
            render_delay: TrackerExport {
                commits: 0,
                calls: 0,
                total_time: 0.0,
                sketch: SketchExport::default(),
                dependent: false,
            },
            scripts: IndexMap::new(),
            externals: IndexMap::new(),
            sketch_params: SketchParams::new(0.05),
        }
    }

    #[test]
    fn idle_with_nothing_pending() {
        let mut scheduler = SnapshotScheduler::new();
        let mut store = RecordingStore::new(4);
        assert_eq!(scheduler.tick(false, &JsonCodec, &mut store), TickOutcome::Idle);
    }

    #[test]
    fn defers_while_in_combat_and_leaves_the_snapshot_pending() {
        let mut scheduler = SnapshotScheduler::new();
        scheduler.enqueue(snapshot(), "test-1.0.0");
        let mut store = RecordingStore::new(4);
        for _ in 0..5 {
            assert_eq!(scheduler.tick(true, &JsonCodec, &mut store), TickOutcome::Deferred);
            assert!(scheduler.has_pending());
        }
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn writes_once_combat_ends_and_cancels_itself() {
        let mut scheduler = SnapshotScheduler::new();
        scheduler.enqueue(snapshot(), "test-1.0.0");
        let mut store = RecordingStore::new(4);
        assert_eq!(scheduler.tick(false, &JsonCodec, &mut store), TickOutcome::Written);
        assert!(!scheduler.has_pending());
        assert_eq!(store.len(), 1);

        // Ticking again with nothing pending is a no-op, not a re-write.
        assert_eq!(scheduler.tick(false, &JsonCodec, &mut store), TickOutcome::Idle);
        assert_eq!(store.len(), 1);
    }

    struct FailingCodec;
    impl SnapshotCodec for FailingCodec {
        fn encode(&self, _snapshot: &Snapshot) -> Result<Vec<u8>, CodecError> {
            Err(CodecError::Serialize("boom".to_string()))
        }
    }

    #[test]
    fn a_failing_codec_drops_the_recording_after_exactly_one_attempt() {
        let mut scheduler = SnapshotScheduler::new();
        scheduler.enqueue(snapshot(), "test-1.0.0");
        let mut store = RecordingStore::new(4);
        assert_eq!(scheduler.tick(false, &FailingCodec, &mut store), TickOutcome::Failed);
        assert!(!scheduler.has_pending());
        assert_eq!(store.len(), 0);

        // No retry: the next tick is idle, not another failed attempt.
        assert_eq!(scheduler.tick(false, &FailingCodec, &mut store), TickOutcome::Idle);
    }
}
