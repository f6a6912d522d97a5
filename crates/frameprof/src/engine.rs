//! The orchestrator: owns the frame clock, the tracker registry, the
//! encounter lifecycle, and the deferred snapshot scheduler, and is the one
//! type the embedding host talks to (§2, §6).

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::bin_pool::BinPool;
use crate::clock::FrameClock;
use crate::codec::SnapshotCodec;
use crate::config::EngineConfig;
use crate::encounter::{
    EncounterLifecycle, EncounterVariant, MythicPlusInfo, RaidInfo, StartOutcome, StopOutcome,
};
use crate::registry::{FrameHandle, RegistryError, ScriptType, TrackerGroup, TrackerId, TrackerRegistry};
use crate::scheduler::{SnapshotScheduler, TickOutcome};
use crate::sketch_params::SketchParams;
use crate::snapshot::{EncounterExport, Snapshot};
use crate::store::RecordingStore;

/// The measurement engine's single public entry point.
///
/// `Engine` is not `Sync`/shared across threads by design (§5: single host
/// thread drives every call); all of its methods take `&mut self`.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    clock: FrameClock,
    registry: TrackerRegistry,
    lifecycle: EncounterLifecycle,
    scheduler: SnapshotScheduler,
    store: RecordingStore,
}

impl Engine {
    /// Builds an engine from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns the [`crate::config::ConfigError`] from [`EngineConfig::validated`]
    /// if `config` is malformed; the engine never constructs itself from an
    /// invalid configuration.
    pub fn new(config: EngineConfig) -> Result<Self, crate::config::ConfigError> {
        let config = config.validated()?;
        let params = SketchParams::new(config.alpha);
        let bin_capacity = params.bin_capacity_for(config.max_observed_ms);
        let pool = BinPool::new(bin_capacity, config.pool_size);
        let registry = TrackerRegistry::new(params, config.outlier_capacity, pool, 0);
        let store = RecordingStore::new(config.retention_capacity);
        Ok(Self {
            config,
            clock: FrameClock::new(),
            registry,
            lifecycle: EncounterLifecycle::new(),
            scheduler: SnapshotScheduler::new(),
            store,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn frame_index(&self) -> u64 {
        self.clock.current()
    }

    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.lifecycle.is_active()
    }

    #[must_use]
    pub fn store(&self) -> &RecordingStore {
        &self.store
    }

    // -- host-frame lifecycle --------------------------------------------

    /// Per-render tick: advances the frame clock and records `elapsed_ms`
    /// into the distinguished render-delay tracker (§4.5, §6).
    ///
    /// `elapsed_ms` must already be in milliseconds; a host that reports
    /// seconds scales before calling this.
    pub fn on_render(&mut self, elapsed_ms: f64) {
        let frame_index = self.clock.advance();
        if self.lifecycle.is_active() {
            let id = self.registry.render_delay_id();
            self.registry.record(id, elapsed_ms, frame_index);
        }
    }

    // -- tracker registration ---------------------------------------------

    /// Looks up or creates the tracker for a host-frame script slot and
    /// registers it under `identity` in the `scripts` export group.
    ///
    /// # Errors
    ///
    /// [`RegistryError::IdentityCollision`] if `identity` is already owned
    /// by a different tracker.
    pub fn register_frame_tracker(
        &mut self,
        handle: FrameHandle,
        script_type: ScriptType,
        identity: impl Into<String>,
    ) -> Result<TrackerId, RegistryError> {
        self.registry.register_frame_tracker(handle, script_type, identity, self.clock.current())
    }

    /// Looks up or creates a named tracker (library method, timer, …) and
    /// registers it under `key` in `group`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::IdentityCollision`] if `key` is already owned by a
    /// different tracker.
    pub fn register_named_tracker(
        &mut self,
        key: impl Into<String>,
        dependent: bool,
        group: TrackerGroup,
    ) -> Result<TrackerId, RegistryError> {
        self.registry.register_named_tracker(key, dependent, group, self.clock.current())
    }

    // -- hot path -----------------------------------------------------------

    /// Forwards `delta_ms` into `tracker`'s pending frame total.
    ///
    /// A no-op while no encounter is active (§4.4 "Gating"); the gate is
    /// read once, here, and never inside the registry/tracker so the
    /// inactive case costs a single branch.
    pub fn record(&mut self, tracker: TrackerId, delta_ms: f64) {
        if !self.lifecycle.is_active() {
            return;
        }
        self.registry.record(tracker, delta_ms, self.clock.current());
    }

    // -- encounter lifecycle -------------------------------------------------

    pub fn start_raid(&mut self, info: RaidInfo, now: DateTime<Utc>) -> StartOutcome {
        self.lifecycle.start_raid(info, now)
    }

    pub fn start_mythicplus(&mut self, info: MythicPlusInfo, now: DateTime<Utc>) -> StartOutcome {
        self.lifecycle.start_mythicplus(info, now)
    }

    pub fn start_manual(&mut self, now: DateTime<Utc>) -> StartOutcome {
        self.lifecycle.start_manual(now)
    }

    /// Stops the active raid encounter, if one is active, building and
    /// queuing its snapshot for deferred write-back (§4.6).
    pub fn stop_raid(&mut self, now: DateTime<Utc>, success: Option<bool>) -> StopOutcome {
        self.stop(EncounterVariant::Raid, now, success)
    }

    pub fn stop_mythicplus(&mut self, now: DateTime<Utc>, success: Option<bool>) -> StopOutcome {
        self.stop(EncounterVariant::MythicPlus, now, success)
    }

    pub fn stop_manual(&mut self, now: DateTime<Utc>) -> StopOutcome {
        self.stop(EncounterVariant::Manual, now, None)
    }

    fn stop(&mut self, variant: EncounterVariant, now: DateTime<Utc>, success: Option<bool>) -> StopOutcome {
        let outcome = self.lifecycle.stop(variant, now, success);
        if let StopOutcome::Closed(metadata) = &outcome {
            let (render_delay, scripts, externals) = self.registry.export_all();
            let snapshot = Snapshot {
                encounter: EncounterExport {
                    payload: metadata.kind.clone().into(),
                    start_time: metadata.start_time,
                    end_time: metadata.end_time,
                    success: metadata.success,
                },
                render_delay,
                scripts,
                externals,
                sketch_params: *self.registry.params(),
            };
            debug!(variant = ?variant, "encounter closed, snapshot queued for deferred write-back");
            self.scheduler.enqueue(snapshot, self.config.engine_version);
            self.registry.reset_all(self.clock.current());
            self.lifecycle.finish_close();
        }
        outcome
    }

    // -- deferred snapshot write-back ----------------------------------------

    /// Drives one snapshot-scheduler tick (§4.6, §5: "≈1-Hz deferred
    /// ticker"). The host calls this on its own timer, independent of the
    /// render loop; it is never invoked from `on_render`.
    pub fn tick_snapshot_scheduler(&mut self, in_combat: bool, codec: &dyn SnapshotCodec) -> TickOutcome {
        self.scheduler.tick(in_combat, codec, &mut self.store)
    }

    #[must_use]
    pub const fn snapshot_pending(&self) -> bool {
        self.scheduler.has_pending()
    }
}
