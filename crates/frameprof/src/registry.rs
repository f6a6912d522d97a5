//! Owns every [`ScriptTracker`] for the life of the engine, the bin-vector
//! pool they draw on, and the two identity schemes a tracker can be reached
//! by: a host-frame slot (for script-on-frame callables) and a plain string
//! key (for everything else).
//!
//! This module keeps the split the design notes (§9) call for explicit: one
//! registration scheme per kind of callable, one tracker type underneath
//! both.

use std::collections::HashMap;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::debug;

use crate::bin_pool::BinPool;
use crate::sketch_params::SketchParams;
use crate::tracker::{ScriptTracker, TrackerExport};

/// Opaque handle for a host-frame object, assigned by the host-instrumentation
/// collaborator (out of scope here — see §1). Typically a stable numeric id
/// the host mints per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// Which script slot on a frame a tracker corresponds to. The exact set of
/// kinds is a host-instrumentation concern; this enumerates the common ones
/// and leaves room for the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptType {
    OnUpdate,
    OnEvent,
    OnShow,
    OnHide,
    OnClick,
    OnLoad,
    /// Host-defined script kind not covered above, carrying an opaque
    /// discriminant assigned by the instrumentation layer.
    Other(u16),
}

/// Which export group a tracker is placed into, matching the two top-level
/// keys of the snapshot (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerGroup {
    /// Host-frame scripts (`scripts` in the exported snapshot).
    Scripts,
    /// Callables not attached to a host frame — library methods, timers
    /// (`externals` in the exported snapshot).
    Externals,
}

/// Opaque internal identifier for a tracker, stable for the life of the
/// engine. Not to be confused with the identity *strings* the host
/// collaborator assigns for export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackerId(usize);

/// Error surfaced by [`TrackerRegistry::register`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("identity {key:?} already registered to a different tracker in {group:?}")]
    IdentityCollision { key: String, group: TrackerGroup },
}

/// Owns the tracker arena, the frame-slot and name lookup tables, the two
/// export groups, and the bin-vector pool every sketch draws on.
#[derive(Debug)]
pub struct TrackerRegistry {
    params: SketchParams,
    outlier_capacity: usize,
    pool: BinPool,
    trackers: Vec<ScriptTracker>,
    by_slot: HashMap<(FrameHandle, ScriptType), TrackerId>,
    by_name: HashMap<String, TrackerId>,
    scripts: IndexMap<String, TrackerId>,
    externals: IndexMap<String, TrackerId>,
    render_delay: TrackerId,
}

impl TrackerRegistry {
    #[must_use]
    pub fn new(params: SketchParams, outlier_capacity: usize, pool: BinPool, frame_index: u64) -> Self {
        let mut trackers = Vec::new();
        let render_delay = TrackerId(trackers.len());
        trackers.push(ScriptTracker::new(params, outlier_capacity, false, frame_index));

        Self {
            params,
            outlier_capacity,
            pool,
            trackers,
            by_slot: HashMap::new(),
            by_name: HashMap::new(),
            scripts: IndexMap::new(),
            externals: IndexMap::new(),
            render_delay,
        }
    }

    #[must_use]
    pub const fn render_delay_id(&self) -> TrackerId {
        self.render_delay
    }

    /// Sketch parameters shared by every tracker this registry owns,
    /// embedded verbatim into every snapshot (§6).
    #[must_use]
    pub const fn params(&self) -> &SketchParams {
        &self.params
    }

    fn alloc_tracker(&mut self, dependent: bool, frame_index: u64) -> TrackerId {
        let id = TrackerId(self.trackers.len());
        self.trackers
            .push(ScriptTracker::new(self.params, self.outlier_capacity, dependent, frame_index));
        id
    }

    /// Returns (creating on first call) the tracker for the given host-frame
    /// slot. Subsequent calls for the same `(handle, script_type)` pair
    /// always return the same tracker, even across `SetScript` rebindings
    /// with a distinct lambda identity (§4.5, §9 open question — confirmed
    /// intentional).
    pub fn get_frame_tracker(&mut self, handle: FrameHandle, script_type: ScriptType, frame_index: u64) -> TrackerId {
        if let Some(&id) = self.by_slot.get(&(handle, script_type)) {
            return id;
        }
        let id = self.alloc_tracker(false, frame_index);
        self.by_slot.insert((handle, script_type), id);
        id
    }

    /// Returns (creating on first call) the tracker for a plain string key,
    /// tagging it with `dependent` the first time it is created. Subsequent
    /// calls ignore `dependent` and return the existing tracker.
    pub fn get_named_tracker(&mut self, key: &str, dependent: bool, frame_index: u64) -> TrackerId {
        if let Some(&id) = self.by_name.get(key) {
            return id;
        }
        let id = self.alloc_tracker(dependent, frame_index);
        self.by_name.insert(key.to_string(), id);
        id
    }

    /// Places `id` in `group` under `key`. Re-registering the same tracker
    /// under a key it already owns is idempotent; registering a *different*
    /// tracker under a key already taken is an [`RegistryError::IdentityCollision`] —
    /// the core refuses to overwrite (§7).
    pub fn register(&mut self, key: impl Into<String>, id: TrackerId, group: TrackerGroup) -> Result<(), RegistryError> {
        let key = key.into();
        let map = match group {
            TrackerGroup::Scripts => &mut self.scripts,
            TrackerGroup::Externals => &mut self.externals,
        };
        if let Some(&existing) = map.get(&key) {
            if existing == id {
                return Ok(());
            }
            debug!(%key, ?group, "identity collision, registration refused");
            return Err(RegistryError::IdentityCollision { key, group });
        }
        map.insert(key, id);
        Ok(())
    }

    /// Convenience: looks up or creates the frame-slot tracker and registers
    /// it under `identity` in the `scripts` group in one call.
    pub fn register_frame_tracker(
        &mut self,
        handle: FrameHandle,
        script_type: ScriptType,
        identity: impl Into<String>,
        frame_index: u64,
    ) -> Result<TrackerId, RegistryError> {
        let id = self.get_frame_tracker(handle, script_type, frame_index);
        self.register(identity, id, TrackerGroup::Scripts)?;
        Ok(id)
    }

    /// Convenience: looks up or creates the named tracker and registers it
    /// under `key` in `group` in one call.
    pub fn register_named_tracker(
        &mut self,
        key: impl Into<String>,
        dependent: bool,
        group: TrackerGroup,
        frame_index: u64,
    ) -> Result<TrackerId, RegistryError> {
        let key = key.into();
        let id = self.get_named_tracker(&key, dependent, frame_index);
        self.register(key, id, group)?;
        Ok(id)
    }

    /// Forwards `delta_ms` into the tracker's pending frame total. The
    /// caller (the [`crate::engine::Engine`]) is responsible for the
    /// encounter-active gate; this never checks it itself, keeping the
    /// per-call cost to an index and a couple of adds.
    pub fn record(&mut self, id: TrackerId, delta_ms: f64, frame_index: u64) {
        self.trackers[id.0].record(delta_ms, frame_index, &mut self.pool);
    }

    /// Flushes and exports every tracker in `scripts` and `externals`,
    /// keyed by their registered identity strings, plus the distinguished
    /// render-delay tracker.
    pub fn export_all(&mut self) -> (TrackerExport, IndexMap<String, TrackerExport>, IndexMap<String, TrackerExport>) {
        let render_delay = self.trackers[self.render_delay.0].export(&mut self.pool);
        let scripts = self
            .scripts
            .iter()
            .map(|(key, &id)| (key.clone(), self.trackers[id.0].export(&mut self.pool)))
            .collect();
        let externals = self
            .externals
            .iter()
            .map(|(key, &id)| (key.clone(), self.trackers[id.0].export(&mut self.pool)))
            .collect();
        (render_delay, scripts, externals)
    }

    /// Resets every tracker currently known to the registry, re-pinning
    /// each to `frame_index`. Called on every encounter boundary (§4.6).
    pub fn reset_all(&mut self, frame_index: u64) {
        for tracker in &mut self.trackers {
            tracker.reset(frame_index);
        }
        self.pool.reset_exhaustion_log();
    }

    #[must_use]
    pub fn tracker_count(&self) -> usize {
        self.trackers.len()
    }
}
