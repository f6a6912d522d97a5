//! Allocation-free per-render CPU profiling core for a single-threaded
//! hard-real-time embedding host.
//!
//! This crate is the measurement engine only: it tracks how much wall-clock
//! time each instrumented callable consumes per render cycle and summarizes
//! the resulting distribution, but it does not decide which callables to
//! wrap, does not compute their identity strings, does not serialize or
//! compress anything, and does not render a viewer. Those are host
//! collaborators — see [`codec`] and [`scheduler::SnapshotSink`] for the
//! seams they plug into.
//!
//! The one type hosts embed is [`engine::Engine`]; everything else is a
//! building block it composes.

#![forbid(unsafe_code)]

pub mod bin_pool;
pub mod clock;
pub mod codec;
pub mod config;
pub mod encounter;
pub mod engine;
pub mod registry;
pub mod scheduler;
pub mod sketch;
pub mod sketch_params;
pub mod snapshot;
pub mod store;
pub mod topk;
pub mod tracker;

pub use codec::{CodecError, JsonCodec, SnapshotCodec};
pub use config::{ConfigError, EngineConfig};
pub use encounter::{
    EncounterKind, EncounterMetadata, EncounterVariant, MythicPlusInfo, RaidInfo, StartOutcome,
    StopOutcome,
};
pub use engine::Engine;
pub use registry::{FrameHandle, RegistryError, ScriptType, TrackerGroup, TrackerId};
pub use scheduler::{SinkError, SnapshotScheduler, SnapshotSink, TickOutcome};
pub use sketch::{SketchExport, TieredSketch};
pub use sketch_params::SketchParams;
pub use snapshot::{EncounterExport, EncounterPayload, Snapshot};
pub use store::{Recording, RecordingStore};
pub use topk::{TopK, TopKPush};
pub use tracker::{ScriptTracker, TrackerExport};
