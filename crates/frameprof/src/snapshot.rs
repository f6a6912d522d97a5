//! Value-semantic snapshot built when an encounter closes, handed to the
//! external storage collaborator by way of [`crate::codec::SnapshotCodec`]
//! and [`crate::store::RecordingStore`] (§6).

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::encounter::{EncounterKind, EncounterVariant};
use crate::sketch_params::SketchParams;
use crate::tracker::TrackerExport;

/// Serializable form of [`EncounterKind`]. `kind`/`map_id`/`encounter_id` and
/// friends are flattened into one object rather than left as a Rust enum so
/// the exported shape matches §6's `encounter := { kind, start_time,
/// end_time, success?, … }` literally.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EncounterPayload {
    Raid {
        encounter_id: u64,
        name: String,
        difficulty: String,
        group_size: u32,
    },
    #[serde(rename = "mythicplus")]
    MythicPlus { map_id: u64 },
    Manual,
}

impl From<EncounterKind> for EncounterPayload {
    fn from(kind: EncounterKind) -> Self {
        match kind {
            EncounterKind::Raid(info) => Self::Raid {
                encounter_id: info.encounter_id,
                name: info.name,
                difficulty: info.difficulty,
                group_size: info.group_size,
            },
            EncounterKind::MythicPlus(info) => Self::MythicPlus { map_id: info.map_id },
            EncounterKind::Manual => Self::Manual,
        }
    }
}

/// Exported encounter metadata, embedded at the top of a [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncounterExport {
    #[serde(flatten)]
    pub payload: EncounterPayload,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub success: Option<bool>,
}

/// The value built when an encounter closes and handed to the codec/store
/// collaborators (§4.6, §6).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub encounter: EncounterExport,
    pub render_delay: TrackerExport,
    pub scripts: IndexMap<String, TrackerExport>,
    pub externals: IndexMap<String, TrackerExport>,
    pub sketch_params: SketchParams,
}

impl Snapshot {
    #[must_use]
    pub fn encounter_variant(&self) -> EncounterVariant {
        match &self.encounter.payload {
            EncounterPayload::Raid { .. } => EncounterVariant::Raid,
            EncounterPayload::MythicPlus { .. } => EncounterVariant::MythicPlus,
            EncounterPayload::Manual => EncounterVariant::Manual,
        }
    }
}
