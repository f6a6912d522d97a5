//! Serialization/compression seam (§1: "the serialization codec and
//! compression" is explicitly an external collaborator). The core only
//! depends on the [`SnapshotCodec`] trait; a concrete implementation
//! (JSON, a binary format, whatever compression scheme the viewer expects)
//! is supplied by the embedding host.

use thiserror::Error;

use crate::snapshot::Snapshot;

/// Failure surfaced by a [`SnapshotCodec`] implementation.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to serialize snapshot: {0}")]
    Serialize(String),
    #[error("failed to compress snapshot: {0}")]
    Compress(String),
}

/// Turns a [`Snapshot`] into the opaque bytes a [`crate::store::Recording`]
/// carries. Implementations are expected to serialize then compress; the
/// core does not care which formats are used, only that the result is a
/// flat byte buffer.
pub trait SnapshotCodec {
    /// Encodes `snapshot`. Called off the hot path, by the scheduler's
    /// deferred ticker (§4.6, §5).
    fn encode(&self, snapshot: &Snapshot) -> Result<Vec<u8>, CodecError>;
}

/// A [`SnapshotCodec`] backed by uncompressed JSON, useful for tests and as
/// a reference implementation; production hosts typically supply one that
/// also deflates the payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl SnapshotCodec for JsonCodec {
    fn encode(&self, snapshot: &Snapshot) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(snapshot).map_err(|e| CodecError::Serialize(e.to_string()))
    }
}
