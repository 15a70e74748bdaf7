//! Spatial index error types.

use geom::Envelope;
use thiserror::Error;

/// Errors that can occur while mutating the index.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// The caller handed an envelope whose extents are inverted. This is a
    /// programmer error and is never retried.
    #[error("Envelope has inverted extents: {0:?}")]
    InvertedEnvelope(Envelope),
}
