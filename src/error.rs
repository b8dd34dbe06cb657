//! Error taxonomy for cache and packer operations.
//!
//! Everything except `SessionState` is an expected, recoverable condition:
//! the caller falls back to an uncached render (or skips the one item) and
//! the cache's invariants still hold. `SessionState` signals protocol
//! misuse by the caller.

use thiserror::Error;

/// Errors surfaced by [`crate::AtlasCache`] and [`crate::RectPacker`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AtlasError {
    /// A single item is larger than the configured maximum atlas size.
    /// The caller should render it uncached.
    #[error("item {width}x{height} exceeds maximum atlas size {max_width}x{max_height}")]
    Oversize {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },

    /// The atlas is exhausted even after growth and eviction attempts.
    /// The caller should render uncached or raise the maximum size.
    #[error("atlas capacity exhausted after {attempts} growth attempts")]
    Capacity { attempts: u32 },

    /// Rasterization of one content item failed. Only that item is
    /// affected; no cache entry is left behind for it.
    #[error("rasterization failed: {reason}")]
    Rasterize { reason: String },

    /// Session bracket protocol misuse (nested open, close while closed).
    /// A programming error in the caller; fatal to the call, not the
    /// process.
    #[error("session protocol violation: {0}")]
    SessionState(&'static str),
}

impl AtlasError {
    /// Whether the caller is expected to recover from this error
    /// (everything except protocol misuse).
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::SessionState(_))
    }
}
