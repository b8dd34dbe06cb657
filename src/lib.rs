//! Dynamic texture-atlas cache with online bin packing and
//! approximate-LRU eviction.
//!
//! Renders many short-lived bitmapped items (e.g. rasterized text
//! strings) into a small number of GPU-backed images, amortizing
//! rasterization and upload cost. The cache core is renderer-agnostic:
//! the rasterizer, the GPU texture, and the windowing layer are supplied
//! through the [`AtlasDevice`] trait.
//!
//! - [`RectPacker`]: shelf bin packing over one growable backing store,
//!   with removal, compaction, and fragmentation inspection.
//! - [`AtlasCache`]: key → region map, rasterize-on-miss, periodic clock
//!   sweeps, transparent content migration across store generations.
//!
//! Single logical rendering thread assumed; no internal locking.

#![deny(unsafe_code)]

pub mod cache;
pub mod device;
pub mod error;
pub mod geom;
pub mod packer;
pub mod session;
pub mod token;

pub use cache::{AtlasCache, CacheConfig};
pub use device::AtlasDevice;
pub use error::AtlasError;
pub use geom::{Bounds, Point, Rect, Size};
pub use packer::{RectId, RectPacker};
pub use session::SessionMode;
pub use token::{Token, tokenize};
