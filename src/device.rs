//! Collaborator contract between the cache core and the embedding renderer.
//!
//! The cache never talks to the GPU, the rasterizer, or the windowing
//! layer directly. Everything it needs is expressed as one trait, chosen
//! once at construction. Implementations are expected to be cheap
//! dispatch shims over the real renderer.
//!
//! Handle discipline: `Store` values identify one backing-store
//! *generation*. Any operation that can grow or compact the atlas replaces
//! the generation, so callers must re-fetch the current handle (e.g. via
//! [`crate::AtlasCache::current_store`]) rather than caching one across
//! such calls.

use crate::error::AtlasError;
use crate::geom::{Bounds, Rect, Size};
use crate::session::SessionMode;

/// Services the atlas core consumes from its owner.
pub trait AtlasDevice {
    /// Opaque handle to one backing-store generation.
    type Store: Copy;

    /// Allocate a pixel surface of the given size and its GPU-side
    /// representation.
    fn allocate_backing_store(&mut self, width: u32, height: u32) -> Self::Store;

    /// Release a surface. Called after migration completes; no live
    /// rectangle references `store` at this point.
    fn delete_backing_store(&mut self, store: Self::Store);

    /// Invoked before each growth attempt for the rectangle that caused
    /// it. Return `true` if space was freed and a retry is worthwhile.
    fn pre_expand(&mut self, _cause: Size, _attempt: u32) -> bool {
        false
    }

    /// Last-resort notification after growth is exhausted, immediately
    /// before the insertion fails with [`AtlasError::Capacity`].
    fn addition_failed(&mut self, _cause: Size, _attempt: u32) {}

    /// Migration is starting from `old` to `new`. If a draw session is
    /// open it has already been suspended; acquire whatever 2D surface
    /// state the copies below require.
    fn begin_movement(&mut self, old: Self::Store, new: Self::Store);

    /// Copy `from` in `old` to `to` in `new`. `from.w == to.w` and
    /// `from.h == to.h`. When `old` and `new` identify the same surface
    /// this is an in-place block copy; destination pixels must equal the
    /// source pixels as they were before the call.
    fn move_region(&mut self, old: Self::Store, from: Rect, new: Self::Store, to: Rect);

    /// Migration finished; release any state acquired in
    /// [`Self::begin_movement`]. The suspended session (if any) is
    /// re-opened right after this returns.
    fn end_movement(&mut self, old: Self::Store, new: Self::Store);

    /// Fill a region with fully transparent pixels before rasterization.
    fn clear_region(&mut self, store: Self::Store, bounds: Rect);

    /// Record that a region needs a GPU sync before the next draw. The
    /// upload itself is deferred to the owner's next sync point.
    fn mark_dirty(&mut self, store: Self::Store, bounds: Rect);

    /// Measure a content item's tight inked bounds relative to its
    /// logical anchor point, without drawing anything.
    fn measure(&mut self, content: &str) -> Result<Bounds, AtlasError>;

    /// Rasterize a content item into `store` with its anchor at `(x, y)`.
    /// The destination region has already been cleared.
    fn paint(&mut self, content: &str, store: Self::Store, x: i32, y: i32) -> Result<(), AtlasError>;

    /// Emit a textured quad for `src` within `store`, with its top-left
    /// at `(x, y)` in output coordinates and its extent scaled by `scale`.
    fn draw_quad(&mut self, store: Self::Store, src: Rect, x: f32, y: f32, scale: f32);

    /// Configure the rendering surface for an opening session.
    fn enter_session(&mut self, mode: SessionMode, width: u32, height: u32);

    /// Restore whatever state [`Self::enter_session`] replaced.
    fn leave_session(&mut self);

    /// The pending paint color changed (also re-sent after a migration
    /// resumes a suspended session).
    fn set_paint_color(&mut self, _rgba: [f32; 4]) {}
}
