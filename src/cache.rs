//! Content-addressed atlas cache with approximate-LRU eviction.
//!
//! Maps content keys to packed, rasterized regions of a growable texture
//! atlas. Misses are rasterized once and reused until an eviction sweep
//! reclaims them; sweeps run every `sweep_interval` completed render
//! sessions and evict every entry not drawn since the previous sweep
//! (a clock scheme: one `used` bit, no per-access ordering).

use std::collections::HashMap;

use crate::device::AtlasDevice;
use crate::error::AtlasError;
use crate::geom::{Bounds, Point, Rect, Size};
use crate::packer::{RectId, RectPacker};
use crate::session::{SessionBracket, SessionMode};
use crate::token::{Token, tokenize};

/// Constructor-time policy knobs. No global state: hardware limits and
/// debug behavior all arrive through this struct.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheConfig {
    /// First backing-store generation size.
    pub initial_size: Size,
    /// Hard size ceiling, typically the hardware texture limit queried
    /// once per context lifetime.
    pub max_size: Size,
    /// Anti-bleed border added on all sides of each item, in pixels.
    pub padding: u32,
    /// Completed render sessions between eviction sweeps.
    pub sweep_interval: u64,
    /// Vertical fragmentation ratio above which a sweep that evicted
    /// something also compacts.
    pub frag_threshold: f32,
    /// Key separator for tokenization; `None` disables it.
    pub separator: Option<char>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            initial_size: Size::new(256, 256),
            max_size: Size::new(2048, 2048),
            padding: 1,
            sweep_interval: 100,
            frag_threshold: 0.7,
            separator: None,
        }
    }
}

/// Per-entry payload stored in the packer.
#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    /// Offset from the rect's top-left where the content anchor lands
    /// (includes the anti-bleed padding).
    origin: Point,
    /// Horizontal cursor advance for this piece, unscaled.
    advance: u32,
    /// Clock-sweep mark: set on every hit, cleared by the sweep.
    used: bool,
}

/// Result of caching one piece: either a packed region or nothing to
/// rasterize (blank content still advances the cursor).
enum Placed {
    Cached(RectId),
    Empty { advance: u32 },
}

/// Texture-atlas cache for rasterized content items.
///
/// Owns its device, packer, and key map outright. A single logical
/// rendering thread is assumed; nothing here locks.
pub struct AtlasCache<D: AtlasDevice> {
    device: D,
    packer: RectPacker<D::Store, CacheEntry>,
    entries: HashMap<String, RectId>,
    session: SessionBracket,
    color: [f32; 4],
    sessions_completed: u64,
    sep_advance: Option<u32>,
    padding: u32,
    sweep_interval: u64,
    frag_threshold: f32,
    separator: Option<char>,
}

impl<D: AtlasDevice> AtlasCache<D> {
    /// Create a cache over `device` with the given policy.
    pub fn new(device: D, config: CacheConfig) -> Self {
        Self {
            device,
            packer: RectPacker::new(config.initial_size, config.max_size),
            entries: HashMap::new(),
            session: SessionBracket::new(),
            color: [1.0, 1.0, 1.0, 1.0],
            sessions_completed: 0,
            sep_advance: None,
            padding: config.padding,
            sweep_interval: config.sweep_interval.max(1),
            frag_threshold: config.frag_threshold,
            separator: config.separator,
        }
    }

    /// Raise or lower the atlas size ceiling (e.g. once the hardware
    /// limit is known).
    pub fn set_max_size(&mut self, width: u32, height: u32) {
        self.packer.set_max_size(width, height);
    }

    /// Open a render session. Nested opens are protocol errors.
    pub fn begin_session(
        &mut self,
        mode: SessionMode,
        width: u32,
        height: u32,
    ) -> Result<(), AtlasError> {
        self.session.open(mode, width, height)?;
        self.device.enter_session(mode, width, height);
        Ok(())
    }

    /// Close the current session. Every `sweep_interval`-th completed
    /// session triggers an eviction sweep.
    pub fn end_session(&mut self) -> Result<(), AtlasError> {
        self.session.close()?;
        self.device.leave_session();
        self.sessions_completed += 1;
        if self.sessions_completed % self.sweep_interval == 0 {
            self.sweep();
        }
        Ok(())
    }

    /// Whether a session is currently open.
    pub fn session_open(&self) -> bool {
        self.session.is_open()
    }

    /// Draw `key` with its anchor at `(x, y)`, caching any pieces not yet
    /// in the atlas.
    ///
    /// Permitted with the bracket closed (caller-managed 3D projection);
    /// 2D overlay output requires an open `Overlay2D` session. Recoverable
    /// errors (`Oversize`, `Capacity`, `Rasterize`) leave the cache
    /// consistent; the caller should fall back to an uncached render of
    /// this one key.
    pub fn draw(&mut self, key: &str, x: f32, y: f32, scale: f32) -> Result<(), AtlasError> {
        let mut pen = x;
        let mut first = true;
        for token in tokenize(key, self.separator) {
            if !first && self.separator.is_some() {
                pen += self.separator_advance()? as f32 * scale;
            }
            first = false;
            let piece = match token {
                Token::Skip => continue,
                Token::Piece(piece) => piece,
            };

            let id = match self.entries.get(piece).copied() {
                Some(id) => id,
                None => match self.insert_piece(piece)? {
                    Placed::Cached(id) => id,
                    Placed::Empty { advance } => {
                        pen += advance as f32 * scale;
                        continue;
                    }
                },
            };

            let entry = self.packer.payload_mut(id).expect("cached entry has a live rect");
            entry.used = true;
            let (origin, advance) = (entry.origin, entry.advance);
            let rect = self.packer.get(id).expect("cached entry has a live rect");
            // Re-fetched: the miss path above may have replaced the store.
            let store = self.packer.store().expect("store exists once entries do");
            self.device.draw_quad(
                store,
                rect,
                pen - origin.x as f32 * scale,
                y - origin.y as f32 * scale,
                scale,
            );
            pen += advance as f32 * scale;
        }
        Ok(())
    }

    /// Logical content bounds of `key` as if drawn with its anchor at the
    /// origin, unscaled. Idempotent; never caches or marks anything.
    ///
    /// Consistent with what a subsequent [`Self::draw`] occupies: cached
    /// pieces reuse their recorded placement, uncached pieces are
    /// measured directly.
    pub fn bounds(&mut self, key: &str) -> Result<Bounds, AtlasError> {
        let mut pen = 0i32;
        let mut first = true;
        let mut union: Option<(i32, i32, i32, i32)> = None;
        for token in tokenize(key, self.separator) {
            if !first && self.separator.is_some() {
                pen += self.separator_advance()? as i32;
            }
            first = false;
            let piece = match token {
                Token::Skip => continue,
                Token::Piece(piece) => piece,
            };
            let b = match self.entries.get(piece).copied() {
                Some(id) => self.cached_bounds(id),
                None => self.device.measure(piece)?,
            };
            if !b.is_empty() {
                let (left, top) = (pen + b.x, b.y);
                let (right, bottom) = (left + b.w as i32, top + b.h as i32);
                union = Some(match union {
                    None => (left, top, right, bottom),
                    Some((l, t, r, bt)) => (l.min(left), t.min(top), r.max(right), bt.max(bottom)),
                });
            }
            pen += b.w as i32;
        }
        Ok(match union {
            None => Bounds::default(),
            Some((l, t, r, b)) => Bounds::new(l, t, (r - l) as u32, (b - t) as u32),
        })
    }

    /// Evict every entry not drawn since the previous sweep and clear the
    /// mark on the survivors. Compacts afterwards when the sweep evicted
    /// something and fragmentation crossed the configured threshold.
    ///
    /// Runs automatically every `sweep_interval` completed sessions.
    pub fn sweep(&mut self) {
        let packer = &mut self.packer;
        let before = self.entries.len();
        self.entries.retain(|key, id| match packer.payload_mut(*id) {
            Some(entry) if entry.used => {
                entry.used = false;
                true
            }
            _ => {
                log::trace!("atlas: sweep evicting {key:?}");
                packer.remove(*id);
                false
            }
        });
        let evicted = before - self.entries.len();
        if evicted > 0 {
            log::debug!("atlas: sweep evicted {evicted} of {before} entries");
            if self.packer.vertical_fragmentation_ratio() > self.frag_threshold {
                self.compact_now();
            }
        }
    }

    /// Drop every entry and every packed rectangle. The last-resort hook
    /// when even eviction cannot make room.
    pub fn clear_all(&mut self) {
        self.entries.clear();
        self.packer.clear();
    }

    /// Set the pending paint color. Restored automatically when a
    /// migration suspends and resumes an open session.
    pub fn set_color(&mut self, rgba: [f32; 4]) {
        self.color = rgba;
        self.device.set_paint_color(rgba);
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `key` (as a whole piece) is currently cached.
    pub fn contains(&self, piece: &str) -> bool {
        self.entries.contains_key(piece)
    }

    /// Current placement of a cached piece, in backing-store coordinates.
    pub fn lookup(&self, piece: &str) -> Option<Rect> {
        self.packer.get(*self.entries.get(piece)?)
    }

    /// Current backing-store generation. Re-fetch after every call that
    /// can grow or compact; never cache across them.
    pub fn current_store(&self) -> Option<D::Store> {
        self.packer.store()
    }

    /// Completed render sessions so far.
    pub fn sessions_completed(&self) -> u64 {
        self.sessions_completed
    }

    /// Fraction of the atlas's vertical extent that holds no live entry.
    pub fn fragmentation(&self) -> f32 {
        self.packer.vertical_fragmentation_ratio()
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Rasterize and pack one piece, or report it blank.
    fn insert_piece(&mut self, piece: &str) -> Result<Placed, AtlasError> {
        let bounds = self.device.measure(piece)?;
        if bounds.is_empty() {
            return Ok(Placed::Empty { advance: bounds.w });
        }
        log::trace!("atlas: caching {piece:?} ({}x{})", bounds.w, bounds.h);

        let pad = self.padding;
        let entry = CacheEntry {
            origin: Point::new(pad as i32 - bounds.x, pad as i32 - bounds.y),
            advance: bounds.w,
            used: true,
        };
        let id = self.insert_padded(bounds.w + 2 * pad, bounds.h + 2 * pad, entry)?;

        let rect = self.packer.get(id).expect("freshly inserted rect");
        let store = self.packer.store().expect("store exists after insertion");
        self.device.clear_region(store, rect);
        let anchor_x = rect.x as i32 + entry.origin.x;
        let anchor_y = rect.y as i32 + entry.origin.y;
        if let Err(err) = self.device.paint(piece, store, anchor_x, anchor_y) {
            // No dangling rect for content that failed to rasterize.
            self.packer.remove(id);
            return Err(err);
        }
        self.device.mark_dirty(store, rect);
        self.entries.insert(piece.to_owned(), id);
        Ok(Placed::Cached(id))
    }

    /// Packer insertion with the owner-side eviction ladder: on a full
    /// atlas, first drop everything not used since the last sweep, then
    /// as a last resort drop the whole cache.
    fn insert_padded(&mut self, w: u32, h: u32, entry: CacheEntry) -> Result<RectId, AtlasError> {
        match self.packer_insert(w, h, entry) {
            Err(AtlasError::Capacity { .. }) => {}
            other => return other,
        }

        let evicted = self.evict_unused();
        if evicted > 0 {
            log::debug!("atlas: evicted {evicted} unused entries to make room");
            self.compact_now();
            match self.packer_insert(w, h, entry) {
                Err(AtlasError::Capacity { .. }) => {}
                other => return other,
            }
        }

        log::debug!("atlas: clearing all {} entries to make room", self.entries.len());
        self.clear_all();
        self.packer_insert(w, h, entry)
    }

    fn packer_insert(&mut self, w: u32, h: u32, entry: CacheEntry) -> Result<RectId, AtlasError> {
        let mut dev = MigrationDevice::new(&mut self.device, &self.session, self.color);
        self.packer.insert(&mut dev, w, h, entry)
    }

    fn compact_now(&mut self) {
        let mut dev = MigrationDevice::new(&mut self.device, &self.session, self.color);
        self.packer.compact(&mut dev);
    }

    /// Remove every entry whose clock mark is clear. Does not compact.
    fn evict_unused(&mut self) -> usize {
        let packer = &mut self.packer;
        let before = self.entries.len();
        self.entries.retain(|key, id| {
            let keep = packer.payload(*id).is_some_and(|e| e.used);
            if !keep {
                log::trace!("atlas: evicting {key:?}");
                packer.remove(*id);
            }
            keep
        });
        before - self.entries.len()
    }

    /// Content bounds reconstructed from a cached entry's recorded
    /// placement, matching what `measure` returned when it was cached.
    fn cached_bounds(&self, id: RectId) -> Bounds {
        let rect = self.packer.get(id).expect("cached entry has a live rect");
        let entry = self.packer.payload(id).expect("cached entry has a live rect");
        let pad = self.padding;
        Bounds::new(
            pad as i32 - entry.origin.x,
            pad as i32 - entry.origin.y,
            rect.w - 2 * pad,
            rect.h - 2 * pad,
        )
    }

    /// Separator cursor advance, measured once per cache lifetime (the
    /// rasterizer setup is fixed for the cache's lifetime).
    fn separator_advance(&mut self) -> Result<u32, AtlasError> {
        if let Some(advance) = self.sep_advance {
            return Ok(advance);
        }
        let sep = self.separator.expect("tokenization is enabled");
        let advance = self.device.measure(&sep.to_string())?.w;
        self.sep_advance = Some(advance);
        Ok(advance)
    }
}

/// Device shim threaded through packer calls that can relocate content:
/// suspends an open session around the move protocol and restores it,
/// including the pending paint color, afterwards. The bracket itself
/// never changes state, so the caller observes nothing.
struct MigrationDevice<'a, D: AtlasDevice> {
    dev: &'a mut D,
    session: &'a SessionBracket,
    color: [f32; 4],
    suspended: Option<(SessionMode, u32, u32)>,
}

impl<'a, D: AtlasDevice> MigrationDevice<'a, D> {
    fn new(dev: &'a mut D, session: &'a SessionBracket, color: [f32; 4]) -> Self {
        Self { dev, session, color, suspended: None }
    }
}

impl<D: AtlasDevice> AtlasDevice for MigrationDevice<'_, D> {
    type Store = D::Store;

    fn allocate_backing_store(&mut self, width: u32, height: u32) -> Self::Store {
        self.dev.allocate_backing_store(width, height)
    }

    fn delete_backing_store(&mut self, store: Self::Store) {
        self.dev.delete_backing_store(store);
    }

    fn pre_expand(&mut self, cause: Size, attempt: u32) -> bool {
        self.dev.pre_expand(cause, attempt)
    }

    fn addition_failed(&mut self, cause: Size, attempt: u32) {
        self.dev.addition_failed(cause, attempt);
    }

    fn begin_movement(&mut self, old: Self::Store, new: Self::Store) {
        if let Some(params) = self.session.current() {
            self.suspended = Some(params);
            self.dev.leave_session();
        }
        self.dev.begin_movement(old, new);
    }

    fn move_region(&mut self, old: Self::Store, from: Rect, new: Self::Store, to: Rect) {
        self.dev.move_region(old, from, new, to);
    }

    fn end_movement(&mut self, old: Self::Store, new: Self::Store) {
        self.dev.end_movement(old, new);
        if let Some((mode, width, height)) = self.suspended.take() {
            self.dev.enter_session(mode, width, height);
            self.dev.set_paint_color(self.color);
        }
    }

    fn clear_region(&mut self, store: Self::Store, bounds: Rect) {
        self.dev.clear_region(store, bounds);
    }

    fn mark_dirty(&mut self, store: Self::Store, bounds: Rect) {
        self.dev.mark_dirty(store, bounds);
    }

    fn measure(&mut self, content: &str) -> Result<Bounds, AtlasError> {
        self.dev.measure(content)
    }

    fn paint(&mut self, content: &str, store: Self::Store, x: i32, y: i32) -> Result<(), AtlasError> {
        self.dev.paint(content, store, x, y)
    }

    fn draw_quad(&mut self, store: Self::Store, src: Rect, x: f32, y: f32, scale: f32) {
        self.dev.draw_quad(store, src, x, y, scale);
    }

    fn enter_session(&mut self, mode: SessionMode, width: u32, height: u32) {
        self.dev.enter_session(mode, width, height);
    }

    fn leave_session(&mut self) {
        self.dev.leave_session();
    }

    fn set_paint_color(&mut self, rgba: [f32; 4]) {
        self.dev.set_paint_color(rgba);
    }
}
