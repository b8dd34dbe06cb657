//! Online rectangle bin packing over one growable backing store.
//!
//! Uses shelf packing with per-shelf free-span lists: shelves stack
//! vertically, a shelf's height is fixed by its first occupant, and
//! inserts pick the fitting shelf with the least wasted height, then the
//! narrowest fitting span within it. Removal returns the occupied span to
//! its shelf and merges adjacent free spans; rows that lose their last
//! occupant become dead space until [`RectPacker::compact`] runs.
//!
//! Growth doubles one dimension at a time up to a configured maximum and
//! relocates every live rectangle into the new generation through the
//! device's move protocol. Relocation is planned on a scratch layout
//! first and committed only when every rectangle fits, so a failed plan
//! leaves the packer untouched.

use crate::device::AtlasDevice;
use crate::error::AtlasError;
use crate::geom::{Rect, Size};

/// Stable handle to a packed rectangle.
///
/// The rectangle's coordinates may change during growth or compaction;
/// the id never does while the rectangle is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RectId(pub(crate) usize);

/// A free horizontal span within a shelf.
#[derive(Debug, Clone, Copy)]
struct Span {
    x: u32,
    w: u32,
}

/// One packed row. Height is fixed by the first occupant; rectangles
/// shorter than the shelf waste the slice below them.
#[derive(Debug, Clone)]
struct Shelf {
    y: u32,
    h: u32,
    free: Vec<Span>,
    live: usize,
}

/// Shelf bookkeeping for one backing-store generation.
#[derive(Debug, Clone)]
struct Layout {
    width: u32,
    height: u32,
    shelves: Vec<Shelf>,
}

impl Layout {
    fn new(width: u32, height: u32) -> Self {
        Self { width, height, shelves: Vec::new() }
    }

    /// Place a `w`×`h` rectangle, returning it and its shelf index.
    ///
    /// Existing shelves are candidates when the rectangle fits and wastes
    /// at most its own height in shelf slack; otherwise a new shelf opens
    /// below the last one.
    fn pack(&mut self, w: u32, h: u32) -> Option<(Rect, usize)> {
        if w > self.width || h > self.height {
            return None;
        }

        // Best-height-fit across shelves, best-width-fit within a shelf.
        let mut best: Option<(usize, usize, (u32, u32))> = None;
        for (si, shelf) in self.shelves.iter().enumerate() {
            if shelf.h < h || shelf.h > h.saturating_mul(2) {
                continue;
            }
            for (pi, span) in shelf.free.iter().enumerate() {
                if span.w < w {
                    continue;
                }
                let key = (shelf.h - h, span.w - w);
                if best.is_none_or(|(_, _, k)| key < k) {
                    best = Some((si, pi, key));
                }
            }
        }

        if let Some((si, pi, _)) = best {
            let shelf = &mut self.shelves[si];
            let x = shelf.free[pi].x;
            shelf.free[pi].x += w;
            shelf.free[pi].w -= w;
            if shelf.free[pi].w == 0 {
                shelf.free.remove(pi);
            }
            shelf.live += 1;
            return Some((Rect::new(x, shelf.y, w, h), si));
        }

        // Open a new shelf below the last one.
        let y = self.shelves.last().map_or(0, |s| s.y + s.h);
        if y + h > self.height {
            return None;
        }
        let mut free = Vec::new();
        if w < self.width {
            free.push(Span { x: w, w: self.width - w });
        }
        self.shelves.push(Shelf { y, h, free, live: 1 });
        Some((Rect::new(0, y, w, h), self.shelves.len() - 1))
    }

    /// Return a removed rectangle's span to its shelf, merging neighbors.
    fn release(&mut self, shelf_idx: usize, x: u32, w: u32) {
        let width = self.width;
        let shelf = &mut self.shelves[shelf_idx];
        shelf.live -= 1;
        if shelf.live == 0 {
            shelf.free.clear();
            shelf.free.push(Span { x: 0, w: width });
            return;
        }

        let pos = shelf.free.partition_point(|s| s.x < x);
        shelf.free.insert(pos, Span { x, w });
        if pos + 1 < shelf.free.len()
            && shelf.free[pos].x + shelf.free[pos].w == shelf.free[pos + 1].x
        {
            shelf.free[pos].w += shelf.free[pos + 1].w;
            shelf.free.remove(pos + 1);
        }
        if pos > 0 && shelf.free[pos - 1].x + shelf.free[pos - 1].w == shelf.free[pos].x {
            shelf.free[pos - 1].w += shelf.free[pos].w;
            shelf.free.remove(pos);
        }
    }

    /// Total height of shelves that still hold at least one rectangle.
    fn occupied_height(&self) -> u32 {
        self.shelves.iter().filter(|s| s.live > 0).map(|s| s.h).sum()
    }

    fn reset(&mut self) {
        self.shelves.clear();
    }
}

#[derive(Debug)]
struct Slot<P> {
    rect: Rect,
    shelf: usize,
    payload: P,
}

/// Online rectangle packer with growth, removal, and compaction.
///
/// Generic over the device's store handle `H` and an opaque payload `P`
/// owned by the cache layer. The backing store is allocated lazily on the
/// first insertion and replaced wholesale whenever the packer grows or
/// compacts; callers re-fetch the current handle via [`Self::store`].
#[derive(Debug)]
pub struct RectPacker<H: Copy, P> {
    store: Option<H>,
    layout: Layout,
    max: Size,
    slots: Vec<Option<Slot<P>>>,
    free_slots: Vec<usize>,
    live: usize,
}

impl<H: Copy, P> RectPacker<H, P> {
    /// Create a packer starting at `initial` and never growing past `max`.
    pub fn new(initial: Size, max: Size) -> Self {
        let max = Size::new(max.w.max(1), max.h.max(1));
        let w = initial.w.clamp(1, max.w);
        let h = initial.h.clamp(1, max.h);
        Self {
            store: None,
            layout: Layout::new(w, h),
            max,
            slots: Vec::new(),
            free_slots: Vec::new(),
            live: 0,
        }
    }

    /// Establish the hard size ceiling (typically a hardware limit
    /// queried once per context lifetime). Does not shrink an already
    /// larger generation.
    pub fn set_max_size(&mut self, width: u32, height: u32) {
        self.max = Size::new(width.max(1), height.max(1));
    }

    /// Current backing-store generation, if one has been allocated.
    pub fn store(&self) -> Option<H> {
        self.store
    }

    /// Width of the current generation.
    pub fn width(&self) -> u32 {
        self.layout.width
    }

    /// Height of the current generation.
    pub fn height(&self) -> u32 {
        self.layout.height
    }

    pub fn max_size(&self) -> Size {
        self.max
    }

    /// Number of live rectangles.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Current placement of a live rectangle.
    pub fn get(&self, id: RectId) -> Option<Rect> {
        self.slots.get(id.0)?.as_ref().map(|s| s.rect)
    }

    pub fn payload(&self, id: RectId) -> Option<&P> {
        self.slots.get(id.0)?.as_ref().map(|s| &s.payload)
    }

    pub fn payload_mut(&mut self, id: RectId) -> Option<&mut P> {
        self.slots.get_mut(id.0)?.as_mut().map(|s| &mut s.payload)
    }

    /// Iterate over live rectangles and their payloads.
    pub fn iter(&self) -> impl Iterator<Item = (RectId, Rect, &P)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (RectId(i), s.rect, &s.payload)))
    }

    /// Insert a `w`×`h` rectangle, growing the backing store as needed.
    ///
    /// Between placement attempts the device's `pre_expand` hook gets a
    /// chance to free space; when growth is exhausted `addition_failed`
    /// gets a last chance before the insertion fails with
    /// [`AtlasError::Capacity`]. On failure no partial state remains.
    pub fn insert<D: AtlasDevice<Store = H>>(
        &mut self,
        dev: &mut D,
        w: u32,
        h: u32,
        payload: P,
    ) -> Result<RectId, AtlasError> {
        if w == 0 || h == 0 || w > self.max.w || h > self.max.h {
            return Err(AtlasError::Oversize {
                width: w,
                height: h,
                max_width: self.max.w,
                max_height: self.max.h,
            });
        }
        self.ensure_store(dev);

        let cause = Size::new(w, h);
        let mut attempt = 0u32;
        loop {
            if let Some((rect, shelf)) = self.layout.pack(w, h) {
                return Ok(self.commit(rect, shelf, payload));
            }

            if dev.pre_expand(cause, attempt) {
                if let Some((rect, shelf)) = self.layout.pack(w, h) {
                    return Ok(self.commit(rect, shelf, payload));
                }
            }

            // Grow, skipping over target sizes whose replan fails.
            let mut from = Size::new(self.layout.width, self.layout.height);
            let mut grew = false;
            while let Some(next) = Self::grow_step(from, self.max) {
                attempt += 1;
                log::debug!(
                    "atlas: growing {}x{} -> {}x{} for {}x{} (attempt {attempt})",
                    self.layout.width,
                    self.layout.height,
                    next.w,
                    next.h,
                    w,
                    h,
                );
                if self.migrate(dev, next) {
                    grew = true;
                    break;
                }
                from = next;
            }
            if grew {
                continue;
            }

            dev.addition_failed(cause, attempt);
            if let Some((rect, shelf)) = self.layout.pack(w, h) {
                return Ok(self.commit(rect, shelf, payload));
            }
            log::warn!("atlas: capacity exhausted for {w}x{h} after {attempt} growth attempts");
            return Err(AtlasError::Capacity { attempts: attempt });
        }
    }

    /// Remove a rectangle, returning its payload. Does not compact.
    pub fn remove(&mut self, id: RectId) -> Option<P> {
        let slot = self.slots.get_mut(id.0)?.take()?;
        self.free_slots.push(id.0);
        self.live -= 1;
        self.layout.release(slot.shelf, slot.rect.x, slot.rect.w);
        Some(slot.payload)
    }

    /// Re-pack all live rectangles as tightly as possible, minimizing
    /// vertical extent, relocating content through the move protocol.
    ///
    /// Always targets a fresh generation of the same size; a replan that
    /// somehow fails leaves everything where it was.
    pub fn compact<D: AtlasDevice<Store = H>>(&mut self, dev: &mut D) {
        if self.live == 0 {
            self.layout.reset();
            return;
        }
        let size = Size::new(self.layout.width, self.layout.height);
        let before = self.layout.occupied_height();
        if self.migrate(dev, size) {
            log::debug!(
                "atlas: compacted {} rects, occupied rows {} -> {}",
                self.live,
                before,
                self.layout.occupied_height(),
            );
        } else {
            log::warn!("atlas: compaction replan failed, layout unchanged");
        }
    }

    /// Fraction of the current generation's vertical extent that is dead
    /// or never-opened row space, in `[0, 1]`.
    pub fn vertical_fragmentation_ratio(&self) -> f32 {
        if self.layout.height == 0 {
            return 0.0;
        }
        1.0 - self.layout.occupied_height() as f32 / self.layout.height as f32
    }

    /// Drop every rectangle and reset packing state. The current
    /// generation is kept.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free_slots.clear();
        self.live = 0;
        self.layout.reset();
    }

    fn ensure_store<D: AtlasDevice<Store = H>>(&mut self, dev: &mut D) {
        if self.store.is_none() {
            self.store = Some(dev.allocate_backing_store(self.layout.width, self.layout.height));
        }
    }

    fn commit(&mut self, rect: Rect, shelf: usize, payload: P) -> RectId {
        self.live += 1;
        let slot = Slot { rect, shelf, payload };
        match self.free_slots.pop() {
            Some(i) => {
                self.slots[i] = Some(slot);
                RectId(i)
            }
            None => {
                self.slots.push(Some(slot));
                RectId(self.slots.len() - 1)
            }
        }
    }

    /// Next generation size: double the narrower axis, capped at `max`.
    fn grow_step(from: Size, max: Size) -> Option<Size> {
        if from.w >= max.w && from.h >= max.h {
            return None;
        }
        if (from.w <= from.h && from.w < max.w) || from.h >= max.h {
            Some(Size::new(from.w.saturating_mul(2).min(max.w), from.h))
        } else {
            Some(Size::new(from.w, from.h.saturating_mul(2).min(max.h)))
        }
    }

    /// Relocate every live rectangle into a fresh `new`-sized generation.
    ///
    /// Plans tallest-first on a scratch layout; commits (allocating the
    /// new store and running the move protocol) only if everything fits.
    /// Returns false, with the packer untouched, otherwise.
    fn migrate<D: AtlasDevice<Store = H>>(&mut self, dev: &mut D, new: Size) -> bool {
        let mut order: Vec<(usize, Rect)> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (i, s.rect)))
            .collect();
        order.sort_by(|a, b| b.1.h.cmp(&a.1.h).then(b.1.w.cmp(&a.1.w)).then(a.0.cmp(&b.0)));

        let mut scratch = Layout::new(new.w, new.h);
        let mut plan = Vec::with_capacity(order.len());
        for (idx, from) in order {
            match scratch.pack(from.w, from.h) {
                Some((to, shelf)) => plan.push((idx, from, to, shelf)),
                None => return false,
            }
        }

        if let Some(old_store) = self.store {
            let new_store = dev.allocate_backing_store(new.w, new.h);
            dev.begin_movement(old_store, new_store);
            for &(_, from, to, _) in &plan {
                dev.move_region(old_store, from, new_store, to);
            }
            dev.end_movement(old_store, new_store);
            dev.mark_dirty(new_store, Rect::new(0, 0, new.w, new.h));
            dev.delete_backing_store(old_store);
            self.store = Some(new_store);
        }

        self.layout = scratch;
        for (idx, _, to, shelf) in plan {
            if let Some(slot) = self.slots[idx].as_mut() {
                slot.rect = to;
                slot.shelf = shelf;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Bounds;
    use crate::session::SessionMode;

    /// Pixel-less device for packer-level tests: counts protocol calls
    /// and hands out sequential store ids.
    #[derive(Default)]
    struct NullDevice {
        next_store: u32,
        allocs: Vec<(u32, u32, u32)>,
        deletes: Vec<u32>,
        moves: Vec<(u32, Rect, u32, Rect)>,
        pre_expand_calls: Vec<(Size, u32)>,
        addition_failed_calls: Vec<(Size, u32)>,
        movements: u32,
    }

    impl AtlasDevice for NullDevice {
        type Store = u32;

        fn allocate_backing_store(&mut self, width: u32, height: u32) -> u32 {
            self.next_store += 1;
            self.allocs.push((self.next_store, width, height));
            self.next_store
        }

        fn delete_backing_store(&mut self, store: u32) {
            self.deletes.push(store);
        }

        fn pre_expand(&mut self, cause: Size, attempt: u32) -> bool {
            self.pre_expand_calls.push((cause, attempt));
            false
        }

        fn addition_failed(&mut self, cause: Size, attempt: u32) {
            self.addition_failed_calls.push((cause, attempt));
        }

        fn begin_movement(&mut self, _old: u32, _new: u32) {
            self.movements += 1;
        }

        fn move_region(&mut self, old: u32, from: Rect, new: u32, to: Rect) {
            self.moves.push((old, from, new, to));
        }

        fn end_movement(&mut self, _old: u32, _new: u32) {}
        fn clear_region(&mut self, _store: u32, _bounds: Rect) {}
        fn mark_dirty(&mut self, _store: u32, _bounds: Rect) {}

        fn measure(&mut self, _content: &str) -> Result<Bounds, AtlasError> {
            Ok(Bounds::default())
        }

        fn paint(&mut self, _content: &str, _store: u32, _x: i32, _y: i32) -> Result<(), AtlasError> {
            Ok(())
        }

        fn draw_quad(&mut self, _store: u32, _src: Rect, _x: f32, _y: f32, _scale: f32) {}
        fn enter_session(&mut self, _mode: SessionMode, _width: u32, _height: u32) {}
        fn leave_session(&mut self) {}
    }

    fn packer(initial: u32, max: u32) -> RectPacker<u32, ()> {
        RectPacker::new(Size::new(initial, initial), Size::new(max, max))
    }

    /// Assert the packer's core invariants: pairwise non-overlap and
    /// containment within the current generation.
    fn assert_valid(p: &RectPacker<u32, ()>) {
        let store_rect = Rect::new(0, 0, p.width(), p.height());
        let rects: Vec<Rect> = p.iter().map(|(_, r, _)| r).collect();
        for (i, a) in rects.iter().enumerate() {
            assert!(store_rect.contains(a), "{a:?} outside {store_rect:?}");
            for b in &rects[i + 1..] {
                assert!(!a.intersects(b), "overlap: {a:?} vs {b:?}");
            }
        }
    }

    /// Deterministic xorshift PRNG for randomized sequences.
    struct XorShift(u64);

    impl XorShift {
        fn next_u64(&mut self) -> u64 {
            let mut x = self.0;
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            self.0 = x;
            x
        }

        fn range(&mut self, lo: u32, hi: u32) -> u32 {
            lo + (self.next_u64() % u64::from(hi - lo + 1)) as u32
        }
    }

    #[test]
    fn first_insert_lands_at_origin() {
        let mut dev = NullDevice::default();
        let mut p = packer(64, 256);
        let id = p.insert(&mut dev, 16, 20, ()).unwrap();
        assert_eq!(p.get(id), Some(Rect::new(0, 0, 16, 20)));
        assert_eq!(p.len(), 1);
        assert_eq!(dev.allocs.len(), 1);
    }

    #[test]
    fn oversize_is_rejected_without_side_effects() {
        let mut dev = NullDevice::default();
        let mut p = packer(64, 256);
        let err = p.insert(&mut dev, 300, 10, ()).unwrap_err();
        assert!(matches!(err, AtlasError::Oversize { .. }));
        let err = p.insert(&mut dev, 10, 0, ()).unwrap_err();
        assert!(matches!(err, AtlasError::Oversize { .. }));
        assert!(p.is_empty());
        // Oversize fails before the store is even allocated.
        assert!(dev.allocs.is_empty());
    }

    #[test]
    fn random_insert_remove_keeps_invariants() {
        let mut dev = NullDevice::default();
        let mut p = packer(64, 512);
        let mut rng = XorShift(0x9e37_79b9_7f4a_7c15);
        let mut live: Vec<RectId> = Vec::new();

        for step in 0..300 {
            if !live.is_empty() && rng.range(0, 9) < 3 {
                let idx = rng.range(0, live.len() as u32 - 1) as usize;
                let id = live.swap_remove(idx);
                assert!(p.remove(id).is_some());
            } else {
                let w = rng.range(1, 40);
                let h = rng.range(1, 40);
                match p.insert(&mut dev, w, h, ()) {
                    Ok(id) => live.push(id),
                    Err(AtlasError::Capacity { .. }) => {}
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
            if step % 10 == 0 {
                assert_valid(&p);
            }
        }
        assert_valid(&p);
        assert_eq!(p.len(), live.len());
    }

    #[test]
    fn scenario_200_rects_exhaust_256_max() {
        let mut dev = NullDevice::default();
        let mut p = packer(64, 256);
        let mut ok = 0;
        let mut capacity_hit = false;
        for _ in 0..200 {
            match p.insert(&mut dev, 20, 30, ()) {
                Ok(_) => ok += 1,
                Err(AtlasError::Capacity { attempts }) => {
                    capacity_hit = true;
                    assert!(attempts > 0 || p.width() == 256);
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert!(capacity_hit, "expected capacity exhaustion");
        // 256x256 shelf-packs 12 per row, 8 rows of height 30.
        assert_eq!(ok, 96);
        assert_eq!(p.len(), 96);
        assert_eq!((p.width(), p.height()), (256, 256));
        assert_valid(&p);
        // The failing inserts notified the owner.
        assert!(!dev.addition_failed_calls.is_empty());
    }

    #[test]
    fn growth_migrates_every_live_rect() {
        let mut dev = NullDevice::default();
        let mut p = packer(32, 256);
        let mut ids = Vec::new();
        for _ in 0..4 {
            ids.push(p.insert(&mut dev, 16, 16, ()).unwrap());
        }
        assert_eq!(dev.movements, 0);
        let before = p.len();
        // Fifth 16x16 cannot fit in 32x32: forces growth.
        ids.push(p.insert(&mut dev, 16, 16, ()).unwrap());
        assert!(dev.movements >= 1);
        assert_eq!(dev.moves.len(), before);
        assert!(p.width() > 32 || p.height() > 32);
        assert_valid(&p);
        // Old generation was deleted, ids still resolve.
        assert_eq!(dev.deletes.len(), dev.movements as usize);
        for id in ids {
            assert!(p.get(id).is_some());
        }
    }

    #[test]
    fn store_handle_changes_across_growth() {
        let mut dev = NullDevice::default();
        let mut p = packer(32, 128);
        p.insert(&mut dev, 30, 30, ()).unwrap();
        let first = p.store().unwrap();
        p.insert(&mut dev, 30, 30, ()).unwrap();
        let second = p.store().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn remove_reuses_the_freed_span() {
        let mut dev = NullDevice::default();
        let mut p = packer(64, 64);
        let a = p.insert(&mut dev, 20, 10, ()).unwrap();
        let _b = p.insert(&mut dev, 20, 10, ()).unwrap();
        let rect_a = p.get(a).unwrap();
        p.remove(a);
        let c = p.insert(&mut dev, 20, 10, ()).unwrap();
        assert_eq!(p.get(c), Some(rect_a));
        assert_valid(&p);
    }

    #[test]
    fn adjacent_free_spans_merge() {
        let mut dev = NullDevice::default();
        let mut p = packer(64, 64);
        let a = p.insert(&mut dev, 20, 10, ()).unwrap();
        let b = p.insert(&mut dev, 20, 10, ()).unwrap();
        let _c = p.insert(&mut dev, 20, 10, ()).unwrap();
        p.remove(a);
        p.remove(b);
        // A 40-wide rect only fits if the two 20-wide spans merged.
        let d = p.insert(&mut dev, 40, 10, ()).unwrap();
        assert_eq!(p.get(d), Some(Rect::new(0, 0, 40, 10)));
    }

    #[test]
    fn fragmentation_tracks_dead_rows() {
        let mut dev = NullDevice::default();
        let mut p = packer(64, 64);
        assert!((p.vertical_fragmentation_ratio() - 1.0).abs() < f32::EPSILON);

        let a = p.insert(&mut dev, 64, 32, ()).unwrap();
        let b = p.insert(&mut dev, 64, 32, ()).unwrap();
        assert!(p.vertical_fragmentation_ratio().abs() < f32::EPSILON);

        p.remove(a);
        assert!((p.vertical_fragmentation_ratio() - 0.5).abs() < f32::EPSILON);
        p.remove(b);
        assert!((p.vertical_fragmentation_ratio() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn compact_reclaims_dead_rows() {
        let mut dev = NullDevice::default();
        let mut p = packer(64, 64);
        let mut first_row = Vec::new();
        for _ in 0..4 {
            first_row.push(p.insert(&mut dev, 16, 32, ()).unwrap());
        }
        let survivor = p.insert(&mut dev, 16, 32, ()).unwrap();
        for id in first_row {
            p.remove(id);
        }
        assert!((p.vertical_fragmentation_ratio() - 0.5).abs() < f32::EPSILON);

        p.compact(&mut dev);
        // The survivor moved up into row 0 via exactly one relocation.
        assert_eq!(p.get(survivor), Some(Rect::new(0, 0, 16, 32)));
        assert_eq!(dev.moves.len(), 1);
        assert!((p.vertical_fragmentation_ratio() - 0.5).abs() < f32::EPSILON);
        assert_valid(&p);
    }

    #[test]
    fn compact_of_empty_packer_needs_no_store_churn() {
        let mut dev = NullDevice::default();
        let mut p = packer(64, 64);
        let a = p.insert(&mut dev, 16, 16, ()).unwrap();
        p.remove(a);
        let allocs = dev.allocs.len();
        p.compact(&mut dev);
        assert_eq!(dev.allocs.len(), allocs);
        assert!((p.vertical_fragmentation_ratio() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn clear_drops_everything_but_keeps_the_store() {
        let mut dev = NullDevice::default();
        let mut p = packer(64, 64);
        let a = p.insert(&mut dev, 16, 16, ()).unwrap();
        let store = p.store().unwrap();
        p.clear();
        assert!(p.is_empty());
        assert!(p.get(a).is_none());
        assert_eq!(p.store(), Some(store));
        // Freed space is reusable immediately.
        p.insert(&mut dev, 60, 60, ()).unwrap();
    }

    #[test]
    fn hooks_fire_in_order_before_capacity_error() {
        let mut dev = NullDevice::default();
        let mut p = packer(32, 32);
        p.insert(&mut dev, 32, 32, ()).unwrap();
        let err = p.insert(&mut dev, 32, 32, ()).unwrap_err();
        assert!(matches!(err, AtlasError::Capacity { .. }));
        assert_eq!(dev.pre_expand_calls.len(), 1);
        assert_eq!(dev.pre_expand_calls[0].0, Size::new(32, 32));
        assert_eq!(dev.addition_failed_calls.len(), 1);
    }

    #[test]
    fn set_max_size_unlocks_growth() {
        let mut dev = NullDevice::default();
        let mut p = packer(32, 32);
        p.insert(&mut dev, 32, 32, ()).unwrap();
        assert!(p.insert(&mut dev, 32, 32, ()).is_err());
        p.set_max_size(64, 64);
        p.insert(&mut dev, 32, 32, ()).unwrap();
        assert_valid(&p);
    }
}
