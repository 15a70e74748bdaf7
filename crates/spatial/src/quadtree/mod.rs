//! QuadTree spatial indexing.
//!
//! Maps axis-aligned envelopes to items and answers "which items' boxes
//! intersect this region" without scanning every item. Cells are
//! power-of-two squares on a fixed global grid; nodes grow on demand and
//! are pruned on remove. Single-threaded and in-memory: callers serialize
//! concurrent mutation themselves.

mod key;
mod node;
mod root;

use geom::{Coord, Envelope};

use crate::config::IndexConfig;
use crate::error::SpatialError;
use node::Entry;
use root::Root;

/// Dynamic quadtree over (envelope, item) pairs.
///
/// Items are compared with `==` to locate existing entries, so callers
/// typically index by ID or handle. The tree never mutates items. NaN or
/// infinite coordinates violate the preconditions and are not defended
/// against; inverted envelopes are rejected on insert.
pub struct QuadTree<T> {
    root: Root<T>,
    min_extent: f64,
    item_count: usize,
    config: IndexConfig,
}

impl<T> QuadTree<T> {
    /// Create an empty tree with the default configuration.
    pub fn new() -> Self {
        Self::with_config(IndexConfig::default())
    }

    /// Create an empty tree with explicit tuning knobs.
    pub fn with_config(config: IndexConfig) -> Self {
        Self {
            root: Root::new(),
            min_extent: config.initial_min_extent,
            item_count: 0,
            config,
        }
    }

    /// Insert an item under the given envelope.
    ///
    /// The envelope is stored as supplied, degenerate extents included; a
    /// padded probe drives cell placement only. Re-inserting an item that
    /// resolves to the same node replaces its stored envelope instead of
    /// duplicating the entry.
    pub fn insert(&mut self, envelope: Envelope, item: T) -> Result<(), SpatialError>
    where
        T: PartialEq,
    {
        if envelope.min_x > envelope.max_x || envelope.min_y > envelope.max_y {
            return Err(SpatialError::InvertedEnvelope(envelope));
        }

        self.update_min_extent(&envelope);
        let probe = ensure_extent(&envelope, self.min_extent);
        let added = self
            .root
            .insert(&probe, Entry { envelope, item }, self.config.max_growth_steps);
        if added {
            self.item_count += 1;
        }
        Ok(())
    }

    /// Find every item whose stored envelope intersects `envelope`.
    ///
    /// Bounding-box overlap only; exact geometry tests stay with the
    /// caller.
    pub fn query(&self, envelope: &Envelope) -> Vec<(&Envelope, &T)> {
        let mut matches = Vec::new();
        let _ = self.query_with(envelope, |stored, item| {
            matches.push((stored, item));
            true
        });
        matches
    }

    /// Visit every item whose stored envelope intersects `envelope`.
    ///
    /// The visitor returns `true` to keep going; returning `false` stops
    /// the traversal immediately at any depth, siblings included. Returns
    /// whether the traversal ran to completion.
    pub fn query_with<'a, F>(&'a self, envelope: &Envelope, mut visit: F) -> bool
    where
        F: FnMut(&'a Envelope, &'a T) -> bool,
    {
        self.root.query(envelope, &mut visit)
    }

    /// Remove the entry for `item`, using `envelope` to locate it.
    ///
    /// Returns whether an entry was removed. Subtrees left empty are
    /// pruned. Removing from an empty tree is a no-op.
    pub fn remove(&mut self, envelope: &Envelope, item: &T) -> bool
    where
        T: PartialEq,
    {
        if self.item_count == 0 {
            return false;
        }
        let probe = ensure_extent(envelope, self.min_extent);
        let removed = self.root.remove(&probe, item);
        if removed {
            self.item_count -= 1;
        }
        removed
    }

    /// The entry nearest to `point` by envelope distance, with that
    /// distance. Subtrees farther than the best candidate are skipped.
    pub fn nearest(&self, point: Coord) -> Option<(&Envelope, &T, f64)> {
        let mut best = None;
        self.root.nearest(point, &mut best);
        best.map(|(envelope, item, dist_sq)| (envelope, item, dist_sq.sqrt()))
    }

    /// Get the number of items.
    #[inline]
    pub fn len(&self) -> usize {
        self.item_count
    }

    /// Check if empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.item_count == 0
    }

    /// Depth of the deepest node chain.
    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    /// The smallest non-degenerate extent seen so far.
    #[inline]
    pub fn min_extent(&self) -> f64 {
        self.min_extent
    }

    /// Drop every entry and node, restoring the freshly-created state.
    pub fn clear(&mut self) {
        self.root = Root::new();
        self.min_extent = self.config.initial_min_extent;
        self.item_count = 0;
    }

    fn update_min_extent(&mut self, envelope: &Envelope) {
        let width = envelope.width();
        let height = envelope.height();
        if width > 0.0 && width < self.min_extent {
            self.min_extent = width;
        }
        if height > 0.0 && height < self.min_extent {
            self.min_extent = height;
        }
    }
}

impl<T> Default for QuadTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for QuadTree<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuadTree")
            .field("items", &self.item_count)
            .field("depth", &self.depth())
            .field("min_extent", &self.min_extent)
            .finish()
    }
}

/// Pad a degenerate envelope into a positive-extent probe box.
///
/// Cell sizes must be strictly positive, so a zero-width or zero-height
/// envelope cannot drive key computation. The probe exists only for
/// placement; queries always see the stored envelope.
fn ensure_extent(envelope: &Envelope, min_extent: f64) -> Envelope {
    let mut min_x = envelope.min_x;
    let mut max_x = envelope.max_x;
    let mut min_y = envelope.min_y;
    let mut max_y = envelope.max_y;
    if min_x == max_x {
        min_x -= min_extent / 2.0;
        max_x += min_extent / 2.0;
    }
    if min_y == max_y {
        min_y -= min_extent / 2.0;
        max_y += min_extent / 2.0;
    }
    Envelope::new(min_x, min_y, max_x, max_y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn env(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Envelope {
        Envelope::new(min_x, min_y, max_x, max_y)
    }

    fn items(tree: &QuadTree<u32>, query_env: &Envelope) -> Vec<u32> {
        let mut found: Vec<u32> = tree.query(query_env).iter().map(|&(_, &i)| i).collect();
        found.sort_unstable();
        found
    }

    #[test]
    fn test_end_to_end() {
        let mut tree = QuadTree::new();
        tree.insert(env(0.0, 0.0, 10.0, 10.0), 1).unwrap();
        tree.insert(env(5.0, 5.0, 15.0, 15.0), 2).unwrap();
        tree.insert(env(100.0, 100.0, 110.0, 110.0), 3).unwrap();

        assert_eq!(items(&tree, &env(0.0, 0.0, 12.0, 12.0)), vec![1, 2]);
        assert_eq!(items(&tree, &env(200.0, 200.0, 210.0, 210.0)), Vec::<u32>::new());

        assert!(tree.remove(&env(0.0, 0.0, 10.0, 10.0), &1));
        assert_eq!(items(&tree, &env(0.0, 0.0, 12.0, 12.0)), vec![2]);
    }

    #[test]
    fn test_query_empty_tree() {
        let tree: QuadTree<u32> = QuadTree::new();
        assert!(tree.query(&env(0.0, 0.0, 100.0, 100.0)).is_empty());
        assert_eq!(tree.len(), 0);
        assert_eq!(tree.depth(), 0);
    }

    #[test]
    fn test_remove_from_empty_tree() {
        let mut tree: QuadTree<u32> = QuadTree::new();
        assert!(!tree.remove(&env(0.0, 0.0, 1.0, 1.0), &1));
    }

    #[test]
    fn test_inverted_envelope_rejected() {
        let mut tree = QuadTree::new();
        let result = tree.insert(env(10.0, 0.0, 0.0, 10.0), 1);
        assert!(matches!(result, Err(SpatialError::InvertedEnvelope(_))));
        assert_eq!(tree.len(), 0);
    }

    #[test]
    fn test_count_tracks_distinct_items() {
        let mut tree = QuadTree::new();
        for i in 0..20u32 {
            let offset = f64::from(i) * 3.0;
            tree.insert(env(offset, 0.0, offset + 2.0, 2.0), i).unwrap();
        }
        assert_eq!(tree.len(), 20);

        tree.insert(env(0.0, 0.0, 2.0, 2.0), 0).unwrap();
        assert_eq!(tree.len(), 20);
    }

    #[test]
    fn test_reinsert_replaces_envelope() {
        let mut tree = QuadTree::new();
        // Both envelopes straddle the same cell center, so they resolve to
        // the same node and the second insert replaces the first.
        tree.insert(env(3.0, 3.0, 5.0, 5.0), 1).unwrap();
        tree.insert(env(3.0, 3.0, 6.0, 6.0), 1).unwrap();

        assert_eq!(tree.len(), 1);
        let found = tree.query(&env(0.0, 0.0, 10.0, 10.0));
        assert_eq!(found.len(), 1);
        assert_eq!(*found[0].0, env(3.0, 3.0, 6.0, 6.0));
    }

    #[test]
    fn test_remove_decrements_count_once() {
        let mut tree = QuadTree::new();
        tree.insert(env(0.0, 0.0, 4.0, 4.0), 1).unwrap();
        tree.insert(env(8.0, 8.0, 12.0, 12.0), 2).unwrap();

        assert!(tree.remove(&env(0.0, 0.0, 4.0, 4.0), &1));
        assert_eq!(tree.len(), 1);
        assert!(items(&tree, &env(0.0, 0.0, 4.0, 4.0)).is_empty());

        // A second removal of the same item finds nothing.
        assert!(!tree.remove(&env(0.0, 0.0, 4.0, 4.0), &1));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_degenerate_point() {
        let mut tree = QuadTree::new();
        tree.insert(env(3.0, 3.0, 3.0, 3.0), 4).unwrap();

        let found = tree.query(&env(2.0, 2.0, 4.0, 4.0));
        assert_eq!(found.len(), 1);
        assert_eq!(*found[0].1, 4);
        // The stored envelope keeps its true zero extent.
        assert_eq!(found[0].0.width(), 0.0);
        assert_eq!(found[0].0.height(), 0.0);
        assert!(tree.min_extent() > 0.0);
    }

    #[test]
    fn test_degenerate_segment() {
        let mut tree = QuadTree::new();
        tree.insert(env(0.0, 5.0, 10.0, 5.0), 1).unwrap();

        assert_eq!(items(&tree, &env(4.0, 4.0, 6.0, 6.0)), vec![1]);
        assert!(items(&tree, &env(0.0, 7.0, 10.0, 9.0)).is_empty());
    }

    #[test]
    fn test_min_extent_only_shrinks() {
        let mut tree: QuadTree<u32> = QuadTree::new();
        assert_eq!(tree.min_extent(), 1.0);

        tree.insert(env(0.0, 0.0, 0.25, 8.0), 1).unwrap();
        assert_eq!(tree.min_extent(), 0.25);

        tree.insert(env(0.0, 0.0, 50.0, 50.0), 2).unwrap();
        assert_eq!(tree.min_extent(), 0.25);
    }

    #[test]
    fn test_origin_straddling_items() {
        let mut tree = QuadTree::new();
        tree.insert(env(-5.0, -5.0, 5.0, 5.0), 1).unwrap();
        tree.insert(env(-10.0, 2.0, -6.0, 4.0), 2).unwrap();
        tree.insert(env(3.0, -8.0, 6.0, -2.0), 3).unwrap();

        assert_eq!(items(&tree, &env(-1.0, -1.0, 1.0, 1.0)), vec![1]);
        assert_eq!(items(&tree, &env(-20.0, -20.0, 20.0, 20.0)), vec![1, 2, 3]);

        assert!(tree.remove(&env(-5.0, -5.0, 5.0, 5.0), &1));
        assert_eq!(items(&tree, &env(-20.0, -20.0, 20.0, 20.0)), vec![2, 3]);
    }

    #[test]
    fn test_depth_grows_with_smaller_items() {
        let mut tree = QuadTree::new();
        let mut last_depth = 0;
        let mut extent = 64.0;
        for i in 0..10u32 {
            tree.insert(env(32.0, 32.0, 32.0 + extent, 32.0 + extent), i)
                .unwrap();
            let depth = tree.depth();
            assert!(depth >= last_depth);
            last_depth = depth;
            extent /= 2.0;
        }
        assert!(last_depth > 1);
    }

    #[test]
    fn test_clear_resets_tree() {
        let mut tree = QuadTree::new();
        tree.insert(env(0.0, 0.0, 0.125, 0.125), 1).unwrap();
        tree.insert(env(40.0, 40.0, 48.0, 48.0), 2).unwrap();
        assert!(tree.min_extent() < 1.0);

        tree.clear();
        assert_eq!(tree.len(), 0);
        assert!(tree.is_empty());
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.min_extent(), 1.0);
        assert!(tree.query(&env(0.0, 0.0, 100.0, 100.0)).is_empty());

        // Behaves like a fresh tree afterwards.
        tree.insert(env(3.0, 3.0, 3.0, 3.0), 7).unwrap();
        assert_eq!(items(&tree, &env(2.0, 2.0, 4.0, 4.0)), vec![7]);
    }

    #[test]
    fn test_early_termination() {
        let mut tree = QuadTree::new();
        for i in 0..50u32 {
            let offset = f64::from(i);
            tree.insert(env(offset, offset, offset + 0.5, offset + 0.5), i)
                .unwrap();
        }

        let mut visited = 0;
        let completed = tree.query_with(&env(0.0, 0.0, 50.0, 50.0), |_, _| {
            visited += 1;
            false
        });
        assert!(!completed);
        assert_eq!(visited, 1);
    }

    #[test]
    fn test_nearest() {
        let mut tree = QuadTree::new();
        assert!(tree.nearest(Coord::new(0.0, 0.0)).is_none());

        tree.insert(env(0.0, 0.0, 1.0, 1.0), 1).unwrap();
        tree.insert(env(10.0, 0.0, 11.0, 1.0), 2).unwrap();
        tree.insert(env(100.0, 100.0, 101.0, 101.0), 3).unwrap();

        let (_, item, dist) = tree.nearest(Coord::new(3.0, 0.5)).unwrap();
        assert_eq!(*item, 1);
        assert_eq!(dist, 2.0);

        let (_, item, dist) = tree.nearest(Coord::new(10.5, 0.5)).unwrap();
        assert_eq!(*item, 2);
        assert_eq!(dist, 0.0);
    }

    #[test]
    fn test_self_containment_random() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut tree = QuadTree::new();
        let mut boxes = Vec::new();
        for i in 0..500u32 {
            let min_x = rng.random_range(-500.0..500.0);
            let min_y = rng.random_range(-500.0..500.0);
            let e = env(
                min_x,
                min_y,
                min_x + rng.random_range(0.0..20.0),
                min_y + rng.random_range(0.0..20.0),
            );
            tree.insert(e, i).unwrap();
            boxes.push((e, i));
        }
        assert_eq!(tree.len(), 500);

        // Querying an item's own envelope always finds it.
        for (e, i) in &boxes {
            assert!(items(&tree, e).contains(i), "lost item {i} for {e:?}");
        }
    }

    #[test]
    fn test_exactness_against_linear_scan() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut tree = QuadTree::new();
        let mut boxes = Vec::new();
        for i in 0..400u32 {
            let min_x = rng.random_range(-200.0..200.0);
            let min_y = rng.random_range(-200.0..200.0);
            let e = env(
                min_x,
                min_y,
                min_x + rng.random_range(0.0..10.0),
                min_y + rng.random_range(0.0..10.0),
            );
            tree.insert(e, i).unwrap();
            boxes.push((e, i));
        }

        for _ in 0..50 {
            let x = rng.random_range(-220.0..220.0);
            let y = rng.random_range(-220.0..220.0);
            let window = env(x, y, x + 30.0, y + 30.0);

            let mut expected: Vec<u32> = boxes
                .iter()
                .filter(|(e, _)| e.intersects(&window))
                .map(|(_, i)| *i)
                .collect();
            expected.sort_unstable();

            assert_eq!(items(&tree, &window), expected);
        }
    }
}
