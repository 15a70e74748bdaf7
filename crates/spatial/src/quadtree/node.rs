//! Quadtree nodes.
//!
//! A node owns one power-of-two cell's subtree: up to four child slots and
//! a local list of entries that straddle the node's center (or that cannot
//! descend any further).

use geom::{Coord, Envelope};

use crate::quadtree::key::{pow2, Key, MIN_LEVEL};

/// Quadrant index constants. Insert, remove and query descent all classify
/// with these same four slots; diverging here would silently lose entries.
pub(crate) const SW: usize = 0;
pub(crate) const SE: usize = 1;
pub(crate) const NW: usize = 2;
pub(crate) const NE: usize = 3;

/// Classify an envelope against a center point.
///
/// Returns the single quadrant that fully holds the envelope, or `None`
/// when the envelope straddles the center on at least one axis. Envelopes
/// collapsed onto a center line resolve to the west/south side, so the
/// answer is deterministic for boundary cases.
pub(crate) fn quadrant_index(env: &Envelope, center: Coord) -> Option<usize> {
    let mut index = None;
    if env.min_x >= center.x {
        if env.min_y >= center.y {
            index = Some(NE);
        }
        if env.max_y <= center.y {
            index = Some(SE);
        }
    }
    if env.max_x <= center.x {
        if env.min_y >= center.y {
            index = Some(NW);
        }
        if env.max_y <= center.y {
            index = Some(SW);
        }
    }
    index
}

/// A stored (envelope, item) pair.
///
/// The envelope is the item's true extent as supplied by the caller. The
/// padded probe envelope that drives placement is never stored.
#[derive(Debug, Clone)]
pub(crate) struct Entry<T> {
    pub envelope: Envelope,
    pub item: T,
}

/// A node covering one square cell.
#[derive(Debug)]
pub(crate) struct Node<T> {
    level: i32,
    cell: Envelope,
    center: Coord,
    children: [Option<Box<Node<T>>>; 4],
    entries: Vec<Entry<T>>,
}

impl<T> Node<T> {
    pub fn from_key(key: Key) -> Self {
        let cell = key.cell();
        Self {
            level: key.level,
            cell,
            center: cell.center(),
            children: [None, None, None, None],
            entries: Vec::new(),
        }
    }

    #[inline]
    pub fn cell(&self) -> &Envelope {
        &self.cell
    }

    #[inline]
    pub fn level(&self) -> i32 {
        self.level
    }

    /// Insert an entry, descending as long as the probe fits in a single
    /// quadrant. Returns `true` if a new entry was added, `false` if an
    /// existing entry for the same item had its envelope replaced.
    pub fn insert(&mut self, probe: &Envelope, entry: Entry<T>) -> bool
    where
        T: PartialEq,
    {
        if self.level > MIN_LEVEL {
            if let Some(index) = quadrant_index(probe, self.center) {
                return self.child_slot(index).insert(probe, entry);
            }
        }
        self.insert_local(entry)
    }

    fn insert_local(&mut self, entry: Entry<T>) -> bool
    where
        T: PartialEq,
    {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.item == entry.item) {
            // Idempotent re-insertion: keep one entry per item.
            existing.envelope = entry.envelope;
            false
        } else {
            self.entries.push(entry);
            true
        }
    }

    /// Re-parent `node` beneath this node, creating intermediate cells as
    /// needed. `node`'s cell must lie within this node's cell.
    pub fn insert_node(&mut self, node: Box<Node<T>>) {
        debug_assert!(self.cell.contains(node.cell()));
        match quadrant_index(node.cell(), self.center) {
            Some(index) => {
                if node.level == self.level - 1 {
                    debug_assert!(self.children[index].is_none());
                    self.children[index] = Some(node);
                } else {
                    self.child_slot(index).insert_node(node);
                }
            }
            // A grid-aligned subcell always sits in exactly one quadrant.
            None => unreachable!("aligned subcell straddles parent center"),
        }
    }

    /// Get the child for `index`, creating its quadrant cell on demand.
    fn child_slot(&mut self, index: usize) -> &mut Node<T> {
        if self.children[index].is_none() {
            let level = self.level - 1;
            let half = pow2(level);
            let (origin_x, origin_y) = match index {
                SW => (self.cell.min_x, self.cell.min_y),
                SE => (self.cell.min_x + half, self.cell.min_y),
                NW => (self.cell.min_x, self.cell.min_y + half),
                NE => (self.cell.min_x + half, self.cell.min_y + half),
                _ => unreachable!(),
            };
            let child = Node::from_key(Key {
                level,
                origin: Coord::new(origin_x, origin_y),
            });
            self.children[index] = Some(Box::new(child));
        }
        match self.children[index].as_mut() {
            Some(child) => child,
            None => unreachable!("child slot just filled"),
        }
    }

    /// Visit entries intersecting `query_env`. Local entries are tested at
    /// every node on the way down because straddling entries live at
    /// ancestors; children whose cell misses the query are skipped.
    ///
    /// Returns `false` as soon as the visitor signals a stop, so callers
    /// short-circuit their own sibling traversal.
    pub fn query<'a, F>(&'a self, query_env: &Envelope, visit: &mut F) -> bool
    where
        F: FnMut(&'a Envelope, &'a T) -> bool,
    {
        for entry in &self.entries {
            if entry.envelope.intersects(query_env) && !visit(&entry.envelope, &entry.item) {
                return false;
            }
        }
        for child in self.children.iter().flatten() {
            if child.cell.intersects(query_env) && !child.query(query_env, visit) {
                return false;
            }
        }
        true
    }

    /// Remove `item`, guided by the same classification descent insert
    /// uses. Each level falls back to its own local list on the way back
    /// up, and empty children are dropped as emptiness propagates.
    pub fn remove(&mut self, probe: &Envelope, item: &T) -> bool
    where
        T: PartialEq,
    {
        if let Some(index) = quadrant_index(probe, self.center) {
            if let Some(child) = self.children[index].as_mut() {
                if child.remove(probe, item) {
                    if child.is_prunable() {
                        self.children[index] = None;
                    }
                    return true;
                }
            }
        }
        self.remove_local(item)
    }

    fn remove_local(&mut self, item: &T) -> bool
    where
        T: PartialEq,
    {
        if let Some(pos) = self.entries.iter().position(|e| &e.item == item) {
            // Swap-remove for efficiency; entry order carries no meaning.
            let _ = self.entries.swap_remove(pos);
            true
        } else {
            false
        }
    }

    /// True once the node holds nothing and can be dropped by its parent.
    #[inline]
    pub fn is_prunable(&self) -> bool {
        self.entries.is_empty() && self.children.iter().all(Option::is_none)
    }

    pub fn depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .flatten()
            .map(|child| child.depth())
            .max()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
            + self
                .children
                .iter()
                .flatten()
                .map(|child| child.len())
                .sum::<usize>()
    }

    /// Best-first nearest search: skip the whole subtree when its cell is
    /// already farther than the current best.
    pub fn nearest<'a>(&'a self, point: Coord, best: &mut Option<(&'a Envelope, &'a T, f64)>) {
        if let Some((_, _, best_dist_sq)) = best {
            if self.cell.distance_sq(point) >= *best_dist_sq {
                return;
            }
        }

        for entry in &self.entries {
            let dist_sq = entry.envelope.distance_sq(point);
            let better = match best {
                Some((_, _, d)) => dist_sq < *d,
                None => true,
            };
            if better {
                *best = Some((&entry.envelope, &entry.item, dist_sq));
            }
        }

        // Visit nearer cells first so the bound tightens early.
        let mut order: Vec<(f64, &Node<T>)> = self
            .children
            .iter()
            .flatten()
            .map(|child| (child.cell.distance_sq(point), child.as_ref()))
            .collect();
        order.sort_by(|a, b| a.0.total_cmp(&b.0));
        for (_, child) in order {
            child.nearest(point, best);
        }
    }
}
