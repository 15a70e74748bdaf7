//! The top of the quadtree.
//!
//! The root covers the whole plane: four subtree slots hanging on the
//! coordinate origin, plus a local list for envelopes that straddle the
//! origin axes. No power-of-two grid cell can contain a box that crosses
//! the origin, so those entries are local to the top by the same straddle
//! rule every node applies at its own center.

use geom::{Coord, Envelope};
use tracing::trace;

use crate::quadtree::key::Key;
use crate::quadtree::node::{quadrant_index, Entry, Node};

/// Plane-covering root: one subtree per origin quadrant.
#[derive(Debug)]
pub(crate) struct Root<T> {
    subtrees: [Option<Box<Node<T>>>; 4],
    entries: Vec<Entry<T>>,
}

impl<T> Root<T> {
    pub fn new() -> Self {
        Self {
            subtrees: [None, None, None, None],
            entries: Vec::new(),
        }
    }

    /// Insert an entry. Returns `true` if a new entry was added, `false`
    /// if an existing entry for the same item was replaced.
    pub fn insert(&mut self, probe: &Envelope, entry: Entry<T>, max_growth_steps: u32) -> bool
    where
        T: PartialEq,
    {
        match quadrant_index(probe, Coord::ZERO) {
            // Straddles an origin axis: local to the top, like any other
            // entry that straddles its node's center.
            None => self.insert_local(entry),
            Some(index) => self
                .covering_subtree(index, probe, max_growth_steps)
                .insert(probe, entry),
        }
    }

    fn insert_local(&mut self, entry: Entry<T>) -> bool
    where
        T: PartialEq,
    {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.item == entry.item) {
            existing.envelope = entry.envelope;
            false
        } else {
            self.entries.push(entry);
            true
        }
    }

    /// Get the top node of a quadrant, growing it until it covers `probe`.
    ///
    /// Growth never resizes a node in place: a larger enclosing node is
    /// built from the key of the union envelope, the old top node is
    /// re-parented as one of its children, and the slot is replaced.
    fn covering_subtree(
        &mut self,
        index: usize,
        probe: &Envelope,
        max_growth_steps: u32,
    ) -> &mut Node<T> {
        let slot = &mut self.subtrees[index];
        let node = match slot.take() {
            None => Box::new(Node::from_key(Key::for_envelope(probe, max_growth_steps))),
            Some(existing) if existing.cell().contains(probe) => existing,
            Some(existing) => {
                let union = existing.cell().expanded_to_include(probe);
                let mut larger =
                    Box::new(Node::from_key(Key::for_envelope(&union, max_growth_steps)));
                trace!(
                    "growing quadrant {} top node from level {} to {}",
                    index,
                    existing.level(),
                    larger.level()
                );
                larger.insert_node(existing);
                larger
            }
        };
        slot.insert(node)
    }

    /// Visit entries intersecting `query_env`, top list first, then the
    /// quadrant subtrees that overlap the query. Returns `false` once the
    /// visitor has signalled a stop.
    pub fn query<'a, F>(&'a self, query_env: &Envelope, visit: &mut F) -> bool
    where
        F: FnMut(&'a Envelope, &'a T) -> bool,
    {
        for entry in &self.entries {
            if entry.envelope.intersects(query_env) && !visit(&entry.envelope, &entry.item) {
                return false;
            }
        }
        for subtree in self.subtrees.iter().flatten() {
            if subtree.cell().intersects(query_env) && !subtree.query(query_env, visit) {
                return false;
            }
        }
        true
    }

    /// Remove `item`, trying the probe's quadrant first and falling back
    /// to the top list. Quadrants left empty are dropped.
    pub fn remove(&mut self, probe: &Envelope, item: &T) -> bool
    where
        T: PartialEq,
    {
        if let Some(index) = quadrant_index(probe, Coord::ZERO) {
            if let Some(subtree) = self.subtrees[index].as_mut() {
                if subtree.remove(probe, item) {
                    if subtree.is_prunable() {
                        trace!("pruned empty quadrant {} subtree", index);
                        self.subtrees[index] = None;
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
            let _ = self.entries.swap_remove(pos);
            true
        } else {
            false
        }
    }

    pub fn depth(&self) -> usize {
        self.subtrees
            .iter()
            .flatten()
            .map(|subtree| subtree.depth())
            .max()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
            + self
                .subtrees
                .iter()
                .flatten()
                .map(|subtree| subtree.len())
                .sum::<usize>()
    }

    pub fn nearest<'a>(&'a self, point: Coord, best: &mut Option<(&'a Envelope, &'a T, f64)>) {
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
        for subtree in self.subtrees.iter().flatten() {
            subtree.nearest(point, best);
        }
    }
}
