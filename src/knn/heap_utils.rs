//! This module contains the bounded candidate set used during a single k-NN query.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use ordered_float::OrderedFloat; // For using f64 in BinaryHeap

/// Represents an element in the KBestNeighbors heap.
///
/// Ordered by `(distance, index)`, so equal distances resolve to the lower
/// training-row index.
#[derive(Debug)]
pub struct HeapElement<P> {
    pub distance: OrderedFloat<f64>,
    pub index: usize,
    pub data: P,
}

impl<P> PartialEq for HeapElement<P> {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance && self.index == other.index
    }
}
impl<P> Eq for HeapElement<P> {}

impl<P> PartialOrd for HeapElement<P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<P> Ord for HeapElement<P> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: the worst kept candidate sits on top.
        self.distance
            .cmp(&other.distance)
            .then_with(|| self.index.cmp(&other.index))
    }
}

/// Keeps the `capacity` best (smallest distance) items seen so far.
///
/// Insert-or-replace-worst is O(log k); the worst kept item is readable in O(1).
#[derive(Debug)]
pub struct KBestNeighbors<P> {
    capacity: usize,
    heap: BinaryHeap<HeapElement<P>>,
}

impl<P> KBestNeighbors<P> {
    pub fn new(capacity: usize) -> Self {
        KBestNeighbors {
            capacity,
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    /// Offers a candidate. Returns `true` if it was kept.
    pub fn add(&mut self, distance: f64, index: usize, data: P) -> bool {
        if self.capacity == 0 {
            return false;
        }
        let item = HeapElement { distance: OrderedFloat(distance), index, data };
        if self.heap.len() < self.capacity {
            self.heap.push(item);
            return true;
        }
        match self.heap.peek_mut() {
            Some(mut worst) if item < *worst => {
                *worst = item; // PeekMut restores the heap property on drop
                true
            }
            _ => false,
        }
    }

    /// True once `capacity` candidates are held.
    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    /// Distance of the worst kept candidate, or `None` while the set still has room
    /// (an unbounded search radius).
    pub fn current_farthest_distance(&self) -> Option<f64> {
        if self.is_full() {
            self.heap.peek().map(|heap_elem| heap_elem.distance.0)
        } else {
            None
        }
    }

    /// Consumes the set, yielding `(distance, index, data)` in ascending order.
    pub fn into_sorted_vec(self) -> Vec<(f64, usize, P)> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|elem| (elem.distance.0, elem.index, elem.data))
            .collect()
    }

    /// Consumes the set in whatever order the heap stores it.
    pub fn into_unordered_vec(self) -> Vec<(f64, usize, P)> {
        self.heap
            .into_vec()
            .into_iter()
            .map(|elem| (elem.distance.0, elem.index, elem.data))
            .collect()
    }

    /// Returns the current number of neighbors stored.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
