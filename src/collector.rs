//! Bounded max-heap gathering the k nearest candidates of a query.
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::{Result, VpTreeError};
use crate::metric::{DistanceFunction, Scalar};

/// Orders two distances, treating incomparable values (NaN) as equal
/// rather than panicking.
#[inline]
pub(crate) fn compare_distances<F: Scalar>(a: F, b: F) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

struct HeapElem<'a, F, T: 'a> {
    dist: F,
    item: &'a T,
}

impl<'a, F: Copy, T: 'a> Clone for HeapElem<'a, F, T> {
    fn clone(&self) -> Self {
        HeapElem { dist: self.dist, item: self.item }
    }
}

impl<'a, F: Scalar, T: 'a> PartialEq for HeapElem<'a, F, T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<'a, F: Scalar, T: 'a> Eq for HeapElem<'a, F, T> {}

impl<'a, F: Scalar, T: 'a> PartialOrd for HeapElem<'a, F, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<'a, F: Scalar, T: 'a> Ord for HeapElem<'a, F, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_distances(self.dist, other.dist)
    }
}

/// Retains the `capacity` points closest to a query point out of every
/// point offered to it.
///
/// The retained point farthest from the query sits on top of the heap;
/// its distance is the bound tree searches prune against.
pub struct NearestNeighborCollector<'a, 'q, T: 'a, D: DistanceFunction<T> + ?Sized + 'q> {
    query_point: &'q T,
    distance: &'q D,
    capacity: usize,
    heap: BinaryHeap<HeapElem<'a, D::Distance, T>>,
    distance_to_farthest: Option<D::Distance>,
}

impl<'a, 'q, T: 'a, D: DistanceFunction<T> + ?Sized + 'q> NearestNeighborCollector<'a, 'q, T, D> {
    pub fn new(query_point: &'q T, distance: &'q D, capacity: usize) -> Result<Self> {
        if capacity < 1 {
            return Err(VpTreeError::InvalidArgument("capacity must be positive"));
        }

        Ok(NearestNeighborCollector {
            query_point,
            distance,
            capacity,
            heap: BinaryHeap::with_capacity(capacity),
            distance_to_farthest: None,
        })
    }

    pub fn query_point(&self) -> &'q T {
        self.query_point
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    /// Offer a candidate. It is kept if there is room, or if it is
    /// strictly closer than the farthest point currently retained, which
    /// it then replaces.
    pub fn offer(&mut self, point: &'a T) {
        let dist = self.distance.distance(self.query_point, point);

        if self.heap.len() < self.capacity {
            self.heap.push(HeapElem { dist, item: point });
        } else {
            match self.distance_to_farthest {
                Some(farthest) if dist < farthest => {
                    self.heap.pop();
                    self.heap.push(HeapElem { dist, item: point });
                }
                _ => return,
            }
        }

        self.distance_to_farthest = self.heap.peek().map(|e| e.dist);
    }

    /// The retained point farthest from the query point.
    pub fn farthest_retained(&self) -> Option<&'a T> {
        self.heap.peek().map(|e| e.item)
    }

    /// Distance from the query point to [`farthest_retained`](Self::farthest_retained).
    pub fn distance_to_farthest(&self) -> Option<D::Distance> {
        self.distance_to_farthest
    }

    /// Distance a candidate has to beat to be retained, or `None` while
    /// there is still room for anything.
    pub fn search_radius(&self) -> Option<D::Distance> {
        if self.is_full() {
            self.distance_to_farthest
        } else {
            None
        }
    }

    /// Retained points by increasing distance from the query point.
    pub fn to_sorted_vec(&self) -> Vec<&'a T> {
        self.heap.clone().into_sorted_vec().into_iter().map(|e| e.item).collect()
    }

    pub fn into_sorted_vec(self) -> Vec<&'a T> {
        self.heap.into_sorted_vec().into_iter().map(|e| e.item).collect()
    }
}
