//! Recursive partitioning nodes of a vantage point tree.
//!
//! A node is either a leaf holding a bucket of points, or a branch that
//! splits its points around a vantage point: everything no farther than
//! `threshold` from it lives under `closer`, everything else under
//! `farther`. Both children of a branch are non-empty once any mutation
//! has settled.
use std::mem;
use std::slice;

use log::{debug, trace, warn};
use rand::Rng;

use crate::collector::NearestNeighborCollector;
use crate::median::ThresholdSelector;
use crate::metric::{DistanceFunction, PointFilter, Scalar};

/// What every node consults while (re)partitioning its points.
pub(crate) struct NodeContext<'a, D: ?Sized, S, R: ?Sized> {
    pub distance: &'a D,
    pub selector: &'a S,
    pub capacity: usize,
    pub rng: &'a mut R,
}

/// The points could not be split into two non-empty sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PartitionFailed;

/// Reorder `points` so everything within `threshold` of `vantage_point`
/// comes first, and return the index of the first point beyond it.
///
/// Fails if every point landed on the same side, which happens when all
/// points are equidistant from the vantage point.
fn partition_points<T, D>(points: &mut [T], vantage_point: &T, threshold: D::Distance, distance: &D)
    -> Result<usize, PartitionFailed>
where
    D: DistanceFunction<T> + ?Sized,
{
    // [0, i) is within threshold, [j, len) is beyond it
    let mut i = 0;
    let mut j = points.len();

    while i < j {
        if distance.distance(vantage_point, &points[i]) <= threshold {
            i += 1;
        } else {
            j -= 1;
            points.swap(i, j);
        }
    }

    if i == 0 || i == points.len() {
        Err(PartitionFailed)
    } else {
        Ok(i)
    }
}

pub(crate) enum Node<T, F> {
    Leaf(Vec<T>),
    Branch {
        vantage_point: T,
        threshold: F,
        closer: Box<Node<T, F>>,
        farther: Box<Node<T, F>>,
    },
}

impl<T: Clone + PartialEq, F: Scalar> Node<T, F> {
    /// Build a node over `points`, partitioning them into children if
    /// there are more than the context's capacity.
    ///
    /// The node may end up holding more than `capacity` points if they
    /// could not be partitioned.
    pub fn build<D, S, R>(points: Vec<T>, ctx: &mut NodeContext<'_, D, S, R>) -> Self
    where
        D: DistanceFunction<T, Distance = F> + ?Sized,
        S: ThresholdSelector,
        R: Rng + ?Sized,
    {
        if points.len() > ctx.capacity {
            Node::split(points, ctx)
        } else {
            Node::Leaf(points)
        }
    }

    /// Pick a random vantage point and try to split `points` around the
    /// median distance from it. Falls back to a single leaf.
    fn split<D, S, R>(mut points: Vec<T>, ctx: &mut NodeContext<'_, D, S, R>) -> Self
    where
        D: DistanceFunction<T, Distance = F> + ?Sized,
        S: ThresholdSelector,
        R: Rng + ?Sized,
    {
        let vantage_point = points[ctx.rng.gen_range(0..points.len())].clone();

        let threshold = match ctx.selector.select_threshold(points.as_mut_slice(), &vantage_point, ctx.distance, &mut *ctx.rng) {
            Ok(threshold) => threshold,
            Err(e) => {
                warn!("threshold selection over {} points failed: {}", points.len(), e);
                return Node::Leaf(points);
            }
        };

        match partition_points(points.as_mut_slice(), &vantage_point, threshold, ctx.distance) {
            Ok(first_beyond_threshold) => {
                let farther_points = points.split_off(first_beyond_threshold);
                let closer = Box::new(Node::build(points, ctx));
                let farther = Box::new(Node::build(farther_points, ctx));

                Node::Branch { vantage_point, threshold, closer, farther }
            }
            Err(PartitionFailed) => {
                trace!("could not partition {} points; keeping an oversized leaf", points.len());
                Node::Leaf(points)
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Node::Leaf(points) => points.len(),
            Node::Branch { closer, farther, .. } => closer.len() + farther.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Node::Leaf(points) => points.is_empty(),
            Node::Branch { closer, farther, .. } => closer.is_empty() && farther.is_empty(),
        }
    }

    fn move_points_into(self, out: &mut Vec<T>) {
        match self {
            Node::Leaf(points) => out.extend(points),
            Node::Branch { closer, farther, .. } => {
                closer.move_points_into(out);
                farther.move_points_into(out);
            }
        }
    }

    /// Take every point out of this node, leaving an empty leaf behind.
    pub fn take_points(&mut self) -> Vec<T> {
        let mut points = Vec::with_capacity(self.len());
        mem::replace(self, Node::Leaf(Vec::new())).move_points_into(&mut points);
        points
    }

    /// A branch with an empty side no longer separates anything: gather
    /// both sides back up and partition from scratch.
    fn collapse_if_hollow<D, S, R>(&mut self, ctx: &mut NodeContext<'_, D, S, R>)
    where
        D: DistanceFunction<T, Distance = F> + ?Sized,
        S: ThresholdSelector,
        R: Rng + ?Sized,
    {
        let hollow = match self {
            Node::Branch { closer, farther, .. } => closer.is_empty() || farther.is_empty(),
            Node::Leaf(_) => false,
        };

        if hollow {
            let points = self.take_points();
            debug!("collapsing branch and re-partitioning {} points", points.len());
            *self = Node::build(points, ctx);
        }
    }

    /// Repair the whole subtree after a batch of mutations: rebuild
    /// branches with an empty side, and retry splitting leaves that are
    /// over capacity.
    pub fn anneal<D, S, R>(&mut self, ctx: &mut NodeContext<'_, D, S, R>)
    where
        D: DistanceFunction<T, Distance = F> + ?Sized,
        S: ThresholdSelector,
        R: Rng + ?Sized,
    {
        match self {
            Node::Branch { closer, farther, .. } if !closer.is_empty() && !farther.is_empty() => {
                closer.anneal(ctx);
                farther.anneal(ctx);
            }
            Node::Branch { .. } => self.collapse_if_hollow(ctx),
            Node::Leaf(points) if points.len() > ctx.capacity => {
                let points = mem::take(points);
                *self = Node::split(points, ctx);
            }
            Node::Leaf(_) => {}
        }
    }

    /// Add a point below this node. A leaf pushed over capacity tries to
    /// split; if it can't, it just stays oversized.
    pub fn add<D, S, R>(&mut self, point: T, ctx: &mut NodeContext<'_, D, S, R>)
    where
        D: DistanceFunction<T, Distance = F> + ?Sized,
        S: ThresholdSelector,
        R: Rng + ?Sized,
    {
        let overfull = match self {
            Node::Branch { vantage_point, threshold, closer, farther } => {
                if ctx.distance.distance(vantage_point, &point) <= *threshold {
                    closer.add(point, ctx);
                } else {
                    farther.add(point, ctx);
                }
                false
            }
            Node::Leaf(points) => {
                points.push(point);
                points.len() > ctx.capacity
            }
        };

        if overfull {
            let points = self.take_points();
            *self = Node::split(points, ctx);
        }
    }

    /// Remove one instance of `point`. Returns whether anything was
    /// removed.
    pub fn remove<D, S, R>(&mut self, point: &T, ctx: &mut NodeContext<'_, D, S, R>) -> bool
    where
        D: DistanceFunction<T, Distance = F> + ?Sized,
        S: ThresholdSelector,
        R: Rng + ?Sized,
    {
        let removed = match self {
            Node::Branch { vantage_point, threshold, closer, farther } => {
                if ctx.distance.distance(vantage_point, point) <= *threshold {
                    closer.remove(point, ctx)
                } else {
                    farther.remove(point, ctx)
                }
            }
            Node::Leaf(points) => match points.iter().position(|p| p == point) {
                Some(index) => {
                    points.swap_remove(index);
                    true
                }
                None => false,
            },
        };

        if removed {
            self.collapse_if_hollow(ctx);
        }

        removed
    }

    /// Keep only the points `keep` accepts. Returns whether anything was
    /// removed.
    pub fn retain<P, D, S, R>(&mut self, keep: &mut P, ctx: &mut NodeContext<'_, D, S, R>) -> bool
    where
        P: FnMut(&T) -> bool,
        D: DistanceFunction<T, Distance = F> + ?Sized,
        S: ThresholdSelector,
        R: Rng + ?Sized,
    {
        let modified = match self {
            Node::Branch { closer, farther, .. } => {
                let modified_closer = closer.retain(keep, ctx);
                let modified_farther = farther.retain(keep, ctx);
                modified_closer || modified_farther
            }
            Node::Leaf(points) => {
                let before = points.len();
                points.retain(|p| keep(p));
                points.len() != before
            }
        };

        if modified {
            self.collapse_if_hollow(ctx);
        }

        modified
    }

    pub fn contains<D>(&self, point: &T, distance: &D) -> bool
    where
        D: DistanceFunction<T, Distance = F> + ?Sized,
    {
        match self {
            Node::Branch { vantage_point, threshold, closer, farther } => {
                if distance.distance(vantage_point, point) <= *threshold {
                    closer.contains(point, distance)
                } else {
                    farther.contains(point, distance)
                }
            }
            Node::Leaf(points) => points.contains(point),
        }
    }

    /// Offer every point that could be among the query's nearest
    /// neighbors to `collector`.
    ///
    /// The side of the threshold the query point falls on is searched
    /// first; the other side is only searched if, by the triangle
    /// inequality, it might hold something closer than the farthest
    /// point collected so far.
    pub fn collect_nearest_neighbors<'a, D, P>(
        &'a self,
        collector: &mut NearestNeighborCollector<'a, '_, T, D>,
        distance: &D,
        filter: &P,
    ) where
        D: DistanceFunction<T, Distance = F> + ?Sized,
        P: PointFilter<T> + ?Sized,
    {
        match self {
            Node::Branch { vantage_point, threshold, closer, farther } => {
                let threshold = *threshold;
                let d_vantage = distance.distance(vantage_point, collector.query_point());

                if d_vantage <= threshold {
                    closer.collect_nearest_neighbors(collector, distance, filter);

                    // Everything farther is at least threshold - d_vantage away.
                    let search_farther = match collector.search_radius() {
                        Some(radius) => radius > threshold - d_vantage,
                        None => true,
                    };
                    if search_farther {
                        farther.collect_nearest_neighbors(collector, distance, filter);
                    }
                } else {
                    farther.collect_nearest_neighbors(collector, distance, filter);

                    // Everything closer is at least d_vantage - threshold away.
                    let search_closer = match collector.search_radius() {
                        Some(radius) => d_vantage - threshold <= radius,
                        None => true,
                    };
                    if search_closer {
                        closer.collect_nearest_neighbors(collector, distance, filter);
                    }
                }
            }
            Node::Leaf(points) => {
                for point in points {
                    if filter.allow(point) {
                        collector.offer(point);
                    }
                }
            }
        }
    }

    /// Push every point within `max_distance` of `query` onto `out`.
    pub fn collect_all_within_distance<'a, D, P>(
        &'a self,
        query: &T,
        max_distance: F,
        distance: &D,
        out: &mut Vec<&'a T>,
        filter: &P,
    ) where
        D: DistanceFunction<T, Distance = F> + ?Sized,
        P: PointFilter<T> + ?Sized,
    {
        match self {
            Node::Branch { vantage_point, threshold, closer, farther } => {
                let d_vantage = distance.distance(vantage_point, query);

                if d_vantage <= *threshold + max_distance {
                    closer.collect_all_within_distance(query, max_distance, distance, out, filter);
                }

                if d_vantage + max_distance > *threshold {
                    farther.collect_all_within_distance(query, max_distance, distance, out, filter);
                }
            }
            Node::Leaf(points) => {
                for point in points {
                    if filter.allow(point) && distance.distance(query, point) <= max_distance {
                        out.push(point);
                    }
                }
            }
        }
    }

    /// Gather an iterator over every leaf bucket, closer sides first.
    pub fn collect_bucket_iters<'a>(&'a self, out: &mut Vec<slice::Iter<'a, T>>) {
        match self {
            Node::Branch { closer, farther, .. } => {
                closer.collect_bucket_iters(out);
                farther.collect_bucket_iters(out);
            }
            Node::Leaf(points) => out.push(points.iter()),
        }
    }
}

#[cfg(test)]
impl<T: Clone + PartialEq, F: Scalar> Node<T, F> {
    fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    /// Check the partition invariant for every branch below this one.
    fn is_consistent<D>(&self, distance: &D) -> bool
    where
        D: DistanceFunction<T, Distance = F> + ?Sized,
    {
        match self {
            Node::Leaf(_) => true,
            Node::Branch { vantage_point, threshold, closer, farther } => {
                let mut iters = Vec::new();
                closer.collect_bucket_iters(&mut iters);
                let closer_ok = iters.into_iter().flatten().all(|p| distance.distance(vantage_point, p) <= *threshold);

                let mut iters = Vec::new();
                farther.collect_bucket_iters(&mut iters);
                let farther_ok = iters.into_iter().flatten().all(|p| distance.distance(vantage_point, p) > *threshold);

                closer_ok && farther_ok && closer.is_consistent(distance) && farther.is_consistent(distance)
            }
        }
    }

    fn has_hollow_branch(&self) -> bool {
        match self {
            Node::Leaf(_) => false,
            Node::Branch { closer, farther, .. } => {
                closer.is_empty() || farther.is_empty() || closer.has_hollow_branch() || farther.has_hollow_branch()
            }
        }
    }
}
