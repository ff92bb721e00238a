//! Vantage-Point Trees are a data structure for fast
//! k-nearest-neighbor and range searches in any metric space.
use std::iter;
use std::marker::PhantomData;
use std::slice;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::collector::NearestNeighborCollector;
use crate::error::{Result, VpTreeError};
use crate::iter::Iter;
use crate::median::{SamplingMedianThreshold, ThresholdSelector};
use crate::metric::{AllowAll, DistanceFunction, PointFilter, Scalar};
use crate::node::{Node, NodeContext};

/// Points a node holds before it tries to split.
pub const DEFAULT_NODE_CAPACITY: usize = 32;

/// A collection of points that can be searched for points near a query
/// point.
pub trait SpatialIndex<T> {
    type Distance: Scalar;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, point: &T) -> bool;

    fn contains_all(&self, points: &[T]) -> bool {
        points.iter().all(|p| self.contains(p))
    }

    fn add(&mut self, point: T) -> bool;

    fn add_all(&mut self, points: Vec<T>) -> bool;

    fn remove(&mut self, point: &T) -> bool;

    fn remove_all(&mut self, points: &[T]) -> bool;

    fn retain_all(&mut self, points: &[T]) -> bool;

    fn clear(&mut self);

    fn iter(&self) -> Iter<'_, T>;

    fn to_vec(&self) -> Vec<T>;

    /// Copy every point into `buffer` from index 0, growing it if needed.
    /// Returns the number of points copied.
    fn copy_to(&self, buffer: &mut Vec<T>) -> usize;

    /// Up to `max_results` points closest to `query`, nearest first.
    ///
    /// Points equidistant from the query come in no particular order,
    /// and when such points straddle the cutoff which ones make it in is
    /// unspecified.
    fn nearest_neighbors(&self, query: &T, max_results: usize) -> Result<Vec<&T>> {
        self.nearest_neighbors_filtered(query, max_results, &AllowAll)
    }

    fn nearest_neighbors_filtered(&self, query: &T, max_results: usize, filter: &dyn PointFilter<T>)
        -> Result<Vec<&T>>;

    /// Every point within `max_distance` of `query`, in no particular
    /// order.
    fn all_within_distance(&self, query: &T, max_distance: Self::Distance) -> Vec<&T> {
        self.all_within_distance_filtered(query, max_distance, &AllowAll)
    }

    fn all_within_distance_filtered(&self, query: &T, max_distance: Self::Distance, filter: &dyn PointFilter<T>)
        -> Vec<&T>;
}

/// A vantage point tree over points of type `T`.
///
/// The tree recursively partitions its points around randomly chosen
/// vantage points: each branch keeps the points no farther than a
/// threshold distance from its vantage point on one side, and all the
/// others on the other side. Searches use the triangle inequality to
/// skip whole subtrees, so nearest-neighbor and range queries take
/// expected logarithmic time for any distance function that is a
/// metric.
///
/// ```
/// use vpindex::VPTree;
///
/// let tree = VPTree::with_points(|a: &i32, b: &i32| (a - b).abs() as f64, 0..256);
///
/// let mut nearest: Vec<i32> = tree.nearest_neighbors(&128, 3).unwrap().into_iter().cloned().collect();
/// nearest.sort();
/// assert_eq!(nearest, vec![127, 128, 129]);
///
/// assert_eq!(tree.all_within_distance(&128, 32.0).len(), 65);
/// ```
///
/// The tree is not internally synchronized; share it across threads
/// behind a lock.
pub struct VPTree<T, D, S = SamplingMedianThreshold, R = StdRng>
where
    D: DistanceFunction<T>,
{
    distance: D,
    selector: S,
    node_capacity: usize,
    rng: R,
    root: Option<Node<T, D::Distance>>,
}

impl<T, D> VPTree<T, D>
where
    T: Clone + PartialEq,
    D: DistanceFunction<T>,
{
    /// An empty tree with the default threshold selector and node
    /// capacity.
    pub fn new(distance: D) -> Self {
        VPTree::from_parts(
            distance,
            SamplingMedianThreshold::default(),
            DEFAULT_NODE_CAPACITY,
            StdRng::from_entropy(),
        )
    }

    /// A tree holding `points`, with the default threshold selector and
    /// node capacity. Building from all the points at once is cheaper
    /// than adding them one at a time.
    pub fn with_points<I: IntoIterator<Item = T>>(distance: D, points: I) -> Self {
        let mut tree = VPTree::new(distance);
        tree.add_all(points);
        tree
    }

    pub fn builder(distance: D) -> VPTreeBuilder<T, D> {
        VPTreeBuilder::new(distance)
    }
}

impl<T, D, S, R> VPTree<T, D, S, R>
where
    T: Clone + PartialEq,
    D: DistanceFunction<T>,
    S: ThresholdSelector,
    R: Rng,
{
    fn from_parts(distance: D, selector: S, node_capacity: usize, rng: R) -> Self {
        VPTree { distance, selector, node_capacity, rng, root: None }
    }

    pub fn distance_function(&self) -> &D {
        &self.distance
    }

    pub fn threshold_selector(&self) -> &S {
        &self.selector
    }

    pub fn node_capacity(&self) -> usize {
        self.node_capacity
    }

    pub fn len(&self) -> usize {
        self.root.as_ref().map_or(0, |root| root.len())
    }

    pub fn is_empty(&self) -> bool {
        self.root.as_ref().map_or(true, |root| root.is_empty())
    }

    pub fn contains(&self, point: &T) -> bool {
        self.root.as_ref().map_or(false, |root| root.contains(point, &self.distance))
    }

    pub fn contains_all(&self, points: &[T]) -> bool {
        points.iter().all(|p| self.contains(p))
    }

    /// Add a point. Always modifies the tree, so always returns `true`.
    pub fn add(&mut self, point: T) -> bool {
        self.add_all(iter::once(point))
    }

    /// Add every point. Returns whether there were any.
    ///
    /// An empty tree is built from scratch over the new points; otherwise
    /// each point goes to the leaf covering it and the tree is annealed
    /// once afterwards.
    pub fn add_all<I: IntoIterator<Item = T>>(&mut self, points: I) -> bool {
        let mut ctx = NodeContext {
            distance: &self.distance,
            selector: &self.selector,
            capacity: self.node_capacity,
            rng: &mut self.rng,
        };

        match self.root.as_mut() {
            Some(root) => {
                let mut modified = false;
                for point in points {
                    root.add(point, &mut ctx);
                    modified = true;
                }

                if modified {
                    root.anneal(&mut ctx);
                }
                modified
            }
            None => {
                let points: Vec<T> = points.into_iter().collect();
                if points.is_empty() {
                    return false;
                }

                debug!("building root node over {} points", points.len());
                self.root = Some(Node::build(points, &mut ctx));
                true
            }
        }
    }

    /// Remove one instance of `point`. Returns whether it was present.
    pub fn remove(&mut self, point: &T) -> bool {
        self.remove_all(slice::from_ref(point))
    }

    /// Remove one instance of each of `points`. Returns whether anything
    /// was removed.
    pub fn remove_all(&mut self, points: &[T]) -> bool {
        let mut ctx = NodeContext {
            distance: &self.distance,
            selector: &self.selector,
            capacity: self.node_capacity,
            rng: &mut self.rng,
        };

        let root = match self.root.as_mut() {
            Some(root) => root,
            None => return false,
        };

        let mut removed = false;
        for point in points {
            removed |= root.remove(point, &mut ctx);
        }

        if removed {
            root.anneal(&mut ctx);
            if root.is_empty() {
                self.root = None;
            }
        }

        removed
    }

    /// Keep only points that appear in `points`. Returns whether anything
    /// was removed.
    pub fn retain_all(&mut self, points: &[T]) -> bool {
        self.retain(|p| points.contains(p))
    }

    /// Keep only points `keep` accepts. Returns whether anything was
    /// removed.
    pub fn retain<P: FnMut(&T) -> bool>(&mut self, mut keep: P) -> bool {
        let mut ctx = NodeContext {
            distance: &self.distance,
            selector: &self.selector,
            capacity: self.node_capacity,
            rng: &mut self.rng,
        };

        let root = match self.root.as_mut() {
            Some(root) => root,
            None => return false,
        };

        let modified = root.retain(&mut keep, &mut ctx);

        if modified {
            root.anneal(&mut ctx);
            if root.is_empty() {
                self.root = None;
            }
        }

        modified
    }

    pub fn clear(&mut self) {
        self.root = None;
    }

    /// Iterate over every point, in no meaningful order.
    pub fn iter(&self) -> Iter<'_, T> {
        let mut buckets = Vec::new();
        if let Some(root) = &self.root {
            root.collect_bucket_iters(&mut buckets);
        }
        Iter::new(buckets)
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    /// Copy every point into `buffer` starting at index 0, growing it if
    /// it is too short. Anything past the copied points is left alone.
    /// Returns the number of points copied.
    pub fn copy_to(&self, buffer: &mut Vec<T>) -> usize {
        let mut copied = 0;
        for point in self.iter() {
            match buffer.get_mut(copied) {
                Some(slot) => slot.clone_from(point),
                None => buffer.push(point.clone()),
            }
            copied += 1;
        }
        copied
    }

    /// The point closest to `query`, if there are any points.
    pub fn nearest_neighbor(&self, query: &T) -> Option<&T> {
        let mut collector = NearestNeighborCollector::new(query, &self.distance, 1).ok()?;
        self.root.as_ref()?.collect_nearest_neighbors(&mut collector, &self.distance, &AllowAll);
        collector.farthest_retained()
    }

    /// Up to `max_results` points closest to `query`, nearest first.
    ///
    /// Fails if `max_results` is zero.
    pub fn nearest_neighbors(&self, query: &T, max_results: usize) -> Result<Vec<&T>> {
        self.nearest_neighbors_filtered(query, max_results, &AllowAll)
    }

    /// Up to `max_results` points accepted by `filter` closest to
    /// `query`, nearest first.
    pub fn nearest_neighbors_filtered<P>(&self, query: &T, max_results: usize, filter: &P) -> Result<Vec<&T>>
    where
        P: PointFilter<T> + ?Sized,
    {
        if max_results < 1 {
            return Err(VpTreeError::InvalidArgument("max_results must be positive"));
        }

        let root = match &self.root {
            Some(root) => root,
            None => return Ok(Vec::new()),
        };

        let mut collector = NearestNeighborCollector::new(query, &self.distance, max_results)?;
        root.collect_nearest_neighbors(&mut collector, &self.distance, filter);

        Ok(collector.into_sorted_vec())
    }

    /// Every point within `max_distance` of `query`, in no particular
    /// order.
    pub fn all_within_distance(&self, query: &T, max_distance: D::Distance) -> Vec<&T> {
        self.all_within_distance_filtered(query, max_distance, &AllowAll)
    }

    /// Every point accepted by `filter` within `max_distance` of `query`.
    pub fn all_within_distance_filtered<P>(&self, query: &T, max_distance: D::Distance, filter: &P) -> Vec<&T>
    where
        P: PointFilter<T> + ?Sized,
    {
        let mut within = Vec::new();
        if let Some(root) = &self.root {
            root.collect_all_within_distance(query, max_distance, &self.distance, &mut within, filter);
        }
        within
    }
}

impl<T, D, S, R> SpatialIndex<T> for VPTree<T, D, S, R>
where
    T: Clone + PartialEq,
    D: DistanceFunction<T>,
    S: ThresholdSelector,
    R: Rng,
{
    type Distance = D::Distance;

    fn len(&self) -> usize {
        VPTree::len(self)
    }

    fn contains(&self, point: &T) -> bool {
        VPTree::contains(self, point)
    }

    fn add(&mut self, point: T) -> bool {
        VPTree::add(self, point)
    }

    fn add_all(&mut self, points: Vec<T>) -> bool {
        VPTree::add_all(self, points)
    }

    fn remove(&mut self, point: &T) -> bool {
        VPTree::remove(self, point)
    }

    fn remove_all(&mut self, points: &[T]) -> bool {
        VPTree::remove_all(self, points)
    }

    fn retain_all(&mut self, points: &[T]) -> bool {
        VPTree::retain_all(self, points)
    }

    fn clear(&mut self) {
        VPTree::clear(self)
    }

    fn iter(&self) -> Iter<'_, T> {
        VPTree::iter(self)
    }

    fn to_vec(&self) -> Vec<T> {
        VPTree::to_vec(self)
    }

    fn copy_to(&self, buffer: &mut Vec<T>) -> usize {
        VPTree::copy_to(self, buffer)
    }

    fn nearest_neighbors(&self, query: &T, max_results: usize) -> Result<Vec<&T>> {
        VPTree::nearest_neighbors(self, query, max_results)
    }

    fn nearest_neighbors_filtered(&self, query: &T, max_results: usize, filter: &dyn PointFilter<T>)
        -> Result<Vec<&T>>
    {
        VPTree::nearest_neighbors_filtered(self, query, max_results, filter)
    }

    fn all_within_distance(&self, query: &T, max_distance: D::Distance) -> Vec<&T> {
        VPTree::all_within_distance(self, query, max_distance)
    }

    fn all_within_distance_filtered(&self, query: &T, max_distance: D::Distance, filter: &dyn PointFilter<T>)
        -> Vec<&T>
    {
        VPTree::all_within_distance_filtered(self, query, max_distance, filter)
    }
}

impl<T, D, S, R> Extend<T> for VPTree<T, D, S, R>
where
    T: Clone + PartialEq,
    D: DistanceFunction<T>,
    S: ThresholdSelector,
    R: Rng,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, points: I) {
        self.add_all(points);
    }
}

impl<'a, T, D, S, R> IntoIterator for &'a VPTree<T, D, S, R>
where
    T: Clone + PartialEq,
    D: DistanceFunction<T>,
    S: ThresholdSelector,
    R: Rng,
{
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

/// Configures a [`VPTree`] before building it.
///
/// ```
/// use vpindex::{MedianThreshold, VPTree};
///
/// let tree = VPTree::builder(|a: &f64, b: &f64| (a - b).abs())
///     .threshold_selector(MedianThreshold)
///     .node_capacity(8)
///     .seed(17)
///     .build_with((0..100).map(|i| i as f64 / 10.0))
///     .unwrap();
///
/// assert_eq!(tree.len(), 100);
/// assert_eq!(tree.nearest_neighbor(&4.93), Some(&4.9));
/// ```
pub struct VPTreeBuilder<T, D, S = SamplingMedianThreshold, R = StdRng> {
    distance: D,
    selector: S,
    node_capacity: usize,
    rng: R,
    points: PhantomData<fn() -> T>,
}

impl<T, D> VPTreeBuilder<T, D> {
    pub fn new(distance: D) -> Self {
        VPTreeBuilder {
            distance,
            selector: SamplingMedianThreshold::default(),
            node_capacity: DEFAULT_NODE_CAPACITY,
            rng: StdRng::from_entropy(),
            points: PhantomData,
        }
    }
}

impl<T, D, S> VPTreeBuilder<T, D, S, StdRng> {
    /// Seed the tree's random source so its shape is reproducible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }
}

impl<T, D, S, R> VPTreeBuilder<T, D, S, R> {
    pub fn threshold_selector<S2: ThresholdSelector>(self, selector: S2) -> VPTreeBuilder<T, D, S2, R> {
        VPTreeBuilder {
            distance: self.distance,
            selector,
            node_capacity: self.node_capacity,
            rng: self.rng,
            points: PhantomData,
        }
    }

    /// Points a node may hold before it tries to split. Must be positive.
    ///
    /// Splits happen at the upper median distance, which for two points
    /// is the distance to the far one, so a pair never splits. A capacity
    /// of 1 therefore behaves like 2 or 3 in practice.
    pub fn node_capacity(mut self, node_capacity: usize) -> Self {
        self.node_capacity = node_capacity;
        self
    }

    /// Random source for vantage points and quickselect pivots.
    pub fn rng<R2: Rng>(self, rng: R2) -> VPTreeBuilder<T, D, S, R2> {
        VPTreeBuilder {
            distance: self.distance,
            selector: self.selector,
            node_capacity: self.node_capacity,
            rng,
            points: PhantomData,
        }
    }

    pub fn build(self) -> Result<VPTree<T, D, S, R>>
    where
        T: Clone + PartialEq,
        D: DistanceFunction<T>,
        S: ThresholdSelector,
        R: Rng,
    {
        if self.node_capacity < 1 {
            return Err(VpTreeError::InvalidArgument("node capacity must be positive"));
        }

        Ok(VPTree::from_parts(self.distance, self.selector, self.node_capacity, self.rng))
    }

    pub fn build_with<I>(self, points: I) -> Result<VPTree<T, D, S, R>>
    where
        T: Clone + PartialEq,
        D: DistanceFunction<T>,
        S: ThresholdSelector,
        R: Rng,
        I: IntoIterator<Item = T>,
    {
        let mut tree = self.build()?;
        tree.add_all(points);
        Ok(tree)
    }
}
