//! Threshold selection: picking the distance a node splits its points at.
use std::borrow::Borrow;

use rand::Rng;

use crate::error::{Result, VpTreeError};
use crate::metric::DistanceFunction;

/// Chooses the partitioning distance for a node.
///
/// Implementations may reorder `points` but must not add or remove any.
/// Ideally some points lie within the returned distance of `origin`
/// and some lie beyond it.
pub trait ThresholdSelector {
    fn select_threshold<T, D, R>(&self, points: &mut [T], origin: &T, distance: &D, rng: &mut R)
        -> Result<D::Distance>
    where
        D: DistanceFunction<T> + ?Sized,
        R: Rng + ?Sized;
}

/// Partial sort the items such that the item at `k` is the one that
/// would sit there if `items` were sorted by distance from `origin`.
/// Everything before `k` is no farther, everything after no closer.
///
/// Pivots are drawn from `rng`; expected linear time. Ties with the
/// pivot are grouped together so runs of equidistant points don't
/// degrade the search.
pub fn quick_select_by_distance<E, T, D, R>(items: &mut [E], k: usize, origin: &T, distance: &D, rng: &mut R)
where
    E: Borrow<T>,
    T: ?Sized,
    D: DistanceFunction<T> + ?Sized,
    R: Rng + ?Sized,
{
    if k >= items.len() {
        return;
    }

    let mut left = 0;
    let mut right = items.len();

    while right - left > 1 {
        let pivot_index = rng.gen_range(left..right);
        let pivot_distance = distance.distance(origin, items[pivot_index].borrow());

        // [left, closer) < pivot, [closer, i) == pivot, [farther, right) > pivot
        let mut closer = left;
        let mut farther = right;
        let mut i = left;
        while i < farther {
            let d = distance.distance(origin, items[i].borrow());
            if d < pivot_distance {
                items.swap(closer, i);
                closer += 1;
                i += 1;
            } else if d > pivot_distance {
                farther -= 1;
                items.swap(i, farther);
            } else {
                i += 1;
            }
        }

        // Narrow to (at most) one side
        if k < closer {
            right = closer;
        } else if k >= farther {
            left = farther;
        } else {
            return;
        }
    }
}

fn median_distance<E, T, D, R>(items: &mut [E], origin: &T, distance: &D, rng: &mut R) -> Result<D::Distance>
where
    E: Borrow<T>,
    T: ?Sized,
    D: DistanceFunction<T> + ?Sized,
    R: Rng + ?Sized,
{
    if items.is_empty() {
        return Err(VpTreeError::EmptyInput);
    }

    let median_index = items.len() / 2;
    quick_select_by_distance(items, median_index, origin, distance, rng);

    Ok(distance.distance(origin, items[median_index].borrow()))
}

/// Uses the exact median distance from the origin as the threshold.
///
/// ```
/// use rand::SeedableRng;
/// use rand::rngs::StdRng;
/// use vpindex::{MedianThreshold, ThresholdSelector};
///
/// let mut points = vec![2, 9, 3, 1, 6, 4, 8, 5, 7];
/// let mut rng = StdRng::seed_from_u64(7);
/// let d = |a: &i32, b: &i32| (a - b).abs() as f64;
///
/// let t = MedianThreshold.select_threshold(&mut points, &0, &d, &mut rng).unwrap();
/// assert_eq!(t, 5.0);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MedianThreshold;

impl ThresholdSelector for MedianThreshold {
    fn select_threshold<T, D, R>(&self, points: &mut [T], origin: &T, distance: &D, rng: &mut R)
        -> Result<D::Distance>
    where
        D: DistanceFunction<T> + ?Sized,
        R: Rng + ?Sized,
    {
        median_distance(points, origin, distance, rng)
    }
}

/// Uses the median distance over an evenly spaced subset of the points.
///
/// Selection cost stays bounded by the sample count no matter how large
/// a node grows, at the price of a slightly less even split.
#[derive(Debug, Clone, Copy)]
pub struct SamplingMedianThreshold {
    number_of_samples: usize,
}

impl SamplingMedianThreshold {
    pub const DEFAULT_NUMBER_OF_SAMPLES: usize = 32;

    pub fn new(number_of_samples: usize) -> Result<Self> {
        if number_of_samples < 1 {
            return Err(VpTreeError::InvalidArgument("number of samples must be positive"));
        }

        Ok(SamplingMedianThreshold { number_of_samples })
    }

    pub fn number_of_samples(&self) -> usize {
        self.number_of_samples
    }

    /// Positions sampled from a list of `len` points, or `None` if the
    /// whole list is small enough to use directly.
    pub fn sample_indices(&self, len: usize) -> Option<impl Iterator<Item = usize>> {
        let samples = self.number_of_samples;
        if len <= samples {
            return None;
        }

        // i * len can overflow usize on 32-bit targets for very large
        // nodes, so widen before multiplying.
        Some((0..samples).map(move |i| ((i as u128 * len as u128) / samples as u128) as usize))
    }
}

impl Default for SamplingMedianThreshold {
    fn default() -> Self {
        SamplingMedianThreshold { number_of_samples: Self::DEFAULT_NUMBER_OF_SAMPLES }
    }
}

impl ThresholdSelector for SamplingMedianThreshold {
    fn select_threshold<T, D, R>(&self, points: &mut [T], origin: &T, distance: &D, rng: &mut R)
        -> Result<D::Distance>
    where
        D: DistanceFunction<T> + ?Sized,
        R: Rng + ?Sized,
    {
        match self.sample_indices(points.len()) {
            Some(indices) => {
                let mut sample: Vec<&T> = indices.map(|i| &points[i]).collect();
                median_distance(&mut sample, origin, distance, rng)
            }
            None => median_distance(points, origin, distance, rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn int_distance(a: &i64, b: &i64) -> f64 {
        (a - b).abs() as f64
    }

    #[test]
    fn test_quick_select_by_distance() {
        let mut rng = StdRng::seed_from_u64(11);
        for k in 0..11 {
            let mut v: Vec<i64> = vec![2, 0, 4, 6, 5, 1, 3, 9, 7, 8, 2];
            quick_select_by_distance(&mut v, k, &0, &int_distance, &mut rng);
            for x in 0..k {
                assert!(v[x] <= v[k]);
            }
            for x in k + 1..v.len() {
                assert!(v[k] <= v[x]);
            }
        }
    }

    #[test]
    fn quick_select_with_duplicates() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut v: Vec<i64> = vec![5; 40];
        v.extend(vec![1; 10]);
        quick_select_by_distance(&mut v, 25, &0, &int_distance, &mut rng);
        assert_eq!(v[25], 5);
        assert!(v[..25].iter().all(|&x| x <= 5));
    }

    #[test]
    fn median_of_single_point() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut points = vec![7i64];
        let t = MedianThreshold.select_threshold(&mut points, &0, &int_distance, &mut rng);
        assert_eq!(t, Ok(7.0));
    }

    #[test]
    fn median_of_shuffled_list() {
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut points: Vec<i64> = vec![2, 9, 3, 1, 6, 4, 8, 5, 7];
            let t = MedianThreshold.select_threshold(&mut points, &0, &int_distance, &mut rng);
            assert_eq!(t, Ok(5.0));

            points.sort();
            assert_eq!(points, (1..10).collect::<Vec<_>>());
        }
    }

    #[test]
    fn empty_input() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut points: Vec<i64> = Vec::new();
        let t = MedianThreshold.select_threshold(&mut points, &0, &int_distance, &mut rng);
        assert_eq!(t, Err(VpTreeError::EmptyInput));

        let t = SamplingMedianThreshold::default().select_threshold(&mut points, &0, &int_distance, &mut rng);
        assert_eq!(t, Err(VpTreeError::EmptyInput));
    }

    #[test]
    fn sampled_points_are_evenly_spaced() {
        let strategy = SamplingMedianThreshold::new(5).unwrap();
        let points: Vec<i64> = (1..11).collect();

        let sampled: Vec<i64> = strategy.sample_indices(points.len()).unwrap().map(|i| points[i]).collect();
        assert_eq!(sampled, vec![1, 3, 5, 7, 9]);

        assert!(strategy.sample_indices(5).is_none());
    }

    #[test]
    fn sample_indices_on_gigantic_node() {
        let strategy = SamplingMedianThreshold::default();
        let len = 305_574_400usize;

        let indices: Vec<usize> = strategy.sample_indices(len).unwrap().collect();
        assert_eq!(indices.len(), SamplingMedianThreshold::DEFAULT_NUMBER_OF_SAMPLES);
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
        assert!(indices.iter().all(|&i| i < len));
        assert_eq!(indices[1], len / 32);
    }

    #[test]
    fn sampling_leaves_small_lists_to_the_exact_median() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut points: Vec<i64> = vec![2, 9, 3, 1, 6, 4, 8, 5, 7];
        let strategy = SamplingMedianThreshold::new(16).unwrap();
        assert_eq!(strategy.select_threshold(&mut points, &0, &int_distance, &mut rng), Ok(5.0));
    }

    #[test]
    fn zero_samples_rejected() {
        assert!(SamplingMedianThreshold::new(0).is_err());
        assert_eq!(SamplingMedianThreshold::new(3).unwrap().number_of_samples(), 3);
        assert_eq!(
            SamplingMedianThreshold::default().number_of_samples(),
            SamplingMedianThreshold::DEFAULT_NUMBER_OF_SAMPLES
        );
    }

    #[test]
    fn median_agrees_with_order_stat() {
        let mut rng = StdRng::seed_from_u64(99);
        for n in 1..60i64 {
            let mut points: Vec<i64> = (0..n).map(|i| (i * 37 + 11) % 101 - 50).collect();
            let mut distances: Vec<i64> = points.iter().map(|p| (p - 3).abs()).collect();
            let k = distances.len() / 2;
            let expected = *order_stat::kth(&mut distances, k) as f64;

            let t = MedianThreshold.select_threshold(&mut points, &3, &int_distance, &mut rng);
            assert_eq!(t, Ok(expected));
        }
    }
}
