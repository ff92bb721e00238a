//! The contracts a point type has to meet to live in the tree.
use std::fmt::Debug;

pub use num::Float;

/// Numeric type a distance function reports.
pub trait Scalar: Float + Debug {}
impl<T: Float + Debug> Scalar for T {}

/// A distance between two points.
///
/// Implementations must form a metric: non-negative, zero only for
/// identical points, symmetric, and obeying the triangle inequality.
/// None of this is checked; a function that breaks the contract gives
/// wrong partitions and wrong search results.
///
/// Any `Fn(&T, &T) -> F` closure is a distance function:
///
/// ```
/// use vpindex::DistanceFunction;
///
/// let d = |a: &i32, b: &i32| (a - b).abs() as f64;
/// assert_eq!(d.distance(&3, &-4), 7.0);
/// ```
pub trait DistanceFunction<T: ?Sized> {
    type Distance: Scalar;

    fn distance(&self, a: &T, b: &T) -> Self::Distance;
}

impl<T, F, C> DistanceFunction<T> for C
where
    T: ?Sized,
    F: Scalar,
    C: Fn(&T, &T) -> F,
{
    type Distance = F;

    #[inline]
    fn distance(&self, a: &T, b: &T) -> F {
        self(a, b)
    }
}

/// Decides whether a point may appear in a query's results.
///
/// Filters are only consulted for points in leaf buckets and never
/// influence which subtrees get visited.
pub trait PointFilter<T: ?Sized> {
    fn allow(&self, point: &T) -> bool;
}

impl<T, C> PointFilter<T> for C
where
    T: ?Sized,
    C: Fn(&T) -> bool,
{
    #[inline]
    fn allow(&self, point: &T) -> bool {
        self(point)
    }
}

/// The filter used when a query doesn't supply one.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl<T: ?Sized> PointFilter<T> for AllowAll {
    #[inline]
    fn allow(&self, _: &T) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Taxicab;

    impl DistanceFunction<(i32, i32)> for Taxicab {
        type Distance = f32;

        fn distance(&self, a: &(i32, i32), b: &(i32, i32)) -> f32 {
            ((a.0 - b.0).abs() + (a.1 - b.1).abs()) as f32
        }
    }

    #[test]
    fn closures_and_structs_are_metrics() {
        let d = |a: &f64, b: &f64| (a - b).abs();
        assert_eq!(d.distance(&1.5, &-0.5), 2.0);
        assert_eq!(Taxicab.distance(&(0, 0), &(3, -4)), 7.0);
    }

    #[test]
    fn filters() {
        let even = |p: &i32| p % 2 == 0;
        assert!(even.allow(&4));
        assert!(!even.allow(&5));
        assert!(PointFilter::<i32>::allow(&AllowAll, &5));
    }
}
