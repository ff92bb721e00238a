//! Property-based tests checking tree queries against brute force scans.
//!
//! Points live on a small integer grid under the taxicab metric so every
//! distance is exact and ties are common.

use proptest::prelude::*;
use vpindex::{MedianThreshold, SamplingMedianThreshold, VPTree};

type Point = (i32, i32);

fn taxicab(a: &Point, b: &Point) -> f64 {
    ((a.0 - b.0).abs() + (a.1 - b.1).abs()) as f64
}

fn arb_point() -> impl Strategy<Value = Point> {
    (-40i32..40, -40i32..40)
}

fn arb_points(max_len: usize) -> impl Strategy<Value = Vec<Point>> {
    proptest::collection::vec(arb_point(), 0..max_len)
}

fn sorted_distances(query: &Point, points: &[&Point]) -> Vec<f64> {
    let mut distances: Vec<f64> = points.iter().map(|p| taxicab(query, p)).collect();
    distances.sort_by(|a, b| a.partial_cmp(b).unwrap());
    distances
}

fn brute_force_nearest(points: &[Point], query: &Point, k: usize) -> Vec<f64> {
    let all: Vec<&Point> = points.iter().collect();
    let mut distances = sorted_distances(query, &all);
    distances.truncate(k);
    distances
}

fn brute_force_within(points: &[Point], query: &Point, max_distance: f64) -> Vec<Point> {
    let mut within: Vec<Point> = points.iter().filter(|p| taxicab(query, p) <= max_distance).cloned().collect();
    within.sort();
    within
}

fn sorted(points: Vec<&Point>) -> Vec<Point> {
    let mut points: Vec<Point> = points.into_iter().cloned().collect();
    points.sort();
    points
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        ..ProptestConfig::default()
    })]

    /// Nearest neighbors agree with a linear scan. Which of several
    /// equidistant points make the cut is unspecified, so only the
    /// distances are compared.
    #[test]
    fn nearest_neighbors_match_brute_force(
        points in arb_points(300),
        query in arb_point(),
        k in 1usize..20,
        capacity in 1usize..16,
        seed in any::<u64>()
    ) {
        let tree = VPTree::builder(taxicab)
            .node_capacity(capacity)
            .seed(seed)
            .build_with(points.clone())
            .unwrap();

        let found = tree.nearest_neighbors(&query, k).unwrap();
        let found_distances: Vec<f64> = found.iter().map(|p| taxicab(&query, p)).collect();

        prop_assert!(found_distances.windows(2).all(|w| w[0] <= w[1]), "results not sorted: {:?}", found_distances);
        prop_assert_eq!(found_distances, brute_force_nearest(&points, &query, k));
    }

    /// Range queries return exactly the points a linear scan finds.
    #[test]
    fn all_within_distance_matches_brute_force(
        points in arb_points(300),
        query in arb_point(),
        radius in 0i32..30,
        capacity in 1usize..16,
        seed in any::<u64>()
    ) {
        let tree = VPTree::builder(taxicab)
            .threshold_selector(MedianThreshold)
            .node_capacity(capacity)
            .seed(seed)
            .build_with(points.clone())
            .unwrap();

        let radius = radius as f64;
        prop_assert_eq!(sorted(tree.all_within_distance(&query, radius)), brute_force_within(&points, &query, radius));
    }

    /// Trees grown one point at a time answer the same as bulk-built ones.
    #[test]
    fn incremental_tree_matches_brute_force(
        points in arb_points(200),
        query in arb_point(),
        k in 1usize..10,
        seed in any::<u64>()
    ) {
        let mut tree = VPTree::builder(taxicab)
            .threshold_selector(SamplingMedianThreshold::new(4).unwrap())
            .node_capacity(3)
            .seed(seed)
            .build()
            .unwrap();
        for p in &points {
            tree.add(*p);
        }

        prop_assert_eq!(tree.len(), points.len());

        let found = tree.nearest_neighbors(&query, k).unwrap();
        prop_assert_eq!(sorted_distances(&query, &found), brute_force_nearest(&points, &query, k));
        prop_assert_eq!(sorted(tree.all_within_distance(&query, 10.0)), brute_force_within(&points, &query, 10.0));
    }

    /// Removing points keeps every remaining one reachable and queries
    /// exact.
    #[test]
    fn removals_keep_the_tree_exact(
        points in arb_points(200),
        removals in proptest::collection::vec(any::<prop::sample::Index>(), 0..150),
        query in arb_point(),
        capacity in 1usize..8,
        seed in any::<u64>()
    ) {
        let mut tree = VPTree::builder(taxicab)
            .node_capacity(capacity)
            .seed(seed)
            .build_with(points.clone())
            .unwrap();

        let mut remaining = points.clone();
        for index in removals {
            if remaining.is_empty() {
                break;
            }
            let victim = remaining.swap_remove(index.index(remaining.len()));
            prop_assert!(tree.remove(&victim));
        }

        prop_assert_eq!(tree.len(), remaining.len());
        for p in &remaining {
            prop_assert!(tree.contains(p));
        }

        let mut everything = tree.to_vec();
        everything.sort();
        let mut expected = remaining.clone();
        expected.sort();
        prop_assert_eq!(everything, expected);

        if !remaining.is_empty() {
            let found = tree.nearest_neighbors(&query, 5).unwrap();
            prop_assert_eq!(sorted_distances(&query, &found), brute_force_nearest(&remaining, &query, 5));
        }
        prop_assert_eq!(sorted(tree.all_within_distance(&query, 8.0)), brute_force_within(&remaining, &query, 8.0));
    }

    /// Filtered queries only ever see points the filter accepts.
    #[test]
    fn filtered_queries_match_brute_force(
        points in arb_points(200),
        query in arb_point(),
        k in 1usize..10,
        seed in any::<u64>()
    ) {
        let tree = VPTree::builder(taxicab).node_capacity(4).seed(seed).build_with(points.clone()).unwrap();
        let upper_half = |p: &Point| p.1 >= 0;
        let accepted: Vec<Point> = points.iter().filter(|p| upper_half(*p)).cloned().collect();

        let found = tree.nearest_neighbors_filtered(&query, k, &upper_half).unwrap();
        prop_assert!(found.iter().all(|p| upper_half(*p)));
        prop_assert_eq!(sorted_distances(&query, &found), brute_force_nearest(&accepted, &query, k));

        let within = tree.all_within_distance_filtered(&query, 12.0, &upper_half);
        prop_assert_eq!(sorted(within), brute_force_within(&accepted, &query, 12.0));
    }
}
