//! A dynamic vantage point tree: a nearest-neighbor and range-search
//! index over any metric space.
//!
//! Nothing about the points is required beyond a [`DistanceFunction`]
//! that is a true metric. Points can be added and removed at any time;
//! the tree repairs its partitions as it goes.
//!
//! ```
//! use vpindex::VPTree;
//!
//! #[derive(Clone, PartialEq, Debug)]
//! struct Point { x: f64, y: f64 }
//!
//! let distance = |a: &Point, b: &Point| ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();
//!
//! let mut tree = VPTree::new(distance);
//! for i in 0..10 {
//!     for j in 0..10 {
//!         tree.add(Point { x: i as f64, y: j as f64 });
//!     }
//! }
//!
//! let nearest = tree.nearest_neighbor(&Point { x: 3.2, y: 6.9 });
//! assert_eq!(nearest, Some(&Point { x: 3.0, y: 7.0 }));
//! ```
pub mod collector;
pub mod error;
pub mod iter;
pub mod median;
pub mod metric;
mod node;
pub mod vptree;

pub use collector::NearestNeighborCollector;
pub use error::{Result, VpTreeError};
pub use iter::Iter;
pub use median::{quick_select_by_distance, MedianThreshold, SamplingMedianThreshold, ThresholdSelector};
pub use metric::{AllowAll, DistanceFunction, Float, PointFilter, Scalar};
pub use vptree::{SpatialIndex, VPTree, VPTreeBuilder, DEFAULT_NODE_CAPACITY};
