// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! K-nearest-neighbor queries over partitioned polygon collections.
//!
//! A collection of polygons is split into disjoint [Partition]s that are
//! searched by independent parallel tasks. Each partition produces its local
//! top-k candidates, either by scanning every polygon or through a prebuilt
//! [PolygonIndex]; the per-partition lists are then merged into one globally
//! ordered top-k result.
//!
//! The engine's defining contract is that the brute-force and the
//! index-accelerated paths return identical ordered results for the same
//! inputs: both rank by the same distance function and the same total order,
//! whose tie-break is derived from each geometry's stable identity rather than
//! from traversal order.
//!
//! ```
//! use geo_types::{LineString, Point, Polygon};
//! use polygon_knn::{knn_query, Feature, Partition, PartitionIndexProvider};
//!
//! let square = |x: f64| {
//!     Polygon::new(
//!         LineString::from(vec![(x, 0.0), (x + 1.0, 0.0), (x + 1.0, 1.0), (x, 1.0), (x, 0.0)]),
//!         vec![],
//!     )
//! };
//! let partition = Partition::new(0, vec![
//!     Feature::new(square(0.0), "near"),
//!     Feature::new(square(100.0), "far"),
//! ]);
//! let provider = PartitionIndexProvider::new(vec![partition])?;
//! provider.build_all_indexes()?;
//!
//! let nearest = knn_query(&provider, &Point::new(3.0, 0.5), 1, true)?;
//! assert_eq!(*nearest[0].feature.payload(), "near");
//! # Ok::<(), polygon_knn::Error>(())
//! ```

pub mod distance;
pub mod error;
pub mod geometry;
pub mod index;
pub mod merger;
pub mod ordering;
pub mod query;
pub mod searcher;

pub use distance::{is_degenerate, polygon_distance};
pub use error::{Error, Result};
pub use geometry::{Feature, Partition, PartitionId};
pub use index::{PartitionIndexProvider, PolygonIndex};
pub use merger::merge_partition_results;
pub use ordering::{Candidate, DISTANCE_TOLERANCE};
pub use query::{knn_query, resolve, Neighbor};
pub use searcher::search_partition;
