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

//! Per-partition KNN search.

use geo_types::Point;

use crate::distance::polygon_distance;
use crate::error::{Error, Result};
use crate::geometry::Partition;
use crate::index::PolygonIndex;
use crate::ordering::{BoundedCandidateHeap, Candidate};

/// A partition's local top-k candidates for `query`, ascending under the
/// shared ordering.
///
/// With `use_index = false` every polygon is scanned and the k smallest
/// distances are retained in a bounded heap, keeping memory O(k). With
/// `use_index = true` a prebuilt index is required; a missing index is
/// [Error::IndexUnavailable] rather than a silent fallback, so index cost is
/// never incurred mid-query and the caller always knows which path ran.
///
/// Both paths return set-equal, order-equal results for the same inputs.
/// `k == 0` is a documented no-op yielding an empty list. Neither the
/// partition nor the index is mutated.
pub fn search_partition<P>(
    partition: &Partition<P>,
    index: Option<&PolygonIndex>,
    query: &Point<f64>,
    k: usize,
    use_index: bool,
) -> Result<Vec<Candidate>> {
    if !query.x().is_finite() || !query.y().is_finite() {
        return Err(Error::InvalidInput(format!(
            "query point coordinates must be finite, got ({}, {})",
            query.x(),
            query.y()
        )));
    }
    if k == 0 {
        return Ok(Vec::new());
    }

    if use_index {
        let index = index.ok_or(Error::IndexUnavailable {
            partition_id: partition.id(),
        })?;
        index.nearest(partition, query, k)
    } else {
        let mut best = BoundedCandidateHeap::new(k);
        for (local_index, feature) in partition.features().iter().enumerate() {
            let distance = polygon_distance(query, feature.polygon());
            best.push(Candidate::new(distance, partition.id(), local_index as u32));
        }
        Ok(best.into_sorted_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Feature;
    use geo_types::{LineString, Polygon};
    use rstest::rstest;

    fn square(min_x: f64, min_y: f64, size: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (min_x, min_y),
                (min_x + size, min_y),
                (min_x + size, min_y + size),
                (min_x, min_y + size),
                (min_x, min_y),
            ]),
            vec![],
        )
    }

    fn row_partition(id: u32, n: usize) -> Partition<usize> {
        let features = (0..n)
            .map(|i| Feature::new(square(i as f64 * 10.0, 0.0, 1.0), i))
            .collect();
        Partition::new(id, features)
    }

    #[test]
    fn brute_force_returns_ascending_distances() {
        let partition = row_partition(0, 6);
        let result =
            search_partition(&partition, None, &Point::new(55.0, 0.5), 3, false).unwrap();
        assert_eq!(result.len(), 3);
        // Nearest squares to x=55 are at 50, 40 (or 60), then 60 (or 40).
        assert_eq!(result[0].local_index, 5);
        assert!(result.windows(2).all(|w| w[0] <= w[1]));
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn k_zero_yields_empty(#[case] use_index: bool) {
        let partition = row_partition(0, 4);
        let index = PolygonIndex::build(&partition);
        let result =
            search_partition(&partition, Some(&index), &Point::new(0.0, 0.0), 0, use_index)
                .unwrap();
        assert!(result.is_empty());
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn k_beyond_partition_size_returns_everything(#[case] use_index: bool) {
        let partition = row_partition(0, 4);
        let index = PolygonIndex::build(&partition);
        let result =
            search_partition(&partition, Some(&index), &Point::new(0.0, 0.0), 10, use_index)
                .unwrap();
        assert_eq!(result.len(), 4);
    }

    #[test]
    fn index_path_requires_a_prebuilt_index() {
        let partition = row_partition(3, 4);
        let err =
            search_partition(&partition, None, &Point::new(0.0, 0.0), 2, true).unwrap_err();
        assert!(matches!(err, Error::IndexUnavailable { partition_id: 3 }));
    }

    #[test]
    fn non_finite_query_point_is_rejected() {
        let partition = row_partition(0, 1);
        let err = search_partition(&partition, None, &Point::new(f64::NAN, 0.0), 2, false)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn both_paths_agree() {
        let partition = row_partition(0, 25);
        let index = PolygonIndex::build(&partition);
        let query = Point::new(123.4, -2.0);
        for k in [1, 5, 25] {
            let scanned = search_partition(&partition, None, &query, k, false).unwrap();
            let indexed =
                search_partition(&partition, Some(&index), &query, k, true).unwrap();
            assert_eq!(scanned, indexed);
        }
    }
}
