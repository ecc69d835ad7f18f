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

//! Whole-collection KNN query: parallel map over partitions, global reduce.

use std::time::Instant;

use geo_types::Point;
use rayon::prelude::*;

use crate::error::Result;
use crate::geometry::Feature;
use crate::index::PartitionIndexProvider;
use crate::merger::merge_partition_results;
use crate::ordering::Candidate;
use crate::searcher::search_partition;

/// A resolved query result: a candidate joined back to its source feature.
#[derive(Debug)]
pub struct Neighbor<'a, P> {
    pub distance: f64,
    pub feature: &'a Feature<P>,
}

/// The k features nearest to `query` across every partition, ascending by
/// distance with deterministic tie-breaking.
///
/// Each partition is searched by an independent parallel task; no shared
/// mutable state crosses a partition boundary, so the final order depends only
/// on the data and `k`, never on task completion order. With
/// `use_index = true` every partition must have a prebuilt index (see
/// [PartitionIndexProvider::build_all_indexes]); the query fails with
/// `IndexUnavailable` instead of silently degrading.
pub fn knn_query<'a, P: Sync>(
    provider: &'a PartitionIndexProvider<P>,
    query: &Point<f64>,
    k: usize,
    use_index: bool,
) -> Result<Vec<Neighbor<'a, P>>> {
    let start = Instant::now();

    let partition_results: Vec<Vec<Candidate>> = provider
        .partitions()
        .par_iter()
        .map(|partition| {
            let index = if use_index {
                provider.index(partition.id())
            } else {
                None
            };
            search_partition(partition, index.as_deref(), query, k, use_index)
        })
        .collect::<Result<_>>()?;

    let merged = merge_partition_results(partition_results, k)?;
    log::debug!(
        "knn query: k={}, {} partitions, {} results, indexed={}, {:?}",
        k,
        provider.num_partitions(),
        merged.len(),
        use_index,
        start.elapsed()
    );
    Ok(resolve(provider, &merged))
}

/// Join candidates back to the features they refer to. Candidate identities
/// produced against `provider`'s partitions are always resolvable.
pub fn resolve<'a, P>(
    provider: &'a PartitionIndexProvider<P>,
    candidates: &[Candidate],
) -> Vec<Neighbor<'a, P>> {
    candidates
        .iter()
        .filter_map(|candidate| {
            provider
                .partition(candidate.partition_id)
                .and_then(|partition| partition.get(candidate.local_index))
                .map(|feature| Neighbor {
                    distance: candidate.distance,
                    feature,
                })
        })
        .collect()
}
