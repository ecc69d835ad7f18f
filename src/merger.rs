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

//! Global merge of per-partition candidate lists.

use crate::error::{contract_violation, Result};
use crate::ordering::Candidate;

/// Merge per-partition top-k lists into the global top-k.
///
/// Inputs may arrive in any order and there may be fewer lists than partitions
/// (the host decides what a failed partition means); the output is still fully
/// determined by the surviving candidates and `k` because the shared ordering
/// breaks ties independently of traversal order.
///
/// Each input list must hold at most `k` candidates and be ascending under the
/// shared ordering; anything else is a bug in the caller and is rejected as a
/// contract violation instead of being silently truncated.
pub fn merge_partition_results(
    partition_results: Vec<Vec<Candidate>>,
    k: usize,
) -> Result<Vec<Candidate>> {
    for list in &partition_results {
        if list.len() > k {
            return contract_violation!(
                "partition result holds {} candidates, more than k = {}",
                list.len(),
                k
            );
        }
        if !list.windows(2).all(|pair| pair[0] <= pair[1]) {
            return contract_violation!("partition result is not ascending under the ordering");
        }
    }
    if k == 0 {
        return Ok(Vec::new());
    }

    let mut merged: Vec<Candidate> = partition_results.into_iter().flatten().collect();
    merged.sort_unstable();
    merged.truncate(k);
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn candidates(entries: &[(f64, u32, u32)]) -> Vec<Candidate> {
        entries
            .iter()
            .map(|&(d, p, i)| Candidate::new(d, p, i))
            .collect()
    }

    #[test]
    fn merges_and_truncates_to_k() {
        let a = candidates(&[(1.0, 0, 0), (4.0, 0, 1)]);
        let b = candidates(&[(2.0, 1, 0), (3.0, 1, 1)]);
        let merged = merge_partition_results(vec![a, b], 3).unwrap();
        assert_eq!(
            merged,
            candidates(&[(1.0, 0, 0), (2.0, 1, 0), (3.0, 1, 1)])
        );
    }

    #[test]
    fn input_order_does_not_matter() {
        let a = candidates(&[(1.0, 0, 0), (5.0, 0, 3)]);
        let b = candidates(&[(1.0, 1, 0), (2.0, 1, 1)]);
        let forward = merge_partition_results(vec![a.clone(), b.clone()], 4).unwrap();
        let backward = merge_partition_results(vec![b, a], 4).unwrap();
        assert_eq!(forward, backward);
        // The equal-distance pair is ordered by partition identity.
        assert_eq!(forward[0].partition_id, 0);
        assert_eq!(forward[1].partition_id, 1);
    }

    #[test]
    fn accepts_missing_partitions_and_empty_lists() {
        let merged =
            merge_partition_results(vec![vec![], candidates(&[(2.0, 3, 7)])], 5).unwrap();
        assert_eq!(merged, candidates(&[(2.0, 3, 7)]));

        assert!(merge_partition_results(vec![], 5).unwrap().is_empty());
    }

    #[test]
    fn k_zero_yields_empty() {
        assert!(merge_partition_results(vec![vec![]], 0).unwrap().is_empty());
    }

    #[test]
    fn rejects_oversized_partition_result() {
        let oversized = candidates(&[(1.0, 0, 0), (2.0, 0, 1)]);
        let err = merge_partition_results(vec![oversized], 1).unwrap_err();
        assert!(matches!(err, Error::ContractViolation(_)));
    }

    #[test]
    fn rejects_unsorted_partition_result() {
        let unsorted = candidates(&[(2.0, 0, 0), (1.0, 0, 1)]);
        let err = merge_partition_results(vec![unsorted], 5).unwrap_err();
        assert!(matches!(err, Error::ContractViolation(_)));
    }

    #[test]
    fn merging_twice_is_idempotent() {
        let a = candidates(&[(0.5, 0, 2), (1.5, 0, 0)]);
        let b = candidates(&[(0.5, 1, 1)]);
        let once = merge_partition_results(vec![a.clone(), b.clone()], 2).unwrap();
        let twice = merge_partition_results(vec![a, b], 2).unwrap();
        assert_eq!(once, twice);
    }
}
