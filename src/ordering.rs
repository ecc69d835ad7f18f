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

//! The shared total order over candidates.
//!
//! Every stage (brute-force scan, index traversal, global merge) ranks
//! candidates with the same pure comparison, so equal-distance geometries
//! compare consistently no matter which path produced them or what order
//! partitions were visited in.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::geometry::PartitionId;

/// Tolerance for externally comparing distances produced by the two search
/// paths. The engine itself never needs it: both paths share one distance
/// implementation and agree bit-for-bit.
pub const DISTANCE_TOLERANCE: f64 = 1e-9;

/// A scored result under consideration for the top-K set.
///
/// `distance` is non-negative and finite for defined geometry, or
/// `f64::INFINITY` for degenerate geometry (sorts last). The
/// `(partition_id, local_index)` pair is the geometry's stable identity and
/// breaks distance ties deterministically.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub distance: f64,
    pub partition_id: PartitionId,
    pub local_index: u32,
}

impl Candidate {
    pub fn new(distance: f64, partition_id: PartitionId, local_index: u32) -> Self {
        Self {
            distance,
            partition_id,
            local_index,
        }
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.partition_id.cmp(&other.partition_id))
            .then_with(|| self.local_index.cmp(&other.local_index))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// Fixed-capacity max-structure retaining the k smallest candidates seen.
///
/// The heap root is the current worst retained candidate, so offering a better
/// candidate evicts it in O(log k). Working memory stays O(k) regardless of
/// how many candidates are offered.
#[derive(Debug)]
pub(crate) struct BoundedCandidateHeap {
    capacity: usize,
    heap: BinaryHeap<Candidate>,
}

impl BoundedCandidateHeap {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity.min(1024)),
        }
    }

    pub fn push(&mut self, candidate: Candidate) {
        if self.capacity == 0 {
            return;
        }
        if self.heap.len() < self.capacity {
            self.heap.push(candidate);
        } else if let Some(worst) = self.heap.peek() {
            if candidate < *worst {
                self.heap.pop();
                self.heap.push(candidate);
            }
        }
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    /// Distance of the worst retained candidate, or `f64::INFINITY` while the
    /// heap still has room. A subtree whose lower bound exceeds this cannot
    /// contribute.
    pub fn worst_distance(&self) -> f64 {
        self.heap
            .peek()
            .map(|c| c.distance)
            .unwrap_or(f64::INFINITY)
    }

    pub fn into_sorted_vec(self) -> Vec<Candidate> {
        self.heap.into_sorted_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn orders_by_distance_then_identity() {
        let a = Candidate::new(1.0, 0, 5);
        let b = Candidate::new(2.0, 0, 1);
        let c = Candidate::new(2.0, 1, 0);
        let d = Candidate::new(2.0, 1, 3);
        let e = Candidate::new(f64::INFINITY, 0, 0);

        let mut shuffled = vec![e, d, b, a, c];
        shuffled.sort_unstable();
        assert_eq!(shuffled, vec![a, b, c, d, e]);
    }

    #[test]
    fn undefined_distance_sorts_last() {
        let defined = Candidate::new(1e12, 9, 9);
        let undefined = Candidate::new(f64::INFINITY, 0, 0);
        assert!(defined < undefined);
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(3)]
    #[case(100)]
    fn bounded_heap_retains_k_smallest(#[case] k: usize) {
        let mut heap = BoundedCandidateHeap::new(k);
        for i in (0..20u32).rev() {
            heap.push(Candidate::new(i as f64, 0, i));
        }

        let result = heap.into_sorted_vec();
        assert_eq!(result.len(), k.min(20));
        for (i, candidate) in result.iter().enumerate() {
            assert_eq!(candidate.distance, i as f64);
        }
    }

    #[test]
    fn bounded_heap_breaks_ties_by_identity() {
        let mut heap = BoundedCandidateHeap::new(2);
        heap.push(Candidate::new(1.0, 0, 2));
        heap.push(Candidate::new(1.0, 0, 0));
        heap.push(Candidate::new(1.0, 0, 1));

        let result = heap.into_sorted_vec();
        assert_eq!(result[0].local_index, 0);
        assert_eq!(result[1].local_index, 1);
    }

    #[test]
    fn worst_distance_is_infinite_until_full() {
        let mut heap = BoundedCandidateHeap::new(2);
        assert_eq!(heap.worst_distance(), f64::INFINITY);
        heap.push(Candidate::new(3.0, 0, 0));
        assert!(!heap.is_full());
        heap.push(Candidate::new(1.0, 0, 1));
        assert!(heap.is_full());
        assert_eq!(heap.worst_distance(), 3.0);
    }
}
