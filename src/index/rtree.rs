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

//! Packed R-tree over polygon bounding boxes.
//!
//! The tree is bulk-built once per partition and immutable afterwards: item
//! boxes are sorted along the Hilbert curve of their centers and parent nodes
//! are formed by chunking each level into fixed-size nodes, packed into flat
//! arrays. Boxes are stored as `f32` with outward rounding, so every stored box
//! contains its `f64` source box and the point-to-box distance remains a valid
//! lower bound on the true distance to anything in the subtree.
//!
//! Bounding boxes only prune the nearest-neighbor search; final order always
//! comes from the true geometry distance.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Instant;

use float_next_after::NextAfter;
use geo::BoundingRect;
use geo_types::Point;

use crate::distance::{is_degenerate, polygon_distance};
use crate::error::{contract_violation, Result};
use crate::geometry::{Partition, PartitionId};
use crate::ordering::{BoundedCandidateHeap, Candidate};

const DEFAULT_NODE_SIZE: usize = 16;

/// Immutable spatial index over the polygons of exactly one partition.
///
/// Built once, queried many times, never mutated by a query. The index holds
/// no geometry itself; queries borrow the partition the index was built from.
#[derive(Debug)]
pub struct PolygonIndex {
    partition_id: PartitionId,
    /// Number of polygons in the source partition, for validation.
    num_polygons: usize,
    /// Number of indexed (non-degenerate) polygons; item slots are
    /// `0..num_items` in `boxes`.
    num_items: usize,
    node_size: usize,
    /// One box per tree slot: items in Hilbert order, then each upper level,
    /// root last. `[min_x, min_y, max_x, max_y]`, outward-rounded.
    boxes: Vec<[f32; 4]>,
    /// For item slots the partition-local polygon index; for upper slots the
    /// slot of the node's first child.
    indices: Vec<u32>,
    /// End offset (exclusive) of each level in `boxes`, leaf level first.
    level_bounds: Vec<usize>,
    /// Partition-local indices of degenerate polygons excluded from the tree,
    /// ascending.
    degenerate: Vec<u32>,
}

impl PolygonIndex {
    /// Bulk-build an index over a partition's polygon bounding boxes.
    ///
    /// Succeeds for any input: a single polygon, many coincident boxes, or an
    /// empty partition (which yields an explicitly empty index). Degenerate
    /// polygons are excluded from the tree but tracked so index-path results
    /// still cover them.
    pub fn build<P>(partition: &Partition<P>) -> Self {
        let start = Instant::now();

        let mut items: Vec<(u32, [f64; 4])> = Vec::with_capacity(partition.len());
        let mut degenerate: Vec<u32> = Vec::new();
        for (local_index, feature) in partition.features().iter().enumerate() {
            let local_index = local_index as u32;
            let rect = if is_degenerate(feature.polygon()) {
                None
            } else {
                feature.polygon().bounding_rect()
            };
            match rect {
                Some(rect) => {
                    let min = rect.min();
                    let max = rect.max();
                    items.push((local_index, [min.x, min.y, max.x, max.y]));
                }
                None => degenerate.push(local_index),
            }
        }

        let index = Self::pack(partition.id(), partition.len(), items, degenerate);
        log::debug!(
            "built index for partition {}: {} items, {} degenerate, {:?}",
            partition.id(),
            index.num_items,
            index.degenerate.len(),
            start.elapsed()
        );
        index
    }

    fn pack(
        partition_id: PartitionId,
        num_polygons: usize,
        mut items: Vec<(u32, [f64; 4])>,
        degenerate: Vec<u32>,
    ) -> Self {
        let num_items = items.len();
        let node_size = DEFAULT_NODE_SIZE;
        if num_items == 0 {
            return Self {
                partition_id,
                num_polygons,
                num_items,
                node_size,
                boxes: Vec::new(),
                indices: Vec::new(),
                level_bounds: Vec::new(),
                degenerate,
            };
        }

        // Overall extent, for scaling centers onto the Hilbert grid.
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for (_, b) in &items {
            min_x = min_x.min(b[0]);
            min_y = min_y.min(b[1]);
            max_x = max_x.max(b[2]);
            max_y = max_y.max(b[3]);
        }
        let width = max_x - min_x;
        let height = max_y - min_y;

        let grid_coord = |value: f64, origin: f64, extent: f64| -> u32 {
            if extent > 0.0 {
                (((value - origin) / extent) * HILBERT_MAX as f64) as u32
            } else {
                0
            }
        };
        // Sort by Hilbert value of the box center, with the local index as a
        // deterministic secondary key for coincident centers.
        items.sort_unstable_by_key(|(local_index, b)| {
            let hx = grid_coord((b[0] + b[2]) / 2.0, min_x, width);
            let hy = grid_coord((b[1] + b[3]) / 2.0, min_y, height);
            (hilbert(hx, hy), *local_index)
        });

        let mut level_bounds = vec![num_items];
        let mut level_size = num_items;
        let mut num_slots = num_items;
        while level_size > 1 {
            level_size = level_size.div_ceil(node_size);
            num_slots += level_size;
            level_bounds.push(num_slots);
        }

        let mut boxes: Vec<[f32; 4]> = Vec::with_capacity(num_slots);
        let mut indices: Vec<u32> = Vec::with_capacity(num_slots);
        for (local_index, b) in &items {
            boxes.push(f64_box_to_f32(b));
            indices.push(*local_index);
        }

        // Build each upper level by chunking the level below.
        let mut child_start = 0;
        for level in 0..level_bounds.len() - 1 {
            let child_end = level_bounds[level];
            let mut pos = child_start;
            while pos < child_end {
                let first_child = pos;
                let mut node_box = boxes[pos];
                pos += 1;
                while pos < child_end && pos < first_child + node_size {
                    let b = &boxes[pos];
                    node_box[0] = node_box[0].min(b[0]);
                    node_box[1] = node_box[1].min(b[1]);
                    node_box[2] = node_box[2].max(b[2]);
                    node_box[3] = node_box[3].max(b[3]);
                    pos += 1;
                }
                boxes.push(node_box);
                indices.push(first_child as u32);
            }
            child_start = child_end;
        }

        Self {
            partition_id,
            num_polygons,
            num_items,
            node_size,
            boxes,
            indices,
            level_bounds,
            degenerate,
        }
    }

    pub fn partition_id(&self) -> PartitionId {
        self.partition_id
    }

    /// Number of polygons participating in the tree (degenerate polygons are
    /// excluded but still reachable through [Self::nearest]).
    pub fn num_items(&self) -> usize {
        self.num_items
    }

    /// Up to `k` candidates ordered ascending by true geometry distance.
    ///
    /// Best-first traversal: a priority queue keyed by each slot's minimum
    /// point-to-box distance expands the lowest bound first while a bounded
    /// best-K set tracks true distances. A subtree is pruned only when its
    /// bound strictly exceeds the current K-th best true distance; subtrees
    /// whose bound ties it are still expanded so equal-distance candidates are
    /// resolved by the shared ordering, exactly as the brute-force path does.
    ///
    /// `k == 0` yields an empty list; `k` larger than the partition yields all
    /// polygons. The index is not mutated by a query.
    pub fn nearest<P>(
        &self,
        partition: &Partition<P>,
        query: &Point<f64>,
        k: usize,
    ) -> Result<Vec<Candidate>> {
        if partition.id() != self.partition_id || partition.len() != self.num_polygons {
            return contract_violation!(
                "index built for partition {} ({} polygons) queried with partition {} ({} polygons)",
                self.partition_id,
                self.num_polygons,
                partition.id(),
                partition.len()
            );
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut best = BoundedCandidateHeap::new(k);
        if self.num_items > 0 {
            let mut queue: BinaryHeap<Reverse<QueueEntry>> = BinaryHeap::new();
            queue.push(Reverse(QueueEntry {
                bound: 0.0,
                slot: self.boxes.len() - 1,
            }));

            while let Some(Reverse(entry)) = queue.pop() {
                // Bounds pop in ascending order; once the best possible bound
                // cannot beat the worst retained candidate, nothing can.
                if best.is_full() && entry.bound > best.worst_distance() {
                    break;
                }
                if entry.slot < self.num_items {
                    let local_index = self.indices[entry.slot];
                    let distance =
                        polygon_distance(query, partition.feature(local_index).polygon());
                    best.push(Candidate::new(distance, self.partition_id, local_index));
                } else {
                    let first_child = self.indices[entry.slot] as usize;
                    let end = (first_child + self.node_size).min(self.level_end(first_child));
                    for slot in first_child..end {
                        let bound = box_distance(query, &self.boxes[slot]);
                        if !best.is_full() || bound <= best.worst_distance() {
                            queue.push(Reverse(QueueEntry { bound, slot }));
                        }
                    }
                }
            }
        }

        // Degenerate polygons compete with infinite distance, matching the
        // brute-force path when fewer than k defined candidates exist.
        for &local_index in &self.degenerate {
            best.push(Candidate::new(f64::INFINITY, self.partition_id, local_index));
        }

        Ok(best.into_sorted_vec())
    }

    /// End (exclusive) of the level containing `slot`.
    fn level_end(&self, slot: usize) -> usize {
        for &bound in &self.level_bounds {
            if slot < bound {
                return bound;
            }
        }
        self.boxes.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct QueueEntry {
    bound: f64,
    slot: usize,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.bound
            .total_cmp(&other.bound)
            .then_with(|| self.slot.cmp(&other.slot))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for QueueEntry {}

/// Minimum distance from `query` to the box, in f64. Zero when the point is
/// inside the box. Boxes are outward-rounded, so this never exceeds the true
/// distance to any geometry indexed under the box.
fn box_distance(query: &Point<f64>, b: &[f32; 4]) -> f64 {
    let dx = (b[0] as f64 - query.x())
        .max(query.x() - b[2] as f64)
        .max(0.0);
    let dy = (b[1] as f64 - query.y())
        .max(query.y() - b[3] as f64)
        .max(0.0);
    (dx * dx + dy * dy).sqrt()
}

/// Narrow an f64 box to f32, rounding mins down and maxs up so the f32 box
/// always contains the source box.
fn f64_box_to_f32(b: &[f64; 4]) -> [f32; 4] {
    let mut min_x = b[0] as f32;
    if (min_x as f64) > b[0] {
        min_x = min_x.next_after(f32::NEG_INFINITY);
    }
    let mut min_y = b[1] as f32;
    if (min_y as f64) > b[1] {
        min_y = min_y.next_after(f32::NEG_INFINITY);
    }
    let mut max_x = b[2] as f32;
    if (max_x as f64) < b[2] {
        max_x = max_x.next_after(f32::INFINITY);
    }
    let mut max_y = b[3] as f32;
    if (max_y as f64) < b[3] {
        max_y = max_y.next_after(f32::INFINITY);
    }
    [min_x, min_y, max_x, max_y]
}

const HILBERT_MAX: u32 = u16::MAX as u32;

/// Distance along the order-16 Hilbert curve for a grid cell in
/// `[0, 65535] x [0, 65535]`.
fn hilbert(x: u32, y: u32) -> u64 {
    let mut x = x.min(HILBERT_MAX);
    let mut y = y.min(HILBERT_MAX);
    let mut d: u64 = 0;
    let mut s: u32 = 1 << 15;
    while s > 0 {
        let rx = u32::from(x & s > 0);
        let ry = u32::from(y & s > 0);
        d += (s as u64) * (s as u64) * ((3 * rx) ^ ry) as u64;
        // Rotate the quadrant.
        if ry == 0 {
            if rx == 1 {
                x = HILBERT_MAX - x;
                y = HILBERT_MAX - y;
            }
            std::mem::swap(&mut x, &mut y);
        }
        s >>= 1;
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Feature;
    use geo_types::{LineString, Polygon};

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

    fn partition_of_squares(id: PartitionId, origins: &[(f64, f64)]) -> Partition<usize> {
        let features = origins
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| Feature::new(square(x, y, 1.0), i))
            .collect();
        Partition::new(id, features)
    }

    fn brute_force(partition: &Partition<usize>, query: &Point<f64>, k: usize) -> Vec<Candidate> {
        let mut best = BoundedCandidateHeap::new(k);
        for (i, feature) in partition.features().iter().enumerate() {
            best.push(Candidate::new(
                polygon_distance(query, feature.polygon()),
                partition.id(),
                i as u32,
            ));
        }
        best.into_sorted_vec()
    }

    #[test]
    fn hilbert_is_a_bijection_on_a_small_grid() {
        // Order-16 curve restricted to a 16x16 corner still yields distinct
        // values for distinct cells.
        let mut seen: Vec<u64> = (0..16u32)
            .flat_map(|x| (0..16u32).map(move |y| hilbert(x << 12, y << 12)))
            .collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 256);
    }

    #[test]
    fn f32_boxes_contain_their_source() {
        let b = [0.1, -0.3, 0.100000001, 1e300];
        let narrowed = f64_box_to_f32(&b);
        assert!((narrowed[0] as f64) <= b[0]);
        assert!((narrowed[1] as f64) <= b[1]);
        assert!((narrowed[2] as f64) >= b[2]);
        assert!((narrowed[3] as f64) >= b[3]);
    }

    #[test]
    fn empty_partition_yields_empty_index() {
        let partition: Partition<usize> = Partition::new(0, vec![]);
        let index = PolygonIndex::build(&partition);
        assert_eq!(index.num_items(), 0);
        let result = index.nearest(&partition, &Point::new(0.0, 0.0), 5).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn single_polygon_index() {
        let partition = partition_of_squares(0, &[(3.0, 0.0)]);
        let index = PolygonIndex::build(&partition);
        let result = index.nearest(&partition, &Point::new(0.0, 0.5), 3).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].local_index, 0);
        assert_eq!(result[0].distance, 3.0);
    }

    #[test]
    fn coincident_boxes_are_all_reachable() {
        let origins: Vec<(f64, f64)> = (0..40).map(|_| (5.0, 5.0)).collect();
        let partition = partition_of_squares(0, &origins);
        let index = PolygonIndex::build(&partition);
        let result = index.nearest(&partition, &Point::new(0.0, 0.0), 40).unwrap();
        assert_eq!(result.len(), 40);
        // All distances tie; order falls back to local index.
        for (i, candidate) in result.iter().enumerate() {
            assert_eq!(candidate.local_index, i as u32);
        }
    }

    #[test]
    fn nearest_matches_brute_force_on_a_grid() {
        let origins: Vec<(f64, f64)> = (0..10)
            .flat_map(|gx| (0..10).map(move |gy| (gx as f64 * 3.0, gy as f64 * 3.0)))
            .collect();
        let partition = partition_of_squares(2, &origins);
        let index = PolygonIndex::build(&partition);

        for query in [
            Point::new(14.2, 17.9),
            Point::new(-5.0, -5.0),
            Point::new(0.5, 0.5),
            Point::new(100.0, 0.0),
        ] {
            for k in [1, 7, 64, 100, 128] {
                let indexed = index.nearest(&partition, &query, k).unwrap();
                let scanned = brute_force(&partition, &query, k);
                assert_eq!(indexed, scanned, "query {query:?} k {k}");
            }
        }
    }

    #[test]
    fn degenerate_polygons_fill_the_tail() {
        let mut features: Vec<Feature<usize>> = vec![
            Feature::new(square(0.0, 0.0, 1.0), 0),
            Feature::new(
                Polygon::new(LineString::from(vec![(9.0, 9.0), (9.0, 9.0)]), vec![]),
                1,
            ),
            Feature::new(square(4.0, 0.0, 1.0), 2),
        ];
        features.push(Feature::new(
            Polygon::new(LineString::new(vec![]), vec![]),
            3,
        ));
        let partition = Partition::new(1, features);
        let index = PolygonIndex::build(&partition);
        assert_eq!(index.num_items(), 2);

        let query = Point::new(0.5, 0.5);
        let result = index.nearest(&partition, &query, 4).unwrap();
        assert_eq!(result.len(), 4);
        assert_eq!(result[0].local_index, 0);
        assert_eq!(result[1].local_index, 2);
        // Undefined distances sort last, in identity order.
        assert_eq!(result[2].local_index, 1);
        assert_eq!(result[3].local_index, 3);
        assert_eq!(result[2].distance, f64::INFINITY);

        assert_eq!(result, brute_force(&partition, &query, 4));
    }

    #[test]
    fn rejects_mismatched_partition() {
        let partition = partition_of_squares(0, &[(0.0, 0.0), (2.0, 2.0)]);
        let other = partition_of_squares(1, &[(0.0, 0.0), (2.0, 2.0)]);
        let index = PolygonIndex::build(&partition);
        let err = index
            .nearest(&other, &Point::new(0.0, 0.0), 1)
            .unwrap_err();
        assert!(matches!(err, crate::error::Error::ContractViolation(_)));
    }

    #[test]
    fn k_zero_is_a_no_op() {
        let partition = partition_of_squares(0, &[(0.0, 0.0)]);
        let index = PolygonIndex::build(&partition);
        assert!(index
            .nearest(&partition, &Point::new(0.0, 0.0), 0)
            .unwrap()
            .is_empty());
    }
}
