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

use std::sync::Arc;

use parking_lot::Mutex;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::geometry::{Partition, PartitionId};
use crate::index::rtree::PolygonIndex;

/// Owns a query's partition set and the per-partition index cells.
///
/// Index presence is an explicit `Option` per partition, not a sentinel woven
/// into search logic. Each cell is guarded by its own mutex so an index is
/// built at most once per generation; a rebuild constructs the replacement and
/// swaps the `Arc` in one step, so no partially-built index is ever visible to
/// a query. Built indexes are queried concurrently through shared references.
pub struct PartitionIndexProvider<P> {
    partitions: Vec<Partition<P>>,
    cells: Vec<Mutex<Option<Arc<PolygonIndex>>>>,
}

impl<P> PartitionIndexProvider<P> {
    /// Wrap a partition set. Partition ids must be dense and in vector order;
    /// they are what ties candidates back to their source features.
    pub fn new(partitions: Vec<Partition<P>>) -> Result<Self> {
        for (position, partition) in partitions.iter().enumerate() {
            if partition.id() as usize != position {
                return Err(Error::InvalidInput(format!(
                    "partition ids must be dense and in order: found id {} at position {}",
                    partition.id(),
                    position
                )));
            }
        }
        let cells = partitions.iter().map(|_| Mutex::new(None)).collect();
        Ok(Self { partitions, cells })
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    pub fn partitions(&self) -> &[Partition<P>] {
        &self.partitions
    }

    pub fn partition(&self, partition_id: PartitionId) -> Option<&Partition<P>> {
        self.partitions.get(partition_id as usize)
    }

    /// Build the index for one partition, or return the one already built.
    pub fn build_index(&self, partition_id: PartitionId) -> Result<Arc<PolygonIndex>> {
        let (partition, cell) = self.slot(partition_id)?;
        let mut guard = cell.lock();
        if let Some(index) = guard.as_ref() {
            return Ok(Arc::clone(index));
        }
        let index = Arc::new(PolygonIndex::build(partition));
        *guard = Some(Arc::clone(&index));
        Ok(index)
    }

    /// Discard any existing index for the partition and build a fresh one.
    /// The replacement becomes visible atomically.
    pub fn rebuild_index(&self, partition_id: PartitionId) -> Result<Arc<PolygonIndex>> {
        let (partition, cell) = self.slot(partition_id)?;
        let mut guard = cell.lock();
        let index = Arc::new(PolygonIndex::build(partition));
        *guard = Some(Arc::clone(&index));
        Ok(index)
    }

    /// The prebuilt index for a partition, if any.
    pub fn index(&self, partition_id: PartitionId) -> Option<Arc<PolygonIndex>> {
        self.cells
            .get(partition_id as usize)
            .and_then(|cell| cell.lock().as_ref().map(Arc::clone))
    }

    fn slot(
        &self,
        partition_id: PartitionId,
    ) -> Result<(&Partition<P>, &Mutex<Option<Arc<PolygonIndex>>>)> {
        match (
            self.partitions.get(partition_id as usize),
            self.cells.get(partition_id as usize),
        ) {
            (Some(partition), Some(cell)) => Ok((partition, cell)),
            _ => Err(Error::InvalidInput(format!(
                "unknown partition id {} ({} partitions)",
                partition_id,
                self.partitions.len()
            ))),
        }
    }
}

impl<P: Sync> PartitionIndexProvider<P> {
    /// Build every missing index, one parallel task per partition.
    pub fn build_all_indexes(&self) -> Result<()> {
        (0..self.partitions.len() as u32)
            .into_par_iter()
            .try_for_each(|partition_id| self.build_index(partition_id).map(|_| ()))
    }
}
