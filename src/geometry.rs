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

use geo_types::Polygon;

/// Identifier of a partition within one query's partition set. Ids are dense
/// and assigned by the host in partition order; they double as the primary
/// tie-break key when candidates from different partitions are merged.
pub type PartitionId = u32;

/// A polygon together with an opaque payload.
///
/// The payload is carried end-to-end (search, merge, resolution) but never
/// interpreted by the engine, mirroring user data attached to source records.
#[derive(Debug, Clone)]
pub struct Feature<P> {
    polygon: Polygon<f64>,
    payload: P,
}

impl<P> Feature<P> {
    pub fn new(polygon: Polygon<f64>, payload: P) -> Self {
        Self { polygon, payload }
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn into_parts(self) -> (Polygon<f64>, P) {
        (self.polygon, self.payload)
    }
}

/// An immutable, ordered sequence of features processed as one unit of
/// parallel work.
///
/// A partition is read-only for the whole query lifetime. The position of a
/// feature within its partition is stable and, together with the partition id,
/// forms the deterministic identity used for tie-breaking.
#[derive(Debug, Clone)]
pub struct Partition<P> {
    id: PartitionId,
    features: Vec<Feature<P>>,
}

impl<P> Partition<P> {
    /// Create a partition. Empty partitions are valid; they contribute nothing
    /// to a query.
    pub fn new(id: PartitionId, features: Vec<Feature<P>>) -> Self {
        Self { id, features }
    }

    pub fn id(&self) -> PartitionId {
        self.id
    }

    pub fn features(&self) -> &[Feature<P>] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Feature at a partition-local index produced by a search on this
    /// partition.
    ///
    /// # Panics
    /// Panics if `local_index` is out of range. Candidate indices produced by
    /// the engine for this partition are always in range.
    pub fn feature(&self, local_index: u32) -> &Feature<P> {
        &self.features[local_index as usize]
    }

    pub fn get(&self, local_index: u32) -> Option<&Feature<P>> {
        self.features.get(local_index as usize)
    }
}
