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

use crate::geometry::PartitionId;

/// Errors surfaced by the KNN engine.
///
/// Degenerate geometry is deliberately not represented here: a polygon that
/// cannot yield a meaningful distance sorts after every defined candidate
/// instead of failing the query.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The caller passed input the engine cannot work with, e.g. a query point
    /// with non-finite coordinates or an unknown partition id.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An index-accelerated search was requested for a partition that has no
    /// prebuilt spatial index. The engine never silently falls back to the
    /// brute-force path.
    #[error("no spatial index has been built for partition {partition_id}")]
    IndexUnavailable { partition_id: PartitionId },

    /// An upstream caller broke a documented contract, e.g. a partition result
    /// exceeding k at the merge boundary, or an index queried against a
    /// partition it was not built from. Indicates a bug in the caller, not a
    /// data problem.
    #[error("contract violation: {0}")]
    ContractViolation(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Build an `Err(Error::ContractViolation)` with formatted context.
macro_rules! contract_violation {
    ($($arg:tt)*) => {
        Err($crate::error::Error::ContractViolation(format!($($arg)*)))
    };
}

pub(crate) use contract_violation;
