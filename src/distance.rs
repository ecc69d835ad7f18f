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

//! Point-to-polygon distance.
//!
//! Both search paths (brute-force scan and index traversal) call the same
//! function, so their distances agree bit-for-bit. This is the linchpin of the
//! equivalence property: the index is only allowed to prune, never to rank.

use geo::{Distance, Euclidean};
use geo_types::{Coord, Point, Polygon};

/// Planar Euclidean distance from `point` to `polygon`.
///
/// Zero when the point lies inside the polygon or on its boundary; a point
/// inside a hole is outside the polygon and measures to the hole ring.
/// Degenerate polygons (see [is_degenerate]) yield `f64::INFINITY`, which
/// sorts after every defined distance.
pub fn polygon_distance(point: &Point<f64>, polygon: &Polygon<f64>) -> f64 {
    if is_degenerate(polygon) {
        return f64::INFINITY;
    }
    let distance = Euclidean.distance(point, polygon);
    if distance.is_finite() {
        distance
    } else {
        f64::INFINITY
    }
}

/// Whether a polygon cannot yield a meaningful distance.
///
/// A polygon is degenerate when any coordinate is non-finite or its outer ring
/// has fewer than 3 distinct vertices. The same predicate decides which
/// polygons the index builder excludes from the tree, so both search paths
/// agree on which candidates are undefined.
pub fn is_degenerate(polygon: &Polygon<f64>) -> bool {
    let rings_finite = std::iter::once(polygon.exterior())
        .chain(polygon.interiors().iter())
        .flat_map(|ring| ring.coords())
        .all(|c| c.x.is_finite() && c.y.is_finite());
    if !rings_finite {
        return true;
    }
    distinct_vertices(&polygon.exterior().0) < 3
}

fn distinct_vertices(coords: &[Coord<f64>]) -> usize {
    // Rings are short; quadratic dedup avoids hashing floats.
    let mut distinct: Vec<(u64, u64)> = Vec::new();
    for c in coords {
        let key = (c.x.to_bits(), c.y.to_bits());
        if !distinct.contains(&key) {
            distinct.push(key);
        }
        if distinct.len() >= 3 {
            break;
        }
    }
    distinct.len()
}
