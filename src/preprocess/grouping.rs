//! Triangle grouping strategies.
//!
//! Both return groups as lists of triangle indices. Traversal uses explicit
//! stacks/queues so memory stays bounded on arbitrarily large meshes.

use std::collections::{HashMap, VecDeque};

use glam::DVec3;

use crate::geometry::Triangle;

/// Vertex position quantized to a fixed number of decimal places.
type VertexKey = (i64, i64, i64);

fn vertex_key(p: DVec3, scale: f64) -> VertexKey {
    (
        (p.x * scale).round() as i64,
        (p.y * scale).round() as i64,
        (p.z * scale).round() as i64,
    )
}

/// Split triangles into connected components. Two triangles are adjacent when
/// they share a vertex position compared at `precision` decimal places.
pub fn connected_components(triangles: &[Triangle], precision: u32) -> Vec<Vec<usize>> {
    let scale = 10f64.powi(precision as i32);

    let mut by_vertex: HashMap<VertexKey, Vec<usize>> = HashMap::new();
    for (index, tri) in triangles.iter().enumerate() {
        for v in tri.vertices() {
            let users = by_vertex.entry(vertex_key(v, scale)).or_default();
            if users.last() != Some(&index) {
                users.push(index);
            }
        }
    }

    let mut visited = vec![false; triangles.len()];
    let mut groups = Vec::new();
    let mut stack = Vec::new();

    for seed in 0..triangles.len() {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        stack.push(seed);
        let mut group = Vec::new();

        while let Some(current) = stack.pop() {
            group.push(current);
            for v in triangles[current].vertices() {
                let Some(neighbors) = by_vertex.get(&vertex_key(v, scale)) else {
                    continue;
                };
                for &next in neighbors {
                    if !visited[next] {
                        visited[next] = true;
                        stack.push(next);
                    }
                }
            }
        }

        group.sort_unstable();
        groups.push(group);
    }

    groups
}

type CellKey = (i64, i64, i64);

fn cell_key(p: DVec3, cell: f64) -> CellKey {
    (
        (p.x / cell).floor() as i64,
        (p.y / cell).floor() as i64,
        (p.z / cell).floor() as i64,
    )
}

/// Merge triangles whose centroids lie within `merge_distance` of a triangle
/// already in the group, using a uniform hash grid with `merge_distance`
/// cells and a 3x3x3 neighbor search.
pub fn proximity_buckets(triangles: &[Triangle], merge_distance: f64) -> Vec<Vec<usize>> {
    let cell = merge_distance.max(f64::EPSILON);
    let max_dist_sq = merge_distance * merge_distance;
    let centroids: Vec<DVec3> = triangles.iter().map(Triangle::centroid).collect();

    let mut grid: HashMap<CellKey, Vec<usize>> = HashMap::new();
    for (index, c) in centroids.iter().enumerate() {
        grid.entry(cell_key(*c, cell)).or_default().push(index);
    }

    let mut assigned = vec![false; triangles.len()];
    let mut groups = Vec::new();
    let mut queue = VecDeque::new();

    for seed in 0..triangles.len() {
        if assigned[seed] {
            continue;
        }
        assigned[seed] = true;
        queue.push_back(seed);
        let mut group = Vec::new();

        while let Some(current) = queue.pop_front() {
            group.push(current);
            let origin = centroids[current];
            let (cx, cy, cz) = cell_key(origin, cell);
            for dx in -1..=1 {
                for dy in -1..=1 {
                    for dz in -1..=1 {
                        let Some(bucket) = grid.get(&(cx + dx, cy + dy, cz + dz)) else {
                            continue;
                        };
                        for &other in bucket {
                            if !assigned[other] && centroids[other].distance_squared(origin) <= max_dist_sq {
                                assigned[other] = true;
                                queue.push_back(other);
                            }
                        }
                    }
                }
            }
        }

        group.sort_unstable();
        groups.push(group);
    }

    groups
}
