//! Corner normal and tangent buckets
//!
//! Corners sharing a vertex share a bucket unless a splitting edge (hard edge for
//! normals, UV seam for tangents) separates them. Around a vertex with splitting
//! edges, faces are grouped by walking across non-splitting edges incident to that
//! vertex; every connected group gets its own bucket.

use std::collections::VecDeque;

use super::types::{Edge, Face, Vertex};

const UNASSIGNED: u32 = u32::MAX;

/// Bucket index per face corner, plus the bucket count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CornerBuckets {
    pub corners: Vec<Vec<u32>>,
    pub count: usize,
}

pub fn assign_buckets(
    vertices: &[Vertex],
    edges: &[Edge],
    faces: &[Face],
    splits: impl Fn(&Edge) -> bool,
    label: &str,
) -> CornerBuckets {
    let mut corners: Vec<Vec<u32>> = faces
        .iter()
        .map(|face| vec![UNASSIGNED; face.corner_count()])
        .collect();
    let mut count = 0u32;

    for (vertex_index, vertex) in vertices.iter().enumerate() {
        let vertex_index = vertex_index as u32;
        let mut incident: Vec<u32> = Vec::with_capacity(vertex.faces.len());
        for &face in &vertex.faces {
            if !incident.contains(&face) {
                incident.push(face);
            }
        }
        if incident.is_empty() {
            continue;
        }

        let has_split = vertex.edges.iter().any(|&edge| splits(&edges[edge as usize]));
        if !has_split {
            for &face in &incident {
                set_corners(&mut corners, faces, face, vertex_index, count);
            }
            count += 1;
            continue;
        }

        let mut visited = vec![false; incident.len()];
        for start in 0..incident.len() {
            if visited[start] {
                continue;
            }
            visited[start] = true;
            let mut queue = VecDeque::from([incident[start]]);

            while let Some(face_index) = queue.pop_front() {
                set_corners(&mut corners, faces, face_index, vertex_index, count);

                let face = &faces[face_index as usize];
                let Some(c) = face.find_corner(vertex_index) else {
                    continue;
                };
                let n = face.corner_count();
                for edge_index in [face.edges[c], face.edges[(c + n - 1) % n]] {
                    let edge = &edges[edge_index as usize];
                    if splits(edge) || !edge.has_vertex(vertex_index) {
                        continue;
                    }
                    let Some(neighbor) = edge.other_face(face_index) else {
                        continue;
                    };
                    if let Some(slot) = incident.iter().position(|&f| f == neighbor) {
                        if !visited[slot] {
                            visited[slot] = true;
                            queue.push_back(neighbor);
                        }
                    }
                }
            }
            count += 1;
        }
    }

    for (face_index, face_corners) in corners.iter_mut().enumerate() {
        for bucket in face_corners.iter_mut().filter(|b| **b == UNASSIGNED) {
            tracing::warn!("Unassigned {} at face {}", label, face_index);
            *bucket = count;
            count += 1;
        }
    }

    CornerBuckets {
        corners,
        count: count as usize,
    }
}

fn set_corners(corners: &mut [Vec<u32>], faces: &[Face], face: u32, vertex: u32, bucket: u32) {
    let face_index = face as usize;
    for (c, &v) in faces[face_index].vertices.iter().enumerate() {
        if v == vertex {
            corners[face_index][c] = bucket;
        }
    }
}
