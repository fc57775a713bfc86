use foldhash::{HashMap, HashMapExt};
use log::warn;

use crate::{MeshData, QUAD_STRIDE};

pub const ROTATION_SHIFT: u32 = 30;
pub const FACE_MASK: u32 = 0x3fff_ffff;

/// What lies across one edge of a quad face.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeAdjacency {
    /// The face across the edge and the number of 90 degree steps separating
    /// the two faces' local vertex windings.
    Neighbor { face: u32, rotation: u8 },
    /// The edge is referenced by a single face.
    Boundary,
}

/// Pack one adjacency entry into the 32-bit form consumed by the geometry
/// stage that synthesizes ptex borders.
pub fn pack_adjacency(adjacency: EdgeAdjacency) -> u32 {
    match adjacency {
        EdgeAdjacency::Neighbor { face, rotation } => {
            ((rotation as u32) << ROTATION_SHIFT) | (face & FACE_MASK)
        }
        // -1 truncated to the low 30 bits.
        EdgeAdjacency::Boundary => FACE_MASK,
    }
}

/// Inverse of [`pack_adjacency`]. Any entry whose masked face bits are all
/// ones counts as "no neighbor", whatever its rotation bits say.
pub fn unpack_adjacency(packed: u32) -> EdgeAdjacency {
    let face = packed & FACE_MASK;
    if face == FACE_MASK {
        EdgeAdjacency::Boundary
    } else {
        EdgeAdjacency::Neighbor {
            face,
            rotation: (packed >> ROTATION_SHIFT) as u8,
        }
    }
}

pub fn pack_adjacency_buffer(adjacency: &[EdgeAdjacency]) -> Vec<u32> {
    adjacency.iter().copied().map(pack_adjacency).collect()
}

#[derive(Clone, Copy)]
struct EdgeRef {
    face: u32,
    slot: u8,
}

/// Order-independent key for an undirected edge.
fn edge_key(i0: u32, i1: u32) -> u64 {
    ((i0.min(i1) as u64) << 32) | i0.max(i1) as u64
}

/// Compute one adjacency entry per (face, edge) pair of a quad mesh.
///
/// Edges referenced by more than two faces are tolerated: the last other
/// referencing face wins and the rotation is left at zero.
pub fn compute_adjacency(mesh: &MeshData) -> Vec<EdgeAdjacency> {
    let num_faces = mesh.num_faces();

    let mut edge_map: HashMap<u64, Vec<EdgeRef>> = HashMap::with_capacity(num_faces * 2);

    for f in 0..num_faces {
        for e in 0..QUAD_STRIDE {
            let i0 = mesh.indices[f * QUAD_STRIDE + e];
            let i1 = mesh.indices[f * QUAD_STRIDE + (e + 1) % QUAD_STRIDE];
            edge_map
                .entry(edge_key(i0, i1))
                .or_insert_with(|| Vec::with_capacity(2))
                .push(EdgeRef {
                    face: f as u32,
                    slot: e as u8,
                });
        }
    }

    let non_manifold = edge_map.values().filter(|refs| refs.len() > 2).count();
    if non_manifold > 0 {
        warn!("{non_manifold} edges are referenced by more than two faces");
    }

    let mut adjacency = Vec::with_capacity(num_faces * QUAD_STRIDE);

    for f in 0..num_faces {
        for e in 0..QUAD_STRIDE {
            let i0 = mesh.indices[f * QUAD_STRIDE + e];
            let i1 = mesh.indices[f * QUAD_STRIDE + (e + 1) % QUAD_STRIDE];
            let refs = &edge_map[&edge_key(i0, i1)];

            let other = refs.iter().rev().find(|r| r.face != f as u32);

            let entry = match other {
                Some(other) if refs.len() == 2 => EdgeAdjacency::Neighbor {
                    face: other.face,
                    rotation: ((e as i32 - other.slot as i32 + 2) & 3) as u8,
                },
                Some(other) => EdgeAdjacency::Neighbor {
                    face: other.face,
                    rotation: 0,
                },
                None => EdgeAdjacency::Boundary,
            };

            adjacency.push(entry);
        }
    }

    adjacency
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};

    fn mesh_with_indices(num_vertices: usize, indices: Vec<u32>) -> MeshData {
        MeshData {
            positions: vec![Vec4::ONE; num_vertices],
            normals: vec![Vec3::Y; num_vertices],
            indices,
        }
    }

    #[test]
    fn pack_roundtrip() {
        let neighbor = EdgeAdjacency::Neighbor { face: 5, rotation: 3 };
        assert_eq!(pack_adjacency(neighbor), (3 << ROTATION_SHIFT) | 5);
        assert_eq!(unpack_adjacency(pack_adjacency(neighbor)), neighbor);

        assert_eq!(pack_adjacency(EdgeAdjacency::Boundary), FACE_MASK);
        assert_eq!(unpack_adjacency(FACE_MASK), EdgeAdjacency::Boundary);
        // Rotation bits never rescue an all-ones face field.
        assert_eq!(
            unpack_adjacency((3 << ROTATION_SHIFT) | FACE_MASK),
            EdgeAdjacency::Boundary
        );
    }

    #[test]
    fn lone_quad_is_all_boundary() {
        let mesh = mesh_with_indices(4, vec![0, 1, 2, 3]);
        let adjacency = compute_adjacency(&mesh);
        assert_eq!(adjacency, vec![EdgeAdjacency::Boundary; 4]);
        assert_eq!(pack_adjacency_buffer(&adjacency), vec![FACE_MASK; 4]);
    }

    #[test]
    fn shared_edge_is_symmetric() {
        // Faces 0 and 1 share the undirected edge (1, 2): slot 1 of face 0,
        // slot 0 of face 1.
        let mesh = mesh_with_indices(6, vec![0, 1, 2, 3, 2, 1, 4, 5]);
        let adjacency = compute_adjacency(&mesh);

        assert_eq!(
            adjacency[1],
            EdgeAdjacency::Neighbor { face: 1, rotation: 3 }
        );
        assert_eq!(
            adjacency[4],
            EdgeAdjacency::Neighbor { face: 0, rotation: 1 }
        );
    }

    #[test]
    fn rotations_compose_to_identity() {
        // 2x2 grid of quads around a shared center vertex 4.
        let mesh = mesh_with_indices(
            9,
            vec![
                0, 1, 4, 3, //
                1, 2, 5, 4, //
                3, 4, 7, 6, //
                4, 5, 8, 7,
            ],
        );
        let adjacency = compute_adjacency(&mesh);
        assert_eq!(adjacency.len(), mesh.num_faces() * QUAD_STRIDE);

        for f in 0..mesh.num_faces() {
            for e in 0..QUAD_STRIDE {
                let EdgeAdjacency::Neighbor { face: other, rotation } = adjacency[f * 4 + e]
                else {
                    continue;
                };

                // The neighbor must point back with the inverse rotation.
                let back = (0..QUAD_STRIDE)
                    .filter_map(|slot| match adjacency[other as usize * 4 + slot] {
                        EdgeAdjacency::Neighbor { face, rotation } if face == f as u32 => {
                            Some(rotation)
                        }
                        _ => None,
                    })
                    .next();

                let back = back.expect("neighbor entry has no back reference");
                assert_eq!((rotation + back) % 4, 0);
            }
        }
    }

    #[test]
    fn deterministic_across_runs() {
        let mesh = mesh_with_indices(
            9,
            vec![
                0, 1, 4, 3, //
                1, 2, 5, 4, //
                3, 4, 7, 6, //
                4, 5, 8, 7,
            ],
        );
        assert_eq!(compute_adjacency(&mesh), compute_adjacency(&mesh));
    }

    #[test]
    fn over_referenced_edge_uses_last_match() {
        // Three quads all referencing the edge (1, 2).
        let mesh = mesh_with_indices(
            8,
            vec![
                0, 1, 2, 3, //
                2, 1, 4, 5, //
                1, 2, 6, 7,
            ],
        );
        let adjacency = compute_adjacency(&mesh);

        assert_eq!(
            adjacency[1],
            EdgeAdjacency::Neighbor { face: 2, rotation: 0 }
        );
    }
}
