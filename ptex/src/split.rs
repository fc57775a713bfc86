use foldhash::{HashMap, HashMapExt};
use glam::Vec3;
use log::debug;
use rayon::prelude::*;

use crate::{MeshData, QUAD_STRIDE};

/// Spreads the low 21 bits of `x` so that two zero bits separate each of them.
fn part_1_by_2(x: u64) -> u64 {
    let mut x = x & 0x1f_ffff;
    x = (x | (x << 32)) & 0x1f00000000ffff;
    x = (x | (x << 16)) & 0x1f0000ff0000ff;
    x = (x | (x << 8)) & 0x100f00f00f00f00f;
    x = (x | (x << 4)) & 0x10c30c30c30c30c3;
    x = (x | (x << 2)) & 0x1249249249249249;
    x
}

/// Interleave a 3D grid cell into a 64-bit Morton code, 21 bits per axis.
pub fn encode_morton3(x: u64, y: u64, z: u64) -> u64 {
    (part_1_by_2(z) << 2) | (part_1_by_2(y) << 1) | part_1_by_2(x)
}

/// Per-face sorting record: the face's indices plus its grid cell code.
#[derive(Clone, Copy)]
struct SortFace {
    indices: [u32; 4],
    code: u64,
}

/// Partition `mesh` into sub-meshes of faces sharing a grid cell, or return
/// the whole mesh as a single chunk when `split_size` is not positive.
pub fn partition_mesh(mesh: MeshData, split_size: f32) -> Vec<MeshData> {
    if split_size > 0.0 {
        split_mesh(&mesh, split_size)
    } else {
        vec![mesh]
    }
}

/// Bucket faces into locality-coherent chunks by sorting them along a Morton
/// curve over a `split_size`-spaced grid. Each contiguous run of faces with
/// equal cell code becomes one chunk with its own compact vertex arrays.
pub fn split_mesh(mesh: &MeshData, split_size: f32) -> Vec<MeshData> {
    assert!(split_size > 0.0, "Split size must be positive");

    let mut box_min = Vec3::splat(f32::MAX);
    for p in &mesh.positions {
        box_min = box_min.min(p.truncate());
    }

    // Grid cell code per vertex.
    let codes: Vec<u64> = mesh
        .positions
        .par_iter()
        .map(|p| {
            let cell = (p.truncate() - box_min) / split_size;
            encode_morton3(cell.x as u64, cell.y as u64, cell.z as u64)
        })
        .collect();

    // A face's code is the minimum over its vertices, so grouping does not
    // depend on vertex order within the face.
    let mut faces: Vec<SortFace> = (0..mesh.num_faces())
        .into_par_iter()
        .map(|f| {
            let indices = mesh.face(f);
            let code = indices
                .iter()
                .fold(u64::MAX, |code, &i| code.min(codes[i as usize]));
            SortFace { indices, code }
        })
        .collect();

    if faces.is_empty() {
        return Vec::new();
    }

    // Stable sort: faces with equal codes keep their original order.
    faces.par_sort_by_key(|f| f.code);

    let mut chunk_starts = vec![0];
    for i in 1..faces.len() {
        if faces[i].code != faces[i - 1].code {
            chunk_starts.push(i);
        }
    }
    chunk_starts.push(faces.len());

    debug!(
        "Split {} faces into {} chunks",
        faces.len(),
        chunk_starts.len() - 1
    );

    chunk_starts
        .par_windows(2)
        .map(|range| build_chunk(mesh, &faces[range[0]..range[1]]))
        .collect()
}

/// Copy one run of faces into a sub-mesh, remapping global vertex indices to
/// local ones in first-occurrence order.
fn build_chunk(mesh: &MeshData, faces: &[SortFace]) -> MeshData {
    let mut chunk = MeshData::default();
    chunk.indices.reserve(faces.len() * QUAD_STRIDE);

    let mut refd_verts = Vec::new();
    let mut remap: HashMap<u32, u32> = HashMap::new();

    for face in faces {
        for &global in &face.indices {
            let local = *remap.entry(global).or_insert_with(|| {
                refd_verts.push(global);
                (refd_verts.len() - 1) as u32
            });
            chunk.indices.push(local);
        }
    }

    chunk.positions = refd_verts
        .iter()
        .map(|&i| mesh.positions[i as usize])
        .collect();
    chunk.normals = refd_verts
        .iter()
        .map(|&i| mesh.normals[i as usize])
        .collect();
    chunk
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    /// A flat grid of `nx` by `nz` quads in the XZ plane.
    fn quad_grid(nx: usize, nz: usize, spacing: f32) -> MeshData {
        let mut mesh = MeshData::default();
        for z in 0..=nz {
            for x in 0..=nx {
                mesh.positions
                    .push(Vec4::new(x as f32 * spacing, 0.0, z as f32 * spacing, 1.0));
                mesh.normals.push(Vec3::Y);
            }
        }
        let stride = (nx + 1) as u32;
        for z in 0..nz {
            for x in 0..nx {
                let v = z as u32 * stride + x as u32;
                mesh.indices.extend([v, v + 1, v + 1 + stride, v + stride]);
            }
        }
        mesh
    }

    /// First-corner position of every face, as a comparable bit pattern.
    fn corner_keys(mesh: &MeshData) -> Vec<[u32; 4]> {
        (0..mesh.num_faces())
            .map(|f| mesh.positions[mesh.face(f)[0] as usize].to_array().map(f32::to_bits))
            .collect()
    }

    #[test]
    fn morton_interleaves_axes() {
        assert_eq!(encode_morton3(1, 0, 0), 1);
        assert_eq!(encode_morton3(0, 1, 0), 2);
        assert_eq!(encode_morton3(0, 0, 1), 4);
        assert_eq!(encode_morton3(3, 3, 3), 63);
        // Only 21 bits per axis survive.
        assert_eq!(encode_morton3(1 << 21, 0, 0), 0);
    }

    #[test]
    fn partition_covers_every_face_once() {
        let mesh = quad_grid(4, 4, 1.0);
        let chunks = split_mesh(&mesh, 1.0);

        let total: usize = chunks.iter().map(|c| c.num_faces()).sum();
        assert_eq!(total, mesh.num_faces());

        let mut original = corner_keys(&mesh);
        let mut split: Vec<_> = chunks.iter().flat_map(corner_keys).collect();
        original.sort();
        split.sort();
        assert_eq!(original, split);
    }

    #[test]
    fn chunks_are_locally_indexed() {
        let mesh = quad_grid(4, 4, 1.0);
        for chunk in split_mesh(&mesh, 2.0) {
            assert!(chunk.validate().is_ok());
            assert_eq!(chunk.normals.len(), chunk.positions.len());
            for &i in &chunk.indices {
                assert!((i as usize) < chunk.num_vertices());
            }
            // Every chunk vertex is a copy of some original vertex.
            for p in &chunk.positions {
                assert!(mesh.positions.contains(p));
            }
        }
    }

    #[test]
    fn shared_vertices_are_not_duplicated_within_a_chunk() {
        let mesh = quad_grid(2, 2, 0.1);
        let chunks = split_mesh(&mesh, 10.0);
        assert_eq!(chunks.len(), 1);
        // 4 quads in one cell reference 9 distinct vertices.
        assert_eq!(chunks[0].num_vertices(), 9);
    }

    #[test]
    fn faces_grouped_by_grid_cell() {
        let mesh = quad_grid(4, 1, 1.0);
        let chunks = split_mesh(&mesh, 2.0);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].num_faces(), 2);
        assert_eq!(chunks[1].num_faces(), 2);
    }

    #[test]
    fn deterministic_across_runs() {
        let mesh = quad_grid(6, 6, 0.7);
        let first = split_mesh(&mesh, 1.3);
        let second = split_mesh(&mesh, 1.3);
        assert_eq!(first, second);
    }

    #[test]
    fn non_positive_split_size_keeps_whole_mesh() {
        let mesh = quad_grid(3, 3, 1.0);
        let expected = mesh.clone();

        let chunks = partition_mesh(mesh.clone(), 0.0);
        assert_eq!(chunks, vec![expected.clone()]);

        let chunks = partition_mesh(mesh, -1.0);
        assert_eq!(chunks, vec![expected]);
    }
}
