use anyhow::{Result, ensure};
use glam::{Vec3, Vec4};

/// Number of indices per polygon. The whole pipeline assumes quads.
pub const QUAD_STRIDE: usize = 4;

/// CPU-side mesh storage: homogeneous positions, a parallel normal buffer and
/// an index buffer grouped into quads.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<Vec4>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    pub fn num_faces(&self) -> usize {
        self.indices.len() / QUAD_STRIDE
    }

    /// The four vertex indices of face `f`.
    pub fn face(&self, f: usize) -> [u32; 4] {
        let base = f * QUAD_STRIDE;
        [
            self.indices[base],
            self.indices[base + 1],
            self.indices[base + 2],
            self.indices[base + 3],
        ]
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.indices.len() % QUAD_STRIDE == 0,
            "Index count {} is not a multiple of {QUAD_STRIDE}; must be a quad mesh",
            self.indices.len()
        );
        ensure!(
            self.normals.len() == self.positions.len(),
            "Normal count {} does not match vertex count {}",
            self.normals.len(),
            self.positions.len()
        );
        if let Some(&max) = self.indices.iter().max() {
            ensure!(
                (max as usize) < self.positions.len(),
                "Index {max} out of range for {} vertices",
                self.positions.len()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_quad_stride() {
        let mesh = MeshData {
            positions: vec![Vec4::ONE; 3],
            normals: vec![Vec3::Y; 3],
            indices: vec![0, 1, 2],
        };
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_index() {
        let mesh = MeshData {
            positions: vec![Vec4::ONE; 3],
            normals: vec![Vec3::Y; 3],
            indices: vec![0, 1, 2, 3],
        };
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn accepts_single_quad() {
        let mesh = MeshData {
            positions: vec![Vec4::ONE; 4],
            normals: vec![Vec3::Y; 4],
            indices: vec![0, 1, 2, 3],
        };
        assert!(mesh.validate().is_ok());
        assert_eq!(mesh.num_faces(), 1);
        assert_eq!(mesh.face(0), [0, 1, 2, 3]);
    }
}
