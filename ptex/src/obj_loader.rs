use std::path::Path;

use anyhow::{Context, Result, ensure};
use glam::{Vec3, Vec4};
use log::{debug, warn};

use crate::MeshData;

/// Load a Wavefront OBJ file as a quad mesh. Every face must have exactly
/// four vertices; triangulated input is rejected.
pub fn load_quad_obj(path: &Path) -> Result<MeshData> {
    let load_options = tobj::LoadOptions {
        single_index: true,
        triangulate: false,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    };

    let (models, _materials) = tobj::load_obj(path, &load_options)
        .with_context(|| format!("Unable to load mesh '{}'", path.display()))?;

    let mut data = MeshData::default();

    for model in models.iter() {
        let mesh = &model.mesh;

        for &arity in mesh.face_arities.iter() {
            ensure!(
                arity == 4,
                "Mesh '{}' has a face with {arity} vertices; must be a quad mesh",
                path.display()
            );
        }

        let base = data.positions.len() as u32;

        data.positions.extend(
            mesh.positions
                .chunks_exact(3)
                .map(|p| Vec4::new(p[0], p[1], p[2], 1.0)),
        );

        if mesh.normals.is_empty() {
            warn!("Mesh '{}' in '{}' has no normals", model.name, path.display());
            data.normals.resize(data.positions.len(), Vec3::ZERO);
        } else {
            data.normals.extend(
                mesh.normals
                    .chunks_exact(3)
                    .map(|n| Vec3::new(n[0], n[1], n[2])),
            );
        }

        data.indices.extend(mesh.indices.iter().map(|&i| base + i));
    }

    debug!(
        "Vertex count: {}, Indices count: {}",
        data.positions.len(),
        data.indices.len()
    );

    data.validate()?;

    Ok(data)
}
