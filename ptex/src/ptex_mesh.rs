use std::{path::Path, sync::Arc};

use anyhow::{Result, ensure};
use atlas_file::AtlasParameters;
use log::{info, warn};
use rayon::prelude::*;
use vulkano::{
    buffer::{BufferUsage, Subbuffer},
    command_buffer::{AutoCommandBufferBuilder, CommandBufferUsage, PrimaryCommandBufferAbstract},
    sync::GpuFuture,
};

use crate::{
    AtlasTile, RenderParams, Vk, compute_adjacency, create_buffer, load_atlas_tile, load_quad_obj,
    pack_adjacency_buffer, partition_mesh, probe_atlas_tile,
};

/// One GPU-resident chunk of the scene mesh.
pub struct SubMesh {
    pub vbo: Subbuffer<[[f32; 4]]>,
    pub ibo: Subbuffer<[u32]>,
    /// One packed entry per (face, edge), bound as a storage buffer.
    pub abo: Subbuffer<[u32]>,
    pub atlas: AtlasTile,
    pub num_faces: u32,
}

/// The prepared scene: spatially-partitioned sub-meshes with adjacency and
/// atlas textures resident on the GPU, plus the mesh-level render defaults.
pub struct PTexMesh {
    pub submeshes: Vec<SubMesh>,
    /// Texels per ptex face tile.
    pub tile_size: u32,
    /// Tone-mapping defaults derived from the atlas encodings.
    pub params: RenderParams,
    pub is_hdr: bool,
}

impl PTexMesh {
    /// Load a quad mesh and its atlas folder, partition it per the atlas
    /// parameters and upload everything. All GPU calls stay on the calling
    /// thread; only the CPU-side partitioning and adjacency fan out.
    pub fn new(vk: Arc<Vk>, mesh_file: &Path, atlas_folder: &Path) -> Result<Self> {
        ensure!(
            mesh_file.exists(),
            "Mesh file '{}' not found",
            mesh_file.display()
        );
        ensure!(
            atlas_folder.is_dir(),
            "Atlas folder '{}' not found",
            atlas_folder.display()
        );

        let parameters = AtlasParameters::load_json(&atlas_folder.join("parameters.json"))?;
        info!(
            "Atlas parameters: splitSize {}, tileSize {}",
            parameters.split_size, parameters.tile_size
        );

        let chunks = {
            let mesh = load_quad_obj(mesh_file)?;
            info!("Splitting mesh...");
            partition_mesh(mesh, parameters.split_size)
        };
        info!("Split into {} chunks", chunks.len());

        info!("Calculating mesh adjacency...");
        let adjacency: Vec<Vec<u32>> = chunks
            .par_iter()
            .map(|chunk| pack_adjacency_buffer(&compute_adjacency(chunk)))
            .collect();

        let num_chunks = chunks.len();
        let mut submeshes = Vec::with_capacity(num_chunks);
        let mut encodings = Vec::with_capacity(num_chunks);

        let mut builder = AutoCommandBufferBuilder::primary(
            vk.command_buffer_allocator.clone(),
            vk.queue.queue_family_index(),
            CommandBufferUsage::OneTimeSubmit,
        )?;

        for (i, (chunk, adjacency)) in chunks.iter().zip(&adjacency).enumerate() {
            info!("Loading mesh {}/{num_chunks}", i + 1);

            let vbo = create_buffer(
                &vk,
                BufferUsage::VERTEX_BUFFER,
                chunk.positions.iter().map(|p| p.to_array()),
            )?;
            let ibo = create_buffer(&vk, BufferUsage::INDEX_BUFFER, chunk.indices.iter().copied())?;
            let abo = create_buffer(&vk, BufferUsage::STORAGE_BUFFER, adjacency.iter().copied())?;

            let (path, encoding) = probe_atlas_tile(atlas_folder, i)?;
            info!("Loading atlas {}/{num_chunks}", i + 1);
            let atlas = load_atlas_tile(vk.clone(), &mut builder, &path, encoding)?;
            encodings.push(encoding);

            submeshes.push(SubMesh {
                vbo,
                ibo,
                abo,
                atlas,
                num_faces: chunk.num_faces() as u32,
            });
        }

        builder
            .build()?
            .execute(vk.queue.clone())?
            .then_signal_fence_and_flush()?
            .wait(None /* timeout */)?;

        let is_hdr = encodings.iter().any(|e| e.is_hdr());
        if is_hdr && !encodings.iter().all(|e| e.is_hdr()) {
            warn!("Atlas mixes HDR and LDR tile encodings; treating the scene as HDR");
        }

        Ok(Self {
            submeshes,
            tile_size: parameters.tile_size,
            params: RenderParams::for_encoding(is_hdr),
            is_hdr,
        })
    }

    pub fn num_faces(&self) -> usize {
        self.submeshes.iter().map(|m| m.num_faces as usize).sum()
    }

    /// Tiles per atlas row for a sub-mesh, consumed as a shader uniform.
    pub fn width_in_tiles(&self, submesh: usize) -> u32 {
        self.submeshes[submesh].atlas.dim / self.tile_size
    }
}
