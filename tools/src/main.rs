use std::{fmt::Write, fs, path::Path};

use anyhow::{Context, Result};
use atlas_file::AtlasParameters;
use clap::{Parser, Subcommand};
use glam::{Vec3, Vec4};
use ptex::{EdgeAdjacency, MeshData, compute_adjacency, load_quad_obj, partition_mesh};
use random::Random;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate a jittered quad grid scene with matching atlas tiles.
    GenTestScene {
        #[arg(short, long, default_value = "assets/test-scene")]
        out_dir: String,

        /// Quads per side of the grid.
        #[arg(long, default_value_t = 16)]
        grid: u32,

        #[arg(long, default_value_t = 4.0)]
        split_size: f32,

        #[arg(long, default_value_t = 32)]
        tile_size: u32,
    },

    /// Print chunk and adjacency statistics for a quad mesh.
    ChunkStats {
        mesh: String,

        #[arg(long, default_value_t = 4.0)]
        split_size: f32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    Random::seed(770_313_370_001);

    match &cli.command {
        Some(Commands::GenTestScene {
            out_dir,
            grid,
            split_size,
            tile_size,
        }) => {
            generate_test_scene(Path::new(out_dir), *grid, *split_size, *tile_size)?;
        }
        Some(Commands::ChunkStats { mesh, split_size }) => {
            chunk_stats(Path::new(mesh), *split_size)?;
        }
        None => {
            println!("Please specify a command");
        }
    }

    Ok(())
}

/// A flat quad grid in the XZ plane with jittered vertex heights.
fn generate_grid_mesh(grid: u32) -> MeshData {
    let mut mesh = MeshData::default();

    for z in 0..=grid {
        for x in 0..=grid {
            let y = Random::sample_in_range(-0.05f32, 0.05);
            mesh.positions.push(Vec4::new(x as f32, y, z as f32, 1.0));
            mesh.normals.push(Vec3::Y);
        }
    }

    let stride = grid + 1;
    for z in 0..grid {
        for x in 0..grid {
            let v = z * stride + x;
            mesh.indices.extend([v, v + 1, v + 1 + stride, v + stride]);
        }
    }

    mesh
}

fn write_obj(mesh: &MeshData, path: &Path) -> Result<()> {
    let mut obj = String::new();

    for p in &mesh.positions {
        writeln!(obj, "v {} {} {}", p.x, p.y, p.z)?;
    }
    for n in &mesh.normals {
        writeln!(obj, "vn {} {} {}", n.x, n.y, n.z)?;
    }
    for f in 0..mesh.num_faces() {
        let [a, b, c, d] = mesh.face(f).map(|i| i + 1);
        writeln!(obj, "f {a}//{a} {b}//{b} {c}//{c} {d}//{d}")?;
    }

    fs::write(path, obj).with_context(|| format!("Unable to write '{}'", path.display()))?;
    Ok(())
}

/// Smallest tile-grid side that fits `num_faces` tiles.
fn tiles_per_row(num_faces: usize) -> u32 {
    let mut tiles = (num_faces as u64).isqrt() as u32;
    if (tiles as usize * tiles as usize) < num_faces {
        tiles += 1;
    }
    tiles
}

fn generate_test_scene(out_dir: &Path, grid: u32, split_size: f32, tile_size: u32) -> Result<()> {
    println!("Generating test scene in '{}'", out_dir.display());

    fs::create_dir_all(out_dir)
        .with_context(|| format!("Unable to create '{}'", out_dir.display()))?;

    let mesh = generate_grid_mesh(grid);
    write_obj(&mesh, &out_dir.join("mesh.obj"))?;

    let parameters = AtlasParameters {
        split_size,
        tile_size,
    };
    parameters.save_json(&out_dir.join("parameters.json"))?;

    // One solid-color tile per chunk, sized to hold one tile per face.
    let chunks = partition_mesh(mesh, split_size);
    for (i, chunk) in chunks.iter().enumerate() {
        let dim = tile_size * tiles_per_row(chunk.num_faces());
        let color = Random::vec3_in_range(0.2, 1.0);
        let texel = [
            (color.x * 255.0) as u8,
            (color.y * 255.0) as u8,
            (color.z * 255.0) as u8,
        ];

        let mut bytes = Vec::with_capacity((dim * dim) as usize * 3);
        for _ in 0..dim * dim {
            bytes.extend_from_slice(&texel);
        }

        let path = out_dir.join(format!("{i}-color-ptex.rgb"));
        fs::write(&path, bytes)
            .with_context(|| format!("Unable to write '{}'", path.display()))?;
    }

    println!(
        "Wrote {} vertices, {} faces, {} atlas tiles",
        (grid + 1) * (grid + 1),
        grid * grid,
        chunks.len()
    );
    Ok(())
}

fn chunk_stats(mesh_path: &Path, split_size: f32) -> Result<()> {
    let mesh = load_quad_obj(mesh_path)?;
    println!(
        "{}: {} vertices, {} faces",
        mesh_path.display(),
        mesh.num_vertices(),
        mesh.num_faces()
    );

    let chunks = partition_mesh(mesh, split_size);
    println!("{} chunks at split size {split_size}", chunks.len());

    println!("chunk    faces    verts    boundary edges");
    for (i, chunk) in chunks.iter().enumerate() {
        let boundary = compute_adjacency(chunk)
            .iter()
            .filter(|a| **a == EdgeAdjacency::Boundary)
            .count();
        println!(
            "{i: >5} {: >8} {: >8} {boundary: >13}",
            chunk.num_faces(),
            chunk.num_vertices()
        );
    }

    Ok(())
}
