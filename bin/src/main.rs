mod context;

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use log::info;
use ptex::PTexMesh;

use crate::context::create_context;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the quad mesh OBJ file.
    mesh: String,

    /// Path to the ptex atlas folder.
    atlas: String,

    /// Override the default exposure.
    #[arg(long)]
    exposure: Option<f32>,

    /// Override the default gamma.
    #[arg(long)]
    gamma: Option<f32>,

    /// Override the default saturation.
    #[arg(long)]
    saturation: Option<f32>,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let vk = create_context()?;
    let mut mesh = PTexMesh::new(vk, Path::new(&cli.mesh), Path::new(&cli.atlas))?;

    if let Some(exposure) = cli.exposure {
        mesh.params.exposure = exposure;
    }
    if let Some(gamma) = cli.gamma {
        mesh.params.gamma = gamma;
    }
    if let Some(saturation) = cli.saturation {
        mesh.params.saturation = saturation;
    }

    info!(
        "Loaded {} sub-meshes, {} faces, hdr: {}",
        mesh.submeshes.len(),
        mesh.num_faces(),
        mesh.is_hdr
    );
    info!(
        "Render parameters: exposure {}, gamma {}, saturation {}",
        mesh.params.exposure, mesh.params.gamma, mesh.params.saturation
    );

    Ok(())
}
