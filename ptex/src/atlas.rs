use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result, bail};
use log::debug;
use memmap2::Mmap;
use vulkano::{
    DeviceSize,
    buffer::{Buffer, BufferCreateInfo, BufferUsage, Subbuffer},
    command_buffer::{
        AutoCommandBufferBuilder, BlitImageInfo, CopyBufferToImageInfo, ImageBlit,
        PrimaryAutoCommandBuffer,
    },
    format::Format,
    image::{
        Image, ImageCreateInfo, ImageSubresourceLayers, ImageType, ImageUsage, sampler::Filter,
        view::ImageView,
    },
    memory::allocator::{AllocationCreateInfo, MemoryTypeFilter},
};

use crate::Vk;

/// On-disk encodings of a ptex atlas tile, in probe priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AtlasEncoding {
    /// Block-compressed, 4 bits per pixel.
    Dxt1,
    /// 3 bytes per pixel, mipmapped after upload.
    Rgb8,
    /// 3 half floats per pixel. Marks the whole scene as HDR.
    HalfRgb,
}

impl AtlasEncoding {
    pub const PROBE_ORDER: [Self; 3] = [Self::Dxt1, Self::Rgb8, Self::HalfRgb];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Dxt1 => "dxt1",
            Self::Rgb8 => "rgb",
            Self::HalfRgb => "hdr",
        }
    }

    /// Side length of the square tile held by a file of `num_bytes`.
    pub fn tile_dimension(self, num_bytes: u64) -> u32 {
        let pixels = match self {
            Self::Dxt1 => num_bytes * 2,
            Self::Rgb8 => num_bytes / 3,
            Self::HalfRgb => num_bytes / 6,
        };
        pixels.isqrt() as u32
    }

    pub fn is_hdr(self) -> bool {
        matches!(self, Self::HalfRgb)
    }

    fn format(self) -> Format {
        match self {
            Self::Dxt1 => Format::BC1_RGB_UNORM_BLOCK,
            Self::Rgb8 => Format::R8G8B8_UNORM,
            Self::HalfRgb => Format::R16G16B16_SFLOAT,
        }
    }

    fn mipmapped(self) -> bool {
        matches!(self, Self::Rgb8)
    }
}

/// Locate the single atlas tile for `chunk`, trying the three known
/// encodings in priority order.
pub fn probe_atlas_tile(atlas_folder: &Path, chunk: usize) -> Result<(PathBuf, AtlasEncoding)> {
    for encoding in AtlasEncoding::PROBE_ORDER {
        let path = atlas_folder.join(format!("{chunk}-color-ptex.{}", encoding.extension()));
        if path.exists() {
            return Ok((path, encoding));
        }
    }
    bail!(
        "No atlas tile for chunk {chunk} in '{}'",
        atlas_folder.display()
    )
}

/// One GPU-resident atlas tile.
pub struct AtlasTile {
    pub view: Arc<ImageView>,
    pub dim: u32,
    pub encoding: AtlasEncoding,
}

/// Map the tile file, size the texture from its byte length and record the
/// upload into `builder`. The mapping is dropped as soon as the staging
/// buffer holds the bytes.
pub fn load_atlas_tile(
    vk: Arc<Vk>,
    builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
    path: &Path,
    encoding: AtlasEncoding,
) -> Result<AtlasTile> {
    let file = File::open(path)
        .with_context(|| format!("Unable to open atlas tile '{}'", path.display()))?;

    // Safety: tiles are static inputs prepared ahead of time; nothing
    // rewrites them while mapped.
    let mapping = unsafe { Mmap::map(&file)? };

    let dim = encoding.tile_dimension(mapping.len() as u64);
    debug!(
        "Atlas tile '{}': {} bytes, {dim} x {dim} {encoding:?}",
        path.display(),
        mapping.len()
    );

    let mip_levels = if encoding.mipmapped() {
        dim.max(1).ilog2() + 1
    } else {
        1
    };

    let image = Image::new(
        vk.memory_allocator.clone(),
        ImageCreateInfo {
            image_type: ImageType::Dim2d,
            format: encoding.format(),
            extent: [dim, dim, 1],
            array_layers: 1,
            mip_levels,
            usage: ImageUsage::TRANSFER_SRC | ImageUsage::TRANSFER_DST | ImageUsage::SAMPLED,
            ..Default::default()
        },
        AllocationCreateInfo::default(),
    )?;

    let staging: Subbuffer<[u8]> = Buffer::new_slice(
        vk.memory_allocator.clone(),
        BufferCreateInfo {
            usage: BufferUsage::TRANSFER_SRC,
            ..Default::default()
        },
        AllocationCreateInfo {
            memory_type_filter: MemoryTypeFilter::PREFER_HOST
                | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
            ..Default::default()
        },
        mapping.len() as DeviceSize,
    )?;

    {
        let mut writer = staging.write()?;
        writer.copy_from_slice(&mapping);
    }
    drop(mapping);

    builder.copy_buffer_to_image(CopyBufferToImageInfo::buffer_image(staging, image.clone()))?;

    if mip_levels > 1 {
        record_mipmap_blits(builder, &image, dim, mip_levels)?;
    }

    let view = ImageView::new_default(image)?;

    Ok(AtlasTile {
        view,
        dim,
        encoding,
    })
}

/// Downsample each mip level from the one above it.
fn record_mipmap_blits(
    builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
    image: &Arc<Image>,
    dim: u32,
    mip_levels: u32,
) -> Result<()> {
    for level in 1..mip_levels {
        let src_dim = (dim >> (level - 1)).max(1);
        let dst_dim = (dim >> level).max(1);

        builder.blit_image(BlitImageInfo {
            regions: [ImageBlit {
                src_subresource: ImageSubresourceLayers {
                    mip_level: level - 1,
                    ..image.subresource_layers()
                },
                src_offsets: [[0; 3], [src_dim, src_dim, 1]],
                dst_subresource: ImageSubresourceLayers {
                    mip_level: level,
                    ..image.subresource_layers()
                },
                dst_offsets: [[0; 3], [dst_dim, dst_dim, 1]],
                ..Default::default()
            }]
            .into(),
            filter: Filter::Linear,
            ..BlitImageInfo::images(image.clone(), image.clone())
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_dimension_roundtrip() {
        for dim in [4u64, 64, 256, 1024] {
            assert_eq!(AtlasEncoding::Dxt1.tile_dimension(dim * dim / 2), dim as u32);
            assert_eq!(AtlasEncoding::Rgb8.tile_dimension(3 * dim * dim), dim as u32);
            assert_eq!(AtlasEncoding::HalfRgb.tile_dimension(6 * dim * dim), dim as u32);
        }
    }

    #[test]
    fn probe_follows_priority_order() {
        let dir = std::env::temp_dir().join(format!("ptex-probe-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        std::fs::write(dir.join("0-color-ptex.rgb"), [0u8; 12]).unwrap();
        std::fs::write(dir.join("0-color-ptex.dxt1"), [0u8; 8]).unwrap();
        std::fs::write(dir.join("1-color-ptex.hdr"), [0u8; 24]).unwrap();

        let (path, encoding) = probe_atlas_tile(&dir, 0).unwrap();
        assert_eq!(encoding, AtlasEncoding::Dxt1);
        assert!(path.ends_with("0-color-ptex.dxt1"));

        let (_, encoding) = probe_atlas_tile(&dir, 1).unwrap();
        assert_eq!(encoding, AtlasEncoding::HalfRgb);

        assert!(probe_atlas_tile(&dir, 2).is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
