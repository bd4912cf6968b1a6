//! Image codec boundary: decode arbitrary inputs into 4-channel buffers at the
//! depth the GPU textures expect, and encode 8-bit results as TGA.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::tga::TgaEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageError};

use crate::types::{Extent, PipelineError};

/// Every buffer is normalised to RGBA on load.
pub const CHANNELS: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    Eight,
    Sixteen,
}

impl BitDepth {
    pub fn bytes_per_channel(self) -> u32 {
        match self {
            BitDepth::Eight => 1,
            BitDepth::Sixteen => 2,
        }
    }

    pub fn bytes_per_texel(self) -> u32 {
        self.bytes_per_channel() * CHANNELS
    }
}

/// A tightly packed RGBA payload. 16-bit channels are stored little-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelImage {
    pub extent: Extent,
    pub depth: BitDepth,
    /// Channel count of the decoded source before RGBA normalisation.
    pub source_channels: u8,
    pub pixels: Vec<u8>,
}

impl PixelImage {
    pub fn expected_len(extent: Extent, depth: BitDepth) -> u64 {
        extent.texel_count() * u64::from(depth.bytes_per_texel())
    }

    pub fn is_consistent(&self) -> bool {
        self.pixels.len() as u64 == Self::expected_len(self.extent, self.depth)
    }

    /// Narrows a 16-bit buffer to 8 bits per channel; 8-bit buffers are cloned.
    pub fn to_rgba8(&self) -> PixelImage {
        let pixels = match self.depth {
            BitDepth::Eight => self.pixels.clone(),
            BitDepth::Sixteen => self
                .pixels
                .chunks_exact(2)
                .map(|pair| {
                    let value = u16::from_le_bytes([pair[0], pair[1]]);
                    ((u32::from(value) * 255 + 32767) / 65535) as u8
                })
                .collect(),
        };
        PixelImage {
            extent: self.extent,
            depth: BitDepth::Eight,
            source_channels: self.source_channels,
            pixels,
        }
    }
}

fn reject_empty(what: &'static str, path: &Path, extent: Extent) -> Result<(), PipelineError> {
    if extent.is_empty() {
        return Err(PipelineError::EmptyImage {
            what,
            path: path.to_path_buf(),
            extent,
        });
    }
    Ok(())
}

/// Loads the primary input at 16 bits per channel; 8-bit sources are widened.
pub fn load_input(path: &Path) -> Result<PixelImage, PipelineError> {
    let what = "input image";
    let decoded = image::open(path).map_err(|source| PipelineError::Decode {
        what,
        path: path.to_path_buf(),
        source,
    })?;
    let source_channels = decoded.color().channel_count();
    let rgba = decoded.into_rgba16();
    let extent = Extent::new(rgba.width(), rgba.height());
    reject_empty(what, path, extent)?;

    let pixels = rgba
        .as_raw()
        .iter()
        .flat_map(|channel| channel.to_le_bytes())
        .collect();
    tracing::debug!(%extent, source_channels, path = %path.display(), "decoded input image");
    Ok(PixelImage {
        extent,
        depth: BitDepth::Sixteen,
        source_channels,
        pixels,
    })
}

/// Loads a replacement noise texture at 8 bits per channel.
pub fn load_noise(path: &Path) -> Result<PixelImage, PipelineError> {
    let what = "noise texture";
    let decoded = image::open(path).map_err(|source| PipelineError::Decode {
        what,
        path: path.to_path_buf(),
        source,
    })?;
    let source_channels = decoded.color().channel_count();
    let rgba = decoded.into_rgba8();
    let extent = Extent::new(rgba.width(), rgba.height());
    reject_empty(what, path, extent)?;
    tracing::debug!(%extent, source_channels, path = %path.display(), "decoded noise texture");
    Ok(PixelImage {
        extent,
        depth: BitDepth::Eight,
        source_channels,
        pixels: rgba.into_raw(),
    })
}

/// Writes an 8-bit RGBA buffer as an uncompressed 32-bit TGA.
pub fn write_tga(path: &Path, image: &PixelImage) -> Result<(), PipelineError> {
    let encode_error = |source: ImageError| PipelineError::Encode {
        path: path.to_path_buf(),
        source,
    };
    if image.depth != BitDepth::Eight || !image.is_consistent() {
        return Err(encode_error(ImageError::Parameter(
            image::error::ParameterError::from_kind(
                image::error::ParameterErrorKind::DimensionMismatch,
            ),
        )));
    }

    let file = File::create(path).map_err(|err| encode_error(ImageError::IoError(err)))?;
    TgaEncoder::new(BufWriter::new(file))
        .disable_rle()
        .write_image(
            &image.pixels,
            image.extent.width,
            image.extent.height,
            ExtendedColorType::Rgba8,
        )
        .map_err(encode_error)
}
