//! Sizing and partitioning of the shared transfer buffer.
//!
//! Texel copies must use rows padded to `COPY_BYTES_PER_ROW_ALIGNMENT`, and the
//! buffer contents are captured when the command buffer is submitted rather
//! than when a copy is recorded. Both uploads are recorded before the single
//! submission, so they occupy disjoint regions: input at offset 0, noise at
//! the next aligned offset. The readback reuses offset 0 once the input copy
//! has been consumed earlier in the same command buffer.

use std::ops::Range;

use crate::image_io::{BitDepth, PixelImage, CHANNELS};
use crate::types::{Extent, PipelineError};

const ROW_ALIGNMENT: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

/// Lower bound on transfer capacity: the largest extent of either source at the
/// widest channel depth ever staged (`max(w,nw) * max(h,nh) * 4 * 2`).
pub fn minimum_capacity(input: Extent, noise: Extent) -> u64 {
    let width = u64::from(input.width.max(noise.width));
    let height = u64::from(input.height.max(noise.height));
    width * height * u64::from(CHANNELS) * u64::from(BitDepth::Sixteen.bytes_per_channel())
}

/// A pitched window of the transfer buffer holding one texture's texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyRegion {
    pub offset: u64,
    pub extent: Extent,
    pub depth: BitDepth,
    pub row_pitch: u32,
}

impl CopyRegion {
    fn new(offset: u64, extent: Extent, depth: BitDepth) -> Self {
        let tight = extent.width * depth.bytes_per_texel();
        Self {
            offset,
            extent,
            depth,
            row_pitch: align_up(u64::from(tight), u64::from(ROW_ALIGNMENT)) as u32,
        }
    }

    /// Bytes of texel data in one row, without padding.
    pub fn row_bytes(&self) -> usize {
        (self.extent.width * self.depth.bytes_per_texel()) as usize
    }

    pub fn packed_len(&self) -> u64 {
        PixelImage::expected_len(self.extent, self.depth)
    }

    pub fn len(&self) -> u64 {
        u64::from(self.row_pitch) * u64::from(self.extent.height)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn end(&self) -> u64 {
        self.offset + self.len()
    }

    pub fn range(&self) -> Range<u64> {
        self.offset..self.end()
    }

    pub(crate) fn buffer_layout(&self) -> wgpu::TexelCopyBufferLayout {
        wgpu::TexelCopyBufferLayout {
            offset: self.offset,
            bytes_per_row: Some(self.row_pitch),
            rows_per_image: Some(self.extent.height),
        }
    }

    /// Checks that `image` is exactly what this region was sized for.
    pub fn check_payload(&self, what: &'static str, image: &PixelImage) -> Result<(), PipelineError> {
        if image.extent != self.extent || image.depth != self.depth || !image.is_consistent() {
            return Err(PipelineError::PayloadSize {
                what,
                actual: image.pixels.len(),
                expected: self.packed_len(),
            });
        }
        Ok(())
    }

    /// Scatters tightly packed rows into a mapped view of this region.
    pub fn write_rows(&self, mapped: &mut [u8], packed: &[u8]) {
        let row_bytes = self.row_bytes();
        let pitch = self.row_pitch as usize;
        for (row, texels) in packed.chunks_exact(row_bytes).enumerate() {
            let start = row * pitch;
            mapped[start..start + row_bytes].copy_from_slice(texels);
        }
    }

    /// Gathers rows from a mapped view of this region, dropping the padding.
    pub fn read_rows(&self, mapped: &[u8]) -> Vec<u8> {
        let row_bytes = self.row_bytes();
        let pitch = self.row_pitch as usize;
        let mut packed = Vec::with_capacity(self.packed_len() as usize);
        for row in 0..self.extent.height as usize {
            let start = row * pitch;
            packed.extend_from_slice(&mapped[start..start + row_bytes]);
        }
        packed
    }
}

/// Where each transfer lives inside the one shared buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferLayout {
    pub input: CopyRegion,
    pub noise: CopyRegion,
    pub readback: CopyRegion,
    pub capacity: u64,
}

impl TransferLayout {
    pub fn new(input: Extent, noise: Extent) -> Self {
        let input_region = CopyRegion::new(0, input, BitDepth::Sixteen);
        let noise_offset = align_up(input_region.end(), u64::from(ROW_ALIGNMENT));
        let noise_region = CopyRegion::new(noise_offset, noise, BitDepth::Eight);
        let readback = CopyRegion::new(0, input, BitDepth::Eight);

        let used = noise_region.end().max(readback.end());
        let capacity = align_up(
            used.max(minimum_capacity(input, noise)),
            wgpu::COPY_BUFFER_ALIGNMENT,
        );

        Self {
            input: input_region,
            noise: noise_region,
            readback,
            capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlaps(a: &CopyRegion, b: &CopyRegion) -> bool {
        a.offset < b.end() && b.offset < a.end()
    }

    #[test]
    fn minimum_capacity_uses_largest_extent_at_sixteen_bits() {
        assert_eq!(
            minimum_capacity(Extent::new(64, 64), Extent::new(256, 256)),
            256 * 256 * 8
        );
        assert_eq!(
            minimum_capacity(Extent::new(1920, 100), Extent::new(256, 256)),
            1920 * 256 * 8
        );
        assert_eq!(
            minimum_capacity(Extent::new(4000, 3000), Extent::new(256, 256)),
            4000 * 3000 * 8
        );
    }

    #[test]
    fn capacity_never_falls_below_the_minimum() {
        let extents = [
            Extent::new(1, 1),
            Extent::new(7, 3),
            Extent::new(64, 64),
            Extent::new(255, 1),
            Extent::new(1000, 17),
            Extent::new(256, 256),
        ];
        for input in extents {
            for noise in extents {
                let layout = TransferLayout::new(input, noise);
                assert!(layout.capacity >= minimum_capacity(input, noise));
                assert!(layout.capacity >= layout.noise.end());
                assert!(layout.capacity >= layout.readback.end());
                assert_eq!(layout.capacity % wgpu::COPY_BUFFER_ALIGNMENT, 0);
            }
        }
    }

    #[test]
    fn uploads_are_disjoint_and_readback_reuses_input_region() {
        let layout = TransferLayout::new(Extent::new(100, 50), Extent::new(256, 256));
        assert!(!overlaps(&layout.input, &layout.noise));
        assert_eq!(layout.readback.offset, layout.input.offset);
        assert!(layout.readback.end() <= layout.input.end());
        assert_eq!(layout.noise.offset % u64::from(ROW_ALIGNMENT), 0);
    }

    #[test]
    fn rows_are_padded_to_copy_alignment() {
        let layout = TransferLayout::new(Extent::new(100, 50), Extent::new(256, 256));
        assert_eq!(layout.input.row_pitch, 1024);
        assert_eq!(layout.readback.row_pitch, 512);
        assert_eq!(layout.noise.row_pitch, 1024);
        assert_eq!(layout.input.row_bytes(), 800);
        assert_eq!(layout.readback.packed_len(), 100 * 50 * 4);
    }

    #[test]
    fn scatter_then_gather_strips_padding() {
        let region = CopyRegion::new(0, Extent::new(3, 2), BitDepth::Eight);
        let packed: Vec<u8> = (0..24).collect();
        let mut mapped = vec![0xAA; region.len() as usize];
        region.write_rows(&mut mapped, &packed);

        assert_eq!(&mapped[..12], &packed[..12]);
        assert_eq!(mapped[12], 0xAA);
        assert_eq!(&mapped[256..268], &packed[12..]);
        assert_eq!(region.read_rows(&mapped), packed);
    }

    #[test]
    fn payload_check_rejects_mismatched_images() {
        let region = CopyRegion::new(0, Extent::new(2, 2), BitDepth::Sixteen);
        let wrong_depth = PixelImage {
            extent: Extent::new(2, 2),
            depth: BitDepth::Eight,
            source_channels: 4,
            pixels: vec![0; 16],
        };
        assert!(region.check_payload("input image", &wrong_depth).is_err());

        let right = PixelImage {
            depth: BitDepth::Sixteen,
            pixels: vec![0; 32],
            ..wrong_depth
        };
        assert!(region.check_payload("input image", &right).is_ok());
    }
}
