//! Records the one command buffer a grain run submits.
//!
//! The steps are fixed: upload input, upload noise, dispatch, record the
//! readback, submit. `PassSequence` rejects any other order before touching
//! the GPU.

use std::sync::mpsc;

use grainparams::GrainParams;
use wgpu::util::DeviceExt;

use crate::image_io::{BitDepth, PixelImage, CHANNELS};
use crate::kernel::BindingPlan;
use crate::types::PipelineError;

use super::dispatch::dispatch_grid;
use super::resources::{GpuTexture, GrainResources};
use super::transfer::CopyRegion;
use super::uniforms::GrainUniforms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PassStage {
    Recording,
    InputUploaded,
    NoiseUploaded,
    Dispatched,
    ReadbackRecorded,
}

impl PassStage {
    fn next(self) -> Option<PassStage> {
        match self {
            PassStage::Recording => Some(PassStage::InputUploaded),
            PassStage::InputUploaded => Some(PassStage::NoiseUploaded),
            PassStage::NoiseUploaded => Some(PassStage::Dispatched),
            PassStage::Dispatched => Some(PassStage::ReadbackRecorded),
            PassStage::ReadbackRecorded => None,
        }
    }
}

#[derive(Debug)]
pub struct PassSequence {
    stage: PassStage,
}

impl Default for PassSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl PassSequence {
    pub fn new() -> Self {
        Self {
            stage: PassStage::Recording,
        }
    }

    pub fn stage(&self) -> PassStage {
        self.stage
    }

    /// Fails unless `attempted` is the step directly after the current one.
    pub fn expect(&self, attempted: PassStage) -> Result<(), PipelineError> {
        if self.stage.next() == Some(attempted) {
            Ok(())
        } else {
            Err(PipelineError::OutOfOrder {
                attempted,
                current: self.stage,
            })
        }
    }

    pub fn advance(&mut self, to: PassStage) -> Result<(), PipelineError> {
        self.expect(to)?;
        self.stage = to;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.stage == PassStage::ReadbackRecorded
    }
}

/// Completion handle for the submitted command buffer.
#[must_use]
pub struct SubmissionFence {
    index: wgpu::SubmissionIndex,
}

impl SubmissionFence {
    /// Blocks until the GPU has finished the submission.
    pub fn wait(self, device: &wgpu::Device) -> Result<(), PipelineError> {
        device.poll(wgpu::PollType::WaitForSubmissionIndex(self.index))?;
        Ok(())
    }
}

fn map_blocking(
    device: &wgpu::Device,
    slice: wgpu::BufferSlice<'_>,
    mode: wgpu::MapMode,
) -> Result<(), PipelineError> {
    let (sender, receiver) = mpsc::channel();
    slice.map_async(mode, move |result| {
        let _ = sender.send(result);
    });
    device.poll(wgpu::PollType::Wait)?;
    receiver.recv().map_err(|_| PipelineError::MapAbandoned)??;
    Ok(())
}

fn texture_copy(target: &GpuTexture) -> wgpu::TexelCopyTextureInfo<'_> {
    wgpu::TexelCopyTextureInfo {
        texture: &target.texture,
        mip_level: 0,
        origin: wgpu::Origin3d::ZERO,
        aspect: wgpu::TextureAspect::All,
    }
}

pub struct PassRecorder<'a> {
    resources: &'a GrainResources,
    encoder: wgpu::CommandEncoder,
    sequence: PassSequence,
}

impl<'a> PassRecorder<'a> {
    pub fn new(resources: &'a GrainResources) -> Self {
        let encoder =
            resources
                .context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("grain encoder"),
                });
        Self {
            resources,
            encoder,
            sequence: PassSequence::new(),
        }
    }

    pub fn stage(&self) -> PassStage {
        self.sequence.stage()
    }

    pub fn upload_input(&mut self, image: &PixelImage) -> Result<(), PipelineError> {
        let resources = self.resources;
        self.upload(
            PassStage::InputUploaded,
            "input image",
            resources.transfer_layout.input,
            &resources.input,
            image,
        )
    }

    pub fn upload_noise(&mut self, image: &PixelImage) -> Result<(), PipelineError> {
        let resources = self.resources;
        self.upload(
            PassStage::NoiseUploaded,
            "noise texture",
            resources.transfer_layout.noise,
            &resources.noise,
            image,
        )
    }

    fn upload(
        &mut self,
        stage: PassStage,
        what: &'static str,
        region: CopyRegion,
        target: &GpuTexture,
        image: &PixelImage,
    ) -> Result<(), PipelineError> {
        self.sequence.expect(stage)?;
        region.check_payload(what, image)?;

        let transfer = &self.resources.transfer;
        map_blocking(
            &self.resources.context.device,
            transfer.slice(region.range()),
            wgpu::MapMode::Write,
        )?;
        {
            let mut mapped = transfer.slice(region.range()).get_mapped_range_mut();
            region.write_rows(&mut mapped, &image.pixels);
        }
        transfer.unmap();

        self.encoder.push_debug_group(what);
        self.encoder.copy_buffer_to_texture(
            wgpu::TexelCopyBufferInfo {
                buffer: transfer,
                layout: region.buffer_layout(),
            },
            texture_copy(target),
            target.extent.to_wgpu(),
        );
        self.encoder.pop_debug_group();
        tracing::debug!(what, offset = region.offset, bytes = region.len(), "staged upload");

        self.sequence.advance(stage)
    }

    /// Binds all three textures (and the uniform block when `params` is given)
    /// and covers the output with 8x8 thread groups.
    pub fn dispatch(&mut self, params: Option<&GrainParams>) -> Result<(), PipelineError> {
        self.sequence.expect(PassStage::Dispatched)?;
        let resources = self.resources;
        let plan = BindingPlan {
            readonly_textures: 2,
            readwrite_textures: 1,
            uniform_buffers: u32::from(params.is_some()),
        };
        resources.variant.contract().check(&plan)?;

        let device = &resources.context.device;
        let sources = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grain source bind group"),
            layout: &resources.layouts.sources,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&resources.input.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&resources.noise.view),
                },
            ],
        });
        let target = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grain target bind group"),
            layout: &resources.layouts.target,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&resources.output.view),
            }],
        });
        let uniforms = match (params, &resources.layouts.uniforms) {
            (Some(params), Some(layout)) => {
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("grain uniforms"),
                    contents: bytemuck::bytes_of(&GrainUniforms::from(params)),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
                Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("grain uniform bind group"),
                    layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                }))
            }
            _ => None,
        };

        let extent = resources.output.extent;
        let [x, y, z] = dispatch_grid(extent.width, extent.height);
        self.encoder.push_debug_group("grain dispatch");
        {
            let mut pass = self
                .encoder
                .begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("grain pass"),
                    timestamp_writes: None,
                });
            pass.set_pipeline(&resources.pipeline);
            pass.set_bind_group(0, &sources, &[]);
            pass.set_bind_group(1, &target, &[]);
            if let Some(uniforms) = &uniforms {
                pass.set_bind_group(2, uniforms, &[]);
            }
            pass.dispatch_workgroups(x, y, z);
        }
        self.encoder.pop_debug_group();
        tracing::debug!(groups_x = x, groups_y = y, %extent, "recorded grain dispatch");

        self.sequence.advance(PassStage::Dispatched)
    }

    pub fn readback(&mut self) -> Result<(), PipelineError> {
        self.sequence.expect(PassStage::ReadbackRecorded)?;
        let resources = self.resources;
        let region = resources.transfer_layout.readback;

        self.encoder.push_debug_group("readback");
        self.encoder.copy_texture_to_buffer(
            texture_copy(&resources.output),
            wgpu::TexelCopyBufferInfo {
                buffer: &resources.transfer,
                layout: region.buffer_layout(),
            },
            resources.output.extent.to_wgpu(),
        );
        self.encoder.pop_debug_group();

        self.sequence.advance(PassStage::ReadbackRecorded)
    }

    /// Submits the recorded work. Fails without submitting if the readback
    /// has not been recorded yet.
    pub fn submit(self) -> Result<SubmissionFence, PipelineError> {
        if !self.sequence.is_complete() {
            return Err(PipelineError::Incomplete(self.sequence.stage()));
        }
        let index = self
            .resources
            .context
            .queue
            .submit(std::iter::once(self.encoder.finish()));
        tracing::debug!("submitted grain command buffer");
        Ok(SubmissionFence { index })
    }
}

/// Maps the readback region and strips row padding. Only valid after the
/// fence for a complete submission has been waited on.
pub fn read_output(resources: &GrainResources) -> Result<PixelImage, PipelineError> {
    let region = resources.transfer_layout.readback;
    let transfer = &resources.transfer;
    map_blocking(
        &resources.context.device,
        transfer.slice(region.range()),
        wgpu::MapMode::Read,
    )?;
    let pixels = {
        let mapped = transfer.slice(region.range()).get_mapped_range();
        region.read_rows(&mapped)
    };
    transfer.unmap();

    Ok(PixelImage {
        extent: region.extent,
        depth: BitDepth::Eight,
        source_channels: CHANNELS as u8,
        pixels,
    })
}

/// Records, submits and waits for the full grain pass, returning the 8-bit
/// composited image.
pub fn run_passes(
    resources: &GrainResources,
    input: &PixelImage,
    noise: &PixelImage,
    params: Option<&GrainParams>,
) -> Result<PixelImage, PipelineError> {
    let context = &resources.context;
    let fence = context.scoped("record passes", |_| {
        let mut recorder = PassRecorder::new(resources);
        recorder.upload_input(input)?;
        recorder.upload_noise(noise)?;
        recorder.dispatch(params)?;
        recorder.readback()?;
        recorder.submit()
    })??;
    fence.wait(&context.device)?;
    read_output(resources)
}
