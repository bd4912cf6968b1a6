use crate::kernel::{kernel_source, KernelVariant, ENTRY_POINT};
use crate::types::{Extent, PipelineError};

use super::context::GpuContext;
use super::transfer::TransferLayout;

pub(crate) const INPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Unorm;
pub(crate) const NOISE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub(crate) const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

pub(crate) struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub extent: Extent,
}

impl GpuTexture {
    fn new(
        device: &wgpu::Device,
        label: &str,
        extent: Extent,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent.to_wgpu(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&format!("{label} view")),
            ..Default::default()
        });
        Self {
            texture,
            view,
            extent,
        }
    }
}

pub(crate) struct BindLayouts {
    pub sources: wgpu::BindGroupLayout,
    pub target: wgpu::BindGroupLayout,
    pub uniforms: Option<wgpu::BindGroupLayout>,
}

impl BindLayouts {
    fn new(device: &wgpu::Device, variant: KernelVariant) -> Self {
        let source_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let sources = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grain source layout"),
            entries: &[source_entry(0), source_entry(1)],
        });

        let target = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grain target layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: OUTPUT_FORMAT,
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            }],
        });

        let uniforms = variant.has_uniforms().then(|| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("grain uniform layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            })
        });

        Self {
            sources,
            target,
            uniforms,
        }
    }

    fn all(&self) -> Vec<&wgpu::BindGroupLayout> {
        let mut layouts = vec![&self.sources, &self.target];
        layouts.extend(self.uniforms.as_ref());
        layouts
    }
}

/// Every GPU object one grain run needs, sized for a specific input and noise
/// extent. Fields drop in declaration order, so the pipeline goes first and
/// the device last.
pub struct GrainResources {
    pub(crate) pipeline: wgpu::ComputePipeline,
    pub(crate) layouts: BindLayouts,
    pub(crate) output: GpuTexture,
    pub(crate) noise: GpuTexture,
    pub(crate) input: GpuTexture,
    pub(crate) transfer: wgpu::Buffer,
    pub(crate) transfer_layout: TransferLayout,
    pub(crate) variant: KernelVariant,
    pub(crate) context: GpuContext,
}

impl GrainResources {
    pub fn create(
        context: GpuContext,
        input: Extent,
        noise: Extent,
        variant: KernelVariant,
    ) -> Result<Self, PipelineError> {
        context.check_extent("input image", input)?;
        context.check_extent("noise texture", noise)?;

        let transfer_layout = TransferLayout::new(input, noise);
        tracing::debug!(
            %input,
            %noise,
            capacity = transfer_layout.capacity,
            noise_offset = transfer_layout.noise.offset,
            "allocating grain resources"
        );

        let (transfer, input_texture, noise_texture, output, layouts) =
            context.scoped("create resources", |device| {
                let transfer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("transfer buffer"),
                    size: transfer_layout.capacity,
                    usage: wgpu::BufferUsages::MAP_READ
                        | wgpu::BufferUsages::MAP_WRITE
                        | wgpu::BufferUsages::COPY_SRC
                        | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                let sampled = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
                let input_texture =
                    GpuTexture::new(device, "input texture", input, INPUT_FORMAT, sampled);
                let noise_texture =
                    GpuTexture::new(device, "noise texture", noise, NOISE_FORMAT, sampled);
                let output = GpuTexture::new(
                    device,
                    "output texture",
                    input,
                    OUTPUT_FORMAT,
                    wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::COPY_SRC,
                );
                let layouts = BindLayouts::new(device, variant);
                (transfer, input_texture, noise_texture, output, layouts)
            })?;

        let pipeline = context.scoped("compile kernel", |device| {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("grain kernel"),
                source: wgpu::ShaderSource::Wgsl(kernel_source(variant).into()),
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("grain pipeline layout"),
                bind_group_layouts: &layouts.all(),
                push_constant_ranges: &[],
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("grain pipeline"),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some(ENTRY_POINT),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            })
        })?;
        tracing::debug!(?variant, "compiled grain kernel");

        Ok(Self {
            pipeline,
            layouts,
            output,
            noise: noise_texture,
            input: input_texture,
            transfer,
            transfer_layout,
            variant,
            context,
        })
    }

    pub fn variant(&self) -> KernelVariant {
        self.variant
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    pub fn transfer_layout(&self) -> &TransferLayout {
        &self.transfer_layout
    }

    pub fn output_extent(&self) -> Extent {
        self.output.extent
    }
}
