use crate::types::{Extent, GpuPowerPreference, PipelineError};

/// `Rgba16Unorm` input textures and one transfer buffer that is both an upload
/// source and a readback target.
pub fn required_features() -> wgpu::Features {
    let mut features = wgpu::Features::empty();
    features |= wgpu::Features::TEXTURE_FORMAT_16BIT_NORM;
    features |= wgpu::Features::MAPPABLE_PRIMARY_BUFFERS;
    features
}

/// Headless device/queue pair; this tool never presents a frame.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
    pub limits: wgpu::Limits,
    _instance: wgpu::Instance,
}

impl GpuContext {
    pub fn new(power: GpuPowerPreference) -> Result<Self, PipelineError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let power_preference = match power {
            GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
            GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
        };
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))?;

        let adapter_info = adapter.get_info();
        tracing::debug!(
            name = %adapter_info.name,
            backend = ?adapter_info.backend,
            device_type = ?adapter_info.device_type,
            "selected GPU adapter"
        );

        let required_features = required_features();
        if !adapter.features().contains(required_features) {
            return Err(PipelineError::MissingFeatures {
                adapter: adapter_info.name,
                required: required_features,
            });
        }

        let limits = adapter.limits();
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("filmgrain device"),
            required_features,
            required_limits: limits.clone(),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))?;

        Ok(Self {
            device,
            queue,
            adapter_info,
            limits,
            _instance: instance,
        })
    }

    /// Rejects textures the device cannot allocate.
    pub fn check_extent(&self, what: &'static str, extent: Extent) -> Result<(), PipelineError> {
        let max = self.limits.max_texture_dimension_2d;
        if extent.width > max || extent.height > max {
            return Err(PipelineError::TooLarge { what, extent, max });
        }
        Ok(())
    }

    /// Runs `build` inside validation, out-of-memory and internal error
    /// scopes so backend failures come back as errors instead of reaching the
    /// uncaptured-error handler, which panics.
    pub(crate) fn scoped<T>(
        &self,
        stage: &'static str,
        build: impl FnOnce(&wgpu::Device) -> T,
    ) -> Result<T, PipelineError> {
        for filter in ERROR_SCOPES {
            self.device.push_error_scope(filter);
        }
        let value = build(&self.device);

        let mut first = None;
        for _ in ERROR_SCOPES {
            if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
                first.get_or_insert(error);
            }
        }
        match first {
            Some(error) => Err(scope_error(stage, error)),
            None => Ok(value),
        }
    }
}

const ERROR_SCOPES: [wgpu::ErrorFilter; 3] = [
    wgpu::ErrorFilter::Validation,
    wgpu::ErrorFilter::OutOfMemory,
    wgpu::ErrorFilter::Internal,
];

fn scope_error(stage: &'static str, error: wgpu::Error) -> PipelineError {
    match error {
        wgpu::Error::OutOfMemory { .. } => PipelineError::OutOfMemory { stage },
        wgpu::Error::Internal { description, .. } => PipelineError::Internal {
            stage,
            message: description,
        },
        other => PipelineError::Validation {
            stage,
            message: other.to_string(),
        },
    }
}
