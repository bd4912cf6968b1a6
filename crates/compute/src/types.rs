use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::gpu::PassStage;

/// Width and height of a 2D resource in texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn texel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub(crate) fn to_wgpu(self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Adapter power preference requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    Low,
    #[default]
    High,
}

impl fmt::Display for GpuPowerPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuPowerPreference::Low => f.write_str("low"),
            GpuPowerPreference::High => f.write_str("high"),
        }
    }
}

/// Broad failure classes; every class is terminal for a one-shot run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Usage,
    Io,
    Device,
    Protocol,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Usage => f.write_str("usage"),
            ErrorClass::Io => f.write_str("io"),
            ErrorClass::Device => f.write_str("device"),
            ErrorClass::Protocol => f.write_str("protocol"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{what} {path} has zero area ({extent})")]
    EmptyImage {
        what: &'static str,
        path: PathBuf,
        extent: Extent,
    },

    #[error("failed to load {what} {path}: {source}")]
    Decode {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to write {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("no suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("GPU adapter '{adapter}' does not support all of {required:?}")]
    MissingFeatures {
        adapter: String,
        required: wgpu::Features,
    },

    #[error("failed to create GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("{what} is {extent}, GPU max texture dimension is {max}")]
    TooLarge {
        what: &'static str,
        extent: Extent,
        max: u32,
    },

    #[error("GPU validation failed ({stage}): {message}")]
    Validation {
        stage: &'static str,
        message: String,
    },

    #[error("GPU ran out of memory ({stage})")]
    OutOfMemory { stage: &'static str },

    #[error("GPU internal error ({stage}): {message}")]
    Internal {
        stage: &'static str,
        message: String,
    },

    #[error("kernel binding mismatch: {0}")]
    ContractMismatch(String),

    #[error("{what} payload is {actual} bytes, expected {expected}")]
    PayloadSize {
        what: &'static str,
        actual: usize,
        expected: u64,
    },

    #[error("cannot record {attempted:?} after {current:?}")]
    OutOfOrder {
        attempted: PassStage,
        current: PassStage,
    },

    #[error("command buffer submitted before readback was recorded (stopped at {0:?})")]
    Incomplete(PassStage),

    #[error("failed to map transfer buffer: {0}")]
    Map(#[from] wgpu::BufferAsyncError),

    #[error("transfer buffer mapping was abandoned before completing")]
    MapAbandoned,

    #[error("waiting for GPU completion failed: {0}")]
    Wait(#[from] wgpu::PollError),
}

impl PipelineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            PipelineError::EmptyImage { .. } => ErrorClass::Usage,
            PipelineError::Decode { .. } | PipelineError::Encode { .. } => ErrorClass::Io,
            PipelineError::Adapter(_)
            | PipelineError::MissingFeatures { .. }
            | PipelineError::RequestDevice(_)
            | PipelineError::TooLarge { .. }
            | PipelineError::OutOfMemory { .. }
            | PipelineError::Internal { .. } => ErrorClass::Device,
            PipelineError::Validation { .. }
            | PipelineError::ContractMismatch(_)
            | PipelineError::PayloadSize { .. }
            | PipelineError::OutOfOrder { .. }
            | PipelineError::Incomplete(_)
            | PipelineError::Map(_)
            | PipelineError::MapAbandoned
            | PipelineError::Wait(_) => ErrorClass::Protocol,
        }
    }

    /// Short name of the pipeline stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::EmptyImage { what, .. } | PipelineError::Decode { what, .. } => {
                if *what == "noise texture" {
                    "load noise"
                } else {
                    "load input"
                }
            }
            PipelineError::Encode { .. } => "write output",
            PipelineError::Adapter(_)
            | PipelineError::MissingFeatures { .. }
            | PipelineError::RequestDevice(_) => "create device",
            PipelineError::TooLarge { .. } => "create resources",
            PipelineError::Validation { stage, .. }
            | PipelineError::OutOfMemory { stage }
            | PipelineError::Internal { stage, .. } => *stage,
            PipelineError::ContractMismatch(_)
            | PipelineError::PayloadSize { .. }
            | PipelineError::OutOfOrder { .. }
            | PipelineError::Incomplete(_) => "record passes",
            PipelineError::Map(_) | PipelineError::MapAbandoned => "map transfer buffer",
            PipelineError::Wait(_) => "wait for completion",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_reports_area() {
        assert_eq!(Extent::new(64, 32).texel_count(), 2048);
        assert!(Extent::new(0, 32).is_empty());
        assert!(Extent::new(32, 0).is_empty());
        assert!(!Extent::new(1, 1).is_empty());
        assert_eq!(Extent::new(640, 480).to_string(), "640x480");
    }

    #[test]
    fn errors_name_their_stage() {
        let empty = PipelineError::EmptyImage {
            what: "input image",
            path: PathBuf::from("in.png"),
            extent: Extent::new(0, 0),
        };
        assert_eq!(empty.class(), ErrorClass::Usage);
        assert_eq!(empty.stage(), "load input");

        let order = PipelineError::OutOfOrder {
            attempted: PassStage::Dispatched,
            current: PassStage::InputUploaded,
        };
        assert_eq!(order.class(), ErrorClass::Protocol);
        assert_eq!(order.stage(), "record passes");

        let validation = PipelineError::Validation {
            stage: "compile kernel",
            message: "bad".into(),
        };
        assert_eq!(validation.stage(), "compile kernel");

        let oom = PipelineError::OutOfMemory {
            stage: "create resources",
        };
        assert_eq!(oom.class(), ErrorClass::Device);
        assert_eq!(oom.stage(), "create resources");
        assert_eq!(oom.to_string(), "GPU ran out of memory (create resources)");

        let internal = PipelineError::Internal {
            stage: "record passes",
            message: "lost".into(),
        };
        assert_eq!(internal.class(), ErrorClass::Device);
        assert_eq!(internal.stage(), "record passes");
    }
}
