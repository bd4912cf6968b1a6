//! GPU side of the grain pipeline.
//!
//! - `context` requests a headless adapter/device with the features the
//!   pipeline needs and wraps resource creation in validation error scopes.
//! - `transfer` partitions the single mappable transfer buffer into pitched
//!   upload and readback regions.
//! - `resources` allocates the textures, bind group layouts and compute
//!   pipeline for one input/noise extent pair.
//! - `uniforms` mirrors the kernel's parameter block.
//! - `dispatch` turns an extent into thread-group counts.
//! - `passes` records the upload/dispatch/readback command buffer, submits it
//!   and reads the result back.

mod context;
mod dispatch;
mod passes;
mod resources;
mod transfer;
mod uniforms;

pub use context::{required_features, GpuContext};
pub use dispatch::{dispatch_grid, dispatch_groups, DISPATCH_TILE};
pub use passes::{
    read_output, run_passes, PassRecorder, PassSequence, PassStage, SubmissionFence,
};
pub use resources::GrainResources;
pub use transfer::{minimum_capacity, CopyRegion, TransferLayout};
pub use uniforms::GrainUniforms;
