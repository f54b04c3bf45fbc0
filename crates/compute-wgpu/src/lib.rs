//! GPU compute pass management on top of wgpu
//!
//! This crate manages the resources consumed by compute shaders: buffers, textures and
//! texture views are registered with a [`ComputePass`], which derives bind group layouts
//! and bind groups from their slots, builds and caches the compute pipeline, dispatches
//! work, resizes resources in place and reads results back to the host asynchronously.
//!
//! Several passes sharing a device can be grouped in a [`ComputePipeline`], which
//! submits them together and keeps buffers shared between passes in sync when they are
//! resized.

mod bind_group;
mod compute_pipeline;
mod config;
mod dispatch;
mod error;
mod pass;
mod pipeline;
mod readback;
mod registry;
mod resize;
mod resource;
mod shader;

pub use bind_group::BindGroupId;
pub use compute_pipeline::{ComputePipeline, PassId};
pub use config::{ComputePassDescriptor, Workgroups};
pub use error::{ComputeError, Result};
pub use pass::{ComputePass, PassStats};
pub use pipeline::PipelineState;
pub use readback::{ReadbackCallback, ReadbackHandle};
pub use registry::ResourceId;
pub use resource::{BindSlot, BufferMode, ComputeBuffer, ComputeTexture, ComputeTextureView, Payload, TextureMode};
pub use shader::{ComputeEntryPoint, validate_compute_shader};
