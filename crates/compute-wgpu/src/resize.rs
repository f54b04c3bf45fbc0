//! Resizing resources in place
//!
//! Recreating a resource keeps its [`ResourceId`] and every binding it owns. Only the
//! bind groups referencing the resource are recreated; layouts and the pipeline are kept
//! and the pass moves to [`PipelineState::Invalidated`](crate::PipelineState::Invalidated)
//! until the next dispatch.

use crate::bind_group::BoundResource;
use crate::error::Result;
use crate::pass::ComputePass;
use crate::registry::ResourceId;
use crate::resource::BindSlot;

impl ComputePass {
    /// Replaces a buffer with a new, uninitialized allocation of `byte_size` bytes
    pub fn recreate_buffer(&mut self, id: ResourceId, byte_size: u64) -> Result<()> {
        let (slot, handle) = self
            .registry
            .recreate_buffer(id, byte_size)
            .inspect_err(|error| tracing::error!(pass = %self.label, %id, %error, "failed to recreate buffer"))?;
        self.patch(slot, BoundResource::Buffer(handle))
    }

    /// Replaces a texture with a new, uninitialized one of the given extent
    ///
    /// Format, usage, mip level count and every registered view are preserved.
    pub fn recreate_texture(&mut self, id: ResourceId, extent: wgpu::Extent3d) -> Result<()> {
        let views = self
            .registry
            .recreate_texture(id, extent)
            .inspect_err(|error| tracing::error!(pass = %self.label, %id, %error, "failed to recreate texture"))?;
        for (slot, view) in views {
            self.patch(slot, BoundResource::TextureView(view))?;
        }
        Ok(())
    }

    /// Points a buffer at a handle allocated by another pass
    pub(crate) fn adopt_buffer(&mut self, id: ResourceId, handle: wgpu::Buffer, byte_size: u64) -> Result<()> {
        let slot = self.registry.adopt_buffer(id, handle.clone(), byte_size)?;
        self.patch(slot, BoundResource::Buffer(handle))
    }

    fn patch(&mut self, slot: BindSlot, resource: BoundResource) -> Result<()> {
        self.arena.patch_and_rebuild(&self.device, &self.label, slot, resource)?;
        self.builder.invalidate();
        Ok(())
    }
}
