//! A single compute pass
//!
//! [`ComputePass`] ties together the resource registry, the bind group arena and the
//! pipeline builder of one compute shader. Dispatch lives in `dispatch.rs`, resizing in
//! `resize.rs`; both extend this type.

use crate::bind_group::{BindGroupArena, BindGroupId};
use crate::config::{ComputePassDescriptor, Workgroups};
use crate::error::{ComputeError, Result};
use crate::pipeline::{PipelineBuilder, PipelineState};
use crate::readback::{self, ReadbackCallback, ReadbackHandle};
use crate::registry::{Resource, ResourceId, ResourceRegistry};
use crate::resource::{BindSlot, BufferMode, ComputeBuffer, ComputeTexture, ComputeTextureView};

/// Counters describing the work a pass has done
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Successful pipeline builds
    pub pipeline_builds: u64,
    /// Dispatches recorded
    pub dispatches: u64,
    /// Bind groups recreated after a resize
    pub bind_group_patches: u64,
}

/// Resources, bind groups and pipeline of one compute shader
pub struct ComputePass {
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    pub(crate) label: String,
    pub(crate) shader_source: Option<String>,
    pub(crate) entry_point: String,
    pub(crate) workgroups: Workgroups,
    pub(crate) registry: ResourceRegistry,
    pub(crate) arena: BindGroupArena,
    pub(crate) builder: PipelineBuilder,
    pub(crate) dispatches: u64,
}

impl ComputePass {
    /// Creates an empty pass
    ///
    /// # Arguments
    /// * `device` - Device every resource and pipeline is created on
    /// * `queue` - Queue used for uploads, dispatches and readback copies
    /// * `descriptor` - Label, shader, entry point and workgroup counts
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, descriptor: ComputePassDescriptor) -> Self {
        Self {
            registry: ResourceRegistry::new(device.clone(), queue.clone()),
            device,
            queue,
            label: descriptor.label,
            shader_source: descriptor.shader_source,
            entry_point: descriptor.entry_point,
            workgroups: descriptor.workgroups,
            arena: BindGroupArena::default(),
            builder: PipelineBuilder::new(),
            dispatches: 0,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Renames the pass; device objects pick up the new label on the next build
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn shader_source(&self) -> Option<&str> {
        self.shader_source.as_deref()
    }

    /// Replaces the WGSL source; the pipeline is rebuilt on the next dispatch
    pub fn set_shader_source(&mut self, source: impl Into<String>) {
        self.shader_source = Some(source.into());
        self.builder.mark_shader_dirty();
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Changes the compute entry point; the pipeline is rebuilt on the next dispatch
    pub fn set_entry_point(&mut self, entry_point: impl Into<String>) {
        self.entry_point = entry_point.into();
        self.builder.mark_shader_dirty();
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Registers a buffer and binds it at its slot
    ///
    /// The pass is left unchanged when the description is rejected.
    pub fn add_buffer(&mut self, buffer: ComputeBuffer) -> Result<ResourceId> {
        let label = buffer.label.clone();
        self.registry
            .add_buffer(&mut self.arena, buffer)
            .inspect_err(|error| tracing::error!(pass = %self.label, %label, %error, "failed to add buffer"))
    }

    /// Registers a texture, binding its default view when a slot is given
    pub fn add_texture(&mut self, texture: ComputeTexture) -> Result<ResourceId> {
        let label = texture.label.clone();
        self.registry
            .add_texture(&mut self.arena, texture)
            .inspect_err(|error| tracing::error!(pass = %self.label, %label, %error, "failed to add texture"))
    }

    /// Binds an additional view of a registered texture
    pub fn add_texture_view(&mut self, texture: ResourceId, view: ComputeTextureView) -> Result<()> {
        let label = view.label.clone();
        self.registry
            .add_texture_view(&mut self.arena, texture, view)
            .inspect_err(|error| tracing::error!(pass = %self.label, %label, %error, "failed to add texture view"))
    }

    /// Binds a buffer owned by another pass
    pub(crate) fn add_external_buffer(&mut self, label: &str, slot: BindSlot, mode: BufferMode, handle: wgpu::Buffer, byte_size: u64) -> Result<ResourceId> {
        self.registry
            .add_external_buffer(&mut self.arena, label, slot, mode, handle, byte_size)
            .inspect_err(|error| tracing::error!(pass = %self.label, label, %error, "failed to add shared buffer"))
    }

    pub(crate) fn mark_shared(&mut self, id: ResourceId) -> Result<()> {
        self.registry.mark_shared(id)
    }

    /// Removes a resource and all of its bindings
    pub fn remove_resource(&mut self, id: ResourceId) -> Result<()> {
        self.registry
            .remove(&mut self.arena, id)
            .inspect_err(|error| tracing::error!(pass = %self.label, %id, %error, "failed to remove resource"))
    }

    /// Overwrites buffer contents starting at `offset` bytes
    ///
    /// Offset and byte length must be multiples of 4.
    pub fn write_buffer<T: bytemuck::Pod>(&self, id: ResourceId, offset: u64, data: &[T]) -> Result<()> {
        self.registry
            .write_buffer(id, offset, bytemuck::cast_slice(data))
            .inspect_err(|error| tracing::error!(pass = %self.label, %id, %error, "failed to write buffer"))
    }

    /// Overwrites the texels of mip level 0; `data` must cover the whole level
    pub fn write_texture<T: bytemuck::Pod>(&self, id: ResourceId, data: &[T]) -> Result<()> {
        self.registry
            .write_texture(id, bytemuck::cast_slice(data))
            .inspect_err(|error| tracing::error!(pass = %self.label, %id, %error, "failed to write texture"))
    }

    /// Requested size of a buffer in bytes
    pub fn buffer_byte_size(&self, id: ResourceId) -> Result<u64> {
        Ok(self.registry.buffer(id)?.byte_size)
    }

    /// Current extent of a texture
    pub fn texture_extent(&self, id: ResourceId) -> Result<wgpu::Extent3d> {
        Ok(self.registry.texture(id)?.extent)
    }

    pub fn buffer_handle(&self, id: ResourceId) -> Result<&wgpu::Buffer> {
        Ok(&self.registry.buffer(id)?.handle)
    }

    pub fn texture_handle(&self, id: ResourceId) -> Result<&wgpu::Texture> {
        Ok(&self.registry.texture(id)?.handle)
    }

    pub fn resource_label(&self, id: ResourceId) -> Result<&str> {
        Ok(self.registry.get(id)?.label())
    }

    /// Number of live resources
    pub fn resource_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.len() == 0
    }

    pub fn state(&self) -> PipelineState {
        self.builder.state()
    }

    pub fn stats(&self) -> PassStats {
        PassStats {
            pipeline_builds: self.builder.builds(),
            dispatches: self.dispatches,
            bind_group_patches: self.arena.patches(),
        }
    }

    /// Number of distinct bind group indices used by the pass
    pub fn group_count(&self) -> usize {
        self.arena.len()
    }

    /// Number of created bind groups, excluding placeholders for unused indices
    pub fn bind_group_count(&self) -> usize {
        self.arena.bind_groups().len()
    }

    /// Number of created bind group layouts, excluding placeholders for unused indices
    pub fn bind_group_layout_count(&self) -> usize {
        self.arena.layouts().len()
    }

    /// Shader group index of every bind group position
    pub fn group_order(&self) -> &[u32] {
        self.arena.order()
    }

    /// Position of a shader group index
    pub fn bind_group_id(&self, group: u32) -> Option<BindGroupId> {
        self.arena.position(group)
    }

    /// Slots bound by a resource
    pub fn bound_slots(&self, id: ResourceId) -> Vec<BindSlot> {
        self.arena.slots_of(id)
    }

    /// Reads a mappable buffer or a texture back to the host
    ///
    /// The returned handle resolves after the device is polled, see [`ComputePass::update`].
    pub fn read_back(&self, id: ResourceId) -> Result<ReadbackHandle> {
        self.start_read_back(id, None)
    }

    /// Like [`ComputePass::read_back`], additionally invoking `callback` with the bytes
    ///
    /// The callback runs at most once, only if the readback succeeds.
    pub fn read_back_with(&self, id: ResourceId, callback: impl FnOnce(&[u8]) + Send + 'static) -> Result<ReadbackHandle> {
        self.start_read_back(id, Some(Box::new(callback)))
    }

    fn start_read_back(&self, id: ResourceId, callback: Option<ReadbackCallback>) -> Result<ReadbackHandle> {
        let result = match self.registry.get(id) {
            Ok(Resource::Buffer(buffer)) => readback::read_buffer(&self.device, &self.queue, buffer, callback),
            Ok(Resource::Texture(texture)) => readback::read_texture(&self.device, &self.queue, texture, callback),
            Err(error) => Err(error),
        };
        result.inspect_err(|error| tracing::error!(pass = %self.label, %id, %error, "failed to start readback"))
    }

    /// Blocks until all submitted work is done, resolving pending readbacks
    pub fn update(&self) -> Result<()> {
        poll(&self.device)
    }
}

pub(crate) fn poll(device: &wgpu::Device) -> Result<()> {
    device
        .poll(wgpu::PollType::Wait)
        .map(|_| ())
        .map_err(|error| ComputeError::DevicePoll { message: error.to_string() })
}

impl std::fmt::Debug for ComputePass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputePass")
            .field("label", &self.label)
            .field("entry_point", &self.entry_point)
            .field("workgroups", &self.workgroups)
            .field("resources", &self.registry.len())
            .field("groups", &self.arena.order())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
