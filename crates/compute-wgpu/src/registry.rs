//! Resource registry
//!
//! The registry owns every buffer and texture of a compute pass together with the
//! device objects backing them. Registration validates the description before touching
//! the device, creates the device object with usage flags derived from the binding mode,
//! uploads the optional initial payload and appends the resulting bindings to the
//! pass's [`BindGroupArena`].
//!
//! Resources are addressed by a dense [`ResourceId`]. Removing a resource leaves a hole
//! so that ids handed out earlier keep pointing at the same resource.

use std::fmt;

use crate::bind_group::{BindGroupArena, BoundResource};
use crate::error::{ComputeError, Result};
use crate::resource::{
    BindSlot, BufferMode, ComputeBuffer, ComputeTexture, ComputeTextureView, TexelLayout, TextureMode, aligned_size, check_texel_data, validate_extent, validate_mip_level_count, view_dimension,
};

/// Index of a resource within a compute pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) u32);

impl ResourceId {
    /// Raw index into the registry
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A registered buffer
#[derive(Debug)]
pub(crate) struct BufferRecord {
    pub label: String,
    pub slot: BindSlot,
    pub mode: BufferMode,
    /// Requested size; the device allocation is rounded up to the copy alignment
    pub byte_size: u64,
    pub handle: wgpu::Buffer,
    /// Also bound by another pass; the handle is never destroyed from here
    pub shared: bool,
}

/// A view onto a registered texture, bound at its own slot
#[derive(Debug)]
pub(crate) struct ViewRecord {
    pub label: String,
    pub slot: BindSlot,
    pub aspect: wgpu::TextureAspect,
    pub base_mip_level: u32,
    pub mip_level_count: Option<u32>,
    /// Fixed at registration; the bind group layout was generated for it
    pub dimension: wgpu::TextureViewDimension,
    pub handle: wgpu::TextureView,
}

/// A registered texture
#[derive(Debug)]
pub(crate) struct TextureRecord {
    pub label: String,
    pub mode: TextureMode,
    pub format: wgpu::TextureFormat,
    pub dimension: wgpu::TextureDimension,
    pub extent: wgpu::Extent3d,
    pub mip_level_count: u32,
    pub handle: wgpu::Texture,
    pub views: Vec<ViewRecord>,
}

impl TextureRecord {
    fn view_dimension(&self) -> wgpu::TextureViewDimension {
        view_dimension(self.dimension, self.extent.depth_or_array_layers)
    }

    fn create_view(&self, label: &str, dimension: wgpu::TextureViewDimension, aspect: wgpu::TextureAspect, base_mip_level: u32, mip_level_count: Option<u32>) -> wgpu::TextureView {
        self.handle.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(dimension),
            aspect,
            base_mip_level,
            mip_level_count,
            ..Default::default()
        })
    }
}

/// A registered resource of either kind
#[derive(Debug)]
pub(crate) enum Resource {
    Buffer(BufferRecord),
    Texture(TextureRecord),
}

impl Resource {
    pub fn label(&self) -> &str {
        match self {
            Resource::Buffer(buffer) => &buffer.label,
            Resource::Texture(texture) => &texture.label,
        }
    }
}

/// Owner of the buffers and textures of one compute pass
#[derive(Debug)]
pub(crate) struct ResourceRegistry {
    device: wgpu::Device,
    queue: wgpu::Queue,
    resources: Vec<Option<Resource>>,
}

impl ResourceRegistry {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            resources: Vec::new(),
        }
    }

    /// Number of live resources
    pub fn len(&self) -> usize {
        self.resources.iter().flatten().count()
    }

    pub fn get(&self, id: ResourceId) -> Result<&Resource> {
        self.resources
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(ComputeError::UnknownResource { index: id.0 })
    }

    fn get_mut(&mut self, id: ResourceId) -> Result<&mut Resource> {
        self.resources
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(ComputeError::UnknownResource { index: id.0 })
    }

    pub fn buffer(&self, id: ResourceId) -> Result<&BufferRecord> {
        match self.get(id)? {
            Resource::Buffer(buffer) => Ok(buffer),
            other => Err(ComputeError::WrongResourceKind {
                label: other.label().to_string(),
                expected: "buffer",
            }),
        }
    }

    fn buffer_mut(&mut self, id: ResourceId) -> Result<&mut BufferRecord> {
        match self.get_mut(id)? {
            Resource::Buffer(buffer) => Ok(buffer),
            other => Err(ComputeError::WrongResourceKind {
                label: other.label().to_string(),
                expected: "buffer",
            }),
        }
    }

    pub fn texture(&self, id: ResourceId) -> Result<&TextureRecord> {
        match self.get(id)? {
            Resource::Texture(texture) => Ok(texture),
            other => Err(ComputeError::WrongResourceKind {
                label: other.label().to_string(),
                expected: "texture",
            }),
        }
    }

    fn texture_mut(&mut self, id: ResourceId) -> Result<&mut TextureRecord> {
        match self.get_mut(id)? {
            Resource::Texture(texture) => Ok(texture),
            other => Err(ComputeError::WrongResourceKind {
                label: other.label().to_string(),
                expected: "texture",
            }),
        }
    }

    fn push(&mut self, resource: Resource) -> ResourceId {
        self.resources.push(Some(resource));
        ResourceId((self.resources.len() - 1) as u32)
    }

    /// Validates, allocates and binds a buffer
    ///
    /// Nothing is created and the arena is left unchanged when validation fails.
    pub fn add_buffer(&mut self, arena: &mut BindGroupArena, buffer: ComputeBuffer) -> Result<ResourceId> {
        let (slot, byte_size) = buffer.validate()?;
        arena.check_free(&buffer.label, slot)?;

        let handle = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&buffer.label),
            size: aligned_size(byte_size),
            usage: buffer.mode.usage(),
            mapped_at_creation: false,
        });

        if let Some(payload) = buffer.payload.as_ref().filter(|payload| !payload.is_empty()) {
            write_initial(&self.queue, &handle, payload.as_bytes());
        }

        let id = self.push(Resource::Buffer(BufferRecord {
            label: buffer.label.clone(),
            slot,
            mode: buffer.mode,
            byte_size,
            handle: handle.clone(),
            shared: false,
        }));
        arena.insert(id, &buffer.label, slot, buffer.mode.layout_entry(slot.binding), BoundResource::Buffer(handle))?;

        tracing::debug!(label = %buffer.label, %slot, byte_size, mode = ?buffer.mode, "registered buffer");
        Ok(id)
    }

    /// Binds a buffer created elsewhere, typically by another pass
    pub fn add_external_buffer(&mut self, arena: &mut BindGroupArena, label: &str, slot: BindSlot, mode: BufferMode, handle: wgpu::Buffer, byte_size: u64) -> Result<ResourceId> {
        let required = mode.required_usage();
        if !handle.usage().contains(required) {
            return Err(ComputeError::IncompatibleUsage { label: label.to_string(), required });
        }
        arena.check_free(label, slot)?;

        let id = self.push(Resource::Buffer(BufferRecord {
            label: label.to_string(),
            slot,
            mode,
            byte_size,
            handle: handle.clone(),
            shared: true,
        }));
        arena.insert(id, label, slot, mode.layout_entry(slot.binding), BoundResource::Buffer(handle))?;

        tracing::debug!(label, %slot, byte_size, "registered shared buffer");
        Ok(id)
    }

    /// Marks a buffer as bound by more than one pass
    pub fn mark_shared(&mut self, id: ResourceId) -> Result<()> {
        self.buffer_mut(id)?.shared = true;
        Ok(())
    }

    /// Validates and allocates a texture, binding its default view when a slot is given
    pub fn add_texture(&mut self, arena: &mut BindGroupArena, texture: ComputeTexture) -> Result<ResourceId> {
        let slot = texture.validate()?;
        if let Some(slot) = slot {
            arena.check_free(&texture.label, slot)?;
        }

        let handle = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&texture.label),
            size: texture.extent,
            mip_level_count: texture.mip_level_count.max(1),
            sample_count: 1,
            dimension: texture.dimension,
            format: texture.format,
            usage: texture.mode.usage(),
            view_formats: &[],
        });

        if let Some(payload) = texture.payload.as_ref().filter(|payload| !payload.is_empty()) {
            write_texture(&self.queue, &handle, texture.format, texture.extent, payload.as_bytes());
        }

        let id = self.push(Resource::Texture(TextureRecord {
            label: texture.label.clone(),
            mode: texture.mode,
            format: texture.format,
            dimension: texture.dimension,
            extent: texture.extent,
            mip_level_count: texture.mip_level_count.max(1),
            handle,
            views: Vec::new(),
        }));

        tracing::debug!(label = %texture.label, extent = ?texture.extent, format = ?texture.format, "registered texture");

        if let Some(slot) = slot {
            self.add_texture_view(arena, id, ComputeTextureView::default_for(&texture, slot))?;
        }

        Ok(id)
    }

    /// Creates a view onto a registered texture and binds it at its own slot
    pub fn add_texture_view(&mut self, arena: &mut BindGroupArena, id: ResourceId, view: ComputeTextureView) -> Result<()> {
        let slot = BindSlot::resolve(&view.label, view.group, view.binding)?;
        let texture = self.texture(id)?;

        let required = view.mode.usage();
        if !texture.mode.usage().contains(required) {
            return Err(ComputeError::IncompatibleTextureUsage { label: view.label, required });
        }

        // Storage bindings address exactly one mip level
        let mip_level_count = match (view.mip_level_count, view.mode.is_storage()) {
            (None, true) => Some(1),
            (count, _) => count,
        };
        let end = view
            .base_mip_level
            .saturating_add(mip_level_count.unwrap_or(texture.mip_level_count.saturating_sub(view.base_mip_level)));
        let single_level = !view.mode.is_storage() || end == view.base_mip_level.saturating_add(1);
        if view.base_mip_level >= texture.mip_level_count || end > texture.mip_level_count || end == view.base_mip_level || !single_level {
            return Err(ComputeError::InvalidMipRange {
                label: view.label,
                base: view.base_mip_level,
                end,
                available: texture.mip_level_count,
            });
        }

        arena.check_free(&view.label, slot)?;

        let dimension = texture.view_dimension();
        let handle = texture.create_view(&view.label, dimension, view.aspect, view.base_mip_level, mip_level_count);
        let layout = view.mode.layout_entry(slot.binding, texture.format, dimension);

        let texture = self.texture_mut(id)?;
        texture.views.push(ViewRecord {
            label: view.label.clone(),
            slot,
            aspect: view.aspect,
            base_mip_level: view.base_mip_level,
            mip_level_count,
            dimension,
            handle: handle.clone(),
        });
        arena.insert(id, &view.label, slot, layout, BoundResource::TextureView(handle))?;

        tracing::debug!(label = %view.label, %slot, mode = ?view.mode, "registered texture view");
        Ok(())
    }

    /// Removes a resource and every binding it owns
    pub fn remove(&mut self, arena: &mut BindGroupArena, id: ResourceId) -> Result<()> {
        let resource = self
            .resources
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or(ComputeError::UnknownResource { index: id.0 })?;

        match &resource {
            Resource::Buffer(buffer) if !buffer.shared => buffer.handle.destroy(),
            Resource::Buffer(_) => {}
            Resource::Texture(texture) => texture.handle.destroy(),
        }
        let bindings = arena.remove_owner(id);

        tracing::debug!(label = resource.label(), bindings, "removed resource");
        Ok(())
    }

    /// Overwrites part of a buffer's contents
    ///
    /// Offset and length must both be multiples of `COPY_BUFFER_ALIGNMENT`.
    pub fn write_buffer(&self, id: ResourceId, offset: u64, bytes: &[u8]) -> Result<()> {
        let buffer = self.buffer(id)?;
        let len = bytes.len() as u64;
        if offset.checked_add(len).is_none_or(|end| end > buffer.byte_size) {
            return Err(ComputeError::OutOfBounds {
                label: buffer.label.clone(),
                offset,
                len,
                capacity: buffer.byte_size,
            });
        }
        if offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 || len % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(ComputeError::UnalignedWrite {
                label: buffer.label.clone(),
                offset,
                len,
            });
        }
        if !buffer.handle.usage().contains(wgpu::BufferUsages::COPY_DST) {
            return Err(ComputeError::IncompatibleUsage {
                label: buffer.label.clone(),
                required: wgpu::BufferUsages::COPY_DST,
            });
        }

        self.queue.write_buffer(&buffer.handle, offset, bytes);
        Ok(())
    }

    /// Overwrites the whole of mip level 0 of a texture
    pub fn write_texture(&self, id: ResourceId, bytes: &[u8]) -> Result<()> {
        let texture = self.texture(id)?;
        check_texel_data(&texture.label, texture.format, texture.extent, bytes.len() as u64)?;

        write_texture(&self.queue, &texture.handle, texture.format, texture.extent, bytes);
        Ok(())
    }

    /// Replaces a buffer's device object with a new allocation of `byte_size` bytes
    ///
    /// The contents are not carried over. Returns the slot and the new handle.
    pub fn recreate_buffer(&mut self, id: ResourceId, byte_size: u64) -> Result<(BindSlot, wgpu::Buffer)> {
        let device = self.device.clone();
        let buffer = self.buffer_mut(id)?;
        if byte_size == 0 {
            return Err(ComputeError::ZeroByteSize { label: buffer.label.clone() });
        }

        let handle = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&buffer.label),
            size: aligned_size(byte_size),
            usage: buffer.handle.usage(),
            mapped_at_creation: false,
        });

        let previous = std::mem::replace(&mut buffer.handle, handle.clone());
        if !buffer.shared {
            previous.destroy();
        }
        buffer.byte_size = byte_size;

        tracing::debug!(label = %buffer.label, byte_size, "recreated buffer");
        Ok((buffer.slot, handle))
    }

    /// Points a buffer record at a handle created elsewhere
    pub fn adopt_buffer(&mut self, id: ResourceId, handle: wgpu::Buffer, byte_size: u64) -> Result<BindSlot> {
        let buffer = self.buffer_mut(id)?;
        let required = buffer.mode.required_usage();
        if !handle.usage().contains(required) {
            return Err(ComputeError::IncompatibleUsage {
                label: buffer.label.clone(),
                required,
            });
        }

        buffer.handle = handle;
        buffer.byte_size = byte_size;
        buffer.shared = true;
        Ok(buffer.slot)
    }

    /// Replaces a texture's device object with one of a new extent and recreates its views
    ///
    /// Returns the slot and new handle of every view.
    pub fn recreate_texture(&mut self, id: ResourceId, extent: wgpu::Extent3d) -> Result<Vec<(BindSlot, wgpu::TextureView)>> {
        let device = self.device.clone();
        let texture = self.texture_mut(id)?;
        validate_extent(&texture.label, extent)?;
        validate_mip_level_count(&texture.label, texture.dimension, extent, texture.mip_level_count)?;
        let dimension = view_dimension(texture.dimension, extent.depth_or_array_layers);
        if dimension != texture.view_dimension() {
            return Err(ComputeError::DimensionChange {
                label: texture.label.clone(),
                from: texture.view_dimension(),
                to: dimension,
            });
        }

        let handle = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&texture.label),
            size: extent,
            mip_level_count: texture.mip_level_count,
            sample_count: 1,
            dimension: texture.dimension,
            format: texture.format,
            usage: texture.handle.usage(),
            view_formats: &[],
        });

        texture.handle.destroy();
        texture.handle = handle;
        texture.extent = extent;

        let mut patched = Vec::with_capacity(texture.views.len());
        for index in 0..texture.views.len() {
            let view = &texture.views[index];
            let handle = texture.create_view(&view.label, view.dimension, view.aspect, view.base_mip_level, view.mip_level_count);
            patched.push((view.slot, handle.clone()));
            texture.views[index].handle = handle;
        }

        tracing::debug!(label = %texture.label, ?extent, views = patched.len(), "recreated texture");
        Ok(patched)
    }
}

/// Uploads an initial payload, zero-padding a trailing partial word
///
/// Only for freshly created buffers, where the padding lands in unused tail bytes.
fn write_initial(queue: &wgpu::Queue, buffer: &wgpu::Buffer, bytes: &[u8]) {
    let padded_len = aligned_size(bytes.len() as u64) as usize;
    if padded_len == bytes.len() {
        queue.write_buffer(buffer, 0, bytes);
    } else {
        let mut padded = Vec::with_capacity(padded_len);
        padded.extend_from_slice(bytes);
        padded.resize(padded_len, 0);
        queue.write_buffer(buffer, 0, &padded);
    }
}

/// Writes tightly packed texel data into mip level 0
fn write_texture(queue: &wgpu::Queue, texture: &wgpu::Texture, format: wgpu::TextureFormat, extent: wgpu::Extent3d, bytes: &[u8]) {
    let layout = TexelLayout::new(format, extent);
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        bytes,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(layout.bytes_per_row),
            rows_per_image: Some(layout.rows_per_image),
        },
        extent,
    );
}
