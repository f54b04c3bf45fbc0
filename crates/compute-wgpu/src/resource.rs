//! Resource descriptors for compute passes
//!
//! This module defines the caller-facing descriptions of buffers, textures and texture
//! views, along with the binding modes that decide their usage flags and the bind group
//! layout entries generated for them.

use std::fmt;

use crate::error::{ComputeError, Result};

/// Location of a binding in the shader: `@group(group) @binding(binding)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindSlot {
    /// Bind group index
    pub group: u32,
    /// Binding index within the group
    pub binding: u32,
}

impl BindSlot {
    /// Creates a slot from a group and binding index
    pub const fn new(group: u32, binding: u32) -> Self {
        Self { group, binding }
    }

    /// Resolves optional group/binding indices into a slot
    ///
    /// Both indices must be present; the label is only used for the error.
    pub(crate) fn resolve(label: &str, group: Option<u32>, binding: Option<u32>) -> Result<Self> {
        let group = group.ok_or_else(|| ComputeError::UnsetGroup { label: label.to_string() })?;
        let binding = binding.ok_or_else(|| ComputeError::UnsetBinding { label: label.to_string() })?;
        Ok(Self { group, binding })
    }
}

impl fmt::Display for BindSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@group({}) @binding({})", self.group, self.binding)
    }
}

/// Initial CPU-side contents copied into a resource when it is created
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload(Vec<u8>);

impl Payload {
    /// Copies a slice of plain-old-data values into a payload
    pub fn from_slice<T: bytemuck::Pod>(values: &[T]) -> Self {
        Self(bytemuck::cast_slice(values).to_vec())
    }

    /// Payload bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Payload length in bytes
    pub fn len(&self) -> u64 {
        self.0.len() as u64
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T: bytemuck::Pod> From<Vec<T>> for Payload {
    fn from(values: Vec<T>) -> Self {
        Self::from_slice(&values)
    }
}

impl<T: bytemuck::Pod> From<&[T]> for Payload {
    fn from(values: &[T]) -> Self {
        Self::from_slice(values)
    }
}

/// How a buffer is accessed by the shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferMode {
    /// `var<storage, read>`
    ReadOnlyStorage,
    /// `var<storage, read_write>`
    ReadWriteStorage,
    /// `var<storage, read_write>` that can also be copied back to the host
    ReadWriteMappableStorage,
    /// `var<uniform>`
    Uniform,
}

impl BufferMode {
    /// Usage flags of a buffer allocated for this mode
    pub fn usage(self) -> wgpu::BufferUsages {
        match self {
            BufferMode::ReadOnlyStorage | BufferMode::ReadWriteStorage => wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::STORAGE,
            // COPY_DST keeps initial payload uploads possible
            BufferMode::ReadWriteMappableStorage => wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::STORAGE,
            BufferMode::Uniform => wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::UNIFORM,
        }
    }

    /// Usage flags an existing buffer must carry to be bound in this mode
    pub fn required_usage(self) -> wgpu::BufferUsages {
        match self {
            BufferMode::ReadOnlyStorage | BufferMode::ReadWriteStorage => wgpu::BufferUsages::STORAGE,
            BufferMode::ReadWriteMappableStorage => wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            BufferMode::Uniform => wgpu::BufferUsages::UNIFORM,
        }
    }

    /// Whether buffers in this mode can be read back to the host
    pub fn is_mappable(self) -> bool {
        matches!(self, BufferMode::ReadWriteMappableStorage)
    }

    /// Bind group layout entry for a buffer in this mode at the given binding
    pub fn layout_entry(self, binding: u32) -> wgpu::BindGroupLayoutEntry {
        let ty = match self {
            BufferMode::ReadOnlyStorage => wgpu::BufferBindingType::Storage { read_only: true },
            BufferMode::ReadWriteStorage | BufferMode::ReadWriteMappableStorage => wgpu::BufferBindingType::Storage { read_only: false },
            BufferMode::Uniform => wgpu::BufferBindingType::Uniform,
        };

        wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }
    }
}

/// Description of a buffer bound to a compute shader
#[derive(Debug, Clone)]
pub struct ComputeBuffer {
    /// Label used for the device object and diagnostics
    pub label: String,
    /// Bind group index
    pub group: Option<u32>,
    /// Binding index
    pub binding: Option<u32>,
    /// Access mode
    pub mode: BufferMode,
    /// Size in bytes; when zero, the payload length is used
    pub byte_size: u64,
    /// Data uploaded right after the buffer is created
    pub payload: Option<Payload>,
}

impl ComputeBuffer {
    /// Creates an unbound buffer description with no size
    pub fn new(label: impl Into<String>, mode: BufferMode) -> Self {
        Self {
            label: label.into(),
            group: None,
            binding: None,
            mode,
            byte_size: 0,
            payload: None,
        }
    }

    /// Sets the bind group and binding index
    pub fn with_slot(mut self, group: u32, binding: u32) -> Self {
        self.group = Some(group);
        self.binding = Some(binding);
        self
    }

    /// Sets the buffer size in bytes
    pub fn with_byte_size(mut self, byte_size: u64) -> Self {
        self.byte_size = byte_size;
        self
    }

    /// Sets the initial contents
    pub fn with_payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Validates the description, returning its slot and resolved byte size
    pub(crate) fn validate(&self) -> Result<(BindSlot, u64)> {
        let slot = BindSlot::resolve(&self.label, self.group, self.binding)?;

        let payload_len = self.payload.as_ref().map_or(0, Payload::len);
        let byte_size = if self.byte_size == 0 { payload_len } else { self.byte_size };
        if byte_size == 0 {
            return Err(ComputeError::ZeroByteSize { label: self.label.clone() });
        }
        if payload_len > byte_size {
            return Err(ComputeError::PayloadTooLarge {
                label: self.label.clone(),
                payload: payload_len,
                capacity: byte_size,
            });
        }

        Ok((slot, byte_size))
    }
}

/// Size of a device allocation holding `byte_size` bytes
///
/// Buffer copies and writes operate on multiples of `COPY_BUFFER_ALIGNMENT`.
pub(crate) fn aligned_size(byte_size: u64) -> u64 {
    byte_size.div_ceil(wgpu::COPY_BUFFER_ALIGNMENT) * wgpu::COPY_BUFFER_ALIGNMENT
}

/// How a texture view is accessed by the shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureMode {
    /// `texture_2d<f32>` and friends, read through `textureLoad`/`textureSample`
    Sampled,
    /// `texture_storage_2d<format, read>`
    ReadOnlyStorage,
    /// `texture_storage_2d<format, write>`
    WriteOnlyStorage,
    /// `texture_storage_2d<format, read_write>`
    ReadWriteStorage,
}

impl TextureMode {
    /// Usage flags of a texture allocated for this mode
    pub fn usage(self) -> wgpu::TextureUsages {
        let binding = match self {
            TextureMode::Sampled => wgpu::TextureUsages::TEXTURE_BINDING,
            _ => wgpu::TextureUsages::STORAGE_BINDING,
        };
        binding | wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::COPY_DST
    }

    /// Whether views in this mode bind a storage texture
    pub fn is_storage(self) -> bool {
        !matches!(self, TextureMode::Sampled)
    }

    /// Bind group layout entry for a view in this mode
    pub fn layout_entry(self, binding: u32, format: wgpu::TextureFormat, view_dimension: wgpu::TextureViewDimension) -> wgpu::BindGroupLayoutEntry {
        let ty = match self {
            TextureMode::Sampled => wgpu::BindingType::Texture {
                sample_type: format
                    .sample_type(None, None)
                    .unwrap_or(wgpu::TextureSampleType::Float { filterable: false }),
                view_dimension,
                multisampled: false,
            },
            TextureMode::ReadOnlyStorage => wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::ReadOnly,
                format,
                view_dimension,
            },
            TextureMode::WriteOnlyStorage => wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format,
                view_dimension,
            },
            TextureMode::ReadWriteStorage => wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::ReadWrite,
                format,
                view_dimension,
            },
        };

        wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty,
            count: None,
        }
    }
}

/// Description of a texture used by a compute shader
#[derive(Debug, Clone)]
pub struct ComputeTexture {
    /// Label used for the device object and diagnostics
    pub label: String,
    /// Bind group index of the default view
    pub group: Option<u32>,
    /// Binding index of the default view
    pub binding: Option<u32>,
    /// Access mode of the default view; decides the usage flags
    pub mode: TextureMode,
    /// Texel format
    pub format: wgpu::TextureFormat,
    /// Texture dimensionality
    pub dimension: wgpu::TextureDimension,
    /// Width, height and depth (or array layers)
    pub extent: wgpu::Extent3d,
    /// Number of mip levels
    pub mip_level_count: u32,
    /// Data uploaded to mip level 0 right after the texture is created
    pub payload: Option<Payload>,
}

impl ComputeTexture {
    /// Creates an unbound 2D texture description
    pub fn new(label: impl Into<String>, mode: TextureMode, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            group: None,
            binding: None,
            mode,
            format,
            dimension: wgpu::TextureDimension::D2,
            extent: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            payload: None,
        }
    }

    /// Sets the slot of the default view
    pub fn with_slot(mut self, group: u32, binding: u32) -> Self {
        self.group = Some(group);
        self.binding = Some(binding);
        self
    }

    /// Sets the dimensionality and depth (or array layer count)
    pub fn with_dimension(mut self, dimension: wgpu::TextureDimension, depth_or_array_layers: u32) -> Self {
        self.dimension = dimension;
        self.extent.depth_or_array_layers = depth_or_array_layers;
        self
    }

    /// Sets the number of mip levels
    pub fn with_mip_level_count(mut self, mip_level_count: u32) -> Self {
        self.mip_level_count = mip_level_count;
        self
    }

    /// Sets the initial contents of mip level 0
    pub fn with_payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Validates the description, returning the slot of its default view if any
    pub(crate) fn validate(&self) -> Result<Option<BindSlot>> {
        validate_extent(&self.label, self.extent)?;

        let slot = match (self.group, self.binding) {
            (None, None) => None,
            (group, binding) => Some(BindSlot::resolve(&self.label, group, binding)?),
        };

        validate_mip_level_count(&self.label, self.dimension, self.extent, self.mip_level_count.max(1))?;

        if let Some(payload) = self.payload.as_ref().filter(|payload| !payload.is_empty()) {
            check_texel_data(&self.label, self.format, self.extent, payload.len())?;
        }

        Ok(slot)
    }
}

pub(crate) fn validate_extent(label: &str, extent: wgpu::Extent3d) -> Result<()> {
    if extent.width == 0 || extent.height == 0 || extent.depth_or_array_layers == 0 {
        return Err(ComputeError::ZeroExtent { label: label.to_string() });
    }
    Ok(())
}

pub(crate) fn validate_mip_level_count(label: &str, dimension: wgpu::TextureDimension, extent: wgpu::Extent3d, mip_level_count: u32) -> Result<()> {
    let max = extent.max_mips(dimension);
    if mip_level_count > max {
        return Err(ComputeError::TooManyMipLevels {
            label: label.to_string(),
            requested: mip_level_count,
            max,
        });
    }
    Ok(())
}

/// Texel data for mip level 0 must be tightly packed and cover the whole level
pub(crate) fn check_texel_data(label: &str, format: wgpu::TextureFormat, extent: wgpu::Extent3d, len: u64) -> Result<()> {
    let expected = TexelLayout::new(format, extent).byte_size();
    if len != expected {
        return Err(ComputeError::PayloadSizeMismatch {
            label: label.to_string(),
            payload: len,
            expected,
        });
    }
    Ok(())
}

/// View dimension matching a texture's dimensionality
pub(crate) fn view_dimension(dimension: wgpu::TextureDimension, depth_or_array_layers: u32) -> wgpu::TextureViewDimension {
    match dimension {
        wgpu::TextureDimension::D1 => wgpu::TextureViewDimension::D1,
        wgpu::TextureDimension::D2 if depth_or_array_layers > 1 => wgpu::TextureViewDimension::D2Array,
        wgpu::TextureDimension::D2 => wgpu::TextureViewDimension::D2,
        wgpu::TextureDimension::D3 => wgpu::TextureViewDimension::D3,
    }
}

/// Description of an additional view onto a registered texture
#[derive(Debug, Clone)]
pub struct ComputeTextureView {
    /// Label used for the view and diagnostics
    pub label: String,
    /// Bind group index
    pub group: Option<u32>,
    /// Binding index
    pub binding: Option<u32>,
    /// Access mode; must be compatible with the texture's usage
    pub mode: TextureMode,
    /// Texture aspect covered by the view
    pub aspect: wgpu::TextureAspect,
    /// First mip level visible through the view
    pub base_mip_level: u32,
    /// Number of mip levels visible; `None` means all remaining levels
    pub mip_level_count: Option<u32>,
}

impl ComputeTextureView {
    /// Creates an unbound view description covering the whole texture
    pub fn new(label: impl Into<String>, mode: TextureMode) -> Self {
        Self {
            label: label.into(),
            group: None,
            binding: None,
            mode,
            aspect: wgpu::TextureAspect::All,
            base_mip_level: 0,
            mip_level_count: None,
        }
    }

    /// Sets the bind group and binding index
    pub fn with_slot(mut self, group: u32, binding: u32) -> Self {
        self.group = Some(group);
        self.binding = Some(binding);
        self
    }

    /// Restricts the view to a range of mip levels
    pub fn with_mip_range(mut self, base_mip_level: u32, mip_level_count: u32) -> Self {
        self.base_mip_level = base_mip_level;
        self.mip_level_count = Some(mip_level_count);
        self
    }

    /// Sets the aspect covered by the view
    pub fn with_aspect(mut self, aspect: wgpu::TextureAspect) -> Self {
        self.aspect = aspect;
        self
    }

    /// Default view registered for a texture that carries a slot
    pub(crate) fn default_for(texture: &ComputeTexture, slot: BindSlot) -> Self {
        Self::new(texture.label.clone(), texture.mode).with_slot(slot.group, slot.binding)
    }
}

/// Byte layout of a texture's mip level 0 in host memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TexelLayout {
    /// Tightly packed bytes per row of blocks
    pub bytes_per_row: u32,
    /// Rows of blocks per image
    pub rows_per_image: u32,
    /// Depth or array layers
    pub layers: u32,
}

impl TexelLayout {
    pub fn new(format: wgpu::TextureFormat, extent: wgpu::Extent3d) -> Self {
        let (block_width, block_height) = format.block_dimensions();
        let block_size = format.block_copy_size(Some(wgpu::TextureAspect::All)).unwrap_or(0);
        Self {
            bytes_per_row: extent.width.div_ceil(block_width) * block_size,
            rows_per_image: extent.height.div_ceil(block_height),
            layers: extent.depth_or_array_layers,
        }
    }

    /// Bytes per row padded for texture-to-buffer copies
    pub fn padded_bytes_per_row(&self) -> u32 {
        self.bytes_per_row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT
    }

    /// Total rows across all layers
    pub fn rows(&self) -> u32 {
        self.rows_per_image * self.layers
    }

    /// Tightly packed size in bytes
    pub fn byte_size(&self) -> u64 {
        self.bytes_per_row as u64 * self.rows() as u64
    }
}
