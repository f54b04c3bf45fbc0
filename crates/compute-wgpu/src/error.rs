//! Error types for compute pass management
//!
//! Every fallible operation in this crate reports a [`ComputeError`]. Registration
//! and dispatch errors are detected before any device call is made; device errors
//! are reported after the device rejected the work. None of them are retried.

use crate::resource::BindSlot;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ComputeError>;

/// Errors reported by compute passes and their resources
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComputeError {
    /// The resource was registered without a bind group index
    #[error("resource '{label}' has no bind group index")]
    UnsetGroup { label: String },

    /// The resource was registered without a binding index
    #[error("resource '{label}' has no binding index")]
    UnsetBinding { label: String },

    /// A buffer resolved to a byte size of zero
    #[error("buffer '{label}' has a byte size of zero")]
    ZeroByteSize { label: String },

    /// A texture has a zero width, height or depth
    #[error("texture '{label}' has a zero extent")]
    ZeroExtent { label: String },

    /// Another binding already occupies the requested slot
    #[error("resource '{label}' requests {slot} which is already bound by '{existing}'")]
    DuplicateBinding { label: String, slot: BindSlot, existing: String },

    /// The initial payload does not fit in the resource
    #[error("payload of {payload} bytes does not fit in '{label}' ({capacity} bytes)")]
    PayloadTooLarge { label: String, payload: u64, capacity: u64 },

    /// Texel data does not cover mip level 0 exactly
    #[error("texel data of {payload} bytes does not match '{label}' ({expected} bytes)")]
    PayloadSizeMismatch { label: String, payload: u64, expected: u64 },

    /// A device object lacks the usage flags required by the requested binding mode
    #[error("buffer '{label}' lacks usage {required:?} required for its binding")]
    IncompatibleUsage { label: String, required: wgpu::BufferUsages },

    /// A texture view requests a binding its texture was not created for
    #[error("view '{label}' requires texture usage {required:?}")]
    IncompatibleTextureUsage { label: String, required: wgpu::TextureUsages },

    /// A texture view selects mip levels the texture does not have
    #[error("view '{label}' selects mip levels {base}..{end} of a texture with {available} levels")]
    InvalidMipRange { label: String, base: u32, end: u32, available: u32 },

    /// The extent is too small for the texture's mip level count
    #[error("texture '{label}' has {requested} mip levels but its extent allows at most {max}")]
    TooManyMipLevels { label: String, requested: u32, max: u32 },

    /// A new extent would change the view dimension the texture is bound with
    #[error("resizing texture '{label}' would change its view dimension from {from:?} to {to:?}")]
    DimensionChange {
        label: String,
        from: wgpu::TextureViewDimension,
        to: wgpu::TextureViewDimension,
    },

    /// No binding is registered at the slot
    #[error("nothing is bound at {slot}")]
    UnboundSlot { slot: BindSlot },

    /// A dispatch was requested with a zero workgroup count
    #[error("invalid workgroup counts ({x}, {y}, {z}) for pass '{pass}'")]
    InvalidWorkgroups { pass: String, x: u32, y: u32, z: u32 },

    /// A dispatch was requested before any shader source was set
    #[error("pass '{pass}' has no shader source")]
    MissingShader { pass: String },

    /// The shader failed to parse or validate, or lacks the entry point
    #[error("shader for pass '{pass}' failed to compile: {message}")]
    ShaderCompilation { pass: String, message: String },

    /// The device rejected the pipeline layout or compute pipeline
    #[error("compute pipeline for pass '{pass}' could not be created: {message}")]
    PipelineCreation { pass: String, message: String },

    /// Mapping a staging buffer for readback failed
    #[error("mapping staging buffer for '{label}' failed: {status}")]
    MapFailed { label: String, status: String },

    /// The readback continuation was dropped without resolving
    #[error("readback of '{label}' was dropped before completion")]
    ReadbackDropped { label: String },

    /// Polling the device failed
    #[error("device poll failed: {message}")]
    DevicePoll { message: String },

    /// No resource exists at the given index
    #[error("no resource at index {index}")]
    UnknownResource { index: u32 },

    /// No pass exists at the given index
    #[error("no compute pass at index {index}")]
    UnknownPass { index: u32 },

    /// The resource is of the wrong kind for the operation
    #[error("resource '{label}' is not a {expected}")]
    WrongResourceKind { label: String, expected: &'static str },

    /// Readback was requested on a buffer that cannot be copied from
    #[error("buffer '{label}' is not mappable; register it as ReadWriteMappableStorage to read it back")]
    NotMappable { label: String },

    /// A write or view falls outside the resource
    #[error("write of {len} bytes at offset {offset} exceeds '{label}' ({capacity} bytes)")]
    OutOfBounds { label: String, offset: u64, len: u64, capacity: u64 },

    /// A buffer write whose offset or length is not a multiple of `COPY_BUFFER_ALIGNMENT`
    #[error("write of {len} bytes into '{label}' at offset {offset} is not 4-byte aligned")]
    UnalignedWrite { label: String, offset: u64, len: u64 },
}
