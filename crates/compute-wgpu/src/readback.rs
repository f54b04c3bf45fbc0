//! Asynchronous readback of buffers and textures
//!
//! A readback copies the resource into a fresh `MAP_READ` staging buffer, submits the
//! copy and requests a map of the staging buffer. The map continuation owns the whole
//! request: it copies the mapped bytes out, hands them to the optional callback, unmaps
//! and resolves the [`ReadbackHandle`] through a oneshot channel.
//!
//! Nothing here polls the device. The continuation runs when the owner of the device
//! polls it, for example through [`ComputePass::update`](crate::ComputePass::update).

use std::fmt;

use bytes::{Bytes, BytesMut};
use futures_intrusive::channel::shared::{OneshotReceiver, OneshotSender, oneshot_channel};

use crate::error::{ComputeError, Result};
use crate::registry::{BufferRecord, TextureRecord};
use crate::resource::{TexelLayout, aligned_size};

/// Host callback receiving the bytes of a successful readback
pub type ReadbackCallback = Box<dyn FnOnce(&[u8]) + Send + 'static>;

/// Pending result of a readback
///
/// Resolves once the device has been polled past the copy. Dropping the handle does not
/// cancel the readback; the callback still runs.
pub struct ReadbackHandle {
    label: String,
    receiver: OneshotReceiver<Result<Bytes>>,
}

impl ReadbackHandle {
    /// Label of the resource being read
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Waits for the readback to finish
    ///
    /// # Returns
    /// The resource contents, truncated to its byte size and without row padding
    pub async fn receive(self) -> Result<Bytes> {
        match self.receiver.receive().await {
            Some(result) => result,
            None => Err(ComputeError::ReadbackDropped { label: self.label }),
        }
    }
}

impl fmt::Debug for ReadbackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadbackHandle").field("label", &self.label).finish_non_exhaustive()
    }
}

/// Row padding of a texture copied into a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RowLayout {
    pub bytes_per_row: u32,
    pub padded_bytes_per_row: u32,
    pub rows: u32,
}

impl From<TexelLayout> for RowLayout {
    fn from(layout: TexelLayout) -> Self {
        Self {
            bytes_per_row: layout.bytes_per_row,
            padded_bytes_per_row: layout.padded_bytes_per_row(),
            rows: layout.rows(),
        }
    }
}

impl RowLayout {
    /// Size of the padded copy in bytes
    pub fn padded_size(&self) -> u64 {
        self.padded_bytes_per_row as u64 * self.rows as u64
    }

    /// Strips the padding at the end of every row
    pub fn unpad(&self, padded: &[u8]) -> Bytes {
        let mut bytes = BytesMut::with_capacity(self.bytes_per_row as usize * self.rows as usize);
        for row in padded.chunks(self.padded_bytes_per_row.max(1) as usize).take(self.rows as usize) {
            bytes.extend_from_slice(&row[..row.len().min(self.bytes_per_row as usize)]);
        }
        bytes.freeze()
    }
}

/// State carried by the map continuation of one readback
pub(crate) struct ReadbackRequest {
    label: String,
    byte_size: u64,
    staging: wgpu::Buffer,
    rows: Option<RowLayout>,
    callback: Option<ReadbackCallback>,
    sender: OneshotSender<Result<Bytes>>,
}

impl ReadbackRequest {
    pub fn new(label: &str, byte_size: u64, staging: wgpu::Buffer, rows: Option<RowLayout>, callback: Option<ReadbackCallback>) -> (Self, ReadbackHandle) {
        let (sender, receiver) = oneshot_channel();
        let request = Self {
            label: label.to_string(),
            byte_size,
            staging,
            rows,
            callback,
            sender,
        };
        let handle = ReadbackHandle {
            label: label.to_string(),
            receiver,
        };
        (request, handle)
    }

    /// Requests the staging map; the request is consumed by the continuation
    pub fn submit(self) {
        let staging = self.staging.clone();
        staging.slice(..).map_async(wgpu::MapMode::Read, move |status| self.complete(status));
    }

    /// Map continuation
    ///
    /// The callback runs at most once and only on success.
    pub fn complete(self, status: std::result::Result<(), wgpu::BufferAsyncError>) {
        let result = match status {
            Ok(()) => {
                let bytes = {
                    let mapped = self.staging.slice(..).get_mapped_range();
                    match self.rows {
                        Some(rows) => rows.unpad(&mapped),
                        None => Bytes::copy_from_slice(&mapped[..mapped.len().min(self.byte_size as usize)]),
                    }
                };
                if let Some(callback) = self.callback {
                    callback(&bytes);
                }
                self.staging.unmap();
                tracing::debug!(label = %self.label, bytes = bytes.len(), "readback complete");
                Ok(bytes)
            }
            Err(error) => {
                tracing::error!(label = %self.label, %error, "failed to map readback buffer");
                Err(ComputeError::MapFailed {
                    label: self.label.clone(),
                    status: error.to_string(),
                })
            }
        };

        self.staging.destroy();
        if self.sender.send(result).is_err() {
            tracing::debug!(label = %self.label, "readback handle dropped before completion");
        }
    }
}

fn create_staging_buffer(device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(&format!("{label} readback")),
        size,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    })
}

/// Copies a mappable buffer into a staging buffer and requests the map
///
/// # Arguments
/// * `device` - Device owning the buffer
/// * `queue` - Queue the copy is submitted on
/// * `buffer` - Buffer to read; must have been registered as mappable storage
/// * `callback` - Optional host callback invoked with the contents
pub(crate) fn read_buffer(device: &wgpu::Device, queue: &wgpu::Queue, buffer: &BufferRecord, callback: Option<ReadbackCallback>) -> Result<ReadbackHandle> {
    if !buffer.mode.is_mappable() {
        return Err(ComputeError::NotMappable { label: buffer.label.clone() });
    }

    let size = aligned_size(buffer.byte_size);
    let staging = create_staging_buffer(device, &buffer.label, size);

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some(&format!("{} readback", buffer.label)),
    });
    encoder.copy_buffer_to_buffer(&buffer.handle, 0, &staging, 0, size);
    queue.submit(Some(encoder.finish()));

    let (request, handle) = ReadbackRequest::new(&buffer.label, buffer.byte_size, staging, None, callback);
    request.submit();
    Ok(handle)
}

/// Copies mip level 0 of a texture into a staging buffer and requests the map
///
/// Rows are padded to `COPY_BYTES_PER_ROW_ALIGNMENT` for the copy and unpadded again
/// before the result is delivered.
pub(crate) fn read_texture(device: &wgpu::Device, queue: &wgpu::Queue, texture: &TextureRecord, callback: Option<ReadbackCallback>) -> Result<ReadbackHandle> {
    let layout = TexelLayout::new(texture.format, texture.extent);
    let rows = RowLayout::from(layout);
    let staging = create_staging_buffer(device, &texture.label, rows.padded_size());

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some(&format!("{} readback", texture.label)),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: &texture.handle,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(rows.padded_bytes_per_row),
                rows_per_image: Some(layout.rows_per_image),
            },
        },
        texture.extent,
    );
    queue.submit(Some(encoder.finish()));

    let (request, handle) = ReadbackRequest::new(&texture.label, layout.byte_size(), staging, Some(rows), callback);
    request.submit();
    Ok(handle)
}
