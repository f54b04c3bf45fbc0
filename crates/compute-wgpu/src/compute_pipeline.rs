//! Several compute passes sharing a device
//!
//! A [`ComputePipeline`] owns an ordered list of [`ComputePass`]es created on the same
//! device and queue. Buffers can be bound into more than one pass; resizing a shared
//! buffer through the pipeline hands the new allocation to every pass that binds it.

use std::fmt;

use crate::config::ComputePassDescriptor;
use crate::error::{ComputeError, Result};
use crate::pass::{self, ComputePass};
use crate::registry::ResourceId;
use crate::resource::{BindSlot, BufferMode};

/// Index of a pass within a [`ComputePipeline`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassId(pub(crate) u32);

impl PassId {
    /// Raw index into the pipeline's pass list
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pass {}", self.0)
    }
}

/// A buffer bound by several passes, addressed as `(pass, resource)` pairs
type Aliases = Vec<(PassId, ResourceId)>;

/// Ordered set of compute passes on one device
pub struct ComputePipeline {
    device: wgpu::Device,
    queue: wgpu::Queue,
    passes: Vec<ComputePass>,
    shared: Vec<Aliases>,
}

impl ComputePipeline {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            passes: Vec::new(),
            shared: Vec::new(),
        }
    }

    /// Appends a pass; passes are dispatched in the order they were added
    pub fn add_pass(&mut self, descriptor: ComputePassDescriptor) -> PassId {
        self.passes.push(ComputePass::new(self.device.clone(), self.queue.clone(), descriptor));
        PassId((self.passes.len() - 1) as u32)
    }

    pub fn pass(&self, id: PassId) -> Result<&ComputePass> {
        self.passes.get(id.index()).ok_or(ComputeError::UnknownPass { index: id.0 })
    }

    pub fn pass_mut(&mut self, id: PassId) -> Result<&mut ComputePass> {
        self.passes.get_mut(id.index()).ok_or(ComputeError::UnknownPass { index: id.0 })
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn passes(&self) -> impl Iterator<Item = (PassId, &ComputePass)> {
        self.passes.iter().enumerate().map(|(index, pass)| (PassId(index as u32), pass))
    }

    /// Binds a buffer of one pass into another pass at `slot`
    ///
    /// Both passes then reference the same device buffer. The buffer must carry the usage
    /// flags `mode` requires.
    ///
    /// # Arguments
    /// * `from` - Pass and resource owning the buffer
    /// * `to` - Pass receiving the binding
    /// * `slot` - Group and binding in the receiving pass
    /// * `mode` - How the receiving pass's shader accesses the buffer
    ///
    /// # Returns
    /// Id of the buffer within the receiving pass
    pub fn share_buffer(&mut self, from: (PassId, ResourceId), to: PassId, slot: BindSlot, mode: BufferMode) -> Result<ResourceId> {
        let (source_pass, source_id) = from;
        let source = self.pass(source_pass)?;
        let label = source.resource_label(source_id)?.to_string();
        let handle = source.buffer_handle(source_id)?.clone();
        let byte_size = source.buffer_byte_size(source_id)?;

        let id = self.pass_mut(to)?.add_external_buffer(&label, slot, mode, handle, byte_size)?;
        self.pass_mut(source_pass)?.mark_shared(source_id)?;

        match self.aliases_of(from) {
            Some(index) => self.shared[index].push((to, id)),
            None => self.shared.push(vec![from, (to, id)]),
        }

        tracing::debug!(%label, from = %source_pass, to = %to, %slot, "shared buffer between passes");
        Ok(id)
    }

    fn aliases_of(&self, member: (PassId, ResourceId)) -> Option<usize> {
        self.shared.iter().position(|aliases| aliases.contains(&member))
    }

    /// Resizes a buffer and rebinds the new allocation in every pass sharing it
    pub fn recreate_buffer(&mut self, pass: PassId, id: ResourceId, byte_size: u64) -> Result<()> {
        self.pass_mut(pass)?.recreate_buffer(id, byte_size)?;

        let Some(index) = self.aliases_of((pass, id)) else {
            return Ok(());
        };

        // Aliases removed from their pass since sharing are forgotten
        let passes = &self.passes;
        self.shared[index].retain(|&(alias_pass, alias_id)| passes.get(alias_pass.index()).is_some_and(|p| p.buffer_handle(alias_id).is_ok()));

        let handle = self.pass(pass)?.buffer_handle(id)?.clone();
        let aliases = self.shared[index].clone();
        for (alias_pass, alias_id) in aliases.into_iter().filter(|&alias| alias != (pass, id)) {
            self.pass_mut(alias_pass)?.adopt_buffer(alias_id, handle.clone(), byte_size)?;
        }
        Ok(())
    }

    /// Records every pass into one command buffer and submits it
    ///
    /// Passes run in the order they were added. When any pass fails to encode, nothing
    /// is submitted.
    pub fn dispatch_all(&mut self) -> Result<wgpu::SubmissionIndex> {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("compute pipeline") });
        for pass in &mut self.passes {
            pass.encode(&mut encoder)?;
        }
        let index = self.queue.submit(Some(encoder.finish()));

        tracing::debug!(passes = self.passes.len(), "submitted compute pipeline");
        Ok(index)
    }

    /// Blocks until all submitted work is done, resolving pending readbacks
    pub fn update(&self) -> Result<()> {
        pass::poll(&self.device)
    }
}

impl fmt::Debug for ComputePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputePipeline").field("passes", &self.passes).field("shared", &self.shared).finish_non_exhaustive()
    }
}
