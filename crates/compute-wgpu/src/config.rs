//! Compute pass configuration

/// Number of workgroups launched along each axis by a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Workgroups {
    /// Workgroups along X
    pub x: u32,
    /// Workgroups along Y
    pub y: u32,
    /// Workgroups along Z
    pub z: u32,
}

impl Workgroups {
    /// Creates a workgroup count
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Smallest 1D dispatch covering `elements` invocations with the given workgroup size
    pub fn covering(elements: u32, workgroup_size: u32) -> Self {
        Self::new(elements.div_ceil(workgroup_size.max(1)), 1, 1)
    }

    /// Whether any axis is zero, which would make the dispatch a no-op
    pub fn is_empty(&self) -> bool {
        self.x == 0 || self.y == 0 || self.z == 0
    }

    /// Total number of workgroups
    pub fn total(&self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }
}

impl Default for Workgroups {
    fn default() -> Self {
        Self::new(1, 1, 1)
    }
}

/// Configuration of a compute pass
///
/// The shader source may be left unset and provided later with
/// [`ComputePass::set_shader_source`](crate::ComputePass::set_shader_source); it must be
/// present by the first dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputePassDescriptor {
    /// Label used for every device object created by the pass
    pub label: String,
    /// WGSL shader source
    pub shader_source: Option<String>,
    /// Compute entry point
    pub entry_point: String,
    /// Workgroups launched by each dispatch
    pub workgroups: Workgroups,
}

impl Default for ComputePassDescriptor {
    fn default() -> Self {
        Self {
            label: "compute pass".to_string(),
            shader_source: None,
            entry_point: "main".to_string(),
            workgroups: Workgroups::default(),
        }
    }
}

impl ComputePassDescriptor {
    /// Creates a descriptor with the given label and defaults otherwise
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    /// Sets the WGSL shader source
    pub fn with_shader(mut self, source: impl Into<String>) -> Self {
        self.shader_source = Some(source.into());
        self
    }

    /// Sets the compute entry point
    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = entry_point.into();
        self
    }

    /// Sets the workgroup counts
    pub fn with_workgroups(mut self, x: u32, y: u32, z: u32) -> Self {
        self.workgroups = Workgroups::new(x, y, z);
        self
    }
}
