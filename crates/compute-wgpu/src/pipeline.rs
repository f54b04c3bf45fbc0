//! Compute pipeline construction and caching
//!
//! A pass builds its pipeline lazily on the first dispatch and keeps it for as long as
//! the binding structure and the shader stay the same. Resizing a resource only swaps
//! bind groups and never forces a rebuild.
//!
//! The pipeline layout lists one bind group layout per group index from zero up to the
//! highest index in use. Indices without bindings get an empty layout and an empty
//! placeholder bind group so that the shader's group numbering is preserved.

use crate::bind_group::BindGroupArena;
use crate::error::{ComputeError, Result};
use crate::shader::validate_compute_shader;

/// Lifecycle state of a pass's compute pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    /// No pipeline has been built yet, or the last build failed
    Uninitialized,
    /// The pipeline and bind groups are current
    Built,
    /// A resource was recreated since the last dispatch; bind groups were patched but
    /// the pipeline object is unchanged
    Invalidated,
}

/// Builds and caches the compute pipeline of one pass
#[derive(Debug)]
pub(crate) struct PipelineBuilder {
    state: PipelineState,
    pipeline: Option<wgpu::ComputePipeline>,
    /// Empty bind groups for group indices without bindings
    placeholders: Vec<(u32, wgpu::BindGroup)>,
    /// Arena generation the current pipeline was built from
    built_generation: u64,
    shader_dirty: bool,
    builds: u64,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Uninitialized,
            pipeline: None,
            placeholders: Vec::new(),
            built_generation: 0,
            shader_dirty: false,
            builds: 0,
        }
    }

    pub fn state(&self) -> PipelineState {
        if self.pipeline.is_none() { PipelineState::Uninitialized } else { self.state }
    }

    /// Number of successful pipeline builds
    pub fn builds(&self) -> u64 {
        self.builds
    }

    pub fn pipeline(&self) -> Option<&wgpu::ComputePipeline> {
        self.pipeline.as_ref()
    }

    pub fn placeholders(&self) -> &[(u32, wgpu::BindGroup)] {
        &self.placeholders
    }

    /// Records that a resource moved to a new device object
    pub fn invalidate(&mut self) {
        if self.state == PipelineState::Built {
            self.state = PipelineState::Invalidated;
        }
    }

    /// Forces a rebuild on the next dispatch after the shader or entry point changed
    pub fn mark_shader_dirty(&mut self) {
        self.shader_dirty = true;
    }

    /// Whether the next dispatch has to build the pipeline
    pub fn needs_rebuild(&self, arena_generation: u64) -> bool {
        self.pipeline.is_none() || self.shader_dirty || self.built_generation != arena_generation
    }

    /// Builds the pipeline unless the cached one is still valid
    ///
    /// On failure nothing built by this call stays referenced: the pipeline is dropped and
    /// the arena's layouts and bind groups are cleared.
    ///
    /// # Returns
    /// `true` if a build happened
    pub fn ensure_built(&mut self, device: &wgpu::Device, arena: &mut BindGroupArena, label: &str, shader: Option<&str>, entry_point: &str) -> Result<bool> {
        if !self.needs_rebuild(arena.generation()) {
            self.state = PipelineState::Built;
            return Ok(false);
        }

        self.pipeline = None;
        self.placeholders.clear();
        self.state = PipelineState::Uninitialized;

        match self.build(device, arena, label, shader, entry_point) {
            Ok(()) => {
                self.builds += 1;
                self.built_generation = arena.generation();
                self.shader_dirty = false;
                self.state = PipelineState::Built;
                tracing::debug!(pass = label, groups = arena.len(), builds = self.builds, "built compute pipeline");
                Ok(true)
            }
            Err(error) => {
                self.pipeline = None;
                self.placeholders.clear();
                arena.clear_built();
                Err(error)
            }
        }
    }

    fn build(&mut self, device: &wgpu::Device, arena: &mut BindGroupArena, label: &str, shader: Option<&str>, entry_point: &str) -> Result<()> {
        let source = shader.ok_or_else(|| ComputeError::MissingShader { pass: label.to_string() })?;
        validate_compute_shader(source, entry_point).map_err(|message| ComputeError::ShaderCompilation {
            pass: label.to_string(),
            message,
        })?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(ComputeError::ShaderCompilation {
                pass: label.to_string(),
                message: error.to_string(),
            });
        }

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        arena.build(device, label);

        let empty_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{label} empty layout")),
            entries: &[],
        });

        let mut bind_group_layouts = Vec::new();
        let mut placeholders = Vec::new();
        if let Some(max_group) = arena.max_group() {
            for group in 0..=max_group {
                match arena.layout_for_group(group) {
                    Some(layout) => bind_group_layouts.push(layout),
                    None => {
                        bind_group_layouts.push(&empty_layout);
                        let placeholder = device.create_bind_group(&wgpu::BindGroupDescriptor {
                            label: Some(&format!("{label} group {group} placeholder")),
                            layout: &empty_layout,
                            entries: &[],
                        });
                        placeholders.push((group, placeholder));
                    }
                }
            }
        }

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &bind_group_layouts,
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            module: &shader_module,
            entry_point: Some(entry_point),
            compilation_options: Default::default(),
            cache: None,
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(ComputeError::PipelineCreation {
                pass: label.to_string(),
                message: error.to_string(),
            });
        }

        self.pipeline = Some(pipeline);
        self.placeholders = placeholders;
        Ok(())
    }
}
