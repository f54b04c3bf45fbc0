//! Dispatching compute work
//!
//! A dispatch checks the workgroup counts, builds the pipeline if the binding structure
//! or shader changed, records one compute pass and submits it on the pass's queue.

use crate::config::Workgroups;
use crate::error::{ComputeError, Result};
use crate::pass::ComputePass;

/// Rejects workgroup counts with a zero axis
fn check_workgroups(pass: &str, workgroups: Workgroups) -> Result<()> {
    if workgroups.is_empty() {
        return Err(ComputeError::InvalidWorkgroups {
            pass: pass.to_string(),
            x: workgroups.x,
            y: workgroups.y,
            z: workgroups.z,
        });
    }
    Ok(())
}

impl ComputePass {
    /// Sets the number of workgroups launched by each dispatch
    ///
    /// Zero counts are accepted here and rejected by the next dispatch.
    pub fn set_workgroups(&mut self, x: u32, y: u32, z: u32) {
        self.workgroups = Workgroups::new(x, y, z);
    }

    pub fn workgroups(&self) -> Workgroups {
        self.workgroups
    }

    /// Records and submits one dispatch
    ///
    /// # Returns
    /// Index of the submission, usable with `wgpu::PollType::WaitForSubmissionIndex`
    pub fn dispatch(&mut self) -> Result<wgpu::SubmissionIndex> {
        self.gate_workgroups()?;
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(&self.label) });
        self.encode(&mut encoder)?;
        Ok(self.queue.submit(Some(encoder.finish())))
    }

    /// Records one dispatch into an existing encoder without submitting it
    ///
    /// Nothing is recorded when the workgroup counts are invalid or the pipeline cannot be
    /// built.
    pub fn encode(&mut self, encoder: &mut wgpu::CommandEncoder) -> Result<()> {
        self.gate_workgroups()?;

        self.builder
            .ensure_built(&self.device, &mut self.arena, &self.label, self.shader_source.as_deref(), &self.entry_point)
            .inspect_err(|error| tracing::error!(pass = %self.label, %error, "failed to build compute pipeline"))?;

        let Some(pipeline) = self.builder.pipeline() else {
            return Err(ComputeError::PipelineCreation {
                pass: self.label.clone(),
                message: "no pipeline after build".to_string(),
            });
        };

        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(&self.label),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(pipeline);

            for (group, bind_group) in self.arena.bound_groups() {
                compute_pass.set_bind_group(group, bind_group, &[]);
            }
            for (group, bind_group) in self.builder.placeholders() {
                compute_pass.set_bind_group(*group, bind_group, &[]);
            }

            let Workgroups { x, y, z } = self.workgroups;
            compute_pass.dispatch_workgroups(x, y, z);
        }

        self.dispatches += 1;
        tracing::trace!(pass = %self.label, workgroups = ?self.workgroups, "recorded dispatch");
        Ok(())
    }

    fn gate_workgroups(&self) -> Result<()> {
        check_workgroups(&self.label, self.workgroups).inspect_err(|error| tracing::error!(pass = %self.label, %error, "refusing to dispatch"))
    }
}
