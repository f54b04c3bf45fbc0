//! WGSL front-end checks
//!
//! Shaders are parsed and validated with `naga` before a module is handed to the device,
//! so a malformed shader or a missing entry point is reported as an error value rather
//! than through the device's uncaptured error handler.
//!
//! The `naga` version matches the one `wgpu` compiles shaders with. Validation assumes
//! every capability; features the device lacks are still caught when the module is
//! created inside an error scope.

/// Compute entry point found in a validated shader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeEntryPoint {
    /// Entry point name
    pub name: String,
    /// `@workgroup_size` declared by the entry point
    pub workgroup_size: [u32; 3],
}

/// Parses and validates WGSL source and looks up a compute entry point
///
/// # Arguments
/// * `source` - WGSL shader source code
/// * `entry_point` - Name of the compute entry point to use
///
/// # Returns
/// The entry point's description, or a human-readable diagnostic
pub fn validate_compute_shader(source: &str, entry_point: &str) -> Result<ComputeEntryPoint, String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|error| error.emit_to_string(source))?;

    let mut validator = naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::all());
    validator.validate(&module).map_err(|error| error.emit_to_string(source))?;

    let entry = module
        .entry_points
        .iter()
        .find(|entry| entry.name == entry_point)
        .ok_or_else(|| format!("entry point '{entry_point}' not found"))?;

    if entry.stage != naga::ShaderStage::Compute {
        return Err(format!("entry point '{entry_point}' is a {:?} entry point, not a compute entry point", entry.stage));
    }

    Ok(ComputeEntryPoint {
        name: entry.name.clone(),
        workgroup_size: entry.workgroup_size,
    })
}
