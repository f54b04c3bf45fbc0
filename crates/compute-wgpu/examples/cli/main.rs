//! Compute pass command-line demo
//!
//! Runs a WGSL compute shader over a buffer of consecutive `u32` values and prints the
//! result. The built-in shader multiplies every element by a factor passed in a uniform
//! buffer; a custom shader can be supplied instead as long as it uses the same bindings:
//!
//! - `@group(0) @binding(0) var<storage, read_write> data: array<u32>;`
//! - `@group(1) @binding(0) var<uniform> params: vec4<u32>;` with the factor in `x`
//!
//! # Usage
//! ```bash
//! cargo run --example cli -- --elements 1024 --factor 3 --resize 4096
//! ```

use clap::Parser;
use compute_wgpu::{BufferMode, ComputeBuffer, ComputePass, ComputePassDescriptor, ResourceId, Workgroups, validate_compute_shader};
use std::path::PathBuf;

const SCALE_SHADER: &str = r#"
@group(0) @binding(0) var<storage, read_write> data: array<u32>;
@group(1) @binding(0) var<uniform> params: vec4<u32>;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    if (id.x < arrayLength(&data)) {
        data[id.x] = data[id.x] * params.x;
    }
}
"#;

/// Command-line arguments for the compute demo
#[derive(Parser)]
#[command(version, about = "Runs a compute shader over a buffer of u32 values")]
struct Args {
    /// Number of elements in the data buffer
    #[arg(long, short, default_value = "256")]
    elements: u32,

    /// Multiplier written to the uniform buffer
    #[arg(long, short, default_value = "2")]
    factor: u32,

    /// WGSL shader file replacing the built-in one
    #[arg(long, short)]
    shader: Option<PathBuf>,

    /// Compute entry point
    #[arg(long, default_value = "main")]
    entry_point: String,

    /// Element count to resize the data buffer to for a second run
    #[arg(long, short)]
    resize: Option<u32>,

    /// Number of values to print
    #[arg(long, default_value = "8")]
    show: usize,

    /// Log pipeline builds, patches and readbacks
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { tracing::Level::DEBUG } else { tracing::Level::WARN })
        .init();

    let shader = match &args.shader {
        Some(path) => std::fs::read_to_string(path)?,
        None => SCALE_SHADER.to_string(),
    };
    let entry = validate_compute_shader(&shader, &args.entry_point)?;
    println!("Entry point '{}' with workgroup size {:?}", entry.name, entry.workgroup_size);

    println!("Initializing GPU...");
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    });
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))?;
    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("compute-cli"),
        ..Default::default()
    }))?;
    println!("Using adapter: {}", adapter.get_info().name);

    let descriptor = ComputePassDescriptor::new("compute-cli")
        .with_shader(shader)
        .with_entry_point(&args.entry_point);
    let mut pass = ComputePass::new(device, queue, descriptor);

    let values = (0..args.elements).collect::<Vec<_>>();
    let data = pass.add_buffer(
        ComputeBuffer::new("data", BufferMode::ReadWriteMappableStorage)
            .with_slot(0, 0)
            .with_payload(values),
    )?;
    pass.add_buffer(
        ComputeBuffer::new("params", BufferMode::Uniform)
            .with_slot(1, 0)
            .with_payload(&[args.factor, 0, 0, 0][..]),
    )?;

    run(&mut pass, data, args.elements, entry.workgroup_size[0], args.show)?;

    if let Some(elements) = args.resize {
        println!("Resizing data buffer to {elements} elements");
        pass.recreate_buffer(data, elements as u64 * 4)?;
        pass.write_buffer(data, 0, &(0..elements).collect::<Vec<_>>())?;
        run(&mut pass, data, elements, entry.workgroup_size[0], args.show)?;
    }

    let stats = pass.stats();
    println!(
        "Pipeline builds: {}, dispatches: {}, bind group patches: {}",
        stats.pipeline_builds, stats.dispatches, stats.bind_group_patches
    );
    Ok(())
}

/// Dispatches enough workgroups to cover `elements` and prints the first results
fn run(pass: &mut ComputePass, data: ResourceId, elements: u32, workgroup_size: u32, show: usize) -> Result<(), Box<dyn std::error::Error>> {
    let Workgroups { x, y, z } = Workgroups::covering(elements, workgroup_size);
    pass.set_workgroups(x, y, z);
    pass.dispatch()?;

    let handle = pass.read_back_with(data, |bytes| println!("Read back {} bytes", bytes.len()))?;
    pass.update()?;
    let bytes = pollster::block_on(handle.receive())?;

    let results = bytemuck::pod_collect_to_vec::<u8, u32>(&bytes[..]);
    let shown = results.iter().take(show).map(u32::to_string).collect::<Vec<_>>().join(", ");
    println!("{} values: [{}{}]", results.len(), shown, if results.len() > show { ", ..." } else { "" });
    Ok(())
}
