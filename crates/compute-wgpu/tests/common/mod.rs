//! Shared helpers for GPU integration tests

#![allow(dead_code)]

use compute_wgpu::{BufferMode, ComputeBuffer, ComputePass, ComputePassDescriptor};

/// Copies every element of `data` onto itself
pub const IDENTITY_SHADER: &str = r#"
@group(0) @binding(0) var<storage, read_write> data: array<u32>;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    if (id.x < arrayLength(&data)) {
        data[id.x] = data[id.x];
    }
}
"#;

/// Doubles every element of `data`
pub const DOUBLE_SHADER: &str = r#"
@group(0) @binding(0) var<storage, read_write> data: array<u32>;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    if (id.x < arrayLength(&data)) {
        data[id.x] = data[id.x] * 2u;
    }
}
"#;

/// Adds `offset` to every element of `input` and stores the result in `output`
///
/// Group 1 is left unused on purpose.
pub const OFFSET_SHADER: &str = r#"
@group(0) @binding(0) var<storage, read> input: array<u32>;
@group(0) @binding(1) var<storage, read_write> output: array<u32>;
@group(2) @binding(0) var<uniform> offset: vec4<u32>;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    if (id.x < arrayLength(&output)) {
        output[id.x] = input[id.x] + offset.x;
    }
}
"#;

/// Requests a device, or returns `None` when the machine has no usable adapter
pub fn device() -> Option<(wgpu::Device, wgpu::Queue)> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    let Ok(adapter) = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default())) else {
        eprintln!("no wgpu adapter available, skipping");
        return None;
    };
    pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("compute-wgpu tests"),
        ..Default::default()
    }))
    .ok()
}

/// Creates a pass with the given shader, or `None` without an adapter
pub fn pass(label: &str, shader: &str) -> Option<ComputePass> {
    let (device, queue) = device()?;
    Some(ComputePass::new(device, queue, ComputePassDescriptor::new(label).with_shader(shader)))
}

/// Mappable `array<u32>` buffer at group 0 binding 0 holding `values`
pub fn data_buffer(values: &[u32]) -> ComputeBuffer {
    ComputeBuffer::new("data", BufferMode::ReadWriteMappableStorage).with_slot(0, 0).with_payload(values)
}

/// Reads a buffer back as `u32` values, polling the device until it resolves
pub fn read_u32(pass: &ComputePass, id: compute_wgpu::ResourceId) -> Vec<u32> {
    let handle = pass.read_back(id).unwrap();
    pass.update().unwrap();
    let bytes = pollster::block_on(handle.receive()).unwrap();
    bytemuck::pod_collect_to_vec(&bytes[..])
}
