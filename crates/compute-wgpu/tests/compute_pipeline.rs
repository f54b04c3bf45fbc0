mod common;

use compute_wgpu::{BindSlot, BufferMode, ComputeBuffer, ComputeError, ComputePassDescriptor, ComputePipeline};

const PRODUCE_SHADER: &str = r#"
@group(0) @binding(0) var<storage, read_write> data: array<u32>;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    if (id.x < arrayLength(&data)) {
        data[id.x] = id.x * 3u;
    }
}
"#;

fn new_pipeline() -> Option<ComputePipeline> {
    let (device, queue) = common::device()?;
    Some(ComputePipeline::new(device, queue))
}

#[test]
fn test_shared_buffer_across_passes() {
    let Some(mut pipeline) = new_pipeline() else {
        return;
    };

    let produce = pipeline.add_pass(ComputePassDescriptor::new("produce").with_shader(PRODUCE_SHADER));
    let double = pipeline.add_pass(ComputePassDescriptor::new("double").with_shader(common::DOUBLE_SHADER));
    assert_eq!(pipeline.pass_count(), 2);

    let data = pipeline
        .pass_mut(produce)
        .unwrap()
        .add_buffer(ComputeBuffer::new("values", BufferMode::ReadWriteMappableStorage).with_slot(0, 0).with_byte_size(64 * 4))
        .unwrap();
    let alias = pipeline.share_buffer((produce, data), double, BindSlot::new(0, 0), BufferMode::ReadWriteStorage).unwrap();

    assert_eq!(pipeline.pass(double).unwrap().resource_label(alias).unwrap(), "values");
    assert_eq!(pipeline.pass(double).unwrap().buffer_byte_size(alias).unwrap(), 256);

    pipeline.dispatch_all().unwrap();

    let producer = pipeline.pass(produce).unwrap();
    assert_eq!(common::read_u32(producer, data), (0..64).map(|i| i * 6).collect::<Vec<_>>());
    assert_eq!(producer.stats().dispatches, 1);
    assert_eq!(pipeline.pass(double).unwrap().stats().dispatches, 1);
}

#[test]
fn test_recreate_propagates_to_aliases() {
    let Some(mut pipeline) = new_pipeline() else {
        return;
    };

    let produce = pipeline.add_pass(ComputePassDescriptor::new("produce").with_shader(PRODUCE_SHADER));
    let double = pipeline.add_pass(ComputePassDescriptor::new("double").with_shader(common::DOUBLE_SHADER));

    let data = pipeline.pass_mut(produce).unwrap().add_buffer(common::data_buffer(&[0; 64])).unwrap();
    let alias = pipeline.share_buffer((produce, data), double, BindSlot::new(0, 0), BufferMode::ReadWriteStorage).unwrap();
    pipeline.dispatch_all().unwrap();

    pipeline.recreate_buffer(produce, data, 128 * 4).unwrap();
    assert_eq!(pipeline.pass(double).unwrap().buffer_byte_size(alias).unwrap(), 512);
    assert_eq!(
        pipeline.pass(produce).unwrap().buffer_handle(data).unwrap(),
        pipeline.pass(double).unwrap().buffer_handle(alias).unwrap()
    );

    for id in [produce, double] {
        pipeline.pass_mut(id).unwrap().set_workgroups(2, 1, 1);
    }
    pipeline.dispatch_all().unwrap();

    let producer = pipeline.pass(produce).unwrap();
    assert_eq!(common::read_u32(producer, data), (0..128).map(|i| i * 6).collect::<Vec<_>>());
    assert_eq!(producer.stats().pipeline_builds, 1);
    assert_eq!(pipeline.pass(double).unwrap().stats().pipeline_builds, 1);
}

#[test]
fn test_sharing_rejections() {
    let Some(mut pipeline) = new_pipeline() else {
        return;
    };

    let first = pipeline.add_pass(ComputePassDescriptor::new("first").with_shader(common::IDENTITY_SHADER));
    let second = pipeline.add_pass(ComputePassDescriptor::new("second").with_shader(common::IDENTITY_SHADER));
    let data = pipeline.pass_mut(first).unwrap().add_buffer(common::data_buffer(&[1, 2, 3, 4])).unwrap();

    let error = pipeline.share_buffer((first, data), second, BindSlot::new(0, 0), BufferMode::Uniform).unwrap_err();
    assert!(matches!(error, ComputeError::IncompatibleUsage { .. }));
    assert!(pipeline.pass(second).unwrap().is_empty());

    // Ids handed out by a pipeline with more passes do not exist here
    let Some(mut other) = new_pipeline() else {
        return;
    };
    let mut foreign = other.add_pass(ComputePassDescriptor::new("a"));
    for label in ["b", "c"] {
        foreign = other.add_pass(ComputePassDescriptor::new(label));
    }
    assert_eq!(foreign.index(), 2);
    assert!(matches!(pipeline.pass(foreign), Err(ComputeError::UnknownPass { index: 2 })));
    assert!(matches!(
        pipeline.share_buffer((first, data), foreign, BindSlot::new(0, 0), BufferMode::ReadWriteStorage),
        Err(ComputeError::UnknownPass { index: 2 })
    ));
}

#[test]
fn test_dispatch_all_stops_on_invalid_pass() {
    let Some(mut pipeline) = new_pipeline() else {
        return;
    };

    let first = pipeline.add_pass(ComputePassDescriptor::new("first").with_shader(common::DOUBLE_SHADER));
    let gated = pipeline.add_pass(ComputePassDescriptor::new("gated").with_shader(common::IDENTITY_SHADER).with_workgroups(0, 1, 1));

    let data = pipeline.pass_mut(first).unwrap().add_buffer(common::data_buffer(&[5, 6])).unwrap();
    pipeline.pass_mut(gated).unwrap().add_buffer(common::data_buffer(&[0; 2])).unwrap();

    assert!(matches!(pipeline.dispatch_all(), Err(ComputeError::InvalidWorkgroups { .. })));
    pipeline.update().unwrap();
    assert_eq!(common::read_u32(pipeline.pass(first).unwrap(), data), vec![5, 6]);
}
