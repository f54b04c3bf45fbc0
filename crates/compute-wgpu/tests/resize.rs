mod common;

use compute_wgpu::{BindSlot, BufferMode, ComputeBuffer, ComputeError, ComputePass, ComputeTexture, ComputeTextureView, PipelineState, ResourceId, TextureMode};

#[test]
fn test_recreate_buffer_keeps_slot_and_pipeline() {
    let Some(mut pass) = common::pass("resize", common::DOUBLE_SHADER) else {
        return;
    };

    let id = pass.add_buffer(common::data_buffer(&[1, 2, 3, 4])).unwrap();
    pass.dispatch().unwrap();
    assert_eq!(pass.state(), PipelineState::Built);

    pass.recreate_buffer(id, 128 * 4).unwrap();
    assert_eq!(pass.state(), PipelineState::Invalidated);
    assert_eq!(pass.buffer_byte_size(id).unwrap(), 512);
    assert_eq!(pass.bound_slots(id), vec![BindSlot::new(0, 0)]);
    assert_eq!(pass.stats().bind_group_patches, 1);

    // Distinguishable data through the new allocation
    let values = (100..228u32).collect::<Vec<_>>();
    pass.write_buffer(id, 0, &values).unwrap();
    pass.set_workgroups(2, 1, 1);
    pass.dispatch().unwrap();

    assert_eq!(pass.state(), PipelineState::Built);
    assert_eq!(pass.stats().pipeline_builds, 1);
    assert_eq!(common::read_u32(&pass, id), values.iter().map(|v| v * 2).collect::<Vec<_>>());
}

#[test]
fn test_recreate_before_first_dispatch() {
    let Some(mut pass) = common::pass("early resize", common::IDENTITY_SHADER) else {
        return;
    };

    let id = pass.add_buffer(common::data_buffer(&[9; 4])).unwrap();
    pass.recreate_buffer(id, 32).unwrap();
    assert_eq!(pass.state(), PipelineState::Uninitialized);
    assert_eq!(pass.stats().bind_group_patches, 0);

    pass.write_buffer(id, 0, &[1u32, 2, 3, 4, 5, 6, 7, 8]).unwrap();
    pass.dispatch().unwrap();
    assert_eq!(common::read_u32(&pass, id), vec![1, 2, 3, 4, 5, 6, 7, 8]);
}

#[test]
fn test_recreate_rejections() {
    let Some(mut pass) = common::pass("bad resize", common::IDENTITY_SHADER) else {
        return;
    };

    let id = pass.add_buffer(common::data_buffer(&[1, 2])).unwrap();
    assert_eq!(pass.recreate_buffer(id, 0), Err(ComputeError::ZeroByteSize { label: "data".into() }));
    let removed = removed_id(&mut pass);
    assert!(matches!(pass.recreate_buffer(removed, 16), Err(ComputeError::UnknownResource { .. })));
    assert_eq!(pass.buffer_byte_size(id).unwrap(), 8);
}

/// Id of a resource that was removed again
fn removed_id(pass: &mut ComputePass) -> ResourceId {
    let id = pass
        .add_buffer(ComputeBuffer::new("temporary", BufferMode::Uniform).with_slot(5, 0).with_byte_size(16))
        .unwrap();
    pass.remove_resource(id).unwrap();
    id
}

#[test]
fn test_recreate_texture_patches_every_view() {
    const SHADER: &str = r#"
        @group(0) @binding(0) var src: texture_2d<f32>;
        @group(1) @binding(0) var dst: texture_storage_2d<rgba8unorm, write>;

        @compute @workgroup_size(8, 8)
        fn main(@builtin(global_invocation_id) id: vec3<u32>) {
            let size = textureDimensions(dst);
            if (id.x < size.x && id.y < size.y) {
                textureStore(dst, id.xy, textureLoad(src, id.xy, 0));
            }
        }
    "#;

    let Some(mut pass) = common::pass("texture resize", SHADER) else {
        return;
    };

    let source = pass
        .add_texture(ComputeTexture::new("source", TextureMode::Sampled, wgpu::TextureFormat::Rgba8Unorm, 8, 8).with_slot(0, 0))
        .unwrap();
    let target = pass
        .add_texture(ComputeTexture::new("target", TextureMode::WriteOnlyStorage, wgpu::TextureFormat::Rgba8Unorm, 8, 8))
        .unwrap();
    pass.add_texture_view(target, ComputeTextureView::new("target view", TextureMode::WriteOnlyStorage).with_slot(1, 0))
        .unwrap();
    pass.dispatch().unwrap();

    let extent = wgpu::Extent3d {
        width: 16,
        height: 4,
        depth_or_array_layers: 1,
    };
    pass.recreate_texture(source, extent).unwrap();
    pass.recreate_texture(target, extent).unwrap();
    assert_eq!(pass.texture_extent(target).unwrap(), extent);
    assert_eq!(pass.state(), PipelineState::Invalidated);
    assert_eq!(pass.stats().bind_group_patches, 2);

    let texels = (0..64u32).map(|i| u32::from_le_bytes([i as u8, 1, 2, 255])).collect::<Vec<_>>();
    pass.write_texture(source, &texels).unwrap();
    pass.set_workgroups(2, 1, 1);
    pass.dispatch().unwrap();
    assert_eq!(pass.stats().pipeline_builds, 1);

    let handle = pass.read_back(target).unwrap();
    pass.update().unwrap();
    let bytes = pollster::block_on(handle.receive()).unwrap();
    assert_eq!(bytemuck::pod_collect_to_vec::<u8, u32>(&bytes[..]), texels);

    let zero = wgpu::Extent3d {
        width: 0,
        height: 4,
        depth_or_array_layers: 1,
    };
    assert_eq!(pass.recreate_texture(target, zero), Err(ComputeError::ZeroExtent { label: "target".into() }));
}

#[test]
fn test_recreate_texture_keeps_binding_type() {
    const SHADER: &str = r#"
        @group(0) @binding(0) var dst: texture_storage_2d<r32float, write>;

        @compute @workgroup_size(8, 8)
        fn main(@builtin(global_invocation_id) id: vec3<u32>) {
            textureStore(dst, id.xy, vec4<f32>(1.0));
        }
    "#;

    let Some(mut pass) = common::pass("texture layers", SHADER) else {
        return;
    };

    let id = pass
        .add_texture(ComputeTexture::new("dst", TextureMode::WriteOnlyStorage, wgpu::TextureFormat::R32Float, 8, 8).with_slot(0, 0))
        .unwrap();
    pass.dispatch().unwrap();

    let layered = wgpu::Extent3d {
        width: 4,
        height: 4,
        depth_or_array_layers: 2,
    };
    assert_eq!(
        pass.recreate_texture(id, layered),
        Err(ComputeError::DimensionChange {
            label: "dst".into(),
            from: wgpu::TextureViewDimension::D2,
            to: wgpu::TextureViewDimension::D2Array,
        })
    );
    assert_eq!(pass.texture_extent(id).unwrap().width, 8);
    assert_eq!(pass.state(), PipelineState::Built);
    assert_eq!(pass.stats().bind_group_patches, 0);

    pass.dispatch().unwrap();
    assert_eq!(pass.stats().pipeline_builds, 1);
}

#[test]
fn test_recreate_texture_keeps_mip_levels() {
    let Some(mut pass) = common::pass("texture mips", common::IDENTITY_SHADER) else {
        return;
    };

    let id = pass
        .add_texture(ComputeTexture::new("pyramid", TextureMode::Sampled, wgpu::TextureFormat::Rgba8Unorm, 16, 16).with_mip_level_count(5))
        .unwrap();

    let small = wgpu::Extent3d {
        width: 4,
        height: 4,
        depth_or_array_layers: 1,
    };
    assert_eq!(
        pass.recreate_texture(id, small),
        Err(ComputeError::TooManyMipLevels {
            label: "pyramid".into(),
            requested: 5,
            max: 3,
        })
    );
    assert_eq!(pass.texture_extent(id).unwrap().width, 16);

    let large = wgpu::Extent3d {
        width: 32,
        height: 8,
        depth_or_array_layers: 1,
    };
    pass.recreate_texture(id, large).unwrap();
    assert_eq!(pass.texture_extent(id).unwrap(), large);
}
