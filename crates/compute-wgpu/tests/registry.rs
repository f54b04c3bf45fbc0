mod common;

use compute_wgpu::{BindSlot, BufferMode, ComputeBuffer, ComputeError, ComputeTexture, ComputeTextureView, TextureMode};

#[test]
fn test_duplicate_slot_leaves_registry_unchanged() {
    let Some(mut pass) = common::pass("registry", common::OFFSET_SHADER) else {
        return;
    };

    let input = pass
        .add_buffer(ComputeBuffer::new("input", BufferMode::ReadOnlyStorage).with_slot(0, 0).with_byte_size(64))
        .unwrap();
    let count = pass.resource_count();
    let order = pass.group_order().to_vec();

    let error = pass
        .add_buffer(ComputeBuffer::new("other", BufferMode::ReadWriteStorage).with_slot(0, 0).with_byte_size(64))
        .unwrap_err();
    assert_eq!(
        error,
        ComputeError::DuplicateBinding {
            label: "other".into(),
            slot: BindSlot::new(0, 0),
            existing: "input".into(),
        }
    );
    assert_eq!(pass.resource_count(), count);
    assert_eq!(pass.group_order(), &order[..]);
    assert_eq!(pass.bound_slots(input), vec![BindSlot::new(0, 0)]);

    // A texture view cannot take the slot either
    let texture = ComputeTexture::new("image", TextureMode::Sampled, wgpu::TextureFormat::Rgba8Unorm, 4, 4).with_slot(0, 0);
    assert!(matches!(pass.add_texture(texture), Err(ComputeError::DuplicateBinding { .. })));
    assert_eq!(pass.resource_count(), count);
}

#[test]
fn test_rejected_descriptions() {
    let Some(mut pass) = common::pass("rejections", common::IDENTITY_SHADER) else {
        return;
    };

    let unset_group = ComputeBuffer::new("no group", BufferMode::Uniform).with_byte_size(16);
    assert_eq!(pass.add_buffer(unset_group), Err(ComputeError::UnsetGroup { label: "no group".into() }));

    let zero = ComputeBuffer::new("empty", BufferMode::ReadWriteStorage).with_slot(0, 0);
    assert_eq!(pass.add_buffer(zero), Err(ComputeError::ZeroByteSize { label: "empty".into() }));

    let oversized = ComputeBuffer::new("small", BufferMode::ReadWriteStorage)
        .with_slot(0, 0)
        .with_byte_size(4)
        .with_payload(&[1u32, 2][..]);
    assert!(matches!(pass.add_buffer(oversized), Err(ComputeError::PayloadTooLarge { payload: 8, capacity: 4, .. })));

    let flat = ComputeTexture::new("flat", TextureMode::Sampled, wgpu::TextureFormat::Rgba8Unorm, 0, 4).with_slot(0, 0);
    assert_eq!(pass.add_texture(flat), Err(ComputeError::ZeroExtent { label: "flat".into() }));

    assert!(pass.is_empty());
    assert_eq!(pass.group_count(), 0);
}

#[test]
fn test_lookups_and_writes() {
    let Some(mut pass) = common::pass("lookups", common::IDENTITY_SHADER) else {
        return;
    };

    let buffer = pass.add_buffer(common::data_buffer(&[0; 8])).unwrap();
    let texture = pass
        .add_texture(ComputeTexture::new("image", TextureMode::Sampled, wgpu::TextureFormat::R32Float, 8, 2).with_slot(1, 0))
        .unwrap();

    assert_eq!(pass.resource_label(buffer).unwrap(), "data");
    assert_eq!(pass.buffer_byte_size(buffer).unwrap(), 32);
    assert_eq!(pass.texture_extent(texture).unwrap().width, 8);
    assert!(matches!(pass.buffer_byte_size(texture), Err(ComputeError::WrongResourceKind { expected: "buffer", .. })));
    assert!(matches!(pass.texture_extent(buffer), Err(ComputeError::WrongResourceKind { expected: "texture", .. })));

    pass.write_buffer(buffer, 16, &[7u32, 8, 9, 10]).unwrap();
    assert!(matches!(pass.write_buffer(buffer, 20, &[0u32; 4]), Err(ComputeError::OutOfBounds { .. })));
    assert!(matches!(pass.write_buffer(buffer, 2, &[0u8; 2]), Err(ComputeError::UnalignedWrite { offset: 2, len: 2, .. })));
    assert_eq!(common::read_u32(&pass, buffer), vec![0, 0, 0, 0, 7, 8, 9, 10]);

    pass.write_texture(texture, &[0.5f32; 16]).unwrap();
    assert!(matches!(pass.write_texture(texture, &[0.5f32; 17]), Err(ComputeError::PayloadSizeMismatch { payload: 68, expected: 64, .. })));
}

#[test]
fn test_partial_word_write_leaves_neighbours_intact() {
    let Some(mut pass) = common::pass("partial", common::IDENTITY_SHADER) else {
        return;
    };

    let id = pass.add_buffer(common::data_buffer(&[0xAABBCCDD, 0x11223344])).unwrap();
    assert_eq!(
        pass.write_buffer(id, 0, &[0x7Fu8]),
        Err(ComputeError::UnalignedWrite {
            label: "data".into(),
            offset: 0,
            len: 1,
        })
    );
    assert!(matches!(pass.write_buffer(id, 4, &[0u8; 3]), Err(ComputeError::UnalignedWrite { len: 3, .. })));
    assert_eq!(common::read_u32(&pass, id), vec![0xAABBCCDD, 0x11223344]);

    pass.write_buffer(id, 4, &[0x7Fu8, 0, 0, 0]).unwrap();
    assert_eq!(common::read_u32(&pass, id), vec![0xAABBCCDD, 0x7F]);
}

#[test]
fn test_texel_data_must_cover_the_texture() {
    let Some(mut pass) = common::pass("texels", common::IDENTITY_SHADER) else {
        return;
    };

    let short = ComputeTexture::new("short", TextureMode::Sampled, wgpu::TextureFormat::R32Uint, 4, 4).with_payload(&[1u32, 2][..]);
    assert_eq!(
        pass.add_texture(short),
        Err(ComputeError::PayloadSizeMismatch {
            label: "short".into(),
            payload: 8,
            expected: 64,
        })
    );
    assert!(pass.is_empty());

    let texture = pass
        .add_texture(ComputeTexture::new("image", TextureMode::Sampled, wgpu::TextureFormat::R32Uint, 4, 4))
        .unwrap();
    assert!(matches!(pass.write_texture(texture, &[1u32, 2]), Err(ComputeError::PayloadSizeMismatch { payload: 8, expected: 64, .. })));

    let texels = (0..16u32).collect::<Vec<_>>();
    pass.write_texture(texture, &texels).unwrap();
    let handle = pass.read_back(texture).unwrap();
    pass.update().unwrap();
    let bytes = pollster::block_on(handle.receive()).unwrap();
    assert_eq!(bytemuck::pod_collect_to_vec::<u8, u32>(&bytes[..]), texels);
}

#[test]
fn test_remove_resource_drops_bindings() {
    let Some(mut pass) = common::pass("removal", common::IDENTITY_SHADER) else {
        return;
    };

    let first = pass.add_buffer(common::data_buffer(&[0; 4])).unwrap();
    let second = pass
        .add_buffer(ComputeBuffer::new("params", BufferMode::Uniform).with_slot(3, 0).with_byte_size(16))
        .unwrap();
    assert_eq!(pass.group_order(), &[0, 3]);

    pass.remove_resource(second).unwrap();
    assert_eq!(pass.group_order(), &[0]);
    assert_eq!(pass.resource_count(), 1);
    assert!(matches!(pass.remove_resource(second), Err(ComputeError::UnknownResource { .. })));

    // Ids are never reused
    let third = pass
        .add_buffer(ComputeBuffer::new("params", BufferMode::Uniform).with_slot(3, 0).with_byte_size(16))
        .unwrap();
    assert_ne!(third, second);
    assert_ne!(third, first);
}

#[test]
fn test_texture_views() {
    let Some(mut pass) = common::pass("views", common::IDENTITY_SHADER) else {
        return;
    };

    let texture = ComputeTexture::new("pyramid", TextureMode::ReadWriteStorage, wgpu::TextureFormat::R32Float, 16, 16).with_mip_level_count(3);
    let id = pass.add_texture(texture).unwrap();
    assert!(pass.bound_slots(id).is_empty());

    pass.add_texture_view(id, ComputeTextureView::new("level 1", TextureMode::WriteOnlyStorage).with_slot(0, 1).with_mip_range(1, 1))
        .unwrap();
    pass.add_texture_view(id, ComputeTextureView::new("all levels", TextureMode::ReadOnlyStorage).with_slot(1, 0))
        .unwrap();
    assert_eq!(pass.bound_slots(id), vec![BindSlot::new(0, 1), BindSlot::new(1, 0)]);

    let beyond = ComputeTextureView::new("level 5", TextureMode::WriteOnlyStorage).with_slot(0, 2).with_mip_range(5, 1);
    assert!(matches!(pass.add_texture_view(id, beyond), Err(ComputeError::InvalidMipRange { .. })));

    let wide = ComputeTextureView::new("two levels", TextureMode::WriteOnlyStorage).with_slot(0, 3).with_mip_range(0, 2);
    assert!(matches!(pass.add_texture_view(id, wide), Err(ComputeError::InvalidMipRange { .. })));

    let sampled = ComputeTextureView::new("sampled", TextureMode::Sampled).with_slot(0, 4);
    assert!(matches!(pass.add_texture_view(id, sampled), Err(ComputeError::IncompatibleTextureUsage { .. })));

    pass.remove_resource(id).unwrap();
    assert_eq!(pass.group_count(), 0);
}
