mod common;

use std::sync::Arc;
use parking_lot::Mutex;
use rstest::rstest;
use zenith_rendergraph::{ColorAttachment, DepthStencilAttachment, PoolStats, RenderGraphBuilder, RenderGraphPools};
use zenith_rhi::{
    vk, Buffer, BufferDesc, BufferRange, BufferState, DescriptorResource, HeadlessDevice,
    PipelineStage, PipelineStages, RecordedCommand, RecordingEncoder, RenderDevice, RootSignature, Texture,
    TextureDesc, TextureState, TextureSubresource,
};
use common::*;

fn fragment_stages() -> PipelineStages {
    PipelineStages::from(PipelineStage::VertexShader) | PipelineStage::FragmentShader
}

#[test]
fn color_write_then_sampled_read() {
    init_logger();
    let device = HeadlessDevice::new();
    let mut encoder = RecordingEncoder::new();
    let mut pools = pools(2);
    let blur = root_signature(&device, "blur", &[&[sampled(0)]]);

    let seen = Arc::new(Mutex::new(None));
    let mut builder = RenderGraphBuilder::new();
    let x = builder.create_texture("X").extent(64, 64, 1).allow_render_target().finish();
    let a = builder
        .create_render_pass("A")
        .color(&x, ColorAttachment::default())
        .execute(|ctx| ctx.encoder().draw(3, 1, 0, 0))
        .finish();
    let b = builder
        .create_compute_pass("B")
        .root_signature(blur.clone())
        .read(&x, (0, 0))
        .execute({
            let seen = seen.clone();
            move |ctx| {
                *seen.lock() = ctx.texture(&x).map(Texture::handle);
                ctx.bind_descriptor_sets();
                ctx.encoder().dispatch(8, 8, 1);
            }
        })
        .finish();

    let graph = builder.graph();
    assert_eq!(graph.previous_state(&x, a, TextureSubresource::WHOLE, false), TextureState::Undefined);
    assert_eq!(graph.previous_state(&x, b, TextureSubresource::WHOLE, false), TextureState::Color);
    assert!(!graph.is_last_used_pass(&x, a, false));
    assert!(graph.is_last_used_pass(&x, b, false));

    builder.execute(&device, &mut encoder, &mut pools, 0).unwrap();

    let commands = encoder.commands();
    assert!(matches!(commands[0], RecordedCommand::PipelineBarrier { .. }));
    assert!(matches!(commands[1], RecordedCommand::BeginRendering(_)));
    assert!(matches!(commands[2], RecordedCommand::Draw { vertex_count: 3, instance_count: 1 }));
    assert!(matches!(commands[3], RecordedCommand::EndRendering));
    assert!(matches!(commands[4], RecordedCommand::PipelineBarrier { .. }));
    assert!(matches!(commands[5], RecordedCommand::BindDescriptorSets { first_set: 0, .. }));
    assert!(matches!(commands[6], RecordedCommand::Dispatch { x: 8, y: 8, z: 1 }));
    assert_eq!(commands.len(), 7);

    let barriers = texture_barriers(commands);
    assert_eq!(barriers.len(), 2);
    assert_eq!((barriers[0].src_state, barriers[0].dst_state), (TextureState::Undefined, TextureState::Color));
    assert_eq!(barriers[0].src_stage, PipelineStages::from(PipelineStage::AllCommands));
    assert_eq!((barriers[1].src_state, barriers[1].dst_state), (TextureState::Color, TextureState::Sampled));
    assert_eq!(barriers[1].src_stage, fragment_stages());
    assert_eq!(barriers[1].dst_stage, PipelineStages::from(PipelineStage::ComputeShader));

    assert_eq!(*seen.lock(), Some(barriers[0].texture));

    let writes = device.descriptor_writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].1.descriptor_type, vk::DescriptorType::SAMPLED_IMAGE);
    assert!(matches!(writes[0].1.resource, DescriptorResource::SampledTexture { .. }));

    let stats = pools.texture_stats();
    assert_eq!((stats.created, stats.released, stats.available), (1, 1, 1));
    // The render target view is handed back after A and picked up again by B.
    assert_eq!(device.stats().texture_views, 1);
    assert_eq!(pools.view_stats().reused, 1);
}

#[test]
fn final_writer_releases_buffer() {
    init_logger();
    let device = HeadlessDevice::new();
    let mut encoder = RecordingEncoder::new();
    let mut pools = pools(1);
    let cull = root_signature(&device, "cull", &[&[storage_buffer(0)]]);

    let mut builder = RenderGraphBuilder::new();
    let y = builder.create_buffer("Y").size(1024).allow_read_write().finish();
    let a = builder
        .create_compute_pass("A")
        .root_signature(cull)
        .read_write(&y, (0, 0))
        .finish();

    assert!(builder.graph().is_last_used_pass(&y, a, false));
    assert_eq!(builder.graph().previous_state(&y, a, BufferRange::WHOLE, false), BufferState::Undefined);

    builder.execute(&device, &mut encoder, &mut pools, 0).unwrap();

    let barriers = buffer_barriers(encoder.commands());
    assert_eq!(barriers.len(), 1);
    assert_eq!(barriers[0].dst_state, BufferState::Storage);

    let stats = pools.buffer_stats();
    assert_eq!((stats.created, stats.released, stats.available), (1, 1, 1));
    assert_eq!(device.stats().buffers, 1);
}

#[test]
fn missing_name_warns_once() {
    init_logger();
    let _ = take_warnings();

    let mut builder = RenderGraphBuilder::new();
    let missing = builder.get_texture("Missing");
    assert!(!missing.valid());

    let warnings = take_warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("Missing"));

    let pass = builder
        .create_compute_pass("consumer")
        .access(&missing, TextureState::Sampled)
        .finish();
    assert_eq!(take_warnings().len(), 1);
    assert_eq!(builder.graph().num_edges(), 0);

    let device = HeadlessDevice::new();
    let mut encoder = RecordingEncoder::new();
    let mut pools = RenderGraphPools::default();
    assert!(builder.graph().pass(pass).is_some());
    builder.execute(&device, &mut encoder, &mut pools, 0).unwrap();
    assert!(encoder.commands().is_empty());
}

#[test]
fn duplicate_reads_warn_and_keep_first() {
    init_logger();
    let _ = take_warnings();

    let mut builder = RenderGraphBuilder::new();
    let shadow = builder.create_texture("shadow").finish();
    let _ = builder
        .create_compute_pass("lighting")
        .access(&shadow, TextureState::Sampled)
        .access(&shadow, TextureState::General)
        .finish();

    let warnings = take_warnings();
    assert_eq!(warnings, vec!["Try to read resource[shadow] multiple time!".to_owned()]);
    assert_eq!(builder.graph().num_edges(), 1);
}

#[test]
fn later_reader_sees_output_state() {
    init_logger();
    let device = HeadlessDevice::new();
    let mut encoder = RecordingEncoder::new();
    let mut pools = pools(1);
    let filter = root_signature(&device, "filter", &[&[sampled(0)]]);

    let mut builder = RenderGraphBuilder::new();
    let z = builder.create_texture("Z").extent(32, 32, 1).allow_read_write().finish();
    let c = builder
        .create_compute_pass("C")
        .root_signature(filter.clone())
        .read(&z, (0, 0))
        .output_read_write(&z, TextureState::General)
        .finish();
    let d = builder
        .create_compute_pass("D")
        .root_signature(filter)
        .read(&z, (0, 0))
        .finish();

    let graph = builder.graph();
    assert_eq!(graph.previous_state(&z, c, TextureSubresource::WHOLE, true), TextureState::Sampled);
    assert_eq!(graph.previous_state(&z, d, TextureSubresource::WHOLE, false), TextureState::General);
    assert!(!graph.is_last_used_pass(&z, c, true));

    builder.execute(&device, &mut encoder, &mut pools, 0).unwrap();

    let transitions: Vec<_> = texture_barriers(encoder.commands())
        .iter()
        .map(|barrier| (barrier.src_state, barrier.dst_state))
        .collect();
    assert_eq!(
        transitions,
        vec![
            (TextureState::Undefined, TextureState::Sampled),
            (TextureState::Sampled, TextureState::General),
            (TextureState::General, TextureState::Sampled),
        ]
    );
    assert_eq!(pools.texture_stats().released, 1);
}

#[rstest]
#[case(TextureState::Storage, TextureState::Storage, 2)]
#[case(TextureState::Sampled, TextureState::Sampled, 1)]
#[case(TextureState::General, TextureState::Storage, 2)]
#[case(TextureState::Storage, TextureState::Sampled, 2)]
#[case(TextureState::TransferDst, TextureState::TransferDst, 1)]
fn barrier_needed_between_accesses(
    #[case] first: TextureState,
    #[case] second: TextureState,
    #[case] expected: usize,
) {
    init_logger();
    let device = HeadlessDevice::new();
    let mut encoder = RecordingEncoder::new();
    let mut pools = pools(1);

    let mut builder = RenderGraphBuilder::new();
    let t = builder.create_texture("t").extent(16, 16, 1).finish();
    let _ = builder.create_compute_pass("first").output_read_write(&t, first).finish();
    let _ = builder.create_compute_pass("second").access(&t, second).finish();
    builder.execute(&device, &mut encoder, &mut pools, 0).unwrap();

    assert_eq!(texture_barriers(encoder.commands()).len(), expected);
}

#[test]
fn transient_textures_alias_within_frame() {
    init_logger();
    let device = HeadlessDevice::new();
    let mut encoder = RecordingEncoder::new();
    let mut pools = pools(1);

    let mut builder = RenderGraphBuilder::new();
    let first = builder.create_texture("first").extent(128, 128, 1).allow_read_write().finish();
    let second = builder.create_texture("second").extent(128, 128, 1).allow_read_write().finish();
    let _ = builder.create_compute_pass("a").output_read_write(&first, TextureState::Storage).finish();
    let _ = builder.create_compute_pass("b").output_read_write(&second, TextureState::Storage).finish();
    builder.execute(&device, &mut encoder, &mut pools, 0).unwrap();

    assert_eq!(device.stats().textures, 1);
    let stats = pools.texture_stats();
    assert_eq!((stats.created, stats.reused, stats.released), (1, 1, 2));

    // The second resource inherits the released state of the first one.
    let barriers = texture_barriers(encoder.commands());
    assert_eq!(barriers[1].src_state, TextureState::Storage);
    assert_eq!(barriers[0].texture, barriers[1].texture);
}

#[test]
fn imported_texture_is_never_released() {
    init_logger();
    let device = HeadlessDevice::new();
    let mut encoder = RecordingEncoder::new();
    let mut pools = pools(1);
    let back_buffer = Arc::new(
        device
            .create_texture(&TextureDesc::new_color_attachment(320, 180, vk::Format::B8G8R8A8_UNORM))
            .unwrap(),
    );

    for frame in 0..2 {
        let mut builder = RenderGraphBuilder::new();
        let target = builder
            .create_texture("back_buffer")
            .import(back_buffer.clone(), TextureState::Present)
            .finish();
        let _ = builder
            .create_render_pass("tonemap")
            .color(&target, ColorAttachment::load())
            .finish();
        let _ = builder.create_present_pass("present").present(&target).finish();
        builder.execute(&device, &mut encoder, &mut pools, frame).unwrap();
    }

    let barriers = texture_barriers(encoder.commands());
    assert_eq!(barriers.len(), 4);
    for pair in barriers.chunks(2) {
        assert_eq!((pair[0].src_state, pair[0].dst_state), (TextureState::Present, TextureState::Color));
        assert!(!pair[0].discard);
        assert_eq!((pair[1].src_state, pair[1].dst_state), (TextureState::Color, TextureState::Present));
        assert_eq!(pair[1].dst_stage, PipelineStages::from(PipelineStage::BottomOfPipe));
    }

    assert_eq!(pools.texture_stats(), Default::default());
    assert_eq!(Arc::strong_count(&back_buffer), 1);
    assert_eq!(device.stats().textures, 1);
}

fn lighting_signature(device: &HeadlessDevice) -> Arc<RootSignature> {
    root_signature(device, "lighting", &[&[sampled(0), storage_buffer(1)], &[storage_image(0)]])
}

fn demo_frame(
    device: &HeadlessDevice,
    pools: &mut RenderGraphPools,
    lighting: &Arc<RootSignature>,
    back_buffer: &Arc<Texture>,
    frame: u64,
) -> String {
    let mut encoder = RecordingEncoder::new();

    let mut builder = RenderGraphBuilder::new();
    let shadow = builder
        .create_texture("shadow")
        .extent(512, 512, 1)
        .format(vk::Format::D32_SFLOAT)
        .allow_render_target()
        .finish();
    let lights = builder.create_buffer("lights").size(4096).allow_read_write().finish();
    let hdr = builder
        .create_texture("hdr")
        .extent(320, 180, 1)
        .format(vk::Format::R16G16B16A16_SFLOAT)
        .allow_read_write()
        .finish();
    let target = builder
        .create_texture("back_buffer")
        .import(back_buffer.clone(), TextureState::Present)
        .finish();

    let _ = builder
        .create_render_pass("shadow")
        .depth_stencil(&shadow, DepthStencilAttachment::default())
        .execute(|ctx| ctx.encoder().draw(36, 4, 0, 0))
        .finish();
    let _ = builder
        .create_compute_pass("lighting")
        .root_signature(lighting.clone())
        .read(&shadow, (0, 0))
        .read(&lights, (0, 1))
        .read_write(&hdr, (1, 0))
        .execute(|ctx| {
            ctx.bind_descriptor_sets();
            ctx.encoder().dispatch(40, 23, 1);
        })
        .finish();
    let _ = builder
        .create_render_pass("tonemap")
        .color(&target, ColorAttachment::default())
        .access(&hdr, TextureState::Sampled)
        .execute(|ctx| ctx.encoder().draw(3, 1, 0, 0))
        .finish();
    let _ = builder.create_present_pass("present").present(&target).finish();

    builder.execute(device, &mut encoder, pools, frame).unwrap();
    format!("{:?}", encoder.commands())
}

#[test]
fn identical_declarations_record_identical_frames() {
    init_logger();
    let record = || {
        let device = HeadlessDevice::new();
        let back_buffer = Arc::new(device.create_texture(&TextureDesc::new_color_attachment(320, 180, vk::Format::B8G8R8A8_UNORM)).unwrap());
        let lighting = lighting_signature(&device);
        let mut pools = pools(1);
        demo_frame(&device, &mut pools, &lighting, &back_buffer, 0)
    };

    assert_eq!(record(), record());
}

#[test]
fn steady_state_frames_are_identical() {
    init_logger();
    let device = HeadlessDevice::new();
    let back_buffer = Arc::new(device.create_texture(&TextureDesc::new_color_attachment(320, 180, vk::Format::B8G8R8A8_UNORM)).unwrap());
    let lighting = lighting_signature(&device);
    let mut pools = pools(1);

    let cold = demo_frame(&device, &mut pools, &lighting, &back_buffer, 0);
    let created = device.stats();
    let warm = demo_frame(&device, &mut pools, &lighting, &back_buffer, 1);
    let steady = demo_frame(&device, &mut pools, &lighting, &back_buffer, 2);

    // Only the initial states of pooled objects differ after the first frame.
    assert_ne!(cold, warm);
    assert_eq!(warm, steady);
    assert_eq!(device.stats().textures, created.textures);
    assert_eq!(device.stats().texture_views, created.texture_views);
    assert_eq!(device.stats().descriptor_sets, created.descriptor_sets);
    assert_eq!(pools.texture_stats().available, 2);
    assert_eq!(pools.buffer_stats().available, 1);
}

#[test]
fn descriptors_written_per_set_and_bound_in_one_call() {
    init_logger();
    let device = HeadlessDevice::new();
    let mut encoder = RecordingEncoder::new();
    let mut pools = pools(1);
    let signature = root_signature(&device, "gi", &[&[sampled(0), storage_image(1)], &[storage_buffer(0)]]);

    let mut builder = RenderGraphBuilder::new();
    let irradiance = builder.create_texture("irradiance").extent(64, 64, 1).array_layers(4).finish();
    let volume = builder.create_texture("volume").extent(64, 64, 1).allow_read_write().finish();
    let rays = builder.create_buffer("rays").size(2048).allow_read_write().finish();
    let _ = builder
        .create_ray_tracing_pass("gi_trace")
        .root_signature(signature.clone())
        .read_range(&irradiance, (0, 0), TextureSubresource::layer(2))
        .read_write(&volume, (0, 1))
        .read_write(&rays, (1, 0))
        .execute(|ctx| {
            assert_eq!(ctx.descriptor_sets().len(), 2);
            ctx.bind_descriptor_sets();
            ctx.encoder().trace_rays(64, 64, 1);
        })
        .finish();
    builder.execute(&device, &mut encoder, &mut pools, 0).unwrap();

    let writes = device.descriptor_writes();
    assert_eq!(writes.len(), 3);
    assert_eq!(writes[0].0, writes[1].0);
    assert_ne!(writes[0].0, writes[2].0);
    assert!(matches!(writes[1].1.resource, DescriptorResource::StorageTexture { .. }));
    assert!(matches!(writes[2].1.resource, DescriptorResource::StorageBuffer { size: vk::WHOLE_SIZE, .. }));

    let binds: Vec<_> = encoder
        .commands()
        .iter()
        .filter_map(|command| match command {
            RecordedCommand::BindDescriptorSets { bind_point, layout, first_set, sets } => {
                Some((*bind_point, *layout, *first_set, sets.len()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(binds, vec![(vk::PipelineBindPoint::RAY_TRACING_KHR, signature.handle(), 0, 2)]);
    assert_eq!(device.stats().descriptor_sets, 2);

    let barriers = texture_barriers(encoder.commands());
    assert_eq!(barriers[0].subresource, TextureSubresource::layer(2));
    assert_eq!(barriers[0].dst_stage, PipelineStages::from(PipelineStage::RayTracingShader));
}

#[test]
fn externally_bound_set_is_not_written() {
    init_logger();
    let device = HeadlessDevice::new();
    let mut encoder = RecordingEncoder::new();
    let mut pools = pools(1);
    let signature = root_signature(&device, "scene", &[&[storage_buffer(0)], &[sampled(0)]]);
    let scene_set = device.allocate_descriptor_set(&signature.set_layouts()[0]).unwrap();
    let scene_handle = scene_set.handle();

    let mut builder = RenderGraphBuilder::new();
    let instances = builder.create_buffer("instances").size(256).finish();
    let albedo = builder.create_texture("albedo").extent(8, 8, 1).finish();
    let _ = builder
        .create_compute_pass("shade")
        .root_signature(signature)
        .descriptor_set(0, scene_set)
        .read(&instances, (0, 0))
        .read(&albedo, (1, 0))
        .execute(move |ctx| {
            assert_eq!(ctx.descriptor_set(0), Some(scene_handle));
            assert!(ctx.descriptor_set(1).is_some());
            ctx.bind_descriptor_sets();
        })
        .finish();
    builder.execute(&device, &mut encoder, &mut pools, 0).unwrap();

    let writes = device.descriptor_writes();
    assert_eq!(writes.len(), 1);
    assert_ne!(writes[0].0, scene_handle);
    assert!(matches!(writes[0].1.resource, DescriptorResource::SampledTexture { .. }));

    // The buffer is still transitioned even though its set is owned elsewhere.
    assert_eq!(buffer_barriers(encoder.commands()).len(), 1);
}

#[test]
fn invalid_binding_is_skipped_with_warning() {
    init_logger();
    let device = HeadlessDevice::new();
    let mut encoder = RecordingEncoder::new();
    let mut pools = pools(1);
    let signature = root_signature(&device, "post", &[&[sampled(0)]]);

    let mut builder = RenderGraphBuilder::new();
    let color = builder.create_texture("color").extent(8, 8, 1).finish();
    let bloom = builder.create_texture("bloom").extent(8, 8, 1).allow_read_write().finish();
    let _ = builder
        .create_compute_pass("post")
        .root_signature(signature)
        .read(&color, (0, 0))
        .read_write(&bloom, (0, 5))
        .finish();

    let _ = take_warnings();
    builder.execute(&device, &mut encoder, &mut pools, 0).unwrap();

    let warnings = take_warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("bloom"));
    assert_eq!(device.descriptor_writes().len(), 1);
}

#[test]
fn bindings_without_root_signature_fail_the_frame() {
    init_logger();
    let device = HeadlessDevice::new();
    let mut encoder = RecordingEncoder::new();
    let mut pools = pools(1);

    let mut builder = RenderGraphBuilder::new();
    let lights = builder.create_buffer("lights").size(64).finish();
    let shadow = builder.create_texture("shadow").extent(64, 64, 1).finish();
    let _ = builder
        .create_compute_pass("cluster")
        .read(&lights, (0, 0))
        .read(&shadow, (0, 1))
        .finish();

    let err = builder.execute(&device, &mut encoder, &mut pools, 0).unwrap_err();
    assert!(err.to_string().contains("without a root signature"));

    // Everything the abandoned frame held is back in the pools.
    assert_eq!(pools.buffer_stats().available, 1);
    assert_eq!(pools.texture_stats().available, 1);
    assert_eq!(pools.view_stats(), PoolStats { created: 1, reused: 0, released: 1, available: 1 });
    assert!(encoder.commands().is_empty());
}

#[test]
fn allocation_failure_names_the_resource() {
    init_logger();
    let device = HeadlessDevice::new().with_memory_budget(1);
    let mut encoder = RecordingEncoder::new();
    let mut pools = pools(1);

    let mut builder = RenderGraphBuilder::new();
    let depth = builder.create_texture("depth").extent(64, 64, 1).format(vk::Format::D32_SFLOAT).finish();
    let normal = builder.create_texture("normal").extent(64, 64, 1).finish();
    let _ = builder
        .create_compute_pass("ssao")
        .access(&depth, TextureState::Sampled)
        .access(&normal, TextureState::Sampled)
        .finish();

    let err = builder.execute(&device, &mut encoder, &mut pools, 0).unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("texture [normal]"), "{message}");
    assert_eq!(err.root_cause().downcast_ref::<vk::Result>(), Some(&vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
    assert_eq!(pools.texture_stats(), PoolStats { created: 1, reused: 0, released: 1, available: 1 });
}

#[test]
fn render_area_follows_first_attachment() {
    init_logger();
    let device = HeadlessDevice::new();
    let mut encoder = RecordingEncoder::new();
    let mut pools = pools(1);
    let extent = Arc::new(Mutex::new(None));

    let mut builder = RenderGraphBuilder::new();
    let bloom = builder
        .create_texture("bloom")
        .extent(256, 128, 1)
        .mip_levels(4)
        .allow_render_target()
        .finish();
    let depth = builder
        .create_texture("depth")
        .extent(128, 64, 1)
        .format(vk::Format::D32_SFLOAT)
        .allow_render_target()
        .finish();
    let _ = builder
        .create_render_pass("bloom_down1")
        .color_range(&bloom, TextureSubresource::mip(1), ColorAttachment::default())
        .depth_stencil(&depth, DepthStencilAttachment { read_only: true, ..Default::default() })
        .execute({
            let extent = extent.clone();
            move |ctx| *extent.lock() = ctx.render_extent()
        })
        .finish();
    builder.execute(&device, &mut encoder, &mut pools, 0).unwrap();

    let info = encoder
        .commands()
        .iter()
        .find_map(|command| match command {
            RecordedCommand::BeginRendering(info) => Some(info.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!((info.extent.width, info.extent.height), (128, 64));
    assert_eq!(info.layer_count, 1);
    assert_eq!(info.color_attachments.len(), 1);
    assert_eq!(info.color_attachments[0].load_op, vk::AttachmentLoadOp::CLEAR);
    assert_eq!(info.depth_attachment.map(|depth| depth.layout), Some(TextureState::DepthStencilReadOnly.into_image_layout()));

    let recorded: Option<vk::Extent2D> = *extent.lock();
    assert_eq!(recorded.map(|e| (e.width, e.height)), Some((128, 64)));
}

#[test]
fn debug_labels_wrap_each_pass() {
    init_logger();
    let device = HeadlessDevice::new();
    let mut encoder = RecordingEncoder::new();
    let mut pools = labelled_pools();
    let pass_index = Arc::new(Mutex::new(None));

    let mut builder = RenderGraphBuilder::new();
    let history = builder.create_texture("history").extent(16, 16, 1).finish();
    let _ = builder
        .create_compute_pass("taa")
        .access(&history, TextureState::Sampled)
        .pass_index(2, 0, 0)
        .execute({
            let pass_index = pass_index.clone();
            move |ctx| *pass_index.lock() = ctx.pass_index()
        })
        .finish();
    builder.execute(&device, &mut encoder, &mut pools, 0).unwrap();

    let commands = encoder.commands();
    assert!(matches!(commands[0], RecordedCommand::PipelineBarrier { .. }));
    assert!(matches!(&commands[1], RecordedCommand::BeginLabel(name) if name == "taa"));
    assert!(matches!(commands[2], RecordedCommand::EndLabel));
    assert_eq!(*pass_index.lock(), Some([2, 0, 0]));
}

#[test]
fn copy_pass_transitions_both_sides() {
    init_logger();
    let device = HeadlessDevice::new();
    let mut encoder = RecordingEncoder::new();
    let mut pools = pools(1);
    let staging = Arc::new(device.create_buffer(&BufferDesc::new("staging", 512)).unwrap());

    let mut builder = RenderGraphBuilder::new();
    let src = builder.create_buffer("staging").import(staging.clone(), BufferState::HostWrite).finish();
    let dst = builder.create_buffer("vertices").size(512).usage(vk::BufferUsageFlags::VERTEX_BUFFER).finish();
    let _ = builder
        .create_copy_pass("upload")
        .copy_source(&src)
        .copy_destination(&dst)
        .execute(move |ctx| {
            let (Some(src), Some(dst)) = (ctx.buffer(&src).map(Buffer::handle), ctx.buffer(&dst).map(Buffer::handle)) else {
                panic!("copy resources are not resolved");
            };
            ctx.encoder().copy_buffer(src, dst, &[vk::BufferCopy { src_offset: 0, dst_offset: 0, size: 512 }]);
        })
        .finish();
    let _ = builder
        .create_render_pass("draw")
        .access(&dst, BufferState::Vertex)
        .finish();
    builder.execute(&device, &mut encoder, &mut pools, 0).unwrap();

    let transitions: Vec<_> = buffer_barriers(encoder.commands())
        .iter()
        .map(|barrier| (barrier.src_state, barrier.dst_state))
        .collect();
    assert_eq!(
        transitions,
        vec![
            (BufferState::HostWrite, BufferState::TransferSrc),
            (BufferState::Undefined, BufferState::TransferDst),
            (BufferState::TransferDst, BufferState::Vertex),
        ]
    );
    assert!(encoder.commands().iter().any(|command| matches!(command, RecordedCommand::CopyBuffer { .. })));
    assert_eq!(pools.buffer_stats().released, 1);
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(3)]
fn descriptor_sets_recycle_per_frame_slot(#[case] frames_in_flight: u32) {
    init_logger();
    let device = HeadlessDevice::new();
    let mut pools = pools(frames_in_flight);
    let signature = root_signature(&device, "cull", &[&[storage_buffer(0)]]);

    for frame in 0..u64::from(frames_in_flight) * 2 {
        let mut encoder = RecordingEncoder::new();
        let mut builder = RenderGraphBuilder::new();
        let visible = builder.create_buffer("visible").size(128).allow_read_write().finish();
        let _ = builder
            .create_compute_pass("cull")
            .root_signature(signature.clone())
            .read_write(&visible, (0, 0))
            .finish();
        builder.execute(&device, &mut encoder, &mut pools, frame).unwrap();
    }

    assert_eq!(device.stats().descriptor_sets, frames_in_flight);
    assert_eq!(pools.descriptor_set_stats().reused, frames_in_flight);
    assert_eq!(pools.descriptor_set_stats().available, frames_in_flight);
}

#[test]
fn shared_texture_is_written_at_every_binding() {
    init_logger();
    let _ = take_warnings();
    let device = HeadlessDevice::new();
    let mut encoder = RecordingEncoder::new();
    let mut pools = pools(1);
    let composite = root_signature(&device, "composite", &[&[sampled(0), sampled(1).with_count(2)]]);

    let mut builder = RenderGraphBuilder::new();
    let history = builder.create_texture("history").extent(64, 64, 1).finish();
    let _ = builder
        .create_compute_pass("composite")
        .root_signature(composite)
        .read(&history, (0, 0))
        .read(&history, (0, 1, 0))
        .read(&history, (0, 1, 1))
        .finish();
    builder.execute(&device, &mut encoder, &mut pools, 0).unwrap();

    assert!(take_warnings().is_empty());
    let slots: Vec<_> = device
        .descriptor_writes()
        .iter()
        .map(|(_, write)| (write.binding, write.array_index))
        .collect();
    assert_eq!(slots, vec![(0, 0), (1, 0), (1, 1)]);

    let barriers = texture_barriers(encoder.commands());
    assert_eq!(barriers.len(), 1);
    assert_eq!((barriers[0].src_state, barriers[0].dst_state), (TextureState::Undefined, TextureState::Sampled));
}

#[test]
fn read_only_depth_is_sampled_in_its_attachment_layout() {
    init_logger();
    let _ = take_warnings();
    let device = HeadlessDevice::new();
    let mut encoder = RecordingEncoder::new();
    let mut pools = pools(1);
    let decals = root_signature(&device, "decals", &[&[sampled(0)]]);

    let mut builder = RenderGraphBuilder::new();
    let depth = builder
        .create_texture("depth")
        .extent(128, 128, 1)
        .format(vk::Format::D32_SFLOAT)
        .allow_render_target()
        .finish();
    let _ = builder
        .create_render_pass("decals")
        .root_signature(decals)
        .depth_stencil(&depth, DepthStencilAttachment { read_only: true, ..Default::default() })
        .read(&depth, (0, 0))
        .finish();
    builder.execute(&device, &mut encoder, &mut pools, 0).unwrap();

    assert!(take_warnings().is_empty());
    let writes = device.descriptor_writes();
    assert_eq!(writes.len(), 1);
    assert!(matches!(
        writes[0].1.resource,
        DescriptorResource::SampledTexture { layout: vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL, .. }
    ));

    let barriers = texture_barriers(encoder.commands());
    assert_eq!(barriers.len(), 1);
    assert_eq!(barriers[0].dst_state, TextureState::DepthStencilReadOnly);

    let depth_layout = encoder.commands().iter().find_map(|command| match command {
        RecordedCommand::BeginRendering(info) => info.depth_attachment.as_ref().map(|depth| depth.layout),
        _ => None,
    });
    assert_eq!(depth_layout, Some(vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL));
    assert_eq!(pools.texture_stats().available, 1);
}

#[test]
fn buffer_ranges_reach_barriers_and_descriptors() {
    init_logger();
    let device = HeadlessDevice::new();
    let mut encoder = RecordingEncoder::new();
    let mut pools = pools(1);
    let signature = root_signature(&device, "particles", &[&[storage_buffer(0)]]);

    let mut builder = RenderGraphBuilder::new();
    let particles = builder.create_buffer("particles").size(1024).allow_read_write().finish();
    let _ = builder
        .create_compute_pass("simulate")
        .root_signature(signature.clone())
        .read_write(&particles, (0, 0))
        .finish();
    let _ = builder
        .create_compute_pass("emit")
        .root_signature(signature.clone())
        .read_range(&particles, (0, 0), BufferRange::new(256, 64))
        .finish();
    let _ = builder
        .create_compute_pass("sort")
        .root_signature(signature.clone())
        .read_range(&particles, (0, 0), BufferRange::new(0, 128))
        .finish();
    let _ = builder
        .create_compute_pass("draw_args")
        .root_signature(signature)
        .read_range(&particles, (0, 0), BufferRange::new(256, 64))
        .finish();
    builder.execute(&device, &mut encoder, &mut pools, 0).unwrap();

    let barriers = buffer_barriers(encoder.commands());
    let ranges: Vec<_> = barriers
        .iter()
        .map(|barrier| (barrier.src_state, barrier.dst_state, barrier.offset, barrier.size))
        .collect();
    // A partial read never answers for another range, so `sort` still waits on `simulate`.
    assert_eq!(
        ranges,
        vec![
            (BufferState::Undefined, BufferState::Storage, 0, vk::WHOLE_SIZE),
            (BufferState::Storage, BufferState::ShaderRead, 256, 64),
            (BufferState::Storage, BufferState::ShaderRead, 0, 128),
        ]
    );
    assert_eq!(barriers[1].src_stage, PipelineStages::from(PipelineStage::ComputeShader));

    let emit = device.descriptor_writes()[1].1;
    assert!(matches!(emit.resource, DescriptorResource::ReadBuffer { offset: 256, size: 64, .. }));
    let simulate = device.descriptor_writes()[0].1;
    assert!(matches!(simulate.resource, DescriptorResource::StorageBuffer { offset: 0, size: vk::WHOLE_SIZE, .. }));
}

#[test]
fn render_pass_without_attachments_warns() {
    init_logger();
    let _ = take_warnings();
    let device = HeadlessDevice::new();
    let mut encoder = RecordingEncoder::new();
    let mut pools = pools(1);

    let mut builder = RenderGraphBuilder::new();
    let _ = builder
        .create_render_pass("fullscreen")
        .execute(|ctx| ctx.encoder().draw(3, 1, 0, 0))
        .finish();
    builder.execute(&device, &mut encoder, &mut pools, 0).unwrap();

    assert_eq!(
        take_warnings(),
        vec!["Render pass[fullscreen] has no attachment, its render area is empty!".to_owned()]
    );
}
