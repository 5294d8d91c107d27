mod passes;

use std::sync::Arc;
use zenith_core::cli::EngineArgs;
use log::info;
use zenith_rendergraph::{RenderGraphBuilder, RenderGraphConfigBuilder, RenderGraphPools};
use zenith_rhi::{vk, BufferDesc, HeadlessDevice, RecordedCommand, RecordingEncoder, RenderDevice, TextureDesc};
use passes::Pipelines;

const BACK_BUFFER_EXTENT: vk::Extent2D = vk::Extent2D { width: 1280, height: 720 };

fn build_frame(
    pipelines: &Pipelines,
    instances: &Arc<zenith_rhi::Buffer>,
    back_buffer: &Arc<zenith_rhi::Texture>,
    first_frame: bool,
) -> RenderGraphBuilder {
    let mut builder = RenderGraphBuilder::new();

    let visible = passes::add_culling_pass(&mut builder, pipelines, instances);
    let shadow_map = passes::add_shadow_pass(&mut builder, &visible);
    let hdr = passes::add_lighting_pass(&mut builder, pipelines, &shadow_map, BACK_BUFFER_EXTENT);
    let bloom = passes::add_bloom_passes(&mut builder, pipelines, &hdr, BACK_BUFFER_EXTENT);
    let output = passes::add_tonemap_pass(&mut builder, pipelines, &hdr, &bloom, back_buffer, first_frame);
    passes::add_present_pass(&mut builder, &output);

    builder
}

fn main() -> anyhow::Result<()> {
    let args = EngineArgs::parse_args();
    zenith_core::log::initialize(args.log_level.into())?;

    let config = RenderGraphConfigBuilder::default()
        .frames_in_flight(args.frames_in_flight)
        .debug_labels(args.debug_labels)
        .build()?;
    let mut pools = RenderGraphPools::new(config);

    let device = HeadlessDevice::new();
    let pipelines = Pipelines::new(&device)?;
    let instances = Arc::new(device.create_buffer(&BufferDesc::storage("scene.instances", 64 * 1024))?);
    let back_buffer = Arc::new(device.create_texture(
        &TextureDesc::new_color_attachment(BACK_BUFFER_EXTENT.width, BACK_BUFFER_EXTENT.height, vk::Format::B8G8R8A8_UNORM)
            .with_name("back_buffer"),
    )?);

    for frame in 0..u64::from(args.frames) {
        profiling::scope!("sandbox::frame");

        let builder = build_frame(&pipelines, &instances, &back_buffer, frame == 0);
        let num_passes = builder.graph().num_passes();

        let mut encoder = RecordingEncoder::new();
        builder.execute(&device, &mut encoder, &mut pools, frame)?;

        let (textures, buffers) = encoder
            .barrier_batches()
            .fold((0, 0), |(t, b), (textures, buffers)| (t + textures.len(), b + buffers.len()));
        let draws = encoder
            .commands()
            .iter()
            .filter(|command| matches!(command, RecordedCommand::Draw { .. } | RecordedCommand::Dispatch { .. }))
            .count();
        info!(
            "Frame {frame}: {num_passes} passes, {draws} draws/dispatches, {textures} texture and {buffers} buffer barriers."
        );

        profiling::finish_frame!();
    }

    let stats = device.stats();
    info!(
        "Device created {} textures, {} buffers, {} views and {} descriptor sets.",
        stats.textures, stats.buffers, stats.texture_views, stats.descriptor_sets,
    );
    info!("Texture pool: {:?}", pools.texture_stats());
    info!("Buffer pool: {:?}", pools.buffer_stats());
    info!("Descriptor set pool: {:?}", pools.descriptor_set_stats());

    Ok(())
}
