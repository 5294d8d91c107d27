use std::sync::Arc;
use zenith_rendergraph::{
    ColorAttachment, DepthStencilAttachment, PassContext, RenderGraphBuilder, RenderGraphResource,
};
use zenith_rhi::{
    vk, Buffer, BufferState, DescriptorSet, LayoutBinding, RenderDevice, RootSignature, Texture,
    TextureState, TextureSubresource,
};

pub const SHADOW_MAP_SIZE: u32 = 1024;
pub const BLOOM_MIPS: u32 = 5;
const MAX_INSTANCES: u64 = 4096;
const GROUP_SIZE: u32 = 8;

fn group_count(texels: u32) -> u32 {
    texels.div_ceil(GROUP_SIZE)
}

/// Root signatures and persistent descriptor sets shared by every frame.
pub struct Pipelines {
    culling: Arc<RootSignature>,
    lighting: Arc<RootSignature>,
    bloom: Arc<RootSignature>,
    tonemap: Arc<RootSignature>,
    scene: DescriptorSet,
}

impl Pipelines {
    pub fn new(device: &dyn RenderDevice) -> anyhow::Result<Self> {
        use vk::DescriptorType as Ty;

        let stages = vk::ShaderStageFlags::ALL;
        let culling = root_signature(device, "culling", &[&[
            LayoutBinding::new(0, Ty::STORAGE_BUFFER, stages),
            LayoutBinding::new(1, Ty::STORAGE_BUFFER, stages),
        ]])?;
        let lighting = root_signature(device, "lighting", &[
            &[
                LayoutBinding::new(0, Ty::SAMPLED_IMAGE, stages),
                LayoutBinding::new(1, Ty::STORAGE_IMAGE, stages),
            ],
            &[LayoutBinding::new(0, Ty::UNIFORM_BUFFER, stages)],
        ])?;
        let bloom = root_signature(device, "bloom", &[&[
            LayoutBinding::new(0, Ty::SAMPLED_IMAGE, stages),
            LayoutBinding::new(1, Ty::STORAGE_IMAGE, stages),
        ]])?;
        let tonemap = root_signature(device, "tonemap", &[&[
            LayoutBinding::new(0, Ty::SAMPLED_IMAGE, stages),
            LayoutBinding::new(1, Ty::SAMPLED_IMAGE, stages),
        ]])?;

        let scene_layout = lighting
            .set_layout(1)
            .ok_or_else(|| anyhow::anyhow!("Lighting root signature has no scene set!"))?;
        let scene = device.allocate_descriptor_set(scene_layout)?;

        Ok(Self {
            culling,
            lighting,
            bloom,
            tonemap,
            scene,
        })
    }
}

fn root_signature(device: &dyn RenderDevice, name: &str, sets: &[&[LayoutBinding]]) -> anyhow::Result<Arc<RootSignature>> {
    let layouts = sets
        .iter()
        .enumerate()
        .map(|(index, bindings)| {
            device
                .create_descriptor_set_layout(&format!("{name}.set{index}"), bindings)
                .map(Arc::new)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Arc::new(device.create_root_signature(name, &layouts, 0)?))
}

/// Cull the uploaded instances into an indirect draw buffer.
pub fn add_culling_pass(
    builder: &mut RenderGraphBuilder,
    pipelines: &Pipelines,
    instances: &Arc<Buffer>,
) -> RenderGraphResource<Buffer> {
    let instances = builder
        .create_buffer("scene.instances")
        .import(instances.clone(), BufferState::HostWrite)
        .finish();
    let visible = builder
        .create_buffer("culling.visible")
        .size(MAX_INSTANCES * 16)
        .allow_read_write()
        .usage(vk::BufferUsageFlags::INDIRECT_BUFFER)
        .finish();

    let _ = builder
        .create_compute_pass("culling")
        .root_signature(pipelines.culling.clone())
        .read(&instances, (0, 0))
        .read_write(&visible, (0, 1))
        .execute(|ctx| {
            ctx.bind_descriptor_sets();
            ctx.encoder().dispatch((MAX_INSTANCES as u32).div_ceil(64), 1, 1);
        })
        .finish();

    visible
}

pub fn add_shadow_pass(builder: &mut RenderGraphBuilder, visible: &RenderGraphResource<Buffer>) -> RenderGraphResource<Texture> {
    let shadow_map = builder
        .create_texture("shadow.map")
        .extent(SHADOW_MAP_SIZE, SHADOW_MAP_SIZE, 1)
        .format(vk::Format::D32_SFLOAT)
        .allow_render_target()
        .finish();

    let _ = builder
        .create_render_pass("shadow")
        .depth_stencil(&shadow_map, DepthStencilAttachment::default())
        .access(visible, BufferState::Indirect)
        .execute(|ctx| ctx.encoder().draw(36, 128, 0, 0))
        .finish();

    shadow_map
}

pub fn add_lighting_pass(
    builder: &mut RenderGraphBuilder,
    pipelines: &Pipelines,
    shadow_map: &RenderGraphResource<Texture>,
    extent: vk::Extent2D,
) -> RenderGraphResource<Texture> {
    let hdr = builder
        .create_texture("lighting.hdr")
        .extent(extent.width, extent.height, 1)
        .format(vk::Format::R16G16B16A16_SFLOAT)
        .allow_read_write()
        .finish();

    let _ = builder
        .create_compute_pass("lighting")
        .root_signature(pipelines.lighting.clone())
        .descriptor_set(1, pipelines.scene.clone())
        .read(shadow_map, (0, 0))
        .read_write(&hdr, (0, 1))
        .execute(move |ctx| {
            ctx.bind_descriptor_sets();
            ctx.encoder().dispatch(group_count(extent.width), group_count(extent.height), 1);
        })
        .finish();

    hdr
}

/// Downsample `hdr` into a mip chain, then accumulate it back into mip 0.
pub fn add_bloom_passes(
    builder: &mut RenderGraphBuilder,
    pipelines: &Pipelines,
    hdr: &RenderGraphResource<Texture>,
    extent: vk::Extent2D,
) -> RenderGraphResource<Texture> {
    let bloom = builder
        .create_texture("bloom.chain")
        .extent((extent.width / 2).max(1), (extent.height / 2).max(1), 1)
        .format(vk::Format::R16G16B16A16_SFLOAT)
        .mip_levels(BLOOM_MIPS)
        .allow_read_write()
        .finish();

    let _ = builder
        .create_compute_pass("bloom.prefilter")
        .root_signature(pipelines.bloom.clone())
        .read(hdr, (0, 0))
        .read_write_range(&bloom, (0, 1), TextureSubresource::mip(0))
        .pass_index(0, 0, 0)
        .execute(move |ctx| dispatch_mip(ctx, &bloom, 0))
        .finish();

    for mip in 1..BLOOM_MIPS {
        let _ = builder
            .create_compute_pass(&format!("bloom.down{mip}"))
            .root_signature(pipelines.bloom.clone())
            .read_range(&bloom, (0, 0), TextureSubresource::mip(mip - 1))
            .read_write_range(&bloom, (0, 1), TextureSubresource::mip(mip))
            .pass_index(mip, 0, 0)
            .execute(move |ctx| dispatch_mip(ctx, &bloom, mip))
            .finish();
    }

    for mip in (1..BLOOM_MIPS).rev() {
        let _ = builder
            .create_compute_pass(&format!("bloom.up{mip}"))
            .root_signature(pipelines.bloom.clone())
            .read_range(&bloom, (0, 0), TextureSubresource::mip(mip))
            .read_write_range(&bloom, (0, 1), TextureSubresource::mip(mip - 1))
            .pass_index(mip, 1, 0)
            .execute(move |ctx| dispatch_mip(ctx, &bloom, mip - 1))
            .finish();
    }

    bloom
}

fn dispatch_mip(ctx: &mut PassContext, bloom: &RenderGraphResource<Texture>, mip: u32) {
    let size = ctx
        .texture(bloom)
        .map(|texture| texture.desc().mip_extent(mip))
        .unwrap_or_default();
    ctx.bind_descriptor_sets();
    ctx.encoder().dispatch(group_count(size.width), group_count(size.height), 1);
}

pub fn add_tonemap_pass(
    builder: &mut RenderGraphBuilder,
    pipelines: &Pipelines,
    hdr: &RenderGraphResource<Texture>,
    bloom: &RenderGraphResource<Texture>,
    back_buffer: &Arc<Texture>,
    first_frame: bool,
) -> RenderGraphResource<Texture> {
    let initial_state = if first_frame { TextureState::Undefined } else { TextureState::Present };
    let output = builder
        .create_texture("back_buffer")
        .import(back_buffer.clone(), initial_state)
        .finish();

    let _ = builder
        .create_render_pass("tonemap")
        .root_signature(pipelines.tonemap.clone())
        .color(&output, ColorAttachment::default())
        .read(hdr, (0, 0))
        .read_range(bloom, (0, 1), TextureSubresource::mip(0))
        .execute(|ctx| {
            ctx.bind_descriptor_sets();
            ctx.encoder().draw(3, 1, 0, 0);
        })
        .finish();

    output
}

pub fn add_present_pass(builder: &mut RenderGraphBuilder, output: &RenderGraphResource<Texture>) {
    let _ = builder.create_present_pass("present").present(output).finish();
}
