//! Frame execution: resource resolution, descriptors, barriers, dispatch and release.

use std::sync::Arc;
use anyhow::{anyhow, Context};
use log::{debug, trace, warn};
use zenith_core::collections::SmallVec;
use zenith_rhi::{
    vk, CommandEncoder, DescriptorResource, DescriptorSet, DescriptorWrite, RenderDevice,
    RenderingAttachment, RenderingInfo, RootSignature, TextureView, TextureViewDesc,
};
use crate::builder::RenderGraphBuilder;
use crate::dependency::{EdgeId, NodeId};
use crate::graph::{BarrierBatch, RenderGraph};
use crate::interface::{Buffer, Texture};
use crate::node::{PassKind, PassNode};
use crate::pool::RenderGraphPools;
use crate::resource::{GraphResource, RenderGraphResource};

/// Objects a pass borrows from the pools for the duration of its execution.
#[derive(Default)]
struct TransientResources {
    views: SmallVec<[TextureView; 8]>,
    descriptor_sets: SmallVec<[(u32, DescriptorSet); 4]>,
}

impl TransientResources {
    fn view(
        &mut self,
        texture: &Texture,
        desc: TextureViewDesc,
        device: &dyn RenderDevice,
        pools: &mut RenderGraphPools,
    ) -> anyhow::Result<vk::ImageView> {
        let (view, _) = pools
            .views
            .allocate_with(&(texture.handle(), desc), (), || device.create_texture_view(texture, &desc))
            .with_context(|| format!("Failed to create view of texture [{}]", texture.name()))?;
        let handle = view.handle();
        self.views.push(view);
        Ok(handle)
    }

    fn descriptor_set(
        &mut self,
        set: u32,
        root_signature: &RootSignature,
        device: &dyn RenderDevice,
        pools: &mut RenderGraphPools,
        slot: usize,
    ) -> anyhow::Result<Option<vk::DescriptorSet>> {
        if let Some((_, descriptor_set)) = self.descriptor_sets.iter().find(|(index, _)| *index == set) {
            return Ok(Some(descriptor_set.handle()));
        }

        let Some(layout) = root_signature.set_layout(set) else {
            warn!("Root signature [{}] has no descriptor set {set}!", root_signature.name());
            return Ok(None);
        };
        let descriptor_set = pools
            .descriptor_sets
            .allocate(slot, layout, device)
            .with_context(|| format!("Failed to allocate descriptor set {set} of [{}]", root_signature.name()))?;
        let handle = descriptor_set.handle();
        self.descriptor_sets.push((set, descriptor_set));
        Ok(Some(handle))
    }

    fn release(self, pools: &mut RenderGraphPools, slot: usize) {
        for view in self.views {
            pools.views.release((view.image(), *view.desc()), view, ());
        }
        for (_, descriptor_set) in self.descriptor_sets {
            pools.descriptor_sets.retire(slot, descriptor_set);
        }
    }
}

impl RenderGraphBuilder {
    /// Record every declared pass into `encoder`, in declaration order.
    ///
    /// Backend objects come from and return to `pools`. Descriptor sets are
    /// recycled within the frame slot of `frame_index`. On error the frame is
    /// abandoned and every object it holds goes back to `pools` in an undefined state.
    #[profiling::function]
    pub fn execute(
        self,
        device: &dyn RenderDevice,
        encoder: &mut dyn CommandEncoder,
        pools: &mut RenderGraphPools,
        frame_index: u64,
    ) -> anyhow::Result<()> {
        let mut graph = self.graph;
        let slot = pools.frame_slot(frame_index);
        let debug_labels = pools.config.debug_labels;

        let passes = graph.passes.clone();
        for pass in passes {
            let Some(node) = graph.pass_node(pass) else {
                continue;
            };
            if node.culled {
                trace!("Pass[{}] is culled.", node.name);
                continue;
            }

            let mut transient = TransientResources::default();
            let rendering = match prepare_pass(&mut graph, pass, device, pools, slot, &mut transient) {
                Ok(rendering) => rendering,
                Err(err) => {
                    transient.release(pools, slot);
                    abandon_resources::<Texture>(&mut graph, pools);
                    abandon_resources::<Buffer>(&mut graph, pools);
                    pools.descriptor_sets.release_all(slot);
                    return Err(err);
                }
            };

            record_barriers(&graph, pass, false, encoder);
            run_pass(&mut graph, pass, rendering, &transient, debug_labels, encoder);
            record_barriers(&graph, pass, true, encoder);

            release_resources::<Texture>(&mut graph, pass, pools);
            release_resources::<Buffer>(&mut graph, pass, pools);
            transient.release(pools, slot);
        }

        pools.descriptor_sets.release_all(slot);
        debug!("Render graph executed {} passes in frame slot {slot}.", graph.num_passes());
        Ok(())
    }
}

/// Resolve resources, descriptors and render targets of one pass.
fn prepare_pass(
    graph: &mut RenderGraph,
    pass: NodeId,
    device: &dyn RenderDevice,
    pools: &mut RenderGraphPools,
    slot: usize,
    transient: &mut TransientResources,
) -> anyhow::Result<Option<RenderingInfo>> {
    let (render, shader) = match graph.pass_node(pass).map(PassNode::kind) {
        Some(PassKind::Render(_)) => (true, true),
        Some(PassKind::Compute | PassKind::RayTracing) => (false, true),
        Some(PassKind::Copy | PassKind::Present) | None => (false, false),
    };

    resolve_resources::<Texture>(graph, pass, device, pools)?;
    resolve_resources::<Buffer>(graph, pass, device, pools)?;

    if shader {
        prepare_descriptor_sets(graph, pass, device, pools, slot, transient)?;
    }
    if render {
        return prepare_render_targets(graph, pass, device, pools, transient).map(Some);
    }
    Ok(None)
}

/// Return every resolved pooled object of an abandoned frame.
fn abandon_resources<R: GraphResource>(graph: &mut RenderGraph, pools: &mut RenderGraphPools) {
    let resources: SmallVec<[NodeId; 32]> = graph
        .passes
        .iter()
        .flat_map(|&pass| graph.pass_edges::<R>(pass).map(|(_, resource, _)| resource))
        .collect();

    for resource in resources {
        let Some(node) = graph.resource_node_mut::<R>(resource) else {
            continue;
        };
        if node.imported {
            continue;
        }
        if let Some(object) = node.handle.take() {
            debug!("Abandoned {}[{}].", R::KIND, node.name);
            R::pool(pools).release(node.desc.clone(), object, R::UNDEFINED);
        }
    }
}

/// Back every pooled resource the pass touches with an object.
fn resolve_resources<R: GraphResource>(
    graph: &mut RenderGraph,
    pass: NodeId,
    device: &dyn RenderDevice,
    pools: &mut RenderGraphPools,
) -> anyhow::Result<()> {
    let resources: SmallVec<[NodeId; 16]> = graph.pass_edges::<R>(pass).map(|(_, resource, _)| resource).collect();

    for resource in resources {
        let Some(node) = graph.resource_node_mut::<R>(resource) else {
            continue;
        };
        if node.imported || node.handle.is_some() {
            continue;
        }

        let (object, state) = R::pool(pools)
            .allocate_with(&node.desc, R::UNDEFINED, || R::create(device, &node.desc).map(Arc::new))
            .with_context(|| format!("Failed to allocate {} [{}]", R::KIND, node.name))?;
        debug!("Resolved {}[{}] in state {:?}.", R::KIND, node.name, state);

        node.initial_state = state;
        node.handle = Some(object);
    }

    Ok(())
}

fn prepare_descriptor_sets(
    graph: &RenderGraph,
    pass: NodeId,
    device: &dyn RenderDevice,
    pools: &mut RenderGraphPools,
    slot: usize,
    transient: &mut TransientResources,
) -> anyhow::Result<()> {
    profiling::scope!("rendergraph::descriptors");

    let Some(pass_node) = graph.pass_node(pass) else {
        return Ok(());
    };

    let mut resources: SmallVec<[(crate::edge::BindingSlot, DescriptorResource, String); 16]> = SmallVec::new();
    for (_, resource, edge) in graph.pass_edges::<Texture>(pass) {
        let (Some(binding), None) = (edge.binding, edge.attachment.as_ref()) else {
            continue;
        };
        let Some(node) = graph.resource_node::<Texture>(resource) else {
            continue;
        };
        if pass_node.bound_set(binding.set).is_some() {
            debug!("Pass[{}] skips texture[{}], set {} is bound externally.", pass_node.name, node.name, binding.set);
            continue;
        }
        if !edge.is_shader_access() {
            continue;
        }
        let texture = node
            .handle
            .as_ref()
            .ok_or_else(|| anyhow!("Texture[{}] is not resolved for pass [{}]", node.name, pass_node.name))?;

        let view = transient.view(texture, TextureViewDesc::for_texture(texture, edge.range), device, pools)?;
        let layout = graph
            .side_state::<Texture>(pass, resource, edge.range, edge.output)
            .unwrap_or(edge.state)
            .into_image_layout();
        let descriptor = if edge.state == Texture::UNORDERED_ACCESS {
            DescriptorResource::StorageTexture { view, layout }
        } else {
            DescriptorResource::SampledTexture { view, layout }
        };
        resources.push((binding, descriptor, node.name.clone()));
    }

    for (_, resource, edge) in graph.pass_edges::<Buffer>(pass) {
        let Some(binding) = edge.binding else {
            continue;
        };
        let Some(node) = graph.resource_node::<Buffer>(resource) else {
            continue;
        };
        if pass_node.bound_set(binding.set).is_some() {
            debug!("Pass[{}] skips buffer[{}], set {} is bound externally.", pass_node.name, node.name, binding.set);
            continue;
        }
        if !edge.is_shader_access() {
            continue;
        }
        let buffer = node
            .handle
            .as_ref()
            .ok_or_else(|| anyhow!("Buffer[{}] is not resolved for pass [{}]", node.name, pass_node.name))?;

        let range = edge.range.to_binding(buffer);
        let descriptor = if edge.state == Buffer::UNORDERED_ACCESS {
            DescriptorResource::StorageBuffer { buffer: range.buffer, offset: range.offset, size: range.range }
        } else {
            DescriptorResource::ReadBuffer { buffer: range.buffer, offset: range.offset, size: range.range }
        };
        resources.push((binding, descriptor, node.name.clone()));
    }

    if resources.is_empty() {
        return Ok(());
    }

    let Some(root_signature) = pass_node.root_signature.as_ref() else {
        return Err(anyhow!("Pass[{}] binds resources without a root signature!", pass_node.name));
    };

    let mut writes: SmallVec<[(vk::DescriptorSet, DescriptorWrite); 16]> = SmallVec::new();
    for (binding, descriptor, name) in resources {
        let Some(set) = transient.descriptor_set(binding.set, root_signature, device, pools, slot)? else {
            continue;
        };
        let Some(layout) = root_signature.set_layout(binding.set) else {
            continue;
        };

        match layout.write(binding.binding, binding.array_index, descriptor) {
            Ok(write) => writes.push((set, write)),
            Err(err) => warn!(
                "Pass[{}] skips binding of resource[{name}] at set {} binding {}: {err}",
                pass_node.name, binding.set, binding.binding,
            ),
        }
    }

    for (set_index, descriptor_set) in &transient.descriptor_sets {
        let set_writes: SmallVec<[DescriptorWrite; 16]> = writes
            .iter()
            .filter(|(set, _)| *set == descriptor_set.handle())
            .map(|(_, write)| *write)
            .collect();
        if !set_writes.is_empty() {
            trace!("Pass[{}] writes {} bindings into set {set_index}.", pass_node.name, set_writes.len());
            device.update_descriptor_set(descriptor_set, &set_writes);
        }
    }

    Ok(())
}

fn attachment_info(
    graph: &RenderGraph,
    edge_id: EdgeId,
    device: &dyn RenderDevice,
    pools: &mut RenderGraphPools,
    transient: &mut TransientResources,
) -> anyhow::Result<Option<(RenderingAttachment, vk::Extent2D, u32)>> {
    let (Some(edge), Some((_, resource))) = (graph.edge::<Texture>(edge_id), graph.edge_link(edge_id)) else {
        return Ok(None);
    };
    let (Some(node), Some(attachment)) = (graph.resource_node::<Texture>(resource), edge.attachment.as_ref()) else {
        return Ok(None);
    };
    let texture = node
        .handle
        .as_ref()
        .ok_or_else(|| anyhow!("Render target [{}] is not resolved", node.name))?;

    let view = transient.view(texture, TextureViewDesc::for_texture(texture, edge.range), device, pools)?;
    let (load_op, store_op, clear) = attachment.ops();
    let extent = texture.desc().mip_extent(edge.range.base_mip);

    Ok(Some((
        RenderingAttachment {
            view,
            layout: edge.state.into_image_layout(),
            load_op,
            store_op,
            clear,
        },
        vk::Extent2D { width: extent.width, height: extent.height },
        edge.range.layer_count(texture.desc()),
    )))
}

fn prepare_render_targets(
    graph: &RenderGraph,
    pass: NodeId,
    device: &dyn RenderDevice,
    pools: &mut RenderGraphPools,
    transient: &mut TransientResources,
) -> anyhow::Result<RenderingInfo> {
    let mut info = RenderingInfo::default();
    let Some(PassNode { kind: PassKind::Render(data), name, .. }) = graph.pass_node(pass) else {
        return Ok(info);
    };
    if data.first_attachment.is_none() {
        warn!("Render pass[{name}] has no attachment, its render area is empty!");
    }

    for &edge in &data.color_attachments {
        if let Some((attachment, extent, layers)) = attachment_info(graph, edge, device, pools, transient)? {
            info.color_attachments.push(attachment);
            if data.first_attachment == Some(edge) {
                info.extent = extent;
                info.layer_count = layers;
            }
        }
    }

    if let Some(edge) = data.depth_stencil_attachment {
        if let Some((attachment, extent, layers)) = attachment_info(graph, edge, device, pools, transient)? {
            info.depth_attachment = Some(attachment);
            if data.first_attachment == Some(edge) {
                info.extent = extent;
                info.layer_count = layers;
            }
        }
    }

    Ok(info)
}

fn record_barriers(graph: &RenderGraph, pass: NodeId, output: bool, encoder: &mut dyn CommandEncoder) {
    profiling::scope!("rendergraph::barriers");

    let mut batch = BarrierBatch::default();
    graph.collect_barriers::<Texture>(pass, output, &mut batch);
    graph.collect_barriers::<Buffer>(pass, output, &mut batch);
    batch.flush(encoder);
}

fn run_pass(
    graph: &mut RenderGraph,
    pass: NodeId,
    rendering: Option<RenderingInfo>,
    transient: &TransientResources,
    debug_labels: bool,
    encoder: &mut dyn CommandEncoder,
) {
    let callback = graph.pass_node_mut(pass).and_then(|node| node.callback.take());
    let Some(node) = graph.pass_node(pass) else {
        return;
    };

    profiling::scope!("rendergraph::pass_recording", &node.name);
    if debug_labels {
        encoder.begin_label(&node.name);
    }
    if let Some(info) = &rendering {
        encoder.begin_rendering(info);
    }

    match callback {
        Some(callback) => {
            let mut descriptor_sets: SmallVec<[(u32, vk::DescriptorSet); 4]> = node
                .bound_sets
                .iter()
                .chain(transient.descriptor_sets.iter())
                .map(|(set, descriptor_set)| (*set, descriptor_set.handle()))
                .collect();
            descriptor_sets.sort_by_key(|(set, _)| *set);

            let mut context = PassContext {
                name: &node.name,
                graph: &*graph,
                encoder: &mut *encoder,
                root_signature: node.root_signature.as_ref(),
                bind_point: node.kind.bind_point(),
                descriptor_sets,
                pass_index: node.pass_index,
                render_extent: rendering.as_ref().map(|info| info.extent),
            };
            callback(&mut context);
        }
        None => trace!("Pass[{}] has no execute callback.", node.name),
    }

    if rendering.is_some() {
        encoder.end_rendering();
    }
    if debug_labels {
        encoder.end_label();
    }
}

/// Hand objects back to their pools after the last pass using them.
fn release_resources<R: GraphResource>(graph: &mut RenderGraph, pass: NodeId, pools: &mut RenderGraphPools) {
    // Output edges win, then the latest declared edge.
    let mut releases: SmallVec<[(NodeId, EdgeId, bool, R::Range, R::State); 16]> = SmallVec::new();
    for (id, resource, edge) in graph.pass_edges::<R>(pass) {
        let entry = (resource, id, edge.output, edge.range, edge.state);
        match releases.iter_mut().find(|(res, ..)| *res == resource) {
            Some(current) if (edge.output, id) > (current.2, current.1) => *current = entry,
            Some(_) => {}
            None => releases.push(entry),
        }
    }

    for (resource, _, output, range, state) in releases {
        if !graph.is_last_user::<R>(resource, pass, output) {
            continue;
        }
        let state = graph.side_state::<R>(pass, resource, range, output).unwrap_or(state);
        let Some(node) = graph.resource_node_mut::<R>(resource) else {
            continue;
        };
        if node.imported {
            continue;
        }
        if let Some(object) = node.handle.take() {
            debug!("Released {}[{}] in state {:?}.", R::KIND, node.name, state);
            R::pool(pools).release(node.desc.clone(), object, state);
        }
    }
}

/// Everything a pass callback can reach while recording.
pub struct PassContext<'a> {
    name: &'a str,
    graph: &'a RenderGraph,
    encoder: &'a mut dyn CommandEncoder,
    root_signature: Option<&'a Arc<RootSignature>>,
    bind_point: Option<vk::PipelineBindPoint>,
    descriptor_sets: SmallVec<[(u32, vk::DescriptorSet); 4]>,
    pass_index: Option<[u32; 3]>,
    render_extent: Option<vk::Extent2D>,
}

impl PassContext<'_> {
    #[inline]
    pub fn name(&self) -> &str {
        self.name
    }

    #[inline]
    pub fn encoder(&mut self) -> &mut dyn CommandEncoder {
        &mut *self.encoder
    }

    #[inline]
    pub fn root_signature(&self) -> Option<&Arc<RootSignature>> {
        self.root_signature
    }

    /// Descriptor set bound at `set`, externally provided or prepared by the graph.
    pub fn descriptor_set(&self, set: u32) -> Option<vk::DescriptorSet> {
        self.descriptor_sets
            .iter()
            .find(|(index, _)| *index == set)
            .map(|(_, descriptor_set)| *descriptor_set)
    }

    /// All descriptor sets of the pass, ordered by set index.
    #[inline]
    pub fn descriptor_sets(&self) -> &[(u32, vk::DescriptorSet)] {
        &self.descriptor_sets
    }

    #[inline]
    pub fn pass_index(&self) -> Option<[u32; 3]> {
        self.pass_index
    }

    /// Pixel extent of the render targets, render passes only.
    #[inline]
    pub fn render_extent(&self) -> Option<vk::Extent2D> {
        self.render_extent
    }

    pub fn texture(&self, texture: &RenderGraphResource<Texture>) -> Option<&Texture> {
        self.resolved(texture)
    }

    pub fn buffer(&self, buffer: &RenderGraphResource<Buffer>) -> Option<&Buffer> {
        self.resolved(buffer)
    }

    fn resolved<R: GraphResource>(&self, resource: &RenderGraphResource<R>) -> Option<&R> {
        self.graph
            .resource(resource)
            .and_then(|node| node.handle.as_deref())
    }

    /// Bind every descriptor set against the root signature, one call per contiguous run of set indices.
    pub fn bind_descriptor_sets(&mut self) {
        if self.descriptor_sets.is_empty() {
            return;
        }
        let (Some(root_signature), Some(bind_point)) = (self.root_signature, self.bind_point) else {
            warn!("Pass[{}] binds descriptor sets without a root signature!", self.name);
            return;
        };

        let mut start = 0;
        while start < self.descriptor_sets.len() {
            let mut end = start + 1;
            while end < self.descriptor_sets.len() && self.descriptor_sets[end].0 == self.descriptor_sets[end - 1].0 + 1 {
                end += 1;
            }

            let sets: SmallVec<[vk::DescriptorSet; 4]> = self.descriptor_sets[start..end].iter().map(|(_, set)| *set).collect();
            self.encoder.bind_descriptor_sets(bind_point, root_signature.handle(), self.descriptor_sets[start].0, &sets);
            start = end;
        }
    }
}
