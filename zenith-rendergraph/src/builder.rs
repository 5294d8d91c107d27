use std::sync::Arc;
use log::warn;
use zenith_rhi::{vk, DescriptorSet, MemoryUsage, RootSignature};
use crate::blackboard::Blackboard;
use crate::dependency::{EdgeId, NodeId};
use crate::edge::{Attachment, BindingSlot, ColorAttachment, DepthStencilAttachment, ResourceEdge};
use crate::execute::PassContext;
use crate::graph::RenderGraph;
use crate::interface::{Buffer, BufferState, Texture, TextureState, TextureSubresource};
use crate::node::{PassKind, PassNode, RenderPassData, ResourceNode};
use crate::resource::{GraphResource, RenderGraphPass, RenderGraphResource};

/// Declares the resources and passes of one frame.
#[derive(Default)]
pub struct RenderGraphBuilder {
    pub(crate) graph: RenderGraph,
    blackboard: Blackboard,
}

impl RenderGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn graph(&self) -> &RenderGraph {
        &self.graph
    }

    #[inline]
    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    #[must_use]
    pub fn create_texture(&mut self, name: &str) -> TextureBuilder<'_> {
        self.create_resource(name, zenith_rhi::TextureDesc::default().with_name(name))
    }

    #[must_use]
    pub fn create_buffer(&mut self, name: &str) -> BufferBuilder<'_> {
        self.create_resource(name, zenith_rhi::BufferDesc::default().with_name(name))
    }

    /// Look up a texture registered under `name`. Returns an invalid handle if there is none.
    pub fn get_texture(&self, name: &str) -> RenderGraphResource<Texture> {
        self.get_resource(name)
    }

    /// Look up a buffer registered under `name`. Returns an invalid handle if there is none.
    pub fn get_buffer(&self, name: &str) -> RenderGraphResource<Buffer> {
        self.get_resource(name)
    }

    /// Edit the texture registered under `name`, or declare it.
    #[must_use]
    pub fn get_or_create_texture(&mut self, name: &str) -> TextureBuilder<'_> {
        self.get_or_create_resource(name, zenith_rhi::TextureDesc::default().with_name(name))
    }

    /// Edit the buffer registered under `name`, or declare it.
    #[must_use]
    pub fn get_or_create_buffer(&mut self, name: &str) -> BufferBuilder<'_> {
        self.get_or_create_resource(name, zenith_rhi::BufferDesc::default().with_name(name))
    }

    #[must_use]
    pub fn create_render_pass(&mut self, name: &str) -> RenderPassBuilder<'_> {
        RenderPassBuilder {
            common: PassBuilder::new(&mut self.graph, name, PassKind::Render(RenderPassData::default())),
        }
    }

    #[must_use]
    pub fn create_compute_pass(&mut self, name: &str) -> ComputePassBuilder<'_> {
        ComputePassBuilder {
            common: PassBuilder::new(&mut self.graph, name, PassKind::Compute),
        }
    }

    #[must_use]
    pub fn create_ray_tracing_pass(&mut self, name: &str) -> RayTracingPassBuilder<'_> {
        RayTracingPassBuilder {
            common: PassBuilder::new(&mut self.graph, name, PassKind::RayTracing),
        }
    }

    #[must_use]
    pub fn create_copy_pass(&mut self, name: &str) -> CopyPassBuilder<'_> {
        CopyPassBuilder {
            common: PassBuilder::new(&mut self.graph, name, PassKind::Copy),
        }
    }

    #[must_use]
    pub fn create_present_pass(&mut self, name: &str) -> PresentPassBuilder<'_> {
        PresentPassBuilder {
            common: PassBuilder::new(&mut self.graph, name, PassKind::Present),
        }
    }

    fn create_resource<R: GraphResource>(&mut self, name: &str, desc: R::Descriptor) -> ResourceBuilder<'_, R> {
        let id = self.graph.add_resource(ResourceNode::<R>::new(name, desc));
        self.blackboard.insert(name, id);

        ResourceBuilder {
            id,
            node: self.graph.resource_node_mut::<R>(id),
        }
    }

    fn get_resource<R: GraphResource>(&self, name: &str) -> RenderGraphResource<R> {
        match self.blackboard.get(name) {
            Some(id) if self.graph.resource_node::<R>(id).is_some() => RenderGraphResource::new(id),
            Some(_) => {
                warn!("Resource[{name}] is not a {}!", R::KIND);
                RenderGraphResource::invalid()
            }
            None => {
                warn!("Resource[{name}] is not found in render graph!");
                RenderGraphResource::invalid()
            }
        }
    }

    fn get_or_create_resource<R: GraphResource>(&mut self, name: &str, desc: R::Descriptor) -> ResourceBuilder<'_, R> {
        if let Some(id) = self.blackboard.get(name) {
            if self.graph.resource_node::<R>(id).is_some() {
                return ResourceBuilder {
                    id,
                    node: self.graph.resource_node_mut::<R>(id),
                };
            }
        }

        self.create_resource(name, desc)
    }
}

/// Fluent editor of one resource node.
pub struct ResourceBuilder<'a, R: GraphResource> {
    id: NodeId,
    node: Option<&'a mut ResourceNode<R>>,
}

pub type TextureBuilder<'a> = ResourceBuilder<'a, Texture>;
pub type BufferBuilder<'a> = ResourceBuilder<'a, Buffer>;

impl<R: GraphResource> ResourceBuilder<'_, R> {
    fn edit(mut self, f: impl FnOnce(&mut ResourceNode<R>)) -> Self {
        if let Some(node) = self.node.as_deref_mut() {
            f(node);
        }
        self
    }

    /// Back the node with an external object. Imported objects in `state` are never pooled.
    pub fn import(self, resource: Arc<R>, state: R::State) -> Self {
        self.edit(|node| {
            node.desc = resource.desc().clone();
            node.imported = true;
            node.initial_state = state;
            node.handle = Some(resource);
        })
    }

    #[inline]
    pub fn finish(self) -> RenderGraphResource<R> {
        RenderGraphResource::new(self.id)
    }
}

impl ResourceBuilder<'_, Texture> {
    fn edit_desc(self, f: impl FnOnce(zenith_rhi::TextureDesc) -> zenith_rhi::TextureDesc) -> Self {
        self.edit(|node| node.desc = f(std::mem::take(&mut node.desc)))
    }

    pub fn extent(self, width: u32, height: u32, depth: u32) -> Self {
        self.edit_desc(|desc| desc.with_extent(width, height, depth))
    }

    pub fn format(self, format: vk::Format) -> Self {
        self.edit_desc(|desc| desc.with_format(format))
    }

    pub fn memory_usage(self, usage: MemoryUsage) -> Self {
        self.edit_desc(|desc| desc.with_memory_usage(usage))
    }

    pub fn mip_levels(self, levels: u32) -> Self {
        self.edit_desc(|desc| desc.with_mip_levels(levels))
    }

    pub fn array_layers(self, layers: u32) -> Self {
        self.edit_desc(|desc| desc.with_array_layers(layers))
    }

    /// Allow shader writes.
    pub fn allow_read_write(self) -> Self {
        self.edit_desc(|desc| desc.with_additional_usage(vk::ImageUsageFlags::STORAGE))
    }

    /// Allow use as a color or depth-stencil attachment, picked from the format.
    pub fn allow_render_target(self) -> Self {
        self.edit_desc(|desc| {
            let usage = if desc.is_depth_stencil() {
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
            } else {
                vk::ImageUsageFlags::COLOR_ATTACHMENT
            };
            desc.with_additional_usage(usage)
        })
    }
}

impl ResourceBuilder<'_, Buffer> {
    fn edit_desc(self, f: impl FnOnce(zenith_rhi::BufferDesc) -> zenith_rhi::BufferDesc) -> Self {
        self.edit(|node| node.desc = f(std::mem::take(&mut node.desc)))
    }

    pub fn size(self, size: vk::DeviceSize) -> Self {
        self.edit_desc(|desc| desc.with_size(size))
    }

    pub fn memory_usage(self, usage: MemoryUsage) -> Self {
        self.edit_desc(|desc| desc.with_memory_usage(usage))
    }

    /// Allow shader writes.
    pub fn allow_read_write(self) -> Self {
        self.edit_desc(|desc| desc.with_additional_usage(vk::BufferUsageFlags::STORAGE_BUFFER))
    }

    pub fn usage(self, usage: vk::BufferUsageFlags) -> Self {
        self.edit_desc(|desc| desc.with_additional_usage(usage))
    }
}

/// Shared part of every pass builder.
pub struct PassBuilder<'a> {
    graph: &'a mut RenderGraph,
    id: NodeId,
}

impl<'a> PassBuilder<'a> {
    fn new(graph: &'a mut RenderGraph, name: &str, kind: PassKind) -> Self {
        let id = graph.add_pass(PassNode::new(name, kind));
        Self { graph, id }
    }

    fn pass(&mut self) -> Option<&mut PassNode> {
        self.graph.pass_node_mut(self.id)
    }

    fn pass_name(&self) -> &str {
        self.graph.pass_node(self.id).map(PassNode::name).unwrap_or_default()
    }

    fn add_edge<R: GraphResource>(
        &mut self,
        resource: &RenderGraphResource<R>,
        edge: ResourceEdge<R>,
    ) -> Option<EdgeId> {
        let Some(node) = self.graph.resource_node::<R>(resource.id) else {
            warn!("Pass[{}] accesses an invalid {} handle, access is ignored!", self.pass_name(), R::KIND);
            return None;
        };

        // Distinct bindings or an attachment may share a range.
        let duplicated = self.graph.pass_edges::<R>(self.id).any(|(_, res, e)| {
            res == resource.id
                && e.range == edge.range
                && e.output == edge.output
                && e.binding == edge.binding
                && e.attachment.is_some() == edge.attachment.is_some()
        });
        if duplicated {
            let name = node.name();
            if edge.output {
                warn!("Try to write to resource[{name}] multiple time!");
            } else {
                warn!("Try to read resource[{name}] multiple time!");
            }
            return None;
        }

        Some(self.graph.add_edge(self.id, resource.id, edge))
    }

    fn access<R: GraphResource>(
        &mut self,
        resource: &RenderGraphResource<R>,
        state: R::State,
        range: R::Range,
        output: bool,
    ) {
        let _ = self.add_edge(resource, ResourceEdge::new(state, output, range));
    }

    fn bind<R: GraphResource>(
        &mut self,
        resource: &RenderGraphResource<R>,
        state: R::State,
        range: R::Range,
        binding: BindingSlot,
    ) {
        let mut edge = ResourceEdge::new(state, false, range);
        edge.binding = Some(binding);
        let _ = self.add_edge(resource, edge);
    }

    fn root_signature(&mut self, root_signature: Arc<RootSignature>) {
        if let Some(pass) = self.pass() {
            pass.root_signature = Some(root_signature);
        }
    }

    fn descriptor_set(&mut self, set: u32, descriptor_set: DescriptorSet) {
        if let Some(pass) = self.pass() {
            if let Some(slot) = pass.bound_sets.iter_mut().find(|(index, _)| *index == set) {
                slot.1 = descriptor_set;
            } else {
                pass.bound_sets.push((set, descriptor_set));
            }
        }
    }

    fn pass_index(&mut self, x: u32, y: u32, z: u32) {
        if let Some(pass) = self.pass() {
            pass.pass_index = Some([x, y, z]);
        }
    }

    fn execute<F>(&mut self, job: F)
    where
        F: FnOnce(&mut PassContext) + 'static,
    {
        if let Some(pass) = self.pass() {
            if pass.callback.replace(Box::new(job)).is_some() {
                warn!("Execute callback of pass[{}] is replaced!", pass.name);
            }
        }
    }

    fn attach(&mut self, texture: &RenderGraphResource<Texture>, state: TextureState, range: TextureSubresource, attachment: Attachment) {
        let is_depth = matches!(attachment, Attachment::DepthStencil(_));
        if is_depth {
            let has_depth = matches!(
                self.graph.pass_node(self.id).map(PassNode::kind),
                Some(PassKind::Render(data)) if data.depth_stencil_attachment.is_some()
            );
            if has_depth {
                warn!("Pass[{}] already has a depth stencil attachment!", self.pass_name());
                return;
            }
        }

        let mut edge = ResourceEdge::new(state, false, range);
        edge.attachment = Some(attachment);
        let Some(edge) = self.add_edge(texture, edge) else {
            return;
        };

        if let Some(PassNode { kind: PassKind::Render(data), .. }) = self.pass() {
            if is_depth {
                data.depth_stencil_attachment = Some(edge);
            } else {
                data.color_attachments.push(edge);
            }
            data.first_attachment.get_or_insert(edge);
        }
    }

    fn next_color_slot(&self) -> u32 {
        match self.graph.pass_node(self.id).map(PassNode::kind) {
            Some(PassKind::Render(data)) => data.color_attachments.len() as u32,
            _ => 0,
        }
    }

    fn finish(self) -> RenderGraphPass {
        RenderGraphPass { id: self.id }
    }
}

macro_rules! inject_pass_builder_methods {
    () => {
        /// Non-bound input access, e.g. vertex, index or indirect buffers.
        #[inline]
        pub fn access<R: GraphResource>(mut self, resource: &RenderGraphResource<R>, state: R::State) -> Self {
            self.common.access(resource, state, R::Range::default(), false);
            self
        }

        #[inline]
        pub fn access_range<R: GraphResource>(
            mut self,
            resource: &RenderGraphResource<R>,
            state: R::State,
            range: R::Range,
        ) -> Self {
            self.common.access(resource, state, range, false);
            self
        }

        /// State `resource` is left in after this pass.
        #[inline]
        pub fn output_read<R: GraphResource>(mut self, resource: &RenderGraphResource<R>, state: R::State) -> Self {
            self.common.access(resource, state, R::Range::default(), true);
            self
        }

        #[inline]
        pub fn output_read_range<R: GraphResource>(
            mut self,
            resource: &RenderGraphResource<R>,
            state: R::State,
            range: R::Range,
        ) -> Self {
            self.common.access(resource, state, range, true);
            self
        }

        /// Writable state `resource` is left in after this pass.
        #[inline]
        pub fn output_read_write<R: GraphResource>(mut self, resource: &RenderGraphResource<R>, state: R::State) -> Self {
            self.common.access(resource, state, R::Range::default(), true);
            self
        }

        #[inline]
        pub fn output_read_write_range<R: GraphResource>(
            mut self,
            resource: &RenderGraphResource<R>,
            state: R::State,
            range: R::Range,
        ) -> Self {
            self.common.access(resource, state, range, true);
            self
        }

        #[inline]
        pub fn pass_index(mut self, x: u32, y: u32, z: u32) -> Self {
            self.common.pass_index(x, y, z);
            self
        }

        #[inline]
        pub fn execute<F>(mut self, job: F) -> Self
        where
            F: FnOnce(&mut PassContext) + 'static,
        {
            self.common.execute(job);
            self
        }

        #[inline]
        pub fn finish(self) -> RenderGraphPass {
            self.common.finish()
        }
    };
}

macro_rules! inject_shader_pass_builder_methods {
    () => {
        #[inline]
        pub fn root_signature(mut self, root_signature: Arc<RootSignature>) -> Self {
            self.common.root_signature(root_signature);
            self
        }

        /// Bind an externally prepared set. Bindings targeting `set` are not written.
        #[inline]
        pub fn descriptor_set(mut self, set: u32, descriptor_set: DescriptorSet) -> Self {
            self.common.descriptor_set(set, descriptor_set);
            self
        }

        /// Shader read of the whole resource.
        #[inline]
        pub fn read<R: GraphResource>(mut self, resource: &RenderGraphResource<R>, binding: impl Into<BindingSlot>) -> Self {
            self.common.bind(resource, R::SHADER_RESOURCE, R::Range::default(), binding.into());
            self
        }

        #[inline]
        pub fn read_range<R: GraphResource>(
            mut self,
            resource: &RenderGraphResource<R>,
            binding: impl Into<BindingSlot>,
            range: R::Range,
        ) -> Self {
            self.common.bind(resource, R::SHADER_RESOURCE, range, binding.into());
            self
        }

        /// Shader read-write of the whole resource.
        #[inline]
        pub fn read_write<R: GraphResource>(mut self, resource: &RenderGraphResource<R>, binding: impl Into<BindingSlot>) -> Self {
            self.common.bind(resource, R::UNORDERED_ACCESS, R::Range::default(), binding.into());
            self
        }

        #[inline]
        pub fn read_write_range<R: GraphResource>(
            mut self,
            resource: &RenderGraphResource<R>,
            binding: impl Into<BindingSlot>,
            range: R::Range,
        ) -> Self {
            self.common.bind(resource, R::UNORDERED_ACCESS, range, binding.into());
            self
        }
    };
}

pub struct RenderPassBuilder<'a> {
    common: PassBuilder<'a>,
}

impl RenderPassBuilder<'_> {
    inject_pass_builder_methods!();
    inject_shader_pass_builder_methods!();

    /// Next color attachment slot, covering the whole texture.
    #[inline]
    pub fn color(self, texture: &RenderGraphResource<Texture>, info: ColorAttachment) -> Self {
        self.color_range(texture, TextureSubresource::WHOLE, info)
    }

    pub fn color_range(
        mut self,
        texture: &RenderGraphResource<Texture>,
        range: TextureSubresource,
        info: ColorAttachment,
    ) -> Self {
        let slot = self.common.next_color_slot();
        self.common.attach(texture, TextureState::Color, range, Attachment::Color { slot, info });
        self
    }

    pub fn depth_stencil(mut self, texture: &RenderGraphResource<Texture>, info: DepthStencilAttachment) -> Self {
        let state = if info.read_only {
            TextureState::DepthStencilReadOnly
        } else {
            TextureState::DepthStencil
        };
        self.common.attach(texture, state, TextureSubresource::WHOLE, Attachment::DepthStencil(info));
        self
    }
}

pub struct ComputePassBuilder<'a> {
    common: PassBuilder<'a>,
}

impl ComputePassBuilder<'_> {
    inject_pass_builder_methods!();
    inject_shader_pass_builder_methods!();
}

pub struct RayTracingPassBuilder<'a> {
    common: PassBuilder<'a>,
}

impl RayTracingPassBuilder<'_> {
    inject_pass_builder_methods!();
    inject_shader_pass_builder_methods!();
}

pub struct CopyPassBuilder<'a> {
    common: PassBuilder<'a>,
}

impl CopyPassBuilder<'_> {
    inject_pass_builder_methods!();

    #[inline]
    pub fn copy_source<R: GraphCopyable>(mut self, resource: &RenderGraphResource<R>) -> Self {
        self.common.access(resource, R::TRANSFER_SRC, R::Range::default(), false);
        self
    }

    #[inline]
    pub fn copy_destination<R: GraphCopyable>(mut self, resource: &RenderGraphResource<R>) -> Self {
        self.common.access(resource, R::TRANSFER_DST, R::Range::default(), false);
        self
    }
}

pub struct PresentPassBuilder<'a> {
    common: PassBuilder<'a>,
}

impl PresentPassBuilder<'_> {
    pub fn present(mut self, texture: &RenderGraphResource<Texture>) -> Self {
        self.common.access(texture, TextureState::Present, TextureSubresource::WHOLE, false);
        self
    }

    #[inline]
    pub fn execute<F>(mut self, job: F) -> Self
    where
        F: FnOnce(&mut PassContext) + 'static,
    {
        self.common.execute(job);
        self
    }

    #[inline]
    pub fn finish(self) -> RenderGraphPass {
        self.common.finish()
    }
}

/// Resources with transfer states.
pub trait GraphCopyable: GraphResource {
    const TRANSFER_SRC: Self::State;
    const TRANSFER_DST: Self::State;
}

impl GraphCopyable for Texture {
    const TRANSFER_SRC: TextureState = TextureState::TransferSrc;
    const TRANSFER_DST: TextureState = TextureState::TransferDst;
}

impl GraphCopyable for Buffer {
    const TRANSFER_SRC: BufferState = BufferState::TransferSrc;
    const TRANSFER_DST: BufferState = BufferState::TransferDst;
}
