use std::sync::Arc;
use zenith_rhi::{vk, PipelineStages, RenderDevice};
use zenith_rhi::{BufferBarrier, TextureBarrier};
use crate::edge::{Edge, ResourceEdge};
use crate::graph::BarrierBatch;
use crate::node::{Node, ResourceNode};
use crate::pool::{RenderGraphPools, ResourcePool};
use crate::dependency::Variant;
use crate::resource::{sealed, GraphResource};

pub(crate) type Buffer = zenith_rhi::Buffer;
pub(crate) type BufferDesc = zenith_rhi::BufferDesc;
pub(crate) type BufferState = zenith_rhi::BufferState;
pub(crate) type BufferRange = zenith_rhi::BufferRange;

pub(crate) type Texture = zenith_rhi::Texture;
pub(crate) type TextureDesc = zenith_rhi::TextureDesc;
pub(crate) type TextureState = zenith_rhi::TextureState;
pub(crate) type TextureSubresource = zenith_rhi::TextureSubresource;

impl sealed::Sealed for Buffer {}

impl GraphResource for Buffer {
    type Descriptor = BufferDesc;
    type State = BufferState;
    type Range = BufferRange;

    const KIND: &'static str = "buffer";
    const UNDEFINED: BufferState = BufferState::Undefined;
    const SHADER_RESOURCE: BufferState = BufferState::ShaderRead;
    const UNORDERED_ACCESS: BufferState = BufferState::Storage;

    fn name(&self) -> &str {
        Buffer::name(self)
    }

    fn desc(&self) -> &BufferDesc {
        Buffer::desc(self)
    }

    #[doc(hidden)]
    fn as_node(node: &Node) -> Option<&ResourceNode<Self>> {
        node.as_variant()
    }

    #[doc(hidden)]
    fn as_node_mut(node: &mut Node) -> Option<&mut ResourceNode<Self>> {
        node.as_variant_mut()
    }

    #[doc(hidden)]
    fn as_edge(edge: &Edge) -> Option<&ResourceEdge<Self>> {
        edge.as_variant()
    }

    #[doc(hidden)]
    fn wrap_node(node: ResourceNode<Self>) -> Node {
        node.into()
    }

    #[doc(hidden)]
    fn wrap_edge(edge: ResourceEdge<Self>) -> Edge {
        edge.into()
    }

    #[doc(hidden)]
    fn pool(pools: &mut RenderGraphPools) -> &mut ResourcePool<BufferDesc, Arc<Self>, BufferState> {
        &mut pools.buffers
    }

    #[doc(hidden)]
    fn create(device: &dyn RenderDevice, desc: &BufferDesc) -> Result<Self, vk::Result> {
        device.create_buffer(desc)
    }

    #[doc(hidden)]
    fn is_shader_writable(state: BufferState) -> bool {
        state.is_shader_writable()
    }

    #[doc(hidden)]
    fn push_barrier(
        &self,
        range: BufferRange,
        (src_state, src_stage): (BufferState, PipelineStages),
        (dst_state, dst_stage): (BufferState, PipelineStages),
        batch: &mut BarrierBatch,
    ) {
        batch.buffers.push(
            BufferBarrier::new(self.handle(), src_state, dst_state, src_stage, dst_stage)
                .with_range(range.offset, range.size),
        );
    }
}

impl sealed::Sealed for Texture {}

impl GraphResource for Texture {
    type Descriptor = TextureDesc;
    type State = TextureState;
    type Range = TextureSubresource;

    const KIND: &'static str = "texture";
    const UNDEFINED: TextureState = TextureState::Undefined;
    const SHADER_RESOURCE: TextureState = TextureState::Sampled;
    const UNORDERED_ACCESS: TextureState = TextureState::Storage;

    fn name(&self) -> &str {
        Texture::name(self)
    }

    fn desc(&self) -> &TextureDesc {
        Texture::desc(self)
    }

    #[doc(hidden)]
    fn as_node(node: &Node) -> Option<&ResourceNode<Self>> {
        node.as_variant()
    }

    #[doc(hidden)]
    fn as_node_mut(node: &mut Node) -> Option<&mut ResourceNode<Self>> {
        node.as_variant_mut()
    }

    #[doc(hidden)]
    fn as_edge(edge: &Edge) -> Option<&ResourceEdge<Self>> {
        edge.as_variant()
    }

    #[doc(hidden)]
    fn wrap_node(node: ResourceNode<Self>) -> Node {
        node.into()
    }

    #[doc(hidden)]
    fn wrap_edge(edge: ResourceEdge<Self>) -> Edge {
        edge.into()
    }

    #[doc(hidden)]
    fn pool(pools: &mut RenderGraphPools) -> &mut ResourcePool<TextureDesc, Arc<Self>, TextureState> {
        &mut pools.textures
    }

    #[doc(hidden)]
    fn create(device: &dyn RenderDevice, desc: &TextureDesc) -> Result<Self, vk::Result> {
        device.create_texture(desc)
    }

    #[doc(hidden)]
    fn is_shader_writable(state: TextureState) -> bool {
        state.is_shader_writable()
    }

    #[doc(hidden)]
    fn push_barrier(
        &self,
        range: TextureSubresource,
        (src_state, src_stage): (TextureState, PipelineStages),
        (dst_state, dst_stage): (TextureState, PipelineStages),
        batch: &mut BarrierBatch,
    ) {
        batch.textures.push(
            TextureBarrier::new(self.handle(), self.aspect(), src_state, dst_state, src_stage, dst_stage)
                .with_subresource(range),
        );
    }
}
