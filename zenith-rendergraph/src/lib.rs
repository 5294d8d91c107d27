//! Zenith render graph.
//!
//! Passes declare the textures and buffers they touch through a
//! [`RenderGraphBuilder`]; [`RenderGraphBuilder::execute`] then backs them
//! with pooled objects, inserts the barriers between accesses, prepares
//! descriptor sets and records every pass in declaration order.

mod blackboard;
mod builder;
mod config;
mod dependency;
mod edge;
mod execute;
mod graph;
mod interface;
mod node;
mod pool;
mod resource;

pub use blackboard::Blackboard;
pub use builder::{
    BufferBuilder, ComputePassBuilder, CopyPassBuilder, GraphCopyable, PassBuilder,
    PresentPassBuilder, RayTracingPassBuilder, RenderGraphBuilder, RenderPassBuilder,
    ResourceBuilder, TextureBuilder,
};
pub use config::{RenderGraphConfig, RenderGraphConfigBuilder, RenderGraphConfigBuilderError};
pub use dependency::{DependencyGraph, EdgeId, NodeId, Variant};
pub use edge::{
    Attachment, BindingSlot, BufferEdge, ColorAttachment, ColorAttachmentBuilder,
    ColorAttachmentBuilderError, DepthStencilAttachment, DepthStencilAttachmentBuilder,
    DepthStencilAttachmentBuilderError, Edge, ResourceEdge, TextureEdge,
};
pub use execute::PassContext;
pub use graph::{BarrierBatch, RenderGraph};
pub use node::{BufferNode, Node, PassKind, PassNode, RenderPassData, ResourceNode, TextureNode};
pub use pool::{
    BufferPool, DescriptorSetPool, PoolStats, RenderGraphPools, ResourcePool, TexturePool,
    TextureViewPool,
};
pub use resource::{GraphResource, RenderGraphPass, RenderGraphResource};
