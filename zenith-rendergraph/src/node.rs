use std::sync::Arc;
use derive_more::From;
use zenith_core::collections::SmallVec;
use zenith_rhi::{vk, Buffer, DescriptorSet, PipelineStage, PipelineStages, RootSignature, Texture};
use crate::dependency::{impl_variant, EdgeId};
use crate::execute::PassContext;
use crate::resource::GraphResource;

/// Resource node: descriptor, initial state and the lazily resolved backend object.
pub struct ResourceNode<R: GraphResource> {
    pub(crate) name: String,
    pub(crate) desc: R::Descriptor,
    pub(crate) imported: bool,
    pub(crate) initial_state: R::State,
    pub(crate) handle: Option<Arc<R>>,
}

impl<R: GraphResource> ResourceNode<R> {
    pub(crate) fn new(name: &str, desc: R::Descriptor) -> Self {
        Self {
            name: name.to_owned(),
            desc,
            imported: false,
            initial_state: R::UNDEFINED,
            handle: None,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn desc(&self) -> &R::Descriptor {
        &self.desc
    }

    #[inline]
    pub fn is_imported(&self) -> bool {
        self.imported
    }

    #[inline]
    pub fn initial_state(&self) -> R::State {
        self.initial_state
    }

    #[inline]
    pub fn handle(&self) -> Option<&Arc<R>> {
        self.handle.as_ref()
    }
}

pub type TextureNode = ResourceNode<Texture>;
pub type BufferNode = ResourceNode<Buffer>;

/// Render-target data of a render pass, in attachment declaration order.
#[derive(Debug, Default)]
pub struct RenderPassData {
    pub(crate) color_attachments: SmallVec<[EdgeId; 8]>,
    pub(crate) depth_stencil_attachment: Option<EdgeId>,
    /// First declared attachment, which defines the render extent and layer count.
    pub(crate) first_attachment: Option<EdgeId>,
}

#[derive(Debug)]
pub enum PassKind {
    Render(RenderPassData),
    Compute,
    RayTracing,
    Copy,
    Present,
}

impl PassKind {
    /// Pipeline stages a pass of this kind executes in.
    pub fn stages(&self) -> PipelineStages {
        match self {
            PassKind::Render(_) => PipelineStages::from(PipelineStage::VertexShader) | PipelineStage::FragmentShader,
            PassKind::Compute => PipelineStage::ComputeShader.into(),
            PassKind::RayTracing => PipelineStage::RayTracingShader.into(),
            PassKind::Copy => PipelineStage::Transfer.into(),
            PassKind::Present => PipelineStage::BottomOfPipe.into(),
        }
    }

    pub fn bind_point(&self) -> Option<vk::PipelineBindPoint> {
        match self {
            PassKind::Render(_) => Some(vk::PipelineBindPoint::GRAPHICS),
            PassKind::Compute => Some(vk::PipelineBindPoint::COMPUTE),
            PassKind::RayTracing => Some(vk::PipelineBindPoint::RAY_TRACING_KHR),
            PassKind::Copy | PassKind::Present => None,
        }
    }
}

pub(crate) type PassCallback = Box<dyn FnOnce(&mut PassContext)>;

pub struct PassNode {
    pub(crate) name: String,
    pub(crate) kind: PassKind,
    pub(crate) root_signature: Option<Arc<RootSignature>>,
    /// Externally bound descriptor sets, by set index.
    pub(crate) bound_sets: SmallVec<[(u32, DescriptorSet); 4]>,
    pub(crate) pass_index: Option<[u32; 3]>,
    // Never set by the builder yet.
    pub(crate) culled: bool,
    pub(crate) callback: Option<PassCallback>,
}

impl PassNode {
    pub(crate) fn new(name: &str, kind: PassKind) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            root_signature: None,
            bound_sets: SmallVec::new(),
            pass_index: None,
            culled: false,
            callback: None,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> &PassKind {
        &self.kind
    }

    #[inline]
    pub fn is_culled(&self) -> bool {
        self.culled
    }

    pub(crate) fn bound_set(&self, set: u32) -> Option<&DescriptorSet> {
        self.bound_sets.iter().find(|(index, _)| *index == set).map(|(_, s)| s)
    }
}

#[derive(From)]
pub enum Node {
    Texture(TextureNode),
    Buffer(BufferNode),
    Pass(PassNode),
}

impl_variant!(Node { Texture(TextureNode), Buffer(BufferNode), Pass(PassNode) });

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Texture(node) => node.name(),
            Node::Buffer(node) => node.name(),
            Node::Pass(node) => node.name(),
        }
    }
}
