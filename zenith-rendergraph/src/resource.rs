use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;
use zenith_rhi::{vk, PipelineStages, RenderDevice};
use crate::dependency::NodeId;
use crate::edge::{Edge, ResourceEdge};
use crate::graph::BarrierBatch;
use crate::node::{Node, ResourceNode};
use crate::pool::{RenderGraphPools, ResourcePool};

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// Backend resource the graph can track (texture or buffer).
pub trait GraphResource: Sized + Debug + sealed::Sealed + 'static {
    type Descriptor: Clone + Eq + Hash + Debug;
    type State: Copy + Eq + Debug;
    /// Sub-range of the resource. `Default` is the whole resource.
    type Range: Copy + Eq + Debug + Default;

    const KIND: &'static str;
    const UNDEFINED: Self::State;
    /// State of a shader read edge.
    const SHADER_RESOURCE: Self::State;
    /// State of a shader read-write edge.
    const UNORDERED_ACCESS: Self::State;

    fn name(&self) -> &str;

    fn desc(&self) -> &Self::Descriptor;

    #[doc(hidden)]
    fn as_node(node: &Node) -> Option<&ResourceNode<Self>>;
    #[doc(hidden)]
    fn as_node_mut(node: &mut Node) -> Option<&mut ResourceNode<Self>>;
    #[doc(hidden)]
    fn as_edge(edge: &Edge) -> Option<&ResourceEdge<Self>>;
    #[doc(hidden)]
    fn wrap_node(node: ResourceNode<Self>) -> Node;
    #[doc(hidden)]
    fn wrap_edge(edge: ResourceEdge<Self>) -> Edge;

    #[doc(hidden)]
    fn pool(pools: &mut RenderGraphPools) -> &mut ResourcePool<Self::Descriptor, Arc<Self>, Self::State>;
    #[doc(hidden)]
    fn create(device: &dyn RenderDevice, desc: &Self::Descriptor) -> Result<Self, vk::Result>;

    #[doc(hidden)]
    fn is_shader_writable(state: Self::State) -> bool;
    #[doc(hidden)]
    fn push_barrier(
        &self,
        range: Self::Range,
        src: (Self::State, PipelineStages),
        dst: (Self::State, PipelineStages),
        batch: &mut BarrierBatch,
    );
}

/// Handle of a resource node declared in a [`crate::RenderGraphBuilder`].
///
/// ## Safety
/// Used in the same render graph context. Should NOT be used across multiple render graph.
pub struct RenderGraphResource<R: GraphResource> {
    pub(crate) id: NodeId,
    pub(crate) _marker: PhantomData<fn() -> R>,
}

impl<R: GraphResource> RenderGraphResource<R> {
    pub(crate) fn new(id: NodeId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// Sentinel returned by failed lookups.
    pub fn invalid() -> Self {
        Self::new(NodeId::INVALID)
    }

    pub fn valid(&self) -> bool {
        self.id != NodeId::INVALID
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl<R: GraphResource> Clone for RenderGraphResource<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: GraphResource> Copy for RenderGraphResource<R> {}

impl<R: GraphResource> PartialEq for RenderGraphResource<R> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<R: GraphResource> Eq for RenderGraphResource<R> {}

impl<R: GraphResource> Hash for RenderGraphResource<R> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<R: GraphResource> Debug for RenderGraphResource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RenderGraphResource<{}>({})", R::KIND, self.id)
    }
}

/// Handle of a pass node declared in a [`crate::RenderGraphBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderGraphPass {
    pub(crate) id: NodeId,
}

impl RenderGraphPass {
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }
}
