//! Render graph topology and the state queries barrier insertion is built on.

use log::{trace, warn};
use zenith_core::collections::hashmap::HashMap;
use zenith_core::collections::SmallVec;
use zenith_rhi::{BufferBarrier, CommandEncoder, PipelineStage, PipelineStages, TextureBarrier};
use crate::dependency::{DependencyGraph, EdgeId, NodeId};
use crate::edge::{Edge, ResourceEdge};
use crate::node::{Node, PassNode, ResourceNode};
use crate::resource::{GraphResource, RenderGraphPass, RenderGraphResource};

/// Barriers of one side of one pass, flushed with a single `pipeline_barrier` call.
#[derive(Debug, Default)]
pub struct BarrierBatch {
    pub(crate) textures: SmallVec<[TextureBarrier; 8]>,
    pub(crate) buffers: SmallVec<[BufferBarrier; 8]>,
}

impl BarrierBatch {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty() && self.buffers.is_empty()
    }

    #[inline]
    pub fn textures(&self) -> &[TextureBarrier] {
        &self.textures
    }

    #[inline]
    pub fn buffers(&self) -> &[BufferBarrier] {
        &self.buffers
    }

    /// Record the batch if it holds anything.
    pub(crate) fn flush(&mut self, encoder: &mut dyn CommandEncoder) {
        if !self.is_empty() {
            encoder.pipeline_barrier(&self.textures, &self.buffers);
            self.textures.clear();
            self.buffers.clear();
        }
    }
}

/// Resource and pass nodes of one frame, with per-pass and per-resource edge indexes.
#[derive(Default)]
pub struct RenderGraph {
    pub(crate) graph: DependencyGraph<Node, Edge>,
    pub(crate) passes: Vec<NodeId>,
    pass_edges: HashMap<NodeId, SmallVec<[EdgeId; 16]>>,
    resource_edges: HashMap<NodeId, SmallVec<[EdgeId; 8]>>,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_resource<R: GraphResource>(&mut self, node: ResourceNode<R>) -> NodeId {
        self.graph.create_node(R::wrap_node(node))
    }

    pub(crate) fn add_pass(&mut self, node: PassNode) -> NodeId {
        let id = self.graph.create_node(node.into());
        self.passes.push(id);
        id
    }

    /// Output edges point from the pass to the resource, inputs the other way round.
    pub(crate) fn add_edge<R: GraphResource>(
        &mut self,
        pass: NodeId,
        resource: NodeId,
        edge: ResourceEdge<R>,
    ) -> EdgeId {
        let output = edge.output;
        let id = self.graph.create_edge(R::wrap_edge(edge));
        if output {
            self.graph.link(pass, resource, id);
        } else {
            self.graph.link(resource, pass, id);
        }

        self.pass_edges.entry(pass).or_default().push(id);
        self.resource_edges.entry(resource).or_default().push(id);
        id
    }

    /// `(pass, resource)` of a linked edge.
    pub(crate) fn edge_link(&self, edge: EdgeId) -> Option<(NodeId, NodeId)> {
        let (from, to) = self.graph.endpoints(edge)?;
        match self.graph.node_value(from) {
            Some(Node::Pass(_)) => Some((from, to)),
            _ => Some((to, from)),
        }
    }

    #[inline]
    pub fn num_passes(&self) -> usize {
        self.passes.len()
    }

    #[inline]
    pub fn num_resources(&self) -> usize {
        self.graph.num_nodes() - self.passes.len()
    }

    #[inline]
    pub fn num_edges(&self) -> usize {
        self.graph.num_edges()
    }

    pub fn resource<R: GraphResource>(&self, resource: &RenderGraphResource<R>) -> Option<&ResourceNode<R>> {
        self.resource_node(resource.id)
    }

    pub fn pass(&self, pass: RenderGraphPass) -> Option<&PassNode> {
        self.pass_node(pass.id)
    }

    #[inline]
    pub(crate) fn resource_node<R: GraphResource>(&self, id: NodeId) -> Option<&ResourceNode<R>> {
        self.graph.node_value(id).and_then(R::as_node)
    }

    #[inline]
    pub(crate) fn resource_node_mut<R: GraphResource>(&mut self, id: NodeId) -> Option<&mut ResourceNode<R>> {
        self.graph.node_value_mut(id).and_then(R::as_node_mut)
    }

    #[inline]
    pub(crate) fn pass_node(&self, id: NodeId) -> Option<&PassNode> {
        self.graph.node::<PassNode>(id)
    }

    #[inline]
    pub(crate) fn pass_node_mut(&mut self, id: NodeId) -> Option<&mut PassNode> {
        self.graph.node_mut::<PassNode>(id)
    }

    #[inline]
    pub(crate) fn edge<R: GraphResource>(&self, id: EdgeId) -> Option<&ResourceEdge<R>> {
        self.graph.edge_value(id).and_then(R::as_edge)
    }

    /// Edges of kind `R` declared by `pass`, as `(edge, resource, value)` in declaration order.
    pub(crate) fn pass_edges<'a, R: GraphResource>(
        &'a self,
        pass: NodeId,
    ) -> impl Iterator<Item = (EdgeId, NodeId, &'a ResourceEdge<R>)> + 'a {
        self.pass_edges
            .get(&pass)
            .into_iter()
            .flat_map(|edges| edges.iter().copied())
            .filter_map(move |id| {
                let edge = self.edge::<R>(id)?;
                let (_, resource) = self.edge_link(id)?;
                Some((id, resource, edge))
            })
    }

    /// Edges touching `resource`, as `(edge, pass, value)` in declaration order.
    pub(crate) fn resource_edges<'a, R: GraphResource>(
        &'a self,
        resource: NodeId,
    ) -> impl Iterator<Item = (EdgeId, NodeId, &'a ResourceEdge<R>)> + 'a {
        self.resource_edges
            .get(&resource)
            .into_iter()
            .flat_map(|edges| edges.iter().copied())
            .filter_map(move |id| {
                let edge = self.edge::<R>(id)?;
                let (pass, _) = self.edge_link(id)?;
                Some((id, pass, edge))
            })
    }

    /// State `resource` is in right before `pass` accesses `range` on the given side.
    ///
    /// Only edges whose range equals `range` or covers the whole resource are
    /// considered. Without any earlier access the initial state is returned.
    pub fn previous_state<R: GraphResource>(
        &self,
        resource: &RenderGraphResource<R>,
        pass: RenderGraphPass,
        range: R::Range,
        output: bool,
    ) -> R::State {
        self.previous_access::<R>(resource.id, pass.id, range, output).0
    }

    /// Whether no access to `resource` follows the `output` side of `pass`.
    pub fn is_last_used_pass<R: GraphResource>(
        &self,
        resource: &RenderGraphResource<R>,
        pass: RenderGraphPass,
        output: bool,
    ) -> bool {
        self.is_last_user::<R>(resource.id, pass.id, output)
    }

    /// Previous state and the pass that left the resource in it.
    pub(crate) fn previous_access<R: GraphResource>(
        &self,
        resource: NodeId,
        pass: NodeId,
        range: R::Range,
        output: bool,
    ) -> (R::State, Option<NodeId>) {
        let whole = R::Range::default();
        let previous = self
            .resource_edges::<R>(resource)
            .filter(|(_, _, edge)| edge.range == range || edge.range == whole)
            .filter(|(_, edge_pass, edge)| {
                *edge_pass < pass || (output && *edge_pass == pass && !edge.output)
            })
            .max_by_key(|(id, edge_pass, edge)| (*edge_pass, edge.output, *id));

        match previous {
            Some((_, edge_pass, edge)) => {
                let state = self.side_state::<R>(edge_pass, resource, edge.range, edge.output).unwrap_or(edge.state);
                (state, Some(edge_pass))
            }
            None => {
                let initial = self
                    .resource_node::<R>(resource)
                    .map(ResourceNode::initial_state)
                    .unwrap_or(R::UNDEFINED);
                (initial, None)
            }
        }
    }

    /// Edge deciding the state of `range` of `resource` on one side of `pass`.
    ///
    /// A range bound several times shares one state. Attachments win, then the latest declared edge.
    pub(crate) fn governing_edge<R: GraphResource>(
        &self,
        pass: NodeId,
        resource: NodeId,
        range: R::Range,
        output: bool,
    ) -> Option<(EdgeId, &ResourceEdge<R>)> {
        self.pass_edges::<R>(pass)
            .filter(|(_, res, edge)| *res == resource && edge.range == range && edge.output == output)
            .max_by_key(|(id, _, edge)| (edge.attachment.is_some(), *id))
            .map(|(id, _, edge)| (id, edge))
    }

    #[inline]
    pub(crate) fn side_state<R: GraphResource>(
        &self,
        pass: NodeId,
        resource: NodeId,
        range: R::Range,
        output: bool,
    ) -> Option<R::State> {
        self.governing_edge::<R>(pass, resource, range, output).map(|(_, edge)| edge.state)
    }

    pub(crate) fn is_last_user<R: GraphResource>(&self, resource: NodeId, pass: NodeId, output: bool) -> bool {
        !self
            .resource_edges::<R>(resource)
            .any(|(_, edge_pass, edge)| edge_pass > pass || (!output && edge_pass == pass && edge.output))
    }

    /// Transitions needed by the `output` side edges of `pass`, pushed into `batch`.
    pub(crate) fn collect_barriers<R: GraphResource>(&self, pass: NodeId, output: bool, batch: &mut BarrierBatch) {
        let Some(pass_node) = self.pass_node(pass) else {
            return;
        };
        let dst_stage = pass_node.kind.stages();

        for (id, resource, edge) in self.pass_edges::<R>(pass).filter(|(_, _, edge)| edge.output == output) {
            // One transition per range, however many bindings share it.
            if self.governing_edge::<R>(pass, resource, edge.range, output).map(|(governing, _)| governing) != Some(id) {
                continue;
            }
            let Some(node) = self.resource_node::<R>(resource) else {
                continue;
            };
            let Some(handle) = node.handle.as_ref() else {
                warn!("Resource[{}] is not resolved before barriers of pass[{}]!", node.name, pass_node.name);
                continue;
            };

            let (src_state, previous_pass) = self.previous_access::<R>(resource, pass, edge.range, output);
            let dst_state = edge.state;
            if src_state == dst_state && !(R::is_shader_writable(src_state) && R::is_shader_writable(dst_state)) {
                continue;
            }

            let src_stage = previous_pass
                .and_then(|previous| self.pass_node(previous))
                .map(|previous| previous.kind.stages())
                .unwrap_or_else(|| PipelineStages::from(PipelineStage::AllCommands));

            trace!(
                "Pass[{}] {} barrier on {}[{}]: {:?} -> {:?}",
                pass_node.name,
                if output { "output" } else { "input" },
                R::KIND,
                node.name,
                src_state,
                dst_state,
            );
            handle.push_barrier(edge.range, (src_state, src_stage), (dst_state, dst_stage), batch);
        }
    }
}
