//! Generic directed graph with typed node/edge payloads.

use derive_more::Display;
use zenith_core::collections::SmallVec;

/// Creation-order identifier of a node. Smaller ids were declared earlier.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[display("node#{_0}")]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) const INVALID: NodeId = NodeId(u32::MAX);

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[display("edge#{_0}")]
pub struct EdgeId(pub(crate) u32);

impl EdgeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Typed view into one variant of a payload enum.
pub trait Variant<T> {
    fn as_variant(&self) -> Option<&T>;
    fn as_variant_mut(&mut self) -> Option<&mut T>;
}

macro_rules! impl_variant {
    ($enum_ty:ty { $($variant:ident($payload:ty)),+ $(,)? }) => {
        $(
            impl $crate::dependency::Variant<$payload> for $enum_ty {
                #[inline]
                fn as_variant(&self) -> Option<&$payload> {
                    match self {
                        Self::$variant(value) => Some(value),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }

                #[inline]
                fn as_variant_mut(&mut self) -> Option<&mut $payload> {
                    match self {
                        Self::$variant(value) => Some(value),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }
            }
        )+
    };
}

pub(crate) use impl_variant;

struct NodeEntry<N> {
    value: N,
    incoming: SmallVec<[EdgeId; 8]>,
    outgoing: SmallVec<[EdgeId; 8]>,
}

struct EdgeEntry<E> {
    value: E,
    endpoints: Option<(NodeId, NodeId)>,
}

/// Arena owning nodes and edges, addressed by [`NodeId`] / [`EdgeId`].
pub struct DependencyGraph<N, E> {
    nodes: Vec<NodeEntry<N>>,
    edges: Vec<EdgeEntry<E>>,
}

impl<N, E> Default for DependencyGraph<N, E> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }
}

impl<N, E> DependencyGraph<N, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_node(&mut self, value: N) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeEntry {
            value,
            incoming: SmallVec::new(),
            outgoing: SmallVec::new(),
        });
        id
    }

    /// Create an unlinked edge. It must be linked exactly once with [`Self::link`].
    pub fn create_edge(&mut self, value: E) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(EdgeEntry {
            value,
            endpoints: None,
        });
        id
    }

    /// Link `edge` from `from` to `to`.
    ///
    /// # Panics
    /// When the edge is already linked or any id is unknown.
    pub fn link(&mut self, from: NodeId, to: NodeId, edge: EdgeId) {
        assert!(from.index() < self.nodes.len(), "Link from unknown node {from}!");
        assert!(to.index() < self.nodes.len(), "Link to unknown node {to}!");

        let entry = self.edges
            .get_mut(edge.index())
            .unwrap_or_else(|| panic!("Link with unknown edge {edge}!"));
        assert!(entry.endpoints.is_none(), "Edge {edge} is linked twice!");
        entry.endpoints = Some((from, to));

        self.nodes[from.index()].outgoing.push(edge);
        self.nodes[to.index()].incoming.push(edge);
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn node_value(&self, id: NodeId) -> Option<&N> {
        self.nodes.get(id.index()).map(|n| &n.value)
    }

    #[inline]
    pub fn node_value_mut(&mut self, id: NodeId) -> Option<&mut N> {
        self.nodes.get_mut(id.index()).map(|n| &mut n.value)
    }

    #[inline]
    pub fn edge_value(&self, id: EdgeId) -> Option<&E> {
        self.edges.get(id.index()).map(|e| &e.value)
    }

    #[inline]
    pub fn edge_value_mut(&mut self, id: EdgeId) -> Option<&mut E> {
        self.edges.get_mut(id.index()).map(|e| &mut e.value)
    }

    /// `(from, to)` of a linked edge.
    #[inline]
    pub fn endpoints(&self, edge: EdgeId) -> Option<(NodeId, NodeId)> {
        self.edges.get(edge.index()).and_then(|e| e.endpoints)
    }

    pub fn node<T>(&self, id: NodeId) -> Option<&T>
    where
        N: Variant<T>,
    {
        self.node_value(id).and_then(Variant::as_variant)
    }

    pub fn node_mut<T>(&mut self, id: NodeId) -> Option<&mut T>
    where
        N: Variant<T>,
    {
        self.node_value_mut(id).and_then(Variant::as_variant_mut)
    }

    pub fn edge<T>(&self, id: EdgeId) -> Option<&T>
    where
        E: Variant<T>,
    {
        self.edge_value(id).and_then(Variant::as_variant)
    }

    /// Edges of type `T` pointing into `id`, in link order.
    pub fn in_edges<'a, T: 'a>(&'a self, id: NodeId) -> impl Iterator<Item = (EdgeId, &'a T)> + 'a
    where
        E: Variant<T>,
    {
        self.nodes
            .get(id.index())
            .into_iter()
            .flat_map(|n| n.incoming.iter().copied())
            .filter_map(move |e| self.edge::<T>(e).map(|value| (e, value)))
    }

    /// Edges of type `T` leaving `id`, in link order.
    pub fn out_edges<'a, T: 'a>(&'a self, id: NodeId) -> impl Iterator<Item = (EdgeId, &'a T)> + 'a
    where
        E: Variant<T>,
    {
        self.nodes
            .get(id.index())
            .into_iter()
            .flat_map(|n| n.outgoing.iter().copied())
            .filter_map(move |e| self.edge::<T>(e).map(|value| (e, value)))
    }
}
