use derive_builder::Builder;
use derive_more::From;
use zenith_rhi::{vk, Buffer, ClearValue, Texture};
use crate::dependency::impl_variant;
use crate::resource::GraphResource;

/// Descriptor binding coordinates of a shader resource edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingSlot {
    pub set: u32,
    pub binding: u32,
    pub array_index: u32,
}

impl BindingSlot {
    pub fn new(set: u32, binding: u32) -> Self {
        Self { set, binding, array_index: 0 }
    }

    pub fn with_array_index(mut self, array_index: u32) -> Self {
        self.array_index = array_index;
        self
    }
}

impl From<(u32, u32)> for BindingSlot {
    fn from((set, binding): (u32, u32)) -> Self {
        Self::new(set, binding)
    }
}

impl From<(u32, u32, u32)> for BindingSlot {
    fn from((set, binding, array_index): (u32, u32, u32)) -> Self {
        Self { set, binding, array_index }
    }
}

#[derive(Clone, Debug, Builder)]
#[builder(setter(into))]
pub struct ColorAttachment {
    #[builder(default = "vk::AttachmentLoadOp::CLEAR")]
    pub load_op: vk::AttachmentLoadOp,
    #[builder(default = "vk::AttachmentStoreOp::STORE")]
    pub store_op: vk::AttachmentStoreOp,
    #[builder(default = "[0.0, 0.0, 0.0, 1.0]")]
    pub clear_value: [f32; 4],
}

impl Default for ColorAttachment {
    fn default() -> Self {
        Self {
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            clear_value: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl ColorAttachment {
    /// Keep previous contents.
    pub fn load() -> Self {
        Self {
            load_op: vk::AttachmentLoadOp::LOAD,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Builder)]
#[builder(setter(into))]
pub struct DepthStencilAttachment {
    #[builder(default = "vk::AttachmentLoadOp::CLEAR")]
    pub load_op: vk::AttachmentLoadOp,
    #[builder(default = "vk::AttachmentStoreOp::STORE")]
    pub store_op: vk::AttachmentStoreOp,
    #[builder(default = "1.0")]
    pub depth_clear_value: f32,
    #[builder(default)]
    pub stencil_clear_value: u32,
    /// Depth test without depth writes.
    #[builder(default)]
    pub read_only: bool,
}

impl Default for DepthStencilAttachment {
    fn default() -> Self {
        Self {
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            depth_clear_value: 1.0,
            stencil_clear_value: 0,
            read_only: false,
        }
    }
}

#[derive(Clone, Debug)]
pub enum Attachment {
    Color {
        slot: u32,
        info: ColorAttachment,
    },
    DepthStencil(DepthStencilAttachment),
}

impl Attachment {
    pub(crate) fn ops(&self) -> (vk::AttachmentLoadOp, vk::AttachmentStoreOp, ClearValue) {
        match self {
            Attachment::Color { info, .. } => (info.load_op, info.store_op, ClearValue::Color(info.clear_value)),
            Attachment::DepthStencil(info) => (
                info.load_op,
                info.store_op,
                ClearValue::DepthStencil {
                    depth: info.depth_clear_value,
                    stencil: info.stencil_clear_value,
                },
            ),
        }
    }
}

/// Access of one pass to one resource.
///
/// Input edges link resource to pass and output edges link pass to resource.
#[derive(Debug)]
pub struct ResourceEdge<R: GraphResource> {
    pub(crate) state: R::State,
    pub(crate) output: bool,
    pub(crate) range: R::Range,
    pub(crate) binding: Option<BindingSlot>,
    /// Render-target info, textures only.
    pub(crate) attachment: Option<Attachment>,
}

impl<R: GraphResource> ResourceEdge<R> {
    pub(crate) fn new(state: R::State, output: bool, range: R::Range) -> Self {
        Self {
            state,
            output,
            range,
            binding: None,
            attachment: None,
        }
    }

    #[inline]
    pub fn state(&self) -> R::State {
        self.state
    }

    #[inline]
    pub fn is_output(&self) -> bool {
        self.output
    }

    #[inline]
    pub fn range(&self) -> R::Range {
        self.range
    }

    #[inline]
    pub fn binding(&self) -> Option<BindingSlot> {
        self.binding
    }

    /// Whether the edge is a shader read or shader read-write access.
    pub(crate) fn is_shader_access(&self) -> bool {
        self.state == R::SHADER_RESOURCE || self.state == R::UNORDERED_ACCESS
    }
}

pub type TextureEdge = ResourceEdge<Texture>;
pub type BufferEdge = ResourceEdge<Buffer>;

#[derive(From)]
pub enum Edge {
    Texture(TextureEdge),
    Buffer(BufferEdge),
}

impl_variant!(Edge { Texture(TextureEdge), Buffer(BufferEdge) });
