//! Command recording seam.

use ash::vk;
use zenith_core::collections::SmallVec;
use crate::barrier::{BufferBarrier, TextureBarrier};

/// Clear value of a render target attachment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

impl Default for ClearValue {
    fn default() -> Self {
        ClearValue::Color([0.0, 0.0, 0.0, 0.0])
    }
}

impl ClearValue {
    pub fn to_vk(self) -> vk::ClearValue {
        match self {
            ClearValue::Color(float32) => vk::ClearValue {
                color: vk::ClearColorValue { float32 },
            },
            ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
            },
        }
    }
}

/// A single attachment of a dynamic rendering scope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderingAttachment {
    pub view: vk::ImageView,
    pub layout: vk::ImageLayout,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
    pub clear: ClearValue,
}

impl RenderingAttachment {
    pub fn to_vk(&self) -> vk::RenderingAttachmentInfo<'static> {
        vk::RenderingAttachmentInfo::default()
            .image_view(self.view)
            .image_layout(self.layout)
            .load_op(self.load_op)
            .store_op(self.store_op)
            .clear_value(self.clear.to_vk())
    }
}

/// Everything a backend needs to open a dynamic rendering scope.
#[derive(Debug, Clone, Default)]
pub struct RenderingInfo {
    pub extent: vk::Extent2D,
    pub layer_count: u32,
    pub color_attachments: SmallVec<[RenderingAttachment; 8]>,
    pub depth_attachment: Option<RenderingAttachment>,
}

impl RenderingInfo {
    pub fn render_area(&self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        }
    }
}

/// Records GPU work for one frame.
///
/// Implemented by the real backend and by [`crate::RecordingEncoder`] for GPU-less runs.
pub trait CommandEncoder {
    /// Submit a batch of image and buffer transitions as one dependency.
    fn pipeline_barrier(&mut self, textures: &[TextureBarrier], buffers: &[BufferBarrier]);

    fn begin_rendering(&mut self, info: &RenderingInfo);

    fn end_rendering(&mut self);

    fn bind_descriptor_sets(
        &mut self,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
    );

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);

    fn dispatch(&mut self, group_x: u32, group_y: u32, group_z: u32);

    fn trace_rays(&mut self, width: u32, height: u32, depth: u32);

    fn copy_buffer(&mut self, src: vk::Buffer, dst: vk::Buffer, regions: &[vk::BufferCopy]);

    fn copy_texture(&mut self, src: vk::Image, dst: vk::Image, regions: &[vk::ImageCopy]);

    fn begin_label(&mut self, name: &str);

    fn end_label(&mut self);
}
