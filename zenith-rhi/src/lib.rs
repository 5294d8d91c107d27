//! Zenith RHI (Render Hardware Interface).
//!
//! Backend vocabulary shared by the render graph and the graphics backend:
//! resource descriptors, resource states and barriers, descriptor layouts, and
//! the [`RenderDevice`] / [`CommandEncoder`] seams. A GPU-less implementation of
//! both seams lives in [`headless`].

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod headless;
pub mod texture;
mod barrier;
mod memory;
mod utility;

pub(crate) use paste::paste;

pub use ash::vk;
pub use buffer::{Buffer, BufferDesc, BufferRange};
pub use command::{ClearValue, CommandEncoder, RenderingAttachment, RenderingInfo};
pub use descriptor::{
    BindingError, DescriptorResource, DescriptorSet, DescriptorSetLayout, DescriptorWrite,
    LayoutBinding, RootSignature,
};
pub use device::RenderDevice;
pub use headless::{HeadlessDevice, HeadlessStats, RecordedCommand, RecordingEncoder};
pub use memory::MemoryUsage;
pub use texture::{Texture, TextureDesc, TextureSubresource, TextureView, TextureViewDesc};
pub use barrier::{
    BufferState, TextureState,
    PipelineStage, PipelineStages,
    BufferBarrier, TextureBarrier,
};
