use ash::vk;
use std::sync::Arc;
use crate::buffer::{Buffer, BufferDesc};
use crate::descriptor::{DescriptorSet, DescriptorSetLayout, DescriptorWrite, LayoutBinding, RootSignature};
use crate::texture::{Texture, TextureDesc, TextureView, TextureViewDesc};

/// Resource creation seam of the graphics backend.
///
/// Creation calls take `&self` so a device can be shared by the pools and the
/// executing graph at the same time.
pub trait RenderDevice {
    fn create_texture(&self, desc: &TextureDesc) -> Result<Texture, vk::Result>;

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Buffer, vk::Result>;

    fn create_texture_view(&self, texture: &Texture, desc: &TextureViewDesc) -> Result<TextureView, vk::Result>;

    fn create_descriptor_set_layout(&self, name: &str, bindings: &[LayoutBinding]) -> Result<DescriptorSetLayout, vk::Result>;

    fn create_root_signature(
        &self,
        name: &str,
        set_layouts: &[Arc<DescriptorSetLayout>],
        push_constant_size: u32,
    ) -> Result<RootSignature, vk::Result>;

    fn allocate_descriptor_set(&self, layout: &Arc<DescriptorSetLayout>) -> Result<DescriptorSet, vk::Result>;

    fn update_descriptor_set(&self, set: &DescriptorSet, writes: &[DescriptorWrite]);
}
