//! GPU-less backend.
//!
//! [`HeadlessDevice`] hands out sequential raw handles without touching any
//! driver, and [`RecordingEncoder`] keeps every recorded command so frames can
//! be inspected after the fact.

use ash::vk;
use ash::vk::Handle;
use std::cell::{Cell, RefCell};
use std::sync::Arc;
use zenith_core::log;
use crate::barrier::{BufferBarrier, TextureBarrier};
use crate::buffer::{Buffer, BufferDesc};
use crate::command::{CommandEncoder, RenderingInfo};
use crate::descriptor::{DescriptorSet, DescriptorSetLayout, DescriptorWrite, LayoutBinding, RootSignature};
use crate::device::RenderDevice;
use crate::texture::{Texture, TextureDesc, TextureView, TextureViewDesc};

/// Creation counters of a [`HeadlessDevice`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessStats {
    pub textures: u32,
    pub buffers: u32,
    pub texture_views: u32,
    pub descriptor_set_layouts: u32,
    pub root_signatures: u32,
    pub descriptor_sets: u32,
    pub descriptor_writes: u32,
}

#[derive(Debug)]
pub struct HeadlessDevice {
    next_handle: Cell<u64>,
    stats: Cell<HeadlessStats>,
    memory_budget: Cell<Option<u32>>,
    writes: RefCell<Vec<(vk::DescriptorSet, DescriptorWrite)>>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self {
            next_handle: Cell::new(1),
            stats: Cell::new(HeadlessStats::default()),
            memory_budget: Cell::new(None),
            writes: RefCell::new(Vec::new()),
        }
    }

    /// Limit how many more textures and buffers may be created before the
    /// device reports `ERROR_OUT_OF_DEVICE_MEMORY`.
    pub fn with_memory_budget(self, allocations: u32) -> Self {
        self.memory_budget.set(Some(allocations));
        self
    }

    #[inline]
    pub fn stats(&self) -> HeadlessStats {
        self.stats.get()
    }

    /// Every descriptor write applied so far, in order.
    pub fn descriptor_writes(&self) -> Vec<(vk::DescriptorSet, DescriptorWrite)> {
        self.writes.borrow().clone()
    }

    fn next_raw(&self) -> u64 {
        let raw = self.next_handle.get();
        self.next_handle.set(raw + 1);
        raw
    }

    fn consume_memory(&self) -> Result<(), vk::Result> {
        match self.memory_budget.get() {
            Some(0) => Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY),
            Some(n) => {
                self.memory_budget.set(Some(n - 1));
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn count(&self, f: impl FnOnce(&mut HeadlessStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}

impl RenderDevice for HeadlessDevice {
    fn create_texture(&self, desc: &TextureDesc) -> Result<Texture, vk::Result> {
        self.consume_memory()?;
        log::trace!(
            "HeadlessDevice: creating texture {:?} ({}x{}x{})",
            desc.name,
            desc.extent.width,
            desc.extent.height,
            desc.extent.depth
        );
        self.count(|s| s.textures += 1);
        Ok(Texture::new(desc.clone(), vk::Image::from_raw(self.next_raw())))
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Buffer, vk::Result> {
        self.consume_memory()?;
        log::trace!("HeadlessDevice: creating buffer {:?} (size: {})", desc.name, desc.size);
        self.count(|s| s.buffers += 1);
        Ok(Buffer::new(desc.clone(), vk::Buffer::from_raw(self.next_raw())))
    }

    fn create_texture_view(&self, texture: &Texture, desc: &TextureViewDesc) -> Result<TextureView, vk::Result> {
        self.count(|s| s.texture_views += 1);
        Ok(TextureView::new(
            vk::ImageView::from_raw(self.next_raw()),
            texture.handle(),
            *desc,
        ))
    }

    fn create_descriptor_set_layout(&self, name: &str, bindings: &[LayoutBinding]) -> Result<DescriptorSetLayout, vk::Result> {
        self.count(|s| s.descriptor_set_layouts += 1);
        Ok(DescriptorSetLayout::new(
            name,
            vk::DescriptorSetLayout::from_raw(self.next_raw()),
            bindings,
        ))
    }

    fn create_root_signature(
        &self,
        name: &str,
        set_layouts: &[Arc<DescriptorSetLayout>],
        push_constant_size: u32,
    ) -> Result<RootSignature, vk::Result> {
        self.count(|s| s.root_signatures += 1);
        Ok(RootSignature::new(
            name,
            vk::PipelineLayout::from_raw(self.next_raw()),
            set_layouts.to_vec(),
            push_constant_size,
        ))
    }

    fn allocate_descriptor_set(&self, layout: &Arc<DescriptorSetLayout>) -> Result<DescriptorSet, vk::Result> {
        self.count(|s| s.descriptor_sets += 1);
        Ok(DescriptorSet::new(
            vk::DescriptorSet::from_raw(self.next_raw()),
            layout.clone(),
        ))
    }

    fn update_descriptor_set(&self, set: &DescriptorSet, writes: &[DescriptorWrite]) {
        self.count(|s| s.descriptor_writes += writes.len() as u32);
        self.writes
            .borrow_mut()
            .extend(writes.iter().map(|w| (set.handle(), *w)));
    }
}

/// A command captured by [`RecordingEncoder`].
#[derive(Debug, Clone)]
pub enum RecordedCommand {
    PipelineBarrier {
        textures: Vec<TextureBarrier>,
        buffers: Vec<BufferBarrier>,
    },
    BeginRendering(RenderingInfo),
    EndRendering,
    BindDescriptorSets {
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: Vec<vk::DescriptorSet>,
    },
    Draw {
        vertex_count: u32,
        instance_count: u32,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    TraceRays {
        width: u32,
        height: u32,
        depth: u32,
    },
    CopyBuffer {
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: Vec<vk::BufferCopy>,
    },
    CopyTexture {
        src: vk::Image,
        dst: vk::Image,
        regions: Vec<vk::ImageCopy>,
    },
    BeginLabel(String),
    EndLabel,
}

#[derive(Debug, Default)]
pub struct RecordingEncoder {
    commands: Vec<RecordedCommand>,
}

impl RecordingEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<RecordedCommand> {
        std::mem::take(&mut self.commands)
    }

    /// All recorded barrier batches, in submission order.
    pub fn barrier_batches(&self) -> impl Iterator<Item = (&[TextureBarrier], &[BufferBarrier])> {
        self.commands.iter().filter_map(|c| match c {
            RecordedCommand::PipelineBarrier { textures, buffers } => Some((textures.as_slice(), buffers.as_slice())),
            _ => None,
        })
    }
}

impl CommandEncoder for RecordingEncoder {
    fn pipeline_barrier(&mut self, textures: &[TextureBarrier], buffers: &[BufferBarrier]) {
        self.commands.push(RecordedCommand::PipelineBarrier {
            textures: textures.to_vec(),
            buffers: buffers.to_vec(),
        });
    }

    fn begin_rendering(&mut self, info: &RenderingInfo) {
        self.commands.push(RecordedCommand::BeginRendering(info.clone()));
    }

    fn end_rendering(&mut self) {
        self.commands.push(RecordedCommand::EndRendering);
    }

    fn bind_descriptor_sets(
        &mut self,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
    ) {
        self.commands.push(RecordedCommand::BindDescriptorSets {
            bind_point,
            layout,
            first_set,
            sets: descriptor_sets.to_vec(),
        });
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, _first_vertex: u32, _first_instance: u32) {
        self.commands.push(RecordedCommand::Draw { vertex_count, instance_count });
    }

    fn dispatch(&mut self, group_x: u32, group_y: u32, group_z: u32) {
        self.commands.push(RecordedCommand::Dispatch { x: group_x, y: group_y, z: group_z });
    }

    fn trace_rays(&mut self, width: u32, height: u32, depth: u32) {
        self.commands.push(RecordedCommand::TraceRays { width, height, depth });
    }

    fn copy_buffer(&mut self, src: vk::Buffer, dst: vk::Buffer, regions: &[vk::BufferCopy]) {
        self.commands.push(RecordedCommand::CopyBuffer { src, dst, regions: regions.to_vec() });
    }

    fn copy_texture(&mut self, src: vk::Image, dst: vk::Image, regions: &[vk::ImageCopy]) {
        self.commands.push(RecordedCommand::CopyTexture { src, dst, regions: regions.to_vec() });
    }

    fn begin_label(&mut self, name: &str) {
        self.commands.push(RecordedCommand::BeginLabel(name.to_owned()));
    }

    fn end_label(&mut self) {
        self.commands.push(RecordedCommand::EndLabel);
    }
}
