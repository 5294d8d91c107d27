use ash::vk;
use enumflags2::BitFlags;
use crate::texture::TextureSubresource;

#[enumflags2::bitflags]
#[repr(u64)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Host = 1 << 0,
    Transfer = 1 << 1,
    VertexAttributeInput = 1 << 2,
    IndexInput = 1 << 3,
    VertexShader = 1 << 4,
    FragmentShader = 1 << 5,
    ComputeShader = 1 << 6,
    DrawIndirect = 1 << 7,
    RayTracingShader = 1 << 8,
    ColorAttachmentOutput = 1 << 9,
    EarlyFragmentTests = 1 << 10,
    LateFragmentTests = 1 << 11,
    BottomOfPipe = 1 << 12,
    AllCommands = 1 << 13,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineStages(BitFlags<PipelineStage>);

impl PipelineStage {
    pub fn to_vk(self) -> vk::PipelineStageFlags2 {
        match self {
            PipelineStage::Host => vk::PipelineStageFlags2::HOST,
            PipelineStage::Transfer => vk::PipelineStageFlags2::TRANSFER,
            PipelineStage::VertexAttributeInput => vk::PipelineStageFlags2::VERTEX_ATTRIBUTE_INPUT,
            PipelineStage::IndexInput => vk::PipelineStageFlags2::INDEX_INPUT,
            PipelineStage::VertexShader => vk::PipelineStageFlags2::VERTEX_SHADER,
            PipelineStage::FragmentShader => vk::PipelineStageFlags2::FRAGMENT_SHADER,
            PipelineStage::ComputeShader => vk::PipelineStageFlags2::COMPUTE_SHADER,
            PipelineStage::DrawIndirect => vk::PipelineStageFlags2::DRAW_INDIRECT,
            PipelineStage::RayTracingShader => vk::PipelineStageFlags2::RAY_TRACING_SHADER_KHR,
            PipelineStage::ColorAttachmentOutput => vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            PipelineStage::EarlyFragmentTests => vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS,
            PipelineStage::LateFragmentTests => vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
            PipelineStage::BottomOfPipe => vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
            PipelineStage::AllCommands => vk::PipelineStageFlags2::ALL_COMMANDS,
        }
    }
}

impl PipelineStages {
    pub fn empty() -> Self {
        Self(BitFlags::empty())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn insert(&mut self, stage: PipelineStage) {
        self.0.insert(stage);
    }

    pub fn contains(&self, stage: PipelineStage) -> bool {
        self.0.contains(stage)
    }

    pub fn to_vk(self) -> vk::PipelineStageFlags2 {
        self.0.iter()
            .fold(vk::PipelineStageFlags2::empty(), |acc, s| acc | s.to_vk())
    }

    pub fn from_vk(flags: vk::PipelineStageFlags2) -> Self {
        if flags == vk::PipelineStageFlags2::NONE {
            return PipelineStages::empty();
        }
        let mut out = PipelineStages::empty();
        for s in BitFlags::<PipelineStage>::all().iter() {
            if flags.contains(s.to_vk()) {
                out.insert(s);
            }
        }
        out
    }
}

impl From<PipelineStage> for PipelineStages {
    fn from(value: PipelineStage) -> Self {
        Self(BitFlags::from_flag(value))
    }
}

impl core::ops::BitOr for PipelineStages {
    type Output = PipelineStages;
    fn bitor(self, rhs: PipelineStages) -> Self::Output {
        PipelineStages(self.0 | rhs.0)
    }
}

impl core::ops::BitOr<PipelineStage> for PipelineStages {
    type Output = PipelineStages;
    fn bitor(self, rhs: PipelineStage) -> Self::Output {
        PipelineStages(self.0 | rhs)
    }
}

impl core::ops::BitOrAssign for PipelineStages {
    fn bitor_assign(&mut self, rhs: PipelineStages) {
        self.0 |= rhs.0;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferState {
    Undefined,
    HostWrite,
    TransferSrc,
    TransferDst,
    Uniform,
    ShaderRead,
    Storage,
    Vertex,
    Index,
    Indirect,
}

impl BufferState {
    pub fn into_pipeline_stage(self, shader_used_stage: vk::PipelineStageFlags2) -> vk::PipelineStageFlags2 {
        match self {
            BufferState::Undefined => vk::PipelineStageFlags2::NONE,
            BufferState::HostWrite => vk::PipelineStageFlags2::HOST,
            BufferState::TransferSrc |
            BufferState::TransferDst => vk::PipelineStageFlags2::TRANSFER,
            BufferState::Uniform |
            BufferState::ShaderRead |
            BufferState::Storage => shader_used_stage,
            BufferState::Vertex => vk::PipelineStageFlags2::VERTEX_ATTRIBUTE_INPUT,
            BufferState::Index => vk::PipelineStageFlags2::INDEX_INPUT,
            BufferState::Indirect => vk::PipelineStageFlags2::DRAW_INDIRECT,
        }
    }

    pub fn into_access_flag(self) -> vk::AccessFlags2 {
        match self {
            BufferState::Undefined => vk::AccessFlags2::NONE,
            BufferState::HostWrite => vk::AccessFlags2::HOST_WRITE,
            BufferState::TransferSrc => vk::AccessFlags2::TRANSFER_READ,
            BufferState::TransferDst => vk::AccessFlags2::TRANSFER_WRITE,
            BufferState::Uniform => vk::AccessFlags2::UNIFORM_READ,
            BufferState::ShaderRead => vk::AccessFlags2::SHADER_STORAGE_READ,
            BufferState::Storage => vk::AccessFlags2::SHADER_STORAGE_READ | vk::AccessFlags2::SHADER_STORAGE_WRITE,
            BufferState::Vertex => vk::AccessFlags2::VERTEX_ATTRIBUTE_READ,
            BufferState::Index => vk::AccessFlags2::INDEX_READ,
            BufferState::Indirect => vk::AccessFlags2::INDIRECT_COMMAND_READ,
        }
    }

    /// Writable shader state that needs a dependency even when unchanged.
    #[inline]
    pub fn is_shader_writable(self) -> bool {
        matches!(self, BufferState::Storage)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureState {
    Undefined,
    TransferSrc,
    TransferDst,
    Sampled,
    Storage,
    General,
    Color,
    DepthStencil,
    DepthStencilReadOnly,
    Present,
}

impl TextureState {
    pub fn into_pipeline_stage(self, shader_used_stage: vk::PipelineStageFlags2) -> vk::PipelineStageFlags2 {
        match self {
            TextureState::Undefined => vk::PipelineStageFlags2::NONE,
            TextureState::TransferSrc |
            TextureState::TransferDst => vk::PipelineStageFlags2::TRANSFER,
            TextureState::Sampled |
            TextureState::Storage |
            TextureState::General => shader_used_stage,
            TextureState::Color => vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            TextureState::DepthStencil |
            TextureState::DepthStencilReadOnly => vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
            TextureState::Present => vk::PipelineStageFlags2::NONE,
        }
    }

    pub fn into_access_flag(self) -> vk::AccessFlags2 {
        match self {
            TextureState::Undefined => vk::AccessFlags2::NONE,
            TextureState::TransferSrc => vk::AccessFlags2::TRANSFER_READ,
            TextureState::TransferDst => vk::AccessFlags2::TRANSFER_WRITE,
            TextureState::Sampled => vk::AccessFlags2::SHADER_SAMPLED_READ,
            TextureState::Storage => vk::AccessFlags2::SHADER_STORAGE_READ | vk::AccessFlags2::SHADER_STORAGE_WRITE,
            TextureState::General => vk::AccessFlags2::MEMORY_READ | vk::AccessFlags2::MEMORY_WRITE,
            TextureState::Color => vk::AccessFlags2::COLOR_ATTACHMENT_READ | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            TextureState::DepthStencil => vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
            TextureState::DepthStencilReadOnly => vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ,
            TextureState::Present => vk::AccessFlags2::NONE,
        }
    }

    pub fn into_image_layout(self) -> vk::ImageLayout {
        match self {
            TextureState::Undefined => vk::ImageLayout::UNDEFINED,
            TextureState::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            TextureState::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            TextureState::Sampled => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            TextureState::Storage |
            TextureState::General => vk::ImageLayout::GENERAL,
            TextureState::Color => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            TextureState::DepthStencil => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            TextureState::DepthStencilReadOnly => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
            TextureState::Present => vk::ImageLayout::PRESENT_SRC_KHR,
        }
    }

    /// Writable shader state that needs a dependency even when unchanged.
    #[inline]
    pub fn is_shader_writable(self) -> bool {
        matches!(self, TextureState::Storage | TextureState::General)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferBarrier {
    pub buffer: vk::Buffer,
    pub src_state: BufferState,
    pub dst_state: BufferState,
    pub src_stage: PipelineStages,
    pub dst_stage: PipelineStages,
    pub offset: vk::DeviceSize,
    pub size: vk::DeviceSize,
}

impl BufferBarrier {
    pub fn new(
        buffer: vk::Buffer,
        src_state: BufferState,
        dst_state: BufferState,
        src_stage: PipelineStages,
        dst_stage: PipelineStages,
    ) -> Self {
        Self {
            buffer,
            src_state,
            dst_state,
            src_stage,
            dst_stage,
            offset: 0,
            size: vk::WHOLE_SIZE,
        }
    }

    pub fn with_range(mut self, offset: vk::DeviceSize, size: vk::DeviceSize) -> Self {
        self.offset = offset;
        self.size = size;
        self
    }

    pub fn to_vk(&self) -> vk::BufferMemoryBarrier2<'static> {
        // Stage masks derive from the state, shader states use the pass stage.
        let src_stage_vk = self.src_state.into_pipeline_stage(self.src_stage.to_vk());
        let dst_stage_vk = self.dst_state.into_pipeline_stage(self.dst_stage.to_vk());
        vk::BufferMemoryBarrier2::default()
            .src_stage_mask(src_stage_vk)
            .src_access_mask(self.src_state.into_access_flag())
            .dst_stage_mask(dst_stage_vk)
            .dst_access_mask(self.dst_state.into_access_flag())
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .buffer(self.buffer)
            .offset(self.offset)
            .size(self.size)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureBarrier {
    pub texture: vk::Image,
    pub aspect: vk::ImageAspectFlags,
    pub subresource: TextureSubresource,
    pub src_state: TextureState,
    pub dst_state: TextureState,
    pub src_stage: PipelineStages,
    pub dst_stage: PipelineStages,
    pub discard: bool,
}

impl TextureBarrier {
    pub fn new(
        texture: vk::Image,
        aspect: vk::ImageAspectFlags,
        src_state: TextureState,
        dst_state: TextureState,
        src_stage: PipelineStages,
        dst_stage: PipelineStages,
    ) -> Self {
        Self {
            texture,
            aspect,
            subresource: TextureSubresource::WHOLE,
            src_state,
            dst_state,
            src_stage,
            dst_stage,
            // Contents of an undefined image are never preserved.
            discard: src_state == TextureState::Undefined,
        }
    }

    pub fn with_subresource(mut self, subresource: TextureSubresource) -> Self {
        self.subresource = subresource;
        self
    }

    pub fn to_vk(&self) -> vk::ImageMemoryBarrier2<'static> {
        let old_layout = if self.discard {
            vk::ImageLayout::UNDEFINED
        } else {
            self.src_state.into_image_layout()
        };
        let src_stage_vk = self.src_state.into_pipeline_stage(self.src_stage.to_vk());
        let dst_stage_vk = self.dst_state.into_pipeline_stage(self.dst_stage.to_vk());

        vk::ImageMemoryBarrier2::default()
            .src_stage_mask(src_stage_vk)
            .src_access_mask(self.src_state.into_access_flag())
            .dst_stage_mask(dst_stage_vk)
            .dst_access_mask(self.dst_state.into_access_flag())
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .old_layout(old_layout)
            .new_layout(self.dst_state.into_image_layout())
            .image(self.texture)
            .subresource_range(self.subresource.to_vk(self.aspect))
    }
}
