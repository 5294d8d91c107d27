//! Descriptor set layouts, root signatures, descriptor sets and validated writes.

use ash::vk;
use std::sync::Arc;
use zenith_core::collections::hashmap::HashMap;

/// Descriptor binding validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    /// Binding index not found in layout.
    BindingNotFound(u32),
    /// Descriptor type mismatch.
    TypeMismatch {
        binding: u32,
        expected: vk::DescriptorType,
        got: vk::DescriptorType,
    },
    /// Array index out of bounds.
    ArrayIndexOutOfBounds { binding: u32, index: u32, max: u32 },
}

impl std::fmt::Display for BindingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindingError::BindingNotFound(b) => write!(f, "Binding {} not found in layout", b),
            BindingError::TypeMismatch {
                binding,
                expected,
                got,
            } => write!(
                f,
                "Type mismatch at binding {}: expected {:?}, got {:?}",
                binding, expected, got
            ),
            BindingError::ArrayIndexOutOfBounds { binding, index, max } => write!(
                f,
                "Array index {} out of bounds at binding {} (max: {})",
                index, binding, max
            ),
        }
    }
}

impl std::error::Error for BindingError {}

/// Layout binding information.
#[derive(Debug, Clone)]
pub struct LayoutBinding {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub count: u32,
    pub stage_flags: vk::ShaderStageFlags,
}

impl LayoutBinding {
    pub fn new(binding: u32, descriptor_type: vk::DescriptorType, stage_flags: vk::ShaderStageFlags) -> Self {
        Self {
            binding,
            descriptor_type,
            count: 1,
            stage_flags,
        }
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn to_vk(&self) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding::default()
            .binding(self.binding)
            .descriptor_type(self.descriptor_type)
            .descriptor_count(self.count)
            .stage_flags(self.stage_flags)
    }
}

/// Descriptor set layout with binding metadata for validation.
#[derive(Debug)]
pub struct DescriptorSetLayout {
    name: String,
    layout: vk::DescriptorSetLayout,
    bindings: Vec<LayoutBinding>,
    binding_map: HashMap<u32, usize>,
}

impl DescriptorSetLayout {
    /// Wrap a backend layout created from `bindings`.
    pub fn new(name: impl Into<String>, layout: vk::DescriptorSetLayout, bindings: &[LayoutBinding]) -> Self {
        let mut binding_map = HashMap::default();
        for (i, b) in bindings.iter().enumerate() {
            binding_map.insert(b.binding, i);
        }

        Self {
            name: name.into(),
            layout,
            bindings: bindings.to_vec(),
            binding_map,
        }
    }

    /// Get the raw Vulkan descriptor set layout handle.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get binding information by binding index.
    pub fn get_binding(&self, binding: u32) -> Option<&LayoutBinding> {
        self.binding_map.get(&binding).map(|&i| &self.bindings[i])
    }

    /// Get all bindings.
    pub fn bindings(&self) -> &[LayoutBinding] {
        &self.bindings
    }

    /// Validate a resource against this layout and build the write for it.
    pub fn write(&self, binding: u32, array_index: u32, resource: DescriptorResource) -> Result<DescriptorWrite, BindingError> {
        let layout_binding = self.get_binding(binding)
            .ok_or(BindingError::BindingNotFound(binding))?;

        if !resource.accepts(layout_binding.descriptor_type) {
            return Err(BindingError::TypeMismatch {
                binding,
                expected: layout_binding.descriptor_type,
                got: resource.preferred_type(),
            });
        }

        if array_index >= layout_binding.count {
            return Err(BindingError::ArrayIndexOutOfBounds {
                binding,
                index: array_index,
                max: layout_binding.count,
            });
        }

        Ok(DescriptorWrite {
            binding,
            array_index,
            descriptor_type: layout_binding.descriptor_type,
            resource,
        })
    }
}

/// Pipeline layout: the descriptor set layouts a pass binds plus its push constant range.
#[derive(Debug)]
pub struct RootSignature {
    name: String,
    layout: vk::PipelineLayout,
    set_layouts: Vec<Arc<DescriptorSetLayout>>,
    push_constant_size: u32,
}

impl RootSignature {
    pub fn new(
        name: impl Into<String>,
        layout: vk::PipelineLayout,
        set_layouts: Vec<Arc<DescriptorSetLayout>>,
        push_constant_size: u32,
    ) -> Self {
        Self {
            name: name.into(),
            layout,
            set_layouts,
            push_constant_size,
        }
    }

    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn num_sets(&self) -> u32 {
        self.set_layouts.len() as u32
    }

    pub fn set_layout(&self, set: u32) -> Option<&Arc<DescriptorSetLayout>> {
        self.set_layouts.get(set as usize)
    }

    pub fn set_layouts(&self) -> &[Arc<DescriptorSetLayout>] {
        &self.set_layouts
    }

    #[inline]
    pub fn push_constant_size(&self) -> u32 {
        self.push_constant_size
    }
}

/// An allocated descriptor set together with the layout it was allocated for.
#[derive(Debug, Clone)]
pub struct DescriptorSet {
    set: vk::DescriptorSet,
    layout: Arc<DescriptorSetLayout>,
}

impl DescriptorSet {
    pub fn new(set: vk::DescriptorSet, layout: Arc<DescriptorSetLayout>) -> Self {
        Self { set, layout }
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSet {
        self.set
    }

    #[inline]
    pub fn layout(&self) -> &Arc<DescriptorSetLayout> {
        &self.layout
    }
}

/// Resource written into a descriptor binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorResource {
    SampledTexture {
        view: vk::ImageView,
        layout: vk::ImageLayout,
    },
    StorageTexture {
        view: vk::ImageView,
        layout: vk::ImageLayout,
    },
    ReadBuffer {
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    },
    StorageBuffer {
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    },
}

impl DescriptorResource {
    pub fn accepts(&self, ty: vk::DescriptorType) -> bool {
        match self {
            DescriptorResource::SampledTexture { .. } => matches!(
                ty,
                vk::DescriptorType::SAMPLED_IMAGE | vk::DescriptorType::COMBINED_IMAGE_SAMPLER
            ),
            DescriptorResource::StorageTexture { .. } => ty == vk::DescriptorType::STORAGE_IMAGE,
            DescriptorResource::ReadBuffer { .. } => matches!(
                ty,
                vk::DescriptorType::UNIFORM_BUFFER
                    | vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC
                    | vk::DescriptorType::STORAGE_BUFFER
                    | vk::DescriptorType::STORAGE_BUFFER_DYNAMIC
            ),
            DescriptorResource::StorageBuffer { .. } => matches!(
                ty,
                vk::DescriptorType::STORAGE_BUFFER | vk::DescriptorType::STORAGE_BUFFER_DYNAMIC
            ),
        }
    }

    pub fn preferred_type(&self) -> vk::DescriptorType {
        match self {
            DescriptorResource::SampledTexture { .. } => vk::DescriptorType::SAMPLED_IMAGE,
            DescriptorResource::StorageTexture { .. } => vk::DescriptorType::STORAGE_IMAGE,
            DescriptorResource::ReadBuffer { .. } |
            DescriptorResource::StorageBuffer { .. } => vk::DescriptorType::STORAGE_BUFFER,
        }
    }
}

/// Validated descriptor write produced by [`DescriptorSetLayout::write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorWrite {
    pub binding: u32,
    pub array_index: u32,
    pub descriptor_type: vk::DescriptorType,
    pub resource: DescriptorResource,
}

impl DescriptorWrite {
    pub fn image_info(&self) -> Option<vk::DescriptorImageInfo> {
        match self.resource {
            DescriptorResource::SampledTexture { view, layout } |
            DescriptorResource::StorageTexture { view, layout } => Some(
                vk::DescriptorImageInfo::default()
                    .image_view(view)
                    .image_layout(layout)
            ),
            _ => None,
        }
    }

    pub fn buffer_info(&self) -> Option<vk::DescriptorBufferInfo> {
        match self.resource {
            DescriptorResource::ReadBuffer { buffer, offset, size } |
            DescriptorResource::StorageBuffer { buffer, offset, size } => Some(
                vk::DescriptorBufferInfo::default()
                    .buffer(buffer)
                    .offset(offset)
                    .range(size)
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn layout() -> DescriptorSetLayout {
        DescriptorSetLayout::new(
            "lighting",
            vk::DescriptorSetLayout::from_raw(1),
            &[
                LayoutBinding::new(0, vk::DescriptorType::SAMPLED_IMAGE, vk::ShaderStageFlags::FRAGMENT),
                LayoutBinding::new(1, vk::DescriptorType::STORAGE_BUFFER, vk::ShaderStageFlags::FRAGMENT).with_count(4),
            ],
        )
    }

    fn sampled() -> DescriptorResource {
        DescriptorResource::SampledTexture {
            view: vk::ImageView::from_raw(5),
            layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }

    #[test]
    fn valid_write_takes_layout_type() {
        let write = layout().write(0, 0, sampled()).unwrap();
        assert_eq!(write.descriptor_type, vk::DescriptorType::SAMPLED_IMAGE);
        assert_eq!(write.image_info().unwrap().image_view.as_raw(), 5);
        assert!(write.buffer_info().is_none());

        let buffer = DescriptorResource::ReadBuffer { buffer: vk::Buffer::from_raw(2), offset: 0, size: vk::WHOLE_SIZE };
        let write = layout().write(1, 3, buffer).unwrap();
        assert_eq!(write.buffer_info().unwrap().range, vk::WHOLE_SIZE);
    }

    #[test]
    fn invalid_writes() {
        let layout = layout();
        assert_eq!(layout.write(7, 0, sampled()), Err(BindingError::BindingNotFound(7)));
        assert_eq!(
            layout.write(1, 0, sampled()),
            Err(BindingError::TypeMismatch {
                binding: 1,
                expected: vk::DescriptorType::STORAGE_BUFFER,
                got: vk::DescriptorType::SAMPLED_IMAGE,
            })
        );
        let buffer = DescriptorResource::StorageBuffer { buffer: vk::Buffer::from_raw(2), offset: 0, size: 16 };
        assert_eq!(
            layout.write(1, 4, buffer),
            Err(BindingError::ArrayIndexOutOfBounds { binding: 1, index: 4, max: 4 })
        );
        assert_eq!(
            BindingError::BindingNotFound(7).to_string(),
            "Binding 7 not found in layout"
        );
    }

    #[test]
    fn root_signature_lookup() {
        let signature = RootSignature::new("pbr", vk::PipelineLayout::from_raw(10), vec![Arc::new(layout())], 64);
        assert_eq!(signature.num_sets(), 1);
        assert!(signature.set_layout(0).is_some());
        assert!(signature.set_layout(1).is_none());
    }
}
