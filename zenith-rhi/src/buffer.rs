//! Buffer descriptors and backend buffer objects.

use ash::vk;
use std::hash::{Hash, Hasher};
use std::ops::RangeBounds;
use crate::MemoryUsage;
use crate::utility::resolve_range_u64;

/// Buffer descriptor for creating GPU buffers.
#[derive(Debug, Clone)]
pub struct BufferDesc {
    pub name: String,
    /// Size of the buffer in bytes.
    pub size: vk::DeviceSize,
    /// Buffer usage flags (e.g., VERTEX_BUFFER, INDEX_BUFFER, STORAGE_BUFFER).
    pub usage: vk::BufferUsageFlags,
    /// Memory property flags for allocation.
    pub memory_flags: vk::MemoryPropertyFlags,
}

impl Default for BufferDesc {
    fn default() -> Self {
        Self {
            name: "Unnamed buffer".to_string(),
            size: 0,
            usage: vk::BufferUsageFlags::empty(),
            memory_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
        }
    }
}

impl BufferDesc {
    /// Create a new buffer descriptor with the specified size.
    pub fn new(name: &str, size: vk::DeviceSize) -> Self {
        Self {
            name: name.to_owned(),
            size,
            ..Default::default()
        }
    }

    /// Create a uniform buffer descriptor.
    pub fn uniform(name: &str, size: vk::DeviceSize) -> Self {
        Self {
            name: name.to_owned(),
            size,
            usage: vk::BufferUsageFlags::UNIFORM_BUFFER,
            memory_flags: MemoryUsage::CpuToGpu.memory_flags(),
        }
    }

    /// Create a storage buffer descriptor.
    pub fn storage(name: &str, size: vk::DeviceSize) -> Self {
        Self {
            name: name.to_owned(),
            size,
            usage: vk::BufferUsageFlags::STORAGE_BUFFER,
            memory_flags: MemoryUsage::GpuOnly.memory_flags(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_size(mut self, size: vk::DeviceSize) -> Self {
        self.size = size;
        self
    }

    /// Set the buffer usage flags.
    pub fn with_usage(mut self, usage: vk::BufferUsageFlags) -> Self {
        self.usage = usage;
        self
    }

    /// Add additional usage flags.
    pub fn with_additional_usage(mut self, usage: vk::BufferUsageFlags) -> Self {
        self.usage |= usage;
        self
    }

    /// Set memory property flags from a coarse usage hint.
    pub fn with_memory_usage(mut self, usage: MemoryUsage) -> Self {
        self.memory_flags = usage.memory_flags();
        self
    }
}

// Name is only a debug label, so it is left out of pool matching.
impl PartialEq for BufferDesc {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size
            && self.usage.as_raw() == other.usage.as_raw()
            && self.memory_flags.as_raw() == other.memory_flags.as_raw()
    }
}

impl Eq for BufferDesc {}

impl Hash for BufferDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.size.hash(state);
        self.usage.as_raw().hash(state);
        self.memory_flags.as_raw().hash(state);
    }
}

/// Backend buffer object.
#[derive(Debug)]
pub struct Buffer {
    buffer: vk::Buffer,
    desc: BufferDesc,
}

impl Buffer {
    /// Wrap a backend buffer that was created for `desc`.
    pub fn new(desc: BufferDesc, buffer: vk::Buffer) -> Self {
        Self { buffer, desc }
    }

    /// Normalize a byte range into an offset/size pair of this buffer.
    pub fn range<R: RangeBounds<u64>>(&self, range: R) -> Result<BufferRange, vk::Result> {
        let (offset, size) = resolve_range_u64(range, self.desc.size)?;
        Ok(BufferRange { offset, size })
    }

    /// Get the raw Vulkan buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.desc.name
    }

    #[inline]
    pub fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.desc.size
    }

    #[inline]
    pub fn usage(&self) -> vk::BufferUsageFlags {
        self.desc.usage
    }
}

/// Byte range of a buffer. [`BufferRange::WHOLE`] covers the whole buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferRange {
    pub offset: vk::DeviceSize,
    pub size: vk::DeviceSize,
}

impl BufferRange {
    pub const WHOLE: Self = Self {
        offset: 0,
        size: vk::WHOLE_SIZE,
    };

    pub fn new(offset: vk::DeviceSize, size: vk::DeviceSize) -> Self {
        Self { offset, size }
    }

    #[inline]
    pub fn is_whole(&self) -> bool {
        *self == Self::WHOLE
    }

    pub fn to_binding(&self, buffer: &Buffer) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo::default()
            .buffer(buffer.handle())
            .offset(self.offset)
            .range(self.size)
    }
}

impl Default for BufferRange {
    fn default() -> Self {
        Self::WHOLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn desc_equality_ignores_name() {
        let a = BufferDesc::storage("a", 1024);
        let b = BufferDesc::storage("b", 1024);
        assert_eq!(a, b);
        assert_ne!(a, b.clone().with_size(2048));
        assert_ne!(a, BufferDesc::uniform("a", 1024));
    }

    #[test]
    fn buffer_range() {
        let buffer = Buffer::new(BufferDesc::storage("indices", 512), vk::Buffer::from_raw(9));
        assert_eq!(buffer.range(128..).unwrap(), BufferRange::new(128, 384));
        assert!(buffer.range(..1024).is_err());
        assert!(BufferRange::default().is_whole());

        let info = BufferRange::new(64, 32).to_binding(&buffer);
        assert_eq!(info.buffer.as_raw(), 9);
        assert_eq!(info.range, 32);
    }
}
