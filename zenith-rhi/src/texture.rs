//! Texture descriptors, backend texture objects and views.

use ash::vk;
use std::default::Default;
use std::hash::{Hash, Hasher};
use std::ops::RangeBounds;
use crate::MemoryUsage;
use crate::utility::resolve_range_u32;

/// Texture descriptor for creating GPU textures.
///
/// The debug `name` does not take part in equality or hashing, so two textures
/// that only differ by name are interchangeable in a pool.
#[derive(Debug, Clone)]
pub struct TextureDesc {
    pub name: String,
    /// Image format.
    pub format: vk::Format,
    /// Image extent (width, height, depth).
    pub extent: vk::Extent3D,
    /// Image usage flags.
    pub usage: vk::ImageUsageFlags,
    /// Memory property flags for allocation.
    pub memory_flags: vk::MemoryPropertyFlags,
    /// Image type (1D, 2D, 3D).
    pub image_type: vk::ImageType,
    /// Image view type.
    pub view_type: vk::ImageViewType,
    /// Number of mip levels.
    pub mip_levels: u32,
    /// Number of array layers.
    pub array_layers: u32,
    /// Sample count for multisampling.
    pub samples: vk::SampleCountFlags,
    /// Image tiling mode.
    pub tiling: vk::ImageTiling,
}

impl Default for TextureDesc {
    fn default() -> Self {
        Self {
            name: String::new(),
            format: vk::Format::R8G8B8A8_UNORM,
            extent: vk::Extent3D {
                width: 1,
                height: 1,
                depth: 1,
            },
            usage: vk::ImageUsageFlags::SAMPLED,
            memory_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            image_type: vk::ImageType::TYPE_2D,
            view_type: vk::ImageViewType::TYPE_2D,
            mip_levels: 1,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
        }
    }
}

impl TextureDesc {
    /// Create a new 2D texture descriptor.
    pub fn new_2d(width: u32, height: u32, format: vk::Format) -> Self {
        Self {
            format,
            extent: vk::Extent3D {
                width,
                height,
                depth: 1,
            },
            ..Default::default()
        }
    }

    /// Create a cube map texture descriptor.
    pub fn new_cube(size: u32, format: vk::Format) -> Self {
        Self {
            format,
            extent: vk::Extent3D {
                width: size,
                height: size,
                depth: 1,
            },
            view_type: vk::ImageViewType::CUBE,
            array_layers: 6,
            ..Default::default()
        }
    }

    /// Create a color attachment descriptor.
    pub fn new_color_attachment(width: u32, height: u32, format: vk::Format) -> Self {
        Self {
            usage: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            ..Self::new_2d(width, height, format)
        }
    }

    /// Create a depth attachment descriptor.
    pub fn new_depth_attachment(width: u32, height: u32) -> Self {
        Self {
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            ..Self::new_2d(width, height, vk::Format::D32_SFLOAT)
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the texture format.
    pub fn with_format(mut self, format: vk::Format) -> Self {
        self.format = format;
        self
    }

    /// Set the texture extent. A depth above one turns the texture into a 3D image.
    pub fn with_extent(mut self, width: u32, height: u32, depth: u32) -> Self {
        self.extent = vk::Extent3D {
            width,
            height,
            depth,
        };
        if depth > 1 {
            self.image_type = vk::ImageType::TYPE_3D;
            self.view_type = vk::ImageViewType::TYPE_3D;
        }
        self
    }

    /// Set the texture usage flags.
    pub fn with_usage(mut self, usage: vk::ImageUsageFlags) -> Self {
        self.usage = usage;
        self
    }

    /// Add additional usage flags.
    pub fn with_additional_usage(mut self, usage: vk::ImageUsageFlags) -> Self {
        self.usage |= usage;
        self
    }

    /// Set memory property flags from a coarse usage hint.
    pub fn with_memory_usage(mut self, usage: MemoryUsage) -> Self {
        self.memory_flags = usage.memory_flags();
        self
    }

    /// Set the number of mip levels.
    pub fn with_mip_levels(mut self, levels: u32) -> Self {
        self.mip_levels = levels.max(1);
        self
    }

    /// Set the number of array layers.
    pub fn with_array_layers(mut self, layers: u32) -> Self {
        self.array_layers = layers.max(1);
        if self.array_layers > 1 && self.view_type == vk::ImageViewType::TYPE_2D {
            self.view_type = vk::ImageViewType::TYPE_2D_ARRAY;
        }
        self
    }

    /// Set the sample count.
    pub fn with_samples(mut self, samples: vk::SampleCountFlags) -> Self {
        self.samples = samples;
        self
    }

    #[inline]
    pub fn is_depth_stencil(&self) -> bool {
        is_depth_stencil_format(self.format)
    }

    /// Extent of one mip level, clamped to one texel.
    pub fn mip_extent(&self, mip: u32) -> vk::Extent3D {
        let shrink = |texels: u32| texels.checked_shr(mip).unwrap_or(0).max(1);
        vk::Extent3D {
            width: shrink(self.extent.width),
            height: shrink(self.extent.height),
            depth: shrink(self.extent.depth),
        }
    }
}

impl PartialEq for TextureDesc {
    fn eq(&self, other: &Self) -> bool {
        self.format == other.format
            && self.extent.width == other.extent.width
            && self.extent.height == other.extent.height
            && self.extent.depth == other.extent.depth
            && self.usage.as_raw() == other.usage.as_raw()
            && self.memory_flags.as_raw() == other.memory_flags.as_raw()
            && self.image_type == other.image_type
            && self.view_type == other.view_type
            && self.mip_levels == other.mip_levels
            && self.array_layers == other.array_layers
            && self.samples.as_raw() == other.samples.as_raw()
            && self.tiling == other.tiling
    }
}

impl Eq for TextureDesc {}

impl Hash for TextureDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.format.as_raw().hash(state);
        self.extent.width.hash(state);
        self.extent.height.hash(state);
        self.extent.depth.hash(state);
        self.usage.as_raw().hash(state);
        self.memory_flags.as_raw().hash(state);
        self.image_type.as_raw().hash(state);
        self.view_type.as_raw().hash(state);
        self.mip_levels.hash(state);
        self.array_layers.hash(state);
        self.samples.as_raw().hash(state);
        self.tiling.as_raw().hash(state);
    }
}

/// Backend texture object.
///
/// Owned by whoever created it. The render graph holds textures behind `Arc`
/// and hands them back to its pool once their last pass has run.
#[derive(Debug)]
pub struct Texture {
    desc: TextureDesc,
    image: vk::Image,
}

impl Texture {
    /// Wrap a backend image that was created for `desc`.
    pub fn new(desc: TextureDesc, image: vk::Image) -> Self {
        Self { desc, image }
    }

    /// Normalize mip and layer ranges into a subresource of this texture.
    pub fn subresource<M: RangeBounds<u32>, L: RangeBounds<u32>>(&self, mips: M, layers: L) -> Result<TextureSubresource, vk::Result> {
        let (base_mip, num_mips) = resolve_range_u32(mips, self.desc.mip_levels)?;
        let (base_layer, num_layers) = resolve_range_u32(layers, self.desc.array_layers)?;

        Ok(TextureSubresource {
            base_mip,
            num_mips,
            base_layer,
            num_layers,
        })
    }

    /// Get the raw Vulkan image handle.
    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.desc.name
    }

    #[inline]
    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.desc.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent3D {
        self.desc.extent
    }

    /// Get the aspect flags for this texture based on its format.
    #[inline]
    pub fn aspect(&self) -> vk::ImageAspectFlags {
        format_to_aspect_mask(self.desc.format)
    }
}

/// Get the appropriate aspect mask for an image format.
pub fn format_to_aspect_mask(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => {
            vk::ImageAspectFlags::DEPTH
        }
        vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
        vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::COLOR,
    }
}

pub fn is_depth_stencil_format(format: vk::Format) -> bool {
    !format_to_aspect_mask(format).contains(vk::ImageAspectFlags::COLOR)
}

/// A mip/layer range of a texture.
///
/// [`TextureSubresource::WHOLE`] stands for the whole texture regardless of
/// its mip and layer count.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub struct TextureSubresource {
    pub base_mip: u32,
    pub num_mips: u32,
    pub base_layer: u32,
    pub num_layers: u32,
}

impl TextureSubresource {
    pub const WHOLE: Self = Self {
        base_mip: 0,
        num_mips: vk::REMAINING_MIP_LEVELS,
        base_layer: 0,
        num_layers: vk::REMAINING_ARRAY_LAYERS,
    };

    pub fn mip(mip: u32) -> Self {
        Self { base_mip: mip, num_mips: 1, ..Self::WHOLE }
    }

    pub fn layer(layer: u32) -> Self {
        Self { base_layer: layer, num_layers: 1, ..Self::WHOLE }
    }

    pub fn mip_layer(mip: u32, layer: u32) -> Self {
        Self { base_mip: mip, num_mips: 1, base_layer: layer, num_layers: 1 }
    }

    #[inline]
    pub fn is_whole(&self) -> bool {
        *self == Self::WHOLE
    }

    /// Resolve remaining counts against a concrete descriptor.
    pub fn layer_count(&self, desc: &TextureDesc) -> u32 {
        if self.num_layers == vk::REMAINING_ARRAY_LAYERS {
            desc.array_layers.saturating_sub(self.base_layer).max(1)
        } else {
            self.num_layers
        }
    }

    pub fn to_vk(&self, aspect: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: self.base_mip,
            level_count: self.num_mips,
            base_array_layer: self.base_layer,
            layer_count: self.num_layers,
        }
    }
}

impl Default for TextureSubresource {
    fn default() -> Self {
        Self::WHOLE
    }
}

/// Descriptor of an image view over a texture subresource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureViewDesc {
    pub format: vk::Format,
    pub view_type: vk::ImageViewType,
    pub aspect: vk::ImageAspectFlags,
    pub subresource: TextureSubresource,
}

impl TextureViewDesc {
    /// View matching the texture's own format and view type.
    pub fn for_texture(texture: &Texture, subresource: TextureSubresource) -> Self {
        let desc = texture.desc();
        let view_type = if subresource.layer_count(desc) == 1 && desc.view_type == vk::ImageViewType::TYPE_2D_ARRAY {
            vk::ImageViewType::TYPE_2D
        } else {
            desc.view_type
        };

        Self {
            format: desc.format,
            view_type,
            aspect: texture.aspect(),
            subresource,
        }
    }
}

/// Backend image view object.
#[derive(Debug, Clone)]
pub struct TextureView {
    view: vk::ImageView,
    image: vk::Image,
    desc: TextureViewDesc,
}

impl TextureView {
    pub fn new(view: vk::ImageView, image: vk::Image, desc: TextureViewDesc) -> Self {
        Self { view, image, desc }
    }

    #[inline]
    pub fn handle(&self) -> vk::ImageView {
        self.view
    }

    /// Image this view was created from.
    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image
    }

    #[inline]
    pub fn desc(&self) -> &TextureViewDesc {
        &self.desc
    }
}
