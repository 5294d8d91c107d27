//! Descriptor keyed caches of backend objects, persisted across frames.

use std::hash::Hash;
use std::sync::Arc;
use zenith_core::collections::hashmap::HashMap;
use zenith_rhi::{vk, DescriptorSet, DescriptorSetLayout, RenderDevice, TextureView, TextureViewDesc};
use crate::config::RenderGraphConfig;
use crate::interface::{Buffer, BufferDesc, BufferState, Texture, TextureDesc, TextureState};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Objects created because no free match existed.
    pub created: u32,
    /// Allocations served from the free lists.
    pub reused: u32,
    /// Objects handed back to the pool.
    pub released: u32,
    /// Objects currently waiting in the free lists.
    pub available: u32,
}

impl std::ops::Add for PoolStats {
    type Output = PoolStats;

    fn add(self, rhs: PoolStats) -> PoolStats {
        PoolStats {
            created: self.created + rhs.created,
            reused: self.reused + rhs.reused,
            released: self.released + rhs.released,
            available: self.available + rhs.available,
        }
    }
}

/// LIFO free lists of `T` keyed by `K`, each entry tagged with its last state `S`.
pub struct ResourcePool<K, T, S> {
    free: HashMap<K, Vec<(T, S)>>,
    stats: PoolStats,
}

impl<K, T, S> Default for ResourcePool<K, T, S> {
    fn default() -> Self {
        Self {
            free: HashMap::default(),
            stats: PoolStats::default(),
        }
    }
}

impl<K: Eq + Hash, T, S> ResourcePool<K, T, S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pop the most recently released match for `key`, or create a fresh object in `initial` state.
    pub fn allocate_with<E>(
        &mut self,
        key: &K,
        initial: S,
        create: impl FnOnce() -> Result<T, E>,
    ) -> Result<(T, S), E> {
        if let Some(entry) = self.free.get_mut(key).and_then(|list| list.pop()) {
            self.stats.reused += 1;
            self.stats.available -= 1;
            return Ok(entry);
        }

        let object = create()?;
        self.stats.created += 1;
        Ok((object, initial))
    }

    pub fn release(&mut self, key: K, object: T, state: S) {
        self.free.entry(key).or_default().push((object, state));
        self.stats.released += 1;
        self.stats.available += 1;
    }

    #[inline]
    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Drop every cached object.
    pub fn clear(&mut self) {
        self.free.clear();
        self.stats.available = 0;
    }
}

pub type TexturePool = ResourcePool<TextureDesc, Arc<Texture>, TextureState>;
pub type BufferPool = ResourcePool<BufferDesc, Arc<Buffer>, BufferState>;
pub type TextureViewPool = ResourcePool<(vk::Image, TextureViewDesc), TextureView, ()>;

#[derive(Default)]
struct DescriptorSlot {
    pool: ResourcePool<vk::DescriptorSetLayout, DescriptorSet, ()>,
    retired: Vec<DescriptorSet>,
}

/// Descriptor sets recycled per frame-in-flight slot.
///
/// Sets retired during a frame stay unavailable until [`Self::release_all`]
/// runs for that slot, and are then only handed out again to the same slot.
pub struct DescriptorSetPool {
    slots: Vec<DescriptorSlot>,
}

impl DescriptorSetPool {
    pub fn new(frames_in_flight: u32) -> Self {
        Self {
            slots: (0..frames_in_flight.max(1)).map(|_| DescriptorSlot::default()).collect(),
        }
    }

    #[inline]
    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn allocate(
        &mut self,
        slot: usize,
        layout: &Arc<DescriptorSetLayout>,
        device: &dyn RenderDevice,
    ) -> Result<DescriptorSet, vk::Result> {
        let (set, _) = self.slots[slot]
            .pool
            .allocate_with(&layout.handle(), (), || device.allocate_descriptor_set(layout))?;
        Ok(set)
    }

    /// Mark a set as used by the current frame of `slot`.
    pub fn retire(&mut self, slot: usize, set: DescriptorSet) {
        self.slots[slot].retired.push(set);
    }

    /// Make every set retired into `slot` available again.
    pub fn release_all(&mut self, slot: usize) {
        let slot = &mut self.slots[slot];
        for set in slot.retired.drain(..) {
            slot.pool.release(set.layout().handle(), set, ());
        }
    }

    pub fn stats(&self) -> PoolStats {
        self.slots
            .iter()
            .fold(PoolStats::default(), |acc, slot| acc + slot.pool.stats())
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.pool.clear();
            slot.retired.clear();
        }
    }
}

/// Every pool the render graph draws from. Owned by the caller and threaded into each frame.
pub struct RenderGraphPools {
    pub(crate) config: RenderGraphConfig,
    pub(crate) textures: TexturePool,
    pub(crate) buffers: BufferPool,
    pub(crate) views: TextureViewPool,
    pub(crate) descriptor_sets: DescriptorSetPool,
}

impl RenderGraphPools {
    pub fn new(config: RenderGraphConfig) -> Self {
        let descriptor_sets = DescriptorSetPool::new(config.frames_in_flight);
        Self {
            config,
            textures: TexturePool::new(),
            buffers: BufferPool::new(),
            views: TextureViewPool::new(),
            descriptor_sets,
        }
    }

    #[inline]
    pub fn config(&self) -> &RenderGraphConfig {
        &self.config
    }

    /// Frame-in-flight slot of `frame_index`.
    #[inline]
    pub fn frame_slot(&self, frame_index: u64) -> usize {
        (frame_index % self.descriptor_sets.num_slots() as u64) as usize
    }

    #[inline]
    pub fn texture_stats(&self) -> PoolStats {
        self.textures.stats()
    }

    #[inline]
    pub fn buffer_stats(&self) -> PoolStats {
        self.buffers.stats()
    }

    #[inline]
    pub fn view_stats(&self) -> PoolStats {
        self.views.stats()
    }

    #[inline]
    pub fn descriptor_set_stats(&self) -> PoolStats {
        self.descriptor_sets.stats()
    }

    pub fn clear(&mut self) {
        log::debug!(
            "Clearing render graph pools: {} textures, {} buffers, {} views cached.",
            self.textures.stats().available,
            self.buffers.stats().available,
            self.views.stats().available,
        );
        self.textures.clear();
        self.buffers.clear();
        self.views.clear();
        self.descriptor_sets.clear();
    }
}

impl Default for RenderGraphPools {
    fn default() -> Self {
        Self::new(RenderGraphConfig::default())
    }
}
