#![allow(dead_code)]

use std::sync::{Arc, Once};
use std::thread::{self, ThreadId};
use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::{const_mutex, Mutex};
use zenith_rendergraph::{RenderGraphConfig, RenderGraphConfigBuilder, RenderGraphPools};
use zenith_rhi::{
    vk, DescriptorSetLayout, HeadlessDevice, LayoutBinding, RecordedCommand, RenderDevice,
    RootSignature, TextureBarrier, BufferBarrier,
};

/// Keeps every record together with the test thread that emitted it.
struct CaptureLogger {
    records: Mutex<Vec<(ThreadId, Level, String)>>,
}

static LOGGER: CaptureLogger = CaptureLogger {
    records: const_mutex(Vec::new()),
};

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.records
            .lock()
            .push((thread::current().id(), record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

pub fn init_logger() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(LevelFilter::Trace);
    });
}

/// Drain the warnings logged so far by the calling thread.
pub fn take_warnings() -> Vec<String> {
    let current = thread::current().id();
    let mut records = LOGGER.records.lock();
    let mut warnings = Vec::new();
    records.retain(|(thread, level, message)| {
        if *thread == current && *level == Level::Warn {
            warnings.push(message.clone());
            false
        } else {
            *thread != current
        }
    });
    warnings
}

pub fn pools(frames_in_flight: u32) -> RenderGraphPools {
    let config: RenderGraphConfig = RenderGraphConfigBuilder::default()
        .frames_in_flight(frames_in_flight)
        .build()
        .unwrap();
    RenderGraphPools::new(config)
}

pub fn labelled_pools() -> RenderGraphPools {
    let config = RenderGraphConfigBuilder::default()
        .debug_labels(true)
        .build()
        .unwrap();
    RenderGraphPools::new(config)
}

/// Root signature with one set per entry of `sets`.
pub fn root_signature(device: &HeadlessDevice, name: &str, sets: &[&[LayoutBinding]]) -> Arc<RootSignature> {
    let layouts: Vec<Arc<DescriptorSetLayout>> = sets
        .iter()
        .enumerate()
        .map(|(index, bindings)| {
            Arc::new(
                device
                    .create_descriptor_set_layout(&format!("{name}.set{index}"), bindings)
                    .unwrap(),
            )
        })
        .collect();
    Arc::new(device.create_root_signature(name, &layouts, 0).unwrap())
}

pub fn sampled(binding: u32) -> LayoutBinding {
    LayoutBinding::new(binding, vk::DescriptorType::SAMPLED_IMAGE, vk::ShaderStageFlags::ALL)
}

pub fn storage_image(binding: u32) -> LayoutBinding {
    LayoutBinding::new(binding, vk::DescriptorType::STORAGE_IMAGE, vk::ShaderStageFlags::ALL)
}

pub fn storage_buffer(binding: u32) -> LayoutBinding {
    LayoutBinding::new(binding, vk::DescriptorType::STORAGE_BUFFER, vk::ShaderStageFlags::ALL)
}

pub fn texture_barriers(commands: &[RecordedCommand]) -> Vec<TextureBarrier> {
    commands
        .iter()
        .filter_map(|command| match command {
            RecordedCommand::PipelineBarrier { textures, .. } => Some(textures.clone()),
            _ => None,
        })
        .flatten()
        .collect()
}

pub fn buffer_barriers(commands: &[RecordedCommand]) -> Vec<BufferBarrier> {
    commands
        .iter()
        .filter_map(|command| match command {
            RecordedCommand::PipelineBarrier { buffers, .. } => Some(buffers.clone()),
            _ => None,
        })
        .flatten()
        .collect()
}
