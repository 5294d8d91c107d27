use derive_builder::Builder;

#[derive(Debug, Clone, Builder)]
#[builder(setter(into), default, build_fn(validate = "Self::validate"))]
pub struct RenderGraphConfig {
    /// Number of frame slots descriptor sets are recycled across.
    pub frames_in_flight: u32,
    /// Wrap every pass in a debug label.
    pub debug_labels: bool,
}

impl Default for RenderGraphConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 3,
            debug_labels: false,
        }
    }
}

impl RenderGraphConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.frames_in_flight {
            Some(0) => Err("frames_in_flight must be at least 1".to_owned()),
            _ => Ok(()),
        }
    }
}
