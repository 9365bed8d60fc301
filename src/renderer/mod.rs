mod machinery;
mod worker;

use bon::Builder;

pub use crate::renderer::machinery::{Advance, Renderer};

/// State of the whole renderer and of each of its workers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RenderState {
    Rendering,
    Paused,
    /// Workers exit
    Stopped,
}

impl RenderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderState::Rendering => "Running",
            RenderState::Paused => "Paused",
            RenderState::Stopped => "Stopped",
        }
    }
}

impl std::fmt::Display for RenderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Builder, Copy, Clone, Debug, PartialEq, Eq)]
pub struct RenderSettings {
    /// Edge length of the square tiles a pass is split into
    #[builder(default = 32)]
    pub tile_size: u32,

    /// Number of passes after which rendering pauses, unless sampling is continuous
    #[builder(default = 16)]
    pub sample_budget: u32,

    #[builder(default)]
    pub continuous: bool,

    /// Seed of the pixel jitter. Renders with the same seed are identical.
    #[builder(default)]
    pub seed: u64,

    /// Pin worker threads to CPU cores
    #[builder(default)]
    pub pin_threads: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings::builder().build()
    }
}
