//! Device capability probe and the render settings derived from it.
//!
//! The probe runs once per activation, before any GPU work, and folds the
//! host's ambient device facts into a two-level fidelity tier. Everything the
//! renderer gates on the tier (antialiasing, shadow maps, pixel ratio, power
//! preference) is derived in one place so the rest of the engine never
//! re-inspects raw signals.

use serde::{Deserialize, Serialize};

/// Shadow map edge length used whenever shadow maps are enabled.
pub const SHADOW_MAP_SIZE: u32 = 1024;
/// Device pixel ratio cap for the high fidelity tier.
pub const PIXEL_RATIO_CAP_HIGH: f32 = 1.5;
/// Device pixel ratio cap for the standard tier.
pub const PIXEL_RATIO_CAP_STANDARD: f32 = 1.0;

const HIGH_TIER_MIN_CORES: u32 = 4;
const HIGH_TIER_MIN_MEMORY_GB: f32 = 4.0;
const HIGH_TIER_MIN_VIEWPORT_WIDTH: u32 = 768;

/// Class of GPU rendering context the host can supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GpuContextClass {
    /// First-generation context; enough to render, never high tier.
    Legacy,
    /// Second-generation context with the full feature set.
    Modern,
}

/// Ambient device facts sampled by the host at activation time.
///
/// Optional fields model signals the platform may simply not expose. A
/// missing signal is treated as failing its gate, so partial information
/// can only lower the tier, never raise it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySignals {
    pub gpu: Option<GpuContextClass>,
    pub logical_cores: Option<u32>,
    pub device_memory_gb: Option<f32>,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub device_pixel_ratio: f32,
}

impl Default for CapabilitySignals {
    fn default() -> Self {
        Self {
            gpu: None,
            logical_cores: None,
            device_memory_gb: None,
            viewport_width: 0,
            viewport_height: 0,
            device_pixel_ratio: 1.0,
        }
    }
}

impl CapabilitySignals {
    /// Whether any rendering context can be created at all.
    pub fn supports_rendering(&self) -> bool {
        self.gpu.is_some()
    }
}

/// Fidelity tier selected for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityTier {
    Standard,
    High,
}

/// Classifies the device. Pure: equal signals always yield the same tier.
///
/// `High` requires a modern context class, more than four logical cores, at
/// least 4 GB of device memory, and a viewport at least 768 px wide. Every
/// other combination, including any missing signal, is `Standard`.
pub fn probe(signals: &CapabilitySignals) -> CapabilityTier {
    let modern_gpu = signals.gpu == Some(GpuContextClass::Modern);
    let enough_cores = signals
        .logical_cores
        .map(|cores| cores > HIGH_TIER_MIN_CORES)
        .unwrap_or(false);
    let enough_memory = signals
        .device_memory_gb
        .map(|gb| gb >= HIGH_TIER_MIN_MEMORY_GB)
        .unwrap_or(false);
    let wide_viewport = signals.viewport_width >= HIGH_TIER_MIN_VIEWPORT_WIDTH;

    if modern_gpu && enough_cores && enough_memory && wide_viewport {
        CapabilityTier::High
    } else {
        CapabilityTier::Standard
    }
}

/// GPU power profile requested from the host when acquiring a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerPreference {
    HighPerformance,
    LowPower,
}

/// Renderer options derived from the tier. One source of truth for every
/// fidelity gate; computed once per activation and handed to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    pub antialias: bool,
    pub shadow_maps: bool,
    pub shadow_map_size: u32,
    /// Effective ratio after the tier cap, not the raw device value.
    pub pixel_ratio: f32,
    pub power_preference: PowerPreference,
    /// Clear with alpha 0 so the host backdrop shows through.
    pub transparent_clear: bool,
    pub srgb_output: bool,
}

impl RenderSettings {
    /// Derives the settings for a tier and the device's raw pixel ratio.
    pub fn for_tier(tier: CapabilityTier, device_pixel_ratio: f32) -> Self {
        let high = tier == CapabilityTier::High;
        let cap = if high {
            PIXEL_RATIO_CAP_HIGH
        } else {
            PIXEL_RATIO_CAP_STANDARD
        };
        Self {
            antialias: high,
            shadow_maps: high,
            shadow_map_size: SHADOW_MAP_SIZE,
            pixel_ratio: device_pixel_ratio.min(cap),
            power_preference: if high {
                PowerPreference::HighPerformance
            } else {
                PowerPreference::LowPower
            },
            transparent_clear: true,
            srgb_output: true,
        }
    }
}
