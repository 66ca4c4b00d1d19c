//! The boundary between the engine and the page that embeds it.
//!
//! Everything the engine needs from its surroundings arrives through these
//! traits: device facts, GPU contexts, frame scheduling, reloads, and byte
//! transport for assets. Hosts implement them against a real platform; tests
//! and the demo binary use the offscreen implementations in this module.

pub mod offscreen;

use crate::capability::{CapabilitySignals, RenderSettings};
use crate::camera::PerspectiveCamera;
use crate::scene::SceneGraph;

pub use offscreen::{FileTransport, HostDiagnostics, OffscreenPlatform};

/// Receipt for a frame-callback registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameToken(pub u64);

/// Byte-level download progress reported by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchProgress {
    pub received: u64,
    /// Total payload size when the transport knows it up front.
    pub total: Option<u64>,
}

impl FetchProgress {
    /// Completed fraction in `[0, 1]`, if the total is known.
    pub fn fraction(&self) -> Option<f32> {
        self.total.filter(|total| *total > 0).map(|total| {
            (self.received as f64 / total as f64).clamp(0.0, 1.0) as f32
        })
    }
}

/// What one draw call touched, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    pub meshes: u32,
    pub triangles: u64,
    pub lights: u32,
}

/// Context acquisition failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("no rendering context is available on this device")]
    Unavailable,
    #[error("context initialisation failed: {0}")]
    Init(String),
}

/// Failures raised by a live context while drawing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DrawError {
    #[error("the rendering context was lost")]
    ContextLost,
    #[error("draw failed: {0}")]
    Internal(String),
}

/// Transport failures while fetching an asset.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("asset not found: {0}")]
    NotFound(String),
    #[error("transfer failed: {0}")]
    Failed(String),
}

/// A GPU rendering context bound to one drawable surface.
///
/// Contexts are single-use: once disposed or lost they are never handed
/// back, and `context_id` lets callers verify they were given a fresh one.
pub trait RenderContext {
    /// Identity of this context, unique per acquisition.
    fn context_id(&self) -> u64;

    /// Matches the drawable surface to a new size in physical pixels.
    fn resize(&mut self, width: u32, height: u32);

    fn set_pixel_ratio(&mut self, ratio: f32);

    /// Renders one frame of the scene from the camera's point of view.
    fn draw(
        &mut self,
        scene: &SceneGraph,
        camera: &PerspectiveCamera,
    ) -> Result<FrameStats, DrawError>;

    /// Releases the context. Further draws must fail.
    fn dispose(&mut self);
}

impl std::fmt::Debug for dyn RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("context_id", &self.context_id())
            .finish()
    }
}

/// Facilities the embedding page provides to the engine.
pub trait HostPlatform {
    /// Samples the ambient device facts used by the capability probe.
    fn capability_signals(&self) -> CapabilitySignals;

    /// Creates a fresh rendering context for the drawable surface. A stale
    /// or previously disposed context is never returned.
    fn acquire_context(
        &mut self,
        settings: &RenderSettings,
    ) -> Result<Box<dyn RenderContext>, ContextError>;

    /// Asks the host to start invoking the frame callback.
    fn register_frames(&mut self) -> FrameToken;

    /// Stops frame callbacks for the given registration.
    fn unregister_frames(&mut self, token: FrameToken);

    /// Requests a full host reload, the recovery path for fatal failures.
    fn request_reload(&mut self);
}

/// Byte transport for model assets. Runs on the loader worker thread.
pub trait AssetTransport: Send + Sync {
    /// Fetches the full payload behind `url`, reporting progress as bytes
    /// arrive. Blocking.
    fn fetch(
        &self,
        url: &str,
        on_progress: &mut dyn FnMut(FetchProgress),
    ) -> Result<Vec<u8>, TransportError>;
}
