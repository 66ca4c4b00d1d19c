//! Core library for the interactive model viewer.
//!
//! The crate is host agnostic: everything that touches a real platform
//! (GPU contexts, asset transport, frame scheduling) sits behind the traits
//! in [`host`], so the same engine runs under a browser shell, a native
//! window, or the offscreen harness used by the tests and the CLI. The
//! [`viewer`] facade drives one viewing session end to end, from the
//! capability probe through loading, the render loop, and teardown.

pub mod asset;
pub mod camera;
pub mod capability;
pub mod config;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod render;
pub mod scene;
pub mod viewer;

pub use asset::{AssetLoader, DecoderSource, GeometryDecoder, LoadError};
pub use camera::{OrbitController, PerspectiveCamera};
pub use capability::{probe, CapabilitySignals, CapabilityTier, RenderSettings};
pub use config::ViewerConfig;
pub use error::{Result, ViewerError};
pub use host::{AssetTransport, HostPlatform, RenderContext};
pub use lifecycle::{FailureKind, Lifecycle, LoadState};
pub use render::{RenderLoop, SceneHandle};
pub use scene::{SceneGraph, SceneNode, Transform};
pub use viewer::{FallbackStatus, OverlayStatus, Surface, Viewer};
