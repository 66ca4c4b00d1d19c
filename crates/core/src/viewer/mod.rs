//! Public facade: one handle the host embeds, plus the presentation
//! model it renders chrome from.
//!
//! The facade owns a [`Lifecycle`] and adds the pieces the host shell
//! cares about: config validation up front and a [`Surface`] describing
//! what belongs on screen for the current state, so hosts never branch
//! on [`LoadState`] themselves.

use std::sync::Arc;
use std::time::Duration;

use crate::asset::DecoderSource;
use crate::capability::CapabilityTier;
use crate::config::ViewerConfig;
use crate::error::Result;
use crate::host::{AssetTransport, HostPlatform};
use crate::lifecycle::{Lifecycle, LoadState};
use crate::scene::resources::ResourceCounts;

const UNSUPPORTED_MESSAGE: &str = "3D model not available";
const CONTEXT_LOST_MESSAGE: &str = "Rendering was interrupted";

/// Chrome layered over the live canvas.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayStatus {
    Loading { progress: f32 },
    Error { message: String, offer_retry: bool },
}

/// Status line shown with the fallback image.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackStatus {
    pub message: String,
    pub offer_retry: bool,
}

/// What the host should present right now.
#[derive(Debug, Clone, PartialEq)]
pub enum Surface {
    /// Keep the canvas mounted, optionally veiled by an overlay.
    Canvas { overlay: Option<OverlayStatus> },
    /// Swap the canvas for a still image and a status line.
    Fallback {
        image: Option<String>,
        status: FallbackStatus,
    },
}

/// Embeddable viewer handle.
#[derive(Debug)]
pub struct Viewer {
    lifecycle: Lifecycle,
}

impl Viewer {
    /// Validates the configuration and builds an idle viewer.
    pub fn new(
        config: ViewerConfig,
        host: Box<dyn HostPlatform>,
        transport: Arc<dyn AssetTransport>,
        decoder: DecoderSource,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            lifecycle: Lifecycle::new(config, host, transport, decoder),
        })
    }

    pub fn state(&self) -> &LoadState {
        self.lifecycle.state()
    }

    pub fn tier(&self) -> Option<CapabilityTier> {
        self.lifecycle.tier()
    }

    pub fn config(&self) -> &ViewerConfig {
        self.lifecycle.config()
    }

    pub fn resource_counts(&self) -> ResourceCounts {
        self.lifecycle.resource_counts()
    }

    pub fn context_id(&self) -> Option<u64> {
        self.lifecycle.context_id()
    }

    pub fn activate(&mut self) {
        self.lifecycle.activate();
    }

    pub fn deactivate(&mut self) {
        self.lifecycle.deactivate();
    }

    pub fn on_frame(&mut self, now: Duration) {
        self.lifecycle.on_frame(now);
    }

    pub fn notify_resized(&mut self, width: u32, height: u32) {
        self.lifecycle.notify_resized(width, height);
    }

    pub fn notify_context_lost(&mut self) {
        self.lifecycle.notify_context_lost();
    }

    pub fn input_rotate(&mut self, yaw_delta: f32, pitch_delta: f32) {
        self.lifecycle.input_rotate(yaw_delta, pitch_delta);
    }

    pub fn input_zoom(&mut self, steps: f32) {
        self.lifecycle.input_zoom(steps);
    }

    pub fn idle_animation(&self) -> bool {
        self.lifecycle.idle_animation()
    }

    pub fn set_idle_animation(&mut self, enabled: bool) {
        self.lifecycle.set_idle_animation(enabled);
    }

    pub fn on_loaded<F: FnMut() + 'static>(&mut self, callback: F) {
        self.lifecycle.on_loaded(callback);
    }

    pub fn retry(&mut self) -> bool {
        self.lifecycle.retry()
    }

    /// Blocks until an in-flight load has finished producing events.
    pub fn settle_load(&mut self) {
        self.lifecycle.settle_load();
    }

    /// The presentation model for the current state at time `now`.
    ///
    /// Pure with respect to the viewer: calling this never changes state.
    pub fn surface(&self, now: Duration) -> Surface {
        match self.lifecycle.state() {
            LoadState::Idle => Surface::Canvas { overlay: None },
            LoadState::Probing => Surface::Canvas {
                overlay: self.loading_overlay(0.0),
            },
            LoadState::Loading { progress } => Surface::Canvas {
                overlay: self.loading_overlay(*progress),
            },
            LoadState::Ready => {
                let overlay = if self.within_min_loading(now) {
                    self.loading_overlay(1.0)
                } else {
                    None
                };
                Surface::Canvas { overlay }
            }
            LoadState::Failed { message, .. } => Surface::Canvas {
                overlay: Some(OverlayStatus::Error {
                    message: message.clone(),
                    offer_retry: true,
                }),
            },
            LoadState::Unsupported => Surface::Fallback {
                image: self.fallback_image(),
                status: FallbackStatus {
                    message: UNSUPPORTED_MESSAGE.to_string(),
                    offer_retry: false,
                },
            },
            LoadState::ContextLost => Surface::Fallback {
                image: self.fallback_image(),
                status: FallbackStatus {
                    message: CONTEXT_LOST_MESSAGE.to_string(),
                    offer_retry: true,
                },
            },
        }
    }

    fn loading_overlay(&self, progress: f32) -> Option<OverlayStatus> {
        if self.config().show_loading_overlay {
            Some(OverlayStatus::Loading { progress })
        } else {
            None
        }
    }

    /// Whether the loading veil should linger over a ready scene.
    fn within_min_loading(&self, now: Duration) -> bool {
        if !self.config().show_loading_overlay {
            return false;
        }
        let min = self.config().min_loading_duration();
        if min.is_zero() {
            return false;
        }
        match self.lifecycle.first_frame_at() {
            Some(first) => now.saturating_sub(first) < min,
            None => true,
        }
    }

    fn fallback_image(&self) -> Option<String> {
        let config = self.config();
        config
            .fallback_image
            .clone()
            .or_else(|| config.background_image.clone())
    }
}
