use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Result, ViewerError};

/// Static configuration for one viewer instance.
///
/// The host hands this over once; it never changes while a session is
/// active. Only the first asset URL is fetched. Additional entries are
/// carried so hosts can describe alternates, but no fallback policy is
/// applied to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub asset_urls: Vec<String>,
    /// Image shown by the fallback surface when rendering is unavailable.
    pub fallback_image: Option<String>,
    /// Backdrop image the host keeps behind the canvas.
    pub background_image: Option<String>,
    /// Whether the loading overlay is rendered during probe and load.
    pub show_loading_overlay: bool,
    /// Minimum time the loading overlay stays up after the first frame,
    /// even if the model finishes earlier. Zero means no artificial delay.
    pub min_loading_ms: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            asset_urls: Vec::new(),
            fallback_image: None,
            background_image: None,
            show_loading_overlay: true,
            min_loading_ms: 0,
        }
    }
}

impl ViewerConfig {
    /// Builds a configuration around a list of asset URLs.
    pub fn new<I, S>(asset_urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            asset_urls: asset_urls.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Returns the URL the loader will fetch, if any.
    pub fn primary_url(&self) -> Option<&str> {
        self.asset_urls.first().map(String::as_str)
    }

    /// Checks that the configuration can drive a session.
    pub fn validate(&self) -> Result<()> {
        match self.primary_url() {
            None => Err(ViewerError::config("at least one asset URL is required")),
            Some(url) if url.trim().is_empty() => {
                Err(ViewerError::config("the primary asset URL must not be blank"))
            }
            Some(_) => Ok(()),
        }
    }

    /// Minimum time the loading overlay remains visible.
    pub fn min_loading_duration(&self) -> Duration {
        Duration::from_millis(self.min_loading_ms)
    }
}
