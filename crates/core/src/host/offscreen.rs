//! Offscreen host implementations used by tests and the demo binary.
//!
//! The platform hands out instrumented contexts that count draws instead of
//! touching a GPU, and the file transport serves assets from disk with the
//! same chunked progress reporting a network transport would give.

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::capability::{CapabilitySignals, RenderSettings};
use crate::camera::PerspectiveCamera;
use crate::scene::{NodeKind, SceneGraph};

use super::{
    AssetTransport, ContextError, DrawError, FetchProgress, FrameStats, FrameToken, HostPlatform,
    RenderContext, TransportError,
};

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Counters shared between an [`OffscreenPlatform`], its contexts, and the
/// test observing them.
#[derive(Debug, Default)]
pub struct HostDiagnostics {
    context_ids: Mutex<Vec<u64>>,
    live_frame_tokens: Mutex<Vec<u64>>,
    draw_calls: AtomicUsize,
    reload_requests: AtomicUsize,
    force_context_lost: AtomicBool,
    force_draw_failure: AtomicBool,
    last_stats: Mutex<Option<FrameStats>>,
    last_resize: Mutex<Option<(u32, u32)>>,
    last_pixel_ratio: Mutex<Option<f32>>,
}

impl HostDiagnostics {
    /// Identifiers of every context acquired so far, in order.
    pub fn context_ids(&self) -> Vec<u64> {
        self.lock(&self.context_ids).clone()
    }

    pub fn contexts_acquired(&self) -> usize {
        self.lock(&self.context_ids).len()
    }

    /// Number of frame registrations currently live.
    pub fn active_frame_registrations(&self) -> usize {
        self.lock(&self.live_frame_tokens).len()
    }

    pub fn draw_calls(&self) -> usize {
        self.draw_calls.load(Ordering::SeqCst)
    }

    pub fn reload_requests(&self) -> usize {
        self.reload_requests.load(Ordering::SeqCst)
    }

    /// Makes every subsequent draw fail with a lost context.
    pub fn force_context_loss(&self) {
        self.force_context_lost.store(true, Ordering::SeqCst);
    }

    pub fn clear_context_loss(&self) {
        self.force_context_lost.store(false, Ordering::SeqCst);
    }

    /// Makes every subsequent draw fail with an internal error.
    pub fn force_draw_failure(&self) {
        self.force_draw_failure.store(true, Ordering::SeqCst);
    }

    pub fn last_frame_stats(&self) -> Option<FrameStats> {
        *self.lock(&self.last_stats)
    }

    pub fn last_resize(&self) -> Option<(u32, u32)> {
        *self.lock(&self.last_resize)
    }

    pub fn last_pixel_ratio(&self) -> Option<f32> {
        *self.lock(&self.last_pixel_ratio)
    }

    fn lock<'a, T>(&self, mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
        match mutex.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Host platform that renders nowhere and records everything.
#[derive(Debug)]
pub struct OffscreenPlatform {
    signals: CapabilitySignals,
    diagnostics: Arc<HostDiagnostics>,
    next_context_id: u64,
    next_frame_token: u64,
    fail_context_acquire: bool,
}

impl OffscreenPlatform {
    pub fn new(signals: CapabilitySignals) -> Self {
        Self {
            signals,
            diagnostics: Arc::new(HostDiagnostics::default()),
            next_context_id: 1,
            next_frame_token: 1,
            fail_context_acquire: false,
        }
    }

    /// Shared handle for inspecting this platform from outside the viewer.
    pub fn diagnostics(&self) -> Arc<HostDiagnostics> {
        Arc::clone(&self.diagnostics)
    }

    /// Scripts the next `acquire_context` calls to fail.
    pub fn set_context_acquisition_fails(&mut self, fails: bool) {
        self.fail_context_acquire = fails;
    }
}

impl HostPlatform for OffscreenPlatform {
    fn capability_signals(&self) -> CapabilitySignals {
        self.signals.clone()
    }

    fn acquire_context(
        &mut self,
        settings: &RenderSettings,
    ) -> Result<Box<dyn RenderContext>, ContextError> {
        if self.signals.gpu.is_none() {
            return Err(ContextError::Unavailable);
        }
        if self.fail_context_acquire {
            return Err(ContextError::Init("scripted acquisition failure".into()));
        }

        let id = self.next_context_id;
        self.next_context_id += 1;
        self.diagnostics.lock(&self.diagnostics.context_ids).push(id);
        *self.diagnostics.lock(&self.diagnostics.last_pixel_ratio) = Some(settings.pixel_ratio);

        Ok(Box::new(OffscreenContext {
            id,
            diagnostics: Arc::clone(&self.diagnostics),
            disposed: false,
        }))
    }

    fn register_frames(&mut self) -> FrameToken {
        let token = FrameToken(self.next_frame_token);
        self.next_frame_token += 1;
        self.diagnostics
            .lock(&self.diagnostics.live_frame_tokens)
            .push(token.0);
        token
    }

    fn unregister_frames(&mut self, token: FrameToken) {
        self.diagnostics
            .lock(&self.diagnostics.live_frame_tokens)
            .retain(|live| *live != token.0);
    }

    fn request_reload(&mut self) {
        self.diagnostics
            .reload_requests
            .fetch_add(1, Ordering::SeqCst);
    }
}

struct OffscreenContext {
    id: u64,
    diagnostics: Arc<HostDiagnostics>,
    disposed: bool,
}

impl RenderContext for OffscreenContext {
    fn context_id(&self) -> u64 {
        self.id
    }

    fn resize(&mut self, width: u32, height: u32) {
        *self.diagnostics.lock(&self.diagnostics.last_resize) = Some((width, height));
    }

    fn set_pixel_ratio(&mut self, ratio: f32) {
        *self.diagnostics.lock(&self.diagnostics.last_pixel_ratio) = Some(ratio);
    }

    fn draw(
        &mut self,
        scene: &SceneGraph,
        _camera: &PerspectiveCamera,
    ) -> Result<FrameStats, DrawError> {
        if self.disposed {
            return Err(DrawError::Internal("draw on a disposed context".into()));
        }
        if self.diagnostics.force_context_lost.load(Ordering::SeqCst) {
            return Err(DrawError::ContextLost);
        }
        if self.diagnostics.force_draw_failure.load(Ordering::SeqCst) {
            return Err(DrawError::Internal("scripted draw failure".into()));
        }

        let mut stats = FrameStats::default();
        scene.root.traverse(&mut |node| match &node.kind {
            NodeKind::Mesh(mesh) => {
                stats.meshes += 1;
                stats.triangles += mesh.geometry.triangle_count() as u64;
            }
            NodeKind::Light(_) => stats.lights += 1,
            NodeKind::Group => {}
        });

        self.diagnostics.draw_calls.fetch_add(1, Ordering::SeqCst);
        *self.diagnostics.lock(&self.diagnostics.last_stats) = Some(stats);
        Ok(stats)
    }

    fn dispose(&mut self) {
        self.disposed = true;
    }
}

/// Transport that serves `url` as a filesystem path, streaming the bytes in
/// fixed chunks so progress behaves like a download.
#[derive(Debug, Clone)]
pub struct FileTransport {
    chunk_size: usize,
}

impl Default for FileTransport {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl FileTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }
}

impl AssetTransport for FileTransport {
    fn fetch(
        &self,
        url: &str,
        on_progress: &mut dyn FnMut(FetchProgress),
    ) -> Result<Vec<u8>, TransportError> {
        let path = PathBuf::from(url);
        let mut file = File::open(&path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                TransportError::NotFound(url.to_string())
            } else {
                TransportError::Failed(err.to_string())
            }
        })?;
        let total = file
            .metadata()
            .ok()
            .map(|metadata| metadata.len());

        let mut payload = Vec::new();
        let mut chunk = vec![0u8; self.chunk_size];
        loop {
            let read = file
                .read(&mut chunk)
                .map_err(|err| TransportError::Failed(err.to_string()))?;
            if read == 0 {
                break;
            }
            payload.extend_from_slice(&chunk[..read]);
            on_progress(FetchProgress {
                received: payload.len() as u64,
                total,
            });
        }
        Ok(payload)
    }
}
