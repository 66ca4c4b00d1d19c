//! The session state machine: activation, loading, rendering, teardown.
//!
//! A [`Lifecycle`] owns everything a mounted viewer holds: the host handle,
//! the loader, at most one render loop, at most one frame registration, and
//! the resource ledger those are accounted against. Every path out of a
//! session funnels through one teardown routine, so resources cannot leak
//! no matter which state the session dies in.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::asset::{AssetLoader, DecodedScene, DecoderSource, LoadError, LoadEvent, LoadTask};
use crate::camera::{OrbitController, PerspectiveCamera};
use crate::capability::{probe, CapabilityTier, RenderSettings};
use crate::config::ViewerConfig;
use crate::host::{AssetTransport, DrawError, FrameToken, HostPlatform};
use crate::render::{RenderLoop, SceneHandle};
use crate::scene::build::{build_model, build_stage};
use crate::scene::resources::{ResourceCounts, ResourceKind, ResourceLedger};

const DEFAULT_ASPECT: f32 = 16.0 / 9.0;

/// Failure classes surfaced to the host alongside a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    Transport,
    Decode,
    DecoderUnavailable,
    Initialization,
}

impl From<&LoadError> for FailureKind {
    fn from(err: &LoadError) -> Self {
        match err {
            LoadError::Transport(_) => Self::Transport,
            LoadError::Malformed(_) => Self::Decode,
            LoadError::DecoderUnavailable(_) => Self::DecoderUnavailable,
        }
    }
}

/// Where a session currently stands. The facade renders purely from this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LoadState {
    Idle,
    Probing,
    Loading { progress: f32 },
    Ready,
    Unsupported,
    ContextLost,
    Failed { kind: FailureKind, message: String },
}

impl LoadState {
    /// Load progress, while loading.
    pub fn progress(&self) -> Option<f32> {
        match self {
            Self::Loading { progress } => Some(*progress),
            _ => None,
        }
    }

    /// Whether the retry affordance applies in this state.
    pub fn allows_retry(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::ContextLost)
    }
}

/// Owns one viewing session end to end.
pub struct Lifecycle {
    config: ViewerConfig,
    host: Box<dyn HostPlatform>,
    loader: AssetLoader,
    ledger: Arc<ResourceLedger>,
    state: LoadState,
    tier: Option<CapabilityTier>,
    render: Option<RenderLoop>,
    frame_token: Option<FrameToken>,
    load: Option<LoadTask>,
    idle_animation: bool,
    loaded_notified: bool,
    on_loaded: Option<Box<dyn FnMut()>>,
    first_frame_at: Option<Duration>,
}

impl Lifecycle {
    pub fn new(
        config: ViewerConfig,
        host: Box<dyn HostPlatform>,
        transport: Arc<dyn AssetTransport>,
        decoder: DecoderSource,
    ) -> Self {
        Self {
            config,
            host,
            loader: AssetLoader::new(transport, decoder),
            ledger: ResourceLedger::new(),
            state: LoadState::Idle,
            tier: None,
            render: None,
            frame_token: None,
            load: None,
            idle_animation: true,
            loaded_notified: false,
            on_loaded: None,
            first_frame_at: None,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn tier(&self) -> Option<CapabilityTier> {
        self.tier
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Live GPU-visible resources owned by this session.
    pub fn resource_counts(&self) -> ResourceCounts {
        self.ledger.snapshot()
    }

    /// Identity of the live context, if one exists.
    pub fn context_id(&self) -> Option<u64> {
        self.render.as_ref().map(|render| render.handle.context_id())
    }

    pub fn idle_animation(&self) -> bool {
        self.idle_animation
    }

    /// Toggles idle motion. Applies immediately to a live loop and is
    /// remembered across activations.
    pub fn set_idle_animation(&mut self, enabled: bool) {
        self.idle_animation = enabled;
        if let Some(render) = self.render.as_mut() {
            render.set_idle_animation(enabled);
        }
    }

    /// Registers the callback fired when the model first becomes ready.
    /// Fires at most once per activation.
    pub fn on_loaded<F: FnMut() + 'static>(&mut self, callback: F) {
        self.on_loaded = Some(Box::new(callback));
    }

    /// Starts a session. An already active session is fully torn down
    /// first; two live contexts never coexist.
    pub fn activate(&mut self) {
        if self.state != LoadState::Idle {
            self.deactivate();
        }
        self.set_state(LoadState::Probing);

        let signals = self.host.capability_signals();
        if !signals.supports_rendering() {
            self.set_state(LoadState::Unsupported);
            return;
        }

        let tier = probe(&signals);
        self.tier = Some(tier);
        let settings = RenderSettings::for_tier(tier, signals.device_pixel_ratio);
        tracing::info!(?tier, pixel_ratio = settings.pixel_ratio, "capability probe complete");

        let mut context = match self.host.acquire_context(&settings) {
            Ok(context) => context,
            Err(err) => {
                tracing::warn!(error = %err, "context acquisition failed");
                self.teardown();
                self.set_state(LoadState::Failed {
                    kind: FailureKind::Initialization,
                    message: err.to_string(),
                });
                return;
            }
        };
        context.set_pixel_ratio(settings.pixel_ratio);

        let aspect = if signals.viewport_height > 0 {
            signals.viewport_width as f32 / signals.viewport_height as f32
        } else {
            DEFAULT_ASPECT
        };
        let camera = PerspectiveCamera::new(aspect);
        let controller = OrbitController::from_camera(&camera);
        let handle = SceneHandle::new(
            context,
            self.ledger.acquire(ResourceKind::Context),
            camera,
            controller,
            build_stage(tier),
        );
        let mut render = RenderLoop::new(handle);
        render.set_idle_animation(self.idle_animation);
        self.render = Some(render);

        self.frame_token = Some(self.host.register_frames());

        let url = self.config.primary_url().unwrap_or_default().to_string();
        self.load = Some(self.loader.begin(&url));
        self.loaded_notified = false;
        self.set_state(LoadState::Loading { progress: 0.0 });
    }

    /// Ends the session and returns to `Idle`. Idempotent.
    pub fn deactivate(&mut self) {
        if self.state == LoadState::Idle {
            return;
        }
        self.teardown();
        self.set_state(LoadState::Idle);
    }

    /// One frame: drain loader events first, so a terminal event and its
    /// first rendered frame coincide, then run the render loop.
    pub fn on_frame(&mut self, now: Duration) {
        if self.render.is_some() && self.first_frame_at.is_none() {
            self.first_frame_at = Some(now);
        }

        self.drain_load_events();

        let Some(render) = self.render.as_mut() else {
            return;
        };
        match render.on_frame(now) {
            Ok(_) => {}
            Err(DrawError::ContextLost) => {
                tracing::warn!("rendering context lost during draw");
                self.handle_context_loss();
            }
            Err(DrawError::Internal(message)) => {
                tracing::error!(%message, "draw failed");
                self.teardown();
                self.set_state(LoadState::Failed {
                    kind: FailureKind::Initialization,
                    message,
                });
            }
        }
    }

    /// Host notification that the rendering context is gone. Ignored when
    /// no context is held.
    pub fn notify_context_lost(&mut self) {
        if self.render.is_some() {
            tracing::warn!("host reported a lost context");
            self.handle_context_loss();
        }
    }

    /// Host notification that the drawable surface changed size. Ignored
    /// when no context is held.
    pub fn notify_resized(&mut self, width: u32, height: u32) {
        if let Some(render) = self.render.as_mut() {
            render.handle.resize(width, height);
        }
    }

    /// Forwards a pointer or touch drag to the orbit controller.
    pub fn input_rotate(&mut self, yaw_delta: f32, pitch_delta: f32) {
        if let Some(render) = self.render.as_mut() {
            render.handle.controller.rotate(yaw_delta, pitch_delta);
        }
    }

    /// Forwards a scroll or pinch step to the orbit controller.
    pub fn input_zoom(&mut self, steps: f32) {
        if let Some(render) = self.render.as_mut() {
            render.handle.controller.zoom(steps);
        }
    }

    /// Asks the host for a full reload. Only meaningful from a failed or
    /// context-lost session; returns whether the request was made.
    pub fn retry(&mut self) -> bool {
        if !self.state.allows_retry() {
            return false;
        }
        tracing::info!("retry requested, deferring to a host reload");
        self.host.request_reload();
        true
    }

    /// Timestamp of the first frame pumped into the current session.
    pub(crate) fn first_frame_at(&self) -> Option<Duration> {
        self.first_frame_at
    }

    /// Blocks until an in-flight load worker has exited, leaving its
    /// events queued for the next frame. Intended for headless hosts that
    /// drive frames synchronously.
    pub fn settle_load(&mut self) {
        if let Some(task) = self.load.as_mut() {
            task.wait();
        }
    }

    fn drain_load_events(&mut self) {
        let events = match &self.load {
            Some(task) => task.poll_events(),
            None => return,
        };
        for event in events {
            match event {
                LoadEvent::Progress(fraction) => {
                    if let LoadState::Loading { progress } = &self.state {
                        let next = fraction.max(*progress);
                        if next > *progress {
                            self.set_state(LoadState::Loading { progress: next });
                        }
                    }
                }
                LoadEvent::Finished(Ok(scene)) => {
                    self.load = None;
                    self.finish_load(scene);
                }
                LoadEvent::Finished(Err(err)) => {
                    self.load = None;
                    self.set_state(LoadState::Failed {
                        kind: FailureKind::from(&err),
                        message: err.to_string(),
                    });
                }
            }
        }
    }

    fn finish_load(&mut self, scene: DecodedScene) {
        let (Some(tier), Some(render)) = (self.tier, self.render.as_mut()) else {
            return;
        };
        tracing::info!(
            meshes = scene.meshes.len(),
            triangles = scene.total_triangle_count(),
            "model decoded"
        );
        render.handle.mount_model(build_model(&scene, tier, &self.ledger));
        self.set_state(LoadState::Ready);

        if !self.loaded_notified {
            self.loaded_notified = true;
            if let Some(callback) = self.on_loaded.as_mut() {
                callback();
            }
        }
    }

    fn handle_context_loss(&mut self) {
        self.teardown();
        self.set_state(LoadState::ContextLost);
    }

    fn teardown(&mut self) {
        if let Some(task) = self.load.take() {
            task.cancel();
        }
        if let Some(token) = self.frame_token.take() {
            self.host.unregister_frames(token);
        }
        if let Some(mut render) = self.render.take() {
            render.handle.release();
        }
        self.tier = None;
        self.first_frame_at = None;
        tracing::debug!("session torn down");
    }

    fn set_state(&mut self, next: LoadState) {
        if self.state == next {
            return;
        }
        let progress_tick = matches!(self.state, LoadState::Loading { .. })
            && matches!(next, LoadState::Loading { .. });
        if progress_tick {
            tracing::debug!(from = ?self.state, to = ?next, "session state");
        } else {
            tracing::info!(from = ?self.state, to = ?next, "session state");
        }
        self.state = next;
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("state", &self.state)
            .field("tier", &self.tier)
            .field("has_render", &self.render.is_some())
            .field("loading", &self.load.is_some())
            .finish()
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::format::{encode, MaterialParams};
    use crate::asset::{DecoderManifest, GeometryDecoder, MeshData, NodeEntry};
    use crate::capability::{CapabilitySignals, GpuContextClass};
    use crate::host::offscreen::{HostDiagnostics, OffscreenPlatform};
    use crate::host::{FetchProgress, TransportError};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{mpsc, Mutex};

    fn high_signals() -> CapabilitySignals {
        CapabilitySignals {
            gpu: Some(GpuContextClass::Modern),
            logical_cores: Some(8),
            device_memory_gb: Some(8.0),
            viewport_width: 1280,
            viewport_height: 720,
            device_pixel_ratio: 2.0,
        }
    }

    fn scene_bytes() -> Vec<u8> {
        let mut node = NodeEntry::group("triangle");
        node.mesh = Some(0);
        encode(&DecodedScene {
            meshes: vec![MeshData {
                name: "triangle".to_string(),
                positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
                normals: vec![[0.0, 0.0, 1.0]; 3],
                indices: vec![0, 1, 2],
                material: MaterialParams::default(),
            }],
            nodes: vec![node],
            roots: vec![0],
        })
        .unwrap()
    }

    fn prepared_decoder() -> DecoderSource {
        DecoderSource::Prepared(
            GeometryDecoder::from_manifest(&DecoderManifest::current()).unwrap(),
        )
    }

    struct StaticTransport {
        payload: Vec<u8>,
    }

    impl AssetTransport for StaticTransport {
        fn fetch(
            &self,
            _url: &str,
            on_progress: &mut dyn FnMut(FetchProgress),
        ) -> Result<Vec<u8>, TransportError> {
            let total = self.payload.len() as u64;
            for step in 1..=4u64 {
                on_progress(FetchProgress {
                    received: total * step / 4,
                    total: Some(total),
                });
            }
            Ok(self.payload.clone())
        }
    }

    struct FailingTransport;

    impl AssetTransport for FailingTransport {
        fn fetch(
            &self,
            url: &str,
            _on_progress: &mut dyn FnMut(FetchProgress),
        ) -> Result<Vec<u8>, TransportError> {
            Err(TransportError::NotFound(url.to_string()))
        }
    }

    struct RecordingTransport {
        called: Arc<AtomicBool>,
    }

    impl AssetTransport for RecordingTransport {
        fn fetch(
            &self,
            _url: &str,
            _on_progress: &mut dyn FnMut(FetchProgress),
        ) -> Result<Vec<u8>, TransportError> {
            self.called.store(true, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    /// Transport that waits for the test before each progress report and
    /// acknowledges once the report is delivered.
    struct GateTransport {
        payload: Vec<u8>,
        steps: Mutex<mpsc::Receiver<()>>,
        acks: Mutex<mpsc::Sender<()>>,
    }

    impl AssetTransport for GateTransport {
        fn fetch(
            &self,
            _url: &str,
            on_progress: &mut dyn FnMut(FetchProgress),
        ) -> Result<Vec<u8>, TransportError> {
            for received in [500u64, 900] {
                if self.steps.lock().unwrap().recv().is_err() {
                    break;
                }
                on_progress(FetchProgress {
                    received,
                    total: Some(1000),
                });
                let _ = self.acks.lock().unwrap().send(());
            }
            Ok(self.payload.clone())
        }
    }

    fn build<T: AssetTransport + 'static>(
        signals: CapabilitySignals,
        transport: T,
        decoder: DecoderSource,
    ) -> (Lifecycle, Arc<HostDiagnostics>) {
        let platform = OffscreenPlatform::new(signals);
        let diagnostics = platform.diagnostics();
        let lifecycle = Lifecycle::new(
            ViewerConfig::new(["memory:model"]),
            Box::new(platform),
            Arc::new(transport),
            decoder,
        );
        (lifecycle, diagnostics)
    }

    fn happy_lifecycle() -> (Lifecycle, Arc<HostDiagnostics>) {
        build(
            high_signals(),
            StaticTransport {
                payload: scene_bytes(),
            },
            prepared_decoder(),
        )
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn activation_probes_and_starts_loading() {
        let (mut lifecycle, diagnostics) = happy_lifecycle();
        assert_eq!(*lifecycle.state(), LoadState::Idle);

        lifecycle.activate();
        assert_eq!(
            *lifecycle.state(),
            LoadState::Loading { progress: 0.0 }
        );
        assert_eq!(lifecycle.tier(), Some(CapabilityTier::High));
        assert_eq!(diagnostics.contexts_acquired(), 1);
        assert_eq!(diagnostics.active_frame_registrations(), 1);
        assert_eq!(diagnostics.last_pixel_ratio(), Some(1.5));
        assert_eq!(lifecycle.resource_counts().contexts, 1);
    }

    #[test]
    fn no_gpu_short_circuits_to_unsupported() {
        let called = Arc::new(AtomicBool::new(false));
        let (mut lifecycle, diagnostics) = build(
            CapabilitySignals::default(),
            RecordingTransport {
                called: Arc::clone(&called),
            },
            prepared_decoder(),
        );

        lifecycle.activate();
        assert_eq!(*lifecycle.state(), LoadState::Unsupported);
        assert!(!called.load(Ordering::SeqCst));
        assert_eq!(diagnostics.contexts_acquired(), 0);
        assert_eq!(diagnostics.active_frame_registrations(), 0);
        assert!(lifecycle.resource_counts().is_empty());
    }

    #[test]
    fn ready_fires_loaded_exactly_once() {
        let (mut lifecycle, diagnostics) = happy_lifecycle();
        let fired = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&fired);
        lifecycle.on_loaded(move || {
            observed.fetch_add(1, Ordering::SeqCst);
        });

        lifecycle.activate();
        lifecycle.settle_load();
        lifecycle.on_frame(ms(0));
        assert_eq!(*lifecycle.state(), LoadState::Ready);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(lifecycle.resource_counts().geometries > 0);

        for frame in 1..5u64 {
            lifecycle.on_frame(ms(frame * 16));
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(diagnostics.draw_calls(), 5);
    }

    #[test]
    fn transport_failure_keeps_the_loop_drawing() {
        let (mut lifecycle, diagnostics) = build(
            high_signals(),
            FailingTransport,
            prepared_decoder(),
        );
        let fired = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&fired);
        lifecycle.on_loaded(move || {
            observed.fetch_add(1, Ordering::SeqCst);
        });

        lifecycle.activate();
        lifecycle.settle_load();
        for frame in 0..3u64 {
            lifecycle.on_frame(ms(frame * 16));
        }

        assert!(matches!(
            lifecycle.state(),
            LoadState::Failed {
                kind: FailureKind::Transport,
                ..
            }
        ));
        assert_eq!(diagnostics.draw_calls(), 3);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(lifecycle.resource_counts().geometries, 0);
        assert_eq!(lifecycle.resource_counts().contexts, 1);
    }

    #[test]
    fn malformed_payloads_fail_as_decode_errors() {
        let (mut lifecycle, _diagnostics) = build(
            high_signals(),
            StaticTransport {
                payload: b"garbage".to_vec(),
            },
            prepared_decoder(),
        );
        lifecycle.activate();
        lifecycle.settle_load();
        lifecycle.on_frame(ms(0));
        assert!(matches!(
            lifecycle.state(),
            LoadState::Failed {
                kind: FailureKind::Decode,
                ..
            }
        ));
    }

    #[test]
    fn missing_decoder_manifest_fails_the_load() {
        let (mut lifecycle, _diagnostics) = build(
            high_signals(),
            StaticTransport {
                payload: scene_bytes(),
            },
            DecoderSource::ResourceDir(PathBuf::from("/definitely/not/here")),
        );
        lifecycle.activate();
        lifecycle.settle_load();
        lifecycle.on_frame(ms(0));
        assert!(matches!(
            lifecycle.state(),
            LoadState::Failed {
                kind: FailureKind::DecoderUnavailable,
                ..
            }
        ));
    }

    #[test]
    fn consumer_progress_never_regresses() {
        let (step_tx, step_rx) = mpsc::channel();
        let (ack_tx, ack_rx) = mpsc::channel();
        let (mut lifecycle, _diagnostics) = build(
            high_signals(),
            GateTransport {
                payload: scene_bytes(),
                steps: Mutex::new(step_rx),
                acks: Mutex::new(ack_tx),
            },
            prepared_decoder(),
        );

        lifecycle.activate();
        step_tx.send(()).unwrap();
        ack_rx.recv().unwrap();
        lifecycle.on_frame(ms(0));
        assert_eq!(lifecycle.state().progress(), Some(0.5));

        lifecycle.state = LoadState::Loading { progress: 0.95 };
        step_tx.send(()).unwrap();
        ack_rx.recv().unwrap();
        lifecycle.on_frame(ms(16));
        assert_eq!(lifecycle.state().progress(), Some(0.95));

        lifecycle.settle_load();
        lifecycle.on_frame(ms(32));
        assert_eq!(*lifecycle.state(), LoadState::Ready);
    }

    #[test]
    fn context_loss_during_draw_releases_everything() {
        let (mut lifecycle, diagnostics) = happy_lifecycle();
        lifecycle.activate();
        lifecycle.settle_load();
        lifecycle.on_frame(ms(0));
        assert_eq!(*lifecycle.state(), LoadState::Ready);

        diagnostics.force_context_loss();
        lifecycle.on_frame(ms(16));
        assert_eq!(*lifecycle.state(), LoadState::ContextLost);
        assert!(lifecycle.resource_counts().is_empty());
        assert_eq!(diagnostics.active_frame_registrations(), 0);

        lifecycle.on_frame(ms(32));
        lifecycle.notify_context_lost();
        assert_eq!(*lifecycle.state(), LoadState::ContextLost);
    }

    #[test]
    fn context_loss_notification_cancels_an_active_load() {
        let (_step_tx, step_rx) = mpsc::channel();
        let (ack_tx, _ack_rx) = mpsc::channel();
        let (mut lifecycle, diagnostics) = build(
            high_signals(),
            GateTransport {
                payload: scene_bytes(),
                steps: Mutex::new(step_rx),
                acks: Mutex::new(ack_tx),
            },
            prepared_decoder(),
        );

        lifecycle.activate();
        lifecycle.notify_context_lost();
        assert_eq!(*lifecycle.state(), LoadState::ContextLost);
        assert!(lifecycle.load.is_none());
        assert!(lifecycle.resource_counts().is_empty());
        assert_eq!(diagnostics.active_frame_registrations(), 0);
    }

    #[test]
    fn deactivation_from_any_state_returns_to_zero() {
        let scenarios: Vec<Box<dyn Fn() -> (Lifecycle, Arc<HostDiagnostics>)>> = vec![
            Box::new(|| {
                let (mut lifecycle, diagnostics) = happy_lifecycle();
                lifecycle.activate();
                (lifecycle, diagnostics)
            }),
            Box::new(|| {
                let (mut lifecycle, diagnostics) = happy_lifecycle();
                lifecycle.activate();
                lifecycle.settle_load();
                lifecycle.on_frame(ms(0));
                (lifecycle, diagnostics)
            }),
            Box::new(|| {
                let (mut lifecycle, diagnostics) =
                    build(high_signals(), FailingTransport, prepared_decoder());
                lifecycle.activate();
                lifecycle.settle_load();
                lifecycle.on_frame(ms(0));
                (lifecycle, diagnostics)
            }),
            Box::new(|| {
                let (mut lifecycle, diagnostics) = happy_lifecycle();
                lifecycle.activate();
                lifecycle.notify_context_lost();
                (lifecycle, diagnostics)
            }),
            Box::new(|| {
                let (mut lifecycle, diagnostics) = build(
                    CapabilitySignals::default(),
                    FailingTransport,
                    prepared_decoder(),
                );
                lifecycle.activate();
                (lifecycle, diagnostics)
            }),
        ];

        for (index, scenario) in scenarios.iter().enumerate() {
            let (mut lifecycle, diagnostics) = scenario();
            lifecycle.deactivate();
            assert_eq!(*lifecycle.state(), LoadState::Idle, "scenario {index}");
            assert!(
                lifecycle.resource_counts().is_empty(),
                "scenario {index} leaked resources"
            );
            assert_eq!(
                diagnostics.active_frame_registrations(),
                0,
                "scenario {index} left frames registered"
            );
            lifecycle.deactivate();
            assert_eq!(*lifecycle.state(), LoadState::Idle);
        }
    }

    #[test]
    fn reactivation_acquires_a_fresh_context() {
        let (mut lifecycle, diagnostics) = happy_lifecycle();
        lifecycle.activate();
        let first = lifecycle.context_id().unwrap();
        lifecycle.deactivate();

        lifecycle.activate();
        let second = lifecycle.context_id().unwrap();
        assert_ne!(first, second);
        assert_eq!(diagnostics.contexts_acquired(), 2);
        assert_eq!(lifecycle.resource_counts().contexts, 1);
    }

    #[test]
    fn activate_while_active_restarts_the_session() {
        let (mut lifecycle, diagnostics) = happy_lifecycle();
        let fired = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&fired);
        lifecycle.on_loaded(move || {
            observed.fetch_add(1, Ordering::SeqCst);
        });

        lifecycle.activate();
        lifecycle.settle_load();
        lifecycle.on_frame(ms(0));
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        lifecycle.activate();
        assert_eq!(
            *lifecycle.state(),
            LoadState::Loading { progress: 0.0 }
        );
        assert_eq!(diagnostics.contexts_acquired(), 2);
        assert_eq!(lifecycle.resource_counts().contexts, 1);
        assert_eq!(diagnostics.active_frame_registrations(), 1);

        lifecycle.settle_load();
        lifecycle.on_frame(ms(100));
        assert_eq!(*lifecycle.state(), LoadState::Ready);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn initialization_failure_cleans_up() {
        let called = Arc::new(AtomicBool::new(false));
        let mut platform = OffscreenPlatform::new(high_signals());
        platform.set_context_acquisition_fails(true);
        let diagnostics = platform.diagnostics();
        let mut lifecycle = Lifecycle::new(
            ViewerConfig::new(["memory:model"]),
            Box::new(platform),
            Arc::new(RecordingTransport {
                called: Arc::clone(&called),
            }),
            prepared_decoder(),
        );

        lifecycle.activate();
        assert!(matches!(
            lifecycle.state(),
            LoadState::Failed {
                kind: FailureKind::Initialization,
                ..
            }
        ));
        assert!(!called.load(Ordering::SeqCst));
        assert!(lifecycle.resource_counts().is_empty());
        assert_eq!(diagnostics.active_frame_registrations(), 0);
    }

    #[test]
    fn internal_draw_errors_tear_the_session_down() {
        let (mut lifecycle, diagnostics) = happy_lifecycle();
        lifecycle.activate();
        lifecycle.settle_load();
        lifecycle.on_frame(ms(0));

        diagnostics.force_draw_failure();
        lifecycle.on_frame(ms(16));
        assert!(matches!(
            lifecycle.state(),
            LoadState::Failed {
                kind: FailureKind::Initialization,
                ..
            }
        ));
        assert!(lifecycle.resource_counts().is_empty());
        assert_eq!(diagnostics.active_frame_registrations(), 0);
    }

    #[test]
    fn resize_applies_only_while_a_context_is_live() {
        let (mut lifecycle, diagnostics) = happy_lifecycle();
        lifecycle.activate();
        lifecycle.notify_resized(800, 400);
        assert_eq!(diagnostics.last_resize(), Some((800, 400)));

        lifecycle.deactivate();
        lifecycle.notify_resized(123, 456);
        assert_eq!(diagnostics.last_resize(), Some((800, 400)));
    }

    #[test]
    fn retry_is_gated_on_failure_states() {
        let (mut lifecycle, diagnostics) = happy_lifecycle();
        assert!(!lifecycle.retry());
        lifecycle.activate();
        assert!(!lifecycle.retry());

        lifecycle.notify_context_lost();
        assert!(lifecycle.retry());
        assert_eq!(diagnostics.reload_requests(), 1);
    }

    #[test]
    fn input_passthrough_reaches_the_controller() {
        let (mut lifecycle, _diagnostics) = happy_lifecycle();
        lifecycle.input_rotate(0.3, 0.0);
        lifecycle.input_zoom(1.0);
        assert_eq!(*lifecycle.state(), LoadState::Idle);

        lifecycle.activate();
        lifecycle.set_idle_animation(false);

        let controller = |lifecycle: &Lifecycle| {
            let render = lifecycle.render.as_ref().unwrap();
            (render.handle.controller.distance, render.handle.controller.yaw)
        };
        let (initial_distance, initial_yaw) = controller(&lifecycle);

        lifecycle.input_zoom(1.0);
        let (zoomed_distance, _) = controller(&lifecycle);
        assert!(zoomed_distance > initial_distance);

        lifecycle.input_rotate(0.4, 0.0);
        lifecycle.on_frame(ms(0));
        lifecycle.on_frame(ms(16));
        let (_, turned_yaw) = controller(&lifecycle);
        assert!(turned_yaw > initial_yaw);
    }

    #[test]
    fn idle_toggle_is_remembered_across_activations() {
        let (mut lifecycle, _diagnostics) = happy_lifecycle();
        lifecycle.set_idle_animation(false);
        lifecycle.activate();
        assert!(!lifecycle.render.as_ref().unwrap().idle_animation());

        lifecycle.set_idle_animation(true);
        assert!(lifecycle.render.as_ref().unwrap().idle_animation());
        assert!(lifecycle.idle_animation());
    }
}
