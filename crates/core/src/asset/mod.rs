//! Asset streaming: background fetch, decode, and the ordered event stream
//! the lifecycle consumes.
//!
//! Each load runs on one worker thread and reports through an mpsc channel.
//! The channel preserves order, progress is clamped to be non-decreasing
//! before it is sent, and the terminal event is sent exactly once, after
//! every progress event. Decoded scenes hold CPU buffers only; GPU tickets
//! are acquired later, when the scene builder instantiates the model, so a
//! cancelled load retains nothing.

pub mod format;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use crate::host::{AssetTransport, TransportError};

pub use format::{
    DecodedScene, DecoderManifest, GeometryDecoder, MaterialParams, MeshData, NodeEntry,
};

/// Failures that end a load.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("malformed asset: {0}")]
    Malformed(String),
    #[error("geometry decoder unavailable: {0}")]
    DecoderUnavailable(String),
}

impl From<TransportError> for LoadError {
    fn from(err: TransportError) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Where the decompression stage comes from. Resolution happens on the
/// worker at the start of each load, so a missing decoder surfaces as a
/// load failure rather than a construction panic.
#[derive(Debug, Clone)]
pub enum DecoderSource {
    /// Read `geometry-decoder.json` from this directory when the load runs.
    ResourceDir(PathBuf),
    /// Use an already resolved decoder.
    Prepared(GeometryDecoder),
}

impl DecoderSource {
    fn resolve(&self) -> std::result::Result<GeometryDecoder, LoadError> {
        match self {
            Self::ResourceDir(dir) => GeometryDecoder::from_resource_dir(dir),
            Self::Prepared(decoder) => Ok(decoder.clone()),
        }
    }
}

/// Events delivered by a load worker, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadEvent {
    /// Completed fraction in `[0, 1]`, strictly increasing.
    Progress(f32),
    /// The one terminal event.
    Finished(std::result::Result<DecodedScene, LoadError>),
}

/// A load in flight. Dropping or cancelling the task closes the channel;
/// the worker's remaining sends fail silently and its result is discarded.
#[derive(Debug)]
pub struct LoadTask {
    events: mpsc::Receiver<LoadEvent>,
    cancelled: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl LoadTask {
    /// Drains every event queued so far without blocking.
    pub fn poll_events(&self) -> Vec<LoadEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Abandons the load. The worker is left to finish its in-flight
    /// transport call on its own; nothing it produces is delivered.
    pub fn cancel(mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.worker.take();
    }

    /// Blocks until the worker has exited, leaving its events queued.
    pub(crate) fn wait(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Spawns and configures load workers.
pub struct AssetLoader {
    transport: Arc<dyn AssetTransport>,
    decoder: DecoderSource,
}

impl AssetLoader {
    pub fn new(transport: Arc<dyn AssetTransport>, decoder: DecoderSource) -> Self {
        Self { transport, decoder }
    }

    /// Starts a load on a fresh worker thread: decoder resolution, fetch,
    /// then decode.
    pub fn begin(&self, url: &str) -> LoadTask {
        let (tx, events) = mpsc::channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let worker_flag = Arc::clone(&cancelled);
        let transport = Arc::clone(&self.transport);
        let source = self.decoder.clone();
        let url = url.to_string();

        tracing::debug!(%url, "asset load started");
        let worker = thread::spawn(move || {
            let decoder = match source.resolve() {
                Ok(decoder) => decoder,
                Err(err) => {
                    tracing::warn!(%url, error = %err, "asset load failed");
                    if !worker_flag.load(Ordering::SeqCst) {
                        let _ = tx.send(LoadEvent::Finished(Err(err)));
                    }
                    return;
                }
            };
            run_load(transport.as_ref(), &decoder, &url, &worker_flag, &tx);
        });

        LoadTask {
            events,
            cancelled,
            worker: Some(worker),
        }
    }
}

fn run_load(
    transport: &dyn AssetTransport,
    decoder: &GeometryDecoder,
    url: &str,
    cancelled: &AtomicBool,
    tx: &mpsc::Sender<LoadEvent>,
) {
    let mut last_fraction = 0.0f32;
    let fetched = transport.fetch(url, &mut |progress| {
        if cancelled.load(Ordering::SeqCst) {
            return;
        }
        // Only a known total yields progress; regressions and repeats from
        // the transport are swallowed here so consumers see a strictly
        // increasing sequence.
        if let Some(fraction) = progress.fraction() {
            if fraction > last_fraction {
                last_fraction = fraction;
                let _ = tx.send(LoadEvent::Progress(fraction));
            }
        }
    });

    if cancelled.load(Ordering::SeqCst) {
        return;
    }

    let result = fetched
        .map_err(LoadError::from)
        .and_then(|bytes| decoder.decode(&bytes));

    match &result {
        Ok(scene) => tracing::debug!(
            %url,
            meshes = scene.meshes.len(),
            triangles = scene.total_triangle_count(),
            "asset decoded"
        ),
        Err(err) => tracing::warn!(%url, error = %err, "asset load failed"),
    }

    if cancelled.load(Ordering::SeqCst) {
        return;
    }
    let _ = tx.send(LoadEvent::Finished(result));
}
