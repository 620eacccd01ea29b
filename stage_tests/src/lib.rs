//! Shared fixtures for the stage integration tests.
//!
//! - Scripted model factory (construction/disposal failures, gated builds)
//! - Recording renderer that logs scene changes
//! - Manifest and payload builders

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::Poll;

use anyhow::bail;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use stage_core::{
    config::StageConfig,
    instance::{InstanceId, ModelFactory, NativeModel},
    lifecycle::{ModelLifecycleManager, StageContext},
    math::{Size, Transform},
    payload::PayloadMap,
    render::{HeadlessSurface, RenderBackend},
    resolver::ResolvedManifest,
    resources::ResourceHandleRegistry,
};
use tokio::sync::Notify;

pub const BASIC_MANIFEST: &str = r#"{"FileReferences": {
    "Moc": "m.moc3",
    "Textures": ["t0.png"],
    "Motions": {"Idle": [{"File": "idle.motion3.json"}]}
}}"#;

/// Payloads for every file [`BASIC_MANIFEST`] references.
pub fn basic_payloads() -> PayloadMap {
    PayloadMap::new()
        .with("m.moc3", Bytes::from_static(b"MOC3\x03\x00\x00\x00"))
        .with("t0.png", Bytes::from_static(b"\x89PNG"))
        .with("idle.motion3.json", Bytes::from_static(b"{\"Version\":3}"))
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

/// Polls `fut` once, returning its output if it completed.
pub async fn poll_once<F: Future + Unpin>(mut fut: F) -> Option<F::Output> {
    std::future::poll_fn(|cx| {
        Poll::Ready(match Pin::new(&mut fut).poll(cx) {
            Poll::Ready(v) => Some(v),
            Poll::Pending => None,
        })
    })
    .await
}

#[derive(Debug, Default)]
pub struct FactoryStats {
    pub constructed: AtomicUsize,
    pub disposed: AtomicUsize,
}

impl FactoryStats {
    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    pub fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }
}

/// Factory whose models misbehave on request.
#[derive(Clone)]
pub struct ScriptedFactory {
    pub height: f32,
    pub fail_construct: bool,
    pub fail_dispose: bool,
    pub refuse_motions: bool,
    /// When set, construction waits for a notification.
    pub gate: Option<Arc<Notify>>,
    pub stats: Arc<FactoryStats>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self {
            height: 1000.0,
            fail_construct: false,
            fail_dispose: false,
            refuse_motions: false,
            gate: None,
            stats: Arc::new(FactoryStats::default()),
        }
    }
}

impl Default for ScriptedFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelFactory for ScriptedFactory {
    async fn construct(
        &self,
        resolved: &ResolvedManifest,
        registry: &ResourceHandleRegistry,
    ) -> anyhow::Result<Box<dyn NativeModel>> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail_construct {
            bail!("scripted construction failure");
        }
        if registry.fetch(&resolved.moc).is_none() {
            bail!("core binary revoked");
        }
        self.stats.constructed.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedModel {
            height: self.height,
            fail_dispose: self.fail_dispose,
            refuse_motions: self.refuse_motions,
            stats: self.stats.clone(),
        }))
    }
}

pub struct ScriptedModel {
    height: f32,
    fail_dispose: bool,
    refuse_motions: bool,
    stats: Arc<FactoryStats>,
}

impl NativeModel for ScriptedModel {
    fn intrinsic_height(&self) -> f32 {
        self.height
    }

    fn start_motion(&mut self, _group: &str) -> bool {
        !self.refuse_motions
    }

    fn update(&mut self, _dt_sec: f32) {}

    fn dispose(&mut self) -> anyhow::Result<()> {
        self.stats.disposed.fetch_add(1, Ordering::SeqCst);
        if self.fail_dispose {
            bail!("scripted disposal failure");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    Created(Size),
    Resized(Size),
    Added(InstanceId),
    Removed(InstanceId),
    Drawn(InstanceId, Transform),
}

/// Shared log of renderer calls.
#[derive(Debug, Clone, Default)]
pub struct SceneLog(Arc<Mutex<Vec<SceneEvent>>>);

impl SceneLog {
    pub fn push(&self, event: SceneEvent) {
        self.0.lock().push(event);
    }

    pub fn events(&self) -> Vec<SceneEvent> {
        self.0.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&SceneEvent) -> bool) -> usize {
        self.0.lock().iter().filter(|e| pred(e)).count()
    }
}

pub struct RecordingRenderer {
    log: SceneLog,
}

impl RenderBackend for RecordingRenderer {
    fn resize(&mut self, size: Size) {
        self.log.push(SceneEvent::Resized(size));
    }

    fn add_to_scene(&mut self, id: InstanceId) {
        self.log.push(SceneEvent::Added(id));
    }

    fn remove_from_scene(&mut self, id: InstanceId) {
        self.log.push(SceneEvent::Removed(id));
    }

    fn begin_frame(&mut self) {}

    fn draw_instance(&mut self, id: InstanceId, transform: Transform) {
        self.log.push(SceneEvent::Drawn(id, transform));
    }

    fn end_frame(&mut self) {}
}

/// A stage wired to a headless surface and a recording renderer.
pub struct TestStage {
    pub stage: ModelLifecycleManager,
    pub surface: HeadlessSurface,
    pub scene: SceneLog,
}

impl TestStage {
    pub fn new(factory: ScriptedFactory) -> Self {
        Self::with_config(StageConfig::default(), factory)
    }

    pub fn with_config(cfg: StageConfig, factory: ScriptedFactory) -> Self {
        let surface = HeadlessSurface::new(Size::new(cfg.surface_width, cfg.surface_height));
        let scene = SceneLog::default();
        let log = scene.clone();
        let ctx = StageContext::new(
            cfg,
            Box::new(surface.clone()),
            Box::new(move |size: Size| -> Box<dyn RenderBackend> {
                log.push(SceneEvent::Created(size));
                Box::new(RecordingRenderer { log: log.clone() })
            }),
            Arc::new(factory),
        );
        Self {
            stage: ModelLifecycleManager::new(ctx),
            surface,
            scene,
        }
    }

    /// Handles owned by the attached instance.
    pub fn attached_handles(&self) -> Vec<stage_core::resources::Handle> {
        self.stage
            .with_surface(|s| s.attached().map(|i| i.handles().to_vec()))
            .unwrap_or_default()
    }
}
