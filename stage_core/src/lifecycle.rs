//! Model lifecycle.
//!
//! Drives resolve → construct → attach, and tears the previous instance down
//! before a new one is built. State machine:
//!
//! ```text
//! EMPTY -> LOADING -> READY
//!            |          |
//!            v          v
//!          EMPTY     LOADING (replacement)
//! ```
//!
//! Only one load may be in flight; a second one is rejected, not queued.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::{
    config::StageConfig,
    error::{Diagnostic, LoadError, SurfaceError},
    instance::{HeadlessModelFactory, InstanceId, ModelFactory, ModelInstance},
    manifest::Manifest,
    math::Size,
    payload::PayloadMap,
    render::{HeadlessSurface, NullRenderer, RenderBackend, RenderSurface},
    resolver::ManifestResolver,
    resources::{Handle, ResourceHandleRegistry},
    surface::{BackendFactory, RenderSurfaceManager},
};

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum LifecycleState {
    /// Nothing attached.
    #[default]
    Empty,
    /// A load is in flight.
    Loading,
    /// An instance is attached.
    Ready,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "EMPTY"),
            Self::Loading => write!(f, "LOADING"),
            Self::Ready => write!(f, "READY"),
        }
    }
}

/// Observable status for UI collaborators.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct LifecycleStatus {
    pub state: LifecycleState,
    /// Message of the last fatal load error, cleared by the next load.
    pub last_error: Option<String>,
    /// Diagnostics of the last completed operation.
    pub diagnostics: Vec<Diagnostic>,
}

/// Successful load result.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    pub instance: InstanceId,
    pub default_motion: Option<String>,
    /// Non-fatal findings, in the order they were produced.
    pub diagnostics: Vec<Diagnostic>,
}

/// Everything the lifecycle manager needs, owned by the caller.
pub struct StageContext {
    pub config: StageConfig,
    pub registry: ResourceHandleRegistry,
    pub surface: RenderSurfaceManager,
    pub factory: Arc<dyn ModelFactory>,
}

impl StageContext {
    pub fn new(
        config: StageConfig,
        surface: Box<dyn RenderSurface>,
        make_backend: BackendFactory,
        factory: Arc<dyn ModelFactory>,
    ) -> Self {
        let surface = RenderSurfaceManager::new(surface, make_backend, &config);
        Self {
            config,
            registry: ResourceHandleRegistry::new(),
            surface,
            factory,
        }
    }

    /// Context with a headless surface, a no-op renderer and headless
    /// models. The returned surface can be resized by the caller.
    pub fn headless(config: StageConfig) -> (Self, HeadlessSurface) {
        let surface = HeadlessSurface::new(Size::new(config.surface_width, config.surface_height));
        let factory = Arc::new(HeadlessModelFactory::new(config.default_intrinsic_height));
        let ctx = Self::new(
            config,
            Box::new(surface.clone()),
            Box::new(|_: Size| -> Box<dyn RenderBackend> { Box::new(NullRenderer) }),
            factory,
        );
        (ctx, surface)
    }
}

/// Owns the active model and serializes loads.
pub struct ModelLifecycleManager {
    registry: ResourceHandleRegistry,
    resolver: ManifestResolver,
    factory: Arc<dyn ModelFactory>,
    surface: Mutex<RenderSurfaceManager>,
    state: Mutex<LifecycleState>,
    status: watch::Sender<LifecycleStatus>,
}

/// Rolls an abandoned load back to `Empty`.
///
/// Armed while a load is in flight; if the load future is dropped before it
/// finishes, the handles minted so far are revoked.
struct InFlight<'a> {
    manager: &'a ModelLifecycleManager,
    minted: Vec<Handle>,
    armed: bool,
}

impl InFlight<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let revoked = self.manager.registry.revoke_all(&self.minted);
        warn!(revoked, "Load abandoned, rolled back to EMPTY");
        *self.manager.state.lock() = LifecycleState::Empty;
        self.manager.publish(LifecycleStatus {
            state: LifecycleState::Empty,
            last_error: Some("load abandoned".to_string()),
            diagnostics: Vec::new(),
        });
    }
}

impl ModelLifecycleManager {
    pub fn new(ctx: StageContext) -> Self {
        let (status, _) = watch::channel(LifecycleStatus::default());
        Self {
            resolver: ManifestResolver::new(ctx.registry.clone()),
            registry: ctx.registry,
            factory: ctx.factory,
            surface: Mutex::new(ctx.surface),
            state: Mutex::new(LifecycleState::Empty),
            status,
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Snapshot of the current status.
    pub fn status(&self) -> LifecycleStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified on every status change.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleStatus> {
        self.status.subscribe()
    }

    pub fn registry(&self) -> &ResourceHandleRegistry {
        &self.registry
    }

    /// Runs `f` against the render surface manager.
    pub fn with_surface<R>(&self, f: impl FnOnce(&RenderSurfaceManager) -> R) -> R {
        f(&self.surface.lock())
    }

    /// Id of the attached instance, if any.
    pub fn attached(&self) -> Option<InstanceId> {
        self.surface.lock().attached().map(ModelInstance::id)
    }

    /// One render tick. Never changes lifecycle state.
    pub fn render_frame(&self, dt_sec: f32) {
        self.surface.lock().render_frame(dt_sec);
    }

    fn publish(&self, status: LifecycleStatus) {
        self.status.send_replace(status);
    }

    fn set_state(&self, state: LifecycleState, last_error: Option<String>, diagnostics: Vec<Diagnostic>) {
        *self.state.lock() = state;
        self.publish(LifecycleStatus {
            state,
            last_error,
            diagnostics,
        });
    }

    /// Parses `json` and loads it. A parse error leaves the stage untouched.
    pub async fn load_json(&self, json: &str, payloads: &PayloadMap) -> Result<LoadOutcome, LoadError> {
        let manifest = Manifest::from_json_str(json)?;
        self.load(&manifest, payloads).await
    }

    /// Replaces the active model with one built from `manifest`.
    pub async fn load(&self, manifest: &Manifest, payloads: &PayloadMap) -> Result<LoadOutcome, LoadError> {
        {
            let mut state = self.state.lock();
            if *state == LifecycleState::Loading {
                warn!("Load rejected, another load is in flight");
                return Err(LoadError::LoadInProgress);
            }
            *state = LifecycleState::Loading;
        }
        self.publish(LifecycleStatus {
            state: LifecycleState::Loading,
            last_error: None,
            diagnostics: Vec::new(),
        });
        info!(moc = %manifest.file_references.moc, "Loading model");

        let mut guard = InFlight {
            manager: self,
            minted: Vec::new(),
            armed: true,
        };

        let mut diagnostics = self.teardown();

        let resolved = match self.resolver.resolve(manifest, payloads) {
            Ok(resolved) => resolved,
            Err(e) => {
                let err = LoadError::from(e);
                return Err(self.fail(guard, err));
            }
        };
        guard.minted = resolved.handles().to_vec();
        diagnostics.extend_from_slice(resolved.diagnostics());

        let native = match self.factory.construct(&resolved, &self.registry).await {
            Ok(native) => native,
            Err(e) => {
                let revoked = self.registry.revoke_all(resolved.handles());
                debug!(revoked, "Revoked handles of failed construction");
                let err = LoadError::Construction { source: e.into() };
                return Err(self.fail(guard, err));
            }
        };

        let instance = ModelInstance::new(native, &resolved);
        let id = instance.id();
        let attached = self.surface.lock().attach(instance);
        let report = match attached {
            Ok(report) => report,
            Err(rejected) => {
                if let Err(e) = rejected.instance.dispose(&self.registry) {
                    warn!(error = %e, "Disposing rejected instance failed");
                }
                return Err(self.fail(guard, SurfaceError::Occupied.into()));
            }
        };
        diagnostics.extend(report.diagnostics);

        guard.disarm();
        self.set_state(LifecycleState::Ready, None, diagnostics.clone());
        info!(
            instance = id.0,
            diagnostics = diagnostics.len(),
            live_handles = self.registry.live_count(),
            "Model ready"
        );

        Ok(LoadOutcome {
            instance: id,
            default_motion: report.default_motion,
            diagnostics,
        })
    }

    fn fail(&self, guard: InFlight<'_>, err: LoadError) -> LoadError {
        guard.disarm();
        error!(error = %err, "Model load failed");
        let diagnostics = match &err {
            LoadError::MissingCoreAsset { diagnostics, .. } => diagnostics.clone(),
            _ => Vec::new(),
        };
        self.set_state(LifecycleState::Empty, Some(err.to_string()), diagnostics);
        err
    }

    /// Detaches and disposes the attached instance, revoking its handles.
    /// Disposal failures are logged and returned as diagnostics.
    fn teardown(&self) -> Vec<Diagnostic> {
        let Some(instance) = self.surface.lock().detach() else {
            return Vec::new();
        };
        let id = instance.id();
        match instance.dispose(&self.registry) {
            Ok(()) => {
                debug!(instance = id.0, "Previous instance released");
                Vec::new()
            }
            Err(e) => {
                warn!(instance = id.0, error = %e, "Disposal failed");
                vec![Diagnostic::DisposalFailed {
                    reason: format!("{e:#}"),
                }]
            }
        }
    }

    /// Releases the active model. No-op unless `Ready`.
    pub fn dispose(&self) {
        {
            let mut state = self.state.lock();
            if *state != LifecycleState::Ready {
                debug!(state = %*state, "Dispose ignored");
                return;
            }
            *state = LifecycleState::Empty;
        }
        let diagnostics = self.teardown();
        info!("Model disposed");
        self.set_state(LifecycleState::Empty, None, diagnostics);
    }
}

impl Drop for ModelLifecycleManager {
    fn drop(&mut self) {
        if let Some(instance) = self.surface.get_mut().detach() {
            if let Err(e) = instance.dispose(&self.registry) {
                warn!(error = %e, "Disposal on drop failed");
            }
        }
    }
}
