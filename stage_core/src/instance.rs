//! Model instances.
//!
//! A [`ModelInstance`] wraps the renderer-specific [`NativeModel`] built by a
//! [`ModelFactory`] and owns every handle minted for it. Disposing the
//! instance releases the native object first, then revokes the handles.

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{bail, Context};
use async_trait::async_trait;
use tracing::debug;

use crate::{
    math::Transform,
    resolver::ResolvedManifest,
    resources::{Handle, ResourceHandleRegistry},
};

/// Magic bytes at the start of a core binary.
pub const MOC3_MAGIC: &[u8; 4] = b"MOC3";

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies a constructed instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(pub u64);

impl InstanceId {
    pub fn new_unique() -> Self {
        InstanceId(NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Renderer-side model object.
pub trait NativeModel: Send + Sync {
    /// Unscaled height of the model.
    fn intrinsic_height(&self) -> f32;
    /// Starts looping a motion group. Returns false if the group is unknown.
    fn start_motion(&mut self, group: &str) -> bool;
    /// Advances animation by `dt_sec`.
    fn update(&mut self, dt_sec: f32);
    /// Releases GPU objects. Called exactly once.
    fn dispose(&mut self) -> anyhow::Result<()>;
}

/// Builds native models from resolved manifests.
///
/// Implementations may read payloads through `registry` now or keep a clone
/// and read them later; handles stay live until the instance is disposed.
#[async_trait]
pub trait ModelFactory: Send + Sync {
    async fn construct(
        &self,
        resolved: &ResolvedManifest,
        registry: &ResourceHandleRegistry,
    ) -> anyhow::Result<Box<dyn NativeModel>>;
}

/// Summary of one motion group, in manifest order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionGroupInfo {
    pub name: String,
    pub len: usize,
}

/// A constructed model bound to one resolved manifest.
pub struct ModelInstance {
    id: InstanceId,
    native: Box<dyn NativeModel>,
    handles: Vec<Handle>,
    motion_groups: Vec<MotionGroupInfo>,
    transform: Transform,
    default_motion: Option<String>,
}

impl ModelInstance {
    /// Wraps `native`, taking ownership of the handles minted for `resolved`.
    pub fn new(native: Box<dyn NativeModel>, resolved: &ResolvedManifest) -> Self {
        Self {
            id: InstanceId::new_unique(),
            native,
            handles: resolved.handles().to_vec(),
            motion_groups: resolved
                .motions
                .iter()
                .map(|g| MotionGroupInfo {
                    name: g.name.clone(),
                    len: g.entries.len(),
                })
                .collect(),
            transform: Transform::default(),
            default_motion: None,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn handles(&self) -> &[Handle] {
        &self.handles
    }

    pub fn motion_groups(&self) -> &[MotionGroupInfo] {
        &self.motion_groups
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub(crate) fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    /// The motion group started on attach, if any.
    pub fn default_motion(&self) -> Option<&str> {
        self.default_motion.as_deref()
    }

    pub fn intrinsic_height(&self) -> f32 {
        self.native.intrinsic_height()
    }

    pub(crate) fn start_default_motion(&mut self, group: &str) -> bool {
        let started = self.native.start_motion(group);
        if started {
            self.default_motion = Some(group.to_string());
        }
        started
    }

    pub fn update(&mut self, dt_sec: f32) {
        self.native.update(dt_sec);
    }

    /// Releases native resources, then revokes every owned handle.
    ///
    /// Handles are revoked even when the native dispose fails; the failure
    /// is returned for the caller to report.
    pub fn dispose(mut self, registry: &ResourceHandleRegistry) -> anyhow::Result<()> {
        let native = self.native.dispose();
        let revoked = registry.revoke_all(&self.handles);
        debug!(instance = self.id.0, revoked, "Instance disposed");
        native.with_context(|| format!("dispose instance {}", self.id.0))
    }
}

impl std::fmt::Debug for ModelInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelInstance")
            .field("id", &self.id)
            .field("handles", &self.handles.len())
            .field("transform", &self.transform)
            .field("default_motion", &self.default_motion)
            .finish()
    }
}

/// Factory producing [`HeadlessModel`]s, for tests and the headless viewer.
///
/// Validates the core binary's magic bytes and that every resolved texture
/// is still readable; reports a fixed intrinsic height.
#[derive(Debug, Clone)]
pub struct HeadlessModelFactory {
    intrinsic_height: f32,
}

impl HeadlessModelFactory {
    pub fn new(intrinsic_height: f32) -> Self {
        Self { intrinsic_height }
    }
}

impl Default for HeadlessModelFactory {
    fn default() -> Self {
        Self::new(2048.0)
    }
}

#[async_trait]
impl ModelFactory for HeadlessModelFactory {
    async fn construct(
        &self,
        resolved: &ResolvedManifest,
        registry: &ResourceHandleRegistry,
    ) -> anyhow::Result<Box<dyn NativeModel>> {
        let moc = registry
            .fetch(&resolved.moc)
            .context("core binary handle revoked before construction")?;
        if !moc.starts_with(MOC3_MAGIC) {
            bail!("core binary is not a MOC3 file ({} bytes)", moc.len());
        }

        let mut textures = 0;
        for handle in resolved.textures.iter().filter_map(|t| t.handle()) {
            registry
                .fetch(handle)
                .with_context(|| format!("texture {handle} revoked before construction"))?;
            textures += 1;
        }

        // Decoding happens off the caller's turn in a real renderer.
        tokio::task::yield_now().await;

        debug!(textures, height = self.intrinsic_height, "Headless model constructed");
        Ok(Box::new(HeadlessModel {
            height: self.intrinsic_height,
            groups: resolved.motions.iter().map(|g| g.name.clone()).collect(),
            playing: None,
            elapsed: 0.0,
        }))
    }
}

/// Native model that only tracks animation time.
#[derive(Debug)]
pub struct HeadlessModel {
    height: f32,
    groups: Vec<String>,
    playing: Option<String>,
    elapsed: f32,
}

impl NativeModel for HeadlessModel {
    fn intrinsic_height(&self) -> f32 {
        self.height
    }

    fn start_motion(&mut self, group: &str) -> bool {
        if !self.groups.iter().any(|g| g == group) {
            return false;
        }
        self.playing = Some(group.to_string());
        self.elapsed = 0.0;
        true
    }

    fn update(&mut self, dt_sec: f32) {
        if self.playing.is_some() {
            self.elapsed += dt_sec;
        }
    }

    fn dispose(&mut self) -> anyhow::Result<()> {
        self.playing = None;
        Ok(())
    }
}
