//! `stage_core`
//!
//! Turns a model manifest plus a bag of binary payloads into one live,
//! renderable instance, and tears the previous one down first.
//!
//! Design goals:
//! - At most one attached instance; loads are serialized, never queued.
//! - Every handle minted for a load is owned by the resulting instance or
//!   revoked before the load returns.
//! - Traits at the renderer seams (`RenderSurface`, `RenderBackend`,
//!   `ModelFactory`, `NativeModel`) so the core runs headless.
//! - No `unsafe`, no globals: callers own a `StageContext`.

pub mod config;
pub mod error;
pub mod instance;
pub mod lifecycle;
pub mod manifest;
pub mod math;
pub mod payload;
pub mod render;
pub mod resolver;
pub mod resources;
pub mod surface;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::error::*;
    pub use crate::instance::{HeadlessModelFactory, InstanceId, ModelFactory, NativeModel};
    pub use crate::lifecycle::*;
    pub use crate::manifest::{AssetKind, Manifest};
    pub use crate::math::*;
    pub use crate::payload::PayloadMap;
    pub use crate::render::{HeadlessSurface, NullRenderer, RenderBackend, RenderSurface};
    pub use crate::resources::{Handle, ResourceHandleRegistry};
}
