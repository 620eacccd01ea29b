//! Rendering abstraction.
//!
//! This crate intentionally does not depend on a graphics backend.
//! Define traits that a renderer implementation and its host surface would
//! satisfy.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    instance::InstanceId,
    math::{Size, Transform},
};

/// The visible area a rendering context draws into.
pub trait RenderSurface: Send + Sync {
    /// Current displayed dimensions.
    fn display_size(&self) -> Size;
}

/// A minimal rendering API.
pub trait RenderBackend: Send + Sync {
    fn resize(&mut self, size: Size);
    fn add_to_scene(&mut self, id: InstanceId);
    fn remove_from_scene(&mut self, id: InstanceId);
    fn begin_frame(&mut self);
    fn draw_instance(&mut self, id: InstanceId, transform: Transform);
    fn end_frame(&mut self);
}

/// A no-op renderer useful for headless tests.
#[derive(Default)]
pub struct NullRenderer;

impl RenderBackend for NullRenderer {
    fn resize(&mut self, _size: Size) {}
    fn add_to_scene(&mut self, _id: InstanceId) {}
    fn remove_from_scene(&mut self, _id: InstanceId) {}
    fn begin_frame(&mut self) {}
    fn draw_instance(&mut self, _id: InstanceId, _transform: Transform) {}
    fn end_frame(&mut self) {}
}

/// Surface with a size set by its owner. Clones share the size.
#[derive(Debug, Clone, Default)]
pub struct HeadlessSurface {
    size: Arc<Mutex<Size>>,
}

impl HeadlessSurface {
    pub fn new(size: Size) -> Self {
        Self {
            size: Arc::new(Mutex::new(size)),
        }
    }

    /// Simulates the host resizing the surface.
    pub fn set_size(&self, size: Size) {
        *self.size.lock() = size;
    }
}

impl RenderSurface for HeadlessSurface {
    fn display_size(&self) -> Size {
        *self.size.lock()
    }
}
