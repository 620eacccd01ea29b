//! Math types.
//!
//! Only what the 2D stage needs: points, sizes, and the fit transform.

use serde::{Deserialize, Serialize};

/// 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub const fn splat(v: f32) -> Self {
        Self { x: v, y: v }
    }
}

/// Displayed dimensions of a surface, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn center(self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }
}

/// Placement of an instance on the surface.
///
/// `anchor` is normalized to the instance's own bounds, so (0.5, 0.5) puts
/// `position` at the middle of the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec2,
    pub scale: f32,
    pub anchor: Vec2,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            scale: 1.0,
            anchor: Vec2::ZERO,
        }
    }
}

impl Transform {
    /// Centers an instance of `intrinsic_height` on `surface`, scaled so it
    /// fills `margin` of the surface height.
    ///
    /// Returns `None` when the intrinsic height is not a positive number.
    pub fn fit(surface: Size, intrinsic_height: f32, margin: f32) -> Option<Self> {
        if !(intrinsic_height.is_finite() && intrinsic_height > 0.0) {
            return None;
        }
        Some(Self {
            position: surface.center(),
            scale: surface.height * margin / intrinsic_height,
            anchor: Vec2::splat(0.5),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_centers_and_scales_to_margin() {
        let t = Transform::fit(Size::new(800.0, 600.0), 1200.0, 0.8).unwrap();
        assert_eq!(t.position, Vec2::new(400.0, 300.0));
        assert_eq!(t.anchor, Vec2::new(0.5, 0.5));
        assert!((t.scale - 0.4).abs() < 1e-6);
    }

    #[test]
    fn fit_rejects_degenerate_height() {
        assert!(Transform::fit(Size::new(800.0, 600.0), 0.0, 0.8).is_none());
        assert!(Transform::fit(Size::new(800.0, 600.0), f32::NAN, 0.8).is_none());
    }
}
