//! Render surface manager.
//!
//! Owns the single rendering context bound to a visible surface. The context
//! is created on first use and then lives as long as the manager; instances
//! come and go through [`RenderSurfaceManager::attach`] and
//! [`RenderSurfaceManager::detach`].

use tracing::{debug, info, warn};

use crate::{
    config::StageConfig,
    error::Diagnostic,
    instance::{ModelInstance, MotionGroupInfo},
    math::{Size, Transform, Vec2},
    render::{RenderBackend, RenderSurface},
};

/// Creates the rendering context for a surface of the given size.
pub type BackendFactory = Box<dyn Fn(Size) -> Box<dyn RenderBackend> + Send + Sync>;

struct RenderContext {
    backend: Box<dyn RenderBackend>,
    size: Size,
}

/// Outcome of a successful attach.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachReport {
    pub transform: Transform,
    /// Motion group started as the default animation.
    pub default_motion: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Returned by [`RenderSurfaceManager::attach`] when the surface is occupied.
#[derive(Debug)]
pub struct AttachRejected {
    pub instance: ModelInstance,
}

/// Picks the default motion group: the first group whose name contains
/// `pattern` (case-insensitive), provided it has at least one entry.
pub fn select_idle_group<'a>(
    groups: &'a [MotionGroupInfo],
    pattern: &str,
) -> Result<&'a str, Diagnostic> {
    let pattern = pattern.to_lowercase();
    let group = groups
        .iter()
        .find(|g| g.name.to_lowercase().contains(&pattern))
        .ok_or(Diagnostic::NoIdleMotion)?;
    if group.len == 0 {
        return Err(Diagnostic::EmptyIdleMotion {
            group: group.name.clone(),
        });
    }
    Ok(&group.name)
}

/// Manages the rendering context and the (at most one) attached instance.
pub struct RenderSurfaceManager {
    surface: Box<dyn RenderSurface>,
    make_backend: BackendFactory,
    context: Option<RenderContext>,
    contexts_created: usize,
    attached: Option<ModelInstance>,
    margin_factor: f32,
    idle_pattern: String,
}

impl RenderSurfaceManager {
    pub fn new(
        surface: Box<dyn RenderSurface>,
        make_backend: BackendFactory,
        cfg: &StageConfig,
    ) -> Self {
        Self {
            surface,
            make_backend,
            context: None,
            contexts_created: 0,
            attached: None,
            margin_factor: cfg.margin_factor,
            idle_pattern: cfg.idle_pattern.clone(),
        }
    }

    fn context(&mut self) -> &mut RenderContext {
        let size = self.surface.display_size();
        if self.context.is_none() {
            info!(width = size.width, height = size.height, "Creating rendering context");
            self.contexts_created += 1;
        }
        let make_backend = &self.make_backend;
        self.context.get_or_insert_with(|| RenderContext {
            backend: make_backend(size),
            size,
        })
    }

    /// Resizes the context if the surface's displayed size changed.
    pub fn sync_size(&mut self) -> Size {
        let displayed = self.surface.display_size();
        let ctx = self.context();
        if ctx.size != displayed {
            debug!(width = displayed.width, height = displayed.height, "Resizing rendering context");
            ctx.backend.resize(displayed);
            ctx.size = displayed;
        }
        displayed
    }

    /// Adds `instance` to the scene, fits it to the surface, and starts its
    /// idle motion if one can be found.
    pub fn attach(&mut self, mut instance: ModelInstance) -> Result<AttachReport, AttachRejected> {
        if self.attached.is_some() {
            return Err(AttachRejected { instance });
        }

        let size = self.sync_size();
        let mut diagnostics = Vec::new();

        let height = instance.intrinsic_height();
        let transform = Transform::fit(size, height, self.margin_factor).unwrap_or_else(|| {
            warn!(height, "Model height cannot be fitted, keeping unit scale");
            diagnostics.push(Diagnostic::DegenerateBounds { height });
            Transform {
                position: size.center(),
                scale: 1.0,
                anchor: Vec2::splat(0.5),
            }
        });
        instance.set_transform(transform);

        let selected = select_idle_group(instance.motion_groups(), &self.idle_pattern)
            .map(str::to_string);
        let default_motion = match selected {
            Ok(group) => {
                if instance.start_default_motion(&group) {
                    Some(group)
                } else {
                    warn!(group = %group, "Model refused idle motion");
                    diagnostics.push(Diagnostic::MotionRejected { group });
                    None
                }
            }
            Err(d) => {
                warn!(diagnostic = %d, "No default motion");
                diagnostics.push(d);
                None
            }
        };

        let id = instance.id();
        self.context().backend.add_to_scene(id);
        self.attached = Some(instance);
        info!(instance = id.0, scale = transform.scale, motion = ?default_motion, "Instance attached");

        Ok(AttachReport {
            transform,
            default_motion,
            diagnostics,
        })
    }

    /// Removes the attached instance from the scene and hands it back.
    /// The rendering context stays alive.
    pub fn detach(&mut self) -> Option<ModelInstance> {
        let instance = self.attached.take()?;
        if let Some(ctx) = self.context.as_mut() {
            ctx.backend.remove_from_scene(instance.id());
        }
        debug!(instance = instance.id().0, "Instance detached");
        Some(instance)
    }

    pub fn attached(&self) -> Option<&ModelInstance> {
        self.attached.as_ref()
    }

    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    /// How many rendering contexts this manager has created (0 or 1).
    pub fn contexts_created(&self) -> usize {
        self.contexts_created
    }

    /// One render tick: track the surface size, advance the attached
    /// instance's animation, draw it.
    pub fn render_frame(&mut self, dt_sec: f32) {
        if self.context.is_none() {
            return;
        }
        self.sync_size();
        let Some(ctx) = self.context.as_mut() else {
            return;
        };
        ctx.backend.begin_frame();
        if let Some(instance) = self.attached.as_mut() {
            instance.update(dt_sec);
            ctx.backend.draw_instance(instance.id(), instance.transform());
        }
        ctx.backend.end_frame();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups(entries: &[(&str, usize)]) -> Vec<MotionGroupInfo> {
        entries.iter()
            .map(|(name, len)| MotionGroupInfo {
                name: name.to_string(),
                len: *len,
            })
            .collect()
    }

    #[test]
    fn idle_selection_is_case_insensitive() {
        let g = groups(&[("TalkA", 1), ("Idle_A", 2)]);
        assert_eq!(select_idle_group(&g, "idle"), Ok("Idle_A"));
        let g = groups(&[("motion_IDLE", 1)]);
        assert_eq!(select_idle_group(&g, "idle"), Ok("motion_IDLE"));
    }

    #[test]
    fn idle_selection_takes_first_match_in_order() {
        let g = groups(&[("idle_b", 1), ("Idle", 1)]);
        assert_eq!(select_idle_group(&g, "idle"), Ok("idle_b"));
    }

    #[test]
    fn empty_first_idle_group_is_reported() {
        let g = groups(&[("Idle", 0), ("Idle2", 3)]);
        assert_eq!(
            select_idle_group(&g, "idle"),
            Err(Diagnostic::EmptyIdleMotion {
                group: "Idle".into()
            })
        );
    }

    #[test]
    fn no_idle_group() {
        let g = groups(&[("TapBody", 1)]);
        assert_eq!(select_idle_group(&g, "idle"), Err(Diagnostic::NoIdleMotion));
        assert_eq!(select_idle_group(&[], "idle"), Err(Diagnostic::NoIdleMotion));
    }
}
