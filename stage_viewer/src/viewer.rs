//! Headless viewer.
//!
//! Wraps a [`ModelLifecycleManager`] on a headless surface and exposes it
//! through console commands.

use std::path::Path;

use stage_core::{
    config::StageConfig,
    error::LoadError,
    lifecycle::{LifecycleState, LoadOutcome, ModelLifecycleManager, StageContext},
    math::Size,
    render::HeadlessSurface,
};
use tracing::info;

use crate::folder::ModelFolder;

pub struct Viewer {
    pub cfg: StageConfig,
    stage: ModelLifecycleManager,
    surface: HeadlessSurface,
    frames: u64,
    quit: bool,
}

impl Viewer {
    pub fn new(cfg: StageConfig) -> Self {
        let (ctx, surface) = StageContext::headless(cfg.clone());
        Self {
            cfg,
            stage: ModelLifecycleManager::new(ctx),
            surface,
            frames: 0,
            quit: false,
        }
    }

    pub fn stage(&self) -> &ModelLifecycleManager {
        &self.stage
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Set by the `quit` command.
    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// Scans `dir` and loads the model found there.
    pub async fn load_folder(&self, dir: &Path) -> anyhow::Result<LoadOutcome> {
        if self.stage.state() == LifecycleState::Loading {
            return Err(LoadError::LoadInProgress.into());
        }
        let folder = ModelFolder::scan(dir, &self.cfg.manifest_suffix).await?;
        let outcome = self.stage.load(&folder.manifest, &folder.payloads).await?;
        info!(
            model = %folder.manifest_path.display(),
            instance = outcome.instance.0,
            "Model loaded from folder"
        );
        Ok(outcome)
    }

    /// One render tick.
    pub fn tick(&mut self, dt_sec: f32) {
        self.stage.render_frame(dt_sec);
        self.frames += 1;
    }

    /// Executes a console command line and returns its output lines.
    pub async fn exec_console(&mut self, line: &str) -> anyhow::Result<Vec<String>> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        match tokens[0] {
            "load" => {
                if tokens.len() < 2 {
                    return Ok(vec!["Usage: load <dir>".to_string()]);
                }
                let dir = tokens[1..].join(" ");
                match self.load_folder(Path::new(&dir)).await {
                    Ok(outcome) => {
                        let mut out = vec![format!("Loaded instance {}", outcome.instance.0)];
                        if let Some(motion) = outcome.default_motion {
                            out.push(format!("Idle motion: {motion}"));
                        }
                        out.extend(outcome.diagnostics.iter().map(|d| format!("warning: {d}")));
                        Ok(out)
                    }
                    Err(e) => Ok(vec![format!("Failed to load model: {e:#}")]),
                }
            }
            "unload" => {
                if self.stage.state() != LifecycleState::Ready {
                    return Ok(vec!["No model loaded".to_string()]);
                }
                self.stage.dispose();
                Ok(vec!["Model unloaded".to_string()])
            }
            "resize" => {
                let dims = (
                    tokens.get(1).and_then(|s| s.parse::<f32>().ok()),
                    tokens.get(2).and_then(|s| s.parse::<f32>().ok()),
                );
                let (Some(w), Some(h)) = dims else {
                    return Ok(vec!["Usage: resize <width> <height>".to_string()]);
                };
                self.surface.set_size(Size::new(w, h));
                Ok(vec![format!("Surface resized to {w}x{h}")])
            }
            "status" => {
                let status = self.stage.status();
                let mut out = vec![format!("State: {}", status.state)];
                if let Some(id) = self.stage.attached() {
                    out.push(format!("Instance: {}", id.0));
                }
                out.push(format!("Live handles: {}", self.stage.registry().live_count()));
                out.push(format!("Frames: {}", self.frames));
                if let Some(err) = status.last_error {
                    out.push(format!("Last error: {err}"));
                }
                out.extend(status.diagnostics.iter().map(|d| format!("warning: {d}")));
                Ok(out)
            }
            "quit" | "exit" => {
                self.quit = true;
                Ok(vec![])
            }
            other => Ok(vec![format!("Unknown command: {other}")]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_model(dir: &Path) -> anyhow::Result<()> {
        std::fs::write(
            dir.join("m.model3.json"),
            r#"{"FileReferences": {
                "Moc": "m.moc3",
                "Textures": ["t0.png"],
                "Motions": {"Idle": [{"File": "idle.motion3.json"}]}
            }}"#,
        )?;
        std::fs::write(dir.join("m.moc3"), b"MOC3\x03")?;
        std::fs::write(dir.join("t0.png"), b"png")?;
        std::fs::write(dir.join("idle.motion3.json"), b"{}")?;
        Ok(())
    }

    #[tokio::test]
    async fn load_and_unload_from_console() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_model(dir.path())?;
        let mut viewer = Viewer::new(StageConfig::default());

        let out = viewer
            .exec_console(&format!("load {}", dir.path().display()))
            .await?;
        assert!(out[0].starts_with("Loaded instance"), "{out:?}");
        assert!(out.iter().any(|l| l == "Idle motion: Idle"));
        assert_eq!(viewer.stage().state(), LifecycleState::Ready);

        viewer.tick(1.0 / 60.0);
        assert_eq!(viewer.frames(), 1);

        let out = viewer.exec_console("unload").await?;
        assert_eq!(out, vec!["Model unloaded".to_string()]);
        assert_eq!(viewer.stage().registry().live_count(), 0);

        let out = viewer.exec_console("unload").await?;
        assert_eq!(out, vec!["No model loaded".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn status_and_quit() -> anyhow::Result<()> {
        let mut viewer = Viewer::new(StageConfig::default());
        let out = viewer.exec_console("status").await?;
        assert_eq!(out[0], "State: EMPTY");

        let out = viewer.exec_console("resize 10").await?;
        assert_eq!(out, vec!["Usage: resize <width> <height>".to_string()]);

        assert!(!viewer.should_quit());
        viewer.exec_console("quit").await?;
        assert!(viewer.should_quit());
        Ok(())
    }

    #[tokio::test]
    async fn failed_load_is_reported_not_raised() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut viewer = Viewer::new(StageConfig::default());
        let out = viewer
            .exec_console(&format!("load {}", dir.path().display()))
            .await?;
        assert!(out[0].starts_with("Failed to load model"), "{out:?}");
        assert_eq!(viewer.stage().state(), LifecycleState::Empty);
        Ok(())
    }
}
