//! Errors and diagnostics.
//!
//! Fatal conditions are [`LoadError`]s and abort a load. Everything else is
//! a [`Diagnostic`] returned next to a successful result.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::manifest::AssetKind;

/// Non-fatal finding collected during resolution, attach or teardown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Diagnostic {
    /// A referenced file was not in the payload map.
    MissingAsset { kind: AssetKind, path: String },
    /// No motion group name matched the idle pattern.
    NoIdleMotion,
    /// The first idle group has no entries.
    EmptyIdleMotion { group: String },
    /// The instance refused to play the selected idle group.
    MotionRejected { group: String },
    /// The instance reported a height that cannot be fitted; scale left at 1.
    DegenerateBounds { height: f32 },
    /// Releasing a previous instance's native resources failed.
    DisposalFailed { reason: String },
}

impl Diagnostic {
    pub fn is_missing_asset(&self) -> bool {
        matches!(self, Diagnostic::MissingAsset { .. })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingAsset { kind, path } => {
                write!(f, "{kind} resource not found: {path}")
            }
            Diagnostic::NoIdleMotion => write!(f, "no idle motion group found"),
            Diagnostic::EmptyIdleMotion { group } => {
                write!(f, "idle motion group '{group}' is empty")
            }
            Diagnostic::MotionRejected { group } => {
                write!(f, "model refused to play motion group '{group}'")
            }
            Diagnostic::DegenerateBounds { height } => {
                write!(f, "model height {height} cannot be fitted to the surface")
            }
            Diagnostic::DisposalFailed { reason } => {
                write!(f, "disposing previous model failed: {reason}")
            }
        }
    }
}

/// Resolution failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("core binary not found: {path}")]
    MissingCoreAsset {
        path: String,
        /// Everything reported before resolution stopped.
        diagnostics: Vec<Diagnostic>,
    },
}

/// Render surface failures.
#[derive(Error, Debug)]
pub enum SurfaceError {
    /// Another instance is still attached.
    #[error("an instance is already attached to the surface")]
    Occupied,
}

/// Fatal load failure. The stage is back to `Empty` when one is returned,
/// except for [`LoadError::LoadInProgress`] and [`LoadError::ManifestParse`]
/// which leave it untouched.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("a model load is already in progress")]
    LoadInProgress,

    #[error("manifest parse error: {0}")]
    ManifestParse(#[from] serde_json::Error),

    #[error("core binary not found: {path}")]
    MissingCoreAsset {
        path: String,
        diagnostics: Vec<Diagnostic>,
    },

    #[error("model construction failed: {source}")]
    Construction {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("surface error: {0}")]
    Surface(#[from] SurfaceError),
}

impl From<ResolveError> for LoadError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::MissingCoreAsset { path, diagnostics } => {
                LoadError::MissingCoreAsset { path, diagnostics }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_messages() {
        let d = Diagnostic::MissingAsset {
            kind: AssetKind::Texture,
            path: "t0.png".into(),
        };
        assert_eq!(d.to_string(), "texture resource not found: t0.png");
        assert!(d.is_missing_asset());
        assert!(!Diagnostic::NoIdleMotion.is_missing_asset());
    }

    #[test]
    fn resolve_error_maps_to_load_error() {
        let e: LoadError = ResolveError::MissingCoreAsset {
            path: "m.moc3".into(),
            diagnostics: vec![],
        }
        .into();
        assert!(matches!(e, LoadError::MissingCoreAsset { ref path, .. } if path == "m.moc3"));
        assert_eq!(e.to_string(), "core binary not found: m.moc3");
    }
}
