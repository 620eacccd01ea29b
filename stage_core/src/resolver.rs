//! Manifest resolution.
//!
//! Rewrites every file reference of a [`Manifest`] into a handle address,
//! minting one handle per reference found in the payload map. References
//! with no payload stay as their original path and are reported as
//! [`Diagnostic::MissingAsset`]; only the core binary is mandatory.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{
    error::{Diagnostic, ResolveError},
    manifest::{AssetKind, Manifest, ReferenceSite},
    payload::PayloadMap,
    resources::{Handle, ResourceHandleRegistry},
};

/// A reference after resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetRef {
    Resolved(Handle),
    /// Not found in the payload map; holds the original path.
    Unresolved(String),
}

impl AssetRef {
    pub fn handle(&self) -> Option<&Handle> {
        match self {
            AssetRef::Resolved(h) => Some(h),
            AssetRef::Unresolved(_) => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, AssetRef::Resolved(_))
    }

    /// Handle address if resolved, otherwise the original path.
    pub fn location(&self) -> String {
        match self {
            AssetRef::Resolved(h) => h.address(),
            AssetRef::Unresolved(path) => path.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMotion {
    pub file: AssetRef,
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMotionGroup {
    pub name: String,
    pub entries: Vec<ResolvedMotion>,
}

/// Manifest with its references rewritten to handles.
#[derive(Debug, Clone)]
pub struct ResolvedManifest {
    pub moc: Handle,
    pub textures: Vec<AssetRef>,
    pub motions: Vec<ResolvedMotionGroup>,
    pub physics: Option<AssetRef>,
    source: Manifest,
    handles: Vec<Handle>,
    diagnostics: Vec<Diagnostic>,
}

impl ResolvedManifest {
    /// The manifest this was resolved from.
    pub fn source(&self) -> &Manifest {
        &self.source
    }

    /// Every handle minted for this manifest, in walk order.
    pub fn handles(&self) -> &[Handle] {
        &self.handles
    }

    /// Missing optional assets, in walk order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Looks up a motion group by exact name.
    pub fn motion_group(&self, name: &str) -> Option<&ResolvedMotionGroup> {
        self.motions.iter().find(|g| g.name == name)
    }

    /// The manifest JSON with handle addresses in place of resolved paths.
    pub fn to_json(&self) -> serde_json::Result<Value> {
        let mut rewritten = self.source.clone();
        let refs = &mut rewritten.file_references;

        refs.moc = self.moc.address();
        for (slot, resolved) in refs.textures.iter_mut().zip(&self.textures) {
            *slot = resolved.location();
        }
        for (group, resolved) in refs.motions.iter_mut().zip(&self.motions) {
            for (entry, motion) in group.entries.iter_mut().zip(&resolved.entries) {
                entry.file = motion.file.location();
            }
        }
        if let (Some(slot), Some(resolved)) = (refs.physics.as_mut(), &self.physics) {
            *slot = resolved.location();
        }

        rewritten.to_json_value()
    }
}

/// Resolves manifests against payload maps.
#[derive(Debug, Clone)]
pub struct ManifestResolver {
    registry: ResourceHandleRegistry,
}

impl ManifestResolver {
    pub fn new(registry: ResourceHandleRegistry) -> Self {
        Self { registry }
    }

    /// Resolves `manifest` against `payloads`.
    ///
    /// On error no handle minted by this call is left live.
    pub fn resolve(
        &self,
        manifest: &Manifest,
        payloads: &PayloadMap,
    ) -> Result<ResolvedManifest, ResolveError> {
        let refs = &manifest.file_references;

        let mut moc = None;
        let mut textures: Vec<AssetRef> = refs
            .textures
            .iter()
            .map(|p| AssetRef::Unresolved(p.clone()))
            .collect();
        let mut motions: Vec<ResolvedMotionGroup> = refs
            .motions
            .iter()
            .map(|g| ResolvedMotionGroup {
                name: g.name.clone(),
                entries: g
                    .entries
                    .iter()
                    .map(|e| ResolvedMotion {
                        file: AssetRef::Unresolved(e.file.clone()),
                        extra: e.extra.clone(),
                    })
                    .collect(),
            })
            .collect();
        let mut physics = refs.physics.clone().map(AssetRef::Unresolved);

        let mut handles = Vec::new();
        let mut diagnostics = Vec::new();

        for (site, path) in manifest.reference_sites() {
            let Some(payload) = payloads.get(path) else {
                let kind = site.kind();
                warn!(%kind, path, "Resource not found");
                diagnostics.push(Diagnostic::MissingAsset {
                    kind,
                    path: path.to_string(),
                });
                if kind.is_required() {
                    self.registry.revoke_all(&handles);
                    return Err(ResolveError::MissingCoreAsset {
                        path: path.to_string(),
                        diagnostics,
                    });
                }
                continue;
            };

            let handle = self.registry.create(payload.clone());
            debug!(kind = %site.kind(), path, handle = %handle, "Resource resolved");
            handles.push(handle.clone());

            match site {
                ReferenceSite::Moc => moc = Some(handle),
                ReferenceSite::Texture { index } => textures[index] = AssetRef::Resolved(handle),
                ReferenceSite::Motion { group, index } => {
                    motions[group].entries[index].file = AssetRef::Resolved(handle)
                }
                ReferenceSite::Physics => physics = Some(AssetRef::Resolved(handle)),
            }
        }

        let Some(moc) = moc else {
            self.registry.revoke_all(&handles);
            return Err(ResolveError::MissingCoreAsset {
                path: refs.moc.clone(),
                diagnostics,
            });
        };

        Ok(ResolvedManifest {
            moc,
            textures,
            motions,
            physics,
            source: manifest.clone(),
            handles,
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn manifest(json: &str) -> Manifest {
        Manifest::from_json_str(json).unwrap()
    }

    fn payloads(paths: &[&str]) -> PayloadMap {
        paths
            .iter()
            .map(|p| (p.to_string(), Bytes::from(p.as_bytes().to_vec())))
            .collect()
    }

    const FULL: &str = r#"{"FileReferences": {
        "Moc": "m.moc3",
        "Textures": ["a.png", "b.png"],
        "Motions": {"Idle": [{"File": "idle.motion3.json", "FadeInTime": 1.0}], "Tap": []},
        "Physics": "m.physics3.json"
    }}"#;

    #[test]
    fn resolves_every_site() {
        let registry = ResourceHandleRegistry::new();
        let resolver = ManifestResolver::new(registry.clone());
        let m = manifest(FULL);
        let p = payloads(&["m.moc3", "a.png", "b.png", "idle.motion3.json", "m.physics3.json"]);

        let resolved = resolver.resolve(&m, &p).unwrap();
        assert!(resolved.diagnostics().is_empty());
        assert_eq!(resolved.handles().len(), 5);
        assert_eq!(registry.live_count(), 5);
        assert!(resolved.physics.as_ref().unwrap().is_resolved());
        assert_eq!(
            registry.fetch(&resolved.moc).unwrap(),
            Bytes::from_static(b"m.moc3")
        );
    }

    #[test]
    fn texture_order_is_preserved() {
        let registry = ResourceHandleRegistry::new();
        let resolver = ManifestResolver::new(registry.clone());
        let resolved = resolver
            .resolve(&manifest(FULL), &payloads(&["m.moc3", "a.png", "b.png"]))
            .unwrap();

        let a = resolved.textures[0].handle().unwrap();
        let b = resolved.textures[1].handle().unwrap();
        assert_ne!(a, b);
        assert_eq!(registry.fetch(a).unwrap(), Bytes::from_static(b"a.png"));
        assert_eq!(registry.fetch(b).unwrap(), Bytes::from_static(b"b.png"));
    }

    #[test]
    fn missing_optional_assets_are_diagnostics() {
        let registry = ResourceHandleRegistry::new();
        let resolver = ManifestResolver::new(registry.clone());
        let resolved = resolver
            .resolve(&manifest(FULL), &payloads(&["m.moc3", "b.png"]))
            .unwrap();

        assert_eq!(
            resolved.diagnostics(),
            &[
                Diagnostic::MissingAsset {
                    kind: AssetKind::Texture,
                    path: "a.png".into()
                },
                Diagnostic::MissingAsset {
                    kind: AssetKind::Motion,
                    path: "idle.motion3.json".into()
                },
                Diagnostic::MissingAsset {
                    kind: AssetKind::Physics,
                    path: "m.physics3.json".into()
                },
            ]
        );
        assert_eq!(resolved.textures[0], AssetRef::Unresolved("a.png".into()));
        assert!(resolved.textures[1].is_resolved());
        assert_eq!(registry.live_count(), 2);
    }

    #[test]
    fn missing_core_binary_is_fatal_and_leaks_nothing() {
        let registry = ResourceHandleRegistry::new();
        let resolver = ManifestResolver::new(registry.clone());
        let err = resolver
            .resolve(&manifest(FULL), &payloads(&["a.png", "b.png"]))
            .unwrap_err();

        let ResolveError::MissingCoreAsset { path, diagnostics } = err;
        assert_eq!(path, "m.moc3");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn empty_groups_are_retained() {
        let registry = ResourceHandleRegistry::new();
        let resolver = ManifestResolver::new(registry);
        let resolved = resolver
            .resolve(&manifest(FULL), &payloads(&["m.moc3"]))
            .unwrap();
        let tap = resolved.motion_group("Tap").unwrap();
        assert!(tap.entries.is_empty());
        assert_eq!(resolved.motions.len(), 2);
    }

    #[test]
    fn to_json_substitutes_addresses_in_place() {
        let registry = ResourceHandleRegistry::new();
        let resolver = ManifestResolver::new(registry);
        let resolved = resolver
            .resolve(&manifest(FULL), &payloads(&["m.moc3", "b.png", "idle.motion3.json"]))
            .unwrap();

        let json = resolved.to_json().unwrap();
        let refs = &json["FileReferences"];
        assert_eq!(refs["Moc"], resolved.moc.address());
        assert_eq!(refs["Textures"][0], "a.png");
        assert_eq!(
            refs["Textures"][1],
            resolved.textures[1].handle().unwrap().address()
        );
        let idle = &refs["Motions"]["Idle"][0];
        assert!(idle["File"].as_str().unwrap().starts_with("blob:stage/"));
        assert_eq!(idle["FadeInTime"], 1.0);
        assert_eq!(refs["Physics"], "m.physics3.json");
    }
}
