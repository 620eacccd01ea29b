//! Model manifest schema.
//!
//! A manifest is the `.model3.json` document describing one model. Only the
//! four reference sites the stage resolves are typed; every other field is
//! carried through untouched so a rewritten manifest serializes back to the
//! same shape the renderer expects.
//!
//! ```json
//! {
//!   "Version": 3,
//!   "FileReferences": {
//!     "Moc": "hiyori.moc3",
//!     "Textures": ["hiyori.2048/texture_00.png"],
//!     "Physics": "hiyori.physics3.json",
//!     "Motions": { "Idle": [{ "File": "motions/idle_01.motion3.json", "FadeInTime": 0.5 }] }
//!   }
//! }
//! ```

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Parsed model manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "FileReferences")]
    pub file_references: FileReferences,
    /// Top-level fields the stage does not interpret (`Version`, `Groups`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `FileReferences` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FileReferences {
    /// Core binary. Required.
    pub moc: String,
    #[serde(default)]
    pub textures: Vec<String>,
    /// Motion groups in document order.
    #[serde(default, with = "motion_groups")]
    pub motions: Vec<MotionGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physics: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Named group of motions, e.g. `Idle` or `TapBody`.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionGroup {
    pub name: String,
    pub entries: Vec<MotionEntry>,
}

/// One motion inside a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionEntry {
    #[serde(rename = "File")]
    pub file: String,
    /// `FadeInTime`, `Sound` and friends.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Kind of asset a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    Moc,
    Texture,
    Motion,
    Physics,
}

impl AssetKind {
    /// Whether a missing asset of this kind makes the manifest unusable.
    pub fn is_required(self) -> bool {
        matches!(self, AssetKind::Moc)
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Moc => write!(f, "moc"),
            AssetKind::Texture => write!(f, "texture"),
            AssetKind::Motion => write!(f, "motion"),
            AssetKind::Physics => write!(f, "physics"),
        }
    }
}

/// Position of one file reference inside a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReferenceSite {
    Moc,
    Texture { index: usize },
    Motion { group: usize, index: usize },
    Physics,
}

impl ReferenceSite {
    pub fn kind(&self) -> AssetKind {
        match self {
            ReferenceSite::Moc => AssetKind::Moc,
            ReferenceSite::Texture { .. } => AssetKind::Texture,
            ReferenceSite::Motion { .. } => AssetKind::Motion,
            ReferenceSite::Physics => AssetKind::Physics,
        }
    }
}

impl Manifest {
    /// Parses a manifest from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Parses a manifest from an already decoded JSON value.
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    pub fn to_json_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    /// Every file reference paired with its path, in resolution order:
    /// core binary, textures, motion groups (group order, then entry order),
    /// physics.
    pub fn reference_sites(&self) -> Vec<(ReferenceSite, &str)> {
        let refs = &self.file_references;
        let mut sites = Vec::with_capacity(
            2 + refs.textures.len() + refs.motions.iter().map(|g| g.entries.len()).sum::<usize>(),
        );

        sites.push((ReferenceSite::Moc, refs.moc.as_str()));
        for (index, path) in refs.textures.iter().enumerate() {
            sites.push((ReferenceSite::Texture { index }, path.as_str()));
        }
        for (group, motions) in refs.motions.iter().enumerate() {
            for (index, entry) in motions.entries.iter().enumerate() {
                sites.push((ReferenceSite::Motion { group, index }, entry.file.as_str()));
            }
        }
        if let Some(physics) = &refs.physics {
            sites.push((ReferenceSite::Physics, physics.as_str()));
        }
        sites
    }

    /// Looks up a motion group by exact name.
    pub fn motion_group(&self, name: &str) -> Option<&MotionGroup> {
        self.file_references.motions.iter().find(|g| g.name == name)
    }
}

/// Serde adapter keeping motion groups in document order.
mod motion_groups {
    use super::*;

    pub fn serialize<S: Serializer>(groups: &[MotionGroup], s: S) -> Result<S::Ok, S::Error> {
        s.collect_map(groups.iter().map(|g| (&g.name, &g.entries)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<MotionGroup>, D::Error> {
        d.deserialize_map(GroupsVisitor)
    }

    struct GroupsVisitor;

    impl<'de> Visitor<'de> for GroupsVisitor {
        type Value = Vec<MotionGroup>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of motion group name to motion entries")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut groups: Vec<MotionGroup> = Vec::new();
            while let Some((name, entries)) = map.next_entry::<String, Vec<MotionEntry>>()? {
                // Repeated keys: last one wins, first position kept.
                match groups.iter_mut().find(|g| g.name == name) {
                    Some(existing) => existing.entries = entries,
                    None => groups.push(MotionGroup { name, entries }),
                }
            }
            Ok(groups)
        }
    }
}
