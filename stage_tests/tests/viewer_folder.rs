//! Folder scanning through to a live instance.

use std::path::Path;

use stage_core::{config::StageConfig, error::Diagnostic, lifecycle::LifecycleState};
use stage_tests::init_tracing;
use stage_viewer::{ModelFolder, Viewer};

fn write_model(root: &Path, name: &str) -> anyhow::Result<()> {
    let dir = root.join(name);
    std::fs::create_dir_all(dir.join("textures"))?;
    std::fs::create_dir_all(dir.join("motions"))?;
    std::fs::write(
        dir.join(format!("{name}.model3.json")),
        format!(
            r#"{{"Version": 3, "FileReferences": {{
                "Moc": "{name}.moc3",
                "Textures": ["textures/texture_00.png", "textures/texture_01.png"],
                "Physics": "{name}.physics3.json",
                "Motions": {{
                    "Tap": [{{"File": "motions/tap.motion3.json"}}],
                    "Idle": [{{"File": "motions/idle.motion3.json"}}]
                }}
            }}}}"#
        ),
    )?;
    std::fs::write(dir.join(format!("{name}.moc3")), b"MOC3\x04")?;
    std::fs::write(dir.join("textures").join("texture_00.png"), b"png0")?;
    std::fs::write(dir.join("motions").join("tap.motion3.json"), b"{}")?;
    std::fs::write(dir.join("motions").join("idle.motion3.json"), b"{}")?;
    Ok(())
}

#[tokio::test]
async fn scanned_folder_loads() -> anyhow::Result<()> {
    init_tracing();
    let root = tempfile::tempdir()?;
    write_model(root.path(), "Hiyori")?;

    let viewer = Viewer::new(StageConfig::default());
    let outcome = viewer.load_folder(root.path()).await?;

    assert_eq!(viewer.stage().state(), LifecycleState::Ready);
    assert_eq!(outcome.default_motion.as_deref(), Some("Idle"));
    let missing: Vec<_> = outcome
        .diagnostics
        .iter()
        .filter(|d| d.is_missing_asset())
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        missing,
        vec![
            "texture resource not found: textures/texture_01.png".to_string(),
            "physics resource not found: Hiyori.physics3.json".to_string(),
        ]
    );
    // moc, one texture, two motions
    assert_eq!(viewer.stage().registry().live_count(), 4);
    Ok(())
}

#[tokio::test]
async fn first_manifest_in_path_order_wins() -> anyhow::Result<()> {
    init_tracing();
    let root = tempfile::tempdir()?;
    write_model(root.path(), "B")?;
    write_model(root.path(), "A")?;

    let folder = ModelFolder::scan(root.path(), ".model3.json").await?;

    assert_eq!(folder.manifest.file_references.moc, "A.moc3");
    assert!(folder.payloads.contains("A.moc3"));
    assert!(!folder.payloads.contains("B.moc3"));
    Ok(())
}

#[tokio::test]
async fn reload_from_folder_replaces_instance() -> anyhow::Result<()> {
    init_tracing();
    let root = tempfile::tempdir()?;
    write_model(root.path(), "Hiyori")?;
    let viewer = Viewer::new(StageConfig::default());

    let first = viewer.load_folder(root.path()).await?;
    let second = viewer.load_folder(root.path()).await?;

    assert_ne!(first.instance, second.instance);
    assert_eq!(viewer.stage().attached(), Some(second.instance));
    assert_eq!(viewer.stage().registry().live_count(), 4);
    assert!(!second
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::DisposalFailed { .. })));
    Ok(())
}

#[tokio::test]
async fn console_reports_scan_errors() -> anyhow::Result<()> {
    init_tracing();
    let root = tempfile::tempdir()?;
    let mut viewer = Viewer::new(StageConfig::default());

    let out = viewer
        .exec_console(&format!("load {}", root.path().join("missing").display()))
        .await?;

    assert_eq!(out.len(), 1);
    assert!(out[0].starts_with("Failed to load model"), "{out:?}");
    let status = viewer.exec_console("status").await?;
    assert_eq!(status[0], "State: EMPTY");
    Ok(())
}
