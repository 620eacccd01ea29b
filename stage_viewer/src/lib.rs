//! `stage_viewer`
//!
//! Headless viewer around `stage_core`:
//! - Model folder scanning (manifest discovery, payload collection)
//! - Console commands driving the lifecycle manager
//! - Fixed-rate render ticks

pub mod folder;
pub mod viewer;

pub use folder::ModelFolder;
pub use viewer::Viewer;
