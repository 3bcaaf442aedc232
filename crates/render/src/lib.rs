#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc, clippy::must_use_candidate)]
//! Live viewer for legged simulations.
//!
//! [`WindowViewer`] implements [`physics::Viewer`]: the stepping loop pushes
//! a [`physics::Snapshot`] after every step and the viewer draws it as lines
//! in a `winit` window through a `wgpu` pipeline. Nothing here touches
//! simulation state.

pub mod camera;
pub mod pipeline;
pub mod scene;
pub mod viewer;

pub use viewer::{FrameClock, ViewerOptions, WindowViewer};
