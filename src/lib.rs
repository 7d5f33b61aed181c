//! Cube viewer with an arcball orbit camera.
//!
//! The crate renders one shared cube mesh per drawable, either into the whole
//! window or side by side in two viewports for comparison. Pointer drags
//! rotate a quaternion camera around its pivot; logic updates run on a fixed
//! interval while frames are submitted on every tick.
//!
//! Frame orchestration only talks to a [`RenderBackend`], so everything above
//! the GPU layer can run headless against [`RecordingBackend`].

pub mod app;
pub mod camera;
pub mod config;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod input;
pub mod render;
pub mod transform;

pub use camera::OrbitCamera;
pub use config::{CameraConfig, DrawableConfig, ViewerConfig};
pub use error::{FrameError, SetupError};
pub use frame::{
    DrawCommand, FrameOrchestrator, FramePlan, LoopStats, RenderBackend, TickReport,
    UpdateGate, ViewportLayout, ViewportRect,
};
pub use geometry::MeshData;
pub use input::{InputState, MouseButton};
pub use render::{GpuRenderer, RecordingBackend, ShaderCode, ShaderSet, ShaderStage};
pub use transform::{compose, DrawUniforms, ModelTransform, ProjectionParams};
