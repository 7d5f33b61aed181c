pub mod native;
pub mod recording;
pub mod shader;

pub use native::GpuRenderer;
pub use recording::RecordingBackend;
pub use shader::{ShaderCode, ShaderSet, ShaderStage};
