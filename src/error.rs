use std::path::PathBuf;

use thiserror::Error;

/// Failures while creating the device, pipeline or GPU resources.
///
/// These are fatal: startup aborts and nothing is retried.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("render target has zero area")]
    ZeroArea,
    #[error("failed to create rendering surface")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("failed to acquire GPU adapter")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to create GPU device")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("surface reports no supported formats")]
    NoSurfaceFormat,
    #[error("{stage} shader blob is unusable: {reason}")]
    Shader { stage: &'static str, reason: String },
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("precondition violated: {0}")]
    Precondition(String),
}

/// Failure of a single tick. Non-fatal variants skip the frame.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("render target unavailable: {0}")]
    TargetUnavailable(String),
    #[error("drawable {index} has no GPU resources")]
    UnknownDrawable { index: usize },
    #[error("GPU is out of memory")]
    OutOfMemory,
}

impl FrameError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::OutOfMemory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_out_of_memory_is_fatal() {
        assert!(FrameError::OutOfMemory.is_fatal());
        assert!(!FrameError::TargetUnavailable("lost".into()).is_fatal());
        assert!(!FrameError::UnknownDrawable { index: 3 }.is_fatal());
    }

    #[test]
    fn messages_name_the_failing_piece() {
        let err = SetupError::Shader {
            stage: "vertex",
            reason: "empty".into(),
        };
        assert_eq!(err.to_string(), "vertex shader blob is unusable: empty");
        assert_eq!(
            FrameError::UnknownDrawable { index: 1 }.to_string(),
            "drawable 1 has no GPU resources"
        );
    }
}
