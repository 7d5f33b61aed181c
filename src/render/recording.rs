use crate::error::FrameError;
use crate::frame::{FramePlan, RenderBackend};
use crate::transform::DrawUniforms;

/// Headless backend that keeps uniform buffer contents in memory and records
/// every submitted plan.
///
/// Used for `--headless` runs and to observe the orchestrator in tests.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    size: (u32, u32),
    buffers: Vec<Vec<u8>>,
    drawable_limit: usize,
    frames: Vec<FramePlan>,
    uniform_writes: usize,
    pending_failure: Option<FrameError>,
}

impl RecordingBackend {
    /// Creates a backend with `drawables` zeroed uniform buffers.
    pub fn new(width: u32, height: u32, drawables: usize) -> Self {
        Self {
            size: (width, height),
            buffers: vec![vec![0; DrawUniforms::SIZE as usize]; drawables],
            drawable_limit: drawables,
            ..Self::default()
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    /// Raw bytes of a drawable's uniform buffer.
    pub fn buffer_contents(&self, drawable: usize) -> Option<&[u8]> {
        self.buffers.get(drawable).map(Vec::as_slice)
    }

    /// Decoded uniform block of a drawable.
    pub fn uniforms(&self, drawable: usize) -> Option<DrawUniforms> {
        self.buffer_contents(drawable)
            .map(bytemuck::pod_read_unaligned::<DrawUniforms>)
    }

    pub fn frames(&self) -> &[FramePlan] {
        &self.frames
    }

    pub fn uniform_writes(&self) -> usize {
        self.uniform_writes
    }

    /// Makes the next `submit` fail with `error`.
    pub fn fail_next_submit(&mut self, error: FrameError) {
        self.pending_failure = Some(error);
    }

    /// Pretends only the first `limit` drawables have GPU resources.
    pub fn set_drawable_limit(&mut self, limit: usize) {
        self.drawable_limit = limit.min(self.buffers.len());
    }
}

impl RenderBackend for RecordingBackend {
    fn target_size(&self) -> (u32, u32) {
        self.size
    }

    fn write_uniforms(
        &mut self,
        drawable: usize,
        uniforms: &DrawUniforms,
    ) -> Result<(), FrameError> {
        if drawable >= self.drawable_limit {
            return Err(FrameError::UnknownDrawable { index: drawable });
        }
        self.buffers[drawable].copy_from_slice(uniforms.as_bytes());
        self.uniform_writes += 1;
        Ok(())
    }

    fn submit(&mut self, plan: &FramePlan) -> Result<(), FrameError> {
        if let Some(err) = self.pending_failure.take() {
            return Err(err);
        }
        if let Some(draw) = plan
            .draws
            .iter()
            .find(|draw| draw.drawable >= self.drawable_limit)
        {
            return Err(FrameError::UnknownDrawable {
                index: draw.drawable,
            });
        }
        self.frames.push(plan.clone());
        Ok(())
    }
}
