//! Per-tick scheduling and draw planning.
//!
//! The orchestrator owns the camera and the per-drawable uniform state, gates
//! logic updates behind a fixed interval and hands a complete [`FramePlan`]
//! to a [`RenderBackend`] once per tick.

use std::time::Duration;

use glam::Mat4;
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

use crate::camera::OrbitCamera;
use crate::config::ViewerConfig;
use crate::error::{FrameError, SetupError};
use crate::geometry::MeshData;
use crate::input::{normalized, InputState};
use crate::transform::{compose, DrawUniforms, ProjectionParams};

/// Default interval between logic updates.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(100);

/// Fixed-step gate layered under the variable-rate render callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateGate {
    interval: Duration,
    baseline: Option<Duration>,
}

impl UpdateGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            baseline: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns `true` when more than `interval` has elapsed since the last
    /// update. The first call only records the baseline.
    pub fn poll(&mut self, now: Duration) -> bool {
        match self.baseline {
            None => {
                self.baseline = Some(now);
                false
            }
            Some(baseline) if now.saturating_sub(baseline) > self.interval => {
                self.baseline = Some(now);
                true
            }
            Some(_) => false,
        }
    }
}

impl Default for UpdateGate {
    fn default() -> Self {
        Self::new(DEFAULT_UPDATE_INTERVAL)
    }
}

/// How the render target is divided between drawables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewportLayout {
    /// One drawable covering the whole target.
    #[default]
    Single,
    /// Two drawables side by side, split along the horizontal axis.
    Split,
}

impl ViewportLayout {
    pub fn drawable_count(self) -> usize {
        match self {
            Self::Single => 1,
            Self::Split => 2,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Single => Self::Split,
            Self::Split => Self::Single,
        }
    }

    /// Viewport/scissor rectangles, one per drawable, left to right.
    pub fn rects(self, width: u32, height: u32) -> Vec<ViewportRect> {
        match self {
            Self::Single => vec![ViewportRect::new(0, 0, width, height)],
            Self::Split => {
                let left = width / 2;
                vec![
                    ViewportRect::new(0, 0, left, height),
                    ViewportRect::new(left, 0, width - left, height),
                ]
            }
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "single" => Some(Self::Single),
            "split" | "dual" => Some(Self::Split),
            _ => None,
        }
    }
}

/// Pixel rectangle used for both the viewport and the scissor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewportRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ViewportRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && px - self.x < self.width && py >= self.y && py - self.y < self.height
    }
}

/// One indexed draw of the shared mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCommand {
    pub drawable: usize,
    pub viewport: ViewportRect,
    pub index_count: u32,
}

/// Everything a backend needs to encode one frame in a single pass.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePlan {
    pub clear_color: [f64; 4],
    pub clear_depth: f32,
    pub draws: Vec<DrawCommand>,
}

impl FramePlan {
    pub const CLEAR_COLOR: [f64; 4] = [0.0, 0.0, 0.0, 1.0];
    pub const CLEAR_DEPTH: f32 = 1.0;

    pub fn new(draws: Vec<DrawCommand>) -> Self {
        Self {
            clear_color: Self::CLEAR_COLOR,
            clear_depth: Self::CLEAR_DEPTH,
            draws,
        }
    }
}

/// Device-side collaborator driven by the orchestrator.
///
/// `submit` must be all-or-nothing: if any draw in the plan cannot be
/// encoded, nothing from the plan is submitted.
pub trait RenderBackend {
    /// Current size of the render target in physical pixels.
    fn target_size(&self) -> (u32, u32);

    /// Overwrites the uniform buffer owned by `drawable`.
    fn write_uniforms(&mut self, drawable: usize, uniforms: &DrawUniforms)
        -> Result<(), FrameError>;

    /// Encodes and submits `plan` as one command list.
    fn submit(&mut self, plan: &FramePlan) -> Result<(), FrameError>;
}

/// Per-drawable transform and uniform state. Vertex and index data live in
/// the backend and are shared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drawable {
    model: Mat4,
    uniforms: DrawUniforms,
}

impl Drawable {
    pub fn model(&self) -> Mat4 {
        self.model
    }

    pub fn uniforms(&self) -> &DrawUniforms {
        &self.uniforms
    }
}

/// Outcome of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    pub updated: bool,
    pub submitted: bool,
}

/// Counters accumulated over the orchestrator's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopStats {
    pub ticks: u64,
    pub updates: u64,
    pub submitted: u64,
    pub skipped: u64,
}

impl LoopStats {
    fn record(&mut self, report: TickReport) {
        self.ticks += 1;
        if report.updated {
            self.updates += 1;
        }
        if report.submitted {
            self.submitted += 1;
        } else {
            self.skipped += 1;
        }
    }
}

pub struct FrameOrchestrator<B> {
    backend: B,
    camera: OrbitCamera,
    projection: ProjectionParams,
    layout: ViewportLayout,
    drawables: Vec<Drawable>,
    gate: UpdateGate,
    index_count: u32,
    stats: LoopStats,
}

impl<B: RenderBackend> FrameOrchestrator<B> {
    /// Builds the orchestrator and primes every drawable's uniform buffer
    /// with its initial transform.
    pub fn new(backend: B, config: &ViewerConfig) -> Result<Self, SetupError> {
        if config.drawables.len() < config.layout.drawable_count() {
            return Err(SetupError::Precondition(format!(
                "{:?} layout needs {} drawable(s), {} configured",
                config.layout,
                config.layout.drawable_count(),
                config.drawables.len()
            )));
        }

        let camera = OrbitCamera::new(config.camera.eye, config.camera.target, config.camera.up);
        let view = camera.view();
        let drawables = config
            .drawables
            .iter()
            .map(|drawable| {
                let model = drawable.model.matrix();
                Drawable {
                    model,
                    uniforms: DrawUniforms::new(
                        compose(view, model, &config.projection),
                        drawable.primary,
                        drawable.accent,
                    ),
                }
            })
            .collect();

        let mut orchestrator = Self {
            backend,
            camera,
            projection: config.projection,
            layout: config.layout,
            drawables,
            gate: UpdateGate::new(config.update_interval),
            index_count: MeshData::cube().index_count(),
            stats: LoopStats::default(),
        };
        orchestrator
            .write_all_uniforms()
            .map_err(|err| SetupError::Precondition(format!("priming uniforms failed: {err}")))?;
        Ok(orchestrator)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn drawables(&self) -> &[Drawable] {
        &self.drawables
    }

    pub fn layout(&self) -> ViewportLayout {
        self.layout
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Switches between single and split view. Takes effect on the next tick.
    pub fn set_layout(&mut self, layout: ViewportLayout) {
        if layout.drawable_count() > self.drawables.len() {
            warn!("ignoring {layout:?} layout: not enough drawables");
            return;
        }
        self.layout = layout;
    }

    /// Runs one tick: gated logic update, then a full frame submission.
    ///
    /// Non-fatal frame failures are logged and reported as a skipped frame.
    pub fn tick(&mut self, now: Duration, input: &mut InputState) -> Result<TickReport, FrameError> {
        let updated = self.gate.poll(now);
        let result = if updated {
            debug!("logic update at {:.1} ms", now.as_secs_f64() * 1000.0);
            self.update(input).and_then(|()| self.draw())
        } else {
            self.draw()
        };

        let report = match result {
            Ok(submitted) => TickReport { updated, submitted },
            Err(err) if err.is_fatal() => {
                error!("frame failed: {err}");
                return Err(err);
            }
            Err(err) => {
                warn!("skipping frame: {err}");
                TickReport {
                    updated,
                    submitted: false,
                }
            }
        };
        self.stats.record(report);
        Ok(report)
    }

    /// Ticks once per timestamp until the source is exhausted.
    pub fn run<I>(&mut self, input: &mut InputState, timestamps: I) -> Result<LoopStats, FrameError>
    where
        I: IntoIterator<Item = Duration>,
    {
        for now in timestamps {
            self.tick(now, input)?;
        }
        Ok(self.stats)
    }

    /// Plan for the current layout and target size.
    pub fn plan(&self) -> FramePlan {
        let (width, height) = self.backend.target_size();
        let draws = self
            .layout
            .rects(width, height)
            .into_iter()
            .enumerate()
            .map(|(drawable, viewport)| DrawCommand {
                drawable,
                viewport,
                index_count: self.index_count,
            })
            .collect();
        FramePlan::new(draws)
    }

    fn update(&mut self, input: &mut InputState) -> Result<(), FrameError> {
        if let Some((current, previous)) = input.drag() {
            let size = self.backend.target_size();
            self.camera
                .rotate(normalized(current, size), normalized(previous, size));
            input.mark_consumed();
        }

        // Host copies only change once every backend write has landed.
        let view = self.camera.view();
        let staged: Vec<DrawUniforms> = self
            .drawables
            .iter()
            .map(|drawable| {
                let mut uniforms = drawable.uniforms;
                uniforms.set_transform(compose(view, drawable.model, &self.projection));
                uniforms
            })
            .collect();
        for (index, uniforms) in staged.iter().enumerate() {
            self.backend
                .write_uniforms(index, uniforms)
                .inspect_err(|err| debug!("uniform write for drawable {index} failed: {err}"))?;
        }
        for (drawable, uniforms) in self.drawables.iter_mut().zip(staged) {
            drawable.uniforms = uniforms;
        }
        Ok(())
    }

    fn write_all_uniforms(&mut self) -> Result<(), FrameError> {
        for (index, drawable) in self.drawables.iter().enumerate() {
            self.backend.write_uniforms(index, &drawable.uniforms)?;
        }
        Ok(())
    }

    /// Returns `Ok(false)` when the target has no area to draw into.
    fn draw(&mut self) -> Result<bool, FrameError> {
        let (width, height) = self.backend.target_size();
        if width == 0 || height == 0 {
            debug!("target has zero area; nothing to draw");
            return Ok(false);
        }
        let plan = self.plan();
        self.backend.submit(&plan)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RecordingBackend;
    use glam::{Vec2, Vec3};

    fn config(layout: ViewportLayout) -> ViewerConfig {
        ViewerConfig {
            layout,
            ..ViewerConfig::default()
        }
    }

    fn orchestrator(layout: ViewportLayout) -> FrameOrchestrator<RecordingBackend> {
        let backend = RecordingBackend::new(1200, 800, 2);
        FrameOrchestrator::new(backend, &config(layout)).unwrap()
    }

    fn millis(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    #[test]
    fn gate_records_baseline_then_fires_after_interval() {
        let mut gate = UpdateGate::new(millis(100));
        assert!(!gate.poll(millis(0)));
        assert!(!gate.poll(millis(100)));
        assert!(gate.poll(millis(101)));
        assert!(!gate.poll(millis(150)));
        assert!(gate.poll(millis(202)));
    }

    #[test]
    fn split_rects_cover_target_without_overlap() {
        for (width, height) in [(1200, 800), (801, 600)] {
            let rects = ViewportLayout::Split.rects(width, height);
            assert_eq!(rects.len(), 2);
            assert_eq!(rects[0].x, 0);
            assert_eq!(rects[1].x, rects[0].width);
            assert_eq!(rects[0].width + rects[1].width, width);
            assert!(rects.iter().all(|r| r.y == 0 && r.height == height));
            let total: u64 = rects.iter().map(ViewportRect::area).sum();
            assert_eq!(total, width as u64 * height as u64);
            for px in [0, width / 2 - 1, width / 2, width - 1] {
                let hits = rects.iter().filter(|r| r.contains(px, height / 2)).count();
                assert_eq!(hits, 1, "pixel {px} covered {hits} times");
            }
        }
        let even = ViewportLayout::Split.rects(1200, 800);
        assert_eq!(even[0], ViewportRect::new(0, 0, 600, 800));
        assert_eq!(even[1], ViewportRect::new(600, 0, 600, 800));
    }

    #[test]
    fn rect_at_the_edge_of_u32_range_does_not_overflow() {
        let rect = ViewportRect::new(u32::MAX - 1, u32::MAX - 1, 10, 10);
        assert!(rect.contains(u32::MAX, u32::MAX));
        assert!(!rect.contains(0, u32::MAX));
        assert!(!rect.contains(u32::MAX, 3));
    }

    #[test]
    fn single_layout_uses_full_target() {
        assert_eq!(
            ViewportLayout::Single.rects(640, 480),
            vec![ViewportRect::new(0, 0, 640, 480)]
        );
    }

    #[test]
    fn split_plan_draws_each_drawable_in_its_half() {
        let orchestrator = orchestrator(ViewportLayout::Split);
        let plan = orchestrator.plan();
        assert_eq!(plan.clear_color, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(plan.clear_depth, 1.0);
        assert_eq!(plan.draws.len(), 2);
        assert_eq!(plan.draws[0].drawable, 0);
        assert_eq!(plan.draws[1].drawable, 1);
        assert!(plan.draws.iter().all(|draw| draw.index_count == 36));
        assert_eq!(plan.draws[1].viewport, ViewportRect::new(600, 0, 600, 800));
    }

    #[test]
    fn gated_updates_over_250ms() {
        let mut orchestrator = orchestrator(ViewportLayout::Split);
        let mut input = InputState::new();
        let primed = orchestrator.backend().uniform_writes();

        let stats = orchestrator
            .run(&mut input, (0..=25).map(|step| millis(step * 10)))
            .unwrap();

        assert_eq!(stats.ticks, 26);
        assert_eq!(stats.updates, 2);
        assert_eq!(stats.submitted, 26);
        assert_eq!(stats.skipped, 0);
        assert_eq!(orchestrator.backend().frames().len(), 26);
        // Two drawables rewritten per update, nothing between updates.
        assert_eq!(orchestrator.backend().uniform_writes(), primed + 4);
    }

    #[test]
    fn drag_rotates_camera_only_on_update() {
        let mut orchestrator = orchestrator(ViewportLayout::Single);
        let mut input = InputState::new();
        let initial = orchestrator.camera().view();

        orchestrator.tick(millis(0), &mut input).unwrap();
        input.press(Vec2::new(600.0, 400.0));
        input.move_to(Vec2::new(700.0, 420.0));

        let report = orchestrator.tick(millis(50), &mut input).unwrap();
        assert!(!report.updated && report.submitted);
        assert_eq!(orchestrator.camera().view(), initial);

        let report = orchestrator.tick(millis(120), &mut input).unwrap();
        assert!(report.updated);
        assert_ne!(orchestrator.camera().view(), initial);
        assert_eq!(
            input.drag(),
            Some((Vec2::new(700.0, 420.0), Vec2::new(700.0, 420.0)))
        );

        let written = orchestrator.backend().uniforms(0).unwrap();
        let expected = compose(
            orchestrator.camera().view(),
            Mat4::IDENTITY,
            &ProjectionParams::default(),
        );
        assert!(written.transform().abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn failed_uniform_write_keeps_host_transforms() {
        let mut orchestrator = orchestrator(ViewportLayout::Split);
        let mut input = InputState::new();
        let before: Vec<DrawUniforms> = orchestrator
            .drawables()
            .iter()
            .map(|drawable| *drawable.uniforms())
            .collect();

        orchestrator.tick(millis(0), &mut input).unwrap();
        input.press(Vec2::new(600.0, 400.0));
        input.move_to(Vec2::new(700.0, 420.0));
        orchestrator.backend_mut().set_drawable_limit(1);

        let report = orchestrator.tick(millis(120), &mut input).unwrap();
        assert!(report.updated && !report.submitted);
        let after: Vec<DrawUniforms> = orchestrator
            .drawables()
            .iter()
            .map(|drawable| *drawable.uniforms())
            .collect();
        assert_eq!(before, after);
        assert_eq!(orchestrator.stats().skipped, 1);
    }

    #[test]
    fn uniform_buffer_holds_written_transform() {
        let orchestrator = orchestrator(ViewportLayout::Single);
        let bytes = orchestrator.backend().buffer_contents(0).unwrap();
        let floats: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        let expected = orchestrator.drawables()[0].uniforms().transform();
        assert_eq!(&floats[..16], &expected.to_cols_array()[..]);
        assert_eq!(&floats[16..20], &[0.1, 0.9, 0.3, 1.0]);
    }

    #[test]
    fn failed_submission_skips_frame_and_continues() {
        let mut orchestrator = orchestrator(ViewportLayout::Split);
        let mut input = InputState::new();
        orchestrator
            .backend_mut()
            .fail_next_submit(FrameError::TargetUnavailable("surface lost".into()));

        let first = orchestrator.tick(millis(0), &mut input).unwrap();
        assert!(!first.submitted);
        let second = orchestrator.tick(millis(16), &mut input).unwrap();
        assert!(second.submitted);
        assert_eq!(orchestrator.stats().skipped, 1);
        assert_eq!(orchestrator.backend().frames().len(), 1);
    }

    #[test]
    fn fatal_failure_propagates() {
        let mut orchestrator = orchestrator(ViewportLayout::Single);
        let mut input = InputState::new();
        orchestrator
            .backend_mut()
            .fail_next_submit(FrameError::OutOfMemory);
        assert!(matches!(
            orchestrator.tick(millis(0), &mut input),
            Err(FrameError::OutOfMemory)
        ));
    }

    #[test]
    fn priming_fails_without_backend_resources() {
        // Two configured drawables cannot be primed on a one-drawable backend.
        let backend = RecordingBackend::new(1200, 800, 1);
        assert!(matches!(
            FrameOrchestrator::new(backend, &config(ViewportLayout::Single)),
            Err(SetupError::Precondition(_))
        ));
    }

    #[test]
    fn missing_drawable_aborts_whole_frame() {
        let backend = RecordingBackend::new(1200, 800, 2);
        let mut orchestrator =
            FrameOrchestrator::new(backend, &config(ViewportLayout::Split)).unwrap();
        orchestrator.backend_mut().set_drawable_limit(1);
        let report = orchestrator.tick(millis(0), &mut InputState::new()).unwrap();
        assert!(!report.submitted);
        assert!(orchestrator.backend().frames().is_empty());
    }

    #[test]
    fn zero_area_target_skips_drawing() {
        let mut orchestrator = orchestrator(ViewportLayout::Single);
        orchestrator.backend_mut().resize(0, 800);
        let report = orchestrator.tick(millis(0), &mut InputState::new()).unwrap();
        assert!(!report.submitted);
        assert!(orchestrator.backend().frames().is_empty());
    }

    #[test]
    fn layout_needs_enough_drawables() {
        let mut short = config(ViewportLayout::Split);
        short.drawables.truncate(1);
        let backend = RecordingBackend::new(100, 100, 2);
        assert!(FrameOrchestrator::new(backend, &short).is_err());

        let mut single = config(ViewportLayout::Single);
        single.drawables.truncate(1);
        let backend = RecordingBackend::new(100, 100, 1);
        let mut orchestrator = FrameOrchestrator::new(backend, &single).unwrap();
        orchestrator.set_layout(ViewportLayout::Split);
        assert_eq!(orchestrator.layout(), ViewportLayout::Single);
    }

    #[test]
    fn drawables_keep_their_own_model() {
        let mut cfg = config(ViewportLayout::Split);
        cfg.drawables[1].model.translation = Vec3::new(0.25, 0.0, 0.0);
        let backend = RecordingBackend::new(1200, 800, 2);
        let orchestrator = FrameOrchestrator::new(backend, &cfg).unwrap();
        let [left, right] = [0, 1].map(|i| orchestrator.drawables()[i].uniforms().transform());
        assert_ne!(left, right);
        assert_eq!(
            orchestrator.drawables()[1].model(),
            Mat4::from_translation(Vec3::new(0.25, 0.0, 0.0))
        );
    }

    #[test]
    fn layout_names_parse() {
        assert_eq!(ViewportLayout::parse("Split"), Some(ViewportLayout::Split));
        assert_eq!(ViewportLayout::parse(" single "), Some(ViewportLayout::Single));
        assert_eq!(ViewportLayout::parse("quad"), None);
        assert_eq!(ViewportLayout::Single.toggled(), ViewportLayout::Split);
    }
}
