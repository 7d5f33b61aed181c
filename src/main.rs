use std::env;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use log::info;
use winit::event_loop::EventLoop;

use orbit_viewer::app::{
    headless_timestamps, print_summary, ViewerApp, WindowInitError, WINDOW_SIZE,
};
use orbit_viewer::{
    FrameOrchestrator, InputState, RecordingBackend, ShaderSet, ViewerConfig, ViewportLayout,
};

const USAGE: &str = "Usage: orbit-viewer [--config FILE] [--split] [--headless FRAMES] \
[--vertex-shader FILE --fragment-shader FILE]";

/// Frames simulated when the window cannot be created.
const FALLBACK_FRAMES: u32 = 60;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;

    let mut config = match &options.config {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    };
    if options.split {
        config.layout = ViewportLayout::Split;
        config.validate()?;
    }

    let shaders = match (&options.vertex_shader, &options.fragment_shader) {
        (Some(vertex), Some(fragment)) => ShaderSet::from_spirv_files(vertex, fragment)
            .context("failed to load SPIR-V shaders")?,
        _ => ShaderSet::builtin(),
    };

    match options.headless {
        Some(frames) => run_headless(&config, frames),
        None => match run_interactive(config.clone(), shaders) {
            Ok(()) => Ok(()),
            Err(err) if err.downcast_ref::<WindowInitError>().is_some() => {
                eprintln!(
                    "{err}. Falling back to --headless {FALLBACK_FRAMES} (set DISPLAY or WAYLAND_DISPLAY to open a window)."
                );
                run_headless(&config, FALLBACK_FRAMES)
            }
            Err(err) => Err(err),
        },
    }
}

fn run_headless(config: &ViewerConfig, frames: u32) -> Result<()> {
    let backend = RecordingBackend::new(WINDOW_SIZE.0, WINDOW_SIZE.1, config.drawables.len());
    let mut orchestrator =
        FrameOrchestrator::new(backend, config).context("failed to prepare drawables")?;
    info!(
        "simulating {frames} frame(s) with {:?} layout",
        orchestrator.layout()
    );
    let mut input = InputState::new();
    let stats = orchestrator.run(&mut input, headless_timestamps(frames))?;
    print_summary(frames, &stats, orchestrator.camera());
    Ok(())
}

fn run_interactive(config: ViewerConfig, shaders: ShaderSet) -> Result<()> {
    // Some platforms panic instead of returning an error without a display.
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;
    let mut app = ViewerApp::new(config, shaders);
    event_loop
        .run_app(&mut app)
        .context("event loop terminated abnormally")?;
    app.finish()
}

#[derive(Debug, Default, PartialEq)]
struct CliOptions {
    config: Option<PathBuf>,
    split: bool,
    headless: Option<u32>,
    vertex_shader: Option<PathBuf>,
    fragment_shader: Option<PathBuf>,
}

impl CliOptions {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut options = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .ok_or_else(|| anyhow!("{flag} needs a value. {USAGE}"))
            };
            match arg.as_str() {
                "--config" => options.config = Some(PathBuf::from(value("--config")?)),
                "--split" => options.split = true,
                "--headless" => {
                    let frames = value("--headless")?;
                    let frames = frames
                        .parse::<u32>()
                        .map_err(|err| anyhow!("invalid frame count {frames:?}: {err}"))?;
                    options.headless = Some(frames);
                }
                "--vertex-shader" => {
                    options.vertex_shader = Some(PathBuf::from(value("--vertex-shader")?))
                }
                "--fragment-shader" => {
                    options.fragment_shader = Some(PathBuf::from(value("--fragment-shader")?))
                }
                "-h" | "--help" => bail!("{USAGE}"),
                other => bail!("Unknown argument: {other}. {USAGE}"),
            }
        }
        if options.vertex_shader.is_some() != options.fragment_shader.is_some() {
            bail!("--vertex-shader and --fragment-shader must be given together. {USAGE}");
        }
        Ok(options)
    }
}
