//! Viewer configuration and its XML representation.
//!
//! ```xml
//! <viewer>
//!     <layout>split</layout>
//!     <update-interval-ms>100</update-interval-ms>
//!     <projection>
//!         <aspect>1.5</aspect>
//!         <fovy>45</fovy>
//!         <znear>0.1</znear>
//!         <zfar>1000</zfar>
//!     </projection>
//!     <camera>
//!         <eye>0 0 3.5</eye>
//!         <target>0 0 0</target>
//!         <up>0 1 0</up>
//!     </camera>
//!     <drawable>
//!         <primary>0.1 0.9 0.3 1</primary>
//!         <accent>0.8 0.2 0.8 1</accent>
//!         <position>0 0 0</position>
//!         <rotation>0 45 0</rotation>
//!         <scale>1 1 1</scale>
//!     </drawable>
//! </viewer>
//! ```
//!
//! Every element is optional. When any `<drawable>` is present the list
//! replaces the defaults entirely.

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use glam::{Vec3, Vec4};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::frame::{ViewportLayout, DEFAULT_UPDATE_INTERVAL};
use crate::transform::{ModelTransform, ProjectionParams};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default)]
    pub layout: ViewportLayout,
    #[serde(default = "default_update_interval")]
    pub update_interval: Duration,
    #[serde(default)]
    pub projection: ProjectionParams,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default = "default_drawables")]
    pub drawables: Vec<DrawableConfig>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            layout: ViewportLayout::default(),
            update_interval: default_update_interval(),
            projection: ProjectionParams::default(),
            camera: CameraConfig::default(),
            drawables: default_drawables(),
        }
    }
}

/// Initial eye placement; the orbit pivot is `target`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 3.5),
            target: Vec3::ZERO,
            up: Vec3::Y,
        }
    }
}

/// Per-drawable tints and placement. Tints are uploaded once at setup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawableConfig {
    pub primary: Vec4,
    pub accent: Vec4,
    #[serde(default)]
    pub model: ModelTransform,
}

const PRIMARY_TINT: Vec4 = Vec4::new(0.1, 0.9, 0.3, 1.0);
const ACCENT_TINT: Vec4 = Vec4::new(0.8, 0.2, 0.8, 1.0);

fn default_update_interval() -> Duration {
    DEFAULT_UPDATE_INTERVAL
}

fn default_drawables() -> Vec<DrawableConfig> {
    vec![
        DrawableConfig {
            primary: PRIMARY_TINT,
            accent: ACCENT_TINT,
            model: ModelTransform::default(),
        },
        DrawableConfig {
            primary: ACCENT_TINT,
            accent: PRIMARY_TINT,
            model: ModelTransform::default(),
        },
    ]
}

impl ViewerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let xml = std::fs::read_to_string(path)
            .with_context(|| format!("unable to read config {}", path.display()))?;
        Self::from_xml(&xml).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Parses a `<viewer>` document, filling gaps with defaults.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid config XML")?;
        let root = document.root_element();
        if !root.has_tag_name("viewer") {
            bail!("expected <viewer> root, found <{}>", root.tag_name().name());
        }

        let mut config = Self::default();

        if let Some(layout) = optional_text(&root, "layout") {
            config.layout = ViewportLayout::parse(&layout)
                .ok_or_else(|| anyhow!("unknown layout {layout:?}"))?;
        }
        if let Some(interval) = optional_text(&root, "update-interval-ms") {
            let millis = interval
                .parse::<u64>()
                .map_err(|err| anyhow!("failed to parse update interval: {err}"))?;
            config.update_interval = Duration::from_millis(millis);
        }

        if let Some(node) = child(&root, "projection") {
            let projection = &mut config.projection;
            projection.aspect = parse_f32(optional_text(&node, "aspect"), projection.aspect)?;
            projection.fovy = parse_f32(optional_text(&node, "fovy"), projection.fovy)?;
            projection.znear = parse_f32(optional_text(&node, "znear"), projection.znear)?;
            projection.zfar = parse_f32(optional_text(&node, "zfar"), projection.zfar)?;
        }

        if let Some(node) = child(&root, "camera") {
            let camera = &mut config.camera;
            camera.eye = parse_vec3(optional_text(&node, "eye"), camera.eye)?;
            camera.target = parse_vec3(optional_text(&node, "target"), camera.target)?;
            camera.up = parse_vec3(optional_text(&node, "up"), camera.up)?;
        }

        let drawables = root
            .children()
            .filter(|node| node.has_tag_name("drawable"))
            .enumerate()
            .map(|(index, node)| {
                let fallback = default_drawables()[index % 2];
                parse_drawable(&node, fallback)
                    .with_context(|| format!("invalid <drawable> #{}", index + 1))
            })
            .collect::<Result<Vec<_>>>()?;
        if !drawables.is_empty() {
            config.drawables = drawables;
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would make setup or projection meaningless.
    pub fn validate(&self) -> Result<()> {
        let projection = &self.projection;
        let scalars = [
            projection.aspect,
            projection.fovy,
            projection.znear,
            projection.zfar,
        ];
        if !scalars.iter().all(|value| value.is_finite()) {
            bail!("projection values must be finite, got {projection:?}");
        }
        if !(projection.fovy > 0.0 && projection.fovy < 180.0) {
            bail!("fovy must be within (0, 180) degrees, got {}", projection.fovy);
        }
        if !(projection.aspect > 0.0) {
            bail!("aspect must be positive, got {}", projection.aspect);
        }
        if !(projection.znear > 0.0 && projection.znear < projection.zfar) {
            bail!(
                "clip distances must satisfy 0 < znear < zfar, got {} and {}",
                projection.znear,
                projection.zfar
            );
        }
        if self.update_interval.is_zero() {
            bail!("update interval must be non-zero");
        }
        let camera = &self.camera;
        if !(camera.eye.is_finite() && camera.target.is_finite() && camera.up.is_finite()) {
            bail!("camera vectors must be finite, got {camera:?}");
        }
        if camera.eye.distance(camera.target) <= f32::EPSILON {
            bail!("camera eye and target must differ");
        }
        if (camera.target - camera.eye).cross(camera.up).length_squared() <= f32::EPSILON {
            bail!(
                "camera up {} is parallel to the view direction from {} to {}",
                camera.up,
                camera.eye,
                camera.target
            );
        }
        let needed = self.layout.drawable_count();
        if self.drawables.len() < needed {
            bail!(
                "{:?} layout needs {needed} drawable(s), {} configured",
                self.layout,
                self.drawables.len()
            );
        }
        Ok(())
    }
}

fn parse_drawable(node: &Node<'_, '_>, fallback: DrawableConfig) -> Result<DrawableConfig> {
    let model = ModelTransform {
        translation: parse_vec3(optional_text(node, "position"), fallback.model.translation)?,
        rotation: parse_vec3(optional_text(node, "rotation"), fallback.model.rotation)?,
        scale: parse_vec3(optional_text(node, "scale"), fallback.model.scale)?,
    };
    Ok(DrawableConfig {
        primary: parse_vec4(optional_text(node, "primary"), fallback.primary)?,
        accent: parse_vec4(optional_text(node, "accent"), fallback.accent)?,
        model,
    })
}

fn child<'a, 'input>(node: &Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|child| child.has_tag_name(tag))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_components(value: &str, expected: usize, what: &str) -> Result<Vec<f32>> {
    let numbers = value
        .split_whitespace()
        .map(|component| {
            component
                .parse::<f32>()
                .map_err(|err| anyhow!("{what} component {component:?}: {err}"))
        })
        .collect::<Result<Vec<_>>>()?;
    if numbers.len() != expected {
        bail!(
            "{what} needs {expected} components, found {}",
            numbers.len()
        );
    }
    Ok(numbers)
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    let numbers = parse_components(&value, 3, "vector")?;
    Ok(Vec3::from_slice(&numbers))
}

fn parse_vec4(value: Option<String>, default: Vec4) -> Result<Vec4> {
    let Some(value) = value else {
        return Ok(default);
    };
    let numbers = parse_components(&value, 4, "color")?;
    Ok(Vec4::from_slice(&numbers))
}

fn parse_f32(value: Option<String>, default: f32) -> Result<f32> {
    match value {
        Some(value) => value
            .parse::<f32>()
            .map_err(|err| anyhow!("failed to parse float: {err}")),
        None => Ok(default),
    }
}
