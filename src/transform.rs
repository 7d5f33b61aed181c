//! Model-view-projection composition and the per-drawable uniform block.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Remaps GL clip space (z in [-1, 1]) to wgpu clip space (z in [0, 1]).
#[rustfmt::skip]
pub const CLIP_SPACE_ADAPTER: Mat4 = Mat4::from_cols_array(&[
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
]);

/// Perspective parameters. `fovy` is the vertical field of view in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionParams {
    #[serde(default = "default_aspect")]
    pub aspect: f32,
    #[serde(default = "default_fovy")]
    pub fovy: f32,
    #[serde(default = "default_znear")]
    pub znear: f32,
    #[serde(default = "default_zfar")]
    pub zfar: f32,
}

impl Default for ProjectionParams {
    fn default() -> Self {
        Self {
            aspect: default_aspect(),
            fovy: default_fovy(),
            znear: default_znear(),
            zfar: default_zfar(),
        }
    }
}

fn default_aspect() -> f32 {
    1.5
}

fn default_fovy() -> f32 {
    45.0
}

fn default_znear() -> f32 {
    0.1
}

fn default_zfar() -> f32 {
    1000.0
}

impl ProjectionParams {
    /// GL-style right handed perspective matrix, depth in [-1, 1].
    pub fn matrix(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fovy.to_radians(), self.aspect, self.znear, self.zfar)
    }
}

/// Builds the matrix uploaded for one drawable:
/// `CLIP_SPACE_ADAPTER * projection * view * model`.
pub fn compose(view: Mat4, model: Mat4, projection: &ProjectionParams) -> Mat4 {
    CLIP_SPACE_ADAPTER * projection.matrix() * view * model
}

/// Placement of a drawable in world space. Rotation is in degrees per axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelTransform {
    #[serde(default)]
    pub translation: Vec3,
    #[serde(default)]
    pub rotation: Vec3,
    #[serde(default = "default_scale")]
    pub scale: Vec3,
}

fn default_scale() -> Vec3 {
    Vec3::ONE
}

impl Default for ModelTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl ModelTransform {
    pub fn matrix(&self) -> Mat4 {
        let translation = Mat4::from_translation(self.translation);
        let rotation = Mat4::from_rotation_z(self.rotation.z.to_radians())
            * Mat4::from_rotation_y(self.rotation.y.to_radians())
            * Mat4::from_rotation_x(self.rotation.x.to_radians());
        let scale = Mat4::from_scale(self.scale);
        translation * rotation * scale
    }
}

/// Uniform block bound at group 0, binding 0.
///
/// The first 16 floats hold the composed transform in column-major order,
/// followed by the primary and accent RGBA tints.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DrawUniforms {
    pub transform: [[f32; 4]; 4],
    pub primary: [f32; 4],
    pub accent: [f32; 4],
}

impl DrawUniforms {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn new(transform: Mat4, primary: Vec4, accent: Vec4) -> Self {
        Self {
            transform: transform.to_cols_array_2d(),
            primary: primary.into(),
            accent: accent.into(),
        }
    }

    /// Replaces the transform, leaving the tints untouched.
    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform.to_cols_array_2d();
    }

    pub fn transform(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.transform)
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
