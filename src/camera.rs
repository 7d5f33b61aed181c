use glam::{Mat3, Mat4, Quat, Vec3};

/// Increments smaller than this are treated as pointer noise.
const MIN_DELTA_LENGTH: f32 = 1e-6;

/// Camera orbiting a fixed pivot at a constant distance.
///
/// The orientation is the inverse of the view rotation and is kept at unit
/// length after every mutation. The radius is fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitCamera {
    orientation: Quat,
    pivot: Vec3,
    radius: f32,
}

impl OrbitCamera {
    /// Creates a camera whose first [`view`](Self::view) equals
    /// `look_at_rh(eye, target, up)`.
    ///
    /// If `eye == target` or `up` is parallel to the viewing direction the
    /// orientation falls back to identity.
    pub fn new(eye: Vec3, target: Vec3, up: Vec3) -> Self {
        let radius = eye.distance(target);
        let forward = target - eye;
        let degenerate =
            radius <= f32::EPSILON || forward.cross(up).length_squared() <= f32::EPSILON;
        let orientation = if degenerate {
            log::debug!("degenerate orbit camera basis; using identity orientation");
            Quat::IDENTITY
        } else {
            let view = Mat4::look_at_rh(eye, target, up);
            Quat::from_mat3(&Mat3::from_mat4(view)).conjugate().normalize()
        };
        Self {
            orientation,
            pivot: target,
            radius,
        }
    }

    /// Restores a camera from raw state. Negative radii are clamped to zero.
    pub fn from_state(orientation: Quat, pivot: Vec3, radius: f32) -> Self {
        let orientation = if orientation.length_squared() > 0.0 {
            orientation.normalize()
        } else {
            Quat::IDENTITY
        };
        Self {
            orientation,
            pivot,
            radius: radius.max(0.0),
        }
    }

    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    pub fn pivot(&self) -> Vec3 {
        self.pivot
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// World-space position of the eye.
    pub fn eye(&self) -> Vec3 {
        self.pivot + self.orientation * Vec3::new(0.0, 0.0, self.radius)
    }

    /// Applies the incremental arcball rotation between two pointer samples.
    ///
    /// Both arguments are pointer positions in arcball space (roughly
    /// `[-0.5, 0.5]` per axis, `z == 0` to derive depth from the sphere).
    pub fn rotate(&mut self, current: Vec3, previous: Vec3) {
        if current == previous {
            return;
        }
        let delta = arcball(current) * invert(arcball(previous));
        if delta.length() < MIN_DELTA_LENGTH {
            return;
        }
        self.orientation = (self.orientation * delta).normalize();
    }

    pub fn view(&self) -> Mat4 {
        let rotation = self.orientation.conjugate();
        let translation = Vec3::new(0.0, 0.0, -self.radius);
        Mat4::from_rotation_translation(rotation, translation) * Mat4::from_translation(-self.pivot)
    }
}

/// Lifts a 2D pointer sample onto the unit sphere as a pure quaternion.
fn arcball(delta: Vec3) -> Quat {
    let s = (delta.x * delta.x + delta.y * delta.y).min(1.0);
    let z = if delta.z != 0.0 {
        delta.z
    } else {
        (1.0 - s).sqrt()
    };
    Quat::from_xyzw(-delta.x, delta.y, z, 0.0)
}

/// General quaternion inverse; zero maps to zero.
fn invert(q: Quat) -> Quat {
    let dot = q.length_squared();
    if dot == 0.0 {
        return Quat::from_xyzw(0.0, 0.0, 0.0, 0.0);
    }
    q.conjugate() * (1.0 / dot)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn default_camera() -> OrbitCamera {
        OrbitCamera::new(Vec3::new(0.0, 0.0, 3.5), Vec3::ZERO, Vec3::Y)
    }

    #[test]
    fn identity_state_matches_look_at() {
        let camera = OrbitCamera::from_state(Quat::IDENTITY, Vec3::ZERO, 3.5);
        let expected = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 3.5), Vec3::ZERO, Vec3::Y);
        assert!(camera.view().abs_diff_eq(expected, EPS));
    }

    #[test]
    fn construction_reproduces_look_at() {
        let eye = Vec3::new(2.0, 1.5, -3.0);
        let target = Vec3::new(0.5, -0.25, 1.0);
        let camera = OrbitCamera::new(eye, target, Vec3::Y);
        let expected = Mat4::look_at_rh(eye, target, Vec3::Y);
        assert!(camera.view().abs_diff_eq(expected, EPS));
        assert!((camera.radius() - eye.distance(target)).abs() < EPS);
        assert!(camera.eye().abs_diff_eq(eye, 1e-4));
    }

    #[test]
    fn equal_samples_do_not_rotate() {
        let mut camera = default_camera();
        let before = camera.orientation();
        let sample = Vec3::new(0.2, -0.1, 0.0);
        camera.rotate(sample, sample);
        assert_eq!(camera.orientation(), before);
    }

    #[test]
    fn vanishing_delta_is_ignored() {
        let mut camera = default_camera();
        let before = camera.orientation();
        camera.rotate(Vec3::new(1e-9, 0.0, 1e-9), Vec3::new(0.1, 0.1, 0.0));
        assert_eq!(camera.orientation(), before);
    }

    #[test]
    fn drag_changes_view() {
        let mut camera = default_camera();
        let before = camera.view();
        camera.rotate(Vec3::new(0.1, 0.0, 0.0), Vec3::ZERO);
        assert!(!camera.view().abs_diff_eq(before, 1e-3));
        assert!(camera.orientation().is_normalized());
        assert!((camera.eye().length() - 3.5).abs() < 1e-4);
    }

    #[test]
    fn zero_net_drag_restores_view() {
        let mut camera = default_camera();
        let before = camera.view();
        let path = [
            Vec3::ZERO,
            Vec3::new(0.1, 0.05, 0.0),
            Vec3::new(0.3, -0.2, 0.0),
            Vec3::new(-0.15, 0.25, 0.0),
        ];
        for pair in path.windows(2) {
            camera.rotate(pair[1], pair[0]);
        }
        for pair in path.windows(2).rev() {
            camera.rotate(pair[0], pair[1]);
        }
        assert!(camera.view().abs_diff_eq(before, EPS));
    }

    #[test]
    fn orientation_stays_unit_length() {
        let mut camera = default_camera();
        let mut previous = Vec3::ZERO;
        for step in 1..200 {
            let t = step as f32 * 0.07;
            let current = Vec3::new(t.sin() * 0.4, t.cos() * 0.3, 0.0);
            camera.rotate(current, previous);
            previous = current;
            assert!((camera.orientation().length() - 1.0).abs() < 1e-5);
        }
        assert_eq!(camera.radius(), 3.5);
    }

    #[test]
    fn arcball_clamps_outside_unit_disk() {
        let lifted = arcball(Vec3::new(3.0, 4.0, 0.0));
        assert_eq!(lifted, Quat::from_xyzw(-3.0, 4.0, 0.0, 0.0));
        let explicit = arcball(Vec3::new(0.0, 0.0, 0.25));
        assert_eq!(explicit.z, 0.25);
    }

    #[test]
    fn invert_handles_non_unit_quaternions() {
        let q = Quat::from_xyzw(-3.0, 4.0, 0.0, 0.0);
        let product = q * invert(q);
        assert!(product.abs_diff_eq(Quat::IDENTITY, EPS));
        assert_eq!(invert(Quat::from_xyzw(0.0, 0.0, 0.0, 0.0)).length(), 0.0);
    }

    #[test]
    fn degenerate_basis_falls_back_to_identity() {
        let camera = OrbitCamera::new(Vec3::ZERO, Vec3::ZERO, Vec3::Y);
        assert_eq!(camera.orientation(), Quat::IDENTITY);
        assert_eq!(camera.radius(), 0.0);

        let camera = OrbitCamera::new(Vec3::new(0.0, 2.0, 0.0), Vec3::ZERO, Vec3::Y);
        assert_eq!(camera.orientation(), Quat::IDENTITY);
    }

    #[test]
    fn negative_radius_is_clamped() {
        let camera = OrbitCamera::from_state(Quat::IDENTITY, Vec3::ZERO, -2.0);
        assert_eq!(camera.radius(), 0.0);
    }
}
