//! Math utilities and types
//!
//! Provides the fundamental math types for the fixed-function pipeline:
//! nalgebra-backed vector/matrix aliases, matrix builders for a right-handed
//! camera looking down −Z, and the wrapping rotation angle the demo animates.

pub use nalgebra::{Matrix4, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type (homogeneous coordinates)
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Math constants
pub mod constants {
    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = std::f32::consts::PI / 180.0;

    /// Radians to degrees conversion factor
    pub const RAD_TO_DEG: f32 = 180.0 / std::f32::consts::PI;

    /// Full turn in degrees
    pub const FULL_TURN_DEG: f32 = 360.0;
}

/// Convert degrees to radians
pub fn deg_to_rad(degrees: f32) -> f32 {
    degrees * constants::DEG_TO_RAD
}

/// Convert radians to degrees
pub fn rad_to_deg(radians: f32) -> f32 {
    radians * constants::RAD_TO_DEG
}

/// Extension trait for [`Mat4`] with the builders the pipeline needs
pub trait Mat4Ext {
    /// Create a rotation matrix around the Z axis (angle in radians)
    fn rotation_z(angle: f32) -> Mat4;

    /// Create a perspective projection matrix
    ///
    /// Right-handed, camera looking down −Z, depth mapped to [0, 1].
    /// `fov_y` is the full vertical field of view in radians.
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Create a look-at view matrix for a camera at `eye` looking along
    /// `look` with the given `up` vector
    fn look_at(eye: Vec3, up: Vec3, look: Vec3) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn rotation_z(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::z_axis(), angle)
    }

    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let tan_half_fovy = (fov_y * 0.5).tan();

        let mut result = Mat4::zeros();

        result[(0, 0)] = 1.0 / (aspect * tan_half_fovy);
        result[(1, 1)] = 1.0 / tan_half_fovy;
        result[(2, 2)] = far / (near - far);
        result[(2, 3)] = (near * far) / (near - far);
        result[(3, 2)] = -1.0; // w = -z_view, perspective divide trigger

        result
    }

    fn look_at(eye: Vec3, up: Vec3, look: Vec3) -> Mat4 {
        let forward = look.normalize();
        let right = forward.cross(&up).normalize();
        let camera_up = right.cross(&forward);

        let translation = Mat4::new(
            1.0, 0.0, 0.0, -eye.x,
            0.0, 1.0, 0.0, -eye.y,
            0.0, 0.0, 1.0, -eye.z,
            0.0, 0.0, 0.0, 1.0,
        );

        let rotation = Mat4::new(
            right.x, right.y, right.z, 0.0,
            camera_up.x, camera_up.y, camera_up.z, 0.0,
            -forward.x, -forward.y, -forward.z, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );

        rotation * translation
    }
}

/// Rotation angle in degrees, kept in [0, 360)
///
/// Advancing adds `speed × delta` and handles at most one wrap per step by a
/// single subtraction, which is exact as long as one step advances less than
/// a full turn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationDeg(f32);

impl Default for RotationDeg {
    fn default() -> Self {
        Self(0.0)
    }
}

impl RotationDeg {
    /// Create a rotation at the given angle, normalized into [0, 360)
    pub fn new(degrees: f32) -> Self {
        Self(degrees.rem_euclid(constants::FULL_TURN_DEG))
    }

    /// Advance by `speed_dps × delta_seconds`, wrapping once past 360°
    pub fn advance(&mut self, speed_dps: f32, delta_seconds: f32) {
        self.0 += speed_dps * delta_seconds;
        if self.0 >= constants::FULL_TURN_DEG {
            self.0 -= constants::FULL_TURN_DEG;
        }
    }

    /// Current angle in degrees
    pub fn degrees(self) -> f32 {
        self.0
    }

    /// Current angle in radians
    pub fn radians(self) -> f32 {
        deg_to_rad(self.0)
    }
}
