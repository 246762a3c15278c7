//! Math utilities and types
//!
//! Provides the fundamental math types used throughout the pipeline. The
//! conventions are right-handed with Y up; cameras look down -Z and clip
//! space is OpenGL-style with depth in [-1, 1], which suits a software
//! rasterizer backend.

pub use nalgebra::{
    Matrix3, Matrix4,
    Quaternion,
    Unit,
    Vector2, Vector3, Vector4,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 2D point type
pub type Point2 = nalgebra::Point2<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Smallest scale magnitude preserved by matrix decomposition.
///
/// Axes with smaller magnitude are treated as degenerate and clamped so
/// decomposing a singular matrix never yields NaN.
pub const MIN_DECOMPOSE_SCALE: f32 = 1.0e-6;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a transform with position and rotation
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Convert to a transformation matrix (translation * rotation * scale)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Decompose a transformation matrix into position, rotation, and scale
    ///
    /// Scale is recovered from the column magnitudes of the upper 3x3 block
    /// and the rotation from the scale-normalized block. Degenerate (near
    /// zero) scale axes are clamped to [`MIN_DECOMPOSE_SCALE`] so a singular
    /// input never produces NaN components.
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let position = Vec3::new(matrix.m14, matrix.m24, matrix.m34);

        let scale_x = Vec3::new(matrix.m11, matrix.m21, matrix.m31)
            .magnitude()
            .max(MIN_DECOMPOSE_SCALE);
        let scale_y = Vec3::new(matrix.m12, matrix.m22, matrix.m32)
            .magnitude()
            .max(MIN_DECOMPOSE_SCALE);
        let scale_z = Vec3::new(matrix.m13, matrix.m23, matrix.m33)
            .magnitude()
            .max(MIN_DECOMPOSE_SCALE);
        let scale = Vec3::new(scale_x, scale_y, scale_z);

        let rotation_matrix = Matrix3::new(
            matrix.m11 / scale_x, matrix.m12 / scale_y, matrix.m13 / scale_z,
            matrix.m21 / scale_x, matrix.m22 / scale_y, matrix.m23 / scale_z,
            matrix.m31 / scale_x, matrix.m32 / scale_y, matrix.m33 / scale_z,
        );
        let rotation = Quat::from_matrix(&rotation_matrix);

        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Apply this transform to a point
    pub fn transform_point(&self, point: Point3) -> Point3 {
        self.to_matrix().transform_point(&point)
    }

    /// Apply this transform to a vector (rotation and scale only)
    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.to_matrix().transform_vector(&vector)
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Radians to degrees conversion factor
    pub const RAD_TO_DEG: f32 = 180.0 / PI;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians * constants::RAD_TO_DEG
    }

    /// Linear interpolation
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }
}

/// Extension trait for Mat4 with projection and view constructors
pub trait Mat4Ext {
    /// Create a symmetric-frustum perspective projection matrix
    ///
    /// `fov_y` is the vertical field of view in radians. Maps view-space
    /// depth to clip depth in [-1, 1], looking down -Z.
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Create an orthographic projection matrix from half extents
    ///
    /// `half_width`/`half_height` are the world-space half sizes of the
    /// visible volume. Depth maps to [-1, 1], looking down -Z.
    fn orthographic(half_width: f32, half_height: f32, near: f32, far: f32) -> Mat4;

    /// Create a right-handed look-at view matrix (Y up)
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let t = (fov_y * 0.5).tan();
        let r = t * aspect;

        Mat4::new(
            1.0 / r, 0.0, 0.0, 0.0,
            0.0, 1.0 / t, 0.0, 0.0,
            0.0, 0.0, -(far + near) / (far - near), -(2.0 * far * near) / (far - near),
            0.0, 0.0, -1.0, 0.0,
        )
    }

    fn orthographic(half_width: f32, half_height: f32, near: f32, far: f32) -> Mat4 {
        Mat4::new(
            1.0 / half_width, 0.0, 0.0, 0.0,
            0.0, 1.0 / half_height, 0.0, 0.0,
            0.0, 0.0, -2.0 / (far - near), -(far + near) / (far - near),
            0.0, 0.0, 0.0, 1.0,
        )
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        let forward = (target - eye).normalize();
        let right = forward.cross(&up).normalize();
        let camera_up = right.cross(&forward);

        let rotation = Mat4::new(
            right.x, right.y, right.z, 0.0,
            camera_up.x, camera_up.y, camera_up.z, 0.0,
            -forward.x, -forward.y, -forward.z, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );

        let translation = Mat4::new_translation(&-eye);

        rotation * translation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transform_matrix_round_trip() {
        let transform = Transform {
            position: Vec3::new(1.0, -2.0, 3.0),
            rotation: Quat::from_axis_angle(&Vec3::y_axis(), 0.7),
            scale: Vec3::new(2.0, 2.0, 2.0),
        };

        let recovered = Transform::from_matrix(&transform.to_matrix());

        assert_relative_eq!(recovered.position, transform.position, epsilon = 1e-5);
        assert_relative_eq!(recovered.scale, transform.scale, epsilon = 1e-5);
        assert_relative_eq!(
            recovered.rotation.to_homogeneous(),
            transform.rotation.to_homogeneous(),
            epsilon = 1e-4
        );
    }

    #[test]
    fn test_from_matrix_singular_has_no_nan() {
        // Zero scale on X collapses the first column entirely
        let transform = Transform {
            position: Vec3::new(5.0, 0.0, 0.0),
            rotation: Quat::identity(),
            scale: Vec3::new(0.0, 1.0, 1.0),
        };

        let recovered = Transform::from_matrix(&transform.to_matrix());

        assert!(recovered.position.iter().all(|v| v.is_finite()));
        assert!(recovered.scale.iter().all(|v| v.is_finite()));
        assert!(recovered.rotation.as_vector().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_perspective_maps_near_and_far_planes() {
        let proj = Mat4::perspective(utils::deg_to_rad(60.0), 1.0, 0.1, 100.0);

        let near_point = proj * Vec4::new(0.0, 0.0, -0.1, 1.0);
        let far_point = proj * Vec4::new(0.0, 0.0, -100.0, 1.0);

        assert_relative_eq!(near_point.z / near_point.w, -1.0, epsilon = 1e-4);
        assert_relative_eq!(far_point.z / far_point.w, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_look_at_moves_eye_to_origin() {
        let eye = Vec3::new(3.0, 4.0, 5.0);
        let view = Mat4::look_at(eye, Vec3::zeros(), Vec3::y());

        let transformed = view * Vec4::new(eye.x, eye.y, eye.z, 1.0);
        assert_relative_eq!(transformed.xyz(), Vec3::zeros(), epsilon = 1e-5);
    }
}
