//! Camera projection and picking
//!
//! A [`Camera`] holds projection parameters only; its pose comes from the
//! scene node that carries it, so the view matrix always reflects the live
//! scene graph. Every matrix here is a pure function of camera state and
//! the supplied world transform. There is no cached state to drift.
//!
//! Screen conversions use pixel coordinates with the origin at the top
//! left and Y down, the convention of 2D drawing backends.

use crate::foundation::math::{utils, Mat4, Mat4Ext, Point2, Point3, Vec3, Vec4};
use crate::geometry::Frustum;

/// Projection mode and its mode-specific parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Perspective projection with a vertical field of view in degrees
    Perspective {
        /// Vertical field of view, degrees
        fov_y_deg: f32,
    },
    /// Orthographic projection
    Orthographic {
        /// World units visible across the smaller viewport axis
        scale: f32,
    },
}

/// A world-space ray, used for picking
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Ray origin
    pub origin: Vec3,
    /// Normalized ray direction
    pub direction: Vec3,
}

impl Ray {
    /// Point at parameter `t` along the ray
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Distance from a point to the ray's supporting line
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        let to_point = point - self.origin;
        let t = to_point.dot(&self.direction);
        (to_point - self.direction * t).magnitude()
    }
}

/// Camera projection state
///
/// Switching `projection` at runtime is supported; matrices are rebuilt
/// from current state with no residual coupling to the previous mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Projection mode (perspective or orthographic)
    pub projection: Projection,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
    /// Output target dimensions in pixels (width, height)
    pub viewport: (u32, u32),
}

impl Camera {
    /// Create a perspective camera
    pub fn perspective(viewport: (u32, u32), fov_y_deg: f32, near: f32, far: f32) -> Self {
        Self {
            projection: Projection::Perspective { fov_y_deg },
            near,
            far,
            viewport,
        }
    }

    /// Create an orthographic camera
    ///
    /// `scale` is the number of world units visible across the smaller
    /// viewport axis.
    pub fn orthographic(viewport: (u32, u32), scale: f32, near: f32, far: f32) -> Self {
        Self {
            projection: Projection::Orthographic { scale },
            near,
            far,
            viewport,
        }
    }

    /// Aspect ratio (width / height) of the output target
    pub fn aspect(&self) -> f32 {
        let (w, h) = self.viewport;
        w as f32 / h as f32
    }

    /// The projection matrix for the current mode
    pub fn projection_matrix(&self) -> Mat4 {
        match self.projection {
            Projection::Perspective { fov_y_deg } => Mat4::perspective(
                utils::deg_to_rad(fov_y_deg),
                self.aspect(),
                self.near,
                self.far,
            ),
            Projection::Orthographic { scale } => {
                let aspect = self.aspect();
                let (half_width, half_height) = if aspect >= 1.0 {
                    (scale * 0.5 * aspect, scale * 0.5)
                } else {
                    (scale * 0.5, scale * 0.5 / aspect)
                };
                Mat4::orthographic(half_width, half_height, self.near, self.far)
            }
        }
    }

    /// The view matrix: inverse of the camera node's world transform
    ///
    /// Returns `None` when the world transform is singular (for example a
    /// zero scale somewhere up the camera's ancestor chain).
    pub fn view_matrix(&self, world: &Mat4) -> Option<Mat4> {
        world.try_inverse()
    }

    /// Combined view-projection matrix for the given camera world transform
    pub fn view_projection(&self, world: &Mat4) -> Option<Mat4> {
        Some(self.projection_matrix() * self.view_matrix(world)?)
    }

    /// Extract the culling frustum from a view-projection matrix
    pub fn frustum(&self, view_projection: &Mat4) -> Frustum {
        Frustum::from_matrix(view_projection)
    }

    /// Project a world-space point to pixel coordinates
    ///
    /// Returns the screen position (x right, y down, both in pixels) with
    /// the NDC depth in `z`. Returns `None` for points behind the eye or
    /// outside the frustum; out-of-view points are never silently wrapped
    /// into valid screen coordinates.
    pub fn world_to_screen(&self, view_projection: &Mat4, point: Point3) -> Option<Point3> {
        let clip = view_projection * Vec4::new(point.x, point.y, point.z, 1.0);

        // w <= 0 means at or behind the eye plane for perspective;
        // orthographic w is always 1
        if clip.w <= 0.0 {
            return None;
        }

        let ndc = Vec3::new(clip.x / clip.w, clip.y / clip.w, clip.z / clip.w);
        let bound = 1.0 + 1.0e-5;
        if ndc.x.abs() > bound || ndc.y.abs() > bound || ndc.z.abs() > bound {
            return None;
        }

        let (w, h) = self.viewport;
        Some(Point3::new(
            (ndc.x * 0.5 + 0.5) * w as f32,
            (1.0 - (ndc.y * 0.5 + 0.5)) * h as f32,
            ndc.z,
        ))
    }

    /// Build a world-space picking ray through a screen-space point
    ///
    /// The ray runs from the near plane through the far plane. Perspective
    /// rays diverge from the eye; orthographic rays are parallel to the
    /// view direction. Returns `None` when the view-projection matrix
    /// cannot be inverted.
    pub fn screen_to_world_ray(&self, view_projection: &Mat4, screen: Point2) -> Option<Ray> {
        let inverse = view_projection.try_inverse()?;

        let (w, h) = self.viewport;
        let ndc_x = (screen.x / w as f32) * 2.0 - 1.0;
        let ndc_y = 1.0 - (screen.y / h as f32) * 2.0;

        let unproject = |ndc_z: f32| -> Option<Vec3> {
            let v = inverse * Vec4::new(ndc_x, ndc_y, ndc_z, 1.0);
            if v.w.abs() <= f32::EPSILON {
                return None;
            }
            Some(Vec3::new(v.x / v.w, v.y / v.w, v.z / v.w))
        };

        let near_point = unproject(-1.0)?;
        let far_point = unproject(1.0)?;

        let span = far_point - near_point;
        let length = span.magnitude();
        if length <= f32::EPSILON {
            return None;
        }

        Some(Ray {
            origin: near_point,
            direction: span / length,
        })
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective((640, 360), 60.0, 0.1, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn perspective_camera() -> Camera {
        Camera::perspective((640, 480), 60.0, 0.1, 100.0)
    }

    #[test]
    fn test_world_to_screen_round_trip_inside_frustum() {
        let camera = perspective_camera();
        let vp = camera.view_projection(&Mat4::identity()).unwrap();

        let points = [
            Point3::new(0.0, 0.0, -5.0),
            Point3::new(1.0, -0.5, -10.0),
            Point3::new(-2.0, 1.5, -50.0),
        ];

        for point in points {
            let screen = camera.world_to_screen(&vp, point).expect("inside frustum");
            let ray = camera
                .screen_to_world_ray(&vp, Point2::new(screen.x, screen.y))
                .expect("invertible");

            // The picking ray through the projected pixel must pass through
            // the original point
            assert!(
                ray.distance_to_point(point.coords) < 1e-3,
                "ray misses {point:?}"
            );
        }
    }

    #[test]
    fn test_world_to_screen_center_of_view() {
        let camera = perspective_camera();
        let vp = camera.view_projection(&Mat4::identity()).unwrap();

        let screen = camera
            .world_to_screen(&vp, Point3::new(0.0, 0.0, -10.0))
            .unwrap();

        assert_relative_eq!(screen.x, 320.0, epsilon = 1e-3);
        assert_relative_eq!(screen.y, 240.0, epsilon = 1e-3);
    }

    #[test]
    fn test_world_to_screen_rejects_out_of_frustum() {
        let camera = perspective_camera();
        let vp = camera.view_projection(&Mat4::identity()).unwrap();

        // Behind the eye
        assert!(camera
            .world_to_screen(&vp, Point3::new(0.0, 0.0, 5.0))
            .is_none());
        // Past the far plane
        assert!(camera
            .world_to_screen(&vp, Point3::new(0.0, 0.0, -200.0))
            .is_none());
        // Far off to the side
        assert!(camera
            .world_to_screen(&vp, Point3::new(500.0, 0.0, -10.0))
            .is_none());
    }

    #[test]
    fn test_orthographic_screen_position_is_depth_invariant() {
        let camera = Camera::orthographic((640, 480), 10.0, 0.1, 100.0);
        let vp = camera.view_projection(&Mat4::identity()).unwrap();

        let near_point = camera
            .world_to_screen(&vp, Point3::new(2.0, 1.0, -5.0))
            .unwrap();
        let far_point = camera
            .world_to_screen(&vp, Point3::new(2.0, 1.0, -50.0))
            .unwrap();

        assert_relative_eq!(near_point.x, far_point.x, epsilon = 1e-4);
        assert_relative_eq!(near_point.y, far_point.y, epsilon = 1e-4);

        // Perspective does shift with depth, for contrast
        let persp = perspective_camera();
        let pvp = persp.view_projection(&Mat4::identity()).unwrap();
        let p_near = persp.world_to_screen(&pvp, Point3::new(2.0, 1.0, -5.0)).unwrap();
        let p_far = persp.world_to_screen(&pvp, Point3::new(2.0, 1.0, -50.0)).unwrap();
        assert!((p_near.x - p_far.x).abs() > 1.0);
    }

    #[test]
    fn test_orthographic_scale_maps_smaller_axis() {
        // 640x480: height is the smaller axis, so scale=10 shows 10 world
        // units vertically
        let camera = Camera::orthographic((640, 480), 10.0, 0.1, 100.0);
        let vp = camera.view_projection(&Mat4::identity()).unwrap();

        let top = camera
            .world_to_screen(&vp, Point3::new(0.0, 5.0, -10.0))
            .unwrap();
        assert_relative_eq!(top.y, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_perspective_rays_diverge_orthographic_rays_parallel() {
        let vp_persp = perspective_camera()
            .view_projection(&Mat4::identity())
            .unwrap();
        let persp = perspective_camera();
        let ray_a = persp
            .screen_to_world_ray(&vp_persp, Point2::new(0.0, 240.0))
            .unwrap();
        let ray_b = persp
            .screen_to_world_ray(&vp_persp, Point2::new(640.0, 240.0))
            .unwrap();
        assert!(ray_a.direction.dot(&ray_b.direction) < 0.999);

        let ortho = Camera::orthographic((640, 480), 10.0, 0.1, 100.0);
        let vp_ortho = ortho.view_projection(&Mat4::identity()).unwrap();
        let ray_c = ortho
            .screen_to_world_ray(&vp_ortho, Point2::new(0.0, 240.0))
            .unwrap();
        let ray_d = ortho
            .screen_to_world_ray(&vp_ortho, Point2::new(640.0, 240.0))
            .unwrap();
        assert_relative_eq!(ray_c.direction.dot(&ray_d.direction), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_projection_mode_switch_has_no_residue() {
        let mut camera = perspective_camera();
        let reference = Camera::orthographic((640, 480), 10.0, 0.1, 100.0);

        camera.projection = Projection::Orthographic { scale: 10.0 };

        assert_relative_eq!(
            camera.projection_matrix(),
            reference.projection_matrix(),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_view_matrix_tracks_world_transform() {
        let camera = perspective_camera();
        let world = Mat4::new_translation(&Vec3::new(0.0, 0.0, 5.0));
        let view = camera.view_matrix(&world).unwrap();

        // A point at the origin sits 5 units in front of this camera
        let v = view * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(v.z, -5.0, epsilon = 1e-5);
    }

    #[test]
    fn test_singular_world_transform_is_rejected() {
        let camera = perspective_camera();
        let singular = Mat4::new_nonuniform_scaling(&Vec3::new(1.0, 0.0, 1.0));

        assert!(camera.view_matrix(&singular).is_none());
    }
}
