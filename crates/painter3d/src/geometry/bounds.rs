//! Bounding volumes and the view frustum
//!
//! Conservative spatial tests used for visibility culling: axis-aligned
//! boxes, bounding spheres, planes, and Gribb-Hartmann frustum extraction
//! from a view-projection matrix. The tests may report a marginally
//! off-screen volume as visible, but never cull a visible one.

use crate::foundation::math::{Mat4, Vec3, Vec4};

/// Axis-Aligned Bounding Box for spatial queries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl Aabb {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with given extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Compute the AABB enclosing a set of points
    ///
    /// Returns a degenerate box at the origin for an empty set.
    pub fn from_points<'a, I>(points: I) -> Self
    where
        I: IntoIterator<Item = &'a Vec3>,
    {
        let mut iter = points.into_iter();
        let Some(first) = iter.next() else {
            return Self::new(Vec3::zeros(), Vec3::zeros());
        };

        let mut min = *first;
        let mut max = *first;
        for p in iter {
            min = min.inf(p);
            max = max.sup(p);
        }
        Self { min, max }
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the AABB
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Check if this AABB contains a point
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x
            && point.y >= self.min.y && point.y <= self.max.y
            && point.z >= self.min.z && point.z <= self.max.z
    }

    /// Check if this AABB intersects another AABB
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x
            && self.min.y <= other.max.y && self.max.y >= other.min.y
            && self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Transform the AABB by a matrix, returning the enclosing world AABB
    ///
    /// Transforms all eight corners and re-boxes them, so the result stays
    /// axis-aligned (and conservative) under rotation.
    pub fn transformed(&self, matrix: &Mat4) -> Aabb {
        let corners = [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ];

        let transformed = corners.map(|c| {
            let v = matrix * Vec4::new(c.x, c.y, c.z, 1.0);
            Vec3::new(v.x, v.y, v.z)
        });

        Aabb::from_points(transformed.iter())
    }
}

/// Bounding sphere for cheap visibility and distance tests
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    /// Sphere center
    pub center: Vec3,
    /// Sphere radius
    pub radius: f32,
}

impl BoundingSphere {
    /// Create a new bounding sphere
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Sphere enclosing the given AABB
    pub fn from_aabb(aabb: &Aabb) -> Self {
        Self {
            center: aabb.center(),
            radius: aabb.extents().magnitude(),
        }
    }

    /// Transform the sphere by a matrix
    ///
    /// The radius is scaled by the largest axis scale so the result stays
    /// conservative under non-uniform scaling.
    pub fn transformed(&self, matrix: &Mat4) -> BoundingSphere {
        let c = matrix * Vec4::new(self.center.x, self.center.y, self.center.z, 1.0);

        let scale_x = Vec3::new(matrix.m11, matrix.m21, matrix.m31).magnitude();
        let scale_y = Vec3::new(matrix.m12, matrix.m22, matrix.m32).magnitude();
        let scale_z = Vec3::new(matrix.m13, matrix.m23, matrix.m33).magnitude();
        let max_scale = scale_x.max(scale_y).max(scale_z);

        BoundingSphere {
            center: Vec3::new(c.x, c.y, c.z),
            radius: self.radius * max_scale,
        }
    }
}

/// Plane defined by normal and distance from origin
///
/// Points with `normal . p + distance >= 0` are on the inside halfspace.
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    /// Normal vector (normalized)
    pub normal: Vec3,
    /// Distance from origin along the normal
    pub distance: f32,
}

impl Plane {
    /// Create a new plane from normal and distance, normalizing both
    pub fn new(normal: Vec3, distance: f32) -> Self {
        let len = normal.magnitude();
        if len > f32::EPSILON {
            Self {
                normal: normal / len,
                distance: distance / len,
            }
        } else {
            // Degenerate plane that rejects nothing
            Self {
                normal: Vec3::zeros(),
                distance: 0.0,
            }
        }
    }

    /// Calculate signed distance from plane to point
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(&point) + self.distance
    }
}

/// Frustum for visibility culling
#[derive(Debug, Clone)]
pub struct Frustum {
    /// Six planes defining the frustum (left, right, bottom, top, near, far)
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract frustum planes from a view-projection matrix
    ///
    /// Gribb-Hartmann extraction: each clip plane is a sum or difference of
    /// the fourth matrix row with one of the others. Works for perspective
    /// and orthographic projections alike.
    pub fn from_matrix(vp: &Mat4) -> Self {
        let row = |i: usize| Vec4::new(vp[(i, 0)], vp[(i, 1)], vp[(i, 2)], vp[(i, 3)]);

        let r0 = row(0);
        let r1 = row(1);
        let r2 = row(2);
        let r3 = row(3);

        let plane = |v: Vec4| Plane::new(Vec3::new(v.x, v.y, v.z), v.w);

        Self {
            planes: [
                plane(r3 + r0), // left
                plane(r3 - r0), // right
                plane(r3 + r1), // bottom
                plane(r3 - r1), // top
                plane(r3 + r2), // near
                plane(r3 - r2), // far
            ],
        }
    }

    /// Check if a bounding sphere is inside or intersects the frustum
    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        for plane in &self.planes {
            if plane.distance_to_point(sphere.center) < -sphere.radius {
                return false;
            }
        }
        true
    }

    /// Check if an AABB is inside or intersects the frustum
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        for plane in &self.planes {
            // Pick the AABB corner furthest along the plane normal; if even
            // that corner is outside, the whole box is outside.
            let mut p = aabb.min;
            if plane.normal.x >= 0.0 {
                p.x = aabb.max.x;
            }
            if plane.normal.y >= 0.0 {
                p.y = aabb.max.y;
            }
            if plane.normal.z >= 0.0 {
                p.z = aabb.max.z;
            }

            if plane.distance_to_point(p) < 0.0 {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{utils, Mat4Ext};

    fn test_frustum() -> Frustum {
        // Camera at origin looking down -Z
        let proj = Mat4::perspective(utils::deg_to_rad(90.0), 1.0, 0.1, 100.0);
        Frustum::from_matrix(&proj)
    }

    #[test]
    fn test_aabb_contains_point() {
        let aabb = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));

        assert!(aabb.contains_point(Vec3::zeros()));
        assert!(aabb.contains_point(Vec3::new(0.5, 0.5, 0.5)));
        assert!(!aabb.contains_point(Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn test_aabb_intersects() {
        let aabb1 = Aabb::new(Vec3::zeros(), Vec3::new(2.0, 2.0, 2.0));
        let aabb2 = Aabb::new(Vec3::new(1.0, 1.0, 1.0), Vec3::new(3.0, 3.0, 3.0));
        let aabb3 = Aabb::new(Vec3::new(5.0, 5.0, 5.0), Vec3::new(7.0, 7.0, 7.0));

        assert!(aabb1.intersects(&aabb2));
        assert!(!aabb1.intersects(&aabb3));
    }

    #[test]
    fn test_aabb_transformed_stays_enclosing() {
        let aabb = Aabb::from_center_extents(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0));
        let rotation = Mat4::from_axis_angle(&Vec3::y_axis(), std::f32::consts::FRAC_PI_4);

        let world = aabb.transformed(&rotation);

        // A unit cube rotated 45 degrees needs sqrt(2) extents on X/Z
        assert!(world.max.x > 1.0);
        assert!(world.max.z > 1.0);
        assert!(world.contains_point(Vec3::new(1.0, 1.0, 0.0).normalize() * 1.2));
    }

    #[test]
    fn test_frustum_sphere_visibility() {
        let frustum = test_frustum();

        let in_front = BoundingSphere::new(Vec3::new(0.0, 0.0, -10.0), 1.0);
        let behind = BoundingSphere::new(Vec3::new(0.0, 0.0, 10.0), 1.0);
        let far_left = BoundingSphere::new(Vec3::new(-100.0, 0.0, -10.0), 1.0);

        assert!(frustum.intersects_sphere(&in_front));
        assert!(!frustum.intersects_sphere(&behind));
        assert!(!frustum.intersects_sphere(&far_left));
    }

    #[test]
    fn test_frustum_does_not_cull_straddling_sphere() {
        let frustum = test_frustum();

        // Center outside the left plane, but the sphere pokes into view
        let straddling = BoundingSphere::new(Vec3::new(-10.5, 0.0, -10.0), 1.0);
        assert!(frustum.intersects_sphere(&straddling));
    }

    #[test]
    fn test_frustum_aabb_visibility() {
        let frustum = test_frustum();

        let visible = Aabb::from_center_extents(Vec3::new(0.0, 0.0, -5.0), Vec3::new(1.0, 1.0, 1.0));
        let behind = Aabb::from_center_extents(Vec3::new(0.0, 0.0, 5.0), Vec3::new(1.0, 1.0, 1.0));

        assert!(frustum.intersects_aabb(&visible));
        assert!(!frustum.intersects_aabb(&behind));
    }
}
