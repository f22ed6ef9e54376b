//! Read-only view of the rigid bodies the mesh interacts with.
//!
//! Rigid-body dynamics are owned by the caller. The engine only reads body
//! poses to build contact and attachment Jacobians; rigid velocities live in
//! the shared generalized velocity vector at `rigid_offset + 6 * body`
//! (3 linear components in world frame, then 3 angular components in the
//! body frame).

use crate::types::{Mat3, Point3, Rotation, Vec3};

/// Pose of one rigid body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidBodyState {
    /// Center of mass in world coordinates.
    pub position: Point3,
    /// Orientation (body to world).
    pub rotation: Rotation,
}

impl RigidBodyState {
    /// Create a body pose.
    pub fn new(position: Point3, rotation: Rotation) -> Self {
        Self { position, rotation }
    }

    /// Body at `position` with identity orientation.
    pub fn at(position: Point3) -> Self {
        Self::new(position, Rotation::identity())
    }

    /// Rotation matrix A (body to world).
    pub fn rotation_matrix(&self) -> Mat3 {
        self.rotation.to_rotation_matrix().into_inner()
    }

    /// Express a world point in the body frame.
    pub fn to_local(&self, world: &Point3) -> Vec3 {
        self.rotation.inverse_transform_vector(&(world - self.position))
    }

    /// Express a body-frame point in world coordinates.
    pub fn to_world(&self, local: &Vec3) -> Point3 {
        self.position + self.rotation * local
    }
}

impl Default for RigidBodyState {
    fn default() -> Self {
        Self::at(Point3::zeros())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_local_world_round_trip() {
        let body = RigidBodyState::new(
            Point3::new(1.0, 2.0, 3.0),
            Rotation::from_euler_angles(0.2, 0.5, -0.3),
        );
        let p = Point3::new(-0.4, 0.7, 2.2);
        let back = body.to_world(&body.to_local(&p));
        assert_relative_eq!((back - p).norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_matrix_matches_quaternion() {
        let body = RigidBodyState::new(Point3::zeros(), Rotation::from_euler_angles(0.0, 0.0, 0.5));
        let v = Vec3::new(1.0, 0.0, 0.0);
        let a = body.rotation_matrix();
        assert_relative_eq!((a * v - body.rotation * v).norm(), 0.0, epsilon = 1e-14);
    }
}
