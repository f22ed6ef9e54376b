//! Constraint records between the mesh and rigid bodies.
//!
//! - [`RigidContact`]: unilateral frictional contact between a rigid body and
//!   a boundary face of the mesh, regenerated by collision detection every
//!   step.
//! - [`BilateralConstraint`]: a mesh node welded to a point fixed in a rigid
//!   body, persistent until removed.

use crate::rigid::RigidBodyState;
use crate::surface::sorted_face;
use crate::types::{Point3, Vec3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A contact between a rigid body and a boundary face of the mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RigidContact {
    /// Rigid body id.
    pub body: usize,
    /// Owning tetrahedron (must be a boundary element).
    pub element: usize,
    /// Local face number (0-3) of the contacted face.
    pub face: usize,
    /// Barycentric weights of the contact point over the face's nodes in
    /// ascending node order.
    pub weights: [f64; 3],
    /// Contact normal, pointing from the rigid body toward the mesh.
    pub normal: Vec3,
    /// Contact point on the rigid body surface (world).
    pub point: Point3,
    /// Signed separation, negative when penetrating.
    pub depth: f64,
    /// Friction coefficient of the rigid body's surface.
    pub friction: f64,
    /// Cohesion of the rigid body's surface.
    pub cohesion: f64,
}

impl RigidContact {
    /// Nodes of the contacted face in ascending order, matching `weights`.
    pub fn face_nodes(&self, tet: &[usize; 4]) -> [usize; 3] {
        sorted_face(self.face, tet)
    }

    /// Lever arm from the body's center of mass to the contact point.
    pub fn lever_arm(&self, body: &RigidBodyState) -> Vec3 {
        self.point - body.position
    }
}

/// Orthonormal frame at a contact: normal plus two tangents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactFrame {
    pub normal: Vec3,
    pub u: Vec3,
    pub v: Vec3,
}

impl ContactFrame {
    /// Threshold below which the up axis is considered parallel to the normal.
    const SINGULAR: f64 = 1e-4;

    /// Build a right-handed frame around a contact normal.
    ///
    /// The second tangent is `n × ŷ`, or `n × x̂` when the normal is nearly
    /// vertical; the first tangent completes the frame.
    pub fn from_normal(normal: &Vec3) -> Self {
        let n = normal.normalize();
        let mut v = n.cross(&Vec3::y());
        if v.norm() < Self::SINGULAR {
            v = n.cross(&Vec3::x());
        }
        let v = v.normalize();
        let u = v.cross(&n);
        Self { normal: n, u, v }
    }

    /// Directions of the three contact rows: normal, u, v.
    pub fn directions(&self) -> [Vec3; 3] {
        [self.normal, self.u, self.v]
    }
}

/// A mesh node welded to a point of a rigid body.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BilateralConstraint {
    /// Rigid body id.
    pub body: usize,
    /// Mesh node id.
    pub node: usize,
    /// Attachment point in the body frame.
    pub anchor: Vec3,
}

impl BilateralConstraint {
    /// Attach a node at its current position to a body at its current pose.
    pub fn attach(
        body_id: usize,
        node: usize,
        node_position: &Point3,
        body: &RigidBodyState,
    ) -> Self {
        Self {
            body: body_id,
            node,
            anchor: body.to_local(node_position),
        }
    }

    /// Drift of the node from its anchor, in the body frame.
    pub fn violation(&self, node_position: &Point3, body: &RigidBodyState) -> Vec3 {
        body.rotation
            .inverse_transform_vector(&(node_position - body.to_world(&self.anchor)))
    }
}
