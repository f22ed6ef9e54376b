//! Core data types shared across the constraint engine.
//!
//! This module defines:
//! - Geometric primitives (points, vectors, rotations)
//! - The Green strain tensor and its constraint-row ordering

use nalgebra::{Matrix3, UnitQuaternion, Vector3, Vector6};

/// A point in 3D space.
pub type Point3 = Vector3<f64>;

/// A 3D vector (velocity, normal, force, etc.).
pub type Vec3 = Vector3<f64>;

/// A 3x3 matrix (shape matrices, deformation gradients).
pub type Mat3 = Matrix3<f64>;

/// Orientation of a rigid body.
pub type Rotation = UnitQuaternion<f64>;

/// Symmetric strain tensor in Voigt notation.
///
/// Components are ordered as: [ε_xx, ε_yy, ε_zz, γ_xy, γ_yz, γ_xz]
/// where γ = 2ε for engineering shear strain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrainTensor(pub Vector6<f64>);

impl StrainTensor {
    /// Green-Lagrange strain E = ½(FᵀF − I) of a deformation gradient.
    pub fn green(f: &Mat3) -> Self {
        let e = (f.transpose() * f - Mat3::identity()) * 0.5;
        Self::from_matrix(&e)
    }

    /// Build from a full symmetric 3x3 strain matrix.
    pub fn from_matrix(e: &Mat3) -> Self {
        Self(Vector6::new(
            e[(0, 0)],
            e[(1, 1)],
            e[(2, 2)],
            2.0 * e[(0, 1)],
            2.0 * e[(1, 2)],
            2.0 * e[(0, 2)],
        ))
    }

    /// Tensor components in element constraint-row order.
    ///
    /// [ε_xx, ε_yy, ε_zz, ε_yz, ε_xz, ε_xy], shear as tensor (not
    /// engineering) components, matching the rows written by the Jacobian
    /// assembler.
    pub fn row_components(&self) -> [f64; 6] {
        let e = &self.0;
        [e[0], e[1], e[2], e[4] / 2.0, e[5] / 2.0, e[3] / 2.0]
    }
}
