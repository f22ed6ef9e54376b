//! 4-node tetrahedron (Tet4) constraint kinematics.
//!
//! The Tet4 is a constant-strain element:
//! - 4 nodes at vertices, 3 DOFs per node
//! - the deformation gradient F is uniform over the element
//! - 7 constraint rows: 3 normal strains, 3 shear strains, 1 volume
//!
//! # Shape Functions
//!
//! Linear shape functions in terms of barycentric coordinates (L1, L2, L3, L4):
//! - N_i = L_i where sum(L_i) = 1
//!
//! The spatial gradients of N_1..N_3 in the rest configuration are the rows
//! of X0⁻¹ (the inverse rest shape matrix); the gradient of N_0 is minus
//! their sum. All constraint Jacobians are built from these four directions.

use crate::error::{Error, Result};
use crate::types::{Mat3, Point3, StrainTensor, Vec3};

/// Number of constraint rows per element.
pub const ROWS_PER_ELEMENT: usize = 7;

/// Number of strain (non-volumetric) rows per element.
pub const STRAIN_ROWS: usize = 6;

/// Rest-state data computed once at initialization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestShape {
    /// Inverse of the rest shape matrix X0.
    pub inverse: Mat3,
    /// Signed rest volume (positive for a valid element).
    pub volume: f64,
}

impl RestShape {
    /// Compute the rest data of element `element` from its rest coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Topology`] for degenerate or inverted elements.
    pub fn new(element: usize, coords: &[Point3; 4]) -> Result<Self> {
        let ds = Tet4::shape_matrix(coords);
        let volume = ds.determinant() / 6.0;

        if volume <= 0.0 {
            return Err(Error::Topology(format!(
                "element {} has non-positive rest volume {:e}",
                element, volume
            )));
        }

        let inverse = ds.try_inverse().ok_or_else(|| {
            Error::Topology(format!("element {} has a singular shape matrix", element))
        })?;

        Ok(Self { inverse, volume })
    }
}

/// Constraint Jacobian of one element, per row and local node.
///
/// `rows[r][a]` is the 3-vector block of row `r` for local node `a`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementJacobian {
    pub rows: [[Vec3; 4]; ROWS_PER_ELEMENT],
}

/// 4-node tetrahedral element.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tet4;

impl Tet4 {
    /// Local node triples of the four faces. Face `f` is opposite node `f`.
    pub const FACES: [[usize; 3]; 4] = [[1, 2, 3], [0, 2, 3], [0, 1, 3], [0, 1, 2]];

    /// Shape matrix with edge vectors x1−x0, x2−x0, x3−x0 as columns.
    pub fn shape_matrix(coords: &[Point3; 4]) -> Mat3 {
        Mat3::from_columns(&[
            coords[1] - coords[0],
            coords[2] - coords[0],
            coords[3] - coords[0],
        ])
    }

    /// Per-node shape function gradients in the rest configuration.
    ///
    /// The four directions always sum to zero.
    pub fn gradient_directions(rest_inverse: &Mat3) -> [Vec3; 4] {
        let y1 = rest_inverse.row(0).transpose();
        let y2 = rest_inverse.row(1).transpose();
        let y3 = rest_inverse.row(2).transpose();
        [-y1 - y2 - y3, y1, y2, y3]
    }

    /// Deformation gradient F = Ds · X0⁻¹.
    pub fn deformation_gradient(coords: &[Point3; 4], rest: &RestShape) -> Mat3 {
        Self::shape_matrix(coords) * rest.inverse
    }

    /// Gradient of the element volume with respect to each node.
    fn volume_gradients(ds: &Mat3) -> [Vec3; 4] {
        let c1 = ds.column(0).into_owned();
        let c2 = ds.column(1).into_owned();
        let c3 = ds.column(2).into_owned();

        let r1 = c2.cross(&c3) / 6.0;
        let r2 = c3.cross(&c1) / 6.0;
        let r3 = c1.cross(&c2) / 6.0;
        [-r1 - r2 - r3, r1, r2, r3]
    }

    /// Symmetric coupling matrix used by the shear rows.
    ///
    /// Row 0 pairs y and z (ε_yz), row 1 pairs x and z (ε_xz), row 2 pairs
    /// x and y (ε_xy).
    fn shear_coupling(y: &Vec3) -> Mat3 {
        Mat3::new(
            0.0, y.z, y.y,
            y.z, 0.0, y.x,
            y.y, y.x, 0.0,
        )
    }

    /// Constraint Jacobian from the current nodal coordinates.
    ///
    /// Strain rows are scaled by 2·√V (current volume) so that small
    /// elements are not drowned out by large ones in the solver.
    pub fn jacobian(coords: &[Point3; 4], rest: &RestShape) -> ElementJacobian {
        let ds = Self::shape_matrix(coords);
        let volume = (ds.determinant() / 6.0).abs();
        let cf = 2.0 * volume.sqrt();

        let f = ds * rest.inverse;
        let ft = f.transpose();
        let y = Self::gradient_directions(&rest.inverse);

        let mut rows = [[Vec3::zeros(); 4]; ROWS_PER_ELEMENT];
        for a in 0..4 {
            let normal = Mat3::from_diagonal(&y[a]) * ft * cf;
            let shear = Self::shear_coupling(&y[a]) * ft * (0.5 * cf);
            for k in 0..3 {
                rows[k][a] = normal.row(k).transpose();
                rows[3 + k][a] = shear.row(k).transpose();
            }
        }
        rows[STRAIN_ROWS] = Self::volume_gradients(&ds);

        ElementJacobian { rows }
    }

    /// Constraint violation of the element: Green strain in row order, then
    /// det(F) − 1.
    pub fn residual(coords: &[Point3; 4], rest: &RestShape) -> [f64; ROWS_PER_ELEMENT] {
        let f = Self::deformation_gradient(coords, rest);
        let strain = StrainTensor::green(&f).row_components();

        let mut out = [0.0; ROWS_PER_ELEMENT];
        out[..STRAIN_ROWS].copy_from_slice(&strain);
        out[STRAIN_ROWS] = f.determinant() - 1.0;
        out
    }

    /// Unsigned volume of an element.
    pub fn volume(coords: &[Point3; 4]) -> f64 {
        Self::shape_matrix(coords).determinant().abs() / 6.0
    }
}
