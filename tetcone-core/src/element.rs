//! Element kinematics for constraint assembly.
//!
//! Elements turn current nodal coordinates into constraint rows: a
//! Jacobian block per node and a constraint violation (bias) per row.
//! Only the linear tetrahedron is supported.
//!
//! # Submodules
//!
//! - [`tet4`] - 4-node tetrahedron with 6 strain rows and 1 volume row

pub mod tet4;

pub use tet4::{ElementJacobian, RestShape, Tet4, ROWS_PER_ELEMENT, STRAIN_ROWS};

/// Jacobian nonzeros of one element row: 4 nodes × 3 DOFs.
pub const NNZ_PER_ELEMENT_ROW: usize = 12;

/// Sort the node indices of an element together with their local positions.
///
/// Returns `(node, local)` pairs in ascending node order; global sparse
/// rows must receive their columns in this order.
pub fn sorted_nodes<const N: usize>(nodes: &[usize; N]) -> [(usize, usize); N] {
    let mut pairs = [(0, 0); N];
    for (local, &node) in nodes.iter().enumerate() {
        pairs[local] = (node, local);
    }
    pairs.sort_unstable();
    pairs
}
