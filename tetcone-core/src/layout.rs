//! Partitioning of the global constraint-row and velocity-column spaces.
//!
//! The engine owns three contiguous row blocks of the caller's constraint
//! system, in this order:
//!
//! | block     | rows per item | layout inside the block                       |
//! |-----------|---------------|-----------------------------------------------|
//! | element   | 7             | 3 normal strain, 3 shear strain, 1 volume     |
//! | contact   | 3             | all normal rows first, then tangent pairs     |
//! | bilateral | 3             | x, y, z in the rigid body frame               |
//!
//! Every phase (sparsity, Jacobian, bias, compliance, projection, warm start)
//! addresses rows through the same [`ConstraintLayout`].

use crate::element::{NNZ_PER_ELEMENT_ROW, ROWS_PER_ELEMENT};
use crate::error::{Error, Result};
use std::ops::Range;

/// Rows per rigid contact (normal, tangent u, tangent v).
pub const ROWS_PER_CONTACT: usize = 3;

/// Rows per bilateral attachment.
pub const ROWS_PER_BILATERAL: usize = 3;

/// Generalized coordinates of a rigid body.
pub const RIGID_DOFS: usize = 6;

/// Generalized coordinates of a mesh node.
pub const NODE_DOFS: usize = 3;

/// Column offsets of the two kinds of participants in the velocity vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DofOffsets {
    /// Column of the first rigid body's first DOF.
    pub rigid: usize,
    /// Column of the first mesh node's first DOF.
    pub node: usize,
}

impl DofOffsets {
    /// Create column offsets.
    pub fn new(rigid: usize, node: usize) -> Self {
        Self { rigid, node }
    }

    /// First column of a rigid body.
    pub fn rigid_column(&self, body: usize) -> usize {
        self.rigid + body * RIGID_DOFS
    }

    /// First column of a mesh node.
    pub fn node_column(&self, node: usize) -> usize {
        self.node + node * NODE_DOFS
    }

    /// Check that rigid columns all precede node columns.
    ///
    /// Rows mixing both participants append the rigid block first, so any
    /// overlap would break column ordering.
    pub fn validate(&self, n_rigid: usize) -> Result<()> {
        let rigid_end = self.rigid_column(n_rigid);
        if rigid_end > self.node {
            return Err(Error::Layout(format!(
                "rigid columns [{}, {}) overlap node columns starting at {}",
                self.rigid, rigid_end, self.node
            )));
        }
        Ok(())
    }
}

/// Row ranges owned by the engine for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConstraintLayout {
    /// First element row.
    pub start_element: usize,
    /// First contact row.
    pub start_contact: usize,
    /// First bilateral row.
    pub start_bilateral: usize,
    /// Number of tetrahedra.
    pub n_elements: usize,
    /// Number of rigid contacts.
    pub n_contacts: usize,
    /// Number of bilateral attachments.
    pub n_bilaterals: usize,
}

impl ConstraintLayout {
    /// Lay out the three blocks contiguously starting at `start_row`.
    pub fn new(
        start_row: usize,
        n_elements: usize,
        n_contacts: usize,
        n_bilaterals: usize,
    ) -> Self {
        let start_element = start_row;
        let start_contact = start_element + n_elements * ROWS_PER_ELEMENT;
        let start_bilateral = start_contact + n_contacts * ROWS_PER_CONTACT;
        Self {
            start_element,
            start_contact,
            start_bilateral,
            n_elements,
            n_contacts,
            n_bilaterals,
        }
    }

    /// Element row block.
    pub fn element_rows(&self) -> Range<usize> {
        self.start_element..self.start_contact
    }

    /// Contact row block.
    pub fn contact_rows(&self) -> Range<usize> {
        self.start_contact..self.start_bilateral
    }

    /// Bilateral row block.
    pub fn bilateral_rows(&self) -> Range<usize> {
        self.start_bilateral..self.end()
    }

    /// Row `k` (0-6) of element `e`.
    pub fn element_row(&self, e: usize, k: usize) -> usize {
        debug_assert!(e < self.n_elements && k < ROWS_PER_ELEMENT);
        self.start_element + e * ROWS_PER_ELEMENT + k
    }

    /// Normal row of contact `i`.
    pub fn contact_normal_row(&self, i: usize) -> usize {
        debug_assert!(i < self.n_contacts);
        self.start_contact + i
    }

    /// Tangent rows (u, v) of contact `i`.
    pub fn contact_tangent_rows(&self, i: usize) -> (usize, usize) {
        debug_assert!(i < self.n_contacts);
        let u = self.start_contact + self.n_contacts + 2 * i;
        (u, u + 1)
    }

    /// Row `k` (0-2) of bilateral `i`.
    pub fn bilateral_row(&self, i: usize, k: usize) -> usize {
        debug_assert!(i < self.n_bilaterals && k < ROWS_PER_BILATERAL);
        self.start_bilateral + i * ROWS_PER_BILATERAL + k
    }

    /// One past the last row.
    pub fn end(&self) -> usize {
        self.start_bilateral + self.n_bilaterals * ROWS_PER_BILATERAL
    }

    /// Total number of rows owned by the engine.
    pub fn num_constraints(&self) -> usize {
        self.end() - self.start_element
    }

    /// Upper bound on Jacobian nonzeros for pre-allocation.
    pub fn num_nonzeros(&self) -> usize {
        self.n_elements * NNZ_PER_ELEMENT_ROW * ROWS_PER_ELEMENT
            + self.n_contacts * (RIGID_DOFS + 3 * NODE_DOFS) * ROWS_PER_CONTACT
            + self.n_bilaterals * (RIGID_DOFS + NODE_DOFS) * ROWS_PER_BILATERAL
    }

    /// Check that a caller-supplied vector covers every engine row.
    pub fn check_len(&self, len: usize, what: &str) -> Result<()> {
        if len < self.end() {
            return Err(Error::Layout(format!(
                "{} has {} entries, layout needs {}",
                what,
                len,
                self.end()
            )));
        }
        Ok(())
    }
}
