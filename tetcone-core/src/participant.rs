//! Participants of a constraint row.
//!
//! A Jacobian row touches a handful of participants: rigid bodies (6 DOFs)
//! and mesh nodes (3 DOFs). Each is described by a [`JacobianBlock`] that
//! knows where its columns start and how many it owns, so the sparsity pass
//! and the value pass walk exactly the same description of a row.

use crate::error::Result;
use crate::layout::{DofOffsets, NODE_DOFS, RIGID_DOFS};
use crate::sparse::AssemblyTarget;
use crate::types::Vec3;

/// Contribution of one participant to one constraint row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JacobianBlock {
    /// Rigid body: linear part in world frame, angular part in body frame.
    Rigid {
        body: usize,
        linear: Vec3,
        angular: Vec3,
    },
    /// Mesh node translation.
    Node { node: usize, direction: Vec3 },
}

impl JacobianBlock {
    /// Number of DOFs this participant owns.
    pub fn dof_count(&self) -> usize {
        match self {
            JacobianBlock::Rigid { .. } => RIGID_DOFS,
            JacobianBlock::Node { .. } => NODE_DOFS,
        }
    }

    /// First global column of this participant.
    pub fn first_column(&self, offsets: &DofOffsets) -> usize {
        match *self {
            JacobianBlock::Rigid { body, .. } => offsets.rigid_column(body),
            JacobianBlock::Node { node, .. } => offsets.node_column(node),
        }
    }

    /// Block values in column order.
    fn value(&self, k: usize) -> f64 {
        match self {
            JacobianBlock::Rigid {
                linear, angular, ..
            } => {
                if k < 3 {
                    linear[k]
                } else {
                    angular[k - 3]
                }
            }
            JacobianBlock::Node { direction, .. } => direction[k],
        }
    }

    /// Declare this block's columns in `row` with zero placeholders.
    pub fn declare<T: AssemblyTarget + ?Sized>(
        &self,
        target: &mut T,
        row: usize,
        offsets: &DofOffsets,
    ) -> Result<()> {
        let col = self.first_column(offsets);
        for k in 0..self.dof_count() {
            target.append(row, col + k, 0.0)?;
        }
        Ok(())
    }

    /// Write this block's values into the already declared `row`.
    pub fn write<T: AssemblyTarget + ?Sized>(
        &self,
        target: &mut T,
        row: usize,
        offsets: &DofOffsets,
    ) -> Result<()> {
        let col = self.first_column(offsets);
        for k in 0..self.dof_count() {
            target.set(row, col + k, self.value(k))?;
        }
        Ok(())
    }
}

/// Declare a full row: every block in ascending column order, then finalize.
pub fn declare_row<T: AssemblyTarget + ?Sized>(
    target: &mut T,
    row: usize,
    blocks: &[JacobianBlock],
    offsets: &DofOffsets,
) -> Result<()> {
    let mut ordered: Vec<&JacobianBlock> = blocks.iter().collect();
    ordered.sort_by_key(|b| b.first_column(offsets));
    for block in ordered {
        block.declare(target, row, offsets)?;
    }
    target.finalize(row)
}

/// Write the values of every block of a declared row.
pub fn write_row<T: AssemblyTarget + ?Sized>(
    target: &mut T,
    row: usize,
    blocks: &[JacobianBlock],
    offsets: &DofOffsets,
) -> Result<()> {
    for block in blocks {
        block.write(target, row, offsets)?;
    }
    Ok(())
}
