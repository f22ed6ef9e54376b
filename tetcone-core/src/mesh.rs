//! Tetrahedral mesh storage.
//!
//! Stores nodal state (position, velocity, lumped mass) and element
//! connectivity. Nodes are created at load time and never removed during a
//! run; the integrator mutates their positions and velocities every step.

use crate::error::{Error, Result};
use crate::types::{Point3, Vec3};

/// Tetrahedral mesh with per-node dynamic state.
#[derive(Debug, Clone, Default)]
pub struct TetMesh {
    /// Nodal positions.
    positions: Vec<Point3>,
    /// Nodal velocities.
    velocities: Vec<Vec3>,
    /// Lumped nodal masses (filled by initialization).
    masses: Vec<f64>,
    /// Element connectivity, 4 node indices per tetrahedron.
    elements: Vec<[usize; 4]>,
}

impl TetMesh {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add multiple nodes at once.
    ///
    /// Velocities are matched to positions by index; missing velocities are
    /// zero and surplus ones are ignored.
    pub fn add_nodes(&mut self, positions: &[Point3], velocities: &[Vec3]) {
        let first = self.positions.len();
        self.positions.extend_from_slice(positions);
        self.velocities.extend(
            (0..positions.len()).map(|i| velocities.get(i).copied().unwrap_or_else(Vec3::zeros)),
        );
        self.masses.resize(first + positions.len(), 0.0);
    }

    /// Add a tetrahedron to the mesh.
    pub fn add_element(&mut self, nodes: [usize; 4]) -> Result<usize> {
        if let Some(&node) = nodes.iter().find(|&&n| n >= self.positions.len()) {
            return Err(Error::Topology(format!(
                "element {:?} references node {} (mesh has {} nodes)",
                nodes,
                node,
                self.positions.len()
            )));
        }

        let sorted = crate::element::sorted_nodes(&nodes);
        if let Some(pair) = sorted.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(Error::Topology(format!(
                "element {:?} repeats node {}",
                nodes, pair[0].0
            )));
        }

        let idx = self.elements.len();
        self.elements.push(nodes);
        Ok(idx)
    }

    /// Add several tetrahedra, stopping at the first invalid one.
    pub fn add_elements(&mut self, elements: &[[usize; 4]]) -> Result<()> {
        for &nodes in elements {
            self.add_element(nodes)?;
        }
        Ok(())
    }

    /// Number of nodes in the mesh.
    pub fn n_nodes(&self) -> usize {
        self.positions.len()
    }

    /// Number of elements in the mesh.
    pub fn n_elements(&self) -> usize {
        self.elements.len()
    }

    /// Get nodal coordinates.
    pub fn positions(&self) -> &[Point3] {
        &self.positions
    }

    /// Mutable nodal coordinates.
    pub fn positions_mut(&mut self) -> &mut [Point3] {
        &mut self.positions
    }

    /// Get nodal velocities.
    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities
    }

    /// Mutable nodal velocities.
    pub fn velocities_mut(&mut self) -> &mut [Vec3] {
        &mut self.velocities
    }

    /// Get lumped nodal masses.
    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    pub(crate) fn masses_mut(&mut self) -> &mut [f64] {
        &mut self.masses
    }

    /// Split borrow of positions and velocities for integration.
    pub(crate) fn state_mut(&mut self) -> (&mut [Point3], &mut [Vec3]) {
        (&mut self.positions, &mut self.velocities)
    }

    /// Get element connectivity.
    pub fn elements(&self) -> &[[usize; 4]] {
        &self.elements
    }

    /// Current coordinates of an element's nodes.
    pub fn element_coords(&self, elem_idx: usize) -> Option<[Point3; 4]> {
        let elem = self.elements.get(elem_idx)?;
        Some(elem.map(|i| self.positions[i]))
    }
}
