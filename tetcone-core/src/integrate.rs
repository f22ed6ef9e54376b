//! Exchange of nodal state with the global system and time integration.
//!
//! Node `i` occupies columns `node_offset + 3i .. node_offset + 3i + 3` of
//! the generalized velocity and force vectors and of the mass matrix.

use crate::engine::TetConstraintSystem;
use crate::error::{Error, Result};
use crate::layout::NODE_DOFS;
use crate::sparse::AssemblyTarget;
use tracing::warn;

impl TetConstraintSystem {
    fn check_node_span(&self, len: usize, offset: usize, what: &str) -> Result<()> {
        let end = offset + NODE_DOFS * self.mesh.n_nodes();
        if len < end {
            return Err(Error::Layout(format!(
                "{} has {} entries, nodes need columns up to {}",
                what, len, end
            )));
        }
        Ok(())
    }

    /// Write node velocities into `v` and gravity impulses `h·m·g` into `hf`.
    pub fn update(&self, v: &mut [f64], hf: &mut [f64]) -> Result<()> {
        let offset = self.require_offsets()?.node;
        self.check_node_span(v.len(), offset, "velocity vector")?;
        self.check_node_span(hf.len(), offset, "force vector")?;

        let h_gravity = self.config.gravity * self.config.step_size;
        let nodes = self.mesh.velocities().iter().zip(self.mesh.masses());
        for (i, (vel, &mass)) in nodes.enumerate() {
            let col = offset + NODE_DOFS * i;
            v[col..col + 3].copy_from_slice(vel.as_slice());
            hf[col..col + 3].copy_from_slice((h_gravity * mass).as_slice());
        }
        Ok(())
    }

    /// Read solved node velocities from `v`, cap their speed and advance
    /// positions by one explicit Euler step.
    pub fn update_position(&mut self, v: &[f64]) -> Result<()> {
        let offset = self.require_offsets()?.node;
        self.check_node_span(v.len(), offset, "velocity vector")?;

        let h = self.config.step_size;
        let max_velocity = self.config.max_velocity;
        let mut clamped = 0usize;
        let (positions, velocities) = self.mesh.state_mut();

        for (i, (x, vel)) in positions.iter_mut().zip(velocities.iter_mut()).enumerate() {
            let col = offset + NODE_DOFS * i;
            vel.copy_from_slice(&v[col..col + 3]);
            let speed = vel.norm();
            if speed > max_velocity {
                *vel *= max_velocity / speed;
                clamped += 1;
            }
            *x += *vel * h;
        }

        if clamped > 0 {
            warn!(nodes = clamped, max_velocity, "clamped node velocities");
        }
        Ok(())
    }

    /// Append the lumped nodal masses as diagonal entries at
    /// `offset + 3·node + k`, finalizing each row.
    pub fn compute_mass<T: AssemblyTarget + ?Sized>(
        &self,
        target: &mut T,
        offset: usize,
    ) -> Result<()> {
        for (i, &mass) in self.mesh.masses().iter().enumerate() {
            for k in 0..NODE_DOFS {
                let row = offset + NODE_DOFS * i + k;
                target.append(row, row, mass)?;
                target.finalize(row)?;
            }
        }
        Ok(())
    }

    /// Append the inverse lumped masses as diagonal entries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Topology`] for a node that belongs to no element
    /// and therefore has no mass. The target is left untouched then.
    pub fn compute_inv_mass<T: AssemblyTarget + ?Sized>(
        &self,
        target: &mut T,
        offset: usize,
    ) -> Result<()> {
        let masses = self.mesh.masses();
        if let Some(i) = masses.iter().position(|&m| m <= 0.0) {
            return Err(Error::Topology(format!(
                "node {} has no mass, it belongs to no element",
                i
            )));
        }

        for (i, &mass) in masses.iter().enumerate() {
            let inv = 1.0 / mass;
            for k in 0..NODE_DOFS {
                let row = offset + NODE_DOFS * i + k;
                target.append(row, row, inv)?;
                target.finalize(row)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::engine::tests::single_tet;
    use crate::error::Error;
    use crate::layout::DofOffsets;
    use crate::sparse::SparseRowMatrix;
    use crate::types::{Point3, Vec3};
    use approx::assert_relative_eq;

    #[test]
    fn test_update_writes_velocity_and_gravity() {
        let mut system = single_tet(EngineConfig::default());
        system.mesh_mut().velocities_mut()[2] = Vec3::new(1.0, 2.0, 3.0);
        system.setup(0, DofOffsets::new(0, 6), 1).unwrap();

        let mut v = vec![-1.0; 18];
        let mut hf = vec![-1.0; 18];
        system.update(&mut v, &mut hf).unwrap();

        // Rigid columns untouched
        assert_eq!(&v[..6], &[-1.0; 6]);
        assert_eq!(&v[12..15], &[1.0, 2.0, 3.0]);

        let m = system.mesh().masses()[0];
        let g = system.config().gravity;
        for i in 0..4 {
            let col = 6 + 3 * i;
            assert_relative_eq!(hf[col], 0.0);
            assert_relative_eq!(hf[col + 1], 0.01 * m * g.y, epsilon = 1e-14);
            assert_relative_eq!(hf[col + 2], 0.0);
        }
    }

    #[test]
    fn test_update_position_integrates() {
        let mut system = single_tet(EngineConfig::default());
        system.setup(0, DofOffsets::new(0, 0), 0).unwrap();

        let v: Vec<f64> = [0.0, -1.0, 0.5].repeat(4);
        system.update_position(&v).unwrap();

        let expected = Point3::new(1.0, -0.01, 0.005);
        assert_relative_eq!(system.mesh().positions()[1], expected, epsilon = 1e-14);
        assert_eq!(system.mesh().velocities()[3], Vec3::new(0.0, -1.0, 0.5));
    }

    #[test]
    fn test_update_position_clamps_speed() {
        let mut system = single_tet(EngineConfig::default().max_velocity(2.0));
        system.setup(0, DofOffsets::new(0, 0), 0).unwrap();

        let mut v = vec![0.0; 12];
        v[3] = 30.0;
        v[4] = 40.0;
        system.update_position(&v).unwrap();

        let vel = system.mesh().velocities()[1];
        assert_relative_eq!(vel.norm(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(vel, Vec3::new(1.2, 1.6, 0.0), epsilon = 1e-12);
        assert_relative_eq!(system.mesh().positions()[1].x, 1.012, epsilon = 1e-12);
    }

    #[test]
    fn test_short_velocity_vector_rejected() {
        let mut system = single_tet(EngineConfig::default());
        system.setup(0, DofOffsets::new(0, 6), 1).unwrap();
        let mut v = vec![0.0; 17];
        let mut hf = vec![0.0; 18];
        assert!(matches!(system.update(&mut v, &mut hf), Err(Error::Layout(_))));
        assert!(system.update_position(&v).is_err());
    }

    #[test]
    fn test_mass_matrices() {
        let system = single_tet(EngineConfig::default());
        let m = system.mesh().masses()[0];

        let mut mass = SparseRowMatrix::new(15, 15);
        system.compute_mass(&mut mass, 3).unwrap();
        assert_eq!(mass.nnz(), 12);
        assert_eq!(mass.get(3, 3), Some(m));
        assert_eq!(mass.get(14, 14), Some(m));
        assert_eq!(mass.row(0).unwrap().0.len(), 0);

        let mut inv = SparseRowMatrix::new(12, 12);
        system.compute_inv_mass(&mut inv, 0).unwrap();
        assert_relative_eq!(inv.get(5, 5).unwrap(), 1.0 / m, epsilon = 1e-12);
    }

    #[test]
    fn test_orphan_node_has_no_inverse_mass() {
        let mut system = single_tet(EngineConfig::default());
        system.add_nodes(&[Point3::new(5.0, 5.0, 5.0)], &[]);
        system.initialize().unwrap();

        let mut inv = SparseRowMatrix::new(15, 15);
        let err = system.compute_inv_mass(&mut inv, 0).unwrap_err();
        assert!(matches!(err, Error::Topology(_)));
        assert_eq!(inv.nnz(), 0);
        assert_eq!(inv.finalized_rows(), 0);
    }
}
