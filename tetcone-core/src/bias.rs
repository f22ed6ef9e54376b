//! Constraint bias (`b`) and compliance (`E`) vectors.

use crate::element::{Tet4, ROWS_PER_ELEMENT, STRAIN_ROWS};
use crate::engine::TetConstraintSystem;
use crate::error::Result;
use crate::rigid::RigidBodyState;
use rayon::prelude::*;
use tracing::debug;

impl TetConstraintSystem {
    /// Write the stabilization bias of every engine row into `b`.
    ///
    /// - element rows: Green strain components, then `det F − 1`
    /// - contact normal rows: `max(depth / h, −recovery_speed)`, tangents 0
    /// - bilateral rows: node drift from its anchor in the body frame
    pub fn build_b(&self, b: &mut [f64], bodies: &[RigidBodyState]) -> Result<()> {
        let layout = self.require_layout()?;
        layout.check_len(b.len(), "bias vector")?;

        b[layout.element_rows()]
            .par_chunks_mut(ROWS_PER_ELEMENT)
            .enumerate()
            .for_each(|(e, rows)| {
                rows.copy_from_slice(&Tet4::residual(&self.element_coords(e), &self.rest[e]));
            });

        let h = self.config.step_size;
        let cap = self.config.contact_recovery_speed;
        let (normals, tangents) = b[layout.contact_rows()].split_at_mut(layout.n_contacts);
        normals
            .par_iter_mut()
            .zip(self.contacts.par_iter())
            .for_each(|(bn, contact)| *bn = (contact.depth / h).max(-cap));
        tangents.fill(0.0);

        let positions = self.mesh.positions();
        for (i, link) in self.bilaterals.iter().enumerate() {
            let body = self.body(bodies, link.body)?;
            let drift = link.violation(&positions[link.node], body);
            for k in 0..3 {
                b[layout.bilateral_row(i, k)] = drift[k];
            }
        }

        let max_strain = b[layout.element_rows()]
            .iter()
            .fold(0.0_f64, |m, v| m.max(v.abs()));
        debug!(max_strain, contacts = layout.n_contacts, "assembled bias");
        Ok(())
    }

    /// Write the compliance of every engine row into `e`.
    ///
    /// Strain rows get the inverse stiffness of the mesh material; volume,
    /// contact and bilateral rows are rigid (zero compliance).
    pub fn build_e(&self, e: &mut [f64]) -> Result<()> {
        let layout = self.require_layout()?;
        layout.check_len(e.len(), "compliance vector")?;

        let strain = self.config.material.strain_compliance()?;
        e[layout.element_rows()]
            .par_chunks_mut(ROWS_PER_ELEMENT)
            .for_each(|rows| {
                rows[..STRAIN_ROWS].copy_from_slice(strain.as_slice());
                rows[STRAIN_ROWS] = 0.0;
            });
        e[layout.contact_rows()].fill(0.0);
        e[layout.bilateral_rows()].fill(0.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::engine::tests::{contact_on_face, single_tet, two_tets};
    use crate::error::Error;
    use crate::layout::DofOffsets;
    use crate::rigid::RigidBodyState;
    use crate::types::{Point3, Rotation, Vec3};
    use approx::assert_relative_eq;

    #[test]
    fn test_rest_bias_is_zero() {
        let mut system = two_tets(EngineConfig::default());
        system.setup(3, DofOffsets::new(0, 0), 0).unwrap();
        let mut b = vec![1.0; 17];
        system.build_b(&mut b, &[]).unwrap();
        assert_eq!(&b[..3], &[1.0; 3]);
        for &v in &b[3..] {
            assert_relative_eq!(v, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_stretched_element_bias() {
        let mut system = single_tet(EngineConfig::default());
        system.setup(0, DofOffsets::new(0, 0), 0).unwrap();
        system.mesh_mut().positions_mut()[1] = Point3::new(1.1, 0.0, 0.0);

        let mut b = vec![0.0; 7];
        system.build_b(&mut b, &[]).unwrap();
        assert_relative_eq!(b[0], 0.105, epsilon = 1e-12);
        assert_relative_eq!(b[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(b[6], 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_contact_bias_capped() {
        let mut system = two_tets(EngineConfig::default());
        let mut shallow = contact_on_face(1, 0);
        shallow.depth = -0.003;
        let mut deep = shallow;
        deep.depth = -0.5;
        let mut separated = shallow;
        separated.depth = 0.02;
        system.set_contacts(vec![shallow, deep, separated]).unwrap();
        system.setup(0, DofOffsets::new(0, 6), 1).unwrap();

        let mut b = vec![9.0; system.num_constraints()];
        system.build_b(&mut b, &[RigidBodyState::default()]).unwrap();
        let layout = system.layout().unwrap();

        // h = 0.01, cap 0.6
        assert_relative_eq!(b[layout.contact_normal_row(0)], -0.3, epsilon = 1e-12);
        assert_relative_eq!(b[layout.contact_normal_row(1)], -0.6, epsilon = 1e-12);
        assert_relative_eq!(b[layout.contact_normal_row(2)], 2.0, epsilon = 1e-12);
        for i in 0..3 {
            let (u, v) = layout.contact_tangent_rows(i);
            assert_eq!(b[u], 0.0);
            assert_eq!(b[v], 0.0);
        }
    }

    #[test]
    fn test_bilateral_bias_tracks_drift() {
        let mut system = single_tet(EngineConfig::default());
        let body = RigidBodyState::new(
            Point3::new(0.0, 2.0, 0.0),
            Rotation::from_axis_angle(&Vec3::z_axis(), 0.3),
        );
        system.add_bilateral(3, 0, &body).unwrap();
        system.setup(0, DofOffsets::new(0, 6), 1).unwrap();

        let mut b = vec![0.0; 10];
        system.build_b(&mut b, &[body]).unwrap();
        for v in &b[7..] {
            assert_relative_eq!(*v, 0.0, epsilon = 1e-12);
        }

        // Move the node 0.1 along world x; the drift is seen in the body frame.
        system.mesh_mut().positions_mut()[3] += Vec3::new(0.1, 0.0, 0.0);
        system.build_b(&mut b, &[body]).unwrap();
        let expected = body.rotation.inverse_transform_vector(&Vec3::new(0.1, 0.0, 0.0));
        for k in 0..3 {
            assert_relative_eq!(b[7 + k], expected[k], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_compliance() {
        let mut system = two_tets(EngineConfig::default());
        system.set_contacts(vec![contact_on_face(1, 0)]).unwrap();
        system.setup(0, DofOffsets::new(0, 6), 1).unwrap();

        let mut e = vec![7.0; system.num_constraints()];
        system.build_e(&mut e).unwrap();

        let material = &system.config().material;
        let g = material.shear_modulus();
        for elem in 0..2 {
            let rows = &e[elem * 7..elem * 7 + 7];
            for &c in &rows[..3] {
                assert_relative_eq!(c, 1.0 / material.youngs_modulus, max_relative = 1e-10);
            }
            for &c in &rows[3..6] {
                assert_relative_eq!(c, 1.0 / g, max_relative = 1e-10);
            }
            assert_eq!(rows[6], 0.0);
        }
        assert!(e[14..].iter().all(|&c| c == 0.0));
    }

    #[test]
    fn test_short_vector_rejected() {
        let mut system = single_tet(EngineConfig::default());
        system.setup(0, DofOffsets::new(0, 0), 0).unwrap();
        let mut b = vec![0.0; 6];
        assert!(matches!(system.build_b(&mut b, &[]), Err(Error::Layout(_))));
        assert!(matches!(system.build_e(&mut b), Err(Error::Layout(_))));
    }
}
