//! Jacobian sparsity registration and value assembly.
//!
//! Both passes describe every row through the same functions returning
//! [`JacobianBlock`]s, so the pattern declared by `generate_sparsity` and the
//! entries written by `build_d` cannot drift apart. Row order of the sparsity
//! pass is ascending over the whole engine block:
//!
//! 1. element rows, 7 per tetrahedron
//! 2. contact normal rows, one per contact
//! 3. contact tangent rows, two per contact
//! 4. bilateral rows, 3 per attachment
//!
//! Element blocks are computed in parallel; the scatter into the target is
//! sequential.

use crate::contact::{BilateralConstraint, ContactFrame, RigidContact};
use crate::element::{sorted_nodes, ElementJacobian, Tet4, ROWS_PER_ELEMENT};
use crate::engine::TetConstraintSystem;
use crate::error::{Error, Result};
use crate::layout::{ConstraintLayout, DofOffsets};
use crate::participant::{declare_row, write_row, JacobianBlock};
use crate::rigid::RigidBodyState;
use crate::sparse::AssemblyTarget;
use crate::types::{Point3, Vec3};
use rayon::prelude::*;
use tracing::{debug, info};

type ElementRows = [[JacobianBlock; 4]; ROWS_PER_ELEMENT];
type ContactRows = [[JacobianBlock; 4]; 3];
type BilateralRows = [[JacobianBlock; 2]; 3];

/// Node blocks of the seven rows of an element, in ascending node order.
fn element_blocks(tet: &[usize; 4], jac: &ElementJacobian) -> ElementRows {
    let order = sorted_nodes(tet);
    jac.rows.map(|row| {
        order.map(|(node, local)| JacobianBlock::Node {
            node,
            direction: row[local],
        })
    })
}

/// Rigid and face-node blocks of the normal, u and v rows of a contact.
fn contact_blocks(
    contact: &RigidContact,
    tet: &[usize; 4],
    body: &RigidBodyState,
) -> ContactRows {
    let frame = ContactFrame::from_normal(&contact.normal);
    let at = body.rotation_matrix().transpose();
    let lever = contact.lever_arm(body);
    let nodes = contact.face_nodes(tet);
    let w = contact.weights;

    frame.directions().map(|d| {
        [
            JacobianBlock::Rigid {
                body: contact.body,
                linear: -d,
                angular: at * d.cross(&lever),
            },
            JacobianBlock::Node {
                node: nodes[0],
                direction: d * w[0],
            },
            JacobianBlock::Node {
                node: nodes[1],
                direction: d * w[1],
            },
            JacobianBlock::Node {
                node: nodes[2],
                direction: d * w[2],
            },
        ]
    })
}

/// Rigid and node blocks of the three rows of an attachment.
fn bilateral_blocks(
    link: &BilateralConstraint,
    node_position: &Point3,
    body: &RigidBodyState,
    scale: f64,
) -> BilateralRows {
    let arw = body.rotation_matrix().transpose();
    let dir = (node_position - body.position)
        .try_normalize(f64::EPSILON)
        .unwrap_or_else(Vec3::zeros);
    let t = arw * dir;
    let jrb = arw * t.cross_matrix() * scale;
    let arw = arw * scale;

    [0, 1, 2].map(|k| {
        let row = arw.row(k).transpose();
        [
            JacobianBlock::Rigid {
                body: link.body,
                linear: -row,
                angular: jrb.row(k).transpose(),
            },
            JacobianBlock::Node {
                node: link.node,
                direction: row,
            },
        ]
    })
}

impl TetConstraintSystem {
    /// Declare the nonzero pattern of every engine row in `target`.
    ///
    /// Must complete before `build_d`, and be repeated whenever elements,
    /// contacts or attachments change.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Layout`] before `setup`, [`Error::Contact`] for a
    /// record naming an unknown rigid body, or any error of the target.
    pub fn generate_sparsity<T: AssemblyTarget + ?Sized>(&self, target: &mut T) -> Result<()> {
        let layout = self.require_layout()?;
        let offsets = self.offsets;
        let tets = self.mesh.elements();

        // Values are irrelevant here, only the participants are declared.
        let zero_jacobian = ElementJacobian {
            rows: [[Vec3::zeros(); 4]; ROWS_PER_ELEMENT],
        };
        for (e, tet) in tets.iter().enumerate() {
            for (k, blocks) in element_blocks(tet, &zero_jacobian).iter().enumerate() {
                declare_row(target, layout.element_row(e, k), blocks, &offsets)?;
            }
        }

        let rest_pose = RigidBodyState::default();
        let mut contact_rows = Vec::with_capacity(self.contacts.len());
        for contact in &self.contacts {
            self.check_body_id(contact.body)?;
            contact_rows.push(contact_blocks(contact, &tets[contact.element], &rest_pose));
        }
        Self::scatter_contacts(target, &layout, &offsets, &contact_rows, declare_row)?;

        for (i, link) in self.bilaterals.iter().enumerate() {
            self.check_body_id(link.body)?;
            let rows = bilateral_blocks(link, &Point3::zeros(), &rest_pose, 1.0);
            for (k, blocks) in rows.iter().enumerate() {
                declare_row(target, layout.bilateral_row(i, k), blocks, &offsets)?;
            }
        }

        info!(
            rows = layout.num_constraints(),
            elements = layout.n_elements,
            contacts = layout.n_contacts,
            bilaterals = layout.n_bilaterals,
            "registered jacobian sparsity"
        );
        Ok(())
    }

    /// Write the current Jacobian values into the pattern declared by
    /// `generate_sparsity`.
    ///
    /// `bodies` is the rigid body table indexed by body id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sparsity`] if the target rejects an entry (e.g. the
    /// pattern was never declared), [`Error::Layout`] before `setup`, or
    /// [`Error::Contact`] for an unknown rigid body.
    pub fn build_d<T: AssemblyTarget + ?Sized>(
        &self,
        target: &mut T,
        bodies: &[RigidBodyState],
    ) -> Result<()> {
        let layout = self.require_layout()?;
        let offsets = self.offsets;
        let tets = self.mesh.elements();

        let element_rows: Vec<ElementRows> = (0..tets.len())
            .into_par_iter()
            .map(|e| {
                let jac = Tet4::jacobian(&self.element_coords(e), &self.rest[e]);
                element_blocks(&tets[e], &jac)
            })
            .collect();

        for (e, rows) in element_rows.iter().enumerate() {
            for (k, blocks) in rows.iter().enumerate() {
                write_row(target, layout.element_row(e, k), blocks, &offsets)?;
            }
        }

        let contact_rows: Vec<ContactRows> = self
            .contacts
            .par_iter()
            .map(|contact| {
                let body = self.body(bodies, contact.body)?;
                Ok(contact_blocks(contact, &tets[contact.element], body))
            })
            .collect::<Result<_>>()?;
        Self::scatter_contacts(target, &layout, &offsets, &contact_rows, write_row)?;

        let positions = self.mesh.positions();
        let scale = self.config.bilateral_jacobian_scale;
        for (i, link) in self.bilaterals.iter().enumerate() {
            let body = self.body(bodies, link.body)?;
            let node = positions.get(link.node).ok_or_else(|| {
                Error::Contact(format!("attachment {} names missing node {}", i, link.node))
            })?;
            let rows = bilateral_blocks(link, node, body, scale);
            for (k, blocks) in rows.iter().enumerate() {
                write_row(target, layout.bilateral_row(i, k), blocks, &offsets)?;
            }
        }

        debug!(
            elements = layout.n_elements,
            contacts = layout.n_contacts,
            bilaterals = layout.n_bilaterals,
            "assembled jacobian"
        );
        Ok(())
    }

    /// Visit contact rows in ascending row order: all normals, then tangents.
    fn scatter_contacts<T, F>(
        target: &mut T,
        layout: &ConstraintLayout,
        offsets: &DofOffsets,
        rows: &[ContactRows],
        mut visit: F,
    ) -> Result<()>
    where
        T: AssemblyTarget + ?Sized,
        F: FnMut(&mut T, usize, &[JacobianBlock], &DofOffsets) -> Result<()>,
    {
        for (i, blocks) in rows.iter().enumerate() {
            visit(target, layout.contact_normal_row(i), &blocks[0], offsets)?;
        }
        for (i, blocks) in rows.iter().enumerate() {
            let (u, v) = layout.contact_tangent_rows(i);
            visit(target, u, &blocks[1], offsets)?;
            visit(target, v, &blocks[2], offsets)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::tests::{contact_on_face, two_tets};
    use crate::sparse::SparseRowMatrix;
    use crate::types::Rotation;
    use approx::assert_relative_eq;
    use std::collections::{BTreeMap, BTreeSet};

    /// Records the declared pattern and the written entries per row.
    #[derive(Default)]
    struct Recorder {
        declared: BTreeMap<usize, Vec<usize>>,
        written: BTreeMap<usize, BTreeSet<usize>>,
        finalized: Vec<usize>,
    }

    impl AssemblyTarget for Recorder {
        fn append(&mut self, row: usize, col: usize, _value: f64) -> Result<()> {
            self.declared.entry(row).or_default().push(col);
            Ok(())
        }

        fn finalize(&mut self, row: usize) -> Result<()> {
            self.finalized.push(row);
            Ok(())
        }

        fn set(&mut self, row: usize, col: usize, _value: f64) -> Result<()> {
            self.written.entry(row).or_default().insert(col);
            Ok(())
        }
    }

    fn bodies() -> Vec<RigidBodyState> {
        vec![RigidBodyState::new(
            Point3::new(0.3, 0.2, -0.6),
            Rotation::from_euler_angles(0.3, -0.2, 0.8),
        )]
    }

    /// Two tets, one contact on the lower tet, node 3 attached to body 0.
    fn coupled_system() -> TetConstraintSystem {
        let mut system = two_tets(EngineConfig::default());
        system.set_contacts(vec![contact_on_face(1, 0)]).unwrap();
        system.add_bilateral(3, 0, &bodies()[0]).unwrap();
        system.setup(0, DofOffsets::new(0, 6), 1).unwrap();
        system
    }

    fn assembled(system: &TetConstraintSystem) -> SparseRowMatrix {
        let n_cols = 6 + 3 * system.mesh().n_nodes();
        let mut d = SparseRowMatrix::new(system.num_constraints(), n_cols);
        system.generate_sparsity(&mut d).unwrap();
        system.build_d(&mut d, &bodies()).unwrap();
        d
    }

    /// Velocity vector with a rigid twist and a uniform node velocity.
    fn velocities(n_nodes: usize, linear: Vec3, angular: Vec3, node: Vec3) -> Vec<f64> {
        let mut v = vec![0.0; 6 + 3 * n_nodes];
        v[..3].copy_from_slice(linear.as_slice());
        v[3..6].copy_from_slice(angular.as_slice());
        for n in 0..n_nodes {
            v[6 + 3 * n..9 + 3 * n].copy_from_slice(node.as_slice());
        }
        v
    }

    #[test]
    fn test_sparsity_matches_written_columns() {
        let system = coupled_system();
        let mut recorder = Recorder::default();
        system.generate_sparsity(&mut recorder).unwrap();
        system.build_d(&mut recorder, &bodies()).unwrap();

        assert_eq!(recorder.finalized, (0..20).collect::<Vec<_>>());
        assert_eq!(recorder.declared.len(), 20);
        for (row, cols) in &recorder.declared {
            assert!(cols.windows(2).all(|w| w[0] < w[1]), "row {} not ascending", row);
            let declared: BTreeSet<usize> = cols.iter().copied().collect();
            assert_eq!(&declared, &recorder.written[row], "row {}", row);
        }
    }

    #[test]
    fn test_row_patterns() {
        let system = coupled_system();
        let d = assembled(&system);
        let layout = *system.layout().unwrap();

        // Element 1 = [0, 2, 1, 4]: columns of nodes 0, 1, 2, 4 in order
        let (cols, _) = d.row(layout.element_row(1, 0)).unwrap();
        assert_eq!(cols, &[6, 7, 8, 9, 10, 11, 12, 13, 14, 18, 19, 20]);

        // Contact on face (2, 1, 4): rigid, then nodes 1, 2, 4
        let (cols, _) = d.row(layout.contact_tangent_rows(0).1).unwrap();
        assert_eq!(cols, &[0, 1, 2, 3, 4, 5, 9, 10, 11, 12, 13, 14, 18, 19, 20]);

        // Attachment of node 3
        let (cols, _) = d.row(layout.bilateral_row(0, 2)).unwrap();
        assert_eq!(cols, &[0, 1, 2, 3, 4, 5, 15, 16, 17]);

        assert_eq!(d.nnz(), system.num_nonzeros());
    }

    #[test]
    fn test_translation_leaves_constraints_unchanged() {
        let system = coupled_system();
        let d = assembled(&system);
        let layout = *system.layout().unwrap();

        let u = Vec3::new(0.4, -1.2, 0.7);
        let rates = d.mul_vec(&velocities(5, u, Vec3::zeros(), u));

        for row in layout.element_rows() {
            assert_relative_eq!(rates[row], 0.0, epsilon = 1e-12);
        }
        for row in layout.contact_rows() {
            assert_relative_eq!(rates[row], 0.0, epsilon = 1e-12);
        }
        for row in layout.bilateral_rows() {
            assert_relative_eq!(rates[row], 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_contact_rows_measure_relative_velocity() {
        let system = coupled_system();
        let d = assembled(&system);
        let layout = *system.layout().unwrap();
        let contact = system.contacts()[0];
        let body = bodies()[0];
        let frame = ContactFrame::from_normal(&contact.normal);

        let node_vel = Vec3::new(0.1, 0.2, -0.5);
        let body_lin = Vec3::new(-0.3, 0.0, 0.4);
        let body_ang = Vec3::new(0.3, -0.2, 0.5);
        let rates = d.mul_vec(&velocities(5, body_lin, body_ang, node_vel));

        let omega_world = body.rotation * body_ang;
        let body_point_vel = body_lin + omega_world.cross(&contact.lever_arm(&body));
        let relative = node_vel - body_point_vel;

        let (u, v) = layout.contact_tangent_rows(0);
        let normal_rate = rates[layout.contact_normal_row(0)];
        assert_relative_eq!(normal_rate, frame.normal.dot(&relative), epsilon = 1e-12);
        assert_relative_eq!(rates[u], frame.u.dot(&relative), epsilon = 1e-12);
        assert_relative_eq!(rates[v], frame.v.dot(&relative), epsilon = 1e-12);
    }

    #[test]
    fn test_element_rows_match_tet_jacobian() {
        let mut system = coupled_system();
        system.mesh_mut().positions_mut()[4] += Vec3::new(0.05, -0.02, 0.1);
        let d = assembled(&system);
        let layout = *system.layout().unwrap();

        let coords = system.element_coords(1);
        let jac = Tet4::jacobian(&coords, &system.rest_shapes()[1]);
        // Local node 3 of element 1 is node 4, columns 18..21
        for k in 0..ROWS_PER_ELEMENT {
            let row = layout.element_row(1, k);
            for axis in 0..3 {
                assert_eq!(d.get(row, 18 + axis), Some(jac.rows[k][3][axis]));
            }
        }
    }

    #[test]
    fn test_bilateral_scale() {
        let system = coupled_system();
        let d = assembled(&system);
        let layout = *system.layout().unwrap();
        let arw = bodies()[0].rotation_matrix().transpose();
        for k in 0..3 {
            let row = layout.bilateral_row(0, k);
            for axis in 0..3 {
                let expected = 0.2 * arw[(k, axis)];
                assert_relative_eq!(d.get(row, 15 + axis).unwrap(), expected, epsilon = 1e-14);
                assert_relative_eq!(d.get(row, axis).unwrap(), -expected, epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn test_build_d_without_sparsity_fails() {
        let system = coupled_system();
        let mut d = SparseRowMatrix::new(system.num_constraints(), 21);
        let err = system.build_d(&mut d, &bodies()).unwrap_err();
        assert!(matches!(err, Error::Sparsity(_)));
    }

    #[test]
    fn test_unknown_body_rejected() {
        let system = coupled_system();
        let mut d = SparseRowMatrix::new(system.num_constraints(), 21);
        system.generate_sparsity(&mut d).unwrap();
        assert!(matches!(system.build_d(&mut d, &[]), Err(Error::Contact(_))));
    }

    #[test]
    fn test_phases_require_setup() {
        let system = two_tets(EngineConfig::default());
        let mut d = SparseRowMatrix::new(14, 15);
        assert!(matches!(system.generate_sparsity(&mut d), Err(Error::Layout(_))));
        assert!(matches!(system.build_d(&mut d, &[]), Err(Error::Layout(_))));
    }
}
