//! The constraint engine: owns the mesh and every constraint record, and
//! exposes the per-step assembly phases.
//!
//! The phases are spread over several modules, each adding an `impl` block
//! to [`TetConstraintSystem`]:
//!
//! - [`jacobian`](crate::jacobian): `generate_sparsity`, `build_d`
//! - [`bias`](crate::bias): `build_b`, `build_e`
//! - [`projection`](crate::projection): `project`
//! - [`warmstart`](crate::warmstart): `pre_solve`, `post_solve`
//! - [`integrate`](crate::integrate): `update`, `update_position`,
//!   `compute_mass`, `compute_inv_mass`
//!
//! # Step sequence
//!
//! ```text
//! initialize()                      once, after nodes and elements are loaded
//! set_contacts() / add_bilateral()  whenever the contact set changes
//! setup()                           assign row and column offsets
//! generate_sparsity()               when topology or contacts changed
//! update() build_d() build_b() build_e() pre_solve()
//!   project() ...                   inside the external solver loop
//! post_solve() update_position()
//! ```

use crate::config::EngineConfig;
use crate::contact::{BilateralConstraint, RigidContact};
use crate::element::{RestShape, Tet4};
use crate::error::{Error, Result};
use crate::layout::{ConstraintLayout, DofOffsets};
use crate::mesh::TetMesh;
use crate::rigid::RigidBodyState;
use crate::surface::{self, Surface};
use crate::types::{Point3, Vec3};
use crate::warmstart::WarmStartCache;
use tracing::{debug, info};

/// Tetrahedral FEM container coupled to rigid bodies through constraints.
#[derive(Debug, Clone)]
pub struct TetConstraintSystem {
    pub(crate) config: EngineConfig,
    pub(crate) mesh: TetMesh,
    /// Rest data per element, filled by `initialize`.
    pub(crate) rest: Vec<RestShape>,
    pub(crate) surface: Surface,
    pub(crate) contacts: Vec<RigidContact>,
    pub(crate) bilaterals: Vec<BilateralConstraint>,
    pub(crate) layout: Option<ConstraintLayout>,
    pub(crate) offsets: DofOffsets,
    /// Number of rigid bodies declared at `setup`.
    pub(crate) n_rigid: usize,
    pub(crate) warm_start: WarmStartCache,
}

impl TetConstraintSystem {
    /// Create an empty engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            mesh: TetMesh::new(),
            rest: Vec::new(),
            surface: Surface::default(),
            contacts: Vec::new(),
            bilaterals: Vec::new(),
            layout: None,
            offsets: DofOffsets::default(),
            n_rigid: 0,
            warm_start: WarmStartCache::default(),
        })
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The deformable mesh.
    pub fn mesh(&self) -> &TetMesh {
        &self.mesh
    }

    /// Mutable access to the mesh state, e.g. to prescribe node velocities.
    pub fn mesh_mut(&mut self) -> &mut TetMesh {
        &mut self.mesh
    }

    /// Boundary of the mesh as of the last `find_surface`.
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Row layout as of the last `setup`.
    pub fn layout(&self) -> Option<&ConstraintLayout> {
        self.layout.as_ref()
    }

    /// Column offsets as of the last `setup`.
    pub fn offsets(&self) -> DofOffsets {
        self.offsets
    }

    /// Rest shapes per element.
    pub fn rest_shapes(&self) -> &[RestShape] {
        &self.rest
    }

    /// Active rigid contacts.
    pub fn contacts(&self) -> &[RigidContact] {
        &self.contacts
    }

    /// Active bilateral attachments.
    pub fn bilaterals(&self) -> &[BilateralConstraint] {
        &self.bilaterals
    }

    /// Append nodes; missing velocities are zero.
    pub fn add_nodes(&mut self, positions: &[Point3], velocities: &[Vec3]) {
        self.mesh.add_nodes(positions, velocities);
    }

    /// Append tetrahedra.
    ///
    /// Rest data and the boundary are not updated until `initialize`.
    pub fn add_elements(&mut self, elements: &[[usize; 4]]) -> Result<()> {
        self.mesh.add_elements(elements)
    }

    /// Weld `node` to rigid body `body_id` at their current relative pose.
    ///
    /// Returns the index of the new attachment.
    pub fn add_bilateral(
        &mut self,
        node: usize,
        body_id: usize,
        body: &RigidBodyState,
    ) -> Result<usize> {
        let position = self.mesh.positions().get(node).ok_or_else(|| {
            Error::Contact(format!(
                "cannot attach node {} (mesh has {} nodes)",
                node,
                self.mesh.n_nodes()
            ))
        })?;
        self.bilaterals
            .push(BilateralConstraint::attach(body_id, node, position, body));
        debug!(node, body = body_id, "added bilateral attachment");
        Ok(self.bilaterals.len() - 1)
    }

    /// Remove the attachment at `index`; later attachments shift down.
    pub fn remove_bilateral(&mut self, index: usize) -> Result<BilateralConstraint> {
        if index >= self.bilaterals.len() {
            return Err(Error::Contact(format!(
                "no bilateral attachment {} ({} active)",
                index,
                self.bilaterals.len()
            )));
        }
        Ok(self.bilaterals.remove(index))
    }

    /// Replace the contact set for this step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Contact`] if a contact names an element or face that
    /// is not on the boundary, a face outside 0-3, a zero normal or a
    /// non-finite depth or weight. Negative or non-finite friction and
    /// non-finite cohesion give [`Error::InvalidMaterial`].
    pub fn set_contacts(&mut self, contacts: Vec<RigidContact>) -> Result<()> {
        for (i, contact) in contacts.iter().enumerate() {
            if contact.face >= 4 {
                return Err(Error::Contact(format!(
                    "contact {} names face {} of element {}",
                    i, contact.face, contact.element
                )));
            }
            if contact.normal.norm() == 0.0 || !contact.normal.iter().all(|c| c.is_finite()) {
                return Err(Error::Contact(format!(
                    "contact {} has a degenerate normal {:?}",
                    i, contact.normal
                )));
            }
            if !contact.depth.is_finite() || !contact.weights.iter().all(|w| w.is_finite()) {
                return Err(Error::Contact(format!(
                    "contact {} has non-finite depth {} or weights {:?}",
                    i, contact.depth, contact.weights
                )));
            }
            if !(contact.friction >= 0.0 && contact.friction.is_finite()) {
                return Err(Error::InvalidMaterial(format!(
                    "contact {} has friction {}, must be finite and non-negative",
                    i, contact.friction
                )));
            }
            if !contact.cohesion.is_finite() {
                return Err(Error::InvalidMaterial(format!(
                    "contact {} has non-finite cohesion {}",
                    i, contact.cohesion
                )));
            }
            if !self.surface.is_boundary_element(contact.element) {
                return Err(Error::Contact(format!(
                    "contact {} touches element {}, which is not on the boundary",
                    i, contact.element
                )));
            }
            if !self.surface.is_boundary_face(contact.element, contact.face) {
                return Err(Error::Contact(format!(
                    "contact {} touches interior face {} of element {}",
                    i, contact.face, contact.element
                )));
            }
        }
        self.contacts = contacts;
        Ok(())
    }

    /// Compute rest shapes, lumped masses and the boundary.
    ///
    /// Nothing is stored unless every element and the boundary pass, so a
    /// failed call leaves the previous state in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Topology`] for an element with non-positive rest
    /// volume or a malformed surface.
    pub fn initialize(&mut self) -> Result<()> {
        let density = self.config.material.density;
        let rest = (0..self.mesh.n_elements())
            .map(|e| RestShape::new(e, &self.element_coords(e)))
            .collect::<Result<Vec<_>>>()?;
        let surface = surface::find_surface(self.mesh.n_nodes(), self.mesh.elements())?;

        let elements = self.mesh.elements().to_vec();
        let masses = self.mesh.masses_mut();
        masses.iter_mut().for_each(|m| *m = 0.0);
        for (tet, shape) in elements.iter().zip(&rest) {
            let node_mass = density * shape.volume / 4.0;
            for &n in tet {
                masses[n] += node_mass;
            }
        }

        let total_volume: f64 = rest.iter().map(|r| r.volume).sum();
        info!(
            nodes = self.mesh.n_nodes(),
            elements = rest.len(),
            volume = total_volume,
            mass = density * total_volume,
            "initialized tetrahedral mesh"
        );

        self.rest = rest;
        self.surface = surface;
        Ok(())
    }

    /// Recompute the boundary triangles, nodes and elements.
    pub fn find_surface(&mut self) -> Result<()> {
        self.surface = surface::find_surface(self.mesh.n_nodes(), self.mesh.elements())?;
        Ok(())
    }

    /// Assign this engine's rows and columns in the caller's global system.
    ///
    /// `n_rigid` is the number of rigid bodies whose columns start at
    /// `offsets.rigid`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Layout`] if node columns overlap rigid columns, or if
    /// elements were added since `initialize`.
    pub fn setup(&mut self, start_row: usize, offsets: DofOffsets, n_rigid: usize) -> Result<()> {
        offsets.validate(n_rigid)?;
        if self.rest.len() != self.mesh.n_elements() {
            return Err(Error::Layout(format!(
                "{} elements but {} rest shapes, call initialize first",
                self.mesh.n_elements(),
                self.rest.len()
            )));
        }

        let layout = ConstraintLayout::new(
            start_row,
            self.mesh.n_elements(),
            self.contacts.len(),
            self.bilaterals.len(),
        );
        debug!(
            start_row,
            rows = layout.num_constraints(),
            contacts = layout.n_contacts,
            bilaterals = layout.n_bilaterals,
            "constraint layout"
        );
        self.layout = Some(layout);
        self.offsets = offsets;
        self.n_rigid = n_rigid;
        Ok(())
    }

    /// Number of rows this engine contributes with the current records.
    pub fn num_constraints(&self) -> usize {
        self.current_layout().num_constraints()
    }

    /// Upper bound on Jacobian nonzeros with the current records.
    pub fn num_nonzeros(&self) -> usize {
        self.current_layout().num_nonzeros()
    }

    fn current_layout(&self) -> ConstraintLayout {
        ConstraintLayout::new(
            0,
            self.mesh.n_elements(),
            self.contacts.len(),
            self.bilaterals.len(),
        )
    }

    /// Layout of the last `setup`, checked against the current records.
    pub(crate) fn require_layout(&self) -> Result<ConstraintLayout> {
        let layout = self
            .layout
            .ok_or_else(|| Error::Layout("setup has not been called".into()))?;
        if layout.n_elements != self.mesh.n_elements()
            || layout.n_contacts != self.contacts.len()
            || layout.n_bilaterals != self.bilaterals.len()
        {
            return Err(Error::Layout(
                "constraint records changed since the last setup".into(),
            ));
        }
        Ok(layout)
    }

    /// Column offsets of the last `setup`.
    pub(crate) fn require_offsets(&self) -> Result<DofOffsets> {
        match self.layout {
            Some(_) => Ok(self.offsets),
            None => Err(Error::Layout("setup has not been called".into())),
        }
    }

    pub(crate) fn check_body_id(&self, body: usize) -> Result<()> {
        if body >= self.n_rigid {
            return Err(Error::Contact(format!(
                "rigid body {} outside the {} bodies declared at setup",
                body, self.n_rigid
            )));
        }
        Ok(())
    }

    /// Look up a rigid body referenced by a constraint.
    pub(crate) fn body<'a>(
        &self,
        bodies: &'a [RigidBodyState],
        body: usize,
    ) -> Result<&'a RigidBodyState> {
        self.check_body_id(body)?;
        bodies.get(body).ok_or_else(|| {
            Error::Contact(format!(
                "rigid body {} missing from a table of {} bodies",
                body,
                bodies.len()
            ))
        })
    }

    /// Current coordinates of element `e`.
    pub(crate) fn element_coords(&self, e: usize) -> [Point3; 4] {
        let positions = self.mesh.positions();
        self.mesh.elements()[e].map(|n| positions[n])
    }

    /// Current volume of the whole mesh.
    pub fn current_volume(&self) -> f64 {
        (0..self.mesh.n_elements())
            .map(|e| Tet4::volume(&self.element_coords(e)))
            .sum()
    }
}
