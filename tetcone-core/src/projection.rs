//! Projection of contact impulses onto the Coulomb friction cone.
//!
//! Called by the external solver once per iteration. Each contact's impulse
//! triple `(γn, γu, γv)` is projected independently:
//!
//! ```text
//!        γt
//!         ^     upper cone: t <= μ γn, kept as is
//!         |    /
//!         |   /
//!  anti-  |  /   remaining region: orthogonal projection
//!  cone   | /    onto the generator t = μ γn
//!  -------+-------> γn
//! ```
//!
//! Cohesion shifts the cone apex to `γn = −c`.

use crate::engine::TetConstraintSystem;
use crate::error::Result;
use rayon::prelude::*;

/// Normal impulses below this magnitude count as zero in the cone test.
const NORMAL_EPSILON: f64 = 1e-14;

/// Project `(gn, gu, gv)` onto the cone of half-angle `atan(mu)`.
///
/// `mu` must be positive. Points inside the cone are kept, points in the
/// polar cone collapse to the apex.
pub fn project_cone(gn: &mut f64, gu: &mut f64, gv: &mut f64, mu: f64) {
    let t = (*gu * *gu + *gv * *gv).sqrt();

    if t <= mu * *gn {
        return;
    }

    if t <= -*gn / mu || gn.abs() < NORMAL_EPSILON {
        *gn = 0.0;
        *gu = 0.0;
        *gv = 0.0;
        return;
    }

    *gn = (t * mu + *gn) / (mu * mu + 1.0);
    let scale = *gn * mu / t;
    *gu *= scale;
    *gv *= scale;
}

/// Project one contact impulse with friction `mu` and cohesion `cohesion`.
///
/// A frictionless contact only keeps a non-negative normal impulse.
pub fn project_contact(gamma: [f64; 3], mu: f64, cohesion: f64) -> [f64; 3] {
    let [mut gn, mut gu, mut gv] = gamma;
    gn += cohesion;

    if mu == 0.0 {
        return [(gn - cohesion).max(0.0), 0.0, 0.0];
    }

    project_cone(&mut gn, &mut gu, &mut gv, mu);
    [gn - cohesion, gu, gv]
}

impl TetConstraintSystem {
    /// Project every contact's impulses in `gamma` onto its friction cone.
    ///
    /// Element and bilateral rows are left untouched.
    pub fn project(&self, gamma: &mut [f64]) -> Result<()> {
        let layout = self.require_layout()?;
        layout.check_len(gamma.len(), "impulse vector")?;
        if self.contacts.is_empty() {
            return Ok(());
        }

        let surface = self.config.contact;
        let (normals, tangents) = gamma[layout.contact_rows()].split_at_mut(layout.n_contacts);
        normals
            .par_iter_mut()
            .zip(tangents.par_chunks_mut(2))
            .zip(self.contacts.par_iter())
            .for_each(|((gn, gt), contact)| {
                let (mu, cohesion) = surface.blend(contact.friction, contact.cohesion);
                let [n, u, v] = project_contact([*gn, gt[0], gt[1]], mu, cohesion);
                *gn = n;
                gt[0] = u;
                gt[1] = v;
            });
        Ok(())
    }
}
