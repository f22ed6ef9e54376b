//! Material property definitions.
//!
//! Two kinds of material enter the constraint system:
//! - [`Material`]: isotropic hyperelastic bulk material of the tetrahedral
//!   mesh (drives lumped mass and element compliance)
//! - [`ContactMaterial`]: surface friction and cohesion of the mesh, blended
//!   with the rigid body's values at each contact

use crate::error::{Error, Result};
use nalgebra::{Matrix3, Vector6};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Bulk material of the deformable mesh.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Material {
    /// Young's modulus (Pa).
    pub youngs_modulus: f64,
    /// Poisson's ratio (dimensionless).
    pub poissons_ratio: f64,
    /// Mass density (kg/m³).
    pub density: f64,
}

impl Material {
    /// Default density used by [`Material::new`] (kg/m³).
    pub const DEFAULT_DENSITY: f64 = 1000.0;

    /// Isotropic material with modulus E (Pa), ratio ν in (-1, 0.5) and
    /// [`Material::DEFAULT_DENSITY`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMaterial`] for E ≤ 0 or ν outside its range.
    pub fn new(youngs_modulus: f64, poissons_ratio: f64) -> Result<Self> {
        let material = Self {
            youngs_modulus,
            poissons_ratio,
            density: Self::DEFAULT_DENSITY,
        };
        material.validate()?;
        Ok(material)
    }

    /// Replace the density (kg/m³), which sets the lumped nodal masses.
    pub fn with_density(self, density: f64) -> Result<Self> {
        let material = Self { density, ..self };
        material.validate()?;
        Ok(material)
    }

    /// Check the physical admissibility of the parameters.
    pub fn validate(&self) -> Result<()> {
        if self.youngs_modulus <= 0.0 {
            return Err(Error::InvalidMaterial(format!(
                "Young's modulus must be positive, got {}",
                self.youngs_modulus
            )));
        }
        if self.poissons_ratio <= -1.0 || self.poissons_ratio >= 0.5 {
            return Err(Error::InvalidMaterial(format!(
                "Poisson's ratio {} outside (-1, 0.5)",
                self.poissons_ratio
            )));
        }
        if self.density <= 0.0 {
            return Err(Error::InvalidMaterial("density must be positive".into()));
        }
        Ok(())
    }

    /// Shear modulus G = E / (2(1 + ν)).
    pub fn shear_modulus(&self) -> f64 {
        self.youngs_modulus / (2.0 * (1.0 + self.poissons_ratio))
    }

    /// Normal-stress block of the isotropic elasticity tensor.
    ///
    /// The upper-left 3x3 of the 6x6 Voigt constitutive matrix, coupling
    /// [σ_xx, σ_yy, σ_zz] to [ε_xx, ε_yy, ε_zz].
    pub fn normal_block(&self) -> Matrix3<f64> {
        let e = self.youngs_modulus;
        let nu = self.poissons_ratio;

        let factor = e / ((1.0 + nu) * (1.0 - 2.0 * nu));
        let c11 = factor * (1.0 - nu);
        let c12 = factor * nu;

        Matrix3::new(
            c11, c12, c12,
            c12, c11, c12,
            c12, c12, c11,
        )
    }

    /// Per-row compliance of the six strain constraints of an element.
    ///
    /// Components follow the element row order: the three normal rows take
    /// the diagonal of the inverted normal block, the three shear rows take
    /// 1/G.
    pub fn strain_compliance(&self) -> Result<Vector6<f64>> {
        let inv = self.normal_block().try_inverse().ok_or_else(|| {
            Error::InvalidMaterial("Elasticity tensor is singular".into())
        })?;
        let shear = 1.0 / self.shear_modulus();

        Ok(Vector6::new(
            inv[(0, 0)],
            inv[(1, 1)],
            inv[(2, 2)],
            shear,
            shear,
            shear,
        ))
    }
}

/// Common material presets.
impl Material {
    /// Soft rubber (E = 10 MPa, ν = 0.3, ρ = 1100 kg/m³).
    pub fn rubber() -> Self {
        Self {
            youngs_modulus: 1e7,
            poissons_ratio: 0.3,
            density: 1100.0,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::rubber()
    }
}

/// Surface properties of the mesh used at rigid contacts.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactMaterial {
    /// Coulomb friction coefficient.
    pub friction: f64,
    /// Cohesion impulse (adhesion), may be zero.
    pub cohesion: f64,
}

impl ContactMaterial {
    /// Create a new contact material.
    pub fn new(friction: f64, cohesion: f64) -> Result<Self> {
        if friction < 0.0 {
            return Err(Error::InvalidMaterial(
                "Friction coefficient must be non-negative".into(),
            ));
        }
        Ok(Self { friction, cohesion })
    }

    /// Effective friction and cohesion against a rigid body's surface.
    ///
    /// Both are arithmetic means. Friction is zero if either side is
    /// frictionless, cohesion is clamped at zero.
    pub fn blend(&self, rigid_friction: f64, rigid_cohesion: f64) -> (f64, f64) {
        let friction = if rigid_friction == 0.0 || self.friction == 0.0 {
            0.0
        } else {
            (rigid_friction + self.friction) * 0.5
        };
        let cohesion = ((rigid_cohesion + self.cohesion) * 0.5).max(0.0);
        (friction, cohesion)
    }
}

impl Default for ContactMaterial {
    fn default() -> Self {
        Self {
            friction: 0.5,
            cohesion: 0.0,
        }
    }
}
