//! Engine configuration.
//!
//! All tunables of the constraint engine live in [`EngineConfig`]: the step
//! size used for velocity-level biases and integration, gravity, stabilization
//! caps and the materials of the deformable mesh.

use crate::error::{Error, Result};
use crate::material::{ContactMaterial, Material};
use crate::types::Vec3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Standard gravity (m/s²).
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// Configuration of a [`TetConstraintSystem`](crate::TetConstraintSystem).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineConfig {
    /// Step size h (seconds).
    pub step_size: f64,
    /// Gravitational acceleration applied to every node.
    pub gravity: Vec3,
    /// Nodal speed cap applied before position integration.
    pub max_velocity: f64,
    /// Largest separating speed a penetration bias may request.
    pub contact_recovery_speed: f64,
    /// Scale of the bilateral attachment Jacobian rows.
    pub bilateral_jacobian_scale: f64,
    /// Fraction of last step's impulses reused as the initial guess.
    pub warm_start_factor: f64,
    /// Surface friction and cohesion of the mesh.
    pub contact: ContactMaterial,
    /// Bulk material of the mesh.
    pub material: Material,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_size: 0.01,
            gravity: Vec3::new(0.0, -STANDARD_GRAVITY, 0.0),
            max_velocity: 1e3,
            contact_recovery_speed: 0.6,
            bilateral_jacobian_scale: 0.2,
            warm_start_factor: 0.9,
            contact: ContactMaterial::default(),
            material: Material::default(),
        }
    }
}

impl EngineConfig {
    /// Default configuration with the given step size.
    #[must_use]
    pub fn with_step_size(step_size: f64) -> Self {
        Self {
            step_size,
            ..Default::default()
        }
    }

    /// Set gravity.
    #[must_use]
    pub fn gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    /// Disable gravity.
    #[must_use]
    pub fn zero_gravity(mut self) -> Self {
        self.gravity = Vec3::zeros();
        self
    }

    /// Set the nodal speed cap.
    #[must_use]
    pub fn max_velocity(mut self, max_velocity: f64) -> Self {
        self.max_velocity = max_velocity;
        self
    }

    /// Set the penetration recovery speed cap.
    #[must_use]
    pub fn contact_recovery_speed(mut self, speed: f64) -> Self {
        self.contact_recovery_speed = speed;
        self
    }

    /// Set the bilateral Jacobian scale.
    #[must_use]
    pub fn bilateral_jacobian_scale(mut self, scale: f64) -> Self {
        self.bilateral_jacobian_scale = scale;
        self
    }

    /// Set the warm start factor.
    #[must_use]
    pub fn warm_start_factor(mut self, factor: f64) -> Self {
        self.warm_start_factor = factor;
        self
    }

    /// Set the mesh surface material.
    #[must_use]
    pub fn contact(mut self, contact: ContactMaterial) -> Self {
        self.contact = contact;
        self
    }

    /// Set the mesh bulk material.
    #[must_use]
    pub fn material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.step_size.is_finite() || self.step_size <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "step size must be positive, got {}",
                self.step_size
            )));
        }
        if self.max_velocity.is_nan() || self.max_velocity <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "velocity cap must be positive, got {}",
                self.max_velocity
            )));
        }
        if self.contact_recovery_speed < 0.0 {
            return Err(Error::InvalidConfig(
                "contact recovery speed must be non-negative".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.warm_start_factor) {
            return Err(Error::InvalidConfig(format!(
                "warm start factor must lie in [0, 1], got {}",
                self.warm_start_factor
            )));
        }
        if self.contact.friction < 0.0 {
            return Err(Error::InvalidMaterial(
                "Friction coefficient must be non-negative".into(),
            ));
        }
        self.material.validate()
    }
}
