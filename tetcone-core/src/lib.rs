//! tetcone core - constraint assembly for deformable tetrahedra and rigid bodies
//!
//! Per-step building blocks of a cone-complementarity solver coupling linear
//! tetrahedral finite elements with rigid bodies:
//! - Jacobian (`D^T`) assembly into a two-phase sparse pattern
//! - Stabilization bias and compliance vectors
//! - Friction-cone projection of contact impulses with cohesion
//! - Warm starting and explicit nodal integration
//!
//! The iterative solver, rigid body dynamics and collision detection belong
//! to the caller.
//!
//! # Architecture
//!
//! - [`TetConstraintSystem`]: owns the mesh and constraint records, exposes
//!   every per-step phase
//! - [`TetMesh`]: nodal state and connectivity
//! - [`ConstraintLayout`] / [`DofOffsets`]: where the engine's rows and
//!   columns live in the global system
//! - [`AssemblyTarget`] trait: destination of sparse assembly, implemented by
//!   [`SparseRowMatrix`]
//! - [`JacobianBlock`]: one participant (rigid body or node) of a row
//!
//! # Example
//!
//! ```
//! use tetcone_core::{DofOffsets, EngineConfig, Point3, SparseRowMatrix, TetConstraintSystem};
//!
//! let mut system = TetConstraintSystem::new(EngineConfig::default()).unwrap();
//! system.add_nodes(
//!     &[
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!         Point3::new(0.0, 1.0, 0.0),
//!         Point3::new(0.0, 0.0, 1.0),
//!     ],
//!     &[],
//! );
//! system.add_elements(&[[0, 1, 2, 3]]).unwrap();
//! system.initialize().unwrap();
//! system.setup(0, DofOffsets::new(0, 0), 0).unwrap();
//!
//! let rows = system.num_constraints();
//! let mut d = SparseRowMatrix::with_capacity(rows, 12, system.num_nonzeros());
//! system.generate_sparsity(&mut d).unwrap();
//! system.build_d(&mut d, &[]).unwrap();
//!
//! let mut b = vec![0.0; rows];
//! system.build_b(&mut b, &[]).unwrap();
//! assert!(b.iter().all(|v| v.abs() < 1e-12));
//! ```

pub mod types;
pub mod error;
pub mod config;
pub mod material;
pub mod element;
pub mod mesh;
pub mod surface;
pub mod rigid;
pub mod contact;
pub mod layout;
pub mod sparse;
pub mod participant;
pub mod engine;
pub mod jacobian;
pub mod bias;
pub mod projection;
pub mod warmstart;
pub mod integrate;

pub use types::{Mat3, Point3, Rotation, StrainTensor, Vec3};
pub use error::{Error, Result};
pub use config::EngineConfig;
pub use material::{ContactMaterial, Material};
pub use element::{RestShape, Tet4};
pub use mesh::TetMesh;
pub use surface::{find_surface, BoundaryTriangle, Surface};
pub use rigid::RigidBodyState;
pub use contact::{BilateralConstraint, ContactFrame, RigidContact};
pub use layout::{ConstraintLayout, DofOffsets};
pub use sparse::{AssemblyTarget, CsrMatrix, SparseRowMatrix};
pub use participant::JacobianBlock;
pub use engine::TetConstraintSystem;
pub use projection::{project_cone, project_contact};
pub use warmstart::WarmStartCache;
