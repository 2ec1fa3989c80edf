#![allow(clippy::needless_range_loop)]
//! Symmetry-adapted exact diagonalization of quantum lattice models.
//!
//! Builds Hamiltonians of spin-1/2, Hubbard (`Electron`) and t-J models on
//! bit-packed product bases, optionally restricted to one irreducible
//! representation of a site-permutation group, and applies them matrix-free.
//! The same spin-1/2 kernels also run on a basis partitioned across
//! communicator ranks.
//!
//! # Modules
//!
//! - [`bits`]: Bit-state words, site masks, fermionic crossing signs
//! - [`lintable`]: Combinatorial index of fixed-popcount states
//! - [`group`]: Site-permutation groups (cyclic, dihedral, from generators)
//! - [`representation`]: One-dimensional irreps as character tables
//! - [`action`]: Byte-table group action, representatives, Fermi signs
//! - [`basis`]: Spin-1/2, Electron and t-J bases with symmetry projection
//! - [`ops`]: Operator kinds, couplings, compiled terms
//! - [`apply`]: Matrix-free apply engine, dense and CSR builders
//! - [`diag`]: Dense Hermitian eigendecomposition
//! - [`lanczos`]: Lanczos eigensolver over a matvec callback
//! - [`comm`]: Communicators for the distributed basis
//! - [`distributed`]: Prefix-partitioned spin-1/2 basis and operator

pub mod action;
pub mod apply;
pub mod basis;
pub mod bits;
pub mod comm;
pub mod csr;
pub mod diag;
pub mod distributed;
pub mod error;
pub mod group;
pub mod lanczos;
pub mod lintable;
pub mod ops;
pub mod representation;

pub use action::{FermiTable, GroupAction};
pub use apply::{ApplyParams, Operator};
pub use basis::{Basis, Electron, SpinHalf, Symmetry, Tj};
pub use bits::BitState;
pub use comm::{Communicator, LocalComm, ThreadComm};
pub use diag::Spectrum;
pub use distributed::{DistributedOperator, SpinHalfDistributed};
pub use error::{EdError, Result};
pub use group::PermutationGroup;
pub use lanczos::LanczosParams;
pub use ops::{Coupling, Op, OpKind, OpList};
pub use representation::Representation;
