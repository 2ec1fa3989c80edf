//! Error types for phyz-ed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EdError {
    #[error("invalid site count: {0}")]
    InvalidSiteCount(usize),

    #[error("{n_sites} sites exceed the {bits}-bit state capacity")]
    CapacityExceeded { n_sites: usize, bits: usize },

    #[error("particle number {n} outside [0, {max}]")]
    InvalidParticleNumber { n: usize, max: usize },

    #[error("invalid permutation: {0}")]
    InvalidPermutation(String),

    #[error("not a group: {0}")]
    NotAGroup(String),

    #[error("representation has {got} characters, group has {expected} elements")]
    RepresentationSize { expected: usize, got: usize },

    #[error("characters violate the multiplication law at elements ({g}, {h})")]
    NotMultiplicative { g: usize, h: usize },

    #[error("character {index} is not a phase: |chi| = {modulus}")]
    NotUnitary { index: usize, modulus: f64 },

    #[error("group acts on {group} sites, basis has {basis}")]
    GroupSiteMismatch { basis: usize, group: usize },

    #[error("unknown operator type: {0}")]
    UnknownOp(String),

    #[error("operator {op} expects {expected} sites, got {got}")]
    WrongSiteCount {
        op: String,
        expected: usize,
        got: usize,
    },

    #[error("operator {op} references site {site} outside [0, {n_sites})")]
    SiteOutOfRange {
        op: String,
        site: usize,
        n_sites: usize,
    },

    #[error("operator {op} requires distinct sites, got {site} twice")]
    RepeatedSite { op: String, site: usize },

    #[error("coupling {0} is not defined")]
    UndefinedCoupling(String),

    #[error("invalid coupling for operator {op}: {reason}")]
    InvalidCoupling { op: String, reason: String },

    #[error("operator {op} is not supported on a {basis} basis")]
    UnsupportedOp { op: String, basis: String },

    #[error("operator {0} does not conserve particle number")]
    NonConserving(String),

    #[error("matrix is not real: largest imaginary part {0:e}")]
    ComplexMatrix(f64),

    #[error("vector length {got} does not match basis size {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("communication failure: {0}")]
    Communication(String),
}

pub type Result<T> = std::result::Result<T, EdError>;
