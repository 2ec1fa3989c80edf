//! Symmetry-adapted bases.
//!
//! A basis stores one representative per symmetry orbit whose projected norm
//!
//!   N(s)² = |Σ_{g ∈ Stab(s)} χ(g)* · sign(g, s)| / |G|
//!
//! is non-zero, sorted in increasing order, together with the lookup
//! structures needed to map a raw state back to a basis index. Without a
//! symmetry every norm is one and the lookup is a plain combinatorial index.

pub mod electron;
pub mod pairs;
pub mod spinhalf;

pub use electron::{Electron, Tj};
pub use spinhalf::SpinHalf;

use crate::action::GroupAction;
use crate::bits::{prefix, BitState};
use crate::error::{EdError, Result};
use crate::group::PermutationGroup;
use crate::ops::{Sector, Term};
use crate::representation::Representation;
use num_complex::Complex64;
use std::ops::Range;
use std::sync::Arc;

/// Projected norms at or below this are treated as zero.
pub const NORM_TOL: f64 = 1e-6;

/// A finite basis the apply engine can walk.
///
/// `apply_term` reports every non-zero matrix element `⟨out|term|in⟩` with
/// `in` in `range` through `fill(out, in, value)`.
pub trait Basis: Sync {
    fn dim(&self) -> usize;

    fn sector(&self) -> Sector;

    fn n_sites(&self) -> usize {
        self.sector().n_sites
    }

    fn apply_term<F>(&self, term: &Term, range: Range<usize>, fill: &mut F)
    where
        F: FnMut(usize, usize, Complex64);
}

/// A group action together with the irrep selecting the sector.
#[derive(Debug, Clone)]
pub struct Symmetry<B> {
    action: Arc<GroupAction<B>>,
    irrep: Representation,
}

impl<B: BitState> Symmetry<B> {
    pub fn new(group: &PermutationGroup, irrep: Representation) -> Result<Self> {
        Self::with_action(Arc::new(GroupAction::new(group)?), irrep)
    }

    /// Reuse an existing action, e.g. for every irrep of one group.
    pub fn with_action(action: Arc<GroupAction<B>>, irrep: Representation) -> Result<Self> {
        if irrep.len() != action.n_symmetries() {
            return Err(EdError::RepresentationSize {
                expected: action.n_symmetries(),
                got: irrep.len(),
            });
        }
        irrep.check_multiplicative(|g, h| action.multiply(g, h))?;
        Ok(Self { action, irrep })
    }

    pub fn action(&self) -> &GroupAction<B> {
        &self.action
    }

    pub fn irrep(&self) -> &Representation {
        &self.irrep
    }

    pub fn n_sites(&self) -> usize {
        self.action.n_sites()
    }

    pub fn order(&self) -> usize {
        self.action.n_symmetries()
    }

    /// `sqrt(|Σ_{g ∈ stab} χ(g)* sign(g)| / |G|)`.
    pub fn norm<S>(&self, stabilizer: &[usize], sign: S) -> f64
    where
        S: Fn(usize) -> f64,
    {
        let sum: Complex64 = stabilizer
            .iter()
            .map(|&g| self.irrep.character(g).conj() * sign(g))
            .sum();
        (sum.norm() / self.order() as f64).sqrt()
    }

    pub(crate) fn check_sites(&self, n_sites: usize) -> Result<()> {
        if self.n_sites() != n_sites {
            return Err(EdError::GroupSiteMismatch {
                basis: n_sites,
                group: self.n_sites(),
            });
        }
        Ok(())
    }
}

/// Sorted states bucketed by their top bits.
#[derive(Debug, Clone)]
pub struct PrefixIndex {
    n_postfix: usize,
    /// `offsets[p]..offsets[p + 1]` holds the states with prefix `p`.
    offsets: Vec<usize>,
}

impl PrefixIndex {
    /// Upper bound on the number of prefix bits.
    pub const MAX_PREFIX_BITS: usize = 20;

    pub fn prefix_bits(n_sites: usize) -> usize {
        (n_sites / 2).min(Self::MAX_PREFIX_BITS)
    }

    /// `states` must be sorted and live on `n_sites` bits.
    pub fn new<B: BitState>(states: &[B], n_sites: usize) -> Self {
        let n_prefix = Self::prefix_bits(n_sites);
        let n_postfix = n_sites - n_prefix;
        let mut offsets = vec![0usize; (1 << n_prefix) + 1];
        for &s in states {
            offsets[prefix(s, n_postfix).to_u64() as usize + 1] += 1;
        }
        for p in 1..offsets.len() {
            offsets[p] += offsets[p - 1];
        }
        Self { n_postfix, offsets }
    }

    pub fn n_postfix(&self) -> usize {
        self.n_postfix
    }

    /// Position of `state` in `states`, searching its bucket only.
    #[inline]
    pub fn find<B: BitState>(&self, states: &[B], state: B) -> Option<usize> {
        let p = prefix(state, self.n_postfix).to_u64() as usize;
        if p + 1 >= self.offsets.len() {
            return None;
        }
        let (lo, hi) = (self.offsets[p], self.offsets[p + 1]);
        states[lo..hi].binary_search(&state).ok().map(|i| lo + i)
    }
}

pub(crate) fn check_particles(n: usize, max: usize) -> Result<()> {
    if n > max {
        return Err(EdError::InvalidParticleNumber { n, max });
    }
    Ok(())
}

pub(crate) fn check_capacity<B: BitState>(n_sites: usize) -> Result<()> {
    if n_sites == 0 {
        return Err(EdError::InvalidSiteCount(0));
    }
    if n_sites > B::BITS {
        return Err(EdError::CapacityExceeded {
            n_sites,
            bits: B::BITS,
        });
    }
    Ok(())
}
