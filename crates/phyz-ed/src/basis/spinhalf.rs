//! Spin-1/2 basis, optionally at fixed magnetization and in a symmetry sector.

use super::{check_capacity, check_particles, PrefixIndex, Symmetry, NORM_TOL};
use crate::bits::{combine, mask, subsets, BitState, Combinations};
use crate::error::Result;
use crate::lintable::LinTable;
use crate::ops::OpKind;
use num_complex::Complex64;
use rayon::prelude::*;

pub(crate) static SPIN_OPS: [OpKind; 4] = [OpKind::Exchange, OpKind::Ising, OpKind::Sz, OpKind::Matrix];

#[derive(Debug, Clone)]
enum Lookup {
    /// Every word on `n_sites` bits; the state is its own index.
    Direct,
    Lin(LinTable),
    Prefix(PrefixIndex),
}

/// Spin-1/2 states on `n_sites` sites; a set bit is an up spin.
#[derive(Debug, Clone)]
pub struct SpinHalf<B = u64> {
    n_sites: usize,
    n_up: Option<usize>,
    states: Vec<B>,
    norms: Vec<f64>,
    symmetry: Option<Symmetry<B>>,
    lookup: Lookup,
}

impl<B: BitState> SpinHalf<B> {
    /// All states, or those with `n_up` up spins.
    pub fn new(n_sites: usize, n_up: Option<usize>) -> Result<Self> {
        check_capacity::<B>(n_sites)?;
        if let Some(n) = n_up {
            check_particles(n, n_sites)?;
        }

        let (states, lookup): (Vec<B>, _) = match n_up {
            Some(n) => (
                Combinations::new(n_sites, n).collect(),
                Lookup::Lin(LinTable::new(n_sites, n)),
            ),
            None => (subsets(n_sites).collect(), Lookup::Direct),
        };
        let norms = vec![1.0; states.len()];

        log::debug!("spin-1/2 basis: {n_sites} sites, n_up {n_up:?}, dim {}", states.len());

        Ok(Self {
            n_sites,
            n_up,
            states,
            norms,
            symmetry: None,
            lookup,
        })
    }

    /// Representatives of the sector selected by `symmetry`.
    pub fn symmetric(n_sites: usize, n_up: Option<usize>, symmetry: Symmetry<B>) -> Result<Self> {
        check_capacity::<B>(n_sites)?;
        if let Some(n) = n_up {
            check_particles(n, n_sites)?;
        }
        symmetry.check_sites(n_sites)?;

        let n_prefix = PrefixIndex::prefix_bits(n_sites);
        let n_postfix = n_sites - n_prefix;
        let action = symmetry.action();

        let buckets: Vec<Vec<(B, f64)>> = (0..1usize << n_prefix)
            .into_par_iter()
            .map(|p| {
                let pre = B::from_u64(p as u64);
                let postfixes: Box<dyn Iterator<Item = B>> = match n_up {
                    Some(n) => {
                        let k = pre.popcount();
                        if k > n || n - k > n_postfix {
                            return Vec::new();
                        }
                        Box::new(Combinations::new(n_postfix, n - k))
                    }
                    None => Box::new(subsets(n_postfix)),
                };
                postfixes
                    .filter_map(|post| {
                        let state = combine(pre, post, n_postfix);
                        if action.representative(state) != state {
                            return None;
                        }
                        let norm = symmetry.norm(&action.stabilizer(state), |_| 1.0);
                        (norm > NORM_TOL).then_some((state, norm))
                    })
                    .collect()
            })
            .collect();

        let (states, norms): (Vec<B>, Vec<f64>) = buckets.into_iter().flatten().unzip();
        let lookup = Lookup::Prefix(PrefixIndex::new(&states, n_sites));

        log::debug!(
            "symmetric spin-1/2 basis: {n_sites} sites, n_up {n_up:?}, group order {}, dim {}",
            symmetry.order(),
            states.len()
        );

        Ok(Self {
            n_sites,
            n_up,
            states,
            norms,
            symmetry: Some(symmetry),
            lookup,
        })
    }

    /// Fixed number of up spins, `None` for the full space.
    pub fn n_up(&self) -> Option<usize> {
        self.n_up
    }

    pub fn n_sites(&self) -> usize {
        self.n_sites
    }

    /// Number of basis states (representatives).
    pub fn dim(&self) -> usize {
        self.states.len()
    }

    /// Representative at `idx`.
    pub fn state(&self, idx: usize) -> B {
        self.states[idx]
    }

    /// All representatives in increasing order.
    pub fn states(&self) -> &[B] {
        &self.states
    }

    /// Projected norm of the representative at `idx`; one without symmetry.
    pub fn norm(&self, idx: usize) -> f64 {
        self.norms[idx]
    }

    pub fn symmetry(&self) -> Option<&Symmetry<B>> {
        self.symmetry.as_ref()
    }

    fn in_sector(&self, state: B) -> bool {
        state & !mask::<B>(self.n_sites) == B::ZERO
            && self.n_up.map_or(true, |n| state.popcount() == n)
    }

    /// Basis index of the orbit containing `state`, if it survives the
    /// projection.
    pub fn index(&self, state: B) -> Option<usize> {
        if !self.in_sector(state) {
            return None;
        }
        match (&self.lookup, &self.symmetry) {
            (Lookup::Direct, _) => Some(state.to_u64() as usize),
            (Lookup::Lin(lin), _) => Some(lin.index(state)),
            (Lookup::Prefix(index), Some(sym)) => {
                index.find(&self.states, sym.action().representative(state))
            }
            (Lookup::Prefix(index), None) => index.find(&self.states, state),
        }
    }

    /// Index of the orbit of a raw `target` together with the factor
    /// `χ(g)* · N(out)`, where `g` maps `target` to its representative.
    #[inline]
    pub(crate) fn locate(&self, target: B) -> Option<(usize, Complex64)> {
        let one = Complex64::new(1.0, 0.0);
        match (&self.lookup, &self.symmetry) {
            (Lookup::Direct, _) => Some((target.to_u64() as usize, one)),
            (Lookup::Lin(lin), _) => Some((lin.index(target), one)),
            (Lookup::Prefix(index), Some(sym)) => {
                let (rep, g) = sym.action().representative_sym(target);
                let out = index.find(&self.states, rep)?;
                Some((out, sym.irrep().character(g).conj() * self.norms[out]))
            }
            (Lookup::Prefix(index), None) => index.find(&self.states, target).map(|i| (i, one)),
        }
    }
}
