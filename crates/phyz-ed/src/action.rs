//! Action of a permutation group on bit-packed states.
//!
//! Each group element gets one 256-entry lookup table per byte of the
//! word, so applying it costs `n_sites / 8` table reads. Fermionic signs
//! are computed from the permutation itself and optionally cached per
//! particle-number sector in a [`FermiTable`].

use crate::bits::{mask, BitState, Combinations};
use crate::error::{EdError, Result};
use crate::group::PermutationGroup;
use crate::lintable::LinTable;
use rayon::prelude::*;

/// A permutation group bound to a word type `B`.
#[derive(Debug, Clone)]
pub struct GroupAction<B> {
    n_sites: usize,
    n_symmetries: usize,
    n_chunks: usize,
    permutations: Vec<Vec<usize>>,
    /// `[g][h]` -> index of `g·h`.
    products: Vec<usize>,
    /// `[sym][chunk][byte]`.
    table: Vec<B>,
}

impl<B: BitState> GroupAction<B> {
    pub fn new(group: &PermutationGroup) -> Result<Self> {
        let n_sites = group.n_sites();
        if n_sites > B::BITS {
            return Err(EdError::CapacityExceeded {
                n_sites,
                bits: B::BITS,
            });
        }
        let n_symmetries = group.len();
        let n_chunks = n_sites.div_ceil(8);
        let mut table = vec![B::ZERO; n_symmetries * n_chunks * 256];

        for (sym, perm) in group.permutations().iter().enumerate() {
            for chunk in 0..n_chunks {
                let base = (sym * n_chunks + chunk) * 256;
                for byte in 0..256usize {
                    let mut image = B::ZERO;
                    for p in 0..8 {
                        let site = 8 * chunk + p;
                        if site < n_sites && (byte >> p) & 1 == 1 {
                            image = image | (B::ONE << perm[site]);
                        }
                    }
                    table[base + byte] = image;
                }
            }
        }

        log::debug!(
            "group action: {n_symmetries} elements on {n_sites} sites, {} table entries",
            table.len()
        );

        Ok(Self {
            n_sites,
            n_symmetries,
            n_chunks,
            permutations: group.permutations().to_vec(),
            products: (0..n_symmetries)
                .flat_map(|g| (0..n_symmetries).map(move |h| group.multiply(g, h)))
                .collect(),
            table,
        })
    }

    pub fn n_sites(&self) -> usize {
        self.n_sites
    }

    /// Group order.
    pub fn n_symmetries(&self) -> usize {
        self.n_symmetries
    }

    /// Site permutation of element `sym`.
    pub fn permutation(&self, sym: usize) -> &[usize] {
        &self.permutations[sym]
    }

    /// Index of the product `g·h` in the group the action was built from.
    pub fn multiply(&self, g: usize, h: usize) -> usize {
        self.products[g * self.n_symmetries + h]
    }

    /// Image of `state` under element `sym`.
    #[inline]
    pub fn apply(&self, sym: usize, state: B) -> B {
        let s = state.to_u64();
        let base = sym * self.n_chunks;
        let mut out = B::ZERO;
        for chunk in 0..self.n_chunks {
            let byte = ((s >> (8 * chunk)) & 0xff) as usize;
            out = out | self.table[(base + chunk) * 256 + byte];
        }
        out
    }

    /// Smallest state in the orbit of `state`.
    pub fn representative(&self, state: B) -> B {
        (0..self.n_symmetries)
            .map(|sym| self.apply(sym, state))
            .min()
            .unwrap_or(state)
    }

    /// Orbit minimum and the first element producing it.
    pub fn representative_sym(&self, state: B) -> (B, usize) {
        let mut rep = self.apply(0, state);
        let mut best = 0;
        for sym in 1..self.n_symmetries {
            let t = self.apply(sym, state);
            if t < rep {
                rep = t;
                best = sym;
            }
        }
        (rep, best)
    }

    /// Orbit minimum and every element mapping `state` onto it.
    pub fn representative_syms(&self, state: B) -> (B, Vec<usize>) {
        let rep = self.representative(state);
        let syms = (0..self.n_symmetries)
            .filter(|&sym| self.apply(sym, state) == rep)
            .collect();
        (rep, syms)
    }

    /// Elements leaving `state` unchanged.
    pub fn stabilizer(&self, state: B) -> Vec<usize> {
        (0..self.n_symmetries)
            .filter(|&sym| self.apply(sym, state) == state)
            .collect()
    }

    /// Sign of reordering `c†_{p(i1)} … c†_{p(ik)}` into ascending order,
    /// where `i1 < … < ik` are the occupied sites of `state`.
    pub fn fermi_sign(&self, sym: usize, state: B) -> f64 {
        let perm = &self.permutations[sym];
        let mut s = state.to_u64();
        let mut seen = 0u64;
        let mut inversions = 0u32;
        while s != 0 {
            let i = s.trailing_zeros() as usize;
            let target = perm[i];
            inversions += (seen & !mask::<u64>(target + 1)).count_ones();
            seen |= 1 << target;
            s &= s - 1;
        }
        if inversions % 2 == 0 {
            1.0
        } else {
            -1.0
        }
    }
}

/// Cached fermionic signs for every element and every state of one
/// particle-number sector.
#[derive(Debug, Clone)]
pub struct FermiTable {
    lin: LinTable,
    /// `[sym][lin index]`, `true` for a negative sign.
    negative: Vec<bool>,
}

impl FermiTable {
    pub fn new<B: BitState>(action: &GroupAction<B>, n_particles: usize) -> Self {
        let n_sites = action.n_sites();
        let lin = LinTable::new(n_sites, n_particles);
        let states: Vec<B> = Combinations::new(n_sites, n_particles).collect();
        let size = states.len();
        let mut negative = vec![false; action.n_symmetries() * size];

        negative
            .par_chunks_mut(size.max(1))
            .enumerate()
            .for_each(|(sym, row)| {
                for (slot, &state) in row.iter_mut().zip(&states) {
                    *slot = action.fermi_sign(sym, state) < 0.0;
                }
            });

        Self { lin, negative }
    }

    pub fn n_particles(&self) -> usize {
        self.lin.n_particles()
    }

    #[inline]
    pub fn sign<B: BitState>(&self, sym: usize, state: B) -> f64 {
        if self.negative[sym * self.lin.size() + self.lin.index(state)] {
            -1.0
        } else {
            1.0
        }
    }
}
