//! Hubbard-type (Electron) and t-J bases at fixed `(n_up, n_dn)`.

use super::pairs::PairSpace;
use super::{Basis, Symmetry};
use crate::bits::BitState;
use crate::error::Result;
use crate::ops::{OpKind, Sector, Term};
use num_complex::Complex64;
use std::ops::Range;

pub(crate) static ELECTRON_OPS: [OpKind; 11] = [
    OpKind::Hop,
    OpKind::HopUp,
    OpKind::HopDn,
    OpKind::Exchange,
    OpKind::Ising,
    OpKind::Sz,
    OpKind::Number,
    OpKind::NumberUp,
    OpKind::NumberDn,
    OpKind::NumberNumber,
    OpKind::HubbardU,
];

pub(crate) static TJ_OPS: [OpKind; 10] = [
    OpKind::Hop,
    OpKind::HopUp,
    OpKind::HopDn,
    OpKind::Exchange,
    OpKind::Ising,
    OpKind::Sz,
    OpKind::Number,
    OpKind::NumberUp,
    OpKind::NumberDn,
    OpKind::NumberNumber,
];

macro_rules! pair_basis {
    ($name:ident, $label:literal, $exclusive:literal, $ops:ident) => {
        #[derive(Debug, Clone)]
        pub struct $name<B = u64> {
            space: PairSpace<B>,
        }

        impl<B: BitState> $name<B> {
            pub fn new(n_sites: usize, n_up: usize, n_dn: usize) -> Result<Self> {
                let space = PairSpace::new(n_sites, n_up, n_dn, $exclusive)?;
                log::debug!(
                    "{} basis: {n_sites} sites, ({n_up}, {n_dn}) particles, dim {}",
                    $label,
                    space.dim()
                );
                Ok(Self { space })
            }

            pub fn symmetric(
                n_sites: usize,
                n_up: usize,
                n_dn: usize,
                symmetry: Symmetry<B>,
            ) -> Result<Self> {
                Ok(Self {
                    space: PairSpace::symmetric(n_sites, n_up, n_dn, $exclusive, symmetry)?,
                })
            }

            pub fn n_sites(&self) -> usize {
                self.space.n_sites()
            }

            pub fn n_up(&self) -> usize {
                self.space.n_up()
            }

            pub fn n_dn(&self) -> usize {
                self.space.n_dn()
            }

            /// Number of `(up, down)` basis states.
            pub fn dim(&self) -> usize {
                self.space.dim()
            }

            pub fn symmetry(&self) -> Option<&Symmetry<B>> {
                self.space.symmetry()
            }

            /// The `(up, down)` representative at `idx`.
            pub fn state(&self, idx: usize) -> (B, B) {
                self.space.state(idx)
            }

            /// Projected norm of the state at `idx`.
            pub fn norm(&self, idx: usize) -> f64 {
                self.space.norm(idx)
            }

            /// Basis index of the orbit containing `(up, dn)`.
            pub fn index(&self, up: B, dn: B) -> Option<usize> {
                self.space.index(up, dn)
            }
        }

        impl<B: BitState> Basis for $name<B> {
            fn dim(&self) -> usize {
                self.space.dim()
            }

            fn sector(&self) -> Sector {
                Sector {
                    n_sites: self.space.n_sites(),
                    basis: $label,
                    supported: &$ops,
                    fixed_number: true,
                }
            }

            fn apply_term<F>(&self, term: &Term, range: Range<usize>, fill: &mut F)
            where
                F: FnMut(usize, usize, Complex64),
            {
                self.space.apply_term(term, range, fill);
            }
        }
    };
}

pair_basis!(Electron, "Electron", false, ELECTRON_OPS);
pair_basis!(Tj, "tJ", true, TJ_OPS);
