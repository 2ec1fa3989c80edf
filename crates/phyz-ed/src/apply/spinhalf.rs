//! Term kernels on the spin-1/2 basis.

use crate::basis::spinhalf::SPIN_OPS;
use crate::basis::{Basis, SpinHalf};
use crate::bits::{bit, pair_mask, BitState};
use crate::ops::{OpKind, Sector, Term};
use num_complex::Complex64;
use std::ops::Range;

#[inline]
fn sz<B: BitState>(state: B, site: usize) -> f64 {
    if bit(state, site) {
        0.5
    } else {
        -0.5
    }
}

/// Local index `b1 + 2·b2` of two sites.
#[inline]
pub(crate) fn local_index<B: BitState>(state: B, s1: usize, s2: usize) -> usize {
    bit(state, s1) as usize + 2 * bit(state, s2) as usize
}

/// `state` with sites `s1`, `s2` set to the local configuration `local`.
#[inline]
pub(crate) fn with_local<B: BitState>(state: B, s1: usize, s2: usize, local: usize) -> B {
    let mut out = state & !pair_mask::<B>(s1, s2);
    if local & 1 == 1 {
        out = out | (B::ONE << s1);
    }
    if local & 2 == 2 {
        out = out | (B::ONE << s2);
    }
    out
}

impl<B: BitState> SpinHalf<B> {
    #[inline]
    fn emit<F>(&self, idx: usize, target: B, coeff: Complex64, fill: &mut F)
    where
        F: FnMut(usize, usize, Complex64),
    {
        if let Some((out, factor)) = self.locate(target) {
            fill(out, idx, coeff * factor / self.norm(idx));
        }
    }

    fn diagonal<F, V>(&self, coupling: Complex64, range: Range<usize>, fill: &mut F, value: V)
    where
        F: FnMut(usize, usize, Complex64),
        V: Fn(B) -> f64,
    {
        for idx in range {
            let v = value(self.state(idx));
            if v != 0.0 {
                fill(idx, idx, coupling * v);
            }
        }
    }

    fn exchange<F>(&self, term: &Term, range: Range<usize>, fill: &mut F)
    where
        F: FnMut(usize, usize, Complex64),
    {
        let j = term.scalar();
        let (s1, s2) = term.pair();
        let flip = pair_mask::<B>(s1, s2);
        let zz = j.re * 0.25;

        for idx in range {
            let s = self.state(idx);
            let (b1, b2) = (bit(s, s1), bit(s, s2));
            if b1 == b2 {
                if zz != 0.0 {
                    fill(idx, idx, Complex64::new(zz, 0.0));
                }
                continue;
            }
            if zz != 0.0 {
                fill(idx, idx, Complex64::new(-zz, 0.0));
            }
            // S^+_1 S^-_2 acts on (down, up), its conjugate on (up, down).
            let coeff = if b2 { j * 0.5 } else { j.conj() * 0.5 };
            self.emit(idx, s ^ flip, coeff, fill);
        }
    }

    fn matrix<F>(&self, term: &Term, range: Range<usize>, fill: &mut F)
    where
        F: FnMut(usize, usize, Complex64),
    {
        let (s1, s2) = term.pair();
        let transitions = term.transitions();
        for idx in range {
            let s = self.state(idx);
            let local = local_index(s, s1, s2);
            for t in transitions.iter().filter(|t| t.from == local) {
                if t.to == local {
                    fill(idx, idx, t.coeff);
                } else {
                    self.emit(idx, with_local(s, s1, s2, t.to), t.coeff, fill);
                }
            }
        }
    }
}

impl<B: BitState> Basis for SpinHalf<B> {
    fn dim(&self) -> usize {
        SpinHalf::dim(self)
    }

    fn sector(&self) -> Sector {
        Sector {
            n_sites: SpinHalf::n_sites(self),
            basis: "SpinHalf",
            supported: &SPIN_OPS,
            fixed_number: self.n_up().is_some(),
        }
    }

    fn apply_term<F>(&self, term: &Term, range: Range<usize>, fill: &mut F)
    where
        F: FnMut(usize, usize, Complex64),
    {
        let c = term.scalar();
        match term.kind {
            OpKind::Exchange => self.exchange(term, range, fill),
            OpKind::Ising => {
                let (s1, s2) = term.pair();
                self.diagonal(c, range, fill, |s| sz(s, s1) * sz(s, s2));
            }
            OpKind::Sz => {
                let site = term.sites[0];
                self.diagonal(c, range, fill, |s| sz(s, site));
            }
            OpKind::Matrix => self.matrix(term, range, fill),
            _ => {}
        }
    }
}
