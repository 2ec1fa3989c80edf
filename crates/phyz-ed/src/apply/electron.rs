//! Term kernels on two-species fermion bases.
//!
//! Both species share one ordering convention: all up operators to the left
//! of all down operators, each in ascending site order. A hop of either
//! species then only crosses particles of its own species, and a spin flip
//! `S^+_1 S^-_2 = −(c†_{1↑} c_{2↑})(c†_{2↓} c_{1↓})` picks up the product of
//! both crossing signs with an extra minus.

use crate::basis::pairs::PairSpace;
use crate::bits::{bit, crossing_sign, pair_mask, BitState};
use crate::ops::{OpKind, Term};
use num_complex::Complex64;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Species {
    Up,
    Dn,
}

#[inline]
fn occ<B: BitState>(state: B, site: usize) -> f64 {
    bit(state, site) as u8 as f64
}

#[inline]
fn sz<B: BitState>(u: B, d: B, site: usize) -> f64 {
    0.5 * (occ(u, site) - occ(d, site))
}

impl<B: BitState> PairSpace<B> {
    pub(crate) fn apply_term<F>(&self, term: &Term, range: Range<usize>, fill: &mut F)
    where
        F: FnMut(usize, usize, Complex64),
    {
        let c = term.scalar();
        let site = |i: usize| term.sites[i];
        match term.kind {
            OpKind::Hop => {
                self.hop(term, Species::Up, range.clone(), fill);
                self.hop(term, Species::Dn, range, fill);
            }
            OpKind::HopUp => self.hop(term, Species::Up, range, fill),
            OpKind::HopDn => self.hop(term, Species::Dn, range, fill),
            OpKind::Exchange => self.exchange(term, range, fill),
            OpKind::Ising => {
                let (a, b) = (site(0), site(1));
                self.diagonal(c, range, fill, |u, d| sz(u, d, a) * sz(u, d, b));
            }
            OpKind::Sz => {
                let a = site(0);
                self.diagonal(c, range, fill, |u, d| sz(u, d, a));
            }
            OpKind::Number => {
                let a = site(0);
                self.diagonal(c, range, fill, |u, d| occ(u, a) + occ(d, a));
            }
            OpKind::NumberUp => {
                let a = site(0);
                self.diagonal(c, range, fill, |u, _| occ(u, a));
            }
            OpKind::NumberDn => {
                let a = site(0);
                self.diagonal(c, range, fill, |_, d| occ(d, a));
            }
            OpKind::NumberNumber => {
                let (a, b) = (site(0), site(1));
                self.diagonal(c, range, fill, |u, d| {
                    (occ(u, a) + occ(d, a)) * (occ(u, b) + occ(d, b))
                });
            }
            OpKind::HubbardU => {
                self.diagonal(c, range, fill, |u, d| (u & d).popcount() as f64);
            }
            OpKind::Matrix => {}
        }
    }

    fn diagonal<F, V>(&self, coupling: Complex64, range: Range<usize>, fill: &mut F, value: V)
    where
        F: FnMut(usize, usize, Complex64),
        V: Fn(B, B) -> f64,
    {
        self.for_each_pair(range, |idx, u, d, _| {
            let v = value(u, d);
            if v != 0.0 {
                fill(idx, idx, coupling * v);
            }
        });
    }

    fn hop<F>(&self, term: &Term, species: Species, range: Range<usize>, fill: &mut F)
    where
        F: FnMut(usize, usize, Complex64),
    {
        let t = term.scalar();
        let (s1, s2) = term.pair();
        let flip = pair_mask::<B>(s1, s2);
        let exclusive = self.exclusive();

        self.for_each_pair(range, |idx, u, d, norm| {
            let (x, other) = match species {
                Species::Up => (u, d),
                Species::Dn => (d, u),
            };
            let (b1, b2) = (bit(x, s1), bit(x, s2));
            if b1 == b2 {
                return;
            }
            let dest = if b2 { s1 } else { s2 };
            if exclusive && bit(other, dest) {
                return;
            }
            // c†_1 c_2 moves a particle from site 2 to site 1.
            let coeff = if b2 { -t } else { -t.conj() };
            let moved = x ^ flip;
            let (u2, d2) = match species {
                Species::Up => (moved, d),
                Species::Dn => (u, moved),
            };
            if let Some((out, factor)) = self.locate(u2, d2) {
                fill(out, idx, coeff * crossing_sign(x, s1, s2) * factor / norm);
            }
        });
    }

    fn exchange<F>(&self, term: &Term, range: Range<usize>, fill: &mut F)
    where
        F: FnMut(usize, usize, Complex64),
    {
        let j = term.scalar();
        let (s1, s2) = term.pair();
        let flip = pair_mask::<B>(s1, s2);

        self.for_each_pair(range, |idx, u, d, norm| {
            let zz = j.re * sz(u, d, s1) * sz(u, d, s2);
            if zz != 0.0 {
                fill(idx, idx, Complex64::new(zz, 0.0));
            }

            let (u1, d1, u2, d2) = (bit(u, s1), bit(d, s1), bit(u, s2), bit(d, s2));
            let coeff = if !u1 && d1 && u2 && !d2 {
                j * 0.5
            } else if u1 && !d1 && !u2 && d2 {
                j.conj() * 0.5
            } else {
                return;
            };
            let sign = -crossing_sign(u, s1, s2) * crossing_sign(d, s1, s2);
            if let Some((out, factor)) = self.locate(u ^ flip, d ^ flip) {
                fill(out, idx, coeff * sign * factor / norm);
            }
        });
    }
}
