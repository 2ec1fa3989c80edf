//! Two-species (up, down) fermion configurations shared by the Electron and
//! t-J bases.
//!
//! A state is a pair of words `(u, d)` standing for
//! `(Π_{i ∈ u} c†_{i↑}) (Π_{j ∈ d} c†_{j↓}) |0⟩`, both products in ascending
//! site order. Pairs are grouped by the up configuration: for every up
//! representative `u` the basis holds a contiguous block of down
//! configurations.
//!
//! * Trivial stabilizer of `u`: every down configuration is its own
//!   representative with norm `sqrt(1/|G|)`; the block is indexed by a
//!   [`LinTable`] and shares one down-configuration list.
//! * Non-trivial stabilizer: the block lists the down configurations that
//!   are minimal under `Stab(u)` and survive the projection, with their
//!   norms.
//!
//! Without double occupancy (t-J) down configurations live on the holes of
//! `u` and are stored compressed onto `n_sites − n_up` bits.

use super::{check_capacity, check_particles, Symmetry, NORM_TOL};
use crate::action::FermiTable;
use crate::bits::{deposit, extract, mask, BitState, Combinations};
use crate::error::Result;
use crate::lintable::LinTable;
use num_complex::Complex64;
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub(crate) enum DnBlock<B> {
    Full,
    Listed { dns: Vec<B>, norms: Vec<f64> },
}

#[derive(Debug, Clone)]
struct PairSymmetry<B> {
    symmetry: Symmetry<B>,
    /// Raw up configuration (by lin index) → index of its representative.
    up_rep: Vec<usize>,
    /// Raw up configuration → elements mapping it to its representative.
    coset_offsets: Vec<usize>,
    cosets: Vec<usize>,
    fermi_up: FermiTable,
    fermi_dn: FermiTable,
    full_norm: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct PairSpace<B> {
    n_sites: usize,
    n_up: usize,
    n_dn: usize,
    exclusive: bool,
    ups: Vec<B>,
    offsets: Vec<usize>,
    blocks: Vec<DnBlock<B>>,
    /// Down configurations of a full block, compressed, in lin order.
    dns_full: Vec<B>,
    lin_up: LinTable,
    lin_dn: LinTable,
    symmetry: Option<PairSymmetry<B>>,
}

impl<B: BitState> PairSpace<B> {
    fn check(n_sites: usize, n_up: usize, n_dn: usize, exclusive: bool) -> Result<()> {
        check_capacity::<B>(n_sites)?;
        check_particles(n_up, n_sites)?;
        check_particles(n_dn, n_sites)?;
        if exclusive {
            check_particles(n_up + n_dn, n_sites)?;
        }
        Ok(())
    }

    fn dn_sites(n_sites: usize, n_up: usize, exclusive: bool) -> usize {
        if exclusive {
            n_sites - n_up
        } else {
            n_sites
        }
    }

    pub(crate) fn new(n_sites: usize, n_up: usize, n_dn: usize, exclusive: bool) -> Result<Self> {
        Self::check(n_sites, n_up, n_dn, exclusive)?;
        let dn_sites = Self::dn_sites(n_sites, n_up, exclusive);
        let lin_up = LinTable::new(n_sites, n_up);
        let lin_dn = LinTable::new(dn_sites, n_dn);
        let ups: Vec<B> = Combinations::new(n_sites, n_up).collect();
        let block = lin_dn.size();
        let offsets = (0..=ups.len()).map(|i| i * block).collect();
        let blocks = vec![DnBlock::Full; ups.len()];

        Ok(Self {
            n_sites,
            n_up,
            n_dn,
            exclusive,
            ups,
            offsets,
            blocks,
            dns_full: Combinations::new(dn_sites, n_dn).collect(),
            lin_up,
            lin_dn,
            symmetry: None,
        })
    }

    pub(crate) fn symmetric(
        n_sites: usize,
        n_up: usize,
        n_dn: usize,
        exclusive: bool,
        symmetry: Symmetry<B>,
    ) -> Result<Self> {
        Self::check(n_sites, n_up, n_dn, exclusive)?;
        symmetry.check_sites(n_sites)?;
        let dn_sites = Self::dn_sites(n_sites, n_up, exclusive);
        let action = symmetry.action();
        let lin_up = LinTable::new(n_sites, n_up);
        let lin_dn = LinTable::new(dn_sites, n_dn);
        let fermi_up = FermiTable::new(action, n_up);
        let fermi_dn = FermiTable::new(action, n_dn);

        let raw_ups: Vec<B> = Combinations::new(n_sites, n_up).collect();
        let orbits: Vec<(B, Vec<usize>)> = raw_ups
            .par_iter()
            .map(|&u| action.representative_syms(u))
            .collect();

        let mut ups = Vec::new();
        let mut rep_pos = vec![usize::MAX; raw_ups.len()];
        for (i, (&u, (rep, _))) in raw_ups.iter().zip(&orbits).enumerate() {
            if u == *rep {
                rep_pos[i] = ups.len();
                ups.push(u);
            }
        }

        let mut up_rep = Vec::with_capacity(raw_ups.len());
        let mut coset_offsets = Vec::with_capacity(raw_ups.len() + 1);
        let mut cosets = Vec::new();
        coset_offsets.push(0);
        for (rep, syms) in &orbits {
            up_rep.push(rep_pos[lin_up.index(*rep)]);
            cosets.extend_from_slice(syms);
            coset_offsets.push(cosets.len());
        }

        let blocks: Vec<DnBlock<B>> = ups
            .par_iter()
            .map(|&u| {
                let stab = action.stabilizer(u);
                if stab.len() == 1 {
                    return DnBlock::Full;
                }
                let holes = !u & mask::<B>(n_sites);
                let mut dns = Vec::new();
                let mut norms = Vec::new();
                for c in Combinations::<B>::new(dn_sites, n_dn) {
                    let d = if exclusive { deposit(c, holes) } else { c };
                    if stab.iter().any(|&g| action.apply(g, d) < d) {
                        continue;
                    }
                    let pair_stab: Vec<usize> = stab
                        .iter()
                        .copied()
                        .filter(|&g| action.apply(g, d) == d)
                        .collect();
                    let norm =
                        symmetry.norm(&pair_stab, |g| fermi_up.sign(g, u) * fermi_dn.sign(g, d));
                    if norm > NORM_TOL {
                        dns.push(d);
                        norms.push(norm);
                    }
                }
                DnBlock::Listed { dns, norms }
            })
            .collect();

        let mut offsets = Vec::with_capacity(ups.len() + 1);
        offsets.push(0);
        for block in &blocks {
            let size = match block {
                DnBlock::Full => lin_dn.size(),
                DnBlock::Listed { dns, .. } => dns.len(),
            };
            offsets.push(offsets[offsets.len() - 1] + size);
        }

        let full_norm = (1.0 / symmetry.order() as f64).sqrt();
        log::debug!(
            "pair basis: {n_sites} sites, ({n_up}, {n_dn}) particles, {} up representatives, dim {}",
            ups.len(),
            offsets[ups.len()]
        );

        Ok(Self {
            n_sites,
            n_up,
            n_dn,
            exclusive,
            ups,
            offsets,
            blocks,
            dns_full: Combinations::new(dn_sites, n_dn).collect(),
            lin_up,
            lin_dn,
            symmetry: Some(PairSymmetry {
                symmetry,
                up_rep,
                coset_offsets,
                cosets,
                fermi_up,
                fermi_dn,
                full_norm,
            }),
        })
    }

    pub(crate) fn n_sites(&self) -> usize {
        self.n_sites
    }

    pub(crate) fn n_up(&self) -> usize {
        self.n_up
    }

    pub(crate) fn n_dn(&self) -> usize {
        self.n_dn
    }

    pub(crate) fn dim(&self) -> usize {
        self.offsets[self.ups.len()]
    }

    pub(crate) fn symmetry(&self) -> Option<&Symmetry<B>> {
        self.symmetry.as_ref().map(|s| &s.symmetry)
    }

    pub(crate) fn exclusive(&self) -> bool {
        self.exclusive
    }

    fn full_norm(&self) -> f64 {
        self.symmetry.as_ref().map_or(1.0, |s| s.full_norm)
    }

    #[inline]
    fn compress(&self, u: B, d: B) -> B {
        if self.exclusive {
            extract(d, !u & mask::<B>(self.n_sites))
        } else {
            d
        }
    }

    #[inline]
    fn decompress(&self, u: B, c: B) -> B {
        if self.exclusive {
            deposit(c, !u & mask::<B>(self.n_sites))
        } else {
            c
        }
    }

    fn in_sector(&self, u: B, d: B) -> bool {
        let outside = !mask::<B>(self.n_sites);
        u & outside == B::ZERO
            && d & outside == B::ZERO
            && u.popcount() == self.n_up
            && d.popcount() == self.n_dn
            && !(self.exclusive && u & d != B::ZERO)
    }

    /// Call `f(idx, u, d, norm)` for every pair with index in `range`.
    pub(crate) fn for_each_pair<F>(&self, range: std::ops::Range<usize>, mut f: F)
    where
        F: FnMut(usize, B, B, f64),
    {
        if range.start >= range.end {
            return;
        }
        let full_norm = self.full_norm();
        let mut b = self.offsets.partition_point(|&o| o <= range.start) - 1;
        let mut idx = range.start;
        while idx < range.end {
            while self.offsets[b + 1] <= idx {
                b += 1;
            }
            let u = self.ups[b];
            let start = self.offsets[b];
            let end = self.offsets[b + 1].min(range.end);
            match &self.blocks[b] {
                DnBlock::Full => {
                    for i in idx..end {
                        f(i, u, self.decompress(u, self.dns_full[i - start]), full_norm);
                    }
                }
                DnBlock::Listed { dns, norms } => {
                    for i in idx..end {
                        f(i, u, dns[i - start], norms[i - start]);
                    }
                }
            }
            idx = end;
            b += 1;
        }
    }

    /// The `(up, down)` representative at `idx`.
    pub(crate) fn state(&self, idx: usize) -> (B, B) {
        let mut out = (B::ZERO, B::ZERO);
        self.for_each_pair(idx..idx + 1, |_, u, d, _| out = (u, d));
        out
    }

    pub(crate) fn norm(&self, idx: usize) -> f64 {
        let mut out = 0.0;
        self.for_each_pair(idx..idx + 1, |_, _, _, n| out = n);
        out
    }

    pub(crate) fn index(&self, u: B, d: B) -> Option<usize> {
        if !self.in_sector(u, d) {
            return None;
        }
        self.locate(u, d).map(|(i, _)| i)
    }

    /// Index of the orbit of the raw pair `(u, d)` and the factor
    /// `sign(g) · χ(g)* · N(out)` for the element `g` mapping it to its
    /// representative.
    #[inline]
    pub(crate) fn locate(&self, u: B, d: B) -> Option<(usize, Complex64)> {
        let ui = self.lin_up.index(u);
        let Some(ps) = &self.symmetry else {
            let out = self.offsets[ui] + self.lin_dn.index(self.compress(u, d));
            return Some((out, Complex64::new(1.0, 0.0)));
        };

        let action = ps.symmetry.action();
        let rep = ps.up_rep[ui];
        let coset = &ps.cosets[ps.coset_offsets[ui]..ps.coset_offsets[ui + 1]];
        let u_rep = self.ups[rep];

        let (out, g, norm) = match &self.blocks[rep] {
            DnBlock::Full => {
                let g = coset[0];
                let d_rep = action.apply(g, d);
                let k = self.lin_dn.index(self.compress(u_rep, d_rep));
                (self.offsets[rep] + k, g, ps.full_norm)
            }
            DnBlock::Listed { dns, norms } => {
                let (d_rep, g) = coset
                    .iter()
                    .map(|&g| (action.apply(g, d), g))
                    .min_by_key(|&(image, _)| image)?;
                let k = dns.binary_search(&d_rep).ok()?;
                (self.offsets[rep] + k, g, norms[k])
            }
        };

        let sign = ps.fermi_up.sign(g, u) * ps.fermi_dn.sign(g, d);
        Some((out, ps.symmetry.irrep().character(g).conj() * (sign * norm)))
    }
}
