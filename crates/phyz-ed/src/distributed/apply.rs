use super::basis::{Layout, SpinHalfDistributed};
use super::owner;
use super::plan::{Buffers, ExchangePlan, Route};
use crate::bits::{bit, combine, pair_mask, postfix, prefix, BitState};
use crate::comm::Communicator;
use crate::error::{EdError, Result};
use crate::ops::{OpKind, OpList, Term};
use num_complex::Complex64;

/// Off-diagonal half of an exchange term on two sites of one word.
#[derive(Debug, Clone, Copy)]
struct Flip {
    s1: usize,
    s2: usize,
    j: Complex64,
}

impl Flip {
    #[inline]
    fn target<B: BitState>(&self, state: B) -> Option<(B, Complex64)> {
        let (b1, b2) = (bit(state, self.s1), bit(state, self.s2));
        if b1 == b2 {
            return None;
        }
        let coeff = if b2 { self.j * 0.5 } else { self.j.conj() * 0.5 };
        Some((state ^ pair_mask::<B>(self.s1, self.s2), coeff))
    }

    /// Apply within every block of `layout`, whose inner words hold the
    /// flipped sites.
    fn apply_blocks<B: BitState>(&self, layout: &Layout<B>, x: &[Complex64], y: &mut [Complex64]) {
        for block in layout.blocks() {
            for (i, &w) in block.inner.iter().enumerate() {
                if let Some((t, c)) = self.target(w) {
                    y[block.offset + block.lin.index(t)] += c * x[block.offset + i];
                }
            }
        }
    }
}

#[inline]
fn sz<B: BitState>(state: B, site: usize) -> f64 {
    if bit(state, site) {
        0.5
    } else {
        -0.5
    }
}

fn diagonal_value<B: BitState>(terms: &[Term], state: B) -> Complex64 {
    let mut v = Complex64::new(0.0, 0.0);
    for term in terms {
        match term.kind {
            OpKind::Exchange => {
                let (s1, s2) = term.pair();
                v += term.scalar().re * sz(state, s1) * sz(state, s2);
            }
            OpKind::Ising => {
                let (s1, s2) = term.pair();
                v += term.scalar() * (sz(state, s1) * sz(state, s2));
            }
            OpKind::Sz => v += term.scalar() * sz(state, term.sites[0]),
            _ => {}
        }
    }
    v
}

/// A term list compiled against a distributed basis.
///
/// Each exchange flip is routed by where its sites fall: both in the
/// postfix, both in the prefix, or one in each.
pub struct DistributedOperator<'a, B, C> {
    basis: &'a SpinHalfDistributed<B, C>,
    diagonal: Vec<Term>,
    postfix: Vec<Flip>,
    /// Sites relative to the prefix.
    prefix: Vec<Flip>,
    mixed_flips: Vec<Flip>,
    mixed: Vec<ExchangePlan>,
    buffer_len: usize,
}

impl<'a, B: BitState, C: Communicator> DistributedOperator<'a, B, C> {
    /// Collective: builds one exchange plan per mixed term.
    pub fn new(ops: &OpList, basis: &'a SpinHalfDistributed<B, C>) -> Result<Self> {
        let terms = ops.compile(&basis.sector())?;
        let comm = basis.comm();
        let n_postfix = basis.n_postfix();
        let n_ranks = comm.size();

        let mut diagonal = Vec::new();
        let mut postfix_flips = Vec::new();
        let mut prefix_flips = Vec::new();
        let mut mixed_flips = Vec::new();
        let mut mixed = Vec::new();

        for term in terms {
            if term.kind != OpKind::Exchange {
                diagonal.push(term);
                continue;
            }
            let (s1, s2) = term.pair();
            let j = term.scalar();
            diagonal.push(term);
            if j == Complex64::new(0.0, 0.0) {
                continue;
            }
            match (s1 < n_postfix, s2 < n_postfix) {
                (true, true) => postfix_flips.push(Flip { s1, s2, j }),
                (false, false) => prefix_flips.push(Flip {
                    s1: s1 - n_postfix,
                    s2: s2 - n_postfix,
                    j,
                }),
                _ => {
                    let flip = Flip { s1, s2, j };
                    let mut routes: Vec<Vec<Route<B>>> = vec![Vec::new(); n_ranks];
                    for block in basis.local().blocks() {
                        for (i, &q) in block.inner.iter().enumerate() {
                            let s = combine(block.outer, q, n_postfix);
                            if let Some((t, coeff)) = flip.target(s) {
                                routes[owner(prefix(t, n_postfix), n_ranks)].push(Route {
                                    source: block.offset + i,
                                    target: t,
                                    coeff,
                                });
                            }
                        }
                    }
                    let local = basis.local();
                    mixed.push(ExchangePlan::build(comm, routes, |t| {
                        local.index(prefix(t, n_postfix), postfix(t, n_postfix))
                    })?);
                    mixed_flips.push(flip);
                }
            }
        }

        let mut needed = basis.transpose_plan().capacity();
        for plan in &mixed {
            needed = needed.max(plan.capacity());
        }
        let buffer_len = comm.all_reduce_max(needed)?;

        log::debug!(
            "rank {}: {} diagonal, {} postfix, {} prefix, {} mixed terms; buffers of {}",
            comm.rank(),
            diagonal.len(),
            postfix_flips.len(),
            prefix_flips.len(),
            mixed.len(),
            buffer_len
        );

        Ok(Self {
            basis,
            diagonal,
            postfix: postfix_flips,
            prefix: prefix_flips,
            mixed_flips,
            mixed,
            buffer_len,
        })
    }

    /// Local size of the vectors passed to [`apply`](Self::apply).
    pub fn size(&self) -> usize {
        self.basis.size()
    }

    /// Report every non-zero element `⟨out|H|in⟩` whose input is stored on
    /// this rank as `fill(out, in, value)`.
    ///
    /// `in` is a local position; `out` is the output state itself, since it
    /// may be owned by another rank (see [`SpinHalfDistributed::owner`]).
    /// No communication takes place.
    pub fn for_each_element<F>(&self, mut fill: F)
    where
        F: FnMut(B, usize, Complex64),
    {
        let n_postfix = self.basis.n_postfix();
        let zero = Complex64::new(0.0, 0.0);
        for block in self.basis.local().blocks() {
            let p = block.outer;
            for (i, &q) in block.inner.iter().enumerate() {
                let idx = block.offset + i;
                let s = combine(p, q, n_postfix);
                let d = diagonal_value(&self.diagonal, s);
                if d != zero {
                    fill(s, idx, d);
                }
                for flip in &self.postfix {
                    if let Some((t, c)) = flip.target(q) {
                        fill(combine(p, t, n_postfix), idx, c);
                    }
                }
                for flip in &self.prefix {
                    if let Some((t, c)) = flip.target(p) {
                        fill(combine(t, q, n_postfix), idx, c);
                    }
                }
                for flip in &self.mixed_flips {
                    if let Some((t, c)) = flip.target(s) {
                        fill(t, idx, c);
                    }
                }
            }
        }
    }

    /// Collective `y = H x` on this rank's slice of the vectors.
    pub fn apply(&self, x: &[Complex64], y: &mut [Complex64]) -> Result<()> {
        let size = self.basis.size();
        for len in [x.len(), y.len()] {
            if len != size {
                return Err(EdError::DimensionMismatch {
                    expected: size,
                    got: len,
                });
            }
        }

        let zero = Complex64::new(0.0, 0.0);
        let comm = self.basis.comm();
        let n_postfix = self.basis.n_postfix();
        let local = self.basis.local();
        y.fill(zero);

        if !self.diagonal.is_empty() {
            for block in local.blocks() {
                for (i, &q) in block.inner.iter().enumerate() {
                    let idx = block.offset + i;
                    let s = combine(block.outer, q, n_postfix);
                    y[idx] += diagonal_value(&self.diagonal, s) * x[idx];
                }
            }
        }

        for flip in &self.postfix {
            flip.apply_blocks(local, x, y);
        }

        let mut buffers = Buffers::new(self.buffer_len);

        if !self.prefix.is_empty() {
            let transposed = self.basis.transposed();
            let transpose = self.basis.transpose_plan();
            let mut xt = vec![zero; transposed.size()];
            let mut yt = vec![zero; transposed.size()];
            transpose.forward(comm, x, &mut xt, &mut buffers)?;
            for flip in &self.prefix {
                flip.apply_blocks(transposed, &xt, &mut yt);
            }
            transpose.backward(comm, &yt, y, &mut buffers)?;
        }

        for plan in &self.mixed {
            plan.forward(comm, x, y, &mut buffers)?;
        }
        Ok(())
    }
}
