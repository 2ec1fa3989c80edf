use super::owner;
use super::plan::{ExchangePlan, Route};
use crate::basis::{check_capacity, check_particles};
use crate::bits::{combine, mask, postfix, prefix, BitState, Combinations};
use crate::comm::Communicator;
use crate::error::Result;
use crate::lintable::LinTable;
use crate::ops::{OpKind, Sector};
use num_complex::Complex64;
use std::collections::HashMap;

pub(crate) static DISTRIBUTED_OPS: [OpKind; 3] = [OpKind::Exchange, OpKind::Ising, OpKind::Sz];

/// Contiguous run of states sharing their outer bits.
pub(crate) struct Block<'a, B> {
    pub offset: usize,
    pub outer: B,
    pub inner: &'a [B],
    pub lin: &'a LinTable,
}

/// Block-major storage: for every owned outer word, all inner words that
/// complete it to `n_up` particles, in combinatorial order.
#[derive(Debug, Clone)]
pub(crate) struct Layout<B> {
    n_up: usize,
    outer: Vec<B>,
    offsets: Vec<usize>,
    position: HashMap<B, usize>,
    /// Inner words by particle count.
    inner: Vec<Vec<B>>,
    lin: Vec<LinTable>,
}

impl<B: BitState> Layout<B> {
    fn new(n_outer: usize, n_inner: usize, n_up: usize, rank: usize, n_ranks: usize) -> Self {
        let k_min = n_up.saturating_sub(n_inner);
        let k_max = n_up.min(n_outer);

        let mut outer: Vec<B> = (k_min..=k_max)
            .flat_map(|k| Combinations::<B>::new(n_outer, k))
            .filter(|&w| owner(w, n_ranks) == rank)
            .collect();
        outer.sort_unstable();

        let max_inner = n_up.min(n_inner);
        let inner: Vec<Vec<B>> = (0..=max_inner)
            .map(|c| Combinations::new(n_inner, c).collect())
            .collect();
        let lin = (0..=max_inner).map(|c| LinTable::new(n_inner, c)).collect();

        let mut offsets = Vec::with_capacity(outer.len() + 1);
        offsets.push(0);
        for &w in &outer {
            let len = inner[n_up - w.popcount()].len();
            offsets.push(offsets[offsets.len() - 1] + len);
        }
        let position = outer.iter().enumerate().map(|(i, &w)| (w, i)).collect();

        Self {
            n_up,
            outer,
            offsets,
            position,
            inner,
            lin,
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.offsets[self.offsets.len() - 1]
    }

    pub(crate) fn blocks(&self) -> impl Iterator<Item = Block<'_, B>> {
        self.outer.iter().enumerate().map(move |(i, &w)| {
            let c = self.n_up - w.popcount();
            Block {
                offset: self.offsets[i],
                outer: w,
                inner: &self.inner[c],
                lin: &self.lin[c],
            }
        })
    }

    pub(crate) fn index(&self, outer: B, inner: B) -> Option<usize> {
        let &pos = self.position.get(&outer)?;
        let c = inner.popcount();
        if c + outer.popcount() != self.n_up {
            return None;
        }
        Some(self.offsets[pos] + self.lin.get(c)?.index(inner))
    }

    /// Outer and inner word at a position of the layout.
    fn entry(&self, idx: usize) -> Option<(B, B)> {
        if idx >= self.size() {
            return None;
        }
        let block = self.offsets.partition_point(|&o| o <= idx) - 1;
        let w = self.outer[block];
        let inner = self.inner[self.n_up - w.popcount()][idx - self.offsets[block]];
        Some((w, inner))
    }
}

/// Spin-1/2 basis with fixed `n_up`, partitioned by hashed prefix.
///
/// Construction is collective: every rank of `comm` must build the basis
/// with the same arguments.
pub struct SpinHalfDistributed<B, C> {
    comm: C,
    n_sites: usize,
    n_up: usize,
    n_postfix: usize,
    dim: usize,
    local: Layout<B>,
    transposed: Layout<B>,
    transpose: ExchangePlan,
}

impl<B: BitState, C: Communicator> SpinHalfDistributed<B, C> {
    pub fn new(n_sites: usize, n_up: usize, comm: C) -> Result<Self> {
        check_capacity::<B>(n_sites)?;
        check_particles(n_up, n_sites)?;

        let n_postfix = n_sites / 2;
        let n_prefix = n_sites - n_postfix;
        let (rank, n_ranks) = (comm.rank(), comm.size());

        let local = Layout::<B>::new(n_prefix, n_postfix, n_up, rank, n_ranks);
        let transposed = Layout::<B>::new(n_postfix, n_prefix, n_up, rank, n_ranks);

        // Prefix-major position -> owner of the postfix-major position.
        let mut routes: Vec<Vec<Route<B>>> = vec![Vec::new(); n_ranks];
        let one = Complex64::new(1.0, 0.0);
        for block in local.blocks() {
            for (i, &q) in block.inner.iter().enumerate() {
                routes[owner(q, n_ranks)].push(Route {
                    source: block.offset + i,
                    target: combine(block.outer, q, n_postfix),
                    coeff: one,
                });
            }
        }
        let transpose = ExchangePlan::build(&comm, routes, |s| {
            transposed.index(postfix(s, n_postfix), prefix(s, n_postfix))
        })?;

        let dim = comm.all_reduce_sum(local.size())?;
        log::debug!(
            "rank {rank}/{n_ranks}: {} of {dim} states, {} prefixes, {} transposed",
            local.size(),
            local.outer.len(),
            transposed.size()
        );

        Ok(Self {
            comm,
            n_sites,
            n_up,
            n_postfix,
            dim,
            local,
            transposed,
            transpose,
        })
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn n_sites(&self) -> usize {
        self.n_sites
    }

    pub fn n_up(&self) -> usize {
        self.n_up
    }

    /// Number of low bits forming the postfix.
    pub fn n_postfix(&self) -> usize {
        self.n_postfix
    }

    /// Global dimension, summed over ranks.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of states stored on this rank.
    pub fn size(&self) -> usize {
        self.local.size()
    }

    /// Rank owning `state`.
    pub fn owner(&self, state: B) -> usize {
        owner(prefix(state, self.n_postfix), self.comm.size())
    }

    /// Local position of `state`, `None` if it is owned elsewhere or outside
    /// the sector.
    pub fn index(&self, state: B) -> Option<usize> {
        if state.popcount() != self.n_up || state & !mask::<B>(self.n_sites) != B::ZERO {
            return None;
        }
        self.local
            .index(prefix(state, self.n_postfix), postfix(state, self.n_postfix))
    }

    pub fn state(&self, idx: usize) -> Option<B> {
        self.local
            .entry(idx)
            .map(|(p, q)| combine(p, q, self.n_postfix))
    }

    /// Local states in storage order.
    pub fn states(&self) -> impl Iterator<Item = B> + '_ {
        let n_postfix = self.n_postfix;
        self.local.blocks().flat_map(move |block| {
            let p = block.outer;
            block.inner.iter().map(move |&q| combine(p, q, n_postfix))
        })
    }

    pub(crate) fn sector(&self) -> Sector {
        Sector {
            n_sites: self.n_sites,
            basis: "SpinHalfDistributed",
            supported: &DISTRIBUTED_OPS,
            fixed_number: true,
        }
    }

    pub(crate) fn local(&self) -> &Layout<B> {
        &self.local
    }

    pub(crate) fn transposed(&self) -> &Layout<B> {
        &self.transposed
    }

    pub(crate) fn transpose_plan(&self) -> &ExchangePlan {
        &self.transpose
    }
}
