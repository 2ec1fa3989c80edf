//! Combinatorial index of fixed-popcount states.
//!
//! The rank of a word with set bits `c_0 < c_1 < … < c_{k-1}` among all
//! words with `k` set bits (in increasing numeric order) is
//! `Σ_j C(c_j, j + 1)`. Splitting the word into bytes, the contribution of
//! each byte only depends on the byte value, its position, and the number of
//! set bits below it, so it is tabulated once and a lookup costs one table
//! read per byte.

use crate::bits::{binomial, BitState};

#[derive(Debug, Clone)]
pub struct LinTable {
    n_sites: usize,
    n_particles: usize,
    size: usize,
    n_chunks: usize,
    /// `[chunk][offset][byte]`, offset in `0..=n_particles`.
    table: Vec<u64>,
}

impl LinTable {
    pub fn new(n_sites: usize, n_particles: usize) -> Self {
        let n_chunks = n_sites.div_ceil(8).max(1);
        let n_offsets = n_particles + 1;
        let mut table = vec![0u64; n_chunks * n_offsets * 256];

        for chunk in 0..n_chunks {
            for offset in 0..n_offsets {
                let base = (chunk * n_offsets + offset) * 256;
                for byte in 0..256usize {
                    let mut rank = 0u64;
                    let mut local = 0;
                    for p in 0..8 {
                        if (byte >> p) & 1 == 0 {
                            continue;
                        }
                        let site = 8 * chunk + p;
                        if site < n_sites {
                            rank += binomial(site, offset + local + 1);
                        }
                        local += 1;
                    }
                    table[base + byte] = rank;
                }
            }
        }

        Self {
            n_sites,
            n_particles,
            size: binomial(n_sites, n_particles) as usize,
            n_chunks,
            table,
        }
    }

    pub fn n_sites(&self) -> usize {
        self.n_sites
    }

    pub fn n_particles(&self) -> usize {
        self.n_particles
    }

    /// Number of states with `n_particles` set bits on `n_sites`.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Rank of `state`, which must have exactly `n_particles` set bits.
    #[inline]
    pub fn index<B: BitState>(&self, state: B) -> usize {
        debug_assert_eq!(state.popcount(), self.n_particles);
        let n_offsets = self.n_particles + 1;
        let mut s = state.to_u64();
        let mut idx = 0u64;
        let mut offset = 0;
        for chunk in 0..self.n_chunks {
            let byte = (s & 0xff) as usize;
            idx += self.table[(chunk * n_offsets + offset.min(self.n_particles)) * 256 + byte];
            offset += byte.count_ones() as usize;
            s >>= 8;
        }
        idx as usize
    }
}
