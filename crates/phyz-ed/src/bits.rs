//! Bit-packed product states.
//!
//! A basis configuration on `n` sites is a word whose low `n` bits mark the
//! occupied sites (up spins for spin-1/2, one particle species for
//! fermions). Call sites only touch words through the named operations
//! here: flip, extract, deposit, popcount-in-range, prefix/postfix split.

use std::fmt::{Binary, Debug};
use std::hash::Hash;
use std::marker::PhantomData;
use std::ops::{BitAnd, BitOr, BitXor, Not, Shl, Shr};

/// Fixed-width unsigned word holding one product-basis configuration.
pub trait BitState:
    Copy
    + Default
    + Eq
    + Ord
    + Hash
    + Debug
    + Binary
    + Send
    + Sync
    + 'static
    + BitAnd<Output = Self>
    + BitOr<Output = Self>
    + BitXor<Output = Self>
    + Not<Output = Self>
    + Shl<usize, Output = Self>
    + Shr<usize, Output = Self>
{
    /// Capacity in sites.
    const BITS: usize;
    const ZERO: Self;
    const ONE: Self;

    /// Truncating conversion from a 64-bit word.
    fn from_u64(x: u64) -> Self;
    fn to_u64(self) -> u64;
    fn popcount(self) -> usize;
    fn trailing_zeros(self) -> usize;
}

macro_rules! impl_bit_state {
    ($($t:ty),*) => {
        $(
            impl BitState for $t {
                const BITS: usize = <$t>::BITS as usize;
                const ZERO: Self = 0;
                const ONE: Self = 1;

                #[inline]
                fn from_u64(x: u64) -> Self {
                    x as $t
                }

                #[inline]
                fn to_u64(self) -> u64 {
                    self as u64
                }

                #[inline]
                fn popcount(self) -> usize {
                    self.count_ones() as usize
                }

                #[inline]
                fn trailing_zeros(self) -> usize {
                    <$t>::trailing_zeros(self) as usize
                }
            }
        )*
    };
}

impl_bit_state!(u16, u32, u64);

/// Smallest supported word width holding `n_sites` bits.
pub fn width_for(n_sites: usize) -> Option<usize> {
    match n_sites {
        0..=16 => Some(16),
        17..=32 => Some(32),
        33..=64 => Some(64),
        _ => None,
    }
}

/// Word with the low `n` bits set.
#[inline]
pub fn mask<B: BitState>(n: usize) -> B {
    if n == 0 {
        B::ZERO
    } else if n >= B::BITS {
        !B::ZERO
    } else {
        !B::ZERO >> (B::BITS - n)
    }
}

/// Occupation of site `i`.
#[inline]
pub fn bit<B: BitState>(state: B, i: usize) -> bool {
    (state >> i) & B::ONE == B::ONE
}

/// Toggle the occupation of site `i`.
#[inline]
pub fn flip<B: BitState>(state: B, i: usize) -> B {
    state ^ (B::ONE << i)
}

/// Mask with sites `i` and `j` set.
#[inline]
pub fn pair_mask<B: BitState>(i: usize, j: usize) -> B {
    (B::ONE << i) | (B::ONE << j)
}

/// Mask of the sites strictly between `i` and `j`.
#[inline]
pub fn between<B: BitState>(i: usize, j: usize) -> B {
    let (lo, hi) = if i < j { (i, j) } else { (j, i) };
    mask::<B>(hi) ^ mask::<B>((lo + 1).min(hi))
}

/// Number of occupied sites in `[lo, hi)`.
#[inline]
pub fn popcount_range<B: BitState>(state: B, lo: usize, hi: usize) -> usize {
    if hi <= lo {
        return 0;
    }
    (state & (mask::<B>(hi) ^ mask::<B>(lo))).popcount()
}

/// `+1` for even `n`, `-1` for odd.
#[inline]
pub fn parity_sign(n: usize) -> f64 {
    if n % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}

/// Sign picked up by moving a fermion from `j` to `i` past the occupied
/// sites of `state` in between.
#[inline]
pub fn crossing_sign<B: BitState>(state: B, i: usize, j: usize) -> f64 {
    parity_sign((state & between::<B>(i, j)).popcount())
}

/// Gather the bits of `state` selected by `mask` into the low bits (pext).
pub fn extract<B: BitState>(state: B, mask: B) -> B {
    let s = state.to_u64();
    let mut m = mask.to_u64();
    let mut out = 0u64;
    let mut k = 0;
    while m != 0 {
        let i = m.trailing_zeros();
        if (s >> i) & 1 == 1 {
            out |= 1 << k;
        }
        k += 1;
        m &= m - 1;
    }
    B::from_u64(out)
}

/// Scatter the low bits of `src` onto the set bits of `mask` (pdep).
pub fn deposit<B: BitState>(src: B, mask: B) -> B {
    let s = src.to_u64();
    let mut m = mask.to_u64();
    let mut out = 0u64;
    let mut k = 0;
    while m != 0 {
        let i = m.trailing_zeros();
        if (s >> k) & 1 == 1 {
            out |= 1 << i;
        }
        k += 1;
        m &= m - 1;
    }
    B::from_u64(out)
}

/// High bits above the `n_postfix` low bits.
#[inline]
pub fn prefix<B: BitState>(state: B, n_postfix: usize) -> B {
    if n_postfix >= B::BITS {
        B::ZERO
    } else {
        state >> n_postfix
    }
}

/// The `n_postfix` low bits.
#[inline]
pub fn postfix<B: BitState>(state: B, n_postfix: usize) -> B {
    state & mask::<B>(n_postfix)
}

/// Inverse of the prefix/postfix split.
#[inline]
pub fn combine<B: BitState>(prefix: B, postfix: B, n_postfix: usize) -> B {
    if n_postfix >= B::BITS {
        postfix
    } else {
        (prefix << n_postfix) | postfix
    }
}

/// Binomial coefficient C(n, k), zero when `k > n`.
pub fn binomial(n: usize, k: usize) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut r: u128 = 1;
    for i in 0..k {
        r = r * (n - i) as u128 / (i + 1) as u128;
    }
    r as u64
}

/// All words with `k` of the low `n` bits set, in increasing numeric order.
///
/// Uses Gosper's hack; the number of remaining states is tracked so the
/// step past the last combination (which would overflow) is never taken.
#[derive(Debug, Clone)]
pub struct Combinations<B> {
    current: u64,
    remaining: u64,
    _word: PhantomData<B>,
}

impl<B: BitState> Combinations<B> {
    pub fn new(n: usize, k: usize) -> Self {
        let remaining = if k > n { 0 } else { binomial(n, k) };
        Self {
            current: mask::<u64>(k),
            remaining,
            _word: PhantomData,
        }
    }
}

#[inline]
fn next_combination(x: u64) -> u64 {
    let c = x & x.wrapping_neg();
    let r = x.wrapping_add(c);
    (((r ^ x) >> 2) / c) | r
}

impl<B: BitState> Iterator for Combinations<B> {
    type Item = B;

    fn next(&mut self) -> Option<B> {
        if self.remaining == 0 {
            return None;
        }
        let state = self.current;
        self.remaining -= 1;
        if self.remaining > 0 {
            self.current = next_combination(self.current);
        }
        Some(B::from_u64(state))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (n, Some(n))
    }
}

/// All words on the low `n` bits, in increasing numeric order.
pub fn subsets<B: BitState>(n: usize) -> impl Iterator<Item = B> {
    (0..=mask::<u64>(n)).map(B::from_u64)
}
