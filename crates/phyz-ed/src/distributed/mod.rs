//! Spin-1/2 basis partitioned across communicator ranks.
//!
//! A state is split into its `n_sites / 2` low bits (the postfix) and the
//! remaining high bits (the prefix). Each rank owns the prefixes that hash to
//! it and stores, for each, the full block of compatible postfixes. A second,
//! transposed layout groups states by postfix instead, so that terms acting
//! only on prefix sites become block-local after an all-to-all transpose.

mod apply;
mod basis;
mod plan;

pub use apply::DistributedOperator;
pub use basis::SpinHalfDistributed;

use crate::bits::BitState;

/// 64-bit finalizer mix (MurmurHash3 `fmix64`).
#[inline]
pub fn fmix64(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51_afd7_ed55_8ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    k ^= k >> 33;
    k
}

/// Rank owning a prefix (or, in the transposed layout, a postfix).
#[inline]
pub fn owner<B: BitState>(word: B, n_ranks: usize) -> usize {
    (fmix64(word.to_u64()) % n_ranks.max(1) as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmix64() {
        assert_eq!(fmix64(0), 0);
        assert_ne!(fmix64(1), fmix64(2));
        assert_ne!(fmix64(1), 1);
    }

    #[test]
    fn test_owner_in_range() {
        for w in 0u32..256 {
            assert!(owner(w, 3) < 3);
            assert_eq!(owner(w, 1), 0);
        }
        // Consecutive prefixes spread over ranks.
        let hits = (0u32..64).filter(|&w| owner(w, 4) == 0).count();
        assert!(hits > 4 && hits < 32, "{hits}");
    }
}
