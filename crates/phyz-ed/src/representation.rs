//! One-dimensional representations (characters) of permutation groups.

use crate::error::{EdError, Result};
use crate::group::PermutationGroup;
use num_complex::Complex64;
use std::f64::consts::PI;

/// Tolerance on `|χ| = 1` and `χ(g)χ(h) = χ(gh)`.
pub const CHARACTER_TOL: f64 = 1e-8;

/// Characters `χ(g)` of a one-dimensional irrep, one per group element.
#[derive(Debug, Clone, PartialEq)]
pub struct Representation {
    characters: Vec<Complex64>,
}

impl Representation {
    /// Validate `characters` against the multiplication table of `group`.
    pub fn new(group: &PermutationGroup, characters: Vec<Complex64>) -> Result<Self> {
        if characters.len() != group.len() {
            return Err(EdError::RepresentationSize {
                expected: group.len(),
                got: characters.len(),
            });
        }
        for (index, c) in characters.iter().enumerate() {
            let modulus = c.norm();
            if (modulus - 1.0).abs() > CHARACTER_TOL {
                return Err(EdError::NotUnitary { index, modulus });
            }
        }
        let rep = Self { characters };
        rep.check_multiplicative(|g, h| group.multiply(g, h))?;
        Ok(rep)
    }

    /// Check `χ(g)χ(h) = χ(gh)` against a product table of the same order.
    pub fn check_multiplicative<M>(&self, multiply: M) -> Result<()>
    where
        M: Fn(usize, usize) -> usize,
    {
        let order = self.characters.len();
        for g in 0..order {
            for h in 0..order {
                let gh = multiply(g, h);
                if (self.characters[g] * self.characters[h] - self.characters[gh]).norm()
                    > CHARACTER_TOL
                {
                    return Err(EdError::NotMultiplicative { g, h });
                }
            }
        }
        Ok(())
    }

    /// Real characters, e.g. `±1` for reflections.
    pub fn from_real(group: &PermutationGroup, characters: &[f64]) -> Result<Self> {
        Self::new(
            group,
            characters.iter().map(|&c| Complex64::new(c, 0.0)).collect(),
        )
    }

    /// All characters equal to one.
    pub fn trivial(group: &PermutationGroup) -> Self {
        Self {
            characters: vec![Complex64::new(1.0, 0.0); group.len()],
        }
    }

    /// Bloch momentum `k` (in units of `2π/n`) of a translation group.
    ///
    /// Every element must be a cyclic shift `i → i + j (mod n)`; its
    /// character is `exp(2πi k j / n)`.
    pub fn momentum(group: &PermutationGroup, k: usize) -> Result<Self> {
        let n = group.n_sites();
        let characters = group
            .permutations()
            .iter()
            .map(|perm| {
                let j = perm[0];
                if perm.iter().enumerate().any(|(i, &p)| p != (i + j) % n) {
                    return Err(EdError::InvalidPermutation(format!(
                        "{perm:?} is not a translation"
                    )));
                }
                let phase = 2.0 * PI * ((k * j) % n) as f64 / n as f64;
                Ok(Complex64::from_polar(1.0, phase))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(group, characters)
    }

    pub fn character(&self, g: usize) -> Complex64 {
        self.characters[g]
    }

    pub fn characters(&self) -> &[Complex64] {
        &self.characters
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    pub fn is_real(&self) -> bool {
        self.characters.iter().all(|c| c.im.abs() < CHARACTER_TOL)
    }
}
