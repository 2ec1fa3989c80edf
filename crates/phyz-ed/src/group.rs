//! Permutation groups acting on lattice sites.
//!
//! An element is stored as the image of every site: `perm[i]` is where
//! site `i` goes. Products follow function composition,
//! `(g·h)[i] = g[h[i]]`, i.e. `h` acts first.

use crate::error::{EdError, Result};
use std::collections::{HashMap, VecDeque};

/// Closed, ordered set of site permutations with a multiplication table.
#[derive(Debug, Clone)]
pub struct PermutationGroup {
    n_sites: usize,
    permutations: Vec<Vec<usize>>,
    /// `multiplication[g * order + h]` = index of `g·h`.
    multiplication: Vec<usize>,
    inverse: Vec<usize>,
    identity: usize,
}

fn check_permutation(perm: &[usize], n_sites: usize) -> Result<()> {
    if perm.len() != n_sites {
        return Err(EdError::InvalidPermutation(format!(
            "length {} on {n_sites} sites",
            perm.len()
        )));
    }
    let mut seen = vec![false; n_sites];
    for &p in perm {
        if p >= n_sites || seen[p] {
            return Err(EdError::InvalidPermutation(format!("{perm:?} is not a bijection")));
        }
        seen[p] = true;
    }
    Ok(())
}

fn compose(g: &[usize], h: &[usize]) -> Vec<usize> {
    h.iter().map(|&i| g[i]).collect()
}

impl PermutationGroup {
    /// Build a group from its full element list.
    ///
    /// Verifies every element is a permutation, elements are distinct, the
    /// identity is present, and the set is closed and associative.
    pub fn new(permutations: Vec<Vec<usize>>) -> Result<Self> {
        let n_sites = match permutations.first() {
            Some(p) => p.len(),
            None => return Err(EdError::NotAGroup("no elements".into())),
        };
        if n_sites == 0 {
            return Err(EdError::InvalidSiteCount(0));
        }
        for perm in &permutations {
            check_permutation(perm, n_sites)?;
        }

        let mut lookup: HashMap<&[usize], usize> = HashMap::with_capacity(permutations.len());
        for (g, perm) in permutations.iter().enumerate() {
            if lookup.insert(perm.as_slice(), g).is_some() {
                return Err(EdError::NotAGroup(format!("element {perm:?} listed twice")));
            }
        }

        let id: Vec<usize> = (0..n_sites).collect();
        let identity = *lookup
            .get(id.as_slice())
            .ok_or_else(|| EdError::NotAGroup("identity missing".into()))?;

        let order = permutations.len();
        let mut multiplication = vec![0; order * order];
        for g in 0..order {
            for h in 0..order {
                let gh = compose(&permutations[g], &permutations[h]);
                let k = lookup.get(gh.as_slice()).ok_or_else(|| {
                    EdError::NotAGroup(format!("product of elements {g} and {h} not in set"))
                })?;
                multiplication[g * order + h] = *k;
            }
        }

        for g in 0..order {
            for h in 0..order {
                let gh = multiplication[g * order + h];
                for k in 0..order {
                    let hk = multiplication[h * order + k];
                    if multiplication[gh * order + k] != multiplication[g * order + hk] {
                        return Err(EdError::NotAGroup(format!(
                            "associativity fails at ({g}, {h}, {k})"
                        )));
                    }
                }
            }
        }

        let mut inverse = vec![0; order];
        for g in 0..order {
            inverse[g] = (0..order)
                .find(|&h| multiplication[g * order + h] == identity)
                .ok_or_else(|| EdError::NotAGroup(format!("element {g} has no inverse")))?;
        }

        log::debug!("permutation group on {n_sites} sites, order {order}");

        Ok(Self {
            n_sites,
            permutations,
            multiplication,
            inverse,
            identity,
        })
    }

    /// Group generated by `generators`; the identity comes first, the rest in
    /// breadth-first order.
    pub fn from_generators(n_sites: usize, generators: &[Vec<usize>]) -> Result<Self> {
        if n_sites == 0 {
            return Err(EdError::InvalidSiteCount(0));
        }
        for g in generators {
            check_permutation(g, n_sites)?;
        }

        let id: Vec<usize> = (0..n_sites).collect();
        let mut elements = vec![id.clone()];
        let mut seen: HashMap<Vec<usize>, usize> = HashMap::new();
        seen.insert(id, 0);
        let mut queue = VecDeque::from([0usize]);

        while let Some(e) = queue.pop_front() {
            for generator in generators {
                let next = compose(generator, &elements[e]);
                if !seen.contains_key(&next) {
                    seen.insert(next.clone(), elements.len());
                    queue.push_back(elements.len());
                    elements.push(next);
                }
            }
        }

        Self::new(elements)
    }

    /// The group containing only the identity.
    pub fn trivial(n_sites: usize) -> Result<Self> {
        Self::new(vec![(0..n_sites).collect()])
    }

    /// Translations of a periodic chain; element `j` shifts every site by `j`.
    pub fn cyclic(n_sites: usize) -> Result<Self> {
        if n_sites == 0 {
            return Err(EdError::InvalidSiteCount(0));
        }
        let perms = (0..n_sites)
            .map(|j| (0..n_sites).map(|i| (i + j) % n_sites).collect())
            .collect();
        Self::new(perms)
    }

    /// Translations and reflections of a periodic chain.
    pub fn dihedral(n_sites: usize) -> Result<Self> {
        if n_sites == 0 {
            return Err(EdError::InvalidSiteCount(0));
        }
        let translation: Vec<usize> = (0..n_sites).map(|i| (i + 1) % n_sites).collect();
        let reflection: Vec<usize> = (0..n_sites).map(|i| (n_sites - i) % n_sites).collect();
        Self::from_generators(n_sites, &[translation, reflection])
    }

    pub fn n_sites(&self) -> usize {
        self.n_sites
    }

    /// Group order.
    pub fn len(&self) -> usize {
        self.permutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permutations.is_empty()
    }

    pub fn permutation(&self, g: usize) -> &[usize] {
        &self.permutations[g]
    }

    pub fn permutations(&self) -> &[Vec<usize>] {
        &self.permutations
    }

    pub fn multiply(&self, g: usize, h: usize) -> usize {
        self.multiplication[g * self.len() + h]
    }

    pub fn inverse(&self, g: usize) -> usize {
        self.inverse[g]
    }

    pub fn identity(&self) -> usize {
        self.identity
    }

    pub fn is_abelian(&self) -> bool {
        let n = self.len();
        (0..n).all(|g| (0..n).all(|h| self.multiply(g, h) == self.multiply(h, g)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cyclic() {
        let g = PermutationGroup::cyclic(6).unwrap();
        assert_eq!(g.len(), 6);
        assert_eq!(g.identity(), 0);
        assert!(g.is_abelian());
        // T^2 · T^5 = T^1
        assert_eq!(g.multiply(2, 5), 1);
        assert_eq!(g.inverse(2), 4);
    }

    #[test]
    fn test_dihedral() {
        let g = PermutationGroup::dihedral(5).unwrap();
        assert_eq!(g.len(), 10);
        assert!(!g.is_abelian());
        for e in 0..g.len() {
            assert_eq!(g.multiply(e, g.inverse(e)), g.identity());
        }

        // On two sites the reflection is a translation.
        assert_eq!(PermutationGroup::dihedral(2).unwrap().len(), 2);
    }

    #[test]
    fn test_multiplication_is_composition() {
        let g = PermutationGroup::dihedral(4).unwrap();
        for a in 0..g.len() {
            for b in 0..g.len() {
                let ab = g.permutation(g.multiply(a, b));
                for i in 0..4 {
                    assert_eq!(ab[i], g.permutation(a)[g.permutation(b)[i]]);
                }
            }
        }
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(matches!(
            PermutationGroup::new(vec![]),
            Err(EdError::NotAGroup(_))
        ));
        assert!(matches!(
            PermutationGroup::new(vec![vec![0, 0, 1]]),
            Err(EdError::InvalidPermutation(_))
        ));
        // Missing identity.
        assert!(matches!(
            PermutationGroup::new(vec![vec![1, 2, 0], vec![2, 0, 1]]),
            Err(EdError::NotAGroup(_))
        ));
        // Not closed: T without T^2.
        assert!(matches!(
            PermutationGroup::new(vec![vec![0, 1, 2], vec![1, 2, 0]]),
            Err(EdError::NotAGroup(_))
        ));
        assert!(matches!(
            PermutationGroup::new(vec![vec![0, 1], vec![0, 1]]),
            Err(EdError::NotAGroup(_))
        ));
        assert!(matches!(
            PermutationGroup::cyclic(0),
            Err(EdError::InvalidSiteCount(0))
        ));
    }
}
