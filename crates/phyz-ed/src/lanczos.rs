//! Lanczos eigensolver for large sparse Hamiltonians.
//!
//! Finds the k lowest eigenvalues and eigenvectors of a Hermitian operator
//! using the Lanczos algorithm with full reorthogonalization.
//!
//! The operator is only seen through a matrix-vector callback, so it can be
//! a matrix-free [`Operator`], a stored CSR matrix, or the distributed
//! engine on a single rank.

use crate::apply::Operator;
use crate::basis::Basis;
use crate::diag::Spectrum;
use crate::error::Result;
use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;

type CVec = DVector<Complex64>;

/// Parameters for [`lanczos`].
#[derive(Debug, Clone)]
pub struct LanczosParams {
    /// Number of lowest eigenvalues to find.
    pub n_eigenvalues: usize,
    /// Maximum Lanczos iterations (typically 100-300).
    pub max_iter: usize,
    /// Convergence tolerance on eigenvalue change.
    pub tol: f64,
}

impl Default for LanczosParams {
    fn default() -> Self {
        Self {
            n_eigenvalues: 1,
            max_iter: 300,
            tol: 1e-10,
        }
    }
}

/// Lanczos algorithm with full reorthogonalization.
///
/// Builds a tridiagonal matrix T of size m×m from the Krylov subspace,
/// then diagonalizes T to get approximate eigenvalues/eigenvectors.
pub fn lanczos<F>(mut matvec: F, dim: usize, params: &LanczosParams) -> Spectrum
where
    F: FnMut(&CVec) -> CVec,
{
    let m = params.max_iter.min(dim);
    let k = params.n_eigenvalues.min(m);
    if m == 0 {
        return Spectrum {
            energies: Vec::new(),
            states: Vec::new(),
        };
    }

    // Lanczos vectors (stored for reorthogonalization and eigenvector recovery)
    let mut q_vecs: Vec<CVec> = Vec::with_capacity(m + 1);

    // Tridiagonal elements
    let mut alpha: Vec<f64> = Vec::with_capacity(m);
    let mut beta: Vec<f64> = Vec::with_capacity(m);

    // Deterministic start vector, with an imaginary part so complex sectors
    // are not started in a real subspace.
    let mut q = CVec::from_fn(dim, |i, _| {
        let x = i as f64 + 1.0;
        Complex64::new(
            (x * 0.618033988749895).fract() - 0.5,
            (x * 0.414213562373095).fract() - 0.5,
        )
    });
    let norm = q.norm();
    q /= Complex64::new(norm, 0.0);
    q_vecs.push(q);

    let mut prev_eigenvalues = vec![f64::MAX; k];

    for j in 0..m {
        // w = H * q_j
        let mut w = matvec(&q_vecs[j]);

        // α_j = q_j† w, real for Hermitian H
        let a = q_vecs[j].dotc(&w).re;
        alpha.push(a);

        w -= &q_vecs[j] * Complex64::new(a, 0.0);
        if j > 0 {
            w -= &q_vecs[j - 1] * Complex64::new(beta[j - 1], 0.0);
        }

        // Full reorthogonalization
        for qi in &q_vecs {
            let overlap = qi.dotc(&w);
            w -= qi * overlap;
        }

        let b = w.norm();

        if (j + 1) % 10 == 0 || j == m - 1 || b < 1e-14 {
            let spec = tridiagonal_eigenvalues(&alpha, &beta, k);
            let max_change = spec
                .iter()
                .zip(prev_eigenvalues.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0f64, f64::max);

            if max_change < params.tol {
                log::info!(
                    "Lanczos converged at iteration {} (change={:.2e})",
                    j + 1,
                    max_change
                );
                return recover_eigenvectors(&alpha, &beta, &q_vecs, k);
            }
            prev_eigenvalues = spec;
        }

        if b < 1e-14 {
            log::info!("Lanczos: invariant subspace found at iteration {}", j + 1);
            return recover_eigenvectors(&alpha, &beta, &q_vecs, k);
        }

        beta.push(b);
        q_vecs.push(w / Complex64::new(b, 0.0));
    }

    log::warn!("Lanczos: max iterations ({m}) reached");
    recover_eigenvectors(&alpha, &beta, &q_vecs, k)
}

/// Run [`lanczos`] on a compiled operator.
pub fn lanczos_operator<Bs: Basis>(op: &Operator<'_, Bs>, params: &LanczosParams) -> Result<Spectrum> {
    let dim = op.dim();
    let mut failure = None;
    let spectrum = lanczos(
        |v| {
            let mut out = CVec::zeros(dim);
            if let Err(e) = op.apply(v.as_slice(), out.as_mut_slice()) {
                failure.get_or_insert(e);
            }
            out
        },
        dim,
        params,
    );
    match failure {
        Some(e) => Err(e),
        None => Ok(spectrum),
    }
}

fn tridiagonal(alpha: &[f64], beta: &[f64]) -> DMatrix<f64> {
    let m = alpha.len();
    let mut t = DMatrix::zeros(m, m);
    for i in 0..m {
        t[(i, i)] = alpha[i];
        if i > 0 {
            t[(i, i - 1)] = beta[i - 1];
            t[(i - 1, i)] = beta[i - 1];
        }
    }
    t
}

/// Diagonalize the tridiagonal matrix to get eigenvalues only.
fn tridiagonal_eigenvalues(alpha: &[f64], beta: &[f64], k: usize) -> Vec<f64> {
    let eig = tridiagonal(alpha, beta).symmetric_eigen();
    let mut vals: Vec<f64> = eig.eigenvalues.iter().copied().collect();
    vals.sort_by(f64::total_cmp);
    vals.truncate(k);
    vals
}

/// Recover eigenvectors from Lanczos vectors and tridiagonal eigenvectors.
fn recover_eigenvectors(alpha: &[f64], beta: &[f64], q_vecs: &[CVec], k: usize) -> Spectrum {
    let m = alpha.len();
    let eig = tridiagonal(alpha, beta).symmetric_eigen();

    let mut indexed: Vec<(usize, f64)> = eig.eigenvalues.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| a.1.total_cmp(&b.1));

    let n = k.min(indexed.len());
    let dim = q_vecs[0].len();
    let n_q = q_vecs.len().min(m);

    let mut energies = Vec::with_capacity(n);
    let mut states = Vec::with_capacity(n);

    for &(idx, eval) in indexed.iter().take(n) {
        energies.push(eval);

        // Eigenvector in original space: Σ_j s_j * q_j
        let mut v = CVec::zeros(dim);
        for (j, q) in q_vecs.iter().enumerate().take(n_q) {
            v += q * Complex64::new(eig.eigenvectors[(j, idx)], 0.0);
        }
        let norm = v.norm();
        if norm > 1e-15 {
            v /= Complex64::new(norm, 0.0);
        }
        states.push(v);
    }

    Spectrum { energies, states }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::diagonalize;

    fn random_hermitian(n: usize) -> DMatrix<Complex64> {
        let a = DMatrix::from_fn(n, n, |i, j| {
            let x = (i * n + j) as f64 + 1.0;
            Complex64::new((x * 0.618).fract() - 0.5, (x * 0.271).fract() - 0.5)
        });
        &a + a.adjoint()
    }

    #[test]
    fn test_matches_dense() {
        let h = random_hermitian(40);
        let exact = diagonalize(&h, Some(3));
        let params = LanczosParams {
            n_eigenvalues: 3,
            max_iter: 40,
            tol: 1e-12,
        };
        let spec = lanczos(|v| &h * v, 40, &params);
        for i in 0..3 {
            assert!(
                (spec.energies[i] - exact.energies[i]).abs() < 1e-8,
                "eigenvalue {i}: {} vs {}",
                spec.energies[i],
                exact.energies[i]
            );
        }
        let v = spec.ground_state().unwrap();
        let residual = &h * v - v * Complex64::new(spec.ground_energy().unwrap(), 0.0);
        assert!(residual.norm() < 1e-6);
    }

    #[test]
    fn test_small_dimension() {
        let h = DMatrix::from_diagonal(&DVector::from_vec(vec![
            Complex64::new(2.0, 0.0),
            Complex64::new(-1.0, 0.0),
        ]));
        let spec = lanczos(|v| &h * v, 2, &LanczosParams::default());
        assert!((spec.ground_energy().unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_sector() {
        use crate::basis::{SpinHalf, Symmetry};
        use crate::group::PermutationGroup;
        use crate::ops::{OpKind, OpList};
        use crate::representation::Representation;

        let group = PermutationGroup::cyclic(4).unwrap();
        let k1 = Representation::momentum(&group, 1).unwrap();
        let basis = SpinHalf::<u16>::symmetric(4, Some(0), Symmetry::new(&group, k1).unwrap()).unwrap();
        assert_eq!(basis.dim(), 0);

        let mut ops = OpList::new();
        for i in 0..4 {
            ops.add(OpKind::Exchange, 1.0, &[i, (i + 1) % 4]);
        }
        let op = Operator::new(&ops, &basis).unwrap();
        let spec = lanczos_operator(&op, &LanczosParams::default()).unwrap();
        assert!(spec.energies.is_empty());
        assert_eq!(spec.ground_energy(), None);
        assert!(spec.ground_state().is_none());
    }
}
