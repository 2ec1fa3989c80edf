//! Dense eigendecomposition for small Hamiltonians.
//!
//! Uses nalgebra's `SymmetricEigen`, which handles complex Hermitian
//! matrices as well as real symmetric ones.

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;

/// Eigenvalues and eigenstates from diagonalization.
#[derive(Debug, Clone)]
pub struct Spectrum {
    /// Eigenvalues in ascending order.
    pub energies: Vec<f64>,
    /// Corresponding eigenstates (columns of the unitary matrix).
    pub states: Vec<DVector<Complex64>>,
}

impl Spectrum {
    /// Ground state energy, `None` for an empty sector.
    pub fn ground_energy(&self) -> Option<f64> {
        self.energies.first().copied()
    }

    /// Ground state vector, `None` for an empty sector.
    pub fn ground_state(&self) -> Option<&DVector<Complex64>> {
        self.states.first()
    }

    /// Spectral gap (E_1 - E_0), `None` with fewer than two levels.
    pub fn gap(&self) -> Option<f64> {
        match self.energies.as_slice() {
            [e0, e1, ..] => Some(e1 - e0),
            _ => None,
        }
    }
}

/// Diagonalize a Hermitian matrix.
///
/// If `n_lowest` is `Some(n)`, only the `n` lowest eigenvalues/states
/// are returned (still computed via full diagonalization).
pub fn diagonalize(h: &DMatrix<Complex64>, n_lowest: Option<usize>) -> Spectrum {
    if h.is_empty() {
        return Spectrum {
            energies: Vec::new(),
            states: Vec::new(),
        };
    }
    let eig = h.clone().symmetric_eigen();

    // Sort by eigenvalue.
    let mut indexed: Vec<(usize, f64)> = eig.eigenvalues.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| a.1.total_cmp(&b.1));

    let n = match n_lowest {
        Some(n) => n.min(indexed.len()),
        None => indexed.len(),
    };

    let energies: Vec<f64> = indexed[..n].iter().map(|&(_, e)| e).collect();
    let states: Vec<DVector<Complex64>> = indexed[..n]
        .iter()
        .map(|&(i, _)| eig.eigenvectors.column(i).into_owned())
        .collect();

    Spectrum { energies, states }
}

/// Eigenvalues of a real symmetric matrix, ascending.
pub fn eigenvalues_real(h: &DMatrix<f64>) -> Vec<f64> {
    if h.is_empty() {
        return Vec::new();
    }
    let mut vals: Vec<f64> = h.clone().symmetric_eigen().eigenvalues.iter().copied().collect();
    vals.sort_by(f64::total_cmp);
    vals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn test_identity_spectrum() {
        let h = DMatrix::<Complex64>::identity(3, 3);
        let spec = diagonalize(&h, None);

        assert_eq!(spec.energies.len(), 3);
        for &e in &spec.energies {
            assert!((e - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_n_lowest() {
        let h = DMatrix::from_diagonal(&DVector::from_vec(vec![c(3.0, 0.0), c(1.0, 0.0), c(2.0, 0.0)]));
        let spec = diagonalize(&h, Some(2));

        assert_eq!(spec.energies.len(), 2);
        assert!((spec.energies[0] - 1.0).abs() < 1e-12);
        assert!((spec.energies[1] - 2.0).abs() < 1e-12);
        assert!((spec.gap().unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_hermitian_eigenvectors() {
        // σ_y has eigenvalues ±1.
        let h = DMatrix::from_row_slice(2, 2, &[c(0.0, 0.0), c(0.0, -1.0), c(0.0, 1.0), c(0.0, 0.0)]);
        let spec = diagonalize(&h, None);
        assert!((spec.ground_energy().unwrap() + 1.0).abs() < 1e-12);
        let v = spec.ground_state().unwrap();
        let hv = &h * v;
        assert!((hv + v).norm() < 1e-12);
    }

    #[test]
    fn test_empty_matrix() {
        let spec = diagonalize(&DMatrix::<Complex64>::zeros(0, 0), None);
        assert!(spec.energies.is_empty());
        assert_eq!(spec.ground_energy(), None);
        assert!(spec.ground_state().is_none());
        assert_eq!(spec.gap(), None);

        let one = diagonalize(&DMatrix::from_element(1, 1, c(0.5, 0.0)), None);
        assert_eq!(one.ground_energy(), Some(0.5));
        assert_eq!(one.gap(), None);
    }

    #[test]
    fn test_eigenvalues_real() {
        let h = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 0.0]);
        let vals = eigenvalues_real(&h);
        assert!((vals[0] + 1.0).abs() < 1e-12);
        assert!((vals[1] - 1.0).abs() < 1e-12);
    }
}
