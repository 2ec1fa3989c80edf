//! Matrix-free operator application.
//!
//! An [`Operator`] compiles an [`OpList`] against a basis once and then walks
//! the basis per term, reporting matrix elements through a `fill(out, in,
//! value)` callback. Dense and sparse matrices and state-vector products are
//! all built on that callback.

mod electron;
pub(crate) mod spinhalf;

use crate::basis::Basis;
use crate::csr::CsrMatrix;
use crate::error::{EdError, Result};
use crate::ops::{OpList, Term};
use nalgebra::DMatrix;
use num_complex::Complex64;
use rayon::prelude::*;

/// Largest imaginary part accepted by [`matrix_real`].
pub const REAL_TOL: f64 = 1e-12;

/// Parameters for the matrix-free product.
#[derive(Debug, Clone)]
pub struct ApplyParams {
    /// Basis states per parallel work item.
    pub chunk_size: usize,
    /// Split the input range across rayon workers, each accumulating into a
    /// private output vector.
    pub parallel: bool,
}

impl Default for ApplyParams {
    fn default() -> Self {
        Self {
            chunk_size: 4096,
            parallel: true,
        }
    }
}

/// A term list compiled against one basis.
pub struct Operator<'a, Bs: Basis> {
    basis: &'a Bs,
    terms: Vec<Term>,
    params: ApplyParams,
}

impl<'a, Bs: Basis> Operator<'a, Bs> {
    pub fn new(ops: &OpList, basis: &'a Bs) -> Result<Self> {
        let terms = ops.compile(&basis.sector())?;
        log::debug!(
            "compiled {} terms on a {} basis of dim {}",
            terms.len(),
            basis.sector().basis,
            basis.dim()
        );
        Ok(Self {
            basis,
            terms,
            params: ApplyParams::default(),
        })
    }

    pub fn with_params(mut self, params: ApplyParams) -> Self {
        self.params = params;
        self
    }

    pub fn dim(&self) -> usize {
        self.basis.dim()
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Report every non-zero matrix element through `fill`.
    pub fn for_each_element<F>(&self, mut fill: F)
    where
        F: FnMut(usize, usize, Complex64),
    {
        let dim = self.basis.dim();
        for term in &self.terms {
            self.basis.apply_term(term, 0..dim, &mut fill);
        }
    }

    /// `y = H x`.
    pub fn apply(&self, x: &[Complex64], y: &mut [Complex64]) -> Result<()> {
        let dim = self.basis.dim();
        for len in [x.len(), y.len()] {
            if len != dim {
                return Err(EdError::DimensionMismatch {
                    expected: dim,
                    got: len,
                });
            }
        }

        let zero = Complex64::new(0.0, 0.0);
        let chunk = self.params.chunk_size.max(1);
        if !self.params.parallel || dim <= chunk {
            y.fill(zero);
            self.for_each_element(|out, inp, v| y[out] += v * x[inp]);
            return Ok(());
        }

        let n_chunks = dim.div_ceil(chunk);
        let sum = (0..n_chunks)
            .into_par_iter()
            .fold(
                || vec![zero; dim],
                |mut acc, c| {
                    let range = c * chunk..((c + 1) * chunk).min(dim);
                    for term in &self.terms {
                        self.basis
                            .apply_term(term, range.clone(), &mut |out, inp, v| {
                                acc[out] += v * x[inp]
                            });
                    }
                    acc
                },
            )
            .reduce(
                || vec![zero; dim],
                |mut a, b| {
                    for (ai, bi) in a.iter_mut().zip(b) {
                        *ai += bi;
                    }
                    a
                },
            );
        y.copy_from_slice(&sum);
        Ok(())
    }

    pub fn matrix(&self) -> DMatrix<Complex64> {
        let dim = self.basis.dim();
        let mut h = DMatrix::zeros(dim, dim);
        self.for_each_element(|out, inp, v| h[(out, inp)] += v);
        h
    }

    pub fn csr(&self) -> CsrMatrix {
        let mut triplets = Vec::new();
        self.for_each_element(|out, inp, v| triplets.push((out, inp, v)));
        CsrMatrix::from_triplets(self.basis.dim(), triplets)
    }
}

/// Call `fill(out, in, value)` for every non-zero element of `ops` on
/// `basis`. Malformed terms are rejected before any state is visited.
pub fn apply_terms<Bs, F>(ops: &OpList, basis: &Bs, fill: F) -> Result<()>
where
    Bs: Basis,
    F: FnMut(usize, usize, Complex64),
{
    Operator::new(ops, basis)?.for_each_element(fill);
    Ok(())
}

/// Dense complex matrix of `ops` on `basis`.
pub fn matrix<Bs: Basis>(ops: &OpList, basis: &Bs) -> Result<DMatrix<Complex64>> {
    Ok(Operator::new(ops, basis)?.matrix())
}

/// Dense real matrix; fails if any element has an imaginary part above
/// [`REAL_TOL`].
pub fn matrix_real<Bs: Basis>(ops: &OpList, basis: &Bs) -> Result<DMatrix<f64>> {
    let h = matrix(ops, basis)?;
    let max_im = h.iter().map(|z| z.im.abs()).fold(0.0f64, f64::max);
    if max_im > REAL_TOL {
        return Err(EdError::ComplexMatrix(max_im));
    }
    Ok(h.map(|z| z.re))
}

/// Sparse matrix of `ops` on `basis`.
pub fn csr<Bs: Basis>(ops: &OpList, basis: &Bs) -> Result<CsrMatrix> {
    Ok(Operator::new(ops, basis)?.csr())
}

/// `y = H x` with default [`ApplyParams`].
pub fn apply<Bs: Basis>(
    ops: &OpList,
    basis: &Bs,
    x: &[Complex64],
    y: &mut [Complex64],
) -> Result<()> {
    Operator::new(ops, basis)?.apply(x, y)
}
