//! Operator terms and their compilation against a basis.
//!
//! An [`OpList`] is the serializable description of a Hamiltonian: a list of
//! `(kind, coupling, sites)` entries plus a table of named couplings.
//! [`OpList::compile`] validates every entry against a [`Sector`] and turns
//! it into a [`Term`] with a resolved coupling, so malformed input is
//! rejected before any basis state is touched.
//!
//! Conventions (`S^z = (n↑ − n↓)/2`, a set bit is an up spin):
//!
//! | kind           | sites | operator |
//! |----------------|-------|----------|
//! | `HOP`          | 2 | `−t c†_{1σ} c_{2σ} − t* c†_{2σ} c_{1σ}`, both species |
//! | `HOPUP`/`HOPDN`| 2 | same, one species |
//! | `EXCHANGE`     | 2 | `Re(J) S^z_1 S^z_2 + J/2 S^+_1 S^-_2 + J*/2 S^-_1 S^+_2` |
//! | `ISING`        | 2 | `J S^z_1 S^z_2` |
//! | `SZ`           | 1 | `h S^z` |
//! | `NUMBER`       | 1 | `μ n` (also `NUMBERUP`, `NUMBERDN`) |
//! | `NUMBERNUMBER` | 2 | `V n_1 n_2` |
//! | `HUBBARDU`     | 0 | `U Σ_i n_{i↑} n_{i↓}` |
//! | `MATRIX`       | 2 | explicit 4×4 operator on the local spin states |
//!
//! `MATRIX` rows and columns are indexed by `b1 + 2·b2`, where `b1`, `b2`
//! are the bits of the first and second site.

use crate::error::{EdError, Result};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpKind {
    Hop,
    HopUp,
    HopDn,
    Exchange,
    Ising,
    Sz,
    Number,
    NumberUp,
    NumberDn,
    NumberNumber,
    HubbardU,
    Matrix,
}

/// Static description of an operator kind.
#[derive(Debug, Clone, Copy)]
pub struct OpInfo {
    pub kind: OpKind,
    pub name: &'static str,
    pub n_sites: usize,
    /// Whether the sites of one term must differ.
    pub distinct: bool,
    pub diagonal: bool,
}

/// Registration table, in `OpKind` declaration order.
pub static OP_TABLE: [OpInfo; 12] = [
    OpInfo { kind: OpKind::Hop, name: "HOP", n_sites: 2, distinct: true, diagonal: false },
    OpInfo { kind: OpKind::HopUp, name: "HOPUP", n_sites: 2, distinct: true, diagonal: false },
    OpInfo { kind: OpKind::HopDn, name: "HOPDN", n_sites: 2, distinct: true, diagonal: false },
    OpInfo { kind: OpKind::Exchange, name: "EXCHANGE", n_sites: 2, distinct: true, diagonal: false },
    OpInfo { kind: OpKind::Ising, name: "ISING", n_sites: 2, distinct: true, diagonal: true },
    OpInfo { kind: OpKind::Sz, name: "SZ", n_sites: 1, distinct: false, diagonal: true },
    OpInfo { kind: OpKind::Number, name: "NUMBER", n_sites: 1, distinct: false, diagonal: true },
    OpInfo { kind: OpKind::NumberUp, name: "NUMBERUP", n_sites: 1, distinct: false, diagonal: true },
    OpInfo { kind: OpKind::NumberDn, name: "NUMBERDN", n_sites: 1, distinct: false, diagonal: true },
    OpInfo { kind: OpKind::NumberNumber, name: "NUMBERNUMBER", n_sites: 2, distinct: true, diagonal: true },
    OpInfo { kind: OpKind::HubbardU, name: "HUBBARDU", n_sites: 0, distinct: false, diagonal: true },
    OpInfo { kind: OpKind::Matrix, name: "MATRIX", n_sites: 2, distinct: true, diagonal: false },
];

impl OpKind {
    pub fn info(self) -> &'static OpInfo {
        &OP_TABLE[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn n_sites(self) -> usize {
        self.info().n_sites
    }

    pub fn is_diagonal(self) -> bool {
        self.info().diagonal
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OpKind {
    type Err = EdError;

    fn from_str(s: &str) -> Result<Self> {
        OP_TABLE
            .iter()
            .find(|info| info.name.eq_ignore_ascii_case(s))
            .map(|info| info.kind)
            .ok_or_else(|| EdError::UnknownOp(s.to_string()))
    }
}

/// Coupling constant of one operator entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coupling {
    Real(f64),
    Complex(Complex64),
    Matrix([[Complex64; 4]; 4]),
    /// Looked up in the coupling table of the enclosing [`OpList`].
    Named(String),
}

impl From<f64> for Coupling {
    fn from(x: f64) -> Self {
        Coupling::Real(x)
    }
}

impl From<Complex64> for Coupling {
    fn from(z: Complex64) -> Self {
        Coupling::Complex(z)
    }
}

impl From<&str> for Coupling {
    fn from(name: &str) -> Self {
        Coupling::Named(name.to_string())
    }
}

impl From<[[Complex64; 4]; 4]> for Coupling {
    fn from(m: [[Complex64; 4]; 4]) -> Self {
        Coupling::Matrix(m)
    }
}

/// One `(kind, coupling, sites)` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Op {
    pub kind: OpKind,
    pub coupling: Coupling,
    pub sites: Vec<usize>,
}

impl Op {
    pub fn new(kind: OpKind, coupling: impl Into<Coupling>, sites: &[usize]) -> Self {
        Self {
            kind,
            coupling: coupling.into(),
            sites: sites.to_vec(),
        }
    }

    /// Like [`Op::new`] with the kind given by its registered name.
    pub fn parse(name: &str, coupling: impl Into<Coupling>, sites: &[usize]) -> Result<Self> {
        Ok(Self::new(name.parse()?, coupling, sites))
    }
}

/// What a basis accepts; checked by [`OpList::compile`].
#[derive(Debug, Clone, Copy)]
pub struct Sector {
    pub n_sites: usize,
    pub basis: &'static str,
    pub supported: &'static [OpKind],
    /// Particle number (or magnetization) is fixed, so `MATRIX` entries must
    /// conserve it.
    pub fixed_number: bool,
}

/// Non-branching piece of a `MATRIX` term: local state `from` goes to
/// `to` with amplitude `coeff`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub from: usize,
    pub to: usize,
    pub coeff: Complex64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TermValue {
    Scalar(Complex64),
    Transitions(Vec<Transition>),
}

/// A validated operator entry with its coupling resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub kind: OpKind,
    pub sites: Vec<usize>,
    pub value: TermValue,
}

impl Term {
    /// Scalar coupling; zero for `MATRIX` terms.
    pub fn scalar(&self) -> Complex64 {
        match &self.value {
            TermValue::Scalar(c) => *c,
            TermValue::Transitions(_) => Complex64::new(0.0, 0.0),
        }
    }

    pub fn transitions(&self) -> &[Transition] {
        match &self.value {
            TermValue::Scalar(_) => &[],
            TermValue::Transitions(t) => t,
        }
    }

    /// The two sites of a two-site term.
    pub fn pair(&self) -> (usize, usize) {
        (self.sites[0], self.sites[1])
    }
}

/// A Hamiltonian as a list of operator entries with named couplings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpList {
    ops: Vec<Op>,
    #[serde(default)]
    couplings: BTreeMap<String, Coupling>,
}

impl OpList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: Op) {
        self.ops.push(op);
    }

    /// Append `kind` on `sites` with `coupling`.
    pub fn add(&mut self, kind: OpKind, coupling: impl Into<Coupling>, sites: &[usize]) {
        self.push(Op::new(kind, coupling, sites));
    }

    /// Define (or redefine) the named coupling `name`.
    pub fn set_coupling(&mut self, name: &str, value: impl Into<Coupling>) {
        self.couplings.insert(name.to_string(), value.into());
    }

    pub fn with_coupling(mut self, name: &str, value: impl Into<Coupling>) -> Self {
        self.set_coupling(name, value);
        self
    }

    pub fn coupling(&self, name: &str) -> Option<&Coupling> {
        self.couplings.get(name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Op> {
        self.ops.iter()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    fn resolve(&self, op: &Op) -> Result<Coupling> {
        match &op.coupling {
            Coupling::Named(name) => match self.couplings.get(name) {
                None => Err(EdError::UndefinedCoupling(name.clone())),
                Some(Coupling::Named(_)) => Err(EdError::InvalidCoupling {
                    op: op.kind.to_string(),
                    reason: format!("coupling {name} refers to another name"),
                }),
                Some(c) => Ok(c.clone()),
            },
            c => Ok(c.clone()),
        }
    }

    /// Hermitian conjugate, with every named coupling resolved.
    ///
    /// Hopping and exchange entries are Hermitian for any coupling; diagonal
    /// entries get conjugated couplings and matrices are conjugate-transposed.
    pub fn adjoint(&self) -> Result<OpList> {
        let ops = self
            .ops
            .iter()
            .map(|op| {
                let coupling = match (op.kind, self.resolve(op)?) {
                    (OpKind::Hop | OpKind::HopUp | OpKind::HopDn | OpKind::Exchange, c) => c,
                    (_, Coupling::Real(x)) => Coupling::Real(x),
                    (_, Coupling::Complex(z)) => Coupling::Complex(z.conj()),
                    (_, Coupling::Matrix(m)) => {
                        let mut adj = [[Complex64::new(0.0, 0.0); 4]; 4];
                        for (a, row) in adj.iter_mut().enumerate() {
                            for (b, entry) in row.iter_mut().enumerate() {
                                *entry = m[b][a].conj();
                            }
                        }
                        Coupling::Matrix(adj)
                    }
                    (_, c @ Coupling::Named(_)) => c,
                };
                Ok(Op {
                    kind: op.kind,
                    coupling,
                    sites: op.sites.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(OpList {
            ops,
            couplings: BTreeMap::new(),
        })
    }

    /// Validate every entry against `sector` and resolve its coupling.
    pub fn compile(&self, sector: &Sector) -> Result<Vec<Term>> {
        self.ops.iter().map(|op| self.compile_op(op, sector)).collect()
    }

    fn compile_op(&self, op: &Op, sector: &Sector) -> Result<Term> {
        let info = op.kind.info();
        let name = info.name.to_string();

        if !sector.supported.contains(&op.kind) {
            return Err(EdError::UnsupportedOp {
                op: name,
                basis: sector.basis.to_string(),
            });
        }
        if op.sites.len() != info.n_sites {
            return Err(EdError::WrongSiteCount {
                op: name,
                expected: info.n_sites,
                got: op.sites.len(),
            });
        }
        if let Some(&site) = op.sites.iter().find(|&&s| s >= sector.n_sites) {
            return Err(EdError::SiteOutOfRange {
                op: name,
                site,
                n_sites: sector.n_sites,
            });
        }
        if info.distinct && op.sites[0] == op.sites[1] {
            return Err(EdError::RepeatedSite {
                op: name,
                site: op.sites[0],
            });
        }

        let value = match (op.kind, self.resolve(op)?) {
            (OpKind::Matrix, Coupling::Matrix(m)) => {
                TermValue::Transitions(decompose(&m, sector.fixed_number)?)
            }
            (OpKind::Matrix, _) => {
                return Err(EdError::InvalidCoupling {
                    op: name,
                    reason: "expected a 4x4 matrix".into(),
                })
            }
            (_, Coupling::Real(x)) => TermValue::Scalar(Complex64::new(x, 0.0)),
            (_, Coupling::Complex(z)) => TermValue::Scalar(z),
            (_, _) => {
                return Err(EdError::InvalidCoupling {
                    op: name,
                    reason: "expected a scalar".into(),
                })
            }
        };

        Ok(Term {
            kind: op.kind,
            sites: op.sites.clone(),
            value,
        })
    }
}

/// Split a two-site matrix into its non-zero transitions.
fn decompose(m: &[[Complex64; 4]; 4], fixed_number: bool) -> Result<Vec<Transition>> {
    let mut transitions = Vec::new();
    for (to, row) in m.iter().enumerate() {
        for (from, &coeff) in row.iter().enumerate() {
            if coeff == Complex64::new(0.0, 0.0) {
                continue;
            }
            if fixed_number && to.count_ones() != from.count_ones() {
                return Err(EdError::NonConserving(format!(
                    "MATRIX element ({to}, {from}) = {coeff}"
                )));
            }
            transitions.push(Transition { from, to, coeff });
        }
    }
    Ok(transitions)
}

impl<'a> IntoIterator for &'a OpList {
    type Item = &'a Op;
    type IntoIter = std::slice::Iter<'a, Op>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}

impl FromIterator<Op> for OpList {
    fn from_iter<I: IntoIterator<Item = Op>>(iter: I) -> Self {
        Self {
            ops: iter.into_iter().collect(),
            couplings: BTreeMap::new(),
        }
    }
}

impl Extend<Op> for OpList {
    fn extend<I: IntoIterator<Item = Op>>(&mut self, iter: I) {
        self.ops.extend(iter);
    }
}
