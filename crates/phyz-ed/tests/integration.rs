//! Integration tests for phyz-ed.

use approx::assert_relative_eq;
use nalgebra::DMatrix;
use num_complex::Complex64;
use phyz_ed::{
    apply::{matrix, matrix_real, Operator},
    bits::Combinations,
    diag::diagonalize,
    lanczos::{lanczos_operator, LanczosParams},
    Communicator, DistributedOperator, EdError, Electron, GroupAction, LocalComm, OpKind, OpList,
    PermutationGroup, Representation, SpinHalf, SpinHalfDistributed, Symmetry, ThreadComm, Tj,
};
use std::sync::Arc;
use std::thread;

fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

fn ring(kind: OpKind, coupling: impl Into<phyz_ed::Coupling> + Clone, n: usize, range: usize) -> OpList {
    let mut ops = OpList::new();
    for i in 0..n {
        ops.add(kind, coupling.clone(), &[i, (i + range) % n]);
    }
    ops
}

fn j1_j2(n: usize, j2: f64) -> OpList {
    let mut ops = ring(OpKind::Exchange, 1.0, n, 1);
    ops.extend(ring(OpKind::Exchange, j2, n, 2).iter().cloned());
    ops
}

fn energies(h: &DMatrix<Complex64>) -> Vec<f64> {
    diagonalize(h, None).energies
}

fn assert_same_spectrum(mut merged: Vec<f64>, mut full: Vec<f64>) {
    merged.sort_by(f64::total_cmp);
    full.sort_by(f64::total_cmp);
    assert_eq!(merged.len(), full.len());
    for (a, b) in merged.iter().zip(&full) {
        assert_relative_eq!(*a, *b, epsilon = 1e-9);
    }
}

fn momentum_sectors<B: phyz_ed::BitState>(n: usize) -> Vec<Symmetry<B>> {
    let group = PermutationGroup::cyclic(n).unwrap();
    let action = Arc::new(GroupAction::new(&group).unwrap());
    (0..n)
        .map(|k| {
            let irrep = Representation::momentum(&group, k).unwrap();
            Symmetry::with_action(Arc::clone(&action), irrep).unwrap()
        })
        .collect()
}

/// The four one-dimensional irreps of a dihedral group on an even ring:
/// translations by `j` carry `t^j`, reflections an extra `r`.
fn dihedral_irreps<B: phyz_ed::BitState>(group: &PermutationGroup) -> Vec<Symmetry<B>> {
    let n = group.n_sites();
    let action = Arc::new(GroupAction::new(group).unwrap());
    let mut sectors = Vec::new();
    for t in [1.0, -1.0] {
        for r in [1.0, -1.0] {
            let characters: Vec<f64> = group
                .permutations()
                .iter()
                .map(|perm| {
                    let j = perm[0];
                    let shift = if j % 2 == 0 { 1.0 } else { t };
                    if perm[1] == (j + 1) % n {
                        shift
                    } else {
                        shift * r
                    }
                })
                .collect();
            let irrep = Representation::from_real(group, &characters).unwrap();
            sectors.push(Symmetry::with_action(Arc::clone(&action), irrep).unwrap());
        }
    }
    sectors
}

fn assert_levels_contained(levels: &[f64], full: &[f64]) {
    for &e in levels {
        let nearest = full.iter().map(|f| (f - e).abs()).fold(f64::MAX, f64::min);
        assert!(nearest < 1e-9, "level {e} missing from the full spectrum");
    }
}

#[test]
fn test_four_site_heisenberg_ground_state() {
    let sym = momentum_sectors::<u16>(4).swap_remove(0);
    let basis = SpinHalf::symmetric(4, Some(2), sym).unwrap();
    assert_eq!(basis.dim(), 2);
    let h = matrix(&ring(OpKind::Exchange, 1.0, 4, 1), &basis).unwrap();
    let spec = diagonalize(&h, None);
    assert_relative_eq!(spec.ground_energy().unwrap(), -2.0, epsilon = 1e-12);
}

#[test]
fn test_dimension_conservation() {
    for n in [5, 6, 8] {
        let mut total = 0;
        for n_up in 0..=n {
            let full = SpinHalf::<u16>::new(n, Some(n_up)).unwrap().dim();
            let merged: usize = momentum_sectors::<u16>(n)
                .into_iter()
                .map(|sym| SpinHalf::symmetric(n, Some(n_up), sym).unwrap().dim())
                .sum();
            assert_eq!(merged, full, "n={n} n_up={n_up}");
            total += full;
        }
        assert_eq!(total, 1 << n);
    }

    let merged: usize = momentum_sectors::<u16>(6)
        .into_iter()
        .map(|sym| Electron::symmetric(6, 2, 3, sym).unwrap().dim())
        .sum();
    assert_eq!(merged, Electron::<u16>::new(6, 2, 3).unwrap().dim());
}

#[test]
fn test_spin_spectrum_merges_over_momenta() {
    let n = 8;
    let mut ops = j1_j2(n, 0.45);
    for i in 0..n {
        ops.add(OpKind::Sz, 0.1, &[i]);
    }
    for n_up in [3, 4] {
        let full = SpinHalf::<u16>::new(n, Some(n_up)).unwrap();
        let expected = energies(&matrix(&ops, &full).unwrap());
        let merged = momentum_sectors::<u16>(n)
            .into_iter()
            .flat_map(|sym| {
                let basis = SpinHalf::symmetric(n, Some(n_up), sym).unwrap();
                energies(&matrix(&ops, &basis).unwrap())
            })
            .collect();
        assert_same_spectrum(merged, expected);
    }
}

#[test]
fn test_hubbard_spectrum_merges_over_momenta() {
    let n = 4;
    let mut ops = ring(OpKind::Hop, 1.0, n, 1);
    ops.add(OpKind::HubbardU, 4.0, &[]);
    let full = Electron::<u16>::new(n, 2, 1).unwrap();
    let expected = energies(&matrix(&ops, &full).unwrap());
    let merged = momentum_sectors::<u16>(n)
        .into_iter()
        .flat_map(|sym| {
            let basis = Electron::symmetric(n, 2, 1, sym).unwrap();
            energies(&matrix(&ops, &basis).unwrap())
        })
        .collect();
    assert_same_spectrum(merged, expected);
}

#[test]
fn test_tj_spectrum_merges_over_momenta() {
    let n = 5;
    let mut ops = ring(OpKind::Hop, 1.0, n, 1);
    ops.extend(ring(OpKind::Exchange, 0.4, n, 1).iter().cloned());
    for (n_up, n_dn) in [(2, 1), (2, 2)] {
        let full = Tj::<u16>::new(n, n_up, n_dn).unwrap();
        let expected = energies(&matrix(&ops, &full).unwrap());
        let merged = momentum_sectors::<u16>(n)
            .into_iter()
            .flat_map(|sym| {
                let basis = Tj::symmetric(n, n_up, n_dn, sym).unwrap();
                energies(&matrix(&ops, &basis).unwrap())
            })
            .collect();
        assert_same_spectrum(merged, expected);
    }
}

#[test]
fn test_tj_spectrum_merges_with_stabilized_configurations() {
    // On six sites, up configurations such as 010101 and 001001 are fixed
    // by nontrivial translations.
    let n = 6;
    let mut ops = ring(OpKind::Hop, c(0.8, 0.3), n, 1);
    ops.extend(ring(OpKind::Exchange, 0.5, n, 1).iter().cloned());
    ops.extend(ring(OpKind::NumberNumber, 0.2, n, 2).iter().cloned());
    for (n_up, n_dn) in [(2, 2), (3, 3)] {
        let full = Tj::<u16>::new(n, n_up, n_dn).unwrap();
        let expected = energies(&matrix(&ops, &full).unwrap());
        let merged = momentum_sectors::<u16>(n)
            .into_iter()
            .flat_map(|sym| {
                let basis = Tj::symmetric(n, n_up, n_dn, sym).unwrap();
                energies(&matrix(&ops, &basis).unwrap())
            })
            .collect();
        assert_same_spectrum(merged, expected);
    }
}

#[test]
fn test_dihedral_sectors_of_hubbard_ring() {
    let n = 6;
    let group = PermutationGroup::dihedral(n).unwrap();
    assert_eq!(group.len(), 12);
    let mut ops = ring(OpKind::Hop, 1.0, n, 1);
    ops.extend(ring(OpKind::NumberNumber, 0.5, n, 1).iter().cloned());
    ops.add(OpKind::HubbardU, 3.0, &[]);

    for (n_up, n_dn) in [(2, 2), (3, 2)] {
        let full = energies(&matrix(&ops, &Electron::<u16>::new(n, n_up, n_dn).unwrap()).unwrap());
        let mut total = 0;
        for sym in dihedral_irreps::<u16>(&group) {
            let basis = Electron::symmetric(n, n_up, n_dn, sym).unwrap();
            total += basis.dim();
            let h = matrix(&ops, &basis).unwrap();
            assert!((&h - h.adjoint()).norm() < 1e-12);
            // Real couplings and real characters keep the sector real.
            assert!(matrix_real(&ops, &basis).is_ok());
            assert_levels_contained(&energies(&h), &full);
        }
        assert!(total > 0 && total < full.len());
    }
}

#[test]
fn test_bond_reflection_sectors_of_tj_ring() {
    let n = 6;
    let translation: Vec<usize> = (0..n).map(|i| (i + 1) % n).collect();
    let reflection: Vec<usize> = (0..n).map(|i| n - 1 - i).collect();
    let group = PermutationGroup::from_generators(n, &[translation, reflection]).unwrap();
    assert_eq!(group.len(), 12);
    let mut ops = ring(OpKind::Hop, 1.0, n, 1);
    ops.extend(ring(OpKind::Exchange, 0.6, n, 1).iter().cloned());

    for (n_up, n_dn) in [(2, 2), (3, 3), (2, 1)] {
        let full = energies(&matrix(&ops, &Tj::<u16>::new(n, n_up, n_dn).unwrap()).unwrap());
        for sym in dihedral_irreps::<u16>(&group) {
            let basis = Tj::symmetric(n, n_up, n_dn, sym).unwrap();
            let h = matrix(&ops, &basis).unwrap();
            assert!((&h - h.adjoint()).norm() < 1e-12);
            assert_levels_contained(&energies(&h), &full);
        }
    }
}

#[test]
fn test_tj_half_filling_is_heisenberg() {
    let ops = ring(OpKind::Exchange, 1.0, 4, 1);
    let tj = Tj::<u16>::new(4, 2, 2).unwrap();
    let spin = SpinHalf::<u16>::new(4, Some(2)).unwrap();
    assert_same_spectrum(
        energies(&matrix(&ops, &tj).unwrap()),
        energies(&matrix(&ops, &spin).unwrap()),
    );
}

#[test]
fn test_free_fermion_ring() {
    let basis = Electron::<u16>::new(4, 2, 0).unwrap();
    let h = matrix(&ring(OpKind::Hop, 1.0, 4, 1), &basis).unwrap();
    assert_relative_eq!(
        diagonalize(&h, None).ground_energy().unwrap(),
        -2.0,
        epsilon = 1e-12
    );
}

#[test]
fn test_adjoint_list_gives_adjoint_matrix() {
    let mut m = [[c(0.0, 0.0); 4]; 4];
    for (a, row) in m.iter_mut().enumerate() {
        for (b, entry) in row.iter_mut().enumerate() {
            *entry = c((a * 4 + b) as f64 * 0.1, (a as f64 - b as f64) * 0.2 + 0.05);
        }
    }
    let mut spin_ops = OpList::new().with_coupling("Jc", c(0.3, -0.8));
    spin_ops.add(OpKind::Matrix, m, &[0, 2]);
    spin_ops.add(OpKind::Exchange, "Jc", &[1, 2]);
    spin_ops.add(OpKind::Ising, c(0.5, 0.5), &[0, 1]);
    spin_ops.add(OpKind::Sz, c(-0.2, 0.7), &[1]);
    let spin = SpinHalf::<u16>::new(3, None).unwrap();
    let h = matrix(&spin_ops, &spin).unwrap();
    let h_adj = matrix(&spin_ops.adjoint().unwrap(), &spin).unwrap();
    assert!((h_adj - h.adjoint()).norm() < 1e-12);

    let mut el_ops = OpList::new();
    el_ops.add(OpKind::Hop, c(1.0, 0.4), &[0, 2]);
    el_ops.add(OpKind::HopDn, c(0.0, 1.0), &[1, 2]);
    el_ops.add(OpKind::Number, c(0.3, 0.2), &[1]);
    el_ops.add(OpKind::NumberNumber, c(0.1, -0.6), &[0, 1]);
    el_ops.add(OpKind::Exchange, c(0.2, 0.9), &[0, 1]);
    let el = Electron::<u16>::new(3, 1, 2).unwrap();
    let h = matrix(&el_ops, &el).unwrap();
    let h_adj = matrix(&el_ops.adjoint().unwrap(), &el).unwrap();
    assert!((h_adj - h.adjoint()).norm() < 1e-12);
}

#[test]
fn test_flux_ring_is_hermitian_in_every_sector() {
    let n = 6;
    let ops = ring(OpKind::Hop, Complex64::from_polar(1.0, 0.3), n, 1);
    for sym in momentum_sectors::<u16>(n) {
        let basis = Electron::symmetric(n, 2, 1, sym).unwrap();
        let h = matrix(&ops, &basis).unwrap();
        assert!((&h - h.adjoint()).norm() < 1e-12);
    }
}

#[test]
fn test_index_of_raw_states() {
    let n = 8;
    for sym in momentum_sectors::<u16>(n) {
        let action = sym.action().clone();
        let basis = SpinHalf::symmetric(n, Some(4), sym).unwrap();
        for s in Combinations::<u16>::new(n, 4) {
            let rep = action.representative(s);
            assert_eq!(basis.index(s), basis.index(rep));
            if let Some(i) = basis.index(s) {
                assert_eq!(basis.state(i), rep);
            }
        }
    }

    let n = 5;
    for sym in momentum_sectors::<u16>(n) {
        let action = sym.action().clone();
        let basis = Electron::symmetric(n, 2, 2, sym).unwrap();
        for up in Combinations::<u16>::new(n, 2) {
            for dn in Combinations::<u16>::new(n, 2) {
                let idx = basis.index(up, dn);
                for g in 0..action.n_symmetries() {
                    assert_eq!(basis.index(action.apply(g, up), action.apply(g, dn)), idx);
                }
            }
        }
    }
}

fn distributed_apply<C: Communicator>(n: usize, n_up: usize, comm: C) -> Vec<(u32, Complex64)> {
    let basis = SpinHalfDistributed::<u32, _>::new(n, n_up, comm).unwrap();
    let op = DistributedOperator::new(&j1_j2(n, 0.3), &basis).unwrap();
    let x: Vec<Complex64> = basis.states().map(|s| c(s as f64, 1.0 / (1.0 + s as f64))).collect();
    let mut y = vec![c(0.0, 0.0); basis.size()];
    op.apply(&x, &mut y).unwrap();
    basis.states().zip(y).collect()
}

#[test]
fn test_distributed_matches_local() {
    let (n, n_up) = (12, 6);
    let basis = SpinHalf::<u32>::new(n, Some(n_up)).unwrap();
    let x: Vec<Complex64> = basis
        .states()
        .iter()
        .map(|&s| c(s as f64, 1.0 / (1.0 + s as f64)))
        .collect();
    let mut expected = vec![c(0.0, 0.0); basis.dim()];
    Operator::new(&j1_j2(n, 0.3), &basis)
        .unwrap()
        .apply(&x, &mut expected)
        .unwrap();

    let check = |parts: Vec<(u32, Complex64)>| {
        assert_eq!(parts.len(), basis.dim());
        for (s, v) in parts {
            let i = basis.index(s).unwrap();
            assert!((v - expected[i]).norm() < 1e-9 * (1.0 + expected[i].norm()));
        }
    };

    check(distributed_apply(n, n_up, LocalComm));

    let parts = thread::scope(|s| {
        let handles: Vec<_> = ThreadComm::create(3)
            .into_iter()
            .map(|comm| s.spawn(move || distributed_apply(n, n_up, comm)))
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect::<Vec<_>>()
    });
    check(parts);
}

#[test]
fn test_oplist_json_roundtrip() {
    let json = r#"{
        "ops": [
            {"kind": "EXCHANGE", "coupling": "J", "sites": [0, 1]},
            {"kind": "SZ", "coupling": [0.5, -0.25], "sites": [2]},
            {"kind": "ISING", "coupling": 0.75, "sites": [1, 2]}
        ],
        "couplings": {"J": 1.0}
    }"#;
    let ops: OpList = serde_json::from_str(json).unwrap();
    assert_eq!(ops.len(), 3);
    assert_eq!(ops.iter().next().map(|op| op.kind), Some(OpKind::Exchange));

    let back: OpList = serde_json::from_str(&serde_json::to_string(&ops).unwrap()).unwrap();
    assert_eq!(back, ops);

    let basis = SpinHalf::<u16>::new(3, None).unwrap();
    assert_eq!(matrix(&back, &basis).unwrap(), matrix(&ops, &basis).unwrap());

    let undefined: OpList =
        serde_json::from_str(r#"{"ops": [{"kind": "SZ", "coupling": "h", "sites": [0]}]}"#)
            .unwrap();
    assert!(matches!(
        matrix(&undefined, &basis),
        Err(EdError::UndefinedCoupling(_))
    ));
}

#[test]
fn test_lanczos_matches_dense() {
    let n = 10;
    let ops = j1_j2(n, 0.2);
    let basis = SpinHalf::<u16>::new(n, Some(5)).unwrap();
    let op = Operator::new(&ops, &basis).unwrap();
    let exact = diagonalize(&op.matrix(), Some(1));
    let spec = lanczos_operator(&op, &LanczosParams::default()).unwrap();
    assert_relative_eq!(
        spec.ground_energy().unwrap(),
        exact.ground_energy().unwrap(),
        epsilon = 1e-8
    );
}
