//! # Apply Benchmarks
//!
//! Matrix-free `H x` on spin-1/2 and Hubbard rings, with and without
//! translation symmetry, serial and rayon-parallel.
//!
//! Run: `cargo bench --bench apply`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use num_complex::Complex64;
use phyz_ed::{
    ApplyParams, Basis, Electron, OpKind, OpList, Operator, PermutationGroup, Representation,
    SpinHalf, Symmetry,
};

fn heisenberg(n: usize) -> OpList {
    let mut ops = OpList::new();
    for i in 0..n {
        ops.add(OpKind::Exchange, 1.0, &[i, (i + 1) % n]);
    }
    ops
}

fn hubbard(n: usize, u: f64) -> OpList {
    let mut ops = OpList::new();
    for i in 0..n {
        ops.add(OpKind::Hop, 1.0, &[i, (i + 1) % n]);
    }
    ops.add(OpKind::HubbardU, u, &[]);
    ops
}

fn run<Bs: Basis>(c: &mut Criterion, name: &str, ops: &OpList, basis: &Bs) {
    let mut group = c.benchmark_group(name);
    let dim = basis.dim();
    let x = vec![Complex64::new(1.0 / (dim as f64).sqrt(), 0.0); dim];
    let mut y = vec![Complex64::new(0.0, 0.0); dim];

    for parallel in [false, true] {
        let op = Operator::new(ops, basis).unwrap().with_params(ApplyParams {
            parallel,
            ..ApplyParams::default()
        });
        let label = if parallel { "rayon" } else { "serial" };
        group.bench_with_input(BenchmarkId::new(label, dim), &x, |b, x| {
            b.iter(|| op.apply(black_box(x), &mut y).unwrap())
        });
    }
    group.finish();
}

fn bench_spinhalf(c: &mut Criterion) {
    let n = 20;
    let ops = heisenberg(n);
    let plain = SpinHalf::<u32>::new(n, Some(n / 2)).unwrap();
    run(c, "spinhalf_plain", &ops, &plain);

    let group = PermutationGroup::cyclic(n).unwrap();
    let irrep = Representation::momentum(&group, 0).unwrap();
    let sym = SpinHalf::<u32>::symmetric(n, Some(n / 2), Symmetry::new(&group, irrep).unwrap())
        .unwrap();
    run(c, "spinhalf_k0", &ops, &sym);
}

fn bench_electron(c: &mut Criterion) {
    let n = 10;
    let ops = hubbard(n, 4.0);
    let group = PermutationGroup::cyclic(n).unwrap();
    let irrep = Representation::momentum(&group, 0).unwrap();
    let basis =
        Electron::<u16>::symmetric(n, 4, 4, Symmetry::new(&group, irrep).unwrap()).unwrap();
    run(c, "hubbard_k0", &ops, &basis);
}

criterion_group!(benches, bench_spinhalf, bench_electron);
criterion_main!(benches);
