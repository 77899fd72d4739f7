use criterion::{criterion_group, criterion_main, Criterion};
use faer::{Mat, Parallelism};
use faer_hmat::{
    admissibility::StandardAdmissibility, builder::HMatrixBuilder, ClusterTree, ClusteringMethod,
    Factorization, HMatrix,
};
use rand::prelude::*;

fn kernel_matrix(n: usize) -> Mat<f64> {
    let rng = &mut StdRng::seed_from_u64(0);
    let points = Mat::from_fn(n, 3, |_, _| rng.gen::<f64>());
    Mat::from_fn(n, n, |i, j| {
        let mut d2 = 0.0;
        for k in 0..3 {
            let d = points.read(i, k) - points.read(j, k);
            d2 += d * d;
        }
        (-d2).exp() + if i == j { 1.0 } else { 0.0 }
    })
}

pub fn factorize(c: &mut Criterion) {
    for n in [256, 512, 1024] {
        let a = kernel_matrix(n);
        for (name, kind) in [
            ("lu", Factorization::Lu),
            ("ldlt", Factorization::Ldlt),
            ("llt", Factorization::Llt),
            ("inv", Factorization::Inverse),
        ] {
            for (tag, parallelism) in [
                ("st", Parallelism::None),
                ("mt", Parallelism::Rayon(rayon::current_num_threads())),
            ] {
                let tree = HMatrix::from_dense_uniform(a.as_ref(), 64);
                c.bench_function(&format!("hmat-{tag}-{name}-{n}"), |b| {
                    b.iter(|| tree.clone().factorize(kind, parallelism).unwrap())
                });
            }
        }
    }
}

pub fn solve(c: &mut Criterion) {
    for n in [256, 1024] {
        let a = kernel_matrix(n);
        let factors = HMatrix::from_dense_uniform(a.as_ref(), 64)
            .factorize(Factorization::Llt, Parallelism::None)
            .unwrap();
        let rhs = Mat::from_fn(n, 8, |i, j| (i + j) as f64);
        c.bench_function(&format!("hmat-llt-solve-{n}"), |b| {
            let mut x = rhs.clone();
            b.iter(|| factors.solve_in_place(x.as_mut(), Parallelism::None).unwrap())
        });
    }
}

pub fn assemble(c: &mut Criterion) {
    let n = 2048;
    let rng = &mut StdRng::seed_from_u64(1);
    let points = Mat::from_fn(n, 3, |_, _| rng.gen::<f64>());
    let entry = |i: usize, j: usize| {
        let mut d2 = 0.0;
        for k in 0..3 {
            let d = points.read(i, k) - points.read(j, k);
            d2 += d * d;
        }
        1.0 / (1.0 + d2.sqrt())
    };

    c.bench_function(&format!("cluster-tree-{n}"), |b| {
        b.iter(|| ClusterTree::new(points.as_ref(), 64, ClusteringMethod::Median).unwrap())
    });

    let tree = ClusterTree::new(points.as_ref(), 64, ClusteringMethod::Median).unwrap();
    let admissibility = StandardAdmissibility::new(2.0);
    c.bench_function(&format!("build-{n}"), |b| {
        b.iter(|| {
            HMatrixBuilder::new(&tree, &tree, &admissibility)
                .build(entry, Parallelism::Rayon(rayon::current_num_threads()))
        })
    });
}

criterion_group!(benches, factorize, solve, assemble);
criterion_main!(benches);
