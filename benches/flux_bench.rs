//! Benchmarks for the Euler numerical flux.
//!
//! Run with: `cargo bench --bench flux_bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fv_rs::physics::euler::EULER_VARS;
use fv_rs::physics::{EdgeGeometry, EulerConfig, EulerPhysics, Physics, Reconstruction};

/// Generate edge state pairs with varying jumps and normals.
fn generate_states(n: usize) -> Vec<([f64; EULER_VARS], [f64; EULER_VARS], (f64, f64))> {
    let mut states = Vec::with_capacity(n);
    for i in 0..n {
        let phase = i as f64 * 0.1;
        let left = EulerPhysics::conserved(
            1.4,
            1.0 + 0.2 * phase.sin(),
            0.5 + 0.3 * phase.cos(),
            0.1 * phase.sin(),
            1.0 + 0.1 * (phase + 0.4).sin(),
        );
        let right = EulerPhysics::conserved(
            1.4,
            1.0 + 0.15 * (phase + 0.5).sin(),
            0.4 + 0.2 * (phase + 0.3).cos(),
            -0.05 * phase.cos(),
            0.95 + 0.1 * (phase + 0.8).cos(),
        );
        let angle = phase * 0.5;
        states.push((left, right, (angle.cos(), angle.sin())));
    }
    states
}

fn bench_roe_flux(c: &mut Criterion) {
    let physics = EulerPhysics::uniform_flow(EulerConfig::default(), 1.0, 0.5, 0.0, 1.0);
    let states = generate_states(1000);
    let zero = [0.0; EULER_VARS];
    let one = [1.0; EULER_VARS];

    c.bench_function("roe_flux_1000_edges", |b| {
        b.iter(|| {
            let mut f = [0.0; EULER_VARS];
            let mut total = 0.0;
            for (left, right, normal) in &states {
                let geom = EdgeGeometry {
                    normal: *normal,
                    di: (0.01, 0.0),
                    dj: (-0.01, 0.0),
                    area_i: 1e-4,
                    length: 0.01,
                };
                let recon = Reconstruction {
                    gx_i: &zero,
                    gy_i: &zero,
                    gx_j: &zero,
                    gy_j: &zero,
                    lim_i: &one,
                    lim_j: &one,
                };
                physics.flux(&mut f, black_box(left), black_box(right), &recon, &geom);
                total += f[0];
            }
            black_box(total)
        })
    });
}

criterion_group!(benches, bench_roe_flux);
criterion_main!(benches);
