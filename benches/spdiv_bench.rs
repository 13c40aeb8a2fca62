//! Masked division benchmarks.
//!
//! - benchmark_contiguous: 1D `f64 / f64`, sizes 2^2 .. 2^20
//! - benchmark_transposed: 2D `f64 / f64` with a transposed divisor
//! - benchmark_converted: 1D `i32 / f32`, exercising the conversion buffer

use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::hint::black_box;
use std::time::{Duration, Instant};
use strided_spdiv::{spdiv, spdiv_into, MaskedArray};

fn median(durations: &mut [Duration]) -> Duration {
    durations.sort();
    durations[durations.len() / 2]
}

/// Adaptive bench: run enough iterations to get stable timing.
fn bench_adaptive(mut f: impl FnMut()) -> Duration {
    for _ in 0..3 {
        f();
    }

    let t0 = Instant::now();
    f();
    let single = t0.elapsed();
    let iters = if single.as_nanos() == 0 {
        10000
    } else {
        ((100_000_000u128 / single.as_nanos()) as usize).clamp(3, 10000)
    };

    let mut samples = Vec::with_capacity(iters);
    for _ in 0..iters {
        let t0 = Instant::now();
        f();
        samples.push(t0.elapsed());
    }
    median(&mut samples)
}

fn sizes() -> Vec<usize> {
    let mut sizes = Vec::new();
    let mut exp = 2.0f64;
    while exp <= 20.0 {
        sizes.push(2.0f64.powf(exp).ceil() as usize);
        exp += 1.5;
    }
    sizes
}

/// Random values with roughly 10% hidden and 5% zeros.
fn make_random(dims: &[usize], seed: u64) -> MaskedArray<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    MaskedArray::from_fn_row_major(dims, |_| {
        let roll: f64 = rng.gen();
        if roll < 0.1 {
            None
        } else if roll < 0.15 {
            Some(0.0)
        } else {
            Some(rng.sample(StandardNormal))
        }
    })
}

fn benchmark_contiguous() {
    println!("=== benchmark_contiguous (1D f64) ===");
    println!(
        "{:>10} {:>12} {:>12} {:>8}",
        "size", "naive (us)", "spdiv (us)", "ratio"
    );

    for (i, &s) in sizes().iter().enumerate() {
        let a = make_random(&[s], 2 * i as u64);
        let b = make_random(&[s], 2 * i as u64 + 1);
        let mut out = MaskedArray::<f64>::row_major(&[s]);

        let t_naive = bench_adaptive(|| {
            let (ad, am) = (a.data(), a.mask());
            let (bd, bm) = (b.data(), b.mask());
            let mut acc = 0usize;
            for k in 0..s {
                if am[k].is_exposed() && bm[k].is_exposed() && bd[k] != 0.0 {
                    acc += (ad[k] / bd[k]).is_sign_positive() as usize;
                }
            }
            black_box(acc);
        });

        let (av, bv) = (a.view(), b.view());
        let t_spdiv = bench_adaptive(|| {
            spdiv_into(&av, &bv, &mut out.view_mut()).unwrap();
            black_box(out.data().as_ptr());
        });

        let ratio = t_spdiv.as_nanos() as f64 / t_naive.as_nanos().max(1) as f64;
        println!(
            "{:>10} {:>12.3} {:>12.3} {:>8.2}x",
            s,
            t_naive.as_nanos() as f64 / 1e3,
            t_spdiv.as_nanos() as f64 / 1e3,
            ratio
        );
    }
    println!();
}

fn benchmark_transposed() {
    println!("=== benchmark_transposed (2D f64, b permuted) ===");
    println!("{:>6} {:>10} {:>12}", "s", "s^2", "spdiv (us)");

    for (i, &s) in [16usize, 64, 256, 1024].iter().enumerate() {
        let a = make_random(&[s, s], 100 + i as u64);
        let b = make_random(&[s, s], 200 + i as u64);
        let av = a.view();
        let bt = b.view().permute(&[1, 0]).unwrap();
        let mut out = MaskedArray::<f64>::row_major(&[s, s]);

        let t = bench_adaptive(|| {
            spdiv_into(&av, &bt, &mut out.view_mut()).unwrap();
            black_box(out.data().as_ptr());
        });

        println!("{:>6} {:>10} {:>12.3}", s, s * s, t.as_nanos() as f64 / 1e3);
    }
    println!();
}

fn benchmark_converted() {
    println!("=== benchmark_converted (1D i32 / f32, allocating) ===");
    println!("{:>10} {:>12}", "size", "spdiv (us)");

    for (i, &s) in sizes().iter().enumerate() {
        let mut rng = StdRng::seed_from_u64(300 + i as u64);
        let a = MaskedArray::from_fn_row_major(&[s], |_| Some(rng.gen_range(-1000..1000i32)));
        let b = MaskedArray::from_fn_row_major(&[s], |_| Some(rng.gen_range(-4.0..4.0f32)));
        let (av, bv) = (a.view(), b.view());

        let t = bench_adaptive(|| {
            let out = spdiv(&av, &bv).unwrap();
            black_box(out);
        });

        println!("{:>10} {:>12.3}", s, t.as_nanos() as f64 / 1e3);
    }
    println!();
}

fn main() {
    println!("Masked division benchmarks");
    println!("Row-major layout. Median timing.");
    println!();

    benchmark_contiguous();
    benchmark_transposed();
    benchmark_converted();
}
