use std::sync::Arc;
use std::time::Instant;

use nalgebra::{DMatrix, DVector};

use crate::simulation::dofmap::DofMap;
use crate::simulation::integrator::velocity_verlet;
use crate::simulation::forces::Spring;
use crate::simulation::states::ParticleSystem;

/// Build a 1D chain of `n` particles, unit spacing, springs between neighbors
fn chain_system(n: usize) -> ParticleSystem {
    let x = DMatrix::from_fn(n, 1, |r, _| r as f64);
    let m = DVector::from_element(n, 1.0);
    let dofs = DMatrix::from_fn(n, 1, |r, _| r);

    let mut sys = ParticleSystem::new(m, x, dofs).expect("chain construction");

    let pairs: Vec<[usize; 2]> = (0..n - 1).map(|i| [i, i + 1]).collect();
    let np = pairs.len();
    sys.attach(Spring::new(pairs, vec![1.0; np], vec![1.0; np]).expect("chain springs"))
        .expect("chain attach");

    sys
}

/// Compare serial and pooled assembly over a range of system sizes
pub fn bench_assemble() {
    let ns = [1_000, 10_000, 100_000, 1_000_000];
    let reps = 20;

    let pool = rayon::ThreadPoolBuilder::new()
        .build()
        .expect("bench thread pool");

    for n in ns {
        // dense aliasing: pairs of particles share every DOF
        let dofs = DMatrix::from_fn(n, 2, |r, c| (r / 2) * 2 + c);
        let map = DofMap::new(dofs).expect("bench DOF map");

        let pvector = DMatrix::from_fn(n, 2, |r, c| ((r * 2 + c) as f64 * 0.37).sin());

        // warm up
        let _ = map.assemble_dofs(&pvector);
        let _ = map.assemble_dofs_on(&pool, &pvector);

        let t0 = Instant::now();
        for _ in 0..reps {
            let _ = map.assemble_dofs(&pvector);
        }
        let dt_serial = t0.elapsed().as_secs_f64() / reps as f64;

        let t0 = Instant::now();
        for _ in 0..reps {
            let _ = map.assemble_dofs_on(&pool, &pvector);
        }
        let dt_pooled = t0.elapsed().as_secs_f64() / reps as f64;

        println!(
            "assemble n={:>8}: serial {:.3e} s, pooled {:.3e} s, speedup {:.2}x",
            n,
            dt_serial,
            dt_pooled,
            dt_serial / dt_pooled
        );
    }
}

/// Steps per second of the velocity-Verlet integrator on a spring chain
pub fn bench_verlet() {
    let ns = [100, 1_000, 10_000];
    let steps = 200;
    let dt = 1.0e-3;

    for n in ns {
        let mut sys = chain_system(n);

        // perturb the chain so forces are nonzero
        let x = sys.x() * 1.01;
        sys.set_x(x);

        // warm up
        velocity_verlet(&mut sys, dt);

        let t0 = Instant::now();
        for _ in 0..steps {
            velocity_verlet(&mut sys, dt);
        }
        let elapsed = t0.elapsed().as_secs_f64();

        println!(
            "verlet n={:>6}: {:.3e} s/step ({:.0} steps/s)",
            n,
            elapsed / steps as f64,
            steps as f64 / elapsed
        );
    }
}

/// Same chain benchmark with the assembly running on a pool
pub fn bench_verlet_pooled() {
    let ns = [1_000, 10_000];
    let steps = 200;
    let dt = 1.0e-3;

    let pool = Arc::new(
        rayon::ThreadPoolBuilder::new()
            .build()
            .expect("bench thread pool"),
    );

    for n in ns {
        let mut sys = chain_system(n).with_pool(pool.clone());

        let x = sys.x() * 1.01;
        sys.set_x(x);

        velocity_verlet(&mut sys, dt);

        let t0 = Instant::now();
        for _ in 0..steps {
            velocity_verlet(&mut sys, dt);
        }
        let elapsed = t0.elapsed().as_secs_f64();

        println!(
            "verlet (pooled) n={:>6}: {:.3e} s/step ({:.0} steps/s)",
            n,
            elapsed / steps as f64,
            steps as f64 / elapsed
        );
    }
}
