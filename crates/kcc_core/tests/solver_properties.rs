//! # Depenetration Solver Integration Test
//!
//! Randomized checks of the multi-contact solver and of the controller
//! built on top of it.

use std::sync::Arc;

use kcc_core::{FixedStep, Kcc, KccSettings, Quaternion, Resolver, StaticCollider, StaticWorld, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DT: f32 = 1.0 / 60.0;

fn random_direction(rng: &mut StdRng, min_y: f32) -> Vec3 {
    loop {
        let direction = Vec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(min_y..1.0),
            rng.gen_range(-1.0..1.0),
        );
        let length = direction.length();
        if length > 0.1 && length <= 1.0 {
            return direction / length;
        }
    }
}

fn resolver_with(corrections: &[(Vec3, f32)]) -> Resolver {
    let mut resolver = Resolver::new();
    for &(direction, distance) in corrections {
        resolver.add_correction(direction, distance);
    }
    resolver
}

/// Rotating every contact around the vertical axis rotates the correction.
#[test]
fn test_solution_follows_yaw_rotation() {
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for _ in 0..200 {
        let count = rng.gen_range(1..=4);
        let corrections: Vec<(Vec3, f32)> = (0..count)
            .map(|_| (random_direction(&mut rng, -1.0), rng.gen_range(0.01..0.3)))
            .collect();

        // The floor + walls path combines its parts with a component-wise
        // min/max, which only commutes with rotations about the up axis.
        // A tilted floor or opposing pair leaves that path, so only yaw is
        // checked and those inputs are skipped.
        let degenerate = corrections.iter().any(|(d, _)| d.y.abs() > 0.99)
            || corrections
                .iter()
                .enumerate()
                .any(|(i, (a, _))| corrections[i + 1..].iter().any(|(b, _)| a.dot(*b) < -0.999));
        if degenerate {
            continue;
        }

        let rotation = Quaternion::from_yaw(rng.gen_range(-180.0..180.0));
        let rotated: Vec<(Vec3, f32)> = corrections
            .iter()
            .map(|&(direction, distance)| (rotation.rotate(direction), distance))
            .collect();

        let expected = rotation.rotate(resolver_with(&corrections).compute_best(64, 1e-6));
        let actual = resolver_with(&rotated).compute_best(64, 1e-6);

        assert!(
            actual.distance(expected) < 1e-3,
            "rotated {actual:?} != {expected:?} for {corrections:?}"
        );
    }
}

/// The exact two-contact solve agrees with error descent run to convergence.
#[test]
fn test_binary_solve_matches_converged_descent() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut checked = 0;

    while checked < 200 {
        let a = random_direction(&mut rng, -1.0);
        let b = random_direction(&mut rng, -1.0);
        let dot = a.dot(b);
        if !(-0.9..-0.05).contains(&dot) {
            continue;
        }
        checked += 1;

        let resolver = resolver_with(&[(a, rng.gen_range(0.01..0.2)), (b, rng.gen_range(0.01..0.2))]);
        let exact = resolver.compute_best(8, 0.001);
        let iterative = resolver.compute_error_descent(500, 1e-9);

        assert!(exact.distance(iterative) < 1e-4, "{exact:?} != {iterative:?}");
    }
}

fn horizontal(yaw_degrees: f32) -> Vec3 {
    let (sin, cos) = yaw_degrees.to_radians().sin_cos();
    Vec3::new(cos, 0.0, sin)
}

/// A floor plus two opposing walls solved in closed form agrees with error
/// descent run to convergence, wherever the floor sits in the list.
#[test]
fn test_floor_and_walls_solve_matches_converged_descent() {
    let mut rng = StdRng::seed_from_u64(0xf100);
    let mut checked = 0;

    while checked < 200 {
        let a = horizontal(rng.gen_range(-180.0..180.0));
        let b = horizontal(rng.gen_range(-180.0..180.0));
        if !(-0.9..-0.05).contains(&a.dot(b)) {
            continue;
        }
        checked += 1;

        let floor = (Vec3::UP, rng.gen_range(0.01..0.2));
        let wall_a = (a, rng.gen_range(0.01..0.2));
        let wall_b = (b, rng.gen_range(0.01..0.2));
        let corrections = match checked % 3 {
            0 => [floor, wall_a, wall_b],
            1 => [wall_a, floor, wall_b],
            _ => [wall_a, wall_b, floor],
        };

        let resolver = resolver_with(&corrections);
        let exact = resolver.compute_best(8, 0.001);
        let iterative = resolver.compute_error_descent(5000, 1e-9);

        assert!((exact.y - floor.1).abs() < 1e-6, "floor correction changed: {exact:?}");
        assert!(exact.distance(iterative) < 1e-4, "{exact:?} != {iterative:?} for {corrections:?}");
    }
}

/// Every constraint holds after error descent when the contacts share a
/// common side.
#[test]
fn test_error_descent_satisfies_every_constraint() {
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..200 {
        let count = rng.gen_range(2..=6);
        let corrections: Vec<(Vec3, f32)> = (0..count)
            .map(|_| (random_direction(&mut rng, 0.2), rng.gen_range(0.01..0.3)))
            .collect();

        let result = resolver_with(&corrections).compute_error_descent(2000, 1e-5);

        for (direction, distance) in &corrections {
            assert!(
                result.dot(*direction) >= distance - 1e-4,
                "{result:?} violates {direction:?} by more than the tolerance"
            );
        }
    }
}

#[test]
fn test_orthogonal_contacts_are_not_summed_twice() {
    let resolver = resolver_with(&[(Vec3::new(1.0, 0.0, 0.0), 0.1), (Vec3::new(0.0, 0.0, 1.0), 0.2)]);

    let best = resolver.compute_best(8, 0.001);
    assert!(best.distance(Vec3::new(0.1, 0.0, 0.2)) < 1e-5);
    assert!(best.distance(resolver.compute_sum()) < 1e-5);
}

/// A resolved actor stays where it is on the next move.
#[test]
fn test_second_depenetration_is_idempotent() {
    let world = StaticWorld::new()
        .with(StaticCollider::cuboid(Vec3::new(1.4, 5.0, 0.0), Vec3::new(1.0, 10.0, 10.0)))
        .with(StaticCollider::cuboid(Vec3::new(0.0, 5.0, 1.4), Vec3::new(10.0, 10.0, 1.0)));
    let mut kcc = Kcc::new(Arc::new(world), KccSettings::default());
    kcc.spawn(Vec3::new(0.1, 5.0, 0.1), 0.0, 0.0, FixedStep::default()).unwrap();

    let radius = kcc.settings().radius;
    let mut positions = Vec::new();
    for tick in 1..=3 {
        kcc.begin_fixed_update(FixedStep {
            frame: tick,
            tick: i32::try_from(tick).unwrap(),
            time: 0.0,
            delta_time: DT,
        });
        kcc.fixed_update().unwrap();
        kcc.end_fixed_update();
        positions.push(kcc.fixed_data().target_position);
    }

    let resolved = positions[0];
    assert!((resolved.x - (0.4 - radius)).abs() < 1e-3);
    assert!((resolved.z - (0.4 - radius)).abs() < 1e-3);
    assert!((resolved.y - 5.0).abs() < 1e-5);
    for position in &positions[1..] {
        assert!(position.distance(resolved) < 1e-4, "{position:?} drifted from {resolved:?}");
    }
}
