//! Lagrange point geometry across the valid mass-ratio range

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use synodic::physics::lagrange::{
    BisectionConfig, LagrangePoint, MIN_RESOLVABLE_MASS_RATIO, collinear_balance,
    locate_lagrange_points, locate_lagrange_points_with,
};
use synodic::prelude::{MassRatio, Scalar, SynodicError};
use synodic::test_utils::assert_close;

const APEX: Scalar = 0.866_025_403_784_438_6;

#[test]
fn test_collinear_ordering_for_random_mass_ratios() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5EED);

    for _ in 0..200 {
        let mu: Scalar = rng.random_range(1e-4..=0.5);
        let mass_ratio = MassRatio::new(mu).unwrap();
        let points = locate_lagrange_points(mu).unwrap();

        let primary = mass_ratio.primary_position().x;
        let secondary = mass_ratio.secondary_position().x;
        let (l1, l2, l3) = (points.l1().x, points.l2().x, points.l3().x);

        assert!(
            l2 < secondary && secondary < l1 && l1 < primary && primary < l3,
            "μ = {mu}: L2 = {l2}, secondary = {secondary}, L1 = {l1}, primary = {primary}, L3 = {l3}"
        );
        for point in LagrangePoint::COLLINEAR {
            assert_eq!(points.get(point).y, 0.0);
            let x = points.get(point).x;
            assert!(collinear_balance(x, mass_ratio).abs() < 1e-6, "{point} at μ = {mu}");
        }
        assert!(points.all_converged(), "μ = {mu}");
    }
}

#[test]
fn test_collinear_ordering_down_to_smallest_resolvable_mass_ratio() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x71DE);
    let smallest = MIN_RESOLVABLE_MASS_RATIO.log10();

    for _ in 0..100 {
        let exponent: Scalar = rng.random_range(smallest..=-4.0);
        let mu = 10.0_f64.powf(exponent).max(MIN_RESOLVABLE_MASS_RATIO);
        let mass_ratio = MassRatio::new(mu).unwrap();
        let points = locate_lagrange_points(mu).unwrap();

        let primary = mass_ratio.primary_position().x;
        let secondary = mass_ratio.secondary_position().x;
        let (l1, l2, l3) = (points.l1().x, points.l2().x, points.l3().x);

        assert!(
            l2 < secondary && secondary < l1 && l1 < primary && primary < l3,
            "μ = {mu:e}: L2 = {l2}, secondary = {secondary}, L1 = {l1}, L3 = {l3}"
        );
        assert!(points.all_converged(), "μ = {mu:e}");
    }

    let below = locate_lagrange_points(MIN_RESOLVABLE_MASS_RATIO / 1e5);
    assert!(matches!(
        below,
        Err(SynodicError::InvalidParameter { parameter: "mass_ratio", .. })
    ));
}

#[test]
fn test_triangular_points_form_equilateral_triangles() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    for _ in 0..50 {
        let mu: Scalar = rng.random_range(1e-4..=0.5);
        let mass_ratio = MassRatio::new(mu).unwrap();
        let points = locate_lagrange_points(mu).unwrap();

        for point in [points.l4(), points.l5()] {
            let to_primary = (point - mass_ratio.primary_position()).norm();
            let to_secondary = (point - mass_ratio.secondary_position()).norm();
            assert_close(to_primary, 1.0, 1e-12, "distance to primary");
            assert_close(to_secondary, 1.0, 1e-12, "distance to secondary");
        }
        assert_close(points.l4().x, mu - 0.5, 1e-15, "L4 x");
        assert_eq!(points.l4().y, APEX);
        assert_eq!(points.l5().y, -APEX);
        assert!(points.estimate(LagrangePoint::L4).is_none());
    }
}

#[test]
fn test_equal_masses_are_symmetric() {
    let points = locate_lagrange_points(0.5).unwrap();

    assert!(points.l1().x.abs() < 1e-6, "L1 = {}", points.l1().x);
    assert_close(points.l2().x, -points.l3().x, 1e-6, "L2 mirrors L3");
    assert_close(points.l3().x, 1.198_406_22, 1e-6, "L3");
    assert_eq!(points.l4().x, 0.0);
    assert_eq!(points.l5().x, 0.0);
}

#[test]
fn test_earth_moon_points() {
    let points = locate_lagrange_points(0.01215).unwrap();

    assert_close(points.l1().x, -0.836_918, 1e-3, "Earth–Moon L1");
    assert_close(points.l2().x, -1.155_7, 1e-3, "Earth–Moon L2");
    assert_close(points.l3().x, 1.005_06, 1e-3, "Earth–Moon L3");
}

#[test]
fn test_invalid_mass_ratios_rejected() {
    for mu in [0.0, -0.1, 0.50001, 1.0, Scalar::NAN, Scalar::INFINITY] {
        assert!(
            matches!(
                locate_lagrange_points(mu),
                Err(SynodicError::InvalidParameter { parameter: "mass_ratio", .. })
            ),
            "μ = {mu} was accepted"
        );
    }
}

#[test]
fn test_strict_mode_reports_unconverged_root() {
    let config = BisectionConfig {
        max_iterations: 3,
        tolerance: 1e-14,
        strict: true,
        ..BisectionConfig::default()
    };

    match locate_lagrange_points_with(0.3, &config) {
        Err(SynodicError::RootNotConverged {
            point, iterations, ..
        }) => {
            assert_eq!(point, LagrangePoint::L1);
            assert_eq!(iterations, 3);
        }
        other => panic!("expected RootNotConverged, got {other:?}"),
    }

    let lenient = BisectionConfig {
        strict: false,
        ..config
    };
    let points = locate_lagrange_points_with(0.3, &lenient).unwrap();
    assert!(!points.all_converged());
    let l1 = points.estimate(LagrangePoint::L1).unwrap();
    assert_eq!(l1.iterations, 3);
    assert!(!l1.converged);
}
