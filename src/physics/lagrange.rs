//! Lagrange-point locator
//!
//! The three collinear points are found by bisection on the x-axis
//! acceleration balance, one bracket per point. Each bracket lies on an open
//! interval between the body singularities where the balance function is
//! strictly increasing, so it holds exactly one root and the ordering
//!
//! ```text
//! L2 < x_secondary < L1 < x_primary < L3
//! ```
//!
//! follows from the brackets themselves. L4 and L5 are closed form.

use crate::error::{SynodicError, SynodicResult};
use crate::physics::math::{Point, Scalar};
use crate::physics::state::MassRatio;
use serde::{Deserialize, Serialize};
use std::fmt;
use synodic_macros::ConfigDefaults;
use tracing::{debug, warn};

/// Half the height of an equilateral triangle with unit side
const TRIANGLE_APEX: Scalar = 0.866_025_403_784_438_6;

/// Smallest mass ratio whose L1/L2 offsets from the secondary, about
/// (μ/3)^(1/3), still span several ulps of the secondary's coordinate.
pub const MIN_RESOLVABLE_MASS_RATIO: Scalar = 1e-40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LagrangePoint {
    L1,
    L2,
    L3,
    L4,
    L5,
}

impl LagrangePoint {
    pub const ALL: [LagrangePoint; 5] = [Self::L1, Self::L2, Self::L3, Self::L4, Self::L5];

    pub const COLLINEAR: [LagrangePoint; 3] = [Self::L1, Self::L2, Self::L3];

    pub fn is_collinear(self) -> bool {
        matches!(self, Self::L1 | Self::L2 | Self::L3)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for LagrangePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::L1 => "L1",
            Self::L2 => "L2",
            Self::L3 => "L3",
            Self::L4 => "L4",
            Self::L5 => "L5",
        };
        f.write_str(label)
    }
}

/// Search parameters for the collinear points.
#[derive(ConfigDefaults, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BisectionConfig {
    /// Midpoint evaluations per bracket
    #[default(50)]
    pub max_iterations: usize,

    /// Absolute bound on |f(midpoint)| for accepting a root
    #[default(1e-6)]
    pub tolerance: Scalar,

    /// Distance kept between a bracket end and a body
    #[default(1e-10)]
    pub singularity_margin: Scalar,

    /// Raise `RootNotConverged` instead of returning the best midpoint
    #[default(false)]
    pub strict: bool,
}

impl BisectionConfig {
    pub fn validate(&self) -> SynodicResult<()> {
        if self.max_iterations == 0 {
            return Err(SynodicError::invalid(
                "max_iterations",
                "at least one iteration is required",
            ));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(SynodicError::invalid(
                "tolerance",
                format!("must be positive and finite, got {}", self.tolerance),
            ));
        }
        if !(self.singularity_margin.is_finite()
            && self.singularity_margin > 0.0
            && self.singularity_margin < 0.5)
        {
            return Err(SynodicError::invalid(
                "singularity_margin",
                format!("must lie in (0, 0.5), got {}", self.singularity_margin),
            ));
        }
        Ok(())
    }
}

/// Outcome of one bisection search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RootEstimate {
    pub x: Scalar,
    /// |f(x)| at the returned estimate
    pub residual: Scalar,
    pub iterations: usize,
    pub converged: bool,
}

/// Acceleration balance along the x-axis,
/// f(x) = x − (1 − μ)(x − μ)/|x − μ|³ − μ(x − μ + 1)/|x − μ + 1|³.
pub fn collinear_balance(x: Scalar, mass_ratio: MassRatio) -> Scalar {
    let mu = mass_ratio.value();
    let d1 = x - mu;
    let d2 = x - mu + 1.0;
    let r1 = d1.abs();
    let r2 = d2.abs();
    x - (1.0 - mu) * d1 / (r1 * r1 * r1) - mu * d2 / (r2 * r2 * r2)
}

/// Search bracket for a collinear point.
///
/// The margin is capped at a tenth of the Hill radius (μ/3)^(1/3), so the
/// L1 and L2 roots stay inside their brackets for small secondaries.
/// Returns `None` for L4 and L5, which need no search.
pub fn collinear_bracket(
    point: LagrangePoint,
    mass_ratio: MassRatio,
    margin: Scalar,
) -> Option<(Scalar, Scalar)> {
    let primary = mass_ratio.primary_position().x;
    let secondary = mass_ratio.secondary_position().x;
    let margin = margin.min(0.1 * (mass_ratio.value() / 3.0).cbrt());
    match point {
        LagrangePoint::L1 => Some((secondary + margin, primary - margin)),
        LagrangePoint::L2 => Some((secondary - 2.0, secondary - margin)),
        LagrangePoint::L3 => Some((primary + margin, primary + 2.0)),
        LagrangePoint::L4 | LagrangePoint::L5 => None,
    }
}

/// Bracketed bisection on `f` over `(a, b)`.
///
/// Each iteration evaluates the midpoint and keeps the half whose end values
/// still differ in sign. Stops as soon as |f(mid)| < `tolerance`. When the
/// iteration budget runs out the last midpoint is returned with
/// `converged = false`.
///
/// # Errors
/// `InvalidParameter` when the bracket is empty or `f` has the same sign at
/// both ends.
pub fn bisect<F>(
    f: F,
    bracket: (Scalar, Scalar),
    max_iterations: usize,
    tolerance: Scalar,
) -> SynodicResult<RootEstimate>
where
    F: Fn(Scalar) -> Scalar,
{
    let (mut a, mut b) = bracket;
    if !(a.is_finite() && b.is_finite() && a < b) {
        return Err(SynodicError::invalid(
            "bracket",
            format!("expected a finite interval with a < b, got ({a}, {b})"),
        ));
    }

    let mut fa = f(a);
    let fb = f(b);
    if !(fa.is_finite() && fb.is_finite()) || fa.signum() == fb.signum() {
        return Err(SynodicError::invalid(
            "bracket",
            format!("no sign change on ({a}, {b}): f(a) = {fa}, f(b) = {fb}"),
        ));
    }

    let mut estimate = RootEstimate {
        x: 0.5 * (a + b),
        residual: Scalar::INFINITY,
        iterations: 0,
        converged: false,
    };

    for iteration in 1..=max_iterations {
        let mid = 0.5 * (a + b);
        let fm = f(mid);
        estimate = RootEstimate {
            x: mid,
            residual: fm.abs(),
            iterations: iteration,
            converged: fm.abs() < tolerance,
        };
        if estimate.converged {
            break;
        }
        if fa.signum() == fm.signum() {
            a = mid;
            fa = fm;
        } else {
            b = mid;
        }
    }

    Ok(estimate)
}

/// Locate one collinear point.
pub fn locate_collinear_point(
    point: LagrangePoint,
    mass_ratio: MassRatio,
    config: &BisectionConfig,
) -> SynodicResult<RootEstimate> {
    let Some(bracket) = collinear_bracket(point, mass_ratio, config.singularity_margin) else {
        return Err(SynodicError::invalid(
            "point",
            format!("{point} is not a collinear point"),
        ));
    };

    let estimate = bisect(
        |x| collinear_balance(x, mass_ratio),
        bracket,
        config.max_iterations,
        config.tolerance,
    )?;

    if !estimate.converged {
        if config.strict {
            return Err(SynodicError::RootNotConverged {
                point,
                iterations: estimate.iterations,
                estimate: estimate.x,
                residual: estimate.residual,
            });
        }
        warn!(
            "{point} bisection stopped after {} iterations with |f| = {:e} (tolerance {:e}); using x = {}",
            estimate.iterations, estimate.residual, config.tolerance, estimate.x
        );
    }

    Ok(estimate)
}

/// The five equilibrium points for one mass ratio.
#[derive(Debug, Clone, PartialEq)]
pub struct LagrangePointSet {
    mass_ratio: MassRatio,
    points: [Point; 5],
    collinear: [RootEstimate; 3],
}

impl LagrangePointSet {
    pub fn mass_ratio(&self) -> MassRatio {
        self.mass_ratio
    }

    pub fn get(&self, point: LagrangePoint) -> Point {
        self.points[point.index()]
    }

    pub fn l1(&self) -> Point {
        self.get(LagrangePoint::L1)
    }

    pub fn l2(&self) -> Point {
        self.get(LagrangePoint::L2)
    }

    pub fn l3(&self) -> Point {
        self.get(LagrangePoint::L3)
    }

    pub fn l4(&self) -> Point {
        self.get(LagrangePoint::L4)
    }

    pub fn l5(&self) -> Point {
        self.get(LagrangePoint::L5)
    }

    /// Labeled points in L1..L5 order.
    pub fn iter(&self) -> impl Iterator<Item = (LagrangePoint, Point)> + '_ {
        LagrangePoint::ALL
            .into_iter()
            .map(move |point| (point, self.get(point)))
    }

    /// Bisection report for a collinear point; `None` for L4 and L5.
    pub fn estimate(&self, point: LagrangePoint) -> Option<&RootEstimate> {
        point
            .is_collinear()
            .then(|| &self.collinear[point.index()])
    }

    pub fn all_converged(&self) -> bool {
        self.collinear.iter().all(|estimate| estimate.converged)
    }
}

/// Locate all five points with the default search parameters.
///
/// # Errors
/// `InvalidParameter` when `mass_ratio` lies outside
/// [`MIN_RESOLVABLE_MASS_RATIO`], 0.5].
pub fn locate_lagrange_points(mass_ratio: Scalar) -> SynodicResult<LagrangePointSet> {
    locate_lagrange_points_with(mass_ratio, &BisectionConfig::default())
}

pub fn locate_lagrange_points_with(
    mass_ratio: Scalar,
    config: &BisectionConfig,
) -> SynodicResult<LagrangePointSet> {
    let mass_ratio = MassRatio::new(mass_ratio)?;
    if mass_ratio.value() < MIN_RESOLVABLE_MASS_RATIO {
        return Err(SynodicError::invalid(
            "mass_ratio",
            format!(
                "{mass_ratio} is below {MIN_RESOLVABLE_MASS_RATIO:e}; L1 and L2 \
                 cannot be separated from the secondary in double precision"
            ),
        ));
    }
    config.validate()?;

    let l1 = locate_collinear_point(LagrangePoint::L1, mass_ratio, config)?;
    let l2 = locate_collinear_point(LagrangePoint::L2, mass_ratio, config)?;
    let l3 = locate_collinear_point(LagrangePoint::L3, mass_ratio, config)?;

    let primary = mass_ratio.primary_position();
    let secondary = mass_ratio.secondary_position();
    let apex_x = 0.5 * (primary.x + secondary.x);

    let points = [
        Point::new(l1.x, 0.0),
        Point::new(l2.x, 0.0),
        Point::new(l3.x, 0.0),
        Point::new(apex_x, TRIANGLE_APEX),
        Point::new(apex_x, -TRIANGLE_APEX),
    ];

    debug!(
        "Lagrange points for {mass_ratio}: L1 = {}, L2 = {}, L3 = {}, L4/L5 x = {apex_x}",
        l1.x, l2.x, l3.x
    );

    Ok(LagrangePointSet {
        mass_ratio,
        points,
        collinear: [l1, l2, l3],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BisectionConfig::default();
        assert_eq!(config.max_iterations, 50);
        assert_eq!(config.tolerance, 1e-6);
        assert!(!config.strict);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bisect_finds_simple_root() {
        let estimate = bisect(|x| x * x - 2.0, (0.0, 2.0), 60, 1e-12).unwrap();
        assert!(estimate.converged);
        assert!((estimate.x - std::f64::consts::SQRT_2).abs() < 1e-12);
        assert!(estimate.residual < 1e-12);
    }

    #[test]
    fn test_bisect_stops_early_at_exact_midpoint_root() {
        let estimate = bisect(|x| x, (-1.0, 1.0), 50, 1e-6).unwrap();
        assert_eq!(estimate.x, 0.0);
        assert_eq!(estimate.iterations, 1);
        assert!(estimate.converged);
    }

    #[test]
    fn test_bisect_exhausted_budget_returns_best_midpoint() {
        let estimate = bisect(|x| x - 0.3, (0.0, 1.0), 3, 1e-12).unwrap();
        assert!(!estimate.converged);
        assert_eq!(estimate.iterations, 3);
        // Midpoints 0.5, 0.25, 0.375
        assert_eq!(estimate.x, 0.375);
    }

    #[test]
    fn test_bisect_rejects_bracket_without_sign_change() {
        let result = bisect(|x| x * x + 1.0, (-1.0, 1.0), 50, 1e-6);
        assert!(matches!(
            result,
            Err(SynodicError::InvalidParameter { parameter: "bracket", .. })
        ));
        assert!(bisect(|x| x, (1.0, -1.0), 50, 1e-6).is_err());
    }

    #[test]
    fn test_equal_masses_are_symmetric() {
        let points = locate_lagrange_points(0.5).unwrap();
        assert_eq!(points.l1().x, 0.0);
        let mu = 0.5;
        let beyond_secondary = (mu - 1.0) - points.l2().x;
        let beyond_primary = points.l3().x - mu;
        assert!((beyond_secondary - beyond_primary).abs() < 1e-6);
        assert!((points.l2().x + 1.198_406_22).abs() < 1e-6);
        assert!(points.all_converged());
    }

    #[test]
    fn test_earth_moon_points() {
        let points = locate_lagrange_points(0.01215).unwrap();
        assert!((points.l1().x + 0.836_918).abs() < 1e-5);
        assert!((points.l2().x + 1.155_68).abs() < 1e-5);
        assert!((points.l3().x - 1.005_06).abs() < 1e-5);
    }

    #[test]
    fn test_triangular_points_form_equilateral_triangles() {
        let mass_ratio = MassRatio::new(0.2).unwrap();
        let points = locate_lagrange_points(0.2).unwrap();
        for apex in [points.l4(), points.l5()] {
            let to_primary = nalgebra::distance(&apex, &mass_ratio.primary_position());
            let to_secondary = nalgebra::distance(&apex, &mass_ratio.secondary_position());
            assert!((to_primary - 1.0).abs() < 1e-12);
            assert!((to_secondary - 1.0).abs() < 1e-12);
        }
        assert_eq!(points.l4().x, points.l5().x);
        assert_eq!(points.l4().y, -points.l5().y);
    }

    #[test]
    fn test_rejects_out_of_range_mass_ratio() {
        assert!(locate_lagrange_points(0.0).is_err());
        assert!(locate_lagrange_points(0.6).is_err());
        assert!(locate_lagrange_points(-0.01).is_err());
    }

    #[test]
    fn test_bracket_margin_shrinks_with_small_secondary() {
        let mass_ratio = MassRatio::new(1e-30).unwrap();
        let secondary = mass_ratio.secondary_position().x;
        let (a, _) = collinear_bracket(LagrangePoint::L1, mass_ratio, 1e-10).unwrap();
        let (_, b) = collinear_bracket(LagrangePoint::L2, mass_ratio, 1e-10).unwrap();
        let hill = (1e-30_f64 / 3.0).cbrt();
        assert!(a - secondary < hill);
        assert!(secondary - b < hill);
        assert!(collinear_balance(a, mass_ratio) < 0.0);
        assert!(collinear_balance(b, mass_ratio) > 0.0);

        // Large secondaries keep the configured margin
        let mass_ratio = MassRatio::new(0.1).unwrap();
        let (a, _) = collinear_bracket(LagrangePoint::L1, mass_ratio, 1e-10).unwrap();
        assert_eq!(a, mass_ratio.secondary_position().x + 1e-10);
    }

    #[test]
    fn test_tiny_mass_ratios_keep_ordering() {
        for mu in [1e-30, MIN_RESOLVABLE_MASS_RATIO] {
            let points = locate_lagrange_points(mu).unwrap();
            let secondary = mu - 1.0;
            assert!(points.l2().x < secondary, "L2 for μ = {mu}");
            assert!(secondary < points.l1().x, "L1 for μ = {mu}");
            assert!(points.l1().x < mu);
            assert!(mu < points.l3().x);
        }
    }

    #[test]
    fn test_unresolvable_mass_ratio_rejected() {
        let result = locate_lagrange_points(1e-45);
        assert!(matches!(
            result,
            Err(SynodicError::InvalidParameter { parameter: "mass_ratio", .. })
        ));
    }

    #[test]
    fn test_strict_mode_reports_non_convergence() {
        let config = BisectionConfig {
            max_iterations: 2,
            tolerance: 1e-14,
            strict: true,
            ..Default::default()
        };
        let result = locate_lagrange_points_with(0.01215, &config);
        assert!(matches!(
            result,
            Err(SynodicError::RootNotConverged {
                point: LagrangePoint::L1,
                iterations: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_lenient_mode_returns_estimate() {
        let config = BisectionConfig {
            max_iterations: 2,
            tolerance: 1e-14,
            ..Default::default()
        };
        let points = locate_lagrange_points_with(0.01215, &config).unwrap();
        assert!(!points.all_converged());
        let l1 = points.estimate(LagrangePoint::L1).unwrap();
        assert_eq!(l1.iterations, 2);
        assert!(!l1.converged);
        assert!(points.estimate(LagrangePoint::L4).is_none());
        // Ordering still holds with coarse estimates
        assert!(points.l2().x < 0.01215 - 1.0);
        assert!(points.l3().x > 0.01215);
    }

    #[test]
    fn test_labeled_iteration_order() {
        let points = locate_lagrange_points(0.1).unwrap();
        let labels: Vec<_> = points.iter().map(|(label, _)| label.to_string()).collect();
        assert_eq!(labels, ["L1", "L2", "L3", "L4", "L5"]);
    }
}
