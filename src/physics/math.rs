//! Scalar and coordinate types shared by the physics modules, plus the small
//! amount of fixed-size array arithmetic the steppers need.

/// Scalar type for all physics calculations (f64 for precision)
pub type Scalar = f64;

/// 2D point in the rotating frame
pub type Point = nalgebra::Point2<Scalar>;

/// 2D vector in the rotating frame
pub type Vector = nalgebra::Vector2<Scalar>;

/// `y + h * k`
#[inline]
pub(crate) fn add_scaled<const N: usize>(
    y: &[Scalar; N],
    h: Scalar,
    k: &[Scalar; N],
) -> [Scalar; N] {
    std::array::from_fn(|i| y[i] + h * k[i])
}

/// `y + h * Σ_j coefficients[j] * stages[j]`, skipping zero coefficients.
#[inline]
pub(crate) fn combine_stages<const N: usize>(
    y: &[Scalar; N],
    h: Scalar,
    coefficients: &[Scalar],
    stages: &[[Scalar; N]],
) -> [Scalar; N] {
    let mut out = *y;
    for (&c, k) in coefficients.iter().zip(stages) {
        if c == 0.0 {
            continue;
        }
        for i in 0..N {
            out[i] += h * c * k[i];
        }
    }
    out
}

#[inline]
pub(crate) fn all_finite<const N: usize>(values: &[Scalar; N]) -> bool {
    values.iter().all(|v| v.is_finite())
}

/// Root-mean-square norm, the norm used for every error test.
pub(crate) fn rms_norm<const N: usize>(values: &[Scalar; N]) -> Scalar {
    if N == 0 {
        return 0.0;
    }
    let sum: Scalar = values.iter().map(|v| v * v).sum();
    (sum / N as Scalar).sqrt()
}

/// Euclidean norm of `a - b`.
pub(crate) fn distance<const N: usize>(a: &[Scalar; N], b: &[Scalar; N]) -> Scalar {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<Scalar>()
        .sqrt()
}

/// Gap between `t` and the next representable value away from zero.
pub(crate) fn spacing(t: Scalar) -> Scalar {
    let magnitude = t.abs();
    if !magnitude.is_finite() {
        return Scalar::INFINITY;
    }
    Scalar::from_bits(magnitude.to_bits() + 1) - magnitude
}
