//! Dense output between integration steps.

use num_traits::cast;

use crate::{Float, State};

/// A point on the solution together with its derivative.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot<F: Float, Y> {
    pub t: F,
    pub y: Y,
    pub dy: Y,
}

impl<F: Float, Y> Snapshot<F, Y> {
    pub fn new(t: F, y: Y, dy: Y) -> Self {
        Self { t, y, dy }
    }
}

/// Evaluate the cubic Hermite interpolant between two snapshots at time `t`.
///
/// The interpolant matches the values and derivatives of both snapshots, so it reproduces them
/// exactly at `start.t` and `end.t` and is third order accurate in between regardless of the
/// method that produced the snapshots.
///
/// ```
/// use butcher::Snapshot;
///
/// // y = t^3 is a cubic, so it is reproduced exactly.
/// let start = Snapshot::new(1., 1., 3.);
/// let end = Snapshot::new(2., 8., 12.);
/// approx::assert_relative_eq!(butcher::dense::hermite(&start, &end, 1.5), 3.375);
/// ```
pub fn hermite<F: Float, Y: State<F>>(start: &Snapshot<F, Y>, end: &Snapshot<F, Y>, t: F) -> Y {
    let h = end.t - start.t;
    let s = (t - start.t) / h;
    let s2 = s * s;
    let s3 = s2 * s;
    let two: F = cast(2).unwrap();
    let three: F = cast(3).unwrap();

    let h00 = two * s3 - three * s2 + F::one();
    let h10 = s3 - two * s2 + s;
    let h01 = three * s2 - two * s3;
    let h11 = s3 - s2;

    start.y.clone() * h00
        + start.dy.clone() * (h * h10)
        + end.y.clone() * h01
        + end.dy.clone() * (h * h11)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_reproduced() {
        let start = Snapshot::new(0.3, 1.7, -0.4);
        let end = Snapshot::new(0.55, 2.9, 3.1);
        assert_eq!(hermite(&start, &end, start.t), start.y);
        assert_eq!(hermite(&start, &end, end.t), end.y);
    }

    #[test]
    fn endpoints_are_reproduced_for_arrays() {
        let start = Snapshot::new(-1., ndarray::array![1., -2., 0.5], ndarray::array![0., 4., 1.]);
        let end = Snapshot::new(-0.5, ndarray::array![3., 1., 0.25], ndarray::array![2., -1., 7.]);
        assert_eq!(hermite(&start, &end, start.t), start.y);
        assert_eq!(hermite(&start, &end, end.t), end.y);
    }

    #[test]
    fn cubics_are_exact() {
        let p = |t: f64| 2. * t.powi(3) - t.powi(2) + 0.5 * t - 3.;
        let dp = |t: f64| 6. * t.powi(2) - 2. * t + 0.5;
        let start = Snapshot::new(-0.7, p(-0.7), dp(-0.7));
        let end = Snapshot::new(1.3, p(1.3), dp(1.3));
        for i in 0..=10 {
            let t = -0.7 + 0.2 * i as f64;
            approx::assert_relative_eq!(hermite(&start, &end, t), p(t), epsilon = 1e-12);
        }
    }

    #[test]
    fn fourth_order_interpolation_error() {
        // Error of the cubic Hermite interpolant scales as h^4.
        let max_error = |h: f64| {
            let start = Snapshot::new(0., 1., 1.);
            let end = Snapshot::new(h, h.exp(), h.exp());
            (1..10)
                .map(|i| {
                    let t = h * i as f64 / 10.;
                    (hermite(&start, &end, t) - t.exp()).abs()
                })
                .fold(0., f64::max)
        };
        let ratio = max_error(0.2) / max_error(0.1);
        assert!((12. ..20.).contains(&ratio), "{ratio}");
    }
}
