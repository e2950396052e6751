//! Explicit Runge-Kutta integration of ordinary differential equation initial value problems.
//!
//! Given `y' = f(t, y)` and `y(t_start) = y0`, this crate computes `y` at a caller-specified set of
//! sample times, marching from `t_start` forward and backward in time as needed. Nine fixed-step
//! methods (second to fourth order) and four embedded adaptive-step methods (up to fifth order)
//! are available. Sample times falling between integration steps are filled in with a cubic
//! Hermite interpolant.
//!
//! The state can be any type implementing [`State`]: built-in floats, [`ndarray::Array1`], or a
//! user-defined vector type.
//!
//! The method coefficients follow:
//! * Butcher, John C. Numerical Methods for Ordinary Differential Equations. Wiley, 2016.
//! * Dormand, J. R., and P. J. Prince. "A family of embedded Runge-Kutta formulae." Journal of
//!   Computational and Applied Mathematics 6 (1980): 19-26.
//! * Bogacki, P., and L. F. Shampine. "A 3(2) pair of Runge-Kutta formulas." Applied Mathematics
//!   Letters 2 (1989): 321-325.
//! * Tsitouras, Ch. "Runge-Kutta pairs of order 5(4) satisfying only the first column simplifying
//!   assumption." Computers & Mathematics with Applications 62 (2011): 770-775.
//!
//! As an example, consider exponential growth sampled on both sides of the initial time:
//!
//! ```
//! let options = butcher::Options::default();
//! let growth = |_t: f64, y: &f64| 0.1 * y;
//!
//! let solution = butcher::solve(&growth, 1., &[2., -1., 0., 1., -2.], &options, "dopri54").unwrap();
//!
//! // Samples come back in ascending time order.
//! assert_eq!(solution.times().collect::<Vec<_>>(), vec![-2., -1., 0., 1., 2.]);
//! for &(t, y) in solution.iter() {
//!     approx::assert_relative_eq!(y, (0.1 * t).exp(), max_relative = 1e-9);
//! }
//! assert!(solution.stats.num_system_evals > 0);
//! ```
//!
//! Vector-valued problems work the same way, here a harmonic oscillator integrated with a fixed
//! step fourth order method:
//!
//! ```
//! use ndarray::array;
//!
//! let omega = 1.2;
//! let oscillator = |_t: f64, y: &ndarray::Array1<f64>| array![y[1], -omega * omega * y[0]];
//! let options = butcher::Options::builder().with_dt(1e-3).build().unwrap();
//!
//! let solution = butcher::solve_with(
//!     &oscillator,
//!     array![1., 0.],
//!     &[0.5, 1., 10.],
//!     &options,
//!     butcher::Method::Rk4,
//! )
//! .unwrap();
//!
//! for (t, y) in solution.iter() {
//!     approx::assert_relative_eq!(y[0], (omega * t).cos(), epsilon = 1e-8);
//!     approx::assert_relative_eq!(y[1], -omega * (omega * t).sin(), epsilon = 1e-8);
//! }
//! ```

use core::ops::{Add, Mul, Sub};

pub use nd::Array1;
use ndarray as nd;

pub mod dense;
mod driver;
mod error;
mod kernel;
pub mod method;
mod options;
pub mod tableau;

pub use dense::Snapshot;
pub use error::{Error, UnknownMethod};
pub use kernel::StepOutcome;
pub use method::{Method, MethodDescriptor};
pub use options::{Options, OptionsBuilder};
pub use tableau::ButcherTableau;

pub trait Float:
    num_traits::Float
    + core::iter::Sum
    + core::ops::AddAssign
    + core::ops::MulAssign
    + core::fmt::Debug
    + nd::ScalarOperand
{
}

impl Float for f32 {}
impl Float for f64 {}

/// Trait for values that can be integrated: a vector space over `F` with a distance measure.
///
/// Every operation produces a fresh value; integration never mutates a state in place.
pub trait State<F: Float>:
    Clone + Add<Output = Self> + Sub<Output = Self> + Mul<F, Output = Self>
{
    /// The magnitude of the discrepancy between two estimates of the same state, compared against
    /// the tolerance by adaptive methods.
    fn error(&self, other: &Self) -> F;
}

impl State<f32> for f32 {
    fn error(&self, other: &Self) -> f32 {
        (self - other).abs()
    }
}

impl State<f64> for f64 {
    fn error(&self, other: &Self) -> f64 {
        (self - other).abs()
    }
}

/// The Euclidean norm of the difference.
impl<F: Float> State<F> for nd::Array1<F> {
    fn error(&self, other: &Self) -> F {
        self.iter()
            .zip(other.iter())
            .map(|(&a, &b)| (a - b).powi(2))
            .sum::<F>()
            .sqrt()
    }
}

/// Trait for defining an ordinary differential equation system `y' = f(t, y)`.
///
/// Implemented for any closure `Fn(F, &Y) -> Y`. Evaluation must be deterministic and free of side
/// effects: derivatives are reused across steps and recomputed during step retries.
pub trait System<F: Float, Y: State<F>> {
    /// Evaluate the derivative of `y` at time `t`.
    fn system(&self, t: F, y: &Y) -> Y;
}

impl<F, Y, G> System<F, Y> for G
where
    F: Float,
    Y: State<F>,
    G: Fn(F, &Y) -> Y,
{
    fn system(&self, t: F, y: &Y) -> Y {
        self(t, y)
    }
}

/// Statistics from solving a problem.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// Number of system function evaluations.
    pub num_system_evals: usize,
    /// Number of accepted steps.
    pub num_steps: usize,
    /// Number of step attempts discarded by adaptive methods because of excessive error.
    pub num_rejected_steps: usize,
    /// Number of steps accepted with an error above the tolerance because the step size could not
    /// be reduced further.
    pub num_unconverged_steps: usize,
}

/// The solution at the requested sample times, in ascending time order.
#[derive(Clone, Debug)]
pub struct Solution<F: Float, Y> {
    /// `(t, y)` pairs, one per requested sample time.
    pub points: Vec<(F, Y)>,
    /// Integration statistics, summed over both time directions.
    pub stats: Stats,
}

impl<F: Float, Y> Solution<F, Y> {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, (F, Y)> {
        self.points.iter()
    }

    /// The sample times.
    pub fn times(&self) -> impl Iterator<Item = F> + '_ {
        self.points.iter().map(|(t, _)| *t)
    }

    /// The solution values.
    pub fn values(&self) -> impl Iterator<Item = &Y> {
        self.points.iter().map(|(_, y)| y)
    }

    pub fn into_points(self) -> Vec<(F, Y)> {
        self.points
    }
}

impl<'a, F: Float, Y> IntoIterator for &'a Solution<F, Y> {
    type Item = &'a (F, Y);
    type IntoIter = core::slice::Iter<'a, (F, Y)>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// Solve an initial value problem with a method selected by name.
///
/// # Arguments
///
/// * `system`: The ODE system.
/// * `y0`: The state at `options.t_start()`.
/// * `t_eval`: The times at which to report the solution, in any order.
/// * `options`: Step size and tolerance settings.
/// * `method`: A case-insensitive method name, see [`Method::ALL`].
///
/// # Result
///
/// The solution in ascending time order, or an error:
/// * a configuration error if the method name is unknown or a sample time is not finite, in which
///   case no system evaluation takes place;
/// * [`Error::StepSizeUnderflow`] if the step size is too small to advance the time, e.g. a fixed
///   `dt` far below the floating point resolution of large sample times.
pub fn solve<F, Y, S>(
    system: &S,
    y0: Y,
    t_eval: &[F],
    options: &Options<F>,
    method: &str,
) -> Result<Solution<F, Y>, Error<F>>
where
    F: Float,
    Y: State<F>,
    S: System<F, Y>,
{
    let method: Method = method.parse()?;
    solve_with(system, y0, t_eval, options, method)
}

/// Solve an initial value problem with the given method. See [`solve`].
pub fn solve_with<F, Y, S>(
    system: &S,
    y0: Y,
    t_eval: &[F],
    options: &Options<F>,
    method: Method,
) -> Result<Solution<F, Y>, Error<F>>
where
    F: Float,
    Y: State<F>,
    S: System<F, Y>,
{
    if let Some(&t) = t_eval.iter().find(|t| !t.is_finite()) {
        return Err(Error::NonFiniteSampleTime(t));
    }
    let mut t_eval = t_eval.to_vec();
    t_eval.sort_by(|a, b| {
        a.partial_cmp(b)
            .expect("non-finite sample times are rejected above")
    });

    let solution = driver::solve_sorted(system, y0, &t_eval, options, method)?;
    tracing::debug!(
        method = %method,
        num_points = solution.len(),
        stats = ?solution.stats,
        "solved initial value problem"
    );
    Ok(solution)
}

/// Counts evaluations of the wrapped system.
pub(crate) struct SystemEvaluationCounter<'a, S> {
    system: &'a S,
    num_system_evals: usize,
}

impl<'a, S> SystemEvaluationCounter<'a, S> {
    pub(crate) fn new(system: &'a S) -> Self {
        Self {
            system,
            num_system_evals: 0,
        }
    }

    pub(crate) fn system<F: Float, Y: State<F>>(&mut self, t: F, y: &Y) -> Y
    where
        S: System<F, Y>,
    {
        self.num_system_evals += 1;
        <S as System<F, Y>>::system(self.system, t, y)
    }

    pub(crate) fn num_system_evals(&self) -> usize {
        self.num_system_evals
    }
}
