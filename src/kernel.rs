use num_traits::cast;

use crate::{
    ButcherTableau, Float, MethodDescriptor, Options, State, System, SystemEvaluationCounter,
};

/// The number of times a retried step may be clamped to the minimum step size before its
/// estimate is accepted regardless of the error. A step attempted at the minimum step size is
/// accepted after its first rejection.
const MAX_FLOOR_HITS: usize = 2;

/// Result of a single Runge-Kutta step.
#[derive(Clone, Debug, PartialEq)]
pub struct StepOutcome<F: Float, Y> {
    /// The state at the end of the step.
    pub y: Y,
    /// The derivative at `y`, available from methods whose last stage is evaluated there.
    pub derivative: Option<Y>,
    /// The step size actually taken. Adaptive methods may shrink the requested step.
    pub dt: F,
    /// The error estimate of the accepted step; zero for fixed-step methods.
    pub error: F,
    /// The number of attempts discarded before the step was accepted.
    pub num_rejections: usize,
    /// False if the step was accepted with `error > tol` after reaching the minimum step size.
    pub converged: bool,
}

/// Take one step of `dt` from `(t, y)`.
///
/// `dy` must be the derivative at `(t, y)`; it is only read by methods that reuse the derivative
/// of the previous step's last stage.
pub(crate) fn step<F, Y, S>(
    descriptor: &MethodDescriptor,
    system: &mut SystemEvaluationCounter<S>,
    t: F,
    y: &Y,
    dy: &Y,
    dt: F,
    options: &Options<F>,
) -> StepOutcome<F, Y>
where
    F: Float,
    Y: State<F>,
    S: System<F, Y>,
{
    let first_stage = descriptor.fsal.then_some(dy);
    if !descriptor.adaptive {
        let estimates = evaluate(&descriptor.tableau, system, t, y, first_stage, dt);
        return StepOutcome {
            y: estimates.high,
            derivative: None,
            dt,
            error: F::zero(),
            num_rejections: 0,
            converged: true,
        };
    }

    let order: F = cast(descriptor.order).unwrap();
    // Retrying never lengthens the step beyond the one requested, so a step the caller clamped
    // to land on a sample time cannot overshoot it.
    let floor = options.dt_min().min(dt.abs());

    let mut dt = dt;
    let mut num_floor_hits = 0;
    let mut num_rejections = 0;
    loop {
        let estimates = evaluate(&descriptor.tableau, system, t, y, first_stage, dt);
        let error = match &estimates.low {
            Some(low) => estimates.high.error(low),
            None => F::zero(),
        };
        let derivative = if descriptor.fsal {
            Some(estimates.last_stage)
        } else {
            None
        };

        if error <= options.tol() {
            return StepOutcome {
                y: estimates.high,
                derivative,
                dt,
                error,
                num_rejections,
                converged: true,
            };
        }

        let mut dt_trial = shrink_step_size(dt, error, options.tol(), order);
        if dt_trial.abs() < floor {
            dt_trial = floor * dt.signum();
            num_floor_hits += 1;
        }
        if options.dt_max() < dt_trial.abs() {
            dt_trial = options.dt_max() * dt.signum();
        }

        // Retrying at the floor a step already taken at the floor reproduces the same estimate.
        if num_floor_hits >= MAX_FLOOR_HITS || dt_trial == dt {
            tracing::warn!(
                t = ?t,
                dt = ?dt,
                error = ?error,
                tol = ?options.tol(),
                "accepting step with error above tolerance at minimum step size"
            );
            return StepOutcome {
                y: estimates.high,
                derivative,
                dt,
                error,
                num_rejections,
                converged: false,
            };
        }

        num_rejections += 1;
        dt = dt_trial;
    }
}

fn shrink_step_size<F: Float>(dt: F, error: F, tol: F, order: F) -> F {
    if error.is_finite() {
        let safety_factor: F = cast(0.9).unwrap();
        safety_factor * dt * (tol / error).powf(order.recip())
    } else {
        dt * cast(0.5).unwrap()
    }
}

struct Estimates<Y> {
    /// The propagated solution.
    high: Y,
    /// The embedded lower order solution.
    low: Option<Y>,
    /// The derivative evaluated by the last stage.
    last_stage: Y,
}

/// Evaluate all stages of a tableau, strictly in order.
fn evaluate<F, Y, S>(
    tableau: &ButcherTableau,
    system: &mut SystemEvaluationCounter<S>,
    t: F,
    y: &Y,
    first_stage: Option<&Y>,
    dt: F,
) -> Estimates<Y>
where
    F: Float,
    Y: State<F>,
    S: System<F, Y>,
{
    let mut k = Vec::with_capacity(tableau.stages());
    k.push(match first_stage {
        Some(dy) => dy.clone(),
        None => system.system(t, y),
    });
    for (&c, a) in tableau.c.iter().zip(tableau.a).skip(1) {
        let y_stage = combine(y, &k, a, dt);
        let t_stage = t + cast::<_, F>(c).unwrap() * dt;
        k.push(system.system(t_stage, &y_stage));
    }

    let high = combine(y, &k, tableau.b, dt);
    let low = tableau.b_low.map(|b_low| combine(y, &k, b_low, dt));
    let last_stage = k.pop().unwrap();
    Estimates {
        high,
        low,
        last_stage,
    }
}

/// `y + dt * sum_i weights[i] * k[i]`, skipping zero weights.
fn combine<F: Float, Y: State<F>>(y: &Y, k: &[Y], weights: &[f64], dt: F) -> Y {
    weights
        .iter()
        .zip(k)
        .filter(|(weight, _)| **weight != 0.)
        .fold(y.clone(), |acc, (&weight, ki)| {
            acc + ki.clone() * (dt * cast(weight).unwrap())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Method;

    #[test]
    fn fixed_step_takes_requested_step() {
        let decay = |_t: f64, y: &f64| -y;
        let mut system = SystemEvaluationCounter::new(&decay);
        let options = Options::default();

        let outcome = step(
            &Method::Rk4.descriptor(),
            &mut system,
            0.,
            &1.,
            &-1.,
            0.1,
            &options,
        );

        assert_eq!(outcome.dt, 0.1);
        assert_eq!(outcome.error, 0.);
        assert_eq!(outcome.derivative, None);
        assert!(outcome.converged);
        assert_eq!(system.num_system_evals(), 4);
        approx::assert_relative_eq!(outcome.y, (-0.1f64).exp(), max_relative = 1e-6);
    }

    #[test]
    fn fsal_reuses_and_returns_derivative() {
        let decay = |_t: f64, y: &f64| -y;
        let mut system = SystemEvaluationCounter::new(&decay);
        let options = Options::builder().with_tol(1e-3).build().unwrap();

        let outcome = step(
            &Method::Dopri54.descriptor(),
            &mut system,
            0.,
            &1.,
            &-1.,
            0.01,
            &options,
        );

        assert!(outcome.converged);
        assert_eq!(outcome.num_rejections, 0);
        // The first stage is reused, so only six of the seven stages are evaluated.
        assert_eq!(system.num_system_evals(), 6);
        assert_eq!(outcome.derivative, Some(-outcome.y));
    }

    #[test]
    fn rejected_step_is_retried_smaller() {
        let growth = |_t: f64, y: &f64| 5. * y;
        let mut system = SystemEvaluationCounter::new(&growth);
        let options = Options::builder()
            .with_tol(1e-8)
            .with_dt_max(1.)
            .build()
            .unwrap();

        let outcome = step(
            &Method::Bs32.descriptor(),
            &mut system,
            0.,
            &1.,
            &5.,
            0.5,
            &options,
        );

        assert!(outcome.converged);
        assert!(outcome.num_rejections > 0);
        assert!(outcome.dt < 0.5);
        assert!(outcome.error <= 1e-8);
        approx::assert_relative_eq!(outcome.y, (5. * outcome.dt).exp(), max_relative = 1e-6);
    }

    #[test]
    fn safety_valve_accepts_after_two_floor_hits() {
        let stiff = |t: f64, y: &f64| -1e4 * (y - t.cos());
        let mut system = SystemEvaluationCounter::new(&stiff);
        let options = Options::builder()
            .with_tol(1e-12)
            .with_dt_min(0.01)
            .with_dt_max(0.1)
            .build()
            .unwrap();

        let outcome = step(
            &Method::Rk21.descriptor(),
            &mut system,
            0.,
            &0.,
            &1e4,
            0.1,
            &options,
        );

        assert!(!outcome.converged);
        assert_eq!(outcome.dt, 0.01);
        assert!(outcome.error > 1e-12);
        // Attempts at 0.1 and 0.01, the second floor hit ends the loop.
        assert_eq!(outcome.num_rejections, 1);
        assert_eq!(system.num_system_evals(), 2 * 2);
    }

    #[test]
    fn retry_never_exceeds_requested_step() {
        let growth = |_t: f64, y: &f64| 50. * y;
        let mut system = SystemEvaluationCounter::new(&growth);
        let options = Options::builder()
            .with_tol(1e-14)
            .with_dt_min(0.05)
            .with_dt_max(0.1)
            .build()
            .unwrap();

        let outcome = step(
            &Method::Tsit54.descriptor(),
            &mut system,
            0.,
            &1.,
            &50.,
            1e-3,
            &options,
        );

        // The requested step is the floor, so the first attempt is accepted without a retry.
        assert!(!outcome.converged);
        assert_eq!(outcome.dt, 1e-3);
        assert_eq!(outcome.num_rejections, 0);
        assert_eq!(system.num_system_evals(), 6);
    }

    #[test]
    fn step_at_floor_is_not_retried() {
        let stiff = |t: f64, y: &f64| -1e4 * (y - t.cos());
        let mut system = SystemEvaluationCounter::new(&stiff);
        let options = Options::builder()
            .with_tol(1e-12)
            .with_dt_min(0.01)
            .with_dt_max(0.1)
            .build()
            .unwrap();

        let outcome = step(
            &Method::Dopri54.descriptor(),
            &mut system,
            0.,
            &0.,
            &1e4,
            0.01,
            &options,
        );

        assert!(!outcome.converged);
        assert_eq!(outcome.dt, 0.01);
        assert!(outcome.error > 1e-12);
        assert_eq!(outcome.num_rejections, 0);
        // A single attempt, with the first stage reused.
        assert_eq!(system.num_system_evals(), 6);
    }

    #[test]
    fn negative_step_integrates_backward() {
        let growth = |_t: f64, y: &f64| y * 1.;
        let mut system = SystemEvaluationCounter::new(&growth);
        let options = Options::builder().with_tol(1e-10).build().unwrap();

        let outcome = step(
            &Method::Dopri54.descriptor(),
            &mut system,
            0.,
            &1.,
            &1.,
            -0.05,
            &options,
        );

        assert!(outcome.dt < 0.);
        approx::assert_relative_eq!(outcome.y, outcome.dt.exp(), max_relative = 1e-10);
    }
}
