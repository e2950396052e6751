use num_traits::cast;

use crate::dense::{self, Snapshot};
use crate::kernel;
use crate::{
    Error, Float, Method, MethodDescriptor, Options, Solution, State, Stats, System,
    SystemEvaluationCounter,
};

/// The system integrated backward in time: `g(tau, y) = -f(-tau, y)`. Integrating it forward from
/// `-t_start` is equivalent to integrating `f` backward from `t_start`.
struct Reflected<'a, S> {
    system: &'a S,
}

impl<F: Float, Y: State<F>, S: System<F, Y>> System<F, Y> for Reflected<'_, S> {
    fn system(&self, tau: F, y: &Y) -> Y {
        <S as System<F, Y>>::system(self.system, -tau, y) * -F::one()
    }
}

/// Solve for sample times already sorted in ascending order.
pub(crate) fn solve_sorted<F, Y, S>(
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
    let t_start = options.t_start();
    let descriptor = method.descriptor();
    let mut stats = Stats::default();

    // Backward targets, reflected to ascending `tau = -t`.
    let backward_targets: Vec<F> = t_eval
        .iter()
        .rev()
        .filter(|&&t| t < t_start)
        .map(|&t| -t)
        .collect();
    let forward_targets: Vec<F> = t_eval.iter().copied().filter(|&t| t > t_start).collect();
    let num_at_start = t_eval.iter().filter(|&&t| t == t_start).count();

    let mut points = Vec::with_capacity(t_eval.len());
    if !backward_targets.is_empty() {
        let reflected = Reflected { system };
        let backward = march(
            descriptor,
            &reflected,
            -t_start,
            &y0,
            &backward_targets,
            options,
            &mut stats,
        )
        .map_err(Error::reflect)?;
        points.extend(backward.into_iter().rev().map(|(tau, y)| (-tau, y)));
    }
    points.extend(core::iter::repeat_n((t_start, y0.clone()), num_at_start));
    if !forward_targets.is_empty() {
        let forward = march(
            descriptor,
            system,
            t_start,
            &y0,
            &forward_targets,
            options,
            &mut stats,
        )?;
        points.extend(forward);
    }

    Ok(Solution { points, stats })
}

/// Integrate forward from `(t0, y0)` and report the solution at each of `targets`, which must be
/// ascending and strictly greater than `t0`.
///
/// With a single target the solution is only reported at the end of integration. With more,
/// intermediate targets are filled in by Hermite interpolation between accepted steps.
///
/// Fails if an accepted step is too small to change `t`.
fn march<F, Y, S>(
    descriptor: &MethodDescriptor,
    system: &S,
    t0: F,
    y0: &Y,
    targets: &[F],
    options: &Options<F>,
    stats: &mut Stats,
) -> Result<Vec<(F, Y)>, Error<F>>
where
    F: Float,
    Y: State<F>,
    S: System<F, Y>,
{
    let Some(&t_end) = targets.last() else {
        return Ok(Vec::new());
    };
    let dense = targets.len() > 1;
    tracing::debug!(
        method = descriptor.name,
        t0 = ?t0,
        t_end = ?t_end,
        num_targets = targets.len(),
        dense,
        "starting integration"
    );

    let mut system = SystemEvaluationCounter::new(system);
    let mut dt = if descriptor.adaptive {
        (options.dt_max() * options.dt_min()).sqrt()
    } else {
        options.dt()
    };
    let mut t = t0;
    let mut y = y0.clone();
    // Read by FSAL kernels and by the interpolant; otherwise it may lag behind `y`.
    let mut dy = system.system(t, &y);

    let mut output = Vec::with_capacity(targets.len());
    let mut pending = targets.iter().copied().peekable();
    while t < t_end {
        let remaining = t_end - t;
        let last_step = dt >= remaining;
        if last_step {
            dt = remaining;
        }

        let last = Snapshot::new(t, y, dy);
        let outcome = kernel::step(
            descriptor,
            &mut system,
            last.t,
            &last.y,
            &last.dy,
            dt,
            options,
        );
        stats.num_steps += 1;
        stats.num_rejected_steps += outcome.num_rejections;
        if !outcome.converged {
            stats.num_unconverged_steps += 1;
        }
        tracing::trace!(t = ?last.t, dt = ?outcome.dt, error = ?outcome.error, "accepted step");

        // Land exactly on the end, without accumulating roundoff from `t + remaining`.
        t = if last_step && outcome.dt == dt {
            t_end
        } else {
            last.t + outcome.dt
        };
        if t <= last.t {
            tracing::warn!(t = ?last.t, dt = ?outcome.dt, "step size underflow");
            return Err(Error::StepSizeUnderflow {
                t: last.t,
                dt: outcome.dt,
            });
        }
        y = outcome.y;
        dy = match outcome.derivative {
            Some(derivative) => derivative,
            None if dense => system.system(t, &y),
            None => last.dy.clone(),
        };

        if dense {
            let next = Snapshot::new(t, y, dy);
            while let Some(t_target) = pending.next_if(|&t_target| t_target < t_end && t_target <= t)
            {
                output.push((t_target, dense::hermite(&last, &next, t_target)));
            }
            y = next.y;
            dy = next.dy;
        }

        if descriptor.adaptive {
            dt = propose_step_size(descriptor, options, outcome.dt, outcome.error);
        }
    }

    output.extend(pending.map(|t_target| (t_target, y.clone())));
    stats.num_system_evals += system.num_system_evals();
    Ok(output)
}

/// Size the next trial step from the error of the step just accepted.
fn propose_step_size<F: Float>(
    descriptor: &MethodDescriptor,
    options: &Options<F>,
    dt: F,
    error: F,
) -> F {
    let dt = if error == F::zero() {
        dt * cast(5).unwrap()
    } else if error.is_finite() {
        let safety_factor: F = cast(0.9).unwrap();
        let order: F = cast(descriptor.order).unwrap();
        safety_factor * dt * (options.tol() / error).powf(order.recip())
    } else {
        dt * cast(0.5).unwrap()
    };
    options.clamp_step_size(dt)
}
